//! Context handed to providers while scoring candidates.

use crate::component::Component;
use crate::config::Config;
use crate::key::TypeKey;
use crate::registration::Registry;
use crate::url::Url;

/// Everything a [`Provider`](super::Provider) may inspect when deciding
/// whether, and how eagerly, its type should serve a resolution request.
///
/// # Examples
///
/// ```rust
/// use ferrous_actives::{ProvideContext, Provider, Provision, Instance, Config, ActiveResult};
///
/// struct Postgres;
/// impl ferrous_actives::Lifecycle for Postgres {}
///
/// struct PostgresProvider;
///
/// impl Provider for PostgresProvider {
///     fn provides(&self, cx: &ProvideContext<'_>) -> Option<Provision> {
///         let scheme = cx.url()?.scheme.as_deref()?;
///         matches!(scheme, "postgres" | "postgresql").then(|| Provision::new(10))
///     }
///
///     fn instantiate(&self, _config: &Config) -> ActiveResult<Instance> {
///         Ok(Instance::new(Postgres))
///     }
/// }
/// ```
pub struct ProvideContext<'a> {
    registry: &'a Registry,
    config: &'a Config,
    url: Option<&'a Url>,
    owner: Option<&'a Component>,
    base: TypeKey,
    candidate: TypeKey,
}

impl<'a> ProvideContext<'a> {
    pub(crate) fn new(
        registry: &'a Registry,
        config: &'a Config,
        url: Option<&'a Url>,
        owner: Option<&'a Component>,
        base: TypeKey,
        candidate: TypeKey,
    ) -> Self {
        Self {
            registry,
            config,
            url,
            owner,
            base,
            candidate,
        }
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// The config coerced for the base type, unknown keys included.
    pub fn config(&self) -> &'a Config {
        self.config
    }

    /// The parsed `url` value of the config.
    pub fn url(&self) -> Option<&'a Url> {
        self.url
    }

    /// The component requesting the instance, if any.
    pub fn owner(&self) -> Option<&'a Component> {
        self.owner
    }

    /// The type being resolved.
    pub fn base(&self) -> TypeKey {
        self.base
    }

    /// The type being scored.
    pub fn candidate(&self) -> TypeKey {
        self.candidate
    }

    pub fn base_name(&self) -> String {
        self.registry.name_of(self.base).unwrap_or_default()
    }

    pub fn candidate_name(&self) -> String {
        self.registry.name_of(self.candidate).unwrap_or_default()
    }
}

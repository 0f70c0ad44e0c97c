//! Provider resolution.
//!
//! Resolving a type selects the best-scoring implementation among the type
//! itself and everything transitively registered for it with
//! [`Registry::use_impl`], optionally returns a shared instance from the
//! implementation's cache, and otherwise constructs a new component. When
//! the type carries a URL-typed `url` property whose value chains into a
//! remainder (`a://x|b://y`), the remainder is resolved in turn and linked
//! as the new component's `next`.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::component::Component;
use crate::config::Config;
use crate::error::{ActiveError, ActiveResult};
use crate::graph;
use crate::key::TypeKey;
use crate::registration::Registry;
use crate::traits::{Lifecycle, Plain};
use crate::url::Url;

pub mod context;

pub use context::ProvideContext;

/// Priority of a candidate whose name matches the config's `$key` or `type`.
pub const MATCH_PRIORITY: u32 = 5;
/// Priority of any other eligible candidate.
pub const BASELINE_PRIORITY: u32 = 1;

/// Scores, shares and constructs instances of one component type.
///
/// Only [`instantiate`](Provider::instantiate) is required. The default
/// scoring is [`default_provision`] and by default instances are never
/// shared.
pub trait Provider: Send + Sync + 'static {
    /// Scores this type for a resolution request. `None` means ineligible;
    /// the highest priority wins and ties go to the earliest candidate.
    fn provides(&self, cx: &ProvideContext<'_>) -> Option<Provision> {
        Some(default_provision(cx))
    }

    /// Cache key under which instances are shared. `None` disables sharing.
    fn shared_key(&self, _config: &Config) -> Option<String> {
        None
    }

    /// Name under which a non-shared instance refers to its owner. Defaults
    /// to the owner's type name with a lower-cased first letter.
    fn owner_key(&self) -> Option<&str> {
        None
    }

    /// Constructs the implementation for a coerced config.
    fn instantiate(&self, config: &Config) -> ActiveResult<Instance>;
}

/// Outcome of scoring a candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Provision {
    pub priority: u32,
    /// Merged into the config before construction.
    pub opts: Option<Map<String, Value>>,
    /// Replaces the config's `url` before construction.
    pub url: Option<String>,
    /// Type to construct instead of the scored candidate.
    pub implementation: Option<TypeKey>,
    /// Type the chained remainder of the URL resolves against.
    pub base: Option<TypeKey>,
}

impl Provision {
    pub fn new(priority: u32) -> Self {
        Self {
            priority,
            ..Self::default()
        }
    }

    pub fn with_opts(mut self, opts: Map<String, Value>) -> Self {
        self.opts = Some(opts);
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_implementation(mut self, implementation: TypeKey) -> Self {
        self.implementation = Some(implementation);
        self
    }

    pub fn with_base(mut self, base: TypeKey) -> Self {
        self.base = Some(base);
        self
    }
}

/// Default candidate scoring.
///
/// A candidate scores [`MATCH_PRIORITY`] when the config's `$key` equals its
/// short name (the lower-cased type name with the base name removed) or its
/// lower-cased name, or when `type` equals either of those or the exact type
/// name. Any other candidate scores [`BASELINE_PRIORITY`], which keeps a
/// concrete base type usable as a last resort.
pub fn default_provision(cx: &ProvideContext<'_>) -> Provision {
    let name = cx.candidate_name();
    let type_name = name.to_lowercase();
    let short_name = type_name.replacen(&cx.base_name().to_lowercase(), "", 1);
    let config = cx.config();
    let named = |value: Option<&str>| {
        value.map_or(false, |v| v == short_name || v == type_name)
    };
    let matched = named(config.key())
        || named(config.type_name())
        || config.type_name() == Some(name.as_str());
    Provision::new(if matched { MATCH_PRIORITY } else { BASELINE_PRIORITY })
}

/// A constructed implementation: its lifecycle hooks plus the value itself,
/// retrievable with [`Component::downcast`].
#[derive(Clone)]
pub struct Instance {
    pub(crate) hooks: Arc<dyn Lifecycle>,
    pub(crate) value: Arc<dyn Any + Send + Sync>,
}

impl Instance {
    pub fn new<T: Lifecycle>(value: T) -> Self {
        let value = Arc::new(value);
        Self {
            hooks: value.clone(),
            value,
        }
    }

    /// An instance without hooks.
    pub fn plain() -> Self {
        Self::new(Plain)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance").finish_non_exhaustive()
    }
}

/// Provider of types defined without one.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PlainProvider;

impl Provider for PlainProvider {
    fn instantiate(&self, _config: &Config) -> ActiveResult<Instance> {
        Ok(Instance::plain())
    }
}

/// Provider wrapping a constructor closure.
pub(crate) struct FactoryProvider<F> {
    factory: F,
}

impl<F> FactoryProvider<F> {
    pub(crate) fn new(factory: F) -> Self {
        Self { factory }
    }
}

impl<F> Provider for FactoryProvider<F>
where
    F: Fn(&Config) -> ActiveResult<Instance> + Send + Sync + 'static,
{
    fn instantiate(&self, config: &Config) -> ActiveResult<Instance> {
        (self.factory)(config)
    }
}

struct Pick {
    provision: Provision,
    implementation: TypeKey,
}

impl Registry {
    /// Resolves a component for `ty`.
    ///
    /// # Errors
    ///
    /// * [`ActiveError::Resolution`] when no candidate qualifies for `ty` or
    ///   any of its ancestors
    /// * [`ActiveError::Config`], [`ActiveError::Format`] or
    ///   [`ActiveError::Url`] when the config cannot be coerced
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrous_actives::{Config, Registry, TypeDef};
    /// use serde_json::json;
    ///
    /// let registry = Registry::new();
    /// let staff = registry.define(TypeDef::new("Staff")).unwrap();
    /// let manager = registry.define(TypeDef::new("Manager").extends(staff)).unwrap();
    /// registry.use_impl(staff, manager).unwrap();
    ///
    /// let tim = registry.provide(staff, json!({"type": "manager"}), None).unwrap();
    /// assert_eq!(tim.type_name(), "Manager");
    /// let amy = registry.provide(staff, Config::new(), None).unwrap();
    /// assert_eq!(amy.type_name(), "Staff");
    /// ```
    pub fn provide(
        &self,
        ty: TypeKey,
        config: impl Into<Config>,
        owner: Option<&Component>,
    ) -> ActiveResult<Component> {
        self.resolve(ty, config.into(), owner)
    }

    fn resolve(&self, ty: TypeKey, config: Config, owner: Option<&Component>) -> ActiveResult<Component> {
        let mut base = ty;
        let mut config = config;
        loop {
            config = self.coerce(base, &config, None, true)?;
            if let Some(pick) = self.pick(base, &config, owner)? {
                return self.construct(base, config, pick, owner);
            }
            match self.parent_of(base) {
                Some(parent) => {
                    tracing::trace!(
                        base = %self.name_of(base).unwrap_or_default(),
                        parent = %self.name_of(parent).unwrap_or_default(),
                        "no candidate, retrying against parent"
                    );
                    base = parent;
                }
                None => {
                    return Err(ActiveError::Resolution {
                        type_name: self.name_of(ty).unwrap_or_default(),
                        target: describe_target(&config),
                    })
                }
            }
        }
    }

    fn pick(&self, base: TypeKey, config: &Config, owner: Option<&Component>) -> ActiveResult<Option<Pick>> {
        let url = config.url()?;
        let mut best: Option<Pick> = None;
        for candidate in self.candidates(base) {
            let Some(provider) = self.provider_of(candidate) else {
                continue;
            };
            let cx = ProvideContext::new(self, config, url.as_ref(), owner, base, candidate);
            let Some(provision) = provider.provides(&cx) else {
                continue;
            };
            let current = best.as_ref().map_or(0, |p| p.provision.priority);
            if provision.priority > current {
                let implementation = provision.implementation.unwrap_or(candidate);
                best = Some(Pick {
                    provision,
                    implementation,
                });
            }
        }
        if let Some(pick) = &best {
            tracing::debug!(
                base = %self.name_of(base).unwrap_or_default(),
                implementation = %self.name_of(pick.implementation).unwrap_or_default(),
                priority = pick.provision.priority,
                "picked provider"
            );
        }
        Ok(best)
    }

    fn construct(
        &self,
        base: TypeKey,
        mut config: Config,
        pick: Pick,
        owner: Option<&Component>,
    ) -> ActiveResult<Component> {
        let Pick {
            provision,
            implementation,
        } = pick;
        if let Some(opts) = &provision.opts {
            config.merge(opts);
        }
        if let Some(url) = &provision.url {
            config.set("url", Url::parse(url)?.to_string());
        }

        let provider = self
            .provider_of(implementation)
            .ok_or_else(|| ActiveError::Config(format!("unknown implementation {implementation}")))?;
        let share_key = if config.is_shared() {
            provider.shared_key(&config)
        } else {
            None
        };

        let (component, created) = match share_key {
            Some(key) => match self.shared_instance(implementation, &key) {
                Some(existing) => {
                    tracing::trace!(component = %existing, key = %key, "shared instance hit");
                    (existing, false)
                }
                None => {
                    let component = self.instantiate_with(implementation, &config, provider.as_ref())?;
                    component.mark_shared();
                    let winner = self.insert_shared(implementation, key, component.clone());
                    let created = winner.ptr_eq(&component);
                    (winner, created)
                }
            },
            None => {
                let component = self.instantiate_with(implementation, &config, provider.as_ref())?;
                if let Some(owner) = owner {
                    let key = provider
                        .owner_key()
                        .map(str::to_string)
                        .unwrap_or_else(|| lower_first(owner.type_name()));
                    component.set_owner(owner, key);
                }
                (component, true)
            }
        };

        if created && self.merged_schema(base)?.chains() {
            if let Some(next_url) = config.url()?.and_then(|url| url.next) {
                let next_base = provision.base.unwrap_or(base);
                let mut next_config = config.clone();
                next_config.set("url", next_url.to_string());
                let next = self.resolve(next_base, next_config, Some(&component))?;
                component.set_next(&next);
                graph::link(&component, &next);
            }
        }
        Ok(component)
    }

    /// Constructs `ty` directly, bypassing candidate selection and sharing.
    ///
    /// Used for root components that are not requested through a base type.
    pub fn instantiate(&self, ty: TypeKey, config: impl Into<Config>) -> ActiveResult<Component> {
        let provider = self
            .provider_of(ty)
            .ok_or_else(|| ActiveError::Config(format!("unknown type {ty}")))?;
        self.instantiate_with(ty, &config.into(), provider.as_ref())
    }

    fn instantiate_with(&self, ty: TypeKey, config: &Config, provider: &dyn Provider) -> ActiveResult<Component> {
        let config = self.coerce(ty, config, None, true)?;
        let instance = provider.instantiate(&config)?;
        let component = Component::new(self, ty, self.next_iid(ty), config, instance)?;
        tracing::trace!(component = %component, "created component");
        Ok(component)
    }
}

fn describe_target(config: &Config) -> String {
    ["uri", "url", "name"]
        .iter()
        .find_map(|key| config.get(key).filter(|v| !v.is_null()))
        .map(crate::url::scalar_text)
        .unwrap_or_else(|| config.to_value().to_string())
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

//! Component type definitions.

use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::error::ActiveResult;
use crate::key::TypeKey;
use crate::provider::{FactoryProvider, Instance, PlainProvider, Provider};
use crate::schema::Schema;

/// Definition of a component type, registered with
/// [`Registry::define`](crate::Registry::define).
///
/// A type has a name, an optional parent type, its own schema fragment and a
/// [`Provider`] that scores it as a candidate and constructs instances.
/// Types without a provider construct plain components that have no hooks of
/// their own and only manage their sub-components.
///
/// # Examples
///
/// ```rust
/// use ferrous_actives::{Instance, Primitive, Prop, Registry, Schema, TypeDef};
///
/// struct Cache;
/// impl ferrous_actives::Lifecycle for Cache {}
///
/// let registry = Registry::new();
/// let store = registry
///     .define(
///         TypeDef::new("Store")
///             .abstract_type()
///             .schema(Schema::new().prop("url", Prop::value(Primitive::Url).implicit())),
///     )
///     .unwrap();
/// let cache = registry
///     .define(TypeDef::new("CacheStore").extends(store).factory(|_| Ok(Instance::new(Cache))))
///     .unwrap();
/// registry.use_impl(store, cache).unwrap();
/// ```
pub struct TypeDef {
    pub(crate) name: String,
    pub(crate) parent: Option<TypeKey>,
    pub(crate) schema: Schema,
    pub(crate) provider: Arc<dyn Provider>,
    pub(crate) is_abstract: bool,
}

impl TypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            schema: Schema::new(),
            provider: Arc::new(PlainProvider),
            is_abstract: false,
        }
    }

    /// Declares the parent type. Schemas merge along the parent chain and
    /// resolution falls back to the parent when no candidate qualifies.
    pub fn extends(mut self, parent: TypeKey) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    pub fn provider<P: Provider>(mut self, provider: P) -> Self {
        self.provider = Arc::new(provider);
        self
    }

    /// Uses a constructor closure with default scoring and no sharing.
    pub fn factory<F>(self, factory: F) -> Self
    where
        F: Fn(&Config) -> ActiveResult<Instance> + Send + Sync + 'static,
    {
        self.provider(FactoryProvider::new(factory))
    }

    /// Abstract types are never picked as candidates themselves.
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDef")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("schema", &self.schema)
            .field("is_abstract", &self.is_abstract)
            .finish_non_exhaustive()
    }
}

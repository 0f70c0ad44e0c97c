//! Type arena, implementation lists and shared-instance caches.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

#[cfg(feature = "once-cell")]
use once_cell::sync::OnceCell;

use crate::component::Component;
use crate::config::{coerce_config, Config, Environment, ProcessEnv};
use crate::descriptors::TypeDef;
use crate::error::{ActiveError, ActiveResult};
use crate::key::TypeKey;
use crate::provider::Provider;
use crate::schema::{MergedSchema, Schema};

/// One defined type.
pub(crate) struct TypeEntry {
    pub(crate) name: String,
    pub(crate) parent: Option<TypeKey>,
    pub(crate) schema: Schema,
    pub(crate) provider: Arc<dyn Provider>,
    pub(crate) is_abstract: bool,
    /// Implementations registered with `use_impl`, in registration order
    pub(crate) implementations: Vec<TypeKey>,
    pub(crate) next_iid: AtomicU64,
    /// Memoized merge of the schema fragments along the ancestry
    #[cfg(feature = "once-cell")]
    pub(crate) merged: OnceCell<Arc<MergedSchema>>,
    #[cfg(not(feature = "once-cell"))]
    pub(crate) merged: Mutex<Option<Arc<MergedSchema>>>,
}

#[derive(Default)]
pub(crate) struct TypeArena {
    entries: Vec<TypeEntry>,
    by_name: HashMap<String, TypeKey>,
}

impl TypeArena {
    fn get(&self, ty: TypeKey) -> Option<&TypeEntry> {
        self.entries.get(ty.0)
    }

    /// Whether `ty` descends from `ancestor` (strictly).
    fn descends_from(&self, ty: TypeKey, ancestor: TypeKey) -> bool {
        let mut cur = self.get(ty).and_then(|e| e.parent);
        while let Some(key) = cur {
            if key == ancestor {
                return true;
            }
            cur = self.get(key).and_then(|e| e.parent);
        }
        false
    }

    /// Ancestry of `ty`, root first.
    fn lineage(&self, ty: TypeKey) -> Vec<TypeKey> {
        let mut chain = Vec::new();
        let mut cur = Some(ty);
        while let Some(key) = cur {
            chain.push(key);
            cur = self.get(key).and_then(|e| e.parent);
        }
        chain.reverse();
        chain
    }

    /// Depth-first, de-duplicated transitive implementations of `ty`.
    fn collect_implementations(&self, ty: TypeKey, all: &mut Vec<TypeKey>) {
        if let Some(entry) = self.get(ty) {
            for &implementation in &entry.implementations {
                if !all.contains(&implementation) {
                    all.push(implementation);
                    self.collect_implementations(implementation, all);
                }
            }
        }
    }

    fn merge_schema(&self, ty: TypeKey) -> ActiveResult<MergedSchema> {
        let name = self.get(ty).map(|e| e.name.as_str()).unwrap_or_default();
        let lineage = self.lineage(ty);
        let fragments = lineage.iter().filter_map(|&key| self.get(key)).map(|e| &e.schema);
        MergedSchema::merge(name, fragments, |type_name| self.by_name.get(type_name).copied())
    }
}

pub(crate) struct RegistryInner {
    pub(crate) types: RwLock<TypeArena>,
    /// Shared instances per implementation type, keyed by the provider's
    /// shared key
    pub(crate) shared: Mutex<HashMap<TypeKey, HashMap<String, Component>>>,
    pub(crate) env: Arc<dyn Environment>,
}

/// Registry of component types.
///
/// The registry owns the type arena, the implementation lists consulted by
/// [`provide`](Registry::provide), the shared-instance caches and the
/// [`Environment`] used during coercion. Cloning is cheap and yields a handle
/// to the same registry; separate registries are fully isolated.
///
/// # Examples
///
/// ```rust
/// use ferrous_actives::{MapEnv, Prop, Primitive, Registry, Schema, TypeDef};
/// use serde_json::json;
///
/// let registry = Registry::with_env(MapEnv::new().with("DB_PORT", "6543"));
/// let db = registry
///     .define(TypeDef::new("Db").schema(
///         Schema::new().prop("port", Prop::value(Primitive::Int).env("DB_PORT").default(json!(5432))),
///     ))
///     .unwrap();
///
/// let config = registry.coerce(db, &json!({}).into(), None, false).unwrap();
/// assert_eq!(config.get("port"), Some(&json!(6543)));
/// ```
#[derive(Clone)]
pub struct Registry {
    pub(crate) inner: Arc<RegistryInner>,
}

impl Registry {
    /// Creates a registry reading the process environment.
    pub fn new() -> Self {
        Self::with_env(ProcessEnv)
    }

    pub fn with_env<E: Environment + 'static>(env: E) -> Self {
        Self::with_environment(Arc::new(env))
    }

    pub fn with_environment(env: Arc<dyn Environment>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                types: RwLock::new(TypeArena::default()),
                shared: Mutex::new(HashMap::new()),
                env,
            }),
        }
    }

    pub fn environment(&self) -> &Arc<dyn Environment> {
        &self.inner.env
    }

    /// Adds a type to the arena.
    ///
    /// # Errors
    ///
    /// [`ActiveError::Config`] when the name is already taken or the parent
    /// key is unknown.
    pub fn define(&self, def: TypeDef) -> ActiveResult<TypeKey> {
        let mut types = self.inner.types.write();
        if types.by_name.contains_key(&def.name) {
            return Err(ActiveError::Config(format!("type {:?} is already defined", def.name)));
        }
        if let Some(parent) = def.parent {
            if types.get(parent).is_none() {
                return Err(ActiveError::Config(format!(
                    "{}: unknown parent type {parent}",
                    def.name
                )));
            }
        }
        let key = TypeKey(types.entries.len());
        tracing::debug!(name = %def.name, ?key, "defined type");
        types.by_name.insert(def.name.clone(), key);
        types.entries.push(TypeEntry {
            name: def.name,
            parent: def.parent,
            schema: def.schema,
            provider: def.provider,
            is_abstract: def.is_abstract,
            implementations: Vec::new(),
            next_iid: AtomicU64::new(1),
            #[cfg(feature = "once-cell")]
            merged: OnceCell::new(),
            #[cfg(not(feature = "once-cell"))]
            merged: Mutex::new(None),
        });
        Ok(key)
    }

    /// Registers `implementation` as a candidate when resolving `base`.
    ///
    /// Registration is idempotent and transitive: implementations registered
    /// for `implementation` become candidates for `base` as well.
    ///
    /// # Errors
    ///
    /// [`ActiveError::Config`] unless `implementation` strictly descends from
    /// `base`.
    pub fn use_impl(&self, base: TypeKey, implementation: TypeKey) -> ActiveResult<()> {
        let mut types = self.inner.types.write();
        if !types.descends_from(implementation, base) {
            let name = |key| types.get(key).map(|e: &TypeEntry| e.name.clone()).unwrap_or_default();
            return Err(ActiveError::Config(format!(
                "implementation {} must be a subtype of {}",
                name(implementation),
                name(base)
            )));
        }
        if let Some(entry) = types.entries.get_mut(base.0) {
            if !entry.implementations.contains(&implementation) {
                entry.implementations.push(implementation);
            }
        }
        Ok(())
    }

    /// Removes `implementation` from the candidates of `base`. Returns
    /// whether it was registered.
    pub fn unuse_impl(&self, base: TypeKey, implementation: TypeKey) -> bool {
        let mut types = self.inner.types.write();
        match types.entries.get_mut(base.0) {
            Some(entry) => {
                let before = entry.implementations.len();
                entry.implementations.retain(|&k| k != implementation);
                entry.implementations.len() != before
            }
            None => false,
        }
    }

    /// The transitive implementations of `ty`, depth first.
    pub fn implementations(&self, ty: TypeKey) -> Vec<TypeKey> {
        let types = self.inner.types.read();
        let mut all = Vec::new();
        types.collect_implementations(ty, &mut all);
        all
    }

    /// `ty` followed by its transitive implementations, without abstract
    /// types.
    pub(crate) fn candidates(&self, ty: TypeKey) -> Vec<TypeKey> {
        let types = self.inner.types.read();
        let mut all = vec![ty];
        types.collect_implementations(ty, &mut all);
        all.retain(|&key| types.get(key).map_or(false, |e| !e.is_abstract));
        all
    }

    pub fn type_named(&self, name: &str) -> Option<TypeKey> {
        self.inner.types.read().by_name.get(name).copied()
    }

    pub fn name_of(&self, ty: TypeKey) -> Option<String> {
        self.inner.types.read().get(ty).map(|e| e.name.clone())
    }

    pub fn parent_of(&self, ty: TypeKey) -> Option<TypeKey> {
        self.inner.types.read().get(ty).and_then(|e| e.parent)
    }

    pub fn is_abstract(&self, ty: TypeKey) -> bool {
        self.inner.types.read().get(ty).map_or(false, |e| e.is_abstract)
    }

    pub(crate) fn provider_of(&self, ty: TypeKey) -> Option<Arc<dyn Provider>> {
        self.inner.types.read().get(ty).map(|e| e.provider.clone())
    }

    pub(crate) fn next_iid(&self, ty: TypeKey) -> u64 {
        self.inner
            .types
            .read()
            .get(ty)
            .map_or(0, |e| e.next_iid.fetch_add(1, Ordering::Relaxed))
    }

    /// The merged schema of `ty`, memoized after the first success.
    ///
    /// # Errors
    ///
    /// [`ActiveError::Config`] when a property has no type or names an
    /// undefined component type.
    pub fn merged_schema(&self, ty: TypeKey) -> ActiveResult<Arc<MergedSchema>> {
        let types = self.inner.types.read();
        let entry = types
            .get(ty)
            .ok_or_else(|| ActiveError::Config(format!("unknown type {ty}")))?;

        #[cfg(feature = "once-cell")]
        {
            entry
                .merged
                .get_or_try_init(|| types.merge_schema(ty).map(Arc::new))
                .map(Arc::clone)
        }
        #[cfg(not(feature = "once-cell"))]
        {
            let mut merged = entry.merged.lock();
            if let Some(schema) = merged.as_ref() {
                return Ok(schema.clone());
            }
            let schema = Arc::new(types.merge_schema(ty)?);
            *merged = Some(schema.clone());
            Ok(schema)
        }
    }

    /// Coerces `config` for `ty`.
    ///
    /// `key` is recorded as `$key` and feeds the `name` property; with
    /// `include_unknown` keys outside the schema are carried over.
    pub fn coerce(
        &self,
        ty: TypeKey,
        config: &Config,
        key: Option<&str>,
        include_unknown: bool,
    ) -> ActiveResult<Config> {
        if config.is_coerced_for(ty) {
            return Ok(config.clone());
        }
        let schema = self.merged_schema(ty)?;
        coerce_config(ty, &schema, config, key, include_unknown, self.inner.env.as_ref())
    }

    /// The shared instance of `ty` cached under `key`.
    pub fn shared_instance(&self, ty: TypeKey, key: &str) -> Option<Component> {
        self.inner.shared.lock().get(&ty).and_then(|m| m.get(key)).cloned()
    }

    /// Caches `component` unless another instance won the race for `key`;
    /// returns the cached instance.
    pub(crate) fn insert_shared(&self, ty: TypeKey, key: String, component: Component) -> Component {
        self.inner
            .shared
            .lock()
            .entry(ty)
            .or_default()
            .entry(key)
            .or_insert(component)
            .clone()
    }

    /// Drops every cached shared instance.
    pub fn clear_shared(&self) {
        self.inner.shared.lock().clear();
    }

    pub(crate) fn downgrade(&self) -> Weak<RegistryInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(inner: &Weak<RegistryInner>) -> Option<Registry> {
        inner.upgrade().map(|inner| Registry { inner })
    }

    /// Renders every defined type with its parent and implementations.
    #[cfg(feature = "diagnostics")]
    pub fn describe(&self) -> String {
        let types = self.inner.types.read();
        let mut out = String::new();
        for entry in &types.entries {
            let parent = entry
                .parent
                .and_then(|p| types.get(p))
                .map(|p| format!(" : {}", p.name))
                .unwrap_or_default();
            let implementations: Vec<_> = entry
                .implementations
                .iter()
                .filter_map(|&k| types.get(k))
                .map(|e| e.name.as_str())
                .collect();
            out.push_str(&entry.name);
            out.push_str(&parent);
            if entry.is_abstract {
                out.push_str(" (abstract)");
            }
            if !implementations.is_empty() {
                out.push_str(" <- ");
                out.push_str(&implementations.join(", "));
            }
            out.push('\n');
        }
        out
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.inner.types.read().entries.len())
            .field("env", &self.inner.env)
            .finish_non_exhaustive()
    }
}

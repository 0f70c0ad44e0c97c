//! Environment lookup used for config interpolation and `env` overrides.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;

/// Source of environment variables.
///
/// The registry consults its environment when a property declares an `env`
/// override and when `${NAME}` markers in config strings cannot be resolved
/// from the config itself.
pub trait Environment: Send + Sync + fmt::Debug {
    /// Looks up a variable by exact name.
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// An in-memory environment.
///
/// ```rust
/// use ferrous_actives::{Environment, MapEnv};
///
/// let env = MapEnv::new().with("DB_PORT", "5432");
/// assert_eq!(env.var("DB_PORT").as_deref(), Some("5432"));
/// env.remove("DB_PORT");
/// assert!(env.var("DB_PORT").is_none());
/// ```
#[derive(Debug, Default)]
pub struct MapEnv {
    vars: RwLock<HashMap<String, String>>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.write().insert(name.into(), value.into());
    }

    pub fn remove(&self, name: &str) -> Option<String> {
        self.vars.write().remove(name)
    }
}

impl Environment for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.read().get(name).cloned()
    }
}

impl<K, V> FromIterator<(K, V)> for MapEnv
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let vars = iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { vars: RwLock::new(vars) }
    }
}

//! Component configuration.
//!
//! A [`Config`] is an ordered map of JSON values, optionally carrying an
//! implicit scalar (a config given as a bare string such as a URL) and a tag
//! recording which type it was coerced for. Coercion against a type's merged
//! schema is performed by [`Registry::coerce`](crate::Registry::coerce).

mod coerce;
mod env;
mod interpolate;

pub(crate) use coerce::coerce_config;
pub use env::{Environment, MapEnv, ProcessEnv};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{ActiveError, ActiveResult};
use crate::key::TypeKey;
use crate::url::Url;

/// Key holding the name a config was declared under.
pub const KEY: &str = "$key";

/// Configuration for a component.
///
/// # Examples
///
/// ```rust
/// use ferrous_actives::Config;
/// use serde_json::json;
///
/// let config = Config::from(json!({"url": "http://localhost", "shared": false}));
/// assert_eq!(config.str("url"), Some("http://localhost"));
/// assert!(!config.is_shared());
///
/// let implicit = Config::from("sub://host/a");
/// assert_eq!(implicit.implicit(), Some(&json!("sub://host/a")));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    values: Map<String, Value>,
    implicit: Option<Value>,
    coerced: Option<TypeKey>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// The value at `key` if it is a string.
    pub fn str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Sets a value. Changing a coerced config clears its coerced tag.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.coerced = None;
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.coerced = None;
        self.values.shift_remove(key)
    }

    /// Deep-merges `source` into the values.
    pub fn merge(&mut self, source: &Map<String, Value>) {
        self.coerced = None;
        deep_merge(&mut self.values, source);
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }

    /// The scalar this config was created from, if any.
    pub fn implicit(&self) -> Option<&Value> {
        self.implicit.as_ref()
    }

    /// The key the config was declared under (`$key`).
    pub fn key(&self) -> Option<&str> {
        self.str(KEY)
    }

    /// The `type` selector, if given.
    pub fn type_name(&self) -> Option<&str> {
        self.str("type")
    }

    /// Sharing is enabled unless `shared` is explicitly `false`.
    pub fn is_shared(&self) -> bool {
        self.values.get("shared") != Some(&Value::Bool(false))
    }

    /// The type this config was coerced for.
    pub fn coerced_for(&self) -> Option<TypeKey> {
        self.coerced
    }

    pub fn is_coerced_for(&self, ty: TypeKey) -> bool {
        self.coerced == Some(ty)
    }

    /// Parses the `url` value, if present.
    pub fn url(&self) -> ActiveResult<Option<Url>> {
        match self.values.get("url") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => Url::parse(text).map(Some),
            Some(other) => Err(ActiveError::Url(format!("expected URL text, found {other}"))),
        }
    }

    /// Deserializes the config into a typed struct.
    ///
    /// ```rust
    /// use ferrous_actives::Config;
    /// use serde::Deserialize;
    /// use serde_json::json;
    ///
    /// #[derive(Deserialize)]
    /// struct Pool { min: u32, max: u32 }
    ///
    /// let pool: Pool = Config::from(json!({"min": 1, "max": 8})).typed().unwrap();
    /// assert_eq!((pool.min, pool.max), (1, 8));
    /// ```
    pub fn typed<T: DeserializeOwned>(&self) -> ActiveResult<T> {
        serde_json::from_value(Value::Object(self.values.clone())).map_err(|err| ActiveError::Typed {
            type_name: std::any::type_name::<T>().to_string(),
            message: err.to_string(),
        })
    }

    /// The config as a JSON value; an implicit-only config renders as its
    /// scalar.
    pub fn to_value(&self) -> Value {
        match (&self.implicit, self.values.is_empty()) {
            (Some(implicit), true) => implicit.clone(),
            _ => Value::Object(self.values.clone()),
        }
    }

    /// Replaces a value without dropping the coerced tag.
    pub(crate) fn replace(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    pub(crate) fn tagged(values: Map<String, Value>, ty: TypeKey) -> Self {
        Self {
            values,
            implicit: None,
            coerced: Some(ty),
        }
    }
}

impl From<Value> for Config {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(values) => Self::from(values),
            Value::Null => Self::default(),
            scalar => Self {
                implicit: Some(scalar),
                ..Self::default()
            },
        }
    }
}

impl From<Map<String, Value>> for Config {
    fn from(values: Map<String, Value>) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }
}

impl From<&str> for Config {
    fn from(text: &str) -> Self {
        Self::from(Value::String(text.to_string()))
    }
}

impl From<String> for Config {
    fn from(text: String) -> Self {
        Self::from(Value::String(text))
    }
}

/// Deep-merges `source` into `target`.
///
/// Nested objects merge recursively, a null in `source` deletes the key and
/// anything else replaces the target value.
pub fn deep_merge(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        match value {
            Value::Null => {
                target.shift_remove(key);
            }
            Value::Object(nested) => match target.get_mut(key) {
                Some(Value::Object(existing)) => deep_merge(existing, nested),
                _ => {
                    target.insert(key.clone(), value.clone());
                }
            },
            other => {
                target.insert(key.clone(), other.clone());
            }
        }
    }
}

/// Loose truthiness: null, false, zero and the empty string are false.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_become_implicit() {
        let config = Config::from(json!(42));
        assert!(config.values().is_empty());
        assert_eq!(config.implicit(), Some(&json!(42)));
        assert_eq!(config.to_value(), json!(42));
        assert_eq!(Config::from(Value::Null), Config::new());
    }

    #[test]
    fn deep_merge_semantics() {
        let mut target = json!({"a": {"b": 1, "c": 2}, "d": 3, "e": 4});
        let source = json!({"a": {"c": 5}, "d": null, "e": [1]});
        if let (Value::Object(t), Value::Object(s)) = (&mut target, &source) {
            deep_merge(t, s);
        }
        assert_eq!(target, json!({"a": {"b": 1, "c": 5}, "e": [1]}));
    }

    #[test]
    fn sharing_defaults_on() {
        assert!(Config::new().is_shared());
        assert!(Config::new().with("shared", true).is_shared());
        assert!(Config::new().with("shared", "no").is_shared());
        assert!(!Config::new().with("shared", false).is_shared());
    }

    #[test]
    fn typed_errors_name_the_target() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Port {
            port: u16,
        }
        let err = Config::new().with("port", "http").typed::<Port>().unwrap_err();
        assert!(matches!(err, ActiveError::Typed { ref type_name, .. } if type_name.contains("Port")));
    }

    #[test]
    fn url_accessor() {
        let config = Config::new().with("url", "http://localhost:8080/x");
        let url = config.url().unwrap().unwrap();
        assert_eq!(url.port(), Some(8080));
        assert!(Config::new().url().unwrap().is_none());
        assert!(Config::new().with("url", 7).url().is_err());
    }
}

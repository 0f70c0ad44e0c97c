//! Normalization of raw configuration against a merged schema.

use serde_json::{Map, Number, Value};

use super::env::Environment;
use super::interpolate::interpolate;
use super::{deep_merge, truthy, Config, KEY};
use crate::error::{ActiveError, ActiveResult};
use crate::schema::{MergedSchema, Primitive, ResolvedProp};
use crate::key::TypeKey;
use crate::url::{scalar_text, Url};

/// Coerces `raw` for the type `ty` whose merged schema is `schema`.
///
/// For every property the value is taken from, in order: the implicit scalar
/// (for `implicit` properties), the environment override, the raw config,
/// the declaration key (for `name` and `key` properties), the default, and
/// finally null. Strings are interpolated, URL properties are parsed and
/// their query is merged into the result. A config already coerced for `ty`
/// is returned unchanged.
pub(crate) fn coerce_config(
    ty: TypeKey,
    schema: &MergedSchema,
    raw: &Config,
    key: Option<&str>,
    include_unknown: bool,
    env: &dyn Environment,
) -> ActiveResult<Config> {
    if raw.is_coerced_for(ty) {
        return Ok(raw.clone());
    }

    let implicit = raw.implicit().filter(|value| truthy(value));
    let mut source = raw.values().clone();
    let mut coerced = Map::new();
    if let Some(key) = key {
        source.insert(KEY.to_string(), Value::String(key.to_string()));
        coerced.insert(KEY.to_string(), Value::String(key.to_string()));
    }
    let lookup = |name: &str| {
        source
            .get(name)
            .map(scalar_text)
            .or_else(|| env.var(name))
    };

    for (name, prop) in schema.iter() {
        let env_value = match &prop.env {
            Some(template) => {
                let var = interpolate(template, lookup)?.to_uppercase();
                env.var(&var)
                    .filter(|value| !value.is_empty())
                    .map(|value| env_override(&value, prop))
            }
            None => None,
        };

        let mut value = match (prop.implicit, implicit, env_value) {
            (true, Some(implicit), _) => implicit.clone(),
            (_, _, Some(value)) => value,
            _ => match source.get(name) {
                Some(value) => value.clone(),
                None => match source.get(KEY) {
                    Some(declared) if name == "name" || prop.key => declared.clone(),
                    _ => prop.default.clone().unwrap_or(Value::Null),
                },
            },
        };

        if let Value::String(text) = &value {
            if text.contains("${") {
                value = Value::String(interpolate(text, lookup)?);
            }
        }

        if prop.is_url() && truthy(&value) {
            let url = match &value {
                Value::String(text) => Url::parse(text)?,
                other => {
                    return Err(ActiveError::Url(format!(
                        "{name}: expected URL text, found {other}"
                    )))
                }
            };
            deep_merge(&mut coerced, &url.query);
            if !coerced.get("name").map(truthy).unwrap_or(false) {
                if let Some(scheme) = &url.scheme {
                    coerced.insert("name".to_string(), Value::String(scheme.clone()));
                }
            }
            value = Value::String(url.to_string());
        }

        if !coerced.contains_key(name) || !value.is_null() {
            coerced.insert(name.to_string(), value);
        }
    }

    if include_unknown {
        for (name, value) in &source {
            if !schema.contains(name) {
                coerced.insert(name.clone(), value.clone());
            }
        }
    }

    tracing::trace!(?ty, keys = coerced.len(), "coerced config");
    Ok(Config::tagged(coerced, ty))
}

/// Converts environment text to the property's primitive type, falling back
/// to the text when it does not parse.
fn env_override(text: &str, prop: &ResolvedProp) -> Value {
    match prop.primitive() {
        Some(Primitive::Boolean) => {
            let lower = text.trim().to_ascii_lowercase();
            Value::Bool(matches!(lower.as_str(), "1" | "y" | "yes" | "true"))
        }
        Some(Primitive::Int) => match leading_int(text) {
            Some(int) => Value::Number(int.into()),
            None => Value::String(text.to_string()),
        },
        Some(Primitive::Float) | Some(Primitive::Number) => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(text.to_string())),
        _ => Value::String(text.to_string()),
    }
}

/// Parses an optionally signed run of leading digits.
fn leading_int(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let sign_len = usize::from(text.starts_with(&['+', '-'][..]));
    let digits = text[sign_len..]
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len() - sign_len);
    if digits == 0 {
        return None;
    }
    text[..sign_len + digits].parse().ok()
}

//! `${name}` and `${name:default}` substitution.

use crate::error::{ActiveError, ActiveResult};

/// Replaces every `${name}` or `${name:default}` marker in `template`.
///
/// Names are made of word characters and `$`. `lookup` is consulted first;
/// when it has no value the default is used with `\n`, `\r` and `\t`
/// unescaped (any other escaped character stands for itself). A marker with
/// no value and no default is a format error. Text that does not form a
/// complete marker is copied as-is.
pub(crate) fn interpolate<F>(template: &str, lookup: F) -> ActiveResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match parse_marker(after) {
            Some(marker) => {
                match lookup(marker.name) {
                    Some(value) => out.push_str(&value),
                    None => match marker.default {
                        Some(default) => out.push_str(&default),
                        None => {
                            return Err(ActiveError::Format {
                                variable: marker.name.to_string(),
                                template: template.to_string(),
                            })
                        }
                    },
                }
                rest = &after[marker.len..];
            }
            None => {
                out.push_str("${");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

struct Marker<'a> {
    name: &'a str,
    default: Option<String>,
    /// Bytes consumed after the opening `${`, including the closing brace.
    len: usize,
}

fn parse_marker(text: &str) -> Option<Marker<'_>> {
    let name_len = text
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .unwrap_or(text.len());
    if name_len == 0 {
        return None;
    }
    let name = &text[..name_len];
    let mut chars = text[name_len..].char_indices();
    match chars.next() {
        Some((_, '}')) => Some(Marker { name, default: None, len: name_len + 1 }),
        Some((_, ':')) => {
            let mut default = String::new();
            while let Some((offset, c)) = chars.next() {
                match c {
                    '}' => {
                        return Some(Marker {
                            name,
                            default: Some(default),
                            len: name_len + offset + 1,
                        })
                    }
                    '{' => return None,
                    '\\' => {
                        let (_, escaped) = chars.next()?;
                        default.push(match escaped {
                            'n' => '\n',
                            'r' => '\r',
                            't' => '\t',
                            other => other,
                        });
                    }
                    other => default.push(other),
                }
            }
            None
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(name: &str) -> Option<String> {
        match name {
            "HOST" => Some("db.local".to_string()),
            "$key" => Some("primary".to_string()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_known_variables() {
        assert_eq!(interpolate("tcp://${HOST}:5432", vars).unwrap(), "tcp://db.local:5432");
        assert_eq!(interpolate("${$key}-db", vars).unwrap(), "primary-db");
        assert_eq!(interpolate("plain", vars).unwrap(), "plain");
    }

    #[test]
    fn defaults_and_escapes() {
        assert_eq!(interpolate("${PORT:8080}", vars).unwrap(), "8080");
        assert_eq!(interpolate("${SEP:a\\tb\\n}", vars).unwrap(), "a\tb\n");
        assert_eq!(interpolate("${SEP:\\}x}", vars).unwrap(), "}x");
        assert_eq!(interpolate("[${EMPTY:}]", vars).unwrap(), "[]");
        assert_eq!(interpolate("${HOST:ignored}", vars).unwrap(), "db.local");
    }

    #[test]
    fn missing_without_default_is_format_error() {
        let err = interpolate("/data/${HOME_DIR}", vars).unwrap_err();
        match err {
            ActiveError::Format { variable, template } => {
                assert_eq!(variable, "HOME_DIR");
                assert_eq!(template, "/data/${HOME_DIR}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn incomplete_markers_are_literal() {
        assert_eq!(interpolate("cost: ${", vars).unwrap(), "cost: ${");
        assert_eq!(interpolate("${-x}", vars).unwrap(), "${-x}");
        assert_eq!(interpolate("${HOST", vars).unwrap(), "${HOST");
    }
}

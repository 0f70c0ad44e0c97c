//! Query-string encoding with dotted and bracketed nested keys.
//!
//! `a.b=1` nests objects, `a[]=1` appends to arrays, `a[2]=1` assigns an
//! index and `a[].b=1` appends an object to an array. An index more than
//! twenty slots past the end of its array appends instead.

use serde_json::{Map, Number, Value};

/// Parses a query string into a nested map.
///
/// Values are normalized: numeric text becomes a number, `true`/`yes` and
/// `false`/`no` (case-insensitive) become booleans and `null` becomes null.
///
/// ```rust
/// use ferrous_actives::url::parse_query;
/// use serde_json::json;
///
/// let query = parse_query("a[].b=3&a[].b=4");
/// assert_eq!(serde_json::Value::Object(query), json!({"a": [{"b": 3}, {"b": 4}]}));
/// ```
pub fn parse_query(query: &str) -> Map<String, Value> {
    let mut root = Value::Object(Map::new());
    if query.is_empty() {
        return Map::new();
    }
    for part in query.split('&') {
        let (keypath, raw) = match part.find('=') {
            Some(index) => (&part[..index], &part[index + 1..]),
            None => (part, ""),
        };
        let keypath = decode(keypath);
        let value = normalize_value(&decode(raw));
        assign(&mut root, &keypath, value);
    }
    match root {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Formats a nested map back into a query string.
///
/// Only values are percent-encoded; keys are written as given.
///
/// ```rust
/// use ferrous_actives::url::{format_query, parse_query};
///
/// assert_eq!(format_query(&parse_query("a.b=1&b=2")), "a.b=1&b=2");
/// ```
pub fn format_query(query: &Map<String, Value>) -> String {
    let mut list = Vec::new();
    let mut path = Vec::new();
    for (key, item) in query {
        path.push(Segment::Key(key.as_str()));
        format_value(&mut list, item, &mut path);
        path.pop();
    }
    list.join("&")
}

enum Segment<'a> {
    Key(&'a str),
    Append,
}

fn format_value<'a>(list: &mut Vec<String>, value: &'a Value, path: &mut Vec<Segment<'a>>) {
    match value {
        Value::Object(map) => {
            for (key, item) in map {
                path.push(Segment::Key(key.as_str()));
                format_value(list, item, path);
                path.pop();
            }
        }
        Value::Array(items) => {
            for item in items {
                path.push(Segment::Append);
                format_value(list, item, path);
                path.pop();
            }
        }
        scalar => {
            let mut key = String::new();
            for segment in path.iter() {
                match segment {
                    Segment::Key(k) => {
                        if !key.is_empty() {
                            key.push('.');
                        }
                        key.push_str(k);
                    }
                    Segment::Append => key.push_str("[]"),
                }
            }
            list.push(format!("{}={}", key, encode(&scalar_text(scalar))));
        }
    }
}

pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

enum Slot {
    Key(String),
    Index(Option<usize>),
}

fn assign(root: &mut Value, keypath: &str, value: Value) {
    let mut cur = root;
    let mut pending: Option<Slot> = None;
    for part in keypath.split('.') {
        let (name, index) = split_index(part);
        if let Some(slot) = pending.take() {
            cur = step(cur, slot, || Value::Object(Map::new()));
        }
        match index {
            None => pending = Some(Slot::Key(name.to_string())),
            Some(index) => {
                cur = step(cur, Slot::Key(name.to_string()), || Value::Array(Vec::new()));
                if !cur.is_array() {
                    *cur = Value::Array(Vec::new());
                }
                pending = Some(Slot::Index(index));
            }
        }
    }
    match pending {
        Some(Slot::Key(key)) => {
            if !cur.is_object() {
                *cur = Value::Object(Map::new());
            }
            if let Value::Object(map) = cur {
                map.insert(key, value);
            }
        }
        Some(Slot::Index(index)) => {
            if let Value::Array(items) = cur {
                let index = index_slot(items, index);
                items[index] = value;
            }
        }
        None => {}
    }
}

/// Descends one step, creating the container when the slot is empty.
fn step(cur: &mut Value, slot: Slot, create: impl Fn() -> Value) -> &mut Value {
    match slot {
        Slot::Key(key) => {
            if !cur.is_object() {
                *cur = Value::Object(Map::new());
            }
            match cur {
                Value::Object(map) => {
                    let entry = map.entry(key).or_insert_with(&create);
                    if entry.is_null() {
                        *entry = create();
                    }
                    entry
                }
                _ => unreachable!("container was just replaced with an object"),
            }
        }
        Slot::Index(index) => {
            if !cur.is_array() {
                *cur = Value::Array(Vec::new());
            }
            match cur {
                Value::Array(items) => {
                    let index = index_slot(items, index);
                    let item = &mut items[index];
                    if item.is_null() {
                        *item = create();
                    }
                    item
                }
                _ => unreachable!("container was just replaced with an array"),
            }
        }
    }
}

/// Widest run of nulls an explicit index may open past the end of an array.
const MAX_INDEX_GAP: usize = 20;

/// Makes room for `index` and returns the position to write. A missing
/// index, or one too far past the end, appends.
fn index_slot(items: &mut Vec<Value>, index: Option<usize>) -> usize {
    match index {
        Some(index) if index < items.len() => index,
        Some(index) if index - items.len() <= MAX_INDEX_GAP => {
            items.resize(index + 1, Value::Null);
            index
        }
        _ => {
            items.push(Value::Null);
            items.len() - 1
        }
    }
}

/// Splits `name[3]` into `("name", Some(Some(3)))` and `name[]` into
/// `("name", Some(None))`.
fn split_index(part: &str) -> (&str, Option<Option<usize>>) {
    if let Some(stripped) = part.strip_suffix(']') {
        if let Some(open) = stripped.rfind('[') {
            let digits = &stripped[open + 1..];
            if digits.is_empty() {
                return (&stripped[..open], Some(None));
            }
            if let Ok(index) = digits.parse::<usize>() {
                return (&stripped[..open], Some(Some(index)));
            }
        }
    }
    (part, None)
}

/// Normalizes query text into a typed value.
pub(crate) fn normalize_value(text: &str) -> Value {
    if is_numeric(text) {
        if let Ok(int) = text.parse::<i64>() {
            return Value::Number(int.into());
        }
        if let Ok(float) = text.parse::<f64>() {
            if float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
                return Value::Number((float as i64).into());
            }
            if let Some(number) = Number::from_f64(float) {
                return Value::Number(number);
            }
        }
    }
    let lower = text.to_ascii_lowercase();
    match lower.as_str() {
        "true" | "yes" => Value::Bool(true),
        "false" | "no" => Value::Bool(false),
        _ if text == "null" => Value::Null,
        _ => Value::String(text.to_string()),
    }
}

fn is_numeric(text: &str) -> bool {
    let body = text.strip_prefix(&['+', '-'][..]).unwrap_or(text);
    let (mantissa, exponent) = match body.find(&['e', 'E'][..]) {
        Some(index) => (&body[..index], Some(&body[index + 1..])),
        None => (body, None),
    };
    let digits_or_dots = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit() || c == '.');
    if !digits_or_dots(mantissa) || !mantissa.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    match exponent {
        None => true,
        Some(exp) => digits_or_dots(exp.strip_prefix(&['+', '-'][..]).unwrap_or(exp)),
    }
}

/// Percent-decodes text, leaving malformed escapes untouched.
pub fn decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = |b: u8| (b as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Percent-encodes everything except the URI component unreserved set.
pub fn encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' => out.push(byte as char),
            b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parsed(text: &str) -> Value {
        Value::Object(parse_query(text))
    }

    #[test]
    fn nested_round_trips() {
        let cases = [
            ("a=1&b=2", json!({"a": 1, "b": 2})),
            ("a.b=1&b=2", json!({"a": {"b": 1}, "b": 2})),
            ("a.b[]=3&b=2", json!({"a": {"b": [3]}, "b": 2})),
            ("a[]=3&a[]=4", json!({"a": [3, 4]})),
            ("a[].b=3&a[].b=4", json!({"a": [{"b": 3}, {"b": 4}]})),
            ("a.b=3&a.c=4", json!({"a": {"b": 3, "c": 4}})),
            ("a.b.c.d=5", json!({"a": {"b": {"c": {"d": 5}}}})),
        ];
        for (text, expected) in cases {
            assert_eq!(parsed(text), expected, "parsing {text}");
            assert_eq!(format_query(&parse_query(text)), text, "formatting {text}");
        }
    }

    #[test]
    fn explicit_indexes() {
        assert_eq!(parsed("a[1]=x&a[0]=y"), json!({"a": ["y", "x"]}));
        assert_eq!(parsed("a[2]=x"), json!({"a": [null, null, "x"]}));
    }

    #[test]
    fn distant_indexes_append() {
        assert_eq!(parsed("a[18446744073709551615]=1"), json!({"a": [1]}));
        assert_eq!(parsed("a[0]=x&a[1000000000]=y"), json!({"a": ["x", "y"]}));
        assert_eq!(
            parsed("a[18446744073709551615].b=1&a[18446744073709551615].b=2"),
            json!({"a": [{"b": 1}, {"b": 2}]})
        );
    }

    #[test]
    fn value_normalization() {
        assert_eq!(normalize_value("1.5"), json!(1.5));
        assert_eq!(normalize_value("-3"), json!(-3));
        assert_eq!(normalize_value("Yes"), json!(true));
        assert_eq!(normalize_value("no"), json!(false));
        assert_eq!(normalize_value("null"), Value::Null);
        assert_eq!(normalize_value("1.2.3"), json!("1.2.3"));
        assert_eq!(normalize_value("abc"), json!("abc"));
        assert_eq!(normalize_value(""), json!(""));
    }

    #[test]
    fn percent_coding() {
        assert_eq!(encode("a b/c"), "a%20b%2Fc");
        assert_eq!(decode("a%20b%2Fc"), "a b/c");
        assert_eq!(decode("100%"), "100%");
        assert_eq!(parsed("name=hello%20world"), json!({"name": "hello world"}));
    }
}

/// URL and query encoding tests

use ferrous_actives::url::{format_query, parse_query, FormatOptions, Url};
use proptest::prelude::*;
use serde_json::{json, Value};

#[test]
fn test_query_round_trip() {
    assert_eq!(format_query(&parse_query("a.b=1&b=2")), "a.b=1&b=2");
}

#[test]
fn test_bracketed_arrays_of_objects() {
    let query = parse_query("a[].b=3&a[].b=4");
    assert_eq!(Value::Object(query), json!({"a": [{"b": 3}, {"b": 4}]}));
}

#[test]
fn test_query_values_are_normalized() {
    let query = parse_query("n=12&f=1.5&t=Yes&o=no&z=null&s=hello%20world");
    assert_eq!(
        Value::Object(query),
        json!({"n": 12, "f": 1.5, "t": true, "o": false, "z": null, "s": "hello world"})
    );
}

#[test]
fn test_out_of_range_index_appends() {
    let query = parse_query("a[18446744073709551615]=1");
    assert_eq!(Value::Object(query), json!({"a": [1]}));

    let url = Url::parse("x://h?a[0]=x&a[99999999999]=y").unwrap();
    assert_eq!(Value::Object(url.query), json!({"a": ["x", "y"]}));
}

#[test]
fn test_chain_round_trip() {
    let text = "sub://user:secret@a:1,b:2/x/y?k=v#frag|end://localhost:1234";
    let url = Url::parse(text).unwrap();
    assert_eq!(url.hosts.len(), 2);
    assert_eq!(url.user(), Some("user"));
    assert_eq!(url.fragment.as_deref(), Some("frag"));
    assert_eq!(url.to_string(), text);
}

#[test]
fn test_format_overrides() {
    let url = Url::parse("http://example.com:8080/api?x=1|next://host").unwrap();
    let text = url.format(&FormatOptions::new().scheme("https").without_query().without_next());
    assert_eq!(text, "https://example.com:8080/api");
}

#[test]
fn test_host_rotation_wraps() {
    let mut url = Url::parse("redis://a:1,b:2").unwrap();
    assert_eq!(url.hostname(), Some("a"));
    assert_eq!(url.next_host().and_then(|h| h.name.as_deref()), Some("b"));
    assert_eq!(url.next_host().and_then(|h| h.name.as_deref()), Some("a"));
}

proptest! {
    #[test]
    fn test_flat_queries_round_trip(pairs in prop::collection::btree_map("[a-z]{1,6}", "[a-z]{1,8}", 1..6)) {
        let text = pairs
            .iter()
            .map(|(k, v)| format!("{k}=v{v}"))
            .collect::<Vec<_>>()
            .join("&");
        prop_assert_eq!(format_query(&parse_query(&text)), text);
    }
}

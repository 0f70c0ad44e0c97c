#![no_main]

use ferrous_actives::url::{format_query, parse_query, Url};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Anything that parses must format to something that parses again
    if let Ok(url) = Url::parse(text) {
        let formatted = url.to_string();
        let reparsed = Url::parse(&formatted).expect("formatted url should parse");
        assert_eq!(reparsed.to_string(), formatted);
        let _ = url.path_parts();
    }

    // Query parsing never fails, and its output is stable after one pass
    let query = parse_query(text);
    let once = format_query(&query);
    let twice = format_query(&parse_query(&once));
    assert_eq!(once, twice);
});

#![no_main]

use ferrous_actives::{Config, MapEnv, Primitive, Prop, Registry, Schema, TypeDef};
use libfuzzer_sys::fuzz_target;
use serde_json::{json, Value};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let registry = Registry::with_env(MapEnv::new().with("FUZZ_PORT", "7000"));
    let ty = match registry.define(TypeDef::new("Fuzz").schema(
        Schema::new()
            .prop("name", Prop::value(Primitive::String))
            .prop("url", Prop::value(Primitive::Url).implicit())
            .prop("port", Prop::value(Primitive::Int).env("fuzz_port").default(json!(1)))
            .prop("flag", Prop::value(Primitive::Boolean))
            .prop("extra", Prop::value(Primitive::Any).default(json!({"a": 1}))),
    )) {
        Ok(ty) => ty,
        Err(_) => return,
    };

    // First byte picks the shape, the rest is the payload
    let text = String::from_utf8_lossy(&data[1..]).into_owned();
    let raw: Config = match data[0] % 3 {
        0 => Config::from(text.as_str()),
        1 => match serde_json::from_str::<Value>(&text) {
            Ok(value) => Config::from(value),
            Err(_) => return,
        },
        _ => json!({"name": text, "flag": text.len() % 2 == 0}).into(),
    };

    // Coercion must be idempotent whenever it succeeds
    if let Ok(once) = registry.coerce(ty, &raw, None, true) {
        let untagged = Config::from(once.values().clone());
        if let Ok(again) = registry.coerce(ty, &untagged, None, true) {
            assert_eq!(again.values(), once.values());
        }
    }
});

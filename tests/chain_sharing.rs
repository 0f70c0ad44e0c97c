/// URL chaining and shared instance tests
///
/// `Sub` redirects every `sub://` URL into a shared `end://` component, so
/// several `Sub` instances end up chained to one `End`.

use async_trait::async_trait;
use ferrous_actives::url::FormatOptions;
use ferrous_actives::{
    ActiveResult, Component, Config, HookResult, Instance, Lifecycle, Primitive, Prop,
    ProvideContext, Provider, Provision, Registry, Schema, Status, TypeDef, TypeKey,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

const END_URL: &str = "end://localhost:1234";

// ===== Test Components =====

struct Sub {
    weight: usize,
}

#[async_trait]
impl Lifecycle for Sub {
    async fn on_start(&self, component: &Component) -> HookResult {
        let end = component
            .next()
            .and_then(|next| next.downcast::<End>())
            .ok_or("sub started without an end")?;
        end.total.fetch_add(self.weight, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct End {
    total: AtomicUsize,
}

impl Lifecycle for End {}

struct SubProvider;

impl Provider for SubProvider {
    fn provides(&self, cx: &ProvideContext<'_>) -> Option<Provision> {
        let url = cx.url()?;
        if url.scheme.as_deref() != Some("sub") {
            return None;
        }
        let redirected = url.format(&FormatOptions::new().next(END_URL));
        Some(Provision::new(10).with_url(redirected))
    }

    fn instantiate(&self, config: &Config) -> ActiveResult<Instance> {
        let weight = config.url()?.map_or(0, |url| url.path_parts().len());
        Ok(Instance::new(Sub { weight }))
    }
}

struct EndProvider;

impl Provider for EndProvider {
    fn provides(&self, cx: &ProvideContext<'_>) -> Option<Provision> {
        let scheme = cx.url()?.scheme.as_deref()?;
        (scheme == "end").then(|| Provision::new(10))
    }

    fn shared_key(&self, config: &Config) -> Option<String> {
        config.str("url").map(str::to_string)
    }

    fn instantiate(&self, _config: &Config) -> ActiveResult<Instance> {
        Ok(Instance::new(End::default()))
    }
}

fn registry() -> (Registry, TypeKey, TypeKey, TypeKey) {
    let registry = Registry::new();
    let api = registry
        .define(
            TypeDef::new("Api")
                .abstract_type()
                .schema(Schema::new().prop("url", Prop::value(Primitive::Url).implicit())),
        )
        .unwrap();
    let sub = registry
        .define(TypeDef::new("Sub").extends(api).provider(SubProvider))
        .unwrap();
    let end = registry
        .define(TypeDef::new("End").extends(api).provider(EndProvider))
        .unwrap();
    registry.use_impl(api, sub).unwrap();
    registry.use_impl(api, end).unwrap();
    (registry, api, sub, end)
}

#[test]
fn test_two_subs_share_one_end() {
    let (registry, api, sub, end) = registry();

    let a = registry.provide(api, "sub://localhost:1234/a", None).unwrap();
    let b = registry.provide(api, "sub://localhost:1234/b", None).unwrap();

    assert_eq!(a.type_key(), sub);
    assert_eq!(b.type_key(), sub);
    assert_ne!(a, b);
    assert!(!a.is_shared());

    let end_a = a.next().unwrap();
    let end_b = b.next().unwrap();
    assert_eq!(end_a, end_b);
    assert_eq!(end_a.type_key(), end);
    assert!(end_a.is_shared());
    assert!(end_a.owner().is_none());
    assert_eq!(end_a.prevs(), vec![a.clone(), b.clone()]);
    assert_eq!(end_a.parents(), vec![a.clone(), b.clone()]);
    assert_eq!(registry.shared_instance(end, END_URL), Some(end_a.clone()));

    assert_eq!(a.config().str("url"), Some("sub://localhost:1234/a|end://localhost:1234"));
    assert_eq!(a.config().str("name"), Some("sub"));
}

#[tokio::test]
async fn test_lifecycle_cascades_along_the_chain() {
    let (registry, api, _, _) = registry();
    let a = registry.provide(api, "sub://localhost:1234/a", None).unwrap();
    let b = registry.provide(api, "sub://localhost:1234/b/c", None).unwrap();
    let end = a.next().unwrap();

    a.start().await.unwrap();
    b.start().await.unwrap();
    assert_eq!(end.status(), Status::Started);
    let total = end.downcast::<End>().map(|e| e.total.load(Ordering::SeqCst));
    assert_eq!(total, Some(3));

    a.detach().await.unwrap();
    assert_eq!(end.status(), Status::Detached);
    assert_eq!(b.status(), Status::Started);
    b.detach().await.unwrap();
    assert_eq!(end.status(), Status::Detached);
}

#[test]
fn test_shared_false_opts_out() {
    let (registry, api, _, _) = registry();
    let first = registry.provide(api, END_URL, None).unwrap();
    let again = registry.provide(api, END_URL, None).unwrap();
    let private = registry
        .provide(api, json!({"url": END_URL, "shared": false}), None)
        .unwrap();

    assert_eq!(first, again);
    assert_ne!(first, private);
    assert!(!private.is_shared());
}

#[test]
fn test_unmatched_scheme_names_the_target() {
    let (registry, api, _, _) = registry();
    let err = registry.provide(api, "ftp://files", None).unwrap_err();
    assert_eq!(err.to_string(), "Api: no implementation found for: ftp://files");
}

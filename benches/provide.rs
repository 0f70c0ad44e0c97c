use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ferrous_actives::*;
use serde_json::json;

// ===== Resolution =====

struct Cached;

impl Provider for Cached {
    fn shared_key(&self, config: &Config) -> Option<String> {
        config.str("url").map(str::to_string)
    }

    fn instantiate(&self, _config: &Config) -> ActiveResult<Instance> {
        Ok(Instance::plain())
    }
}

fn service_registry() -> (Registry, TypeKey) {
    let registry = Registry::with_env(MapEnv::new());
    let service = registry
        .define(
            TypeDef::new("Service")
                .abstract_type()
                .schema(
                    Schema::new()
                        .prop("url", Prop::value(Primitive::Url).implicit())
                        .prop("timeout", Prop::value(Primitive::Int).default(json!(30))),
                ),
        )
        .unwrap();
    let cached = registry
        .define(TypeDef::new("CachedService").extends(service).provider(Cached))
        .unwrap();
    registry.use_impl(service, cached).unwrap();
    (registry, service)
}

fn bench_shared_hit(c: &mut Criterion) {
    let (registry, service) = service_registry();
    let _ = registry.provide(service, "svc://primary:7000/", None).unwrap();

    c.bench_function("provide_shared_hit", |b| {
        b.iter(|| {
            let component = registry.provide(service, "svc://primary:7000/", None).unwrap();
            black_box(component);
        })
    });
}

fn bench_fresh_instances(c: &mut Criterion) {
    let (registry, service) = service_registry();

    c.bench_function("provide_unshared", |b| {
        b.iter(|| {
            let config = json!({"url": "svc://primary:7000/", "shared": false});
            let component = registry.provide(service, config, None).unwrap();
            black_box(component);
        })
    });
}

fn bench_candidate_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("candidate_count");
    for count in [1usize, 8, 64] {
        let registry = Registry::with_env(MapEnv::new());
        let base = registry.define(TypeDef::new("Base").abstract_type()).unwrap();
        for i in 0..count {
            let ty = registry
                .define(TypeDef::new(format!("Impl{i}")).extends(base))
                .unwrap();
            registry.use_impl(base, ty).unwrap();
        }
        let target = format!("impl{}", count - 1);
        group.bench_with_input(BenchmarkId::from_parameter(count), &target, |b, target| {
            b.iter(|| {
                let component = registry
                    .provide(base, json!({"type": target, "shared": false}), None)
                    .unwrap();
                black_box(component);
            })
        });
    }
    group.finish();
}

// ===== Coercion =====

fn bench_coerce(c: &mut Criterion) {
    let (registry, service) = service_registry();
    let raw = Config::from(json!({"url": "svc://a:1,b:2/x?pool.max=8&pool.min=1", "extra": true}));

    c.bench_function("coerce_url_config", |b| {
        b.iter(|| black_box(registry.coerce(service, &raw, None, true).unwrap()))
    });
}

// ===== Lifecycle =====

fn bench_start_stop_tree(c: &mut Criterion) {
    let registry = Registry::with_env(MapEnv::new());
    registry.define(TypeDef::new("Leaf")).unwrap();
    let root = registry
        .define(TypeDef::new("Root").schema(Schema::new().prop("leaves", Prop::many("Leaf"))))
        .unwrap();
    let leaves: serde_json::Map<_, _> = (0..16).map(|i| (format!("leaf{i}"), json!({}))).collect();
    let tree = registry.provide(root, json!({ "leaves": leaves }), None).unwrap();
    futures::executor::block_on(tree.attach()).unwrap();

    c.bench_function("start_stop_16_leaves", |b| {
        b.iter(|| {
            futures::executor::block_on(async {
                tree.start().await.unwrap();
                tree.stop().await.unwrap();
            })
        })
    });
}

criterion_group!(
    resolution_benches,
    bench_shared_hit,
    bench_fresh_instances,
    bench_candidate_count
);

criterion_group!(lifecycle_benches, bench_coerce, bench_start_stop_tree);

criterion_main!(resolution_benches, lifecycle_benches);

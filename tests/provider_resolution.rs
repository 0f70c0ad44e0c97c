/// Provider resolution tests
///
/// Candidate scoring, tie-breaking, abstract types, parent fallback and the
/// materialization of declared sub-components.

use ferrous_actives::{
    ActiveError, Config, ErrorKind, Instance, Primitive, Prop, ProvideContext, Provider, Provision,
    Registry, Schema, Status, TypeDef, ActiveResult,
};
use serde_json::json;

// ===== Scoring =====

#[test]
fn test_type_and_key_select_implementation() {
    let registry = Registry::new();
    let staff = registry.define(TypeDef::new("Staff")).unwrap();
    let manager = registry.define(TypeDef::new("Manager").extends(staff)).unwrap();
    let intern = registry.define(TypeDef::new("InternStaff").extends(staff)).unwrap();
    registry.use_impl(staff, manager).unwrap();
    registry.use_impl(staff, intern).unwrap();

    let by_type = registry.provide(staff, json!({"type": "Manager"}), None).unwrap();
    assert_eq!(by_type.type_key(), manager);

    let keyed = registry.coerce(staff, &Config::new(), Some("intern"), true).unwrap();
    let by_key = registry.provide(staff, keyed, None).unwrap();
    assert_eq!(by_key.type_name(), "InternStaff");

    let fallback = registry.provide(staff, json!({}), None).unwrap();
    assert_eq!(fallback.type_key(), staff);
}

#[test]
fn test_ties_go_to_first_registered() {
    let registry = Registry::new();
    let store = registry.define(TypeDef::new("Store").abstract_type()).unwrap();
    let disk = registry.define(TypeDef::new("Disk").extends(store)).unwrap();
    let memory = registry.define(TypeDef::new("Memory").extends(store)).unwrap();
    registry.use_impl(store, disk).unwrap();
    registry.use_impl(store, memory).unwrap();

    assert_eq!(registry.provide(store, json!({}), None).unwrap().type_key(), disk);
    assert!(registry.unuse_impl(store, disk));
    assert_eq!(registry.provide(store, json!({}), None).unwrap().type_key(), memory);
}

#[test]
fn test_abstract_type_without_implementations_fails() {
    let registry = Registry::new();
    let db = registry.define(TypeDef::new("Db").abstract_type()).unwrap();

    let err = registry.provide(db, json!({"url": "pg://primary"}), None).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Resolution);
    assert!(matches!(
        err,
        ActiveError::Resolution { ref type_name, ref target } if type_name == "Db" && target == "pg://primary"
    ));
}

struct Never;

impl Provider for Never {
    fn provides(&self, _cx: &ProvideContext<'_>) -> Option<Provision> {
        None
    }

    fn instantiate(&self, _config: &Config) -> ActiveResult<Instance> {
        Ok(Instance::plain())
    }
}

#[test]
fn test_unmatched_type_retries_against_parent() {
    let registry = Registry::new();
    let base = registry.define(TypeDef::new("Base")).unwrap();
    let special = registry
        .define(TypeDef::new("Special").extends(base).provider(Never))
        .unwrap();

    let component = registry.provide(special, json!({}), None).unwrap();
    assert_eq!(component.type_key(), base);
}

struct Pinned;

impl Provider for Pinned {
    fn provides(&self, cx: &ProvideContext<'_>) -> Option<Provision> {
        let mut opts = serde_json::Map::new();
        opts.insert("pool".to_string(), json!(4));
        let replica = cx.registry().type_named("Replica")?;
        Some(
            Provision::new(20)
                .with_opts(opts)
                .with_implementation(replica)
                .with_url("pg://replica:5432"),
        )
    }

    fn instantiate(&self, _config: &Config) -> ActiveResult<Instance> {
        Ok(Instance::plain())
    }
}

#[test]
fn test_provision_overrides_apply_before_construction() {
    let registry = Registry::new();
    let db = registry
        .define(
            TypeDef::new("Db")
                .abstract_type()
                .schema(Schema::new().prop("pool", Prop::value(Primitive::Int).default(json!(1)))),
        )
        .unwrap();
    let router = registry.define(TypeDef::new("Router").extends(db).provider(Pinned)).unwrap();
    let replica = registry.define(TypeDef::new("Replica").extends(db)).unwrap();
    registry.use_impl(db, router).unwrap();

    let component = registry.provide(db, json!({"url": "pg://primary"}), None).unwrap();

    assert_eq!(component.type_key(), replica);
    assert_eq!(component.config().get("pool"), Some(&json!(4)));
    assert_eq!(component.config().str("url"), Some("pg://replica:5432"));
}

#[test]
fn test_use_impl_requires_subtype() {
    let registry = Registry::new();
    let a = registry.define(TypeDef::new("A")).unwrap();
    let b = registry.define(TypeDef::new("B")).unwrap();
    let err = registry.use_impl(a, b).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(registry.define(TypeDef::new("A")).is_err());
}

#[test]
fn test_instance_ids_count_per_type() {
    let registry = Registry::new();
    let a = registry.define(TypeDef::new("A")).unwrap();
    let b = registry.define(TypeDef::new("B")).unwrap();
    let a1 = registry.provide(a, json!({}), None).unwrap();
    let b1 = registry.provide(b, json!({}), None).unwrap();
    let a2 = registry.provide(a, json!({}), None).unwrap();
    assert_eq!((a1.iid(), b1.iid(), a2.iid()), (1, 1, 2));

    let other = Registry::new();
    let a_again = other.define(TypeDef::new("A")).unwrap();
    assert_eq!(other.provide(a_again, json!({}), None).unwrap().iid(), 1);
}

// ===== Sub-components =====

fn organization() -> Registry {
    let registry = Registry::new();
    let staff = registry
        .define(TypeDef::new("Staff").schema(
            Schema::new()
                .prop("name", Prop::value(Primitive::String))
                .prop("team", Prop::owner("Team")),
        ))
        .unwrap();
    let manager = registry.define(TypeDef::new("Manager").extends(staff)).unwrap();
    registry.use_impl(staff, manager).unwrap();
    registry
        .define(TypeDef::new("Team").schema(
            Schema::new()
                .prop("lead", Prop::one("Staff"))
                .prop("members", Prop::many("Staff"))
                .prop("group", Prop::owner("Group")),
        ))
        .unwrap();
    registry
        .define(TypeDef::new("Group").schema(
            Schema::new()
                .prop("teams", Prop::many("Team"))
                .prop("limits", Prop::value(Primitive::Any).default(json!({"size": 10, "budget": 5}))),
        ))
        .unwrap();
    registry
}

#[tokio::test]
async fn test_configure_materializes_sub_components() {
    let registry = organization();
    let group = registry.type_named("Group").unwrap();
    let config = json!({
        "limits": {"budget": 7},
        "teams": {
            "core": {
                "lead": {"type": "manager", "name": "tim"},
                "members": {"amy": {}, "bob": {"type": "manager"}, "$comment": "skipped"},
            },
        },
    });
    let org = registry.provide(group, config, None).unwrap();
    assert!(org.subs("teams").is_empty());

    org.start().await.unwrap();

    assert_eq!(org.config().get("limits"), Some(&json!({"size": 10, "budget": 7})));
    let teams = org.subs("teams");
    assert_eq!(teams.len(), 1);
    let (key, core) = &teams[0];
    assert_eq!(key, "core");
    assert_eq!(core.status(), Status::Started);
    assert_eq!(core.owner(), Some(org.clone()));
    assert_eq!(core.owner_key().as_deref(), Some("group"));
    assert_eq!(core.sub("group"), Some(org.clone()));

    let lead = core.sub("lead").unwrap();
    assert_eq!(lead.type_name(), "Manager");
    assert_eq!(lead.config().str("name"), Some("tim"));
    assert_eq!(lead.status(), Status::Started);
    assert_eq!(lead.sub("team"), Some(core.clone()));

    let members: Vec<_> = core
        .subs("members")
        .into_iter()
        .map(|(key, member)| (key, member.type_name().to_string(), member.config().str("name").map(str::to_string)))
        .collect();
    assert_eq!(
        members,
        vec![
            ("amy".to_string(), "Staff".to_string(), Some("amy".to_string())),
            ("bob".to_string(), "Manager".to_string(), Some("bob".to_string())),
        ]
    );
    assert_eq!(core.children().len(), 3);
}

#[tokio::test]
async fn test_many_requires_a_mapping() {
    let registry = organization();
    let group = registry.type_named("Group").unwrap();
    let org = registry.provide(group, json!({"teams": ["core"]}), None).unwrap();

    let err = org.attach().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Lifecycle);
    assert!(err.root_cause().to_string().contains("Group.teams"));
    assert_eq!(org.status(), Status::Detached);
}

#[tokio::test]
async fn test_failed_configure_links_no_children() {
    let registry = organization();
    let audit = registry.define(TypeDef::new("Audit").abstract_type()).unwrap();
    let ledger = registry.define(TypeDef::new("Ledger").extends(audit)).unwrap();
    let division = registry
        .define(TypeDef::new("Division").schema(
            Schema::new()
                .prop("teams", Prop::many("Team"))
                .prop("audit", Prop::one("Audit")),
        ))
        .unwrap();
    let config = json!({"teams": {"core": {}, "ops": {}}, "audit": {}});
    let division = registry.provide(division, config, None).unwrap();

    for _ in 0..2 {
        let err = division.attach().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lifecycle);
        assert!(err.root_cause().to_string().starts_with("Audit: no implementation found"));
        assert_eq!(division.status(), Status::Detached);
        assert!(division.children().is_empty());
        assert!(division.subs("teams").is_empty());
    }

    registry.use_impl(audit, ledger).unwrap();
    division.attach().await.unwrap();
    let names: Vec<_> = division.children().iter().map(|c| c.type_name().to_string()).collect();
    assert_eq!(names, ["Team", "Team", "Ledger"]);
    assert_eq!(division.subs("teams").len(), 2);
}

#[test]
fn test_dump_renders_the_tree() {
    let registry = organization();
    let group = registry.type_named("Group").unwrap();
    let org = registry
        .provide(group, json!({"teams": {"core": {"lead": {"name": "tim"}}}}), None)
        .unwrap();
    futures::executor::block_on(org.attach()).unwrap();

    assert_eq!(org.dump(), "Group:1(X)\n  Team:1(X)\n    Staff:1(X)\n");
}

//! # ferrous-actives
//!
//! Lifecycle-managed component trees for Rust: configuration coercion,
//! priority-based provider resolution with shared instances, and an
//! asynchronous attach/start/stop/detach state machine that cascades through
//! a reference-counted composition graph.
//!
//! ## Features
//!
//! - **Typed registry**: component types live in an explicit [`Registry`]
//!   arena, with schemas merged along the parent chain
//! - **Config coercion**: defaults, implicit scalars, environment overrides,
//!   `${VAR:default}` interpolation and URL normalization
//! - **Provider resolution**: candidates are scored, the best one wins and
//!   shared instances are cached per implementation
//! - **URL chains**: `a://x|b://y` resolves into linked components
//! - **Coalesced lifecycle**: concurrent callers of the same operation share
//!   one in-flight transition; failures roll back and are reported as events
//! - **Reference counting**: removing a component's last attached parent
//!   detaches it
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_actives::{Instance, Lifecycle, Prop, Primitive, Registry, Schema, Status, TypeDef};
//! use serde_json::json;
//!
//! struct Server;
//! impl Lifecycle for Server {}
//!
//! # futures::executor::block_on(async {
//! let registry = Registry::new();
//! let server = registry
//!     .define(
//!         TypeDef::new("Server")
//!             .schema(Schema::new().prop("port", Prop::value(Primitive::Int).default(json!(8080))))
//!             .factory(|_| Ok(Instance::new(Server))),
//!     )
//!     .unwrap();
//!
//! let web = registry.provide(server, json!({}), None).unwrap();
//! assert_eq!(web.config().get("port"), Some(&json!(8080)));
//!
//! web.start().await.unwrap();
//! assert_eq!(web.status(), Status::Started);
//! web.detach().await.unwrap();
//! assert_eq!(web.status(), Status::Detached);
//! # });
//! ```
//!
//! ## Sub-components
//!
//! Component-typed properties are materialized on the first attach and
//! linked as children, so they follow their owner through the lifecycle.
//!
//! ```rust
//! use ferrous_actives::{Prop, Registry, Schema, Status, TypeDef};
//! use serde_json::json;
//!
//! # futures::executor::block_on(async {
//! let registry = Registry::new();
//! registry.define(TypeDef::new("Team")).unwrap();
//! let group = registry
//!     .define(TypeDef::new("Group").schema(Schema::new().prop("teams", Prop::many("Team"))))
//!     .unwrap();
//!
//! let eng = registry
//!     .provide(group, json!({"teams": {"core": {}, "infra": {}}}), None)
//!     .unwrap();
//! eng.start().await.unwrap();
//!
//! let teams = eng.subs("teams");
//! assert_eq!(teams.len(), 2);
//! assert!(teams.iter().all(|(_, team)| team.status() == Status::Started));
//! # });
//! ```

pub mod component;
pub mod config;
pub mod descriptors;
pub mod error;
pub mod events;
pub mod graph;
pub mod key;
pub mod provider;
pub mod schema;
pub mod status;
pub mod traits;
pub mod url;

mod registration;

pub use component::{Component, OpFuture};
pub use config::{deep_merge, Config, Environment, MapEnv, ProcessEnv};
pub use descriptors::TypeDef;
pub use error::{ActiveError, ActiveResult, BoxError, ErrorKind, HookResult};
pub use events::{Event, EventEmitter, EventKind, ListenerId, LogEvents};
pub use graph::status_counts;
pub use key::TypeKey;
pub use provider::{default_provision, Instance, ProvideContext, Provider, Provision};
pub use registration::Registry;
pub use schema::{MergedSchema, Primitive, Prop, PropKind, PropType, ResolvedProp, ResolvedType, Schema};
pub use status::{Action, Status, StatusCounts};
pub use traits::{Lifecycle, Plain};
pub use url::Url;

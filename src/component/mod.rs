//! Live components.
//!
//! A [`Component`] is a cheap, clonable handle to one constructed instance:
//! its status, coerced config, graph edges, chain links and event emitter.
//! Edges pointing up the graph (parents, owner, chain predecessors) are weak,
//! so dropping the last handle to a root releases the whole tree.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};

use crate::config::Config;
use crate::error::{ActiveError, ActiveResult};
use crate::events::{Event, EventEmitter};
use crate::key::TypeKey;
use crate::provider::Instance;
use crate::registration::{Registry, RegistryInner};
use crate::status::Status;
use crate::traits::Lifecycle;

mod configure;
mod dump;
mod lifecycle;

pub(crate) use configure::Slot;
pub use lifecycle::OpFuture;
pub(crate) use lifecycle::Pending;

pub(crate) struct State {
    pub(crate) status: Status,
    pub(crate) config: Config,
    pub(crate) owner: Option<WeakComponent>,
    pub(crate) owner_key: Option<String>,
    pub(crate) children: Vec<Component>,
    pub(crate) parents: Vec<WeakComponent>,
    pub(crate) next: Option<Component>,
    pub(crate) prevs: Vec<WeakComponent>,
    pub(crate) shared: bool,
    pub(crate) configured: bool,
    pub(crate) slots: Vec<(String, Slot)>,
    pub(crate) pending: Pending,
}

pub(crate) struct ComponentInner {
    registry: Weak<RegistryInner>,
    ty: TypeKey,
    type_name: String,
    iid: u64,
    hooks: Arc<dyn Lifecycle>,
    value: Arc<dyn Any + Send + Sync>,
    events: EventEmitter,
    state: Mutex<State>,
}

/// Handle to a constructed component.
///
/// Equality is identity: two handles are equal when they point at the same
/// instance.
///
/// # Examples
///
/// ```rust
/// use ferrous_actives::{Registry, Status, TypeDef};
///
/// # futures::executor::block_on(async {
/// let registry = Registry::new();
/// let ty = registry.define(TypeDef::new("Worker")).unwrap();
/// let worker = registry.instantiate(ty, serde_json::json!({})).unwrap();
/// assert_eq!(worker.to_string(), "Worker:1(D)");
///
/// worker.start().await.unwrap();
/// assert_eq!(worker.status(), Status::Started);
/// assert_eq!(worker.to_string(), "Worker:1(S)");
/// # });
/// ```
#[derive(Clone)]
pub struct Component(Arc<ComponentInner>);

/// Non-owning handle to a component.
#[derive(Clone)]
pub(crate) struct WeakComponent(Weak<ComponentInner>);

impl WeakComponent {
    pub(crate) fn upgrade(&self) -> Option<Component> {
        self.0.upgrade().map(Component)
    }

    pub(crate) fn points_to(&self, component: &Component) -> bool {
        std::ptr::eq(self.0.as_ptr(), Arc::as_ptr(&component.0))
    }
}

impl Component {
    pub(crate) fn new(
        registry: &Registry,
        ty: TypeKey,
        iid: u64,
        config: Config,
        instance: Instance,
    ) -> ActiveResult<Component> {
        let type_name = registry
            .name_of(ty)
            .ok_or_else(|| ActiveError::Config(format!("unknown type {ty}")))?;
        Ok(Component(Arc::new(ComponentInner {
            registry: registry.downgrade(),
            ty,
            type_name,
            iid,
            hooks: instance.hooks,
            value: instance.value,
            events: EventEmitter::new(),
            state: Mutex::new(State {
                status: Status::Detached,
                config,
                owner: None,
                owner_key: None,
                children: Vec::new(),
                parents: Vec::new(),
                next: None,
                prevs: Vec::new(),
                shared: false,
                configured: false,
                slots: Vec::new(),
                pending: Pending::default(),
            }),
        })))
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, State> {
        self.0.state.lock()
    }

    pub(crate) fn hooks(&self) -> &Arc<dyn Lifecycle> {
        &self.0.hooks
    }

    pub(crate) fn downgrade(&self) -> WeakComponent {
        WeakComponent(Arc::downgrade(&self.0))
    }

    /// Instance id, sequential per type within a registry.
    pub fn iid(&self) -> u64 {
        self.0.iid
    }

    pub fn type_key(&self) -> TypeKey {
        self.0.ty
    }

    pub fn type_name(&self) -> &str {
        &self.0.type_name
    }

    pub fn status(&self) -> Status {
        self.state().status
    }

    /// The coerced config. After the first attach this reflects the
    /// configured values, with object defaults merged in.
    pub fn config(&self) -> Config {
        self.state().config.clone()
    }

    pub fn is_shared(&self) -> bool {
        self.state().shared
    }

    /// The component that created this one. Shared components have none.
    pub fn owner(&self) -> Option<Component> {
        self.state().owner.as_ref().and_then(WeakComponent::upgrade)
    }

    /// Name under which this component refers to its owner.
    pub fn owner_key(&self) -> Option<String> {
        self.state().owner_key.clone()
    }

    pub fn children(&self) -> Vec<Component> {
        self.state().children.clone()
    }

    pub fn parents(&self) -> Vec<Component> {
        self.state()
            .parents
            .iter()
            .filter_map(WeakComponent::upgrade)
            .collect()
    }

    /// The component the chained remainder of this component's URL resolved
    /// to.
    pub fn next(&self) -> Option<Component> {
        self.state().next.clone()
    }

    /// Components whose `next` is this component.
    pub fn prevs(&self) -> Vec<Component> {
        self.state()
            .prevs
            .iter()
            .filter_map(WeakComponent::upgrade)
            .collect()
    }

    pub fn events(&self) -> &EventEmitter {
        &self.0.events
    }

    /// The registry this component was resolved from, while it is alive.
    pub fn registry(&self) -> Option<Registry> {
        Registry::upgrade(&self.0.registry)
    }

    /// The constructed implementation, if it is a `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.0.value.clone().downcast::<T>().ok()
    }

    /// Lower-cased `type:iid`.
    pub fn iid_key(&self) -> String {
        format!("{}:{}", self.0.type_name, self.0.iid).to_lowercase()
    }

    /// `Type:iid`, used to name components in errors.
    pub fn label(&self) -> String {
        format!("{}:{}", self.0.type_name, self.0.iid)
    }

    pub fn ptr_eq(&self, other: &Component) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn mark_shared(&self) {
        self.state().shared = true;
    }

    pub(crate) fn set_owner(&self, owner: &Component, key: String) {
        let mut state = self.state();
        state.owner = Some(owner.downgrade());
        state.owner_key = Some(key);
    }

    /// Links `next` as this component's chain successor.
    pub(crate) fn set_next(&self, next: &Component) {
        self.state().next = Some(next.clone());
        let mut state = next.state();
        if !state.prevs.iter().any(|p| p.points_to(self)) {
            state.prevs.push(self.downgrade());
        }
    }

    pub(crate) fn child_at(&self, index: usize) -> Option<Component> {
        self.state().children.get(index).cloned()
    }

    pub(crate) fn emit(&self, event: Event) {
        self.0.events.emit(&event);
    }

    /// Adds `child` under this component and brings it up to this
    /// component's status.
    pub async fn add_child(&self, child: &Component) -> ActiveResult<()> {
        crate::graph::add_child(self, child).await
    }

    /// Removes `child`, detaching it when no attached parent remains.
    pub async fn remove_child(&self, child: &Component) -> ActiveResult<()> {
        crate::graph::remove_child(self, child).await
    }

    /// Adds `parent` above this component and reconciles against all parents.
    pub async fn add_parent(&self, parent: &Component) -> ActiveResult<()> {
        crate::graph::add_parent(self, parent).await
    }

    pub async fn remove_parent(&self, parent: &Component) -> ActiveResult<()> {
        crate::graph::remove_parent(self, parent).await
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Component {}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}({})", self.0.type_name, self.0.iid, self.status().code())
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("type", &self.0.type_name)
            .field("iid", &self.0.iid)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

//! Component events and a synchronous event emitter.
//!
//! Every component owns an [`EventEmitter`]. Status changes, completed
//! transitions and failures are published to it as [`Event`]s. Dispatch is
//! synchronous and follows registration order; handlers run on the task that
//! drove the transition and must not block.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ActiveError;
use crate::status::{Action, Status};

/// An event published by a component.
#[derive(Debug, Clone)]
pub enum Event {
    /// The status changed, including rollbacks after a failed transition.
    Status(Status),
    Attach,
    Detach,
    /// A start completed. `stop()` publishes it too, right before
    /// [`Event::Stop`], once the component has settled back to attached.
    Start,
    Stop,
    /// A lifecycle operation failed. `action` is the operation the caller
    /// asked for, even when a nested step is what failed.
    Error { action: Action, error: ActiveError },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Status(_) => EventKind::Status,
            Event::Attach => EventKind::Attach,
            Event::Detach => EventKind::Detach,
            Event::Start => EventKind::Start,
            Event::Stop => EventKind::Stop,
            Event::Error { .. } => EventKind::Error,
        }
    }
}

/// Discriminant of [`Event`], used to subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Status,
    Attach,
    Detach,
    Start,
    Stop,
    Error,
}

impl EventKind {
    pub const fn name(self) -> &'static str {
        match self {
            EventKind::Status => "status",
            EventKind::Attach => "attach",
            EventKind::Detach => "detach",
            EventKind::Start => "start",
            EventKind::Stop => "stop",
            EventKind::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handle returned by [`EventEmitter::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

struct Listener {
    id: ListenerId,
    /// `None` listens to every event.
    kind: Option<EventKind>,
    once: bool,
    handler: Handler,
}

/// Publish/subscribe primitive with synchronous, registration-order dispatch.
///
/// # Examples
///
/// ```rust
/// use ferrous_actives::{Event, EventEmitter, EventKind};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let emitter = EventEmitter::new();
/// let seen = Arc::new(AtomicUsize::new(0));
/// let counter = seen.clone();
/// emitter.once(EventKind::Attach, move |_| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// emitter.emit(&Event::Attach);
/// emitter.emit(&Event::Attach);
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// assert_eq!(emitter.listener_count(EventKind::Attach), 0);
/// ```
#[derive(Default)]
pub struct EventEmitter {
    listeners: Mutex<Vec<Listener>>,
    next_id: AtomicU64,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to one kind of event.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.add(Some(kind), false, Arc::new(handler))
    }

    /// Subscribes to the next event of one kind only.
    pub fn once<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.add(Some(kind), true, Arc::new(handler))
    }

    /// Subscribes to every event.
    pub fn on_any<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.add(None, false, Arc::new(handler))
    }

    /// Removes a listener. Returns whether it was registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Removes every listener of one kind.
    pub fn off_all(&self, kind: EventKind) {
        self.listeners.lock().retain(|l| l.kind != Some(kind));
    }

    /// Number of listeners that would receive an event of this kind.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .lock()
            .iter()
            .filter(|l| l.kind.map_or(true, |k| k == kind))
            .count()
    }

    /// Dispatches an event. Returns whether any listener received it.
    ///
    /// Handlers are invoked after the listener list is released, so they may
    /// subscribe or unsubscribe freely. `once` listeners are removed before
    /// they run.
    pub fn emit(&self, event: &Event) -> bool {
        let kind = event.kind();
        let handlers: Vec<Handler> = {
            let mut listeners = self.listeners.lock();
            let handlers = listeners
                .iter()
                .filter(|l| l.kind.map_or(true, |k| k == kind))
                .map(|l| l.handler.clone())
                .collect();
            listeners.retain(|l| !(l.once && l.kind == Some(kind)));
            handlers
        };
        for handler in &handlers {
            handler(event);
        }
        !handlers.is_empty()
    }

    fn add(&self, kind: Option<EventKind>, once: bool, handler: Handler) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push(Listener { id, kind, once, handler });
        id
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

/// Forwards component events to `tracing`.
///
/// Status changes are logged at `trace`, completed transitions at `debug`
/// and failures at `warn`.
///
/// ```rust
/// use ferrous_actives::{LogEvents, Registry, TypeDef};
///
/// let registry = Registry::new();
/// let ty = registry.define(TypeDef::new("Worker")).unwrap();
/// let worker = registry.provide(ty, ferrous_actives::Config::new(), None).unwrap();
/// LogEvents::new().install(&worker);
/// ```
#[derive(Debug, Clone)]
pub struct LogEvents {
    target: Option<String>,
}

impl LogEvents {
    pub fn new() -> Self {
        Self { target: None }
    }

    /// Logs under a fixed label instead of the component's `type:iid` key.
    pub fn with_label(label: impl Into<String>) -> Self {
        Self { target: Some(label.into()) }
    }

    /// Subscribes to every event of `component`.
    pub fn install(self, component: &crate::Component) -> ListenerId {
        let label = self.target.unwrap_or_else(|| component.iid_key());
        component
            .events()
            .on_any(move |event| log_event(&label, event))
    }
}

impl Default for LogEvents {
    fn default() -> Self {
        Self::new()
    }
}

fn log_event(label: &str, event: &Event) {
    match event {
        Event::Status(status) => tracing::trace!(component = label, %status, "status"),
        Event::Error { action, error } => {
            tracing::warn!(component = label, %action, %error, "lifecycle failure")
        }
        other => tracing::debug!(component = label, event = %other.kind(), "lifecycle"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn dispatches_in_registration_order() {
        let emitter = EventEmitter::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = order.clone();
            emitter.on(EventKind::Start, move |_| order.lock().push(n));
        }
        assert!(emitter.emit(&Event::Start));
        assert_eq!(*order.lock(), vec![0, 1, 2]);
        assert!(!emitter.emit(&Event::Stop));
    }

    #[test]
    fn off_removes_only_that_listener() {
        let emitter = EventEmitter::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let a = {
            let hits = hits.clone();
            emitter.on(EventKind::Status, move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        let _b = {
            let hits = hits.clone();
            emitter.on(EventKind::Status, move |_| {
                hits.fetch_add(10, Ordering::SeqCst);
            })
        };
        assert!(emitter.off(a));
        assert!(!emitter.off(a));
        emitter.emit(&Event::Status(Status::Attached));
        assert_eq!(hits.load(Ordering::SeqCst), 10);
        emitter.off_all(EventKind::Status);
        assert_eq!(emitter.listener_count(EventKind::Status), 0);
    }

    #[test]
    fn any_listeners_see_everything() {
        let emitter = EventEmitter::new();
        let kinds = Arc::new(Mutex::new(Vec::new()));
        let seen = kinds.clone();
        emitter.on_any(move |event| seen.lock().push(event.kind()));
        emitter.emit(&Event::Attach);
        emitter.emit(&Event::Status(Status::Started));
        assert_eq!(*kinds.lock(), vec![EventKind::Attach, EventKind::Status]);
        assert_eq!(emitter.listener_count(EventKind::Error), 1);
    }

    #[test]
    fn handlers_may_resubscribe() {
        let emitter = Arc::new(EventEmitter::new());
        let inner = emitter.clone();
        emitter.once(EventKind::Attach, move |_| {
            inner.on(EventKind::Attach, |_| {});
        });
        emitter.emit(&Event::Attach);
        assert_eq!(emitter.listener_count(EventKind::Attach), 1);
    }
}

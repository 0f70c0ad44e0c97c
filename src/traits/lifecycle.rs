//! Lifecycle hooks run by the component state machine.

use async_trait::async_trait;

use crate::component::Component;
use crate::error::HookResult;

/// Hooks invoked by a component's lifecycle transitions.
///
/// Every hook defaults to a no-op. The state machine sets the transitional
/// status, runs the hook together with the cascade over the component's
/// children and settles the status afterwards, so hooks never touch status
/// themselves.
///
/// `on_attach` and `on_start` run after the children reached the target
/// state; `on_stop` and `on_detach` run before the children are taken down.
/// A hook error aborts the transition, rolls the status back and is reported
/// as [`ActiveError::Lifecycle`](crate::ActiveError::Lifecycle).
///
/// # Examples
///
/// ```rust
/// use ferrous_actives::{Component, HookResult, Lifecycle};
/// use async_trait::async_trait;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Listener {
///     bound: AtomicBool,
/// }
///
/// #[async_trait]
/// impl Lifecycle for Listener {
///     async fn on_start(&self, component: &Component) -> HookResult {
///         let port: u16 = component.config().typed::<Port>()?.port;
///         if port == 0 {
///             return Err("port must be set".into());
///         }
///         self.bound.store(true, Ordering::SeqCst);
///         Ok(())
///     }
///
///     async fn on_stop(&self, _component: &Component) -> HookResult {
///         self.bound.store(false, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// #[derive(serde::Deserialize)]
/// struct Port {
///     port: u16,
/// }
/// ```
#[async_trait]
pub trait Lifecycle: Send + Sync + 'static {
    /// Runs once the component is configured and its children are attached.
    async fn on_attach(&self, _component: &Component) -> HookResult {
        Ok(())
    }

    /// Runs before the children are detached.
    async fn on_detach(&self, _component: &Component) -> HookResult {
        Ok(())
    }

    /// Runs once the children are started.
    async fn on_start(&self, _component: &Component) -> HookResult {
        Ok(())
    }

    /// Runs before the children are stopped.
    async fn on_stop(&self, _component: &Component) -> HookResult {
        Ok(())
    }
}

/// Implementation with no hooks, used by types defined without a provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct Plain;

impl Lifecycle for Plain {}

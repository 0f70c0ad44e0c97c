//! The four lifecycle operations.
//!
//! Each operation is coalesced per component: while one is in flight every
//! caller receives a clone of the same [`OpFuture`]. Transitions happen
//! lazily, when the returned future is first polled. A new operation first
//! waits for the operations already in flight on the component, so
//! `detach(); attach()` ends attached and `start(); stop()` ends stopped.
//! The stop inside `detach()` and the attach inside `start()` run inline,
//! never as separate operations.
//!
//! Cascades carry a [`Trail`] of the components they pass through. A
//! component met again on its own trail counts as done, so cyclic graphs
//! settle instead of waiting on themselves.

use std::future::Future;

use futures::future::{self, BoxFuture, FutureExt, Shared};

use super::{Component, WeakComponent};
use crate::error::{ActiveError, ActiveResult, BoxError, HookResult};
use crate::events::Event;
use crate::status::{Action, Status};

/// Shared handle to an in-flight lifecycle operation.
///
/// Cloning or awaiting it from several tasks observes the same result.
pub type OpFuture = Shared<BoxFuture<'static, ActiveResult<()>>>;

/// In-flight operations of one component.
#[derive(Default)]
pub(crate) struct Pending {
    attach: Option<OpFuture>,
    detach: Option<OpFuture>,
    start: Option<OpFuture>,
    stop: Option<OpFuture>,
}

impl Pending {
    fn slot(&mut self, action: Action) -> &mut Option<OpFuture> {
        match action {
            Action::Attach => &mut self.attach,
            Action::Detach => &mut self.detach,
            Action::Start => &mut self.start,
            Action::Stop => &mut self.stop,
        }
    }

    fn get(&mut self, action: Action) -> Option<OpFuture> {
        self.slot(action).clone()
    }

    /// Every in-flight operation except `action`.
    fn others(&self, action: Action) -> Vec<OpFuture> {
        [
            (Action::Attach, &self.attach),
            (Action::Detach, &self.detach),
            (Action::Start, &self.start),
            (Action::Stop, &self.stop),
        ]
        .into_iter()
        .filter(|(other, _)| *other != action)
        .filter_map(|(_, op)| op.clone())
        .collect()
    }
}

/// Components whose cascade is in progress, outermost first.
#[derive(Clone, Default)]
struct Trail(Vec<WeakComponent>);

impl Trail {
    fn contains(&self, component: &Component) -> bool {
        self.0.iter().any(|seen| seen.points_to(component))
    }

    fn with(&self, component: &Component) -> Trail {
        let mut trail = self.clone();
        trail.0.push(component.downgrade());
        trail
    }
}

/// Waits for earlier operations; their outcomes belong to their own callers.
async fn settle(prior: Vec<OpFuture>) {
    for op in prior {
        let _ = op.await;
    }
}

impl Component {
    /// Attaches the component: configures it on first use, attaches its
    /// children, then runs [`Lifecycle::on_attach`](crate::Lifecycle::on_attach).
    ///
    /// No-op unless detached or detaching.
    pub fn attach(&self) -> OpFuture {
        self.attach_in(&Trail::default())
    }

    /// Detaches the component, stopping it first if needed. The hook runs
    /// before the children are detached.
    pub fn detach(&self) -> OpFuture {
        self.detach_in(&Trail::default())
    }

    /// Starts the component, attaching it first if needed. Children start
    /// before [`Lifecycle::on_start`](crate::Lifecycle::on_start) runs.
    pub fn start(&self) -> OpFuture {
        self.start_in(&Trail::default())
    }

    /// Stops the component and settles it back to `attached`, publishing
    /// [`Event::Start`] and then [`Event::Stop`].
    ///
    /// No-op unless starting or started.
    pub fn stop(&self) -> OpFuture {
        self.stop_in(&Trail::default())
    }

    /// `detach()` followed by `attach()`.
    pub async fn reattach(&self) -> ActiveResult<()> {
        self.detach().await?;
        self.attach().await
    }

    /// `stop()` followed by `start()`.
    pub async fn restart(&self) -> ActiveResult<()> {
        self.stop().await?;
        self.start().await
    }

    fn attach_in(&self, trail: &Trail) -> OpFuture {
        self.launch(Action::Attach, trail, Status::is_detached, |this, trail| async move {
            this.attach_now(&trail).await
        })
    }

    fn detach_in(&self, trail: &Trail) -> OpFuture {
        self.launch(Action::Detach, trail, |s| s != Status::Detached, |this, trail| async move {
            this.detach_now(&trail).await
        })
    }

    fn start_in(&self, trail: &Trail) -> OpFuture {
        self.launch(Action::Start, trail, |s| !s.is_started(), |this, trail| async move {
            this.start_now(&trail).await
        })
    }

    fn stop_in(&self, trail: &Trail) -> OpFuture {
        self.launch(Action::Stop, trail, Status::is_started, |this, trail| async move {
            this.stop_now(&trail).await
        })
    }

    fn launch<F, Fut>(
        &self,
        action: Action,
        trail: &Trail,
        needed: fn(Status) -> bool,
        body: F,
    ) -> OpFuture
    where
        F: FnOnce(Component, Trail) -> Fut,
        Fut: Future<Output = ActiveResult<()>> + Send + 'static,
    {
        if trail.contains(self) {
            return future::ready(Ok(())).boxed().shared();
        }
        let mut state = self.state();
        if let Some(pending) = state.pending.get(action) {
            return pending;
        }
        let prior = state.pending.others(action);
        if prior.is_empty() && !needed(state.status) {
            return future::ready(Ok(())).boxed().shared();
        }

        let run = body(self.clone(), trail.with(self));
        let this = self.clone();
        let op = async move {
            settle(prior).await;
            let result = run.await;
            *this.state().pending.slot(action) = None;
            result
        }
        .boxed()
        .shared();
        *state.pending.slot(action) = Some(op.clone());
        op
    }

    async fn attach_now(&self, trail: &Trail) -> ActiveResult<()> {
        let last = self.status();
        if !last.is_detached() {
            return Ok(());
        }
        self.set_status(Status::Attaching);
        match self.run_attach(trail).await {
            Ok(()) => {
                self.set_status(Status::Attached);
                self.emit(Event::Attach);
                Ok(())
            }
            Err(cause) => Err(self.fail(Action::Attach, last, Status::Attaching, cause)),
        }
    }

    async fn detach_now(&self, trail: &Trail) -> ActiveResult<()> {
        let last = self.status();
        if last == Status::Detached {
            return Ok(());
        }
        if last.is_started() {
            if let Err(err) = self.stop_now(trail).await {
                return Err(self.fail(Action::Detach, last, Status::Detaching, err.into()));
            }
        }
        let last = self.status();
        self.set_status(Status::Detaching);
        match self.run_detach(trail).await {
            Ok(()) => {
                self.set_status(Status::Detached);
                self.emit(Event::Detach);
                Ok(())
            }
            Err(cause) => Err(self.fail(Action::Detach, last, Status::Detaching, cause)),
        }
    }

    async fn start_now(&self, trail: &Trail) -> ActiveResult<()> {
        let last = self.status();
        if last.is_started() {
            return Ok(());
        }
        if last.is_detached() {
            if let Err(err) = self.attach_now(trail).await {
                return Err(self.fail(Action::Start, last, Status::Starting, err.into()));
            }
        }
        let last = self.status();
        self.set_status(Status::Starting);
        match self.run_start(trail).await {
            Ok(()) => {
                self.set_status(Status::Started);
                self.emit(Event::Start);
                Ok(())
            }
            Err(cause) => Err(self.fail(Action::Start, last, Status::Starting, cause)),
        }
    }

    async fn stop_now(&self, trail: &Trail) -> ActiveResult<()> {
        let last = self.status();
        if !last.is_started() {
            return Ok(());
        }
        self.set_status(Status::Stopping);
        match self.run_stop(trail).await {
            Ok(()) => {
                self.set_status(Status::Attached);
                self.emit(Event::Start);
                self.emit(Event::Stop);
                Ok(())
            }
            Err(cause) => Err(self.fail(Action::Stop, last, Status::Stopping, cause)),
        }
    }

    pub(crate) fn set_status(&self, status: Status) {
        self.state().status = status;
        tracing::debug!(component = %self.label(), %status, "status");
        self.emit(Event::Status(status));
    }

    /// Rolls back a failed transition, when it was not superseded, and
    /// reports the failure.
    fn fail(&self, action: Action, last: Status, transitional: Status, cause: BoxError) -> ActiveError {
        let restored = {
            let mut state = self.state();
            let restored = state.status == transitional;
            if restored {
                state.status = last;
            }
            restored
        };
        if restored {
            self.emit(Event::Status(last));
        }
        let error = ActiveError::lifecycle(action, self.label(), cause);
        tracing::warn!(component = %self.label(), %action, %error, "lifecycle failure");
        self.emit(Event::Error {
            action,
            error: error.clone(),
        });
        error
    }

    async fn run_attach(&self, trail: &Trail) -> HookResult {
        if !self.state().configured {
            self.configure()?;
        }
        let mut index = 0;
        while let Some(child) = self.child_at(index) {
            child.attach_in(trail).await?;
            index += 1;
        }
        self.hooks().on_attach(self).await
    }

    async fn run_start(&self, trail: &Trail) -> HookResult {
        let mut index = 0;
        while let Some(child) = self.child_at(index) {
            child.start_in(trail).await?;
            index += 1;
        }
        self.hooks().on_start(self).await
    }

    async fn run_stop(&self, trail: &Trail) -> HookResult {
        self.hooks().on_stop(self).await?;
        let mut first = None;
        for child in self.children() {
            if let Err(err) = child.stop_in(trail).await {
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), |err| Err(err.into()))
    }

    async fn run_detach(&self, trail: &Trail) -> HookResult {
        self.hooks().on_detach(self).await?;
        let mut first = None;
        for child in self.children() {
            if let Err(err) = child.detach_in(trail).await {
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), |err| Err(err.into()))
    }
}

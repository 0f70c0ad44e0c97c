//! Parent/child edges and lifecycle reconciliation.
//!
//! Edges are recorded on both ends: the parent holds its children strongly,
//! the child holds its parents weakly. Adding an edge brings the child up to
//! what its parents require; removing the last edge that requires the child
//! to be attached detaches it.

use crate::component::Component;
use crate::error::ActiveResult;
use crate::status::{Status, StatusCounts};

/// Records the edge `parent -> child`. Returns whether it was new.
pub(crate) fn link(parent: &Component, child: &Component) -> bool {
    if parent.ptr_eq(child) {
        return false;
    }
    let added = {
        let mut state = parent.state();
        if state.children.iter().any(|c| c.ptr_eq(child)) {
            false
        } else {
            state.children.push(child.clone());
            true
        }
    };
    let mut state = child.state();
    if !state.parents.iter().any(|p| p.points_to(parent)) {
        state.parents.push(parent.downgrade());
    }
    added
}

/// Removes the edge `parent -> child`. Returns whether it existed.
pub(crate) fn unlink(parent: &Component, child: &Component) -> bool {
    let removed = {
        let mut state = parent.state();
        let before = state.children.len();
        state.children.retain(|c| !c.ptr_eq(child));
        state.children.len() != before
    };
    child.state().parents.retain(|p| !p.points_to(parent));
    removed
}

/// Tallies the statuses of `components`.
pub fn status_counts(components: &[Component]) -> StatusCounts {
    StatusCounts::of(components.iter().map(Component::status))
}

/// Adds `child` under `parent`, then starts it if the parent is starting or
/// started, or attaches it if the parent is attaching or attached. Parents
/// on their way down leave the child alone.
pub async fn add_child(parent: &Component, child: &Component) -> ActiveResult<()> {
    if !link(parent, child) {
        return Ok(());
    }
    match parent.status() {
        Status::Starting | Status::Started => child.start().await,
        Status::Attaching | Status::Attached => child.attach().await,
        Status::Stopping | Status::Stopped | Status::Detaching | Status::Detached => Ok(()),
    }
}

/// Adds `parent` above `child`, then reconciles against every parent of
/// `child`: started if any parent is started, else attached if any parent is
/// attached.
pub async fn add_parent(child: &Component, parent: &Component) -> ActiveResult<()> {
    if !link(parent, child) {
        return Ok(());
    }
    let counts = status_counts(&child.parents());
    if counts.start > 0 {
        child.start().await
    } else if counts.attach > 0 {
        child.attach().await
    } else {
        Ok(())
    }
}

/// Removes `parent` from `child`; detaches `child` when no remaining parent
/// is attached.
pub async fn remove_parent(child: &Component, parent: &Component) -> ActiveResult<()> {
    if !unlink(parent, child) {
        return Ok(());
    }
    let counts = status_counts(&child.parents());
    if counts.attach == 0 {
        tracing::debug!(component = %child, "last attached parent removed");
        child.detach().await
    } else {
        Ok(())
    }
}

pub async fn remove_child(parent: &Component, child: &Component) -> ActiveResult<()> {
    remove_parent(child, parent).await
}

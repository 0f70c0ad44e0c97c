//! Component status and lifecycle actions.

use std::fmt;

/// Bit set while a transition is in flight.
const TRANSITIONAL: u8 = 0b001;
/// Bit set for the attached half of the state diagram.
const ATTACHED: u8 = 0b010;
/// Bit set for the started half of the state diagram.
const STARTED: u8 = 0b100;

/// The eight lifecycle states of a component.
///
/// Each status is encoded in three bits (transitional, attached, started):
///
/// ```text
///                  ,- a -,   ,- s -,
///   detached  D   /   >   \ /   >   \     started  S
///   detaching d  D ^     v A ^     v S    starting s
///   attaching a   \   <   / \   <   /     stopping x
///   attached  X    '- d -'   '- x -'      stopped  P
/// ```
///
/// `stopped` is a resting state distinct from `attached`; `stop()` settles
/// components back to `attached`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    Detached = 0,
    Detaching = TRANSITIONAL,
    Attached = ATTACHED,
    Attaching = ATTACHED | TRANSITIONAL,
    Started = STARTED,
    Starting = STARTED | TRANSITIONAL,
    Stopped = STARTED | ATTACHED,
    Stopping = STARTED | ATTACHED | TRANSITIONAL,
}

impl Status {
    /// Every status, in diagram order.
    pub const ALL: [Status; 8] = [
        Status::Detached,
        Status::Detaching,
        Status::Attaching,
        Status::Attached,
        Status::Starting,
        Status::Started,
        Status::Stopping,
        Status::Stopped,
    ];

    /// Raw three-bit encoding.
    #[inline]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// A transition is in flight.
    #[inline]
    pub const fn is_transitional(self) -> bool {
        self.bits() & TRANSITIONAL != 0
    }

    /// Attached or beyond: attached, starting, started, stopping, stopped.
    #[inline]
    pub const fn is_attached(self) -> bool {
        self.bits() & (ATTACHED | STARTED) != 0 && !matches!(self, Status::Attaching)
    }

    /// Starting or started.
    #[inline]
    pub const fn is_started(self) -> bool {
        self.bits() & (STARTED | ATTACHED) == STARTED
    }

    /// Stopping or stopped.
    #[inline]
    pub const fn is_stopped(self) -> bool {
        self.bits() & (STARTED | ATTACHED) == (STARTED | ATTACHED)
    }

    /// Detaching or detached.
    #[inline]
    pub const fn is_detached(self) -> bool {
        self.bits() & (STARTED | ATTACHED) == 0
    }

    /// One-letter code used by `Display` for components. Every status has
    /// its own letter; `stopped` is `P` so it never reads as `attached`.
    pub const fn code(self) -> char {
        match self {
            Status::Attaching => 'a',
            Status::Attached => 'X',
            Status::Starting => 's',
            Status::Started => 'S',
            Status::Stopping => 'x',
            Status::Stopped => 'P',
            Status::Detaching => 'd',
            Status::Detached => 'D',
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Status::Attaching => "attaching",
            Status::Attached => "attached",
            Status::Starting => "starting",
            Status::Started => "started",
            Status::Stopping => "stopping",
            Status::Stopped => "stopped",
            Status::Detaching => "detaching",
            Status::Detached => "detached",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The four lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Attach,
    Detach,
    Start,
    Stop,
}

impl Action {
    pub const fn name(self) -> &'static str {
        match self {
            Action::Attach => "attach",
            Action::Detach => "detach",
            Action::Start => "start",
            Action::Stop => "stop",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bucket counts over a set of components.
///
/// `attach` counts every component attached or beyond, `start` counts
/// starting/started, `stop` counts stopping/stopped and `detach` counts
/// detaching/detached. Components that are `attaching` only count towards
/// `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: usize,
    pub attach: usize,
    pub start: usize,
    pub stop: usize,
    pub detach: usize,
}

impl StatusCounts {
    /// Tallies the given statuses.
    pub fn of<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = Status>,
    {
        let mut counts = StatusCounts::default();
        for status in statuses {
            counts.total += 1;
            if status.is_attached() {
                counts.attach += 1;
            }
            if status.is_started() {
                counts.start += 1;
            }
            if status.is_stopped() {
                counts.stop += 1;
            }
            if status.is_detached() {
                counts.detach += 1;
            }
        }
        counts
    }
}

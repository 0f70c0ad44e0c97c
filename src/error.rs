//! Error types for component resolution, configuration and lifecycle.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::status::Action;

/// Boxed error returned by lifecycle hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result returned by lifecycle hooks.
///
/// Hooks may fail with any error type; the state machine wraps the cause in
/// [`ActiveError::Lifecycle`] tagged with the attempted action.
pub type HookResult = Result<(), BoxError>;

/// Component errors
///
/// Represents the error conditions that can occur while declaring schemas,
/// coercing configuration, resolving providers or driving the lifecycle of a
/// component.
///
/// `Config`, `Format`, `Resolution` and `Url` errors are raised synchronously
/// to the immediate caller of `coerce()`/`provide()`. `Lifecycle` errors are
/// raised by `attach()`/`detach()`/`start()`/`stop()` after the status has
/// been rolled back and an `error` event has been emitted.
///
/// # Examples
///
/// ```rust
/// use ferrous_actives::{ActiveError, ErrorKind};
///
/// let err = ActiveError::Format {
///     variable: "HOME_DIR".to_string(),
///     template: "${HOME_DIR}/data".to_string(),
/// };
/// assert_eq!(err.kind(), ErrorKind::Format);
/// assert!(err.to_string().contains("HOME_DIR"));
/// ```
#[derive(Debug, Clone, Error)]
pub enum ActiveError {
    /// Invalid or unresolvable schema declaration
    #[error("Config error: {0}")]
    Config(String),

    /// Interpolation referred to an unset variable with no default
    #[error("Config {template:?} refers to unset ${variable} and no default was specified")]
    Format { variable: String, template: String },

    /// No eligible implementation for the requested type
    #[error("{type_name}: no implementation found for: {target}")]
    Resolution { type_name: String, target: String },

    /// Malformed URL text
    #[error("URL malformed: {0}")]
    Url(String),

    /// A coerced config did not match the component's typed config
    #[error("Typed config error for {type_name}: {message}")]
    Typed { type_name: String, message: String },

    /// Hook failure during a lifecycle transition
    #[error("{component}: {action} failed: {source}")]
    Lifecycle {
        action: Action,
        component: String,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync + 'static>,
    },
}

/// Coarse classification of [`ActiveError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Format,
    Resolution,
    Lifecycle,
}

impl ActiveError {
    /// Returns the error classification.
    ///
    /// Malformed URLs and typed-config mismatches are configuration errors.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ActiveError::Config(_) | ActiveError::Url(_) | ActiveError::Typed { .. } => {
                ErrorKind::Config
            }
            ActiveError::Format { .. } => ErrorKind::Format,
            ActiveError::Resolution { .. } => ErrorKind::Resolution,
            ActiveError::Lifecycle { .. } => ErrorKind::Lifecycle,
        }
    }

    /// The lifecycle action that failed, if this is a lifecycle error.
    pub fn action(&self) -> Option<Action> {
        match self {
            ActiveError::Lifecycle { action, .. } => Some(*action),
            _ => None,
        }
    }

    /// Walks the `Lifecycle` wrappers down to the innermost cause.
    ///
    /// Cascading failures wrap once per level of the component tree, so the
    /// root cause of a failed `start()` on a parent is usually several levels
    /// deep.
    pub fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        let mut cur: &(dyn std::error::Error + 'static) = self;
        while let Some(next) = cur.source() {
            cur = next;
        }
        cur
    }

    pub(crate) fn lifecycle(action: Action, component: impl fmt::Display, cause: BoxError) -> Self {
        ActiveError::Lifecycle {
            action,
            component: component.to_string(),
            source: Arc::from(cause),
        }
    }
}

/// Result type for component operations
///
/// A convenience alias for `Result<T, ActiveError>` used throughout the crate.
///
/// ```rust
/// use ferrous_actives::{ActiveResult, ActiveError};
///
/// fn lookup(name: &str) -> ActiveResult<u32> {
///     Err(ActiveError::Config(format!("unknown type {name}")))
/// }
///
/// assert!(lookup("Missing").is_err());
/// ```
pub type ActiveResult<T> = Result<T, ActiveError>;

//! Core traits for component implementations.

mod lifecycle;

pub use lifecycle::{Lifecycle, Plain};

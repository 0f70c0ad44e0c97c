//! Type keys for the component type arena.

use std::fmt;

/// Key of a component type defined in a [`Registry`](crate::Registry).
///
/// Keys are indices into the registry's type arena and are only meaningful
/// for the registry that issued them. They are cheap to copy and compare,
/// and are what schemas, implementation lists and shared-instance caches are
/// indexed by.
///
/// # Examples
///
/// ```rust
/// use ferrous_actives::{Registry, TypeDef};
///
/// let registry = Registry::new();
/// let api = registry.define(TypeDef::new("Api").abstract_type()).unwrap();
/// let http = registry.define(TypeDef::new("HttpApi").extends(api)).unwrap();
///
/// assert_ne!(api, http);
/// assert_eq!(registry.type_named("HttpApi"), Some(http));
/// assert_eq!(registry.parent_of(http), Some(api));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(pub(crate) usize);

impl TypeKey {
    /// Position in the type arena.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.0)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

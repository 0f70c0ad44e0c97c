//! Materialization of declared sub-components.

use serde_json::Value;

use super::Component;
use crate::config::{deep_merge, Config};
use crate::error::{ActiveError, ActiveResult};
use crate::graph;
use crate::key::TypeKey;
use crate::registration::Registry;
use crate::schema::{PropKind, ResolvedType};

/// A configured component-typed property.
#[derive(Clone)]
pub(crate) enum Slot {
    /// Aliases the owner.
    Owner,
    One(Component),
    /// Entries keyed by their sub-config key, in config order.
    Many(Vec<(String, Component)>),
}

impl Component {
    /// Walks the merged schema once, before the first attach.
    ///
    /// Object defaults of value properties are deep-merged with the
    /// configured object, `one` properties resolve a single sub-component
    /// and `many` properties resolve one per entry. Once every property has
    /// resolved, each sub-component is linked as a child with this component
    /// as its owner; a failed walk links nothing.
    pub(crate) fn configure(&self) -> ActiveResult<()> {
        let registry = self
            .registry()
            .ok_or_else(|| ActiveError::Config(format!("{}: registry dropped", self.label())))?;
        let schema = registry.merged_schema(self.type_key())?;
        let mut config = self.config();
        let mut slots = Vec::new();
        let mut children = Vec::new();

        for (key, prop) in schema.iter() {
            if prop.owner {
                slots.push((key.to_string(), Slot::Owner));
                continue;
            }
            match prop.ty {
                ResolvedType::Primitive(_) => {
                    let merged = match (&prop.default, config.get(key)) {
                        (Some(Value::Object(default)), Some(Value::Object(sub))) => {
                            let mut merged = default.clone();
                            deep_merge(&mut merged, sub);
                            Some(merged)
                        }
                        _ => None,
                    };
                    if let Some(merged) = merged {
                        config.replace(key, Value::Object(merged));
                    }
                }
                ResolvedType::Component(ty) => {
                    let sub = match config.get(key) {
                        None | Some(Value::Null) => continue,
                        Some(sub) => sub.clone(),
                    };
                    let slot = match prop.kind {
                        PropKind::Many => {
                            let Value::Object(entries) = sub else {
                                return Err(ActiveError::Config(format!(
                                    "{}.{key}: expected a mapping of sub-configs",
                                    self.type_name()
                                )));
                            };
                            let mut items = Vec::with_capacity(entries.len());
                            for (subkey, entry) in entries {
                                if subkey.starts_with('$') {
                                    continue;
                                }
                                let child = self.materialize(&registry, ty, entry, &subkey)?;
                                children.push(child.clone());
                                items.push((subkey, child));
                            }
                            Slot::Many(items)
                        }
                        PropKind::One | PropKind::Value => {
                            let child = self.materialize(&registry, ty, sub, key)?;
                            children.push(child.clone());
                            Slot::One(child)
                        }
                    };
                    slots.push((key.to_string(), slot));
                }
            }
            if !prop.copy {
                config.remove(key);
            }
        }

        for child in &children {
            graph::link(self, child);
        }
        let mut state = self.state();
        state.config = config;
        state.slots = slots;
        state.configured = true;
        Ok(())
    }

    fn materialize(&self, registry: &Registry, ty: TypeKey, sub: Value, key: &str) -> ActiveResult<Component> {
        let config = registry.coerce(ty, &Config::from(sub), Some(key), true)?;
        registry.provide(ty, config, Some(self))
    }

    /// The sub-component configured for a `one` property, or the owner for
    /// an `owner` property.
    pub fn sub(&self, key: &str) -> Option<Component> {
        let slot = self
            .state()
            .slots
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, slot)| slot.clone());
        match slot? {
            Slot::Owner => self.owner(),
            Slot::One(child) => Some(child),
            Slot::Many(_) => None,
        }
    }

    /// The sub-components configured for a `many` property, keyed by entry.
    pub fn subs(&self, key: &str) -> Vec<(String, Component)> {
        self.state()
            .slots
            .iter()
            .find_map(|(k, slot)| match slot {
                Slot::Many(items) if k == key => Some(items.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }
}

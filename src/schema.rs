//! Property schemas and their composition along a type's ancestry.
//!
//! Every component type contributes a [`Schema`] fragment when it is
//! defined. The effective schema of a type is the merge of the fragments
//! from the root ancestor down to the type itself, where a descendant's
//! declaration of a key overlays the ancestor's field by field. Merged
//! schemas are memoized per type by the [`Registry`](crate::Registry).

use serde_json::Value;

use crate::error::{ActiveError, ActiveResult};
use crate::key::TypeKey;

/// How many values a property holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropKind {
    /// A plain value, or a single sub-component when typed as one
    Value,
    /// Exactly one sub-component
    One,
    /// A keyed collection of sub-components
    Many,
}

/// Primitive property types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Any,
    String,
    Boolean,
    Int,
    Float,
    Number,
    Date,
    /// Parsed eagerly during coercion; query parameters are merged into the
    /// coerced config.
    Url,
}

/// A property's declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropType {
    Primitive(Primitive),
    /// A component type referenced by name, resolved when schemas merge so
    /// that types may refer to each other regardless of definition order.
    Component(String),
}

/// One property declaration.
///
/// Every field is optional so that a descendant can overlay only what it
/// changes. Use the constructors for complete declarations and
/// [`Prop::overlay`] for partial ones.
///
/// ```rust
/// use ferrous_actives::{Prop, Primitive};
/// use serde_json::json;
///
/// let url = Prop::value(Primitive::Url).implicit();
/// let port = Prop::value(Primitive::Int).default(json!(8080)).env("${name}_PORT");
/// let staff = Prop::many("Staff");
/// # let _ = (url, port, staff);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prop {
    pub kind: Option<PropKind>,
    pub ty: Option<PropType>,
    pub default: Option<Value>,
    pub implicit: Option<bool>,
    pub env: Option<String>,
    pub key: Option<bool>,
    pub owner: Option<bool>,
    pub copy: Option<bool>,
}

impl Prop {
    /// A partial declaration that only changes the fields set on it.
    pub fn overlay() -> Self {
        <Self as Default>::default()
    }

    /// A plain value of the given primitive type.
    pub fn value(primitive: Primitive) -> Self {
        Self {
            kind: Some(PropKind::Value),
            ty: Some(PropType::Primitive(primitive)),
            ..<Self as Default>::default()
        }
    }

    /// A single sub-component of the named type.
    pub fn one(type_name: impl Into<String>) -> Self {
        Self {
            kind: Some(PropKind::One),
            ty: Some(PropType::Component(type_name.into())),
            ..<Self as Default>::default()
        }
    }

    /// A keyed collection of sub-components of the named type.
    pub fn many(type_name: impl Into<String>) -> Self {
        Self {
            kind: Some(PropKind::Many),
            ty: Some(PropType::Component(type_name.into())),
            ..<Self as Default>::default()
        }
    }

    /// A reference to the owning component, typed as the named type.
    pub fn owner(type_name: impl Into<String>) -> Self {
        Self {
            kind: Some(PropKind::One),
            ty: Some(PropType::Component(type_name.into())),
            owner: Some(true),
            ..<Self as Default>::default()
        }
    }

    pub fn of_type(mut self, ty: PropType) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Receives the whole config when the raw config is a scalar.
    pub fn implicit(mut self) -> Self {
        self.implicit = Some(true);
        self
    }

    /// Environment variable name template, interpolated against the config
    /// and upper-cased.
    pub fn env(mut self, template: impl Into<String>) -> Self {
        self.env = Some(template.into());
        self
    }

    /// Falls back to the key the config was declared under.
    pub fn key(mut self) -> Self {
        self.key = Some(true);
        self
    }

    pub fn no_copy(mut self) -> Self {
        self.copy = Some(false);
        self
    }

    /// Applies `child`'s set fields over `self`.
    fn merged_with(&self, child: &Prop) -> Prop {
        Prop {
            kind: child.kind.or(self.kind),
            ty: child.ty.clone().or_else(|| self.ty.clone()),
            default: merge_default(self.default.as_ref(), child.default.as_ref()),
            implicit: child.implicit.or(self.implicit),
            env: child.env.clone().or_else(|| self.env.clone()),
            key: child.key.or(self.key),
            owner: child.owner.or(self.owner),
            copy: child.copy.or(self.copy),
        }
    }
}

fn merge_default(parent: Option<&Value>, child: Option<&Value>) -> Option<Value> {
    match (parent, child) {
        (Some(Value::Object(base)), Some(Value::Object(over))) => {
            let mut merged = base.clone();
            crate::config::deep_merge(&mut merged, over);
            Some(Value::Object(merged))
        }
        (_, Some(child)) => Some(child.clone()),
        (parent, None) => parent.cloned(),
    }
}

/// A type's own schema fragment, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    props: Vec<(String, Prop)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares (or re-declares) a property.
    pub fn prop(mut self, key: impl Into<String>, prop: Prop) -> Self {
        let key = key.into();
        match self.props.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = prop,
            None => self.props.push((key, prop)),
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Prop)> {
        self.props.iter().map(|(k, p)| (k.as_str(), p))
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }
}

/// The resolved type of a merged property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedType {
    Primitive(Primitive),
    Component(TypeKey),
}

/// A fully-resolved property of a merged schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProp {
    pub kind: PropKind,
    pub ty: ResolvedType,
    pub default: Option<Value>,
    pub implicit: bool,
    pub env: Option<String>,
    pub key: bool,
    pub owner: bool,
    pub copy: bool,
}

impl ResolvedProp {
    pub fn primitive(&self) -> Option<Primitive> {
        match self.ty {
            ResolvedType::Primitive(p) => Some(p),
            ResolvedType::Component(_) => None,
        }
    }

    pub fn component(&self) -> Option<TypeKey> {
        match self.ty {
            ResolvedType::Component(key) => Some(key),
            ResolvedType::Primitive(_) => None,
        }
    }

    pub fn is_url(&self) -> bool {
        self.primitive() == Some(Primitive::Url)
    }
}

/// The effective schema of a type after merging its ancestry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedSchema {
    props: Vec<(String, ResolvedProp)>,
}

impl MergedSchema {
    /// Merges fragments ordered root first.
    ///
    /// `resolve` maps component type names to keys. A property that ends up
    /// with no type, or names a type that cannot be resolved, is a
    /// configuration error.
    pub(crate) fn merge<'a, I, F>(type_name: &str, fragments: I, resolve: F) -> ActiveResult<Self>
    where
        I: IntoIterator<Item = &'a Schema>,
        F: Fn(&str) -> Option<TypeKey>,
    {
        let mut merged: Vec<(String, Prop)> = Vec::new();
        for fragment in fragments {
            for (key, prop) in fragment.iter() {
                match merged.iter_mut().find(|(k, _)| k == key) {
                    Some((_, existing)) => *existing = existing.merged_with(prop),
                    None => merged.push((key.to_string(), prop.clone())),
                }
            }
        }

        let mut props = Vec::with_capacity(merged.len());
        for (key, prop) in merged {
            let ty = match &prop.ty {
                Some(PropType::Primitive(p)) => ResolvedType::Primitive(*p),
                Some(PropType::Component(name)) => match resolve(name) {
                    Some(key) => ResolvedType::Component(key),
                    None => {
                        return Err(ActiveError::Config(format!(
                            "{type_name}.{key}: unknown component type {name:?}"
                        )))
                    }
                },
                None => {
                    return Err(ActiveError::Config(format!(
                        "{type_name}.{key}: property type not specified"
                    )))
                }
            };
            props.push((
                key,
                ResolvedProp {
                    kind: prop.kind.unwrap_or(PropKind::Value),
                    ty,
                    default: prop.default,
                    implicit: prop.implicit.unwrap_or(false),
                    env: prop.env,
                    key: prop.key.unwrap_or(false),
                    owner: prop.owner.unwrap_or(false),
                    copy: prop.copy.unwrap_or(true),
                },
            ));
        }
        Ok(Self { props })
    }

    pub fn get(&self, key: &str) -> Option<&ResolvedProp> {
        self.props.iter().find(|(k, _)| k == key).map(|(_, p)| p)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedProp)> {
        self.props.iter().map(|(k, p)| (k.as_str(), p))
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    /// Whether the type carries a URL-typed `url` property, which enables
    /// chained resolution.
    pub fn chains(&self) -> bool {
        self.get("url").map(ResolvedProp::is_url).unwrap_or(false)
    }
}

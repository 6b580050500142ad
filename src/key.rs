use std::{
    any::TypeId,
    fmt,
    hash::{Hash, Hasher},
};

use crate::util::abs_to_rel_paths;

/// Runtime identity of a bindable type.
///
/// Equality and hashing only consider the `TypeId`. The name is kept for
/// diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name with module paths removed.
    pub fn short_name(&self) -> String {
        abs_to_rel_paths(self.name)
    }

    /// Whether this is one of the reserved multi-binding pseudo-types, which
    /// never get implicit bindings.
    pub fn is_marker(&self) -> bool {
        marker::is_marker(self)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// Secondary discriminator between bindings of the same primary type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Qualifier {
    Named(String),
    /// Used to key multi-bindings by their element type.
    Type(TypeKey),
}

impl Qualifier {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::Type(TypeKey::of::<T>())
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Qualifier::Named(name) => Some(name),
            Qualifier::Type(_) => None,
        }
    }

    pub fn as_type(&self) -> Option<TypeKey> {
        match self {
            Qualifier::Named(_) => None,
            Qualifier::Type(key) => Some(*key),
        }
    }
}

impl From<&str> for Qualifier {
    fn from(name: &str) -> Self {
        Self::Named(name.to_owned())
    }
}

impl From<String> for Qualifier {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<&String> for Qualifier {
    fn from(name: &String) -> Self {
        Self::Named(name.clone())
    }
}

impl From<TypeKey> for Qualifier {
    fn from(key: TypeKey) -> Self {
        Self::Type(key)
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Qualifier::Named(name) => write!(f, "{name}"),
            Qualifier::Type(key) => write!(f, "{key}"),
        }
    }
}

/// Registry key of a binding: at most one binding exists per key within an
/// injector.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BindingKey {
    pub ty: TypeKey,
    pub qualifier: Option<Qualifier>,
}

impl BindingKey {
    pub fn new(ty: TypeKey, qualifier: Option<Qualifier>) -> Self {
        Self { ty, qualifier }
    }

    pub fn unqualified(ty: TypeKey) -> Self {
        Self {
            ty,
            qualifier: None,
        }
    }

    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::unqualified(TypeKey::of::<T>())
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{}#{qualifier}", self.ty),
            None => write!(f, "{}", self.ty),
        }
    }
}

/// Reserved pseudo-types used as the primary type of constant, property, list
/// and map bindings. The qualifier carries the actual name.
pub mod marker {
    use super::TypeKey;

    pub struct Constant;
    pub struct Property;
    pub struct List;
    pub struct Map;

    pub(crate) fn is_marker(key: &TypeKey) -> bool {
        *key == TypeKey::of::<Constant>()
            || *key == TypeKey::of::<Property>()
            || *key == TypeKey::of::<List>()
            || *key == TypeKey::of::<Map>()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    trait Repository {}

    #[test]
    fn type_keys_compare_by_type_identity() {
        assert_eq!(TypeKey::of::<String>(), TypeKey::of::<String>());
        assert_ne!(TypeKey::of::<String>(), TypeKey::of::<&'static str>());
        assert_ne!(TypeKey::of::<dyn Repository>(), TypeKey::of::<Box<dyn Repository>>());
    }

    #[test]
    fn binding_keys_render_with_qualifier() {
        let key = BindingKey::new(TypeKey::of::<marker::Constant>(), Some("answer".into()));
        assert_eq!("Constant#answer", key.to_string());
        assert_eq!("dyn Repository", BindingKey::of::<dyn Repository>().to_string());
        let typed = BindingKey::new(
            TypeKey::of::<marker::List>(),
            Some(Qualifier::of::<dyn Repository>()),
        );
        assert_eq!("List#dyn Repository", typed.to_string());
    }

    #[test]
    fn qualified_and_unqualified_keys_are_distinct() {
        let keys: HashSet<_> = [
            BindingKey::of::<String>(),
            BindingKey::new(TypeKey::of::<String>(), Some("a".into())),
            BindingKey::new(TypeKey::of::<String>(), Some("a".into())),
        ]
        .into_iter()
        .collect();
        assert_eq!(2, keys.len());
    }

    #[test]
    fn only_reserved_types_are_markers() {
        assert!(TypeKey::of::<marker::Property>().is_marker());
        assert!(TypeKey::of::<marker::Map>().is_marker());
        assert!(!TypeKey::of::<String>().is_marker());
    }
}

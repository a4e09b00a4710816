//! # Type References
//!
//! The host-side type lattice used by the `instance`, `typed`, `subclass`
//! and `coerced` modes. A [`TypeRef`] is either a builtin [`Kind`] or a
//! class type created for a class schema. Class types compare by
//! identity, never by name: two classes called `Point` are unrelated.
//!
//! Every type is a subclass of `object`. Builtin kinds are otherwise
//! unrelated to each other.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Builtin value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// The absent value.
    None,
    /// Booleans.
    Bool,
    /// 64-bit signed integers.
    Int,
    /// 64-bit floats.
    Float,
    /// Byte strings.
    Bytes,
    /// Text strings.
    Str,
    /// Fixed sequences.
    Tuple,
    /// Mutable sequences, observant ones included.
    List,
    /// Ordered key/value mappings.
    Dict,
    /// Type objects.
    Type,
    /// The root of the lattice.
    Object,
}

impl Kind {
    /// Returns every builtin kind.
    pub fn all_kinds() -> &'static [Kind] {
        &[
            Self::None,
            Self::Bool,
            Self::Int,
            Self::Float,
            Self::Bytes,
            Self::Str,
            Self::Tuple,
            Self::List,
            Self::Dict,
            Self::Type,
            Self::Object,
        ]
    }

    /// Returns the lowercase type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bytes => "bytes",
            Self::Str => "str",
            Self::Tuple => "tuple",
            Self::List => "list",
            Self::Dict => "dict",
            Self::Type => "type",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all_kinds()
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown builtin kind: {s:?}"))
    }
}

/// A user-defined class: a name and its direct bases.
#[derive(Debug)]
pub struct ClassType {
    name: String,
    bases: Vec<TypeRef>,
}

/// Reference to a builtin kind or a class type.
#[derive(Clone)]
pub enum TypeRef {
    /// A builtin kind.
    Builtin(Kind),
    /// A class type, compared by identity.
    Class(Rc<ClassType>),
}

impl TypeRef {
    /// Creates a fresh class type with the given direct bases.
    pub fn class(name: impl Into<String>, bases: Vec<TypeRef>) -> Self {
        Self::Class(Rc::new(ClassType {
            name: name.into(),
            bases,
        }))
    }

    /// The root `object` type.
    pub fn object() -> Self {
        Self::Builtin(Kind::Object)
    }

    /// Type name used in messages.
    pub fn name(&self) -> &str {
        match self {
            Self::Builtin(kind) => kind.as_str(),
            Self::Class(class) => &class.name,
        }
    }

    /// Direct bases. Builtin kinds report none.
    pub fn bases(&self) -> &[TypeRef] {
        match self {
            Self::Builtin(_) => &[],
            Self::Class(class) => &class.bases,
        }
    }

    /// Reflexive, transitive subclass test.
    pub fn is_subclass_of(&self, other: &TypeRef) -> bool {
        if self == other || matches!(other, Self::Builtin(Kind::Object)) {
            return true;
        }
        self.bases().iter().any(|base| base.is_subclass_of(other))
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::Class(a), Self::Class(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for TypeRef {}

impl From<Kind> for TypeRef {
    fn from(kind: Kind) -> Self {
        Self::Builtin(kind)
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin(kind) => write!(f, "{kind}"),
            Self::Class(class) => write!(f, "class {}", class.name),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_identity_not_name() {
        let a = TypeRef::class("Point", vec![]);
        let b = TypeRef::class("Point", vec![]);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_subclass_walks_bases() {
        let shape = TypeRef::class("Shape", vec![]);
        let polygon = TypeRef::class("Polygon", vec![shape.clone()]);
        let square = TypeRef::class("Square", vec![polygon.clone()]);

        assert!(square.is_subclass_of(&shape));
        assert!(square.is_subclass_of(&polygon));
        assert!(square.is_subclass_of(&square));
        assert!(!shape.is_subclass_of(&square));
    }

    #[test]
    fn test_everything_is_object() {
        for kind in Kind::all_kinds() {
            assert!(TypeRef::from(*kind).is_subclass_of(&TypeRef::object()));
        }
        assert!(TypeRef::class("A", vec![]).is_subclass_of(&TypeRef::object()));
    }

    #[test]
    fn test_builtins_unrelated() {
        let int = TypeRef::from(Kind::Int);
        let boolean = TypeRef::from(Kind::Bool);
        assert!(!boolean.is_subclass_of(&int));
        assert!(!int.is_subclass_of(&boolean));
    }

    #[test]
    fn test_kind_from_str() {
        for kind in Kind::all_kinds() {
            assert_eq!(kind.as_str().parse::<Kind>(), Ok(*kind));
        }
        assert!("integer".parse::<Kind>().is_err());
    }
}

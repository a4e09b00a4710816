//! # Host Values
//!
//! [`Value`] is the dynamically-typed value stored in slots. Scalars and
//! plain containers are owned outright. [`Atom`] and [`ObservantSequence`]
//! are shared handles: cloning one clones the handle, so a sequence read
//! out of a slot and mutated in place is the same sequence the slot holds.
//!
//! A plain `List` and an `ObservantSequence` with the same elements
//! compare equal.

use std::fmt;

use crate::atom::Atom;
use crate::observant::ObservantSequence;
use crate::types::{Kind, TypeRef};

/// A dynamically-typed attribute value.
#[derive(Debug, Clone)]
pub enum Value {
    /// The absent value.
    None,
    /// A boolean.
    Bool(bool),
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit float.
    Float(f64),
    /// A byte string.
    Bytes(Vec<u8>),
    /// A text string.
    Str(String),
    /// An immutable sequence.
    Tuple(Vec<Value>),
    /// A mutable sequence.
    List(Vec<Value>),
    /// An ordered mapping.
    Dict(Vec<(Value, Value)>),
    /// A type object.
    Type(TypeRef),
    /// An instance of a schema-defined class.
    Atom(Atom),
    /// A self-validating list bound to an owning instance.
    Sequence(ObservantSequence),
}

impl Value {
    /// Runtime type of this value.
    pub fn type_ref(&self) -> TypeRef {
        match self {
            Self::None => Kind::None.into(),
            Self::Bool(_) => Kind::Bool.into(),
            Self::Int(_) => Kind::Int.into(),
            Self::Float(_) => Kind::Float.into(),
            Self::Bytes(_) => Kind::Bytes.into(),
            Self::Str(_) => Kind::Str.into(),
            Self::Tuple(_) => Kind::Tuple.into(),
            Self::List(_) | Self::Sequence(_) => Kind::List.into(),
            Self::Dict(_) => Kind::Dict.into(),
            Self::Type(_) => Kind::Type.into(),
            Self::Atom(atom) => atom.schema().class_type().clone(),
        }
    }

    /// Name of the runtime type.
    pub fn type_name(&self) -> String {
        self.type_ref().name().to_string()
    }

    /// Is-instance test against a type.
    pub fn is_instance_of(&self, ty: &TypeRef) -> bool {
        self.type_ref().is_subclass_of(ty)
    }

    /// The integer, if this is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The float, if this is one.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The text, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The observant sequence handle, if this is one.
    pub fn as_sequence(&self) -> Option<&ObservantSequence> {
        match self {
            Self::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    /// The instance handle, if this is one.
    pub fn as_atom(&self) -> Option<&Atom> {
        match self {
            Self::Atom(atom) => Some(atom),
            _ => None,
        }
    }

    /// Converts a JSON document into a value.
    ///
    /// Arrays become lists, objects become dicts with string keys, and
    /// integers outside the `i64` range become floats.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::None,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Self::List(items.iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => Self::Dict(
                map.iter()
                    .map(|(k, v)| (Self::Str(k.clone()), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts this value into JSON.
    ///
    /// Instances render as objects of their set slots. An instance already
    /// being rendered higher up the tree renders as its class name, which
    /// keeps reference cycles finite.
    pub fn to_json(&self) -> serde_json::Value {
        let mut visiting = Vec::new();
        self.to_json_inner(&mut visiting)
    }

    fn to_json_inner(&self, visiting: &mut Vec<usize>) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::None => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Int(i) => Json::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Self::Bytes(bytes) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
            Self::Str(s) => Json::String(s.clone()),
            Self::Tuple(items) | Self::List(items) => {
                Json::Array(items.iter().map(|v| v.to_json_inner(visiting)).collect())
            }
            Self::Sequence(seq) => Json::Array(
                seq.to_vec()
                    .iter()
                    .map(|v| v.to_json_inner(visiting))
                    .collect(),
            ),
            Self::Dict(pairs) => {
                let mut map = serde_json::Map::new();
                for (key, value) in pairs {
                    let key = match key {
                        Self::Str(s) => s.clone(),
                        other => other.to_string(),
                    };
                    map.insert(key, value.to_json_inner(visiting));
                }
                Json::Object(map)
            }
            Self::Type(ty) => Json::String(ty.name().to_string()),
            Self::Atom(atom) => {
                if visiting.contains(&atom.id()) {
                    return Json::String(format!("<{}>", atom.class_name()));
                }
                visiting.push(atom.id());
                let mut map = serde_json::Map::new();
                for (name, value) in atom.snapshot() {
                    map.insert(name, value.to_json_inner(visiting));
                }
                visiting.pop();
                Json::Object(map)
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Dict(a), Self::Dict(b)) => a == b,
            (Self::Type(a), Self::Type(b)) => a == b,
            (Self::Atom(a), Self::Atom(b)) => a == b,
            (Self::Sequence(a), Self::Sequence(b)) => a == b,
            (Self::Sequence(seq), Self::List(items)) | (Self::List(items), Self::Sequence(seq)) => {
                seq.with_items(|current| current == items.as_slice())
            }
            _ => false,
        }
    }
}

fn write_joined<'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl IntoIterator<Item = &'a Value>,
) -> fmt::Result {
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Bytes(bytes) => write!(f, "b{:?}", String::from_utf8_lossy(bytes)),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Tuple(items) => {
                f.write_str("(")?;
                write_joined(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Self::List(items) => {
                f.write_str("[")?;
                write_joined(f, items)?;
                f.write_str("]")
            }
            Self::Sequence(seq) => {
                let items = seq.to_vec();
                f.write_str("[")?;
                write_joined(f, &items)?;
                f.write_str("]")
            }
            Self::Dict(pairs) => {
                f.write_str("{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            Self::Type(ty) => write!(f, "<type {ty}>"),
            Self::Atom(atom) => write!(f, "<{} instance>", atom.class_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<TypeRef> for Value {
    fn from(ty: TypeRef) -> Self {
        Self::Type(ty)
    }
}

impl From<Atom> for Value {
    fn from(atom: Atom) -> Self {
        Self::Atom(atom)
    }
}

impl From<ObservantSequence> for Value {
    fn from(seq: ObservantSequence) -> Self {
        Self::Sequence(seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_roundtrip_scalars_and_containers() {
        let doc = json!({"age": 30, "name": "ada", "ratio": 0.5, "tags": ["a", "b"], "x": null});
        let value = Value::from_json(&doc);
        assert_eq!(value.to_json(), doc);
    }

    #[test]
    fn test_large_unsigned_becomes_float() {
        let value = Value::from_json(&json!(u64::MAX));
        assert!(matches!(value, Value::Float(_)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from(5).to_string(), "5");
        assert_eq!(Value::from("a").to_string(), "\"a\"");
        assert_eq!(Value::from(1.0).to_string(), "1.0");
        assert_eq!(Value::Tuple(vec![Value::Int(1)]).to_string(), "(1,)");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::None]).to_string(),
            "[1, none]"
        );
        assert_eq!(
            Value::Dict(vec![(Value::from("k"), Value::from(true))]).to_string(),
            "{\"k\": true}"
        );
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::from(1).type_name(), "int");
        assert_eq!(Value::Bytes(vec![]).type_name(), "bytes");
        assert_eq!(Value::Type(Kind::Int.into()).type_name(), "type");
    }

    #[test]
    fn test_float_nan_is_not_equal() {
        assert_ne!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }
}

//! # Validation Modes
//!
//! Defines the closed [`Mode`] enumeration. Every member declares exactly
//! one mode, and the validation engine dispatches on it with an
//! exhaustive `match`, so adding a variant forces every consumer to
//! handle it at compile time.
//!
//! | Family | Modes |
//! |--------|-------|
//! | pass-through | `no_op` |
//! | exact type | `bool`, `int`, `float`, `bytes`, `string` |
//! | numeric cast | `int_cast`, `float_cast` |
//! | structural | `tuple`, `list`, `dict`, `container_list` |
//! | type relation | `instance`, `typed`, `subclass` |
//! | membership | `enum` |
//! | bounds | `range`, `float_range` |
//! | coercion | `coerced` |
//! | delegated | `callable`, `object_method`, `member_method` |
//! | legacy | `str`, `str_promote`, `unicode`, `unicode_promote` |

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Validation/coercion strategy selected by a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Accepts any value unchanged.
    NoOp,
    /// Exactly a boolean.
    Bool,
    /// Exactly an integer.
    Int,
    /// Exactly a float.
    Float,
    /// Exactly a byte string.
    Bytes,
    /// Exactly a text string.
    String,
    /// Anything convertible to an integer.
    IntCast,
    /// Anything convertible to a float.
    FloatCast,
    /// A tuple, optionally with validated elements.
    Tuple,
    /// A list, optionally with validated elements.
    List,
    /// A dict, optionally with validated keys and values.
    Dict,
    /// A list wrapped in an observant sequence after acceptance.
    ContainerList,
    /// An instance of one of the context types.
    Instance,
    /// A value whose type is exactly the context type.
    Typed,
    /// A type that derives from one of the context types.
    Subclass,
    /// One of a fixed set of values.
    Enum,
    /// An integer within inclusive bounds.
    Range,
    /// A float within inclusive bounds.
    FloatRange,
    /// The target type, or something a coercer turns into it.
    Coerced,
    /// Whatever a user-supplied validator returns.
    Callable,
    /// Whatever a method on the owning class returns.
    ObjectMethod,
    /// Whatever a method attached to the member returns.
    MemberMethod,
    /// Legacy byte-string mode.
    Str,
    /// Legacy byte-string mode with text promotion.
    StrPromote,
    /// Legacy text mode.
    Unicode,
    /// Legacy text mode with byte promotion.
    UnicodePromote,
}

/// Total number of modes, legacy ones included.
pub const MODE_COUNT: usize = 26;

impl Mode {
    /// Returns every mode in declaration order.
    pub fn all_modes() -> &'static [Mode] {
        &[
            Self::NoOp,
            Self::Bool,
            Self::Int,
            Self::Float,
            Self::Bytes,
            Self::String,
            Self::IntCast,
            Self::FloatCast,
            Self::Tuple,
            Self::List,
            Self::Dict,
            Self::ContainerList,
            Self::Instance,
            Self::Typed,
            Self::Subclass,
            Self::Enum,
            Self::Range,
            Self::FloatRange,
            Self::Coerced,
            Self::Callable,
            Self::ObjectMethod,
            Self::MemberMethod,
            Self::Str,
            Self::StrPromote,
            Self::Unicode,
            Self::UnicodePromote,
        ]
    }

    /// Returns the snake_case identifier, matching the serde format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoOp => "no_op",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bytes => "bytes",
            Self::String => "string",
            Self::IntCast => "int_cast",
            Self::FloatCast => "float_cast",
            Self::Tuple => "tuple",
            Self::List => "list",
            Self::Dict => "dict",
            Self::ContainerList => "container_list",
            Self::Instance => "instance",
            Self::Typed => "typed",
            Self::Subclass => "subclass",
            Self::Enum => "enum",
            Self::Range => "range",
            Self::FloatRange => "float_range",
            Self::Coerced => "coerced",
            Self::Callable => "callable",
            Self::ObjectMethod => "object_method",
            Self::MemberMethod => "member_method",
            Self::Str => "str",
            Self::StrPromote => "str_promote",
            Self::Unicode => "unicode",
            Self::UnicodePromote => "unicode_promote",
        }
    }

    /// Whether this is one of the deprecated text-encoding modes.
    pub fn is_legacy(&self) -> bool {
        matches!(
            self,
            Self::Str | Self::StrPromote | Self::Unicode | Self::UnicodePromote
        )
    }

    /// Whether validators for this mode observe the slot's previous value.
    pub fn reads_old_value(&self) -> bool {
        matches!(
            self,
            Self::Callable | Self::ObjectMethod | Self::MemberMethod
        )
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown mode name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mode: {0:?}")]
pub struct UnknownMode(pub String);

impl FromStr for Mode {
    type Err = UnknownMode;

    /// Parse a mode from the identifiers produced by [`Mode::as_str()`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all_modes()
            .iter()
            .copied()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_modes_count() {
        assert_eq!(Mode::all_modes().len(), MODE_COUNT);
    }

    #[test]
    fn test_all_modes_unique() {
        let mut seen = std::collections::HashSet::new();
        for mode in Mode::all_modes() {
            assert!(seen.insert(mode), "Duplicate mode: {mode}");
        }
    }

    #[test]
    fn test_as_str_roundtrip() {
        for mode in Mode::all_modes() {
            let parsed: Mode = mode
                .as_str()
                .parse()
                .unwrap_or_else(|e| panic!("Failed to parse {mode}: {e}"));
            assert_eq!(*mode, parsed);
        }
    }

    #[test]
    fn test_from_str_invalid() {
        assert!("Int".parse::<Mode>().is_err());
        assert!("".parse::<Mode>().is_err());
        assert_eq!(
            "integer".parse::<Mode>(),
            Err(UnknownMode("integer".into()))
        );
    }

    #[test]
    fn test_serde_format_matches_as_str() {
        for mode in Mode::all_modes() {
            let json = serde_json::to_string(mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode.as_str()));
        }
    }

    #[test]
    fn test_legacy_modes() {
        let legacy: Vec<_> = Mode::all_modes()
            .iter()
            .filter(|m| m.is_legacy())
            .collect();
        assert_eq!(
            legacy,
            vec![
                &Mode::Str,
                &Mode::StrPromote,
                &Mode::Unicode,
                &Mode::UnicodePromote
            ]
        );
    }
}

//! # Error Types
//!
//! Every failure the runtime can report. All errors use `thiserror` for
//! derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - [`DefinitionError`] is raised only while a class schema is built and
//!   is fatal to that class.
//! - [`ValidationError`] is raised only while a candidate value is being
//!   accepted on a live instance. It is recoverable: the slot or sequence
//!   it targeted is left exactly as it was.
//! - [`LegacyModeError`] is neither of the above. It is a migration signal
//!   for the deprecated text-encoding modes and never describes bad data.

use thiserror::Error;

use crate::mode::Mode;

/// A member whose mode and context do not form a valid pairing.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid definition for '{attribute}' ({mode} mode): {reason}")]
pub struct DefinitionError {
    /// Name of the offending attribute.
    pub attribute: String,
    /// Mode declared for the attribute.
    pub mode: Mode,
    /// Structural reason the definition was refused.
    pub reason: String,
}

/// A candidate value refused by a member's validation rule.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", render_validation(.attribute, .value, .expected, .element, .message))]
pub struct ValidationError {
    /// Name of the attribute the value was destined for.
    pub attribute: String,
    /// Rendering of the offending value.
    pub value: String,
    /// What the member's mode expected instead.
    pub expected: String,
    /// Position of the failing element for container operations.
    pub element: Option<usize>,
    /// Message supplied by the member's error handler or validator.
    pub message: Option<String>,
}

fn render_validation(
    attribute: &str,
    value: &str,
    expected: &str,
    element: &Option<usize>,
    message: &Option<String>,
) -> String {
    let mut out = match element {
        Some(index) => format!(
            "invalid element {index} for '{attribute}': expected {expected}, got {value}"
        ),
        None => format!("invalid value for '{attribute}': expected {expected}, got {value}"),
    };
    if let Some(message) = message {
        out.push_str(" (");
        out.push_str(message);
        out.push(')');
    }
    out
}

/// A deprecated text-encoding mode was used.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("unsupported legacy mode {mode} on '{attribute}'")]
pub struct LegacyModeError {
    /// Name of the attribute declaring the legacy mode.
    pub attribute: String,
    /// The legacy mode itself.
    pub mode: Mode,
}

/// Failure while building a class schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// A member failed its definition-time check.
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// A member declared a legacy mode.
    #[error(transparent)]
    LegacyMode(#[from] LegacyModeError),
}

/// Failure of a runtime operation on an instance or one of its values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AtomError {
    /// The candidate value was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The member uses a legacy mode.
    #[error(transparent)]
    LegacyMode(#[from] LegacyModeError),

    /// The class declares no attribute with this name.
    #[error("'{class}' has no attribute '{attribute}'")]
    UnknownAttribute {
        /// Class name of the instance.
        class: String,
        /// Requested attribute name.
        attribute: String,
    },

    /// A sequence position outside the current bounds.
    #[error("index {index} out of range for '{attribute}' (len {len})")]
    IndexOutOfRange {
        /// Attribute holding the sequence.
        attribute: String,
        /// Requested position.
        index: usize,
        /// Length of the sequence at the time of the request.
        len: usize,
    },

    /// A write reached an instance after its slots were torn down.
    #[error("instance of '{class}' has been torn down")]
    TornDown {
        /// Class name of the instance.
        class: String,
    },
}

impl AtomError {
    /// The validation error, if this is a rejection.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

/// Failure while reading or compiling a schema descriptor document.
#[derive(Error, Debug)]
pub enum DescriptorError {
    /// The document is not valid YAML.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The document is not valid JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The document could not be read.
    #[error("io error reading '{path}': {source}")]
    Io {
        /// Path of the document.
        path: String,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },

    /// Two classes in one document share a name.
    #[error("class '{class}' is declared more than once")]
    DuplicateClass {
        /// The repeated class name.
        class: String,
    },

    /// A class names a base that was not declared before it.
    #[error("class '{class}' derives from unknown class '{base}'")]
    UnknownBase {
        /// Declaring class.
        class: String,
        /// Missing base class name.
        base: String,
    },

    /// A type name is neither a builtin kind nor a known class.
    #[error("'{class}.{member}' references unknown type '{name}'")]
    UnknownType {
        /// Declaring class.
        class: String,
        /// Declaring member.
        member: String,
        /// Unresolved type name.
        name: String,
    },

    /// A coercer, validator or member method name is missing from the registry.
    #[error("'{class}.{member}' references unregistered {kind} '{name}'")]
    Unregistered {
        /// Declaring class.
        class: String,
        /// Declaring member.
        member: String,
        /// Which registry table was searched.
        kind: &'static str,
        /// Unresolved name.
        name: String,
    },

    /// A member field holds a value of the wrong shape for its mode.
    #[error("'{class}.{member}' field '{field}': {reason}")]
    InvalidField {
        /// Declaring class.
        class: String,
        /// Declaring member.
        member: String,
        /// Offending field.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// The compiled class failed its definition-time check.
    #[error("class '{class}': {source}")]
    Schema {
        /// Class being built.
        class: String,
        /// Build failure.
        #[source]
        source: SchemaError,
    },
}

//! # Legacy Modes
//!
//! `str`, `str_promote`, `unicode` and `unicode_promote` date from a
//! runtime that distinguished byte text from unicode text. They are
//! recognized so that old descriptors fail loudly with a
//! [`LegacyModeError`] instead of being read as some other mode.

use crate::error::LegacyModeError;
use crate::mode::Mode;

/// Builds the error reported for a legacy `mode` on `attribute`.
pub fn reject(attribute: &str, mode: Mode) -> LegacyModeError {
    tracing::warn!(
        attribute,
        mode = %mode,
        replacement = ?replacement(mode),
        "legacy validation mode is not supported"
    );
    LegacyModeError {
        attribute: attribute.to_string(),
        mode,
    }
}

/// Mode to migrate a legacy member to, or `None` for a supported mode.
///
/// The promote variants accepted other text types and converted them,
/// which is what `coerced` with a string target does.
pub fn replacement(mode: Mode) -> Option<Mode> {
    match mode {
        Mode::Str | Mode::Unicode => Some(Mode::String),
        Mode::StrPromote | Mode::UnicodePromote => Some(Mode::Coerced),
        _ => None,
    }
}

//! # atomrt-cli — Command-Line Interface
//!
//! ## Subcommands
//!
//! - `check` — build every class in a descriptor and print its layout
//! - `validate` — construct an instance from a JSON document
//! - `modes` — list the validation modes
//!
//! ## Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | success |
//! | 1 | a schema or instance failed validation |
//! | 2 | operational error (unreadable file, malformed input) |
//!
//! ## Crate Policy
//!
//! - Argument parsing lives in `main.rs`; handlers live here and write to
//!   a caller-supplied writer.
//! - Handlers delegate to `atomrt-core`; no validation logic here.

pub mod check;
pub mod modes;
pub mod validate;

use std::path::Path;

use anyhow::Context;

use atomrt_core::{DescriptorError, Registry, SchemaDocument, SchemaSet};

pub const EXIT_OK: u8 = 0;
pub const EXIT_INVALID: u8 = 1;
pub const EXIT_OPERATIONAL: u8 = 2;

/// Reads a descriptor, failing only on operational problems.
pub(crate) fn read_document(path: &Path) -> anyhow::Result<SchemaDocument> {
    SchemaDocument::from_path(path)
        .with_context(|| format!("failed to load schema descriptor {}", path.display()))
}

/// Compiles a descriptor against the standard registry.
pub(crate) fn compile(document: &SchemaDocument) -> Result<SchemaSet, DescriptorError> {
    document.compile(&Registry::standard())
}

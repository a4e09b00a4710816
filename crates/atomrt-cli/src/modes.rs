//! # Modes Subcommand
//!
//! Lists every validation mode. Legacy modes are flagged with the mode to
//! migrate to.

use std::io::Write;

use anyhow::Result;

use atomrt_core::{legacy, Mode};

use crate::EXIT_OK;

/// Execute the modes subcommand.
pub fn run_modes(out: &mut impl Write) -> Result<u8> {
    for mode in Mode::all_modes() {
        match legacy::replacement(*mode) {
            Some(replacement) => {
                writeln!(out, "{:<16} legacy, migrate to {replacement}", mode.as_str())?
            }
            None => writeln!(out, "{}", mode.as_str())?,
        }
    }
    Ok(EXIT_OK)
}

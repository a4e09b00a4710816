//! # Validate Subcommand
//!
//! Constructs an instance of one class from a JSON object and reports
//! every rejected field. Each field is written exactly as an attribute
//! assignment would write it; defaults of the remaining members are then
//! materialized, so an inconsistent default is reported too.

use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Args;

use atomrt_core::{Atom, AtomError, ClassSchema, Value};

use crate::{compile, read_document, EXIT_INVALID, EXIT_OK};

/// Arguments for the `atomrt validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Schema descriptor (`.json` for JSON, anything else for YAML).
    #[arg(long, value_name = "FILE")]
    pub schema: PathBuf,

    /// Class to instantiate.
    #[arg(long = "class", value_name = "NAME")]
    pub class: String,

    /// JSON document holding one object of attribute values.
    #[arg(value_name = "INSTANCE")]
    pub instance: PathBuf,
}

/// Execute the validate subcommand.
///
/// Returns exit code: 0 on success, 1 on validation failure, 2 on operational error.
pub fn run_validate(args: &ValidateArgs, out: &mut impl Write) -> Result<u8> {
    let document = read_document(&args.schema)?;
    let set = match compile(&document) {
        Ok(set) => set,
        Err(e) => {
            writeln!(out, "FAIL: {e}")?;
            return Ok(EXIT_INVALID);
        }
    };
    let schema = set.get(&args.class).with_context(|| {
        format!(
            "class '{}' is not declared in {}",
            args.class,
            args.schema.display()
        )
    })?;

    let content = std::fs::read_to_string(&args.instance)
        .with_context(|| format!("cannot read instance {}", args.instance.display()))?;
    let json: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("invalid JSON in {}", args.instance.display()))?;
    let serde_json::Value::Object(fields) = json else {
        anyhow::bail!(
            "instance {} must hold a JSON object",
            args.instance.display()
        );
    };

    let (atom, failures) = build_instance(schema, &fields);
    let code = if failures.is_empty() {
        let rendered = serde_json::to_string_pretty(&Value::Atom(atom.clone()).to_json())?;
        writeln!(out, "OK: {}", schema.name())?;
        writeln!(out, "{rendered}")?;
        EXIT_OK
    } else {
        writeln!(
            out,
            "FAIL: {} ({} error(s))",
            schema.name(),
            failures.len()
        )?;
        for failure in &failures {
            writeln!(out, "  - {failure}")?;
        }
        EXIT_INVALID
    };
    atom.teardown();
    Ok(code)
}

/// Writes every field of `fields` into a fresh instance, then reads every
/// member once. Returns the instance and every error encountered.
pub fn build_instance(
    schema: &Rc<ClassSchema>,
    fields: &serde_json::Map<String, serde_json::Value>,
) -> (Atom, Vec<AtomError>) {
    let atom = Atom::new(schema);
    let mut failures = Vec::new();
    for (name, value) in fields {
        if let Err(e) = atom.set(name, Value::from_json(value)) {
            tracing::debug!(attribute = %name, error = %e, "field rejected");
            failures.push(e);
        }
    }
    for member in schema.members() {
        if let Err(e) = atom.get(member.name()) {
            failures.push(e);
        }
    }
    (atom, failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use atomrt_core::Member;
    use serde_json::json;

    fn person() -> Rc<ClassSchema> {
        ClassSchema::build(
            "Person",
            [
                ("age", Member::range(0, 150)),
                ("tags", Member::container_list(Some(Member::string()))),
            ],
        )
        .unwrap()
    }

    fn fields(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn test_build_instance_accepts_valid_fields() {
        let (atom, failures) = build_instance(&person(), &fields(json!({"age": 30, "tags": ["a"]})));
        assert!(failures.is_empty());
        assert_eq!(atom.get("age").unwrap(), Some(Value::Int(30)));
    }

    #[test]
    fn test_build_instance_collects_every_failure() {
        let (_, failures) = build_instance(
            &person(),
            &fields(json!({"age": 200, "tags": ["a", 5], "height": 2})),
        );
        assert_eq!(failures.len(), 3);
        assert!(failures
            .iter()
            .any(|e| matches!(e, AtomError::UnknownAttribute { attribute, .. } if attribute == "height")));
    }
}

//! # Check Subcommand
//!
//! Builds every class in a schema descriptor and prints its slot layout:
//!
//! ```text
//! Person (3 slots, table capacity 4)
//!   [0] name: string = ""
//!   [1] age: range [0, 150]
//!   [2] tags: container_list <string>
//! ```

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use atomrt_core::{ClassSchema, Context, DefaultValue, Member, TypeRef};

use crate::{compile, read_document, EXIT_INVALID, EXIT_OK};

/// Arguments for the `atomrt check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Schema descriptor (`.json` for JSON, anything else for YAML).
    #[arg(long, value_name = "FILE")]
    pub schema: PathBuf,
}

/// Execute the check subcommand.
///
/// Returns exit code: 0 when every class builds, 1 when a class is
/// rejected. Unreadable or malformed files are errors.
pub fn run_check(args: &CheckArgs, out: &mut impl Write) -> Result<u8> {
    let document = read_document(&args.schema)?;
    let set = match compile(&document) {
        Ok(set) => set,
        Err(e) => {
            writeln!(out, "FAIL: {e}")?;
            return Ok(EXIT_INVALID);
        }
    };

    tracing::info!(classes = set.len(), "built schema descriptor");
    for schema in set.iter() {
        write_layout(out, schema)?;
    }
    writeln!(out, "{} class(es) OK", set.len())?;
    Ok(EXIT_OK)
}

/// Writes the slot layout of one class.
pub fn write_layout(out: &mut impl Write, schema: &ClassSchema) -> io::Result<()> {
    let bases: Vec<&str> = schema
        .class_type()
        .bases()
        .iter()
        .map(TypeRef::name)
        .collect();
    let name = if bases.is_empty() {
        schema.name().to_string()
    } else {
        format!("{}({})", schema.name(), bases.join(", "))
    };
    writeln!(
        out,
        "{name} ({} slots, table capacity {})",
        schema.count(),
        schema.table_capacity()
    )?;
    for (index, member) in schema.members().iter().enumerate() {
        writeln!(
            out,
            "  [{index}] {}: {}{}{}",
            member.name(),
            member.mode(),
            context_detail(member),
            default_detail(member)
        )?;
    }
    Ok(())
}

fn element(member: Option<&std::rc::Rc<Member>>) -> String {
    member.map_or_else(|| "any".to_string(), |m| m.mode().to_string())
}

fn bound<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "..".to_string(), |v| v.to_string())
}

fn type_names(types: &[TypeRef]) -> String {
    types.iter().map(TypeRef::name).collect::<Vec<_>>().join(", ")
}

fn context_detail(member: &Member) -> String {
    match member.context() {
        Context::Item(item) => format!(" <{}>", element(item.as_ref())),
        Context::Dict { key, value } => {
            format!(" <{}, {}>", element(key.as_ref()), element(value.as_ref()))
        }
        Context::Types(types) | Context::Coerce { types, .. } => {
            format!(" ({})", type_names(types))
        }
        Context::Choices(items) => {
            let items: Vec<String> = items.iter().map(ToString::to_string).collect();
            format!(" [{}]", items.join(", "))
        }
        Context::IntBounds { low, high } => format!(" [{}, {}]", bound(*low), bound(*high)),
        Context::FloatBounds { low, high } => format!(" [{}, {}]", bound(*low), bound(*high)),
        Context::Method(name) => format!(" ({name})"),
        Context::None | Context::Validator(_) | Context::MemberMethod(_) => String::new(),
    }
}

fn default_detail(member: &Member) -> String {
    match member.default_value() {
        Some(DefaultValue::Static(value)) => format!(" = {value}"),
        Some(DefaultValue::Factory(_)) => " = <factory>".to_string(),
        None => String::new(),
    }
}

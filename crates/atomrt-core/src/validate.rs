//! # Validation Engine
//!
//! Two entry points:
//!
//! - [`check_definition`] runs once per member while a schema is built and
//!   verifies that the member's context is structurally valid for its mode.
//! - [`validate`] runs on every write and turns a candidate into the
//!   accepted value or a [`ValidationError`].
//!
//! The engine holds no state. It may call user code (validators, methods,
//! coercers, error handlers), and that code may read or write attributes
//! of the owning instance; the engine never holds a borrow of the owner
//! while doing so.
//!
//! ## Error handlers
//!
//! When a member carrying an error handler rejects a value, the handler is
//! called with the [`Rejection`] before the error is returned. Its message,
//! if any, replaces the one on the error. A failing element is reported to
//! the element member's handler first and then to the containing member's
//! handler; the outermost message wins.

use std::rc::Rc;

use crate::atom::Atom;
use crate::error::{AtomError, DefinitionError, SchemaError, ValidationError};
use crate::legacy;
use crate::member::{Context, Member, Rejection};
use crate::mode::Mode;
use crate::observant::ObservantSequence;
use crate::schema::MethodTable;
use crate::types::TypeRef;
use crate::value::Value;

// ─── Definition-time check ───────────────────────────────────────────

fn definition_error(member: &Member, reason: impl Into<String>) -> SchemaError {
    SchemaError::Definition(DefinitionError {
        attribute: member.name().to_string(),
        mode: member.mode(),
        reason: reason.into(),
    })
}

fn wrong_context(member: &Member, wanted: &str) -> SchemaError {
    definition_error(
        member,
        format!(
            "{} mode requires {wanted}, got {}",
            member.mode(),
            member.context().describe()
        ),
    )
}

fn check_optional(member: Option<&Rc<Member>>, methods: &MethodTable) -> Result<(), SchemaError> {
    match member {
        Some(member) => check_definition(member, methods),
        None => Ok(()),
    }
}

/// Verifies that `member`'s context is structurally valid for its mode.
///
/// `methods` is the method table of the class under construction, against
/// which `object_method` names are resolved. Element members are checked
/// recursively.
pub fn check_definition(member: &Member, methods: &MethodTable) -> Result<(), SchemaError> {
    match (member.mode(), member.context()) {
        (mode, _) if mode.is_legacy() => {
            Err(legacy::reject(member.name(), mode).into())
        }

        (
            Mode::NoOp
            | Mode::Bool
            | Mode::Int
            | Mode::Float
            | Mode::Bytes
            | Mode::String
            | Mode::IntCast
            | Mode::FloatCast,
            Context::None,
        ) => Ok(()),

        (Mode::Tuple | Mode::List | Mode::ContainerList, Context::Item(item)) => {
            check_optional(item.as_ref(), methods)
        }

        (Mode::Dict, Context::Dict { key, value }) => {
            check_optional(key.as_ref(), methods)?;
            check_optional(value.as_ref(), methods)
        }

        (Mode::Instance | Mode::Subclass, Context::Types(types)) => {
            if types.is_empty() {
                return Err(definition_error(member, "type list is empty"));
            }
            Ok(())
        }

        (Mode::Typed, Context::Types(types)) => {
            if types.len() != 1 {
                return Err(definition_error(
                    member,
                    format!("typed mode takes exactly one type, got {}", types.len()),
                ));
            }
            Ok(())
        }

        (Mode::Enum, Context::Choices(items)) => {
            if items.is_empty() {
                return Err(definition_error(member, "enum has no allowed values"));
            }
            Ok(())
        }

        (Mode::Range, Context::IntBounds { low, high }) => match (low, high) {
            (Some(low), Some(high)) if low > high => Err(definition_error(
                member,
                format!("lower bound {low} exceeds upper bound {high}"),
            )),
            _ => Ok(()),
        },

        (Mode::FloatRange, Context::FloatBounds { low, high }) => {
            if low.is_some_and(f64::is_nan) || high.is_some_and(f64::is_nan) {
                return Err(definition_error(member, "bounds must not be NaN"));
            }
            match (low, high) {
                (Some(low), Some(high)) if low > high => Err(definition_error(
                    member,
                    format!("lower bound {low} exceeds upper bound {high}"),
                )),
                _ => Ok(()),
            }
        }

        (Mode::Coerced, Context::Coerce { types, .. }) => {
            if types.is_empty() {
                return Err(definition_error(member, "coercion target list is empty"));
            }
            Ok(())
        }

        (Mode::Callable, Context::Validator(_)) => Ok(()),

        (Mode::ObjectMethod, Context::Method(name)) => {
            if name.is_empty() {
                return Err(definition_error(member, "method name is empty"));
            }
            if !methods.contains_key(name) {
                return Err(definition_error(
                    member,
                    format!("class has no method '{name}'"),
                ));
            }
            Ok(())
        }

        (Mode::MemberMethod, Context::MemberMethod(_)) => Ok(()),

        (mode, _) => Err(wrong_context(member, expected_context(mode))),
    }
}

fn expected_context(mode: Mode) -> &'static str {
    match mode {
        Mode::NoOp
        | Mode::Bool
        | Mode::Int
        | Mode::Float
        | Mode::Bytes
        | Mode::String
        | Mode::IntCast
        | Mode::FloatCast
        | Mode::Str
        | Mode::StrPromote
        | Mode::Unicode
        | Mode::UnicodePromote => Context::None.describe(),
        Mode::Tuple | Mode::List | Mode::ContainerList => "an element member",
        Mode::Dict => "key/value members",
        Mode::Instance | Mode::Typed | Mode::Subclass => "a type list",
        Mode::Enum => "a set of choices",
        Mode::Range => "integer bounds",
        Mode::FloatRange => "float bounds",
        Mode::Coerced => "types and a coercer",
        Mode::Callable => "a validator",
        Mode::ObjectMethod => "a method name",
        Mode::MemberMethod => "a member method",
    }
}

// ─── Runtime validation ──────────────────────────────────────────────

enum Failure {
    Rejected {
        value: Value,
        expected: String,
        element: Option<usize>,
        message: Option<String>,
    },
    Legacy,
}

fn rejected(value: Value, expected: impl Into<String>) -> Failure {
    Failure::Rejected {
        value,
        expected: expected.into(),
        element: None,
        message: None,
    }
}

fn rejected_with(value: Value, expected: impl Into<String>, message: String) -> Failure {
    Failure::Rejected {
        value,
        expected: expected.into(),
        element: None,
        message: Some(message),
    }
}

/// Validates `candidate` for `member`.
///
/// `owner` is the instance the value is destined for; it is required by
/// the delegated modes and passed to error handlers. `old` is the value
/// currently held, if any. Container modes validate every element with the
/// element member and return a freshly built container; `container_list`
/// wraps it in an [`ObservantSequence`] bound to `owner`.
pub fn validate(
    member: &Rc<Member>,
    owner: Option<&Atom>,
    old: Option<&Value>,
    candidate: Value,
) -> Result<Value, AtomError> {
    match check(member, owner, old, candidate) {
        Ok(value) => {
            tracing::trace!(attribute = member.name(), mode = %member.mode(), "accepted value");
            Ok(value)
        }
        Err(failure) => Err(finish(member, owner, failure)),
    }
}

/// Validates one element destined for position `index` of a container
/// held by `container`.
pub(crate) fn validate_element(
    container: &Rc<Member>,
    owner: Option<&Atom>,
    index: usize,
    old: Option<&Value>,
    candidate: Value,
) -> Result<Value, AtomError> {
    let Some(item) = container.item() else {
        return Ok(candidate);
    };
    check(item, owner, old, candidate).map_err(|failure| {
        finish(container, owner, element_failure(item, owner, failure, index))
    })
}

fn at_element(failure: Failure, index: usize) -> Failure {
    match failure {
        Failure::Rejected {
            value,
            expected,
            message,
            ..
        } => Failure::Rejected {
            value,
            expected,
            element: Some(index),
            message,
        },
        Failure::Legacy => Failure::Legacy,
    }
}

// Gives `member`'s error handler, if any, the chance to replace the
// failure's message.
fn consult(member: &Member, owner: Option<&Atom>, failure: Failure) -> Failure {
    let Some(handler) = member.error_handler() else {
        return failure;
    };
    match failure {
        Failure::Legacy => Failure::Legacy,
        Failure::Rejected {
            value,
            expected,
            element,
            message,
        } => {
            let message = handler
                .call(&Rejection {
                    attribute: member.name(),
                    mode: member.mode(),
                    value: &value,
                    expected: &expected,
                    element,
                    owner,
                })
                .or(message);
            Failure::Rejected {
                value,
                expected,
                element,
                message,
            }
        }
    }
}

// Failure of the element member `item` at position `index`.
fn element_failure(item: &Member, owner: Option<&Atom>, failure: Failure, index: usize) -> Failure {
    consult(item, owner, at_element(failure, index))
}

fn finish(member: &Member, owner: Option<&Atom>, failure: Failure) -> AtomError {
    match consult(member, owner, failure) {
        Failure::Legacy => legacy::reject(member.name(), member.mode()).into(),
        Failure::Rejected {
            value,
            expected,
            element,
            message,
        } => {
            tracing::debug!(
                attribute = member.name(),
                mode = %member.mode(),
                expected = %expected,
                element = ?element,
                "rejected value"
            );
            ValidationError {
                attribute: member.name().to_string(),
                value: value.to_string(),
                expected,
                element,
                message,
            }
            .into()
        }
    }
}

fn check_items(
    item: Option<&Rc<Member>>,
    owner: Option<&Atom>,
    items: Vec<Value>,
) -> Result<Vec<Value>, Failure> {
    let Some(item) = item else {
        return Ok(items);
    };
    let mut accepted = Vec::with_capacity(items.len());
    for (index, value) in items.into_iter().enumerate() {
        let value = check(item, owner, None, value)
            .map_err(|f| element_failure(item, owner, f, index))?;
        accepted.push(value);
    }
    Ok(accepted)
}

fn check_optional_item(
    member: Option<&Rc<Member>>,
    owner: Option<&Atom>,
    value: Value,
    index: usize,
) -> Result<Value, Failure> {
    match member {
        Some(member) => check(member, owner, None, value)
            .map_err(|f| element_failure(member, owner, f, index)),
        None => Ok(value),
    }
}

fn describe_types(types: &[TypeRef]) -> String {
    let names: Vec<&str> = types.iter().map(TypeRef::name).collect();
    match names.as_slice() {
        [one] => (*one).to_string(),
        _ => format!("one of ({})", names.join(", ")),
    }
}

fn describe_bounds<T: std::fmt::Display>(kind: &str, low: Option<T>, high: Option<T>) -> String {
    match (low, high) {
        (Some(low), Some(high)) => format!("{kind} in [{low}, {high}]"),
        (Some(low), None) => format!("{kind} >= {low}"),
        (None, Some(high)) => format!("{kind} <= {high}"),
        (None, None) => kind.to_string(),
    }
}

fn within<T: PartialOrd>(x: T, low: Option<T>, high: Option<T>) -> bool {
    low.map_or(true, |low| x >= low) && high.map_or(true, |high| x <= high)
}

fn cast_int(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Float(f) if f.is_finite() && *f >= i64::MIN as f64 && *f < i64::MAX as f64 => {
            Some(f.trunc() as i64)
        }
        Value::Str(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn cast_float(value: &Value) -> Option<f64> {
    match value {
        Value::Float(f) => Some(*f),
        Value::Int(i) => Some(*i as f64),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Str(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn require_owner<'a>(owner: Option<&'a Atom>, candidate: &Value) -> Result<&'a Atom, Failure> {
    owner.ok_or_else(|| rejected(candidate.clone(), "a live owning instance"))
}

fn check(
    member: &Rc<Member>,
    owner: Option<&Atom>,
    old: Option<&Value>,
    candidate: Value,
) -> Result<Value, Failure> {
    match (member.mode(), member.context()) {
        (Mode::Str | Mode::StrPromote | Mode::Unicode | Mode::UnicodePromote, _) => {
            Err(Failure::Legacy)
        }

        (Mode::NoOp, _) => Ok(candidate),

        (Mode::Bool, _) => match candidate {
            Value::Bool(_) => Ok(candidate),
            other => Err(rejected(other, "bool")),
        },
        (Mode::Int, _) => match candidate {
            Value::Int(_) => Ok(candidate),
            other => Err(rejected(other, "int")),
        },
        (Mode::Float, _) => match candidate {
            Value::Float(_) => Ok(candidate),
            other => Err(rejected(other, "float")),
        },
        (Mode::Bytes, _) => match candidate {
            Value::Bytes(_) => Ok(candidate),
            other => Err(rejected(other, "bytes")),
        },
        (Mode::String, _) => match candidate {
            Value::Str(_) => Ok(candidate),
            other => Err(rejected(other, "str")),
        },

        (Mode::IntCast, _) => match cast_int(&candidate) {
            Some(i) => Ok(Value::Int(i)),
            None => Err(rejected(candidate, "a value convertible to int")),
        },
        (Mode::FloatCast, _) => match cast_float(&candidate) {
            Some(f) => Ok(Value::Float(f)),
            None => Err(rejected(candidate, "a value convertible to float")),
        },

        (Mode::Tuple, Context::Item(item)) => match candidate {
            Value::Tuple(items) => Ok(Value::Tuple(check_items(item.as_ref(), owner, items)?)),
            other => Err(rejected(other, "tuple")),
        },
        (Mode::List, Context::Item(item)) => match candidate {
            Value::List(items) => Ok(Value::List(check_items(item.as_ref(), owner, items)?)),
            Value::Sequence(seq) => Ok(Value::List(check_items(
                item.as_ref(),
                owner,
                seq.to_vec(),
            )?)),
            other => Err(rejected(other, "list")),
        },
        (Mode::ContainerList, Context::Item(item)) => {
            let items = match candidate {
                Value::List(items) => items,
                Value::Sequence(seq) => seq.to_vec(),
                other => return Err(rejected(other, "list")),
            };
            let items = check_items(item.as_ref(), owner, items)?;
            Ok(Value::Sequence(ObservantSequence::bind(owner, member, items)))
        }
        (Mode::Dict, Context::Dict { key, value }) => match candidate {
            Value::Dict(pairs) => {
                let mut accepted = Vec::with_capacity(pairs.len());
                for (index, (k, v)) in pairs.into_iter().enumerate() {
                    let k = check_optional_item(key.as_ref(), owner, k, index)?;
                    let v = check_optional_item(value.as_ref(), owner, v, index)?;
                    accepted.push((k, v));
                }
                Ok(Value::Dict(accepted))
            }
            other => Err(rejected(other, "dict")),
        },

        (Mode::Instance, Context::Types(types)) => {
            if types.iter().any(|ty| candidate.is_instance_of(ty)) {
                Ok(candidate)
            } else {
                Err(rejected(
                    candidate,
                    format!("an instance of {}", describe_types(types)),
                ))
            }
        }
        (Mode::Typed, Context::Types(types)) => {
            if types.iter().any(|ty| candidate.type_ref() == *ty) {
                Ok(candidate)
            } else {
                Err(rejected(
                    candidate,
                    format!("a value of exact type {}", describe_types(types)),
                ))
            }
        }
        (Mode::Subclass, Context::Types(types)) => {
            let derives = match &candidate {
                Value::Type(ty) => types.iter().any(|base| ty.is_subclass_of(base)),
                _ => false,
            };
            if derives {
                Ok(candidate)
            } else {
                Err(rejected(
                    candidate,
                    format!("a subclass of {}", describe_types(types)),
                ))
            }
        }

        (Mode::Enum, Context::Choices(items)) => {
            if items.contains(&candidate) {
                Ok(candidate)
            } else {
                let choices: Vec<String> = items.iter().map(Value::to_string).collect();
                Err(rejected(
                    candidate,
                    format!("one of [{}]", choices.join(", ")),
                ))
            }
        }

        (Mode::Range, Context::IntBounds { low, high }) => {
            let inside = candidate
                .as_int()
                .is_some_and(|i| within(i, *low, *high));
            if inside {
                Ok(candidate)
            } else {
                Err(rejected(candidate, describe_bounds("int", *low, *high)))
            }
        }
        (Mode::FloatRange, Context::FloatBounds { low, high }) => {
            let inside = candidate
                .as_float()
                .is_some_and(|f| !f.is_nan() && within(f, *low, *high));
            if inside {
                Ok(candidate)
            } else {
                Err(rejected(candidate, describe_bounds("float", *low, *high)))
            }
        }

        (Mode::Coerced, Context::Coerce { types, coercer }) => {
            if types.iter().any(|ty| candidate.is_instance_of(ty)) {
                return Ok(candidate);
            }
            let expected = format!("a value coercible to {}", describe_types(types));
            match coercer.call(&candidate) {
                Ok(coerced) if types.iter().any(|ty| coerced.is_instance_of(ty)) => Ok(coerced),
                Ok(coerced) => Err(rejected_with(
                    candidate,
                    expected,
                    format!("coercion produced {}", coerced.type_name()),
                )),
                Err(message) => Err(rejected_with(candidate, expected, message)),
            }
        }

        (Mode::Callable, Context::Validator(validator)) => {
            let owner = require_owner(owner, &candidate)?;
            let rendered = candidate.clone();
            validator
                .call(owner, member.name(), old, candidate)
                .map_err(|message| rejected_with(rendered, "a value accepted by the validator", message))
        }
        (Mode::ObjectMethod, Context::Method(name)) => {
            let owner = require_owner(owner, &candidate)?;
            let Some(method) = owner.schema().method(name).cloned() else {
                return Err(rejected(candidate, format!("a resolvable method '{name}'")));
            };
            let rendered = candidate.clone();
            method
                .call(owner, member.name(), old, candidate)
                .map_err(|message| rejected_with(rendered, format!("a value accepted by '{name}'"), message))
        }
        (Mode::MemberMethod, Context::MemberMethod(method)) => {
            let owner = require_owner(owner, &candidate)?;
            let rendered = candidate.clone();
            method
                .call(member, owner, old, candidate)
                .map_err(|message| rejected_with(rendered, "a value accepted by the member method", message))
        }

        (mode, _) => Err(rejected(
            candidate,
            format!("a member whose context suits {mode} mode"),
        )),
    }
}

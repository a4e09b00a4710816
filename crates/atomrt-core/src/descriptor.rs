//! # Schema Descriptors
//!
//! Declarative YAML or JSON documents that compile into class schemas:
//!
//! ```yaml
//! classes:
//!   - name: Person
//!     members:
//!       - name: age
//!         mode: range
//!         low: 0
//!         high: 150
//!       - name: tags
//!         mode: container_list
//!         item: { mode: string }
//!   - name: Employee
//!     base: Person
//!     members:
//!       - name: employer
//!         mode: string
//! ```
//!
//! Classes compile in document order; a `base` must name a class declared
//! earlier in the same document. Names of Rust code (coercers, validators,
//! member methods, extra types) resolve against a [`Registry`]. Every
//! compiled class still passes the definition-time check of
//! [`SchemaBuilder::build`].
//!
//! ## Type names
//!
//! `types` entries resolve to, in order: a class declared earlier in the
//! document, a type registered in the [`Registry`], or a builtin kind
//! (`int`, `str`, `object`, ...).

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DescriptorError;
use crate::member::{Coercer, Context, Member, MemberMethod, Validator};
use crate::mode::Mode;
use crate::schema::{ClassSchema, SchemaBuilder};
use crate::types::{Kind, TypeRef};
use crate::value::Value;

// ─── Document model ──────────────────────────────────────────────────

/// Top-level descriptor document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    pub classes: Vec<ClassDescriptor>,
}

/// One class declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    /// Method name → registered validator name, for `object_method` members.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub methods: BTreeMap<String, String>,
    #[serde(default)]
    pub members: Vec<MemberDescriptor>,
}

/// One member declaration. Element members (`item`, `key`, `value`) omit
/// `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemberDescriptor {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub mode: Mode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<serde_json::Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<serde_json::Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Box<MemberDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Box<MemberDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Box<MemberDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coercer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl MemberDescriptor {
    /// Descriptor with only a mode set.
    pub fn new(name: impl Into<String>, mode: Mode) -> Self {
        Self {
            name: name.into(),
            mode,
            low: None,
            high: None,
            items: None,
            types: None,
            item: None,
            key: None,
            value: None,
            coercer: None,
            validator: None,
            method: None,
            default: None,
        }
    }
}

// ─── Registry ────────────────────────────────────────────────────────

/// Named Rust code that descriptors may reference.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    coercers: HashMap<String, Coercer>,
    validators: HashMap<String, Validator>,
    member_methods: HashMap<String, MemberMethod>,
    types: HashMap<String, TypeRef>,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the stock coercers `int`, `float` and `str` and the
    /// validators `non_empty` and `non_negative`.
    pub fn standard() -> Self {
        Self::new()
            .with_coercer("int", Coercer::new(coerce_int))
            .with_coercer("float", Coercer::new(coerce_float))
            .with_coercer("str", Coercer::new(|value| Ok(Value::Str(display_text(value)))))
            .with_validator(
                "non_empty",
                Validator::new(|_, name, _, value| {
                    let empty = match &value {
                        Value::Str(s) => s.is_empty(),
                        Value::List(items) | Value::Tuple(items) => items.is_empty(),
                        _ => false,
                    };
                    if empty {
                        return Err(format!("{name} must not be empty"));
                    }
                    Ok(value)
                }),
            )
            .with_validator(
                "non_negative",
                Validator::new(|_, name, _, value| {
                    let ok = match &value {
                        Value::Int(i) => *i >= 0,
                        Value::Float(f) => *f >= 0.0,
                        _ => false,
                    };
                    if !ok {
                        return Err(format!("{name} must be a non-negative number"));
                    }
                    Ok(value)
                }),
            )
    }

    pub fn with_coercer(mut self, name: impl Into<String>, coercer: Coercer) -> Self {
        self.coercers.insert(name.into(), coercer);
        self
    }

    pub fn with_validator(mut self, name: impl Into<String>, validator: Validator) -> Self {
        self.validators.insert(name.into(), validator);
        self
    }

    pub fn with_member_method(mut self, name: impl Into<String>, method: MemberMethod) -> Self {
        self.member_methods.insert(name.into(), method);
        self
    }

    pub fn with_type(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.types.insert(name.into(), ty);
        self
    }
}

fn coerce_int(value: &Value) -> Result<Value, String> {
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| format!("cannot parse {s:?} as int: {e}")),
        other => Err(format!("cannot convert {} to int", other.type_name())),
    }
}

fn coerce_float(value: &Value) -> Result<Value, String> {
    match value {
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| format!("cannot parse {s:?} as float: {e}")),
        other => Err(format!("cannot convert {} to float", other.type_name())),
    }
}

fn display_text(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        Value::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        other => other.to_string(),
    }
}

// ─── Loading ─────────────────────────────────────────────────────────

impl SchemaDocument {
    pub fn from_yaml_str(content: &str) -> Result<Self, DescriptorError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self, DescriptorError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Reads a descriptor file. `.json` files parse as JSON, everything
    /// else as YAML.
    pub fn from_path(path: &Path) -> Result<Self, DescriptorError> {
        let content = std::fs::read_to_string(path).map_err(|source| DescriptorError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "json" => Self::from_json_str(&content),
            _ => Self::from_yaml_str(&content),
        }
    }

    /// Compiles every class in document order.
    pub fn compile(&self, registry: &Registry) -> Result<SchemaSet, DescriptorError> {
        let mut set = SchemaSet::default();
        for class in &self.classes {
            if set.get(&class.name).is_some() {
                return Err(DescriptorError::DuplicateClass {
                    class: class.name.clone(),
                });
            }
            let schema = Compiler {
                registry,
                set: &set,
                class: &class.name,
            }
            .class(class)?;
            set.push(schema);
        }
        tracing::debug!(classes = set.len(), "compiled schema document");
        Ok(set)
    }
}

/// Reads and compiles the descriptor at `path`.
pub fn load(path: &Path, registry: &Registry) -> Result<SchemaSet, DescriptorError> {
    SchemaDocument::from_path(path)?.compile(registry)
}

/// Compiled classes of one document, in declaration order.
#[derive(Debug, Default)]
pub struct SchemaSet {
    schemas: Vec<Rc<ClassSchema>>,
    by_name: HashMap<String, usize>,
}

impl SchemaSet {
    pub fn get(&self, name: &str) -> Option<&Rc<ClassSchema>> {
        self.by_name.get(name).map(|&index| &self.schemas[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<ClassSchema>> + '_ {
        self.schemas.iter()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    fn push(&mut self, schema: Rc<ClassSchema>) {
        self.by_name
            .insert(schema.name().to_string(), self.schemas.len());
        self.schemas.push(schema);
    }
}

// ─── Compilation ─────────────────────────────────────────────────────

struct Compiler<'a> {
    registry: &'a Registry,
    set: &'a SchemaSet,
    class: &'a str,
}

impl Compiler<'_> {
    fn class(&self, desc: &ClassDescriptor) -> Result<Rc<ClassSchema>, DescriptorError> {
        let mut builder = SchemaBuilder::new(&desc.name);
        if let Some(base) = &desc.base {
            let schema = self.set.get(base).ok_or_else(|| DescriptorError::UnknownBase {
                class: desc.name.clone(),
                base: base.clone(),
            })?;
            builder = builder.derive(schema);
        }
        for (method, validator) in &desc.methods {
            let resolved = self.lookup(
                &self.registry.validators,
                method,
                "validator",
                validator,
            )?;
            builder = builder.method(method, resolved);
        }
        for member in &desc.members {
            if member.name.is_empty() {
                return Err(self.invalid(member, "name", "class members must be named"));
            }
            builder = builder.member(&member.name, self.member(&member.name, member)?);
        }
        builder.build().map_err(|source| DescriptorError::Schema {
            class: desc.name.clone(),
            source,
        })
    }

    fn member(&self, name: &str, desc: &MemberDescriptor) -> Result<Member, DescriptorError> {
        let context = match desc.mode {
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
            | Mode::UnicodePromote => Context::None,

            Mode::Tuple | Mode::List | Mode::ContainerList => {
                Context::Item(self.element(name, desc.item.as_deref())?)
            }
            Mode::Dict => Context::Dict {
                key: self.element(name, desc.key.as_deref())?,
                value: self.element(name, desc.value.as_deref())?,
            },

            Mode::Instance | Mode::Typed | Mode::Subclass => {
                Context::Types(self.types(name, desc)?)
            }
            Mode::Enum => {
                let items = desc
                    .items
                    .as_ref()
                    .ok_or_else(|| self.invalid(desc, "items", "required for enum mode"))?;
                Context::Choices(items.iter().map(Value::from_json).collect())
            }
            Mode::Range => Context::IntBounds {
                low: self.int_bound(desc, "low", desc.low.as_ref())?,
                high: self.int_bound(desc, "high", desc.high.as_ref())?,
            },
            Mode::FloatRange => Context::FloatBounds {
                low: desc.low.as_ref().and_then(serde_json::Number::as_f64),
                high: desc.high.as_ref().and_then(serde_json::Number::as_f64),
            },
            Mode::Coerced => {
                let coercer = self.required(desc, "coercer", desc.coercer.as_deref())?;
                Context::Coerce {
                    types: self.types(name, desc)?,
                    coercer: self.lookup(&self.registry.coercers, name, "coercer", coercer)?,
                }
            }
            Mode::Callable => {
                let validator = self.required(desc, "validator", desc.validator.as_deref())?;
                Context::Validator(self.lookup(
                    &self.registry.validators,
                    name,
                    "validator",
                    validator,
                )?)
            }
            Mode::ObjectMethod => {
                Context::Method(self.required(desc, "method", desc.method.as_deref())?.to_string())
            }
            Mode::MemberMethod => {
                let method = self.required(desc, "method", desc.method.as_deref())?;
                Context::MemberMethod(self.lookup(
                    &self.registry.member_methods,
                    name,
                    "member method",
                    method,
                )?)
            }
        };

        let mut member = Member::new(desc.mode, context);
        if let Some(default) = &desc.default {
            member = member.with_default(Value::from_json(default));
        } else if let Context::Choices(items) = member.context() {
            if let Some(first) = items.first().cloned() {
                member = member.with_default(first);
            }
        }
        Ok(member)
    }

    fn element(
        &self,
        name: &str,
        desc: Option<&MemberDescriptor>,
    ) -> Result<Option<Rc<Member>>, DescriptorError> {
        desc.map(|desc| self.member(name, desc).map(Rc::new))
            .transpose()
    }

    fn types(&self, name: &str, desc: &MemberDescriptor) -> Result<Vec<TypeRef>, DescriptorError> {
        let names = desc
            .types
            .as_ref()
            .ok_or_else(|| self.invalid(desc, "types", format!("required for {} mode", desc.mode)))?;
        names
            .iter()
            .map(|ty| {
                self.resolve_type(ty).ok_or_else(|| DescriptorError::UnknownType {
                    class: self.class.to_string(),
                    member: name.to_string(),
                    name: ty.clone(),
                })
            })
            .collect()
    }

    fn resolve_type(&self, name: &str) -> Option<TypeRef> {
        if let Some(schema) = self.set.get(name) {
            return Some(schema.class_type().clone());
        }
        if let Some(ty) = self.registry.types.get(name) {
            return Some(ty.clone());
        }
        Kind::from_str(name).ok().map(TypeRef::from)
    }

    fn int_bound(
        &self,
        desc: &MemberDescriptor,
        field: &'static str,
        bound: Option<&serde_json::Number>,
    ) -> Result<Option<i64>, DescriptorError> {
        match bound {
            None => Ok(None),
            Some(number) => number
                .as_i64()
                .map(Some)
                .ok_or_else(|| self.invalid(desc, field, format!("{number} is not an integer"))),
        }
    }

    fn required<'d>(
        &self,
        desc: &MemberDescriptor,
        field: &'static str,
        value: Option<&'d str>,
    ) -> Result<&'d str, DescriptorError> {
        value.ok_or_else(|| self.invalid(desc, field, format!("required for {} mode", desc.mode)))
    }

    fn lookup<T: Clone>(
        &self,
        table: &HashMap<String, T>,
        member: &str,
        kind: &'static str,
        name: &str,
    ) -> Result<T, DescriptorError> {
        table
            .get(name)
            .cloned()
            .ok_or_else(|| DescriptorError::Unregistered {
                class: self.class.to_string(),
                member: member.to_string(),
                kind,
                name: name.to_string(),
            })
    }

    fn invalid(
        &self,
        desc: &MemberDescriptor,
        field: &'static str,
        reason: impl Into<String>,
    ) -> DescriptorError {
        DescriptorError::InvalidField {
            class: self.class.to_string(),
            member: desc.name.clone(),
            field,
            reason: reason.into(),
        }
    }
}

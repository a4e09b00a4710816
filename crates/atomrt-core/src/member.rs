//! # Members
//!
//! A [`Member`] describes one declared attribute: its [`Mode`], the
//! mode-specific [`Context`], an optional default and an optional error
//! handler. Members are built by value, handed to a schema builder which
//! names them and assigns their slot index, and are immutable from then
//! on. Every instance of the class shares the same `Rc<Member>`.
//!
//! Element members (the `item`, `key` and `value` of container modes) are
//! members in their own right. They carry the name of the attribute that
//! contains them and never own a slot.

use std::fmt;
use std::rc::Rc;

use crate::atom::Atom;
use crate::mode::Mode;
use crate::types::TypeRef;
use crate::value::Value;

type ValidatorFn = dyn Fn(&Atom, &str, Option<&Value>, Value) -> Result<Value, String>;
type MemberMethodFn = dyn Fn(&Member, &Atom, Option<&Value>, Value) -> Result<Value, String>;

/// User-supplied validator: `(owner, attribute, old, candidate) -> accepted`.
///
/// Used by `callable` members and as the method type of `object_method`
/// members. An `Err` becomes a validation error carrying its message.
#[derive(Clone)]
pub struct Validator(Rc<ValidatorFn>);

impl Validator {
    /// Wraps a closure.
    pub fn new(
        f: impl Fn(&Atom, &str, Option<&Value>, Value) -> Result<Value, String> + 'static,
    ) -> Self {
        Self(Rc::new(f))
    }

    pub(crate) fn call(
        &self,
        owner: &Atom,
        attribute: &str,
        old: Option<&Value>,
        candidate: Value,
    ) -> Result<Value, String> {
        (self.0)(owner, attribute, old, candidate)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator(..)")
    }
}

/// Validator attached to the member itself; receives the member first.
#[derive(Clone)]
pub struct MemberMethod(Rc<MemberMethodFn>);

impl MemberMethod {
    /// Wraps a closure.
    pub fn new(
        f: impl Fn(&Member, &Atom, Option<&Value>, Value) -> Result<Value, String> + 'static,
    ) -> Self {
        Self(Rc::new(f))
    }

    pub(crate) fn call(
        &self,
        member: &Member,
        owner: &Atom,
        old: Option<&Value>,
        candidate: Value,
    ) -> Result<Value, String> {
        (self.0)(member, owner, old, candidate)
    }
}

impl fmt::Debug for MemberMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MemberMethod(..)")
    }
}

/// Conversion attempted by `coerced` members on a type mismatch.
#[derive(Clone)]
pub struct Coercer(Rc<dyn Fn(&Value) -> Result<Value, String>>);

impl Coercer {
    /// Wraps a closure.
    pub fn new(f: impl Fn(&Value) -> Result<Value, String> + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub(crate) fn call(&self, candidate: &Value) -> Result<Value, String> {
        (self.0)(candidate)
    }
}

impl fmt::Debug for Coercer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Coercer(..)")
    }
}

/// Lazily invoked producer of a default value.
#[derive(Clone)]
pub struct DefaultFactory(Rc<dyn Fn(&Atom) -> Value>);

impl DefaultFactory {
    /// Wraps a closure.
    pub fn new(f: impl Fn(&Atom) -> Value + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub(crate) fn call(&self, owner: &Atom) -> Value {
        (self.0)(owner)
    }
}

impl fmt::Debug for DefaultFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DefaultFactory(..)")
    }
}

/// Everything known about a rejection, handed to an [`ErrorHandler`].
#[derive(Debug)]
pub struct Rejection<'a> {
    /// Attribute being validated.
    pub attribute: &'a str,
    /// Mode of the rejecting member.
    pub mode: Mode,
    /// The rejected value.
    pub value: &'a Value,
    /// Description of what was expected.
    pub expected: &'a str,
    /// Failing element position for container checks.
    pub element: Option<usize>,
    /// Instance the value was destined for, when still alive.
    pub owner: Option<&'a Atom>,
}

/// Observer of rejections. Its return value, when present, replaces the
/// error message; it has no way to accept the value.
#[derive(Clone)]
pub struct ErrorHandler(Rc<dyn Fn(&Rejection<'_>) -> Option<String>>);

impl ErrorHandler {
    /// Wraps a closure.
    pub fn new(f: impl Fn(&Rejection<'_>) -> Option<String> + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub(crate) fn call(&self, rejection: &Rejection<'_>) -> Option<String> {
        (self.0)(rejection)
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorHandler(..)")
    }
}

/// How a slot is populated when read before any write.
#[derive(Debug, Clone)]
pub enum DefaultValue {
    /// A fixed value, cloned into each instance.
    Static(Value),
    /// A factory invoked with the owning instance.
    Factory(DefaultFactory),
}

/// Mode-specific configuration.
#[derive(Debug, Clone)]
pub enum Context {
    /// No configuration (scalar and pass-through modes).
    None,
    /// Element member of `tuple`, `list` and `container_list`.
    Item(Option<Rc<Member>>),
    /// Key and value members of `dict`.
    Dict {
        /// Member validating keys.
        key: Option<Rc<Member>>,
        /// Member validating values.
        value: Option<Rc<Member>>,
    },
    /// Target types of `instance`, `typed` and `subclass`.
    Types(Vec<TypeRef>),
    /// Allowed values of `enum`.
    Choices(Vec<Value>),
    /// Inclusive bounds of `range`.
    IntBounds {
        /// Lower bound, if any.
        low: Option<i64>,
        /// Upper bound, if any.
        high: Option<i64>,
    },
    /// Inclusive bounds of `float_range`.
    FloatBounds {
        /// Lower bound, if any.
        low: Option<f64>,
        /// Upper bound, if any.
        high: Option<f64>,
    },
    /// Target types and coercer of `coerced`.
    Coerce {
        /// Accepted types.
        types: Vec<TypeRef>,
        /// Conversion tried on mismatch.
        coercer: Coercer,
    },
    /// Validator of `callable`.
    Validator(Validator),
    /// Method name of `object_method`.
    Method(String),
    /// Method of `member_method`.
    MemberMethod(MemberMethod),
}

impl Context {
    /// Short description used in definition errors.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::None => "no context",
            Self::Item(_) => "an element member",
            Self::Dict { .. } => "key/value members",
            Self::Types(_) => "a type list",
            Self::Choices(_) => "a set of choices",
            Self::IntBounds { .. } => "integer bounds",
            Self::FloatBounds { .. } => "float bounds",
            Self::Coerce { .. } => "types and a coercer",
            Self::Validator(_) => "a validator",
            Self::Method(_) => "a method name",
            Self::MemberMethod(_) => "a member method",
        }
    }
}

/// Descriptor of one declared attribute.
#[derive(Debug, Clone)]
pub struct Member {
    name: String,
    mode: Mode,
    context: Context,
    default: Option<DefaultValue>,
    error_handler: Option<ErrorHandler>,
    slot_index: Option<usize>,
}

impl Member {
    /// Creates an unnamed member from a raw mode/context pair.
    ///
    /// The pair is only checked when the member is built into a schema.
    pub fn new(mode: Mode, context: Context) -> Self {
        Self {
            name: String::new(),
            mode,
            context,
            default: None,
            error_handler: None,
            slot_index: None,
        }
    }

    /// Accepts anything.
    pub fn no_op() -> Self {
        Self::new(Mode::NoOp, Context::None)
    }

    /// Exactly a boolean.
    pub fn bool() -> Self {
        Self::new(Mode::Bool, Context::None)
    }

    /// Exactly an integer.
    pub fn int() -> Self {
        Self::new(Mode::Int, Context::None)
    }

    /// Exactly a float.
    pub fn float() -> Self {
        Self::new(Mode::Float, Context::None)
    }

    /// Exactly a byte string.
    pub fn bytes() -> Self {
        Self::new(Mode::Bytes, Context::None)
    }

    /// Exactly a text string.
    pub fn string() -> Self {
        Self::new(Mode::String, Context::None)
    }

    /// Converted to an integer.
    pub fn int_cast() -> Self {
        Self::new(Mode::IntCast, Context::None)
    }

    /// Converted to a float.
    pub fn float_cast() -> Self {
        Self::new(Mode::FloatCast, Context::None)
    }

    /// A tuple whose elements pass `item`, when given.
    pub fn tuple(item: Option<Member>) -> Self {
        Self::new(Mode::Tuple, Context::Item(item.map(Rc::new)))
    }

    /// A list whose elements pass `item`, when given.
    pub fn list(item: Option<Member>) -> Self {
        Self::new(Mode::List, Context::Item(item.map(Rc::new)))
    }

    /// A dict whose keys and values pass their members, when given.
    pub fn dict(key: Option<Member>, value: Option<Member>) -> Self {
        Self::new(
            Mode::Dict,
            Context::Dict {
                key: key.map(Rc::new),
                value: value.map(Rc::new),
            },
        )
    }

    /// A list that keeps validating its elements after assignment.
    pub fn container_list(item: Option<Member>) -> Self {
        Self::new(Mode::ContainerList, Context::Item(item.map(Rc::new)))
    }

    /// An instance of any of `types`.
    pub fn instance(types: Vec<TypeRef>) -> Self {
        Self::new(Mode::Instance, Context::Types(types))
    }

    /// A value of exactly type `ty`.
    pub fn typed(ty: TypeRef) -> Self {
        Self::new(Mode::Typed, Context::Types(vec![ty]))
    }

    /// A type deriving from any of `types`.
    pub fn subclass(types: Vec<TypeRef>) -> Self {
        Self::new(Mode::Subclass, Context::Types(types))
    }

    /// One of `items`. Defaults to the first item.
    pub fn enumeration(items: Vec<Value>) -> Self {
        let default = items.first().cloned().map(DefaultValue::Static);
        let mut member = Self::new(Mode::Enum, Context::Choices(items));
        member.default = default;
        member
    }

    /// An integer in `[low, high]`.
    pub fn range(low: i64, high: i64) -> Self {
        Self::range_bounds(Some(low), Some(high))
    }

    /// An integer within optional inclusive bounds.
    pub fn range_bounds(low: Option<i64>, high: Option<i64>) -> Self {
        Self::new(Mode::Range, Context::IntBounds { low, high })
    }

    /// A float in `[low, high]`.
    pub fn float_range(low: f64, high: f64) -> Self {
        Self::float_range_bounds(Some(low), Some(high))
    }

    /// A float within optional inclusive bounds.
    pub fn float_range_bounds(low: Option<f64>, high: Option<f64>) -> Self {
        Self::new(Mode::FloatRange, Context::FloatBounds { low, high })
    }

    /// One of `types`, or whatever `coercer` turns into one of them.
    pub fn coerced(types: Vec<TypeRef>, coercer: Coercer) -> Self {
        Self::new(Mode::Coerced, Context::Coerce { types, coercer })
    }

    /// Whatever `validator` returns.
    pub fn callable(validator: Validator) -> Self {
        Self::new(Mode::Callable, Context::Validator(validator))
    }

    /// Whatever the owning class's method `name` returns.
    pub fn object_method(name: impl Into<String>) -> Self {
        Self::new(Mode::ObjectMethod, Context::Method(name.into()))
    }

    /// Whatever `method` returns when called with this member.
    pub fn member_method(method: MemberMethod) -> Self {
        Self::new(Mode::MemberMethod, Context::MemberMethod(method))
    }

    /// Sets a static default.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Static(value.into()));
        self
    }

    /// Sets a default factory.
    pub fn with_factory(mut self, f: impl Fn(&Atom) -> Value + 'static) -> Self {
        self.default = Some(DefaultValue::Factory(DefaultFactory::new(f)));
        self
    }

    /// Sets the error handler.
    pub fn with_error_handler(
        mut self,
        f: impl Fn(&Rejection<'_>) -> Option<String> + 'static,
    ) -> Self {
        self.error_handler = Some(ErrorHandler::new(f));
        self
    }

    /// Attribute name; empty until declared on a schema.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validation mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Mode-specific context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Default, if any.
    pub fn default_value(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    /// Error handler, if any.
    pub fn error_handler(&self) -> Option<&ErrorHandler> {
        self.error_handler.as_ref()
    }

    /// Slot owned by this member; `None` for element members.
    pub fn slot_index(&self) -> Option<usize> {
        self.slot_index
    }

    /// Element member for sequence modes.
    pub fn item(&self) -> Option<&Rc<Member>> {
        match &self.context {
            Context::Item(item) => item.as_ref(),
            _ => None,
        }
    }

    /// Names this member and its element members.
    pub(crate) fn declare(&mut self, name: &str) {
        self.name = name.to_string();
        match &mut self.context {
            Context::Item(Some(item)) => Rc::make_mut(item).declare(name),
            Context::Dict { key, value } => {
                for member in [key, value].into_iter().flatten() {
                    Rc::make_mut(member).declare(name);
                }
            }
            _ => {}
        }
    }

    pub(crate) fn assign_slot(&mut self, index: usize) {
        self.slot_index = Some(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_names_element_members() {
        let mut member = Member::dict(Some(Member::string()), Some(Member::list(Some(Member::int()))));
        member.declare("scores");
        let Context::Dict { key, value } = member.context() else {
            panic!("expected dict context");
        };
        assert_eq!(key.as_ref().unwrap().name(), "scores");
        let value = value.as_ref().unwrap();
        assert_eq!(value.name(), "scores");
        assert_eq!(value.item().unwrap().name(), "scores");
    }

    #[test]
    fn test_enumeration_defaults_to_first() {
        let member = Member::enumeration(vec![Value::from("red"), Value::from("green")]);
        match member.default_value() {
            Some(DefaultValue::Static(v)) => assert_eq!(v, &Value::from("red")),
            other => panic!("unexpected default {other:?}"),
        }
    }

    #[test]
    fn test_new_member_is_unassigned() {
        let member = Member::int();
        assert_eq!(member.name(), "");
        assert_eq!(member.slot_index(), None);
        assert_eq!(member.mode(), Mode::Int);
    }
}

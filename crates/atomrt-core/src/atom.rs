//! # Atom Instances
//!
//! An [`Atom`] is one instance of a schema-defined class: a shared
//! [`ClassSchema`], a [`SlotStore`] sized to it, and the instance's change
//! observers. `Atom` is a cheap handle; cloning it clones the handle.
//!
//! ## Write protocol
//!
//! 1. Resolve the attribute through [`ClassSchema::lookup`].
//! 2. Read the old value (only for modes whose validator receives it).
//! 3. Validate with no borrow of the slot store held. Validators may read
//!    and write this instance, including the slot being written.
//! 4. Commit the accepted value in one short borrow.
//! 5. Notify observers, again with no borrow held.
//!
//! A rejected write never touches the slot, so no half-written state is
//! observable at any step.
//!
//! ## Defaults
//!
//! Reading an unset slot whose member has a default evaluates the default
//! (calling a factory with the instance), validates the result and stores
//! it. The factory runs at most once per unset period: later reads return
//! the stored value. Materializing a default is not reported to observers.
//!
//! ## Teardown
//!
//! Values held in slots may refer back to their owner, which `Rc` cannot
//! collect. [`Atom::teardown`] releases every slot exactly once and breaks
//! such cycles. Writes after teardown fail with [`AtomError::TornDown`].

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::change::{Change, ChangeKind, Observer};
use crate::error::AtomError;
use crate::member::{DefaultValue, Member};
use crate::observant::ObservantSequence;
use crate::schema::ClassSchema;
use crate::slots::SlotStore;
use crate::validate::validate;
use crate::value::Value;

pub(crate) struct AtomData {
    schema: Rc<ClassSchema>,
    slots: RefCell<SlotStore>,
    observers: RefCell<Vec<(Rc<str>, Observer)>>,
}

/// Handle to an instance of a schema-defined class.
#[derive(Clone)]
pub struct Atom(Rc<AtomData>);

impl Atom {
    /// Instance with every slot unset.
    pub fn new(schema: &Rc<ClassSchema>) -> Self {
        Self(Rc::new(AtomData {
            schema: Rc::clone(schema),
            slots: RefCell::new(SlotStore::new(schema.count())),
            observers: RefCell::new(Vec::new()),
        }))
    }

    /// Instance initialized from name/value pairs.
    ///
    /// Every value is written exactly as [`Atom::set`] would write it; the
    /// first rejection aborts construction.
    pub fn with_values<I, K>(schema: &Rc<ClassSchema>, values: I) -> Result<Self, AtomError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let atom = Self::new(schema);
        for (name, value) in values {
            atom.set(name.as_ref(), value)?;
        }
        Ok(atom)
    }

    pub fn schema(&self) -> &Rc<ClassSchema> {
        &self.0.schema
    }

    pub fn class_name(&self) -> &str {
        self.0.schema.name()
    }

    /// Identity of the instance, stable for its lifetime.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    /// Whether both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Atom) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // ─── Attribute access ────────────────────────────────────────────

    /// Current value of `name`, materializing its default if unset.
    ///
    /// Returns `Ok(None)` for an unset attribute without a default.
    pub fn get(&self, name: &str) -> Result<Option<Value>, AtomError> {
        let index = self.resolve(name)?;
        self.get_slot(index)
    }

    /// Validates `value` and stores the result in `name`.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<(), AtomError> {
        let index = self.resolve(name)?;
        self.set_slot(index, value.into())
    }

    /// Returns `name` to the unset state.
    pub fn delete(&self, name: &str) -> Result<(), AtomError> {
        let index = self.resolve(name)?;
        self.ensure_live()?;
        let previous = self.0.slots.borrow_mut().take(index);
        if previous.is_some() {
            let member = self.member_at(index)?;
            tracing::trace!(class = self.class_name(), attribute = member.name(), "deleted value");
            self.notify(Change {
                attribute: Rc::from(member.name()),
                kind: ChangeKind::Delete,
                old: previous,
                new: None,
            });
        }
        Ok(())
    }

    /// Whether `name` holds a value. Defaults are not materialized.
    pub fn is_set(&self, name: &str) -> Result<bool, AtomError> {
        let index = self.resolve(name)?;
        Ok(self.0.slots.borrow().is_set(index))
    }

    /// Slot-indexed read, for code holding an index from the schema.
    pub fn get_slot(&self, index: usize) -> Result<Option<Value>, AtomError> {
        let member = Rc::clone(self.member_at(index)?);
        {
            let slots = self.0.slots.borrow();
            if let Some(value) = slots.get(index) {
                return Ok(Some(value.clone()));
            }
            if slots.is_torn_down() {
                return Ok(None);
            }
        }

        let Some(default) = member.default_value() else {
            return Ok(None);
        };
        let candidate = match default {
            DefaultValue::Static(value) => value.clone(),
            DefaultValue::Factory(factory) => factory.call(self),
        };
        let value = validate(&member, Some(self), None, candidate)?;

        let mut slots = self.0.slots.borrow_mut();
        if slots.is_torn_down() {
            return Ok(None);
        }
        // The factory or validator may have written the slot itself.
        if let Some(existing) = slots.get(index) {
            return Ok(Some(existing.clone()));
        }
        slots.replace(index, value.clone());
        Ok(Some(value))
    }

    /// Slot-indexed write.
    pub fn set_slot(&self, index: usize, candidate: Value) -> Result<(), AtomError> {
        let member = Rc::clone(self.member_at(index)?);
        self.ensure_live()?;

        let old = if member.mode().reads_old_value() {
            self.0.slots.borrow().get(index).cloned()
        } else {
            None
        };
        let value = validate(&member, Some(self), old.as_ref(), candidate)?;
        drop(old);

        let new = self.has_observers(member.name()).then(|| value.clone());
        let previous = {
            let mut slots = self.0.slots.borrow_mut();
            if slots.is_torn_down() {
                return Err(self.torn_down());
            }
            slots.replace(index, value)
        };

        if let Some(new) = new {
            if previous.as_ref() != Some(&new) {
                let kind = match previous {
                    Some(_) => ChangeKind::Update,
                    None => ChangeKind::Create,
                };
                self.notify(Change {
                    attribute: Rc::from(member.name()),
                    kind,
                    old: previous,
                    new: Some(new),
                });
            }
        }
        Ok(())
    }

    // ─── Introspection ───────────────────────────────────────────────

    /// Visits every set slot in index order.
    ///
    /// The values are collected before the first call, so the visitor may
    /// read or write this instance.
    pub fn for_each_slot(&self, mut f: impl FnMut(&Member, &Value)) {
        let held = self.held();
        for (index, value) in &held {
            if let Some(member) = self.0.schema.member_at(*index) {
                f(member, value);
            }
        }
    }

    /// `(name, value)` for every set slot, in slot order.
    pub fn snapshot(&self) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        self.for_each_slot(|member, value| out.push((member.name().to_string(), value.clone())));
        out
    }

    fn held(&self) -> Vec<(usize, Value)> {
        let mut held = Vec::new();
        self.0
            .slots
            .borrow()
            .for_each_slot(|index, value| held.push((index, value.clone())));
        held
    }

    // ─── Lifecycle ───────────────────────────────────────────────────

    /// Releases every slot value and observer. Returns the number of slot
    /// values released; a second call releases nothing.
    pub fn teardown(&self) -> usize {
        let released = self.0.slots.borrow_mut().teardown();
        let observers = std::mem::take(&mut *self.0.observers.borrow_mut());
        let count = released.len();
        tracing::debug!(class = self.class_name(), released = count, "tore down instance");
        drop(observers);
        drop(released);
        count
    }

    pub fn is_torn_down(&self) -> bool {
        self.0.slots.borrow().is_torn_down()
    }

    // ─── Observers ───────────────────────────────────────────────────

    /// Registers `f` to receive every committed change to `name`.
    pub fn observe(&self, name: &str, f: impl Fn(&Change) + 'static) -> Result<(), AtomError> {
        let index = self.resolve(name)?;
        let member = self.member_at(index)?;
        self.0
            .observers
            .borrow_mut()
            .push((Rc::from(member.name()), Observer::new(f)));
        Ok(())
    }

    pub(crate) fn has_observers(&self, attribute: &str) -> bool {
        self.0
            .observers
            .borrow()
            .iter()
            .any(|(name, _)| &**name == attribute)
    }

    pub(crate) fn notify(&self, change: Change) {
        let observers: Vec<Observer> = self
            .0
            .observers
            .borrow()
            .iter()
            .filter(|(name, _)| *name == change.attribute)
            .map(|(_, observer)| observer.clone())
            .collect();
        for observer in observers {
            observer.call(&change);
        }
    }

    /// Whether slot `index` currently holds `seq` itself.
    pub(crate) fn holds_sequence(&self, index: usize, seq: &ObservantSequence) -> bool {
        match self.0.slots.borrow().get(index) {
            Some(Value::Sequence(held)) => held.ptr_eq(seq),
            _ => false,
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<AtomData> {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn from_weak(weak: &Weak<AtomData>) -> Option<Self> {
        weak.upgrade().map(Self)
    }

    // ─── Helpers ─────────────────────────────────────────────────────

    fn resolve(&self, name: &str) -> Result<usize, AtomError> {
        self.0
            .schema
            .lookup(name)
            .map(|(_, index)| index)
            .ok_or_else(|| AtomError::UnknownAttribute {
                class: self.class_name().to_string(),
                attribute: name.to_string(),
            })
    }

    fn member_at(&self, index: usize) -> Result<&Rc<Member>, AtomError> {
        self.0
            .schema
            .member_at(index)
            .ok_or_else(|| AtomError::UnknownAttribute {
                class: self.class_name().to_string(),
                attribute: format!("#{index}"),
            })
    }

    fn ensure_live(&self) -> Result<(), AtomError> {
        if self.is_torn_down() {
            return Err(self.torn_down());
        }
        Ok(())
    }

    fn torn_down(&self) -> AtomError {
        AtomError::TornDown {
            class: self.class_name().to_string(),
        }
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atom")
            .field("class", &self.class_name())
            .field("id", &format_args!("{:#x}", self.id()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::Validator;
    use std::cell::{Cell, RefCell};

    fn point() -> Rc<ClassSchema> {
        ClassSchema::build(
            "Point",
            [
                ("x", Member::int().with_default(0)),
                ("y", Member::float_cast()),
                ("label", Member::string()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_unset_without_default_reads_none() {
        let atom = Atom::new(&point());
        assert_eq!(atom.get("label").unwrap(), None);
        assert!(!atom.is_set("label").unwrap());
    }

    #[test]
    fn test_static_default_is_stored() {
        let atom = Atom::new(&point());
        assert!(!atom.is_set("x").unwrap());
        assert_eq!(atom.get("x").unwrap(), Some(Value::Int(0)));
        assert!(atom.is_set("x").unwrap());
    }

    #[test]
    fn test_set_stores_validated_value() {
        let atom = Atom::new(&point());
        atom.set("y", 3).unwrap();
        assert_eq!(atom.get("y").unwrap(), Some(Value::Float(3.0)));
    }

    #[test]
    fn test_rejected_write_leaves_slot() {
        let atom = Atom::new(&point());
        atom.set("x", 5).unwrap();
        let err = atom.set("x", "five").unwrap_err();
        assert_eq!(err.as_validation().unwrap().attribute, "x");
        assert_eq!(atom.get("x").unwrap(), Some(Value::Int(5)));
    }

    #[test]
    fn test_unknown_attribute() {
        let atom = Atom::new(&point());
        assert!(matches!(
            atom.set("z", 1),
            Err(AtomError::UnknownAttribute { ref attribute, .. }) if attribute == "z"
        ));
        assert!(atom.get_slot(9).is_err());
    }

    #[test]
    fn test_with_values_validates_each() {
        let schema = point();
        let atom = Atom::with_values(&schema, [("x", Value::from(1)), ("label", Value::from("p"))])
            .unwrap();
        assert_eq!(atom.get("label").unwrap(), Some(Value::from("p")));
        assert!(Atom::with_values(&schema, [("x", Value::from(1.5))]).is_err());
    }

    #[test]
    fn test_factory_runs_once() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let schema = ClassSchema::build(
            "F",
            [(
                "n",
                Member::int().with_factory(move |_| {
                    counter.set(counter.get() + 1);
                    Value::Int(7)
                }),
            )],
        )
        .unwrap();
        let atom = Atom::new(&schema);
        assert_eq!(atom.get("n").unwrap(), Some(Value::Int(7)));
        assert_eq!(atom.get("n").unwrap(), Some(Value::Int(7)));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_invalid_default_is_rejected() {
        let schema =
            ClassSchema::build("D", [("n", Member::int().with_factory(|_| Value::from("x")))])
                .unwrap();
        let atom = Atom::new(&schema);
        assert!(atom.get("n").is_err());
        assert!(!atom.is_set("n").unwrap());
    }

    #[test]
    fn test_delete_restores_default() {
        let atom = Atom::new(&point());
        atom.set("x", 9).unwrap();
        atom.delete("x").unwrap();
        assert!(!atom.is_set("x").unwrap());
        assert_eq!(atom.get("x").unwrap(), Some(Value::Int(0)));
    }

    #[test]
    fn test_snapshot_in_slot_order() {
        let atom = Atom::new(&point());
        atom.set("label", "p").unwrap();
        atom.set("x", 2).unwrap();
        assert_eq!(
            atom.snapshot(),
            vec![
                ("x".to_string(), Value::Int(2)),
                ("label".to_string(), Value::from("p"))
            ]
        );
    }

    #[test]
    fn test_teardown_once_and_blocks_writes() {
        let atom = Atom::new(&point());
        atom.set("x", 1).unwrap();
        atom.set("label", "p").unwrap();
        assert_eq!(atom.teardown(), 2);
        assert_eq!(atom.teardown(), 0);
        assert!(matches!(atom.set("x", 2), Err(AtomError::TornDown { .. })));
        assert!(matches!(atom.delete("x"), Err(AtomError::TornDown { .. })));
        assert_eq!(atom.get("x").unwrap(), None);
    }

    #[test]
    fn test_teardown_breaks_self_reference() {
        let schema = ClassSchema::build("Node", [("next", Member::no_op())]).unwrap();
        let atom = Atom::new(&schema);
        atom.set("next", atom.clone()).unwrap();
        let weak = atom.downgrade();
        atom.teardown();
        drop(atom);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_observers_see_create_update_delete() {
        let atom = Atom::new(&point());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        atom.observe("x", move |change| log.borrow_mut().push(change.kind))
            .unwrap();

        atom.set("x", 1).unwrap();
        atom.set("x", 1).unwrap();
        atom.set("x", 2).unwrap();
        let _ = atom.set("x", "bad");
        atom.delete("x").unwrap();
        atom.set("label", "ignored").unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![ChangeKind::Create, ChangeKind::Update, ChangeKind::Delete]
        );
    }

    #[test]
    fn test_validator_reads_sibling_during_write() {
        let schema = ClassSchema::build(
            "Interval",
            [
                ("low", Member::int()),
                (
                    "high",
                    Member::callable(Validator::new(|owner, _, _, value| {
                        let low = owner
                            .get("low")
                            .map_err(|e| e.to_string())?
                            .and_then(|v| v.as_int())
                            .unwrap_or(i64::MIN);
                        match value.as_int() {
                            Some(high) if high >= low => Ok(value),
                            _ => Err(format!("must be at least {low}")),
                        }
                    })),
                ),
            ],
        )
        .unwrap();
        let atom = Atom::new(&schema);
        atom.set("low", 10).unwrap();
        assert!(atom.set("high", 5).is_err());
        atom.set("high", 15).unwrap();
    }

    #[test]
    fn test_validator_sees_unchanged_slot_while_running() {
        let schema = ClassSchema::build(
            "Echo",
            [(
                "v",
                Member::callable(Validator::new(|owner, name, old, value| {
                    let current = owner.get(name).map_err(|e| e.to_string())?;
                    assert_eq!(current.as_ref(), old);
                    Ok(value)
                })),
            )],
        )
        .unwrap();
        let atom = Atom::new(&schema);
        atom.set("v", 1).unwrap();
        atom.set("v", 2).unwrap();
        assert_eq!(atom.get("v").unwrap(), Some(Value::Int(2)));
    }
}

//! # Observant Sequence
//!
//! The list value stored by `container_list` members. Every in-place
//! mutation validates the affected elements with the member's element
//! member before committing, so the sequence never holds an element that
//! failed validation.
//!
//! ## Invariants
//!
//! - Single-element operations commit only after validation succeeds.
//! - [`ObservantSequence::extend`] validates every candidate first and
//!   commits all or none of them.
//! - The owner is held through a `Weak`: a sequence never keeps its
//!   instance alive. A sequence whose owner is gone keeps validating,
//!   but rejects elements whose mode needs a live owner.
//! - No borrow of the element vector is held while user code (validators,
//!   error handlers, observers) runs. Positions are re-checked after
//!   validation in case that code shrank the sequence.
//! - A sequence never contains itself, directly or through nested
//!   containers and sequences, so rendering and comparison terminate.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::atom::{Atom, AtomData};
use crate::change::{Change, ChangeKind, ContainerOp};
use crate::error::{AtomError, ValidationError};
use crate::member::Member;
use crate::validate::validate_element;
use crate::value::Value;

struct SequenceState {
    items: RefCell<Vec<Value>>,
    owner: Weak<AtomData>,
    member: Rc<Member>,
}

/// Self-validating list bound to an owning instance and member.
#[derive(Clone)]
pub struct ObservantSequence(Rc<SequenceState>);

impl ObservantSequence {
    /// Wraps already-validated `items`.
    pub(crate) fn bind(owner: Option<&Atom>, member: &Rc<Member>, items: Vec<Value>) -> Self {
        Self(Rc::new(SequenceState {
            items: RefCell::new(items),
            owner: owner.map(Atom::downgrade).unwrap_or_default(),
            member: Rc::clone(member),
        }))
    }

    pub fn len(&self) -> usize {
        self.0.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.items.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.items.borrow().get(index).cloned()
    }

    /// Copy of the current elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.items.borrow().clone()
    }

    /// Runs `f` over the current elements without copying them.
    ///
    /// `f` must not mutate this sequence.
    pub fn with_items<R>(&self, f: impl FnOnce(&[Value]) -> R) -> R {
        f(&self.0.items.borrow())
    }

    /// The container member this sequence validates against.
    pub fn member(&self) -> &Rc<Member> {
        &self.0.member
    }

    /// The owning instance, while it is alive.
    pub fn owner(&self) -> Option<Atom> {
        Atom::from_weak(&self.0.owner)
    }

    pub fn ptr_eq(&self, other: &ObservantSequence) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // ─── Mutation ────────────────────────────────────────────────────

    pub fn append(&self, value: impl Into<Value>) -> Result<(), AtomError> {
        let owner = self.owner();
        let index = self.len();
        let value = self.check(owner.as_ref(), index, None, value.into())?;
        let added = self.observed(owner.as_ref()).then(|| value.clone());
        self.0.items.borrow_mut().push(value);
        self.notify(owner.as_ref(), ContainerOp::Append, None, added);
        Ok(())
    }

    /// Inserts at `index`, which may equal the length.
    pub fn insert(&self, index: usize, value: impl Into<Value>) -> Result<(), AtomError> {
        self.ensure_position(index, self.len())?;
        let owner = self.owner();
        let value = self.check(owner.as_ref(), index, None, value.into())?;
        let added = self.observed(owner.as_ref()).then(|| value.clone());
        {
            let mut items = self.0.items.borrow_mut();
            self.ensure_position(index, items.len())?;
            items.insert(index, value);
        }
        self.notify(owner.as_ref(), ContainerOp::Insert, None, added);
        Ok(())
    }

    /// Appends every value, or none of them.
    ///
    /// A rejection names the failing value's position within `values`.
    pub fn extend<I>(&self, values: I) -> Result<(), AtomError>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let owner = self.owner();
        let accepted = values
            .into_iter()
            .enumerate()
            .map(|(position, value)| self.check(owner.as_ref(), position, None, value.into()))
            .collect::<Result<Vec<_>, _>>()?;
        if accepted.is_empty() {
            return Ok(());
        }
        let added = self
            .observed(owner.as_ref())
            .then(|| Value::List(accepted.clone()));
        self.0.items.borrow_mut().extend(accepted);
        self.notify(owner.as_ref(), ContainerOp::Extend, None, added);
        Ok(())
    }

    /// Replaces the element at `index`, returning the one it replaced.
    pub fn set_at(&self, index: usize, value: impl Into<Value>) -> Result<Value, AtomError> {
        let current = self.element(index)?;
        let owner = self.owner();
        let reads_old = self
            .0
            .member
            .item()
            .is_some_and(|item| item.mode().reads_old_value());
        let old = reads_old.then_some(current);
        let value = self.check(owner.as_ref(), index, old.as_ref(), value.into())?;
        let added = self.observed(owner.as_ref()).then(|| value.clone());
        let replaced = {
            let mut items = self.0.items.borrow_mut();
            let len = items.len();
            match items.get_mut(index) {
                Some(slot) => std::mem::replace(slot, value),
                None => return Err(self.out_of_range(index, len)),
            }
        };
        self.notify(
            owner.as_ref(),
            ContainerOp::SetAt,
            Some(replaced.clone()),
            added,
        );
        Ok(replaced)
    }

    /// Removes and returns the element at `index`.
    pub fn remove_at(&self, index: usize) -> Result<Value, AtomError> {
        let removed = {
            let mut items = self.0.items.borrow_mut();
            if index >= items.len() {
                return Err(self.out_of_range(index, items.len()));
            }
            items.remove(index)
        };
        let owner = self.owner();
        self.notify(owner.as_ref(), ContainerOp::RemoveAt, Some(removed.clone()), None);
        Ok(removed)
    }

    /// Removes and returns the last element.
    pub fn pop(&self) -> Option<Value> {
        let popped = self.0.items.borrow_mut().pop()?;
        let owner = self.owner();
        self.notify(owner.as_ref(), ContainerOp::Pop, Some(popped.clone()), None);
        Some(popped)
    }

    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.0.items.borrow_mut());
        if removed.is_empty() {
            return;
        }
        let owner = self.owner();
        self.notify(
            owner.as_ref(),
            ContainerOp::Clear,
            Some(Value::List(removed)),
            None,
        );
    }

    // ─── Helpers ─────────────────────────────────────────────────────

    fn check(
        &self,
        owner: Option<&Atom>,
        index: usize,
        old: Option<&Value>,
        candidate: Value,
    ) -> Result<Value, AtomError> {
        let value = validate_element(&self.0.member, owner, index, old, candidate)?;
        if contains_sequence(&value, self, &mut Vec::new()) {
            return Err(ValidationError {
                attribute: self.0.member.name().to_string(),
                value: value.to_string(),
                expected: "an element that does not contain this sequence".into(),
                element: Some(index),
                message: None,
            }
            .into());
        }
        Ok(value)
    }

    fn element(&self, index: usize) -> Result<Value, AtomError> {
        let items = self.0.items.borrow();
        let found = items.get(index).cloned();
        found.ok_or_else(|| self.out_of_range(index, items.len()))
    }

    fn ensure_position(&self, index: usize, len: usize) -> Result<(), AtomError> {
        if index > len {
            return Err(self.out_of_range(index, len));
        }
        Ok(())
    }

    fn out_of_range(&self, index: usize, len: usize) -> AtomError {
        AtomError::IndexOutOfRange {
            attribute: self.0.member.name().to_string(),
            index,
            len,
        }
    }

    fn observed(&self, owner: Option<&Atom>) -> bool {
        owner.is_some_and(|owner| owner.has_observers(self.0.member.name()))
    }

    // Sequences replaced in their slot no longer report to the owner.
    fn notify(&self, owner: Option<&Atom>, op: ContainerOp, old: Option<Value>, new: Option<Value>) {
        let Some(owner) = owner else {
            return;
        };
        let Some(index) = self.0.member.slot_index() else {
            return;
        };
        if !self.observed(Some(owner)) || !owner.holds_sequence(index, self) {
            return;
        }
        owner.notify(Change {
            attribute: Rc::from(self.0.member.name()),
            kind: ChangeKind::Container(op),
            old,
            new,
        });
    }
}

// Whether `target` is reachable from `value` through containers and
// sequences. `seen` holds the sequences already searched.
fn contains_sequence(value: &Value, target: &ObservantSequence, seen: &mut Vec<usize>) -> bool {
    match value {
        Value::Sequence(seq) => {
            if seq.ptr_eq(target) {
                return true;
            }
            let id = Rc::as_ptr(&seq.0) as usize;
            if seen.contains(&id) {
                return false;
            }
            seen.push(id);
            seq.with_items(|items| items.iter().any(|v| contains_sequence(v, target, seen)))
        }
        Value::Tuple(items) | Value::List(items) => {
            items.iter().any(|v| contains_sequence(v, target, seen))
        }
        Value::Dict(pairs) => pairs
            .iter()
            .any(|(k, v)| contains_sequence(k, target, seen) || contains_sequence(v, target, seen)),
        _ => false,
    }
}

impl PartialEq for ObservantSequence {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.0.items.borrow() == *other.0.items.borrow()
    }
}

impl fmt::Debug for ObservantSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.items.try_borrow() {
            Ok(items) => f.debug_list().entries(items.iter()).finish(),
            Err(_) => f.write_str("[<mutating>]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ClassSchema;
    use std::cell::RefCell;

    fn holder() -> (Atom, ObservantSequence) {
        let schema = ClassSchema::build(
            "Holder",
            [("tags", Member::container_list(Some(Member::string())))],
        )
        .unwrap();
        let atom = Atom::new(&schema);
        atom.set("tags", Value::List(vec![Value::from("a"), Value::from("b")]))
            .unwrap();
        let seq = atom
            .get("tags")
            .unwrap()
            .and_then(|v| v.as_sequence().cloned())
            .unwrap();
        (atom, seq)
    }

    fn words(seq: &ObservantSequence) -> Vec<Value> {
        seq.to_vec()
    }

    #[test]
    fn test_append_validates() {
        let (_atom, seq) = holder();
        seq.append("c").unwrap();
        let err = seq.append(5).unwrap_err();
        let err = err.as_validation().unwrap();
        assert_eq!(err.attribute, "tags");
        assert_eq!(err.element, Some(3));
        assert_eq!(seq.len(), 3);
    }

    #[test]
    fn test_mutation_visible_through_owner() {
        let (atom, seq) = holder();
        seq.append("c").unwrap();
        assert_eq!(
            atom.get("tags").unwrap(),
            Some(Value::List(vec![
                Value::from("a"),
                Value::from("b"),
                Value::from("c")
            ]))
        );
    }

    #[test]
    fn test_insert_bounds() {
        let (_atom, seq) = holder();
        seq.insert(2, "end").unwrap();
        seq.insert(0, "start").unwrap();
        assert!(matches!(
            seq.insert(9, "x"),
            Err(AtomError::IndexOutOfRange { index: 9, len: 4, .. })
        ));
        assert!(seq.insert(1, 1.5).is_err());
        assert_eq!(
            words(&seq),
            vec![
                Value::from("start"),
                Value::from("a"),
                Value::from("b"),
                Value::from("end")
            ]
        );
    }

    #[test]
    fn test_extend_all_or_nothing() {
        let (_atom, seq) = holder();
        let batch = vec![
            Value::from("c"),
            Value::from("d"),
            Value::from(3),
            Value::from("e"),
            Value::from("f"),
        ];
        let err = seq.extend(batch).unwrap_err();
        assert_eq!(err.as_validation().unwrap().element, Some(2));
        assert_eq!(words(&seq), vec![Value::from("a"), Value::from("b")]);

        seq.extend(["c", "d"]).unwrap();
        assert_eq!(seq.len(), 4);
    }

    #[test]
    fn test_set_at_and_remove_at() {
        let (_atom, seq) = holder();
        assert_eq!(seq.set_at(0, "z").unwrap(), Value::from("a"));
        assert!(seq.set_at(0, 1).is_err());
        assert!(seq.set_at(5, "q").is_err());
        assert_eq!(seq.remove_at(1).unwrap(), Value::from("b"));
        assert!(seq.remove_at(1).is_err());
        assert_eq!(words(&seq), vec![Value::from("z")]);
        assert_eq!(seq.pop(), Some(Value::from("z")));
        assert_eq!(seq.pop(), None);
    }

    #[test]
    fn test_clear() {
        let (_atom, seq) = holder();
        seq.clear();
        assert!(seq.is_empty());
    }

    #[test]
    fn test_owner_not_kept_alive() {
        let (atom, seq) = holder();
        atom.teardown();
        drop(atom);
        assert!(seq.owner().is_none());
        seq.append("still validated").unwrap();
        assert!(seq.append(1).is_err());
    }

    #[test]
    fn test_observers_receive_container_ops() {
        let (atom, seq) = holder();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        atom.observe("tags", move |change| log.borrow_mut().push(change.kind))
            .unwrap();

        seq.append("c").unwrap();
        let _ = seq.append(1);
        seq.remove_at(0).unwrap();
        seq.clear();

        assert_eq!(
            *seen.borrow(),
            vec![
                ChangeKind::Container(ContainerOp::Append),
                ChangeKind::Container(ContainerOp::RemoveAt),
                ChangeKind::Container(ContainerOp::Clear),
            ]
        );
    }

    #[test]
    fn test_replaced_sequence_stops_reporting() {
        let (atom, old_seq) = holder();
        let seen = Rc::new(RefCell::new(0));
        let count = Rc::clone(&seen);
        atom.observe("tags", move |_| *count.borrow_mut() += 1).unwrap();

        atom.set("tags", Value::List(vec![])).unwrap();
        assert_eq!(*seen.borrow(), 1);
        old_seq.append("x").unwrap();
        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn test_equal_to_plain_list() {
        let (_atom, seq) = holder();
        assert_eq!(
            Value::Sequence(seq),
            Value::List(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn test_sequence_cannot_contain_itself() {
        let schema =
            ClassSchema::build("Bag", [("items", Member::container_list(None))]).unwrap();
        let atom = Atom::with_values(&schema, [("items", Value::List(vec![]))]).unwrap();
        let seq = atom.get("items").unwrap().unwrap().as_sequence().unwrap().clone();

        let err = seq.append(Value::Sequence(seq.clone())).unwrap_err();
        assert_eq!(err.as_validation().unwrap().element, Some(0));
        let nested = Value::List(vec![Value::Sequence(seq.clone())]);
        assert!(seq.append(nested).is_err());
        assert!(seq.extend([Value::from(1), Value::Sequence(seq.clone())]).is_err());
        assert!(seq.is_empty());

        let other = ObservantSequence::bind(None, seq.member(), Vec::new());
        seq.append(Value::Sequence(other.clone())).unwrap();
        assert!(other.append(Value::Sequence(seq.clone())).is_err());
        assert_eq!(Value::Sequence(seq.clone()).to_string(), "[[]]");
        assert_eq!(Value::Sequence(seq.clone()), Value::Sequence(seq));
    }
}

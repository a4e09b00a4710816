//! # Slot Store
//!
//! Fixed-size per-instance storage, one optional value per schema member.
//! The length is set at construction from the schema's member count and
//! never changes. Indices are trusted: callers obtain them from the
//! schema, so an out-of-range index is a bug and panics.
//!
//! ## Teardown
//!
//! [`SlotStore::teardown`] empties every slot exactly once and hands the
//! values back to the caller, which drops them outside any borrow. A
//! second call returns nothing.

use crate::value::Value;

/// Per-instance slot array.
#[derive(Debug)]
pub struct SlotStore {
    slots: Box<[Option<Value>]>,
    torn_down: bool,
}

impl SlotStore {
    /// `count` unset slots.
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![None; count].into_boxed_slice(),
            torn_down: false,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Value in slot `index`, if set.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.slots[index].as_ref()
    }

    pub fn is_set(&self, index: usize) -> bool {
        self.slots[index].is_some()
    }

    /// Stores `value`, returning the previous value.
    pub fn replace(&mut self, index: usize, value: Value) -> Option<Value> {
        self.slots[index].replace(value)
    }

    /// Clears slot `index`, returning the previous value.
    pub fn take(&mut self, index: usize) -> Option<Value> {
        self.slots[index].take()
    }

    /// Visits every set slot in index order.
    pub fn for_each_slot(&self, mut f: impl FnMut(usize, &Value)) {
        for (index, slot) in self.slots.iter().enumerate() {
            if let Some(value) = slot {
                f(index, value);
            }
        }
    }

    /// Empties every slot and returns the values that were held.
    pub fn teardown(&mut self) -> Vec<Value> {
        if self.torn_down {
            return Vec::new();
        }
        self.torn_down = true;
        self.slots.iter_mut().filter_map(Option::take).collect()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

//! # Change Notifications
//!
//! Observers registered with [`Atom::observe`](crate::atom::Atom::observe)
//! receive a [`Change`] after every committed write that altered an
//! attribute. Rejected writes and writes of an equal value are silent.
//!
//! Observers run with no borrow of the instance held and may read or write
//! it freely, including the attribute that triggered them.

use std::fmt;
use std::rc::Rc;

use crate::value::Value;

/// In-place mutation of an observant sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerOp {
    Append,
    Insert,
    Extend,
    SetAt,
    RemoveAt,
    Pop,
    Clear,
}

impl ContainerOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Append => "append",
            Self::Insert => "insert",
            Self::Extend => "extend",
            Self::SetAt => "set_at",
            Self::RemoveAt => "remove_at",
            Self::Pop => "pop",
            Self::Clear => "clear",
        }
    }
}

impl fmt::Display for ContainerOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// First value stored in a previously unset slot.
    Create,
    /// A set slot received a different value.
    Update,
    /// The slot was cleared.
    Delete,
    /// The sequence held by the slot was mutated in place.
    Container(ContainerOp),
}

/// A committed change to one attribute.
#[derive(Debug, Clone)]
pub struct Change {
    pub attribute: Rc<str>,
    pub kind: ChangeKind,
    /// Value before the change; `None` when the slot was unset.
    ///
    /// For container operations this is the element removed or replaced,
    /// if any.
    pub old: Option<Value>,
    /// Value after the change; `None` when the slot is now unset.
    ///
    /// For container operations this is the element added, if any.
    pub new: Option<Value>,
}

/// Callback invoked with each [`Change`].
#[derive(Clone)]
pub struct Observer(Rc<dyn Fn(&Change)>);

impl Observer {
    pub fn new(f: impl Fn(&Change) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub(crate) fn call(&self, change: &Change) {
        (self.0)(change)
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Observer(..)")
    }
}

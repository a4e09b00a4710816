//! # atomrt-core — Validated Slot-Based Attribute Storage
//!
//! Objects declare a fixed set of named attributes ("members"), each
//! governed by one validation mode from a closed set. The runtime
//! guarantees that every value visible on an instance most recently
//! passed its member's validation.
//!
//! ## Components
//!
//! 1. **[`ClassSchema`]** — immutable per-class index from attribute name
//!    to `(Member, slot index)`, backed by an open-addressing table and
//!    shared by every instance through an `Rc`.
//!
//! 2. **Validation engine** ([`validate`](mod@validate)) — a stateless
//!    dispatcher: an exhaustive `match` over [`Mode`] turns a candidate
//!    into the accepted value or a [`ValidationError`]. Adding a mode
//!    forces every consumer to handle it.
//!
//! 3. **[`SlotStore`]** — the per-instance value array, wrapped by the
//!    [`Atom`] handle that routes reads and writes through the schema and
//!    the engine.
//!
//! 4. **[`ObservantSequence`]** — the list stored by `container_list`
//!    members, re-validating its elements on every in-place mutation.
//!
//! Around the core: declarative YAML/JSON [`descriptor`]s, change
//! observers ([`change`]) and the legacy text-mode shim ([`legacy`]).
//!
//! ## Execution model
//!
//! Single-threaded. Handles are `Rc`-based and intentionally `!Send`.
//! User callbacks may reenter the instance they validate; the runtime
//! never holds an interior borrow across a callback.
//!
//! ## Crate Policy
//!
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - A rejected write leaves its target exactly as it was.

pub mod atom;
pub mod change;
pub mod descriptor;
pub mod error;
pub mod legacy;
pub mod member;
pub mod mode;
pub mod observant;
pub mod schema;
pub mod slots;
pub mod table;
pub mod types;
pub mod validate;
pub mod value;

// Re-export primary types for ergonomic imports.
pub use atom::Atom;
pub use change::{Change, ChangeKind, ContainerOp, Observer};
pub use descriptor::{load, Registry, SchemaDocument, SchemaSet};
pub use error::{
    AtomError, DefinitionError, DescriptorError, LegacyModeError, SchemaError, ValidationError,
};
pub use member::{
    Coercer, Context, DefaultFactory, DefaultValue, ErrorHandler, Member, MemberMethod, Rejection,
    Validator,
};
pub use mode::{Mode, MODE_COUNT};
pub use observant::ObservantSequence;
pub use schema::{ClassSchema, MethodTable, SchemaBuilder};
pub use slots::SlotStore;
pub use types::{Kind, TypeRef};
pub use value::Value;

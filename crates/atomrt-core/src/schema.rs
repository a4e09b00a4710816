//! # Class Schema
//!
//! A [`ClassSchema`] is the per-class index from attribute name to
//! `(Member, slot index)`. It is built once through a [`SchemaBuilder`],
//! shared by every instance through an `Rc`, and never mutated after
//! `build()` returns.
//!
//! ## Invariants
//!
//! - Slot indices form a dense permutation of `0..count()`; the member at
//!   position `i` of [`ClassSchema::members`] owns slot `i`.
//! - No two members share a name.
//! - Every member passed the definition-time check of
//!   [`check_definition`](crate::validate::check_definition).
//!
//! ## Inheritance
//!
//! [`SchemaBuilder::derive`] seeds the builder with a base schema's
//! members and methods. Redeclaring an inherited name replaces the member
//! but keeps its slot index, so code that reads a base-class slot by index
//! reads the same attribute on a derived instance. Declaring the same name
//! twice in one builder is a definition error.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{DefinitionError, SchemaError};
use crate::member::{Member, Validator};
use crate::table::MemberTable;
use crate::types::TypeRef;
use crate::validate::check_definition;

/// Methods of a class, resolvable by `object_method` members.
pub type MethodTable = HashMap<String, Validator>;

/// Immutable per-class attribute index.
#[derive(Debug)]
pub struct ClassSchema {
    class_type: TypeRef,
    members: Vec<Rc<Member>>,
    table: MemberTable,
    methods: MethodTable,
}

impl ClassSchema {
    /// Starts a builder for a class called `name`.
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    /// Builds a schema from an ordered list of declarations.
    pub fn build<I, S>(name: impl Into<String>, members: I) -> Result<Rc<Self>, SchemaError>
    where
        I: IntoIterator<Item = (S, Member)>,
        S: Into<String>,
    {
        members
            .into_iter()
            .fold(SchemaBuilder::new(name), |builder, (name, member)| {
                builder.member(name, member)
            })
            .build()
    }

    /// Class name.
    pub fn name(&self) -> &str {
        self.class_type.name()
    }

    /// The class type instances of this schema report.
    pub fn class_type(&self) -> &TypeRef {
        &self.class_type
    }

    /// Member and slot index for `name`.
    pub fn lookup(&self, name: &str) -> Option<(&Rc<Member>, usize)> {
        let slot = self.table.get(name)?;
        Some((&self.members[slot], slot))
    }

    /// Number of slots.
    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// Member declared as `name`.
    pub fn member(&self, name: &str) -> Option<&Rc<Member>> {
        self.lookup(name).map(|(member, _)| member)
    }

    /// Member owning slot `index`.
    pub fn member_at(&self, index: usize) -> Option<&Rc<Member>> {
        self.members.get(index)
    }

    /// Members in slot order.
    pub fn members(&self) -> &[Rc<Member>] {
        &self.members
    }

    /// Method registered as `name`.
    pub fn method(&self, name: &str) -> Option<&Validator> {
        self.methods.get(name)
    }

    /// Bucket count of the member table.
    pub fn table_capacity(&self) -> usize {
        self.table.capacity()
    }
}

enum Entry {
    Inherited(Rc<Member>),
    Declared(Member),
}

/// Collects declarations, merges inherited members and builds a schema.
pub struct SchemaBuilder {
    name: String,
    bases: Vec<TypeRef>,
    entries: Vec<Entry>,
    table: MemberTable,
    methods: MethodTable,
    // Lowest slot declared twice, reported when the build reaches it.
    duplicate: Option<(usize, DefinitionError)>,
}

impl SchemaBuilder {
    /// Empty builder for a class called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            entries: Vec::new(),
            table: MemberTable::with_capacity_for(0),
            methods: MethodTable::new(),
            duplicate: None,
        }
    }

    /// Inherits every member and method of `base`.
    ///
    /// Members of a later base replace same-named members of an earlier one
    /// in place. A member declared on this builder is never replaced.
    pub fn derive(mut self, base: &ClassSchema) -> Self {
        self.bases.push(base.class_type().clone());
        for member in base.members() {
            self.merge(member.name(), Entry::Inherited(Rc::clone(member)));
        }
        for (name, method) in &base.methods {
            self.methods.insert(name.clone(), method.clone());
        }
        self
    }

    /// Declares an attribute.
    pub fn member(mut self, name: impl Into<String>, mut member: Member) -> Self {
        let name = name.into();
        member.declare(&name);
        self.merge(&name, Entry::Declared(member));
        self
    }

    /// Registers a method for `object_method` members.
    pub fn method(mut self, name: impl Into<String>, method: Validator) -> Self {
        self.methods.insert(name.into(), method);
        self
    }

    // A declaration always wins over an inherited member of the same name,
    // whichever was merged first. Either way the slot stays where the name
    // first appeared.
    fn merge(&mut self, name: &str, entry: Entry) {
        let Some(slot) = self.table.get(name) else {
            let slot = self.entries.len();
            self.entries.push(entry);
            self.table.insert(Rc::from(name), slot);
            return;
        };
        match (&self.entries[slot], &entry) {
            (Entry::Declared(_), Entry::Inherited(_)) => return,
            (Entry::Declared(previous), Entry::Declared(_)) => {
                if self.duplicate.as_ref().map_or(true, |(first, _)| slot < *first) {
                    let err = DefinitionError {
                        attribute: name.to_string(),
                        mode: previous.mode(),
                        reason: "attribute declared more than once".into(),
                    };
                    self.duplicate = Some((slot, err));
                }
            }
            _ => {}
        }
        self.table.remove(name);
        self.entries[slot] = entry;
        self.table.insert(Rc::from(name), slot);
    }

    /// Assigns slot indices, runs the definition-time check on every member
    /// and freezes the schema.
    ///
    /// Failures are reported in slot order: the first slot that is either
    /// declared twice or fails its check aborts the build.
    pub fn build(self) -> Result<Rc<ClassSchema>, SchemaError> {
        let mut members = Vec::with_capacity(self.entries.len());
        for (slot, entry) in self.entries.into_iter().enumerate() {
            if let Some((first, err)) = &self.duplicate {
                if *first == slot {
                    return Err(err.clone().into());
                }
            }
            let member = match entry {
                Entry::Inherited(member) if member.slot_index() == Some(slot) => member,
                Entry::Inherited(member) => {
                    let mut owned = Member::clone(&member);
                    owned.assign_slot(slot);
                    Rc::new(owned)
                }
                Entry::Declared(mut member) => {
                    member.assign_slot(slot);
                    Rc::new(member)
                }
            };
            check_definition(&member, &self.methods)?;
            members.push(member);
        }

        let mut table = MemberTable::with_capacity_for(members.len());
        for (slot, member) in members.iter().enumerate() {
            table.insert(Rc::from(member.name()), slot);
        }

        let schema = ClassSchema {
            class_type: TypeRef::class(self.name, self.bases),
            members,
            table,
            methods: self.methods,
        };
        tracing::debug!(
            class = schema.name(),
            slots = schema.count(),
            capacity = schema.table_capacity(),
            "built class schema"
        );
        Ok(Rc::new(schema))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Mode;
    use crate::value::Value;

    fn person() -> Rc<ClassSchema> {
        ClassSchema::build(
            "Person",
            [
                ("name", Member::string()),
                ("age", Member::range(0, 150)),
                ("tags", Member::container_list(Some(Member::string()))),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_slots_follow_declaration_order() {
        let schema = person();
        assert_eq!(schema.count(), 3);
        for (i, name) in ["name", "age", "tags"].iter().enumerate() {
            let (member, slot) = schema.lookup(name).unwrap();
            assert_eq!(slot, i);
            assert_eq!(member.slot_index(), Some(i));
            assert_eq!(member.name(), *name);
        }
        assert!(schema.lookup("missing").is_none());
    }

    #[test]
    fn test_table_sized_for_members() {
        let schema = person();
        assert_eq!(schema.table_capacity(), 4);
    }

    #[test]
    fn test_duplicate_declaration_rejected() {
        let err = ClassSchema::build("Dup", [("x", Member::int()), ("x", Member::float())])
            .unwrap_err();
        match err {
            SchemaError::Definition(e) => {
                assert_eq!(e.attribute, "x");
                assert_eq!(e.mode, Mode::Int);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_first_failing_member_aborts_build() {
        let err = ClassSchema::build(
            "Bad",
            [
                ("ok", Member::int()),
                ("bounds", Member::range(10, 1)),
                ("choices", Member::enumeration(vec![])),
            ],
        )
        .unwrap_err();
        match err {
            SchemaError::Definition(e) => assert_eq!(e.attribute, "bounds"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_derived_override_keeps_slot() {
        let base = person();
        let derived = ClassSchema::builder("Employee")
            .derive(&base)
            .member("age", Member::range(16, 70))
            .member("employer", Member::string())
            .build()
            .unwrap();

        assert_eq!(derived.count(), 4);
        let (age, slot) = derived.lookup("age").unwrap();
        assert_eq!(slot, 1);
        assert!(matches!(
            age.context(),
            crate::member::Context::IntBounds { low: Some(16), high: Some(70) }
        ));
        assert_eq!(derived.lookup("employer").unwrap().1, 3);
        assert!(derived.class_type().is_subclass_of(base.class_type()));
    }

    #[test]
    fn test_inherited_members_are_shared() {
        let base = person();
        let derived = ClassSchema::builder("Child").derive(&base).build().unwrap();
        assert!(Rc::ptr_eq(
            base.member("name").unwrap(),
            derived.member("name").unwrap()
        ));
    }

    #[test]
    fn test_inherited_member_reindexed_when_declared_after() {
        let base = person();
        let derived = ClassSchema::builder("Late")
            .member("first", Member::no_op())
            .derive(&base)
            .build()
            .unwrap();
        let (member, slot) = derived.lookup("name").unwrap();
        assert_eq!(slot, 1);
        assert_eq!(member.slot_index(), Some(1));
    }

    #[test]
    fn test_declaration_survives_later_derive() {
        let base = person();
        let derived = ClassSchema::builder("Derived")
            .member("name", Member::int())
            .derive(&base)
            .build()
            .unwrap();

        let (member, slot) = derived.lookup("name").unwrap();
        assert_eq!(member.mode(), Mode::Int);
        assert_eq!(slot, 0);
        assert_eq!(derived.count(), 3);

        let atom = crate::atom::Atom::new(&derived);
        atom.set("name", 5).unwrap();
        assert!(atom.set("name", "text").is_err());
    }

    #[test]
    fn test_duplicate_reported_in_slot_order() {
        let err = ClassSchema::build(
            "Mixed",
            [
                ("a", Member::range(5, 1)),
                ("x", Member::int()),
                ("x", Member::float()),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::Definition(ref e) if e.attribute == "a"));

        let err = ClassSchema::build(
            "Mixed",
            [
                ("x", Member::int()),
                ("a", Member::range(5, 1)),
                ("x", Member::float()),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::Definition(ref e) if e.attribute == "x"));
    }

    #[test]
    fn test_object_method_must_resolve() {
        let err = ClassSchema::build("NoMethod", [("x", Member::object_method("check_x"))])
            .unwrap_err();
        assert!(matches!(err, SchemaError::Definition(ref e) if e.attribute == "x"));

        let schema = ClassSchema::builder("WithMethod")
            .method("check_x", Validator::new(|_, _, _, v| Ok(v)))
            .member("x", Member::object_method("check_x"))
            .build()
            .unwrap();
        assert!(schema.method("check_x").is_some());
    }

    #[test]
    fn test_methods_inherited() {
        let base = ClassSchema::builder("Base")
            .method("double", Validator::new(|_, _, _, v| match v {
                Value::Int(i) => Ok(Value::Int(i * 2)),
                other => Err(format!("cannot double {other}")),
            }))
            .build()
            .unwrap();
        let derived = ClassSchema::builder("Derived")
            .derive(&base)
            .member("n", Member::object_method("double"))
            .build();
        assert!(derived.is_ok());
    }

    #[test]
    fn test_legacy_mode_rejected_at_build() {
        let err = ClassSchema::build("Old", [("s", Member::new(Mode::Str, crate::member::Context::None))])
            .unwrap_err();
        assert!(matches!(err, SchemaError::LegacyMode(ref e) if e.mode == Mode::Str));
    }
}

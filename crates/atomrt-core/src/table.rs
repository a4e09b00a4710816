//! # Member Table
//!
//! Open-addressing hash table mapping attribute names to slot indices.
//! It backs [`ClassSchema::lookup`](crate::schema::ClassSchema::lookup),
//! the hottest path in the runtime.
//!
//! ## Layout
//!
//! - Capacity is the next power of two at or above `max(3, n) * 4 / 3`, so
//!   the probe start is `hash & (capacity - 1)` and the load factor never
//!   exceeds 0.75.
//! - Collisions resolve by linear probing.
//! - Removal leaves a tombstone. Lookups probe past tombstones; inserts
//!   reuse the first one on their probe path. Growing rehashes live
//!   entries only, dropping every tombstone.
//!
//! Removal only happens while a schema is being merged. A built schema
//! never mutates its table.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

const MIN_ENTRIES: usize = 3;

#[derive(Debug, Clone)]
enum Bucket {
    Empty,
    Tombstone,
    Occupied { hash: u64, name: Rc<str>, slot: usize },
}

/// Name → slot index table with open addressing.
#[derive(Debug, Clone)]
pub struct MemberTable {
    buckets: Box<[Bucket]>,
    len: usize,
    tombstones: usize,
}

/// Bucket count for a table holding `count` names.
pub fn capacity_for(count: usize) -> usize {
    let entries = count.max(MIN_ENTRIES);
    let needed = (entries * 4).div_ceil(3);
    needed.next_power_of_two()
}

fn hash_name(name: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish()
}

impl MemberTable {
    /// Empty table sized for `count` names.
    pub fn with_capacity_for(count: usize) -> Self {
        Self {
            buckets: vec![Bucket::Empty; capacity_for(count)].into_boxed_slice(),
            len: 0,
            tombstones: 0,
        }
    }

    /// Number of buckets.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Number of live names.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no names are stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of tombstones awaiting the next rehash.
    pub fn tombstones(&self) -> usize {
        self.tombstones
    }

    /// Slot index stored for `name`.
    pub fn get(&self, name: &str) -> Option<usize> {
        let index = self.find(hash_name(name), name)?;
        match &self.buckets[index] {
            Bucket::Occupied { slot, .. } => Some(*slot),
            _ => None,
        }
    }

    /// Stores `name → slot`, returning the slot it replaced, if any.
    pub fn insert(&mut self, name: Rc<str>, slot: usize) -> Option<usize> {
        let hash = hash_name(&name);
        if let Some(index) = self.find(hash, &name) {
            if let Bucket::Occupied { slot: existing, .. } = &mut self.buckets[index] {
                return Some(std::mem::replace(existing, slot));
            }
        }

        if (self.len + self.tombstones + 1) * 4 > self.buckets.len() * 3 {
            self.rehash(self.len + 1);
        }

        let index = self.vacant(hash);
        if matches!(self.buckets[index], Bucket::Tombstone) {
            self.tombstones -= 1;
        }
        self.buckets[index] = Bucket::Occupied { hash, name, slot };
        self.len += 1;
        None
    }

    /// Removes `name`, leaving a tombstone, and returns its slot.
    pub fn remove(&mut self, name: &str) -> Option<usize> {
        let index = self.find(hash_name(name), name)?;
        match std::mem::replace(&mut self.buckets[index], Bucket::Tombstone) {
            Bucket::Occupied { slot, .. } => {
                self.len -= 1;
                self.tombstones += 1;
                Some(slot)
            }
            other => {
                self.buckets[index] = other;
                None
            }
        }
    }

    /// Live `(name, slot)` pairs in bucket order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.buckets.iter().filter_map(|bucket| match bucket {
            Bucket::Occupied { name, slot, .. } => Some((&**name, *slot)),
            _ => None,
        })
    }

    fn mask(&self) -> usize {
        self.buckets.len() - 1
    }

    fn find(&self, hash: u64, name: &str) -> Option<usize> {
        let mask = self.mask();
        let mut index = (hash as usize) & mask;
        for _ in 0..self.buckets.len() {
            match &self.buckets[index] {
                Bucket::Empty => return None,
                Bucket::Tombstone => {}
                Bucket::Occupied { hash: h, name: n, .. } => {
                    if *h == hash && &**n == name {
                        return Some(index);
                    }
                }
            }
            index = (index + 1) & mask;
        }
        None
    }

    // The load factor bound guarantees a free bucket on every probe path.
    fn vacant(&self, hash: u64) -> usize {
        let mask = self.mask();
        let mut index = (hash as usize) & mask;
        while let Bucket::Occupied { .. } = self.buckets[index] {
            index = (index + 1) & mask;
        }
        index
    }

    fn rehash(&mut self, count: usize) {
        let old = std::mem::replace(
            &mut self.buckets,
            vec![Bucket::Empty; capacity_for(count)].into_boxed_slice(),
        );
        self.tombstones = 0;
        for bucket in old.into_vec() {
            if let Bucket::Occupied { hash, name, slot } = bucket {
                let index = self.vacant(hash);
                self.buckets[index] = Bucket::Occupied { hash, name, slot };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Rc<str> {
        Rc::from(s)
    }

    #[test]
    fn test_capacity_for() {
        assert_eq!(capacity_for(0), 4);
        assert_eq!(capacity_for(3), 4);
        assert_eq!(capacity_for(4), 8);
        assert_eq!(capacity_for(6), 8);
        assert_eq!(capacity_for(7), 16);
        assert_eq!(capacity_for(100), 256);
    }

    #[test]
    fn test_load_factor_never_exceeds_three_quarters() {
        let mut table = MemberTable::with_capacity_for(0);
        for i in 0..200 {
            table.insert(name(&format!("attr{i}")), i);
            assert!(table.len() * 4 <= table.capacity() * 3);
            assert!(table.capacity().is_power_of_two());
        }
        for i in 0..200 {
            assert_eq!(table.get(&format!("attr{i}")), Some(i));
        }
    }

    #[test]
    fn test_insert_replaces_existing() {
        let mut table = MemberTable::with_capacity_for(2);
        assert_eq!(table.insert(name("x"), 0), None);
        assert_eq!(table.insert(name("x"), 5), Some(0));
        assert_eq!(table.get("x"), Some(5));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_lookup_probes_past_tombstones() {
        let mut table = MemberTable::with_capacity_for(3);
        for (i, n) in ["a", "b", "c"].iter().enumerate() {
            table.insert(name(n), i);
        }
        assert_eq!(table.remove("a"), Some(0));
        assert_eq!(table.remove("a"), None);
        assert_eq!(table.tombstones(), 1);
        assert_eq!(table.get("a"), None);
        assert_eq!(table.get("b"), Some(1));
        assert_eq!(table.get("c"), Some(2));
    }

    #[test]
    fn test_reinsert_reuses_tombstone() {
        let mut table = MemberTable::with_capacity_for(6);
        for (i, n) in ["a", "b", "c"].iter().enumerate() {
            table.insert(name(n), i);
        }
        let capacity = table.capacity();
        table.remove("b");
        table.insert(name("b"), 1);
        assert_eq!(table.capacity(), capacity);
        assert_eq!(table.tombstones(), 0);
        assert_eq!(table.get("b"), Some(1));
    }

    #[test]
    fn test_tombstones_cleared_by_reuse_or_rehash() {
        let mut table = MemberTable::with_capacity_for(3);
        table.insert(name("a"), 0);
        table.insert(name("b"), 1);
        table.remove("a");
        table.insert(name("c"), 2);
        table.insert(name("d"), 3);
        assert_eq!(table.tombstones(), 0);
        assert_eq!(table.len(), 3);
        let mut live: Vec<_> = table.iter().map(|(n, s)| (n.to_string(), s)).collect();
        live.sort();
        assert_eq!(
            live,
            vec![("b".to_string(), 1), ("c".to_string(), 2), ("d".to_string(), 3)]
        );
    }

    #[test]
    fn test_missing_name_in_full_table() {
        let mut table = MemberTable::with_capacity_for(3);
        for (i, n) in ["a", "b", "c"].iter().enumerate() {
            table.insert(name(n), i);
        }
        assert_eq!(table.get("zzz"), None);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    proptest! {
        /// The table agrees with a `HashMap` under any insert/remove sequence.
        #[test]
        fn matches_reference_map(ops in prop::collection::vec(
            (any::<bool>(), "[a-f]{1,2}", 0usize..100), 0..200,
        )) {
            let mut table = MemberTable::with_capacity_for(0);
            let mut reference = HashMap::new();
            for (insert, name, slot) in ops {
                if insert {
                    prop_assert_eq!(
                        table.insert(Rc::from(name.as_str()), slot),
                        reference.insert(name, slot)
                    );
                } else {
                    prop_assert_eq!(table.remove(&name), reference.remove(&name));
                }
                prop_assert_eq!(table.len(), reference.len());
                prop_assert!((table.len() + table.tombstones()) * 4 <= table.capacity() * 3);
            }
            for (name, slot) in &reference {
                prop_assert_eq!(table.get(name), Some(*slot));
            }
        }
    }
}

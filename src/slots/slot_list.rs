//! Dense container with slot reuse

use crate::error::{Error, Result};
use tracing::trace;

const RESERVE_CHUNK: usize = 20;

/// Dense, id-addressable container with lowest-vacant-index reuse.
///
/// Ids are small non-negative integers. A freed id becomes the insertion
/// point again as soon as it is the lowest vacancy: the container tracks
/// a first-vacant marker incrementally, advancing it past occupied slots
/// after an insertion and lowering it when an earlier slot is freed.
///
/// `T`'s `PartialEq` is treated as identity (for `ObjHandle` it compares
/// uids), which is what makes re-inserting the identical item at its own
/// id a harmless no-op.
pub struct SlotList<T> {
    slots: Vec<Option<T>>,
    first_vacant: usize,
}

impl<T> SlotList<T> {
    pub fn new() -> Self {
        SlotList {
            slots: Vec::new(),
            first_vacant: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        SlotList {
            slots: Vec::with_capacity(capacity),
            first_vacant: 0,
        }
    }

    /// Number of occupied slots.
    pub fn count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Total number of slots, occupied or vacant.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// O(1) validity check: true iff `id` maps to an occupied slot.
    pub fn is_valid_id(&self, id: usize) -> bool {
        id < self.slots.len() && self.slots[id].is_some()
    }

    pub fn get(&self, id: usize) -> Option<&T> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut T> {
        self.slots.get_mut(id).and_then(Option::as_mut)
    }

    /// Checked access; fails with `InvalidId` for a vacant or
    /// out-of-range id.
    pub fn get_checked(&self, id: usize) -> Result<&T> {
        self.get(id).ok_or(Error::InvalidId(id as u64))
    }

    pub fn get_checked_mut(&mut self, id: usize) -> Result<&mut T> {
        self.get_mut(id).ok_or(Error::InvalidId(id as u64))
    }

    /// Unchecked access. The caller must have verified `is_valid_id`.
    ///
    /// # Panics
    ///
    /// Panics on a vacant or out-of-range id.
    pub fn get_unchecked(&self, id: usize) -> &T {
        self.slots[id].as_ref().expect("access to vacant slot")
    }

    /// Place `item` at the lowest vacant index and return that index.
    pub fn insert(&mut self, item: T) -> usize {
        let id = self.first_vacant;
        self.grow_to(id + 1);
        debug_assert!(self.slots[id].is_none());
        self.slots[id] = Some(item);
        self.advance_first_vacant();
        trace!("inserted item at slot {}", id);
        id
    }

    /// Remove the occupant of `id`, if any. Returns whether a slot was
    /// freed. The freed index becomes the first vacancy if it precedes
    /// the current one.
    pub fn remove(&mut self, id: usize) -> bool {
        if !self.is_valid_id(id) {
            return false;
        }
        self.slots[id] = None;
        if id < self.first_vacant {
            self.first_vacant = id;
        }
        trace!("vacated slot {}", id);
        true
    }

    /// Drop every occupant and reset the container.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.first_vacant = 0;
    }

    /// Grow the slot vector so that ids below `len` are addressable.
    /// Never shrinks.
    pub fn grow_to(&mut self, len: usize) {
        if len > self.slots.capacity() {
            self.slots.reserve(len - self.slots.len() + RESERVE_CHUNK);
        }
        while self.slots.len() < len {
            self.slots.push(None);
        }
    }

    /// Iterate occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|item| (id, item)))
    }

    /// Index the next plain `insert` will use.
    pub fn first_vacant(&self) -> usize {
        self.first_vacant
    }

    fn advance_first_vacant(&mut self) {
        while self.first_vacant < self.slots.len() && self.slots[self.first_vacant].is_some() {
            self.first_vacant += 1;
        }
    }
}

impl<T: PartialEq> SlotList<T> {
    /// Place `item` at a specific index, expanding storage if necessary.
    ///
    /// Inserting the identical item at its own current index is a no-op,
    /// so re-registration is idempotent.
    ///
    /// # Panics
    ///
    /// Panics if the index is occupied by a different item; that is a
    /// programming error, not a recoverable condition.
    pub fn insert_at(&mut self, id: usize, item: T) {
        self.grow_to(id + 1);

        if let Some(existing) = &self.slots[id] {
            assert!(
                *existing == item,
                "different item already occupies slot {}",
                id
            );
            return;
        }

        self.slots[id] = Some(item);
        if id == self.first_vacant {
            self.advance_first_vacant();
        }
        trace!("inserted item at slot {}", id);
    }
}

impl<T> Default for SlotList<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_returns_ascending_ids() {
        let mut list = SlotList::new();
        assert_eq!(list.insert("a"), 0);
        assert_eq!(list.insert("b"), 1);
        assert_eq!(list.insert("c"), 2);
        assert_eq!(list.count(), 3);
    }

    #[test]
    fn test_lowest_vacant_reuse() {
        let mut list = SlotList::new();
        let a = list.insert("a");
        let _b = list.insert("b");

        // freeing the lowest occupied index makes it the next insertion point
        assert!(list.remove(a));
        assert_eq!(list.insert("c"), a);
        assert!(list.is_valid_id(0));
        assert!(list.is_valid_id(1));
        assert_eq!(*list.get_unchecked(0), "c");
        assert_eq!(*list.get_unchecked(1), "b");
    }

    #[test]
    fn test_reuse_prefers_lowest_not_most_recent() {
        let mut list = SlotList::new();
        for label in ["a", "b", "c", "d"] {
            list.insert(label);
        }
        // free 2 then 1: next insert must take 1, not the more recent 2
        list.remove(2);
        list.remove(1);
        assert_eq!(list.insert("e"), 1);
        assert_eq!(list.insert("f"), 2);
        assert_eq!(list.insert("g"), 4);
    }

    #[test]
    fn test_insert_at_expands_storage() {
        let mut list = SlotList::new();
        list.insert_at(7, "x");
        assert!(list.is_valid_id(7));
        assert!(!list.is_valid_id(3));
        assert!(list.capacity() >= 8);
        // slots 0..7 are vacant, so plain insert starts at 0
        assert_eq!(list.insert("y"), 0);
    }

    #[test]
    fn test_insert_at_same_item_is_noop() {
        let mut list = SlotList::new();
        let id = list.insert("x");
        list.insert_at(id, "x");
        assert_eq!(list.count(), 1);
    }

    #[test]
    #[should_panic(expected = "different item already occupies slot")]
    fn test_insert_at_occupied_slot_panics() {
        let mut list = SlotList::new();
        let id = list.insert("x");
        list.insert_at(id, "y");
    }

    #[test]
    fn test_checked_access_fails_with_invalid_id() {
        let list: SlotList<&str> = SlotList::new();
        match list.get_checked(5) {
            Err(Error::InvalidId(5)) => {}
            other => panic!("expected InvalidId(5), got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_iteration_visits_occupied_in_index_order() {
        let mut list = SlotList::new();
        list.insert("a");
        list.insert("b");
        list.insert("c");
        list.remove(1);

        let seen: Vec<(usize, &str)> = list.iter().map(|(id, s)| (id, *s)).collect();
        assert_eq!(seen, vec![(0, "a"), (2, "c")]);
    }

    #[test]
    fn test_first_vacant_tracks_insert_and_remove() {
        let mut list = SlotList::new();
        list.insert("a");
        list.insert("b");
        assert_eq!(list.first_vacant(), 2);
        list.remove(0);
        assert_eq!(list.first_vacant(), 0);
        // filling a hole at first_vacant advances past occupied slots
        list.insert("c");
        assert_eq!(list.first_vacant(), 2);
    }

    #[test]
    fn test_remove_invalid_id_is_ignored() {
        let mut list: SlotList<&str> = SlotList::new();
        assert!(!list.remove(3));
    }
}

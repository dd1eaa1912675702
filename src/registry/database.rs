//! UID registry

use super::object::{ObjCell, ObjHandle, Persistable};
use super::uid::Uid;
use crate::error::{Error, Result};
use std::cell::Cell;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

/// Registry mapping uids to live objects.
///
/// Entries are weak: the registry never keeps an object alive, it only
/// makes it findable. Dead entries are pruned lazily when encountered.
/// Uids are allocated from a monotonic counter starting at 1 and are
/// never reused.
///
/// A `[min, max]` range over the registered uids is kept as a fast-path
/// for `is_valid` range checks. Removing a boundary entry invalidates
/// the range; it is re-derived lazily from the live entries on next use.
pub struct ObjectDb {
    objects: HashMap<u64, Weak<ObjCell>>,
    next_uid: u64,
    range: Cell<Option<(u64, u64)>>,
    range_dirty: Cell<bool>,
}

impl ObjectDb {
    pub fn new() -> Self {
        ObjectDb {
            objects: HashMap::new(),
            next_uid: 1,
            range: Cell::new(None),
            range_dirty: Cell::new(false),
        }
    }

    /// Register a new object, minting a fresh uid for it.
    ///
    /// The returned handle is the object's first owner; identity exists
    /// only from this point on.
    pub fn insert(&mut self, body: Box<dyn Persistable>) -> ObjHandle {
        let uid = Uid::new(self.next_uid);
        self.next_uid += 1;

        debug!("registered {} with uid {}", body.type_name(), uid);

        let cell = Rc::new(ObjCell {
            uid,
            body: RefCell::new(body),
        });
        self.objects.insert(uid.raw(), Rc::downgrade(&cell));
        self.extend_range(uid.raw());

        ObjHandle::from_cell(cell)
    }

    /// Re-register an object that was previously released.
    ///
    /// # Panics
    ///
    /// Panics if a live entry already exists for the object's uid; that
    /// is a programming error, not a recoverable condition.
    pub fn reinsert(&mut self, obj: &ObjHandle) {
        let raw = obj.uid().raw();
        if let Some(weak) = self.objects.get(&raw) {
            assert!(
                weak.upgrade().is_none(),
                "object already registered for uid {}",
                raw
            );
        }
        self.objects.insert(raw, Rc::downgrade(&obj.cell));
        self.extend_range(raw);
    }

    /// Look up an object, returning `None` when absent or destroyed.
    pub fn get(&self, uid: Uid) -> Option<ObjHandle> {
        if uid.is_null() || self.outside_range(uid.raw()) {
            return None;
        }
        self.objects
            .get(&uid.raw())
            .and_then(Weak::upgrade)
            .map(ObjHandle::from_cell)
    }

    /// Look up an object, failing with `InvalidId` when absent.
    pub fn get_checked(&self, uid: Uid) -> Result<ObjHandle> {
        self.get(uid).ok_or(Error::InvalidId(uid.raw()))
    }

    pub fn is_valid(&self, uid: Uid) -> bool {
        self.get(uid).is_some()
    }

    /// Number of live registered objects.
    pub fn count(&self) -> usize {
        self.objects
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Iterate over the live objects, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = ObjHandle> + '_ {
        self.objects
            .values()
            .filter_map(Weak::upgrade)
            .map(ObjHandle::from_cell)
    }

    /// Unregister an unshared object.
    ///
    /// Fails with `InvalidId` if no live entry exists, and refuses with a
    /// logic error to remove an object that other strong handles still
    /// share; use [`ObjectDb::release`] to unregister unconditionally.
    pub fn remove(&mut self, uid: Uid) -> Result<()> {
        let cell = self
            .objects
            .get(&uid.raw())
            .and_then(Weak::upgrade)
            .ok_or(Error::InvalidId(uid.raw()))?;

        // The upgrade above holds one extra count of its own.
        let external = Rc::strong_count(&cell) - 1;
        if external > 1 {
            return Err(Error::Logic(format!(
                "attempted to remove shared object {}",
                uid
            )));
        }

        trace!("removing object {}", uid);
        self.objects.remove(&uid.raw());
        self.dirty_if_boundary(uid.raw());
        Ok(())
    }

    /// Unregister an object regardless of how widely it is shared.
    pub fn release(&mut self, uid: Uid) -> Result<()> {
        if self.objects.remove(&uid.raw()).is_none() {
            return Err(Error::InvalidId(uid.raw()));
        }
        trace!("released object {}", uid);
        self.dirty_if_boundary(uid.raw());
        Ok(())
    }

    /// Drop entries whose objects have died. Returns the number removed.
    pub fn purge(&mut self) -> usize {
        let before = self.objects.len();
        self.objects.retain(|_, w| w.strong_count() > 0);
        let removed = before - self.objects.len();
        if removed > 0 {
            self.range_dirty.set(true);
            debug!("purged {} dead entries", removed);
        }
        removed
    }

    /// Purge repeatedly until nothing more can be removed.
    pub fn clear(&mut self) {
        while self.purge() != 0 {}
    }

    /// Forget every entry, live or dead. Objects themselves survive for
    /// as long as strong handles exist; they just stop resolving here.
    pub fn clear_all(&mut self) {
        self.objects.clear();
        self.range.set(None);
        self.range_dirty.set(false);
    }

    /// Current `[min, max]` over live uids, or `None` when empty.
    pub fn uid_range(&self) -> Option<(Uid, Uid)> {
        if self.range_dirty.get() {
            self.rederive_range();
        }
        self.range.get().map(|(lo, hi)| (Uid::new(lo), Uid::new(hi)))
    }

    fn extend_range(&mut self, raw: u64) {
        if self.range_dirty.get() {
            return; // will be re-derived wholesale
        }
        let next = match self.range.get() {
            None => (raw, raw),
            Some((lo, hi)) => (lo.min(raw), hi.max(raw)),
        };
        self.range.set(Some(next));
    }

    fn dirty_if_boundary(&self, raw: u64) {
        if let Some((lo, hi)) = self.range.get() {
            if raw == lo || raw == hi {
                self.range_dirty.set(true);
            }
        }
    }

    fn outside_range(&self, raw: u64) -> bool {
        if self.range_dirty.get() {
            self.rederive_range();
        }
        match self.range.get() {
            None => true,
            Some((lo, hi)) => raw < lo || raw > hi,
        }
    }

    fn rederive_range(&self) {
        let mut range: Option<(u64, u64)> = None;
        for (&raw, weak) in &self.objects {
            if weak.strong_count() == 0 {
                continue;
            }
            range = Some(match range {
                None => (raw, raw),
                Some((lo, hi)) => (lo.min(raw), hi.max(raw)),
            });
        }
        self.range.set(range);
        self.range_dirty.set(false);
    }
}

impl Default for ObjectDb {
    fn default() -> Self {
        Self::new()
    }
}

//! Graph resolver - per-operation bookkeeping for shared references
//!
//! State here is scoped to a single read or write operation and
//! discarded afterwards; it never persists across calls.

use super::WireId;
use crate::error::{Error, Result};
use crate::registry::{ObjHandle, ObjectDb, TypeFactory, Uid};
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Write-side resolver.
///
/// Assigns each runtime uid a sequential on-wire id (starting at 1) the
/// first time it is encountered, so the same object graph always
/// serializes to the same ids regardless of runtime memory layout, and
/// tracks which objects have already been emitted so a shared object is
/// written in full exactly once.
pub struct WriteResolver {
    ids: HashMap<u64, WireId>,
    written: HashSet<u64>,
    next_id: WireId,
}

impl WriteResolver {
    pub fn new() -> Self {
        WriteResolver {
            ids: HashMap::new(),
            written: HashSet::new(),
            next_id: 1,
        }
    }

    /// On-wire id for `uid`, assigning the next sequential id on first
    /// encounter.
    pub fn wire_id(&mut self, uid: Uid) -> WireId {
        if let Some(&id) = self.ids.get(&uid.raw()) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(uid.raw(), id);
        trace!("assigned wire id {} to object {}", id, uid);
        id
    }

    /// A sequential on-wire id not tied to any uid, for structural
    /// records (base-class segments) that can never be shared.
    pub fn fresh_wire_id(&mut self) -> WireId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn is_written(&self, uid: Uid) -> bool {
        self.written.contains(&uid.raw())
    }

    pub fn mark_written(&mut self, uid: Uid) {
        self.written.insert(uid.raw());
    }
}

impl Default for WriteResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-side resolver.
///
/// Maps on-wire ids to the objects already constructed for them, so a
/// forward or cyclic reference can be satisfied with a placeholder
/// before its defining record has been parsed. The placeholder is the
/// *same* object that later has its attributes filled in.
pub struct ReadObjectMap {
    objects: HashMap<WireId, ObjHandle>,
}

impl ReadObjectMap {
    pub fn new() -> Self {
        ReadObjectMap {
            objects: HashMap::new(),
        }
    }

    /// Object already constructed for `id`; format error if none was.
    pub fn existing(&self, id: WireId) -> Result<ObjHandle> {
        self.objects
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::Format(format!("no object was found for the wire id {}", id)))
    }

    /// Object for `id`, creating and registering a placeholder of the
    /// declared type if none exists yet.
    pub fn fetch(
        &mut self,
        type_name: &str,
        id: WireId,
        db: &mut ObjectDb,
        factory: &TypeFactory,
    ) -> Result<ObjHandle> {
        if let Some(obj) = self.objects.get(&id) {
            return Ok(obj.clone());
        }
        trace!("creating placeholder '{}' for wire id {}", type_name, id);
        let obj = db.insert(factory.create(type_name)?);
        self.objects.insert(id, obj.clone());
        Ok(obj)
    }

    /// Pre-register an existing object under `id`. Fails if an object
    /// has already been created for that id.
    pub fn register(&mut self, id: WireId, obj: ObjHandle) -> Result<()> {
        if self.objects.contains_key(&id) {
            return Err(Error::Logic(format!(
                "an object has already been created for wire id {}",
                id
            )));
        }
        self.objects.insert(id, obj);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }
}

impl Default for ReadObjectMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Sample;

    #[test]
    fn test_wire_ids_are_sequential_by_first_encounter() {
        let mut db = ObjectDb::new();
        // burn a few uids so runtime uids and wire ids diverge
        let _pad = db.insert(Box::new(Sample::new(0.0, 0.0)));
        let _pad = db.insert(Box::new(Sample::new(0.0, 0.0)));
        let a = db.insert(Box::new(Sample::new(0.0, 0.0)));
        let b = db.insert(Box::new(Sample::new(0.0, 0.0)));

        let mut resolver = WriteResolver::new();
        assert_eq!(resolver.wire_id(b.uid()), 1);
        assert_eq!(resolver.wire_id(a.uid()), 2);
        // repeat encounters keep their id
        assert_eq!(resolver.wire_id(b.uid()), 1);
        assert_eq!(resolver.fresh_wire_id(), 3);
    }

    #[test]
    fn test_written_set() {
        let mut db = ObjectDb::new();
        let a = db.insert(Box::new(Sample::new(0.0, 0.0)));
        let mut resolver = WriteResolver::new();
        assert!(!resolver.is_written(a.uid()));
        resolver.mark_written(a.uid());
        assert!(resolver.is_written(a.uid()));
    }

    #[test]
    fn test_fetch_creates_placeholder_once() {
        let mut db = ObjectDb::new();
        let mut factory = TypeFactory::new();
        factory.register::<Sample>("Sample").unwrap();

        let mut map = ReadObjectMap::new();
        let first = map.fetch("Sample", 5, &mut db, &factory).unwrap();
        let second = map.fetch("Sample", 5, &mut db, &factory).unwrap();
        assert!(first.is_same(&second));
        assert!(map.existing(5).unwrap().is_same(&first));
    }

    #[test]
    fn test_existing_fails_for_unknown_id() {
        let map = ReadObjectMap::new();
        assert!(map.existing(9).is_err());
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut db = ObjectDb::new();
        let a = db.insert(Box::new(Sample::new(0.0, 0.0)));
        let b = db.insert(Box::new(Sample::new(0.0, 0.0)));

        let mut map = ReadObjectMap::new();
        map.register(1, a).unwrap();
        assert!(map.register(1, b).is_err());
    }
}

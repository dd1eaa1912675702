//! Soft (non-owning) handles

use super::database::ObjectDb;
use super::object::ObjHandle;
use super::uid::Uid;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Non-owning handle that re-resolves by uid on every access.
///
/// A soft handle may outlive its target. Because uids are never reused,
/// resolving after the target died always reports absence rather than a
/// different object. The null handle (uid 0) never resolves.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SoftHandle {
    uid: Uid,
}

impl SoftHandle {
    /// Handle that refers to no object.
    pub fn null() -> Self {
        SoftHandle { uid: Uid::NULL }
    }

    /// Handle referring to the given uid, without checking liveness.
    pub fn from_uid(uid: Uid) -> Self {
        SoftHandle { uid }
    }

    /// Soft handle for an optional strong handle; `None` maps to null.
    pub fn of(obj: Option<&ObjHandle>) -> Self {
        obj.map(SoftHandle::from).unwrap_or_else(SoftHandle::null)
    }

    pub fn uid(&self) -> Uid {
        self.uid
    }

    pub fn is_null(&self) -> bool {
        self.uid.is_null()
    }

    /// Resolve to a strong handle, failing with `InvalidId` if the target
    /// is null, unregistered, or destroyed.
    pub fn get(&self, db: &ObjectDb) -> Result<ObjHandle> {
        db.get_checked(self.uid)
    }

    /// Lenient resolution: `None` instead of an error for a missing target.
    pub fn try_get(&self, db: &ObjectDb) -> Option<ObjHandle> {
        db.get(self.uid)
    }

    /// True if the target is currently alive in `db`.
    pub fn is_valid(&self, db: &ObjectDb) -> bool {
        db.is_valid(self.uid)
    }
}

impl Default for SoftHandle {
    fn default() -> Self {
        SoftHandle::null()
    }
}

impl From<&ObjHandle> for SoftHandle {
    fn from(obj: &ObjHandle) -> Self {
        SoftHandle { uid: obj.uid() }
    }
}

impl fmt::Debug for SoftHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SoftHandle({})", self.uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::fixtures::Sample;
    use crate::registry::ObjectDb;

    #[test]
    fn test_soft_handle_resolves_live_target() {
        let mut db = ObjectDb::new();
        let strong = db.insert(Box::new(Sample::new(1.0, 2.0)));
        let soft = SoftHandle::from(&strong);

        assert!(soft.is_valid(&db));
        assert!(soft.get(&db).unwrap().is_same(&strong));
    }

    #[test]
    fn test_soft_handle_detects_dead_target() {
        let mut db = ObjectDb::new();
        let strong = db.insert(Box::new(Sample::new(1.0, 2.0)));
        let soft = SoftHandle::from(&strong);
        drop(strong);

        assert!(!soft.is_valid(&db));
        assert!(soft.try_get(&db).is_none());
        match soft.get(&db) {
            Err(Error::InvalidId(id)) => assert_eq!(id, soft.uid().raw()),
            other => panic!("expected InvalidId, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_null_handle_never_resolves() {
        let db = ObjectDb::new();
        let soft = SoftHandle::null();
        assert!(soft.is_null());
        assert!(!soft.is_valid(&db));
        assert!(soft.try_get(&db).is_none());
    }
}

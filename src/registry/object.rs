//! Persistable objects and the strong ownership handle

use super::uid::Uid;
use crate::error::Result;
use crate::io::{Reader, VersionId, Writer};
use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

/// Contract for objects that can be stored in an [`super::ObjectDb`] and
/// carried through the reader/writer protocol.
///
/// `write_to` saves the object's state through the generic [`Writer`]
/// interface; formatting is entirely the backend's concern. `read_from`
/// restores state through the matching [`Reader`] interface. A type that
/// changes its attribute layout bumps [`Persistable::version_id`] and
/// branches on the reader's reported input version, so old files stay
/// readable.
pub trait Persistable: Any {
    /// Type tag used to select a factory at deserialization time.
    fn type_name(&self) -> &str;

    /// Serialization version for this type's on-wire layout.
    fn version_id(&self) -> VersionId {
        0
    }

    /// Restore state from a reader.
    fn read_from(&mut self, reader: &mut dyn Reader) -> Result<()>;

    /// Save state to a writer.
    fn write_to(&self, writer: &mut dyn Writer) -> Result<()>;
}

/// Shared cell pairing an object body with its identity.
///
/// The uid lives outside the body so that identity survives any borrow
/// state of the object itself.
pub(crate) struct ObjCell {
    pub(crate) uid: Uid,
    pub(crate) body: RefCell<Box<dyn Persistable>>,
}

/// Strong, owning handle to a registered object.
///
/// Copying the handle shares ownership; dropping the last copy destroys
/// the object. A handle can only be obtained from
/// [`super::ObjectDb::insert`], so every live handle refers to an object
/// that was registered at construction, and a null strong handle is
/// unrepresentable.
///
/// Equality and hashing are object identity (uid), not structural
/// comparison of the bodies.
#[derive(Clone)]
pub struct ObjHandle {
    pub(crate) cell: Rc<ObjCell>,
}

impl ObjHandle {
    pub(crate) fn from_cell(cell: Rc<ObjCell>) -> Self {
        ObjHandle { cell }
    }

    pub fn uid(&self) -> Uid {
        self.cell.uid
    }

    /// Type tag of the underlying object.
    pub fn type_name(&self) -> String {
        self.cell.body.borrow().type_name().to_string()
    }

    /// Serialization version of the underlying object.
    pub fn version_id(&self) -> VersionId {
        self.cell.body.borrow().version_id()
    }

    /// Immutable borrow of the object body.
    ///
    /// Panics if the object is currently borrowed mutably; the subsystem
    /// is single-threaded and non-reentrant by contract, so this only
    /// trips on genuine programming errors (e.g. an object serializing
    /// itself as its own owned sub-object).
    pub fn borrow(&self) -> Ref<'_, dyn Persistable> {
        Ref::map(self.cell.body.borrow(), |b| b.as_ref())
    }

    /// Mutable borrow of the object body.
    pub fn borrow_mut(&self) -> RefMut<'_, dyn Persistable> {
        RefMut::map(self.cell.body.borrow_mut(), |b| b.as_mut())
    }

    /// Checked downcast borrow to a concrete type.
    pub fn borrow_as<T: Persistable>(&self) -> Option<Ref<'_, T>> {
        Ref::filter_map(self.borrow(), |p| {
            let any: &dyn Any = p;
            any.downcast_ref::<T>()
        })
        .ok()
    }

    /// Checked downcast mutable borrow to a concrete type.
    pub fn borrow_as_mut<T: Persistable>(&self) -> Option<RefMut<'_, T>> {
        RefMut::filter_map(self.borrow_mut(), |p| {
            let any: &mut dyn Any = p;
            any.downcast_mut::<T>()
        })
        .ok()
    }

    /// True if `self` and `other` are handles to the same object.
    pub fn is_same(&self, other: &ObjHandle) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    /// Number of strong handles currently sharing this object.
    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.cell)
    }
}

impl PartialEq for ObjHandle {
    fn eq(&self, other: &Self) -> bool {
        self.cell.uid == other.cell.uid
    }
}

impl Eq for ObjHandle {}

impl std::hash::Hash for ObjHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.cell.uid.hash(state);
    }
}

impl fmt::Debug for ObjHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.body.try_borrow() {
            Ok(body) => write!(f, "ObjHandle({} {})", body.type_name(), self.cell.uid),
            Err(_) => write!(f, "ObjHandle(<borrowed> {})", self.cell.uid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Sample;
    use crate::registry::ObjectDb;

    #[test]
    fn test_handle_identity_and_downcast() {
        let mut db = ObjectDb::new();
        let a = db.insert(Box::new(Sample::new(1.0, 2.0)));
        let b = a.clone();
        let c = db.insert(Box::new(Sample::new(1.0, 2.0)));

        assert!(a.is_same(&b));
        assert_eq!(a, b);
        assert_ne!(a, c); // same contents, different identity

        let body = a.borrow_as::<Sample>().expect("downcast");
        assert_eq!(body.time, 1.0);
    }

    #[test]
    fn test_strong_count_tracks_copies() {
        let mut db = ObjectDb::new();
        let a = db.insert(Box::new(Sample::new(0.0, 0.0)));
        assert_eq!(a.strong_count(), 1);
        let b = a.clone();
        assert_eq!(a.strong_count(), 2);
        drop(b);
        assert_eq!(a.strong_count(), 1);
    }

    #[test]
    fn test_mutation_through_handle() {
        let mut db = ObjectDb::new();
        let a = db.insert(Box::new(Sample::new(1.0, 5.0)));
        a.borrow_as_mut::<Sample>().unwrap().value = 9.0;
        assert_eq!(a.borrow_as::<Sample>().unwrap().value, 9.0);
    }
}

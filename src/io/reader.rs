//! Abstract reader contract

use super::value::Value;
use super::VersionId;
use crate::error::Result;
use crate::registry::{ObjHandle, Persistable, SoftHandle};

/// Interface that objects use to restore their state in a
/// [`Persistable::read_from`] implementation.
///
/// Provides the inverse of every [`super::Writer`] operation, with the
/// same name and semantics. A missing, malformed, or type-mismatched
/// attribute fails immediately at the read call with an error naming
/// the attribute.
pub trait Reader {
    /// Serialization version of the record currently being read
    /// (0 when the stream carries none).
    fn input_version_id(&mut self) -> Result<VersionId>;

    /// Read the `char` attribute tagged `name`.
    fn read_char(&mut self, name: &str) -> Result<char>;

    /// Read the integer attribute tagged `name`.
    fn read_int(&mut self, name: &str) -> Result<i64>;

    /// Read the `bool` attribute tagged `name`.
    fn read_bool(&mut self, name: &str) -> Result<bool>;

    /// Read the `f64` attribute tagged `name`.
    fn read_double(&mut self, name: &str) -> Result<f64>;

    /// Read the string attribute tagged `name`.
    fn read_string(&mut self, name: &str) -> Result<String>;

    /// Read a self-describing [`Value`] tagged `name`.
    fn read_value_obj(&mut self, name: &str) -> Result<Value>;

    /// Read a reference to another object, which must resolve.
    ///
    /// A forward reference is satisfied with a placeholder created from
    /// the declared type tag; the placeholder's attributes are filled in
    /// later, when its defining record is reached.
    fn read_object(&mut self, name: &str) -> Result<ObjHandle>;

    /// Read a reference that tolerates "no object" (the null sentinel).
    fn read_weak_object(&mut self, name: &str) -> Result<SoftHandle>;

    /// Read an owned sub-object's record into the existing object `obj`.
    fn read_owned_object(&mut self, name: &str, obj: &mut dyn Persistable) -> Result<()>;

    /// Read the named base-class segment into the base part `base`.
    fn read_base_class(&mut self, name: &str, base: &mut dyn Persistable) -> Result<()>;

    /// Read an entire object hierarchy.
    ///
    /// With `root` supplied, the stream's root record is read into that
    /// existing instance ("read into an existing object" semantics);
    /// otherwise the root is constructed from the stream's leading type
    /// tag. Returns the root handle either way.
    fn read_root(&mut self, root: Option<&ObjHandle>) -> Result<ObjHandle>;
}

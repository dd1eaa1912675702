//! Abstract writer contract

use super::value::Value;
use crate::error::Result;
use crate::registry::{ObjHandle, Persistable, SoftHandle};

/// Interface that objects use to save their state in a
/// [`Persistable::write_to`] implementation.
///
/// To save an object graph, a client calls [`Writer::write_root`] on
/// the root object; every object and value referenced by the root is
/// stored recursively until no references remain. Backends implement
/// this interface over different storage grammars, and client types are
/// portable across all of them without modification.
pub trait Writer {
    /// Store the `char` attribute `val` under the tag `name`.
    fn write_char(&mut self, name: &str, val: char) -> Result<()>;

    /// Store the integer attribute `val` under the tag `name`.
    fn write_int(&mut self, name: &str, val: i64) -> Result<()>;

    /// Store the `bool` attribute `val` under the tag `name`.
    fn write_bool(&mut self, name: &str, val: bool) -> Result<()>;

    /// Store the `f64` attribute `val` under the tag `name`.
    fn write_double(&mut self, name: &str, val: f64) -> Result<()>;

    /// Store the string attribute `val` under the tag `name`.
    fn write_string(&mut self, name: &str, val: &str) -> Result<()>;

    /// Store a self-describing [`Value`] under the tag `name`.
    fn write_value_obj(&mut self, name: &str, val: &Value) -> Result<()>;

    /// Store a *reference* to another registered object.
    ///
    /// A null or dead handle is stored as a sentinel. A live referent is
    /// written in full exactly once per operation; any further
    /// references to it (sharing, cycles) become short references to its
    /// on-wire id.
    fn write_object(&mut self, name: &str, obj: &SoftHandle) -> Result<()>;

    /// Store an owned sub-object under the tag `name`.
    ///
    /// Ownership means no other object refers to `obj`, so the record is
    /// always inlined in full and never deduplicated.
    fn write_owned_object(&mut self, name: &str, obj: &dyn Persistable) -> Result<()>;

    /// Write the named base-class segment of an object.
    ///
    /// `base` is the base part of the object being written, modeled as a
    /// plain nested field; its record uses the same grammar as any other
    /// object, nested under the derived object's record.
    fn write_base_class(&mut self, name: &str, base: &dyn Persistable) -> Result<()>;

    /// Store an entire object hierarchy starting at `root`.
    fn write_root(&mut self, root: &ObjHandle) -> Result<()>;
}

//! Legacy positional format
//!
//! The oldest wire format, kept so existing data files stay readable.
//! Fields are whitespace-separated and strictly positional: there are
//! no attribute names, no on-wire ids, and no sharing - every object is
//! inlined in traversal order as `[TYPENAME] @<version> { fields }`,
//! with `NULL` for absent references.
//!
//! Two orthogonal flags govern the stream:
//!
//! - [`LegacyFlags::TYPE_NAMES`] - whether owned objects and base-class
//!   segments carry a leading type name (object *references* always do,
//!   since the type name is what selects the factory).
//! - [`LegacyFlags::BASES`] - whether base-class segments are emitted in
//!   full; with the flag cleared the writer emits a `@-1` stub and the
//!   reader skips the segment.
//!
//! [`LegacyWriter::with_flags`] / [`LegacyReader::with_flags`] scope a
//! flag override to one closure and restore the previous flags on every
//! exit path. This forced-flag behavior is specific to the legacy
//! format; the ASCII and XML backends always write fully-qualified base
//! segments.

use super::{utf8, Cursor};
use crate::error::{Error, Result};
use crate::io::{Reader, Value, VersionId, Writer};
use crate::registry::{ObjHandle, ObjectDb, Persistable, SoftHandle, TypeFactory};
use bitflags::bitflags;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

bitflags! {
    /// Flag set governing the legacy stream layout.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LegacyFlags: u8 {
        /// Emit/verify type names on owned objects and base classes.
        const TYPE_NAMES = 1 << 0;
        /// Emit/read base-class segments in full rather than as stubs.
        const BASES = 1 << 1;
    }
}

impl Default for LegacyFlags {
    fn default() -> Self {
        LegacyFlags::TYPE_NAMES | LegacyFlags::BASES
    }
}

/// Version marker for a stubbed-out record.
const STUB_VERSION: VersionId = -1;

///////////////////////////////////////////////////////////////////////
//
// LegacyWriter
//
///////////////////////////////////////////////////////////////////////

/// Writer for the legacy positional format.
pub struct LegacyWriter<'a, W: Write> {
    out: W,
    db: &'a ObjectDb,
    flags: LegacyFlags,
    pretty: bool,
    indent_level: usize,
    needs_break: bool,
    at_beginning: bool,
}

impl<'a, W: Write> LegacyWriter<'a, W> {
    pub fn new(out: W, db: &'a ObjectDb, flags: LegacyFlags) -> Self {
        LegacyWriter {
            out,
            db,
            flags,
            pretty: true,
            indent_level: 0,
            needs_break: false,
            at_beginning: true,
        }
    }

    pub fn flags(&self) -> LegacyFlags {
        self.flags
    }

    /// Newlines and tab indentation between records; plain spaces when
    /// disabled.
    pub fn use_pretty_print(&mut self, yes: bool) {
        self.pretty = yes;
    }

    /// Run `f` with `flags` in force, restoring the previous flags on
    /// every exit path.
    pub fn with_flags<T>(
        &mut self,
        flags: LegacyFlags,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let prev = self.flags;
        self.flags = flags;
        let result = f(self);
        self.flags = prev;
        result
    }

    fn request_break(&mut self) {
        if !self.at_beginning {
            self.needs_break = true;
        }
    }

    fn put(&mut self, text: &str) -> Result<()> {
        if self.needs_break {
            if self.pretty {
                self.out.write_all(b"\n")?;
                for _ in 0..self.indent_level {
                    self.out.write_all(b"\t")?;
                }
            } else {
                self.out.write_all(b" ")?;
            }
            self.needs_break = false;
        }
        self.at_beginning = false;
        self.out.write_all(text.as_bytes())?;
        Ok(())
    }

    /// Inline one record: `[TYPENAME] @<version> { fields }`, or a
    /// `@-1` stub when `stub_out` is set.
    fn flatten(
        &mut self,
        part: &dyn Persistable,
        with_type_name: bool,
        stub_out: bool,
    ) -> Result<()> {
        self.request_break();
        if with_type_name {
            self.put(&format!("{} ", part.type_name()))?;
        }

        if stub_out {
            self.put(&format!("@{} ", STUB_VERSION))?;
        } else {
            self.put(&format!("@{} {{", part.version_id()))?;
            self.indent_level += 1;
            self.request_break();
            let res = part.write_to(self);
            self.indent_level -= 1;
            res?;
            self.request_break();
            self.put("} ")?;
        }
        self.request_break();
        Ok(())
    }
}

impl<'a> LegacyWriter<'a, BufWriter<File>> {
    /// Write to a freshly created file.
    pub fn create(path: impl AsRef<Path>, db: &'a ObjectDb, flags: LegacyFlags) -> Result<Self> {
        let file = File::create(path.as_ref())
            .map_err(|_| Error::Filename(path.as_ref().display().to_string()))?;
        Ok(LegacyWriter::new(BufWriter::new(file), db, flags))
    }
}

impl<W: Write> Writer for LegacyWriter<'_, W> {
    fn write_char(&mut self, _name: &str, val: char) -> Result<()> {
        self.put(&format!("{} ", val))
    }

    fn write_int(&mut self, _name: &str, val: i64) -> Result<()> {
        self.put(&format!("{} ", val))
    }

    fn write_bool(&mut self, _name: &str, val: bool) -> Result<()> {
        self.put(if val { "1 " } else { "0 " })
    }

    fn write_double(&mut self, _name: &str, val: f64) -> Result<()> {
        self.put(&format!("{} ", val))
    }

    fn write_string(&mut self, _name: &str, val: &str) -> Result<()> {
        self.put(&format!("{} {} ", val.len(), val))
    }

    fn write_value_obj(&mut self, _name: &str, val: &Value) -> Result<()> {
        // the type tag leads so the reader knows how to parse the payload
        match val {
            Value::Str(s) => self.put(&format!("string {} {} ", s.len(), s)),
            other => self.put(&format!("{} {} ", other.type_name(), other)),
        }
    }

    fn write_object(&mut self, _name: &str, obj: &SoftHandle) -> Result<()> {
        match obj.try_get(self.db) {
            None => {
                self.request_break();
                self.put("NULL ")?;
                self.request_break();
                Ok(())
            }
            // references always carry the type name; it selects the
            // factory on the read side
            Some(target) => self.flatten(&*target.borrow(), true, false),
        }
    }

    fn write_owned_object(&mut self, _name: &str, obj: &dyn Persistable) -> Result<()> {
        self.flatten(obj, self.flags.contains(LegacyFlags::TYPE_NAMES), false)
    }

    fn write_base_class(&mut self, _name: &str, base: &dyn Persistable) -> Result<()> {
        let stub_out = !self.flags.contains(LegacyFlags::BASES);
        self.flatten(base, self.flags.contains(LegacyFlags::TYPE_NAMES), stub_out)
    }

    fn write_root(&mut self, root: &ObjHandle) -> Result<()> {
        debug!("writing legacy stream rooted at {}", root.uid());
        // the root is written reference-style: its type name leads the
        // stream so a reader can construct it from scratch
        self.flatten(&*root.borrow(), true, false)?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> Drop for LegacyWriter<'_, W> {
    fn drop(&mut self) {
        let _ = self.out.flush();
    }
}

///////////////////////////////////////////////////////////////////////
//
// LegacyReader
//
///////////////////////////////////////////////////////////////////////

/// Reader for the legacy positional format.
pub struct LegacyReader<'a> {
    cur: Cursor,
    db: &'a mut ObjectDb,
    factory: &'a TypeFactory,
    flags: LegacyFlags,
    version: VersionId,
}

impl<'a> LegacyReader<'a> {
    pub fn new(
        mut input: impl Read,
        db: &'a mut ObjectDb,
        factory: &'a TypeFactory,
        flags: LegacyFlags,
    ) -> Result<Self> {
        let mut buf = Vec::new();
        input.read_to_end(&mut buf)?;
        Ok(LegacyReader {
            cur: Cursor::new(buf),
            db,
            factory,
            flags,
            version: 0,
        })
    }

    pub fn from_str(
        input: &str,
        db: &'a mut ObjectDb,
        factory: &'a TypeFactory,
        flags: LegacyFlags,
    ) -> Self {
        LegacyReader {
            cur: Cursor::from_string(input.to_string()),
            db,
            factory,
            flags,
            version: 0,
        }
    }

    pub fn open(
        path: impl AsRef<Path>,
        db: &'a mut ObjectDb,
        factory: &'a TypeFactory,
        flags: LegacyFlags,
    ) -> Result<Self> {
        let file = File::open(path.as_ref())
            .map_err(|_| Error::Filename(path.as_ref().display().to_string()))?;
        Self::new(file, db, factory, flags)
    }

    pub fn flags(&self) -> LegacyFlags {
        self.flags
    }

    /// Run `f` with `flags` in force, restoring the previous flags on
    /// every exit path.
    pub fn with_flags<T>(
        &mut self,
        flags: LegacyFlags,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let prev = self.flags;
        self.flags = flags;
        let result = f(self);
        self.flags = prev;
        result
    }

    /// Read `@<version>` and, unless stubbed, `{ fields }` into `obj`.
    fn inflate(&mut self, obj: &mut dyn Persistable) -> Result<()> {
        self.cur.skip_ws();
        if self.cur.peek() != Some(b'@') {
            return Err(Error::Format("missing legacy version id".to_string()));
        }
        self.cur.bump();
        self.version = self.cur.number("legacy version id")?;

        if self.version == STUB_VERSION {
            return Ok(());
        }

        self.cur.skip_ws();
        if self.cur.bump() != Some(b'{') {
            return Err(Error::Format("missing left-brace".to_string()));
        }
        obj.read_from(self)?;
        self.cur.skip_ws();
        if self.cur.bump() != Some(b'}') {
            return Err(Error::Format("missing right-brace".to_string()));
        }
        Ok(())
    }

    fn read_typename(&mut self, expected: &str, alt: Option<&str>) -> Result<()> {
        let name = self.cur.token()?;
        if name != expected && alt.map(|a| a != name).unwrap_or(true) {
            return Err(Error::Format(format!(
                "couldn't read typename for {}: found '{}'",
                expected, name
            )));
        }
        Ok(())
    }

    fn counted_string(&mut self) -> Result<String> {
        let len: i64 = self.cur.number("character count")?;
        if len < 0 {
            return Err(Error::Format(format!(
                "saw negative character count: {}",
                len
            )));
        }
        if self.cur.bump() != Some(b' ') {
            return Err(Error::Format(
                "missing whitespace after character count".to_string(),
            ));
        }
        utf8(self.cur.take_bytes(len as usize)?)
    }
}

impl Reader for LegacyReader<'_> {
    fn input_version_id(&mut self) -> Result<VersionId> {
        Ok(self.version)
    }

    fn read_char(&mut self, name: &str) -> Result<char> {
        self.cur.skip_ws();
        self.cur
            .bump()
            .map(|b| b as char)
            .ok_or_else(|| Error::attribute(name, "unexpected end of input"))
    }

    fn read_int(&mut self, name: &str) -> Result<i64> {
        self.cur
            .number("int field")
            .map_err(|e| Error::attribute(name, e.to_string()))
    }

    fn read_bool(&mut self, name: &str) -> Result<bool> {
        Ok(self.read_int(name)? != 0)
    }

    fn read_double(&mut self, name: &str) -> Result<f64> {
        self.cur
            .number("double field")
            .map_err(|e| Error::attribute(name, e.to_string()))
    }

    fn read_string(&mut self, name: &str) -> Result<String> {
        self.counted_string()
            .map_err(|e| Error::attribute(name, e.to_string()))
    }

    fn read_value_obj(&mut self, name: &str) -> Result<Value> {
        let type_name = self.cur.token()?;
        let result = if type_name == "string" {
            self.counted_string().map(Value::Str)
        } else {
            let payload = self.cur.token()?;
            Value::parse(&type_name, &payload)
        };
        result.map_err(|e| Error::attribute(name, e.to_string()))
    }

    fn read_object(&mut self, name: &str) -> Result<ObjHandle> {
        let type_name = self.cur.token()?;
        if type_name == "NULL" {
            return Err(Error::attribute(name, "unexpected null object reference"));
        }
        let obj = self.db.insert(self.factory.create(&type_name)?);
        self.inflate(&mut *obj.borrow_mut())?;
        Ok(obj)
    }

    fn read_weak_object(&mut self, _name: &str) -> Result<SoftHandle> {
        let type_name = self.cur.token()?;
        if type_name == "NULL" {
            return Ok(SoftHandle::null());
        }
        let obj = self.db.insert(self.factory.create(&type_name)?);
        self.inflate(&mut *obj.borrow_mut())?;
        Ok(SoftHandle::from(&obj))
    }

    fn read_owned_object(&mut self, _name: &str, obj: &mut dyn Persistable) -> Result<()> {
        if self.flags.contains(LegacyFlags::TYPE_NAMES) {
            self.read_typename(obj.type_name(), None)?;
        }
        self.inflate(obj)
    }

    fn read_base_class(&mut self, name: &str, base: &mut dyn Persistable) -> Result<()> {
        if self.flags.contains(LegacyFlags::TYPE_NAMES) {
            // accept either the real typename or the descriptive name
            // given to the base segment, for compatibility with old files
            self.read_typename(base.type_name(), Some(name))?;
        }
        self.inflate(base)
    }

    fn read_root(&mut self, root: Option<&ObjHandle>) -> Result<ObjHandle> {
        debug!("reading legacy stream");
        match root {
            None => self.read_object("root_object"),
            Some(given) => {
                self.read_typename(&given.type_name(), None)?;
                self.inflate(&mut *given.borrow_mut())?;
                Ok(given.clone())
            }
        }
    }
}

//! ASCII brace-delimited stream format
//!
//! A stream is a sequence of records, one per object:
//!
//! ```text
//! Trial 1 := { v1 3
//! cstring label := 5 t-001^
//! Sample target := 2^
//! double weight := 0.5^
//! }
//! ```
//!
//! Each record is `TYPENAME ID := { [v<version>] <count> attrs }`; an
//! attribute is `TYPE NAME := VALUE` terminated by `^`. Object
//! references are bare wire ids (0 = null) and the referents are queued
//! for emission as later stream-level records; owned objects and base
//! classes are inlined as nested brace blocks. Strings are
//! length-prefixed and escaped (`\\`, `\c` for `^`, `\{`, `\}`);
//! unescaping is brace-depth-aware so nested records pass through
//! untouched until their own attributes are parsed.

use super::{utf8, Cursor};
use crate::error::{Error, Result};
use crate::io::{
    Reader, ReadObjectMap, Value, VersionId, WireId, WriteResolver, Writer,
};
use crate::registry::{ObjHandle, ObjectDb, Persistable, SoftHandle, TypeFactory};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

const ATTRIB_ENDER: &str = "^\n";

fn add_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '^' => out.push_str("\\c"),
            '{' => out.push_str("\\{"),
            '}' => out.push_str("\\}"),
            _ => out.push(ch),
        }
    }
    out
}

/// Read an attribute value up to the `^` terminator at brace depth 0.
///
/// Escape sequences are substituted only at depth 0; anything inside a
/// nested brace block keeps its escapes, since the nested record will be
/// parsed on its own later.
fn read_escaped_value(cur: &mut Cursor) -> Result<String> {
    let mut out: Vec<u8> = Vec::new();
    let mut brace_level = 0i32;

    loop {
        let ch = match cur.bump() {
            Some(ch) => ch,
            None => break,
        };

        if ch == b'\\' {
            // escaped characters never count toward the brace depth
            let ch2 = cur.bump().ok_or_else(|| {
                Error::Format("missing character after trailing backslash".to_string())
            })?;
            if brace_level > 0 {
                // keep the sequence intact for the nested record's parse
                out.push(b'\\');
                out.push(ch2);
                continue;
            }
            match ch2 {
                b'\\' => out.push(b'\\'),
                b'c' => out.push(b'^'),
                b'{' => out.push(b'{'),
                b'}' => out.push(b'}'),
                other => {
                    return Err(Error::Format(format!(
                        "invalid escape character '{}'",
                        other as char
                    )))
                }
            }
            continue;
        }

        if brace_level == 0 && ch == b'^' {
            return utf8(out);
        }
        if ch == b'{' {
            brace_level += 1;
        }
        if ch == b'}' {
            brace_level -= 1;
        }
        out.push(ch);
    }

    Err(Error::Format(
        "unterminated attribute value".to_string(),
    ))
}

///////////////////////////////////////////////////////////////////////
//
// AsciiWriter
//
///////////////////////////////////////////////////////////////////////

struct RecordBuf {
    version: VersionId,
    attrs: Vec<String>,
}

/// Writer for the ASCII brace format.
pub struct AsciiWriter<'a, W: Write> {
    out: W,
    db: &'a ObjectDb,
    resolver: WriteResolver,
    pending: Vec<ObjHandle>,
    records: Vec<RecordBuf>,
}

impl<'a, W: Write> AsciiWriter<'a, W> {
    pub fn new(out: W, db: &'a ObjectDb) -> Self {
        AsciiWriter {
            out,
            db,
            resolver: WriteResolver::new(),
            pending: Vec::new(),
            records: Vec::new(),
        }
    }

    fn push_attr(&mut self, type_name: &str, name: &str, value: &str) -> Result<()> {
        let record = self.records.last_mut().ok_or_else(|| {
            Error::Logic("attribute written outside an object record".to_string())
        })?;
        record.attrs.push(format!("{} {} := {}", type_name, name, value));
        Ok(())
    }

    /// Render one record body: `{ [v<version>] <count> attrs... }`.
    fn flatten_to_value(&mut self, obj: &dyn Persistable) -> Result<String> {
        self.records.push(RecordBuf {
            version: obj.version_id(),
            attrs: Vec::new(),
        });
        let res = obj.write_to(self);
        let record = self.records.pop().expect("record stack underflow");
        res?;

        let mut out = String::from("{ ");
        if record.version > 0 {
            out.push_str(&format!("v{} ", record.version));
        }
        out.push_str(&format!("{}\n", record.attrs.len()));
        for attr in &record.attrs {
            out.push_str(attr);
            out.push_str(ATTRIB_ENDER);
        }
        out.push_str("}\n");
        Ok(out)
    }
}

impl<'a> AsciiWriter<'a, BufWriter<File>> {
    /// Write to a freshly created file.
    pub fn create(path: impl AsRef<Path>, db: &'a ObjectDb) -> Result<Self> {
        let file = File::create(path.as_ref())
            .map_err(|_| Error::Filename(path.as_ref().display().to_string()))?;
        Ok(AsciiWriter::new(BufWriter::new(file), db))
    }
}

impl<W: Write> Writer for AsciiWriter<'_, W> {
    fn write_char(&mut self, name: &str, val: char) -> Result<()> {
        self.push_attr("char", name, &val.to_string())
    }

    fn write_int(&mut self, name: &str, val: i64) -> Result<()> {
        self.push_attr("int", name, &val.to_string())
    }

    fn write_bool(&mut self, name: &str, val: bool) -> Result<()> {
        self.push_attr("bool", name, if val { "1" } else { "0" })
    }

    fn write_double(&mut self, name: &str, val: f64) -> Result<()> {
        self.push_attr("double", name, &val.to_string())
    }

    fn write_string(&mut self, name: &str, val: &str) -> Result<()> {
        let value = format!("{} {}", val.len(), add_escapes(val));
        self.push_attr("cstring", name, &value)
    }

    fn write_value_obj(&mut self, name: &str, val: &Value) -> Result<()> {
        self.push_attr(val.type_name(), name, &add_escapes(&val.to_string()))
    }

    fn write_object(&mut self, name: &str, obj: &SoftHandle) -> Result<()> {
        match obj.try_get(self.db) {
            Some(target) => {
                let id = self.resolver.wire_id(target.uid());
                if !self.resolver.is_written(target.uid()) {
                    self.pending.push(target.clone());
                }
                self.push_attr(&target.type_name(), name, &id.to_string())
            }
            None => self.push_attr("NULL", name, "0"),
        }
    }

    fn write_owned_object(&mut self, name: &str, obj: &dyn Persistable) -> Result<()> {
        let type_name = obj.type_name().to_string();
        let body = self.flatten_to_value(obj)?;
        self.push_attr(&type_name, name, &body)
    }

    fn write_base_class(&mut self, name: &str, base: &dyn Persistable) -> Result<()> {
        self.write_owned_object(name, base)
    }

    fn write_root(&mut self, root: &ObjHandle) -> Result<()> {
        debug!("writing ascii stream rooted at {}", root.uid());
        self.resolver = WriteResolver::new();
        self.pending.clear();
        self.pending.push(root.clone());

        while let Some(obj) = self.pending.pop() {
            if self.resolver.is_written(obj.uid()) {
                continue;
            }
            let id = self.resolver.wire_id(obj.uid());
            let type_name = obj.type_name();
            // mark first so self-references resolve as short refs
            self.resolver.mark_written(obj.uid());
            let body = {
                let borrowed = obj.borrow();
                self.flatten_to_value(&*borrowed)?
            };
            write!(self.out, "{} {} := {}", type_name, id, body)?;
        }

        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> Drop for AsciiWriter<'_, W> {
    fn drop(&mut self) {
        let _ = self.out.flush();
    }
}

///////////////////////////////////////////////////////////////////////
//
// AsciiReader
//
///////////////////////////////////////////////////////////////////////

struct Attrib {
    type_name: String,
    value: String,
}

/// Attributes of one record, consumed as the object asks for them.
struct AttribMap {
    obj_tag: String,
    version: VersionId,
    attribs: Vec<(String, Attrib)>,
}

impl AttribMap {
    fn take(&mut self, name: &str) -> Result<Attrib> {
        if let Some(idx) = self.attribs.iter().position(|(n, _)| n == name) {
            return Ok(self.attribs.remove(idx).1);
        }
        let known: Vec<&str> = self.attribs.iter().map(|(n, _)| n.as_str()).collect();
        Err(Error::attribute(
            name,
            format!(
                "no such attribute for {}; known attributes are: [{}]",
                self.obj_tag,
                known.join(", ")
            ),
        ))
    }
}

/// Reader for the ASCII brace format.
pub struct AsciiReader<'a> {
    main: Cursor,
    db: &'a mut ObjectDb,
    factory: &'a TypeFactory,
    objects: ReadObjectMap,
    attribs: Vec<AttribMap>,
}

impl<'a> AsciiReader<'a> {
    pub fn new(
        mut input: impl Read,
        db: &'a mut ObjectDb,
        factory: &'a TypeFactory,
    ) -> Result<Self> {
        let mut buf = Vec::new();
        input.read_to_end(&mut buf)?;
        Ok(AsciiReader {
            main: Cursor::new(buf),
            db,
            factory,
            objects: ReadObjectMap::new(),
            attribs: Vec::new(),
        })
    }

    pub fn from_str(
        input: &str,
        db: &'a mut ObjectDb,
        factory: &'a TypeFactory,
    ) -> Self {
        AsciiReader {
            main: Cursor::from_string(input.to_string()),
            db,
            factory,
            objects: ReadObjectMap::new(),
            attribs: Vec::new(),
        }
    }

    pub fn open(
        path: impl AsRef<Path>,
        db: &'a mut ObjectDb,
        factory: &'a TypeFactory,
    ) -> Result<Self> {
        let file = File::open(path.as_ref())
            .map_err(|_| Error::Filename(path.as_ref().display().to_string()))?;
        Self::new(file, db, factory)
    }

    fn current_attribs(&mut self) -> Result<&mut AttribMap> {
        self.attribs.last_mut().ok_or_else(|| {
            Error::Logic("attempted to read attribute when no attribute map was active".to_string())
        })
    }

    fn take_attrib(&mut self, name: &str) -> Result<Attrib> {
        self.current_attribs()?.take(name)
    }

    /// Parse `{ [v<version>] <count> attrs }` from `cur` and let `obj`
    /// pull its attributes out of the resulting map.
    fn inflate_from(
        &mut self,
        cur: &mut Cursor,
        obj_tag: &str,
        obj: &mut dyn Persistable,
    ) -> Result<()> {
        cur.expect("{")?;
        cur.skip_ws();

        let mut version: VersionId = 0;
        if cur.peek() == Some(b'v') {
            cur.bump();
            version = cur.number("serialization version id")?;
        }

        let count: i64 = cur.number("attribute count")?;
        if count < 0 {
            return Err(Error::Format(format!(
                "found a negative attribute count: {}",
                count
            )));
        }

        let mut map = AttribMap {
            obj_tag: obj_tag.to_string(),
            version,
            attribs: Vec::with_capacity(count as usize),
        };
        for _ in 0..count {
            let type_name = cur.token()?;
            let name = cur.token()?;
            cur.expect(":=")?;
            let value = read_escaped_value(cur)?;
            map.attribs.push((name, Attrib { type_name, value }));
        }

        self.attribs.push(map);
        let res = obj.read_from(self);
        self.attribs.pop();
        res?;

        cur.expect("}")?;
        Ok(())
    }

    fn parse_counted_string(name: &str, value: &str) -> Result<String> {
        let mut cur = Cursor::from_string(value.to_string());
        let len: i64 = cur
            .number("string length")
            .map_err(|_| Error::attribute(name, format!("bad string attribute '{}'", value)))?;
        if len < 0 {
            return Err(Error::Format(format!(
                "found a negative length for a string attribute: {}",
                len
            )));
        }
        // exactly one char of whitespace separates the length and the bytes
        if cur.bump() != Some(b' ') {
            return Err(Error::attribute(
                name,
                "missing whitespace after string length".to_string(),
            ));
        }
        let bytes = cur
            .take_bytes(len as usize)
            .map_err(|_| Error::attribute(name, "string shorter than its declared length"))?;
        utf8(bytes)
    }
}

impl Reader for AsciiReader<'_> {
    fn input_version_id(&mut self) -> Result<VersionId> {
        Ok(self.current_attribs()?.version)
    }

    fn read_char(&mut self, name: &str) -> Result<char> {
        let a = self.take_attrib(name)?;
        a.value
            .trim()
            .chars()
            .next()
            .ok_or_else(|| Error::attribute(name, format!("bad char attribute '{}'", a.value)))
    }

    fn read_int(&mut self, name: &str) -> Result<i64> {
        let a = self.take_attrib(name)?;
        a.value
            .trim()
            .parse()
            .map_err(|_| Error::attribute(name, format!("bad int attribute '{}'", a.value)))
    }

    fn read_bool(&mut self, name: &str) -> Result<bool> {
        Ok(self.read_int(name)? != 0)
    }

    fn read_double(&mut self, name: &str) -> Result<f64> {
        let a = self.take_attrib(name)?;
        a.value
            .trim()
            .parse()
            .map_err(|_| Error::attribute(name, format!("bad double attribute '{}'", a.value)))
    }

    fn read_string(&mut self, name: &str) -> Result<String> {
        let a = self.take_attrib(name)?;
        Self::parse_counted_string(name, &a.value)
    }

    fn read_value_obj(&mut self, name: &str) -> Result<Value> {
        let a = self.take_attrib(name)?;
        Value::parse(&a.type_name, &a.value)
            .map_err(|e| Error::attribute(name, e.to_string()))
    }

    fn read_object(&mut self, name: &str) -> Result<ObjHandle> {
        let a = self.take_attrib(name)?;
        let id: WireId = a
            .value
            .trim()
            .parse()
            .map_err(|_| Error::attribute(name, format!("bad object id '{}'", a.value)))?;
        if id == 0 {
            return Err(Error::attribute(name, "unexpected null object reference"));
        }
        self.objects.fetch(&a.type_name, id, self.db, self.factory)
    }

    fn read_weak_object(&mut self, name: &str) -> Result<SoftHandle> {
        let a = self.take_attrib(name)?;
        let id: WireId = a
            .value
            .trim()
            .parse()
            .map_err(|_| Error::attribute(name, format!("bad object id '{}'", a.value)))?;
        if id == 0 {
            return Ok(SoftHandle::null());
        }
        let obj = self.objects.fetch(&a.type_name, id, self.db, self.factory)?;
        Ok(SoftHandle::from(&obj))
    }

    fn read_owned_object(&mut self, name: &str, obj: &mut dyn Persistable) -> Result<()> {
        let a = self.take_attrib(name)?;
        let mut cur = Cursor::from_string(a.value);
        self.inflate_from(&mut cur, name, obj)
    }

    fn read_base_class(&mut self, name: &str, base: &mut dyn Persistable) -> Result<()> {
        self.read_owned_object(name, base)
    }

    fn read_root(&mut self, root: Option<&ObjHandle>) -> Result<ObjHandle> {
        debug!("reading ascii stream");
        self.objects.clear();

        let mut root_id: Option<WireId> = None;

        while !self.main.at_end() {
            let type_name = self.main.token()?;
            let id: WireId = self.main.number("typename and object id")?;
            self.main.expect(":=")?;

            if root_id.is_none() {
                root_id = Some(id);
                if let Some(given) = root {
                    self.objects.register(id, given.clone())?;
                }
            }

            let obj = self.objects.fetch(&type_name, id, self.db, self.factory)?;

            // the main cursor steps aside while nested records borrow us
            let mut cur = std::mem::take(&mut self.main);
            let res = self.inflate_from(&mut cur, &type_name, &mut *obj.borrow_mut());
            self.main = cur;
            res?;
        }

        let root_id = root_id
            .ok_or_else(|| Error::Format("input stream contained no object records".to_string()))?;
        self.objects.existing(root_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{fixture_factory, Channel, Sample};

    #[test]
    fn test_escape_round_trip() {
        let hostile = "a^b\\c{d}e";
        let escaped = add_escapes(hostile);
        assert_eq!(escaped, "a\\cb\\\\c\\{d\\}e");

        let mut cur = Cursor::from_string(format!("{}^", escaped));
        assert_eq!(read_escaped_value(&mut cur).unwrap(), hostile);
    }

    #[test]
    fn test_escaped_value_keeps_escapes_inside_braces() {
        let mut cur = Cursor::from_string("{ x := 1 \\{ \\c^\n}\n^rest".to_string());
        let value = read_escaped_value(&mut cur).unwrap();
        assert_eq!(value, "{ x := 1 \\{ \\c^\n}\n");
    }

    #[test]
    fn test_bad_escape_is_a_format_error() {
        let mut cur = Cursor::from_string("ab\\q^".to_string());
        assert!(matches!(
            read_escaped_value(&mut cur),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_simple_round_trip() {
        let mut db = ObjectDb::new();
        let factory = fixture_factory();

        let obj = db.insert(Box::new(Channel {
            label: "pupil^{left}".to_string(),
            samples: vec![0.25, -1.5],
            gain: 2.0,
            annotation: Value::Str("baseline".to_string()),
        }));

        let mut out = Vec::new();
        AsciiWriter::new(&mut out, &db).write_root(&obj).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Channel 1 := {"));

        let mut db2 = ObjectDb::new();
        let mut reader = AsciiReader::from_str(&text, &mut db2, &factory);
        let root = reader.read_root(None).unwrap();
        let chan = root.borrow_as::<Channel>().unwrap();
        assert_eq!(chan.label, "pupil^{left}");
        assert_eq!(chan.samples, vec![0.25, -1.5]);
        assert_eq!(chan.annotation, Value::Str("baseline".to_string()));
    }

    #[test]
    fn test_missing_attribute_names_it() {
        let mut db = ObjectDb::new();
        let factory = fixture_factory();
        // a Sample record missing its 'value' attribute
        let text = "Sample 1 := { 1\ndouble time := 0.5^\n}\n";
        let mut reader = AsciiReader::from_str(text, &mut db, &factory);
        match reader.read_root(None) {
            Err(Error::Attribute { name, .. }) => assert_eq!(name, "value"),
            other => panic!("expected attribute error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_negative_attribute_count_is_fatal() {
        let mut db = ObjectDb::new();
        let factory = fixture_factory();
        let text = "Sample 1 := { -2\n}\n";
        let mut reader = AsciiReader::from_str(text, &mut db, &factory);
        assert!(matches!(reader.read_root(None), Err(Error::Format(_))));
    }

    #[test]
    fn test_read_into_given_root() {
        let mut db = ObjectDb::new();
        let factory = fixture_factory();
        let obj = db.insert(Box::new(Sample::new(1.0, 2.0)));

        let text = "Sample 7 := { 2\ndouble time := 4.5^\ndouble value := 9.0^\n}\n";
        let mut reader = AsciiReader::from_str(text, &mut db, &factory);
        let root = reader.read_root(Some(&obj)).unwrap();

        assert!(root.is_same(&obj));
        assert_eq!(obj.borrow_as::<Sample>().unwrap().time, 4.5);
    }
}

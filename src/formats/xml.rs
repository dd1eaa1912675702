//! XML format
//!
//! One root `<object>` element per document; nested `object`,
//! `ownedobj`, and `baseclass` elements all carry `type`, `id`, `name`,
//! and `version` attributes. An object that was already written is
//! referenced with a short `<objref type=".." id=".." name=".."/>` tag,
//! which is how sharing is preserved and cycles are broken. On-wire ids
//! come from the write resolver's sequential counter, so an unchanged
//! object graph produces byte-identical output on every write - saved
//! files diff cleanly under version control.

use crate::error::{Error, Result};
use crate::io::{
    Reader, ReadObjectMap, Value, VersionId, WireId, WriteResolver, Writer,
};
use crate::registry::{ObjHandle, ObjectDb, Persistable, SoftHandle, TypeFactory};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

///////////////////////////////////////////////////////////////////////
//
// XmlWriter
//
///////////////////////////////////////////////////////////////////////

/// Writer for the XML format.
pub struct XmlWriter<'a, W: Write> {
    out: W,
    db: &'a ObjectDb,
    resolver: WriteResolver,
    nest_level: usize,
}

impl<'a, W: Write> XmlWriter<'a, W> {
    pub fn new(out: W, db: &'a ObjectDb) -> Self {
        XmlWriter {
            out,
            db,
            resolver: WriteResolver::new(),
            nest_level: 0,
        }
    }

    fn indent(&mut self) -> Result<()> {
        for _ in 0..self.nest_level {
            self.out.write_all(b"\t")?;
        }
        Ok(())
    }

    fn write_leaf(&mut self, tag: &str, name: &str, value: &str) -> Result<()> {
        self.indent()?;
        writeln!(
            self.out,
            "<{} name=\"{}\" value=\"{}\"/>",
            tag,
            escape(name),
            escape(value)
        )?;
        Ok(())
    }

    /// Emit a full nested record for a registered object.
    fn flatten_handle(&mut self, obj: &ObjHandle, name: &str, xmltype: &str) -> Result<()> {
        let id = self.resolver.wire_id(obj.uid());
        // mark up front: a cycle back to this object becomes an objref
        self.resolver.mark_written(obj.uid());
        self.open_record(xmltype, &obj.type_name(), id, name, obj.version_id())?;
        obj.borrow().write_to(self)?;
        self.close_record(xmltype)
    }

    /// Emit a full nested record for a structural part (owned object or
    /// base-class segment); these can never be shared, so they get a
    /// fresh sequential id.
    fn flatten_part(&mut self, part: &dyn Persistable, name: &str, xmltype: &str) -> Result<()> {
        let id = self.resolver.fresh_wire_id();
        self.open_record(xmltype, part.type_name(), id, name, part.version_id())?;
        part.write_to(self)?;
        self.close_record(xmltype)
    }

    fn open_record(
        &mut self,
        xmltype: &str,
        type_name: &str,
        id: WireId,
        name: &str,
        version: VersionId,
    ) -> Result<()> {
        self.indent()?;
        writeln!(
            self.out,
            "<{} type=\"{}\" id=\"{}\" name=\"{}\" version=\"{}\">",
            xmltype,
            escape(type_name),
            id,
            escape(name),
            version
        )?;
        self.nest_level += 1;
        Ok(())
    }

    fn close_record(&mut self, xmltype: &str) -> Result<()> {
        self.nest_level -= 1;
        self.indent()?;
        writeln!(self.out, "</{}>", xmltype)?;
        Ok(())
    }
}

impl<'a> XmlWriter<'a, BufWriter<File>> {
    /// Write to a freshly created file.
    pub fn create(path: impl AsRef<Path>, db: &'a ObjectDb) -> Result<Self> {
        let file = File::create(path.as_ref())
            .map_err(|_| Error::Filename(path.as_ref().display().to_string()))?;
        Ok(XmlWriter::new(BufWriter::new(file), db))
    }
}

impl<W: Write> Writer for XmlWriter<'_, W> {
    fn write_char(&mut self, name: &str, val: char) -> Result<()> {
        self.write_leaf("char", name, &val.to_string())
    }

    fn write_int(&mut self, name: &str, val: i64) -> Result<()> {
        self.write_leaf("int", name, &val.to_string())
    }

    fn write_bool(&mut self, name: &str, val: bool) -> Result<()> {
        self.write_leaf("bool", name, if val { "1" } else { "0" })
    }

    fn write_double(&mut self, name: &str, val: f64) -> Result<()> {
        self.write_leaf("double", name, &val.to_string())
    }

    fn write_string(&mut self, name: &str, val: &str) -> Result<()> {
        self.indent()?;
        if val.is_empty() {
            writeln!(self.out, "<string name=\"{}\"/>", escape(name))?;
        } else {
            writeln!(
                self.out,
                "<string name=\"{}\">{}</string>",
                escape(name),
                escape(val)
            )?;
        }
        Ok(())
    }

    fn write_value_obj(&mut self, name: &str, val: &Value) -> Result<()> {
        self.indent()?;
        writeln!(
            self.out,
            "<valobj type=\"{}\" name=\"{}\" value=\"{}\"/>",
            val.type_name(),
            escape(name),
            escape(&val.to_string())
        )?;
        Ok(())
    }

    fn write_object(&mut self, name: &str, obj: &SoftHandle) -> Result<()> {
        match obj.try_get(self.db) {
            Some(target) => {
                if self.resolver.is_written(target.uid()) {
                    let id = self.resolver.wire_id(target.uid());
                    self.indent()?;
                    writeln!(
                        self.out,
                        "<objref type=\"{}\" id=\"{}\" name=\"{}\"/>",
                        escape(&target.type_name()),
                        id,
                        escape(name)
                    )?;
                    Ok(())
                } else {
                    self.flatten_handle(&target, name, "object")
                }
            }
            None => {
                self.indent()?;
                writeln!(
                    self.out,
                    "<objref type=\"NULL\" id=\"0\" name=\"{}\"/>",
                    escape(name)
                )?;
                Ok(())
            }
        }
    }

    fn write_owned_object(&mut self, name: &str, obj: &dyn Persistable) -> Result<()> {
        self.flatten_part(obj, name, "ownedobj")
    }

    fn write_base_class(&mut self, name: &str, base: &dyn Persistable) -> Result<()> {
        self.flatten_part(base, name, "baseclass")
    }

    fn write_root(&mut self, root: &ObjHandle) -> Result<()> {
        debug!("writing xml document rooted at {}", root.uid());
        self.resolver = WriteResolver::new();
        self.nest_level = 0;

        writeln!(self.out, "<?xml version=\"1.0\"?>")?;
        writeln!(self.out, "<!-- ObjectDB XML 1 -->")?;
        self.flatten_handle(root, "root", "object")?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> Drop for XmlWriter<'_, W> {
    fn drop(&mut self) {
        let _ = self.out.flush();
    }
}

///////////////////////////////////////////////////////////////////////
//
// Element parser
//
///////////////////////////////////////////////////////////////////////

/// Parsed element tree; just enough XML for this grammar.
struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn require_attr(&self, name: &str) -> Result<&str> {
        self.attr(name).ok_or_else(|| {
            Error::Format(format!("<{}> element missing '{}' attribute", self.tag, name))
        })
    }
}

struct XmlParser {
    buf: Vec<u8>,
    pos: usize,
}

impl XmlParser {
    fn new(buf: Vec<u8>) -> Self {
        XmlParser { buf, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.buf[self.pos..].starts_with(s.as_bytes())
    }

    fn skip_ws(&mut self) {
        while self
            .peek()
            .map(|b| b.is_ascii_whitespace())
            .unwrap_or(false)
        {
            self.pos += 1;
        }
    }

    fn skip_until(&mut self, end: &str) -> Result<()> {
        while self.pos < self.buf.len() {
            if self.starts_with(end) {
                self.pos += end.len();
                return Ok(());
            }
            self.pos += 1;
        }
        Err(Error::Format(format!("unterminated '{}' section", end)))
    }

    fn name(&mut self) -> Result<String> {
        let start = self.pos;
        while self
            .peek()
            .map(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
            .unwrap_or(false)
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(Error::Format("expected a name in xml input".to_string()));
        }
        Ok(String::from_utf8_lossy(&self.buf[start..self.pos]).into_owned())
    }

    fn expect_byte(&mut self, b: u8) -> Result<()> {
        if self.peek() != Some(b) {
            return Err(Error::Format(format!(
                "malformed xml: expected '{}'",
                b as char
            )));
        }
        self.pos += 1;
        Ok(())
    }

    /// Parse the document prologue and the single root element.
    fn document(&mut self) -> Result<Element> {
        loop {
            self.skip_ws();
            if self.starts_with("<?") {
                self.skip_until("?>")?;
            } else if self.starts_with("<!--") {
                self.skip_until("-->")?;
            } else {
                break;
            }
        }
        self.element()
    }

    fn element(&mut self) -> Result<Element> {
        self.expect_byte(b'<')?;
        let tag = self.name()?;
        let mut attrs = Vec::new();

        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'/') => {
                    self.pos += 1;
                    self.expect_byte(b'>')?;
                    return Ok(Element {
                        tag,
                        attrs,
                        children: Vec::new(),
                        text: String::new(),
                    });
                }
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                _ => {
                    let name = self.name()?;
                    self.expect_byte(b'=')?;
                    self.expect_byte(b'"')?;
                    let start = self.pos;
                    while self.peek().map(|b| b != b'"').unwrap_or(false) {
                        self.pos += 1;
                    }
                    let raw = String::from_utf8_lossy(&self.buf[start..self.pos]).into_owned();
                    self.expect_byte(b'"')?;
                    attrs.push((name, unescape(&raw)?));
                }
            }
        }

        let mut children = Vec::new();
        let mut text = String::new();
        loop {
            if self.pos >= self.buf.len() {
                return Err(Error::Format(format!("missing closing tag for <{}>", tag)));
            }
            if self.starts_with("</") {
                self.pos += 2;
                let close = self.name()?;
                if close != tag {
                    return Err(Error::Format(format!(
                        "mismatched closing tag: <{}> closed by </{}>",
                        tag, close
                    )));
                }
                self.skip_ws();
                self.expect_byte(b'>')?;
                return Ok(Element {
                    tag,
                    attrs,
                    children,
                    text,
                });
            }
            if self.starts_with("<!--") {
                self.skip_until("-->")?;
                continue;
            }
            if self.peek() == Some(b'<') {
                children.push(self.element()?);
                continue;
            }
            let start = self.pos;
            while self.peek().map(|b| b != b'<').unwrap_or(false) {
                self.pos += 1;
            }
            let raw = String::from_utf8_lossy(&self.buf[start..self.pos]).into_owned();
            text.push_str(&unescape(&raw)?);
        }
    }
}

fn unescape(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];
        let entity = [
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&amp;", '&'),
            ("&quot;", '"'),
            ("&apos;", '\''),
        ]
        .iter()
        .find(|(e, _)| rest.starts_with(e));
        match entity {
            Some((e, ch)) => {
                out.push(*ch);
                rest = &rest[e.len()..];
            }
            None => {
                return Err(Error::Format(format!(
                    "invalid xml entity near '{}'",
                    &rest[..rest.len().min(8)]
                )))
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

///////////////////////////////////////////////////////////////////////
//
// XmlReader
//
///////////////////////////////////////////////////////////////////////

struct Frame {
    version: VersionId,
    children: Vec<Element>,
}

/// Reader for the XML format.
pub struct XmlReader<'a> {
    root_elem: Option<Element>,
    db: &'a mut ObjectDb,
    factory: &'a TypeFactory,
    objects: ReadObjectMap,
    frames: Vec<Frame>,
}

impl<'a> XmlReader<'a> {
    pub fn new(
        mut input: impl Read,
        db: &'a mut ObjectDb,
        factory: &'a TypeFactory,
    ) -> Result<Self> {
        let mut buf = Vec::new();
        input.read_to_end(&mut buf)?;
        let root_elem = XmlParser::new(buf).document()?;
        Ok(XmlReader {
            root_elem: Some(root_elem),
            db,
            factory,
            objects: ReadObjectMap::new(),
            frames: Vec::new(),
        })
    }

    pub fn from_str(
        input: &str,
        db: &'a mut ObjectDb,
        factory: &'a TypeFactory,
    ) -> Result<Self> {
        Self::new(input.as_bytes(), db, factory)
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

    fn take_child(&mut self, name: &str, tags: &[&str]) -> Result<Element> {
        let frame = self.frames.last_mut().ok_or_else(|| {
            Error::Logic("attempted to read attribute when no record was active".to_string())
        })?;
        let idx = frame
            .children
            .iter()
            .position(|e| tags.contains(&e.tag.as_str()) && e.attr("name") == Some(name));
        match idx {
            Some(idx) => Ok(frame.children.remove(idx)),
            None => {
                let known: Vec<String> = frame
                    .children
                    .iter()
                    .filter_map(|e| e.attr("name").map(str::to_string))
                    .collect();
                Err(Error::attribute(
                    name,
                    format!(
                        "no <{}> element named '{}'; known attributes are: [{}]",
                        tags.join("|"),
                        name,
                        known.join(", ")
                    ),
                ))
            }
        }
    }

    fn record_version(elem: &Element) -> Result<VersionId> {
        match elem.attr("version") {
            None => Ok(0),
            Some(text) => text.parse().map_err(|_| {
                Error::Format(format!("bad version attribute '{}'", text))
            }),
        }
    }

    /// Push a record frame for `elem` and let `obj` pull its attributes.
    fn inflate(&mut self, elem: Element, obj: &mut dyn Persistable) -> Result<()> {
        self.frames.push(Frame {
            version: Self::record_version(&elem)?,
            children: elem.children,
        });
        let res = obj.read_from(self);
        self.frames.pop();
        res
    }

    /// Fetch (or create) the object for an inline `<object>` element and
    /// fill in its attributes.
    fn inflate_inline_object(&mut self, elem: Element) -> Result<ObjHandle> {
        let type_name = elem.require_attr("type")?.to_string();
        let id: WireId = elem
            .require_attr("id")?
            .parse()
            .map_err(|_| Error::Format("bad id attribute".to_string()))?;
        let obj = self
            .objects
            .fetch(&type_name, id, self.db, self.factory)?;
        self.inflate(elem, &mut *obj.borrow_mut())?;
        Ok(obj)
    }
}

impl Reader for XmlReader<'_> {
    fn input_version_id(&mut self) -> Result<VersionId> {
        self.frames
            .last()
            .map(|f| f.version)
            .ok_or_else(|| Error::Logic("no record is being read".to_string()))
    }

    fn read_char(&mut self, name: &str) -> Result<char> {
        let e = self.take_child(name, &["char"])?;
        let value = e.require_attr("value")?;
        value
            .chars()
            .next()
            .ok_or_else(|| Error::attribute(name, "empty char attribute"))
    }

    fn read_int(&mut self, name: &str) -> Result<i64> {
        let e = self.take_child(name, &["int"])?;
        let value = e.require_attr("value")?;
        value
            .parse()
            .map_err(|_| Error::attribute(name, format!("bad int attribute '{}'", value)))
    }

    fn read_bool(&mut self, name: &str) -> Result<bool> {
        let e = self.take_child(name, &["bool"])?;
        let value = e.require_attr("value")?;
        value
            .parse::<i64>()
            .map(|n| n != 0)
            .map_err(|_| Error::attribute(name, format!("bad bool attribute '{}'", value)))
    }

    fn read_double(&mut self, name: &str) -> Result<f64> {
        let e = self.take_child(name, &["double"])?;
        let value = e.require_attr("value")?;
        value
            .parse()
            .map_err(|_| Error::attribute(name, format!("bad double attribute '{}'", value)))
    }

    fn read_string(&mut self, name: &str) -> Result<String> {
        let e = self.take_child(name, &["string"])?;
        Ok(e.text)
    }

    fn read_value_obj(&mut self, name: &str) -> Result<Value> {
        let e = self.take_child(name, &["valobj"])?;
        let type_name = e.require_attr("type")?;
        let value = e.require_attr("value")?;
        Value::parse(type_name, value).map_err(|err| Error::attribute(name, err.to_string()))
    }

    fn read_object(&mut self, name: &str) -> Result<ObjHandle> {
        match self.read_weak_object_impl(name)? {
            Some(obj) => Ok(obj),
            None => Err(Error::attribute(name, "unexpected null object reference")),
        }
    }

    fn read_weak_object(&mut self, name: &str) -> Result<SoftHandle> {
        Ok(self
            .read_weak_object_impl(name)?
            .map(|obj| SoftHandle::from(&obj))
            .unwrap_or_else(SoftHandle::null))
    }

    fn read_owned_object(&mut self, name: &str, obj: &mut dyn Persistable) -> Result<()> {
        let e = self.take_child(name, &["ownedobj", "object"])?;
        let declared = e.require_attr("type")?;
        if declared != obj.type_name() {
            return Err(Error::Format(format!(
                "owned object '{}' declares type '{}' but '{}' was expected",
                name,
                declared,
                obj.type_name()
            )));
        }
        self.inflate(e, obj)
    }

    fn read_base_class(&mut self, name: &str, base: &mut dyn Persistable) -> Result<()> {
        let e = self.take_child(name, &["baseclass"])?;
        self.inflate(e, base)
    }

    fn read_root(&mut self, root: Option<&ObjHandle>) -> Result<ObjHandle> {
        debug!("reading xml document");
        self.objects.clear();

        let elem = self
            .root_elem
            .take()
            .ok_or_else(|| Error::Logic("document root was already consumed".to_string()))?;
        if elem.tag != "object" {
            return Err(Error::Format(format!(
                "document root must be an <object> element, found <{}>",
                elem.tag
            )));
        }

        if let Some(given) = root {
            let id: WireId = elem
                .require_attr("id")?
                .parse()
                .map_err(|_| Error::Format("bad id attribute".to_string()))?;
            self.objects.register(id, given.clone())?;
        }

        self.inflate_inline_object(elem)
    }
}

impl XmlReader<'_> {
    fn read_weak_object_impl(&mut self, name: &str) -> Result<Option<ObjHandle>> {
        let e = self.take_child(name, &["objref", "object"])?;
        match e.tag.as_str() {
            "objref" => {
                let id: WireId = e
                    .require_attr("id")?
                    .parse()
                    .map_err(|_| Error::Format("bad id attribute".to_string()))?;
                if id == 0 {
                    return Ok(None);
                }
                let type_name = e.require_attr("type")?;
                Ok(Some(self.objects.fetch(
                    type_name,
                    id,
                    self.db,
                    self.factory,
                )?))
            }
            _ => Ok(Some(self.inflate_inline_object(e)?)),
        }
    }
}

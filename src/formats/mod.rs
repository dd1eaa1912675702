//! Concrete format backends
//!
//! Three interchangeable implementations of the abstract reader/writer
//! protocol:
//!
//! - [`ascii`] — human-readable brace-delimited stream format
//! - [`xml`] — XML documents with explicit sharing via `objref` tags
//! - [`legacy`] — positional, id-less format kept for old files
//!
//! Client object types are written once against the protocol traits and
//! are portable across all backends without modification.

pub mod ascii;
pub mod legacy;
pub mod xml;

pub use ascii::{AsciiReader, AsciiWriter};
pub use legacy::{LegacyFlags, LegacyReader, LegacyWriter};
pub use xml::{XmlReader, XmlWriter};

use crate::error::{Error, Result};

/// Byte cursor with whitespace-separated token reads, shared by the
/// stream-oriented backends.
#[derive(Default)]
pub(crate) struct Cursor {
    buf: Vec<u8>,
    pos: usize,
}

impl Cursor {
    pub(crate) fn new(buf: Vec<u8>) -> Self {
        Cursor { buf, pos: 0 }
    }

    pub(crate) fn from_string(text: String) -> Self {
        Cursor::new(text.into_bytes())
    }

    pub(crate) fn skip_ws(&mut self) {
        while self
            .peek()
            .map(|b| b.is_ascii_whitespace())
            .unwrap_or(false)
        {
            self.pos += 1;
        }
    }

    /// True when only whitespace remains.
    pub(crate) fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.pos >= self.buf.len()
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    pub(crate) fn bump(&mut self) -> Option<u8> {
        let b = self.peek();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    /// Next whitespace-delimited token.
    pub(crate) fn token(&mut self) -> Result<String> {
        self.skip_ws();
        let start = self.pos;
        while self
            .peek()
            .map(|b| !b.is_ascii_whitespace())
            .unwrap_or(false)
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(Error::Format("unexpected end of input".to_string()));
        }
        String::from_utf8(self.buf[start..self.pos].to_vec())
            .map_err(|_| Error::Format("input is not valid utf-8".to_string()))
    }

    /// Consume one token and require it to be `expected`.
    pub(crate) fn expect(&mut self, expected: &str) -> Result<()> {
        let tok = self.token()?;
        if tok != expected {
            return Err(Error::Format(format!(
                "expected '{}' but found '{}'",
                expected, tok
            )));
        }
        Ok(())
    }

    /// Consume one token and parse it as a number.
    pub(crate) fn number<T: std::str::FromStr>(&mut self, what: &str) -> Result<T> {
        let tok = self.token()?;
        tok.parse()
            .map_err(|_| Error::Format(format!("input failed while reading {}: '{}'", what, tok)))
    }

    /// Take exactly `n` raw bytes.
    pub(crate) fn take_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        if self.pos + n > self.buf.len() {
            return Err(Error::Format(
                "unexpected end of input inside counted field".to_string(),
            ));
        }
        let bytes = self.buf[self.pos..self.pos + n].to_vec();
        self.pos += n;
        Ok(bytes)
    }
}

pub(crate) fn utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| Error::Format("input is not valid utf-8".to_string()))
}

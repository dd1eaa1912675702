//! Counted-sequence helpers
//!
//! A sequence is stored as a count attribute named `<seq>Count` followed
//! by positionally-suffixed element attributes `<seq>0`, `<seq>1`, ...
//! The read helpers accept a pre-known count to avoid a redundant
//! lookup when the count was already consumed.

use super::reader::Reader;
use super::value::Value;
use super::writer::Writer;
use crate::error::{Error, Result};
use crate::registry::{ObjHandle, SoftHandle};

/// Attribute name of a sequence's count.
pub fn count_name(seq_name: &str) -> String {
    format!("{}Count", seq_name)
}

/// Attribute name of a sequence element.
pub fn element_name(seq_name: &str, index: usize) -> String {
    format!("{}{}", seq_name, index)
}

/// Read the stored element count of `seq_name`. A negative count on the
/// wire is a hard format error.
pub fn read_sequence_len(reader: &mut dyn Reader, seq_name: &str) -> Result<usize> {
    let count = reader.read_int(&count_name(seq_name))?;
    if count < 0 {
        return Err(Error::Format(format!(
            "read negative count {} for sequence '{}'",
            count, seq_name
        )));
    }
    Ok(count as usize)
}

/// Per-type dispatch for the primitive read/write operations, so the
/// sequence helpers can be written once for every supported scalar.
pub trait ScalarValue: Sized {
    fn write_scalar(writer: &mut dyn Writer, name: &str, val: &Self) -> Result<()>;
    fn read_scalar(reader: &mut dyn Reader, name: &str) -> Result<Self>;
}

impl ScalarValue for char {
    fn write_scalar(writer: &mut dyn Writer, name: &str, val: &Self) -> Result<()> {
        writer.write_char(name, *val)
    }
    fn read_scalar(reader: &mut dyn Reader, name: &str) -> Result<Self> {
        reader.read_char(name)
    }
}

impl ScalarValue for i64 {
    fn write_scalar(writer: &mut dyn Writer, name: &str, val: &Self) -> Result<()> {
        writer.write_int(name, *val)
    }
    fn read_scalar(reader: &mut dyn Reader, name: &str) -> Result<Self> {
        reader.read_int(name)
    }
}

impl ScalarValue for i32 {
    fn write_scalar(writer: &mut dyn Writer, name: &str, val: &Self) -> Result<()> {
        writer.write_int(name, i64::from(*val))
    }
    fn read_scalar(reader: &mut dyn Reader, name: &str) -> Result<Self> {
        let val = reader.read_int(name)?;
        i32::try_from(val)
            .map_err(|_| Error::attribute(name, format!("value {} overflows i32", val)))
    }
}

impl ScalarValue for bool {
    fn write_scalar(writer: &mut dyn Writer, name: &str, val: &Self) -> Result<()> {
        writer.write_bool(name, *val)
    }
    fn read_scalar(reader: &mut dyn Reader, name: &str) -> Result<Self> {
        reader.read_bool(name)
    }
}

impl ScalarValue for f64 {
    fn write_scalar(writer: &mut dyn Writer, name: &str, val: &Self) -> Result<()> {
        writer.write_double(name, *val)
    }
    fn read_scalar(reader: &mut dyn Reader, name: &str) -> Result<Self> {
        reader.read_double(name)
    }
}

impl ScalarValue for String {
    fn write_scalar(writer: &mut dyn Writer, name: &str, val: &Self) -> Result<()> {
        writer.write_string(name, val)
    }
    fn read_scalar(reader: &mut dyn Reader, name: &str) -> Result<Self> {
        reader.read_string(name)
    }
}

/// Write a counted sequence of scalar values.
pub fn write_value_seq<T: ScalarValue>(
    writer: &mut dyn Writer,
    seq_name: &str,
    items: &[T],
    skip_count: bool,
) -> Result<()> {
    if !skip_count {
        writer.write_int(&count_name(seq_name), items.len() as i64)?;
    }
    for (i, item) in items.iter().enumerate() {
        T::write_scalar(writer, &element_name(seq_name, i), item)?;
    }
    Ok(())
}

/// Read a counted sequence of scalar values.
pub fn read_value_seq<T: ScalarValue>(
    reader: &mut dyn Reader,
    seq_name: &str,
    known_count: Option<usize>,
) -> Result<Vec<T>> {
    let count = match known_count {
        Some(n) => n,
        None => read_sequence_len(reader, seq_name)?,
    };
    let mut items = Vec::with_capacity(count);
    for i in 0..count {
        items.push(T::read_scalar(reader, &element_name(seq_name, i))?);
    }
    Ok(items)
}

/// Write a counted sequence of self-describing values.
pub fn write_value_obj_seq(
    writer: &mut dyn Writer,
    seq_name: &str,
    items: &[Value],
    skip_count: bool,
) -> Result<()> {
    if !skip_count {
        writer.write_int(&count_name(seq_name), items.len() as i64)?;
    }
    for (i, item) in items.iter().enumerate() {
        writer.write_value_obj(&element_name(seq_name, i), item)?;
    }
    Ok(())
}

/// Read a counted sequence of self-describing values.
pub fn read_value_obj_seq(
    reader: &mut dyn Reader,
    seq_name: &str,
    known_count: Option<usize>,
) -> Result<Vec<Value>> {
    let count = match known_count {
        Some(n) => n,
        None => read_sequence_len(reader, seq_name)?,
    };
    let mut items = Vec::with_capacity(count);
    for i in 0..count {
        items.push(reader.read_value_obj(&element_name(seq_name, i))?);
    }
    Ok(items)
}

/// Write a counted sequence of object references.
pub fn write_object_seq(
    writer: &mut dyn Writer,
    seq_name: &str,
    items: &[SoftHandle],
    skip_count: bool,
) -> Result<()> {
    if !skip_count {
        writer.write_int(&count_name(seq_name), items.len() as i64)?;
    }
    for (i, item) in items.iter().enumerate() {
        writer.write_object(&element_name(seq_name, i), item)?;
    }
    Ok(())
}

/// Read a counted sequence of object references; every element must
/// resolve.
pub fn read_object_seq(
    reader: &mut dyn Reader,
    seq_name: &str,
    known_count: Option<usize>,
) -> Result<Vec<ObjHandle>> {
    let count = match known_count {
        Some(n) => n,
        None => read_sequence_len(reader, seq_name)?,
    };
    let mut items = Vec::with_capacity(count);
    for i in 0..count {
        items.push(reader.read_object(&element_name(seq_name, i))?);
    }
    Ok(items)
}

//! Test object types exercising the full protocol surface.

use crate::error::Result;
use crate::io::{ensure_version_id, seq, Reader, Value, VersionId, Writer};
use crate::registry::{Persistable, SoftHandle};

/// Smallest possible persistable: two primitive attributes.
#[derive(Debug, Default, PartialEq)]
pub struct Sample {
    pub time: f64,
    pub value: f64,
}

impl Sample {
    pub fn new(time: f64, value: f64) -> Self {
        Sample { time, value }
    }
}

impl Persistable for Sample {
    fn type_name(&self) -> &str {
        "Sample"
    }

    fn read_from(&mut self, reader: &mut dyn Reader) -> Result<()> {
        self.time = reader.read_double("time")?;
        self.value = reader.read_double("value")?;
        Ok(())
    }

    fn write_to(&self, writer: &mut dyn Writer) -> Result<()> {
        writer.write_double("time", self.time)?;
        writer.write_double("value", self.value)
    }
}

/// Exercises strings, sequences, and value objects.
#[derive(Debug, Default, PartialEq)]
pub struct Channel {
    pub label: String,
    pub samples: Vec<f64>,
    pub gain: f64,
    pub annotation: Value,
}

impl Persistable for Channel {
    fn type_name(&self) -> &str {
        "Channel"
    }

    fn read_from(&mut self, reader: &mut dyn Reader) -> Result<()> {
        self.label = reader.read_string("label")?;
        self.samples = seq::read_value_seq(reader, "samples", None)?;
        self.gain = reader.read_double("gain")?;
        self.annotation = reader.read_value_obj("annotation")?;
        Ok(())
    }

    fn write_to(&self, writer: &mut dyn Writer) -> Result<()> {
        writer.write_string("label", &self.label)?;
        seq::write_value_seq(writer, "samples", &self.samples, false)?;
        writer.write_double("gain", self.gain)?;
        writer.write_value_obj("annotation", &self.annotation)
    }
}

/// Base part used through `write_base_class` / `read_base_class`.
#[derive(Debug, Default, PartialEq)]
pub struct Transform {
    pub dx: f64,
    pub dy: f64,
    pub scale: f64,
}

impl Persistable for Transform {
    fn type_name(&self) -> &str {
        "Transform"
    }

    fn read_from(&mut self, reader: &mut dyn Reader) -> Result<()> {
        self.dx = reader.read_double("dx")?;
        self.dy = reader.read_double("dy")?;
        self.scale = reader.read_double("scale")?;
        Ok(())
    }

    fn write_to(&self, writer: &mut dyn Writer) -> Result<()> {
        writer.write_double("dx", self.dx)?;
        writer.write_double("dy", self.dy)?;
        writer.write_double("scale", self.scale)
    }
}

/// Versioned type composing a base-class segment.
///
/// Version 1 added the `tag` attribute; reading a version-0 record
/// leaves the default tag in place.
#[derive(Debug, Default, PartialEq)]
pub struct Patch {
    pub base: Transform,
    pub radius: f64,
    pub active: bool,
    pub tag: char,
}

impl Persistable for Patch {
    fn type_name(&self) -> &str {
        "Patch"
    }

    fn version_id(&self) -> VersionId {
        1
    }

    fn read_from(&mut self, reader: &mut dyn Reader) -> Result<()> {
        let version = ensure_version_id("Patch", reader.input_version_id()?, 0)?;
        self.radius = reader.read_double("radius")?;
        self.active = reader.read_bool("active")?;
        if version >= 1 {
            self.tag = reader.read_char("tag")?;
        }
        reader.read_base_class("Transform", &mut self.base)
    }

    fn write_to(&self, writer: &mut dyn Writer) -> Result<()> {
        writer.write_double("radius", self.radius)?;
        writer.write_bool("active", self.active)?;
        writer.write_char("tag", self.tag)?;
        writer.write_base_class("Transform", &self.base)
    }
}

/// Exercises shared references plus an owned sub-object.
#[derive(Debug, Default)]
pub struct Trial {
    pub label: String,
    pub target: SoftHandle,
    pub flanker: SoftHandle,
    pub calibration: Channel,
    pub weight: f64,
}

impl Persistable for Trial {
    fn type_name(&self) -> &str {
        "Trial"
    }

    fn read_from(&mut self, reader: &mut dyn Reader) -> Result<()> {
        self.label = reader.read_string("label")?;
        self.target = reader.read_weak_object("target")?;
        self.flanker = reader.read_weak_object("flanker")?;
        reader.read_owned_object("calibration", &mut self.calibration)?;
        self.weight = reader.read_double("weight")?;
        Ok(())
    }

    fn write_to(&self, writer: &mut dyn Writer) -> Result<()> {
        writer.write_string("label", &self.label)?;
        writer.write_object("target", &self.target)?;
        writer.write_object("flanker", &self.flanker)?;
        writer.write_owned_object("calibration", &self.calibration)?;
        writer.write_double("weight", self.weight)
    }
}

/// Minimal linked node for cycle tests.
#[derive(Debug, Default)]
pub struct Node {
    pub tag: String,
    pub next: SoftHandle,
}

impl Persistable for Node {
    fn type_name(&self) -> &str {
        "Node"
    }

    fn read_from(&mut self, reader: &mut dyn Reader) -> Result<()> {
        self.tag = reader.read_string("tag")?;
        self.next = reader.read_weak_object("next")?;
        Ok(())
    }

    fn write_to(&self, writer: &mut dyn Writer) -> Result<()> {
        writer.write_string("tag", &self.tag)?;
        writer.write_object("next", &self.next)
    }
}

/// Register every fixture type in a fresh factory.
pub fn fixture_factory() -> crate::registry::TypeFactory {
    let mut factory = crate::registry::TypeFactory::new();
    factory.register::<Sample>("Sample").unwrap();
    factory.register::<Channel>("Channel").unwrap();
    factory.register::<Patch>("Patch").unwrap();
    factory.register::<Trial>("Trial").unwrap();
    factory.register::<Node>("Node").unwrap();
    factory
}

//! Shared object types for the integration tests.
#![allow(dead_code)] // not every test binary uses every fixture

use objectdb::error::Result;
use objectdb::io::{seq, Reader, Value, Writer};
use objectdb::{Persistable, SoftHandle, TypeFactory};

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

/// Strings, scalar sequences, and a value object.
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

/// Shared references plus an owned sub-object.
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

/// Counted sequence of object references.
#[derive(Debug, Default)]
pub struct Block {
    pub label: String,
    pub members: Vec<SoftHandle>,
}

impl Persistable for Block {
    fn type_name(&self) -> &str {
        "Block"
    }

    fn read_from(&mut self, reader: &mut dyn Reader) -> Result<()> {
        self.label = reader.read_string("label")?;
        let members = seq::read_object_seq(reader, "members", None)?;
        self.members = members.iter().map(SoftHandle::from).collect();
        Ok(())
    }

    fn write_to(&self, writer: &mut dyn Writer) -> Result<()> {
        writer.write_string("label", &self.label)?;
        seq::write_object_seq(writer, "members", &self.members, false)
    }
}

/// Linked node, for reference cycles.
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

/// Install a subscriber so `RUST_LOG=debug` shows backend activity.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

pub fn test_factory() -> TypeFactory {
    let mut factory = TypeFactory::new();
    factory.register::<Sample>("Sample").unwrap();
    factory.register::<Channel>("Channel").unwrap();
    factory.register::<Trial>("Trial").unwrap();
    factory.register::<Block>("Block").unwrap();
    factory.register::<Node>("Node").unwrap();
    factory
}

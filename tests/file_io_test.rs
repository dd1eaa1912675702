//! File-backed backends: create/open round trips and filename errors.

mod common;

use common::{test_factory, Channel, Sample};
use objectdb::error::Error;
use objectdb::formats::{AsciiReader, AsciiWriter, XmlReader, XmlWriter};
use objectdb::io::Value;
use objectdb::{ObjectDb, Reader, Writer};

#[test]
fn test_ascii_file_round_trip() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.asw");

    let mut db = ObjectDb::new();
    let obj = db.insert(Box::new(Channel {
        label: "trace".to_string(),
        samples: vec![0.5, 0.25],
        gain: 1.5,
        annotation: Value::Bool(true),
    }));

    {
        let mut writer = AsciiWriter::create(&path, &db).unwrap();
        writer.write_root(&obj).unwrap();
    } // stream is flushed when the writer goes away

    let factory = test_factory();
    let mut db2 = ObjectDb::new();
    let mut reader = AsciiReader::open(&path, &mut db2, &factory).unwrap();
    let back = reader.read_root(None).unwrap();
    assert_eq!(back.borrow_as::<Channel>().unwrap().gain, 1.5);
}

#[test]
fn test_xml_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.xml");

    let mut db = ObjectDb::new();
    let obj = db.insert(Box::new(Sample::new(0.25, 8.0)));

    {
        let mut writer = XmlWriter::create(&path, &db).unwrap();
        writer.write_root(&obj).unwrap();
    }

    let factory = test_factory();
    let mut db2 = ObjectDb::new();
    let mut reader = XmlReader::open(&path, &mut db2, &factory).unwrap();
    let back = reader.read_root(None).unwrap();
    assert_eq!(back.borrow_as::<Sample>().unwrap().value, 8.0);
}

#[test]
fn test_unopenable_paths_fail_with_filename_error() {
    let db = ObjectDb::new();
    let factory = test_factory();

    let missing_dir = std::path::Path::new("/nonexistent-dir/out.asw");
    match AsciiWriter::create(missing_dir, &db) {
        Err(Error::Filename(path)) => assert!(path.contains("out.asw")),
        other => panic!("expected filename error, got {:?}", other.map(|_| ())),
    }

    let mut db2 = ObjectDb::new();
    let missing_file = std::path::Path::new("/nonexistent-dir/in.xml");
    assert!(matches!(
        XmlReader::open(missing_file, &mut db2, &factory),
        Err(Error::Filename(_))
    ));
}

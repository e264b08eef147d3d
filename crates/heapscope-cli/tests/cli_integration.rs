//! Integration tests for the heapscope commands.
//!
//! Each test writes a small dump image to a temp file and runs a command
//! against it.

use std::path::{Path, PathBuf};
use std::process::Command;

use heapscope_cli::commands::{inspect, layout};
use heapscope_engine::layout::{flags, ADDRESS_TYPE, INSTANCE_HEADER_TYPE, INT_TYPE};
use heapscope_engine::{Address, DumpImage, FieldType, TypeRecord, STRING_TYPE};
use tempfile::TempDir;

const POINT_KLASS: u64 = 0x1000;
const STRING_KLASS: u64 = 0x1100;
const BYTES_KLASS: u64 = 0x1200;

const POINT_OBJ: u64 = 0x8000;
const STRING_OBJ: u64 = 0x8100;
const BYTES_OBJ: u64 = 0x8200;

/// Compressed class pointers, uncompressed references: header 12 bytes
fn sample_image() -> DumpImage {
    let mut image = DumpImage::new();
    image
        .set_type_size(ADDRESS_TYPE, 8)
        .set_type_size(INT_TYPE, 4)
        .set_type_size(INSTANCE_HEADER_TYPE, 16)
        .set_flag(flags::COMPRESSED_CLASS_POINTERS, true);

    image.add_type(TypeRecord::instance("java/lang/Object", Address::new(0x900), 16));
    image.add_type(
        TypeRecord::instance("Point", Address::new(POINT_KLASS), 24)
            .with_super("java/lang/Object")
            .with_field("x", 12, FieldType::Int)
            .with_field("y", 16, FieldType::Int),
    );
    image.add_type(
        TypeRecord::instance(STRING_TYPE, Address::new(STRING_KLASS), 24)
            .with_super("java/lang/Object")
            .with_field("value", 16, FieldType::Reference)
            .with_field("coder", 12, FieldType::Byte),
    );
    image.add_type(TypeRecord::type_array(
        "[B",
        Address::new(BYTES_KLASS),
        FieldType::Byte,
    ));

    image
        .map_segment(Address::new(0x8000), vec![0; 0x400])
        .unwrap();

    // Point { x: 3, y: -4 }
    image.write_u64(Address::new(POINT_OBJ), 1).unwrap();
    image
        .write_u32(Address::new(POINT_OBJ + 8), POINT_KLASS as u32)
        .unwrap();
    image.write_u32(Address::new(POINT_OBJ + 12), 3).unwrap();
    image
        .write_u32(Address::new(POINT_OBJ + 16), (-4i32) as u32)
        .unwrap();

    // "ok" as Latin-1 bytes: length at 12, elements at 16
    image.write_u64(Address::new(BYTES_OBJ), 1).unwrap();
    image
        .write_u32(Address::new(BYTES_OBJ + 8), BYTES_KLASS as u32)
        .unwrap();
    image.write_u32(Address::new(BYTES_OBJ + 12), 2).unwrap();
    image.write_bytes(Address::new(BYTES_OBJ + 16), b"ok").unwrap();

    image.write_u64(Address::new(STRING_OBJ), 1).unwrap();
    image
        .write_u32(Address::new(STRING_OBJ + 8), STRING_KLASS as u32)
        .unwrap();
    image
        .write_u64(Address::new(STRING_OBJ + 16), BYTES_OBJ)
        .unwrap();

    image
}

fn write_image(dir: &TempDir, image: &DumpImage) -> PathBuf {
    let path = dir.path().join("heap.json");
    std::fs::write(&path, image.to_json().unwrap()).unwrap();
    path
}

fn inspect_at(path: &Path, address: &str, include_vm_fields: bool) -> anyhow::Result<String> {
    let options = inspect::InspectOptions {
        address: address.to_string(),
        include_vm_fields,
    };
    inspect::execute(path, &options)
}

#[test]
fn test_layout_command() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, &sample_image());

    let report = layout::execute(&path).unwrap();
    assert!(report.starts_with("Layout of "));
    assert!(report.contains("compressed class pointers"));
    assert!(report.contains("header size:       12 bytes"));
    assert!(report.contains("type pointer:      +8, 4 bytes"));
    assert!(report.contains("little-endian"));
}

#[test]
fn test_inspect_instance() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, &sample_image());

    let report = inspect_at(&path, "0x8000", true).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines[0], "Oop for Point @ 0x8000 (24 bytes, header 12)");
    assert_eq!(lines[1], "  +0    _mark: markWord = 0x0000000000000001");
    assert_eq!(lines[2], "  +8    _metadata._compressed_klass: metadata = 0x1000");
    assert_eq!(lines[3], "  +12   x: int = 3");
    assert_eq!(lines[4], "  +16   y: int = -4");
}

#[test]
fn test_inspect_without_vm_fields() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, &sample_image());

    let report = inspect_at(&path, "32768", false).unwrap();
    assert!(!report.contains("_mark"));
    assert_eq!(report.lines().count(), 3);
}

#[test]
fn test_inspect_string_shows_value() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, &sample_image());

    let report = inspect_at(&path, "0x8100", false).unwrap();
    assert!(report.contains("  value: \"ok\""));
    assert!(report.contains("value: reference = 0x8200"));
}

#[test]
fn test_inspect_unknown_object() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, &sample_image());

    // Zeroed memory: type pointer 0 matches no type
    let err = inspect_at(&path, "0x8300", true).unwrap_err();
    assert!(format!("{:#}", err).contains("Type resolution failed"));
}

#[test]
fn test_inspect_missing_image() {
    let dir = TempDir::new().unwrap();
    let err = inspect_at(&dir.path().join("absent.json"), "0x8000", true).unwrap_err();
    assert!(err.to_string().starts_with("loading image"));
}

#[test]
fn test_layout_rejects_incomplete_image() {
    let dir = TempDir::new().unwrap();
    let mut image = DumpImage::new();
    image.set_type_size(ADDRESS_TYPE, 8);
    let path = write_image(&dir, &image);

    assert!(layout::execute(&path).is_err());
}

#[test]
fn test_binary_exit_status() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, &sample_image());
    let binary = env!("CARGO_BIN_EXE_heapscope");

    let ok = Command::new(binary)
        .args(["--color", "never", "inspect"])
        .arg(&path)
        .arg("0x8000")
        .output()
        .unwrap();
    assert!(ok.status.success());
    assert!(String::from_utf8_lossy(&ok.stdout).contains("x: int = 3"));

    let bad = Command::new(binary)
        .args(["--color", "never", "inspect"])
        .arg(&path)
        .arg("not-an-address")
        .output()
        .unwrap();
    assert!(!bad.status.success());
    assert!(String::from_utf8_lossy(&bad.stderr).contains("invalid address"));
}

//! Dump images
//!
//! A [`DumpImage`] is a self-contained capture of a target: VM type sizes,
//! flags and constants, the type records the heap refers to, and the mapped
//! memory segments. It implements both [`MemoryProvider`] and
//! [`TypeDatabase`], so an [`ObjectHeap`](crate::ObjectHeap) can decode a
//! dump offline exactly as it would a live process.
//!
//! On disk an image is a JSON document:
//!
//! ```text
//! {
//!   "type_sizes": { "address": 8, "jint": 4, "instanceOopDesc": 16 },
//!   "flags":      { "UseCompressedClassPointers": true },
//!   "constants":  { "CompressedKlassPointers::_shift": 3 },
//!   "types":      [ { "name": "java/lang/Object", "klass": 4096, "kind": "instance", ... } ],
//!   "segments":   [ { "base": 65536, "bytes": "01000000..." } ]
//! }
//! ```
//!
//! Segment bytes are hex encoded.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::{HeapError, HeapResult};
use crate::layout::flags;
use crate::target::{Address, FieldDescriptor, MemoryProvider, TypeDatabase, TypeRecord};

/// Errors loading or building a dump image
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed image document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid image: {0}")]
    Invalid(String),
}

/// One contiguous range of captured memory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySegment {
    /// Address of the first byte
    pub base: Address,
    /// Captured contents
    #[serde(with = "hex::serde")]
    pub bytes: Vec<u8>,
}

impl MemorySegment {
    /// One past the last mapped address
    pub fn end(&self) -> u64 {
        self.base.as_u64() + self.bytes.len() as u64
    }

    fn contains(&self, address: Address, len: usize) -> bool {
        let start = address.as_u64();
        start >= self.base.as_u64()
            && start
                .checked_add(len as u64)
                .map_or(false, |end| end <= self.end())
    }
}

/// Serialized form of a [`DumpImage`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageDocument {
    #[serde(default)]
    pub type_sizes: BTreeMap<String, u64>,
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
    #[serde(default)]
    pub constants: BTreeMap<String, u64>,
    #[serde(default)]
    pub types: Vec<TypeRecord>,
    #[serde(default)]
    pub segments: Vec<MemorySegment>,
}

/// In-memory target built from a dump or assembled by hand
#[derive(Debug, Clone, Default)]
pub struct DumpImage {
    type_sizes: FxHashMap<String, u64>,
    flags: FxHashMap<String, bool>,
    constants: FxHashMap<String, u64>,
    by_name: FxHashMap<String, Arc<TypeRecord>>,
    by_klass: FxHashMap<Address, Arc<TypeRecord>>,
    /// Sorted by base, never overlapping
    segments: Vec<MemorySegment>,
}

impl DumpImage {
    /// Create an empty image
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Loading and saving
    // ------------------------------------------------------------------------

    /// Load an image document from `path`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let image = Self::from_json(&text)?;
        log::debug!(
            "loaded image {}: {} types, {} segments",
            path.display(),
            image.by_name.len(),
            image.segments.len()
        );
        Ok(image)
    }

    /// Parse an image document
    pub fn from_json(text: &str) -> Result<Self, ImageError> {
        Self::from_document(serde_json::from_str(text)?)
    }

    /// Build an image from its serialized form
    pub fn from_document(document: ImageDocument) -> Result<Self, ImageError> {
        let mut image = Self::new();
        image.type_sizes.extend(document.type_sizes);
        image.flags.extend(document.flags);
        image.constants.extend(document.constants);
        for record in document.types {
            if image.by_name.contains_key(&record.name) {
                return Err(ImageError::Invalid(format!(
                    "type {} declared twice",
                    record.name
                )));
            }
            if let Some(existing) = image.by_klass.get(&record.klass) {
                return Err(ImageError::Invalid(format!(
                    "type {} reuses descriptor {} of {}",
                    record.name, record.klass, existing.name
                )));
            }
            image.add_type(record);
        }
        for segment in document.segments {
            image.map_segment(segment.base, segment.bytes)?;
        }
        Ok(image)
    }

    /// Serialized form of this image, with deterministic ordering
    pub fn to_document(&self) -> ImageDocument {
        let mut types: Vec<TypeRecord> = self.by_name.values().map(|r| (**r).clone()).collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        ImageDocument {
            type_sizes: self.type_sizes.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            flags: self.flags.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            constants: self.constants.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            types,
            segments: self.segments.clone(),
        }
    }

    /// Pretty-printed JSON document
    pub fn to_json(&self) -> Result<String, ImageError> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    // ------------------------------------------------------------------------
    // Building
    // ------------------------------------------------------------------------

    pub fn set_type_size(&mut self, name: impl Into<String>, size: u64) -> &mut Self {
        self.type_sizes.insert(name.into(), size);
        self
    }

    pub fn set_flag(&mut self, name: impl Into<String>, value: bool) -> &mut Self {
        self.flags.insert(name.into(), value);
        self
    }

    pub fn set_constant(&mut self, name: impl Into<String>, value: u64) -> &mut Self {
        self.constants.insert(name.into(), value);
        self
    }

    /// Register a type record, replacing any record with the same name
    ///
    /// Fields without a declaring type are attributed to `record`.
    pub fn add_type(&mut self, mut record: TypeRecord) -> Arc<TypeRecord> {
        for field in &mut record.fields {
            if field.declaring_type.is_empty() {
                field.declaring_type = record.name.clone();
            }
        }
        let record = Arc::new(record);
        if let Some(old) = self.by_name.insert(record.name.clone(), record.clone()) {
            self.by_klass.remove(&old.klass);
        }
        self.by_klass.insert(record.klass, record.clone());
        record
    }

    /// Map `bytes` at `base`
    pub fn map_segment(&mut self, base: Address, bytes: Vec<u8>) -> Result<(), ImageError> {
        let segment = MemorySegment { base, bytes };
        if segment.bytes.is_empty() {
            return Err(ImageError::Invalid(format!("empty segment at {}", base)));
        }
        if base.as_u64().checked_add(segment.bytes.len() as u64).is_none() {
            return Err(ImageError::Invalid(format!(
                "segment at {} wraps the address space",
                base
            )));
        }

        let index = self.segments.partition_point(|s| s.base < base);
        let overlaps_prev = index > 0 && self.segments[index - 1].end() > base.as_u64();
        let overlaps_next = self
            .segments
            .get(index)
            .map_or(false, |next| next.base.as_u64() < segment.end());
        if overlaps_prev || overlaps_next {
            return Err(ImageError::Invalid(format!(
                "segment at {} overlaps a mapped segment",
                base
            )));
        }

        self.segments.insert(index, segment);
        Ok(())
    }

    /// Overwrite mapped bytes at `address`
    pub fn write_bytes(&mut self, address: Address, data: &[u8]) -> Result<(), ImageError> {
        let segment = self
            .segments
            .iter_mut()
            .find(|s| s.contains(address, data.len()))
            .ok_or_else(|| {
                ImageError::Invalid(format!("{} bytes at {} are not mapped", data.len(), address))
            })?;
        let start = (address.as_u64() - segment.base.as_u64()) as usize;
        segment.bytes[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    pub fn write_u8(&mut self, address: Address, value: u8) -> Result<(), ImageError> {
        self.write_bytes(address, &[value])
    }

    pub fn write_u16(&mut self, address: Address, value: u16) -> Result<(), ImageError> {
        let bytes = if self.is_big_endian() {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        };
        self.write_bytes(address, &bytes)
    }

    pub fn write_u32(&mut self, address: Address, value: u32) -> Result<(), ImageError> {
        let bytes = if self.is_big_endian() {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        };
        self.write_bytes(address, &bytes)
    }

    pub fn write_u64(&mut self, address: Address, value: u64) -> Result<(), ImageError> {
        let bytes = if self.is_big_endian() {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        };
        self.write_bytes(address, &bytes)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Type record by name
    pub fn type_named(&self, name: &str) -> Option<Arc<TypeRecord>> {
        self.by_name.get(name).cloned()
    }

    /// All type records, in no particular order
    pub fn types(&self) -> impl Iterator<Item = &Arc<TypeRecord>> {
        self.by_name.values()
    }

    /// Mapped segments in address order
    pub fn segments(&self) -> &[MemorySegment] {
        &self.segments
    }

    fn is_big_endian(&self) -> bool {
        self.flags.get(flags::BIG_ENDIAN).copied().unwrap_or(false)
    }

    fn record(&self, type_name: &str) -> HeapResult<&Arc<TypeRecord>> {
        self.by_name
            .get(type_name)
            .ok_or_else(|| HeapError::type_resolution(type_name, "type not present in image"))
    }
}

impl MemoryProvider for DumpImage {
    fn read(&self, address: Address, buf: &mut [u8]) -> HeapResult<()> {
        let index = self.segments.partition_point(|s| s.base <= address);
        let segment = index
            .checked_sub(1)
            .map(|i| &self.segments[i])
            .filter(|s| s.contains(address, buf.len()))
            .ok_or_else(|| {
                HeapError::memory_access(address, format!("{} bytes not mapped", buf.len()))
            })?;
        let start = (address.as_u64() - segment.base.as_u64()) as usize;
        buf.copy_from_slice(&segment.bytes[start..start + buf.len()]);
        Ok(())
    }
}

impl TypeDatabase for DumpImage {
    fn type_size(&self, name: &str) -> HeapResult<u64> {
        self.type_sizes
            .get(name)
            .copied()
            .ok_or_else(|| HeapError::type_resolution(name, "no such VM type"))
    }

    fn flag(&self, name: &str) -> Option<bool> {
        self.flags.get(name).copied()
    }

    fn int_constant(&self, name: &str) -> Option<u64> {
        self.constants.get(name).copied()
    }

    fn type_for_klass(&self, klass: Address) -> Option<Arc<TypeRecord>> {
        self.by_klass.get(&klass).cloned()
    }

    fn fields(&self, type_name: &str) -> HeapResult<Vec<FieldDescriptor>> {
        Ok(self.record(type_name)?.fields.clone())
    }

    fn ancestor_chain(&self, type_name: &str) -> HeapResult<Vec<String>> {
        let mut chain = Vec::new();
        let mut seen = FxHashSet::default();
        let mut current = Some(type_name.to_string());
        while let Some(name) = current {
            if !seen.insert(name.clone()) {
                return Err(HeapError::type_resolution(
                    type_name,
                    format!("cyclic super type chain through {}", name),
                ));
            }
            current = self.record(&name)?.super_type.clone();
            chain.push(name);
        }
        chain.reverse();
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::FieldType;

    fn hierarchy() -> DumpImage {
        let mut image = DumpImage::new();
        image.add_type(TypeRecord::instance("A", Address::new(0x100), 16));
        image.add_type(TypeRecord::instance("B", Address::new(0x200), 16).with_super("A"));
        image.add_type(TypeRecord::instance("C", Address::new(0x300), 16).with_super("B"));
        image
    }

    #[test]
    fn test_ancestor_chain_root_first() {
        let image = hierarchy();
        assert_eq!(image.ancestor_chain("C").unwrap(), vec!["A", "B", "C"]);
        assert_eq!(image.ancestor_chain("A").unwrap(), vec!["A"]);
    }

    #[test]
    fn test_ancestor_chain_unknown_super() {
        let mut image = DumpImage::new();
        image.add_type(TypeRecord::instance("Orphan", Address::new(0x100), 16).with_super("Gone"));
        assert!(matches!(
            image.ancestor_chain("Orphan"),
            Err(HeapError::TypeResolution { .. })
        ));
    }

    #[test]
    fn test_ancestor_chain_cycle() {
        let mut image = DumpImage::new();
        image.add_type(TypeRecord::instance("X", Address::new(0x100), 16).with_super("Y"));
        image.add_type(TypeRecord::instance("Y", Address::new(0x200), 16).with_super("X"));
        assert!(image.ancestor_chain("X").is_err());
    }

    #[test]
    fn test_add_type_replaces_by_name() {
        let mut image = hierarchy();
        image.add_type(TypeRecord::instance("A", Address::new(0x180), 24));
        assert!(image.type_for_klass(Address::new(0x100)).is_none());
        assert_eq!(
            image.type_for_klass(Address::new(0x180)).unwrap().instance_size,
            24
        );
    }

    #[test]
    fn test_segments_reject_overlap() {
        let mut image = DumpImage::new();
        image.map_segment(Address::new(0x1000), vec![0; 0x10]).unwrap();
        image.map_segment(Address::new(0x1010), vec![0; 0x10]).unwrap();
        assert!(image.map_segment(Address::new(0x100c), vec![0; 4]).is_err());
        assert!(image.map_segment(Address::new(0x0ff8), vec![0; 0x10]).is_err());
        assert!(image.map_segment(Address::new(0x2000), Vec::new()).is_err());
    }

    #[test]
    fn test_read_within_and_across_segments() {
        let mut image = DumpImage::new();
        image.map_segment(Address::new(0x1000), vec![1, 2, 3, 4]).unwrap();
        image.map_segment(Address::new(0x2000), vec![5, 6]).unwrap();

        let mut buf = [0u8; 2];
        image.read(Address::new(0x1002), &mut buf).unwrap();
        assert_eq!(buf, [3, 4]);
        image.read(Address::new(0x2000), &mut buf).unwrap();
        assert_eq!(buf, [5, 6]);

        assert!(image.read(Address::new(0x1003), &mut buf).is_err());
        assert!(image.read(Address::new(0x0fff), &mut buf).is_err());
        assert!(image.read(Address::new(0x3000), &mut buf).is_err());
    }

    #[test]
    fn test_writes_honor_byte_order() {
        let mut image = DumpImage::new();
        image.map_segment(Address::new(0x10), vec![0; 4]).unwrap();
        image.write_u32(Address::new(0x10), 0x0102_0304).unwrap();
        assert_eq!(image.segments()[0].bytes, vec![4, 3, 2, 1]);

        image.set_flag(flags::BIG_ENDIAN, true);
        image.write_u16(Address::new(0x10), 0x0a0b).unwrap();
        assert_eq!(image.segments()[0].bytes, vec![0x0a, 0x0b, 2, 1]);

        assert!(image.write_u64(Address::new(0x10), 0).is_err());
    }

    #[test]
    fn test_json_document() {
        let mut image = hierarchy();
        image
            .set_type_size("address", 8)
            .set_flag("UseCompressedOops", true)
            .set_constant("CompressedOops::_shift", 3);
        image.add_type(
            TypeRecord::instance("D", Address::new(0x400), 24)
                .with_super("C")
                .with_field("count", 16, FieldType::Int),
        );
        image.map_segment(Address::new(0x8000), vec![0xde, 0xad]).unwrap();

        let json = image.to_json().unwrap();
        assert!(json.contains("\"dead\""));

        let loaded = DumpImage::from_json(&json).unwrap();
        assert_eq!(loaded.type_size("address").unwrap(), 8);
        assert_eq!(loaded.flag("UseCompressedOops"), Some(true));
        assert_eq!(loaded.int_constant("CompressedOops::_shift"), Some(3));
        assert_eq!(loaded.fields("D").unwrap()[0].declaring_type, "D");
        assert_eq!(loaded.segments(), image.segments());
    }

    #[test]
    fn test_document_fills_declaring_type() {
        let json = r#"{
            "types": [{
                "name": "Point",
                "klass": 256,
                "kind": "instance",
                "instance_size": 24,
                "fields": [{ "name": "x", "offset": 12, "type": "int" }]
            }]
        }"#;
        let image = DumpImage::from_json(json).unwrap();
        let fields = image.fields("Point").unwrap();
        assert_eq!(fields[0].declaring_type, "Point");
        assert!(!fields[0].is_static);
    }

    #[test]
    fn test_document_rejects_duplicate_types() {
        let json = r#"{
            "types": [
                { "name": "A", "klass": 256, "kind": "instance" },
                { "name": "A", "klass": 512, "kind": "instance" }
            ]
        }"#;
        assert!(matches!(
            DumpImage::from_json(json),
            Err(ImageError::Invalid(_))
        ));
    }

    #[test]
    fn test_document_rejects_duplicate_klass() {
        let json = r#"{
            "types": [
                { "name": "A", "klass": 256, "kind": "instance" },
                { "name": "B", "klass": 256, "kind": "instance" }
            ]
        }"#;
        match DumpImage::from_json(json) {
            Err(ImageError::Invalid(msg)) => assert!(msg.contains("reuses descriptor")),
            other => panic!("expected invalid image, got {:?}", other.map(|_| ())),
        }
    }
}

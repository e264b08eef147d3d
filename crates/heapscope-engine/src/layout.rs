//! Object layout snapshot
//!
//! A target build selects one header layout at startup:
//!
//! ```text
//! plain:               ┌ mark (word) ┬ klass (word)  ┬ fields ...
//! compressed klass:    ┌ mark (word) ┬ klass (u32)   ┬ fields ...
//! compact headers:     ┌ mark (word, narrow klass in the top bits) ┬ fields ...
//! ```
//!
//! [`VmLayout`] records which one, captured once when the target becomes
//! ready. [`TargetSession`] owns that snapshot for the lifetime of one attach.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{HeapError, HeapResult};
use crate::heap::ObjectHeap;
use crate::target::{Address, FieldType, MemoryProvider, TypeDatabase};

/// VM type whose size is the full (uncompressed) instance header
pub const INSTANCE_HEADER_TYPE: &str = "instanceOopDesc";
/// VM type whose size is the target pointer width
pub const ADDRESS_TYPE: &str = "address";
/// VM type whose size is the narrow pointer width
pub const INT_TYPE: &str = "jint";

/// Flag names queried at attach
pub mod flags {
    /// Type pointers in headers are 32-bit
    pub const COMPRESSED_CLASS_POINTERS: &str = "UseCompressedClassPointers";
    /// Reference fields are 32-bit
    pub const COMPRESSED_OOPS: &str = "UseCompressedOops";
    /// Mark word and type pointer share one slot
    pub const COMPACT_OBJECT_HEADERS: &str = "UseCompactObjectHeaders";
    /// Target stores multi-byte values big-endian
    pub const BIG_ENDIAN: &str = "BigEndian";
}

/// Integer constant names queried at attach
pub mod constants {
    /// Narrow klass decoding base
    pub const NARROW_KLASS_BASE: &str = "CompressedKlassPointers::_base";
    /// Narrow klass decoding shift
    pub const NARROW_KLASS_SHIFT: &str = "CompressedKlassPointers::_shift";
    /// Narrow oop decoding base
    pub const NARROW_OOP_BASE: &str = "CompressedOops::_base";
    /// Narrow oop decoding shift
    pub const NARROW_OOP_SHIFT: &str = "CompressedOops::_shift";
    /// Position of the narrow klass in a compact mark word
    pub const MARK_KLASS_SHIFT: &str = "markWord::klass_shift";
    /// Position of the identity hash in the mark word
    pub const MARK_HASH_SHIFT: &str = "markWord::hash_shift";
    /// Object size alignment
    pub const OBJECT_ALIGNMENT: &str = "MinObjAlignmentInBytes";
}

const DEFAULT_MARK_KLASS_SHIFT: u64 = 42;
const DEFAULT_HASH_SHIFT: u64 = 8;
const DEFAULT_OBJECT_ALIGNMENT: u64 = 8;

/// Base and shift used to widen a 32-bit pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NarrowEncoding {
    /// Added to the shifted narrow value
    pub base: u64,
    /// Left shift applied to the narrow value
    pub shift: u32,
}

impl NarrowEncoding {
    /// Widen a narrow pointer; narrow zero is null
    pub fn decode(self, narrow: u32) -> Address {
        if narrow == 0 {
            return Address::NULL;
        }
        Address::new(self.base.wrapping_add((narrow as u64) << self.shift))
    }
}

/// Header layout of one attached target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmLayout {
    /// Native pointer width in bytes
    pub pointer_size: u64,
    /// Narrow pointer width in bytes
    pub narrow_pointer_size: u64,
    /// Size of the uncompressed instance header type
    pub instance_type_size: u64,
    /// Header type pointers are narrow
    pub compressed_class_pointers: bool,
    /// Reference fields are narrow
    pub compressed_oops: bool,
    /// Mark word carries the narrow type pointer
    pub compact_headers: bool,
    /// Narrow type pointer decoding
    pub narrow_klass: NarrowEncoding,
    /// Narrow reference decoding
    pub narrow_oop: NarrowEncoding,
    /// Bit position of the narrow type pointer in a compact mark word
    pub mark_klass_shift: u32,
    /// Bit position of the identity hash in the mark word
    pub hash_shift: u32,
    /// Object sizes are rounded up to this many bytes
    pub object_alignment: u64,
    /// Multi-byte values are big-endian
    pub big_endian: bool,
}

impl Default for VmLayout {
    /// Plain 64-bit little-endian layout with no compression
    fn default() -> Self {
        Self {
            pointer_size: 8,
            narrow_pointer_size: 4,
            instance_type_size: 16,
            compressed_class_pointers: false,
            compressed_oops: false,
            compact_headers: false,
            narrow_klass: NarrowEncoding::default(),
            narrow_oop: NarrowEncoding::default(),
            mark_klass_shift: DEFAULT_MARK_KLASS_SHIFT as u32,
            hash_shift: DEFAULT_HASH_SHIFT as u32,
            object_alignment: DEFAULT_OBJECT_ALIGNMENT,
            big_endian: false,
        }
    }
}

impl VmLayout {
    /// Query the type database for the layout of the attached target
    pub fn capture(types: &dyn TypeDatabase) -> HeapResult<Self> {
        let pointer_size = types.type_size(ADDRESS_TYPE)?;
        if pointer_size != 4 && pointer_size != 8 {
            return Err(HeapError::Configuration(format!(
                "unsupported pointer size {}",
                pointer_size
            )));
        }

        let flag = |name: &str| types.flag(name).unwrap_or(false);
        let constant = |name: &str, default: u64| types.int_constant(name).unwrap_or(default);
        let shift = |name: &str, default: u64| -> HeapResult<u32> {
            let value = constant(name, default);
            if value >= 64 {
                return Err(HeapError::Configuration(format!(
                    "{} out of range: {}",
                    name, value
                )));
            }
            Ok(value as u32)
        };

        let object_alignment = constant(constants::OBJECT_ALIGNMENT, DEFAULT_OBJECT_ALIGNMENT);
        if !object_alignment.is_power_of_two() {
            return Err(HeapError::Configuration(format!(
                "object alignment {} is not a power of two",
                object_alignment
            )));
        }

        // Header holds at least a mark word and a narrow type pointer
        let narrow_pointer_size = types.type_size(INT_TYPE)?;
        let instance_type_size = types.type_size(INSTANCE_HEADER_TYPE)?;
        if instance_type_size < pointer_size + narrow_pointer_size {
            return Err(HeapError::Configuration(format!(
                "{} size {} too small for {}-byte pointers",
                INSTANCE_HEADER_TYPE, instance_type_size, pointer_size
            )));
        }

        Ok(Self {
            pointer_size,
            narrow_pointer_size,
            instance_type_size,
            compressed_class_pointers: flag(flags::COMPRESSED_CLASS_POINTERS),
            compressed_oops: flag(flags::COMPRESSED_OOPS),
            compact_headers: flag(flags::COMPACT_OBJECT_HEADERS),
            narrow_klass: NarrowEncoding {
                base: constant(constants::NARROW_KLASS_BASE, 0),
                shift: shift(constants::NARROW_KLASS_SHIFT, 0)?,
            },
            narrow_oop: NarrowEncoding {
                base: constant(constants::NARROW_OOP_BASE, 0),
                shift: shift(constants::NARROW_OOP_SHIFT, 0)?,
            },
            mark_klass_shift: shift(constants::MARK_KLASS_SHIFT, DEFAULT_MARK_KLASS_SHIFT)?,
            hash_shift: shift(constants::MARK_HASH_SHIFT, DEFAULT_HASH_SHIFT)?,
            object_alignment,
            big_endian: flag(flags::BIG_ENDIAN),
        })
    }

    /// Smallest possible header: one mark word
    pub fn min_header_size(&self) -> u64 {
        self.pointer_size
    }

    /// Instance header size in bytes under the selected layout
    pub fn header_size(&self) -> u64 {
        if self.compact_headers {
            self.min_header_size()
        } else if self.compressed_class_pointers {
            self.instance_type_size.saturating_sub(self.narrow_pointer_size)
        } else {
            self.instance_type_size
        }
    }

    /// Offset of the type pointer slot (layouts without compact headers)
    pub fn klass_offset(&self) -> u64 {
        self.pointer_size
    }

    /// Width of the type pointer slot (layouts without compact headers)
    pub fn klass_slot_size(&self) -> u64 {
        if self.compressed_class_pointers {
            self.narrow_pointer_size
        } else {
            self.pointer_size
        }
    }

    /// Width of a reference field
    pub fn reference_size(&self) -> u64 {
        if self.compressed_oops {
            self.narrow_pointer_size
        } else {
            self.pointer_size
        }
    }

    /// Width of a slot of type `ty`
    pub fn slot_size(&self, ty: FieldType) -> u64 {
        match ty.fixed_size() {
            Some(size) => size,
            None => match ty {
                FieldType::Reference => self.reference_size(),
                FieldType::Metadata => self.klass_slot_size(),
                _ => self.pointer_size,
            },
        }
    }

    /// Round an object size up to the object alignment
    pub fn align_object_size(&self, size: u64) -> u64 {
        align_up(size, self.object_alignment)
    }

    /// Widen a narrow type pointer
    pub fn decode_narrow_klass(&self, narrow: u32) -> Address {
        self.narrow_klass.decode(narrow)
    }

    /// Widen a narrow reference
    pub fn decode_narrow_oop(&self, narrow: u32) -> Address {
        self.narrow_oop.decode(narrow)
    }
}

/// Round `value` up to a multiple of `alignment` (a power of two)
pub(crate) fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

// ============================================================================
// Target Session
// ============================================================================

/// Attach-scoped owner of the layout snapshot
///
/// One session corresponds to one attached target. The snapshot is taken on
/// the first "target ready" notification and shared by every decoder created
/// from the session until detach.
#[derive(Debug, Default)]
pub struct TargetSession {
    layout: Mutex<Option<Arc<VmLayout>>>,
}

impl TargetSession {
    /// Create a detached session
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the layout snapshot if not yet captured
    ///
    /// Later calls before [`on_detach`](Self::on_detach) return the same
    /// snapshot without querying `types` again.
    pub fn on_target_ready(&self, types: &dyn TypeDatabase) -> HeapResult<Arc<VmLayout>> {
        let mut slot = self.layout.lock();
        if let Some(layout) = slot.as_ref() {
            return Ok(Arc::clone(layout));
        }

        let layout = Arc::new(VmLayout::capture(types)?);
        log::debug!(
            "layout captured: header {} bytes (compact={}, compressed_klass={}, compressed_oops={})",
            layout.header_size(),
            layout.compact_headers,
            layout.compressed_class_pointers,
            layout.compressed_oops
        );
        *slot = Some(Arc::clone(&layout));
        Ok(layout)
    }

    /// Drop the layout snapshot
    pub fn on_detach(&self) {
        if self.layout.lock().take().is_some() {
            log::debug!("layout snapshot dropped on detach");
        } else {
            log::warn!("detach notification for a session that was never attached");
        }
    }

    /// Check if a layout snapshot is present
    pub fn is_attached(&self) -> bool {
        self.layout.lock().is_some()
    }

    /// Current layout snapshot
    pub fn layout(&self) -> HeapResult<Arc<VmLayout>> {
        self.layout.lock().clone().ok_or_else(|| {
            HeapError::Configuration(
                "layout snapshot queried before the target was attached".to_string(),
            )
        })
    }

    /// Object heap decoding through `memory` and `types` with this session's layout
    pub fn object_heap<'a>(
        &self,
        memory: &'a dyn MemoryProvider,
        types: &'a dyn TypeDatabase,
    ) -> HeapResult<ObjectHeap<'a>> {
        Ok(ObjectHeap::new(memory, types, self.layout()?))
    }
}

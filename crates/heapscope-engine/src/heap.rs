//! Object heap: handle to typed view
//!
//! [`ObjectHeap`] reads an object's header, finds its concrete type through
//! the type database and builds the matching [`Oop`] with the field pipeline
//! for that kind of object.

use std::fmt;
use std::sync::Arc;

use crate::error::{HeapError, HeapResult};
use crate::layout::VmLayout;
use crate::oops::{FieldStep, Oop, OopKind};
use crate::render::RendererRegistry;
use crate::target::{Address, FieldType, MemoryProvider, OopHandle, TypeDatabase, TypeKind};
use crate::visitor::FieldValue;

const INSTANCE_PIPELINE: &[FieldStep] = &[FieldStep::Base, FieldStep::Declared];
const ARRAY_PIPELINE: &[FieldStep] = &[FieldStep::Base, FieldStep::ArrayPayload];

/// Factory for read-only object views over one attached target
pub struct ObjectHeap<'a> {
    memory: &'a dyn MemoryProvider,
    types: &'a dyn TypeDatabase,
    layout: Arc<VmLayout>,
    renderers: RendererRegistry,
}

impl fmt::Debug for ObjectHeap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHeap")
            .field("layout", &self.layout)
            .field("renderers", &self.renderers)
            .finish()
    }
}

impl<'a> ObjectHeap<'a> {
    /// Create a heap with the built-in renderers
    pub fn new(
        memory: &'a dyn MemoryProvider,
        types: &'a dyn TypeDatabase,
        layout: Arc<VmLayout>,
    ) -> Self {
        Self {
            memory,
            types,
            layout,
            renderers: RendererRegistry::with_builtins(),
        }
    }

    /// Replace the renderer registry
    pub fn with_renderers(mut self, renderers: RendererRegistry) -> Self {
        self.renderers = renderers;
        self
    }

    /// Layout snapshot this heap decodes with
    pub fn layout(&self) -> &VmLayout {
        &self.layout
    }

    /// Type database of the target
    pub fn types(&self) -> &'a dyn TypeDatabase {
        self.types
    }

    /// Renderers consulted by [`Oop::render_value`]
    pub fn renderers(&self) -> &RendererRegistry {
        &self.renderers
    }

    /// Build the view of the object at `handle`
    ///
    /// Fails with [`HeapError::TypeResolution`] when the object's type cannot
    /// be determined; no view exists in that case.
    pub fn resolve(&self, handle: OopHandle) -> HeapResult<Oop<'_>> {
        if handle.is_null() {
            return Err(HeapError::type_resolution(handle, "null handle"));
        }

        let mark = self.read_word(handle.address())?;
        let klass = self.read_klass(handle, mark)?;
        let record = self.types.type_for_klass(klass).ok_or_else(|| {
            HeapError::type_resolution(handle, format!("unknown type descriptor {}", klass))
        })?;

        let (kind, pipeline) = match &record.kind {
            TypeKind::Instance => (OopKind::Instance, INSTANCE_PIPELINE),
            TypeKind::TypeArray { element } => match element {
                FieldType::MarkWord | FieldType::Metadata | FieldType::Reference => {
                    return Err(HeapError::type_resolution(
                        handle,
                        format!("{} is not a primitive array element", element.name()),
                    ));
                }
                _ => (OopKind::TypeArray(*element), ARRAY_PIPELINE),
            },
            TypeKind::ObjArray { .. } => (OopKind::ObjArray, ARRAY_PIPELINE),
        };

        log::trace!("resolved {} as {}", handle, record.name);
        Ok(Oop::new(self, handle, mark, klass, record, kind, pipeline))
    }

    fn read_klass(&self, handle: OopHandle, mark: u64) -> HeapResult<Address> {
        let layout = &self.layout;
        if layout.compact_headers {
            let narrow = (mark >> layout.mark_klass_shift) as u32;
            Ok(layout.decode_narrow_klass(narrow))
        } else if layout.compressed_class_pointers {
            let narrow = self.read_u32(handle.address().offset(layout.klass_offset()))?;
            Ok(layout.decode_narrow_klass(narrow))
        } else {
            let klass = self.read_word(handle.address().offset(layout.klass_offset()))?;
            Ok(Address::new(klass))
        }
    }

    // ------------------------------------------------------------------------
    // Raw reads
    // ------------------------------------------------------------------------

    /// Read `len` bytes at `address`
    pub fn read_bytes(&self, address: Address, len: usize) -> HeapResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.memory.read(address, &mut buf)?;
        Ok(buf)
    }

    fn read_array<const N: usize>(&self, address: Address) -> HeapResult<[u8; N]> {
        let mut buf = [0u8; N];
        self.memory.read(address, &mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&self, address: Address) -> HeapResult<u8> {
        Ok(self.read_array::<1>(address)?[0])
    }

    pub fn read_u16(&self, address: Address) -> HeapResult<u16> {
        let bytes = self.read_array::<2>(address)?;
        Ok(if self.layout.big_endian {
            u16::from_be_bytes(bytes)
        } else {
            u16::from_le_bytes(bytes)
        })
    }

    pub fn read_u32(&self, address: Address) -> HeapResult<u32> {
        let bytes = self.read_array::<4>(address)?;
        Ok(if self.layout.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        })
    }

    pub fn read_u64(&self, address: Address) -> HeapResult<u64> {
        let bytes = self.read_array::<8>(address)?;
        Ok(if self.layout.big_endian {
            u64::from_be_bytes(bytes)
        } else {
            u64::from_le_bytes(bytes)
        })
    }

    /// Read a pointer-sized word
    pub fn read_word(&self, address: Address) -> HeapResult<u64> {
        if self.layout.pointer_size == 4 {
            Ok(self.read_u32(address)? as u64)
        } else {
            self.read_u64(address)
        }
    }

    /// Read a reference slot, widening narrow references
    pub fn read_reference(&self, address: Address) -> HeapResult<Option<OopHandle>> {
        let target = if self.layout.compressed_oops {
            self.layout.decode_narrow_oop(self.read_u32(address)?)
        } else {
            Address::new(self.read_word(address)?)
        };
        Ok((!target.is_null()).then_some(OopHandle::new(target)))
    }

    /// Decode the slot of type `ty` at `address`
    pub fn read_field(&self, address: Address, ty: FieldType) -> HeapResult<FieldValue> {
        Ok(match ty {
            FieldType::Boolean => FieldValue::Boolean(self.read_u8(address)? != 0),
            FieldType::Byte => FieldValue::Byte(self.read_u8(address)? as i8),
            FieldType::Char => FieldValue::Char(self.read_u16(address)?),
            FieldType::Short => FieldValue::Short(self.read_u16(address)? as i16),
            FieldType::Int => FieldValue::Int(self.read_u32(address)? as i32),
            FieldType::Long => FieldValue::Long(self.read_u64(address)? as i64),
            FieldType::Float => FieldValue::Float(f32::from_bits(self.read_u32(address)?)),
            FieldType::Double => FieldValue::Double(f64::from_bits(self.read_u64(address)?)),
            FieldType::Reference => FieldValue::Reference(self.read_reference(address)?),
            FieldType::MarkWord => FieldValue::MarkWord(self.read_word(address)?),
            FieldType::Metadata => {
                let klass = if self.layout.compressed_class_pointers {
                    self.layout.decode_narrow_klass(self.read_u32(address)?)
                } else {
                    Address::new(self.read_word(address)?)
                };
                FieldValue::Metadata(klass)
            }
        })
    }
}

//! Read-only object views
//!
//! An [`Oop`] is built by [`ObjectHeap::resolve`] for one handle and is
//! dropped after the query; the target may change between queries, so views
//! are never cached.
//!
//! Field traversal runs the pipeline chosen by the heap for the object's
//! kind. Every pipeline starts with [`FieldStep::Base`]:
//!
//! | Kind        | Pipeline                 |
//! |-------------|--------------------------|
//! | Instance    | Base, Declared           |
//! | TypeArray   | Base, ArrayPayload       |
//! | ObjArray    | Base, ArrayPayload       |

pub mod array;
pub mod instance;

use std::fmt;
use std::sync::Arc;

use crate::error::HeapResult;
use crate::heap::ObjectHeap;
use crate::target::{Address, FieldDescriptor, FieldType, OopHandle, TypeRecord};
use crate::visitor::{DecodedField, FieldValue, OopVisitor};

/// Declaring type reported for header pseudo-fields
pub const OOP_DESC_TYPE: &str = "oopDesc";
/// Name of the mark word pseudo-field
pub const MARK_FIELD: &str = "_mark";
/// Name of the type pointer pseudo-field
pub const KLASS_FIELD: &str = "_metadata._klass";
/// Name of the narrow type pointer pseudo-field
pub const COMPRESSED_KLASS_FIELD: &str = "_metadata._compressed_klass";

const LOCK_MASK: u64 = 0b11;
const AGE_SHIFT: u64 = 3;
const AGE_MASK: u64 = 0xF;
const HASH_MASK: u64 = 0x7FFF_FFFF;

/// Which specialization an object decodes as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OopKind {
    /// Non-array reference type
    Instance,
    /// Array of primitive elements
    TypeArray(FieldType),
    /// Array of references
    ObjArray,
}

/// One stage of a field pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStep {
    /// Header pseudo-fields, emitted only when base fields are requested
    Base,
    /// Non-static fields of every type in the ancestor chain, root first
    Declared,
    /// Array length and elements
    ArrayPayload,
}

/// Read-only view of one heap object
pub struct Oop<'h> {
    heap: &'h ObjectHeap<'h>,
    handle: OopHandle,
    mark: u64,
    klass: Address,
    record: Arc<TypeRecord>,
    kind: OopKind,
    pipeline: &'static [FieldStep],
}

impl<'h> Oop<'h> {
    pub(crate) fn new(
        heap: &'h ObjectHeap<'h>,
        handle: OopHandle,
        mark: u64,
        klass: Address,
        record: Arc<TypeRecord>,
        kind: OopKind,
        pipeline: &'static [FieldStep],
    ) -> Self {
        Self {
            heap,
            handle,
            mark,
            klass,
            record,
            kind,
            pipeline,
        }
    }

    /// Smallest header any object can have under `heap`'s layout
    pub fn base_header_size(heap: &ObjectHeap<'_>) -> u64 {
        heap.layout().min_header_size()
    }

    pub fn handle(&self) -> OopHandle {
        self.handle
    }

    pub fn heap(&self) -> &'h ObjectHeap<'h> {
        self.heap
    }

    pub fn kind(&self) -> OopKind {
        self.kind
    }

    pub fn type_record(&self) -> &TypeRecord {
        &self.record
    }

    pub fn type_name(&self) -> &str {
        &self.record.name
    }

    /// Address of the object's type descriptor
    pub fn klass(&self) -> Address {
        self.klass
    }

    /// Raw mark word
    pub fn mark(&self) -> u64 {
        self.mark
    }

    /// Lock state bits of the mark word
    pub fn lock_bits(&self) -> u8 {
        (self.mark & LOCK_MASK) as u8
    }

    /// GC age recorded in the mark word
    pub fn age(&self) -> u8 {
        ((self.mark >> AGE_SHIFT) & AGE_MASK) as u8
    }

    /// Identity hash stored in the mark word, 0 if never hashed
    pub fn identity_hash(&self) -> u32 {
        ((self.mark >> self.heap.layout().hash_shift) & HASH_MASK) as u32
    }

    pub fn is_instance(&self) -> bool {
        self.kind == OopKind::Instance
    }

    pub fn is_array(&self) -> bool {
        !self.is_instance()
    }

    /// The field pipeline this object was built with
    pub fn pipeline(&self) -> &'static [FieldStep] {
        self.pipeline
    }

    /// Header size in bytes for this object's kind
    pub fn header_size(&self) -> u64 {
        let layout = self.heap.layout();
        match self.kind {
            OopKind::Instance => instance::header_size(layout),
            OopKind::TypeArray(element) => array::header_size(layout, element),
            OopKind::ObjArray => array::header_size(layout, FieldType::Reference),
        }
    }

    /// Total object size in bytes, including header and alignment padding
    pub fn object_size(&self) -> HeapResult<u64> {
        match array::element_type(self.kind) {
            None => Ok(self.record.instance_size),
            Some(element) => {
                let length = array::length(self)?;
                Ok(array::object_size(self.heap.layout(), element, length))
            }
        }
    }

    /// Decode every field in pipeline order
    ///
    /// Either the whole list decodes or an error is returned.
    pub fn field_values(&self, include_base_fields: bool) -> HeapResult<Vec<DecodedField>> {
        let mut fields = Vec::new();
        for step in self.pipeline {
            match step {
                FieldStep::Base => {
                    if include_base_fields {
                        self.base_fields(&mut fields);
                    }
                }
                FieldStep::Declared => instance::declared_fields(self, &mut fields)?,
                FieldStep::ArrayPayload => array::payload_fields(self, &mut fields)?,
            }
        }
        Ok(fields)
    }

    /// Feed every field to `visitor`
    ///
    /// The object is fully decoded before the first visitor call, so a failed
    /// decode never shows the visitor a partial field list.
    pub fn iterate_fields<V: OopVisitor + ?Sized>(
        &self,
        visitor: &mut V,
        include_base_fields: bool,
    ) -> HeapResult<()> {
        let fields = self.field_values(include_base_fields)?;
        for field in &fields {
            field.accept(visitor);
        }
        Ok(())
    }

    /// Decode one non-static declared field by name
    ///
    /// When several ancestors declare the same name, the declaration closest
    /// to the concrete type wins.
    pub fn field(&self, name: &str) -> HeapResult<Option<FieldValue>> {
        match instance::find_field(self, name)? {
            Some(descriptor) => Ok(Some(self.read_value(&descriptor)?)),
            None => Ok(None),
        }
    }

    /// Text rendering of this object
    ///
    /// A renderer registered for the exact type name wins; everything else
    /// renders structurally.
    pub fn render_value(&self) -> HeapResult<String> {
        match self.heap.renderers().get(self.type_name()) {
            Some(render) => {
                log::trace!("rendering {} with registered renderer", self.handle);
                render(self)
            }
            None => Ok(self.structural_value()),
        }
    }

    /// Structural rendering: type and address
    pub fn structural_value(&self) -> String {
        format!("Oop for {} @ {}", self.type_name(), self.handle)
    }

    pub(crate) fn read_value(&self, descriptor: &FieldDescriptor) -> HeapResult<FieldValue> {
        self.heap.read_field(
            self.handle.address().offset(descriptor.offset),
            descriptor.field_type,
        )
    }

    fn base_fields(&self, out: &mut Vec<DecodedField>) {
        let layout = self.heap.layout();
        out.push(DecodedField::new(
            FieldDescriptor::new(MARK_FIELD, 0, FieldType::MarkWord, OOP_DESC_TYPE),
            FieldValue::MarkWord(self.mark),
        ));
        if layout.compact_headers {
            return;
        }
        let name = if layout.compressed_class_pointers {
            COMPRESSED_KLASS_FIELD
        } else {
            KLASS_FIELD
        };
        out.push(DecodedField::new(
            FieldDescriptor::new(name, layout.klass_offset(), FieldType::Metadata, OOP_DESC_TYPE),
            FieldValue::Metadata(self.klass),
        ));
    }
}

impl PartialEq for Oop<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for Oop<'_> {}

impl fmt::Debug for Oop<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Oop")
            .field("handle", &self.handle)
            .field("type", &self.record.name)
            .field("kind", &self.kind)
            .field("mark", &format_args!("{:#x}", self.mark))
            .finish()
    }
}

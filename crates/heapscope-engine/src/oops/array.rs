//! Array objects
//!
//! ```text
//! ┌ header (instance rule) ┬ length: i32 ┬ pad ┬ elements ...
//! ```
//!
//! Elements start right after the length, aligned to the element size.

use crate::error::{HeapError, HeapResult};
use crate::layout::{align_up, VmLayout};
use crate::oops::{instance, Oop, OopKind};
use crate::target::{FieldDescriptor, FieldType};
use crate::visitor::{DecodedField, FieldValue};

/// Name of the length pseudo-field
pub const LENGTH_FIELD: &str = "length";

const LENGTH_SIZE: u64 = 4;

/// Offset of the 32-bit length
pub fn length_offset(layout: &VmLayout) -> u64 {
    instance::header_size(layout)
}

/// Offset of element 0
pub fn base_offset(layout: &VmLayout, element: FieldType) -> u64 {
    align_up(length_offset(layout) + LENGTH_SIZE, layout.slot_size(element))
}

/// Array header size: everything before element 0
pub fn header_size(layout: &VmLayout, element: FieldType) -> u64 {
    base_offset(layout, element)
}

/// Aligned size of an array with `length` elements
pub fn object_size(layout: &VmLayout, element: FieldType, length: u32) -> u64 {
    let payload = layout.slot_size(element) * length as u64;
    layout.align_object_size(base_offset(layout, element) + payload)
}

/// Element type for array kinds, `None` for instances
pub fn element_type(kind: OopKind) -> Option<FieldType> {
    match kind {
        OopKind::Instance => None,
        OopKind::TypeArray(element) => Some(element),
        OopKind::ObjArray => Some(FieldType::Reference),
    }
}

fn require_element(oop: &Oop<'_>) -> HeapResult<FieldType> {
    element_type(oop.kind()).ok_or_else(|| {
        HeapError::type_resolution(oop.handle(), format!("{} is not an array", oop.type_name()))
    })
}

/// Element count of an array object
pub fn length(oop: &Oop<'_>) -> HeapResult<u32> {
    require_element(oop)?;
    let layout = oop.heap().layout();
    let address = oop.handle().address().offset(length_offset(layout));
    let raw = oop.heap().read_u32(address)? as i32;
    if raw < 0 {
        return Err(HeapError::memory_access(
            address,
            format!("negative array length {}", raw),
        ));
    }
    Ok(raw as u32)
}

/// Raw element bytes of a primitive array, in target byte order
pub fn read_payload_bytes(oop: &Oop<'_>) -> HeapResult<Vec<u8>> {
    let element = require_element(oop)?;
    let length = length(oop)?;
    let layout = oop.heap().layout();
    let size = layout.slot_size(element) * length as u64;
    let address = oop.handle().address().offset(base_offset(layout, element));
    oop.heap().read_bytes(address, size as usize)
}

/// Decode the length pseudo-field and every element
pub(crate) fn payload_fields(oop: &Oop<'_>, out: &mut Vec<DecodedField>) -> HeapResult<()> {
    let element = require_element(oop)?;
    let layout = oop.heap().layout();
    let length = length(oop)?;

    let length_field =
        FieldDescriptor::new(LENGTH_FIELD, length_offset(layout), FieldType::Int, oop.type_name());
    out.push(DecodedField::new(length_field, FieldValue::Int(length as i32)));

    let base = base_offset(layout, element);
    let stride = layout.slot_size(element);
    for index in 0..length as u64 {
        let descriptor = FieldDescriptor::new(
            format!("[{}]", index),
            base + index * stride,
            element,
            oop.type_name(),
        );
        let value = oop.read_value(&descriptor)?;
        out.push(DecodedField::new(descriptor, value));
    }
    Ok(())
}

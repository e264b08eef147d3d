//! Non-array reference-type objects

use crate::error::HeapResult;
use crate::layout::VmLayout;
use crate::oops::Oop;
use crate::target::FieldDescriptor;
use crate::visitor::DecodedField;

/// Instance header size in bytes
///
/// Compact headers have no separate type pointer slot, so the header is the
/// bare mark word.
pub fn header_size(layout: &VmLayout) -> u64 {
    if layout.compact_headers {
        layout.min_header_size()
    } else {
        layout.header_size()
    }
}

/// Decode the non-static fields of every type in the ancestor chain
pub(crate) fn declared_fields(oop: &Oop<'_>, out: &mut Vec<DecodedField>) -> HeapResult<()> {
    let types = oop.heap().types();
    for type_name in types.ancestor_chain(oop.type_name())? {
        for descriptor in types.fields(&type_name)? {
            if descriptor.is_static {
                continue;
            }
            let value = oop.read_value(&descriptor)?;
            out.push(DecodedField::new(descriptor, value));
        }
    }
    Ok(())
}

/// Find the non-static field `name`, searching from the concrete type upward
pub(crate) fn find_field(oop: &Oop<'_>, name: &str) -> HeapResult<Option<FieldDescriptor>> {
    let types = oop.heap().types();
    for type_name in types.ancestor_chain(oop.type_name())?.iter().rev() {
        let found = types
            .fields(type_name)?
            .into_iter()
            .find(|field| !field.is_static && field.name == name);
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size_per_mode() {
        let plain = VmLayout::default();
        assert_eq!(header_size(&plain), 16);

        let compressed = VmLayout {
            compressed_class_pointers: true,
            ..VmLayout::default()
        };
        assert_eq!(header_size(&compressed), 12);

        let compact = VmLayout {
            compact_headers: true,
            compressed_class_pointers: true,
            ..VmLayout::default()
        };
        assert_eq!(header_size(&compact), compact.min_header_size());
    }

    #[test]
    fn test_header_size_32bit() {
        let layout = VmLayout {
            pointer_size: 4,
            instance_type_size: 8,
            ..VmLayout::default()
        };
        assert_eq!(header_size(&layout), 8);
    }
}

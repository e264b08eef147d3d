//! Field visitor protocol
//!
//! Decoders feed every field of an object to an [`OopVisitor`], calling
//! exactly one method per field. Order is fixed: header pseudo-fields, then
//! declared fields from the root ancestor down to the concrete type, then any
//! array payload.

use std::fmt;

use crate::target::{Address, FieldDescriptor, OopHandle};

/// Observer of decoded fields
///
/// Every method defaults to doing nothing, so visitors implement only the
/// categories they care about.
pub trait OopVisitor {
    fn do_mark_word(&mut self, field: &FieldDescriptor, value: u64) {
        let _ = (field, value);
    }
    fn do_metadata(&mut self, field: &FieldDescriptor, klass: Address) {
        let _ = (field, klass);
    }
    fn do_boolean(&mut self, field: &FieldDescriptor, value: bool) {
        let _ = (field, value);
    }
    fn do_byte(&mut self, field: &FieldDescriptor, value: i8) {
        let _ = (field, value);
    }
    fn do_char(&mut self, field: &FieldDescriptor, value: u16) {
        let _ = (field, value);
    }
    fn do_short(&mut self, field: &FieldDescriptor, value: i16) {
        let _ = (field, value);
    }
    fn do_int(&mut self, field: &FieldDescriptor, value: i32) {
        let _ = (field, value);
    }
    fn do_long(&mut self, field: &FieldDescriptor, value: i64) {
        let _ = (field, value);
    }
    fn do_float(&mut self, field: &FieldDescriptor, value: f32) {
        let _ = (field, value);
    }
    fn do_double(&mut self, field: &FieldDescriptor, value: f64) {
        let _ = (field, value);
    }
    fn do_reference(&mut self, field: &FieldDescriptor, value: Option<OopHandle>) {
        let _ = (field, value);
    }
}

/// Decoded value of one field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    /// Raw mark word
    MarkWord(u64),
    /// Decoded type pointer
    Metadata(Address),
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// Decoded reference, `None` for null
    Reference(Option<OopHandle>),
}

impl FieldValue {
    /// Call the visitor method matching this value's category
    pub fn accept<V: OopVisitor + ?Sized>(&self, field: &FieldDescriptor, visitor: &mut V) {
        match *self {
            FieldValue::MarkWord(v) => visitor.do_mark_word(field, v),
            FieldValue::Metadata(v) => visitor.do_metadata(field, v),
            FieldValue::Boolean(v) => visitor.do_boolean(field, v),
            FieldValue::Byte(v) => visitor.do_byte(field, v),
            FieldValue::Char(v) => visitor.do_char(field, v),
            FieldValue::Short(v) => visitor.do_short(field, v),
            FieldValue::Int(v) => visitor.do_int(field, v),
            FieldValue::Long(v) => visitor.do_long(field, v),
            FieldValue::Float(v) => visitor.do_float(field, v),
            FieldValue::Double(v) => visitor.do_double(field, v),
            FieldValue::Reference(v) => visitor.do_reference(field, v),
        }
    }

    /// Reference payload, if this is a reference
    pub fn as_reference(&self) -> Option<Option<OopHandle>> {
        match *self {
            FieldValue::Reference(v) => Some(v),
            _ => None,
        }
    }

    /// Integer payload widened to `i64`, for any integral category
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            FieldValue::Byte(v) => Some(v as i64),
            FieldValue::Char(v) => Some(v as i64),
            FieldValue::Short(v) => Some(v as i64),
            FieldValue::Int(v) => Some(v as i64),
            FieldValue::Long(v) => Some(v),
            FieldValue::Boolean(v) => Some(v as i64),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            FieldValue::MarkWord(v) => write!(f, "{:#018x}", v),
            FieldValue::Metadata(v) => write!(f, "{}", v),
            FieldValue::Boolean(v) => write!(f, "{}", v),
            FieldValue::Byte(v) => write!(f, "{}", v),
            FieldValue::Char(v) => match char::from_u32(v as u32) {
                Some(c) if !c.is_control() => write!(f, "'{}'", c),
                _ => write!(f, "'\\u{{{:04x}}}'", v),
            },
            FieldValue::Short(v) => write!(f, "{}", v),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Long(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Double(v) => write!(f, "{}", v),
            FieldValue::Reference(Some(handle)) => write!(f, "{}", handle),
            FieldValue::Reference(None) => write!(f, "null"),
        }
    }
}

/// One field with its decoded value
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedField {
    pub descriptor: FieldDescriptor,
    pub value: FieldValue,
}

impl DecodedField {
    pub fn new(descriptor: FieldDescriptor, value: FieldValue) -> Self {
        Self { descriptor, value }
    }

    /// Feed this field to `visitor`
    pub fn accept<V: OopVisitor + ?Sized>(&self, visitor: &mut V) {
        self.value.accept(&self.descriptor, visitor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::FieldType;

    #[derive(Default)]
    struct Tally {
        ints: Vec<(String, i32)>,
        references: usize,
    }

    impl OopVisitor for Tally {
        fn do_int(&mut self, field: &FieldDescriptor, value: i32) {
            self.ints.push((field.name.clone(), value));
        }
        fn do_reference(&mut self, _field: &FieldDescriptor, _value: Option<OopHandle>) {
            self.references += 1;
        }
    }

    #[test]
    fn test_accept_dispatches_by_category() {
        let field = FieldDescriptor::new("x", 12, FieldType::Int, "Point");
        let next = FieldDescriptor::new("next", 16, FieldType::Reference, "Node");
        let mut tally = Tally::default();

        FieldValue::Int(7).accept(&field, &mut tally);
        FieldValue::Reference(None).accept(&next, &mut tally);
        FieldValue::Long(1).accept(&field, &mut tally);

        assert_eq!(tally.ints, vec![("x".to_string(), 7)]);
        assert_eq!(tally.references, 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(FieldValue::Char(b'a' as u16).to_string(), "'a'");
        assert_eq!(FieldValue::Char(0x0a).to_string(), "'\\u{000a}'");
        assert_eq!(FieldValue::Reference(None).to_string(), "null");
        assert_eq!(
            FieldValue::Reference(Some(OopHandle::from_raw(0x40))).to_string(),
            "0x40"
        );
        assert_eq!(FieldValue::MarkWord(1).to_string(), "0x0000000000000001");
        assert_eq!(FieldValue::Boolean(true).to_string(), "true");
    }

    #[test]
    fn test_accessors() {
        assert_eq!(FieldValue::Byte(-1).as_i64(), Some(-1));
        assert_eq!(FieldValue::Double(1.0).as_i64(), None);
        assert_eq!(FieldValue::Reference(None).as_reference(), Some(None));
        assert_eq!(FieldValue::Int(3).as_reference(), None);
    }
}

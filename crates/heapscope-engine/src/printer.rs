//! Plain-text object dumps

use std::fmt::{self, Write};

use crate::error::HeapResult;
use crate::oops::Oop;
use crate::target::{Address, FieldDescriptor, OopHandle};
use crate::visitor::{FieldValue, OopVisitor};

/// Visitor that writes one line per field
///
/// ```text
///   +0    _mark: markWord = 0x0000000000000001
///   +12   count: int = 3
/// ```
pub struct OopPrinter<W: Write> {
    out: W,
    indent: usize,
    fields: usize,
    error: Option<fmt::Error>,
}

impl<W: Write> OopPrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            indent: 2,
            fields: 0,
            error: None,
        }
    }

    /// Indent every line by `indent` spaces
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// Number of fields printed so far
    pub fn field_count(&self) -> usize {
        self.fields
    }

    /// Recover the writer, failing if any write failed
    pub fn finish(self) -> Result<W, fmt::Error> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.out),
        }
    }

    fn line(&mut self, field: &FieldDescriptor, value: FieldValue) {
        if self.error.is_some() {
            return;
        }
        self.fields += 1;
        let offset = format!("+{}", field.offset);
        let result = writeln!(
            self.out,
            "{:indent$}{:<6}{}: {} = {}",
            "",
            offset,
            field.name,
            field.field_type.name(),
            value,
            indent = self.indent
        );
        if let Err(err) = result {
            self.error = Some(err);
        }
    }
}

impl<W: Write> OopVisitor for OopPrinter<W> {
    fn do_mark_word(&mut self, field: &FieldDescriptor, value: u64) {
        self.line(field, FieldValue::MarkWord(value));
    }
    fn do_metadata(&mut self, field: &FieldDescriptor, klass: Address) {
        self.line(field, FieldValue::Metadata(klass));
    }
    fn do_boolean(&mut self, field: &FieldDescriptor, value: bool) {
        self.line(field, FieldValue::Boolean(value));
    }
    fn do_byte(&mut self, field: &FieldDescriptor, value: i8) {
        self.line(field, FieldValue::Byte(value));
    }
    fn do_char(&mut self, field: &FieldDescriptor, value: u16) {
        self.line(field, FieldValue::Char(value));
    }
    fn do_short(&mut self, field: &FieldDescriptor, value: i16) {
        self.line(field, FieldValue::Short(value));
    }
    fn do_int(&mut self, field: &FieldDescriptor, value: i32) {
        self.line(field, FieldValue::Int(value));
    }
    fn do_long(&mut self, field: &FieldDescriptor, value: i64) {
        self.line(field, FieldValue::Long(value));
    }
    fn do_float(&mut self, field: &FieldDescriptor, value: f32) {
        self.line(field, FieldValue::Float(value));
    }
    fn do_double(&mut self, field: &FieldDescriptor, value: f64) {
        self.line(field, FieldValue::Double(value));
    }
    fn do_reference(&mut self, field: &FieldDescriptor, value: Option<OopHandle>) {
        self.line(field, FieldValue::Reference(value));
    }
}

/// Summary line, rendered value when one is registered, then every field
pub fn describe(oop: &Oop<'_>, include_base_fields: bool) -> HeapResult<String> {
    let mut text = String::new();
    let size = oop.object_size()?;
    // Writing to a String cannot fail
    let _ = writeln!(
        text,
        "{} ({} bytes, header {})",
        oop.structural_value(),
        size,
        oop.header_size()
    );
    if oop.heap().renderers().contains(oop.type_name()) {
        let _ = writeln!(text, "  value: {}", oop.render_value()?);
    }

    let mut printer = OopPrinter::new(text);
    oop.iterate_fields(&mut printer, include_base_fields)?;
    Ok(printer.finish().unwrap_or_default())
}

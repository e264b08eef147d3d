//! Heapscope Engine
//!
//! Read-only object model for inspecting the heap of a managed runtime from
//! outside the process, either attached live or through a dump image:
//! - **Layout**: header geometry captured once per attach (`layout` module)
//! - **Heap**: handle to typed object view (`heap` module)
//! - **Oops**: instance and array views with ordered field traversal (`oops` module)
//! - **Visitors**: per-category field callbacks (`visitor` module)
//! - **Renderers**: per-type value rendering (`render` module)
//! - **Images**: JSON dump images usable as a target (`image` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use heapscope_engine::{DumpImage, OopHandle, TargetSession};
//!
//! let image = DumpImage::from_file("core.heap.json")?;
//! let session = TargetSession::new();
//! session.on_target_ready(&image)?;
//!
//! let heap = session.object_heap(&image, &image)?;
//! let oop = heap.resolve(OopHandle::from_raw(0x7f00_1000))?;
//! println!("{}", oop.render_value()?);
//! ```

#![warn(rust_2018_idioms)]

// ============================================================================
// Modules
// ============================================================================

pub mod error;
pub mod heap;
pub mod image;
pub mod layout;
pub mod oops;
pub mod printer;
pub mod render;
pub mod strings;
pub mod target;
pub mod visitor;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{HeapError, HeapResult};
pub use heap::ObjectHeap;
pub use image::{DumpImage, ImageDocument, ImageError, MemorySegment};
pub use layout::{NarrowEncoding, TargetSession, VmLayout};
pub use oops::{FieldStep, Oop, OopKind};
pub use printer::{describe, OopPrinter};
pub use render::{RenderFn, RendererRegistry, STRING_TYPE};
pub use target::{
    Address, FieldDescriptor, FieldType, MemoryProvider, OopHandle, TypeDatabase, TypeKind,
    TypeRecord,
};
pub use visitor::{DecodedField, FieldValue, OopVisitor};

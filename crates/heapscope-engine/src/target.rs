//! Target-side surfaces consumed by the decoder
//!
//! The decoder never owns target memory or type metadata. It reads both
//! through two traits:
//!
//! - [`MemoryProvider`]: raw bytes at an address (live process or core image)
//! - [`TypeDatabase`]: type sizes, flags, constants and per-type field layout
//!
//! Everything in this module is plain data describing what those surfaces
//! return.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::HeapResult;

// ============================================================================
// Addresses and Handles
// ============================================================================

/// Address in the target's address space
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Address(u64);

impl Address {
    /// The null address
    pub const NULL: Address = Address(0);

    /// Create an address from its raw value
    pub const fn new(raw: u64) -> Self {
        Address(raw)
    }

    /// Raw address value
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Check if this is the null address
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Address `bytes` past this one
    pub fn offset(self, bytes: u64) -> Address {
        Address(self.0.wrapping_add(bytes))
    }
}

impl From<u64> for Address {
    fn from(raw: u64) -> Self {
        Address(raw)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Handle to one object in the target heap
///
/// The target owns the memory behind a handle; two handles are the same
/// object exactly when their addresses are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OopHandle(Address);

impl OopHandle {
    /// Create a handle for the object at `address`
    pub const fn new(address: Address) -> Self {
        OopHandle(address)
    }

    /// Create a handle from a raw address value
    pub const fn from_raw(raw: u64) -> Self {
        OopHandle(Address::new(raw))
    }

    /// Address of the object's first header byte
    pub fn address(self) -> Address {
        self.0
    }

    /// Check if this handle is null
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl fmt::Display for OopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// Type Metadata
// ============================================================================

/// Semantic type tag of one field slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// 1-byte boolean
    Boolean,
    /// Signed 8-bit integer
    Byte,
    /// UTF-16 code unit
    Char,
    /// Signed 16-bit integer
    Short,
    /// Signed 32-bit integer
    Int,
    /// Signed 64-bit integer
    Long,
    /// IEEE 754 single
    Float,
    /// IEEE 754 double
    Double,
    /// Reference to another heap object (narrow under compressed oops)
    Reference,
    /// Header identity/lock word
    MarkWord,
    /// Header type pointer (narrow under compressed class pointers)
    Metadata,
}

impl FieldType {
    /// Fixed size in bytes, or `None` for slots whose width depends on the
    /// target layout
    pub fn fixed_size(self) -> Option<u64> {
        match self {
            FieldType::Boolean | FieldType::Byte => Some(1),
            FieldType::Char | FieldType::Short => Some(2),
            FieldType::Int | FieldType::Float => Some(4),
            FieldType::Long | FieldType::Double => Some(8),
            FieldType::Reference | FieldType::MarkWord | FieldType::Metadata => None,
        }
    }

    /// Source-level name of the type
    pub fn name(self) -> &'static str {
        match self {
            FieldType::Boolean => "boolean",
            FieldType::Byte => "byte",
            FieldType::Char => "char",
            FieldType::Short => "short",
            FieldType::Int => "int",
            FieldType::Long => "long",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Reference => "reference",
            FieldType::MarkWord => "markWord",
            FieldType::Metadata => "metadata",
        }
    }
}

/// Description of one field slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name
    pub name: String,
    /// Byte offset from the start of the object
    pub offset: u64,
    /// Semantic type tag
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Name of the type that declares the field
    #[serde(default)]
    pub declaring_type: String,
    /// Static fields live outside instances and are never decoded per object
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

impl FieldDescriptor {
    /// Create an instance field descriptor
    pub fn new(
        name: impl Into<String>,
        offset: u64,
        field_type: FieldType,
        declaring_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            offset,
            field_type,
            declaring_type: declaring_type.into(),
            is_static: false,
        }
    }

    /// Mark this descriptor static or not
    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }
}

/// Shape of a type's instances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// Non-array reference type
    Instance,
    /// Array of primitive elements
    TypeArray {
        /// Element type
        element: FieldType,
    },
    /// Array of references
    ObjArray {
        /// Name of the element type
        element_type: String,
    },
}

/// Per-type metadata record supplied by the type database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRecord {
    /// Qualified type name (`java/lang/String`)
    pub name: String,
    /// Address of the target-side type descriptor headers point at
    pub klass: Address,
    /// Instance or array shape
    pub kind: TypeKind,
    /// Direct super type, `None` for the root
    #[serde(default, rename = "super")]
    pub super_type: Option<String>,
    /// Instance size in bytes including the header (instances only)
    #[serde(default)]
    pub instance_size: u64,
    /// Fields declared by this type, in declaration order
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl TypeRecord {
    /// Create an instance type record
    pub fn instance(name: impl Into<String>, klass: Address, instance_size: u64) -> Self {
        Self {
            name: name.into(),
            klass,
            kind: TypeKind::Instance,
            super_type: None,
            instance_size,
            fields: Vec::new(),
        }
    }

    /// Create a primitive array type record
    pub fn type_array(name: impl Into<String>, klass: Address, element: FieldType) -> Self {
        Self {
            name: name.into(),
            klass,
            kind: TypeKind::TypeArray { element },
            super_type: None,
            instance_size: 0,
            fields: Vec::new(),
        }
    }

    /// Create a reference array type record
    pub fn obj_array(
        name: impl Into<String>,
        klass: Address,
        element_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            klass,
            kind: TypeKind::ObjArray {
                element_type: element_type.into(),
            },
            super_type: None,
            instance_size: 0,
            fields: Vec::new(),
        }
    }

    /// Set the direct super type
    pub fn with_super(mut self, super_type: impl Into<String>) -> Self {
        self.super_type = Some(super_type.into());
        self
    }

    /// Declare an instance field on this type
    pub fn with_field(mut self, name: impl Into<String>, offset: u64, field_type: FieldType) -> Self {
        let field = FieldDescriptor::new(name, offset, field_type, self.name.clone());
        self.fields.push(field);
        self
    }

    /// Declare a static field on this type
    pub fn with_static_field(
        mut self,
        name: impl Into<String>,
        offset: u64,
        field_type: FieldType,
    ) -> Self {
        let field = FieldDescriptor::new(name, offset, field_type, self.name.clone()).with_static(true);
        self.fields.push(field);
        self
    }

    /// Check if instances of this type are arrays
    pub fn is_array(&self) -> bool {
        !matches!(self.kind, TypeKind::Instance)
    }
}

// ============================================================================
// External Surfaces
// ============================================================================

/// Read access to target memory
///
/// Implementations may block on I/O. They must never write to the target.
pub trait MemoryProvider {
    /// Fill `buf` with the bytes starting at `address`
    ///
    /// Fails with [`HeapError::MemoryAccess`](crate::HeapError::MemoryAccess)
    /// when any byte of the range is unreadable.
    fn read(&self, address: Address, buf: &mut [u8]) -> HeapResult<()>;
}

/// Type and symbol metadata of the target
pub trait TypeDatabase {
    /// Size in bytes of a named VM type (`instanceOopDesc`, `address`, ...)
    fn type_size(&self, name: &str) -> HeapResult<u64>;

    /// Boolean VM flag, `None` when the target does not define it
    fn flag(&self, name: &str) -> Option<bool>;

    /// Integer VM constant, `None` when the target does not define it
    fn int_constant(&self, name: &str) -> Option<u64>;

    /// Type record for the type descriptor at `klass`
    fn type_for_klass(&self, klass: Address) -> Option<Arc<TypeRecord>>;

    /// Fields declared directly by `type_name`, in declaration order
    fn fields(&self, type_name: &str) -> HeapResult<Vec<FieldDescriptor>>;

    /// Names of `type_name` and its ancestors, root first, `type_name` last
    fn ancestor_chain(&self, type_name: &str) -> HeapResult<Vec<String>>;
}

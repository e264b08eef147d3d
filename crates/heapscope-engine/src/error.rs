//! Error types for heap decoding

use crate::target::Address;

/// Result type for decoding operations
pub type HeapResult<T> = Result<T, HeapError>;

/// Decoding error types
///
/// A decode of a single object either succeeds completely or fails with one
/// of these; callers decide whether to retry or render a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeapError {
    /// The type behind a handle or name is unknown or unreachable
    #[error("Type resolution failed for {target}: {reason}")]
    TypeResolution {
        /// Handle or type name that failed to resolve
        target: String,
        /// Why resolution failed
        reason: String,
    },

    /// Target memory could not be read
    #[error("Memory access failed at {address}: {reason}")]
    MemoryAccess {
        /// First address of the failed read
        address: Address,
        /// Why the read failed
        reason: String,
    },

    /// Layout snapshot missing or inconsistent
    #[error("Layout configuration error: {0}")]
    Configuration(String),
}

impl HeapError {
    /// Build a [`HeapError::TypeResolution`]
    pub fn type_resolution(target: impl ToString, reason: impl Into<String>) -> Self {
        HeapError::TypeResolution {
            target: target.to_string(),
            reason: reason.into(),
        }
    }

    /// Build a [`HeapError::MemoryAccess`]
    pub fn memory_access(address: Address, reason: impl Into<String>) -> Self {
        HeapError::MemoryAccess {
            address,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = HeapError::type_resolution("0x1000", "unknown klass 0x8000");
        assert_eq!(
            err.to_string(),
            "Type resolution failed for 0x1000: unknown klass 0x8000"
        );

        let err = HeapError::memory_access(Address::new(0x20), "unmapped");
        assert_eq!(err.to_string(), "Memory access failed at 0x20: unmapped");

        let err = HeapError::Configuration("not attached".to_string());
        assert_eq!(err.to_string(), "Layout configuration error: not attached");
    }
}

//! Platform error types
//!
//! This module defines error types for NVM object store operations.

use core::fmt;

/// Result type for platform operations
pub type Result<T> = core::result::Result<T, NvmError>;

/// NVM object store errors
///
/// All store implementations map their driver-specific errors to these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NvmError {
    /// No object stored under the key
    NotFound,
    /// Read operation failed
    ReadFailed,
    /// Write operation failed
    WriteFailed,
    /// Erase or format failed
    EraseFailed,
    /// Offset/length outside the stored object
    OutOfRange,
}

impl fmt::Display for NvmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NvmError::NotFound => write!(f, "Object not found"),
            NvmError::ReadFailed => write!(f, "NVM read failed"),
            NvmError::WriteFailed => write!(f, "NVM write failed"),
            NvmError::EraseFailed => write!(f, "NVM erase failed"),
            NvmError::OutOfRange => write!(f, "Access outside object bounds"),
        }
    }
}

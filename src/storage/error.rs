//! Storage engine errors

use crate::platform::{NvmError, ObjectKey};
use core::fmt;
use zwave_nvm_core::node::InvalidNodeId;

/// Result type for storage engine operations
pub type Result<T> = core::result::Result<T, StorageError>;

/// Storage engine errors
///
/// Legitimate absence of a node record is not an error; those reads return
/// `None` or a default value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// An object the engine expected to exist is missing
    ObjectNotFound { key: ObjectKey },
    /// An object has an unexpected size
    SizeMismatch {
        key: ObjectKey,
        expected: usize,
        actual: usize,
    },
    /// The store rejected a write or erase
    StoreWriteFailed { key: ObjectKey },
    /// The store failed a read
    StoreReadFailed { key: ObjectKey },
    /// Node id is not valid for the requested operation
    InvalidNodeForOperation,
    /// A schema migration step failed; it is retried on next boot
    MigrationFailed { step: &'static str },
}

impl StorageError {
    /// Map a failed read of `key`
    pub fn from_read(key: ObjectKey, err: NvmError) -> Self {
        match err {
            NvmError::NotFound => StorageError::ObjectNotFound { key },
            _ => StorageError::StoreReadFailed { key },
        }
    }

    /// Map a failed write or erase of `key`
    pub fn from_write(key: ObjectKey, _err: NvmError) -> Self {
        StorageError::StoreWriteFailed { key }
    }
}

impl From<InvalidNodeId> for StorageError {
    fn from(_: InvalidNodeId) -> Self {
        StorageError::InvalidNodeForOperation
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ObjectNotFound { key } => write!(f, "Object {:#06x} not found", key),
            StorageError::SizeMismatch {
                key,
                expected,
                actual,
            } => write!(
                f,
                "Object {:#06x} size mismatch: expected {} bytes, found {}",
                key, expected, actual
            ),
            StorageError::StoreWriteFailed { key } => {
                write!(f, "Write to object {:#06x} failed", key)
            }
            StorageError::StoreReadFailed { key } => {
                write!(f, "Read of object {:#06x} failed", key)
            }
            StorageError::InvalidNodeForOperation => {
                write!(f, "Node id not valid for this operation")
            }
            StorageError::MigrationFailed { step } => write!(f, "Migration step '{}' failed", step),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_error_mapping() {
        assert_eq!(
            StorageError::from_read(0x4, NvmError::NotFound),
            StorageError::ObjectNotFound { key: 0x4 }
        );
        assert_eq!(
            StorageError::from_read(0x4, NvmError::ReadFailed),
            StorageError::StoreReadFailed { key: 0x4 }
        );
    }

    #[test]
    fn test_invalid_node_conversion() {
        let err: StorageError = InvalidNodeId(240).into();
        assert_eq!(err, StorageError::InvalidNodeForOperation);
    }

    #[test]
    fn test_display() {
        let err = StorageError::SizeMismatch {
            key: 0x4,
            expected: 22,
            actual: 13,
        };
        assert_eq!(
            format!("{}", err),
            "Object 0x0004 size mismatch: expected 22 bytes, found 13"
        );
    }
}

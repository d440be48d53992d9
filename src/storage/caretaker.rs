//! Boot-time file set verification and repair
//!
//! The controller owns a fixed set of singleton objects (masks, ControllerInfo,
//! version). On every boot each one is checked against its expected size and
//! missing or resized objects are rewritten before the engine reads them.

use super::error::{Result, StorageError};
use super::files::{FILE_ID_CONTROLLERINFO, FILE_SIZE_LR_NODE_MASK};
use crate::platform::{NvmError, NvmInterface, ObjectKey};
use crate::{log_info, log_warn};
use heapless::Vec;
use zwave_nvm_core::records::ControllerInfo;

/// Maximum number of descriptors in one verified file set
pub const MAX_FILE_SET: usize = 16;

/// Largest object in the file set
const MAX_DESCRIPTOR_SIZE: usize = FILE_SIZE_LR_NODE_MASK;

/// Expected key and size of one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileDescriptor {
    pub key: ObjectKey,
    pub size: usize,
}

impl FileDescriptor {
    pub const fn new(key: ObjectKey, size: usize) -> Self {
        Self { key, size }
    }
}

/// Verification outcome for one descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FileStatus {
    /// Present with the expected size
    Ok,
    /// Missing, or the store could not report its size
    Unobtainable,
    /// Present with a different size
    SizeMismatch { actual: usize },
}

/// Per-descriptor outcomes, parallel to the descriptor list
pub type FileStatusList = Vec<FileStatus, MAX_FILE_SET>;

/// Check every descriptor against the store
///
/// Descriptors beyond [`MAX_FILE_SET`] are not checked and are logged.
pub fn verify<S: NvmInterface + ?Sized>(store: &S, descriptors: &[FileDescriptor]) -> FileStatusList {
    if descriptors.len() > MAX_FILE_SET {
        log_warn!(
            "Caretaker: {} descriptors, only the first {} are checked",
            descriptors.len(),
            MAX_FILE_SET
        );
    }
    let mut statuses = FileStatusList::new();
    for descriptor in descriptors {
        let status = match store.object_size(descriptor.key) {
            Ok(size) if size == descriptor.size => FileStatus::Ok,
            Ok(actual) => FileStatus::SizeMismatch { actual },
            Err(_) => FileStatus::Unobtainable,
        };
        if statuses.push(status).is_err() {
            break;
        }
    }
    statuses
}

/// Fill `buf` with the default contents of `key`
///
/// ControllerInfo has real defaults, every mask defaults to all zero.
pub fn default_contents(key: ObjectKey, buf: &mut [u8]) {
    buf.fill(0);
    if key == FILE_ID_CONTROLLERINFO {
        let info = ControllerInfo::default_contents().to_bytes();
        let len = info.len().min(buf.len());
        buf[..len].copy_from_slice(&info[..len]);
    }
}

/// Rewrite every descriptor that did not verify
///
/// Missing objects get their default contents. Resized objects keep the old
/// prefix that still fits and take the default contents for the rest.
///
/// # Returns
///
/// Number of objects rewritten
///
/// # Errors
///
/// Returns `StorageError::StoreWriteFailed` if a rewrite fails, or
/// `StorageError::StoreReadFailed` if the old contents cannot be read.
pub fn repair<S: NvmInterface + ?Sized>(
    store: &mut S,
    descriptors: &[FileDescriptor],
    statuses: &[FileStatus],
) -> Result<usize> {
    let mut repaired = 0;
    for (descriptor, status) in descriptors.iter().zip(statuses) {
        let mut buf = [0u8; MAX_DESCRIPTOR_SIZE];
        let buf = &mut buf[..descriptor.size];
        default_contents(descriptor.key, buf);

        match *status {
            FileStatus::Ok => continue,
            FileStatus::Unobtainable => {
                log_warn!("Caretaker: creating missing object {:#x}", descriptor.key);
            }
            FileStatus::SizeMismatch { actual } => {
                log_warn!(
                    "Caretaker: resizing object {:#x} from {} to {} bytes",
                    descriptor.key,
                    actual,
                    descriptor.size
                );
                match store.read(descriptor.key, buf) {
                    Ok(_) | Err(NvmError::NotFound) => {}
                    Err(e) => return Err(StorageError::from_read(descriptor.key, e)),
                }
            }
        }

        store
            .write(descriptor.key, buf)
            .map_err(|e| StorageError::from_write(descriptor.key, e))?;
        repaired += 1;
    }

    if repaired > 0 {
        log_info!("Caretaker: repaired {} objects", repaired);
    }
    Ok(repaired)
}

/// Write the default contents of every descriptor
///
/// Used right after the store has been formatted.
///
/// # Errors
///
/// Returns `StorageError::StoreWriteFailed` on the first failed write.
pub fn write_default_set<S: NvmInterface + ?Sized>(
    store: &mut S,
    descriptors: &[FileDescriptor],
) -> Result<()> {
    for descriptor in descriptors {
        let mut buf = [0u8; MAX_DESCRIPTOR_SIZE];
        let buf = &mut buf[..descriptor.size];
        default_contents(descriptor.key, buf);
        store
            .write(descriptor.key, buf)
            .map_err(|e| StorageError::from_write(descriptor.key, e))?;
    }
    log_info!("Caretaker: wrote {} default objects", descriptors.len());
    Ok(())
}

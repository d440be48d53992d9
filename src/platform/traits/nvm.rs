//! NVM object store interface trait
//!
//! This module defines the key/value object store the controller storage
//! engine is built on. Wear leveling and power-loss atomicity of a single
//! write are properties of the implementation, not of this interface.

use crate::platform::Result;

/// Object key in the NVM store
pub type ObjectKey = u32;

/// NVM object store interface
///
/// Objects are opaque byte strings addressed by an integer key. A write
/// replaces the whole object.
///
/// # Safety Invariants
///
/// - Only one owner per store instance
/// - No concurrent access from interrupt context
pub trait NvmInterface {
    /// Read the start of an object
    ///
    /// Copies `min(buf.len(), object size)` bytes into `buf` and leaves the
    /// rest of `buf` untouched.
    ///
    /// # Arguments
    ///
    /// * `key` - Object key
    /// * `buf` - Destination buffer
    ///
    /// # Returns
    ///
    /// Number of bytes copied
    ///
    /// # Errors
    ///
    /// Returns `NvmError::NotFound` if no object is stored under `key`.
    fn read(&mut self, key: ObjectKey, buf: &mut [u8]) -> Result<usize>;

    /// Read `buf.len()` bytes starting at `offset`
    ///
    /// # Errors
    ///
    /// Returns `NvmError::NotFound` if no object is stored under `key`, or
    /// `NvmError::OutOfRange` if the range runs past the end of the object.
    fn read_part(&mut self, key: ObjectKey, offset: usize, buf: &mut [u8]) -> Result<()>;

    /// Create or replace an object
    ///
    /// # Errors
    ///
    /// Returns `NvmError::WriteFailed` if the object could not be stored.
    fn write(&mut self, key: ObjectKey, data: &[u8]) -> Result<()>;

    /// Delete an object
    ///
    /// Erasing a missing object succeeds.
    ///
    /// # Errors
    ///
    /// Returns `NvmError::EraseFailed` if the object could not be removed.
    fn erase(&mut self, key: ObjectKey) -> Result<()>;

    /// Size of a stored object in bytes
    ///
    /// # Errors
    ///
    /// Returns `NvmError::NotFound` if no object is stored under `key`.
    fn object_size(&self, key: ObjectKey) -> Result<usize>;

    /// Remove every object from the store
    ///
    /// # Errors
    ///
    /// Returns `NvmError::EraseFailed` if the store could not be formatted.
    fn format(&mut self) -> Result<()>;
}

//! Mock NVM object store for testing
//!
//! Provides an in-memory object store for unit and integration tests.

use crate::platform::{
    error::NvmError,
    traits::{NvmInterface, ObjectKey},
    Result,
};
use std::collections::{BTreeMap, BTreeSet};
use std::vec::Vec;

/// Operation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NvmCounters {
    /// `read` and `read_part` calls
    pub reads: u32,
    /// Successful `write` calls
    pub writes: u32,
    /// Successful `erase` calls
    pub erases: u32,
    /// Successful `format` calls
    pub formats: u32,
}

/// Mock NVM implementation
///
/// Simulates the object store in memory. Supports:
/// - Read/write/erase/size queries by key
/// - Operation counters for asserting flash traffic
/// - Power-loss simulation: after a number of successful mutations every
///   further write and erase fails until power is restored
///
/// # Example
///
/// ```ignore
/// use zwave_nvm::platform::mock::MockNvm;
/// use zwave_nvm::platform::traits::NvmInterface;
///
/// let mut nvm = MockNvm::new();
/// nvm.write(0x4, &[1, 2, 3]).unwrap();
///
/// let mut buf = [0u8; 3];
/// assert_eq!(nvm.read(0x4, &mut buf).unwrap(), 3);
/// assert_eq!(buf, [1, 2, 3]);
/// assert_eq!(nvm.counters().writes, 1);
/// ```
#[derive(Debug, Default)]
pub struct MockNvm {
    objects: BTreeMap<ObjectKey, Vec<u8>>,
    counters: NvmCounters,
    /// Mutations left before simulated power loss
    mutations_left: Option<u32>,
    /// Keys whose reads fail with `ReadFailed`
    failing_reads: BTreeSet<ObjectKey>,
}

impl MockNvm {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw bytes without touching counters (test setup)
    pub fn insert_raw(&mut self, key: ObjectKey, data: &[u8]) {
        self.objects.insert(key, data.to_vec());
    }

    /// Get object contents (for test verification)
    pub fn object(&self, key: ObjectKey) -> Option<&[u8]> {
        self.objects.get(&key).map(|v| v.as_slice())
    }

    /// True if an object is stored under `key`
    pub fn contains(&self, key: ObjectKey) -> bool {
        self.objects.contains_key(&key)
    }

    /// All stored keys in ascending order
    pub fn keys(&self) -> Vec<ObjectKey> {
        self.objects.keys().copied().collect()
    }

    /// Number of stored objects
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn counters(&self) -> NvmCounters {
        self.counters
    }

    pub fn reset_counters(&mut self) {
        self.counters = NvmCounters::default();
    }

    /// Simulate power loss after `mutations` more successful writes/erases
    pub fn power_loss_after(&mut self, mutations: u32) {
        self.mutations_left = Some(mutations);
    }

    /// Make every read of `key` fail with `NvmError::ReadFailed`
    pub fn fail_reads(&mut self, key: ObjectKey) {
        self.failing_reads.insert(key);
    }

    /// Accept mutations again
    pub fn restore_power(&mut self) {
        self.mutations_left = None;
    }

    /// Consume one mutation, false once power is lost
    fn take_mutation(&mut self) -> bool {
        match self.mutations_left.as_mut() {
            None => true,
            Some(0) => false,
            Some(left) => {
                *left -= 1;
                true
            }
        }
    }
}

impl NvmInterface for MockNvm {
    fn read(&mut self, key: ObjectKey, buf: &mut [u8]) -> Result<usize> {
        self.counters.reads += 1;
        if self.failing_reads.contains(&key) {
            return Err(NvmError::ReadFailed);
        }
        let object = self.objects.get(&key).ok_or(NvmError::NotFound)?;
        let len = buf.len().min(object.len());
        buf[..len].copy_from_slice(&object[..len]);
        Ok(len)
    }

    fn read_part(&mut self, key: ObjectKey, offset: usize, buf: &mut [u8]) -> Result<()> {
        self.counters.reads += 1;
        if self.failing_reads.contains(&key) {
            return Err(NvmError::ReadFailed);
        }
        let object = self.objects.get(&key).ok_or(NvmError::NotFound)?;
        let end = offset.checked_add(buf.len()).ok_or(NvmError::OutOfRange)?;
        if end > object.len() {
            return Err(NvmError::OutOfRange);
        }
        buf.copy_from_slice(&object[offset..end]);
        Ok(())
    }

    fn write(&mut self, key: ObjectKey, data: &[u8]) -> Result<()> {
        if !self.take_mutation() {
            return Err(NvmError::WriteFailed);
        }
        self.objects.insert(key, data.to_vec());
        self.counters.writes += 1;
        Ok(())
    }

    fn erase(&mut self, key: ObjectKey) -> Result<()> {
        if !self.take_mutation() {
            return Err(NvmError::EraseFailed);
        }
        self.objects.remove(&key);
        self.counters.erases += 1;
        Ok(())
    }

    fn object_size(&self, key: ObjectKey) -> Result<usize> {
        self.objects
            .get(&key)
            .map(|v| v.len())
            .ok_or(NvmError::NotFound)
    }

    fn format(&mut self) -> Result<()> {
        if !self.take_mutation() {
            return Err(NvmError::EraseFailed);
        }
        self.objects.clear();
        self.counters.formats += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_nvm_read_write() {
        let mut nvm = MockNvm::new();
        nvm.write(0x10, &[0xAA, 0xBB, 0xCC]).unwrap();

        let mut buf = [0u8; 3];
        assert_eq!(nvm.read(0x10, &mut buf).unwrap(), 3);
        assert_eq!(buf, [0xAA, 0xBB, 0xCC]);
        assert_eq!(nvm.object_size(0x10).unwrap(), 3);
    }

    #[test]
    fn test_mock_nvm_short_object_read() {
        let mut nvm = MockNvm::new();
        nvm.write(0x10, &[1, 2]).unwrap();

        let mut buf = [0xFFu8; 4];
        assert_eq!(nvm.read(0x10, &mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2, 0xFF, 0xFF]);
    }

    #[test]
    fn test_mock_nvm_read_part() {
        let mut nvm = MockNvm::new();
        nvm.write(0x20, &[0, 1, 2, 3, 4, 5]).unwrap();

        let mut buf = [0u8; 2];
        nvm.read_part(0x20, 3, &mut buf).unwrap();
        assert_eq!(buf, [3, 4]);
        assert_eq!(nvm.read_part(0x20, 5, &mut buf), Err(NvmError::OutOfRange));
    }

    #[test]
    fn test_mock_nvm_missing_object() {
        let mut nvm = MockNvm::new();
        let mut buf = [0u8; 1];
        assert_eq!(nvm.read(0x1, &mut buf), Err(NvmError::NotFound));
        assert_eq!(nvm.object_size(0x1), Err(NvmError::NotFound));
        // Erasing a missing object is not an error
        assert!(nvm.erase(0x1).is_ok());
    }

    #[test]
    fn test_mock_nvm_counters() {
        let mut nvm = MockNvm::new();
        nvm.write(0x1, &[1]).unwrap();
        nvm.write(0x2, &[2]).unwrap();
        let mut buf = [0u8; 1];
        nvm.read(0x1, &mut buf).unwrap();
        nvm.erase(0x2).unwrap();

        let counters = nvm.counters();
        assert_eq!(counters.writes, 2);
        assert_eq!(counters.reads, 1);
        assert_eq!(counters.erases, 1);

        nvm.reset_counters();
        assert_eq!(nvm.counters(), NvmCounters::default());
    }

    #[test]
    fn test_mock_nvm_power_loss() {
        let mut nvm = MockNvm::new();
        nvm.power_loss_after(1);
        assert!(nvm.write(0x1, &[1]).is_ok());
        assert_eq!(nvm.write(0x2, &[2]), Err(NvmError::WriteFailed));
        assert_eq!(nvm.erase(0x1), Err(NvmError::EraseFailed));
        assert!(nvm.contains(0x1));
        assert!(!nvm.contains(0x2));

        nvm.restore_power();
        assert!(nvm.write(0x2, &[2]).is_ok());
    }

    #[test]
    fn test_mock_nvm_failing_reads() {
        let mut nvm = MockNvm::new();
        nvm.insert_raw(0x1, &[1, 2]);
        nvm.fail_reads(0x1);
        let mut buf = [0u8; 2];
        assert_eq!(nvm.read(0x1, &mut buf), Err(NvmError::ReadFailed));
        assert_eq!(nvm.read_part(0x1, 0, &mut buf), Err(NvmError::ReadFailed));
        assert_eq!(nvm.object_size(0x1), Ok(2));
    }

    #[test]
    fn test_mock_nvm_format() {
        let mut nvm = MockNvm::new();
        nvm.write(0x1, &[1]).unwrap();
        nvm.write(0x2, &[2]).unwrap();
        nvm.format().unwrap();
        assert_eq!(nvm.object_count(), 0);
        assert_eq!(nvm.counters().formats, 1);
    }
}

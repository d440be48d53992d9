//! Fixed-capacity node bit masks
//!
//! One bit per node position, position `p` (1-based) lives in bit `(p - 1) % 8`
//! of byte `(p - 1) / 8`. This is the on-flash layout of every existence and
//! flag file, so the byte order must not change.
//!
//! Classic masks are indexed by node id. Long Range masks are indexed by
//! `LongRangeNodeId::index() + 1`; the typed helpers below hide that offset.

use super::{ClassicNodeId, LongRangeNodeId};

/// Bytes in a classic node mask (232 nodes)
pub const CLASSIC_MASK_BYTES: usize = 29;

/// Bytes in a Long Range node mask (1024 nodes)
pub const LONG_RANGE_MASK_BYTES: usize = 128;

/// Bit vector with one bit per node position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeMask<const BYTES: usize> {
    bits: [u8; BYTES],
}

/// Mask over classic node ids
pub type ClassicNodeMask = NodeMask<CLASSIC_MASK_BYTES>;

/// Mask over Long Range node indices
pub type LongRangeNodeMask = NodeMask<LONG_RANGE_MASK_BYTES>;

impl<const BYTES: usize> NodeMask<BYTES> {
    /// Size of the mask in bytes (also its file size)
    pub const SIZE: usize = BYTES;

    /// Highest addressable position
    pub const CAPACITY: u16 = (BYTES * 8) as u16;

    /// Create an empty mask
    pub const fn new() -> Self {
        Self { bits: [0; BYTES] }
    }

    /// Build a mask from stored bytes
    ///
    /// Shorter input leaves the tail clear, longer input is truncated.
    pub fn from_bytes(buf: &[u8]) -> Self {
        let mut mask = Self::new();
        let len = buf.len().min(BYTES);
        mask.bits[..len].copy_from_slice(&buf[..len]);
        mask
    }

    /// Raw bytes for persisting
    pub fn as_bytes(&self) -> &[u8; BYTES] {
        &self.bits
    }

    fn locate(position: u16) -> Option<(usize, u8)> {
        if position == 0 || position > Self::CAPACITY {
            return None;
        }
        let bit = (position - 1) as usize;
        Some((bit / 8, 1 << (bit % 8)))
    }

    /// Set the bit for `position`, out-of-range positions are ignored
    pub fn set(&mut self, position: u16) {
        if let Some((byte, bit)) = Self::locate(position) {
            self.bits[byte] |= bit;
        }
    }

    /// Clear the bit for `position`, out-of-range positions are ignored
    pub fn clear(&mut self, position: u16) {
        if let Some((byte, bit)) = Self::locate(position) {
            self.bits[byte] &= !bit;
        }
    }

    /// Set or clear the bit for `position`
    pub fn assign(&mut self, position: u16, value: bool) {
        if value {
            self.set(position);
        } else {
            self.clear(position);
        }
    }

    /// Test the bit for `position`, false when out of range
    pub fn test(&self, position: u16) -> bool {
        match Self::locate(position) {
            Some((byte, bit)) => self.bits[byte] & bit != 0,
            None => false,
        }
    }

    /// First set position strictly greater than `after`
    ///
    /// Linear scan; callers only use it over small neighbourhoods.
    pub fn next_set_from(&self, after: u16) -> Option<u16> {
        ((after.saturating_add(1))..=Self::CAPACITY).find(|&p| self.test(p))
    }

    /// True if any position in `first..first + len` is set
    pub fn any_in_range(&self, first: u16, len: u16) -> bool {
        (first..first.saturating_add(len)).any(|p| self.test(p))
    }

    /// Clear every bit
    pub fn clear_all(&mut self) {
        self.bits = [0; BYTES];
    }

    /// True if no bit is set
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&b| b == 0)
    }

    /// Number of set bits
    pub fn count(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Iterate over set positions in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        (1..=Self::CAPACITY).filter(move |&p| self.test(p))
    }
}

impl<const BYTES: usize> Default for NodeMask<BYTES> {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeMask<CLASSIC_MASK_BYTES> {
    /// Typed set
    pub fn insert_node(&mut self, id: ClassicNodeId) {
        self.set(id.get() as u16);
    }

    /// Typed clear
    pub fn remove_node(&mut self, id: ClassicNodeId) {
        self.clear(id.get() as u16);
    }

    /// Typed test
    pub fn contains_node(&self, id: ClassicNodeId) -> bool {
        self.test(id.get() as u16)
    }
}

impl NodeMask<LONG_RANGE_MASK_BYTES> {
    /// Typed set
    pub fn insert_node(&mut self, id: LongRangeNodeId) {
        self.set(id.index() as u16 + 1);
    }

    /// Typed clear
    pub fn remove_node(&mut self, id: LongRangeNodeId) {
        self.clear(id.index() as u16 + 1);
    }

    /// Typed test
    pub fn contains_node(&self, id: LongRangeNodeId) -> bool {
        self.test(id.index() as u16 + 1)
    }
}

//! Node addressing
//!
//! Z-Wave controllers address two disjoint node id ranges:
//!
//! - **Classic**: ids `1..=232`, stored in 29-byte masks and 35-byte NodeInfo slots
//! - **Long Range**: ids `256..=1279`, stored in 128-byte masks and 3-byte packed slots
//!
//! The raw classifiers (`is_classic`, `is_long_range`) exist for code that
//! still receives bare integers (frames, host API). Everything past that
//! boundary should carry [`ClassicNodeId`], [`LongRangeNodeId`] or [`NodeId`]
//! so that a Long Range id can never reach a classic-only operation.

pub mod mask;

pub use mask::{
    ClassicNodeMask, LongRangeNodeMask, NodeMask, CLASSIC_MASK_BYTES, LONG_RANGE_MASK_BYTES,
};

use core::fmt;

/// Highest classic node id
pub const MAX_CLASSIC_NODES: u16 = 232;

/// Lowest Long Range node id
pub const LONG_RANGE_BASE: u16 = 256;

/// Number of addressable Long Range node ids
pub const MAX_LONG_RANGE_NODES: u16 = 1024;

/// Highest Long Range node id
pub const HIGHEST_LONG_RANGE_NODE_ID: u16 = LONG_RANGE_BASE + MAX_LONG_RANGE_NODES - 1;

/// Returns true if `id` is a classic node id (1..=232)
pub fn is_classic(id: u16) -> bool {
    (1..=MAX_CLASSIC_NODES).contains(&id)
}

/// Returns true if `id` is a Long Range node id
pub fn is_long_range(id: u16) -> bool {
    (LONG_RANGE_BASE..=HIGHEST_LONG_RANGE_NODE_ID).contains(&id)
}

/// Zero-based Long Range index (`id - LONG_RANGE_BASE`), `None` for non-LR ids
pub fn to_long_range_index(id: u16) -> Option<u16> {
    if is_long_range(id) {
        Some(id - LONG_RANGE_BASE)
    } else {
        None
    }
}

/// A classic node id in `1..=232`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassicNodeId(u8);

impl ClassicNodeId {
    /// Validate a raw id
    pub const fn new(id: u16) -> Option<Self> {
        if id >= 1 && id <= MAX_CLASSIC_NODES {
            Some(Self(id as u8))
        } else {
            None
        }
    }

    /// Raw node id
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Zero-based index used for array and file arithmetic
    pub const fn index(self) -> usize {
        (self.0 - 1) as usize
    }

    /// Build from a zero-based index
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < MAX_CLASSIC_NODES as usize {
            Some(Self(index as u8 + 1))
        } else {
            None
        }
    }

    /// Iterate over every classic node id in ascending order
    pub fn all() -> impl Iterator<Item = ClassicNodeId> {
        (1..=MAX_CLASSIC_NODES as u8).map(ClassicNodeId)
    }
}

impl fmt::Display for ClassicNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A Long Range node id in `256..=1279`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LongRangeNodeId(u16);

impl LongRangeNodeId {
    /// Validate a raw id
    pub const fn new(id: u16) -> Option<Self> {
        if id >= LONG_RANGE_BASE && id <= HIGHEST_LONG_RANGE_NODE_ID {
            Some(Self(id))
        } else {
            None
        }
    }

    /// Raw node id
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Zero-based Long Range index
    pub const fn index(self) -> usize {
        (self.0 - LONG_RANGE_BASE) as usize
    }

    /// Build from a zero-based Long Range index
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < MAX_LONG_RANGE_NODES as usize {
            Some(Self(index as u16 + LONG_RANGE_BASE))
        } else {
            None
        }
    }
}

impl fmt::Display for LongRangeNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Any node id the controller can store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    /// Classic Z-Wave node
    Classic(ClassicNodeId),
    /// Z-Wave Long Range node
    LongRange(LongRangeNodeId),
}

impl NodeId {
    /// Classify a raw id, `None` if it belongs to neither range
    pub const fn new(id: u16) -> Option<Self> {
        if let Some(classic) = ClassicNodeId::new(id) {
            Some(NodeId::Classic(classic))
        } else if let Some(lr) = LongRangeNodeId::new(id) {
            Some(NodeId::LongRange(lr))
        } else {
            None
        }
    }

    /// Raw node id
    pub const fn raw(self) -> u16 {
        match self {
            NodeId::Classic(id) => id.get() as u16,
            NodeId::LongRange(id) => id.get(),
        }
    }

    /// Classic id if this is a classic node
    pub const fn as_classic(self) -> Option<ClassicNodeId> {
        match self {
            NodeId::Classic(id) => Some(id),
            NodeId::LongRange(_) => None,
        }
    }

    /// Long Range id if this is a Long Range node
    pub const fn as_long_range(self) -> Option<LongRangeNodeId> {
        match self {
            NodeId::Classic(_) => None,
            NodeId::LongRange(id) => Some(id),
        }
    }
}

impl From<ClassicNodeId> for NodeId {
    fn from(id: ClassicNodeId) -> Self {
        NodeId::Classic(id)
    }
}

impl From<LongRangeNodeId> for NodeId {
    fn from(id: LongRangeNodeId) -> Self {
        NodeId::LongRange(id)
    }
}

/// Raw id outside both address spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidNodeId(pub u16);

impl fmt::Display for InvalidNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node id {} is neither classic nor long range", self.0)
    }
}

impl TryFrom<u16> for NodeId {
    type Error = InvalidNodeId;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        NodeId::new(id).ok_or(InvalidNodeId(id))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Classic(id) => write!(f, "classic {}", id),
            NodeId::LongRange(id) => write!(f, "long range {}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_raw_ids() {
        assert!(!is_classic(0));
        assert!(is_classic(1));
        assert!(is_classic(232));
        assert!(!is_classic(233));
        assert!(!is_long_range(255));
        assert!(is_long_range(256));
        assert!(is_long_range(HIGHEST_LONG_RANGE_NODE_ID));
        assert!(!is_long_range(HIGHEST_LONG_RANGE_NODE_ID + 1));
    }

    #[test]
    fn test_long_range_index() {
        assert_eq!(to_long_range_index(256), Some(0));
        assert_eq!(to_long_range_index(300), Some(44));
        assert_eq!(to_long_range_index(5), None);
    }

    #[test]
    fn test_node_id_new() {
        assert_eq!(NodeId::new(0), None);
        assert_eq!(NodeId::new(240), None);
        assert!(matches!(NodeId::new(7), Some(NodeId::Classic(_))));
        assert!(matches!(NodeId::new(400), Some(NodeId::LongRange(_))));
        assert_eq!(NodeId::new(400).unwrap().raw(), 400);
    }

    #[test]
    fn test_node_id_try_from() {
        assert_eq!(NodeId::try_from(233u16), Err(InvalidNodeId(233)));
        let id = NodeId::try_from(12u16).unwrap();
        assert_eq!(id.as_classic().map(|c| c.get()), Some(12));
        assert_eq!(id.as_long_range(), None);
    }

    #[test]
    fn test_classic_index_round_trip() {
        let id = ClassicNodeId::new(9).unwrap();
        assert_eq!(id.index(), 8);
        assert_eq!(ClassicNodeId::from_index(8), Some(id));
        assert_eq!(ClassicNodeId::from_index(232), None);
        assert_eq!(ClassicNodeId::all().count(), 232);
    }

    #[test]
    fn test_long_range_from_index() {
        let id = LongRangeNodeId::from_index(50).unwrap();
        assert_eq!(id.get(), 306);
        assert_eq!(id.index(), 50);
        assert_eq!(LongRangeNodeId::from_index(1024), None);
    }
}

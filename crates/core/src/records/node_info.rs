//! NodeInfo record layouts
//!
//! Classic nodes persist a 35-byte slot (info block, neighbour mask, SUC
//! update index), four slots per file. Long Range nodes persist a 3-byte
//! packed record, fifty per file. The in-memory [`NodeInfo`] shape is shared
//! by both; the Long Range codec expands and compresses the flag bytes.

use crate::node::ClassicNodeMask;
use bitflags::bitflags;

/// SUC update index meaning "controller has never been updated"
pub const SUC_UNKNOWN_CONTROLLER: u8 = 0xFE;

bitflags! {
    /// NodeInfo capability byte
    ///
    /// Bits 0..=2 carry the protocol version, bits 3..=5 the baud rate field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capability: u8 {
        /// 40 kbit/s support (inside the baud rate field)
        const BAUD_40000 = 0x10;
        /// Node can route frames
        const ROUTING = 0x40;
        /// Node is always listening
        const LISTENING = 0x80;

        const _ = !0;
    }
}

impl Capability {
    /// Protocol version field mask
    pub const VERSION_MASK: u8 = 0x07;

    /// Baud rate field mask
    pub const BAUD_MASK: u8 = 0x38;

    /// Protocol version 4 (synthesised for Long Range nodes)
    pub const VERSION_4: u8 = 0x03;

    /// Protocol version field
    pub fn version(self) -> u8 {
        self.bits() & Self::VERSION_MASK
    }
}

bitflags! {
    /// NodeInfo security byte
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Security: u8 {
        /// Security support
        const SECURITY = 0x01;
        /// Node is a controller
        const CONTROLLER = 0x02;
        /// Specific device type is valid
        const SPECIFIC_DEVICE = 0x04;
        /// Routing slave
        const SLAVE_ROUTING = 0x08;
        /// Beam capability
        const BEAM = 0x10;
        /// Sensor mode, 1000 ms wake up beam
        const SENSOR_1000MS = 0x20;
        /// Sensor mode, 250 ms wake up beam
        const SENSOR_250MS = 0x40;
        /// Optional functionality
        const OPTIONAL = 0x80;

        const _ = !0;
    }
}

impl Security {
    /// Sensor mode field mask
    pub const SENSOR_MASK: u8 = 0x60;

    /// True if either sensor mode bit is set
    pub fn is_sensor(self) -> bool {
        self.bits() & Self::SENSOR_MASK != 0
    }
}

bitflags! {
    /// NodeInfo reserved byte (extended speed bits)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Reserved: u8 {
        /// 100 kbit/s support
        const BAUD_100K = 0x01;
        /// Long Range 100 kbit/s support
        const BAUD_100K_LR = 0x02;

        const _ = !0;
    }
}

/// Node description shared by classic and Long Range nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeInfo {
    pub capability: Capability,
    pub security: Security,
    pub reserved: Reserved,
    /// Generic device class
    pub generic: u8,
    /// Specific device class
    pub specific: u8,
}

impl NodeInfo {
    /// Size of the info block in bytes
    pub const SIZE: usize = 5;

    /// All-zero record, returned for nodes that do not exist
    pub const fn empty() -> Self {
        Self {
            capability: Capability::empty(),
            security: Security::empty(),
            reserved: Reserved::empty(),
            generic: 0,
            specific: 0,
        }
    }

    /// Serialize to the persisted byte layout
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        [
            self.capability.bits(),
            self.security.bits(),
            self.reserved.bits(),
            self.generic,
            self.specific,
        ]
    }

    /// Deserialize from the persisted byte layout
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }

        Some(Self {
            capability: Capability::from_bits_retain(buf[0]),
            security: Security::from_bits_retain(buf[1]),
            reserved: Reserved::from_bits_retain(buf[2]),
            generic: buf[3],
            specific: buf[4],
        })
    }

    pub fn is_listening(&self) -> bool {
        self.capability.contains(Capability::LISTENING)
    }

    pub fn is_routing(&self) -> bool {
        self.capability.contains(Capability::ROUTING)
    }

    pub fn is_controller(&self) -> bool {
        self.security.contains(Security::CONTROLLER)
    }

    pub fn is_sensor(&self) -> bool {
        self.security.is_sensor()
    }

    pub fn supports_40k(&self) -> bool {
        self.capability.contains(Capability::BAUD_40000)
    }

    pub fn supports_100k(&self) -> bool {
        self.reserved.contains(Reserved::BAUD_100K)
    }
}

impl Default for NodeInfo {
    fn default() -> Self {
        Self::empty()
    }
}

/// One classic node slot inside a NodeInfo group file
///
/// Layout (35 bytes):
///
/// | Offset | Size | Field              |
/// |--------|------|--------------------|
/// | 0      | 5    | [`NodeInfo`]       |
/// | 5      | 29   | neighbour mask     |
/// | 34     | 1    | SUC update index   |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeInfoSlot {
    pub info: NodeInfo,
    /// Routing info: which classic nodes this node can hear
    pub neighbours: ClassicNodeMask,
    /// Last SUC update index sent to this controller
    pub suc_update_index: u8,
}

impl NodeInfoSlot {
    /// Size of one slot in bytes
    pub const SIZE: usize = 35;

    /// Offset of the info block
    pub const INFO_OFFSET: usize = 0;

    /// Offset of the neighbour mask
    pub const NEIGHBOURS_OFFSET: usize = NodeInfo::SIZE;

    /// Offset of the SUC update index
    pub const SUC_UPDATE_INDEX_OFFSET: usize = Self::NEIGHBOURS_OFFSET + ClassicNodeMask::SIZE;

    /// Slot written for a node that is stored for the first time
    pub fn fresh() -> Self {
        Self {
            info: NodeInfo::empty(),
            neighbours: ClassicNodeMask::new(),
            suc_update_index: SUC_UNKNOWN_CONTROLLER,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[Self::INFO_OFFSET..Self::NEIGHBOURS_OFFSET].copy_from_slice(&self.info.to_bytes());
        buf[Self::NEIGHBOURS_OFFSET..Self::SUC_UPDATE_INDEX_OFFSET]
            .copy_from_slice(self.neighbours.as_bytes());
        buf[Self::SUC_UPDATE_INDEX_OFFSET] = self.suc_update_index;
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }

        Some(Self {
            info: NodeInfo::from_bytes(&buf[Self::INFO_OFFSET..Self::NEIGHBOURS_OFFSET])?,
            neighbours: ClassicNodeMask::from_bytes(
                &buf[Self::NEIGHBOURS_OFFSET..Self::SUC_UPDATE_INDEX_OFFSET],
            ),
            suc_update_index: buf[Self::SUC_UPDATE_INDEX_OFFSET],
        })
    }
}

bitflags! {
    /// Packed flag byte of a Long Range NodeInfo record
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LongRangeFlags: u8 {
        const ROUTING = 0x01;
        const LISTENING = 0x02;
        const SPECIFIC_DEVICE = 0x04;
        const BEAM = 0x08;
        const OPTIONAL = 0x10;
        const SENSOR_1000MS = 0x20;
        const SENSOR_250MS = 0x40;
    }
}

/// Long Range NodeInfo record (3 bytes)
///
/// Not binary compatible with [`NodeInfo`]. Convert with
/// [`LongRangeNodeInfo::from_node_info`] and [`LongRangeNodeInfo::to_node_info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongRangeNodeInfo {
    pub flags: LongRangeFlags,
    pub generic: u8,
    pub specific: u8,
}

impl LongRangeNodeInfo {
    /// Size of one record in bytes
    pub const SIZE: usize = 3;

    /// Compress a classic-shaped record
    ///
    /// Only the fields a Long Range node can carry survive: routing,
    /// listening, specific device, beam, optional and sensor mode.
    pub fn from_node_info(info: &NodeInfo) -> Self {
        let mut flags = LongRangeFlags::empty();
        flags.set(
            LongRangeFlags::ROUTING,
            info.capability.contains(Capability::ROUTING),
        );
        flags.set(
            LongRangeFlags::LISTENING,
            info.capability.contains(Capability::LISTENING),
        );
        flags.set(
            LongRangeFlags::SPECIFIC_DEVICE,
            info.security.contains(Security::SPECIFIC_DEVICE),
        );
        flags.set(LongRangeFlags::BEAM, info.security.contains(Security::BEAM));
        flags.set(
            LongRangeFlags::OPTIONAL,
            info.security.contains(Security::OPTIONAL),
        );
        flags |= LongRangeFlags::from_bits_truncate(info.security.bits() & Security::SENSOR_MASK);

        Self {
            flags,
            generic: info.generic,
            specific: info.specific,
        }
    }

    /// Expand into the classic-shaped record
    ///
    /// The protocol version is fixed at 4, security support is always
    /// asserted (mandatory for Long Range) and the reserved byte always
    /// advertises Long Range 100 kbit/s.
    pub fn to_node_info(&self) -> NodeInfo {
        let mut capability = Capability::from_bits_retain(Capability::VERSION_4);
        capability.set(
            Capability::ROUTING,
            self.flags.contains(LongRangeFlags::ROUTING),
        );
        capability.set(
            Capability::LISTENING,
            self.flags.contains(LongRangeFlags::LISTENING),
        );

        let mut security = Security::SECURITY;
        security.set(
            Security::SPECIFIC_DEVICE,
            self.flags.contains(LongRangeFlags::SPECIFIC_DEVICE),
        );
        security.set(Security::BEAM, self.flags.contains(LongRangeFlags::BEAM));
        security.set(
            Security::OPTIONAL,
            self.flags.contains(LongRangeFlags::OPTIONAL),
        );
        security |= Security::from_bits_retain(self.flags.bits() & Security::SENSOR_MASK);

        NodeInfo {
            capability,
            security,
            reserved: Reserved::BAUD_100K_LR,
            generic: self.generic,
            specific: self.specific,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        [self.flags.bits(), self.generic, self.specific]
    }

    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }

        Some(Self {
            flags: LongRangeFlags::from_bits_truncate(buf[0]),
            generic: buf[1],
            specific: buf[2],
        })
    }
}

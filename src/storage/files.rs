//! Object keys, file sizes and group layouts
//!
//! The key space and every size here are part of the on-flash format.
//!
//! | Key range         | Contents                                   |
//! |-------------------|--------------------------------------------|
//! | 0x0000            | storage version                            |
//! | 0x0002            | preferred repeaters mask                   |
//! | 0x0003            | legacy SUC update list (migrated away)     |
//! | 0x0004            | ControllerInfo                             |
//! | 0x0005..=0x000C   | existence and per-node flag masks          |
//! | 0x0200..=0x07FF   | classic NodeInfo groups (4 nodes per file) |
//! | 0x0800..=0x13FF   | Long Range NodeInfo groups (50 per file)   |
//! | 0x1400..=0x1FFF   | route cache groups (8 nodes per file)      |
//! | 0x4000..=0x407F   | SUC update entries (8 per file)            |

use super::caretaker::{FileDescriptor, MAX_FILE_SET};
use crate::platform::ObjectKey;
use zwave_nvm_core::node::{
    ClassicNodeId, LongRangeNodeId, CLASSIC_MASK_BYTES, LONG_RANGE_MASK_BYTES, MAX_CLASSIC_NODES,
    MAX_LONG_RANGE_NODES,
};
use zwave_nvm_core::records::{
    ControllerInfo, LongRangeNodeInfo, NodeInfoSlot, NodeRouteCache, SchemaVersion,
    SucUpdateEntry, SUC_MAX_UPDATES,
};

pub const FILE_ID_ZW_VERSION: ObjectKey = 0x0000;
pub const FILE_ID_PREFERRED_REPEATERS: ObjectKey = 0x0002;
pub const FILE_ID_SUCNODELIST_LEGACY: ObjectKey = 0x0003;
pub const FILE_ID_CONTROLLERINFO: ObjectKey = 0x0004;
pub const FILE_ID_NODE_STORAGE_EXIST: ObjectKey = 0x0005;
pub const FILE_ID_APP_ROUTE_LOCK_FLAG: ObjectKey = 0x0006;
pub const FILE_ID_ROUTE_SLAVE_SUC_FLAG: ObjectKey = 0x0007;
pub const FILE_ID_SUC_PENDING_UPDATE_FLAG: ObjectKey = 0x0008;
pub const FILE_ID_BRIDGE_NODE_FLAG: ObjectKey = 0x0009;
pub const FILE_ID_PENDING_DISCOVERY_FLAG: ObjectKey = 0x000A;
pub const FILE_ID_NODE_ROUTECACHE_EXIST: ObjectKey = 0x000B;
pub const FILE_ID_LRANGE_NODE_EXIST: ObjectKey = 0x000C;

/// Deprecated S2 objects, never used by controllers
pub const FILE_ID_S2_DEPRECATED: [ObjectKey; 4] = [0x0010, 0x0011, 0x0012, 0x0013];

pub const FILE_ID_NODEINFO_BASE: ObjectKey = 0x0200;
pub const FILE_ID_NODEINFO_LAST: ObjectKey = FILE_ID_NODEINFO_LR_BASE - 1;
pub const FILE_ID_NODEINFO_LR_BASE: ObjectKey = 0x0800;
pub const FILE_ID_NODEINFO_LR_LAST: ObjectKey = FILE_ID_NODEROUTE_CACHE_BASE - 1;
pub const FILE_ID_NODEROUTE_CACHE_BASE: ObjectKey = 0x1400;
pub const FILE_ID_NODEROUTE_CACHE_LAST: ObjectKey = 0x1FFF;
pub const FILE_ID_SUCNODELIST_BASE: ObjectKey = 0x4000;

/// Per-node NodeInfo objects of file system version 0 (`base + index`)
pub const FILE_ID_NODEINFO_LEGACY_BASE: ObjectKey = 0x0100;
/// Per-node route cache objects of file system version 0 (`base + index`)
pub const FILE_ID_NODEROUTE_CACHE_LEGACY_BASE: ObjectKey = 0x0400;

/// Long Range TX power objects of file system version 2 and 3
pub const FILE_ID_LR_TX_POWER_BASE_V2: ObjectKey = 0x0014;
pub const FILE_ID_LR_TX_POWER_COUNT_V2: u32 = 1024 / 64;
pub const FILE_ID_LR_TX_POWER_BASE_V3: ObjectKey = 0x2000;
pub const FILE_ID_LR_TX_POWER_COUNT_V3: u32 = 1024 / 32;

pub const NODEINFOS_PER_FILE: usize = 4;
pub const NODEINFO_LR_PER_FILE: usize = 50;
pub const NODEROUTECACHES_PER_FILE: usize = 8;
pub const SUCNODES_PER_FILE: usize = 8;

/// Route cache groups resident in RAM
pub const ROUTE_CACHE_FILES_IN_RAM: usize = 4;

pub const FILE_SIZE_ZW_VERSION: usize = SchemaVersion::SIZE;
pub const FILE_SIZE_NODE_MASK: usize = CLASSIC_MASK_BYTES;
pub const FILE_SIZE_LR_NODE_MASK: usize = LONG_RANGE_MASK_BYTES;
pub const FILE_SIZE_CONTROLLERINFO: usize = ControllerInfo::SIZE;
pub const FILE_SIZE_NODEINFO: usize = NodeInfoSlot::SIZE * NODEINFOS_PER_FILE;
pub const FILE_SIZE_NODEINFO_LR: usize = LongRangeNodeInfo::SIZE * NODEINFO_LR_PER_FILE;
pub const FILE_SIZE_NODEROUTE_CACHE: usize = NodeRouteCache::SIZE * NODEROUTECACHES_PER_FILE;
pub const FILE_SIZE_SUCNODELIST: usize = SucUpdateEntry::SIZE * SUCNODES_PER_FILE;
pub const FILE_SIZE_SUCNODELIST_LEGACY: usize = SucUpdateEntry::SIZE * SUC_MAX_UPDATES;

/// Node records packed into a run of consecutive object keys
///
/// Record `index` (zero based) lives in object `base + index / per_file` at
/// byte offset `(index % per_file) * record_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupLayout {
    pub base: ObjectKey,
    pub per_file: usize,
    pub record_size: usize,
    /// Number of records in the whole range
    pub records: usize,
}

impl GroupLayout {
    /// Size of one group file
    pub const fn file_size(&self) -> usize {
        self.per_file * self.record_size
    }

    /// Number of group files covering every record
    pub const fn file_count(&self) -> usize {
        self.records.div_ceil(self.per_file)
    }

    pub const fn group(&self, index: usize) -> usize {
        index / self.per_file
    }

    pub const fn key(&self, index: usize) -> ObjectKey {
        self.group_key(self.group(index))
    }

    pub const fn group_key(&self, group: usize) -> ObjectKey {
        self.base + group as ObjectKey
    }

    /// Byte offset of a record inside its group file
    pub const fn offset(&self, index: usize) -> usize {
        (index % self.per_file) * self.record_size
    }

    /// Index range of the records sharing a group
    pub fn siblings(&self, group: usize) -> core::ops::Range<usize> {
        let first = group * self.per_file;
        first..(first + self.per_file).min(self.records)
    }
}

/// Classic NodeInfo slots
pub const NODEINFO_LAYOUT: GroupLayout = GroupLayout {
    base: FILE_ID_NODEINFO_BASE,
    per_file: NODEINFOS_PER_FILE,
    record_size: NodeInfoSlot::SIZE,
    records: MAX_CLASSIC_NODES as usize,
};

/// Long Range NodeInfo records
pub const NODEINFO_LR_LAYOUT: GroupLayout = GroupLayout {
    base: FILE_ID_NODEINFO_LR_BASE,
    per_file: NODEINFO_LR_PER_FILE,
    record_size: LongRangeNodeInfo::SIZE,
    records: MAX_LONG_RANGE_NODES as usize,
};

/// Route cache entries
pub const ROUTE_CACHE_LAYOUT: GroupLayout = GroupLayout {
    base: FILE_ID_NODEROUTE_CACHE_BASE,
    per_file: NODEROUTECACHES_PER_FILE,
    record_size: NodeRouteCache::SIZE,
    records: MAX_CLASSIC_NODES as usize,
};

/// SUC update entries
pub const SUC_LAYOUT: GroupLayout = GroupLayout {
    base: FILE_ID_SUCNODELIST_BASE,
    per_file: SUCNODES_PER_FILE,
    record_size: SucUpdateEntry::SIZE,
    records: SUC_MAX_UPDATES,
};

impl GroupLayout {
    /// Key and offset of a classic node record
    pub const fn locate_classic(&self, id: ClassicNodeId) -> (ObjectKey, usize) {
        (self.key(id.index()), self.offset(id.index()))
    }

    /// Key and offset of a Long Range node record
    pub const fn locate_long_range(&self, id: LongRangeNodeId) -> (ObjectKey, usize) {
        (self.key(id.index()), self.offset(id.index()))
    }
}

/// Per-node flag masks, one object each
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NodeFlag {
    /// Application locked the node's return route
    AppRouteLock,
    /// Routing slave needs no static route update from the SUC
    RoutingSlaveSucUpdate,
    /// Node is in the SUC pending update table
    SucPendingUpdate,
    /// Node is a virtual bridge node
    Bridge,
    /// Node has a pending neighbour discovery
    PendingDiscovery,
}

impl NodeFlag {
    pub const COUNT: usize = 5;

    pub const ALL: [NodeFlag; Self::COUNT] = [
        NodeFlag::AppRouteLock,
        NodeFlag::RoutingSlaveSucUpdate,
        NodeFlag::SucPendingUpdate,
        NodeFlag::Bridge,
        NodeFlag::PendingDiscovery,
    ];

    /// Object holding the flag mask
    pub const fn key(self) -> ObjectKey {
        match self {
            NodeFlag::AppRouteLock => FILE_ID_APP_ROUTE_LOCK_FLAG,
            NodeFlag::RoutingSlaveSucUpdate => FILE_ID_ROUTE_SLAVE_SUC_FLAG,
            NodeFlag::SucPendingUpdate => FILE_ID_SUC_PENDING_UPDATE_FLAG,
            NodeFlag::Bridge => FILE_ID_BRIDGE_NODE_FLAG,
            NodeFlag::PendingDiscovery => FILE_ID_PENDING_DISCOVERY_FLAG,
        }
    }

    /// Position in [`NodeFlag::ALL`]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Files verified by the caretaker on every boot
///
/// The version object is owned by migration and is not part of the set.
pub const CONTROLLER_FILE_SET: [FileDescriptor; 10] = [
    FileDescriptor::new(FILE_ID_PREFERRED_REPEATERS, FILE_SIZE_NODE_MASK),
    FileDescriptor::new(FILE_ID_CONTROLLERINFO, FILE_SIZE_CONTROLLERINFO),
    FileDescriptor::new(FILE_ID_NODE_STORAGE_EXIST, FILE_SIZE_NODE_MASK),
    FileDescriptor::new(FILE_ID_NODE_ROUTECACHE_EXIST, FILE_SIZE_NODE_MASK),
    FileDescriptor::new(FILE_ID_LRANGE_NODE_EXIST, FILE_SIZE_LR_NODE_MASK),
    FileDescriptor::new(FILE_ID_APP_ROUTE_LOCK_FLAG, FILE_SIZE_NODE_MASK),
    FileDescriptor::new(FILE_ID_ROUTE_SLAVE_SUC_FLAG, FILE_SIZE_NODE_MASK),
    FileDescriptor::new(FILE_ID_SUC_PENDING_UPDATE_FLAG, FILE_SIZE_NODE_MASK),
    FileDescriptor::new(FILE_ID_BRIDGE_NODE_FLAG, FILE_SIZE_NODE_MASK),
    FileDescriptor::new(FILE_ID_PENDING_DISCOVERY_FLAG, FILE_SIZE_NODE_MASK),
];

const _: () = assert!(CONTROLLER_FILE_SET.len() <= MAX_FILE_SET);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_sizes() {
        assert_eq!(FILE_SIZE_NODEINFO, 140);
        assert_eq!(FILE_SIZE_NODEINFO_LR, 150);
        assert_eq!(FILE_SIZE_NODEROUTE_CACHE, 80);
        assert_eq!(FILE_SIZE_SUCNODELIST, 176);
        assert_eq!(FILE_SIZE_SUCNODELIST_LEGACY, 1408);
        assert_eq!(FILE_SIZE_CONTROLLERINFO, 22);
    }

    #[test]
    fn test_classic_layout_mapping() {
        let id = ClassicNodeId::new(1).unwrap();
        assert_eq!(NODEINFO_LAYOUT.locate_classic(id), (0x200, 0));

        let id = ClassicNodeId::new(7).unwrap();
        assert_eq!(NODEINFO_LAYOUT.locate_classic(id), (0x201, 70));

        let id = ClassicNodeId::new(232).unwrap();
        assert_eq!(NODEINFO_LAYOUT.locate_classic(id), (0x239, 105));
        assert!(NODEINFO_LAYOUT.key(231) <= FILE_ID_NODEINFO_LAST);
        assert_eq!(NODEINFO_LAYOUT.file_count(), 58);
    }

    #[test]
    fn test_long_range_layout_mapping() {
        let id = LongRangeNodeId::new(256).unwrap();
        assert_eq!(NODEINFO_LR_LAYOUT.locate_long_range(id), (0x800, 0));

        let id = LongRangeNodeId::new(306).unwrap();
        assert_eq!(NODEINFO_LR_LAYOUT.locate_long_range(id), (0x801, 0));

        let id = LongRangeNodeId::new(1279).unwrap();
        assert_eq!(NODEINFO_LR_LAYOUT.locate_long_range(id), (0x814, 69));
        assert!(NODEINFO_LR_LAYOUT.key(1023) <= FILE_ID_NODEINFO_LR_LAST);
    }

    #[test]
    fn test_route_cache_layout_mapping() {
        assert_eq!(ROUTE_CACHE_LAYOUT.file_count(), 29);
        assert_eq!(ROUTE_CACHE_LAYOUT.key(2), 0x1400);
        assert_eq!(ROUTE_CACHE_LAYOUT.offset(2), 20);
        assert_eq!(ROUTE_CACHE_LAYOUT.siblings(28), 224..232);
    }

    #[test]
    fn test_suc_layout_mapping() {
        assert_eq!(SUC_LAYOUT.key(0), 0x4000);
        assert_eq!(SUC_LAYOUT.key(63), 0x4007);
        assert_eq!(SUC_LAYOUT.offset(9), 22);
    }

    #[test]
    fn test_file_set_leaves_version_to_migration() {
        assert!(CONTROLLER_FILE_SET.iter().all(|d| d.key != FILE_ID_ZW_VERSION));
        assert!(CONTROLLER_FILE_SET.len() <= MAX_FILE_SET);
    }

    #[test]
    fn test_flag_keys_are_distinct() {
        for (i, a) in NodeFlag::ALL.iter().enumerate() {
            assert_eq!(a.index(), i);
            for b in NodeFlag::ALL.iter().skip(i + 1) {
                assert_ne!(a.key(), b.key());
            }
        }
    }
}

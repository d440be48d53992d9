//! SUC update entry layout
//!
//! The Static Update Controller keeps a ring of the last 64 topology changes.
//! Each entry is 22 bytes: node id, change type and up to 20 command classes.

/// Number of SUC update entries
pub const SUC_MAX_UPDATES: usize = 64;

/// Command class bytes carried per entry
pub const SUC_UPDATE_NODEPARM_MAX: usize = 20;

/// Byte value of an erased (never written) entry
pub const SUC_ERASED_BYTE: u8 = 0xFF;

/// One SUC update entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SucUpdateEntry {
    /// Classic node id, 8-bit on flash
    pub node_id: u8,
    pub change_type: u8,
    /// Command class list
    pub node_info: [u8; SUC_UPDATE_NODEPARM_MAX],
}

impl SucUpdateEntry {
    /// Size of one entry in bytes
    pub const SIZE: usize = 2 + SUC_UPDATE_NODEPARM_MAX;

    /// Entry as it reads from a freshly created file
    pub const fn erased() -> Self {
        Self {
            node_id: SUC_ERASED_BYTE,
            change_type: SUC_ERASED_BYTE,
            node_info: [SUC_ERASED_BYTE; SUC_UPDATE_NODEPARM_MAX],
        }
    }

    /// Legacy entries with node id 0 carry no data
    pub fn has_data(&self) -> bool {
        self.node_id != 0
    }

    /// Node id as exposed to callers, erased ids read back as 0
    pub fn visible_node_id(&self) -> u8 {
        if self.node_id == SUC_ERASED_BYTE {
            0
        } else {
            self.node_id
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = self.node_id;
        buf[1] = self.change_type;
        buf[2..].copy_from_slice(&self.node_info);
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }

        let mut node_info = [0u8; SUC_UPDATE_NODEPARM_MAX];
        node_info.copy_from_slice(&buf[2..Self::SIZE]);
        Some(Self {
            node_id: buf[0],
            change_type: buf[1],
            node_info,
        })
    }
}

impl Default for SucUpdateEntry {
    fn default() -> Self {
        Self::erased()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_layout() {
        let mut entry = SucUpdateEntry::erased();
        entry.node_id = 12;
        entry.change_type = 0x03;
        entry.node_info[0] = 0x25;
        entry.node_info[19] = 0x86;

        let bytes = entry.to_bytes();
        assert_eq!(bytes.len(), 22);
        assert_eq!(bytes[0], 12);
        assert_eq!(bytes[1], 0x03);
        assert_eq!(bytes[2], 0x25);
        assert_eq!(bytes[21], 0x86);
        assert_eq!(SucUpdateEntry::from_bytes(&bytes), Some(entry));
    }

    #[test]
    fn test_erased_node_id_reads_as_zero() {
        let entry = SucUpdateEntry::erased();
        assert_eq!(entry.visible_node_id(), 0);
        assert!(entry.has_data());

        let mut empty = entry;
        empty.node_id = 0;
        assert!(!empty.has_data());
    }
}

//! ControllerInfo singleton layouts
//!
//! Current layout (22 bytes, little-endian):
//!
//! | Offset | Size | Field                     |
//! |--------|------|---------------------------|
//! | 0      | 4    | home id                   |
//! | 4      | 2    | node id                   |
//! | 6      | 2    | static controller node id |
//! | 8      | 2    | last used LR node id      |
//! | 10     | 1    | last used node id         |
//! | 11     | 1    | SUC last index            |
//! | 12     | 2    | max LR node id            |
//! | 14     | 1    | max node id               |
//! | 15     | 1    | controller configuration  |
//! | 16     | 2    | reserved LR node id       |
//! | 18     | 1    | reserved node id          |
//! | 19     | 1    | system state              |
//! | 20     | 1    | primary LR channel        |
//! | 21     | 1    | LR channel auto mode      |
//!
//! The 13-byte legacy layout predates Long Range and 16-bit node ids.

use crate::node::LONG_RANGE_BASE;
use bitflags::bitflags;

/// Length of a home id
pub const HOME_ID_LENGTH: usize = 4;

bitflags! {
    /// Controller configuration byte
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControllerConfig: u8 {
        const IS_SECONDARY = 0x01;
        const ON_OTHER_NETWORK = 0x02;
        const NODE_ID_SERVER_PRESENT = 0x04;
        const IS_REAL_PRIMARY = 0x08;
        const IS_SUC = 0x10;
        const NO_NODES_INCLUDED = 0x20;

        const _ = !0;
    }
}

/// Controller-wide network state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerInfo {
    pub home_id: [u8; HOME_ID_LENGTH],
    pub node_id: u16,
    pub static_controller_node_id: u16,
    pub last_used_node_id_lr: u16,
    pub last_used_node_id: u8,
    pub suc_last_index: u8,
    pub max_node_id_lr: u16,
    pub max_node_id: u8,
    pub configuration: ControllerConfig,
    pub reserved_id_lr: u16,
    pub reserved_id: u8,
    /// Smart Start system state
    pub system_state: u8,
    pub primary_lr_channel: u8,
    /// Non-zero enables automatic LR channel selection
    pub lr_channel_auto_mode: u8,
}

impl ControllerInfo {
    /// Size of the record in bytes
    pub const SIZE: usize = 22;

    /// Contents written when the record is created
    pub const fn default_contents() -> Self {
        Self {
            home_id: [0; HOME_ID_LENGTH],
            node_id: 1,
            static_controller_node_id: 0,
            last_used_node_id_lr: LONG_RANGE_BASE - 1,
            last_used_node_id: 1,
            suc_last_index: 0xFF,
            max_node_id_lr: 0,
            max_node_id: 1,
            configuration: ControllerConfig::from_bits_retain(
                ControllerConfig::NO_NODES_INCLUDED.bits() | ControllerConfig::IS_REAL_PRIMARY.bits(),
            ),
            reserved_id_lr: 0,
            reserved_id: 0,
            system_state: 0,
            primary_lr_channel: 0,
            lr_channel_auto_mode: 0,
        }
    }

    /// Serialize to bytes (little-endian)
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.home_id);
        buf[4..6].copy_from_slice(&self.node_id.to_le_bytes());
        buf[6..8].copy_from_slice(&self.static_controller_node_id.to_le_bytes());
        buf[8..10].copy_from_slice(&self.last_used_node_id_lr.to_le_bytes());
        buf[10] = self.last_used_node_id;
        buf[11] = self.suc_last_index;
        buf[12..14].copy_from_slice(&self.max_node_id_lr.to_le_bytes());
        buf[14] = self.max_node_id;
        buf[15] = self.configuration.bits();
        buf[16..18].copy_from_slice(&self.reserved_id_lr.to_le_bytes());
        buf[18] = self.reserved_id;
        buf[19] = self.system_state;
        buf[20] = self.primary_lr_channel;
        buf[21] = self.lr_channel_auto_mode;
        buf
    }

    /// Deserialize from bytes (little-endian)
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }

        Some(Self {
            home_id: [buf[0], buf[1], buf[2], buf[3]],
            node_id: u16::from_le_bytes([buf[4], buf[5]]),
            static_controller_node_id: u16::from_le_bytes([buf[6], buf[7]]),
            last_used_node_id_lr: u16::from_le_bytes([buf[8], buf[9]]),
            last_used_node_id: buf[10],
            suc_last_index: buf[11],
            max_node_id_lr: u16::from_le_bytes([buf[12], buf[13]]),
            max_node_id: buf[14],
            configuration: ControllerConfig::from_bits_retain(buf[15]),
            reserved_id_lr: u16::from_le_bytes([buf[16], buf[17]]),
            reserved_id: buf[18],
            system_state: buf[19],
            primary_lr_channel: buf[20],
            lr_channel_auto_mode: buf[21],
        })
    }

    /// Widen a legacy record
    ///
    /// Fields the legacy layout carries are copied. Long Range fields get
    /// their "nothing assigned yet" values. The auto mode byte has no
    /// counterpart and keeps the erased value 0xFF.
    pub fn from_legacy(legacy: &LegacyControllerInfo) -> Self {
        Self {
            home_id: legacy.home_id,
            node_id: legacy.node_id as u16,
            static_controller_node_id: legacy.static_controller_node_id as u16,
            last_used_node_id_lr: LONG_RANGE_BASE - 1,
            last_used_node_id: legacy.last_used_node_id,
            suc_last_index: legacy.suc_last_index,
            max_node_id_lr: 0,
            max_node_id: legacy.max_node_id,
            configuration: ControllerConfig::from_bits_retain(legacy.configuration),
            reserved_id_lr: 0,
            reserved_id: legacy.reserved_id,
            system_state: legacy.system_state,
            primary_lr_channel: 0,
            lr_channel_auto_mode: 0xFF,
        }
    }
}

impl Default for ControllerInfo {
    fn default() -> Self {
        Self::default_contents()
    }
}

/// Pre-Long-Range ControllerInfo (13 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyControllerInfo {
    pub home_id: [u8; HOME_ID_LENGTH],
    pub node_id: u8,
    pub last_used_node_id: u8,
    pub static_controller_node_id: u8,
    pub suc_last_index: u8,
    pub configuration: u8,
    pub suc_awareness_push_needed: u8,
    pub max_node_id: u8,
    pub reserved_id: u8,
    pub system_state: u8,
}

impl LegacyControllerInfo {
    /// Size of the legacy record in bytes
    pub const SIZE: usize = 13;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.home_id);
        buf[4] = self.node_id;
        buf[5] = self.last_used_node_id;
        buf[6] = self.static_controller_node_id;
        buf[7] = self.suc_last_index;
        buf[8] = self.configuration;
        buf[9] = self.suc_awareness_push_needed;
        buf[10] = self.max_node_id;
        buf[11] = self.reserved_id;
        buf[12] = self.system_state;
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }

        Some(Self {
            home_id: [buf[0], buf[1], buf[2], buf[3]],
            node_id: buf[4],
            last_used_node_id: buf[5],
            static_controller_node_id: buf[6],
            suc_last_index: buf[7],
            configuration: buf[8],
            suc_awareness_push_needed: buf[9],
            max_node_id: buf[10],
            reserved_id: buf[11],
            system_state: buf[12],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_contents() {
        let info = ControllerInfo::default_contents();
        let bytes = info.to_bytes();
        assert_eq!(&bytes[0..4], &[0, 0, 0, 0]);
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), 1);
        assert_eq!(u16::from_le_bytes([bytes[8], bytes[9]]), 255);
        assert_eq!(bytes[10], 1);
        assert_eq!(bytes[11], 0xFF);
        assert_eq!(bytes[14], 1);
        assert_eq!(bytes[15], 0x28);
        assert_eq!(&bytes[16..22], &[0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_field_offsets() {
        let info = ControllerInfo {
            home_id: [0xDE, 0xAD, 0xBE, 0xEF],
            node_id: 0x0102,
            static_controller_node_id: 0x0304,
            last_used_node_id_lr: 0x0506,
            last_used_node_id: 0x07,
            suc_last_index: 0x08,
            max_node_id_lr: 0x090A,
            max_node_id: 0x0B,
            configuration: ControllerConfig::IS_SUC,
            reserved_id_lr: 0x0C0D,
            reserved_id: 0x0E,
            system_state: 0x0F,
            primary_lr_channel: 0x02,
            lr_channel_auto_mode: 1,
        };
        let bytes = info.to_bytes();
        assert_eq!(
            bytes,
            [
                0xDE, 0xAD, 0xBE, 0xEF, 0x02, 0x01, 0x04, 0x03, 0x06, 0x05, 0x07, 0x08, 0x0A,
                0x09, 0x0B, 0x10, 0x0D, 0x0C, 0x0E, 0x0F, 0x02, 0x01
            ]
        );
        assert_eq!(ControllerInfo::from_bytes(&bytes), Some(info));
    }

    #[test]
    fn test_widen_legacy() {
        let legacy = LegacyControllerInfo {
            home_id: [1, 2, 3, 4],
            node_id: 1,
            last_used_node_id: 9,
            static_controller_node_id: 1,
            suc_last_index: 5,
            configuration: 0x18,
            suc_awareness_push_needed: 0,
            max_node_id: 9,
            reserved_id: 0,
            system_state: 2,
        };
        let legacy = LegacyControllerInfo::from_bytes(&legacy.to_bytes()).unwrap();
        let info = ControllerInfo::from_legacy(&legacy);

        assert_eq!(info.home_id, [1, 2, 3, 4]);
        assert_eq!(info.node_id, 1);
        assert_eq!(info.last_used_node_id, 9);
        assert_eq!(info.suc_last_index, 5);
        assert_eq!(info.configuration.bits(), 0x18);
        assert_eq!(info.system_state, 2);
        assert_eq!(info.last_used_node_id_lr, 255);
        assert_eq!(info.max_node_id_lr, 0);
        assert_eq!(info.reserved_id_lr, 0);
        assert_eq!(info.primary_lr_channel, 0);
        assert_eq!(info.to_bytes()[21], 0xFF);
    }
}

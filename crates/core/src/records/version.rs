//! Persisted storage version
//!
//! A single little-endian u32: the top byte is the file system (schema)
//! version, the lower three bytes the firmware major/minor/patch that last
//! wrote the layout.

/// Storage version record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaVersion(u32);

impl SchemaVersion {
    /// Size of the record in bytes
    pub const SIZE: usize = 4;

    pub const fn new(filesys: u8, major: u8, minor: u8, patch: u8) -> Self {
        Self(
            (filesys as u32) << 24 | (major as u32) << 16 | (minor as u32) << 8 | patch as u32,
        )
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// File system (schema) version
    pub const fn filesys(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn major(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn minor(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn patch(self) -> u8 {
        self.0 as u8
    }

    /// Same firmware version, different file system version
    pub const fn with_filesys(self, filesys: u8) -> Self {
        Self((self.0 & 0x00FF_FFFF) | (filesys as u32) << 24)
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        self.0.to_le_bytes()
    }

    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }

        Some(Self(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])))
    }
}

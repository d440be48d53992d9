//! Route cache record layouts
//!
//! Each classic node owns two cached route lines: the last working route
//! ("normal") and the next-to-last working / static route ("NLWR/SR").

/// Maximum repeaters in one route
pub const MAX_REPEATERS: usize = 4;

/// Which of a node's two route lines to access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteCacheKind {
    /// Last working route
    Normal,
    /// Next-to-last working route or application static route
    AltRoute,
}

/// One cached route: up to four repeaters plus a configuration byte
///
/// Unused repeater positions are zero. The configuration byte holds the
/// transmit speed used on the route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouteCacheLine {
    pub repeaters: [u8; MAX_REPEATERS],
    pub conf: u8,
}

impl RouteCacheLine {
    /// Size of a line in bytes
    pub const SIZE: usize = MAX_REPEATERS + 1;

    pub const fn new(repeaters: [u8; MAX_REPEATERS], conf: u8) -> Self {
        Self { repeaters, conf }
    }

    /// Direct route (no repeaters)
    pub fn is_direct(&self) -> bool {
        self.repeaters[0] == 0
    }

    /// Number of repeaters before the first empty position
    pub fn hop_count(&self) -> usize {
        self.repeaters.iter().take_while(|&&r| r != 0).count()
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[..MAX_REPEATERS].copy_from_slice(&self.repeaters);
        buf[MAX_REPEATERS] = self.conf;
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }

        let mut repeaters = [0u8; MAX_REPEATERS];
        repeaters.copy_from_slice(&buf[..MAX_REPEATERS]);
        Some(Self {
            repeaters,
            conf: buf[MAX_REPEATERS],
        })
    }
}

/// Both route lines of one node (10 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeRouteCache {
    pub normal: RouteCacheLine,
    pub alt_route: RouteCacheLine,
}

impl NodeRouteCache {
    /// Size of one node entry in bytes
    pub const SIZE: usize = 2 * RouteCacheLine::SIZE;

    /// Byte offset of a line inside the node entry
    pub const fn line_offset(kind: RouteCacheKind) -> usize {
        match kind {
            RouteCacheKind::Normal => 0,
            RouteCacheKind::AltRoute => RouteCacheLine::SIZE,
        }
    }

    pub fn line(&self, kind: RouteCacheKind) -> RouteCacheLine {
        match kind {
            RouteCacheKind::Normal => self.normal,
            RouteCacheKind::AltRoute => self.alt_route,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[..RouteCacheLine::SIZE].copy_from_slice(&self.normal.to_bytes());
        buf[RouteCacheLine::SIZE..].copy_from_slice(&self.alt_route.to_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }

        Some(Self {
            normal: RouteCacheLine::from_bytes(&buf[..RouteCacheLine::SIZE])?,
            alt_route: RouteCacheLine::from_bytes(&buf[RouteCacheLine::SIZE..])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_layout() {
        let line = RouteCacheLine::new([3, 7, 0, 0], 0x02);
        assert_eq!(line.to_bytes(), [3, 7, 0, 0, 0x02]);
        assert_eq!(line.hop_count(), 2);
        assert!(!line.is_direct());
        assert!(RouteCacheLine::default().is_direct());
    }

    #[test]
    fn test_node_entry_layout() {
        let entry = NodeRouteCache {
            normal: RouteCacheLine::new([1, 2, 3, 4], 0x01),
            alt_route: RouteCacheLine::new([9, 0, 0, 0], 0x03),
        };
        let bytes = entry.to_bytes();
        assert_eq!(bytes, [1, 2, 3, 4, 0x01, 9, 0, 0, 0, 0x03]);
        assert_eq!(NodeRouteCache::from_bytes(&bytes), Some(entry));
        assert_eq!(entry.line(RouteCacheKind::AltRoute).repeaters[0], 9);
    }

    #[test]
    fn test_line_offsets() {
        assert_eq!(NodeRouteCache::line_offset(RouteCacheKind::Normal), 0);
        assert_eq!(NodeRouteCache::line_offset(RouteCacheKind::AltRoute), 5);
        assert_eq!(NodeRouteCache::SIZE, 10);
    }

    #[test]
    fn test_short_buffer_rejected() {
        assert_eq!(RouteCacheLine::from_bytes(&[0u8; 4]), None);
        assert_eq!(NodeRouteCache::from_bytes(&[0u8; 9]), None);
    }
}

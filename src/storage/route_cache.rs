//! Route cache RAM buffer
//!
//! Route cache groups (8 nodes, 80 bytes) are kept in a small set of RAM
//! slots with most-recently-used ordering. Writes only touch RAM; a slot
//! reaches flash when it is evicted, or on an explicit flush.
//!
//! ```text
//! Empty ──load(group)──> Loaded(group) ──evict (flush if dirty)──> Empty
//! ```
//!
//! Losing power before a flush drops at most the unflushed changes of the
//! resident groups. Routes are rediscovered, so this is accepted.

use super::error::{Result, StorageError};
use super::files::{
    FILE_ID_NODE_ROUTECACHE_EXIST, FILE_SIZE_NODEROUTE_CACHE, ROUTE_CACHE_FILES_IN_RAM,
    ROUTE_CACHE_LAYOUT,
};
use super::grouped::{erase_object, group_in_use, read_group, write_object};
use crate::platform::NvmInterface;
use crate::{log_debug, log_trace, log_warn};
use zwave_nvm_core::node::{ClassicNodeId, ClassicNodeMask};
use zwave_nvm_core::records::{NodeRouteCache, RouteCacheKind, RouteCacheLine};

#[derive(Debug, Clone, Copy)]
struct CacheSlot {
    group: Option<usize>,
    dirty: bool,
    data: [u8; FILE_SIZE_NODEROUTE_CACHE],
}

impl CacheSlot {
    const EMPTY: Self = Self {
        group: None,
        dirty: false,
        data: [0; FILE_SIZE_NODEROUTE_CACHE],
    };

    fn release(&mut self) {
        *self = Self::EMPTY;
    }
}

/// RAM-resident route cache groups
///
/// Owns the route cache existence mask. Thread affinity: owning task only.
#[derive(Debug)]
pub struct RouteCacheBuffer {
    exists: ClassicNodeMask,
    slots: [CacheSlot; ROUTE_CACHE_FILES_IN_RAM],
    /// Slot indices, most recently used first
    prio: [Option<usize>; ROUTE_CACHE_FILES_IN_RAM],
}

impl Default for RouteCacheBuffer {
    fn default() -> Self {
        Self::new(ClassicNodeMask::new())
    }
}

impl RouteCacheBuffer {
    /// Empty buffer over a loaded existence mask
    pub fn new(exists: ClassicNodeMask) -> Self {
        Self {
            exists,
            slots: [CacheSlot::EMPTY; ROUTE_CACHE_FILES_IN_RAM],
            prio: [None; ROUTE_CACHE_FILES_IN_RAM],
        }
    }

    pub fn exists(&self, id: ClassicNodeId) -> bool {
        self.exists.contains_node(id)
    }

    pub fn exists_mask(&self) -> &ClassicNodeMask {
        &self.exists
    }

    /// Groups currently resident, most recently used first
    pub fn resident_groups(&self) -> impl Iterator<Item = usize> + '_ {
        self.prio.iter().flatten().filter_map(|&slot| self.slots[slot].group)
    }

    /// Load up to [`ROUTE_CACHE_FILES_IN_RAM`] groups that hold data
    ///
    /// Groups are loaded in ascending order so the lowest group ends up least
    /// recently used.
    pub fn preload<S: NvmInterface + ?Sized>(&mut self, store: &mut S) -> Result<()> {
        let mut loaded = 0;
        for group in 0..ROUTE_CACHE_LAYOUT.file_count() {
            if loaded == ROUTE_CACHE_FILES_IN_RAM {
                break;
            }
            if group_in_use(&ROUTE_CACHE_LAYOUT, &self.exists, group) {
                self.resolve(store, group)?;
                loaded += 1;
            }
        }
        log_debug!("Route cache: preloaded {} groups", loaded);
        Ok(())
    }

    /// Route line of `id`
    ///
    /// A node without a stored route cache reads as an all-zero line and
    /// causes no flash access.
    pub fn get<S: NvmInterface + ?Sized>(
        &mut self,
        store: &mut S,
        id: ClassicNodeId,
        kind: RouteCacheKind,
    ) -> Result<RouteCacheLine> {
        if !self.exists(id) {
            return Ok(RouteCacheLine::default());
        }
        let slot = self.resolve(store, ROUTE_CACHE_LAYOUT.group(id.index()))?;
        let start = ROUTE_CACHE_LAYOUT.offset(id.index()) + NodeRouteCache::line_offset(kind);
        Ok(RouteCacheLine::from_bytes(&self.slots[slot].data[start..start + RouteCacheLine::SIZE])
            .unwrap_or_default())
    }

    /// Store a route line of `id` in RAM
    ///
    /// The first line stored for a node zeroes its other line and persists
    /// the existence mask. The line itself reaches flash on eviction or flush.
    pub fn set<S: NvmInterface + ?Sized>(
        &mut self,
        store: &mut S,
        id: ClassicNodeId,
        kind: RouteCacheKind,
        line: &RouteCacheLine,
    ) -> Result<()> {
        let slot = self.resolve(store, ROUTE_CACHE_LAYOUT.group(id.index()))?;
        let offset = ROUTE_CACHE_LAYOUT.offset(id.index());
        let is_new = !self.exists(id);

        let data = &mut self.slots[slot].data;
        if is_new {
            data[offset..offset + NodeRouteCache::SIZE].fill(0);
        }
        let start = offset + NodeRouteCache::line_offset(kind);
        data[start..start + RouteCacheLine::SIZE].copy_from_slice(&line.to_bytes());
        self.slots[slot].dirty = true;

        if is_new {
            self.exists.insert_node(id);
            write_object(store, FILE_ID_NODE_ROUTECACHE_EXIST, self.exists.as_bytes())?;
        }
        Ok(())
    }

    /// Forget the route cache of `id`
    ///
    /// When no sibling in the group remains, the resident copy is dropped
    /// without flushing and the group file is erased.
    pub fn remove<S: NvmInterface + ?Sized>(&mut self, store: &mut S, id: ClassicNodeId) -> Result<()> {
        if !self.exists(id) {
            return Ok(());
        }
        self.exists.remove_node(id);
        write_object(store, FILE_ID_NODE_ROUTECACHE_EXIST, self.exists.as_bytes())?;

        let group = ROUTE_CACHE_LAYOUT.group(id.index());
        if group_in_use(&ROUTE_CACHE_LAYOUT, &self.exists, group) {
            return Ok(());
        }
        if let Some(slot) = self.slot_of(group) {
            self.slots[slot].release();
            self.drop_from_prio(slot);
        }
        erase_object(store, ROUTE_CACHE_LAYOUT.group_key(group))
    }

    /// Write every resident group to flash
    ///
    /// Used before a controlled shutdown.
    pub fn flush_all<S: NvmInterface + ?Sized>(&mut self, store: &mut S) -> Result<()> {
        for slot in 0..ROUTE_CACHE_FILES_IN_RAM {
            self.flush_slot(store, slot)?;
        }
        Ok(())
    }

    /// Write the resident group holding `id`, if any
    pub fn store_group_of<S: NvmInterface + ?Sized>(
        &mut self,
        store: &mut S,
        id: ClassicNodeId,
    ) -> Result<()> {
        match self.slot_of(ROUTE_CACHE_LAYOUT.group(id.index())) {
            Some(slot) => self.flush_slot(store, slot),
            None => Ok(()),
        }
    }

    fn flush_slot<S: NvmInterface + ?Sized>(&mut self, store: &mut S, slot: usize) -> Result<()> {
        let entry = &mut self.slots[slot];
        if let Some(group) = entry.group {
            write_object(store, ROUTE_CACHE_LAYOUT.group_key(group), &entry.data)?;
            entry.dirty = false;
        }
        Ok(())
    }

    fn slot_of(&self, group: usize) -> Option<usize> {
        self.slots.iter().position(|s| s.group == Some(group))
    }

    /// Make `group` resident and most recently used
    fn resolve<S: NvmInterface + ?Sized>(&mut self, store: &mut S, group: usize) -> Result<usize> {
        if let Some(slot) = self.slot_of(group) {
            self.promote(slot);
            return Ok(slot);
        }

        let slot = match self.slots.iter().position(|s| s.group.is_none()) {
            Some(free) => free,
            None => {
                let victim = self.prio[ROUTE_CACHE_FILES_IN_RAM - 1].unwrap_or(0);
                if self.slots[victim].dirty {
                    self.flush_slot(store, victim)?;
                }
                log_trace!(
                    "Route cache: evicting group {} for group {}",
                    self.slots[victim].group.unwrap_or(0),
                    group
                );
                victim
            }
        };

        self.slots[slot].release();
        self.drop_from_prio(slot);
        if group_in_use(&ROUTE_CACHE_LAYOUT, &self.exists, group) {
            self.hydrate(store, slot, group)?;
        }
        self.slots[slot].group = Some(group);
        self.promote(slot);
        Ok(slot)
    }

    /// Read a group file into a released slot
    ///
    /// A missing or wrongly sized group is treated as lost: its existence bits
    /// are cleared and persisted and the slot starts out zeroed. Any other
    /// read failure is returned and leaves the existence mask alone.
    fn hydrate<S: NvmInterface + ?Sized>(&mut self, store: &mut S, slot: usize, group: usize) -> Result<()> {
        let key = ROUTE_CACHE_LAYOUT.group_key(group);
        match read_group(store, key, &mut self.slots[slot].data) {
            Ok(()) => return Ok(()),
            Err(StorageError::ObjectNotFound { .. } | StorageError::SizeMismatch { .. }) => {}
            Err(e) => return Err(e),
        }

        log_warn!("Route cache: group {:#x} lost, dropping its nodes", key);
        self.slots[slot].data.fill(0);
        for index in ROUTE_CACHE_LAYOUT.siblings(group) {
            self.exists.clear(index as u16 + 1);
        }
        write_object(store, FILE_ID_NODE_ROUTECACHE_EXIST, self.exists.as_bytes())
    }

    fn promote(&mut self, slot: usize) {
        self.drop_from_prio(slot);
        self.prio.copy_within(0..ROUTE_CACHE_FILES_IN_RAM - 1, 1);
        self.prio[0] = Some(slot);
    }

    fn drop_from_prio(&mut self, slot: usize) {
        if let Some(pos) = self.prio.iter().position(|&p| p == Some(slot)) {
            self.prio.copy_within(pos + 1.., pos);
            self.prio[ROUTE_CACHE_FILES_IN_RAM - 1] = None;
        }
    }
}

//! Grouped-file mapper
//!
//! Node records are packed several to an object. Reads fetch only the bytes
//! of one record; writes rewrite the whole group file. The existence masks
//! decide whether a group file holds real data, so absent groups are never
//! read from flash.

use super::error::{Result, StorageError};
use super::files::{
    GroupLayout, FILE_SIZE_NODEINFO, FILE_SIZE_NODEINFO_LR, NODEINFO_LAYOUT, NODEINFO_LR_LAYOUT,
};
use crate::log_debug;
use crate::platform::{NvmError, NvmInterface, ObjectKey};
use zwave_nvm_core::node::{ClassicNodeId, ClassicNodeMask, LongRangeNodeId, LongRangeNodeMask, NodeMask};
use zwave_nvm_core::records::{LongRangeNodeInfo, NodeInfoSlot, SUC_UNKNOWN_CONTROLLER};

/// Fill byte of a group file that has no stored siblings
pub const UNUSED_GROUP_BYTE: u8 = 0xFF;

/// True if any record of `group` has its bit set in `mask`
pub fn group_in_use<const B: usize>(layout: &GroupLayout, mask: &NodeMask<B>, group: usize) -> bool {
    let siblings = layout.siblings(group);
    let first = siblings.start as u16 + 1;
    mask.any_in_range(first, siblings.len() as u16)
}

/// Read `buf.len()` bytes of `key` at `offset`
///
/// # Errors
///
/// Returns `StorageError::ObjectNotFound` if the object is missing, or
/// `StorageError::SizeMismatch` if it is too short for the range.
pub fn read_exact<S: NvmInterface + ?Sized>(
    store: &mut S,
    key: ObjectKey,
    offset: usize,
    buf: &mut [u8],
) -> Result<()> {
    match store.read_part(key, offset, buf) {
        Ok(()) => Ok(()),
        Err(NvmError::OutOfRange) => Err(StorageError::SizeMismatch {
            key,
            expected: offset + buf.len(),
            actual: store.object_size(key).unwrap_or(0),
        }),
        Err(e) => Err(StorageError::from_read(key, e)),
    }
}

/// Read a whole group file that must hold exactly `buf.len()` bytes
pub fn read_group<S: NvmInterface + ?Sized>(
    store: &mut S,
    key: ObjectKey,
    buf: &mut [u8],
) -> Result<()> {
    let actual = store
        .read(key, buf)
        .map_err(|e| StorageError::from_read(key, e))?;
    let stored = store.object_size(key).unwrap_or(actual);
    if stored != buf.len() {
        return Err(StorageError::SizeMismatch {
            key,
            expected: buf.len(),
            actual: stored,
        });
    }
    Ok(())
}

pub fn write_object<S: NvmInterface + ?Sized>(store: &mut S, key: ObjectKey, data: &[u8]) -> Result<()> {
    store
        .write(key, data)
        .map_err(|e| StorageError::from_write(key, e))
}

pub fn erase_object<S: NvmInterface + ?Sized>(store: &mut S, key: ObjectKey) -> Result<()> {
    store.erase(key).map_err(|e| StorageError::from_write(key, e))
}

/// Write-through buffer for classic NodeInfo group files
///
/// Remembers the last group it loaded so consecutive field writes to nodes of
/// the same group read flash once. Writes with `persist == false` stay in
/// the buffer until a later persisted write to the same group, a write to
/// another group, or [`GroupWriteBuffer::flush`].
#[derive(Debug)]
pub struct GroupWriteBuffer {
    key: Option<ObjectKey>,
    buf: [u8; FILE_SIZE_NODEINFO],
    /// Held group is ahead of flash
    dirty: bool,
    mask_pending: bool,
}

impl Default for GroupWriteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupWriteBuffer {
    pub const fn new() -> Self {
        Self {
            key: None,
            buf: [UNUSED_GROUP_BYTE; FILE_SIZE_NODEINFO],
            dirty: false,
            mask_pending: false,
        }
    }

    /// Drop the remembered group, unwritten changes included
    ///
    /// Must be called whenever the group file changes behind the buffer.
    pub fn invalidate(&mut self) {
        self.key = None;
        self.dirty = false;
    }

    /// True if the held group has changes not yet written to flash
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write the held group if it is ahead of flash, then a pending mask
    ///
    /// # Errors
    ///
    /// Returns `StorageError::StoreWriteFailed` if either write fails. The
    /// held group stays dirty so a later flush retries it.
    pub fn flush<S: NvmInterface + ?Sized>(
        &mut self,
        store: &mut S,
        exists: &ClassicNodeMask,
        mask_key: ObjectKey,
    ) -> Result<()> {
        if let (Some(key), true) = (self.key, self.dirty) {
            write_object(store, key, &self.buf)?;
            self.dirty = false;
            log_debug!("NodeInfo group {:#x} flushed", key);
        }
        if self.mask_pending {
            write_object(store, mask_key, exists.as_bytes())?;
            self.mask_pending = false;
        }
        Ok(())
    }

    /// Key of the group currently held, if any
    pub fn cached_key(&self) -> Option<ObjectKey> {
        self.key
    }

    /// Copy bytes of the held group, `false` if `key` is not held
    ///
    /// The held group can be ahead of flash after deferred writes, so reads
    /// of that group are served from here.
    pub fn peek(&self, key: ObjectKey, offset: usize, buf: &mut [u8]) -> bool {
        if self.key != Some(key) || offset + buf.len() > self.buf.len() {
            return false;
        }
        buf.copy_from_slice(&self.buf[offset..offset + buf.len()]);
        true
    }

    /// Write `data` at `field_offset` inside the slot of `id`
    ///
    /// The first write to a node that does not exist yet initialises its slot
    /// (zeroed, unknown SUC index) and sets its existence bit. The group file
    /// is written before the existence mask.
    ///
    /// # Arguments
    ///
    /// * `exists` - Classic existence mask, updated in place
    /// * `mask_key` - Object holding the existence mask
    /// * `field_offset` - Offset of the field inside the 35-byte slot
    /// * `persist` - Write the group file (and a changed mask) now
    ///
    /// # Errors
    ///
    /// Returns a read error if the group file cannot be loaded, or
    /// `StorageError::StoreWriteFailed` if persisting fails. On error the
    /// buffer is invalidated and the existence bit is left untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn write_field<S: NvmInterface + ?Sized>(
        &mut self,
        store: &mut S,
        exists: &mut ClassicNodeMask,
        mask_key: ObjectKey,
        id: ClassicNodeId,
        field_offset: usize,
        data: &[u8],
        persist: bool,
    ) -> Result<()> {
        let layout = &NODEINFO_LAYOUT;
        let (key, offset) = layout.locate_classic(id);
        let start = offset + field_offset;
        if start + data.len() > offset + NodeInfoSlot::SIZE {
            return Err(StorageError::InvalidNodeForOperation);
        }

        if self.key != Some(key) {
            self.flush(store, exists, mask_key)?;
            self.key = None;
            if group_in_use(layout, exists, layout.group(id.index())) {
                read_group(store, key, &mut self.buf)?;
            } else {
                self.buf.fill(UNUSED_GROUP_BYTE);
            }
            self.key = Some(key);
        }

        let is_new = !exists.contains_node(id);
        if is_new {
            let slot = &mut self.buf[offset..offset + NodeInfoSlot::SIZE];
            slot.fill(0);
            slot[NodeInfoSlot::SUC_UPDATE_INDEX_OFFSET] = SUC_UNKNOWN_CONTROLLER;
        }
        self.buf[start..start + data.len()].copy_from_slice(data);

        if persist {
            if let Err(e) = write_object(store, key, &self.buf) {
                self.invalidate();
                return Err(e);
            }
            self.dirty = false;
        } else {
            self.dirty = true;
        }

        if is_new {
            exists.insert_node(id);
            self.mask_pending = true;
        }
        if persist && self.mask_pending {
            write_object(store, mask_key, exists.as_bytes())?;
            self.mask_pending = false;
        }
        Ok(())
    }
}

/// Read `buf.len()` bytes of the slot of `id` at `field_offset`
///
/// Returns `Ok(false)` without touching flash when the node does not exist.
/// Otherwise reads only the requested range, from `writer` when it holds the
/// group.
pub fn read_classic_field<S: NvmInterface + ?Sized>(
    store: &mut S,
    exists: &ClassicNodeMask,
    writer: &GroupWriteBuffer,
    id: ClassicNodeId,
    field_offset: usize,
    buf: &mut [u8],
) -> Result<bool> {
    if !exists.contains_node(id) {
        return Ok(false);
    }
    let (key, offset) = NODEINFO_LAYOUT.locate_classic(id);
    if !writer.peek(key, offset + field_offset, buf) {
        read_exact(store, key, offset + field_offset, buf)?;
    }
    Ok(true)
}

/// Remove the group file of `id` if no sibling still exists
///
/// `exists` must already have the bit of `id` cleared.
pub fn erase_classic_group_if_unused<S: NvmInterface + ?Sized>(
    store: &mut S,
    exists: &ClassicNodeMask,
    id: ClassicNodeId,
    writer: &mut GroupWriteBuffer,
) -> Result<bool> {
    let layout = &NODEINFO_LAYOUT;
    let group = layout.group(id.index());
    if group_in_use(layout, exists, group) {
        return Ok(false);
    }
    let key = layout.group_key(group);
    if writer.cached_key() == Some(key) {
        writer.invalidate();
    }
    erase_object(store, key)?;
    log_debug!("NodeInfo group {:#x} erased", key);
    Ok(true)
}

/// Read the record of a Long Range node
pub fn read_long_range<S: NvmInterface + ?Sized>(
    store: &mut S,
    exists: &LongRangeNodeMask,
    id: LongRangeNodeId,
) -> Result<Option<LongRangeNodeInfo>> {
    if !exists.contains_node(id) {
        return Ok(None);
    }
    let (key, offset) = NODEINFO_LR_LAYOUT.locate_long_range(id);
    let mut buf = [0u8; LongRangeNodeInfo::SIZE];
    read_exact(store, key, offset, &mut buf)?;
    Ok(LongRangeNodeInfo::from_bytes(&buf))
}

/// Store the record of a Long Range node
///
/// An existing group file is updated in place, a missing one is created.
/// The group file is written before the existence bit is set and persisted.
pub fn write_long_range<S: NvmInterface + ?Sized>(
    store: &mut S,
    exists: &mut LongRangeNodeMask,
    mask_key: ObjectKey,
    id: LongRangeNodeId,
    record: &LongRangeNodeInfo,
) -> Result<()> {
    let layout = &NODEINFO_LR_LAYOUT;
    let (key, offset) = layout.locate_long_range(id);
    let mut buf = [UNUSED_GROUP_BYTE; FILE_SIZE_NODEINFO_LR];
    if store.object_size(key).is_ok() {
        read_group(store, key, &mut buf)?;
    }
    buf[offset..offset + LongRangeNodeInfo::SIZE].copy_from_slice(&record.to_bytes());
    write_object(store, key, &buf)?;

    if !exists.contains_node(id) {
        exists.insert_node(id);
        write_object(store, mask_key, exists.as_bytes())?;
    }
    Ok(())
}

/// Forget a Long Range node
///
/// Clears and persists its existence bit, then erases the group file if no
/// sibling remains. Removing a node that does not exist does nothing.
pub fn remove_long_range<S: NvmInterface + ?Sized>(
    store: &mut S,
    exists: &mut LongRangeNodeMask,
    mask_key: ObjectKey,
    id: LongRangeNodeId,
) -> Result<()> {
    if !exists.contains_node(id) {
        return Ok(());
    }
    exists.remove_node(id);
    write_object(store, mask_key, exists.as_bytes())?;

    let layout = &NODEINFO_LR_LAYOUT;
    let group = layout.group(id.index());
    if !group_in_use(layout, exists, group) {
        erase_object(store, layout.group_key(group))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockNvm;
    use crate::storage::files::{FILE_ID_LRANGE_NODE_EXIST, FILE_ID_NODE_STORAGE_EXIST};
    use zwave_nvm_core::records::{LongRangeFlags, NodeInfo};

    const MASK: ObjectKey = FILE_ID_NODE_STORAGE_EXIST;

    fn classic(id: u16) -> ClassicNodeId {
        ClassicNodeId::new(id).unwrap()
    }

    fn lr(id: u16) -> LongRangeNodeId {
        LongRangeNodeId::new(id).unwrap()
    }

    fn info(generic: u8) -> [u8; NodeInfo::SIZE] {
        [0x53, 0x9C, 0x01, generic, 0x01]
    }

    #[test]
    fn test_group_in_use() {
        let mut mask = ClassicNodeMask::new();
        mask.insert_node(classic(6));
        assert!(!group_in_use(&NODEINFO_LAYOUT, &mask, 0));
        assert!(group_in_use(&NODEINFO_LAYOUT, &mask, 1));
        assert!(!group_in_use(&NODEINFO_LAYOUT, &mask, 2));
    }

    #[test]
    fn test_first_write_initialises_slot() {
        let mut store = MockNvm::new();
        let mut exists = ClassicNodeMask::new();
        let mut writer = GroupWriteBuffer::new();

        writer
            .write_field(&mut store, &mut exists, MASK, classic(2), 0, &info(0x10), true)
            .unwrap();

        assert!(exists.contains_node(classic(2)));
        let file = store.object(0x200).unwrap();
        assert_eq!(file.len(), 140);
        assert!(file[..35].iter().all(|&b| b == 0xFF));
        assert_eq!(&file[35..40], &info(0x10));
        assert!(file[40..69].iter().all(|&b| b == 0));
        assert_eq!(file[69], SUC_UNKNOWN_CONTROLLER);
        assert_eq!(store.object(MASK).unwrap(), exists.as_bytes());
    }

    #[test]
    fn test_memo_skips_second_read() {
        let mut store = MockNvm::new();
        let mut exists = ClassicNodeMask::new();
        let mut writer = GroupWriteBuffer::new();
        writer
            .write_field(&mut store, &mut exists, MASK, classic(1), 0, &info(1), true)
            .unwrap();
        writer
            .write_field(&mut store, &mut exists, MASK, classic(2), 0, &info(2), true)
            .unwrap();

        writer.invalidate();
        store.reset_counters();
        writer
            .write_field(&mut store, &mut exists, MASK, classic(3), 0, &info(3), true)
            .unwrap();
        writer
            .write_field(&mut store, &mut exists, MASK, classic(3), 5, &[0x0F], true)
            .unwrap();
        assert_eq!(store.counters().reads, 1);

        let file = store.object(0x200).unwrap();
        assert_eq!(&file[0..5], &info(1));
        assert_eq!(&file[35..40], &info(2));
        assert_eq!(&file[70..75], &info(3));
        assert_eq!(file[75], 0x0F);
    }

    #[test]
    fn test_deferred_write_persists_mask_later() {
        let mut store = MockNvm::new();
        let mut exists = ClassicNodeMask::new();
        let mut writer = GroupWriteBuffer::new();

        writer
            .write_field(&mut store, &mut exists, MASK, classic(9), 5, &[1; 29], false)
            .unwrap();
        assert!(!store.contains(0x202));
        assert!(!store.contains(MASK));

        writer
            .write_field(&mut store, &mut exists, MASK, classic(10), 5, &[2; 29], true)
            .unwrap();
        let mask = ClassicNodeMask::from_bytes(store.object(MASK).unwrap());
        assert!(mask.contains_node(classic(9)));
        assert!(mask.contains_node(classic(10)));
    }

    #[test]
    fn test_deferred_write_survives_group_switch() {
        let mut store = MockNvm::new();
        let mut exists = ClassicNodeMask::new();
        let mut writer = GroupWriteBuffer::new();
        for id in [1, 5] {
            writer
                .write_field(&mut store, &mut exists, MASK, classic(id), 0, &info(id as u8), true)
                .unwrap();
        }

        writer
            .write_field(&mut store, &mut exists, MASK, classic(1), 5, &[0x11; 29], false)
            .unwrap();
        assert!(writer.is_dirty());
        writer
            .write_field(&mut store, &mut exists, MASK, classic(5), 5, &[0x55; 29], true)
            .unwrap();
        assert!(!writer.is_dirty());

        assert_eq!(&store.object(0x200).unwrap()[5..34], &[0x11; 29]);
        assert_eq!(&store.object(0x201).unwrap()[5..34], &[0x55; 29]);
    }

    #[test]
    fn test_flush_writes_deferred_new_node() {
        let mut store = MockNvm::new();
        let mut exists = ClassicNodeMask::new();
        let mut writer = GroupWriteBuffer::new();
        writer
            .write_field(&mut store, &mut exists, MASK, classic(7), 5, &[3; 29], false)
            .unwrap();
        assert!(!store.contains(0x201));

        writer.flush(&mut store, &exists, MASK).unwrap();
        assert_eq!(&store.object(0x201).unwrap()[75..104], &[3; 29]);
        let mask = ClassicNodeMask::from_bytes(store.object(MASK).unwrap());
        assert!(mask.contains_node(classic(7)));

        store.reset_counters();
        writer.flush(&mut store, &exists, MASK).unwrap();
        assert_eq!(store.counters().writes, 0);
    }

    #[test]
    fn test_failed_write_leaves_node_absent() {
        let mut store = MockNvm::new();
        let mut exists = ClassicNodeMask::new();
        let mut writer = GroupWriteBuffer::new();
        store.power_loss_after(0);

        let result = writer.write_field(&mut store, &mut exists, MASK, classic(4), 0, &info(4), true);
        assert_eq!(result, Err(StorageError::StoreWriteFailed { key: 0x200 }));
        assert!(!exists.contains_node(classic(4)));
        assert_eq!(writer.cached_key(), None);
    }

    #[test]
    fn test_read_classic_field_absent_node_skips_flash() {
        let mut store = MockNvm::new();
        let exists = ClassicNodeMask::new();
        let writer = GroupWriteBuffer::new();
        let mut buf = [0u8; 5];
        assert!(!read_classic_field(&mut store, &exists, &writer, classic(3), 0, &mut buf).unwrap());
        assert_eq!(store.counters().reads, 0);
    }

    #[test]
    fn test_read_sees_deferred_write() {
        let mut store = MockNvm::new();
        let mut exists = ClassicNodeMask::new();
        let mut writer = GroupWriteBuffer::new();
        writer
            .write_field(&mut store, &mut exists, MASK, classic(3), 0, &info(3), true)
            .unwrap();
        writer
            .write_field(&mut store, &mut exists, MASK, classic(3), 5, &[0x42; 29], false)
            .unwrap();

        let mut buf = [0u8; 29];
        assert!(read_classic_field(&mut store, &exists, &writer, classic(3), 5, &mut buf).unwrap());
        assert_eq!(buf, [0x42; 29]);
        assert_eq!(store.counters().reads, 0);

        writer.invalidate();
        read_classic_field(&mut store, &exists, &writer, classic(3), 5, &mut buf).unwrap();
        assert_eq!(buf, [0; 29]);
    }

    #[test]
    fn test_erase_group_keeps_siblings() {
        let mut store = MockNvm::new();
        let mut exists = ClassicNodeMask::new();
        let mut writer = GroupWriteBuffer::new();
        for id in [5, 6] {
            writer
                .write_field(&mut store, &mut exists, MASK, classic(id), 0, &info(id as u8), true)
                .unwrap();
        }

        exists.remove_node(classic(5));
        assert!(!erase_classic_group_if_unused(&mut store, &exists, classic(5), &mut writer).unwrap());
        assert!(store.contains(0x201));

        exists.remove_node(classic(6));
        assert!(erase_classic_group_if_unused(&mut store, &exists, classic(6), &mut writer).unwrap());
        assert!(!store.contains(0x201));
        assert_eq!(writer.cached_key(), None);
    }

    #[test]
    fn test_long_range_write_read_remove() {
        let mut store = MockNvm::new();
        let mut exists = LongRangeNodeMask::new();
        let record = LongRangeNodeInfo {
            flags: LongRangeFlags::empty(),
            generic: 0x10,
            specific: 0x01,
        };

        write_long_range(&mut store, &mut exists, FILE_ID_LRANGE_NODE_EXIST, lr(257), &record).unwrap();
        write_long_range(&mut store, &mut exists, FILE_ID_LRANGE_NODE_EXIST, lr(300), &record).unwrap();
        assert_eq!(read_long_range(&mut store, &exists, lr(257)).unwrap(), Some(record));
        assert_eq!(read_long_range(&mut store, &exists, lr(256)).unwrap(), None);
        assert_eq!(store.object(0x800).unwrap().len(), 150);

        remove_long_range(&mut store, &mut exists, FILE_ID_LRANGE_NODE_EXIST, lr(257)).unwrap();
        assert!(store.contains(0x800));
        remove_long_range(&mut store, &mut exists, FILE_ID_LRANGE_NODE_EXIST, lr(300)).unwrap();
        assert!(!store.contains(0x800));
        assert!(exists.is_empty());
    }
}

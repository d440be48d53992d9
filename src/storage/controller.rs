//! Controller storage engine
//!
//! Owns the object store together with every piece of RAM state derived from
//! it: existence masks, flag masks, the 100 kbit/s capability cache, the
//! route cache slots and the NodeInfo write buffer.
//!
//! Thread affinity: owning task only. The engine is not interrupt safe; work
//! triggered from an ISR must be queued to the owning task.
//!
//! # Example
//!
//! ```ignore
//! use zwave_nvm::platform::mock::MockNvm;
//! use zwave_nvm::storage::ControllerStorage;
//! use zwave_nvm::NodeId;
//!
//! let mut storage = ControllerStorage::initialize(MockNvm::new())?;
//! let id = NodeId::try_from(5u16)?;
//! storage.set_node_info(id, &info)?;
//! assert!(storage.node_exists(id));
//! ```

use super::caretaker::{self, FileStatusList};
use super::error::{Result, StorageError};
use super::files::{
    NodeFlag, CONTROLLER_FILE_SET, FILE_ID_CONTROLLERINFO, FILE_ID_LRANGE_NODE_EXIST,
    FILE_ID_NODE_ROUTECACHE_EXIST, FILE_ID_NODE_STORAGE_EXIST, FILE_ID_PREFERRED_REPEATERS,
    FILE_SIZE_NODEINFO, FILE_SIZE_SUCNODELIST, NODEINFOS_PER_FILE, NODEINFO_LAYOUT, SUC_LAYOUT,
};
use super::grouped::{
    self, group_in_use, read_classic_field, read_exact, read_group, write_object, GroupWriteBuffer,
};
use super::migration::{self, MigrationOutcome};
use super::route_cache::RouteCacheBuffer;
use crate::platform::{NvmError, NvmInterface, ObjectKey};
use crate::{log_info, log_warn};
use zwave_nvm_core::node::{
    ClassicNodeId, ClassicNodeMask, LongRangeNodeMask, NodeId, NodeMask, MAX_CLASSIC_NODES,
};
use zwave_nvm_core::records::{
    ControllerConfig, ControllerInfo, LongRangeNodeInfo, NodeInfo, NodeInfoSlot, RouteCacheKind,
    RouteCacheLine, SchemaVersion, SucUpdateEntry, HOME_ID_LENGTH, SUC_ERASED_BYTE,
    SUC_MAX_UPDATES, SUC_UNKNOWN_CONTROLLER, SUC_UPDATE_NODEPARM_MAX,
};

/// Flag values of a node that was just stored or removed
const FLAGS_ON_RESET: [(NodeFlag, bool); NodeFlag::COUNT] = [
    (NodeFlag::AppRouteLock, false),
    // Set means "no static route update needed"
    (NodeFlag::RoutingSlaveSucUpdate, true),
    (NodeFlag::SucPendingUpdate, false),
    (NodeFlag::Bridge, false),
    (NodeFlag::PendingDiscovery, false),
];

/// What happened while the engine was brought up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootReport {
    pub migration: MigrationOutcome,
    /// Caretaker result per entry of the controller file set
    pub file_status: FileStatusList,
    /// Objects the caretaker rewrote
    pub repaired: usize,
}

/// Controller persistent state on top of an NVM object store
pub struct ControllerStorage<S: NvmInterface> {
    store: S,
    node_exists: ClassicNodeMask,
    lr_exists: LongRangeNodeMask,
    flags: [ClassicNodeMask; NodeFlag::COUNT],
    /// RAM only, rebuilt from NodeInfo on boot
    speed_100k: ClassicNodeMask,
    routes: RouteCacheBuffer,
    writer: GroupWriteBuffer,
    report: BootReport,
}

fn load_mask<S: NvmInterface + ?Sized, const B: usize>(
    store: &mut S,
    key: ObjectKey,
) -> Result<NodeMask<B>> {
    let mut buf = [0u8; B];
    read_group(store, key, &mut buf)?;
    Ok(NodeMask::from_bytes(&buf))
}

impl<S: NvmInterface> ControllerStorage<S> {
    /// Bring up the engine
    ///
    /// Runs schema migration, verifies and repairs the controller file set,
    /// then loads the masks and pre-loads route cache groups. Call once per
    /// boot, before any other operation.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::MigrationFailed` if an upgrade step failed (it
    /// is retried on the next boot), or the store error that stopped repair
    /// or loading.
    pub fn initialize(mut store: S) -> Result<Self> {
        let migration = migration::run(&mut store)?;
        let file_status = caretaker::verify(&store, &CONTROLLER_FILE_SET);
        let repaired = caretaker::repair(&mut store, &CONTROLLER_FILE_SET, &file_status)?;

        let node_exists = load_mask(&mut store, FILE_ID_NODE_STORAGE_EXIST)?;
        let lr_exists = load_mask(&mut store, FILE_ID_LRANGE_NODE_EXIST)?;
        let mut routes = RouteCacheBuffer::new(load_mask(&mut store, FILE_ID_NODE_ROUTECACHE_EXIST)?);
        routes.preload(&mut store)?;

        let mut flags = [ClassicNodeMask::new(); NodeFlag::COUNT];
        for flag in NodeFlag::ALL {
            flags[flag.index()] = load_mask(&mut store, flag.key())?;
        }

        let mut storage = Self {
            store,
            node_exists,
            lr_exists,
            flags,
            speed_100k: ClassicNodeMask::new(),
            routes,
            writer: GroupWriteBuffer::new(),
            report: BootReport {
                migration,
                file_status,
                repaired,
            },
        };
        storage.rebuild_speed_cache()?;

        log_info!(
            "Storage ready: {} classic nodes, {} long range nodes",
            storage.node_exists.count(),
            storage.lr_exists.count()
        );
        Ok(storage)
    }

    fn rebuild_speed_cache(&mut self) -> Result<()> {
        let layout = &NODEINFO_LAYOUT;
        let mut buf = [0u8; FILE_SIZE_NODEINFO];
        for group in 0..layout.file_count() {
            if !group_in_use(layout, &self.node_exists, group) {
                continue;
            }
            read_group(&mut self.store, layout.group_key(group), &mut buf)?;
            for index in layout.siblings(group) {
                let position = index as u16 + 1;
                if !self.node_exists.test(position) {
                    continue;
                }
                let offset = layout.offset(index) + NodeInfoSlot::INFO_OFFSET;
                let fast = NodeInfo::from_bytes(&buf[offset..]).is_some_and(|info| info.supports_100k());
                self.speed_100k.assign(position, fast);
            }
        }
        Ok(())
    }

    /// What migration and the caretaker did during [`Self::initialize`]
    pub fn boot_report(&self) -> &BootReport {
        &self.report
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Direct store access
    ///
    /// Writing objects owned by the engine through this leaves its RAM state
    /// stale.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Release the store without flushing the route cache
    pub fn into_inner(self) -> S {
        self.store
    }

    /// Write deferred NodeInfo changes, flush the route cache and release
    /// the store
    pub fn shutdown(mut self) -> Result<S> {
        self.writer
            .flush(&mut self.store, &self.node_exists, FILE_ID_NODE_STORAGE_EXIST)?;
        self.routes.flush_all(&mut self.store)?;
        Ok(self.store)
    }

    /// Persisted storage version
    pub fn stored_version(&mut self) -> Result<Option<SchemaVersion>> {
        migration::read_version(&mut self.store)
    }

    // ----- node info -----

    /// True if a NodeInfo record is stored for `id`
    pub fn node_exists(&self, id: NodeId) -> bool {
        match id {
            NodeId::Classic(id) => self.node_exists.contains_node(id),
            NodeId::LongRange(id) => self.lr_exists.contains_node(id),
        }
    }

    /// Classic nodes with a stored NodeInfo
    pub fn included_nodes(&self) -> &ClassicNodeMask {
        &self.node_exists
    }

    /// Long Range nodes with a stored NodeInfo
    pub fn included_lr_nodes(&self) -> &LongRangeNodeMask {
        &self.lr_exists
    }

    /// NodeInfo of `id`, `None` if the node is not stored
    ///
    /// Long Range records are widened to the classic shape.
    pub fn get_node_info(&mut self, id: NodeId) -> Result<Option<NodeInfo>> {
        match id {
            NodeId::Classic(id) => {
                let mut buf = [0u8; NodeInfo::SIZE];
                let found = read_classic_field(
                    &mut self.store,
                    &self.node_exists,
                    &self.writer,
                    id,
                    NodeInfoSlot::INFO_OFFSET,
                    &mut buf,
                )?;
                Ok(if found { NodeInfo::from_bytes(&buf) } else { None })
            }
            NodeId::LongRange(id) => Ok(grouped::read_long_range(&mut self.store, &self.lr_exists, id)?
                .map(|record| record.to_node_info())),
        }
    }

    /// Store the NodeInfo of `id`
    ///
    /// A classic node also gets its five flags reset. The 100 kbit/s cache
    /// is not touched; callers update it through [`Self::set_cached_100k`].
    ///
    /// # Errors
    ///
    /// Returns `StorageError::StoreWriteFailed` if the record or the
    /// existence mask could not be written.
    pub fn set_node_info(&mut self, id: NodeId, info: &NodeInfo) -> Result<()> {
        match id {
            NodeId::Classic(id) => {
                self.writer.write_field(
                    &mut self.store,
                    &mut self.node_exists,
                    FILE_ID_NODE_STORAGE_EXIST,
                    id,
                    NodeInfoSlot::INFO_OFFSET,
                    &info.to_bytes(),
                    true,
                )?;
                for (flag, value) in FLAGS_ON_RESET {
                    self.write_flag(id, flag, value, true)?;
                }
                Ok(())
            }
            NodeId::LongRange(id) => grouped::write_long_range(
                &mut self.store,
                &mut self.lr_exists,
                FILE_ID_LRANGE_NODE_EXIST,
                id,
                &LongRangeNodeInfo::from_node_info(info),
            ),
        }
    }

    /// Forget `id`
    ///
    /// Clears the node's flags and existence bit, drops its route cache
    /// unless `keep_route_cache` is set, and erases the group file once no
    /// sibling remains. Removing a node that is not stored does nothing.
    pub fn remove_node_info(&mut self, id: NodeId, keep_route_cache: bool) -> Result<()> {
        let id = match id {
            NodeId::Classic(id) => id,
            NodeId::LongRange(id) => {
                return grouped::remove_long_range(
                    &mut self.store,
                    &mut self.lr_exists,
                    FILE_ID_LRANGE_NODE_EXIST,
                    id,
                )
            }
        };
        if !self.node_exists.contains_node(id) {
            return Ok(());
        }

        for flag in NodeFlag::ALL {
            self.write_flag(id, flag, false, true)?;
        }

        self.node_exists.remove_node(id);
        write_object(&mut self.store, FILE_ID_NODE_STORAGE_EXIST, self.node_exists.as_bytes())?;

        if !keep_route_cache {
            self.routes.remove(&mut self.store, id)?;
        }
        self.speed_100k.remove_node(id);

        grouped::erase_classic_group_if_unused(&mut self.store, &self.node_exists, id, &mut self.writer)?;
        Ok(())
    }

    fn node_info_or_empty(&mut self, id: NodeId) -> Result<NodeInfo> {
        Ok(self.get_node_info(id)?.unwrap_or_else(NodeInfo::empty))
    }

    pub fn is_listening(&mut self, id: NodeId) -> Result<bool> {
        Ok(self.node_info_or_empty(id)?.is_listening())
    }

    pub fn is_routing(&mut self, id: NodeId) -> Result<bool> {
        Ok(self.node_info_or_empty(id)?.is_routing())
    }

    /// True unless `id` is a stored classic controller
    ///
    /// Long Range nodes are always slaves.
    pub fn is_slave(&mut self, id: NodeId) -> Result<bool> {
        match id {
            NodeId::LongRange(_) => Ok(true),
            NodeId::Classic(_) => Ok(!self.node_info_or_empty(id)?.is_controller()),
        }
    }

    /// True if `id` is a 250 ms or 1000 ms wake-up sensor
    pub fn is_sensor(&mut self, id: NodeId) -> Result<bool> {
        Ok(self.node_info_or_empty(id)?.is_sensor())
    }

    pub fn supports_40k(&mut self, id: ClassicNodeId) -> Result<bool> {
        Ok(self.node_info_or_empty(id.into())?.supports_40k())
    }

    /// Cached 100 kbit/s capability
    pub fn cached_100k(&self, id: ClassicNodeId) -> bool {
        self.speed_100k.contains_node(id)
    }

    pub fn set_cached_100k(&mut self, id: ClassicNodeId, value: bool) {
        self.speed_100k.assign(id.get() as u16, value);
    }

    // ----- routing info -----

    /// Neighbour mask of `id`, empty if the node is not stored
    pub fn routing_info(&mut self, id: ClassicNodeId) -> Result<ClassicNodeMask> {
        let mut buf = [0u8; ClassicNodeMask::SIZE];
        read_classic_field(
            &mut self.store,
            &self.node_exists,
            &self.writer,
            id,
            NodeInfoSlot::NEIGHBOURS_OFFSET,
            &mut buf,
        )?;
        Ok(ClassicNodeMask::from_bytes(&buf))
    }

    /// Replace the neighbour mask of a stored node
    ///
    /// `None` clears it. With `persist == false` the change stays in RAM until
    /// the next persisted write to the same group file, the next write to
    /// another group file, or [`Self::shutdown`]. Batch writers use
    /// [`Self::routing_info_file_is_ready`] to decide when to persist.
    /// Nodes that are not stored are ignored.
    pub fn set_routing_info(
        &mut self,
        id: ClassicNodeId,
        neighbours: Option<&ClassicNodeMask>,
        persist: bool,
    ) -> Result<()> {
        if !self.node_exists.contains_node(id) {
            return Ok(());
        }
        let empty = ClassicNodeMask::new();
        let neighbours = neighbours.unwrap_or(&empty);
        self.writer.write_field(
            &mut self.store,
            &mut self.node_exists,
            FILE_ID_NODE_STORAGE_EXIST,
            id,
            NodeInfoSlot::NEIGHBOURS_OFFSET,
            neighbours.as_bytes(),
            persist,
        )
    }

    /// True if no stored node after `id` shares its group file
    ///
    /// Also true for the last slot of a group and for `id == max`.
    pub fn routing_info_file_is_ready(&self, id: ClassicNodeId, max: ClassicNodeId) -> bool {
        if id == max {
            return true;
        }
        let slot = id.index() % NODEINFOS_PER_FILE;
        let position = id.get() as u16;
        !(1..(NODEINFOS_PER_FILE - slot) as u16).any(|ahead| self.node_exists.test(position + ahead))
    }

    /// SUC update index of `id`, [`SUC_UNKNOWN_CONTROLLER`] if not stored
    pub fn ctrl_suc_update_index(&mut self, id: ClassicNodeId) -> Result<u8> {
        let mut buf = [SUC_UNKNOWN_CONTROLLER];
        read_classic_field(
            &mut self.store,
            &self.node_exists,
            &self.writer,
            id,
            NodeInfoSlot::SUC_UPDATE_INDEX_OFFSET,
            &mut buf,
        )?;
        Ok(buf[0])
    }

    /// Store the SUC update index of a stored node, others are ignored
    pub fn set_ctrl_suc_update_index(&mut self, id: ClassicNodeId, index: u8) -> Result<()> {
        if !self.node_exists.contains_node(id) {
            return Ok(());
        }
        self.writer.write_field(
            &mut self.store,
            &mut self.node_exists,
            FILE_ID_NODE_STORAGE_EXIST,
            id,
            NodeInfoSlot::SUC_UPDATE_INDEX_OFFSET,
            &[index],
            true,
        )
    }

    // ----- node flags -----

    /// Flag of `id`; false for nodes that are not stored
    pub fn node_flag(&self, id: ClassicNodeId, flag: NodeFlag) -> bool {
        self.node_exists.contains_node(id) && self.flags[flag.index()].contains_node(id)
    }

    /// Set a flag of a stored node and persist the flag mask
    ///
    /// # Returns
    ///
    /// `true` if the flag changed. Nodes that are not stored are ignored and
    /// report `false`.
    pub fn set_node_flag(&mut self, id: ClassicNodeId, flag: NodeFlag, value: bool) -> Result<bool> {
        self.write_flag(id, flag, value, true)
    }

    /// Write the whole RAM mask of `flag` to flash
    pub fn persist_flag_mask(&mut self, flag: NodeFlag) -> Result<()> {
        write_object(&mut self.store, flag.key(), self.flags[flag.index()].as_bytes())
    }

    fn write_flag(&mut self, id: ClassicNodeId, flag: NodeFlag, value: bool, persist: bool) -> Result<bool> {
        if !self.node_exists.contains_node(id) {
            return Ok(false);
        }
        let mask = &mut self.flags[flag.index()];
        if mask.contains_node(id) == value {
            return Ok(false);
        }
        mask.assign(id.get() as u16, value);
        if persist {
            self.persist_flag_mask(flag)?;
        }
        Ok(true)
    }

    /// Bridge flags of all stored nodes as one mask
    pub fn bridge_node_pool(&self) -> ClassicNodeMask {
        let mut pool = ClassicNodeMask::new();
        for id in ClassicNodeId::all().filter(|&id| self.node_flag(id, NodeFlag::Bridge)) {
            pool.insert_node(id);
        }
        pool
    }

    /// Apply `pool` to the bridge flags of all stored nodes
    ///
    /// The flag mask is written once, and only if a flag changed.
    pub fn write_bridge_node_pool(&mut self, pool: &ClassicNodeMask) -> Result<()> {
        let mut changed = false;
        for id in ClassicNodeId::all() {
            changed |= self.write_flag(id, NodeFlag::Bridge, pool.contains_node(id), false)?;
        }
        if changed {
            self.persist_flag_mask(NodeFlag::Bridge)?;
        }
        Ok(())
    }

    pub fn preferred_repeaters(&mut self) -> Result<ClassicNodeMask> {
        load_mask(&mut self.store, FILE_ID_PREFERRED_REPEATERS)
    }

    pub fn set_preferred_repeaters(&mut self, repeaters: &ClassicNodeMask) -> Result<()> {
        write_object(&mut self.store, FILE_ID_PREFERRED_REPEATERS, repeaters.as_bytes())
    }

    // ----- route cache -----

    /// True if a route cache entry is stored for `id`
    pub fn route_cache_exists(&self, id: ClassicNodeId) -> bool {
        self.routes.exists(id)
    }

    /// Route line of `id`, all zero if none is stored
    pub fn route_cache(&mut self, id: ClassicNodeId, kind: RouteCacheKind) -> Result<RouteCacheLine> {
        self.routes.get(&mut self.store, id, kind)
    }

    /// Store a route line in RAM; it reaches flash on eviction or flush
    pub fn set_route_cache(
        &mut self,
        id: ClassicNodeId,
        kind: RouteCacheKind,
        line: &RouteCacheLine,
    ) -> Result<()> {
        self.routes.set(&mut self.store, id, kind, line)
    }

    pub fn remove_route_cache(&mut self, id: ClassicNodeId) -> Result<()> {
        self.routes.remove(&mut self.store, id)
    }

    /// Write every RAM-resident route cache group to flash
    pub fn flush_route_caches(&mut self) -> Result<()> {
        self.routes.flush_all(&mut self.store)
    }

    /// Write the RAM-resident route cache group holding `id`
    pub fn store_route_cache_file(&mut self, id: ClassicNodeId) -> Result<()> {
        self.routes.store_group_of(&mut self.store, id)
    }

    // ----- controller info -----

    /// Whole ControllerInfo record
    pub fn controller_info(&mut self) -> Result<ControllerInfo> {
        let mut buf = [0u8; ControllerInfo::SIZE];
        read_group(&mut self.store, FILE_ID_CONTROLLERINFO, &mut buf)?;
        ControllerInfo::from_bytes(&buf).ok_or(StorageError::SizeMismatch {
            key: FILE_ID_CONTROLLERINFO,
            expected: ControllerInfo::SIZE,
            actual: buf.len(),
        })
    }

    /// Read-modify-write of ControllerInfo
    fn update_controller_info(&mut self, update: impl FnOnce(&mut ControllerInfo)) -> Result<()> {
        let mut info = self.controller_info()?;
        update(&mut info);
        write_object(&mut self.store, FILE_ID_CONTROLLERINFO, &info.to_bytes())
    }

    /// Home id and own node id
    pub fn network_ids(&mut self) -> Result<([u8; HOME_ID_LENGTH], u16)> {
        let info = self.controller_info()?;
        Ok((info.home_id, info.node_id))
    }

    pub fn set_network_ids(&mut self, home_id: [u8; HOME_ID_LENGTH], node_id: u16) -> Result<()> {
        self.update_controller_info(|info| {
            info.home_id = home_id;
            info.node_id = node_id;
        })
    }

    pub fn node_id(&mut self) -> Result<u16> {
        Ok(self.controller_info()?.node_id)
    }

    pub fn static_controller_node_id(&mut self) -> Result<u16> {
        Ok(self.controller_info()?.static_controller_node_id)
    }

    pub fn set_static_controller_node_id(&mut self, id: u16) -> Result<()> {
        self.update_controller_info(|info| info.static_controller_node_id = id)
    }

    pub fn last_used_node_id(&mut self) -> Result<u8> {
        Ok(self.controller_info()?.last_used_node_id)
    }

    pub fn set_last_used_node_id(&mut self, id: ClassicNodeId) -> Result<()> {
        self.update_controller_info(|info| info.last_used_node_id = id.get())
    }

    pub fn last_used_lr_node_id(&mut self) -> Result<u16> {
        Ok(self.controller_info()?.last_used_node_id_lr)
    }

    pub fn set_last_used_lr_node_id(&mut self, id: u16) -> Result<()> {
        self.update_controller_info(|info| info.last_used_node_id_lr = id)
    }

    pub fn max_node_id(&mut self) -> Result<u8> {
        Ok(self.controller_info()?.max_node_id)
    }

    pub fn set_max_node_id(&mut self, id: u8) -> Result<()> {
        self.update_controller_info(|info| info.max_node_id = id)
    }

    pub fn max_lr_node_id(&mut self) -> Result<u16> {
        Ok(self.controller_info()?.max_node_id_lr)
    }

    pub fn set_max_lr_node_id(&mut self, id: u16) -> Result<()> {
        self.update_controller_info(|info| info.max_node_id_lr = id)
    }

    /// Reserved classic id, 0 when unassigned
    pub fn reserved_id(&mut self) -> Result<u8> {
        Ok(self.controller_info()?.reserved_id)
    }

    /// Reserve a classic id, 0 clears the reservation
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidNodeForOperation` for ids above the
    /// classic range; nothing is written.
    pub fn set_reserved_id(&mut self, id: u16) -> Result<()> {
        if id > MAX_CLASSIC_NODES {
            return Err(StorageError::InvalidNodeForOperation);
        }
        self.update_controller_info(|info| info.reserved_id = id as u8)
    }

    pub fn reserved_lr_id(&mut self) -> Result<u16> {
        Ok(self.controller_info()?.reserved_id_lr)
    }

    pub fn set_reserved_lr_id(&mut self, id: u16) -> Result<()> {
        self.update_controller_info(|info| info.reserved_id_lr = id)
    }

    pub fn controller_config(&mut self) -> Result<ControllerConfig> {
        Ok(self.controller_info()?.configuration)
    }

    pub fn set_controller_config(&mut self, config: ControllerConfig) -> Result<()> {
        self.update_controller_info(|info| info.configuration = config)
    }

    pub fn suc_last_index(&mut self) -> Result<u8> {
        Ok(self.controller_info()?.suc_last_index)
    }

    pub fn set_suc_last_index(&mut self, index: u8) -> Result<()> {
        self.update_controller_info(|info| info.suc_last_index = index)
    }

    /// Smart Start system state
    pub fn system_state(&mut self) -> Result<u8> {
        Ok(self.controller_info()?.system_state)
    }

    pub fn set_system_state(&mut self, state: u8) -> Result<()> {
        self.update_controller_info(|info| info.system_state = state)
    }

    pub fn primary_lr_channel(&mut self) -> Result<u8> {
        Ok(self.controller_info()?.primary_lr_channel)
    }

    pub fn set_primary_lr_channel(&mut self, channel: u8) -> Result<()> {
        self.update_controller_info(|info| info.primary_lr_channel = channel)
    }

    pub fn lr_channel_auto_mode(&mut self) -> Result<bool> {
        Ok(self.controller_info()?.lr_channel_auto_mode != 0)
    }

    pub fn set_lr_channel_auto_mode(&mut self, enable: bool) -> Result<()> {
        self.update_controller_info(|info| info.lr_channel_auto_mode = enable as u8)
    }

    // ----- SUC update entries -----

    /// SUC update entry at `index`
    ///
    /// `None` for an index past [`SUC_MAX_UPDATES`]. An entry in a file that
    /// was never written reads as all zero; an erased node id reads as 0.
    pub fn suc_update_entry(&mut self, index: u8) -> Result<Option<SucUpdateEntry>> {
        let index = index as usize;
        if index >= SUC_MAX_UPDATES {
            return Ok(None);
        }
        let mut buf = [0u8; SucUpdateEntry::SIZE];
        match read_exact(&mut self.store, SUC_LAYOUT.key(index), SUC_LAYOUT.offset(index), &mut buf) {
            Ok(()) | Err(StorageError::ObjectNotFound { .. }) => {}
            Err(e) => return Err(e),
        }
        Ok(SucUpdateEntry::from_bytes(&buf).map(|entry| SucUpdateEntry {
            node_id: entry.visible_node_id(),
            ..entry
        }))
    }

    /// Store the change type and node of the entry at `index`
    pub fn set_suc_update_entry(&mut self, index: u8, change_type: u8, node: ClassicNodeId) -> Result<()> {
        self.update_suc_entry(index, |entry| {
            entry.change_type = change_type;
            entry.node_id = node.get();
        })
    }

    /// Store the command class list of the entry at `index`
    pub fn set_suc_update_command_classes(
        &mut self,
        index: u8,
        command_classes: &[u8; SUC_UPDATE_NODEPARM_MAX],
    ) -> Result<()> {
        self.update_suc_entry(index, |entry| entry.node_info = *command_classes)
    }

    fn update_suc_entry(&mut self, index: u8, update: impl FnOnce(&mut SucUpdateEntry)) -> Result<()> {
        let index = index as usize;
        if index >= SUC_MAX_UPDATES {
            log_warn!("SUC update index {} out of range", index);
            return Ok(());
        }
        let key = SUC_LAYOUT.key(index);
        let mut buf = [SUC_ERASED_BYTE; FILE_SIZE_SUCNODELIST];
        match self.store.read(key, &mut buf) {
            Ok(_) | Err(NvmError::NotFound) => {}
            Err(e) => return Err(StorageError::from_read(key, e)),
        }

        let offset = SUC_LAYOUT.offset(index);
        let slot = &mut buf[offset..offset + SucUpdateEntry::SIZE];
        let mut entry = SucUpdateEntry::from_bytes(slot).unwrap_or_default();
        update(&mut entry);
        slot.copy_from_slice(&entry.to_bytes());
        write_object(&mut self.store, key, &buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockNvm;
    use crate::storage::caretaker::FileStatus;
    use crate::storage::files::{FILE_ID_APP_ROUTE_LOCK_FLAG, FILE_ID_BRIDGE_NODE_FLAG};
    use zwave_nvm_core::node::LongRangeNodeId;
    use zwave_nvm_core::records::{Capability, Reserved, Security};

    fn fresh() -> ControllerStorage<MockNvm> {
        ControllerStorage::initialize(MockNvm::new()).unwrap()
    }

    fn classic(id: u16) -> ClassicNodeId {
        ClassicNodeId::new(id).unwrap()
    }

    fn node(id: u16) -> NodeId {
        NodeId::new(id).unwrap()
    }

    fn sample_info() -> NodeInfo {
        NodeInfo {
            capability: Capability::LISTENING | Capability::ROUTING | Capability::from_bits_retain(3),
            security: Security::SPECIFIC_DEVICE,
            reserved: Reserved::BAUD_100K,
            generic: 0x10,
            specific: 0x01,
        }
    }

    #[test]
    fn test_fresh_boot() {
        let storage = fresh();
        let report = storage.boot_report();
        assert_eq!(report.migration, MigrationOutcome::FreshlyFormatted);
        assert!(report.file_status.iter().all(|s| *s == FileStatus::Ok));
        assert_eq!(report.repaired, 0);
        assert!(storage.included_nodes().is_empty());
    }

    #[test]
    fn test_node_info_classic() {
        let mut storage = fresh();
        storage.set_node_info(node(7), &sample_info()).unwrap();

        assert!(storage.node_exists(node(7)));
        assert_eq!(storage.get_node_info(node(7)).unwrap(), Some(sample_info()));
        assert_eq!(storage.get_node_info(node(8)).unwrap(), None);
        assert!(storage.is_listening(node(7)).unwrap());
        assert!(storage.is_slave(node(7)).unwrap());
        assert_eq!(storage.ctrl_suc_update_index(classic(7)).unwrap(), SUC_UNKNOWN_CONTROLLER);
        assert!(storage.node_flag(classic(7), NodeFlag::RoutingSlaveSucUpdate));
        assert!(!storage.node_flag(classic(7), NodeFlag::AppRouteLock));
    }

    #[test]
    fn test_node_info_long_range() {
        let mut storage = fresh();
        storage.set_node_info(node(300), &sample_info()).unwrap();

        let info = storage.get_node_info(node(300)).unwrap().unwrap();
        assert!(info.is_listening());
        assert!(info.security.contains(Security::SECURITY));
        assert!(storage.is_slave(node(300)).unwrap());
        assert!(storage.included_lr_nodes().contains_node(LongRangeNodeId::new(300).unwrap()));
        assert!(!storage.node_exists(node(44)));
    }

    #[test]
    fn test_remove_clears_flags_and_caches() {
        let mut storage = fresh();
        storage.set_node_info(node(3), &sample_info()).unwrap();
        storage.set_node_flag(classic(3), NodeFlag::AppRouteLock, true).unwrap();
        storage.set_cached_100k(classic(3), true);
        storage
            .set_route_cache(classic(3), RouteCacheKind::Normal, &RouteCacheLine::new([2, 0, 0, 0], 1))
            .unwrap();

        storage.remove_node_info(node(3), false).unwrap();

        assert!(!storage.node_exists(node(3)));
        assert!(!storage.cached_100k(classic(3)));
        assert!(!storage.route_cache_exists(classic(3)));
        let lock = ClassicNodeMask::from_bytes(storage.store().object(FILE_ID_APP_ROUTE_LOCK_FLAG).unwrap());
        assert!(!lock.contains_node(classic(3)));
        assert!(!storage.store().contains(NODEINFO_LAYOUT.group_key(0)));
    }

    #[test]
    fn test_remove_keeps_route_cache_on_request() {
        let mut storage = fresh();
        storage.set_node_info(node(3), &sample_info()).unwrap();
        storage
            .set_route_cache(classic(3), RouteCacheKind::Normal, &RouteCacheLine::new([2, 0, 0, 0], 1))
            .unwrap();

        storage.remove_node_info(node(3), true).unwrap();
        assert!(storage.route_cache_exists(classic(3)));
    }

    #[test]
    fn test_routing_info_deferred_batch() {
        let mut storage = fresh();
        for id in [1, 2, 4] {
            storage.set_node_info(node(id), &sample_info()).unwrap();
        }
        let mut neighbours = ClassicNodeMask::new();
        neighbours.set(4);

        assert!(!storage.routing_info_file_is_ready(classic(1), classic(4)));
        storage.set_routing_info(classic(1), Some(&neighbours), false).unwrap();
        assert_eq!(storage.routing_info(classic(1)).unwrap(), neighbours);

        assert!(storage.routing_info_file_is_ready(classic(4), classic(4)));
        storage.set_routing_info(classic(4), None, true).unwrap();

        storage.writer.invalidate();
        assert_eq!(storage.routing_info(classic(1)).unwrap(), neighbours);
        assert!(storage.routing_info(classic(4)).unwrap().is_empty());
        // Unknown nodes are ignored
        storage.set_routing_info(classic(3), Some(&neighbours), true).unwrap();
        assert!(!storage.node_exists(node(3)));
    }

    #[test]
    fn test_routing_info_file_is_ready() {
        let mut storage = fresh();
        storage.set_node_info(node(6), &sample_info()).unwrap();
        assert!(!storage.routing_info_file_is_ready(classic(5), classic(20)));
        assert!(storage.routing_info_file_is_ready(classic(6), classic(20)));
        assert!(storage.routing_info_file_is_ready(classic(8), classic(20)));
    }

    #[test]
    fn test_ctrl_suc_update_index() {
        let mut storage = fresh();
        storage.set_ctrl_suc_update_index(classic(9), 4).unwrap();
        assert!(!storage.node_exists(node(9)));

        storage.set_node_info(node(9), &sample_info()).unwrap();
        storage.set_ctrl_suc_update_index(classic(9), 4).unwrap();
        assert_eq!(storage.ctrl_suc_update_index(classic(9)).unwrap(), 4);
        assert_eq!(storage.get_node_info(node(9)).unwrap(), Some(sample_info()));
    }

    #[test]
    fn test_bridge_node_pool_single_write() {
        let mut storage = fresh();
        for id in [2, 5, 9] {
            storage.set_node_info(node(id), &sample_info()).unwrap();
        }
        let mut pool = ClassicNodeMask::new();
        pool.set(2);
        pool.set(9);
        pool.set(100);

        storage.store_mut().reset_counters();
        storage.write_bridge_node_pool(&pool).unwrap();
        assert_eq!(storage.store().counters().writes, 1);

        let mut expected = ClassicNodeMask::new();
        expected.set(2);
        expected.set(9);
        assert_eq!(storage.bridge_node_pool(), expected);
        assert_eq!(storage.store().object(FILE_ID_BRIDGE_NODE_FLAG).unwrap(), expected.as_bytes());

        storage.store_mut().reset_counters();
        storage.write_bridge_node_pool(&pool).unwrap();
        assert_eq!(storage.store().counters().writes, 0);
    }

    #[test]
    fn test_controller_info_accessors() {
        let mut storage = fresh();
        assert_eq!(storage.network_ids().unwrap(), ([0; 4], 1));
        assert_eq!(storage.last_used_lr_node_id().unwrap(), 255);
        assert_eq!(storage.suc_last_index().unwrap(), 0xFF);
        assert!(!storage.lr_channel_auto_mode().unwrap());

        storage.set_network_ids([1, 2, 3, 4], 1).unwrap();
        storage.set_last_used_node_id(classic(17)).unwrap();
        storage.set_max_lr_node_id(260).unwrap();
        storage.set_lr_channel_auto_mode(true).unwrap();
        storage.set_reserved_id(0).unwrap();

        assert_eq!(storage.network_ids().unwrap(), ([1, 2, 3, 4], 1));
        assert_eq!(storage.last_used_node_id().unwrap(), 17);
        assert_eq!(storage.max_lr_node_id().unwrap(), 260);
        assert!(storage.lr_channel_auto_mode().unwrap());
        assert!(storage
            .controller_config()
            .unwrap()
            .contains(ControllerConfig::NO_NODES_INCLUDED));
    }

    #[test]
    fn test_reserved_id_rejects_long_range() {
        let mut storage = fresh();
        storage.set_reserved_id(12).unwrap();
        assert_eq!(storage.set_reserved_id(300), Err(StorageError::InvalidNodeForOperation));
        assert_eq!(storage.reserved_id().unwrap(), 12);
    }

    #[test]
    fn test_suc_update_entries() {
        let mut storage = fresh();
        let empty = storage.suc_update_entry(10).unwrap().unwrap();
        assert_eq!(empty.node_id, 0);
        assert_eq!(empty.change_type, 0);

        storage.set_suc_update_entry(10, 0x01, classic(12)).unwrap();
        storage.set_suc_update_command_classes(10, &[0x25; 20]).unwrap();
        let entry = storage.suc_update_entry(10).unwrap().unwrap();
        assert_eq!((entry.node_id, entry.change_type), (12, 0x01));
        assert_eq!(entry.node_info, [0x25; 20]);

        // Untouched neighbour in the same file reads as erased
        let erased = storage.suc_update_entry(11).unwrap().unwrap();
        assert_eq!(erased.node_id, 0);
        assert_eq!(erased.change_type, SUC_ERASED_BYTE);

        storage.set_suc_update_entry(64, 0x01, classic(12)).unwrap();
        assert_eq!(storage.suc_update_entry(64).unwrap(), None);
        assert!(!storage.store().contains(SUC_LAYOUT.group_key(8)));
    }

    #[test]
    fn test_preferred_repeaters() {
        let mut storage = fresh();
        assert!(storage.preferred_repeaters().unwrap().is_empty());
        let mut repeaters = ClassicNodeMask::new();
        repeaters.set(33);
        storage.set_preferred_repeaters(&repeaters).unwrap();
        assert_eq!(storage.preferred_repeaters().unwrap(), repeaters);
    }

    #[test]
    fn test_speed_cache_rebuilt_on_boot() {
        let mut storage = fresh();
        storage.set_node_info(node(2), &sample_info()).unwrap();
        let mut slow = sample_info();
        slow.reserved = Reserved::empty();
        storage.set_node_info(node(3), &slow).unwrap();
        assert!(!storage.cached_100k(classic(2)));

        let storage = ControllerStorage::initialize(storage.into_inner()).unwrap();
        assert_eq!(storage.boot_report().migration, MigrationOutcome::UpToDate);
        assert!(storage.cached_100k(classic(2)));
        assert!(!storage.cached_100k(classic(3)));
    }
}

//! Storage schema migration
//!
//! The top byte of the version object is the file system version. On boot a
//! store older than [`CONTROLLER_FILESYS_VERSION`] is upgraded by running,
//! in order, every step whose `from` is not below the persisted version; the
//! new version is written once all of them succeeded.
//!
//! # Power loss
//!
//! A step can be cut off half way. The version is not bumped in that case,
//! so the same steps run again on the next boot against their own partial
//! output. Every step therefore checks the store before each write:
//!
//! - merge: reuses a merged file that already exists, skips per-node files
//!   that are already gone
//! - widen: only touches ControllerInfo while it still has the legacy size,
//!   only creates the Long Range mask when it is missing
//! - erase: erasing a missing object succeeds
//! - split: runs only while the legacy SUC list still exists, rewriting the
//!   same split files from it

use super::caretaker::write_default_set;
use super::error::{Result, StorageError};
use super::files::{
    GroupLayout, CONTROLLER_FILE_SET, FILE_ID_CONTROLLERINFO, FILE_ID_LRANGE_NODE_EXIST,
    FILE_ID_LR_TX_POWER_BASE_V2, FILE_ID_LR_TX_POWER_BASE_V3, FILE_ID_LR_TX_POWER_COUNT_V2,
    FILE_ID_LR_TX_POWER_COUNT_V3, FILE_ID_NODEINFO_LEGACY_BASE, FILE_ID_NODEROUTE_CACHE_LEGACY_BASE,
    FILE_ID_NODE_ROUTECACHE_EXIST, FILE_ID_NODE_STORAGE_EXIST, FILE_ID_S2_DEPRECATED,
    FILE_ID_SUCNODELIST_LEGACY, FILE_ID_ZW_VERSION, FILE_SIZE_LR_NODE_MASK, FILE_SIZE_NODEINFO,
    FILE_SIZE_SUCNODELIST, NODEINFO_LAYOUT, ROUTE_CACHE_LAYOUT, SUCNODES_PER_FILE, SUC_LAYOUT,
};
use super::grouped::{erase_object, group_in_use, write_object, UNUSED_GROUP_BYTE};
use crate::platform::{NvmError, NvmInterface, ObjectKey};
use crate::{log_error, log_info, log_warn};
use zwave_nvm_core::node::ClassicNodeMask;
use zwave_nvm_core::records::{
    ControllerInfo, LegacyControllerInfo, SchemaVersion, SucUpdateEntry, SUC_ERASED_BYTE,
    SUC_MAX_UPDATES,
};

/// File system version written by this firmware
pub const CONTROLLER_FILESYS_VERSION: u8 = 5;

/// Firmware version stored next to the file system version
pub const FIRMWARE_VERSION: (u8, u8, u8) = (7, 22, 0);

/// Version object contents after a successful boot
pub const CURRENT_VERSION: SchemaVersion = SchemaVersion::new(
    CONTROLLER_FILESYS_VERSION,
    FIRMWARE_VERSION.0,
    FIRMWARE_VERSION.1,
    FIRMWARE_VERSION.2,
);

/// One layout transformation
#[derive(Clone, Copy)]
pub struct MigrationStep {
    /// Highest persisted file system version the step applies to
    pub from: u8,
    /// File system version the step leaves behind
    pub to: u8,
    pub name: &'static str,
    pub run: fn(&mut dyn NvmInterface) -> Result<()>,
}

/// Upgrade steps in ascending order
///
/// There is no 2 → 3 step; version 3 only existed on firmware that was never
/// released with a controller.
pub static MIGRATION_STEPS: [MigrationStep; 4] = [
    MigrationStep {
        from: 0,
        to: 1,
        name: "merge node files",
        run: merge_node_files,
    },
    MigrationStep {
        from: 1,
        to: 2,
        name: "widen controller info",
        run: widen_controller_info,
    },
    MigrationStep {
        from: 3,
        to: 4,
        name: "erase tx power",
        run: erase_tx_power,
    },
    MigrationStep {
        from: 4,
        to: 5,
        name: "split suc node list",
        run: split_suc_node_list,
    },
];

/// What the boot-time migration did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MigrationOutcome {
    /// No version object: the store was formatted and provisioned
    FreshlyFormatted,
    /// Persisted file system version already current
    UpToDate,
    /// Steps were applied and the version bumped
    Migrated { from: u8, to: u8, steps: usize },
    /// Persisted file system version is newer than this firmware; nothing touched
    DowngradeRefused { persisted: u8 },
}

/// Persisted version, `None` if the object is missing
pub fn read_version<S: NvmInterface + ?Sized>(store: &mut S) -> Result<Option<SchemaVersion>> {
    let mut buf = [0u8; SchemaVersion::SIZE];
    match store.read(FILE_ID_ZW_VERSION, &mut buf) {
        Ok(len) if len == SchemaVersion::SIZE => Ok(SchemaVersion::from_bytes(&buf)),
        Ok(len) => Err(StorageError::SizeMismatch {
            key: FILE_ID_ZW_VERSION,
            expected: SchemaVersion::SIZE,
            actual: len,
        }),
        Err(NvmError::NotFound) => Ok(None),
        Err(e) => Err(StorageError::from_read(FILE_ID_ZW_VERSION, e)),
    }
}

/// Bring the store to [`CURRENT_VERSION`]
///
/// # Errors
///
/// Returns `StorageError::MigrationFailed` naming the first step that
/// failed. The version object is left as it was so the steps run again on
/// the next boot.
pub fn run<S: NvmInterface>(store: &mut S) -> Result<MigrationOutcome> {
    run_steps(store, &MIGRATION_STEPS)
}

fn run_steps(store: &mut dyn NvmInterface, steps: &[MigrationStep]) -> Result<MigrationOutcome> {
    let persisted = match read_version(store)? {
        Some(version) => version.filesys(),
        None => {
            log_info!("Migration: no version object, formatting store");
            store
                .format()
                .map_err(|_| StorageError::MigrationFailed { step: "format" })?;
            write_default_set(store, &CONTROLLER_FILE_SET)?;
            write_object(store, FILE_ID_ZW_VERSION, &CURRENT_VERSION.to_bytes())?;
            return Ok(MigrationOutcome::FreshlyFormatted);
        }
    };

    if persisted > CONTROLLER_FILESYS_VERSION {
        log_warn!(
            "Migration: file system version {} is newer than {}, refusing downgrade",
            persisted,
            CONTROLLER_FILESYS_VERSION
        );
        return Ok(MigrationOutcome::DowngradeRefused { persisted });
    }
    if persisted == CONTROLLER_FILESYS_VERSION {
        return Ok(MigrationOutcome::UpToDate);
    }

    let mut applied = 0;
    for step in steps.iter().filter(|step| persisted <= step.from) {
        log_info!("Migration: {} ({} -> {})", step.name, step.from, step.to);
        (step.run)(store).map_err(|e| {
            log_error!("Migration: step '{}' failed: {}", step.name, e);
            StorageError::MigrationFailed { step: step.name }
        })?;
        applied += 1;
    }

    write_object(store, FILE_ID_ZW_VERSION, &CURRENT_VERSION.to_bytes())?;
    log_info!(
        "Migration: file system {} -> {}, {} steps",
        persisted,
        CONTROLLER_FILESYS_VERSION,
        applied
    );
    Ok(MigrationOutcome::Migrated {
        from: persisted,
        to: CONTROLLER_FILESYS_VERSION,
        steps: applied,
    })
}

fn read_mask_or_empty(store: &mut dyn NvmInterface, key: ObjectKey) -> Result<ClassicNodeMask> {
    let mut buf = [0u8; ClassicNodeMask::SIZE];
    match store.read(key, &mut buf) {
        Ok(_) | Err(NvmError::NotFound) => Ok(ClassicNodeMask::from_bytes(&buf)),
        Err(e) => Err(StorageError::from_read(key, e)),
    }
}

/// 0 → 1: pack per-node NodeInfo and route cache objects into group files
fn merge_node_files(store: &mut dyn NvmInterface) -> Result<()> {
    let exists = read_mask_or_empty(store, FILE_ID_NODE_STORAGE_EXIST)?;
    merge_layout(store, &NODEINFO_LAYOUT, FILE_ID_NODEINFO_LEGACY_BASE, &exists)?;

    let exists = read_mask_or_empty(store, FILE_ID_NODE_ROUTECACHE_EXIST)?;
    merge_layout(store, &ROUTE_CACHE_LAYOUT, FILE_ID_NODEROUTE_CACHE_LEGACY_BASE, &exists)
}

fn merge_layout(
    store: &mut dyn NvmInterface,
    layout: &GroupLayout,
    legacy_base: ObjectKey,
    exists: &ClassicNodeMask,
) -> Result<()> {
    let mut scratch = [0u8; FILE_SIZE_NODEINFO];
    for group in 0..layout.file_count() {
        if !group_in_use(layout, exists, group) {
            continue;
        }
        let key = layout.group_key(group);
        let buf = &mut scratch[..layout.file_size()];
        buf.fill(UNUSED_GROUP_BYTE);

        // A previous, interrupted run may already have merged some nodes
        match store.read(key, buf) {
            Ok(_) | Err(NvmError::NotFound) => {}
            Err(e) => return Err(StorageError::from_read(key, e)),
        }

        let mut placed = false;
        for index in layout.siblings(group).filter(|&i| exists.test(i as u16 + 1)) {
            let legacy_key = legacy_base + index as ObjectKey;
            let offset = layout.offset(index);
            match store.read(legacy_key, &mut buf[offset..offset + layout.record_size]) {
                Ok(_) => placed = true,
                Err(NvmError::NotFound) => {}
                Err(e) => return Err(StorageError::from_read(legacy_key, e)),
            }
        }

        if placed {
            write_object(store, key, buf)?;
        }
        for index in layout.siblings(group).filter(|&i| exists.test(i as u16 + 1)) {
            erase_object(store, legacy_base + index as ObjectKey)?;
        }
    }
    Ok(())
}

/// ≤ 1 → 2: widen ControllerInfo, drop S2 objects, create the Long Range mask
fn widen_controller_info(store: &mut dyn NvmInterface) -> Result<()> {
    match store.object_size(FILE_ID_CONTROLLERINFO) {
        Ok(size) if size != ControllerInfo::SIZE => {
            let mut buf = [0u8; LegacyControllerInfo::SIZE];
            store
                .read(FILE_ID_CONTROLLERINFO, &mut buf)
                .map_err(|e| StorageError::from_read(FILE_ID_CONTROLLERINFO, e))?;
            let legacy = LegacyControllerInfo::from_bytes(&buf).ok_or(StorageError::SizeMismatch {
                key: FILE_ID_CONTROLLERINFO,
                expected: LegacyControllerInfo::SIZE,
                actual: size,
            })?;
            write_object(
                store,
                FILE_ID_CONTROLLERINFO,
                &ControllerInfo::from_legacy(&legacy).to_bytes(),
            )?;
        }
        Ok(_) | Err(NvmError::NotFound) => {}
        Err(e) => return Err(StorageError::from_read(FILE_ID_CONTROLLERINFO, e)),
    }

    for key in FILE_ID_S2_DEPRECATED {
        erase_object(store, key)?;
    }

    if let Err(NvmError::NotFound) = store.object_size(FILE_ID_LRANGE_NODE_EXIST) {
        write_object(store, FILE_ID_LRANGE_NODE_EXIST, &[0u8; FILE_SIZE_LR_NODE_MASK])?;
    }
    Ok(())
}

/// ≤ 3 → 4: TX power is no longer stored
fn erase_tx_power(store: &mut dyn NvmInterface) -> Result<()> {
    let ranges = [
        (FILE_ID_LR_TX_POWER_BASE_V2, FILE_ID_LR_TX_POWER_COUNT_V2),
        (FILE_ID_LR_TX_POWER_BASE_V3, FILE_ID_LR_TX_POWER_COUNT_V3),
    ];
    for (base, count) in ranges {
        for key in base..base + count {
            erase_object(store, key)?;
        }
    }
    Ok(())
}

/// ≤ 4 → 5: split the legacy SUC list into files of eight entries
///
/// Files that would only hold unused entries are not created.
fn split_suc_node_list(store: &mut dyn NvmInterface) -> Result<()> {
    match store.object_size(FILE_ID_SUCNODELIST_LEGACY) {
        Ok(_) => {}
        Err(NvmError::NotFound) => return Ok(()),
        Err(e) => return Err(StorageError::from_read(FILE_ID_SUCNODELIST_LEGACY, e)),
    }

    for file in 0..SUC_MAX_UPDATES / SUCNODES_PER_FILE {
        let mut buf = [SUC_ERASED_BYTE; FILE_SIZE_SUCNODELIST];
        let mut has_data = false;

        for slot in 0..SUCNODES_PER_FILE {
            let index = file * SUCNODES_PER_FILE + slot;
            let mut raw = [0u8; SucUpdateEntry::SIZE];
            match store.read_part(FILE_ID_SUCNODELIST_LEGACY, index * SucUpdateEntry::SIZE, &mut raw) {
                Ok(()) => {}
                Err(NvmError::NotFound | NvmError::OutOfRange) => continue,
                Err(e) => return Err(StorageError::from_read(FILE_ID_SUCNODELIST_LEGACY, e)),
            }
            if SucUpdateEntry::from_bytes(&raw).is_some_and(|entry| entry.has_data()) {
                let offset = SUC_LAYOUT.offset(index);
                buf[offset..offset + SucUpdateEntry::SIZE].copy_from_slice(&raw);
                has_data = true;
            }
        }

        if has_data {
            write_object(store, SUC_LAYOUT.group_key(file), &buf)?;
        }
    }

    erase_object(store, FILE_ID_SUCNODELIST_LEGACY)
}

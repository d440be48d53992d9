#![cfg_attr(not(test), no_std)]

//! zwave_nvm - Persistent storage engine for Z-Wave controllers
//!
//! This library maps controller and per-node network state onto a
//! flash-backed NVM object store, keeps a small write-back cache of route
//! caches in RAM and migrates the on-flash layout across firmware versions.

#[cfg(all(not(test), feature = "mock"))]
extern crate std;

// Platform abstraction layer (NVM object store)
pub mod platform;

// Core infrastructure (logging)
pub mod core;

// Storage engine
pub mod storage;

pub use zwave_nvm_core::node::{
    ClassicNodeId, ClassicNodeMask, LongRangeNodeId, LongRangeNodeMask, NodeId,
};
pub use zwave_nvm_core::records;

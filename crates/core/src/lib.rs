//! zwave_nvm_core - Pure no_std types for Z-Wave controller persistent storage
//!
//! This crate contains the bit-exact record layouts and node addressing rules
//! that the storage engine in the root crate persists to the NVM object store.
//! Nothing in here touches a store; everything can be tested on host.
//!
//! # Design Principles
//!
//! - **Zero cfg**: No `#[cfg(feature = ...)]` directives allowed
//! - **Pure no_std**: No std library dependencies
//! - **Allocation free**: Codecs work on fixed-size arrays and slices
//!
//! # Modules
//!
//! - [`node`]: Classic / Long Range node id types and node bit masks
//! - [`records`]: NodeInfo, RouteCache, SUC update, ControllerInfo and
//!   schema version layouts

#![no_std]

pub mod node;
pub mod records;

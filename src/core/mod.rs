//! Core infrastructure
//!
//! This module contains the logging macros shared by the storage engine.

pub mod logging;

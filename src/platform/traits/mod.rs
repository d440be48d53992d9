//! Platform abstraction traits
//!
//! This module defines the traits that platform implementations must provide.

pub mod nvm;

// Re-export trait interfaces
pub use nvm::{NvmInterface, ObjectKey};

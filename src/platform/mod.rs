//! Platform abstraction layer
//!
//! This module provides the hardware abstraction the storage engine consumes.
//! All store-specific code must stay behind these traits.

pub mod error;
pub mod traits;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export commonly used types
pub use error::{NvmError, Result};
pub use traits::{NvmInterface, ObjectKey};

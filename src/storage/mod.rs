//! Controller storage engine
//!
//! Maps controller-wide state and per-node records onto the NVM object
//! store.
//!
//! # Layers
//!
//! - [`files`]: object keys, sizes and group layouts of the on-flash format
//! - [`grouped`]: reads and writes of records packed several to an object
//! - [`route_cache`]: RAM write-back cache of route cache group files
//! - [`caretaker`]: presence and size checks of controller objects
//! - [`migration`]: upgrade chain between on-flash layout versions
//! - [`controller`]: the engine tying the above together

pub mod caretaker;
pub mod controller;
pub mod error;
pub mod files;
pub mod grouped;
pub mod migration;
pub mod route_cache;

pub use caretaker::{FileDescriptor, FileStatus};
pub use controller::{BootReport, ControllerStorage};
pub use error::{Result, StorageError};
pub use files::NodeFlag;
pub use migration::{MigrationOutcome, CURRENT_VERSION};

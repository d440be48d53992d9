//! Persisted record layouts
//!
//! Every record here is part of the on-flash format. Byte layouts are fixed
//! and shared with existing flash images; changing any of them needs a
//! migration step in the storage engine.

pub mod controller_info;
pub mod node_info;
pub mod route_cache;
pub mod suc;
pub mod version;

pub use controller_info::{ControllerConfig, ControllerInfo, LegacyControllerInfo, HOME_ID_LENGTH};
pub use node_info::{
    Capability, LongRangeFlags, LongRangeNodeInfo, NodeInfo, NodeInfoSlot, Reserved, Security,
    SUC_UNKNOWN_CONTROLLER,
};
pub use route_cache::{NodeRouteCache, RouteCacheKind, RouteCacheLine, MAX_REPEATERS};
pub use suc::{SucUpdateEntry, SUC_ERASED_BYTE, SUC_MAX_UPDATES, SUC_UPDATE_NODEPARM_MAX};
pub use version::SchemaVersion;

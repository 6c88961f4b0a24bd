pub mod error;
pub mod types;
pub mod rpc;
pub mod api;
pub mod helpers;
pub mod config;
pub mod modules;
pub mod inventory;
pub mod events;
pub mod utils;

#[cfg(test)]
mod tests;

pub use error::UyuniError;
pub use types::{
    ActionStatus, ChainAction, ChainSummary, ConnectionConfig, CustomValues, GroupMembership,
    HostRef, NetworkInfo, PackageInfo, PackageUpgrade, Patch, PatchRef, RebootEvent, SystemDetails,
    SystemGroup, SystemSummary, UserDetails,
};
pub use api::{UyuniClient, DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT};
pub use config::{EventSourceArgs, InventoryConfig};
pub use modules::{GroupState, ModuleOutcome, ModuleRunner, ModuleSpec};
pub use inventory::{InventoryHost, UyuniInventory};
pub use events::{MockRebootEventSource, RebootEventSource};

// 便捷的重新导出
pub type Result<T> = std::result::Result<T, UyuniError>;

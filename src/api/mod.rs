// Uyuni API 客户端核心模块
mod actions;
mod chains;
mod client;
mod custominfo;
mod fault;
mod groups;
mod packages;
mod systems;

// 重新导出 UyuniClient，使外部可以直接使用
pub use actions::{DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT};
pub use client::UyuniClient;

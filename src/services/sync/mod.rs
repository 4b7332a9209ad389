//! 注册中心之间的尽力而为同步
//!
//! - `types`: 同步线格式
//! - `peer_sync`: 变更推送与周期全量推送

pub mod peer_sync;
pub mod types;

pub use peer_sync::{FULL_SYNC_PATH, PeerSync, SYNC_PATH, SyncSettings};
pub use types::{SyncAction, SyncBatch, SyncMessage, SyncResponse, SyncedInstance};

//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryStore** / **FileStore**: DurableKeyValueStore
//! - **NetworkStatus**: NetworkStatusProvider（手動切り替え）
//! - **ProbeTarget** / **NetworkProbe**: 到達確認（1 回 / 定期）で NetworkStatus を更新
//! - **ReqwestTransport**: HttpTransport

pub mod file_store;
pub mod memory_store;
pub mod network_probe;
pub mod network_status;
pub mod reqwest_transport;

pub use self::file_store::FileStore;
pub use self::memory_store::InMemoryStore;
pub use self::network_probe::{NetworkProbe, ProbeTarget};
pub use self::network_status::NetworkStatus;
pub use self::reqwest_transport::ReqwestTransport;

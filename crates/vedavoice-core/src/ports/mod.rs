//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! ブラウザ依存（`navigator.onLine`, `localStorage`, `fetch`, `Date.now`）を
//! 小さな trait に置き換え、構築時に注入します。

pub mod clock;
pub mod id_generator;
pub mod key_value_store;
pub mod network;
pub mod transport;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::key_value_store::DurableKeyValueStore;
pub use self::network::NetworkStatusProvider;
pub use self::transport::{HttpTransport, TransportResponse};

//! NetworkStatusProvider port - 接続状態の抽象化
//!
//! ブラウザの `navigator.onLine` + `online` / `offline` イベントに相当。

use tokio::sync::watch;

/// NetworkStatusProvider は到達可能性を報告
///
/// - `is_online()`: 今この瞬間の状態（drain ループの各イテレーションで参照）
/// - `watch()`: 状態変化の購読（offline -> online で drain を再開するため）
pub trait NetworkStatusProvider: Send + Sync {
    fn is_online(&self) -> bool;

    fn watch(&self) -> watch::Receiver<bool>;
}

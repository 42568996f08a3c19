//! NetworkStatus - watch channel で保持する online フラグ
//!
//! `set_online` は状態が変わったときだけ購読者に通知する
//! （ブラウザの `online` / `offline` イベントと同じ粒度）。

use std::sync::Arc;

use tokio::sync::watch;

use crate::ports::NetworkStatusProvider;

/// Cloneable handle; all clones share the same flag.
#[derive(Debug, Clone)]
pub struct NetworkStatus {
    tx: Arc<watch::Sender<bool>>,
}

impl NetworkStatus {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn online() -> Self {
        Self::new(true)
    }

    pub fn offline() -> Self {
        Self::new(false)
    }

    /// Update the flag. Returns `true` if this was a transition.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            tracing::info!(online, "network status changed");
        }
        changed
    }
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self::online()
    }
}

impl NetworkStatusProvider for NetworkStatus {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_online_reports_transitions_only() {
        let status = NetworkStatus::online();

        assert!(!status.set_online(true));
        assert!(status.set_online(false));
        assert!(!status.is_online());
        assert!(status.set_online(true));
    }

    #[tokio::test]
    async fn watchers_see_changes_from_clones() {
        let status = NetworkStatus::offline();
        let mut rx = status.watch();
        let handle = status.clone();

        handle.set_online(true);

        rx.changed().await.unwrap();
        assert!(*rx.borrow());
        assert!(status.is_online());
    }
}

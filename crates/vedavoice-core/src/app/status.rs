//! Status - UI バッジ / CLI 向けのスナップショット

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point-in-time view of a RetryQueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    /// Pending requests.
    pub length: usize,
    /// A drain loop is running.
    pub processing: bool,
    pub online: bool,
    /// Creation time of the oldest pending request.
    pub oldest: Option<DateTime<Utc>>,
}

impl QueueStatus {
    /// One-line summary, e.g. `3 pending (online, draining)`.
    pub fn summary(&self) -> String {
        let network = if self.online { "online" } else { "offline" };
        if self.processing {
            format!("{} pending ({network}, draining)", self.length)
        } else {
            format!("{} pending ({network})", self.length)
        }
    }
}

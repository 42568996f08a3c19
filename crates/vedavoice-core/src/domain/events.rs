//! Events - キューの変化通知
//!
//! UI バッジ（"N pending"）や "sync failed" トーストが購読する想定。

use serde::{Deserialize, Serialize};

use super::ids::RequestId;

/// What happened to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueEventKind {
    Added,
    Processed,
    Failed,
    Cleared,
}

/// Emitted after every mutating queue operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEvent {
    pub kind: QueueEventKind,
    /// Queue length after the mutation.
    pub queue_length: usize,
    /// The item the event is about (`None` for `Cleared`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
}

impl QueueEvent {
    pub fn new(kind: QueueEventKind, queue_length: usize, request_id: Option<RequestId>) -> Self {
        Self {
            kind,
            queue_length,
            request_id,
        }
    }
}

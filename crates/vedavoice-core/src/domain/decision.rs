//! Decision model: what the drain loop does after one delivery attempt.
//!
//! The Decider is a pure function (item + outcome + connectivity -> Decision).
//! Applying the decision (popping the item, bumping `retry_count`, sleeping,
//! emitting events) is the drain loop's job.

use std::time::Duration;

use super::outcome::DeliveryOutcome;
use super::request::QueuedRequest;
use crate::queue::RetryPolicy;

/// The next action for the head item.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// 2xx: remove the item and report it processed.
    Complete,

    /// 4xx: a malformed/unauthorized request will not succeed on retry.
    Reject { status: u16 },

    /// Transient failure below the ceiling: bump `retry_count` to `attempts`,
    /// wait `delay`, then retry the same head item.
    Retry { attempts: u32, delay: Duration },

    /// Transient failure that reached `max_retries`.
    GiveUp { attempts: u32, reason: String },

    /// Transport failed because the network is unreachable: stop draining,
    /// do not count the attempt.
    Pause,
}

/// Trait for deciding the next action based on the item and its outcome.
pub trait Decider: Send + Sync {
    /// # Arguments
    /// * `item` - The head item (with `retry_count` before this attempt)
    /// * `outcome` - Result of the attempt just made
    /// * `online` - Network reachability observed after the attempt
    fn decide(&self, item: &QueuedRequest, outcome: &DeliveryOutcome, online: bool) -> Decision;
}

/// Default decider.
///
/// - 2xx -> Complete
/// - 4xx -> Reject (never retried, regardless of `max_retries`)
/// - unreachable host, or transport error while offline -> Pause
/// - anything else -> Retry until `retry_count + 1 >= max_retries`, then GiveUp
#[derive(Debug, Clone)]
pub struct DefaultDecider {
    retry_policy: RetryPolicy,
}

impl DefaultDecider {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }
}

impl Default for DefaultDecider {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, item: &QueuedRequest, outcome: &DeliveryOutcome, online: bool) -> Decision {
        if outcome.is_success() {
            return Decision::Complete;
        }

        match outcome {
            DeliveryOutcome::Response { status } if outcome.is_client_error() => {
                return Decision::Reject { status: *status };
            }
            DeliveryOutcome::Unreachable { .. } => return Decision::Pause,
            DeliveryOutcome::TransportFailed { .. } if !online => return Decision::Pause,
            _ => {}
        }

        let attempts = item.retry_count.saturating_add(1);
        if attempts >= item.max_retries {
            let reason = match outcome {
                DeliveryOutcome::Response { status } => format!(
                    "API request failed after {} retries (last status {status})",
                    item.max_retries
                ),
                DeliveryOutcome::TransportFailed { error }
                | DeliveryOutcome::Unreachable { error } => format!(
                    "API request failed after {} retries: {error}",
                    item.max_retries
                ),
            };
            Decision::GiveUp { attempts, reason }
        } else {
            Decision::Retry {
                attempts,
                delay: self.retry_policy.next_delay(attempts),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewRequest, RequestId};
    use chrono::Utc;
    use rstest::rstest;
    use ulid::Ulid;

    fn item(retry_count: u32, max_retries: u32) -> QueuedRequest {
        let mut item = QueuedRequest::from_new(
            NewRequest::post("https://api.example/verses"),
            RequestId::from_ulid(Ulid::new()),
            Utc::now(),
            max_retries,
        );
        item.retry_count = retry_count;
        item
    }

    fn decider() -> DefaultDecider {
        DefaultDecider::new(RetryPolicy::default())
    }

    #[rstest]
    #[case(200)]
    #[case(201)]
    #[case(204)]
    fn success_completes(#[case] status: u16) {
        let d = decider().decide(&item(0, 3), &DeliveryOutcome::Response { status }, true);
        assert_eq!(d, Decision::Complete);
    }

    #[rstest]
    #[case(400)]
    #[case(401)]
    #[case(404)]
    #[case(422)]
    fn client_errors_are_rejected_even_with_retries_left(#[case] status: u16) {
        let d = decider().decide(&item(0, 10), &DeliveryOutcome::Response { status }, true);
        assert_eq!(d, Decision::Reject { status });
    }

    #[rstest]
    #[case(500)]
    #[case(503)]
    #[case(302)]
    fn other_statuses_retry_with_backoff(#[case] status: u16) {
        let d = decider().decide(&item(1, 3), &DeliveryOutcome::Response { status }, true);
        assert_eq!(
            d,
            Decision::Retry {
                attempts: 2,
                delay: Duration::from_secs(2)
            }
        );
    }

    #[test]
    fn gives_up_when_ceiling_reached() {
        let d = decider().decide(&item(2, 3), &DeliveryOutcome::Response { status: 503 }, true);
        assert!(matches!(d, Decision::GiveUp { attempts: 3, .. }));
    }

    #[test]
    fn transport_error_offline_pauses() {
        let outcome = DeliveryOutcome::TransportFailed {
            error: "connection refused".into(),
        };
        assert_eq!(decider().decide(&item(0, 3), &outcome, false), Decision::Pause);
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn unreachable_host_pauses_even_on_last_attempt(#[case] online: bool) {
        let outcome = DeliveryOutcome::Unreachable {
            error: "connection refused".into(),
        };
        assert_eq!(decider().decide(&item(2, 3), &outcome, online), Decision::Pause);
    }

    #[test]
    fn transport_error_online_counts_as_transient() {
        let outcome = DeliveryOutcome::TransportFailed {
            error: "connection reset".into(),
        };
        assert_eq!(
            decider().decide(&item(0, 3), &outcome, true),
            Decision::Retry {
                attempts: 1,
                delay: Duration::from_secs(1)
            }
        );
    }

    #[test]
    fn zero_max_retries_gives_up_after_first_failure() {
        let d = decider().decide(&item(0, 0), &DeliveryOutcome::Response { status: 500 }, true);
        assert!(matches!(d, Decision::GiveUp { attempts: 1, .. }));
    }
}

//! Outcome of one delivery attempt.

use crate::error::TransportError;
use crate::ports::TransportResponse;

/// What the transport reported for a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The server answered (any status code).
    Response { status: u16 },

    /// No response at all (reset, timeout, TLS, invalid request, ...).
    TransportFailed { error: String },

    /// The host could not be reached; says nothing about the request itself.
    Unreachable { error: String },
}

impl DeliveryOutcome {
    pub fn status(&self) -> Option<u16> {
        match self {
            DeliveryOutcome::Response { status } => Some(*status),
            DeliveryOutcome::TransportFailed { .. } | DeliveryOutcome::Unreachable { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryOutcome::Response { status } if (200..300).contains(status))
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, DeliveryOutcome::Response { status } if (400..500).contains(status))
    }
}

impl From<Result<TransportResponse, TransportError>> for DeliveryOutcome {
    fn from(result: Result<TransportResponse, TransportError>) -> Self {
        match result {
            Ok(response) => DeliveryOutcome::Response {
                status: response.status,
            },
            Err(error @ TransportError::Unreachable(_)) => DeliveryOutcome::Unreachable {
                error: error.to_string(),
            },
            Err(error) => DeliveryOutcome::TransportFailed {
                error: error.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_status_ranges() {
        assert!(DeliveryOutcome::Response { status: 204 }.is_success());
        assert!(!DeliveryOutcome::Response { status: 304 }.is_success());
        assert!(DeliveryOutcome::Response { status: 404 }.is_client_error());
        assert!(!DeliveryOutcome::Response { status: 503 }.is_client_error());
    }

    #[test]
    fn transport_error_has_no_status() {
        let outcome: DeliveryOutcome =
            Err::<TransportResponse, _>(TransportError::Network("refused".into())).into();

        assert_eq!(outcome.status(), None);
        assert!(!outcome.is_success());
    }

    #[test]
    fn unreachable_host_is_its_own_outcome() {
        let outcome: DeliveryOutcome =
            Err::<TransportResponse, _>(TransportError::Unreachable("refused".into())).into();

        assert!(matches!(outcome, DeliveryOutcome::Unreachable { .. }));
        assert_eq!(outcome.status(), None);
    }
}

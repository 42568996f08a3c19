//! Domain model (ids, queued requests, events, outcomes, decisions).

pub mod decision;
pub mod events;
pub mod ids;
pub mod outcome;
pub mod request;

pub use decision::{Decider, Decision, DefaultDecider};
pub use events::{QueueEvent, QueueEventKind};
pub use ids::{IdParseError, RequestId, SubscriptionId};
pub use outcome::DeliveryOutcome;
pub use request::{NewRequest, Priority, QueuedRequest};

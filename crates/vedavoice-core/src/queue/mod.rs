//! Queue module: persistent store, event bus, retry policy, and the drain loop.

mod events;
mod retry;
mod retry_queue;
mod store;


pub use events::{EventBus, Subscription};
pub use retry::RetryPolicy;
pub use retry_queue::{DrainReport, DrainSignal, RetryQueue};
pub use store::QueueStore;

pub(crate) use retry_queue::QueueParts;

//! EventBus - キュー変化の購読
//!
//! # 契約
//! - listener は変更の「後」に、登録順で呼ばれる
//! - backpressure はない。listener は軽く、ブロックしないこと
//! - listener が panic してもキューは止まらない（catch してログに残す）

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::domain::{QueueEvent, SubscriptionId};
use crate::ports::IdGenerator;

type Listener = Arc<dyn Fn(&QueueEvent) + Send + Sync>;

pub struct EventBus {
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    ids: Arc<dyn IdGenerator>,
}

impl EventBus {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            ids,
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        let id = self.ids.generate_subscription_id();
        self.lock().push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(sub, _)| *sub != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver `event` to every listener.
    ///
    /// The listener list is copied first, so listeners may (un)subscribe
    /// from inside the callback.
    pub fn emit(&self, event: QueueEvent) {
        let listeners: Vec<(SubscriptionId, Listener)> = self.lock().clone();
        for (id, listener) in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                tracing::warn!(subscription = %id, kind = ?event.kind, "queue listener panicked");
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle returned by `RetryQueue::subscribe`.
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: SubscriptionId,
    bus: Weak<EventBus>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, bus: &Arc<EventBus>) -> Self {
        Self {
            id,
            bus: Arc::downgrade(bus),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns `false` if the listener was already removed (or the queue is gone).
    pub fn unsubscribe(self) -> bool {
        self.bus
            .upgrade()
            .is_some_and(|bus| bus.unsubscribe(self.id))
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QueueEventKind;
    use crate::ports::{SystemClock, UlidGenerator};

    fn bus() -> Arc<EventBus> {
        Arc::new(EventBus::new(Arc::new(UlidGenerator::new(SystemClock))))
    }

    fn event(kind: QueueEventKind, len: usize) -> QueueEvent {
        QueueEvent::new(kind, len, None)
    }

    #[test]
    fn listeners_receive_events_in_order() {
        let bus = bus();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(move |e| sink.lock().unwrap().push((e.kind, e.queue_length)));

        bus.emit(event(QueueEventKind::Added, 1));
        bus.emit(event(QueueEventKind::Processed, 0));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(QueueEventKind::Added, 1), (QueueEventKind::Processed, 0)]
        );
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = bus();
        let seen = Arc::new(Mutex::new(0usize));
        let sink = seen.clone();
        let id = bus.subscribe(move |_| *sink.lock().unwrap() += 1);
        let sub = Subscription::new(id, &bus);

        bus.emit(event(QueueEventKind::Added, 1));
        assert!(sub.clone().unsubscribe());
        bus.emit(event(QueueEventKind::Added, 2));

        assert_eq!(*seen.lock().unwrap(), 1);
        assert!(!sub.unsubscribe());
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let bus = bus();
        let seen = Arc::new(Mutex::new(0usize));
        let sink = seen.clone();
        bus.subscribe(|_| panic!("listener bug"));
        bus.subscribe(move |_| *sink.lock().unwrap() += 1);

        bus.emit(event(QueueEventKind::Failed, 0));

        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn listener_may_unsubscribe_itself() {
        let bus = bus();
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let weak = Arc::downgrade(&bus);
        let own = slot.clone();
        let id = bus.subscribe(move |_| {
            if let (Some(bus), Some(id)) = (weak.upgrade(), *own.lock().unwrap()) {
                bus.unsubscribe(id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        bus.emit(event(QueueEventKind::Cleared, 0));

        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn subscription_outliving_bus_is_harmless() {
        let bus = bus();
        let id = bus.subscribe(|_| {});
        let sub = Subscription::new(id, &bus);
        drop(bus);

        assert!(!sub.unsubscribe());
    }
}

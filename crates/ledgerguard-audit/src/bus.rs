//! Explicitly constructed subscriber registry.
//!
//! The registry is created by the host and handed to the audit service at
//! construction time. There is no global bus: two services in one process
//! (or two tests) never observe each other's notices.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use tracing::{trace, warn};

use ledgerguard_contracts::notice::ChainNotice;
use ledgerguard_core::traits::{Publisher, Subscriber};

/// Synchronous fan-out of `ChainNotice`s to registered subscribers.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: RwLock<Vec<Arc<dyn Subscriber>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, subscriber: Arc<dyn Subscriber>) {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        subscribers.push(subscriber);
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<dyn Subscriber>> {
        self.subscribers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl Publisher for SubscriberRegistry {
    /// Deliver `notice` to every subscriber in registration order.
    ///
    /// A subscriber that panics is logged and skipped; the rest still
    /// receive the notice.
    fn publish(&self, notice: ChainNotice) {
        trace!(kind = notice.kind(), "publishing chain notice");
        for subscriber in self.snapshot() {
            let delivered = catch_unwind(AssertUnwindSafe(|| subscriber.notify(&notice)));
            if delivered.is_err() {
                warn!(
                    subscriber = subscriber.name(),
                    kind = notice.kind(),
                    "subscriber panicked while handling notice"
                );
            }
        }
    }
}

/// A publisher that drops every notice.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPublisher;

impl Publisher for NullPublisher {
    fn publish(&self, _notice: ChainNotice) {}
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use ledgerguard_contracts::notice::ChainNotice;
    use ledgerguard_core::traits::{Publisher, Subscriber};

    use super::SubscriberRegistry;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl Subscriber for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn notify(&self, notice: &ChainNotice) {
            self.seen.lock().unwrap().push(notice.kind().to_string());
        }
    }

    struct Panicker;

    impl Subscriber for Panicker {
        fn name(&self) -> &str {
            "panicker"
        }

        fn notify(&self, _notice: &ChainNotice) {
            panic!("subscriber failure");
        }
    }

    /// A panicking subscriber does not prevent delivery to later ones.
    #[test]
    fn test_panicking_subscriber_isolated() {
        let registry = SubscriberRegistry::new();
        let recorder = Arc::new(Recorder::default());
        registry.register(Arc::new(Panicker));
        registry.register(recorder.clone());

        registry.publish(ChainNotice::BufferTrimmed { dropped: 3 });

        assert_eq!(registry.len(), 2);
        assert_eq!(*recorder.seen.lock().unwrap(), vec!["buffer_trimmed".to_string()]);
    }

    /// Registries are independent of one another.
    #[test]
    fn test_registries_are_isolated() {
        let first = SubscriberRegistry::new();
        let second = SubscriberRegistry::new();
        let recorder = Arc::new(Recorder::default());
        first.register(recorder.clone());

        second.publish(ChainNotice::BufferTrimmed { dropped: 1 });

        assert!(recorder.seen.lock().unwrap().is_empty());
        assert!(second.is_empty());
    }
}

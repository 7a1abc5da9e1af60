//! The in-memory event queue in front of the chain.
//!
//! `EventBuffer` owns events between `log_event` and a successful seal. It
//! never blocks on sealing: `submit` only takes the queue lock long enough to
//! push, and reports whether the push made a flush due.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};
use uuid::Uuid;

use ledgerguard_contracts::event::AuditEvent;

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_MAX_BUFFER: usize = 1000;

/// Why a flush was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// The queue reached the batch size.
    Threshold,
    /// A critical event was submitted.
    Critical,
    /// The periodic timer fired with a non-empty queue.
    Timer,
    /// An operator or test asked for a flush.
    Manual,
    /// The service is stopping.
    Shutdown,
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlushTrigger::Threshold => "threshold",
            FlushTrigger::Critical => "critical",
            FlushTrigger::Timer => "timer",
            FlushTrigger::Manual => "manual",
            FlushTrigger::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

/// An ordered, thread-safe queue of unsealed events.
pub struct EventBuffer {
    batch_size: usize,
    max_buffer: usize,
    queue: Mutex<VecDeque<AuditEvent>>,
}

impl EventBuffer {
    /// Create a buffer that asks for a flush at `batch_size` events and caps
    /// restored batches at `max_buffer` events. Both are clamped to at least 1.
    pub fn new(batch_size: usize, max_buffer: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            max_buffer: max_buffer.max(batch_size),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn max_buffer(&self) -> usize {
        self.max_buffer
    }

    /// Append `event` and report whether a flush is now due.
    ///
    /// Never fails: a poisoned lock is recovered, since the queue holds plain
    /// data that a panicking holder cannot leave half-written.
    pub fn submit(&self, event: AuditEvent) -> Option<FlushTrigger> {
        let critical = event.is_critical();
        let mut queue = self.lock();
        queue.push_back(event);
        let len = queue.len();
        drop(queue);

        if critical {
            Some(FlushTrigger::Critical)
        } else if len >= self.batch_size {
            Some(FlushTrigger::Threshold)
        } else {
            None
        }
    }

    /// Remove and return every event queued right now, in submission order.
    ///
    /// Events submitted after this call stay queued for the next flush.
    pub fn take_batch(&self) -> Vec<AuditEvent> {
        self.lock().drain(..).collect()
    }

    /// Put a batch that failed to persist back at the front of the queue.
    ///
    /// Order is preserved (`batch` first, then anything queued since).
    /// Duplicate event ids keep their first occurrence. If the queue then
    /// exceeds `max_buffer`, every critical event is kept along with the most
    /// recent non-critical events that fit. Returns the number of events
    /// dropped by trimming.
    pub fn restore(&self, batch: Vec<AuditEvent>) -> usize {
        let mut queue = self.lock();
        let restored = batch.len();

        let mut seen: HashSet<Uuid> = HashSet::with_capacity(restored + queue.len());
        let merged: Vec<AuditEvent> = batch
            .into_iter()
            .chain(queue.drain(..))
            .filter(|event| seen.insert(event.id))
            .collect();

        let (kept, dropped) = trim_to_cap(merged, self.max_buffer);
        queue.extend(kept);

        if dropped > 0 {
            warn!(
                restored,
                dropped,
                max_buffer = self.max_buffer,
                queued = queue.len(),
                "event buffer over capacity; dropped oldest non-critical events"
            );
        } else {
            debug!(restored, queued = queue.len(), "batch restored to event buffer");
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AuditEvent>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE, DEFAULT_MAX_BUFFER)
    }
}

/// Keep all critical events plus the newest non-critical events so the total
/// stays within `cap` (critical events alone may exceed it). Relative order
/// of the kept events is unchanged.
fn trim_to_cap(events: Vec<AuditEvent>, cap: usize) -> (Vec<AuditEvent>, usize) {
    if events.len() <= cap {
        return (events, 0);
    }

    let critical = events.iter().filter(|e| e.is_critical()).count();
    let non_critical = events.len() - critical;
    let budget = cap.saturating_sub(critical);
    let mut to_skip = non_critical.saturating_sub(budget);
    let dropped = to_skip;

    let kept = events
        .into_iter()
        .filter(|event| {
            if event.is_critical() || to_skip == 0 {
                return true;
            }
            to_skip -= 1;
            false
        })
        .collect();
    (kept, dropped)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use ledgerguard_contracts::event::{AuditEvent, EventType, Resource, Severity};

    use super::{EventBuffer, FlushTrigger};

    fn event(n: usize) -> AuditEvent {
        AuditEvent::new(
            EventType::ApiAccess,
            format!("api.call.{n}"),
            Resource::new("endpoint", format!("/v1/{n}")),
        )
    }

    fn actions(events: &[AuditEvent]) -> Vec<String> {
        events.iter().map(|e| e.action.clone()).collect()
    }

    /// Below the threshold no flush is requested; reaching it requests one.
    #[test]
    fn test_threshold_trigger() {
        let buffer = EventBuffer::new(3, 100);
        assert_eq!(buffer.submit(event(1)), None);
        assert_eq!(buffer.submit(event(2)), None);
        assert_eq!(buffer.submit(event(3)), Some(FlushTrigger::Threshold));
        assert_eq!(buffer.len(), 3);
    }

    /// A single critical event requests an immediate flush.
    #[test]
    fn test_critical_trigger() {
        let buffer = EventBuffer::new(10, 100);
        let trigger = buffer.submit(event(1).with_severity(Severity::Critical));
        assert_eq!(trigger, Some(FlushTrigger::Critical));
    }

    /// `take_batch` captures only what is queued at the time of the call.
    #[test]
    fn test_take_batch_snapshot() {
        let buffer = EventBuffer::new(10, 100);
        buffer.submit(event(1));
        buffer.submit(event(2));

        let batch = buffer.take_batch();
        buffer.submit(event(3));

        assert_eq!(actions(&batch), vec!["api.call.1", "api.call.2"]);
        assert_eq!(actions(&buffer.take_batch()), vec!["api.call.3"]);
        assert!(buffer.is_empty());
    }

    /// A restored batch goes back in front of newer events.
    #[test]
    fn test_restore_preserves_order() {
        let buffer = EventBuffer::new(10, 100);
        buffer.submit(event(1));
        buffer.submit(event(2));
        let batch = buffer.take_batch();
        buffer.submit(event(3));

        assert_eq!(buffer.restore(batch), 0);
        assert_eq!(
            actions(&buffer.take_batch()),
            vec!["api.call.1", "api.call.2", "api.call.3"]
        );
    }

    #[test]
    fn test_restore_deduplicates() {
        let buffer = EventBuffer::new(10, 100);
        let first = event(1);
        buffer.submit(first.clone());
        buffer.restore(vec![first]);
        assert_eq!(buffer.len(), 1);
    }

    /// Over the cap, every critical event survives and the oldest
    /// non-critical events are dropped.
    #[test]
    fn test_restore_trims_keeping_critical() {
        let buffer = EventBuffer::new(2, 4);
        let batch = vec![
            event(1).with_severity(Severity::Critical),
            event(2),
            event(3),
            event(4).with_severity(Severity::Critical),
        ];
        buffer.submit(event(5));
        buffer.submit(event(6));

        let dropped = buffer.restore(batch);
        let kept = buffer.take_batch();

        assert_eq!(dropped, 2);
        assert_eq!(
            actions(&kept),
            vec!["api.call.1", "api.call.4", "api.call.5", "api.call.6"]
        );
    }

    /// Critical events are never trimmed, even when they alone exceed the cap.
    #[test]
    fn test_trim_never_drops_critical() {
        let buffer = EventBuffer::new(1, 2);
        let batch: Vec<AuditEvent> = (0..4)
            .map(|n| event(n).with_severity(Severity::Critical))
            .collect();
        buffer.submit(event(9));

        let dropped = buffer.restore(batch);
        let kept = buffer.take_batch();

        assert_eq!(dropped, 1);
        assert_eq!(kept.len(), 4);
        assert!(kept.iter().all(|e| e.is_critical()));
    }
}

//! End-to-end tests of `AuditService` over real stores and the background
//! flusher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use uuid::Uuid;

use ledgerguard_audit::{
    AuditService, IntegrityVerifier, JsonlChainStore, MemoryChainStore, SubscriberRegistry,
    INITIALIZATION_FAILED_ACTION,
};
use ledgerguard_config::LedgerConfig;
use ledgerguard_contracts::{
    block::{ChainBlock, StoredEvent},
    error::{LedgerError, LedgerResult},
    event::{AuditEvent, EventType, Resource, Severity},
    integrity::{IntegrityCheck, VerifyScope},
    notice::ChainNotice,
};
use ledgerguard_core::traits::{ChainStore, Subscriber};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn event(action: &str) -> AuditEvent {
    AuditEvent::new(EventType::DataAccess, action, Resource::new("file", "f-1"))
}

/// Poll `condition` for up to five seconds.
fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

#[derive(Default)]
struct Recorder {
    notices: Mutex<Vec<ChainNotice>>,
}

impl Recorder {
    fn kinds(&self) -> Vec<&'static str> {
        self.notices.lock().unwrap().iter().map(ChainNotice::kind).collect()
    }
}

impl Subscriber for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn notify(&self, notice: &ChainNotice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}

/// A memory store whose appends can be switched to fail.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryChainStore,
    failing: AtomicBool,
}

impl ChainStore for FlakyStore {
    fn append(&self, block: &ChainBlock, events: &[StoredEvent]) -> LedgerResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LedgerError::Persistence {
                reason: "disk unavailable".to_string(),
            });
        }
        self.inner.append(block, events)
    }

    fn load_tail(&self) -> LedgerResult<Option<ChainBlock>> {
        self.inner.load_tail()
    }

    fn load_chain(&self) -> LedgerResult<Vec<ChainBlock>> {
        self.inner.load_chain()
    }

    fn events_for_block(&self, sequence_id: u64) -> LedgerResult<Vec<StoredEvent>> {
        self.inner.events_for_block(sequence_id)
    }

    fn all_events(&self) -> LedgerResult<Vec<StoredEvent>> {
        self.inner.all_events()
    }

    fn get_event(&self, id: &Uuid) -> LedgerResult<Option<StoredEvent>> {
        self.inner.get_event(id)
    }

    fn block_count(&self) -> LedgerResult<usize> {
        self.inner.block_count()
    }
}

// ── Background flusher ────────────────────────────────────────────────────────

/// Reaching the batch size seals a block without an explicit flush.
#[test]
fn test_background_threshold_flush() {
    let store = Arc::new(MemoryChainStore::new());
    let service = AuditService::builder()
        .batch_size(3)
        .difficulty(1)
        .flush_interval(Duration::from_secs(3600))
        .build(store.clone())
        .unwrap();

    for i in 0..3 {
        service.log_event(event(&format!("file.read.{i}"))).unwrap();
    }
    assert!(wait_until(|| store.block_count().unwrap() == 1));
    assert_eq!(store.events_for_block(1).unwrap().len(), 3);
}

/// With the buffer below threshold, the timer seals it.
#[test]
fn test_timer_flush() {
    let store = Arc::new(MemoryChainStore::new());
    let service = AuditService::builder()
        .batch_size(100)
        .difficulty(1)
        .flush_interval(Duration::from_millis(50))
        .build(store.clone())
        .unwrap();

    service.log_event(event("file.read")).unwrap();
    assert!(wait_until(|| store.block_count().unwrap() == 1));
    assert_eq!(service.pending(), 0);
}

/// Shutdown seals whatever is still buffered.
#[test]
fn test_shutdown_flushes_remaining_events() {
    let store = Arc::new(MemoryChainStore::new());
    let service = AuditService::builder()
        .batch_size(100)
        .difficulty(1)
        .flush_interval(Duration::from_secs(3600))
        .build(store.clone())
        .unwrap();

    service.log_event(event("file.read.1")).unwrap();
    service.log_event(event("file.read.2")).unwrap();
    let block = service.shutdown().unwrap().expect("buffered events must be sealed");
    assert_eq!(block.event_count, 2);
    assert!(service.shutdown().unwrap().is_none());
}

// ── Persistence ───────────────────────────────────────────────────────────────

/// A restarted service appends `tail + 1`, linked to the persisted tail.
#[test]
fn test_restart_resumes_after_tail() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chain.jsonl");

    let tail = {
        let store = Arc::new(JsonlChainStore::open(&path).unwrap());
        let service = AuditService::builder()
            .difficulty(1)
            .background(false)
            .build(store.clone())
            .unwrap();
        service.log_event(event("file.read.1")).unwrap();
        service.flush().unwrap();
        service.log_event(event("file.read.2")).unwrap();
        service.flush().unwrap().unwrap()
    };
    assert_eq!(tail.sequence_id, 2);

    let store = Arc::new(JsonlChainStore::open(&path).unwrap());
    let service = AuditService::builder()
        .difficulty(1)
        .background(false)
        .build(store.clone())
        .unwrap();
    service.log_event(event("file.read.3")).unwrap();
    let block = service.flush().unwrap().unwrap();

    assert_eq!(block.sequence_id, 3);
    assert_eq!(block.referenced_link, tail.link_hash);
    assert!(service.verify_integrity(&VerifyScope::all()).unwrap().is_valid);
}

/// Editing an event in the chain file is caught after reopening.
#[test]
fn test_file_tampering_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chain.jsonl");
    {
        let store = Arc::new(JsonlChainStore::open(&path).unwrap());
        let service = AuditService::builder()
            .batch_size(2)
            .difficulty(1)
            .background(false)
            .build(store)
            .unwrap();
        for action in ["file.read.a", "file.read.b", "file.read.c", "file.read.d"] {
            service.log_event(event(action)).unwrap();
        }
    }

    let contents = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, contents.replace("file.read.c", "file.read.X")).unwrap();

    let store = Arc::new(JsonlChainStore::open(&path).unwrap());
    let report = IntegrityVerifier::new(store, None).verify().unwrap();
    assert!(!report.is_valid);
    assert!(report.issues.iter().all(|issue| issue.sequence_id == 2));
    assert!(report
        .issues_for_block(2)
        .any(|issue| issue.check == IntegrityCheck::EventsHash));
}

/// Re-pointing a stored row at another block is caught after reopening,
/// even though the event itself is untouched.
#[test]
fn test_row_block_reference_tampering_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chain.jsonl");
    {
        let store = Arc::new(JsonlChainStore::open(&path).unwrap());
        let service = AuditService::builder()
            .batch_size(2)
            .difficulty(1)
            .background(false)
            .build(store)
            .unwrap();
        for action in ["file.read.a", "file.read.b", "file.read.c", "file.read.d"] {
            service.log_event(event(action)).unwrap();
        }
    }

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.matches("\"block_sequence_id\":2").count(), 2);
    std::fs::write(
        &path,
        contents.replace("\"block_sequence_id\":2", "\"block_sequence_id\":1"),
    )
    .unwrap();

    let store = Arc::new(JsonlChainStore::open(&path).unwrap());
    let rows = store.events_for_block(2).unwrap();
    assert!(rows.iter().all(|row| row.block_sequence_id == 1));

    let report = IntegrityVerifier::new(store, None).verify().unwrap();
    assert!(!report.is_valid);
    assert_eq!(
        report
            .issues_for_block(2)
            .filter(|issue| issue.check == IntegrityCheck::BlockReference)
            .count(),
        2
    );
    assert!(report.issues_for_block(1).next().is_none());
}

// ── Failure handling ──────────────────────────────────────────────────────────

/// A failed append restores the batch; the next flush seals it.
#[test]
fn test_failed_append_restores_batch() {
    let store = Arc::new(FlakyStore::default());
    let recorder = Arc::new(Recorder::default());
    let registry = Arc::new(SubscriberRegistry::new());
    registry.register(recorder.clone());

    let service = AuditService::builder()
        .difficulty(1)
        .background(false)
        .publisher(registry)
        .build(store.clone())
        .unwrap();

    store.failing.store(true, Ordering::SeqCst);
    service.log_event(event("file.read.1")).unwrap();
    service.log_event(event("file.read.2")).unwrap();
    assert!(service.flush().is_err());
    assert_eq!(service.pending(), 2);
    assert!(recorder.kinds().contains(&"flush_failed"));

    store.failing.store(false, Ordering::SeqCst);
    let block = service.flush().unwrap().unwrap();
    assert_eq!(block.sequence_id, 1);
    let actions: Vec<String> = store
        .events_for_block(1)
        .unwrap()
        .into_iter()
        .map(|row| row.event.action)
        .collect();
    assert_eq!(actions, vec!["file.read.1", "file.read.2"]);
}

/// An unopenable store falls back to memory and records the failure.
#[test]
fn test_store_open_failure_degrades() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = LedgerConfig::default();
    // A directory cannot be opened as the chain file.
    config.store.path = Some(dir.path().to_path_buf());

    let service = AuditService::start(&config, Arc::new(SubscriberRegistry::new())).unwrap();
    assert!(service.is_degraded());

    service.shutdown().unwrap();
    let events = service.store().all_events().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event.action, INITIALIZATION_FAILED_ACTION);
    assert_eq!(events[0].event.severity, Severity::Critical);
}

// ── Notices ───────────────────────────────────────────────────────────────────

#[test]
fn test_notices_published_in_order() {
    let recorder = Arc::new(Recorder::default());
    let registry = Arc::new(SubscriberRegistry::new());
    registry.register(recorder.clone());

    let service = AuditService::builder()
        .difficulty(1)
        .background(false)
        .publisher(registry)
        .build(Arc::new(MemoryChainStore::new()))
        .unwrap();
    service
        .log_event(event("file.delete").with_severity(Severity::Critical))
        .unwrap();

    assert_eq!(recorder.kinds(), vec!["event_accepted", "block_sealed"]);
    match &recorder.notices.lock().unwrap()[1] {
        ChainNotice::BlockSealed {
            sequence_id,
            event_count,
            ..
        } => {
            assert_eq!(*sequence_id, 1);
            assert_eq!(*event_count, 1);
        }
        other => panic!("unexpected notice {other:?}"),
    };
}

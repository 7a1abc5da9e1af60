//! `AuditService`: the producer and operator facade over the chain.
//!
//! Write path: `log_event` validates, enqueues into the `EventBuffer` and, if
//! a flush is due, signals the background flusher over a channel. The
//! flusher waits on that channel with a timeout equal to the flush interval;
//! a timeout with a non-empty queue is the timer trigger.
//!
//! Every trigger ends in the same guarded flush: the `ChainHead` mutex is
//! held across snapshot, seal, sign and append, so at most one block is in
//! flight per service. Multiple processes appending to one store are not
//! supported.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use ledgerguard_config::LedgerConfig;
use ledgerguard_contracts::{
    block::{ChainBlock, StoredEvent, GENESIS_LINK},
    error::{LedgerError, LedgerResult},
    event::{AuditEvent, EventType, Outcome, Resource, Severity},
    integrity::{IntegrityReport, VerifyScope},
    notice::ChainNotice,
};
use ledgerguard_core::{
    sealer::{block_candidate_bytes, ChainSealer, DEFAULT_DIFFICULTY},
    traits::{ChainStore, Publisher, Signer},
};
use ledgerguard_validate::EventValidator;

use crate::buffer::{EventBuffer, FlushTrigger, DEFAULT_BATCH_SIZE, DEFAULT_MAX_BUFFER};
use crate::bus::NullPublisher;
use crate::integrity::IntegrityVerifier;
use crate::jsonl::JsonlChainStore;
use crate::memory::MemoryChainStore;
use crate::signer::Ed25519Signer;

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Action recorded when the configured store could not be opened.
pub const INITIALIZATION_FAILED_ACTION: &str = "system.initialization_failed";

// ── Builder ───────────────────────────────────────────────────────────────────

/// Configures and constructs an `AuditService`.
pub struct AuditServiceBuilder {
    batch_size: usize,
    max_buffer: usize,
    flush_interval: Duration,
    difficulty: u32,
    signer: Option<Arc<dyn Signer>>,
    publisher: Arc<dyn Publisher>,
    validator: Option<EventValidator>,
    background: bool,
}

impl Default for AuditServiceBuilder {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_buffer: DEFAULT_MAX_BUFFER,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            difficulty: DEFAULT_DIFFICULTY,
            signer: None,
            publisher: Arc::new(NullPublisher),
            validator: None,
            background: true,
        }
    }
}

impl AuditServiceBuilder {
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn max_buffer(mut self, max_buffer: usize) -> Self {
        self.max_buffer = max_buffer;
        self
    }

    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn difficulty(mut self, difficulty: u32) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Replace the default validator, e.g. one with custom rules registered.
    pub fn validator(mut self, validator: EventValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// When `false`, no flusher thread is started: due flushes run inline on
    /// the thread that called `log_event`, and there is no timer trigger.
    pub fn background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    /// Build a service over `store`, resuming after the store's tail block.
    pub fn build(self, store: Arc<dyn ChainStore>) -> LedgerResult<AuditService> {
        let sealer = ChainSealer::new(self.difficulty)?;
        let validator = match self.validator {
            Some(validator) => validator,
            None => EventValidator::new()?,
        };
        let head = ChainHead::from_tail(store.load_tail()?);
        info!(
            next_sequence = head.next_sequence,
            difficulty = self.difficulty,
            signed = self.signer.is_some(),
            background = self.background,
            "audit service starting"
        );

        let shared = Arc::new(Shared {
            buffer: EventBuffer::new(self.batch_size, self.max_buffer),
            sealer,
            store,
            signer: self.signer,
            publisher: self.publisher,
            validator,
            head: Mutex::new(head),
            degraded: AtomicBool::new(false),
            reporting_init_failure: AtomicBool::new(false),
        });

        let flusher = if self.background {
            Some(Flusher::spawn(Arc::clone(&shared), self.flush_interval)?)
        } else {
            None
        };

        Ok(AuditService {
            shared,
            flusher: Mutex::new(flusher),
        })
    }
}

// ── Shared state ──────────────────────────────────────────────────────────────

/// Where the next block goes.
#[derive(Debug)]
struct ChainHead {
    next_sequence: u64,
    last_link: String,
}

impl ChainHead {
    fn from_tail(tail: Option<ChainBlock>) -> Self {
        match tail {
            Some(block) => Self {
                next_sequence: block.sequence_id + 1,
                last_link: block.link_hash,
            },
            None => Self {
                next_sequence: 1,
                last_link: GENESIS_LINK.to_string(),
            },
        }
    }
}

struct Shared {
    buffer: EventBuffer,
    sealer: ChainSealer,
    store: Arc<dyn ChainStore>,
    signer: Option<Arc<dyn Signer>>,
    publisher: Arc<dyn Publisher>,
    validator: EventValidator,
    head: Mutex<ChainHead>,
    degraded: AtomicBool,
    reporting_init_failure: AtomicBool,
}

impl Shared {
    /// Seal everything queued into one block and append it.
    ///
    /// On failure the batch goes back to the front of the buffer and the
    /// error is returned; the next trigger retries it.
    fn flush(&self, trigger: FlushTrigger) -> LedgerResult<Option<ChainBlock>> {
        let mut head = self.head.lock().unwrap_or_else(PoisonError::into_inner);

        let batch = self.buffer.take_batch();
        if batch.is_empty() {
            debug!(%trigger, "flush requested with empty buffer");
            return Ok(None);
        }

        let sequence_id = head.next_sequence;
        let batch_size = batch.len();
        let sealed = self.seal_and_append(&batch, sequence_id, &head.last_link);
        let outcome = match sealed {
            Ok(block) => {
                head.next_sequence = sequence_id + 1;
                head.last_link = block.link_hash.clone();
                Ok(block)
            }
            Err(e) => {
                error!(sequence_id, batch = batch_size, %trigger, error = %e, "flush failed; batch restored");
                if matches!(e, LedgerError::Integrity { .. }) {
                    self.resync_head(&mut head);
                }
                // Restore before releasing the head so no later flush overtakes the batch.
                let dropped = self.buffer.restore(batch);
                Err((e, dropped))
            }
        };
        // Subscribers may log events of their own; never call them under the head lock.
        drop(head);

        match outcome {
            Ok(block) => {
                info!(
                    sequence_id,
                    events = block.event_count,
                    nonce = block.nonce,
                    signed = block.signature.is_some(),
                    %trigger,
                    "block sealed"
                );
                self.publisher.publish(ChainNotice::BlockSealed {
                    sequence_id,
                    link_hash: block.link_hash.clone(),
                    event_count: block.event_count,
                });
                Ok(Some(block))
            }
            Err((e, dropped)) => {
                self.publisher.publish(ChainNotice::FlushFailed {
                    batch_size,
                    reason: e.to_string(),
                });
                if dropped > 0 {
                    self.publisher.publish(ChainNotice::BufferTrimmed { dropped });
                }
                Err(e)
            }
        }
    }

    fn seal_and_append(
        &self,
        batch: &[AuditEvent],
        sequence_id: u64,
        previous_link: &str,
    ) -> LedgerResult<ChainBlock> {
        let mut block = self.sealer.seal(batch, sequence_id, previous_link)?;
        block.signature = self.sign(&block);
        self.store
            .append(&block, &StoredEvent::from_batch(sequence_id, batch))?;
        Ok(block)
    }

    /// Sign the block's candidate bytes. A signing failure leaves the block
    /// unsigned; it never prevents the append.
    fn sign(&self, block: &ChainBlock) -> Option<String> {
        let signer = self.signer.as_ref()?;
        match block_candidate_bytes(block).and_then(|bytes| signer.sign(&bytes)) {
            Ok(signature) => Some(signature),
            Err(e) => {
                warn!(
                    sequence_id = block.sequence_id,
                    key_id = %signer.key_id(),
                    error = %e,
                    "block signing failed; appending unsigned"
                );
                None
            }
        }
    }

    /// Re-read the store's tail after it rejected an append as out of order.
    fn resync_head(&self, head: &mut ChainHead) {
        match self.store.load_tail() {
            Ok(tail) => {
                *head = ChainHead::from_tail(tail);
                warn!(next_sequence = head.next_sequence, "chain head resynchronized from store");
            }
            Err(e) => error!(error = %e, "failed to reload chain tail"),
        }
    }
}

// ── Background flusher ────────────────────────────────────────────────────────

enum FlusherSignal {
    Flush(FlushTrigger),
    Stop,
}

struct Flusher {
    tx: Sender<FlusherSignal>,
    handle: JoinHandle<()>,
}

impl Flusher {
    fn spawn(shared: Arc<Shared>, interval: Duration) -> LedgerResult<Self> {
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("ledgerguard-flusher".to_string())
            .spawn(move || loop {
                let trigger = match rx.recv_timeout(interval) {
                    Ok(FlusherSignal::Flush(trigger)) => trigger,
                    Err(RecvTimeoutError::Timeout) if !shared.buffer.is_empty() => FlushTrigger::Timer,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(FlusherSignal::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                };
                if let Err(e) = shared.flush(trigger) {
                    debug!(error = %e, "flush will be retried on the next trigger");
                }
            })
            .map_err(|e| LedgerError::Persistence {
                reason: format!("failed to start flusher thread: {e}"),
            })?;
        Ok(Self { tx, handle })
    }

    fn stop(self) {
        // A send error means the thread already exited.
        let _ = self.tx.send(FlusherSignal::Stop);
        if self.handle.join().is_err() {
            warn!("flusher thread panicked");
        }
    }
}

// ── Service ───────────────────────────────────────────────────────────────────

/// The audit chain service.
///
/// Dropping the service stops the flusher and seals whatever is still
/// buffered; call `shutdown` to observe errors from that final flush.
pub struct AuditService {
    shared: Arc<Shared>,
    flusher: Mutex<Option<Flusher>>,
}

impl AuditService {
    pub fn builder() -> AuditServiceBuilder {
        AuditServiceBuilder::default()
    }

    /// Start a service from configuration.
    ///
    /// If the configured store cannot be opened the service falls back to an
    /// in-memory store, marks itself degraded and records a critical
    /// `system.initialization_failed` event.
    pub fn start(config: &LedgerConfig, publisher: Arc<dyn Publisher>) -> LedgerResult<Self> {
        config.validate()?;

        let mut builder = Self::builder()
            .batch_size(config.buffer.batch_size)
            .max_buffer(config.buffer.max_buffer)
            .flush_interval(config.buffer.flush_interval())
            .difficulty(config.chain.difficulty)
            .publisher(publisher);
        if let Some(seed) = config.signing_seed()? {
            builder = builder.signer(Arc::new(Ed25519Signer::from_seed(&seed)));
        }

        let Some(path) = &config.store.path else {
            return builder.build(Arc::new(MemoryChainStore::new()));
        };
        match JsonlChainStore::open(path) {
            Ok(store) => builder.build(Arc::new(store)),
            Err(e) => {
                error!(
                    path = %path.display(),
                    error = %e,
                    "chain store unavailable; falling back to in-memory store"
                );
                let service = builder.build(Arc::new(MemoryChainStore::new()))?;
                service.report_initialization_failure(&e);
                Ok(service)
            }
        }
    }

    /// Validate and enqueue `event`.
    ///
    /// Returns once the event is buffered; sealing happens later. Only
    /// validation failures are reported here.
    pub fn log_event(&self, event: AuditEvent) -> LedgerResult<()> {
        if let Err(e) = self.shared.validator.validate(&event) {
            warn!(action = %event.action, error = %e, "audit event rejected");
            return Err(e);
        }

        let id = event.id;
        let severity = event.severity;
        let due = self.shared.buffer.submit(event);
        debug!(%id, %severity, queued = self.shared.buffer.len(), "audit event buffered");
        self.shared
            .publisher
            .publish(ChainNotice::EventAccepted { id, severity });

        if let Some(trigger) = due {
            self.request_flush(trigger);
        }
        Ok(())
    }

    /// Validate and enqueue a raw JSON submission. Returns the event id,
    /// which is generated when the submission has none.
    pub fn log_event_json(&self, raw: Value) -> LedgerResult<Uuid> {
        let event = self.shared.validator.parse_json(raw)?;
        let id = event.id;
        self.log_event(event)?;
        Ok(id)
    }

    /// Seal everything buffered now, on the calling thread.
    ///
    /// Returns `Ok(None)` when the buffer is empty.
    pub fn flush(&self) -> LedgerResult<Option<ChainBlock>> {
        self.shared.flush(FlushTrigger::Manual)
    }

    /// Stop the flusher thread and seal whatever remains buffered.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&self) -> LedgerResult<Option<ChainBlock>> {
        let flusher = self
            .flusher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(flusher) = flusher {
            flusher.stop();
            info!("audit service flusher stopped");
        }
        self.shared.flush(FlushTrigger::Shutdown)
    }

    pub fn get_event(&self, id: &Uuid) -> LedgerResult<StoredEvent> {
        self.shared
            .store
            .get_event(id)?
            .ok_or_else(|| LedgerError::NotFound {
                what: format!("audit event {id}"),
            })
    }

    pub fn verify_integrity(&self, scope: &VerifyScope) -> LedgerResult<IntegrityReport> {
        self.verifier().verify_scoped(scope)
    }

    /// A verifier over this service's store and signer.
    pub fn verifier(&self) -> IntegrityVerifier {
        IntegrityVerifier::new(Arc::clone(&self.shared.store), self.shared.signer.clone())
    }

    pub fn store(&self) -> Arc<dyn ChainStore> {
        Arc::clone(&self.shared.store)
    }

    /// Events accepted but not yet sealed.
    pub fn pending(&self) -> usize {
        self.shared.buffer.len()
    }

    /// `true` when the service is running on a fallback store.
    pub fn is_degraded(&self) -> bool {
        self.shared.degraded.load(Ordering::SeqCst)
    }

    /// Mark the service degraded and record a critical
    /// `system.initialization_failed` event through the normal pipeline.
    ///
    /// Re-entrant calls (a failure while reporting a failure) only log.
    pub fn report_initialization_failure(&self, cause: &LedgerError) {
        self.shared.degraded.store(true, Ordering::SeqCst);
        if self.shared.reporting_init_failure.swap(true, Ordering::SeqCst) {
            error!(error = %cause, "initialization failure while already reporting one");
            return;
        }

        let event = AuditEvent::new(
            EventType::SystemConfiguration,
            INITIALIZATION_FAILED_ACTION,
            Resource::new("system", "audit_service"),
        )
        .with_outcome(Outcome::Failure)
        .with_severity(Severity::Critical)
        .with_details(json!({
            "error": cause.to_string(),
            "fallback_store": "memory",
        }));
        if let Err(e) = self.log_event(event) {
            error!(error = %e, cause = %cause, "failed to record initialization failure");
        }

        self.shared.reporting_init_failure.store(false, Ordering::SeqCst);
    }

    fn request_flush(&self, trigger: FlushTrigger) {
        let flusher = self.flusher.lock().unwrap_or_else(PoisonError::into_inner);
        match flusher.as_ref() {
            Some(flusher) => {
                if flusher.tx.send(FlusherSignal::Flush(trigger)).is_err() {
                    warn!(%trigger, "flusher thread gone; event stays buffered");
                }
            }
            None => {
                drop(flusher);
                if let Err(e) = self.shared.flush(trigger) {
                    debug!(error = %e, "inline flush failed; batch stays buffered");
                }
            }
        }
    }
}

impl Drop for AuditService {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!(error = %e, pending = self.pending(), "final flush failed on drop");
        }
    }
}

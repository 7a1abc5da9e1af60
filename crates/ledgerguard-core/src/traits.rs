//! Core trait definitions for the ledgerguard write and read paths.
//!
//! These traits are the seams where external collaborators plug in:
//!
//! - `Signer`: opaque sign/verify capability (a KMS in production)
//! - `ChainStore`: durable owner of sealed blocks and their events
//! - `Publisher`: fan-out of write-path notices to subscribers
//! - `Subscriber`: a consumer registered with a publisher
//!
//! Every implementation is passed in at construction time. Nothing here is
//! process-global.

use uuid::Uuid;

use ledgerguard_contracts::{
    block::{ChainBlock, StoredEvent},
    error::LedgerResult,
    notice::ChainNotice,
};

/// A signing capability that never exposes key material.
///
/// Signatures are opaque strings; the chain only stores and hands them back.
pub trait Signer: Send + Sync {
    /// A short, non-secret identifier for the key, used in logs.
    fn key_id(&self) -> String;

    /// Sign `bytes` and return the encoded signature.
    ///
    /// Errors are reported as `LedgerError::Crypto`.
    fn sign(&self, bytes: &[u8]) -> LedgerResult<String>;

    /// Return `Ok(true)` if `signature` is valid for `bytes`.
    ///
    /// A well-formed but wrong signature is `Ok(false)`; an undecodable one
    /// is `Err(LedgerError::Crypto)`.
    fn verify(&self, bytes: &[u8], signature: &str) -> LedgerResult<bool>;
}

/// The durable home of the chain.
///
/// Implementations must make `append` atomic: a block and all of its events
/// become visible together or not at all. Records are never modified or
/// deleted once appended.
pub trait ChainStore: Send + Sync {
    /// Persist `block` together with its event rows.
    ///
    /// Each row carries `block_sequence_id == block.sequence_id`. A block
    /// whose `sequence_id` is not `tail + 1` is rejected with
    /// `LedgerError::Integrity`.
    fn append(&self, block: &ChainBlock, events: &[StoredEvent]) -> LedgerResult<()>;

    /// The block with the highest `sequence_id`, if any.
    fn load_tail(&self) -> LedgerResult<Option<ChainBlock>>;

    /// Every block in ascending `sequence_id` order.
    fn load_chain(&self) -> LedgerResult<Vec<ChainBlock>>;

    /// The events sealed into `sequence_id`, ordered by `position`.
    fn events_for_block(&self, sequence_id: u64) -> LedgerResult<Vec<StoredEvent>>;

    /// Every persisted event, in chain order.
    fn all_events(&self) -> LedgerResult<Vec<StoredEvent>>;

    /// Look up a single event by id.
    fn get_event(&self, id: &Uuid) -> LedgerResult<Option<StoredEvent>>;

    /// Number of persisted blocks.
    fn block_count(&self) -> LedgerResult<usize>;
}

/// A consumer of write-path notices.
pub trait Subscriber: Send + Sync {
    /// Stable name used in logs when the subscriber misbehaves.
    fn name(&self) -> &str;

    /// Handle one notice. Called synchronously on the publishing thread, so
    /// implementations should return quickly.
    fn notify(&self, notice: &ChainNotice);
}

/// Delivers notices to subscribers.
pub trait Publisher: Send + Sync {
    fn publish(&self, notice: ChainNotice);
}

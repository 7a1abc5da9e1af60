//! Chain block and persisted event types.
//!
//! A `ChainBlock` seals an ordered batch of `AuditEvent`s. Each block
//! publishes a `link_hash` that the next block must reference, so rewriting
//! any block invalidates every block after it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::AuditEvent;

/// The `referenced_link` of block 1.
///
/// 64 hex zeros, the same width as a SHA-256 hex digest.
pub const GENESIS_LINK: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// A sealed batch of events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainBlock {
    /// Position in the chain. Starts at 1, increases by exactly 1.
    pub sequence_id: u64,

    /// The `link_hash` of the previous block, or `GENESIS_LINK` for block 1.
    pub referenced_link: String,

    /// The mined hash this block publishes. Starts with `difficulty` zeros.
    pub link_hash: String,

    /// SHA-256 (hex) over the canonical serialization of this block's events.
    pub events_hash: String,

    pub nonce: u64,

    /// Number of leading `'0'` hex characters required of `link_hash`.
    pub difficulty: u32,

    /// Hex signature over the mined candidate bytes, when a signer was
    /// configured at seal time and signing succeeded.
    pub signature: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Number of events sealed into this block.
    pub event_count: u32,
}

impl ChainBlock {
    /// The link the first block must reference.
    pub fn genesis_link() -> &'static str {
        GENESIS_LINK
    }
}

/// An event as persisted by a chain store.
///
/// Carries a direct reference to the block it was sealed into together with
/// its position inside that block, so a block's events can be reloaded in
/// exactly the order they were hashed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub block_sequence_id: u64,
    pub position: u32,
    #[serde(flatten)]
    pub event: AuditEvent,
}

impl StoredEvent {
    /// Wrap a sealed batch into store rows for `block_sequence_id`.
    pub fn from_batch(block_sequence_id: u64, batch: &[AuditEvent]) -> Vec<StoredEvent> {
        batch
            .iter()
            .enumerate()
            .map(|(position, event)| StoredEvent {
                block_sequence_id,
                position: position as u32,
                event: event.clone(),
            })
            .collect()
    }
}

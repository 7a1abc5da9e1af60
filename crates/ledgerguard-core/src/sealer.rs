//! Block sealing: canonical hashing and proof-of-work.
//!
//! Events digest layout (bytes fed to SHA-256, in submission order):
//!   for each event:
//!     1. length of the event's canonical JSON as 8-byte little-endian
//!     2. canonical JSON of the event (compact `serde_json`)
//!
//! Canonical JSON emits struct fields in declaration order and map keys in
//! sorted order (`serde_json` is built without `preserve_order`), so the same
//! event always produces the same bytes.
//!
//! Candidate layout: compact JSON of
//!   `{sequence_id, referenced_link, events_hash, created_at, difficulty, nonce}`
//! with `created_at` rendered as RFC 3339 with millisecond precision and a
//! `Z` suffix. Mining increments `nonce` from 0 until the hex SHA-256 of the
//! candidate starts with `difficulty` `'0'` characters; that hash becomes the
//! block's `link_hash`.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use ledgerguard_contracts::{
    block::ChainBlock,
    error::{LedgerError, LedgerResult},
    event::AuditEvent,
};

/// Default number of leading zero hex characters required of `link_hash`.
pub const DEFAULT_DIFFICULTY: u32 = 2;

/// Upper bound on difficulty: a SHA-256 hex digest has 64 characters.
pub const MAX_DIFFICULTY: u32 = 64;

#[derive(Serialize)]
struct Candidate<'a> {
    sequence_id: u64,
    referenced_link: &'a str,
    events_hash: &'a str,
    created_at: String,
    difficulty: u32,
    nonce: u64,
}

/// Canonical bytes of a single event.
pub fn canonical_event_bytes(event: &AuditEvent) -> LedgerResult<Vec<u8>> {
    Ok(serde_json::to_vec(event)?)
}

/// Deterministic SHA-256 digest (lowercase hex) over an ordered batch.
pub fn hash_events<'a, I>(events: I) -> LedgerResult<String>
where
    I: IntoIterator<Item = &'a AuditEvent>,
{
    let mut hasher = Sha256::new();
    for event in events {
        let bytes = canonical_event_bytes(event)?;
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Canonical candidate bytes for the given header fields.
pub fn candidate_bytes(
    sequence_id: u64,
    referenced_link: &str,
    events_hash: &str,
    created_at: &DateTime<Utc>,
    difficulty: u32,
    nonce: u64,
) -> LedgerResult<Vec<u8>> {
    let candidate = Candidate {
        sequence_id,
        referenced_link,
        events_hash,
        created_at: created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        difficulty,
        nonce,
    };
    Ok(serde_json::to_vec(&candidate)?)
}

/// Canonical candidate bytes of a sealed block, using its stored nonce.
///
/// These are the bytes that were mined and, when a signer is configured,
/// signed.
pub fn block_candidate_bytes(block: &ChainBlock) -> LedgerResult<Vec<u8>> {
    candidate_bytes(
        block.sequence_id,
        &block.referenced_link,
        &block.events_hash,
        &block.created_at,
        block.difficulty,
        block.nonce,
    )
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// True if `hash` starts with `difficulty` literal `'0'` characters.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let required = difficulty as usize;
    hash.len() >= required && hash.bytes().take(required).all(|b| b == b'0')
}

/// Builds and mines blocks.
#[derive(Debug, Clone)]
pub struct ChainSealer {
    difficulty: u32,
}

impl ChainSealer {
    /// Create a sealer that mines to `difficulty` leading zeros.
    ///
    /// Returns `LedgerError::Config` if `difficulty` exceeds `MAX_DIFFICULTY`.
    pub fn new(difficulty: u32) -> LedgerResult<Self> {
        if difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::Config {
                reason: format!("difficulty {difficulty} exceeds maximum of {MAX_DIFFICULTY}"),
            });
        }
        Ok(Self { difficulty })
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Seal `batch` as block `sequence_id`, linked to `previous_link`.
    ///
    /// The returned block carries no signature; signing happens over
    /// `block_candidate_bytes` of the result.
    pub fn seal(
        &self,
        batch: &[AuditEvent],
        sequence_id: u64,
        previous_link: &str,
    ) -> LedgerResult<ChainBlock> {
        self.seal_at(batch, sequence_id, previous_link, Utc::now())
    }

    /// `seal` with an explicit creation time, truncated to milliseconds.
    pub fn seal_at(
        &self,
        batch: &[AuditEvent],
        sequence_id: u64,
        previous_link: &str,
        created_at: DateTime<Utc>,
    ) -> LedgerResult<ChainBlock> {
        let created_at = created_at.trunc_subsecs(3);
        let events_hash = hash_events(batch)?;

        let mut nonce: u64 = 0;
        let link_hash = loop {
            let bytes = candidate_bytes(
                sequence_id,
                previous_link,
                &events_hash,
                &created_at,
                self.difficulty,
                nonce,
            )?;
            let hash = sha256_hex(&bytes);
            if meets_difficulty(&hash, self.difficulty) {
                break hash;
            }
            nonce = nonce.checked_add(1).ok_or_else(|| LedgerError::Integrity {
                sequence_id,
                reason: "nonce space exhausted while mining".to_string(),
            })?;
        };

        debug!(
            sequence_id,
            nonce,
            difficulty = self.difficulty,
            link_hash = %link_hash,
            "block mined"
        );

        Ok(ChainBlock {
            sequence_id,
            referenced_link: previous_link.to_string(),
            link_hash,
            events_hash,
            nonce,
            difficulty: self.difficulty,
            signature: None,
            created_at,
            event_count: batch.len() as u32,
        })
    }
}

impl Default for ChainSealer {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
        }
    }
}

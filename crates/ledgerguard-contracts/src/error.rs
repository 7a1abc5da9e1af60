//! Error types for the ledgerguard audit chain.
//!
//! All fallible operations across the workspace return `LedgerResult<T>`.
//! Variants carry enough context for an operator to act on the failure
//! without re-running the operation.

use thiserror::Error;

/// The unified error type for ledgerguard.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// An inbound event was malformed and rejected before buffering.
    #[error("event validation failed: {reason}")]
    Validation { reason: String },

    /// The chain store could not persist or read records.
    ///
    /// On the write path the captured batch is restored to the buffer and
    /// retried on the next flush trigger.
    #[error("persistence failure: {reason}")]
    Persistence { reason: String },

    /// Signing or signature verification failed.
    ///
    /// Never blocks an append; the block is stored without a signature.
    #[error("crypto failure: {reason}")]
    Crypto { reason: String },

    /// The store refused a record because it would break chain continuity,
    /// or a persisted record could not be interpreted as part of the chain.
    #[error("chain integrity error at block {sequence_id}: {reason}")]
    Integrity { sequence_id: u64, reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// A value could not be encoded to or decoded from its canonical form.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// An operator lookup found nothing.
    #[error("not found: {what}")]
    NotFound { what: String },
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}

/// Convenience alias used throughout the ledgerguard crates.
pub type LedgerResult<T> = Result<T, LedgerError>;

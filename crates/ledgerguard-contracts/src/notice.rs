//! Notices published to subscribers as the write path progresses.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::Severity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainNotice {
    /// An event passed validation and was buffered.
    EventAccepted { id: Uuid, severity: Severity },

    /// A batch was sealed and persisted.
    BlockSealed {
        sequence_id: u64,
        link_hash: String,
        event_count: u32,
    },

    /// Persisting a batch failed; the batch was returned to the buffer.
    FlushFailed { batch_size: usize, reason: String },

    /// The buffer exceeded its cap and non-critical events were dropped.
    BufferTrimmed { dropped: usize },
}

impl ChainNotice {
    pub fn kind(&self) -> &'static str {
        match self {
            ChainNotice::EventAccepted { .. } => "event_accepted",
            ChainNotice::BlockSealed { .. } => "block_sealed",
            ChainNotice::FlushFailed { .. } => "flush_failed",
            ChainNotice::BufferTrimmed { .. } => "buffer_trimmed",
        }
    }
}

//! Chain verification result types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::query::DateRange;

/// The individual checks run against every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntegrityCheck {
    /// Sequence ids increase by exactly one, starting at 1.
    Sequence,
    /// `referenced_link` equals the previous block's `link_hash`.
    Link,
    /// The mined hash recomputes and meets the difficulty prefix.
    ProofOfWork,
    /// The stored signature verifies over the candidate bytes.
    Signature,
    /// The events digest recomputes from the stored events.
    EventsHash,
    /// The number of stored events matches the block header.
    EventCount,
    /// Every stored row points back at its block, at positions `0..event_count`.
    BlockReference,
}

impl IntegrityCheck {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrityCheck::Sequence => "sequence",
            IntegrityCheck::Link => "link",
            IntegrityCheck::ProofOfWork => "proof-of-work",
            IntegrityCheck::Signature => "signature",
            IntegrityCheck::EventsHash => "events-hash",
            IntegrityCheck::EventCount => "event-count",
            IntegrityCheck::BlockReference => "block-reference",
        }
    }
}

impl fmt::Display for IntegrityCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed check on one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityIssue {
    pub sequence_id: u64,
    pub check: IntegrityCheck,
    pub message: String,
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block {} [{}]: {}", self.sequence_id, self.check, self.message)
    }
}

/// The outcome of replaying the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// True iff `issues` is empty.
    pub is_valid: bool,
    pub issues: Vec<IntegrityIssue>,
    /// Number of blocks checked.
    pub total_checked: usize,
    /// Number of events whose digests were recomputed.
    pub events_checked: usize,
    /// The highest sequence id present when the pass started.
    pub chain_height: u64,
    pub verified_at: DateTime<Utc>,
}

impl IntegrityReport {
    /// Issues rendered as `"block <id> [<check>]: <message>"`.
    pub fn issue_messages(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }

    /// Issues that reference `sequence_id`.
    pub fn issues_for_block(&self, sequence_id: u64) -> impl Iterator<Item = &IntegrityIssue> {
        self.issues.iter().filter(move |i| i.sequence_id == sequence_id)
    }
}

/// Restricts which blocks a verification pass reports on.
///
/// Out-of-scope blocks are still walked so that link checks always compare a
/// block with its true predecessor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyScope {
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub date_range: DateRange,
}

impl VerifyScope {
    /// The whole chain.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_unrestricted(&self) -> bool {
        self.workspace_id.is_none() && self.date_range == DateRange::unbounded()
    }
}

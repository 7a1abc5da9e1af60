//! Chain replay and integrity verification.
//!
//! `IntegrityVerifier` walks a snapshot of the chain taken when the pass
//! starts. Blocks appended while a pass is running are not covered; the
//! report's `chain_height` records which height was verified.
//!
//! Every check runs for every block. A failure is recorded as an
//! `IntegrityIssue` and the walk continues, so one pass surfaces every
//! problem. Issues are reported, never repaired.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use ledgerguard_contracts::{
    block::{ChainBlock, StoredEvent, GENESIS_LINK},
    error::LedgerResult,
    integrity::{IntegrityCheck, IntegrityIssue, IntegrityReport, VerifyScope},
};
use ledgerguard_core::{
    sealer::{block_candidate_bytes, hash_events, meets_difficulty, sha256_hex},
    traits::{ChainStore, Signer},
};

/// Replays a `ChainStore` and recomputes every hash, link and signature.
#[derive(Clone)]
pub struct IntegrityVerifier {
    store: Arc<dyn ChainStore>,
    signer: Option<Arc<dyn Signer>>,
}

impl IntegrityVerifier {
    /// Create a verifier. Without a signer, stored signatures are not checked.
    pub fn new(store: Arc<dyn ChainStore>, signer: Option<Arc<dyn Signer>>) -> Self {
        Self { store, signer }
    }

    /// Verify the whole chain.
    ///
    /// Returns `Err` only if the store cannot be read. Tampering and breaks
    /// are reported in `IntegrityReport::issues`.
    pub fn verify(&self) -> LedgerResult<IntegrityReport> {
        self.verify_scoped(&VerifyScope::all())
    }

    /// Verify, reporting only on blocks inside `scope`.
    ///
    /// A block is in scope when its `created_at` falls in the scope's date
    /// range and, if a workspace is given, it holds at least one event from
    /// that workspace. Out-of-scope blocks are still walked so link checks
    /// compare each block with its true predecessor.
    pub fn verify_scoped(&self, scope: &VerifyScope) -> LedgerResult<IntegrityReport> {
        let chain = self.store.load_chain()?;
        let chain_height = chain.last().map_or(0, |b| b.sequence_id);

        let mut issues = Vec::new();
        let mut total_checked = 0usize;
        let mut events_checked = 0usize;
        let mut previous: Option<&ChainBlock> = None;

        for block in &chain {
            let events = self.store.events_for_block(block.sequence_id)?;

            if in_scope(scope, block, &events) {
                total_checked += 1;
                events_checked += events.len();
                self.check_block(block, previous, &events, &mut issues);
            }
            previous = Some(block);
        }

        let report = IntegrityReport {
            is_valid: issues.is_empty(),
            issues,
            total_checked,
            events_checked,
            chain_height,
            verified_at: Utc::now(),
        };

        if report.is_valid {
            info!(
                blocks = report.total_checked,
                events = report.events_checked,
                chain_height,
                "chain integrity verified"
            );
        } else {
            warn!(
                blocks = report.total_checked,
                issue_count = report.issues.len(),
                chain_height,
                "chain integrity violations detected"
            );
        }
        Ok(report)
    }

    fn check_block(
        &self,
        block: &ChainBlock,
        previous: Option<&ChainBlock>,
        events: &[StoredEvent],
        issues: &mut Vec<IntegrityIssue>,
    ) {
        let sequence_id = block.sequence_id;
        let mut record = |check: IntegrityCheck, message: String| {
            debug!(sequence_id, check = %check, %message, "integrity check failed");
            issues.push(IntegrityIssue {
                sequence_id,
                check,
                message,
            });
        };

        // ── 1. sequence ──────────────────────────────────────────────────────
        let expected_sequence = previous.map_or(1, |p| p.sequence_id + 1);
        if sequence_id != expected_sequence {
            record(
                IntegrityCheck::Sequence,
                format!("expected sequence {expected_sequence}, found {sequence_id}"),
            );
        }

        // ── 2. link ──────────────────────────────────────────────────────────
        let expected_link = previous.map_or(GENESIS_LINK, |p| p.link_hash.as_str());
        if block.referenced_link != expected_link {
            record(
                IntegrityCheck::Link,
                format!(
                    "referenced link {} does not match previous link hash {}",
                    block.referenced_link, expected_link
                ),
            );
        }

        // ── 3. proof of work ─────────────────────────────────────────────────
        let candidate = block_candidate_bytes(block);
        match &candidate {
            Ok(bytes) => {
                let recomputed = sha256_hex(bytes);
                if recomputed != block.link_hash {
                    record(
                        IntegrityCheck::ProofOfWork,
                        format!(
                            "recomputed hash {recomputed} does not match stored link hash {}",
                            block.link_hash
                        ),
                    );
                }
            }
            Err(e) => record(
                IntegrityCheck::ProofOfWork,
                format!("candidate bytes could not be rebuilt: {e}"),
            ),
        }
        if !meets_difficulty(&block.link_hash, block.difficulty) {
            record(
                IntegrityCheck::ProofOfWork,
                format!(
                    "link hash {} lacks the {}-zero difficulty prefix",
                    block.link_hash, block.difficulty
                ),
            );
        }

        // ── 4. signature ─────────────────────────────────────────────────────
        match (&block.signature, &self.signer, &candidate) {
            (Some(signature), Some(signer), Ok(bytes)) => match signer.verify(bytes, signature) {
                Ok(true) => {}
                Ok(false) => record(
                    IntegrityCheck::Signature,
                    format!("signature does not verify under key {}", signer.key_id()),
                ),
                Err(e) => record(IntegrityCheck::Signature, format!("signature check failed: {e}")),
            },
            (Some(_), None, _) => {
                debug!(sequence_id, "no signer configured; skipping signature check");
            }
            (None, Some(signer), _) => record(
                IntegrityCheck::Signature,
                format!("block is unsigned; expected a signature under key {}", signer.key_id()),
            ),
            // Candidate bytes already failed; reported under proof of work.
            (Some(_), Some(_), Err(_)) | (None, None, _) => {}
        }

        // ── 5. events ────────────────────────────────────────────────────────
        if events.len() != block.event_count as usize {
            record(
                IntegrityCheck::EventCount,
                format!(
                    "block declares {} events but {} are stored",
                    block.event_count,
                    events.len()
                ),
            );
        }
        for (expected, row) in events.iter().enumerate() {
            if row.block_sequence_id != sequence_id || row.position as usize != expected {
                record(
                    IntegrityCheck::BlockReference,
                    format!(
                        "event {} is stored as block {} position {}, expected block {sequence_id} position {expected}",
                        row.event.id, row.block_sequence_id, row.position
                    ),
                );
            }
        }
        match hash_events(events.iter().map(|row| &row.event)) {
            Ok(recomputed) if recomputed == block.events_hash => {}
            Ok(recomputed) => record(
                IntegrityCheck::EventsHash,
                format!(
                    "recomputed events hash {recomputed} does not match stored {}",
                    block.events_hash
                ),
            ),
            Err(e) => record(
                IntegrityCheck::EventsHash,
                format!("events could not be re-serialized: {e}"),
            ),
        }
    }
}

fn in_scope(scope: &VerifyScope, block: &ChainBlock, events: &[StoredEvent]) -> bool {
    if !scope.date_range.contains(&block.created_at) {
        return false;
    }
    match &scope.workspace_id {
        None => true,
        Some(workspace) => events
            .iter()
            .any(|row| row.event.metadata.workspace_id.as_deref() == Some(workspace.as_str())),
    }
}

//! In-memory implementation of `ChainStore`.
//!
//! `MemoryChainStore` keeps blocks and events in a `ChainIndex` protected by
//! a `Mutex`. It is the store used by tests and the fallback store when a
//! persistent store fails to open. The same `ChainIndex` backs the JSONL
//! store's read side.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use ledgerguard_contracts::{
    block::{ChainBlock, StoredEvent},
    error::{LedgerError, LedgerResult},
};
use ledgerguard_core::traits::ChainStore;

// ── Index ─────────────────────────────────────────────────────────────────────

/// Blocks and events keyed for the lookups `ChainStore` needs.
#[derive(Debug, Default)]
pub(crate) struct ChainIndex {
    pub(crate) blocks: BTreeMap<u64, ChainBlock>,
    pub(crate) events: BTreeMap<u64, Vec<StoredEvent>>,
    by_id: HashMap<Uuid, (u64, usize)>,
}

impl ChainIndex {
    /// Reject a block that would not extend the chain by exactly one, or
    /// whose rows do not reference it.
    pub(crate) fn check_append(&self, block: &ChainBlock, events: &[StoredEvent]) -> LedgerResult<()> {
        let expected = self.tail().map_or(1, |tail| tail.sequence_id + 1);
        if block.sequence_id != expected {
            return Err(LedgerError::Integrity {
                sequence_id: block.sequence_id,
                reason: format!("append out of order: expected sequence {expected}"),
            });
        }
        if let Some(row) = events.iter().find(|e| e.block_sequence_id != block.sequence_id) {
            return Err(LedgerError::Integrity {
                sequence_id: block.sequence_id,
                reason: format!(
                    "event {} references block {}",
                    row.event.id, row.block_sequence_id
                ),
            });
        }
        if events.len() != block.event_count as usize {
            return Err(LedgerError::Integrity {
                sequence_id: block.sequence_id,
                reason: format!(
                    "block declares {} events but {} were supplied",
                    block.event_count,
                    events.len()
                ),
            });
        }
        Ok(())
    }

    /// Insert without continuity checks. Used when replaying persisted
    /// records, where gaps must stay visible to the integrity verifier.
    pub(crate) fn insert(&mut self, block: ChainBlock, mut events: Vec<StoredEvent>) {
        let sequence_id = block.sequence_id;
        events.sort_by_key(|e| e.position);
        for (slot, row) in events.iter().enumerate() {
            self.by_id.insert(row.event.id, (sequence_id, slot));
        }
        self.blocks.insert(sequence_id, block);
        self.events.insert(sequence_id, events);
    }

    pub(crate) fn contains(&self, sequence_id: u64) -> bool {
        self.blocks.contains_key(&sequence_id)
    }

    pub(crate) fn tail(&self) -> Option<&ChainBlock> {
        self.blocks.values().next_back()
    }

    pub(crate) fn chain(&self) -> Vec<ChainBlock> {
        self.blocks.values().cloned().collect()
    }

    pub(crate) fn events_for_block(&self, sequence_id: u64) -> Vec<StoredEvent> {
        self.events.get(&sequence_id).cloned().unwrap_or_default()
    }

    pub(crate) fn all_events(&self) -> Vec<StoredEvent> {
        self.events.values().flatten().cloned().collect()
    }

    pub(crate) fn get_event(&self, id: &Uuid) -> Option<StoredEvent> {
        let (sequence_id, slot) = self.by_id.get(id)?;
        self.events.get(sequence_id)?.get(*slot).cloned()
    }

    pub(crate) fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// A `ChainStore` that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryChainStore {
    pub(crate) index: Mutex<ChainIndex>,
}

impl MemoryChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> LedgerResult<MutexGuard<'_, ChainIndex>> {
        self.index.lock().map_err(|e| LedgerError::Persistence {
            reason: format!("chain index lock poisoned: {}", e),
        })
    }
}

impl ChainStore for MemoryChainStore {
    /// Append under a single lock acquisition, so readers observe either the
    /// whole block with its events or neither.
    fn append(&self, block: &ChainBlock, events: &[StoredEvent]) -> LedgerResult<()> {
        let mut index = self.lock()?;
        index.check_append(block, events)?;
        index.insert(block.clone(), events.to_vec());
        Ok(())
    }

    fn load_tail(&self) -> LedgerResult<Option<ChainBlock>> {
        Ok(self.lock()?.tail().cloned())
    }

    fn load_chain(&self) -> LedgerResult<Vec<ChainBlock>> {
        Ok(self.lock()?.chain())
    }

    fn events_for_block(&self, sequence_id: u64) -> LedgerResult<Vec<StoredEvent>> {
        Ok(self.lock()?.events_for_block(sequence_id))
    }

    fn all_events(&self) -> LedgerResult<Vec<StoredEvent>> {
        Ok(self.lock()?.all_events())
    }

    fn get_event(&self, id: &Uuid) -> LedgerResult<Option<StoredEvent>> {
        Ok(self.lock()?.get_event(id))
    }

    fn block_count(&self) -> LedgerResult<usize> {
        Ok(self.lock()?.block_count())
    }
}

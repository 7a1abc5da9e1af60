//! Append-only JSON Lines implementation of `ChainStore`.
//!
//! File layout: one line per block, each line a `BlockRecord` holding the
//! block header and every event sealed into it. A block and its events are
//! written with a single `write_all` followed by `sync_data`, so they reach
//! the file together.
//!
//! On open the file is replayed into an in-memory `ChainIndex`. A final line
//! left incomplete by a crash is logged and truncated away; any other line
//! that fails to parse is an integrity error.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use ledgerguard_contracts::{
    block::{ChainBlock, StoredEvent},
    error::{LedgerError, LedgerResult},
};
use ledgerguard_core::traits::ChainStore;

use crate::memory::ChainIndex;

/// One line of the chain file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockRecord {
    pub block: ChainBlock,
    pub events: Vec<StoredEvent>,
}

struct JsonlState {
    file: File,
    len: u64,
    index: ChainIndex,
}

/// A durable `ChainStore` backed by a single JSON Lines file.
pub struct JsonlChainStore {
    path: PathBuf,
    state: Mutex<JsonlState>,
}

impl JsonlChainStore {
    /// Open the chain file at `path`, creating it and its parent directory
    /// if needed, and replay existing records.
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| persistence(&path, "create directory for", e))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|e| persistence(&path, "open", e))?;

        let contents = std::fs::read(&path).map_err(|e| persistence(&path, "read", e))?;
        let (index, valid_len, needs_newline) = replay(&path, &contents)?;

        if valid_len < contents.len() as u64 {
            warn!(
                path = %path.display(),
                discarded_bytes = contents.len() as u64 - valid_len,
                "truncating incomplete trailing record"
            );
            file.set_len(valid_len).map_err(|e| persistence(&path, "truncate", e))?;
        }
        let mut len = valid_len;
        if needs_newline {
            file.write_all(b"\n").map_err(|e| persistence(&path, "repair", e))?;
            len += 1;
        }

        info!(
            path = %path.display(),
            blocks = index.block_count(),
            tail = index.tail().map(|b| b.sequence_id).unwrap_or(0),
            "chain file opened"
        );

        Ok(Self {
            path,
            state: Mutex::new(JsonlState { file, len, index }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> LedgerResult<MutexGuard<'_, JsonlState>> {
        self.state.lock().map_err(|e| LedgerError::Persistence {
            reason: format!("chain file lock poisoned: {}", e),
        })
    }
}

/// Parse every line of `contents`.
///
/// Returns the index, the byte length of the valid prefix, and whether the
/// last valid record lacks its trailing newline.
fn replay(path: &Path, contents: &[u8]) -> LedgerResult<(ChainIndex, u64, bool)> {
    let mut index = ChainIndex::default();
    let mut offset = 0usize;
    let mut line_no = 0usize;

    while offset < contents.len() {
        line_no += 1;
        let rest = &contents[offset..];
        let (line, terminated) = match rest.iter().position(|b| *b == b'\n') {
            Some(end) => (&rest[..end], true),
            None => (rest, false),
        };
        let next = offset + line.len() + usize::from(terminated);

        if line.iter().all(u8::is_ascii_whitespace) {
            offset = next;
            continue;
        }

        match serde_json::from_slice::<BlockRecord>(line) {
            Ok(record) => {
                let sequence_id = record.block.sequence_id;
                if index.contains(sequence_id) {
                    return Err(LedgerError::Integrity {
                        sequence_id,
                        reason: format!("duplicate block at line {line_no} of {}", path.display()),
                    });
                }
                let expected = index.tail().map_or(1, |t| t.sequence_id + 1);
                if sequence_id != expected {
                    warn!(sequence_id, expected, line = line_no, "chain file has a sequence gap");
                }
                index.insert(record.block, record.events);
                if !terminated {
                    return Ok((index, contents.len() as u64, true));
                }
            }
            Err(e) if !terminated => {
                warn!(line = line_no, error = %e, "ignoring incomplete trailing record");
                return Ok((index, offset as u64, false));
            }
            Err(e) => {
                let sequence_id = index.tail().map_or(1, |t| t.sequence_id + 1);
                return Err(LedgerError::Integrity {
                    sequence_id,
                    reason: format!("unreadable record at line {line_no} of {}: {e}", path.display()),
                });
            }
        }
        offset = next;
    }

    debug!(lines = line_no, "chain file replayed");
    Ok((index, contents.len() as u64, false))
}

fn persistence(path: &Path, what: &str, err: std::io::Error) -> LedgerError {
    LedgerError::Persistence {
        reason: format!("failed to {what} chain file '{}': {err}", path.display()),
    }
}

impl ChainStore for JsonlChainStore {
    fn append(&self, block: &ChainBlock, events: &[StoredEvent]) -> LedgerResult<()> {
        let mut state = self.lock()?;
        state.index.check_append(block, events)?;

        let record = BlockRecord {
            block: block.clone(),
            events: events.to_vec(),
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let previous_len = state.len;
        let file = &mut state.file;
        let written = file.write_all(&line).and_then(|()| file.sync_data());
        if let Err(e) = written {
            // Roll back a partial write so the file stays a sequence of whole records.
            if let Err(rollback) = file.set_len(previous_len) {
                warn!(error = %rollback, "failed to roll back partial chain record");
            }
            return Err(persistence(&self.path, "append to", e));
        }

        state.len = previous_len + line.len() as u64;
        state.index.insert(record.block, record.events);
        debug!(sequence_id = block.sequence_id, bytes = line.len(), "block appended to chain file");
        Ok(())
    }

    fn load_tail(&self) -> LedgerResult<Option<ChainBlock>> {
        Ok(self.lock()?.index.tail().cloned())
    }

    fn load_chain(&self) -> LedgerResult<Vec<ChainBlock>> {
        Ok(self.lock()?.index.chain())
    }

    fn events_for_block(&self, sequence_id: u64) -> LedgerResult<Vec<StoredEvent>> {
        Ok(self.lock()?.index.events_for_block(sequence_id))
    }

    fn all_events(&self) -> LedgerResult<Vec<StoredEvent>> {
        Ok(self.lock()?.index.all_events())
    }

    fn get_event(&self, id: &Uuid) -> LedgerResult<Option<StoredEvent>> {
        Ok(self.lock()?.index.get_event(id))
    }

    fn block_count(&self) -> LedgerResult<usize> {
        Ok(self.lock()?.index.block_count())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Write;

    use ledgerguard_contracts::{
        block::{StoredEvent, GENESIS_LINK},
        event::{AuditEvent, EventType, Resource},
    };
    use ledgerguard_core::{sealer::ChainSealer, traits::ChainStore};

    use super::JsonlChainStore;

    fn append_block(store: &JsonlChainStore, sealer: &ChainSealer, action: &str) {
        let tail = store.load_tail().unwrap();
        let (sequence_id, link) = tail
            .map(|b| (b.sequence_id + 1, b.link_hash))
            .unwrap_or((1, GENESIS_LINK.to_string()));
        let batch = vec![AuditEvent::new(
            EventType::DataAccess,
            action,
            Resource::new("file", "f-1"),
        )];
        let block = sealer.seal(&batch, sequence_id, &link).unwrap();
        store
            .append(&block, &StoredEvent::from_batch(sequence_id, &batch))
            .unwrap();
    }

    /// Records appended before a reopen are replayed in order.
    #[test]
    fn test_reopen_replays_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.jsonl");
        let sealer = ChainSealer::new(1).unwrap();

        {
            let store = JsonlChainStore::open(&path).unwrap();
            append_block(&store, &sealer, "file.read");
            append_block(&store, &sealer, "file.write");
        }

        let store = JsonlChainStore::open(&path).unwrap();
        let chain = store.load_chain().unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].referenced_link, chain[0].link_hash);

        let events = store.events_for_block(2).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.action, "file.write");
        assert!(store.get_event(&events[0].event.id).unwrap().is_some());
    }

    /// A half-written final line is discarded and the file stays appendable.
    #[test]
    fn test_torn_tail_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.jsonl");
        let sealer = ChainSealer::new(1).unwrap();

        {
            let store = JsonlChainStore::open(&path).unwrap();
            append_block(&store, &sealer, "file.read");
        }
        {
            let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            write!(file, "{{\"block\":{{\"sequence_id\":2,").unwrap();
        }

        let store = JsonlChainStore::open(&path).unwrap();
        assert_eq!(store.block_count().unwrap(), 1);
        append_block(&store, &sealer, "file.write");
        drop(store);

        let store = JsonlChainStore::open(&path).unwrap();
        assert_eq!(store.block_count().unwrap(), 2);
    }

    /// Corruption before the last line is an integrity error, not silently skipped.
    #[test]
    fn test_corrupt_middle_line_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.jsonl");
        let sealer = ChainSealer::new(1).unwrap();
        {
            let store = JsonlChainStore::open(&path).unwrap();
            append_block(&store, &sealer, "file.read");
        }
        let original = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, format!("not json\n{original}")).unwrap();

        assert!(JsonlChainStore::open(&path).is_err());
    }

    #[test]
    fn test_out_of_order_append_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlChainStore::open(dir.path().join("chain.jsonl")).unwrap();
        let sealer = ChainSealer::new(0).unwrap();
        let batch = vec![AuditEvent::new(EventType::ApiAccess, "api.call", Resource::new("endpoint", "/"))];
        let block = sealer.seal(&batch, 5, GENESIS_LINK).unwrap();

        let err = store
            .append(&block, &StoredEvent::from_batch(5, &batch))
            .unwrap_err();
        assert!(err.to_string().contains("expected sequence 1"), "got: {err}");
        assert_eq!(store.block_count().unwrap(), 0);
    }
}

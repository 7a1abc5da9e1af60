//! Configuration schema.
//!
//! A `LedgerConfig` is deserialized from TOML. Every section and every field
//! has a default, so an empty document is a valid in-memory configuration.
//!
//! Example:
//! ```toml
//! [buffer]
//! batch_size = 10
//! flush_interval_secs = 30
//! max_buffer = 1000
//!
//! [chain]
//! difficulty = 2
//!
//! [store]
//! path = "/var/lib/ledgerguard/chain.jsonl"
//!
//! [signing]
//! secret_key_hex = "…64 hex chars…"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Event buffer and flush trigger settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferSettings {
    /// Queue length that triggers a flush.
    pub batch_size: usize,

    /// Period of the timer trigger, in seconds.
    pub flush_interval_secs: u64,

    /// Hard cap on queued events after a failed flush is restored.
    pub max_buffer: usize,
}

impl BufferSettings {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            flush_interval_secs: 30,
            max_buffer: 1000,
        }
    }
}

/// Proof-of-work settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSettings {
    /// Leading zero hex characters required of every `link_hash`.
    pub difficulty: u32,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self { difficulty: 2 }
    }
}

/// Where the chain lives. No `path` means an in-memory store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub path: Option<PathBuf>,
}

/// Local block signing. No key means blocks are sealed unsigned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningSettings {
    /// 32-byte Ed25519 seed, hex encoded.
    pub secret_key_hex: Option<String>,
}

/// The top-level structure deserialized from a TOML configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub buffer: BufferSettings,
    pub chain: ChainSettings,
    pub store: StoreSettings,
    pub signing: SigningSettings,
}

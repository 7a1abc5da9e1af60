//! # ledgerguard-config
//!
//! TOML-driven configuration for the ledgerguard audit chain.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use ledgerguard_config::LedgerConfig;
//!
//! let config = LedgerConfig::from_file(Path::new("ledgerguard.toml"))?;
//! // Pass `config` to `ledgerguard_audit::AuditService::start(...)`.
//! ```
//!
//! Omitted sections fall back to their defaults: batches of 10, a 30 second
//! flush timer, a 1000 event buffer cap, difficulty 2, an in-memory store and
//! no signing key.

pub mod loader;
pub mod settings;

pub use settings::{BufferSettings, ChainSettings, LedgerConfig, SigningSettings, StoreSettings};

// ── Tests ─────────────────────────────────────────────────────────────────────

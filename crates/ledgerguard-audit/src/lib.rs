//! # ledgerguard-audit
//!
//! Batched, hash-linked audit chain.
//!
//! ## Overview
//!
//! Producers hand `AuditEvent`s to an [`AuditService`]. Events are buffered
//! and sealed in batches into `ChainBlock`s: each block commits to its
//! events through `events_hash`, to its predecessor through
//! `referenced_link`, and carries a proof-of-work `link_hash`. Blocks are
//! optionally signed and persisted to a [`ChainStore`] together with their
//! events. [`IntegrityVerifier`] replays the store and reports every break.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ledgerguard_audit::{AuditService, MemoryChainStore};
//! use ledgerguard_contracts::{event::{AuditEvent, EventType, Resource}, integrity::VerifyScope};
//!
//! let service = AuditService::builder().build(Arc::new(MemoryChainStore::new()))?;
//! service.log_event(AuditEvent::new(EventType::DataAccess, "file.read", Resource::new("file", "f-1")))?;
//! service.shutdown()?;
//!
//! assert!(service.verify_integrity(&VerifyScope::all())?.is_valid);
//! ```
//!
//! [`ChainStore`]: ledgerguard_core::traits::ChainStore

pub mod buffer;
pub mod bus;
pub mod integrity;
pub mod jsonl;
pub mod memory;
pub mod service;
pub mod signer;

pub use buffer::{EventBuffer, FlushTrigger};
pub use bus::{NullPublisher, SubscriberRegistry};
pub use integrity::IntegrityVerifier;
pub use jsonl::{BlockRecord, JsonlChainStore};
pub use memory::MemoryChainStore;
pub use service::{AuditService, AuditServiceBuilder, INITIALIZATION_FAILED_ACTION};
pub use signer::Ed25519Signer;

// ── Tests ─────────────────────────────────────────────────────────────────────

//! # ledgerguard-contracts
//!
//! Shared types for the ledgerguard audit chain.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions, filter predicates and error types.

pub mod block;
pub mod error;
pub mod event;
pub mod integrity;
pub mod notice;
pub mod query;
pub mod report;

pub use block::{ChainBlock, StoredEvent, GENESIS_LINK};
pub use error::{LedgerError, LedgerResult};
pub use event::{Actor, AuditEvent, EventMetadata, EventType, Outcome, Resource, Severity};

//! # ledgerguard-validate
//!
//! Producer-boundary validation for the ledgerguard audit chain.
//!
//! This crate provides [`validator::EventValidator`]. Typed events are checked
//! against semantic rules; raw JSON submissions are first checked against the
//! built-in event JSON Schema.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use ledgerguard_validate::EventValidator;
//!
//! let mut validator = EventValidator::new()?;
//! validator.register_rule("workspace-required", Box::new(|event| {
//!     event.metadata.workspace_id.is_none().then(|| "workspace_id is required".to_string())
//! }));
//! ```

pub mod validator;

pub use validator::{event_json_schema, EventValidator, ValidationFailure, ValidationReport};

// ── Tests ─────────────────────────────────────────────────────────────────────

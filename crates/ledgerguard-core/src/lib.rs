//! # ledgerguard-core
//!
//! Block sealing and the trait seams of the ledgerguard audit chain.
//!
//! This crate provides:
//! - The four seam traits (`Signer`, `ChainStore`, `Publisher`, `Subscriber`)
//! - `ChainSealer` and the canonical hashing functions shared by the write
//!   path and the integrity verifier
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ledgerguard_core::{ChainSealer, GENESIS_LINK};
//!
//! let sealer = ChainSealer::new(2)?;
//! let block = sealer.seal(&batch, 1, GENESIS_LINK)?;
//! assert!(block.link_hash.starts_with("00"));
//! ```

pub mod sealer;
pub mod traits;

pub use ledgerguard_contracts::block::GENESIS_LINK;
pub use sealer::{
    block_candidate_bytes, hash_events, meets_difficulty, sha256_hex, ChainSealer,
    DEFAULT_DIFFICULTY, MAX_DIFFICULTY,
};

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Loading and validating a `LedgerConfig`.
//!
//! ```rust,ignore
//! use ledgerguard_config::LedgerConfig;
//!
//! let config = LedgerConfig::from_file(Path::new("ledgerguard.toml"))?;
//! ```

use std::path::Path;

use tracing::debug;

use ledgerguard_contracts::error::{LedgerError, LedgerResult};

use crate::settings::LedgerConfig;

/// Highest accepted proof-of-work difficulty (the width of a SHA-256 hex digest).
const MAX_DIFFICULTY: u32 = 64;

impl LedgerConfig {
    /// Parse `s` as TOML and validate the result.
    ///
    /// Returns `LedgerError::Config` if the TOML is malformed, does not match
    /// the expected schema, or fails `validate`.
    pub fn from_toml_str(s: &str) -> LedgerResult<Self> {
        let config: LedgerConfig = toml::from_str(s).map_err(|e| LedgerError::Config {
            reason: format!("failed to parse configuration TOML: {}", e),
        })?;
        config.validate()?;
        debug!(
            batch_size = config.buffer.batch_size,
            flush_interval_secs = config.buffer.flush_interval_secs,
            difficulty = config.chain.difficulty,
            persistent = config.store.path.is_some(),
            signing = config.signing.secret_key_hex.is_some(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Read the file at `path` and parse it as TOML configuration.
    pub fn from_file(path: &Path) -> LedgerResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| LedgerError::Config {
            reason: format!("failed to read configuration file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> LedgerResult<()> {
        let buffer = &self.buffer;
        if buffer.batch_size == 0 {
            return Err(config_error("buffer.batch_size must be at least 1"));
        }
        if buffer.flush_interval_secs == 0 {
            return Err(config_error("buffer.flush_interval_secs must be at least 1"));
        }
        if buffer.max_buffer < buffer.batch_size {
            return Err(config_error(format!(
                "buffer.max_buffer ({}) must not be smaller than buffer.batch_size ({})",
                buffer.max_buffer, buffer.batch_size
            )));
        }
        if self.chain.difficulty > MAX_DIFFICULTY {
            return Err(config_error(format!(
                "chain.difficulty ({}) must not exceed {}",
                self.chain.difficulty, MAX_DIFFICULTY
            )));
        }
        self.signing_seed()?;
        Ok(())
    }

    /// Decode `signing.secret_key_hex` into a 32-byte seed.
    pub fn signing_seed(&self) -> LedgerResult<Option<[u8; 32]>> {
        let Some(encoded) = &self.signing.secret_key_hex else {
            return Ok(None);
        };
        let bytes = hex::decode(encoded.trim())
            .map_err(|e| config_error(format!("signing.secret_key_hex is not valid hex: {e}")))?;
        let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            config_error(format!(
                "signing.secret_key_hex must decode to 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Some(seed))
    }
}

fn config_error(reason: impl Into<String>) -> LedgerError {
    LedgerError::Config {
        reason: reason.into(),
    }
}

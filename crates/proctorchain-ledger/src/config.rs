//! Ledger configuration.
//!
//! A `LedgerConfig` is deserialized from TOML.  Every key is optional; a
//! missing key takes the default shown below.
//!
//! ```toml
//! database_path = "blockchain_logs.db"
//! private_key_path = "private_key.pem"
//! public_key_path = "public_key.pem"
//! difficulty = 4
//! batch_size = 10
//! max_mining_attempts = 1000000
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use proctorchain_contracts::error::{LedgerError, LedgerResult};
use proctorchain_core::{DEFAULT_DIFFICULTY, DEFAULT_MAX_ATTEMPTS, MAX_DIFFICULTY};

/// Events per block unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Where the ledger keeps its files and how it mines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    /// SQLite database file.
    pub database_path: PathBuf,

    /// PKCS#8 PEM signing key, created on first start.
    pub private_key_path: PathBuf,

    /// SubjectPublicKeyInfo PEM, created alongside the private key.
    pub public_key_path: PathBuf,

    /// Leading zero hex characters required of a block hash.
    pub difficulty: usize,

    /// Pending events that trigger mining.
    pub batch_size: usize,

    /// Nonces tried per block before it is accepted unsealed.
    pub max_mining_attempts: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("blockchain_logs.db"),
            private_key_path: PathBuf::from("private_key.pem"),
            public_key_path: PathBuf::from("public_key.pem"),
            difficulty: DEFAULT_DIFFICULTY,
            batch_size: DEFAULT_BATCH_SIZE,
            max_mining_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl LedgerConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> LedgerResult<Self> {
        let config: LedgerConfig = toml::from_str(s).map_err(|e| LedgerError::Config {
            reason: format!("failed to parse ledger TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it with [`from_toml_str`](Self::from_toml_str).
    pub fn from_file(path: &Path) -> LedgerResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| LedgerError::Config {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::Config {
                reason: format!(
                    "difficulty {} exceeds the {} hex characters of a block hash",
                    self.difficulty, MAX_DIFFICULTY
                ),
            });
        }
        if self.batch_size == 0 {
            return Err(LedgerError::Config {
                reason: "batch_size must be at least 1".to_string(),
            });
        }
        if self.max_mining_attempts == 0 {
            return Err(LedgerError::Config {
                reason: "max_mining_attempts must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The mining and batching subset used by [`Ledger`](crate::Ledger).
    pub fn settings(&self) -> LedgerSettings {
        LedgerSettings {
            difficulty: self.difficulty,
            batch_size: self.batch_size,
            max_mining_attempts: self.max_mining_attempts,
        }
    }
}

/// Batching and mining parameters of a running ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSettings {
    pub difficulty: usize,
    pub batch_size: usize,
    pub max_mining_attempts: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerConfig::default().settings()
    }
}

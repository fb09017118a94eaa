//! Ledger configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{LedgerError, Result};

/// Configuration for the [`Ledger`](crate::Ledger).
///
/// Every field has a default, so a config file only names what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// How many times `append` re-reads the head after losing a
    /// compare-and-append race before giving up with `Conflict`.
    pub max_append_retries: u32,

    /// Re-verify the whole ledger from genesis on every `read`.
    pub verify_on_read: bool,

    /// Run the fraud detector on plain `append` too; a flag from the
    /// detector replaces a clean verdict supplied by the caller.
    pub screen_appends: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_append_retries: 8,
            verify_on_read: false,
            screen_appends: false,
        }
    }
}

impl LedgerConfig {
    /// Parse a JSON config document.
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| LedgerError::Config(e.to_string()))
    }

    /// Load a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }
}

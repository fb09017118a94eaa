//! Error types for the audit ledger core.

use thiserror::Error;

/// Errors raised while canonicalizing or hashing a change set.
///
/// These are programmer errors in the caller: the payload cannot be encoded
/// canonically and is never silently coerced.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("change set uses the reserved key `{0}`")]
    ReservedKey(&'static str),

    #[error("non-finite float at `{path}` cannot be canonically encoded")]
    NonFiniteFloat { path: String },

    #[error("integer at `{path}` is outside the signed 64-bit range")]
    IntegerOutOfRange { path: String },

    #[error("change set must be a mapping, got {0}")]
    NotAMapping(&'static str),

    #[error("encoding error: {0}")]
    EncodingError(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::EncodingError(e.to_string())
    }
}

/// Errors raised by the verifier.
///
/// An invalid chain is *not* an error: it is reported as `Ok(false)` or as a
/// non-intact [`ChainVerdict`](crate::verify::ChainVerdict). These variants mean
/// the input could not be read at all.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("malformed entry at line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("entry {index} has changes that cannot be re-encoded: {source}")]
    Unencodable {
        index: usize,
        #[source]
        source: CoreError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

use thiserror::Error;

/// Errors produced by account store implementations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Operation addressed an account id that does not exist.
    #[error("no account with id: {id}")]
    NotFound { id: String },
    /// Filesystem failure on the account or key file.
    #[error("i/o failure: {reason}")]
    Io { reason: String },
    /// Malformed JSON, bad key material, or failed decryption.
    #[error("decode failure: {reason}")]
    Decode { reason: String },
}

impl StoreError {
    pub fn not_found(id: impl Into<String>) -> Self {
        StoreError::NotFound { id: id.into() }
    }

    pub fn io(reason: impl ToString) -> Self {
        StoreError::Io {
            reason: reason.to_string(),
        }
    }

    pub fn decode(reason: impl ToString) -> Self {
        StoreError::Decode {
            reason: reason.to_string(),
        }
    }
}

//! Error types for the Vellum core library.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// All errors that can occur within the Vellum core library.
#[derive(Debug, Error)]
pub enum VellumError {
    /// The backing key-value store failed.
    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Another process held the journal lock for longer than the open timeout.
    #[error("Could not lock the journal at {} within {timeout:?}", .path.display())]
    LockTimeout { path: PathBuf, timeout: Duration },

    /// An I/O operation on the filesystem failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored entry could not be deserialized from JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Password hashing or key derivation failed.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// A stored record could not be decrypted with the session key.
    ///
    /// Either the journal was written under a different password or the
    /// record bytes are corrupted. Never treated as empty content.
    #[error("Entry could not be decrypted — wrong password or corrupted data")]
    DecryptionFailure,

    /// The journal has no password yet; `create_password` must run first.
    #[error("Journal has not been initialized with a password")]
    NotInitialized,

    /// The journal already has a password; it cannot be set twice.
    #[error("Journal already has a password")]
    AlreadyInitialized,

    /// The supplied password does not match the stored verification hash.
    #[error("Incorrect password")]
    InvalidCredentials,

    /// An entry ID was requested that does not exist in the journal.
    #[error("Entry not found: {0}")]
    EntryNotFound(u64),

    /// An entry operation ran before a successful `auth` call.
    #[error("Journal is locked — authenticate first")]
    NotAuthenticated,

    /// An operation ran on a journal that has been closed.
    #[error("Journal has been closed")]
    Closed,
}

/// Convenience alias that pins the error type to [`VellumError`].
pub type Result<T> = std::result::Result<T, VellumError>;

impl VellumError {
    /// Returns a short, human-readable message suitable for display to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Storage(e) => format!("Failed to access the journal: {e}"),
            Self::LockTimeout { path, .. } => format!(
                "Another process is using the journal at {}",
                path.display()
            ),
            Self::Io(e) => format!("File error: {e}"),
            Self::Json(e) => format!("Data format error: {e}"),
            Self::Crypto(e) => format!("Encryption error: {e}"),
            Self::DecryptionFailure => {
                "Could not decrypt the journal — wrong password or corrupted data".to_string()
            }
            Self::NotInitialized => {
                "This journal has no password yet — create one first".to_string()
            }
            Self::AlreadyInitialized => "This journal already has a password".to_string(),
            Self::InvalidCredentials => "Incorrect password — please try again".to_string(),
            Self::EntryNotFound(_) => "Entry no longer exists".to_string(),
            Self::NotAuthenticated => "Unlock the journal before editing entries".to_string(),
            Self::Closed => "The journal has been closed".to_string(),
        }
    }
}

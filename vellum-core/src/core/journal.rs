//! High-level journal operations over the encrypted entry store.

use crate::core::storage::{entry_key, Storage, KDF_SALT_KEY, PASSWORD_KEY};
use crate::core::{crypto, crypto::SessionKey};
use crate::{Entry, Result, VellumError};
use chrono::Utc;
use log::{debug, info};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::path::Path;
use std::time::Duration;

/// How long `open` waits for another handle to release the journal lock.
const OPEN_TIMEOUT: Duration = Duration::from_secs(2);

/// An open journal backed by an encrypted entry store.
///
/// `Journal` is the primary interface for all entry mutations. A fresh handle
/// starts locked: entry operations fail with
/// [`VellumError::NotAuthenticated`] until [`auth`](Self::auth) succeeds and
/// caches the session key. The key lives only on this value and is wiped when
/// the journal is closed or dropped.
pub struct Journal {
    storage: Option<Storage>,
    session_key: Option<SessionKey>,
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal")
            .field("closed", &self.storage.is_none())
            .field("session_key", &"[REDACTED]")
            .finish()
    }
}

impl Journal {
    /// Opens (creating if absent) the journal database at `path`.
    ///
    /// Waits up to two seconds for another handle to release the file lock.
    ///
    /// # Errors
    ///
    /// Returns [`VellumError::LockTimeout`] if the lock cannot be acquired in
    /// time, or [`VellumError::Storage`] for any other backend failure.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let storage = Storage::open(path, OPEN_TIMEOUT)?;
        debug!("journal opened");
        Ok(Self {
            storage: Some(storage),
            session_key: None,
        })
    }

    /// Reports whether a password has been created for this journal.
    ///
    /// Read-only; safe to call before authentication.
    ///
    /// # Errors
    ///
    /// Returns [`VellumError::Closed`] after [`close`](Self::close), or
    /// [`VellumError::Storage`] on backend failure.
    pub fn is_initialized(&self) -> Result<bool> {
        let storage = self.storage()?;
        Ok(storage.password.contains_key(PASSWORD_KEY)?)
    }

    /// Creates the journal password: stores its verification hash and a fresh
    /// key-derivation salt in one atomic transaction.
    ///
    /// Does not authenticate — call [`auth`](Self::auth) afterwards to unlock
    /// the journal. Refuses to overwrite an existing password, since entries
    /// encrypted under the old one would become unreadable.
    ///
    /// # Errors
    ///
    /// Returns [`VellumError::AlreadyInitialized`] if a password exists, or
    /// [`VellumError::Crypto`] if hashing fails.
    pub fn create_password(&mut self, plaintext: &str) -> Result<()> {
        let storage = self.storage()?;
        if storage.password.contains_key(PASSWORD_KEY)? {
            return Err(VellumError::AlreadyInitialized);
        }

        let hash = crypto::hash_password(plaintext)?;
        let salt = crypto::generate_kdf_salt();

        storage
            .password
            .transaction(|tx| {
                if tx.get(PASSWORD_KEY)?.is_some() {
                    return Err(ConflictableTransactionError::Abort(
                        VellumError::AlreadyInitialized,
                    ));
                }
                let _ = tx.insert(PASSWORD_KEY, hash.as_bytes())?;
                let _ = tx.insert(KDF_SALT_KEY, &salt[..])?;
                Ok(())
            })
            .map_err(unwrap_tx_error)?;
        storage.flush()?;

        info!("journal password created");
        Ok(())
    }

    /// Authenticates against the stored verification hash and, on success,
    /// derives and caches the session key.
    ///
    /// This is the only place the session key is ever set. The credential
    /// record is never modified here.
    ///
    /// # Errors
    ///
    /// Returns [`VellumError::NotInitialized`] if no password has been
    /// created, or [`VellumError::InvalidCredentials`] on mismatch.
    pub fn auth(&mut self, plaintext: &str) -> Result<()> {
        let (stored_hash, stored_salt) = {
            let storage = self.storage()?;
            let hash = storage
                .password
                .get(PASSWORD_KEY)?
                .ok_or(VellumError::NotInitialized)?;
            let salt = storage.password.get(KDF_SALT_KEY)?.ok_or_else(|| {
                VellumError::Crypto("journal is missing its key-derivation salt".to_string())
            })?;
            (hash, salt)
        };

        let hash = std::str::from_utf8(&stored_hash).map_err(|_| {
            VellumError::Crypto("stored verification hash is not valid UTF-8".to_string())
        })?;
        crypto::verify_password(plaintext, hash)?;

        let salt: [u8; crypto::KDF_SALT_LEN] = stored_salt.as_ref().try_into().map_err(|_| {
            VellumError::Crypto("stored key-derivation salt has the wrong length".to_string())
        })?;
        self.session_key = Some(crypto::derive_session_key(plaintext, &salt)?);

        debug!("journal unlocked");
        Ok(())
    }

    /// Stores a new entry and returns it.
    ///
    /// The ID comes from the store's monotonic counter: strictly increasing,
    /// never reused even after deletions. `created_at` and `updated_at` are
    /// both set to now. The write is one atomic insert of the encrypted
    /// record.
    ///
    /// # Errors
    ///
    /// Returns [`VellumError::NotAuthenticated`] before a successful
    /// [`auth`](Self::auth), or [`VellumError::Storage`]/
    /// [`VellumError::Crypto`] on backend or encryption failure.
    pub fn create_entry(&self, content: &str) -> Result<Entry> {
        let storage = self.storage()?;
        let key = self.session_key()?;

        let now = Utc::now();
        let entry = Entry {
            id: storage.next_entry_id()?,
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        };

        let plaintext = serde_json::to_vec(&entry)?;
        let sealed = crypto::seal(key, &plaintext)?;
        let _ = storage.entries.insert(entry_key(entry.id), sealed)?;
        storage.flush()?;

        debug!("entry {} created", entry.id);
        Ok(entry)
    }

    /// Fetches and decrypts a single entry.
    ///
    /// # Errors
    ///
    /// Returns [`VellumError::EntryNotFound`] if `id` does not exist, or
    /// [`VellumError::DecryptionFailure`] if the record cannot be decrypted
    /// with the current session key.
    pub fn get_entry(&self, id: u64) -> Result<Entry> {
        let storage = self.storage()?;
        let key = self.session_key()?;

        let sealed = storage
            .entries
            .get(entry_key(id))?
            .ok_or(VellumError::EntryNotFound(id))?;
        let plaintext = crypto::open(key, &sealed)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// Replaces an entry's content, preserving its ID and creation time and
    /// advancing `updated_at`.
    ///
    /// The read and the overwrite happen inside one backend transaction, so a
    /// concurrent edit or delete of the same ID can never be half-observed.
    ///
    /// # Errors
    ///
    /// Returns [`VellumError::EntryNotFound`] if `id` does not exist, or
    /// [`VellumError::DecryptionFailure`] if the stored record cannot be
    /// decrypted with the current session key.
    pub fn edit_entry(&self, id: u64, content: &str) -> Result<Entry> {
        let storage = self.storage()?;
        let key = self.session_key()?;

        let entry = storage
            .entries
            .transaction(|tx| {
                let sealed = tx.get(entry_key(id))?.ok_or(
                    ConflictableTransactionError::Abort(VellumError::EntryNotFound(id)),
                )?;

                let plaintext =
                    crypto::open(key, &sealed).map_err(ConflictableTransactionError::Abort)?;
                let mut entry: Entry = serde_json::from_slice(&plaintext)
                    .map_err(|e| ConflictableTransactionError::Abort(VellumError::Json(e)))?;

                entry.content = content.to_string();
                entry.updated_at = Utc::now();

                let plaintext = serde_json::to_vec(&entry)
                    .map_err(|e| ConflictableTransactionError::Abort(VellumError::Json(e)))?;
                let sealed =
                    crypto::seal(key, &plaintext).map_err(ConflictableTransactionError::Abort)?;
                let _ = tx.insert(&entry_key(id)[..], sealed)?;

                Ok(entry)
            })
            .map_err(unwrap_tx_error)?;
        storage.flush()?;

        debug!("entry {} edited", id);
        Ok(entry)
    }

    /// Removes an entry. Deleting an absent ID is a no-op success.
    ///
    /// # Errors
    ///
    /// Returns [`VellumError::Storage`] on backend failure.
    pub fn delete_entry(&self, id: u64) -> Result<()> {
        let storage = self.storage()?;
        let _ = storage.entries.remove(entry_key(id))?;
        storage.flush()?;

        debug!("entry {} deleted", id);
        Ok(())
    }

    /// Decrypts every entry and returns them newest-first (descending ID).
    ///
    /// Fail-fast: if any record fails to decrypt the whole call errors rather
    /// than silently dropping entries — partial decryptability means a wrong
    /// credential or corruption, and the caller must hear about it.
    ///
    /// # Errors
    ///
    /// Returns [`VellumError::NotAuthenticated`] before a successful
    /// [`auth`](Self::auth), or [`VellumError::DecryptionFailure`] if any
    /// record cannot be decrypted.
    pub fn list_entries(&self) -> Result<Vec<Entry>> {
        let storage = self.storage()?;
        let key = self.session_key()?;

        let mut entries = Vec::new();
        for item in storage.entries.iter() {
            let (_, sealed) = item?;
            let plaintext = crypto::open(key, &sealed)?;
            let entry: Entry = serde_json::from_slice(&plaintext)?;
            entries.push(entry);
        }

        // Newest first; callers rely on this ordering.
        entries.sort_unstable_by(|a, b| b.id.cmp(&a.id));
        Ok(entries)
    }

    /// Flushes and releases the backing store and wipes the session key.
    ///
    /// Idempotent. Any operation after `close` fails with
    /// [`VellumError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns [`VellumError::Storage`] if the final flush fails.
    pub fn close(&mut self) -> Result<()> {
        self.session_key = None;
        if let Some(storage) = self.storage.take() {
            storage.flush()?;
            debug!("journal closed");
        }
        Ok(())
    }

    fn storage(&self) -> Result<&Storage> {
        self.storage.as_ref().ok_or(VellumError::Closed)
    }

    fn session_key(&self) -> Result<&SessionKey> {
        self.session_key.as_ref().ok_or(VellumError::NotAuthenticated)
    }
}

/// Collapses a sled transaction error into the journal's own error type.
fn unwrap_tx_error(err: TransactionError<VellumError>) -> VellumError {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => VellumError::Storage(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TEST_PASSWORD: &str = "password";

    fn open_journal(dir: &TempDir) -> Journal {
        Journal::open(dir.path().join("journal.db")).unwrap()
    }

    fn open_authenticated_journal(dir: &TempDir) -> Journal {
        let mut journal = open_journal(dir);
        journal.create_password(TEST_PASSWORD).unwrap();
        journal.auth(TEST_PASSWORD).unwrap();
        journal
    }

    #[test]
    fn test_create_entry_round_trips_through_list() {
        let dir = TempDir::new().unwrap();
        let journal = open_authenticated_journal(&dir);

        let created = journal.create_entry("a new journal entry for a new day").unwrap();
        assert_eq!(created.created_at, created.updated_at);

        let entries = journal.list_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0], created);
    }

    #[test]
    fn test_entry_ids_are_increasing_and_never_reused() {
        let dir = TempDir::new().unwrap();
        let journal = open_authenticated_journal(&dir);

        let first = journal.create_entry("first").unwrap();
        let second = journal.create_entry("second").unwrap();
        assert!(first.id >= 1);
        assert!(second.id > first.id);

        journal.delete_entry(second.id).unwrap();
        let third = journal.create_entry("third").unwrap();
        assert!(third.id > second.id);
    }

    #[test]
    fn test_edit_preserves_id_and_created_at() {
        let dir = TempDir::new().unwrap();
        let journal = open_authenticated_journal(&dir);

        let original = journal.create_entry("i've been created").unwrap();
        let edited = journal.edit_entry(original.id, "i've been edited").unwrap();

        assert_eq!(edited.id, original.id);
        assert_eq!(edited.created_at, original.created_at);
        assert_eq!(edited.content, "i've been edited");
        assert!(edited.updated_at >= original.updated_at);

        let fetched = journal.get_entry(original.id).unwrap();
        assert_eq!(fetched, edited);
    }

    #[test]
    fn test_edit_missing_entry_is_not_found() {
        let dir = TempDir::new().unwrap();
        let journal = open_authenticated_journal(&dir);

        let result = journal.edit_entry(42, "nothing here");
        assert!(matches!(result, Err(VellumError::EntryNotFound(42))));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let journal = open_authenticated_journal(&dir);

        let entry = journal.create_entry("short-lived").unwrap();
        journal.delete_entry(entry.id).unwrap();
        journal.delete_entry(entry.id).unwrap();
        journal.delete_entry(9999).unwrap();

        assert!(journal.list_entries().unwrap().is_empty());
    }

    #[test]
    fn test_list_returns_newest_first() {
        let dir = TempDir::new().unwrap();
        let journal = open_authenticated_journal(&dir);

        for content in ["first entry wow", "some stuff happened", "rust is great"] {
            journal.create_entry(content).unwrap();
        }

        let entries = journal.list_entries().unwrap();
        let contents: Vec<&str> = entries.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(
            contents,
            ["rust is great", "some stuff happened", "first entry wow"]
        );
        assert!(entries.windows(2).all(|w| w[0].id > w[1].id));
    }

    #[test]
    fn test_entry_operations_require_auth() {
        let dir = TempDir::new().unwrap();
        let journal = open_journal(&dir);

        assert!(matches!(
            journal.create_entry("too early"),
            Err(VellumError::NotAuthenticated)
        ));
        assert!(matches!(
            journal.list_entries(),
            Err(VellumError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_create_password_does_not_authenticate() {
        let dir = TempDir::new().unwrap();
        let mut journal = open_journal(&dir);

        journal.create_password(TEST_PASSWORD).unwrap();
        assert!(matches!(
            journal.create_entry("still locked"),
            Err(VellumError::NotAuthenticated)
        ));

        journal.auth(TEST_PASSWORD).unwrap();
        assert!(journal.create_entry("unlocked now").is_ok());
    }

    #[test]
    fn test_auth_with_wrong_password_fails_without_mutating_credentials() {
        let dir = TempDir::new().unwrap();
        let mut journal = open_journal(&dir);
        journal.create_password(TEST_PASSWORD).unwrap();

        let result = journal.auth("some incorrect password");
        assert!(matches!(result, Err(VellumError::InvalidCredentials)));

        // The stored credential still verifies the real password.
        journal.auth(TEST_PASSWORD).unwrap();
    }

    #[test]
    fn test_auth_before_create_password_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        let mut journal = open_journal(&dir);

        assert!(matches!(
            journal.auth(TEST_PASSWORD),
            Err(VellumError::NotInitialized)
        ));
    }

    #[test]
    fn test_second_create_password_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut journal = open_journal(&dir);

        journal.create_password(TEST_PASSWORD).unwrap();
        assert!(matches!(
            journal.create_password("another password"),
            Err(VellumError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_is_initialized_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.db");

        {
            let mut journal = Journal::open(&path).unwrap();
            assert!(!journal.is_initialized().unwrap());
            journal.create_password(TEST_PASSWORD).unwrap();
            assert!(journal.is_initialized().unwrap());
            journal.close().unwrap();
        }

        let journal = Journal::open(&path).unwrap();
        assert!(journal.is_initialized().unwrap());
    }

    #[test]
    fn test_entries_decrypt_across_sessions_with_same_password() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.db");

        {
            let mut journal = Journal::open(&path).unwrap();
            journal.create_password(TEST_PASSWORD).unwrap();
            journal.auth(TEST_PASSWORD).unwrap();
            journal.create_entry("written in session one").unwrap();
            journal.close().unwrap();
        }

        let mut journal = Journal::open(&path).unwrap();
        journal.auth(TEST_PASSWORD).unwrap();
        let entries = journal.list_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "written in session one");
    }

    #[test]
    fn test_entries_written_under_a_different_key_fail_to_decrypt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.db");

        {
            let mut journal = Journal::open(&path).unwrap();
            journal.create_password(TEST_PASSWORD).unwrap();
            journal.auth(TEST_PASSWORD).unwrap();
            journal.create_entry("sealed under the first key").unwrap();
            journal.close().unwrap();
        }

        // Simulate a credential mismatch: same records, different session key.
        let mut journal = Journal::open(&path).unwrap();
        journal.auth(TEST_PASSWORD).unwrap();
        journal.session_key =
            Some(crypto::derive_session_key("a different password", &[9u8; crypto::KDF_SALT_LEN]).unwrap());

        assert!(matches!(
            journal.list_entries(),
            Err(VellumError::DecryptionFailure)
        ));
    }

    #[test]
    fn test_close_is_idempotent_and_fences_later_calls() {
        let dir = TempDir::new().unwrap();
        let mut journal = open_authenticated_journal(&dir);

        journal.close().unwrap();
        journal.close().unwrap();

        assert!(matches!(
            journal.is_initialized(),
            Err(VellumError::Closed)
        ));
        assert!(matches!(
            journal.create_entry("after close"),
            Err(VellumError::Closed)
        ));
    }
}

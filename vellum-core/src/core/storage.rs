//! Backend adapter over the embedded sled key-value store.
//!
//! The journal persists into one sled database holding two named trees:
//! `journal` (big-endian entry ID → encrypted record envelope) and `password`
//! (fixed keys for the verification hash and the key-derivation salt). Tree
//! names and keys live here as the single source of truth.

use crate::{Result, VellumError};
use std::path::Path;
use std::time::{Duration, Instant};

/// Tree holding encrypted entry records, keyed by 8-byte big-endian ID.
const JOURNAL_TREE: &str = "journal";

/// Tree holding the credential material.
const PASSWORD_TREE: &str = "password";

/// Key of the password verification hash within the password tree.
pub(crate) const PASSWORD_KEY: &str = "pw";

/// Key of the session-key derivation salt within the password tree.
pub(crate) const KDF_SALT_KEY: &str = "kdf_salt";

/// How long between lock-acquisition attempts while opening.
const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// An open handle to the backing store and its two trees.
///
/// sled holds an exclusive file lock for the lifetime of this value, so no
/// second process (or second handle in this process) can open the same
/// journal concurrently.
pub(crate) struct Storage {
    db: sled::Db,
    pub(crate) entries: sled::Tree,
    pub(crate) password: sled::Tree,
}

impl Storage {
    /// Opens (creating if absent) the database at `path`, retrying lock
    /// acquisition until `timeout` expires, then opens both trees.
    ///
    /// Opening a tree is create-if-absent, so a fresh database comes up with
    /// both namespaces ready.
    ///
    /// # Errors
    ///
    /// Returns [`VellumError::LockTimeout`] if another handle still holds the
    /// lock when the timeout expires, or [`VellumError::Storage`] for any
    /// other backend failure.
    pub(crate) fn open<P: AsRef<Path>>(path: P, timeout: Duration) -> Result<Self> {
        let path = path.as_ref();
        let deadline = Instant::now() + timeout;

        let db = loop {
            match sled::open(path) {
                Ok(db) => break db,
                Err(sled::Error::Io(e)) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(VellumError::LockTimeout {
                            path: path.to_path_buf(),
                            timeout,
                        });
                    }
                    std::thread::sleep(RETRY_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        };

        let entries = db.open_tree(JOURNAL_TREE)?;
        let password = db.open_tree(PASSWORD_TREE)?;

        Ok(Self {
            db,
            entries,
            password,
        })
    }

    /// Allocates the next entry ID from the store's persisted monotonic
    /// counter.
    ///
    /// IDs start at 1 and only ever grow; an ID burned by a failed write
    /// leaves a gap but is never handed out again.
    pub(crate) fn next_entry_id(&self) -> Result<u64> {
        Ok(self.db.generate_id()? + 1)
    }

    /// Flushes dirty pages to disk, making prior writes durable.
    pub(crate) fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

/// Returns the 8-byte big-endian key an entry is stored under.
pub(crate) fn entry_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_both_trees() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::open(temp.path().join("journal.db"), Duration::from_secs(2)).unwrap();

        assert!(storage.entries.is_empty());
        assert!(storage.password.is_empty());
    }

    #[test]
    fn test_reopen_existing_database() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("journal.db");

        {
            let storage = Storage::open(&path, Duration::from_secs(2)).unwrap();
            let _ = storage.entries.insert(entry_key(1), b"sealed".to_vec()).unwrap();
            storage.flush().unwrap();
        }

        let storage = Storage::open(&path, Duration::from_secs(2)).unwrap();
        assert!(storage.entries.get(entry_key(1)).unwrap().is_some());
    }

    #[test]
    fn test_second_open_times_out_while_lock_held() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("journal.db");

        let _held = Storage::open(&path, Duration::from_secs(2)).unwrap();
        let result = Storage::open(&path, Duration::from_millis(200));

        assert!(matches!(result, Err(VellumError::LockTimeout { .. })));
    }

    #[test]
    fn test_next_entry_id_is_positive_and_increasing() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::open(temp.path().join("journal.db"), Duration::from_secs(2)).unwrap();

        let first = storage.next_entry_id().unwrap();
        let second = storage.next_entry_id().unwrap();

        assert!(first >= 1);
        assert!(second > first);
    }
}

//! Local persistence seam for the sync client.
//!
//! The store holds the plaintext document plus sync bookkeeping. Implementors
//! persist wherever suits them; `MemoryStore` backs tests and short-lived
//! tools.

use chrono::{DateTime, Utc};
use std::sync::Mutex;

use crate::models::document::UserDataDocument;

/// Synchronous local storage.
///
/// `set` is for local edits and stamps `updated_at`; `replace` persists a
/// document verbatim and exists so that adopting server state does not
/// restamp the document and bounce it straight back on the next sync.
pub trait LocalStore: Send + Sync {
    fn get(&self) -> UserDataDocument;
    fn replace(&self, document: UserDataDocument);

    fn set(&self, mut document: UserDataDocument) {
        document.updated_at = Utc::now();
        self.replace(document);
    }

    fn username(&self) -> Option<String>;
    fn set_username(&self, username: Option<String>);

    fn salt(&self) -> Option<String>;
    fn set_salt(&self, salt: Option<String>);

    fn last_sync(&self) -> Option<DateTime<Utc>>;
    fn set_last_sync(&self, last_sync: Option<DateTime<Utc>>);

    fn recovery_key(&self) -> Option<String>;
    fn set_recovery_key(&self, key: Option<String>);

    /// SHA-256 of the password, kept for local re-prompt checks. Never the
    /// password itself, and never sent anywhere.
    fn password_hash(&self) -> Option<String>;
    fn set_password_hash(&self, hash: Option<String>);

    /// Set when a sync could not reach the server and must be retried.
    fn offline_pending(&self) -> bool;
    fn set_offline_pending(&self, pending: bool);

    /// Logout: drops account state but keeps the recovery key, so a user who
    /// saved it nowhere else can still reset.
    fn clear(&self) {
        self.replace(UserDataDocument::empty());
        self.set_username(None);
        self.set_salt(None);
        self.set_last_sync(None);
        self.set_password_hash(None);
        self.set_offline_pending(false);
    }

    /// Account deletion: removes everything, recovery key included.
    fn purge(&self) {
        self.clear();
        self.set_recovery_key(None);
    }
}

#[derive(Default)]
struct Inner {
    document: UserDataDocument,
    username: Option<String>,
    salt: Option<String>,
    last_sync: Option<DateTime<Utc>>,
    recovery_key: Option<String>,
    password_hash: Option<String>,
    offline_pending: bool,
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl LocalStore for MemoryStore {
    fn get(&self) -> UserDataDocument {
        self.lock().document.clone()
    }

    fn replace(&self, document: UserDataDocument) {
        self.lock().document = document;
    }

    fn username(&self) -> Option<String> {
        self.lock().username.clone()
    }

    fn set_username(&self, username: Option<String>) {
        self.lock().username = username;
    }

    fn salt(&self) -> Option<String> {
        self.lock().salt.clone()
    }

    fn set_salt(&self, salt: Option<String>) {
        self.lock().salt = salt;
    }

    fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.lock().last_sync
    }

    fn set_last_sync(&self, last_sync: Option<DateTime<Utc>>) {
        self.lock().last_sync = last_sync;
    }

    fn recovery_key(&self) -> Option<String> {
        self.lock().recovery_key.clone()
    }

    fn set_recovery_key(&self, key: Option<String>) {
        self.lock().recovery_key = key;
    }

    fn password_hash(&self) -> Option<String> {
        self.lock().password_hash.clone()
    }

    fn set_password_hash(&self, hash: Option<String>) {
        self.lock().password_hash = hash;
    }

    fn offline_pending(&self) -> bool {
        self.lock().offline_pending
    }

    fn set_offline_pending(&self, pending: bool) {
        self.lock().offline_pending = pending;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_stamps_updated_at_but_replace_does_not() {
        let store = MemoryStore::new();
        let mut doc = UserDataDocument::empty();
        doc.updated_at = Utc::now() - chrono::Duration::hours(1);
        let original = doc.updated_at;

        store.replace(doc.clone());
        assert_eq!(store.get().updated_at, original);

        store.set(doc);
        assert!(store.get().updated_at > original);
    }

    #[test]
    fn clear_keeps_recovery_key_purge_removes_it() {
        let store = MemoryStore::new();
        store.set_username(Some("alice_99".into()));
        store.set_recovery_key(Some("abcd".into()));

        store.clear();
        assert!(store.username().is_none());
        assert_eq!(store.recovery_key().as_deref(), Some("abcd"));

        store.purge();
        assert!(store.recovery_key().is_none());
    }
}

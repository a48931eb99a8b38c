//! The sync client: the device-side orchestrator of the zero-knowledge
//! backup flow.
//!
//! Holds the password only in volatile memory for the session, debounces
//! rapid edits into one upload, and adopts newer server state on conflict.
//! If the password is gone (process restart) sync silently stops until the
//! next login; local reads keep working.

pub mod backend;
pub mod error;
pub mod store;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use zeroize::Zeroizing;

use crate::crypto::kdf;
use crate::crypto::vault;
use crate::models::document::UserDataDocument;
use crate::models::wire::{
    DeleteAccountRequest, LoginRequest, RegisterRequest, SyncRequest,
};
use crate::validation::auth::validate_password;
use crate::validation::username::validate_username;

use backend::Backend;
use error::ClientError;
use store::LocalStore;

const DEBOUNCE: Duration = Duration::from_secs(5);

/// Server state fetched by cookie, parked until the user supplies the
/// password that decrypts it.
struct PendingRecovery {
    username: String,
    encrypted_data: String,
    iv: String,
    encryption_salt: String,
    last_sync: chrono::DateTime<chrono::Utc>,
}

pub struct SyncClient {
    store: Arc<dyn LocalStore>,
    backend: Arc<dyn Backend>,
    /// The encryption password, held only for this process lifetime and
    /// zeroized on drop. Never persisted, never transmitted.
    session_password: Mutex<Option<Zeroizing<String>>>,
    online: AtomicBool,
    sync_in_flight: AtomicBool,
    debounce: Duration,
    /// Bumped on every local edit; a debounce timer only fires if its
    /// generation is still current, so rapid edits coalesce into one upload.
    debounce_gen: AtomicU64,
    pending_recovery: Mutex<Option<PendingRecovery>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resets the in-flight flag even if the sync errors or panics.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncClient {
    pub fn new(store: Arc<dyn LocalStore>, backend: Arc<dyn Backend>) -> Arc<Self> {
        Self::with_debounce(store, backend, DEBOUNCE)
    }

    /// Like [`SyncClient::new`] with a custom debounce window.
    pub fn with_debounce(
        store: Arc<dyn LocalStore>,
        backend: Arc<dyn Backend>,
        debounce: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            backend,
            session_password: Mutex::new(None),
            online: AtomicBool::new(true),
            sync_in_flight: AtomicBool::new(false),
            debounce,
            debounce_gen: AtomicU64::new(0),
            pending_recovery: Mutex::new(None),
        })
    }

    pub fn is_logged_in(&self) -> bool {
        lock(&self.session_password).is_some()
    }

    pub fn username(&self) -> Option<String> {
        self.store.username()
    }

    /// Creates an account: seals an empty document under the new password and
    /// registers it. Returns the recovery key, shown to the user exactly once.
    pub async fn register(&self, username: &str, password: &str) -> Result<String, ClientError> {
        let username = validate_username(username).map_err(ClientError::Validation)?;
        validate_password(password).map_err(ClientError::Validation)?;

        let salt = kdf::generate_salt();
        let recovery_key = kdf::generate_recovery_key();
        let recovery_hash = kdf::hash_password(&recovery_key);

        let document = UserDataDocument::empty();
        let (encrypted_data, iv) = vault::seal(&document, password, &salt)
            .map_err(|e| ClientError::Internal(e.to_string()))?;

        let response = self
            .backend
            .register(RegisterRequest {
                username: username.clone(),
                encrypted_data,
                iv,
                encryption_salt: salt.clone(),
                recovery_hash,
                email: None,
            })
            .await?;

        self.store.replace(document);
        self.store.set_username(Some(username));
        self.store.set_salt(Some(salt));
        self.store.set_last_sync(Some(response.last_sync));
        self.store.set_recovery_key(Some(recovery_key.clone()));
        self.store.set_password_hash(Some(kdf::hash_password(password)));
        self.store.set_offline_pending(false);

        *lock(&self.session_password) = Some(Zeroizing::new(password.to_string()));

        Ok(recovery_key)
    }

    /// Logs in: fetches the ciphertext by username and decrypts it locally.
    ///
    /// A wrong password and an unknown username are indistinguishable; both
    /// surface as [`ClientError::Authentication`].
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ClientError> {
        let response = self
            .backend
            .login(LoginRequest {
                username: username.to_string(),
            })
            .await?;

        let document = vault::open(
            &response.encrypted_data,
            &response.iv,
            password,
            &response.encryption_salt,
        )
        .map_err(|_| ClientError::Authentication)?;

        self.store.replace(document);
        self.store.set_username(Some(username.to_string()));
        self.store.set_salt(Some(response.encryption_salt));
        self.store.set_last_sync(Some(response.last_sync));
        self.store.set_password_hash(Some(kdf::hash_password(password)));
        self.store.set_offline_pending(false);

        *lock(&self.session_password) = Some(Zeroizing::new(password.to_string()));
        *lock(&self.pending_recovery) = None;

        Ok(())
    }

    /// Applies a local edit and schedules a debounced upload.
    pub fn update(self: &Arc<Self>, edit: impl FnOnce(&mut UserDataDocument)) {
        let mut document = self.store.get();
        edit(&mut document);
        self.store.set(document);
        self.schedule_sync();
    }

    fn schedule_sync(self: &Arc<Self>) {
        let generation = self.debounce_gen.fetch_add(1, Ordering::SeqCst) + 1;
        let client = Arc::clone(self);

        tokio::spawn(async move {
            tokio::time::sleep(client.debounce).await;
            if client.debounce_gen.load(Ordering::SeqCst) != generation {
                return;
            }
            if let Err(err) = client.sync_to_server().await {
                tracing::warn!("sync failed: {}", err);
            }
        });
    }

    /// Uploads the current document.
    ///
    /// Silent no-op when there is no session password or the client is
    /// offline, and when a sync is already in flight. Network failures mark
    /// the store offline-pending instead of surfacing; the next reconnect
    /// flushes.
    pub async fn sync_to_server(&self) -> Result<(), ClientError> {
        let password = match lock(&self.session_password).as_ref() {
            Some(p) => p.clone(),
            None => return Ok(()),
        };

        if !self.online.load(Ordering::SeqCst) {
            self.store.set_offline_pending(true);
            return Ok(());
        }

        if self
            .sync_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }
        let _guard = InFlightGuard(&self.sync_in_flight);

        let username = self.store.username().ok_or(ClientError::NotLoggedIn)?;
        let salt = self.store.salt().ok_or(ClientError::NotLoggedIn)?;
        let last_sync = self.store.last_sync().ok_or(ClientError::NotLoggedIn)?;

        let document = self.store.get();
        let (encrypted_data, iv) = vault::seal(&document, &password, &salt)
            .map_err(|e| ClientError::Internal(e.to_string()))?;

        let response = match self
            .backend
            .sync(SyncRequest {
                username,
                encrypted_data,
                iv,
                last_sync,
            })
            .await
        {
            Ok(response) => response,
            Err(ClientError::Network(message)) => {
                tracing::warn!("sync unreachable, queued for reconnect: {}", message);
                self.store.set_offline_pending(true);
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        if response.server_data_newer {
            // Another device synced since we last pulled. Last write wins:
            // adopt the server document wholesale.
            let (encrypted_data, iv) = match (response.encrypted_data, response.iv) {
                (Some(data), Some(iv)) => (data, iv),
                _ => {
                    return Err(ClientError::Internal(
                        "conflict response missing server data".to_string(),
                    ))
                }
            };

            let adopted = vault::open(&encrypted_data, &iv, &password, &salt)
                .map_err(|_| ClientError::Decryption)?;
            self.store.replace(adopted);
        }

        self.store.set_last_sync(Some(response.last_sync));
        self.store.set_offline_pending(false);
        Ok(())
    }

    /// Marks the client online or offline. Coming back online flushes any
    /// edit that was queued while unreachable.
    pub fn set_online(self: &Arc<Self>, online: bool) {
        self.online.store(online, Ordering::SeqCst);

        if online && self.store.offline_pending() {
            let client = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(err) = client.sync_to_server().await {
                    tracing::warn!("reconnect flush failed: {}", err);
                }
            });
        }
    }

    /// Logs out: best-effort final sync, then forgets the password and all
    /// local account state except the recovery key.
    pub async fn logout(&self) {
        let _ = self.sync_to_server().await;

        // Invalidate any debounce timer still ticking.
        self.debounce_gen.fetch_add(1, Ordering::SeqCst);

        *lock(&self.session_password) = None;
        *lock(&self.pending_recovery) = None;
        self.store.clear();
    }

    /// Starts session recovery from the cookie. Returns the username so the
    /// UI can prompt for its password; the fetched ciphertext is parked until
    /// [`SyncClient::complete_session_recovery`].
    pub async fn begin_session_recovery(&self) -> Result<String, ClientError> {
        let response = self.backend.fetch_session().await?;
        let username = response.username.clone();

        *lock(&self.pending_recovery) = Some(PendingRecovery {
            username: response.username,
            encrypted_data: response.encrypted_data,
            iv: response.iv,
            encryption_salt: response.encryption_salt,
            last_sync: response.last_sync,
        });

        Ok(username)
    }

    /// Finishes session recovery with the user's password.
    ///
    /// A wrong password keeps the parked state so the user can retry.
    pub async fn complete_session_recovery(&self, password: &str) -> Result<(), ClientError> {
        let mut pending = lock(&self.pending_recovery);
        let recovery = pending.as_ref().ok_or(ClientError::NotLoggedIn)?;

        let document = vault::open(
            &recovery.encrypted_data,
            &recovery.iv,
            password,
            &recovery.encryption_salt,
        )
        .map_err(|_| ClientError::Authentication)?;

        self.store.replace(document);
        self.store.set_username(Some(recovery.username.clone()));
        self.store.set_salt(Some(recovery.encryption_salt.clone()));
        self.store.set_last_sync(Some(recovery.last_sync));
        self.store.set_password_hash(Some(kdf::hash_password(password)));
        self.store.set_offline_pending(false);

        *pending = None;
        drop(pending);

        *lock(&self.session_password) = Some(Zeroizing::new(password.to_string()));
        Ok(())
    }

    pub fn cancel_session_recovery(&self) {
        *lock(&self.pending_recovery) = None;
    }

    /// Deletes the account server-side and purges all local state, recovery
    /// key included.
    pub async fn delete_account(&self) -> Result<(), ClientError> {
        let username = self.store.username().ok_or(ClientError::NotLoggedIn)?;

        self.backend
            .delete_account(DeleteAccountRequest { username })
            .await?;

        self.debounce_gen.fetch_add(1, Ordering::SeqCst);
        *lock(&self.session_password) = None;
        *lock(&self.pending_recovery) = None;
        self.store.purge();
        Ok(())
    }

    /// The current local document, for display or export. Works with or
    /// without a session password.
    pub fn export_local(&self) -> UserDataDocument {
        self.store.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::AtomicUsize;
    use store::MemoryStore;

    use crate::models::wire::{
        LoginResponse, RegisterResponse, SessionRecoveryResponse, SyncResponse,
    };

    #[derive(Default)]
    struct FakeAccount {
        encrypted_data: String,
        iv: String,
        encryption_salt: String,
        last_sync: Option<DateTime<Utc>>,
    }

    /// Scriptable in-memory server.
    #[derive(Default)]
    struct FakeBackend {
        account: Mutex<FakeAccount>,
        sync_calls: AtomicUsize,
        sync_delay: Option<Duration>,
        /// When set, the next sync answers `server_data_newer` with this
        /// material instead of accepting the upload.
        conflict: Mutex<Option<(String, String, DateTime<Utc>)>>,
        fail_with_network_error: AtomicBool,
    }

    impl FakeBackend {
        fn sync_count(&self) -> usize {
            self.sync_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Backend for FakeBackend {
        async fn register(
            &self,
            request: RegisterRequest,
        ) -> Result<RegisterResponse, ClientError> {
            let now = Utc::now();
            *lock(&self.account) = FakeAccount {
                encrypted_data: request.encrypted_data,
                iv: request.iv,
                encryption_salt: request.encryption_salt,
                last_sync: Some(now),
            };
            Ok(RegisterResponse {
                success: true,
                username: request.username,
                last_sync: now,
                session_token: "token".to_string(),
            })
        }

        async fn login(&self, _request: LoginRequest) -> Result<LoginResponse, ClientError> {
            let account = lock(&self.account);
            let last_sync = account.last_sync.ok_or(ClientError::Authentication)?;
            Ok(LoginResponse {
                success: true,
                encrypted_data: account.encrypted_data.clone(),
                iv: account.iv.clone(),
                encryption_salt: account.encryption_salt.clone(),
                last_sync,
                session_token: "token".to_string(),
            })
        }

        async fn sync(&self, request: SyncRequest) -> Result<SyncResponse, ClientError> {
            if self.fail_with_network_error.load(Ordering::SeqCst) {
                return Err(ClientError::Network("connection refused".to_string()));
            }

            self.sync_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.sync_delay {
                tokio::time::sleep(delay).await;
            }

            if let Some((encrypted_data, iv, last_sync)) = lock(&self.conflict).take() {
                return Ok(SyncResponse {
                    success: true,
                    server_data_newer: true,
                    encrypted_data: Some(encrypted_data),
                    iv: Some(iv),
                    last_sync,
                });
            }

            let now = Utc::now();
            let mut account = lock(&self.account);
            account.encrypted_data = request.encrypted_data;
            account.iv = request.iv;
            account.last_sync = Some(now);
            Ok(SyncResponse {
                success: true,
                server_data_newer: false,
                encrypted_data: None,
                iv: None,
                last_sync: now,
            })
        }

        async fn delete_account(&self, _request: DeleteAccountRequest) -> Result<(), ClientError> {
            *lock(&self.account) = FakeAccount::default();
            Ok(())
        }

        async fn fetch_session(&self) -> Result<SessionRecoveryResponse, ClientError> {
            let account = lock(&self.account);
            let last_sync = account.last_sync.ok_or(ClientError::SessionExpired)?;
            Ok(SessionRecoveryResponse {
                success: true,
                username: "alice_99".to_string(),
                encrypted_data: account.encrypted_data.clone(),
                iv: account.iv.clone(),
                encryption_salt: account.encryption_salt.clone(),
                last_sync,
            })
        }
    }

    fn test_client(backend: Arc<FakeBackend>, debounce: Duration) -> Arc<SyncClient> {
        SyncClient::with_debounce(Arc::new(MemoryStore::new()), backend, debounce)
    }

    #[tokio::test]
    async fn rapid_updates_coalesce_into_one_sync() {
        let backend = Arc::new(FakeBackend::default());
        let client = test_client(Arc::clone(&backend), Duration::from_millis(50));
        client.register("alice_99", "hunter2hunter2").await.unwrap();

        for i in 0..10 {
            client.update(|doc| doc.address.zip = format!("{:05}", i));
        }

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(backend.sync_count(), 1);
        assert_eq!(client.export_local().address.zip, "00009");
    }

    #[tokio::test]
    async fn concurrent_syncs_collapse_to_one() {
        let backend = Arc::new(FakeBackend {
            sync_delay: Some(Duration::from_millis(100)),
            ..FakeBackend::default()
        });
        let client = test_client(Arc::clone(&backend), Duration::from_millis(10));
        client.register("alice_99", "hunter2hunter2").await.unwrap();
        let baseline = backend.sync_count();

        let (a, b) = tokio::join!(client.sync_to_server(), client.sync_to_server());
        a.unwrap();
        b.unwrap();

        assert_eq!(backend.sync_count(), baseline + 1);
    }

    #[tokio::test]
    async fn client_adopts_newer_server_data_on_conflict() {
        let backend = Arc::new(FakeBackend::default());
        let client = test_client(Arc::clone(&backend), Duration::from_millis(10));
        client.register("alice_99", "hunter2hunter2").await.unwrap();

        // Another device pushed a document since this client last pulled.
        let stored_salt = lock(&backend.account).encryption_salt.clone();
        let mut server_doc = UserDataDocument::empty();
        server_doc.address.city = "Springfield".to_string();
        let (ciphertext, iv) =
            vault::seal(&server_doc, "hunter2hunter2", &stored_salt).unwrap();
        let server_time = Utc::now() + chrono::Duration::seconds(30);
        *lock(&backend.conflict) = Some((ciphertext, iv, server_time));

        client.update(|doc| doc.address.city = "Shelbyville".to_string());
        client.sync_to_server().await.unwrap();

        assert_eq!(client.export_local().address.city, "Springfield");
        assert_eq!(client.export_local(), server_doc);
    }

    #[tokio::test]
    async fn sync_without_password_is_a_silent_noop() {
        let backend = Arc::new(FakeBackend::default());
        let client = test_client(Arc::clone(&backend), Duration::from_millis(10));

        client.sync_to_server().await.unwrap();
        assert_eq!(backend.sync_count(), 0);
    }

    #[tokio::test]
    async fn logout_forgets_password_and_stops_syncing() {
        let backend = Arc::new(FakeBackend::default());
        let client = test_client(Arc::clone(&backend), Duration::from_millis(10));
        let recovery_key = client.register("alice_99", "hunter2hunter2").await.unwrap();

        client.logout().await;
        assert!(!client.is_logged_in());
        assert!(client.username().is_none());

        // The recovery key survives logout; edits no longer reach the server.
        assert_eq!(client.store.recovery_key(), Some(recovery_key));
        let baseline = backend.sync_count();
        client.sync_to_server().await.unwrap();
        assert_eq!(backend.sync_count(), baseline);
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_an_authentication_error() {
        let backend = Arc::new(FakeBackend::default());
        let client = test_client(Arc::clone(&backend), Duration::from_millis(10));
        client.register("alice_99", "hunter2hunter2").await.unwrap();
        client.logout().await;

        let result = client.login("alice_99", "wrong-password").await;
        assert!(matches!(result, Err(ClientError::Authentication)));
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn offline_edit_is_flushed_on_reconnect() {
        let backend = Arc::new(FakeBackend::default());
        let client = test_client(Arc::clone(&backend), Duration::from_millis(10));
        client.register("alice_99", "hunter2hunter2").await.unwrap();
        let baseline = backend.sync_count();

        client.set_online(false);
        client.update(|doc| doc.faq_bookmarks.push("faq-42".to_string()));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(backend.sync_count(), baseline);
        assert!(client.store.offline_pending());

        client.set_online(true);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(backend.sync_count(), baseline + 1);
        assert!(!client.store.offline_pending());
    }

    #[tokio::test]
    async fn network_failure_queues_instead_of_erroring() {
        let backend = Arc::new(FakeBackend::default());
        let client = test_client(Arc::clone(&backend), Duration::from_millis(10));
        client.register("alice_99", "hunter2hunter2").await.unwrap();

        backend.fail_with_network_error.store(true, Ordering::SeqCst);
        client.update(|doc| doc.preferences.notifications = false);
        client.sync_to_server().await.unwrap();
        assert!(client.store.offline_pending());
    }

    #[tokio::test]
    async fn session_recovery_round_trip() {
        let backend = Arc::new(FakeBackend::default());
        let client = test_client(Arc::clone(&backend), Duration::from_millis(10));
        client.register("alice_99", "hunter2hunter2").await.unwrap();
        client.update(|doc| doc.address.state = "IL".to_string());
        client.sync_to_server().await.unwrap();

        // Simulate a fresh device with only the session cookie.
        let recovered = test_client(Arc::clone(&backend), Duration::from_millis(10));
        let username = recovered.begin_session_recovery().await.unwrap();
        assert_eq!(username, "alice_99");

        // Wrong password keeps the parked state for a retry.
        let wrong = recovered.complete_session_recovery("wrong-password").await;
        assert!(matches!(wrong, Err(ClientError::Authentication)));

        recovered
            .complete_session_recovery("hunter2hunter2")
            .await
            .unwrap();
        assert!(recovered.is_logged_in());
        assert_eq!(recovered.export_local().address.state, "IL");
    }

    #[tokio::test]
    async fn delete_account_purges_everything() {
        let backend = Arc::new(FakeBackend::default());
        let client = test_client(Arc::clone(&backend), Duration::from_millis(10));
        client.register("alice_99", "hunter2hunter2").await.unwrap();

        client.delete_account().await.unwrap();
        assert!(!client.is_logged_in());
        assert!(client.store.recovery_key().is_none());
        assert!(client.export_local().faq_bookmarks.is_empty());
        assert_eq!(client.export_local().address, Default::default());
    }
}

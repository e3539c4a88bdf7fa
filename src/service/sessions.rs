use crate::db::ChowStorage;
use crate::error::ChowError;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tower_sessions::session::{Id, Record};
use tower_sessions::{ExpiredDeletion, SessionStore as RecordStore};
use tower_sessions_sqlx_store::SqliteStore;
use tracing::{debug, warn};

/// Session attribute holding the identity of the signed-in account.
pub const VIEWER_KEY: &str = "viewer";

/// A server-side session: opaque key and free-form attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: Id,
    key: String,
    data: HashMap<String, Value>,
}

impl Session {
    fn empty(id: Id) -> Self {
        Self {
            key: id.to_string(),
            id,
            data: HashMap::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.data.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.data.remove(name)
    }

    pub fn viewer_identity(&self) -> Option<&str> {
        self.get(VIEWER_KEY).and_then(Value::as_str)
    }

    pub fn set_viewer(&mut self, identity: &str) {
        self.insert(VIEWER_KEY, Value::String(identity.to_string()));
    }

    pub fn clear_viewer(&mut self) {
        self.remove(VIEWER_KEY);
    }
}

impl From<Record> for Session {
    fn from(record: Record) -> Self {
        Self {
            key: record.id.to_string(),
            id: record.id,
            data: record.data,
        }
    }
}

/// Durable session store with sliding expiry, kept in the service database.
#[derive(Debug, Clone)]
pub struct SessionStore {
    store: SqliteStore,
    timeout: Duration,
}

impl SessionStore {
    /// Open the store on the shared pool and create its table if needed.
    pub async fn new(storage: &ChowStorage, timeout: Duration) -> Result<Self, ChowError> {
        let store = SqliteStore::new(storage.pool().clone());
        store.migrate().await?;
        Ok(Self { store, timeout })
    }

    fn deadline(&self) -> OffsetDateTime {
        let timeout = time::Duration::try_from(self.timeout).unwrap_or(time::Duration::HOUR);
        OffsetDateTime::now_utc().saturating_add(timeout)
    }

    fn record(&self, session: &Session) -> Record {
        Record {
            id: session.id,
            data: session.data.clone(),
            expiry_date: self.deadline(),
        }
    }

    /// Start a fresh session under a random key and persist it.
    pub async fn create(&self) -> Result<Session, ChowError> {
        let mut record = Record {
            id: Id::default(),
            data: HashMap::new(),
            expiry_date: self.deadline(),
        };
        self.store.create(&mut record).await?;
        debug!(session = %record.id, "session created");
        Ok(record.into())
    }

    /// Load a live session. Expired and malformed keys read as absent.
    pub async fn load(&self, key: &str) -> Result<Option<Session>, ChowError> {
        let Ok(id) = key.parse::<Id>() else {
            debug!(session = %key, "malformed session key");
            return Ok(None);
        };
        Ok(self.store.load(&id).await?.map(Session::from))
    }

    /// Load the external session for `auth_token`, creating it if absent.
    pub async fn open_external(&self, auth_token: &str) -> Result<Session, ChowError> {
        let id = external_session_id(auth_token);
        if let Some(record) = self.store.load(&id).await? {
            return Ok(record.into());
        }
        let session = Session::empty(id);
        self.store.save(&self.record(&session)).await?;
        debug!(session = %session.key, "external session created");
        Ok(session)
    }

    /// Persist the session and push its expiry forward.
    pub async fn save(&self, session: &Session) -> Result<(), ChowError> {
        self.store.save(&self.record(session)).await?;
        Ok(())
    }

    pub async fn kill(&self, key: &str) -> Result<(), ChowError> {
        if let Ok(id) = key.parse::<Id>() {
            self.store.delete(&id).await?;
            debug!(session = %key, "session killed");
        }
        Ok(())
    }

    /// Sweep expired sessions every `period` for the life of the process.
    pub fn spawn_purge_task(&self, period: Duration) -> JoinHandle<()> {
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.continuously_delete_expired(period).await {
                warn!(error = %e, "session purge task stopped");
            }
        })
    }
}

/// Session id derived from the external auth token.
fn external_session_id(auth_token: &str) -> Id {
    let digest = Sha256::digest(auth_token.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Id(i128::from_le_bytes(bytes))
}

/// Stable key for everything cached per auth token.
pub fn external_session_key(auth_token: &str) -> String {
    external_session_id(auth_token).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store(timeout: Duration) -> SessionStore {
        let storage = ChowStorage::in_memory().await.unwrap();
        SessionStore::new(&storage, timeout).await.unwrap()
    }

    #[tokio::test]
    async fn viewer_survives_a_round_trip() {
        let sessions = store(Duration::from_secs(60)).await;
        let mut session = sessions.create().await.unwrap();
        session.set_viewer("alice");
        sessions.save(&session).await.unwrap();

        let loaded = sessions.load(session.key()).await.unwrap().unwrap();
        assert_eq!(loaded.viewer_identity(), Some("alice"));
    }

    #[tokio::test]
    async fn expired_sessions_read_as_absent() {
        let sessions = store(Duration::ZERO).await;
        let session = sessions.create().await.unwrap();
        assert!(sessions.load(session.key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn external_sessions_live_under_the_token_key() {
        let sessions = store(Duration::from_secs(60)).await;
        let mut session = sessions.open_external("token").await.unwrap();
        assert_eq!(session.key(), external_session_key("token"));
        assert!(session.viewer_identity().is_none());

        session.set_viewer("B");
        sessions.save(&session).await.unwrap();
        let again = sessions.open_external("token").await.unwrap();
        assert_eq!(again.viewer_identity(), Some("B"));
    }

    #[tokio::test]
    async fn killed_sessions_are_gone() {
        let sessions = store(Duration::from_secs(60)).await;
        let session = sessions.create().await.unwrap();
        sessions.kill(session.key()).await.unwrap();
        assert!(sessions.load(session.key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn garbage_keys_read_as_absent() {
        let sessions = store(Duration::from_secs(60)).await;
        assert!(sessions.load("not a key!").await.unwrap().is_none());
        sessions.kill("not a key!").await.unwrap();
    }

    #[tokio::test]
    async fn purge_task_drops_expired_rows() {
        let storage = ChowStorage::in_memory().await.unwrap();
        let sessions = SessionStore::new(&storage, Duration::ZERO).await.unwrap();
        sessions.create().await.unwrap();
        // Expiry is stored with second precision.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let task = sessions.spawn_purge_task(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_millis(200)).await;
        task.abort();

        let (left,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tower_sessions")
            .fetch_one(storage.pool())
            .await
            .unwrap();
        assert_eq!(left, 0);
    }

    #[test]
    fn external_keys_are_stable_digests() {
        let a = external_session_key("token");
        assert_eq!(a, external_session_key("token"));
        assert_ne!(a, external_session_key("other"));
        assert!(a.parse::<Id>().is_ok());
    }
}

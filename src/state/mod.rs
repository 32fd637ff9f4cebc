//! Session state: auth token and user info.
//!
//! A `SessionStore` is constructed explicitly and shared by `Arc` with the
//! API client and anything else that needs the session. Writes are
//! last-write-wins and are persisted under the configured store identifier.

pub mod storage;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use zeroize::Zeroize;

pub use storage::{FileStorage, MemoryStorage, StateStorage, StorageError};
#[cfg(feature = "keyring-storage")]
pub use storage::KeyringStorage;

/// Information about the signed-in user.
///
/// Fields other than `name` are kept verbatim in `extra`. A `"name"` key in
/// `extra` is dropped when stored; the `name` field owns it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserInfo {
    /// Keys that belong to typed fields and must not appear in `extra`.
    const RESERVED_KEYS: &'static [&'static str] = &["name"];

    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            extra: Map::new(),
        }
    }

    /// Remove `extra` entries that would serialize as duplicate keys.
    fn strip_reserved(&mut self) {
        for key in Self::RESERVED_KEYS {
            if self.extra.remove(*key).is_some() {
                log::debug!("Dropping reserved user info key '{}' from extra fields", key);
            }
        }
    }
}

/// Serialized form of the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub user_info: UserInfo,
}

/// Shared, persisted session store.
pub struct SessionStore {
    store_id: String,
    state: RwLock<SessionState>,
    storage: Arc<dyn StateStorage>,
}

impl SessionStore {
    /// Open the store, restoring any state persisted under `store_id`.
    ///
    /// Unreadable or corrupt persisted state is logged and replaced by an
    /// empty session.
    pub fn open(store_id: &str, storage: Arc<dyn StateStorage>) -> Self {
        let state = match storage.load(store_id) {
            Ok(Some(raw)) => match serde_json::from_str::<SessionState>(&raw) {
                Ok(state) => {
                    log::debug!("Restored session state from '{}'", store_id);
                    state
                }
                Err(e) => {
                    log::warn!("Discarding corrupt session state '{}': {}", store_id, e);
                    SessionState::default()
                }
            },
            Ok(None) => SessionState::default(),
            Err(e) => {
                log::warn!("Failed to load session state '{}': {}", store_id, e);
                SessionState::default()
            }
        };

        Self {
            store_id: store_id.to_string(),
            state: RwLock::new(state),
            storage,
        }
    }

    /// An empty, non-persistent store.
    pub fn in_memory(store_id: &str) -> Self {
        Self::open(store_id, Arc::new(MemoryStorage::new()))
    }

    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    /// Current auth token (empty when signed out).
    pub async fn token(&self) -> String {
        self.state.read().await.token.clone()
    }

    pub async fn set_token(&self, token: String) {
        let mut state = self.state.write().await;
        state.token.zeroize();
        state.token = token;
        self.persist(&state);
    }

    pub async fn user_info(&self) -> UserInfo {
        self.state.read().await.user_info.clone()
    }

    pub async fn set_user_info(&self, mut user_info: UserInfo) {
        user_info.strip_reserved();
        let mut state = self.state.write().await;
        state.user_info = user_info;
        self.persist(&state);
    }

    pub async fn is_authenticated(&self) -> bool {
        !self.state.read().await.token.is_empty()
    }

    /// Copy of the whole session.
    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// Reset to an empty session and delete the persisted copy.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.token.zeroize();
        *state = SessionState::default();
        if let Err(e) = self.storage.remove(&self.store_id) {
            log::warn!("Failed to remove session state '{}': {}", self.store_id, e);
        }
    }

    fn persist(&self, state: &SessionState) {
        let result = serde_json::to_string(state)
            .map_err(StorageError::from)
            .and_then(|raw| self.storage.save(&self.store_id, &raw));
        if let Err(e) = result {
            log::warn!("Failed to persist session state '{}': {}", self.store_id, e);
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Token omitted.
        f.debug_struct("SessionStore")
            .field("store_id", &self.store_id)
            .finish_non_exhaustive()
    }
}

//! Pending-request registry for duplicate request suppression.
//!
//! Each in-flight request is keyed by its signature (method + URL +
//! serialized parameters). Registering a key that is already pending cancels
//! the older request so only the newest one completes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use reqwest::Method;
use tokio_util::sync::CancellationToken;

/// Build the registry key for a request.
pub fn request_key(method: &Method, url: &str, params: &str) -> String {
    format!("{}&{}&{}", method.as_str(), url, params)
}

struct PendingEntry {
    id: u64,
    token: CancellationToken,
}

/// Handle for one registered request.
///
/// `token` fires when a newer duplicate supersedes this request.
#[derive(Debug, Clone)]
pub struct PendingGuard {
    pub key: String,
    pub id: u64,
    pub token: CancellationToken,
}

/// Map from request signature to its cancellation handle.
#[derive(Default)]
pub struct PendingRegistry {
    pending: Mutex<HashMap<String, PendingEntry>>,
    next_id: AtomicU64,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request, cancelling any pending request with the same key.
    pub fn add_pending(&self, key: &str) -> PendingGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        let mut pending = self.lock();
        if let Some(previous) = pending.insert(
            key.to_string(),
            PendingEntry {
                id,
                token: token.clone(),
            },
        ) {
            log::debug!("Cancelling superseded request: {}", key);
            previous.token.cancel();
        }

        PendingGuard {
            key: key.to_string(),
            id,
            token,
        }
    }

    /// Remove a completed request.
    ///
    /// No-op when the entry has since been replaced by a newer request.
    pub fn remove_pending(&self, guard: &PendingGuard) {
        let mut pending = self.lock();
        if pending.get(&guard.key).is_some_and(|entry| entry.id == guard.id) {
            pending.remove(&guard.key);
        }
    }

    /// Cancel and drop every pending request.
    pub fn remove_all_pending(&self) {
        let mut pending = self.lock();
        for (_, entry) in pending.drain() {
            entry.token.cancel();
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingEntry>> {
        // Poisoning is recoverable: entries are plain data.
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for PendingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRegistry")
            .field("pending", &self.len())
            .finish()
    }
}

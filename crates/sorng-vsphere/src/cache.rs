//! Key/value cache collaborator used to persist the session cookie.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Fixed key the session cookie is stored under.
pub const SESSION_CACHE_KEY: &str = "vsphere_soap_session";

/// Lifetime of a cached cookie.
pub const SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// External get / set-with-expiry store.
///
/// Not a lock: concurrent operations may overwrite each other's cookie,
/// which only costs an extra login on the loser's next request.
#[async_trait::async_trait]
pub trait SessionCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: &str, ttl: Duration);
}

/// In-process cache with per-entry expiry.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) {
        let expires = Instant::now() + ttl;
        self.entries
            .lock()
            .await
            .insert(key.to_string(), (value.to_string(), expires));
    }
}

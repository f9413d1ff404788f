use super::store::KeyValueStore;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredCookie {
    value: String,
    expires_at: DateTime<Utc>,
}

impl StoredCookie {
    fn new(value: &str, ttl: Duration) -> Self {
        Self {
            value: value.to_string(),
            expires_at: Utc::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Cookie-equivalent store with explicit expiry.
///
/// Persistent cookies are mirrored into a backing [`KeyValueStore`] and outlive the
/// process when that store is durable. Session cookies only exist in memory.
/// A name holds at most one cookie; setting one kind removes the other.
pub struct CookieJar {
    persistent: Arc<dyn KeyValueStore>,
    session: DashMap<String, StoredCookie>,
}

impl CookieJar {
    pub fn new(persistent: Arc<dyn KeyValueStore>) -> Self {
        Self {
            persistent,
            session: DashMap::new(),
        }
    }

    /// Value of a live cookie. Expired cookies are evicted and read as absent.
    pub fn get(&self, name: &str) -> Option<String> {
        self.lookup(name).map(|cookie| cookie.value)
    }

    pub fn expires_at(&self, name: &str) -> Option<DateTime<Utc>> {
        self.lookup(name).map(|cookie| cookie.expires_at)
    }

    /// Whether a live cookie called `name` is persistent rather than session-only.
    pub fn is_persistent(&self, name: &str) -> bool {
        self.lookup(name).is_some() && !self.session.contains_key(name)
    }

    pub fn set(&self, name: &str, value: &str, ttl: Duration) {
        self.session.remove(name);

        let cookie = StoredCookie::new(value, ttl);
        match serde_json::to_string(&cookie) {
            Ok(encoded) => self.persistent.set(name, &encoded),
            Err(e) => warn!(cookie = name, error = %e, "Failed to encode cookie"),
        }
    }

    pub fn set_session(&self, name: &str, value: &str, ttl: Duration) {
        self.persistent.remove(name);
        self.session
            .insert(name.to_string(), StoredCookie::new(value, ttl));
    }

    pub fn remove(&self, name: &str) {
        self.session.remove(name);
        self.persistent.remove(name);
    }

    fn lookup(&self, name: &str) -> Option<StoredCookie> {
        if let Some(cookie) = self.session.get(name).map(|entry| entry.value().clone()) {
            if cookie.is_expired() {
                debug!(cookie = name, "Evicting expired session cookie");
                self.session.remove(name);
                return None;
            }
            return Some(cookie);
        }

        let raw = self.persistent.get(name)?;
        let cookie = match serde_json::from_str::<StoredCookie>(&raw) {
            Ok(cookie) => cookie,
            Err(e) => {
                warn!(cookie = name, error = %e, "Discarding unreadable cookie");
                self.persistent.remove(name);
                return None;
            }
        };

        if cookie.is_expired() {
            debug!(cookie = name, "Evicting expired cookie");
            self.persistent.remove(name);
            return None;
        }

        Some(cookie)
    }
}

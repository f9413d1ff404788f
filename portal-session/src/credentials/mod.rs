//! Where the access and refresh tokens live between requests and restarts.
pub mod cookie;
pub mod store;

pub use cookie::CookieJar;
pub use store::{FileStore, KeyValueStore, MemoryStore};

use crate::config::{SessionSettings, StorageSettings};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::debug;

/// Key of the access token in both the durable and the session-scoped store.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Name of the refresh-token cookie.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Which store holds the access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// Survives restarts ("remember me").
    Durable,
    /// Dropped when the process ends.
    Session,
}

impl Durability {
    pub fn from_remember_me(remember_me: bool) -> Self {
        if remember_me {
            Durability::Durable
        } else {
            Durability::Session
        }
    }
}

/// Single source of truth for the tokens of one session.
///
/// The access token is held by exactly one of two stores; reads prefer the durable
/// store if both are somehow populated. The refresh token lives in a cookie jar
/// with its own expiry, independent of the access token's durability.
pub struct CredentialStore {
    durable: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
    cookies: CookieJar,
    refresh_ttl: Duration,
}

impl CredentialStore {
    pub fn new(
        durable: Arc<dyn KeyValueStore>,
        session: Arc<dyn KeyValueStore>,
        cookies: CookieJar,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            durable,
            session,
            cookies,
            refresh_ttl,
        }
    }

    /// Everything in memory, with the default seven-day refresh ttl.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
            CookieJar::new(Arc::new(MemoryStore::new())),
            Duration::days(7),
        )
    }

    /// File-backed durable and cookie stores when a storage directory is configured.
    pub fn from_settings(storage: &StorageSettings, session: &SessionSettings) -> Self {
        let (durable, cookie_backing): (Arc<dyn KeyValueStore>, Arc<dyn KeyValueStore>) =
            match &storage.directory {
                Some(directory) => (
                    Arc::new(FileStore::open(directory.join("credentials.json"))),
                    Arc::new(FileStore::open(directory.join("cookies.json"))),
                ),
                None => (Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new())),
            };

        Self::new(
            durable,
            Arc::new(MemoryStore::new()),
            CookieJar::new(cookie_backing),
            Duration::days(session.refresh_token_ttl_days),
        )
    }

    pub fn read_access_token(&self) -> Option<String> {
        self.durable
            .get(ACCESS_TOKEN_KEY)
            .or_else(|| self.session.get(ACCESS_TOKEN_KEY))
    }

    pub fn access_token_durability(&self) -> Option<Durability> {
        if self.durable.contains(ACCESS_TOKEN_KEY) {
            Some(Durability::Durable)
        } else if self.session.contains(ACCESS_TOKEN_KEY) {
            Some(Durability::Session)
        } else {
            None
        }
    }

    /// Write to exactly one store and clear the other.
    pub fn write_access_token(&self, token: &str, durable: bool) {
        let (target, other) = match Durability::from_remember_me(durable) {
            Durability::Durable => (&self.durable, &self.session),
            Durability::Session => (&self.session, &self.durable),
        };
        target.set(ACCESS_TOKEN_KEY, token);
        other.remove(ACCESS_TOKEN_KEY);
        debug!(durable, "Stored access token");
    }

    /// Overwrite the access token in whichever store currently holds one; with no
    /// token stored it lands in the session-scoped store.
    pub fn replace_access_token(&self, token: &str) {
        let durable = self.access_token_durability() == Some(Durability::Durable);
        self.write_access_token(token, durable);
    }

    pub fn clear_access_token(&self) {
        self.durable.remove(ACCESS_TOKEN_KEY);
        self.session.remove(ACCESS_TOKEN_KEY);
    }

    pub fn read_refresh_token(&self) -> Option<String> {
        self.cookies.get(REFRESH_TOKEN_KEY)
    }

    pub fn refresh_token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.cookies.expires_at(REFRESH_TOKEN_KEY)
    }

    /// Persistent refresh cookie expiring `ttl` from now.
    pub fn write_refresh_token(&self, token: &str, ttl: Duration) {
        self.cookies.set(REFRESH_TOKEN_KEY, token, ttl);
    }

    /// Refresh cookie that does not outlive the process.
    pub fn write_session_refresh_token(&self, token: &str, ttl: Duration) {
        self.cookies.set_session(REFRESH_TOKEN_KEY, token, ttl);
    }

    /// Replace a rotated refresh token with a fresh ttl, keeping the cookie kind.
    pub fn rotate_refresh_token(&self, token: &str) {
        let session_only = self.read_refresh_token().is_some()
            && !self.cookies.is_persistent(REFRESH_TOKEN_KEY);

        if session_only {
            self.write_session_refresh_token(token, self.refresh_ttl);
        } else {
            self.write_refresh_token(token, self.refresh_ttl);
        }
    }

    pub fn clear_refresh_token(&self) {
        self.cookies.remove(REFRESH_TOKEN_KEY);
    }

    pub fn clear_all(&self) {
        self.clear_access_token();
        self.clear_refresh_token();
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        durable: Arc<MemoryStore>,
        session: Arc<MemoryStore>,
        store: CredentialStore,
    }

    fn fixture() -> Fixture {
        let durable = Arc::new(MemoryStore::new());
        let session = Arc::new(MemoryStore::new());
        let store = CredentialStore::new(
            durable.clone(),
            session.clone(),
            CookieJar::new(Arc::new(MemoryStore::new())),
            Duration::days(7),
        );
        Fixture {
            durable,
            session,
            store,
        }
    }

    #[test]
    fn write_keeps_stores_mutually_exclusive() {
        for remember_me in [true, false] {
            let f = fixture();
            f.store.write_access_token("OLD", !remember_me);
            f.store.write_access_token("T1", remember_me);

            let (holder, empty) = if remember_me {
                (&f.durable, &f.session)
            } else {
                (&f.session, &f.durable)
            };
            assert_eq!(holder.get(ACCESS_TOKEN_KEY).as_deref(), Some("T1"));
            assert!(empty.get(ACCESS_TOKEN_KEY).is_none());
            assert_eq!(f.store.read_access_token().as_deref(), Some("T1"));
        }
    }

    #[test]
    fn durable_wins_when_both_are_populated() {
        let f = fixture();
        f.durable.set(ACCESS_TOKEN_KEY, "DURABLE");
        f.session.set(ACCESS_TOKEN_KEY, "SESSION");

        assert_eq!(f.store.read_access_token().as_deref(), Some("DURABLE"));
        assert_eq!(
            f.store.access_token_durability(),
            Some(Durability::Durable)
        );
    }

    #[test]
    fn replace_preserves_durability() {
        let f = fixture();
        f.store.write_access_token("T1", true);
        f.store.replace_access_token("T2");
        assert_eq!(f.durable.get(ACCESS_TOKEN_KEY).as_deref(), Some("T2"));
        assert!(f.session.is_empty());

        let f = fixture();
        f.store.write_access_token("T1", false);
        f.store.replace_access_token("T2");
        assert_eq!(f.session.get(ACCESS_TOKEN_KEY).as_deref(), Some("T2"));
        assert!(f.durable.is_empty());
    }

    #[test]
    fn replace_without_existing_token_is_session_scoped() {
        let f = fixture();
        f.store.replace_access_token("T2");
        assert_eq!(
            f.store.access_token_durability(),
            Some(Durability::Session)
        );
    }

    #[test]
    fn clear_is_idempotent() {
        let f = fixture();
        f.store.clear_all();
        f.store.write_access_token("T1", true);
        f.store.write_refresh_token("R1", Duration::days(7));

        f.store.clear_all();
        f.store.clear_all();
        assert!(f.store.read_access_token().is_none());
        assert!(f.store.read_refresh_token().is_none());
        assert!(f.durable.is_empty() && f.session.is_empty());
    }

    #[test]
    fn rotation_keeps_session_only_refresh_cookie() {
        let f = fixture();
        f.store.write_session_refresh_token("R1", Duration::days(7));
        f.store.rotate_refresh_token("R2");

        assert_eq!(f.store.read_refresh_token().as_deref(), Some("R2"));
        assert!(!f.store.cookies().is_persistent(REFRESH_TOKEN_KEY));
    }

    #[test]
    fn rotation_renews_expiry() {
        let f = fixture();
        f.store.write_refresh_token("R1", Duration::hours(1));
        f.store.rotate_refresh_token("R2");

        let remaining = f.store.refresh_token_expires_at().unwrap() - Utc::now();
        assert!(remaining > Duration::days(6));
        assert!(f.store.cookies().is_persistent(REFRESH_TOKEN_KEY));
    }
}

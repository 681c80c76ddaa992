//! Session store for signed-in users
//!
//! The [`SessionStore`] trait abstracts over storage backends. The only
//! current implementation is [`InMemorySessionStore`], backed by `DashMap`s.
//!
//! # Design
//!
//! User records are keyed by OIDC **subject**. The browser never sees the
//! subject: it holds an opaque session token (`qbs_<base64>`) which the store
//! maps to the subject. Records live until sign-out or process exit; there is
//! no expiry of their own.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use crate::federation::TemporaryCredential;
use crate::random::session_token;

/// A signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    /// OIDC subject identifier.
    pub subject: String,
    /// Given name, or email when no given name is released.
    pub display_name: String,
    pub email: String,
    /// Credential obtained at sign-in. Never serialized.
    #[serde(skip)]
    pub credential: TemporaryCredential,
}

/// Storage backend for user records and the session tokens pointing at them.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Look up a user by subject.
    async fn get(&self, subject: &str) -> Option<UserRecord>;

    /// Store a user, replacing any record for the same subject.
    async fn create(&self, record: UserRecord) -> UserRecord;

    /// Remove a user and every session token pointing at them.
    ///
    /// Returns `true` if the user existed.
    async fn delete(&self, subject: &str) -> bool;

    /// Issue a new session token for an existing subject.
    async fn activate(&self, subject: &str) -> String;

    /// Resolve a session token to its user.
    async fn resolve(&self, token: &str) -> Option<UserRecord>;

    /// Forget a single session token.
    async fn deactivate(&self, token: &str);
}

/// In-memory session store.
///
/// - `users`:    subject → `UserRecord`
/// - `sessions`: session token → subject
#[derive(Default)]
pub struct InMemorySessionStore {
    users: DashMap<String, UserRecord>,
    sessions: DashMap<String, String>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, subject: &str) -> Option<UserRecord> {
        self.users.get(subject).map(|r| r.value().clone())
    }

    async fn create(&self, record: UserRecord) -> UserRecord {
        debug!(subject = %record.subject, "Storing user record");
        self.users.insert(record.subject.clone(), record.clone());
        record
    }

    async fn delete(&self, subject: &str) -> bool {
        self.sessions.retain(|_, s| s != subject);
        let existed = self.users.remove(subject).is_some();
        if existed {
            debug!(subject = %subject, "Deleted user record");
        }
        existed
    }

    async fn activate(&self, subject: &str) -> String {
        let token = session_token();
        self.sessions.insert(token.clone(), subject.to_string());
        token
    }

    async fn resolve(&self, token: &str) -> Option<UserRecord> {
        let subject = self.sessions.get(token)?.value().clone();
        self.get(&subject).await
    }

    async fn deactivate(&self, token: &str) {
        self.sessions.remove(token);
    }
}

//! Caller classification and the users file.
//!
//! Every request is classified into an [`AccessGroup`] by an
//! [`Authenticator`] before the route's group is checked.  Password checking
//! itself is left to whatever sits in front of the server; the shipped
//! [`AnonymousAuthenticator`] treats every caller as [`AccessGroup::Anyone`].
//!
//! [`CredentialsStore`] reads an htdigest users file (`user:realm:hash` per
//! line).  Its presence is what switches the default policy to
//! (`user`, `admin`).  The store only lists users; it does not verify
//! passwords.  With a users file configured and no authenticator that
//! grants `user` or `admin`, every privileged route answers 401.

use std::fs;
use std::path::Path;

use axum::http::HeaderMap;
use rexbot_types::{AccessGroup, BotError};
use tracing::{debug, warn};

/// Decides which group a request belongs to.
pub trait Authenticator: Send + Sync {
    fn classify(&self, headers: &HeaderMap) -> AccessGroup;
}

/// Classifies every caller as [`AccessGroup::Anyone`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousAuthenticator;

impl Authenticator for AnonymousAuthenticator {
    fn classify(&self, _headers: &HeaderMap) -> AccessGroup {
        AccessGroup::Anyone
    }
}

/// Users loaded from an htdigest file, restricted to one realm.
///
/// # Example
///
/// ```
/// use rexbot_web::auth::CredentialsStore;
///
/// let store = CredentialsStore::parse(
///     "alice:rexbot:0123abcd\nbob:other:ffff\n# comment\n",
///     "rexbot",
/// );
/// assert_eq!(store.users(), &["alice".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialsStore {
    realm: String,
    users: Vec<String>,
}

impl CredentialsStore {
    /// Read `path` and keep the entries for `realm`.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Settings`] if the file cannot be read.
    pub fn load(path: &Path, realm: &str) -> Result<Self, BotError> {
        let content = fs::read_to_string(path).map_err(|e| {
            BotError::Settings(format!("cannot read users file {}: {e}", path.display()))
        })?;
        let store = Self::parse(&content, realm);
        if store.users.is_empty() {
            warn!(path = %path.display(), realm, "users file has no entries for realm");
        } else {
            debug!(path = %path.display(), users = store.users.len(), "users file loaded");
        }
        Ok(store)
    }

    /// Parse htdigest content.  Blank lines, `#` comments and malformed
    /// lines are skipped.
    pub fn parse(content: &str, realm: &str) -> Self {
        let users = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let mut fields = line.splitn(3, ':');
                match (fields.next(), fields.next(), fields.next()) {
                    (Some(user), Some(r), Some(hash))
                        if !user.is_empty() && r == realm && !hash.is_empty() =>
                    {
                        Some(user.to_string())
                    }
                    _ => None,
                }
            })
            .collect();
        Self {
            realm: realm.to_string(),
            users,
        }
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn users(&self) -> &[String] {
        &self.users
    }
}

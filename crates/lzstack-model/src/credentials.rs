//! Delegated credential bundles.

use std::fmt;

use chrono::{DateTime, Utc};

/// Short-lived credentials for acting inside another account.
///
/// Never persisted; `Debug` redacts the secret parts.
#[derive(Clone, PartialEq, Eq)]
pub struct DelegatedCredentials {
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Session token.
    pub session_token: String,
    /// Expiry instant.
    pub expiry: DateTime<Utc>,
}

impl DelegatedCredentials {
    /// Whether the credentials are expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }

    /// Whether the credentials are expired now.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

impl fmt::Debug for DelegatedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatedCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &"** redacted **")
            .field("expiry", &self.expiry)
            .finish()
    }
}

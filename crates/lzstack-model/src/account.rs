//! Account inventory records.

use serde::{Deserialize, Serialize};

use crate::types::AccountId;

/// One account of the landing zone.
///
/// Deserializes from the inventory format, which names the organizational
/// unit `ou`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Logical account key, unique within the directory.
    pub key: String,
    /// Physical account identifier.
    pub id: AccountId,
    /// Key of the organizational unit the account belongs to.
    #[serde(alias = "ou")]
    pub organizational_unit_key: String,
}

impl Account {
    /// Create a new account record.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        id: AccountId,
        organizational_unit_key: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            id,
            organizational_unit_key: organizational_unit_key.into(),
        }
    }
}

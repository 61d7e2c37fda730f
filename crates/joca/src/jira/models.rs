//! Jira request and response models.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical Jira user identity, compared by equality only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserKey(String);

impl UserKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Jira project, trimmed to the fields the sync reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Project key (e.g. "OPS")
    pub key: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Current project lead
    #[serde(default)]
    pub lead: Option<User>,
}

/// Jira user as returned by project and user-search endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User key (Jira Server / Data Center)
    #[serde(default)]
    pub key: Option<String>,
    /// Username
    #[serde(default)]
    pub name: Option<String>,
    /// Account ID (Jira Cloud)
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl User {
    /// Identity used for lead comparison: the user key, or the account ID
    /// on deployments that no longer expose keys.
    #[must_use]
    pub fn user_key(&self) -> Option<UserKey> {
        let present = |s: &&str| !s.is_empty();
        self.key
            .as_deref()
            .filter(present)
            .or_else(|| self.account_id.as_deref().filter(present))
            .map(UserKey::new)
    }
}

/// Body for `PUT /rest/api/latest/project/{key}`.
#[derive(Debug, Serialize)]
pub struct UpdateLeadRequest<'a> {
    pub lead: &'a str,
}

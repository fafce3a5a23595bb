//! Credential answers returned by the local service.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::{FieldLocator, OriginKey, Role};

/// One role assignment the service knows for an origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub role: Role,
    pub selector: FieldLocator,
}

impl RoleAssignment {
    pub fn new(role: Role, selector: FieldLocator) -> Self {
        Self { role, selector }
    }
}

/// A candidate account, encoded on the wire as `[password, username_email]`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, Option<String>)", into = "(String, Option<String>)")]
pub struct AccountCandidate {
    pub password: String,
    pub username_email: Option<String>,
}

impl AccountCandidate {
    pub fn new(password: impl Into<String>, username_email: Option<String>) -> Self {
        Self {
            password: password.into(),
            username_email,
        }
    }

    /// Label shown in the account selector; `index` is zero-based.
    pub fn label(&self, index: usize) -> String {
        match self.username_email.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Account {}", index + 1),
        }
    }
}

impl From<(String, Option<String>)> for AccountCandidate {
    fn from((password, username_email): (String, Option<String>)) -> Self {
        Self {
            password,
            username_email,
        }
    }
}

impl From<AccountCandidate> for (String, Option<String>) {
    fn from(candidate: AccountCandidate) -> Self {
        (candidate.password, candidate.username_email)
    }
}

impl fmt::Debug for AccountCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCandidate")
            .field("password", &"<redacted>")
            .field("username_email", &self.username_email)
            .finish()
    }
}

/// Response payload for a fetch request.
///
/// Either a single match (`preferences` plus optional values) or a list of
/// candidates in `multiple_accounts` when the service found more than one.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialAnswer {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub preferences: Vec<RoleAssignment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple_accounts: Option<Vec<AccountCandidate>>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl CredentialAnswer {
    /// The answer carries a non-empty candidate list that needs a user choice.
    pub fn needs_disambiguation(&self) -> bool {
        self.multiple_accounts
            .as_ref()
            .is_some_and(|accounts| !accounts.is_empty())
    }

    /// Selector labels for every candidate, in wire order.
    pub fn account_labels(&self) -> Vec<String> {
        self.multiple_accounts
            .iter()
            .flatten()
            .enumerate()
            .map(|(i, candidate)| candidate.label(i))
            .collect()
    }

    /// Merge candidate `index` into the rest of the answer and clear the
    /// candidate list. Returns `None` when the index is out of range.
    pub fn select_account(&self, index: usize) -> Option<CredentialAnswer> {
        let candidate = self.multiple_accounts.as_ref()?.get(index)?.clone();
        Some(CredentialAnswer {
            preferences: self.preferences.clone(),
            username_email: candidate.username_email,
            password: Some(candidate.password),
            multiple_accounts: None,
        })
    }

    /// There are preferences to apply and at least one value to apply.
    pub fn is_fillable(&self) -> bool {
        let has_value = self.username_email.as_deref().is_some_and(|v| !v.is_empty())
            || self.password.as_deref().is_some_and(|v| !v.is_empty());
        !self.preferences.is_empty() && has_value
    }

    /// Value to write for a role, before placeholder filtering.
    pub fn value_for(&self, role: Role) -> Option<&str> {
        match role {
            Role::Username => self.username_email.as_deref(),
            Role::Password => self.password.as_deref(),
        }
    }
}

impl fmt::Debug for CredentialAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialAnswer")
            .field("preferences", &self.preferences)
            .field("username_email", &self.username_email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("multiple_accounts", &self.multiple_accounts)
            .finish()
    }
}

/// Everything the service needs to store a credential for an origin.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub origin: OriginKey,
    pub username: String,
    pub password: String,
    pub username_locator: FieldLocator,
    pub password_locator: FieldLocator,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("origin", &self.origin)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("username_locator", &self.username_locator)
            .field("password_locator", &self.password_locator)
            .finish()
    }
}

//! Per-origin field mapping.

use serde::{Deserialize, Serialize};

use super::{FieldLocator, Role};

/// The username/password locators recorded for one origin.
///
/// Field names follow the persisted `fieldMappings` layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    #[serde(
        rename = "usernameSelector",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub username: Option<FieldLocator>,

    #[serde(
        rename = "passwordSelector",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub password: Option<FieldLocator>,
}

impl FieldMapping {
    pub fn get(&self, role: Role) -> Option<&FieldLocator> {
        match role {
            Role::Username => self.username.as_ref(),
            Role::Password => self.password.as_ref(),
        }
    }

    /// Overwrite the locator for `role`, leaving the other slot untouched.
    pub fn set(&mut self, role: Role, locator: FieldLocator) {
        match role {
            Role::Username => self.username = Some(locator),
            Role::Password => self.password = Some(locator),
        }
    }

    /// Both roles are mapped.
    pub fn is_complete(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.password.is_none()
    }
}

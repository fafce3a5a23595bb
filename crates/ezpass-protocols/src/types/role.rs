//! Field roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The semantic purpose assigned to a mapped input field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Username,
    Password,
}

impl Role {
    /// Wire spelling used in `PREF:` frames and answer preferences.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Username => "Username",
            Role::Password => "Password",
        }
    }

    /// Decode the payload carried by a drag of the role badge
    /// (`"username"` or `"password"`).
    pub fn from_drag_payload(payload: &str) -> Option<Self> {
        match payload {
            "username" => Some(Role::Username),
            "password" => Some(Role::Password),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "username" => Ok(Role::Username),
            "password" => Ok(Role::Password),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

//! Cross-context commands.
//!
//! Page-side logic and the background context talk through JSON messages
//! tagged by an `action` field. They are decoded once, here, into
//! [`Command`] so the router can match exhaustively.

use serde::{Deserialize, Serialize};

use crate::types::{CredentialAnswer, FieldLocator, Role};

/// A message between the page context and the background context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    /// Request credentials for an origin (`url` carries the origin key).
    SendUrl { url: String },

    /// Persist a credential through the sync channel.
    #[serde(rename = "savePasswordViaWebSocket", rename_all = "camelCase")]
    SavePassword {
        hostname: String,
        username: String,
        password: String,
        username_selector: FieldLocator,
        password_selector: FieldLocator,
    },

    /// Mirror a field assignment to the service.
    SavePreference {
        hostname: String,
        selector: FieldLocator,
        role: Role,
    },

    /// Background -> page: apply an answer to the current document.
    FillFields { data: CredentialAnswer },

    /// Background -> page: open the save prompt for an origin.
    TriggerSave { hostname: String },
}

impl Command {
    /// Decode a message received from another context.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn action(&self) -> &'static str {
        match self {
            Command::SendUrl { .. } => "sendUrl",
            Command::SavePassword { .. } => "savePasswordViaWebSocket",
            Command::SavePreference { .. } => "savePreference",
            Command::FillFields { .. } => "fillFields",
            Command::TriggerSave { .. } => "triggerSave",
        }
    }
}

/// Reply to every [`Command`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<CredentialAnswer>,
}

impl CommandResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn with_data(data: CredentialAnswer) -> Self {
        Self {
            success: true,
            error: None,
            data: Some(data),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            data: None,
        }
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;

//! Text frames exchanged with the local credential service.
//!
//! | Direction | Frame |
//! |---|---|
//! | client -> service | raw origin string (fetch) |
//! | client -> service | `ADD_PASSWORD\|origin\|username\|password\|usernameLocator\|passwordLocator` |
//! | client -> service | `PREF:origin\|locator\|role` |
//! | service -> client | JSON [`CredentialAnswer`] |
//!
//! Field values are not escaped; a `|` inside a value is forwarded as-is,
//! which is what the service expects today.

use std::fmt;

use crate::types::{CredentialAnswer, CredentialRecord, FieldLocator, OriginKey, Role};

const ADD_PASSWORD: &str = "ADD_PASSWORD";
const PREF: &str = "PREF:";

/// An outbound frame.
#[derive(Clone, PartialEq, Eq)]
pub enum Frame {
    Fetch {
        origin: OriginKey,
    },
    SaveCredential(CredentialRecord),
    SavePreference {
        origin: OriginKey,
        locator: FieldLocator,
        role: Role,
    },
}

impl Frame {
    /// Render the frame as the text payload the service parses.
    pub fn encode(&self) -> String {
        match self {
            Frame::Fetch { origin } => origin.to_string(),
            Frame::SaveCredential(record) => format!(
                "{}|{}|{}|{}|{}|{}",
                ADD_PASSWORD,
                record.origin,
                record.username,
                record.password,
                record.username_locator,
                record.password_locator
            ),
            Frame::SavePreference {
                origin,
                locator,
                role,
            } => format!("{}{}|{}|{}", PREF, origin, locator, role),
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Fetch { .. } => "fetch",
            Frame::SaveCredential(_) => "save_credential",
            Frame::SavePreference { .. } => "save_preference",
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Fetch { origin } => f.debug_struct("Fetch").field("origin", origin).finish(),
            Frame::SaveCredential(record) => f.debug_tuple("SaveCredential").field(record).finish(),
            Frame::SavePreference {
                origin,
                locator,
                role,
            } => f
                .debug_struct("SavePreference")
                .field("origin", origin)
                .field("locator", locator)
                .field("role", role)
                .finish(),
        }
    }
}

/// Decode an inbound answer frame.
pub fn decode_answer(text: &str) -> Result<CredentialAnswer, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;

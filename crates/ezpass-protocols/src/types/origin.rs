//! Canonical site identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical identity of a site: a lowercase host with any leading `www.`
/// removed, or the literal [`OriginKey::FILE`] for local documents.
///
/// Values are produced by the origin normalizer; this type only carries them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OriginKey(String);

impl OriginKey {
    /// Sentinel used for local-file documents and as the fallback for an
    /// empty normalization result.
    pub const FILE: &'static str = "file";

    /// Wrap an already-canonical origin string.
    pub fn from_normalized(origin: impl Into<String>) -> Self {
        Self(origin.into())
    }

    /// The local-file sentinel.
    pub fn file() -> Self {
        Self(Self::FILE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_file(&self) -> bool {
        self.0 == Self::FILE
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for OriginKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OriginKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

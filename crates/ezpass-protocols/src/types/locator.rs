//! Field locators: replayable rules for finding one input element.
//!
//! The textual form is persisted (locally and by the credential service), so
//! the four shapes below are a compatibility surface. In particular the
//! structural path is a best-effort fingerprint and is not guaranteed unique;
//! changing how it is spelled would silently re-point existing mappings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DomError;

const NAME_PREFIX: &str = "input[name=\"";
const NAME_SUFFIX: &str = "\"]";
const PATH_SEPARATOR: &str = " > ";

/// An opaque locator string resolved against a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldLocator(String);

/// One level of a structural path: a tag name plus its class list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub tag: String,
    pub classes: Vec<String>,
}

impl PathSegment {
    pub fn new(tag: impl Into<String>, classes: Vec<String>) -> Self {
        Self {
            tag: tag.into(),
            classes,
        }
    }

    fn render(&self) -> String {
        let mut out = self.tag.clone();
        for class in &self.classes {
            out.push('.');
            out.push_str(class);
        }
        out
    }
}

/// Parsed form of a [`FieldLocator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorShape {
    /// `input[name="..."]`
    Name(String),
    /// `#id`
    Id(String),
    /// `input[type="password"]`
    PasswordInput,
    /// `tag.cls > tag.cls > ...`, body-relative, root to leaf.
    Path(Vec<PathSegment>),
}

impl FieldLocator {
    /// The fixed locator for "the page's password-type input".
    pub const PASSWORD_INPUT: &'static str = "input[type=\"password\"]";

    /// Wrap a locator string as received from storage or the wire.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn by_name(name: &str) -> Self {
        Self(format!("{}{}{}", NAME_PREFIX, name, NAME_SUFFIX))
    }

    pub fn by_id(id: &str) -> Self {
        Self(format!("#{}", id))
    }

    pub fn password_input() -> Self {
        Self(Self::PASSWORD_INPUT.to_string())
    }

    /// Build a structural path from segments ordered root to leaf.
    pub fn structural(segments: &[PathSegment]) -> Self {
        Self(
            segments
                .iter()
                .map(PathSegment::render)
                .collect::<Vec<_>>()
                .join(PATH_SEPARATOR),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the locator into one of the shapes the synthesizer emits.
    pub fn shape(&self) -> Result<LocatorShape, DomError> {
        let raw = self.0.as_str();

        if raw == Self::PASSWORD_INPUT {
            return Ok(LocatorShape::PasswordInput);
        }

        if let Some(inner) = raw
            .strip_prefix(NAME_PREFIX)
            .and_then(|rest| rest.strip_suffix(NAME_SUFFIX))
        {
            return Ok(LocatorShape::Name(inner.to_string()));
        }

        if let Some(id) = raw.strip_prefix('#') {
            if id.is_empty() || id.contains(PATH_SEPARATOR) {
                return Err(DomError::InvalidLocator(raw.to_string()));
            }
            return Ok(LocatorShape::Id(id.to_string()));
        }

        let mut segments = Vec::new();
        for level in raw.split(PATH_SEPARATOR) {
            let mut parts = level.split('.');
            let tag = parts.next().unwrap_or_default();
            if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return Err(DomError::InvalidLocator(raw.to_string()));
            }
            let classes = parts
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
            segments.push(PathSegment::new(tag, classes));
        }
        Ok(LocatorShape::Path(segments))
    }
}

impl fmt::Display for FieldLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldLocator {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

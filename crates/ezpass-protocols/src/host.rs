//! Host collaborator interfaces.
//!
//! The browser runtime, the DOM and the credential service are external to
//! the core. These traits are the seams the core is written against; the
//! sync crate and the host adapters provide implementations.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{StoreError, SyncError};
use crate::types::{CredentialAnswer, CredentialRecord, FieldLocator, OriginKey, Role};

/// Shared handle to a DOM element.
pub type ElementRef = Arc<dyn Element>;

/// A DOM element as seen by the core.
pub trait Element: Send + Sync {
    /// Lowercase tag name.
    fn tag_name(&self) -> String;

    fn attribute(&self, name: &str) -> Option<String>;

    fn class_list(&self) -> Vec<String>;

    /// This element is the document body (the root of structural paths).
    fn is_body(&self) -> bool;

    fn parent(&self) -> Option<ElementRef>;

    fn value(&self) -> String;

    fn set_value(&self, value: &str);

    /// Fire a bubbling `input` event so page scripts observe a write.
    fn dispatch_input_event(&self);

    fn is_input(&self) -> bool {
        self.tag_name() == "input"
    }

    /// Lowercase `type` attribute, `text` when absent.
    fn input_type(&self) -> String {
        self.attribute("type")
            .map(|t| t.to_ascii_lowercase())
            .unwrap_or_else(|| "text".to_string())
    }
}

/// The active document.
pub trait Document: Send + Sync {
    /// Current page address.
    fn location(&self) -> String;

    /// Resolve a locator to the first matching element.
    fn query(&self, locator: &FieldLocator) -> Option<ElementRef>;
}

/// Liveness of the runtime context hosting the core (e.g. an extension that
/// can be reloaded underneath a page).
pub trait HostContext: Send + Sync {
    fn is_valid(&self) -> bool;
}

/// String-keyed persistence provided by the host.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Interaction with the user.
#[async_trait]
pub trait UserPrompt: Send + Sync {
    /// "Save password for `<origin>`?" Returns `true` on Yes.
    async fn confirm_save(&self, origin: &OriginKey) -> bool;

    /// Pick one account from `labels`; `None` when dismissed.
    async fn choose_account(&self, labels: &[String]) -> Option<usize>;

    /// Show a non-blocking warning.
    fn warn_user(&self, message: &str);
}

/// The operations the sync channel exposes to the fill and save logic.
#[async_trait]
pub trait CredentialService: Send + Sync {
    /// Ask for the credentials known for `origin`.
    async fn request_credentials(&self, origin: &OriginKey) -> Result<CredentialAnswer, SyncError>;

    /// Store a credential.
    async fn save_credential(&self, record: CredentialRecord) -> Result<(), SyncError>;

    /// Mirror one role assignment of the mapping store.
    async fn save_preference(
        &self,
        origin: &OriginKey,
        locator: &FieldLocator,
        role: Role,
    ) -> Result<(), SyncError>;
}

/// A context that is always valid, for hosts without a teardown notion.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysValid;

impl HostContext for AlwaysValid {
    fn is_valid(&self) -> bool {
        true
    }
}

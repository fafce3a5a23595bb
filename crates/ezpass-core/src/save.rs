//! Save flow: offer to store the credentials typed into mapped fields.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info, warn};

use ezpass_protocols::{
    AlwaysValid, CredentialRecord, CredentialService, Document, ElementRef, EzpassError,
    HostContext, OriginKey, SyncError, UserPrompt,
};

use crate::fill::{FillEngine, FillOutcome};
use crate::mapping::MappingStore;
use crate::origin::effective_origin;
use crate::selector::synthesize;

pub const ORIGIN_MISMATCH_MESSAGE: &str =
    "Please save credentials on the same page where fields were mapped.";
pub const MISSING_VALUES_MESSAGE: &str = "Please enter both username and password.";
pub const SAVE_FAILED_MESSAGE: &str =
    "Failed to save credentials or fill fields. Check the log for details.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Stored; `refill` is the result of the follow-up fetch, `None` if it failed.
    Saved { refill: Option<FillOutcome> },
    /// The origin has no complete mapping on this page.
    NotMapped,
    Declined,
    /// Another confirmation of the same prompt is still running.
    AlreadySaving,
    OriginMismatch {
        expected: OriginKey,
        current: OriginKey,
    },
    MissingValues,
    Failed(SyncError),
}

pub struct SaveFlow {
    document: Arc<dyn Document>,
    mappings: Arc<MappingStore>,
    service: Arc<dyn CredentialService>,
    prompt: Arc<dyn UserPrompt>,
    fill: Arc<FillEngine>,
    context: Arc<dyn HostContext>,
}

impl SaveFlow {
    pub fn new(
        document: Arc<dyn Document>,
        mappings: Arc<MappingStore>,
        service: Arc<dyn CredentialService>,
        prompt: Arc<dyn UserPrompt>,
        fill: Arc<FillEngine>,
    ) -> Self {
        Self {
            document,
            mappings,
            service,
            prompt,
            fill,
            context: Arc::new(AlwaysValid),
        }
    }

    pub fn with_context(mut self, context: Arc<dyn HostContext>) -> Self {
        self.context = context;
        self
    }

    /// Form submission on the current page.
    pub async fn on_submit(&self) -> Result<SaveOutcome, EzpassError> {
        let origin = effective_origin(&self.document.location());
        self.trigger(origin).await
    }

    /// Ask the user to confirm, then save. Used by form submission and the
    /// force-save action.
    pub async fn trigger(&self, origin: OriginKey) -> Result<SaveOutcome, EzpassError> {
        self.ensure_context()?;

        let Some(prompt) = self.open_prompt(origin).await else {
            return Ok(SaveOutcome::NotMapped);
        };
        if !self.prompt.confirm_save(prompt.origin()).await {
            info!("Save declined for {}", prompt.origin());
            return Ok(SaveOutcome::Declined);
        }
        prompt.confirm().await
    }

    /// Open a prompt for `origin`, or `None` when its mapped fields do not
    /// both resolve on the current page.
    pub async fn open_prompt(&self, origin: OriginKey) -> Option<SavePrompt<'_>> {
        let fields = self
            .mappings
            .resolve(self.document.as_ref(), &origin)
            .await;
        let (Some(username), Some(password)) = (fields.username, fields.password) else {
            info!("No mapped fields found for {}, save prompt skipped", origin);
            return None;
        };
        Some(SavePrompt {
            flow: self,
            origin,
            username,
            password,
            saving: AtomicBool::new(false),
        })
    }

    fn ensure_context(&self) -> Result<(), EzpassError> {
        if self.context.is_valid() {
            Ok(())
        } else {
            error!("Extension context invalidated, save skipped");
            Err(EzpassError::ContextInvalidated)
        }
    }
}

/// One "Save password for <origin>?" prompt.
pub struct SavePrompt<'a> {
    flow: &'a SaveFlow,
    origin: OriginKey,
    username: ElementRef,
    password: ElementRef,
    saving: AtomicBool,
}

impl SavePrompt<'_> {
    /// Origin the prompt was opened for.
    pub fn origin(&self) -> &OriginKey {
        &self.origin
    }

    /// The "Yes" action. Only one confirmation runs at a time.
    pub async fn confirm(&self) -> Result<SaveOutcome, EzpassError> {
        if self.saving.swap(true, Ordering::SeqCst) {
            info!("Save already in progress for {}, skipping", self.origin);
            return Ok(SaveOutcome::AlreadySaving);
        }
        let result = self.save().await;
        self.saving.store(false, Ordering::SeqCst);
        result
    }

    async fn save(&self) -> Result<SaveOutcome, EzpassError> {
        let flow = self.flow;
        flow.ensure_context()?;

        let current = effective_origin(&flow.document.location());
        if current != self.origin {
            warn!(
                "Origin mismatch: mapped on {}, now on {}",
                self.origin, current
            );
            flow.prompt.warn_user(ORIGIN_MISMATCH_MESSAGE);
            return Ok(SaveOutcome::OriginMismatch {
                expected: self.origin.clone(),
                current,
            });
        }

        let username = self.username.value();
        let password = self.password.value();
        let username_locator = synthesize(self.username.as_ref());
        let password_locator = synthesize(self.password.as_ref());

        let (Some(username_locator), Some(password_locator)) = (username_locator, password_locator)
        else {
            flow.prompt.warn_user(MISSING_VALUES_MESSAGE);
            return Ok(SaveOutcome::MissingValues);
        };
        if username.is_empty() || password.is_empty() {
            flow.prompt.warn_user(MISSING_VALUES_MESSAGE);
            return Ok(SaveOutcome::MissingValues);
        }

        let record = CredentialRecord {
            origin: self.origin.clone(),
            username: username.clone(),
            password,
            username_locator,
            password_locator,
        };
        if let Err(e) = flow.service.save_credential(record).await {
            error!("Failed to save credentials for {}: {}", self.origin, e);
            flow.prompt.warn_user(SAVE_FAILED_MESSAGE);
            return Ok(SaveOutcome::Failed(e));
        }
        info!("Credentials saved for {} (user {})", self.origin, username);

        let refill = match flow.fill.fetch_and_fill(self.origin.clone()).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("Fill after save failed for {}: {}", self.origin, e);
                flow.prompt.warn_user(SAVE_FAILED_MESSAGE);
                None
            }
        };
        Ok(SaveOutcome::Saved { refill })
    }
}

#[cfg(test)]
#[path = "save_tests.rs"]
mod tests;

//! Credential fetch and fill.
//!
//! On navigation the engine fetches the answer for the current origin and
//! writes the values into the fields the answer's preferences point at. A
//! multi-account answer is first narrowed down by asking the user.
//!
//! Fetches are tagged client-side with a sequence number and their origin.
//! An answer is dropped when a newer fetch has started since, or when the
//! page has moved to another origin while the answer was in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, error, info, warn};

use ezpass_config::FillConfig;
use ezpass_protocols::{
    AlwaysValid, CredentialAnswer, CredentialService, Document, EzpassError, FieldLocator,
    HostContext, OriginKey, Role, UserPrompt,
};

use crate::origin::effective_origin;

/// Prompt text shown in the username badge; never a real value.
pub const USERNAME_PLACEHOLDER: &str = "User/Email";
/// Prompt text shown in the password badge; never a real value.
pub const PASSWORD_PLACEHOLDER: &str = "Password";

/// Literal values that must never be written into a field.
#[derive(Debug, Clone)]
pub struct Placeholders {
    values: Vec<String>,
}

impl Default for Placeholders {
    fn default() -> Self {
        Self {
            values: vec![
                USERNAME_PLACEHOLDER.to_string(),
                PASSWORD_PLACEHOLDER.to_string(),
            ],
        }
    }
}

impl Placeholders {
    /// Built-ins plus `extra`.
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut placeholders = Self::default();
        for value in extra {
            let value = value.into();
            if !value.is_empty() && !placeholders.values.contains(&value) {
                placeholders.values.push(value);
            }
        }
        placeholders
    }

    pub fn from_config(config: &FillConfig) -> Self {
        Self::with_extra(config.placeholders.iter().cloned())
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

/// A field touched by a fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFill {
    pub role: Role,
    pub locator: FieldLocator,
}

/// What a fill did, field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillReport {
    /// Written, with an input event fired.
    pub filled: Vec<FieldFill>,
    /// Locator resolved to nothing on this page.
    pub missing: Vec<FieldLocator>,
    /// Resolved, but the value was absent or a placeholder.
    pub skipped: Vec<FieldFill>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillOutcome {
    Filled(FillReport),
    /// No preferences, or no value to write.
    NothingToFill,
    /// The user dismissed the account selector.
    Dismissed,
    /// The answer arrived after a newer fetch or a navigation.
    Stale,
}

impl FillOutcome {
    pub fn filled_count(&self) -> usize {
        match self {
            FillOutcome::Filled(report) => report.filled.len(),
            _ => 0,
        }
    }
}

/// Fetches answers and applies them to the active document.
pub struct FillEngine {
    document: Arc<dyn Document>,
    service: Arc<dyn CredentialService>,
    prompt: Arc<dyn UserPrompt>,
    context: Arc<dyn HostContext>,
    placeholders: Placeholders,
    latest_fetch: AtomicU64,
}

impl FillEngine {
    pub fn new(
        document: Arc<dyn Document>,
        service: Arc<dyn CredentialService>,
        prompt: Arc<dyn UserPrompt>,
    ) -> Self {
        Self {
            document,
            service,
            prompt,
            context: Arc::new(AlwaysValid),
            placeholders: Placeholders::default(),
            latest_fetch: AtomicU64::new(0),
        }
    }

    pub fn with_context(mut self, context: Arc<dyn HostContext>) -> Self {
        self.context = context;
        self
    }

    pub fn with_placeholders(mut self, placeholders: Placeholders) -> Self {
        self.placeholders = placeholders;
        self
    }

    /// Origin of the page currently shown.
    pub fn current_origin(&self) -> OriginKey {
        effective_origin(&self.document.location())
    }

    /// Fetch and fill for the current page.
    pub async fn refresh(&self) -> Result<FillOutcome, EzpassError> {
        let origin = self.current_origin();
        self.fetch_and_fill(origin).await
    }

    /// Fetch the answer for `origin` and fill it, unless it went stale.
    pub async fn fetch_and_fill(&self, origin: OriginKey) -> Result<FillOutcome, EzpassError> {
        self.ensure_context()?;

        let seq = self.latest_fetch.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Fetch #{} for {}", seq, origin);

        let answer = self.service.request_credentials(&origin).await?;

        let latest = self.latest_fetch.load(Ordering::SeqCst);
        if latest != seq {
            warn!(
                "Discarding answer for fetch #{} ({}): fetch #{} started since",
                seq, origin, latest
            );
            return Ok(FillOutcome::Stale);
        }
        let current = self.current_origin();
        if current != origin {
            warn!(
                "Discarding answer for {}: page moved to {}",
                origin, current
            );
            return Ok(FillOutcome::Stale);
        }

        self.fill(answer).await
    }

    /// Apply an answer to the current document.
    pub async fn fill(&self, answer: CredentialAnswer) -> Result<FillOutcome, EzpassError> {
        self.ensure_context()?;

        let mut answer = answer;
        while answer.needs_disambiguation() {
            let labels = answer.account_labels();
            info!("{} accounts available, asking the user to pick one", labels.len());
            let Some(index) = self.prompt.choose_account(&labels).await else {
                info!("Account selection dismissed");
                return Ok(FillOutcome::Dismissed);
            };
            match answer.select_account(index) {
                Some(chosen) => {
                    debug!("Selected account {} of {}", index + 1, labels.len());
                    answer = chosen;
                }
                None => {
                    warn!("Account choice {} is out of range", index);
                    return Ok(FillOutcome::Dismissed);
                }
            }
        }

        Ok(self.apply(&answer))
    }

    fn apply(&self, answer: &CredentialAnswer) -> FillOutcome {
        if !answer.is_fillable() {
            debug!(
                "No credentials or preferences to fill for {}",
                self.current_origin()
            );
            return FillOutcome::NothingToFill;
        }

        let mut report = FillReport::default();
        for pref in &answer.preferences {
            let Some(field) = self.document.query(&pref.selector) else {
                warn!(
                    "Field not found for locator {} on {}",
                    pref.selector,
                    self.current_origin()
                );
                report.missing.push(pref.selector.clone());
                continue;
            };

            let entry = FieldFill {
                role: pref.role,
                locator: pref.selector.clone(),
            };
            match answer.value_for(pref.role) {
                Some(value) if !value.is_empty() && !self.placeholders.contains(value) => {
                    field.set_value(value);
                    field.dispatch_input_event();
                    match pref.role {
                        Role::Username => info!("Filled Username in {} with {}", pref.selector, value),
                        Role::Password => info!("Filled Password in {}", pref.selector),
                    }
                    report.filled.push(entry);
                }
                _ => {
                    debug!("Nothing to write for {} in {}", pref.role, pref.selector);
                    report.skipped.push(entry);
                }
            }
        }
        FillOutcome::Filled(report)
    }

    fn ensure_context(&self) -> Result<(), EzpassError> {
        if self.context.is_valid() {
            Ok(())
        } else {
            error!("Extension context invalidated, fill skipped");
            Err(EzpassError::ContextInvalidated)
        }
    }
}

#[cfg(test)]
#[path = "fill_tests.rs"]
mod tests;

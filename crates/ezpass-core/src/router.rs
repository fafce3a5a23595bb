//! Cross-context command router.
//!
//! Background commands (`sendUrl`, `savePasswordViaWebSocket`,
//! `savePreference`) go to the credential service. Page commands
//! (`fillFields`, `triggerSave`) go to the fill engine and save flow when a
//! page is attached.

use std::sync::Arc;

use tracing::{debug, error, warn};

use ezpass_protocols::{
    Command, CommandResponse, CredentialRecord, CredentialService, EzpassError, HostContext,
};

use crate::fill::FillEngine;
use crate::origin::effective_origin;
use crate::save::SaveFlow;

struct PageHandlers {
    fill: Arc<FillEngine>,
    save: Arc<SaveFlow>,
}

pub struct CommandRouter {
    service: Arc<dyn CredentialService>,
    context: Arc<dyn HostContext>,
    page: Option<PageHandlers>,
}

impl CommandRouter {
    pub fn new(service: Arc<dyn CredentialService>, context: Arc<dyn HostContext>) -> Self {
        Self {
            service,
            context,
            page: None,
        }
    }

    /// Attach the page-side handlers for `fillFields` and `triggerSave`.
    pub fn with_page(mut self, fill: Arc<FillEngine>, save: Arc<SaveFlow>) -> Self {
        self.page = Some(PageHandlers { fill, save });
        self
    }

    /// Decode a JSON message and dispatch it.
    pub async fn handle_json(&self, text: &str) -> CommandResponse {
        match Command::decode(text) {
            Ok(command) => self.dispatch(command).await,
            Err(e) => {
                warn!("Malformed command: {}", e);
                CommandResponse::failure(format!("Malformed command: {}", e))
            }
        }
    }

    pub async fn dispatch(&self, command: Command) -> CommandResponse {
        if !self.context.is_valid() {
            error!("Extension context invalidated, {} ignored", command.action());
            return CommandResponse::failure(EzpassError::ContextInvalidated.to_string());
        }
        debug!("Dispatching {}", command.action());

        match self.route(command).await {
            Ok(response) => response,
            Err(e) => {
                error!("Command failed: {}", e);
                CommandResponse::failure(e.to_string())
            }
        }
    }

    async fn route(&self, command: Command) -> Result<CommandResponse, EzpassError> {
        match command {
            Command::SendUrl { url } => {
                let origin = effective_origin(&url);
                let answer = self.service.request_credentials(&origin).await?;
                Ok(CommandResponse::with_data(answer))
            }
            Command::SavePassword {
                hostname,
                username,
                password,
                username_selector,
                password_selector,
            } => {
                let record = CredentialRecord {
                    origin: effective_origin(&hostname),
                    username,
                    password,
                    username_locator: username_selector,
                    password_locator: password_selector,
                };
                self.service.save_credential(record).await?;
                Ok(CommandResponse::ok())
            }
            Command::SavePreference {
                hostname,
                selector,
                role,
            } => {
                let origin = effective_origin(&hostname);
                self.service.save_preference(&origin, &selector, role).await?;
                Ok(CommandResponse::ok())
            }
            Command::FillFields { data } => {
                let page = self.page()?;
                let outcome = page.fill.fill(data).await?;
                debug!("fillFields: {:?}", outcome);
                Ok(CommandResponse::ok())
            }
            Command::TriggerSave { hostname } => {
                let page = self.page()?;
                let outcome = page.save.trigger(effective_origin(&hostname)).await?;
                debug!("triggerSave: {:?}", outcome);
                Ok(CommandResponse::ok())
            }
        }
    }

    fn page(&self) -> Result<&PageHandlers, EzpassError> {
        self.page
            .as_ref()
            .ok_or_else(|| EzpassError::Validation("No page attached to the router".to_string()))
    }
}

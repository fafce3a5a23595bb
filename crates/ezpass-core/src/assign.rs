//! Field assignment: the drop handler that maps a role badge onto an input.

use std::sync::Arc;

use tracing::{error, info, warn};

use ezpass_protocols::{
    AlwaysValid, CredentialService, Document, ElementRef, EzpassError, FieldLocator, HostContext,
    OriginKey, Role,
};

use crate::mapping::MappingStore;
use crate::origin::effective_origin;
use crate::selector::{nearest_input, synthesize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignOutcome {
    /// Stored locally. `synced` is false when the preference could not be
    /// mirrored to the service.
    Assigned {
        origin: OriginKey,
        role: Role,
        locator: FieldLocator,
        synced: bool,
    },
    /// Payload was neither `username` nor `password`.
    InvalidPayload(String),
    /// No input at or above the drop target.
    NoInput,
    /// The input could not be described by a locator.
    Unmappable,
}

pub struct FieldMapper {
    document: Arc<dyn Document>,
    mappings: Arc<MappingStore>,
    service: Arc<dyn CredentialService>,
    context: Arc<dyn HostContext>,
}

impl FieldMapper {
    pub fn new(
        document: Arc<dyn Document>,
        mappings: Arc<MappingStore>,
        service: Arc<dyn CredentialService>,
    ) -> Self {
        Self {
            document,
            mappings,
            service,
            context: Arc::new(AlwaysValid),
        }
    }

    pub fn with_context(mut self, context: Arc<dyn HostContext>) -> Self {
        self.context = context;
        self
    }

    /// Handle a drop of `payload` onto `target`.
    pub async fn assign(
        &self,
        target: ElementRef,
        payload: &str,
    ) -> Result<AssignOutcome, EzpassError> {
        let Some(input) = nearest_input(target) else {
            warn!("Drop target is not an input element, ignoring");
            return Ok(AssignOutcome::NoInput);
        };
        let Some(locator) = synthesize(input.as_ref()) else {
            error!("Failed to generate a locator for the drop target");
            return Ok(AssignOutcome::Unmappable);
        };

        let origin = effective_origin(&self.document.location());
        if !self.context.is_valid() {
            error!("Extension context invalidated, cannot save mapping");
            return Err(EzpassError::ContextInvalidated);
        }

        let Some(role) = Role::from_drag_payload(payload) else {
            error!("Invalid role received: {:?}", payload);
            return Ok(AssignOutcome::InvalidPayload(payload.to_string()));
        };

        self.mappings
            .set_role(&origin, role, locator.clone())
            .await?;
        info!("Mapped {} to {} under origin {}", role, locator, origin);

        let synced = match self.service.save_preference(&origin, &locator, role).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Preference for {} not mirrored to the service: {}", origin, e);
                false
            }
        };

        Ok(AssignOutcome::Assigned {
            origin,
            role,
            locator,
            synced,
        })
    }
}

//! # EZPass Protocols
//!
//! Shared definitions for the EZPass autofill client. Contains only types,
//! wire formats and interface traits - no implementations.
//!
//! ## Core Traits
//!
//! - [`CredentialService`] - The operations the sync channel offers to the page logic
//! - [`Document`] / [`Element`] - The DOM query/mutation surface of the host page
//! - [`KeyValueStore`] - Host persistence used by the mapping store
//! - [`UserPrompt`] - Confirmation, disambiguation and warnings shown to the user
//! - [`HostContext`] - Liveness of the hosting runtime context

pub mod command;
pub mod error;
pub mod host;
pub mod types;
pub mod wire;

pub use command::{Command, CommandResponse};
pub use error::{DomError, EzpassError, StoreError, SyncError};
pub use host::{
    AlwaysValid, CredentialService, Document, Element, ElementRef, HostContext, KeyValueStore,
    UserPrompt,
};
pub use types::*;
pub use wire::Frame;

//! Sync channel to the local credential service.
//!
//! Maintains one logical connection to the service and exposes the three
//! operations of [`CredentialService`](ezpass_protocols::CredentialService):
//! fetch credentials, save a credential, save a field preference.
//!
//! ## State machine
//!
//! ```text
//!                 operation            connect ok
//!  Disconnected ─────────────► Connecting ─────────► Open
//!       ▲                          │                  │
//!       │   connect failed (lazy)  │                  │ closed / errored
//!       └──────────────────────────┘◄─────────────────┘
//!                                  │
//!                                  │ ceiling reached (bounded)
//!                                  ▼
//!                              Exhausted
//! ```
//!
//! Frames issued while `Connecting` are queued and flushed in order once the
//! channel reaches `Open`; only the first operation triggers a connect.
//!
//! ## Correlation
//!
//! The wire protocol has no request ids: a fetch is answered by the next
//! inbound frame. A newer fetch supersedes the pending one.

mod channel;
mod connector;
mod policy;

pub use channel::{ChannelConfig, ChannelState, SyncChannel};
pub use connector::{Connection, Connector, FrameSink, FrameStream, WsConnector};
pub use policy::ReconnectPolicy;

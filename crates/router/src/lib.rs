//! Routing layer of the peerlink overlay.
//!
//! # Actor Pattern
//!
//! - [`RoutingHandler`] owns the broadcast writer, the broadcast and local
//!   readers, and the registry of per-peer writers. One instance exists per
//!   process, reached through [`RoutingHandler::shared`].
//! - [`RouterService`] runs in the background task and feeds every command from
//!   the control link to the handler, in send order.
//! - [`ControlHandle`] is the cheap-to-clone foreground end of the link.
//!
//! Use [`control_link`] to create the service and handle pair.
//!
//! # Control messages
//!
//! On the link a command is a tuple `[tag, ...args]` ([`ControlFrame`]):
//!
//! | tag | args |
//! |---|---|
//! | `broadcast` | `payload` |
//! | `accept` | `peer_topic` |
//! | `direct` | `peer_topic`, `payload` |
//! | `shutdown` | |
//!
//! Frames with an unknown tag or wrong arity are logged and dropped; they never
//! stop the service.

pub mod error;
pub mod handle;
pub mod handler;
pub mod message;
mod metrics;
pub mod service;
pub mod singleton;

pub use error::RoutingError;
pub use handle::ControlHandle;
pub use handler::{AcceptResult, Flow, PAYLOAD_TYPE, RouterConfig, RouterInit, RoutingHandler};
pub use message::{ControlFrame, ControlMessage, ControlTag};
pub use service::{LinkCommand, RouterService};
pub use singleton::SingletonSlot;

use std::sync::Arc;

use tokio::sync::mpsc;

/// Create the control link for `handler`: a service to spawn in the background
/// and the handle the foreground sends commands through.
pub fn control_link(handler: Arc<RoutingHandler>) -> (RouterService, ControlHandle) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    (
        RouterService::new(handler, command_rx),
        ControlHandle::new(command_tx),
    )
}

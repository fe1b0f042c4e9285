//! Foreground end of the control link.

use peerlink_topic::Topic;
use tokio::sync::{mpsc, oneshot};

use crate::service::LinkCommand;
use crate::{ControlFrame, ControlMessage, RoutingError};

/// Cloneable handle for sending commands to the [`RouterService`](crate::RouterService).
#[derive(Debug, Clone)]
pub struct ControlHandle {
    command_tx: mpsc::UnboundedSender<LinkCommand>,
}

impl ControlHandle {
    /// Wrap the sending half of a service's command channel.
    pub fn new(command_tx: mpsc::UnboundedSender<LinkCommand>) -> Self {
        Self { command_tx }
    }

    /// Queue `message` without waiting for it to be handled.
    pub fn send(&self, message: ControlMessage) -> Result<(), RoutingError> {
        self.send_frame(message.into_frame())
    }

    /// Queue a raw frame. Malformed frames are dropped by the service.
    pub fn send_frame(&self, frame: ControlFrame) -> Result<(), RoutingError> {
        self.command_tx
            .send(LinkCommand { frame, reply: None })
            .map_err(|_| RoutingError::ServiceStopped)
    }

    /// Send `message` and wait for the handler's outcome.
    pub async fn request(&self, message: ControlMessage) -> Result<(), RoutingError> {
        let (tx, rx) = oneshot::channel();

        self.command_tx
            .send(LinkCommand {
                frame: message.into_frame(),
                reply: Some(tx),
            })
            .map_err(|_| RoutingError::ServiceStopped)?;

        rx.await.map_err(|_| RoutingError::ServiceStopped)?
    }

    pub async fn broadcast(&self, payload: impl Into<String>) -> Result<(), RoutingError> {
        self.request(ControlMessage::Broadcast {
            payload: payload.into(),
        })
        .await
    }

    pub async fn accept(&self, peer: Topic) -> Result<(), RoutingError> {
        self.request(ControlMessage::Accept { peer }).await
    }

    /// Fails with [`RoutingError::UnknownPeer`] if `peer` was never accepted.
    pub async fn direct(&self, peer: Topic, payload: impl Into<String>) -> Result<(), RoutingError> {
        self.request(ControlMessage::Direct {
            peer,
            payload: payload.into(),
        })
        .await
    }

    /// Stop the service. Resolves once it has processed everything sent before.
    pub async fn shutdown(&self) -> Result<(), RoutingError> {
        self.request(ControlMessage::Shutdown).await
    }

    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }
}

//! Routing error types.

use peerlink_channel::ChannelError;
use peerlink_topic::Topic;

/// Error from the routing handler or the control link.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    /// The shared handler was first used without its construction arguments.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// `direct` named a peer that was never accepted.
    #[error("Unknown peer: {0}")]
    UnknownPeer(Topic),
    /// A control frame with an unknown tag or bad arguments.
    #[error("Malformed command: {0}")]
    MalformedCommand(String),
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
    /// The background service is gone.
    #[error("Router service stopped")]
    ServiceStopped,
}

//! Operator-facing errors.

use peerlink_router::RoutingError;

/// Error from one operator command. Reported and the loop continues.
#[derive(Debug, thiserror::Error)]
pub enum OperatorError {
    #[error("No accepted peer at index {index} ({count} accepted)")]
    PeerIndexOutOfRange { index: usize, count: usize },
    /// Every reader feeding the inbound queue is gone.
    #[error("Inbound queue closed")]
    QueueClosed,
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

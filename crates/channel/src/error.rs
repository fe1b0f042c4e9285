//! Transport error type.

use std::time::Duration;

/// Error surfaced by a transport on endpoint construction or publish.
///
/// All variants are retryable from the caller's point of view; a transport
/// never drops a write silently when it can report one of these instead.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel closed")]
    Closed,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Encoding error: {0}")]
    Encode(String),
    #[error("No reader matched within {0:?}")]
    DiscoveryTimeout(Duration),
    #[error("Rejected: {0}")]
    Rejected(String),
}

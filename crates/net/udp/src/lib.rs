//! Datagram transport for a fixed set of localhost ports.
//!
//! Each instance binds one UDP socket. Readers announce their subscriptions to
//! every candidate port and refresh them periodically; writers count the live
//! remote subscriptions of their topic as matched readers and publish one
//! datagram per subscriber. Frames carry a shared static credential and frames
//! with any other credential are ignored.

mod config;
mod frame;
mod transport;

pub use config::{DEFAULT_CREDENTIAL, UdpConfig};
pub use frame::{Frame, FrameBody, MAX_DATAGRAM};
pub use transport::UdpTransport;

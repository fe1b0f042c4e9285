//! A peerlink instance: configuration, logging, the operator decision loop and
//! launch wiring.
//!
//! [`launch`] binds the datagram transport, builds the process-wide routing
//! handler, spawns its control-link service and runs an [`Operator`] over
//! stdin until the operator exits.

pub mod args;
pub mod command;
pub mod config;
pub mod error;
pub mod launch;
pub mod logging;
pub mod operator;

pub use args::{LogArgs, NodeArgs};
pub use command::OperatorCommand;
pub use config::PeerlinkConfig;
pub use error::OperatorError;
pub use launch::launch;
pub use logging::init_logging;
pub use operator::{AcceptedPeers, DrainReport, Operator, Received};

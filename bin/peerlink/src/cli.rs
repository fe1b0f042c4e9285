//! Command line entry point.

use clap::{CommandFactory, Parser, error::ErrorKind};
use peerlink_node::{LogArgs, NodeArgs};

/// Peerlink - complete-graph peer overlay over pub/sub
///
/// Start PROCESS_COUNT instances, one per terminal, with PROCESS_INDEX 0 through
/// PROCESS_COUNT - 1.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub(crate) struct Cli {
    /// Logging configuration.
    #[command(flatten)]
    pub(crate) logs: LogArgs,

    #[command(flatten)]
    pub(crate) node: NodeArgs,
}

impl Cli {
    /// Parse arguments, exiting with a usage message when they are inconsistent.
    pub(crate) fn parse_validated() -> Self {
        let cli = Self::parse();
        if let Err(msg) = cli.node.validate() {
            Self::command().error(ErrorKind::ValueValidation, msg).exit();
        }
        cli
    }
}

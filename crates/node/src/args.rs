//! Command line arguments.

use std::path::PathBuf;

use clap::Args;

/// Logging configuration.
#[derive(Debug, Clone, Default, Args)]
#[command(next_help_heading = "Logging")]
pub struct LogArgs {
    /// Only log errors.
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose mode (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Log filter directive (e.g., "peerlink_router=debug").
    #[arg(long = "log.filter", value_name = "DIRECTIVE")]
    pub filter: Option<String>,

    /// Use JSON format for log output.
    #[arg(long = "log.json")]
    pub json: bool,
}

/// Where this instance sits in the mesh.
#[derive(Debug, Clone, Args)]
pub struct NodeArgs {
    /// Index of this process, 0-based.
    #[arg(value_name = "PROCESS_INDEX")]
    pub process_index: u16,

    /// Number of processes in the mesh.
    #[arg(value_name = "PROCESS_COUNT")]
    pub process_count: u16,

    /// First port of the mesh. Process `i` listens on `base_port + i`.
    #[arg(long, value_name = "PORT")]
    pub base_port: Option<u16>,

    /// TOML configuration file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Shared credential every instance of the mesh must present.
    #[arg(long, value_name = "SECRET")]
    pub credential: Option<String>,

    /// Start without waiting for a broadcast subscriber to match.
    #[arg(long)]
    pub no_discovery_wait: bool,
}

impl NodeArgs {
    /// Check the positional arguments agree with each other.
    pub fn validate(&self) -> Result<(), String> {
        if self.process_count == 0 {
            return Err("PROCESS_COUNT must be at least 1".to_owned());
        }
        if self.process_index >= self.process_count {
            return Err(format!(
                "PROCESS_INDEX {} is out of range for PROCESS_COUNT {}",
                self.process_index, self.process_count
            ));
        }
        Ok(())
    }
}

//! Peerlink instance binary.

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse_validated();
    peerlink_node::init_logging(&cli.logs)?;

    peerlink_node::launch(&cli.node).await
}

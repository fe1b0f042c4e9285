//! Wiring for one instance.

use std::sync::Arc;

use eyre::{Result, WrapErr};
use peerlink_channel::InboundQueue;
use peerlink_net_udp::UdpTransport;
use peerlink_router::{RouterInit, RoutingHandler, control_link};
use peerlink_topic::{InstanceIdentity, Topic};
use tokio::io::BufReader;
use tracing::info;

use crate::{NodeArgs, Operator, PeerlinkConfig};

/// Run an instance until the operator exits.
///
/// The routing handler is the process-wide one, so this runs once per process.
pub async fn launch(args: &NodeArgs) -> Result<()> {
    let mut config = PeerlinkConfig::load(args.config.as_deref())?;
    config.apply_args(args);

    let udp = config.udp_config(args.process_index, args.process_count)?;
    let local_topic = Topic::local(&InstanceIdentity::from_port(udp.local_port));
    info!(
        %local_topic,
        index = args.process_index,
        count = args.process_count,
        "starting peerlink instance"
    );

    let transport = UdpTransport::bind(udp)
        .await
        .wrap_err("Failed to bind datagram transport")?;

    let queue = InboundQueue::new();
    let handler = RoutingHandler::shared(Some(RouterInit {
        transport: Arc::new(transport),
        local_topic: local_topic.clone(),
        sink: queue.sink(),
        config: config.router_config(),
    }))
    .await
    .wrap_err("Failed to start routing handler")?;

    let (service, control) = control_link(handler);
    let service = tokio::spawn(service.run());

    let mut operator = Operator::new(local_topic, queue, control);
    operator
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;

    service.await.wrap_err("Router service task failed")?;
    info!("peerlink instance stopped");
    Ok(())
}

//! Background end of the control link.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::{ControlFrame, Flow, RoutingError, RoutingHandler};

/// A frame from the foreground, with an optional reply path.
#[derive(Debug)]
pub struct LinkCommand {
    pub frame: ControlFrame,
    /// Receives the dispatch outcome. `None` for fire-and-forget sends.
    pub reply: Option<oneshot::Sender<Result<(), RoutingError>>>,
}

/// Feeds control-link commands to the routing handler in send order.
#[derive(Debug)]
pub struct RouterService {
    handler: Arc<RoutingHandler>,
    command_rx: mpsc::UnboundedReceiver<LinkCommand>,
}

impl RouterService {
    pub fn new(
        handler: Arc<RoutingHandler>,
        command_rx: mpsc::UnboundedReceiver<LinkCommand>,
    ) -> Self {
        Self {
            handler,
            command_rx,
        }
    }

    /// Run until a `shutdown` command arrives or every handle is dropped.
    ///
    /// Dispatch errors go back on the reply path, or are logged when there is
    /// none; they never end the loop.
    pub async fn run(mut self) {
        while let Some(LinkCommand { frame, reply }) = self.command_rx.recv().await {
            let tag = frame.tag().unwrap_or_default().to_owned();
            let outcome = self.handler.dispatch_frame(frame).await;

            let flow = match &outcome {
                Ok(flow) => *flow,
                Err(_) => Flow::Continue,
            };
            match reply {
                Some(reply) => {
                    let _ = reply.send(outcome.map(|_| ()));
                }
                None => {
                    if let Err(e) = outcome {
                        warn!(%tag, error = %e, "control command failed");
                    }
                }
            }

            if flow == Flow::Shutdown {
                debug!("shutdown requested");
                break;
            }
        }
        self.command_rx.close();
        debug!(local_topic = %self.handler.local_topic(), "router service stopped");
    }
}

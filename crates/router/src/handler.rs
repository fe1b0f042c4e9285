//! The routing handler: owner of the broadcast channel and the peer registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use peerlink_channel::{ChannelReader, ChannelWriter, InboundSink, Transport};
use peerlink_topic::Topic;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::metrics::RouterMetrics;
use crate::{ControlFrame, ControlMessage, RoutingError, SingletonSlot};

/// Payload type name registered for every peerlink topic.
pub const PAYLOAD_TYPE: &str = "PeerlinkMessage";

static ROUTER: SingletonSlot<RoutingHandler> = SingletonSlot::new();

/// Construction-time behaviour of the handler.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Hold construction until the broadcast writer has a matched reader.
    pub await_broadcast_match: bool,
    /// Upper bound on that wait. `None` waits indefinitely.
    pub discovery_timeout: Option<Duration>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            await_broadcast_match: true,
            discovery_timeout: None,
        }
    }
}

/// Everything the handler needs on first construction.
#[derive(Debug, Clone)]
pub struct RouterInit {
    pub transport: Arc<dyn Transport>,
    pub local_topic: Topic,
    /// Where the broadcast and local readers deliver.
    pub sink: InboundSink,
    pub config: RouterConfig,
}

/// Outcome of an accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptResult {
    /// A writer was created for the peer.
    New,
    /// The peer already had a writer; nothing changed.
    AlreadyAccepted,
}

/// Whether the control loop keeps running after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Shutdown,
}

/// Owns the broadcast writer, the broadcast and local readers, and one writer
/// per accepted peer.
#[derive(Debug)]
pub struct RoutingHandler {
    local_topic: Topic,
    transport: Arc<dyn Transport>,
    broadcast_writer: Arc<dyn ChannelWriter>,
    _broadcast_reader: Box<dyn ChannelReader>,
    _local_reader: Box<dyn ChannelReader>,
    peers: RwLock<HashMap<Topic, Arc<dyn ChannelWriter>>>,
    /// Serialises writer creation so a peer never gets two writers.
    accepting: Mutex<()>,
    metrics: RouterMetrics,
}

impl RoutingHandler {
    /// Build a handler.
    ///
    /// Readers are subscribed before the discovery barrier is awaited, so an
    /// instance's own broadcast reader counts as a match.
    pub async fn new(init: RouterInit) -> Result<Self, RoutingError> {
        let RouterInit {
            transport,
            local_topic,
            sink,
            config,
        } = init;

        if !local_topic.is_peer() {
            return Err(RoutingError::Configuration(format!(
                "local topic must be a peer topic, got {local_topic}"
            )));
        }

        let broadcast = Topic::broadcast();
        let broadcast_writer: Arc<dyn ChannelWriter> =
            Arc::from(transport.create_writer(PAYLOAD_TYPE, &broadcast).await?);
        let broadcast_reader = transport
            .create_reader(PAYLOAD_TYPE, &broadcast, sink.clone())
            .await?;
        let local_reader = transport
            .create_reader(PAYLOAD_TYPE, &local_topic, sink)
            .await?;

        if config.await_broadcast_match {
            debug!(%local_topic, "waiting for a broadcast subscriber");
            let matched = match config.discovery_timeout {
                Some(timeout) => broadcast_writer.discovery().wait_timeout(timeout).await?,
                None => broadcast_writer.await_at_least_one_match().await?,
            };
            debug!(%local_topic, matched, "broadcast writer matched");
        }

        info!(%local_topic, "routing handler ready");
        Ok(Self {
            local_topic,
            transport,
            broadcast_writer,
            _broadcast_reader: broadcast_reader,
            _local_reader: local_reader,
            peers: RwLock::new(HashMap::new()),
            accepting: Mutex::new(()),
            metrics: RouterMetrics::default(),
        })
    }

    /// The process-wide handler, constructed from `init` on first use.
    ///
    /// Concurrent first callers share one construction. If it fails the slot
    /// stays empty and a later call may retry.
    pub async fn shared(init: Option<RouterInit>) -> Result<Arc<Self>, RoutingError> {
        ROUTER
            .get_or_try_init(|| async move {
                let init = init.ok_or_else(|| {
                    RoutingError::Configuration(
                        "routing handler first used without construction arguments".to_owned(),
                    )
                })?;
                Self::new(init).await
            })
            .await
    }

    /// The process-wide handler if it has been constructed.
    pub fn try_shared() -> Option<Arc<Self>> {
        ROUTER.get()
    }

    /// Topic this instance's local reader is subscribed to.
    pub fn local_topic(&self) -> &Topic {
        &self.local_topic
    }

    /// Matched-reader count of the broadcast writer.
    pub fn broadcast_matched(&self) -> usize {
        self.broadcast_writer.matched_count()
    }

    /// Act on one control message.
    pub async fn dispatch(&self, message: ControlMessage) -> Result<Flow, RoutingError> {
        match message {
            ControlMessage::Broadcast { payload } => self.broadcast(&payload).await?,
            ControlMessage::Accept { peer } => {
                self.accept(peer).await?;
            }
            ControlMessage::Direct { peer, payload } => self.direct(&peer, &payload).await?,
            ControlMessage::Shutdown => return Ok(Flow::Shutdown),
        }
        Ok(Flow::Continue)
    }

    /// Decode and act on a raw frame. Malformed frames are logged and dropped.
    pub async fn dispatch_frame(&self, frame: ControlFrame) -> Result<Flow, RoutingError> {
        match ControlMessage::try_from(frame) {
            Ok(message) => self.dispatch(message).await,
            Err(e) => {
                self.metrics.inc_malformed();
                warn!(error = %e, "dropping control frame");
                Ok(Flow::Continue)
            }
        }
    }

    /// Publish `payload` on the broadcast topic.
    pub async fn broadcast(&self, payload: &str) -> Result<(), RoutingError> {
        self.metrics.inc_broadcast();
        self.broadcast_writer.publish(payload).await?;
        debug!(payload, "broadcast");
        Ok(())
    }

    /// Create a writer for `peer` unless one already exists.
    ///
    /// Per-peer writers publish without waiting for a match.
    pub async fn accept(&self, peer: Topic) -> Result<AcceptResult, RoutingError> {
        self.metrics.inc_accept();
        if !peer.is_peer() {
            return Err(RoutingError::MalformedCommand(format!(
                "cannot accept non-peer topic {peer}"
            )));
        }
        if self.peers.read().contains_key(&peer) {
            debug!(%peer, "peer already accepted");
            return Ok(AcceptResult::AlreadyAccepted);
        }

        let _accepting = self.accepting.lock().await;
        if self.peers.read().contains_key(&peer) {
            return Ok(AcceptResult::AlreadyAccepted);
        }

        let writer: Arc<dyn ChannelWriter> =
            Arc::from(self.transport.create_writer(PAYLOAD_TYPE, &peer).await?);
        let count = {
            let mut peers = self.peers.write();
            peers.insert(peer.clone(), writer);
            peers.len()
        };

        self.metrics.set_peers(count);
        info!(%peer, peers = count, "accepted peer");
        Ok(AcceptResult::New)
    }

    /// Publish `payload` on an accepted peer's topic.
    pub async fn direct(&self, peer: &Topic, payload: &str) -> Result<(), RoutingError> {
        self.metrics.inc_direct();
        let writer = self.peers.read().get(peer).cloned();
        let Some(writer) = writer else {
            self.metrics.inc_unknown_peer();
            warn!(%peer, "direct send to unknown peer");
            return Err(RoutingError::UnknownPeer(peer.clone()));
        };

        writer.publish(payload).await?;
        debug!(%peer, payload, "direct");
        Ok(())
    }

    /// Number of accepted peers.
    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }

    /// Whether `peer` has a writer in the registry.
    pub fn contains_peer(&self, peer: &Topic) -> bool {
        self.peers.read().contains_key(peer)
    }

    /// Accepted peers, sorted.
    pub fn peers(&self) -> Vec<Topic> {
        let mut peers: Vec<Topic> = self.peers.read().keys().cloned().collect();
        peers.sort();
        peers
    }
}

//! Socket ownership, discovery bookkeeping and the background loops.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::RwLock;
use peerlink_channel::{
    ChannelError, ChannelReader, ChannelWriter, DiscoveryBarrier, InboundSink, MatchSignal,
    Transport,
};
use peerlink_topic::Topic;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::{Frame, FrameBody, MAX_DATAGRAM, UdpConfig};

/// Endpoints match on type name and topic.
type SubKey = (String, Topic);

/// Remote subscriber ports per subscription, with the last time each was heard.
type RemoteMap = HashMap<SubKey, HashMap<u16, Instant>>;

fn sub_key(type_name: &str, topic: &Topic) -> SubKey {
    (type_name.to_owned(), topic.clone())
}

#[derive(Debug)]
struct Inner {
    config: UdpConfig,
    socket: UdpSocket,
    /// Local readers per subscription.
    local: RwLock<HashMap<SubKey, Vec<(u64, InboundSink)>>>,
    remote: RwLock<RemoteMap>,
    /// Matched-reader signals for local writers. Locked after `remote`.
    signals: RwLock<HashMap<SubKey, MatchSignal>>,
    next_reader: AtomicU64,
}

impl Inner {
    fn addr(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.config.host, port)
    }

    fn frame(&self, body: FrameBody) -> Frame {
        Frame {
            credential: self.config.credential.clone(),
            from_port: self.config.local_port,
            body,
        }
    }

    fn signal(&self, key: &SubKey) -> DiscoveryBarrier {
        let remote = self.remote.read();
        let mut signals = self.signals.write();
        signals
            .entry(key.clone())
            .or_insert_with(|| {
                let signal = MatchSignal::new();
                signal.set(remote.get(key).map_or(0, HashMap::len));
                signal
            })
            .barrier()
    }

    /// Publish the live count for `key`. The caller holds the `remote` guard,
    /// so counts are set in the order the map changed.
    fn refresh_signal(&self, remote: &RemoteMap, key: &SubKey) {
        if let Some(signal) = self.signals.read().get(key) {
            signal.set(remote.get(key).map_or(0, HashMap::len));
        }
    }

    fn handle_frame(&self, frame: Frame) {
        if frame.credential != self.config.credential {
            debug!(from = frame.from_port, "dropping frame with foreign credential");
            return;
        }

        match frame.body {
            FrameBody::Subscribe { type_name, topic } => {
                let Ok(topic) = Topic::parse(&topic) else {
                    debug!(from = frame.from_port, %topic, "ignoring subscription to malformed topic");
                    return;
                };
                let key = (type_name, topic);
                let mut remote = self.remote.write();
                let is_new = remote
                    .entry(key.clone())
                    .or_default()
                    .insert(frame.from_port, Instant::now())
                    .is_none();
                if is_new {
                    debug!(from = frame.from_port, topic = %key.1, "remote reader matched");
                    self.refresh_signal(&remote, &key);
                }
            }
            FrameBody::Unsubscribe { type_name, topic } => {
                let Ok(topic) = Topic::parse(&topic) else {
                    return;
                };
                let key = (type_name, topic);
                let mut remote = self.remote.write();
                let removed = remote
                    .get_mut(&key)
                    .and_then(|ports| ports.remove(&frame.from_port))
                    .is_some();
                if removed {
                    debug!(from = frame.from_port, topic = %key.1, "remote reader unmatched");
                    self.refresh_signal(&remote, &key);
                }
            }
            FrameBody::Data {
                type_name,
                topic,
                seq,
                payload,
            } => {
                let Ok(topic) = Topic::parse(&topic) else {
                    return;
                };
                let key = (type_name, topic);
                let local = self.local.read();
                let Some(readers) = local.get(&key) else {
                    trace!(from = frame.from_port, topic = %key.1, "no local reader, dropping data");
                    return;
                };
                trace!(from = frame.from_port, topic = %key.1, seq, "data received");
                for (id, sink) in readers {
                    if sink.deliver(payload.clone()).is_err() {
                        trace!(topic = %key.1, reader = id, "reader queue closed, skipping");
                    }
                }
            }
        }
    }

    /// Drop remote subscriptions not refreshed within the TTL.
    fn expire_stale(&self) {
        let ttl = self.config.subscription_ttl;
        let mut remote = self.remote.write();
        let mut expired = Vec::new();
        for (key, ports) in remote.iter_mut() {
            let before = ports.len();
            ports.retain(|_, seen| seen.elapsed() < ttl);
            if ports.len() != before {
                expired.push(key.clone());
            }
        }
        for key in expired {
            debug!(topic = %key.1, "remote subscription expired");
            self.refresh_signal(&remote, &key);
        }
    }

    fn local_keys(&self) -> Vec<SubKey> {
        self.local.read().keys().cloned().collect()
    }

    fn publish_targets(&self, key: &SubKey) -> Vec<u16> {
        let mut targets: Vec<u16> = self
            .remote
            .read()
            .get(key)
            .map(|ports| ports.keys().copied().collect())
            .unwrap_or_default();
        // Per-peer topics name their owner, so they are reachable before discovery.
        if let Some(owner) = key.1.port() {
            if !targets.contains(&owner) {
                targets.push(owner);
            }
        }
        targets
    }

    async fn send_to_all(&self, bytes: &[u8], ports: &[u16]) -> Result<(), ChannelError> {
        let mut last_error = None;
        let mut delivered = 0usize;
        for &port in ports {
            match self.socket.send_to(bytes, self.addr(port)).await {
                Ok(_) => delivered += 1,
                Err(e) => {
                    trace!(port, error = %e, "send failed");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if delivered == 0 => Err(ChannelError::Io(e)),
            _ => Ok(()),
        }
    }

    async fn announce(&self, key: &SubKey) -> Result<(), ChannelError> {
        let bytes = self
            .frame(FrameBody::Subscribe {
                type_name: key.0.clone(),
                topic: key.1.to_string(),
            })
            .encode()?;
        self.send_to_all(&bytes, &self.config.peer_ports).await
    }

    async fn announce_all(&self) {
        for key in self.local_keys() {
            if let Err(e) = self.announce(&key).await {
                debug!(topic = %key.1, error = %e, "subscription announce failed");
            }
        }
    }

    fn remove_reader(&self, key: &SubKey, id: u64) {
        let last_reader_gone = {
            let mut local = self.local.write();
            let Some(readers) = local.get_mut(key) else {
                return;
            };
            readers.retain(|(reader, _)| *reader != id);
            if readers.is_empty() {
                local.remove(key);
                true
            } else {
                false
            }
        };

        if last_reader_gone {
            let frame = self.frame(FrameBody::Unsubscribe {
                type_name: key.0.clone(),
                topic: key.1.to_string(),
            });
            let Ok(bytes) = frame.encode() else {
                return;
            };
            for &port in &self.config.peer_ports {
                if let Err(e) = self.socket.try_send_to(&bytes, self.addr(port)) {
                    trace!(port, error = %e, "unsubscribe send failed");
                }
            }
        }
    }
}

async fn recv_loop(inner: Arc<Inner>) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let (len, from) = match inner.socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                warn!(error = %e, "datagram receive failed");
                continue;
            }
        };
        let Some(bytes) = buf.get(..len) else {
            continue;
        };
        match Frame::decode(bytes) {
            Ok(frame) => inner.handle_frame(frame),
            Err(e) => debug!(%from, error = %e, "dropping undecodable datagram"),
        }
    }
}

async fn announce_loop(inner: Arc<Inner>) {
    let mut ticker = tokio::time::interval(inner.config.announce_interval);
    loop {
        ticker.tick().await;
        inner.announce_all().await;
        inner.expire_stale();
    }
}

/// Aborts the background loops once the last transport clone is gone.
#[derive(Debug)]
struct Tasks(Vec<JoinHandle<()>>);

impl Drop for Tasks {
    fn drop(&mut self) {
        for task in &self.0 {
            task.abort();
        }
    }
}

/// UDP [`Transport`]. Cheap to clone; clones share the socket.
#[derive(Debug, Clone)]
pub struct UdpTransport {
    inner: Arc<Inner>,
    _tasks: Arc<Tasks>,
}

impl UdpTransport {
    /// Bind the local socket and start the receive and announce loops.
    ///
    /// Must be called within a tokio runtime.
    pub async fn bind(config: UdpConfig) -> Result<Self, ChannelError> {
        config.validate()?;
        let socket = UdpSocket::bind(SocketAddr::new(config.host, config.local_port)).await?;
        debug!(addr = ?socket.local_addr().ok(), peers = config.peer_ports.len(), "udp transport bound");

        let inner = Arc::new(Inner {
            config,
            socket,
            local: RwLock::new(HashMap::new()),
            remote: RwLock::new(HashMap::new()),
            signals: RwLock::new(HashMap::new()),
            next_reader: AtomicU64::new(0),
        });

        let tasks = Tasks(vec![
            tokio::spawn(recv_loop(inner.clone())),
            tokio::spawn(announce_loop(inner.clone())),
        ]);

        Ok(Self {
            inner,
            _tasks: Arc::new(tasks),
        })
    }

    /// Live remote subscribers of `topic` for `type_name`.
    pub fn remote_subscribers(&self, type_name: &str, topic: &Topic) -> usize {
        self.inner
            .remote
            .read()
            .get(&sub_key(type_name, topic))
            .map_or(0, HashMap::len)
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn create_writer(
        &self,
        type_name: &str,
        topic: &Topic,
    ) -> Result<Box<dyn ChannelWriter>, ChannelError> {
        let key = sub_key(type_name, topic);
        let discovery = self.inner.signal(&key);
        debug!(%topic, "udp writer created");

        Ok(Box::new(UdpWriter {
            key,
            inner: self.inner.clone(),
            discovery,
            seq: AtomicU64::new(0),
        }))
    }

    async fn create_reader(
        &self,
        type_name: &str,
        topic: &Topic,
        sink: InboundSink,
    ) -> Result<Box<dyn ChannelReader>, ChannelError> {
        let key = sub_key(type_name, topic);
        let id = self.inner.next_reader.fetch_add(1, Ordering::Relaxed);
        self.inner
            .local
            .write()
            .entry(key.clone())
            .or_default()
            .push((id, sink));

        let reader = UdpReader {
            key,
            id,
            inner: self.inner.clone(),
        };
        // Dropping `reader` on error unregisters it again.
        self.inner.announce(&reader.key).await?;
        debug!(%topic, "udp reader created");

        Ok(Box::new(reader))
    }
}

#[derive(Debug)]
struct UdpWriter {
    key: SubKey,
    inner: Arc<Inner>,
    discovery: DiscoveryBarrier,
    seq: AtomicU64,
}

#[async_trait]
impl ChannelWriter for UdpWriter {
    fn topic(&self) -> &Topic {
        &self.key.1
    }

    async fn publish(&self, payload: &str) -> Result<(), ChannelError> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let bytes = self
            .inner
            .frame(FrameBody::Data {
                type_name: self.key.0.clone(),
                topic: self.key.1.to_string(),
                seq,
                payload: payload.to_owned(),
            })
            .encode()?;

        let targets = self.inner.publish_targets(&self.key);
        trace!(topic = %self.key.1, seq, targets = targets.len(), "publishing");
        self.inner.send_to_all(&bytes, &targets).await
    }

    fn discovery(&self) -> DiscoveryBarrier {
        self.discovery.clone()
    }
}

#[derive(Debug)]
struct UdpReader {
    key: SubKey,
    id: u64,
    inner: Arc<Inner>,
}

impl ChannelReader for UdpReader {
    fn topic(&self) -> &Topic {
        &self.key.1
    }
}

impl Drop for UdpReader {
    fn drop(&mut self) {
        self.inner.remove_reader(&self.key, self.id);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use peerlink_channel::InboundQueue;

    use super::*;

    const TYPE: &str = "Adapter";
    const WAIT: Duration = Duration::from_secs(5);

    fn config(base: u16, index: u16, count: u16) -> UdpConfig {
        UdpConfig {
            announce_interval: Duration::from_millis(50),
            subscription_ttl: Duration::from_millis(400),
            ..UdpConfig::localhost(base, index, count)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_broadcast_between_two_instances() {
        let a = UdpTransport::bind(config(46_310, 0, 2)).await.unwrap();
        let b = UdpTransport::bind(config(46_310, 1, 2)).await.unwrap();

        let mut queue = InboundQueue::new();
        let _reader = b.create_reader(TYPE, &Topic::broadcast(), queue.sink()).await.unwrap();

        let writer = a.create_writer(TYPE, &Topic::broadcast()).await.unwrap();
        writer.discovery().wait_timeout(WAIT).await.unwrap();
        writer.publish("peer/46310").await.unwrap();

        let received = tokio::time::timeout(WAIT, queue.pop()).await.unwrap();
        assert_eq!(received.as_deref(), Some("peer/46310"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_peer_topic_reachable_without_discovery() {
        let a = UdpTransport::bind(config(46_320, 0, 2)).await.unwrap();
        let b = UdpTransport::bind(config(46_320, 1, 2)).await.unwrap();

        let mut queue = InboundQueue::new();
        let topic = Topic::parse("peer/46321").unwrap();
        let _reader = b.create_reader(TYPE, &topic, queue.sink()).await.unwrap();

        let writer = a.create_writer(TYPE, &topic).await.unwrap();
        writer.publish("direct").await.unwrap();

        let received = tokio::time::timeout(WAIT, queue.pop()).await.unwrap();
        assert_eq!(received.as_deref(), Some("direct"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_foreign_credential_never_matches() {
        let a = UdpTransport::bind(config(46_330, 0, 2)).await.unwrap();
        let b = UdpTransport::bind(UdpConfig {
            credential: "someone else".to_owned(),
            ..config(46_330, 1, 2)
        })
        .await
        .unwrap();

        let queue = InboundQueue::new();
        let _reader = b.create_reader(TYPE, &Topic::broadcast(), queue.sink()).await.unwrap();

        let writer = a.create_writer(TYPE, &Topic::broadcast()).await.unwrap();
        let result = writer.discovery().wait_timeout(Duration::from_millis(300)).await;
        assert!(matches!(result, Err(ChannelError::DiscoveryTimeout(_))));
        assert_eq!(a.remote_subscribers(TYPE, &Topic::broadcast()), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reader_drop_unmatches_remote_writer() {
        let a = UdpTransport::bind(config(46_340, 0, 2)).await.unwrap();
        let b = UdpTransport::bind(config(46_340, 1, 2)).await.unwrap();

        let queue = InboundQueue::new();
        let reader = b.create_reader(TYPE, &Topic::broadcast(), queue.sink()).await.unwrap();
        let writer = a.create_writer(TYPE, &Topic::broadcast()).await.unwrap();
        writer.discovery().wait_timeout(WAIT).await.unwrap();

        drop(reader);
        let unmatched = tokio::time::timeout(WAIT, async {
            while writer.matched_count() > 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(unmatched.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_silent_peer_expires() {
        let a = UdpTransport::bind(config(46_360, 0, 2)).await.unwrap();
        let b = UdpTransport::bind(config(46_360, 1, 2)).await.unwrap();

        let queue = InboundQueue::new();
        let reader = b.create_reader(TYPE, &Topic::broadcast(), queue.sink()).await.unwrap();
        let writer = a.create_writer(TYPE, &Topic::broadcast()).await.unwrap();
        writer.discovery().wait_timeout(WAIT).await.unwrap();

        // No unsubscribe is sent; only the TTL can unmatch `b`.
        std::mem::forget(reader);
        drop(b);

        let expired = tokio::time::timeout(WAIT, async {
            while writer.matched_count() > 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(expired.is_ok());
        assert_eq!(a.remote_subscribers(TYPE, &Topic::broadcast()), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_late_writer_starts_matched() {
        let a = UdpTransport::bind(config(46_370, 0, 2)).await.unwrap();
        let b = UdpTransport::bind(config(46_370, 1, 2)).await.unwrap();

        let queue = InboundQueue::new();
        let _reader = b.create_reader(TYPE, &Topic::broadcast(), queue.sink()).await.unwrap();

        let heard = tokio::time::timeout(WAIT, async {
            while a.remote_subscribers(TYPE, &Topic::broadcast()) == 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(heard.is_ok());

        let writer = a.create_writer(TYPE, &Topic::broadcast()).await.unwrap();
        assert_eq!(writer.matched_count(), 1);
    }

    #[tokio::test]
    async fn test_bind_rejects_zero_announce_interval() {
        let result = UdpTransport::bind(UdpConfig {
            announce_interval: Duration::ZERO,
            ..config(46_380, 0, 1)
        })
        .await;
        assert!(matches!(result, Err(ChannelError::Rejected(_))));
    }
}

//! In-process transport.
//!
//! Every reader of a topic receives every payload published on it, including
//! readers that belong to the publishing instance. A writer's matched count is
//! the number of live readers of its topic.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use peerlink_topic::Topic;
use tracing::trace;

use crate::{
    ChannelError, ChannelReader, ChannelWriter, DiscoveryBarrier, InboundSink, MatchSignal,
    Transport,
};

#[derive(Debug)]
struct TopicState {
    type_name: String,
    readers: Vec<(u64, InboundSink)>,
    matched: MatchSignal,
}

impl TopicState {
    fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_owned(),
            readers: Vec::new(),
            matched: MatchSignal::new(),
        }
    }
}

#[derive(Debug, Default)]
struct BusInner {
    topics: RwLock<HashMap<Topic, TopicState>>,
    next_reader: AtomicU64,
    closed: AtomicBool,
}

impl BusInner {
    fn check_open(&self) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::Acquire) {
            Err(ChannelError::Closed)
        } else {
            Ok(())
        }
    }

    /// Run `f` on the topic's state, registering it with `type_name` if new.
    fn with_topic<R>(
        &self,
        type_name: &str,
        topic: &Topic,
        f: impl FnOnce(&mut TopicState) -> R,
    ) -> Result<R, ChannelError> {
        let mut topics = self.topics.write();
        let state = topics
            .entry(topic.clone())
            .or_insert_with(|| TopicState::new(type_name));
        if state.type_name != type_name {
            return Err(ChannelError::Rejected(format!(
                "topic {topic} is registered with type {}, not {type_name}",
                state.type_name
            )));
        }
        Ok(f(state))
    }
}

/// Shared in-memory pub/sub bus. Clones share the same topics.
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    inner: Arc<BusInner>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live readers of `topic`.
    pub fn reader_count(&self, topic: &Topic) -> usize {
        self.inner
            .topics
            .read()
            .get(topic)
            .map_or(0, |state| state.readers.len())
    }

    /// Fail every subsequent endpoint creation and publish with
    /// [`ChannelError::Closed`].
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Transport for MemoryBus {
    async fn create_writer(
        &self,
        type_name: &str,
        topic: &Topic,
    ) -> Result<Box<dyn ChannelWriter>, ChannelError> {
        self.inner.check_open()?;
        let discovery = self
            .inner
            .with_topic(type_name, topic, |state| state.matched.barrier())?;
        trace!(%topic, "memory writer created");

        Ok(Box::new(MemoryWriter {
            topic: topic.clone(),
            inner: self.inner.clone(),
            discovery,
            index: AtomicU64::new(0),
        }))
    }

    async fn create_reader(
        &self,
        type_name: &str,
        topic: &Topic,
        sink: InboundSink,
    ) -> Result<Box<dyn ChannelReader>, ChannelError> {
        self.inner.check_open()?;
        let id = self.inner.next_reader.fetch_add(1, Ordering::Relaxed);
        self.inner.with_topic(type_name, topic, |state| {
            state.readers.push((id, sink));
            state.matched.matched();
        })?;
        trace!(%topic, id, "memory reader created");

        Ok(Box::new(MemoryReader {
            topic: topic.clone(),
            id,
            inner: self.inner.clone(),
        }))
    }
}

#[derive(Debug)]
struct MemoryWriter {
    topic: Topic,
    inner: Arc<BusInner>,
    discovery: DiscoveryBarrier,
    index: AtomicU64,
}

#[async_trait]
impl ChannelWriter for MemoryWriter {
    fn topic(&self) -> &Topic {
        &self.topic
    }

    async fn publish(&self, payload: &str) -> Result<(), ChannelError> {
        self.inner.check_open()?;
        let index = self.index.fetch_add(1, Ordering::Relaxed);

        let topics = self.inner.topics.read();
        let Some(state) = topics.get(&self.topic) else {
            return Ok(());
        };
        for (id, sink) in &state.readers {
            if sink.deliver(payload.to_owned()).is_err() {
                trace!(topic = %self.topic, reader = id, "reader queue closed, skipping");
            }
        }
        trace!(topic = %self.topic, index, readers = state.readers.len(), "published");
        Ok(())
    }

    fn discovery(&self) -> DiscoveryBarrier {
        self.discovery.clone()
    }
}

#[derive(Debug)]
struct MemoryReader {
    topic: Topic,
    id: u64,
    inner: Arc<BusInner>,
}

impl ChannelReader for MemoryReader {
    fn topic(&self) -> &Topic {
        &self.topic
    }
}

impl Drop for MemoryReader {
    fn drop(&mut self) {
        let mut topics = self.inner.topics.write();
        if let Some(state) = topics.get_mut(&self.topic) {
            state.readers.retain(|(id, _)| *id != self.id);
            state.matched.unmatched();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::InboundQueue;

    const TYPE: &str = "Adapter";

    fn topic(s: &str) -> Topic {
        Topic::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_publish_reaches_all_readers() {
        let bus = MemoryBus::new();
        let mut q1 = InboundQueue::new();
        let mut q2 = InboundQueue::new();

        let _r1 = bus.create_reader(TYPE, &Topic::broadcast(), q1.sink()).await.unwrap();
        let _r2 = bus.create_reader(TYPE, &Topic::broadcast(), q2.sink()).await.unwrap();
        let writer = bus.create_writer(TYPE, &Topic::broadcast()).await.unwrap();

        assert_eq!(writer.matched_count(), 2);
        writer.publish("peer/6000").await.unwrap();

        assert_eq!(q1.drain(), vec!["peer/6000"]);
        assert_eq!(q2.drain(), vec!["peer/6000"]);
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let bus = MemoryBus::new();
        let mut queue = InboundQueue::new();
        let _reader = bus.create_reader(TYPE, &topic("peer/1"), queue.sink()).await.unwrap();

        let other = bus.create_writer(TYPE, &topic("peer/2")).await.unwrap();
        other.publish("not for you").await.unwrap();
        assert_eq!(other.matched_count(), 0);
        assert!(queue.drain().is_empty());
    }

    #[tokio::test]
    async fn test_writer_waits_for_late_reader() {
        let bus = MemoryBus::new();
        let writer = bus.create_writer(TYPE, &Topic::broadcast()).await.unwrap();
        let barrier = writer.discovery();
        let waiter = tokio::spawn(async move { barrier.wait().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        let queue = InboundQueue::new();
        let _reader = bus.create_reader(TYPE, &Topic::broadcast(), queue.sink()).await.unwrap();
        assert_eq!(waiter.await.unwrap().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reader_drop_unmatches() {
        let bus = MemoryBus::new();
        let queue = InboundQueue::new();
        let writer = bus.create_writer(TYPE, &topic("peer/7")).await.unwrap();

        let reader = bus.create_reader(TYPE, &topic("peer/7"), queue.sink()).await.unwrap();
        assert_eq!(reader.topic().as_str(), "peer/7");
        assert_eq!(writer.matched_count(), 1);
        assert_eq!(bus.reader_count(&topic("peer/7")), 1);

        drop(reader);
        assert_eq!(writer.matched_count(), 0);
        assert_eq!(bus.reader_count(&topic("peer/7")), 0);
    }

    #[tokio::test]
    async fn test_type_mismatch_rejected() {
        let bus = MemoryBus::new();
        let _writer = bus.create_writer(TYPE, &Topic::broadcast()).await.unwrap();
        let result = bus.create_writer("Other", &Topic::broadcast()).await;
        assert!(matches!(result, Err(ChannelError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_closed_bus_fails() {
        let bus = MemoryBus::new();
        let writer = bus.create_writer(TYPE, &Topic::broadcast()).await.unwrap();
        bus.close();

        assert!(bus.is_closed());
        assert!(matches!(writer.publish("x").await, Err(ChannelError::Closed)));
        assert!(matches!(
            bus.create_writer(TYPE, &Topic::broadcast()).await,
            Err(ChannelError::Closed)
        ));
    }
}

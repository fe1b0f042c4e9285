//! Transport traits.

use std::fmt::Debug;

use async_trait::async_trait;
use peerlink_topic::Topic;

use crate::{ChannelError, DiscoveryBarrier, InboundSink};

/// Publishing endpoint bound to one topic.
#[async_trait]
pub trait ChannelWriter: Send + Sync + Debug {
    fn topic(&self) -> &Topic;

    /// Publish an opaque string payload to every matched reader.
    async fn publish(&self, payload: &str) -> Result<(), ChannelError>;

    /// Barrier fed by this writer's matched-reader count.
    fn discovery(&self) -> DiscoveryBarrier;

    fn matched_count(&self) -> usize {
        self.discovery().matched_count()
    }

    /// Block until at least one reader has matched.
    async fn await_at_least_one_match(&self) -> Result<usize, ChannelError> {
        self.discovery().wait().await
    }
}

/// Subscription to one topic. Dropping it unsubscribes.
pub trait ChannelReader: Send + Sync + Debug {
    fn topic(&self) -> &Topic;
}

/// Factory for channel endpoints.
///
/// `type_name` names the payload type registered for the topic; endpoints only
/// match when both the topic and the type name agree.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn create_writer(
        &self,
        type_name: &str,
        topic: &Topic,
    ) -> Result<Box<dyn ChannelWriter>, ChannelError>;

    async fn create_reader(
        &self,
        type_name: &str,
        topic: &Topic,
        sink: InboundSink,
    ) -> Result<Box<dyn ChannelReader>, ChannelError>;
}

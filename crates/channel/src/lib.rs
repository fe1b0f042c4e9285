//! Pub/sub channel contract consumed by the routing layer.
//!
//! A [`Transport`] creates named endpoints: a [`ChannelWriter`] publishes string
//! payloads to a topic, a [`ChannelReader`] delivers inbound payloads of a topic
//! into an [`InboundSink`]. Delivery is best-effort and at-least-once per matched
//! reader, with no ordering across topics.
//!
//! Writers expose a [`DiscoveryBarrier`] fed by the transport's matched-reader
//! count, so callers can hold back until somebody is listening.
//!
//! [`MemoryBus`] is an in-process transport for tests and single-process meshes.

pub mod barrier;
pub mod error;
pub mod memory;
pub mod queue;
pub mod traits;

pub use barrier::{DiscoveryBarrier, MatchSignal};
pub use error::ChannelError;
pub use memory::MemoryBus;
pub use queue::{InboundQueue, InboundSink};
pub use traits::{ChannelReader, ChannelWriter, Transport};

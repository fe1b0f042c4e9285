//! Topic naming and peer admission for the peerlink overlay.
//!
//! Every instance owns one peer topic (`peer/<id>`) and shares the well-known
//! [`BROADCAST_TOPIC`] with all other instances. Instances announce their own
//! topic on the broadcast channel; listeners run [`decide`] on what they hear to
//! choose which announcements become peers.

pub mod admission;
pub mod identity;
pub mod topic;

pub use admission::{Admission, DeclineReason, PeerAdmission, decide, evaluate};
pub use identity::InstanceIdentity;
pub use topic::{
    BROADCAST_TOPIC, PEER_TOPIC_PREFIX, Topic, TopicError, is_well_formed_peer_topic, local_topic,
};

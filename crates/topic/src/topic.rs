//! Topic strings and the naming convention shared by every instance.
//!
//! Grammar (wire-visible):
//!
//! ```text
//! topic      = "broadcast" | peer-topic
//! peer-topic = "peer/" DIGIT+
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::InstanceIdentity;

/// The single topic every instance publishes and subscribes to.
pub const BROADCAST_TOPIC: &str = "broadcast";

/// Prefix of every per-instance topic.
pub const PEER_TOPIC_PREFIX: &str = "peer/";

/// Error parsing a topic string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicError {
    #[error("Malformed topic: {0:?}")]
    Malformed(String),
}

/// Returns `true` iff `s` matches `^peer/[0-9]+$`.
///
/// `"broadcast"` is not a peer topic.
pub fn is_well_formed_peer_topic(s: &str) -> bool {
    s.strip_prefix(PEER_TOPIC_PREFIX)
        .is_some_and(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
}

/// Topic owned by the instance with the given identity (`"peer/" + identity`).
pub fn local_topic(identity: &InstanceIdentity) -> Topic {
    Topic::local(identity)
}

/// A pub/sub topic name.
///
/// Derived deterministically from an identity or parsed from the wire; never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// The shared broadcast topic.
    pub fn broadcast() -> Self {
        Self(BROADCAST_TOPIC.to_owned())
    }

    /// The peer topic for `identity`.
    ///
    /// Total: an identity that is not all digits still yields a topic, it just
    /// will not pass [`is_well_formed_peer_topic`] on the receiving side.
    pub fn local(identity: &InstanceIdentity) -> Self {
        Self(format!("{PEER_TOPIC_PREFIX}{identity}"))
    }

    /// Parse a topic received from the wire, enforcing the grammar.
    pub fn parse(s: &str) -> Result<Self, TopicError> {
        if s == BROADCAST_TOPIC || is_well_formed_peer_topic(s) {
            Ok(Self(s.to_owned()))
        } else {
            Err(TopicError::Malformed(s.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == BROADCAST_TOPIC
    }

    pub fn is_peer(&self) -> bool {
        is_well_formed_peer_topic(&self.0)
    }

    /// Numeric part of a well-formed peer topic.
    pub fn peer_id(&self) -> Option<&str> {
        if self.is_peer() {
            self.0.strip_prefix(PEER_TOPIC_PREFIX)
        } else {
            None
        }
    }

    /// Port encoded in a peer topic, if it fits in a `u16`.
    pub fn port(&self) -> Option<u16> {
        self.peer_id()?.parse().ok()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Topic {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Topic {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&InstanceIdentity> for Topic {
    fn from(identity: &InstanceIdentity) -> Self {
        Self::local(identity)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_local_topic() {
        let topic = local_topic(&InstanceIdentity::from_port(6000));
        assert_eq!(topic.as_str(), "peer/6000");
        assert!(topic.is_peer());
        assert_eq!(topic.port(), Some(6000));
        assert_eq!(topic.peer_id(), Some("6000"));
    }

    #[test]
    fn test_local_topic_is_total() {
        let topic = local_topic(&InstanceIdentity::new("abc"));
        assert_eq!(topic.as_str(), "peer/abc");
        assert!(!topic.is_peer());
        assert_eq!(topic.port(), None);
    }

    #[test]
    fn test_well_formed_peer_topic() {
        assert!(is_well_formed_peer_topic("peer/7"));
        assert!(is_well_formed_peer_topic("peer/0006000"));

        assert!(!is_well_formed_peer_topic("broadcast"));
        assert!(!is_well_formed_peer_topic("peer/"));
        assert!(!is_well_formed_peer_topic("peer"));
        assert!(!is_well_formed_peer_topic("peerX"));
        assert!(!is_well_formed_peer_topic("peer/abc"));
        assert!(!is_well_formed_peer_topic("peer/12a"));
        assert!(!is_well_formed_peer_topic("peer/-1"));
        assert!(!is_well_formed_peer_topic(" peer/1"));
        assert!(!is_well_formed_peer_topic("peer/1\n"));
        assert!(!is_well_formed_peer_topic("peer/１"));
        assert!(!is_well_formed_peer_topic(""));
    }

    #[test]
    fn test_parse() {
        assert_eq!(Topic::parse("broadcast"), Ok(Topic::broadcast()));
        assert!(Topic::parse("broadcast").is_ok_and(|t| t.is_broadcast()));
        assert_eq!(
            "peer/42".parse::<Topic>().map(|t| t.into_string()),
            Ok("peer/42".to_owned())
        );
        assert_eq!(
            Topic::parse("peer/x"),
            Err(TopicError::Malformed("peer/x".to_owned()))
        );
    }

    #[test]
    fn test_port_overflow() {
        let topic = Topic::parse("peer/70000").unwrap();
        assert!(topic.is_peer());
        assert_eq!(topic.port(), None);
    }

    #[test]
    fn test_borrow_lookup() {
        let mut map = HashMap::new();
        map.insert(Topic::parse("peer/7").unwrap(), 1);
        assert_eq!(map.get("peer/7"), Some(&1));
        assert_eq!(map.get("peer/8"), None);
    }
}

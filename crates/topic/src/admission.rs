//! Peer admission policy.
//!
//! Pure and independent of any registry state: the same `(local, candidate)`
//! pair always yields the same verdict. Whether an already-accepted peer is
//! accepted again is the caller's business.

use crate::topic::{Topic, is_well_formed_peer_topic};

/// Verdict for a candidate topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Admission {
    Accept,
    Decline,
}

impl Admission {
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// Why a candidate was declined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum DeclineReason {
    /// The candidate is our own topic (broadcast loopback).
    #[strum(to_string = "own topic")]
    SelfTopic,
    /// The candidate is not a `peer/<digits>` topic.
    #[strum(to_string = "not a peer topic")]
    Malformed,
}

/// Decide whether `candidate` should be accepted as a peer of `local`.
pub fn decide(local: &Topic, candidate: &str) -> Admission {
    match evaluate(local, candidate) {
        Ok(()) => Admission::Accept,
        Err(_) => Admission::Decline,
    }
}

/// Same as [`decide`], keeping the reason for a decline.
pub fn evaluate(local: &Topic, candidate: &str) -> Result<(), DeclineReason> {
    if candidate == local.as_str() {
        Err(DeclineReason::SelfTopic)
    } else if is_well_formed_peer_topic(candidate) {
        Ok(())
    } else {
        Err(DeclineReason::Malformed)
    }
}

/// Admission policy bound to the local instance's topic.
#[derive(Debug, Clone)]
pub struct PeerAdmission {
    local: Topic,
}

impl PeerAdmission {
    pub fn new(local: Topic) -> Self {
        Self { local }
    }

    pub fn local(&self) -> &Topic {
        &self.local
    }

    pub fn decide(&self, candidate: &str) -> Admission {
        decide(&self.local, candidate)
    }

    pub fn evaluate(&self, candidate: &str) -> Result<(), DeclineReason> {
        evaluate(&self.local, candidate)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{InstanceIdentity, local_topic};

    fn local() -> Topic {
        local_topic(&InstanceIdentity::from_port(6000))
    }

    #[test]
    fn test_grammar_enforcement() {
        let local = local();
        assert_eq!(decide(&local, "broadcast"), Admission::Decline);
        assert_eq!(decide(&local, "peer/7"), Admission::Accept);
        assert_eq!(decide(&local, "peerX"), Admission::Decline);
        assert_eq!(decide(&local, "peer/abc"), Admission::Decline);
        assert_eq!(decide(&local, ""), Admission::Decline);
    }

    #[test]
    fn test_self_rejection() {
        let local = local();
        assert_eq!(decide(&local, "peer/6000"), Admission::Decline);
        assert_eq!(evaluate(&local, "peer/6000"), Err(DeclineReason::SelfTopic));
        assert_eq!(evaluate(&local, "hello"), Err(DeclineReason::Malformed));
    }

    #[test]
    fn test_verdict_display() {
        assert_eq!(Admission::Accept.to_string(), "accept");
        assert_eq!(Admission::Decline.as_ref(), "decline");
        assert_eq!(DeclineReason::SelfTopic.to_string(), "own topic");
    }

    #[test]
    fn test_bound_policy() {
        let policy = PeerAdmission::new(local());
        assert_eq!(policy.local().as_str(), "peer/6000");
        assert!(policy.decide("peer/6001").is_accept());
        assert!(!policy.decide("peer/6000").is_accept());
    }

    proptest! {
        #[test]
        fn test_decide_is_deterministic(port in any::<u16>(), candidate in ".*") {
            let local = local_topic(&InstanceIdentity::from_port(port));
            prop_assert_eq!(decide(&local, &candidate), decide(&local, &candidate));
        }

        #[test]
        fn test_own_topic_always_declined(port in any::<u16>()) {
            let local = local_topic(&InstanceIdentity::from_port(port));
            prop_assert_eq!(decide(&local, local.as_str()), Admission::Decline);
        }

        #[test]
        fn test_foreign_peer_topics_accepted(local in any::<u16>(), other in "[0-9]{1,8}") {
            let local = local_topic(&InstanceIdentity::from_port(local));
            let candidate = format!("peer/{other}");
            prop_assume!(candidate != local.as_str());
            prop_assert_eq!(decide(&local, &candidate), Admission::Accept);
        }

        #[test]
        fn test_non_peer_topics_declined(port in any::<u16>(), candidate in "[^p].*") {
            let local = local_topic(&InstanceIdentity::from_port(port));
            prop_assert_eq!(decide(&local, &candidate), Admission::Decline);
        }
    }
}

//! Control messages carried from the foreground loop to the routing handler.

use std::str::FromStr;

use peerlink_topic::Topic;

use crate::RoutingError;

/// Tag in the first slot of a [`ControlFrame`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum ControlTag {
    Broadcast,
    Accept,
    Direct,
    Shutdown,
}

/// A command for the routing handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Publish `payload` on the broadcast topic.
    Broadcast { payload: String },
    /// Create a writer for a newly accepted peer.
    Accept { peer: Topic },
    /// Publish `payload` on an accepted peer's topic.
    Direct { peer: Topic, payload: String },
    /// Stop the background service.
    Shutdown,
}

impl ControlMessage {
    pub fn tag(&self) -> ControlTag {
        match self {
            Self::Broadcast { .. } => ControlTag::Broadcast,
            Self::Accept { .. } => ControlTag::Accept,
            Self::Direct { .. } => ControlTag::Direct,
            Self::Shutdown => ControlTag::Shutdown,
        }
    }

    pub fn into_frame(self) -> ControlFrame {
        ControlFrame::from(self)
    }
}

/// Wire shape of a control command: `[tag, ...args]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFrame(Vec<String>);

impl ControlFrame {
    pub fn new(parts: Vec<String>) -> Self {
        Self(parts)
    }

    pub fn tag(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn args(&self) -> &[String] {
        self.0.get(1..).unwrap_or_default()
    }

    pub fn into_parts(self) -> Vec<String> {
        self.0
    }
}

impl<S: Into<String>> FromIterator<S> for ControlFrame {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<ControlMessage> for ControlFrame {
    fn from(message: ControlMessage) -> Self {
        let tag = message.tag().to_string();
        match message {
            ControlMessage::Broadcast { payload } => Self(vec![tag, payload]),
            ControlMessage::Accept { peer } => Self(vec![tag, peer.into_string()]),
            ControlMessage::Direct { peer, payload } => {
                Self(vec![tag, peer.into_string(), payload])
            }
            ControlMessage::Shutdown => Self(vec![tag]),
        }
    }
}

fn peer_arg(raw: &str) -> Result<Topic, RoutingError> {
    Topic::parse(raw)
        .ok()
        .filter(Topic::is_peer)
        .ok_or_else(|| RoutingError::MalformedCommand(format!("not a peer topic: {raw:?}")))
}

impl TryFrom<ControlFrame> for ControlMessage {
    type Error = RoutingError;

    fn try_from(frame: ControlFrame) -> Result<Self, Self::Error> {
        let mut parts = frame.0.into_iter();
        let raw_tag = parts
            .next()
            .ok_or_else(|| RoutingError::MalformedCommand("empty frame".to_owned()))?;
        let tag = ControlTag::from_str(&raw_tag)
            .map_err(|_| RoutingError::MalformedCommand(format!("unknown tag {raw_tag:?}")))?;
        let args: Vec<String> = parts.collect();

        let message = match (tag, args.as_slice()) {
            (ControlTag::Broadcast, [payload]) => Self::Broadcast {
                payload: payload.clone(),
            },
            (ControlTag::Accept, [peer]) => Self::Accept {
                peer: peer_arg(peer)?,
            },
            (ControlTag::Direct, [peer, payload]) => Self::Direct {
                peer: peer_arg(peer)?,
                payload: payload.clone(),
            },
            (ControlTag::Shutdown, []) => Self::Shutdown,
            (tag, args) => {
                return Err(RoutingError::MalformedCommand(format!(
                    "{tag} does not take {} argument(s)",
                    args.len()
                )));
            }
        };
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(s: &str) -> Topic {
        Topic::parse(s).unwrap()
    }

    #[test]
    fn test_frame_shape() {
        let frame = ControlFrame::from(ControlMessage::Direct {
            peer: peer("peer/6001"),
            payload: "hi".to_owned(),
        });
        assert_eq!(frame.tag(), Some("direct"));
        assert_eq!(frame.args(), ["peer/6001", "hi"]);

        let frame = ControlFrame::from(ControlMessage::Shutdown);
        assert_eq!(frame.into_parts(), vec!["shutdown"]);
    }

    #[test]
    fn test_parse_each_kind() {
        let parse = |parts: &[&str]| ControlMessage::try_from(parts.iter().copied().collect::<ControlFrame>());

        assert_eq!(
            parse(&["broadcast", "peer/6000"]).unwrap(),
            ControlMessage::Broadcast {
                payload: "peer/6000".to_owned()
            }
        );
        assert_eq!(
            parse(&["accept", "peer/6001"]).unwrap(),
            ControlMessage::Accept {
                peer: peer("peer/6001")
            }
        );
        assert_eq!(
            parse(&["direct", "peer/6001", "hello"]).unwrap(),
            ControlMessage::Direct {
                peer: peer("peer/6001"),
                payload: "hello".to_owned()
            }
        );
        assert_eq!(parse(&["shutdown"]).unwrap(), ControlMessage::Shutdown);
    }

    #[test]
    fn test_malformed_frames() {
        let parse = |parts: &[&str]| ControlMessage::try_from(parts.iter().copied().collect::<ControlFrame>());

        for parts in [
            &[][..],
            &["exit"][..],
            &["Broadcast", "x"][..],
            &["broadcast"][..],
            &["accept", "broadcast"][..],
            &["accept", "peer/x"][..],
            &["direct", "peer/1"][..],
            &["shutdown", "now"][..],
        ] {
            assert!(
                matches!(parse(parts), Err(RoutingError::MalformedCommand(_))),
                "{parts:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_tag_strings() {
        assert_eq!(ControlTag::Accept.as_ref(), "accept");
        assert_eq!("direct".parse::<ControlTag>().unwrap(), ControlTag::Direct);
        assert!("DIRECT".parse::<ControlTag>().is_err());
    }
}

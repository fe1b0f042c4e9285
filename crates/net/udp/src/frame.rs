//! Wire frames.

use peerlink_channel::ChannelError;
use serde::{Deserialize, Serialize};

/// Largest frame accepted on the socket.
pub const MAX_DATAGRAM: usize = 65_507;

/// One datagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub credential: String,
    /// Port of the sending instance.
    pub from_port: u16,
    pub body: FrameBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameBody {
    /// The sender has a reader for `topic`.
    Subscribe { type_name: String, topic: String },
    /// The sender dropped its last reader for `topic`.
    Unsubscribe { type_name: String, topic: String },
    /// A published payload; `seq` counts per writer.
    Data {
        type_name: String,
        topic: String,
        seq: u64,
        payload: String,
    },
}

impl Frame {
    pub fn encode(&self) -> Result<Vec<u8>, ChannelError> {
        let bytes = postcard::to_allocvec(self).map_err(|e| ChannelError::Encode(e.to_string()))?;
        if bytes.len() > MAX_DATAGRAM {
            return Err(ChannelError::Encode(format!(
                "frame of {} bytes exceeds datagram limit",
                bytes.len()
            )));
        }
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ChannelError> {
        postcard::from_bytes(bytes).map_err(|e| ChannelError::Encode(e.to_string()))
    }
}

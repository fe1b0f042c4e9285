//! Per-process instance identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identity of one overlay instance, fixed at process start.
///
/// The launcher derives it from the instance's local port, but nothing in the
/// overlay interprets it beyond embedding it in the instance's peer topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceIdentity(String);

impl InstanceIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identity for the instance listening on `port`.
    pub fn from_port(port: u16) -> Self {
        Self(port.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u16> for InstanceIdentity {
    fn from(port: u16) -> Self {
        Self::from_port(port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_from_port() {
        let id = InstanceIdentity::from_port(6001);
        assert_eq!(id.as_str(), "6001");
        assert_eq!(id, InstanceIdentity::new("6001"));
        assert_eq!(id.to_string(), "6001");
    }
}

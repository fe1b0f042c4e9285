//! Router metrics.

use metrics::{Counter, Gauge};

#[derive(Clone, Debug)]
pub(crate) struct RouterMetrics {
    /// Broadcast commands dispatched.
    broadcast_total: Counter,
    /// Accept commands dispatched, including repeats.
    accept_total: Counter,
    /// Direct commands dispatched.
    direct_total: Counter,
    /// Frames dropped for an unknown tag or bad arguments.
    malformed_total: Counter,
    /// Direct commands naming a peer not in the registry.
    unknown_peer_total: Counter,
    /// Per-peer writers in the registry.
    peers: Gauge,
}

impl Default for RouterMetrics {
    fn default() -> Self {
        Self {
            broadcast_total: metrics::counter!("router.dispatch.broadcast_total"),
            accept_total: metrics::counter!("router.dispatch.accept_total"),
            direct_total: metrics::counter!("router.dispatch.direct_total"),
            malformed_total: metrics::counter!("router.dispatch.malformed_total"),
            unknown_peer_total: metrics::counter!("router.dispatch.unknown_peer_total"),
            peers: metrics::gauge!("router.peers"),
        }
    }
}

impl RouterMetrics {
    pub(crate) fn inc_broadcast(&self) {
        self.broadcast_total.increment(1);
    }

    pub(crate) fn inc_accept(&self) {
        self.accept_total.increment(1);
    }

    pub(crate) fn inc_direct(&self) {
        self.direct_total.increment(1);
    }

    pub(crate) fn inc_malformed(&self) {
        self.malformed_total.increment(1);
    }

    pub(crate) fn inc_unknown_peer(&self) {
        self.unknown_peer_total.increment(1);
    }

    pub(crate) fn set_peers(&self, count: usize) {
        self.peers.set(count as f64);
    }
}

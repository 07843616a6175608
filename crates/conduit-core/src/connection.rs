//! Typed edges between nodes.
//!
//! A [`Connection`] joins two nodes that are endpoints of their segments and
//! carries a [`ConnData`] payload describing how much may flow across it, in
//! which direction, and how the transported color is filtered on the way.
//! Identity is the endpoint pair alone: two connection records joining the
//! same `(from, to)` pair are interchangeable regardless of payload.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::id::NodeId;

/// The identity color filter: passes every channel unchanged.
pub const IDENTITY_FILTER: [f64; 4] = [1.0, 1.0, 1.0, 1.0];

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Per-connection payload supplied by the network type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnData {
    /// Maximum flow rate (energy per second). `f64::INFINITY` means unlimited.
    pub max_throughput: f64,
    /// Multiplicative 4-channel color filter applied to flow crossing the link.
    pub filter: [f64; 4],
    /// Whether flow may go both ways. One-way links only carry `from -> to`.
    pub bidirectional: bool,
}

impl Default for ConnData {
    fn default() -> Self {
        Self::lossless()
    }
}

impl ConnData {
    /// Unlimited, unfiltered, bidirectional. Qualifies for dissolving.
    pub fn lossless() -> Self {
        Self {
            max_throughput: f64::INFINITY,
            filter: IDENTITY_FILTER,
            bidirectional: true,
        }
    }

    /// Bidirectional, unfiltered, capped at `max_throughput` per second.
    pub fn limited(max_throughput: f64) -> Self {
        Self {
            max_throughput: max_throughput.max(0.0),
            ..Self::lossless()
        }
    }

    pub fn with_filter(mut self, filter: [f64; 4]) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_bidirectional(mut self, bidirectional: bool) -> Self {
        self.bidirectional = bidirectional;
        self
    }

    /// Restrict flow to the `from -> to` direction.
    pub fn one_way(self) -> Self {
        self.with_bidirectional(false)
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_throughput.is_infinite()
    }

    pub fn has_identity_filter(&self) -> bool {
        self.filter == IDENTITY_FILTER
    }

    /// True iff a link with this payload may be folded into a single segment
    /// instead of being kept as an explicit connection.
    pub fn can_dissolve(&self) -> bool {
        self.is_unlimited() && self.has_identity_filter()
    }

    /// Largest flow magnitude allowed over `dt` seconds.
    pub fn flow_limit(&self, dt: f64) -> f64 {
        if self.is_unlimited() {
            f64::INFINITY
        } else {
            self.max_throughput.max(0.0) * dt
        }
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Which end of a connection a segment sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkRole {
    From,
    To,
}

/// An edge between two nodes, possibly spanning two segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub from: NodeId,
    pub to: NodeId,
    pub data: ConnData,
}

impl Connection {
    pub fn new(from: NodeId, to: NodeId, data: ConnData) -> Self {
        Self { from, to, data }
    }

    pub fn touches(&self, node: NodeId) -> bool {
        self.from == node || self.to == node
    }

    /// The endpoint opposite `node`, if `node` is an endpoint.
    pub fn other(&self, node: NodeId) -> Option<NodeId> {
        if self.from == node {
            Some(self.to)
        } else if self.to == node {
            Some(self.from)
        } else {
            None
        }
    }

    /// Whether this connection joins `a` to `b`. Bidirectional connections
    /// also match the reversed pair.
    pub fn joins(&self, a: NodeId, b: NodeId) -> bool {
        (self.from == a && self.to == b)
            || (self.data.bidirectional && self.from == b && self.to == a)
    }
}

impl Connection {
    /// Endpoints in a fixed order, so `(a, b)` and `(b, a)` compare equal.
    fn endpoints(&self) -> (NodeId, NodeId) {
        if self.from <= self.to {
            (self.from, self.to)
        } else {
            (self.to, self.from)
        }
    }

    /// Whether `a` and `b` are this connection's endpoints, in either order.
    pub fn links_pair(&self, a: NodeId, b: NodeId) -> bool {
        (self.from == a && self.to == b) || (self.from == b && self.to == a)
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.endpoints() == other.endpoints()
    }
}

impl Eq for Connection {}

impl Hash for Connection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.endpoints().hash(state);
    }
}

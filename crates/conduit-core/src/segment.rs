//! Segments: contiguous ordered chains of nodes simulated as one unit.

use std::fmt;
use std::sync::Arc;

use crate::id::{ConnectionId, NodeId, NodeIdentity, SegmentId};
use crate::kind::{Injector, NetworkKind};

/// A registered node. Always owned by exactly one segment while registered.
#[derive(Debug, Clone)]
pub struct Node {
    pub identity: NodeIdentity,
    pub segment: SegmentId,
}

/// An ordered path of nodes plus every connection touching that path.
pub struct Segment<K: NetworkKind> {
    /// Ordered node path. Never contains duplicates.
    pub(crate) path: Vec<NodeId>,
    /// Connections with at least one endpoint in `path` (set semantics).
    pub(crate) connections: Vec<ConnectionId>,
    /// Current physical state, replaced at commit.
    pub(crate) state: K::State,
    /// Predicted contribution for the next commit.
    pub(crate) next: K::Next,
    pub(crate) injector: Injector<K>,
}

impl<K: NetworkKind> fmt::Debug for Segment<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("path", &self.path)
            .field("connections", &self.connections)
            .field("state", &self.state)
            .finish()
    }
}

impl<K: NetworkKind> Segment<K> {
    pub(crate) fn new(kind: &Arc<K>, path: Vec<NodeId>, state: K::State) -> Self {
        Self {
            path,
            connections: Vec::new(),
            state,
            next: K::Next::default(),
            injector: Injector::new(Arc::clone(kind)),
        }
    }

    pub fn path(&self) -> &[NodeId] {
        &self.path
    }

    pub fn connections(&self) -> &[ConnectionId] {
        &self.connections
    }

    pub fn state(&self) -> &K::State {
        &self.state
    }

    pub fn injector(&self) -> &Injector<K> {
        &self.injector
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    pub fn first(&self) -> Option<NodeId> {
        self.path.first().copied()
    }

    pub fn last(&self) -> Option<NodeId> {
        self.path.last().copied()
    }

    pub fn index_of(&self, node: NodeId) -> Option<usize> {
        self.path.iter().position(|n| *n == node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.path.contains(&node)
    }

    /// First or last in the path.
    pub fn is_endpoint(&self, node: NodeId) -> bool {
        self.first() == Some(node) || self.last() == Some(node)
    }

    pub(crate) fn add_connection(&mut self, id: ConnectionId) {
        if !self.connections.contains(&id) {
            self.connections.push(id);
        }
    }

    pub(crate) fn remove_connection(&mut self, id: ConnectionId) {
        self.connections.retain(|c| *c != id);
    }
}

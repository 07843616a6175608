//! Structural invariant checks.
//!
//! [`check_invariants`] walks every arena of a network and reports each
//! place where the node/segment/connection bookkeeping disagrees. A healthy
//! network yields no violations after any sequence of public operations.

use std::collections::HashSet;

use crate::id::{ConnectionId, NodeId, NodeIdentity, SegmentId};
use crate::kind::NetworkKind;
use crate::network::Network;

/// A broken structural invariant.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("segment {0:?} has an empty path")]
    EmptySegment(SegmentId),
    #[error("node {node:?} appears more than once across segment paths")]
    DuplicateNode { node: NodeId },
    #[error("segment {segment:?} lists unregistered node {node:?}")]
    UnknownPathNode { segment: SegmentId, node: NodeId },
    #[error("node {node:?} points at {claimed:?} but sits in {actual:?}")]
    WrongSegment {
        node: NodeId,
        claimed: SegmentId,
        actual: SegmentId,
    },
    #[error("node {node:?} is in no segment path")]
    Orphaned { node: NodeId },
    #[error("identity {identity} maps to a node with a different identity")]
    IdentityMismatch { identity: NodeIdentity },
    #[error("connection {connection:?} has a missing endpoint")]
    DanglingConnection { connection: ConnectionId },
    #[error("connection {connection:?} is not listed on segment {segment:?}")]
    Unlisted {
        connection: ConnectionId,
        segment: SegmentId,
    },
    #[error("segment {segment:?} lists connection {connection:?} it does not touch")]
    StaleListing {
        connection: ConnectionId,
        segment: SegmentId,
    },
    #[error("connection {connection:?} attaches to interior node {node:?}")]
    InteriorEndpoint { connection: ConnectionId, node: NodeId },
}

/// Collect every invariant violation in `network`.
pub fn check_invariants<K: NetworkKind>(network: &Network<K>) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let mut seen: HashSet<NodeId> = HashSet::new();

    for (segment, seg) in network.segments.iter() {
        if seg.path.is_empty() {
            violations.push(InvariantViolation::EmptySegment(segment));
        }
        for &node in &seg.path {
            if !seen.insert(node) {
                violations.push(InvariantViolation::DuplicateNode { node });
            }
            match network.nodes.get(node) {
                None => violations.push(InvariantViolation::UnknownPathNode { segment, node }),
                Some(entry) if entry.segment != segment => {
                    violations.push(InvariantViolation::WrongSegment {
                        node,
                        claimed: entry.segment,
                        actual: segment,
                    });
                }
                Some(_) => {}
            }
        }
        for &connection in &seg.connections {
            let touches = network.connections.get(connection).is_some_and(|c| {
                [c.from, c.to]
                    .iter()
                    .any(|n| network.nodes.get(*n).is_some_and(|n| n.segment == segment))
            });
            if !touches {
                violations.push(InvariantViolation::StaleListing { connection, segment });
            }
        }
    }

    for (node, _) in network.nodes.iter() {
        if !seen.contains(&node) {
            violations.push(InvariantViolation::Orphaned { node });
        }
    }

    for (identity, &node) in &network.identities {
        if network.nodes.get(node).is_none_or(|n| &n.identity != identity) {
            violations.push(InvariantViolation::IdentityMismatch {
                identity: identity.clone(),
            });
        }
    }

    for (connection, conn) in network.connections.iter() {
        for endpoint in [conn.from, conn.to] {
            let Some(segment) = network.nodes.get(endpoint).map(|n| n.segment) else {
                violations.push(InvariantViolation::DanglingConnection { connection });
                continue;
            };
            let Some(seg) = network.segments.get(segment) else {
                violations.push(InvariantViolation::DanglingConnection { connection });
                continue;
            };
            if !seg.connections.contains(&connection) {
                violations.push(InvariantViolation::Unlisted { connection, segment });
            }
            if !seg.is_endpoint(endpoint) {
                violations.push(InvariantViolation::InteriorEndpoint {
                    connection,
                    node: endpoint,
                });
            }
        }
    }

    violations
}

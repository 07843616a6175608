//! Segment maintenance: split, link, dissolve, unlink and node removal.
//!
//! These operations keep three facts true after every call:
//! every registered node sits in exactly one segment path, every connection
//! is listed on each segment holding one of its endpoints, and explicit
//! connections only ever attach to segment endpoints.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::connection::{ConnData, Connection};
use crate::event::NetworkEvent;
use crate::id::{ConnectionId, NodeId, NodeIdentity, SegmentId};
use crate::kind::NetworkKind;
use crate::network::Network;
use crate::segment::Segment;

// ---------------------------------------------------------------------------
// Error and outcome types
// ---------------------------------------------------------------------------

/// Errors that can occur during topology mutation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TopologyError {
    #[error("node {node:?} is not in segment {segment:?}")]
    NotInSegment { node: NodeId, segment: SegmentId },
    #[error("nodes {from:?} and {to:?} share a segment but are not adjacent")]
    NonAdjacent { from: NodeId, to: NodeId },
    #[error("unknown node identity {0}")]
    UnknownIdentity(NodeIdentity),
    #[error("node not found: {0:?}")]
    UnknownNode(NodeId),
    #[error("segment not found: {0:?}")]
    UnknownSegment(SegmentId),
    #[error("cannot link {0} to itself")]
    SelfLink(NodeIdentity),
}

/// What a successful link did to the topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The two segments were merged into `segment`; no connection exists.
    Dissolved { segment: SegmentId },
    /// A new explicit connection was created.
    Connected(ConnectionId),
    /// A connection with the same endpoints already existed and was kept.
    AlreadyConnected(ConnectionId),
}

impl LinkOutcome {
    pub fn connection(&self) -> Option<ConnectionId> {
        match self {
            LinkOutcome::Dissolved { .. } => None,
            LinkOutcome::Connected(id) | LinkOutcome::AlreadyConnected(id) => Some(*id),
        }
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

impl<K: NetworkKind> Network<K> {
    fn segment_of_node(&self, node: NodeId) -> Result<SegmentId, TopologyError> {
        self.nodes
            .get(node)
            .map(|n| n.segment)
            .ok_or(TopologyError::UnknownNode(node))
    }

    /// Number of explicit connections touching `node`.
    pub(crate) fn node_connection_count(&self, node: NodeId) -> usize {
        let Some(segment) = self.nodes.get(node).and_then(|n| self.segments.get(n.segment)) else {
            return 0;
        };
        segment
            .connections
            .iter()
            .filter(|c| self.connections.get(**c).is_some_and(|c| c.touches(node)))
            .count()
    }

    pub(crate) fn create_segment(&mut self, path: Vec<NodeId>, state: K::State) -> SegmentId {
        let segment = self.segments.insert(Segment::new(&self.kind, path, state));
        self.events.emit(NetworkEvent::SegmentCreated { segment });
        segment
    }

    fn destroy_segment(&mut self, segment: SegmentId) {
        if self.segments.remove(segment).is_some() {
            self.events.emit(NetworkEvent::SegmentRemoved { segment });
            trace!(?segment, "segment destroyed");
        }
    }

    /// Point `node` at `segment`, notifying if it moved.
    fn rehome(&mut self, node: NodeId, segment: SegmentId) {
        let Some(entry) = self.nodes.get_mut(node) else {
            return;
        };
        let previous = std::mem::replace(&mut entry.segment, segment);
        if previous != segment {
            self.events.emit(NetworkEvent::NodeSegmentChanged {
                node,
                from: Some(previous),
                to: Some(segment),
            });
        }
    }

    /// Create a connection, or return the existing one between the same two
    /// nodes in either order. The flag is `true` when a connection was created.
    fn insert_connection(
        &mut self,
        from: NodeId,
        to: NodeId,
        data: ConnData,
    ) -> Result<(ConnectionId, bool), TopologyError> {
        let from_segment = self.segment_of_node(from)?;
        let to_segment = self.segment_of_node(to)?;
        let existing = self.segments[from_segment].connections.iter().copied().find(|c| {
            self.connections
                .get(*c)
                .is_some_and(|c| c.links_pair(from, to))
        });
        if let Some(id) = existing {
            return Ok((id, false));
        }
        let id = self.connections.insert(Connection::new(from, to, data));
        self.segments[from_segment].add_connection(id);
        self.segments[to_segment].add_connection(id);
        trace!(?id, ?from, ?to, "connection created");
        Ok((id, true))
    }

    /// Delete a connection and unlist it from both endpoint segments.
    fn drop_connection(&mut self, id: ConnectionId) {
        let Some(conn) = self.connections.remove(id) else {
            return;
        };
        for endpoint in [conn.from, conn.to] {
            if let Some(segment) = self.nodes.get(endpoint).map(|n| n.segment)
                && let Some(seg) = self.segments.get_mut(segment)
            {
                seg.remove_connection(id);
            }
        }
        trace!(?id, "connection dropped");
    }

    /// Split `segment` so that `at` starts a new tail segment holding
    /// `path[index(at)..]`. Splitting at the first node is a no-op returning
    /// `None`. Connections are re-listed on whichever halves they touch. With
    /// `join`, the halves are bridged by the kind's dissolveable connection.
    pub(crate) fn split_segment(
        &mut self,
        segment: SegmentId,
        at: NodeId,
        join: bool,
    ) -> Result<Option<SegmentId>, TopologyError> {
        let seg = self
            .segments
            .get_mut(segment)
            .ok_or(TopologyError::UnknownSegment(segment))?;
        let index = seg
            .index_of(at)
            .ok_or(TopologyError::NotInSegment { node: at, segment })?;
        if index == 0 {
            return Ok(None);
        }

        let head_len = index;
        let tail_len = seg.len() - index;
        let head_last = seg.path[index - 1];
        let tail_path = seg.path.split_off(index);
        let tail_state = self.kind.split_state(&mut seg.state, head_len, tail_len);
        let listed = seg.connections.clone();

        let tail = self.create_segment(tail_path.clone(), tail_state);
        for node in tail_path {
            self.rehome(node, tail);
        }
        for id in listed {
            let Some(conn) = self.connections.get(id) else {
                continue;
            };
            let ends = [
                self.nodes.get(conn.from).map(|n| n.segment),
                self.nodes.get(conn.to).map(|n| n.segment),
            ];
            if ends.contains(&Some(tail)) {
                self.segments[tail].add_connection(id);
            }
            if !ends.contains(&Some(segment)) {
                self.segments[segment].remove_connection(id);
            }
        }

        if join {
            let data = self.kind.dissolveable_connection();
            self.insert_connection(head_last, at, data)?;
        }

        self.events.emit(NetworkEvent::SegmentPathUpdated { segment });
        self.events.emit(NetworkEvent::SegmentPathUpdated { segment: tail });
        debug!(?segment, ?tail, head_len, tail_len, join, "segment split");
        Ok(Some(tail))
    }

    /// Split so that `node` is an endpoint of its segment.
    fn ensure_endpoint(&mut self, node: NodeId) -> Result<(), TopologyError> {
        let segment = self.segment_of_node(node)?;
        if !self.segments[segment].is_endpoint(node) {
            self.split_segment(segment, node, true)?;
        }
        Ok(())
    }

    /// Join two nodes. Interior nodes are split out first (`from` before
    /// `to`). A dissolveable payload between two unconnected endpoints of
    /// different segments merges the segments; anything else becomes an
    /// explicit connection.
    pub(crate) fn make_link(
        &mut self,
        from: NodeId,
        to: NodeId,
        data: ConnData,
    ) -> Result<LinkOutcome, TopologyError> {
        if from == to {
            let identity = self
                .nodes
                .get(from)
                .map(|n| n.identity.clone())
                .ok_or(TopologyError::UnknownNode(from))?;
            return Err(TopologyError::SelfLink(identity));
        }
        self.ensure_endpoint(from)?;
        self.ensure_endpoint(to)?;

        let from_segment = self.segment_of_node(from)?;
        let to_segment = self.segment_of_node(to)?;
        if data.can_dissolve()
            && from_segment != to_segment
            && self.node_connection_count(from) == 0
            && self.node_connection_count(to) == 0
        {
            let segment = self.dissolve(from, to)?;
            return Ok(LinkOutcome::Dissolved { segment });
        }

        let (id, created) = self.insert_connection(from, to, data)?;
        Ok(if created {
            LinkOutcome::Connected(id)
        } else {
            LinkOutcome::AlreadyConnected(id)
        })
    }

    /// Merge the segments of two endpoint nodes. The shorter path is absorbed
    /// (the `to` side on a tie) and attached at the survivor's end that holds
    /// its linked node, reversed as needed so the two linked nodes end up
    /// adjacent.
    fn dissolve(&mut self, from: NodeId, to: NodeId) -> Result<SegmentId, TopologyError> {
        let from_segment = self.segment_of_node(from)?;
        let to_segment = self.segment_of_node(to)?;
        let (survivor, absorbed, kept, joined) =
            if self.segments[from_segment].len() >= self.segments[to_segment].len() {
                (from_segment, to_segment, from, to)
            } else {
                (to_segment, from_segment, to, from)
            };

        let Segment {
            path: mut moved,
            connections,
            state,
            next,
            injector,
            ..
        } = self
            .segments
            .remove(absorbed)
            .ok_or(TopologyError::UnknownSegment(absorbed))?;

        let kind = Arc::clone(&self.kind);
        let seg = self
            .segments
            .get_mut(survivor)
            .ok_or(TopologyError::UnknownSegment(survivor))?;
        if seg.last() == Some(kept) {
            if moved.first() != Some(&joined) {
                moved.reverse();
            }
            seg.path.extend_from_slice(&moved);
        } else {
            if moved.last() != Some(&joined) {
                moved.reverse();
            }
            let mut path = moved.clone();
            path.append(&mut seg.path);
            seg.path = path;
        }
        for id in connections {
            seg.add_connection(id);
        }
        kind.merge_state(&mut seg.state, state);
        kind.merge_next(&mut seg.next, next);
        seg.injector.inject(injector.drain());

        for node in moved {
            self.rehome(node, survivor);
        }
        self.redirect_prediction(absorbed, survivor);
        self.events.emit(NetworkEvent::SegmentRemoved { segment: absorbed });
        self.events.emit(NetworkEvent::SegmentPathUpdated { segment: survivor });
        debug!(?survivor, ?absorbed, "segments dissolved");
        Ok(survivor)
    }

    /// Undo a link. Removes the explicit connection joining the pair if there
    /// is one; otherwise splits a shared segment between the two (adjacent)
    /// nodes. Returns `Ok(false)` if the nodes were not linked at all.
    pub(crate) fn break_link(&mut self, from: NodeId, to: NodeId) -> Result<bool, TopologyError> {
        let from_segment = self.segment_of_node(from)?;
        let to_segment = self.segment_of_node(to)?;

        let explicit = self.segments[from_segment]
            .connections
            .iter()
            .copied()
            .find(|c| self.connections.get(*c).is_some_and(|c| c.joins(from, to)));
        if let Some(id) = explicit {
            self.drop_connection(id);
            return Ok(true);
        }

        if from_segment != to_segment {
            return Ok(false);
        }
        let seg = &self.segments[from_segment];
        let (Some(i), Some(j)) = (seg.index_of(from), seg.index_of(to)) else {
            return Err(TopologyError::NotInSegment {
                node: from,
                segment: from_segment,
            });
        };
        if i.abs_diff(j) != 1 {
            return Err(TopologyError::NonAdjacent { from, to });
        }
        let upper = seg.path[i.max(j)];
        self.split_segment(from_segment, upper, false)?;
        Ok(true)
    }

    /// Drop a node, its connections, and (if emptied) its segment. Interior
    /// nodes split their segment first so the remainder stays contiguous.
    pub(crate) fn remove_node(&mut self, node: NodeId) -> Result<(), TopologyError> {
        let segment = self.segment_of_node(node)?;
        let touching: Vec<ConnectionId> = self.segments[segment]
            .connections
            .iter()
            .copied()
            .filter(|c| self.connections.get(*c).is_some_and(|c| c.touches(node)))
            .collect();
        for id in touching {
            self.drop_connection(id);
        }

        let seg = &self.segments[segment];
        let index = seg
            .index_of(node)
            .ok_or(TopologyError::NotInSegment { node, segment })?;
        if index != 0 && index + 1 < seg.len() {
            let after = seg.path[index + 1];
            self.split_segment(segment, after, false)?;
        }

        let seg = &mut self.segments[segment];
        seg.path.retain(|n| *n != node);
        let emptied = seg.path.is_empty();
        self.nodes.remove(node);
        self.events.emit(NetworkEvent::NodeSegmentChanged {
            node,
            from: Some(segment),
            to: None,
        });
        if emptied {
            self.destroy_segment(segment);
        } else {
            self.events.emit(NetworkEvent::SegmentPathUpdated { segment });
        }
        debug!(?node, ?segment, emptied, "node removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::test_utils::*;

    #[test]
    fn chain_of_lossless_links_dissolves_into_one_segment() {
        let mut net = inline_network();
        chain(&mut net, &["A", "B", "C", "D", "E"]);
        assert_eq!(net.segment_count(), 1);
        assert_eq!(net.connection_count(), 0);
        assert_eq!(path_names(&net, "A"), ["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn dissolve_prepends_when_survivor_node_is_first() {
        let mut net = inline_network();
        chain(&mut net, &["A", "B", "C"]);
        let outcome = net
            .link(&ident(1, "X"), &ident(1, "A"), ConnData::lossless())
            .unwrap();
        assert!(matches!(outcome, LinkOutcome::Dissolved { .. }));
        assert_eq!(path_names(&net, "A"), ["X", "A", "B", "C"]);
    }

    #[test]
    fn dissolve_reverses_absorbed_path_to_keep_linked_nodes_adjacent() {
        let mut net = inline_network();
        chain(&mut net, &["A", "B", "C"]);
        chain(&mut net, &["D", "E"]);
        net.link(&ident(1, "C"), &ident(1, "E"), ConnData::lossless())
            .unwrap();
        assert_eq!(path_names(&net, "A"), ["A", "B", "C", "E", "D"]);
    }

    #[test]
    fn dissolve_tie_absorbs_to_side() {
        let mut net = inline_network();
        let (a, b) = (ident(1, "A"), ident(1, "B"));
        net.get_or_create(&a);
        net.get_or_create(&b);
        let a_segment = net.segment_of(&a).unwrap();
        let b_segment = net.segment_of(&b).unwrap();

        let outcome = net.link(&a, &b, ConnData::lossless()).unwrap();
        assert_eq!(outcome, LinkOutcome::Dissolved { segment: a_segment });
        assert!(net.segment(b_segment).is_none());
    }

    #[test]
    fn dissolve_emits_removed_and_path_updated() {
        let mut net = inline_network();
        let (a, b) = (ident(1, "A"), ident(1, "B"));
        net.get_or_create(&a);
        net.get_or_create(&b);
        let b_segment = net.segment_of(&b).unwrap();
        net.drain_events();

        net.link(&a, &b, ConnData::lossless()).unwrap();
        let events = net.drain_events();
        assert!(events.contains(&NetworkEvent::SegmentRemoved { segment: b_segment }));
        assert_eq!(
            events
                .iter()
                .filter(|e| e.kind() == EventKind::SegmentPathUpdated)
                .count(),
            1
        );
    }

    #[test]
    fn connected_node_blocks_dissolve() {
        let mut net = inline_network();
        let (a, b, c) = (ident(1, "A"), ident(1, "B"), ident(1, "C"));
        net.link(&a, &b, ConnData::limited(5.0)).unwrap();
        let outcome = net.link(&b, &c, ConnData::lossless()).unwrap();
        assert!(matches!(outcome, LinkOutcome::Connected(_)));
        assert_eq!(net.segment_count(), 3);
        assert_eq!(net.connection_count(), 2);
    }

    #[test]
    fn filtered_or_limited_links_stay_explicit() {
        let mut net = inline_network();
        let outcome = net
            .link(
                &ident(1, "A"),
                &ident(1, "B"),
                ConnData::lossless().with_filter([1.0, 0.5, 0.5, 1.0]),
            )
            .unwrap();
        assert!(matches!(outcome, LinkOutcome::Connected(_)));
        assert_eq!(net.segment_count(), 2);
    }

    #[test]
    fn duplicate_link_keeps_existing_connection() {
        let mut net = inline_network();
        let (a, b) = (ident(1, "A"), ident(1, "B"));
        let first = net.link(&a, &b, ConnData::limited(1.0)).unwrap();
        let second = net.link(&a, &b, ConnData::limited(5.0)).unwrap();
        let id = first.connection().unwrap();
        assert_eq!(second, LinkOutcome::AlreadyConnected(id));
        assert_eq!(net.connection(id).unwrap().data.max_throughput, 1.0);
        assert_eq!(net.connection_count(), 1);
    }

    #[test]
    fn reversed_link_reuses_existing_connection() {
        let mut net = inline_network();
        let (a, b) = (ident(1, "A"), ident(1, "B"));
        let first = net.link(&a, &b, ConnData::limited(1.0e6)).unwrap();
        let second = net.link(&b, &a, ConnData::limited(1.0e6)).unwrap();
        let id = first.connection().unwrap();
        assert_eq!(second, LinkOutcome::AlreadyConnected(id));
        assert_eq!(net.connection_count(), 1);

        net.inject(net.segment_of(&a).unwrap(), Level(100.0)).unwrap();
        net.inject(net.segment_of(&b).unwrap(), Level(20.0)).unwrap();
        net.update(1);
        net.update(1);
        assert_eq!(level(&net, &a), 60.0);
        assert_eq!(level(&net, &b), 60.0);
    }

    #[test]
    fn node_connection_count_ignores_links_of_segment_mates() {
        let mut net = inline_network();
        chain(&mut net, &["A", "B", "C"]);
        net.link(&ident(1, "C"), &ident(1, "X"), ConnData::limited(2.0))
            .unwrap();
        net.link(&ident(1, "Y"), &ident(1, "C"), ConnData::limited(2.0))
            .unwrap();
        let node = |name: &str| net.node(&ident(1, name)).unwrap();
        assert_eq!(net.node_connection_count(node("C")), 2);
        assert_eq!(net.node_connection_count(node("A")), 0);
        assert_eq!(net.node_connection_count(node("X")), 1);
        assert_eq!(net.connection_count(), 2);
    }

    #[test]
    fn self_link_is_rejected() {
        let mut net = inline_network();
        let a = ident(1, "A");
        assert_eq!(
            net.link(&a, &a, ConnData::lossless()),
            Err(TopologyError::SelfLink(a.clone()))
        );
    }

    #[test]
    fn split_at_first_node_is_noop() {
        let mut net = inline_network();
        chain(&mut net, &["A", "B", "C"]);
        assert_eq!(net.split(&ident(1, "A")).unwrap(), None);
        assert_eq!(net.segment_count(), 1);
    }

    #[test]
    fn split_interior_bridges_halves() {
        let mut net = inline_network();
        chain(&mut net, &["A", "B", "C", "D"]);
        let tail = net.split(&ident(1, "C")).unwrap().unwrap();

        assert_eq!(path_names(&net, "A"), ["A", "B"]);
        assert_eq!(path_names(&net, "C"), ["C", "D"]);
        assert_eq!(net.segment_of(&ident(1, "D")), Some(tail));
        let bridge = net.find_connection(&ident(1, "B"), &ident(1, "C")).unwrap();
        assert!(net.connection(bridge).unwrap().data.can_dissolve());
    }

    #[test]
    fn split_relists_connections_on_touched_halves() {
        let mut net = inline_network();
        chain(&mut net, &["A", "B", "C"]);
        net.link(&ident(1, "C"), &ident(1, "D"), ConnData::limited(2.0))
            .unwrap();
        let outside = net.find_connection(&ident(1, "C"), &ident(1, "D")).unwrap();

        let tail = net.split(&ident(1, "B")).unwrap().unwrap();
        let head = net.segment_of(&ident(1, "A")).unwrap();
        let bridge = net.find_connection(&ident(1, "A"), &ident(1, "B")).unwrap();

        assert_eq!(net.segment(head).unwrap().connections(), &[bridge]);
        let tail_listed = net.segment(tail).unwrap().connections();
        assert!(tail_listed.contains(&outside));
        assert!(tail_listed.contains(&bridge));
    }

    #[test]
    fn split_apportions_state_by_length() {
        let mut net = inline_network();
        chain(&mut net, &["A", "B", "C", "D"]);
        net.inject(net.segment_of(&ident(1, "A")).unwrap(), Level(40.0))
            .unwrap();
        net.update(1);

        net.split(&ident(1, "D")).unwrap();
        assert_eq!(level(&net, &ident(1, "A")), 30.0);
        assert_eq!(level(&net, &ident(1, "D")), 10.0);
    }

    #[test]
    fn linking_interior_node_splits_it_out() {
        let mut net = inline_network();
        chain(&mut net, &["A", "B", "C"]);
        net.link(&ident(1, "B"), &ident(1, "X"), ConnData::limited(1.0))
            .unwrap();

        assert_eq!(path_names(&net, "A"), ["A"]);
        assert_eq!(path_names(&net, "B"), ["B", "C"]);
        assert_eq!(path_names(&net, "X"), ["X"]);
        assert_eq!(net.connection_count(), 2);
    }

    #[test]
    fn unlink_explicit_connection_round_trips() {
        let mut net = inline_network();
        let (a, b) = (ident(1, "A"), ident(1, "B"));
        net.link(&a, &b, ConnData::limited(3.0)).unwrap();
        assert!(net.unlink(&a, &b).unwrap());
        assert_eq!(net.connection_count(), 0);
        assert_eq!(net.segment_count(), 2);
        assert_eq!(path_names(&net, "A"), ["A"]);
        assert_eq!(path_names(&net, "B"), ["B"]);
    }

    #[test]
    fn unlink_dissolved_pair_splits_segment() {
        let mut net = inline_network();
        chain(&mut net, &["A", "B", "C"]);
        assert!(net.unlink(&ident(1, "B"), &ident(1, "A")).unwrap());
        assert_eq!(path_names(&net, "A"), ["A"]);
        assert_eq!(path_names(&net, "B"), ["B", "C"]);
        assert_eq!(net.connection_count(), 0);
    }

    #[test]
    fn unlink_non_adjacent_fails() {
        let mut net = inline_network();
        chain(&mut net, &["A", "B", "C"]);
        let result = net.unlink(&ident(1, "A"), &ident(1, "C"));
        assert!(matches!(result, Err(TopologyError::NonAdjacent { .. })));
        assert_eq!(net.segment_count(), 1);
    }

    #[test]
    fn unlink_unrelated_nodes_is_false() {
        let mut net = inline_network();
        net.get_or_create(&ident(1, "A"));
        net.get_or_create(&ident(1, "B"));
        assert!(!net.unlink(&ident(1, "A"), &ident(1, "B")).unwrap());
    }

    #[test]
    fn unlink_unknown_identity_fails() {
        let mut net = inline_network();
        net.get_or_create(&ident(1, "A"));
        assert_eq!(
            net.unlink(&ident(1, "A"), &ident(1, "Z")),
            Err(TopologyError::UnknownIdentity(ident(1, "Z")))
        );
    }

    #[test]
    fn one_way_connection_only_unlinks_forward() {
        let mut net = inline_network();
        let (a, b) = (ident(1, "A"), ident(1, "B"));
        net.link(&a, &b, ConnData::limited(1.0).one_way()).unwrap();
        assert!(!net.unlink(&b, &a).unwrap());
        assert!(net.unlink(&a, &b).unwrap());
    }

    #[test]
    fn removing_interior_node_splits_remainder() {
        let mut net = inline_network();
        chain(&mut net, &["A", "B", "C"]);
        assert!(net.remove(&ident(1, "B")).unwrap());
        assert_eq!(path_names(&net, "A"), ["A"]);
        assert_eq!(path_names(&net, "C"), ["C"]);
        assert_eq!(net.connection_count(), 0);
        assert!(!net.contains(&ident(1, "B")));
    }

    #[test]
    fn removing_last_node_destroys_segment() {
        let mut net = inline_network();
        let a = ident(1, "A");
        net.get_or_create(&a);
        let segment = net.segment_of(&a).unwrap();
        net.drain_events();

        assert!(net.remove(&a).unwrap());
        assert_eq!(net.segment_count(), 0);
        assert!(net.drain_events().contains(&NetworkEvent::SegmentRemoved { segment }));
    }

    #[test]
    fn removing_node_drops_its_connections() {
        let mut net = inline_network();
        let (a, b, c) = (ident(1, "A"), ident(1, "B"), ident(1, "C"));
        net.link(&a, &b, ConnData::limited(1.0)).unwrap();
        net.link(&c, &b, ConnData::limited(1.0)).unwrap();
        net.remove(&b).unwrap();
        assert_eq!(net.connection_count(), 0);
        for (_, seg) in net.segments() {
            assert!(seg.connections().is_empty());
        }
    }

    #[test]
    fn removing_unknown_identity_is_noop() {
        let mut net = inline_network();
        assert!(!net.remove(&ident(1, "ghost")).unwrap());
    }

    #[test]
    fn dissolve_carries_state_and_pending_injection() {
        let mut net = inline_network();
        let (a, b) = (ident(1, "A"), ident(1, "B"));
        net.get_or_create(&a);
        net.get_or_create(&b);
        net.inject(net.segment_of(&a).unwrap(), Level(5.0)).unwrap();
        net.update(1);
        net.inject(net.segment_of(&b).unwrap(), Level(7.0)).unwrap();

        net.link(&a, &b, ConnData::lossless()).unwrap();
        net.update(1);
        assert_eq!(level(&net, &a), 12.0);
    }
}

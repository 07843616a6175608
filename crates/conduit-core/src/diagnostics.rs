//! Human-readable dumps and counters for debugging a network.

use std::fmt::Write;

use crate::id::NodeId;
use crate::kind::NetworkKind;
use crate::network::Network;
use crate::sim::Ticks;

/// Point-in-time counters for one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkStats {
    pub tick: Ticks,
    pub nodes: usize,
    pub segments: usize,
    pub connections: usize,
    pub placed_detectors: usize,
    pub pending_detectors: usize,
    /// Length of the longest segment path.
    pub longest_path: usize,
    pub dropped_events: u64,
}

impl<K: NetworkKind> Network<K> {
    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            tick: self.tick(),
            nodes: self.nodes.len(),
            segments: self.segments.len(),
            connections: self.connections.len(),
            placed_detectors: self.detectors.placed_count(),
            pending_detectors: self.detectors.pending_count(),
            longest_path: self.segments.values().map(|s| s.len()).max().unwrap_or(0),
            dropped_events: self.events.dropped_count(),
        }
    }

    /// Every segment with its path, connections and state, one block per
    /// segment.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let stats = self.stats();
        let _ = writeln!(
            out,
            "{} network @ tick {}: {} nodes, {} segments, {} connections",
            self.kind.name(),
            stats.tick,
            stats.nodes,
            stats.segments,
            stats.connections
        );
        for (id, seg) in self.segments.iter() {
            let path: Vec<String> = seg
                .path
                .iter()
                .map(|n| match self.nodes.get(*n) {
                    Some(node) => node.identity.to_string(),
                    None => format!("<missing {n:?}>"),
                })
                .collect();
            let _ = writeln!(out, "segment {id:?}");
            let _ = writeln!(out, "  path: [{}]", path.join(", "));
            let _ = writeln!(out, "  state: {}", self.kind.dump_state(&seg.state));
            for cid in &seg.connections {
                let Some(conn) = self.connections.get(*cid) else {
                    let _ = writeln!(out, "  conn {cid:?}: <missing>");
                    continue;
                };
                let name = |n: NodeId| {
                    self.nodes
                        .get(n)
                        .map_or_else(|| format!("{n:?}"), |node| node.identity.to_string())
                };
                let _ = writeln!(
                    out,
                    "  conn {cid:?}: {} -> {} (throughput {}, filter {:?}, {})",
                    name(conn.from),
                    name(conn.to),
                    conn.data.max_throughput,
                    conn.data.filter,
                    if conn.data.bidirectional { "bidirectional" } else { "one-way" }
                );
            }
        }
        if stats.pending_detectors > 0 {
            let _ = writeln!(out, "pending detectors: {}", stats.pending_detectors);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use crate::connection::ConnData;
    use crate::test_utils::*;

    #[test]
    fn stats_count_arenas() {
        let mut net = inline_network();
        chain(&mut net, &["A", "B", "C"]);
        net.link(&ident(1, "C"), &ident(1, "D"), ConnData::limited(1.0))
            .unwrap();
        net.update(3);

        let stats = net.stats();
        assert_eq!(stats.tick, 3);
        assert_eq!(stats.nodes, 4);
        assert_eq!(stats.segments, 2);
        assert_eq!(stats.connections, 1);
        assert_eq!(stats.longest_path, 3);
    }

    #[test]
    fn dump_lists_paths_and_connections() {
        let mut net = inline_network();
        chain(&mut net, &["A", "B"]);
        net.link(&ident(1, "B"), &ident(1, "C"), ConnData::limited(2.0).one_way())
            .unwrap();

        let dump = net.dump();
        assert!(dump.starts_with("diffusion network @ tick 0: 3 nodes, 2 segments, 1 connections"));
        assert!(dump.contains("path: [#1:A, #1:B]"));
        assert!(dump.contains("#1:B -> #1:C (throughput 2"));
        assert!(dump.contains("one-way"));
    }
}

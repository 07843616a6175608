//! Shared test helpers for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`. Provides
//! [`DiffusionKind`], a scalar network type whose segments carry a single
//! level that equalizes across links, plus constructors for identities and
//! small topologies.

use crate::config::NetworkConfig;
use crate::connection::{ConnData, LinkRole};
use crate::id::{NodeIdentity, OwnerId};
use crate::kind::{LinkView, NetworkKind};
use crate::network::Network;

// ===========================================================================
// Scalar network kind
// ===========================================================================

/// A single conserved quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Level(pub f64);

/// Net change predicted for one segment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Flow(pub f64);

/// Half-difference diffusion with throughput and direction clamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffusionKind;

impl NetworkKind for DiffusionKind {
    type State = Level;
    type Next = Flow;
    type Injection = Level;

    fn name(&self) -> &str {
        "diffusion"
    }

    fn predict(&self, dt: f64, own: &Level, links: &[LinkView<'_, Level>]) -> Flow {
        let mut total = 0.0;
        for link in links {
            let limit = link.data.flow_limit(dt);
            let mut delta = ((link.neighbor.0 - own.0) / 2.0).max(-limit).min(limit);
            if !link.data.bidirectional {
                delta = match link.role {
                    LinkRole::From => delta.min(0.0),
                    LinkRole::To => delta.max(0.0),
                };
            }
            total += delta;
        }
        Flow(total)
    }

    fn commit(&self, _dt: f64, state: &mut Level, next: Flow, injected: Level) {
        state.0 += next.0 + injected.0;
    }

    fn merge_next(&self, into: &mut Flow, other: Flow) {
        into.0 += other.0;
    }

    fn merge_injection(&self, into: &mut Level, delta: Level) {
        into.0 += delta.0;
    }

    fn split_state(&self, head: &mut Level, head_len: usize, tail_len: usize) -> Level {
        let total = (head_len + tail_len) as f64;
        let tail = head.0 * tail_len as f64 / total;
        head.0 -= tail;
        Level(tail)
    }

    fn merge_state(&self, survivor: &mut Level, absorbed: Level) {
        survivor.0 += absorbed.0;
    }
}

// ===========================================================================
// Constructors
// ===========================================================================

pub fn ident(owner: u64, path: &str) -> NodeIdentity {
    NodeIdentity::new(OwnerId(owner), path)
}

/// A diffusion network that predicts on the calling thread with 1s ticks.
pub fn inline_network() -> Network<DiffusionKind> {
    Network::new(DiffusionKind, NetworkConfig::inline()).expect("inline config is valid")
}

/// Link `names` (owner 1) in order with lossless connections.
pub fn chain(net: &mut Network<DiffusionKind>, names: &[&str]) {
    for pair in names.windows(2) {
        net.link(&ident(1, pair[0]), &ident(1, pair[1]), ConnData::lossless())
            .expect("chain link");
    }
}

/// Leaf names along the segment holding owner-1 node `name`.
pub fn path_names<K: NetworkKind>(net: &Network<K>, name: &str) -> Vec<String> {
    let segment = net.segment_of(&ident(1, name)).expect("node registered");
    net.path_identities(segment)
        .expect("segment exists")
        .into_iter()
        .map(|id| id.leaf().to_string())
        .collect()
}

/// Current level of the segment holding `identity`.
pub fn level(net: &Network<DiffusionKind>, identity: &NodeIdentity) -> f64 {
    let segment = net.segment_of(identity).expect("node registered");
    net.state(segment).expect("segment exists").0
}

/// Sum of every segment's level.
pub fn total_level(net: &Network<DiffusionKind>) -> f64 {
    net.segments().map(|(_, seg)| seg.state().0).sum()
}

//! Spatial auto-linking of connectors.
//!
//! A detector is a connector that links itself to whatever other detector it
//! overlaps. Placement needs the connector's world transform, which may not
//! be known yet when the detector is registered (the owning object may still
//! be loading), so requests wait in a FIFO and are retried until a
//! [`GeometryResolver`] can place them.

use std::collections::{HashMap, VecDeque};

use tracing::{Span, debug, trace};

use crate::aabb::{Aabb, AabbTree, Affine};
use crate::id::{NodeIdentity, ProxyId};

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Supplies world transforms for connector identities.
pub trait GeometryResolver: Send + Sync {
    /// World transform of the connector, or `None` if not yet known.
    fn resolve(&self, identity: &NodeIdentity) -> Option<Affine>;
}

/// Resolves nothing; every detector stays pending.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeometry;

impl GeometryResolver for NoGeometry {
    fn resolve(&self, _identity: &NodeIdentity) -> Option<Affine> {
        None
    }
}

impl<F> GeometryResolver for F
where
    F: Fn(&NodeIdentity) -> Option<Affine> + Send + Sync,
{
    fn resolve(&self, identity: &NodeIdentity) -> Option<Affine> {
        self(identity)
    }
}

/// Fixed transforms keyed by identity.
#[derive(Debug, Clone, Default)]
pub struct StaticGeometry(HashMap<NodeIdentity, Affine>);

impl StaticGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, identity: NodeIdentity, transform: Affine) {
        self.0.insert(identity, transform);
    }

    pub fn with(mut self, identity: NodeIdentity, transform: Affine) -> Self {
        self.set(identity, transform);
        self
    }
}

impl GeometryResolver for StaticGeometry {
    fn resolve(&self, identity: &NodeIdentity) -> Option<Affine> {
        self.0.get(identity).copied()
    }
}

// ---------------------------------------------------------------------------
// Detectors
// ---------------------------------------------------------------------------

/// A connector registered for auto-linking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detector {
    pub identity: NodeIdentity,
    pub accepts_input: bool,
    pub provides_output: bool,
}

/// A link the controller should make between two detectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRequest {
    pub from: NodeIdentity,
    pub to: NodeIdentity,
    pub bidirectional: bool,
}

/// Decide how a newly placed detector links to an overlapping one.
///
/// Output-to-input from the new detector wins; the reverse direction is
/// used only when the forward one is unsatisfied. A pair satisfiable both
/// ways yields one bidirectional request.
pub fn resolve_link(new: &Detector, other: &Detector) -> Option<LinkRequest> {
    if new.identity == other.identity {
        return None;
    }
    let forward = new.provides_output && other.accepts_input;
    let backward = other.provides_output && new.accepts_input;
    match (forward, backward) {
        (true, bidirectional) => Some(LinkRequest {
            from: new.identity.clone(),
            to: other.identity.clone(),
            bidirectional,
        }),
        (false, true) => Some(LinkRequest {
            from: other.identity.clone(),
            to: new.identity.clone(),
            bidirectional: false,
        }),
        (false, false) => None,
    }
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// Placed detectors in an AABB tree plus the queue of unplaced ones.
#[derive(Debug)]
pub struct DetectorIndex {
    tree: AabbTree<Detector>,
    placed: HashMap<NodeIdentity, ProxyId>,
    pending: VecDeque<Detector>,
    span: Span,
}

impl DetectorIndex {
    pub fn new(span: Span) -> Self {
        Self {
            tree: AabbTree::new(),
            placed: HashMap::new(),
            pending: VecDeque::new(),
            span,
        }
    }

    /// Queue a detector for placement, replacing any earlier registration
    /// of the same identity.
    pub fn enqueue(&mut self, detector: Detector) {
        self.remove(&detector.identity);
        self.pending.push_back(detector);
    }

    /// Try to place every request queued at call time. Requests whose
    /// geometry does not resolve go to the back of the queue. Returns the
    /// links implied by newly placed detectors, in placement order.
    pub fn place_pending(&mut self, resolver: &dyn GeometryResolver) -> Vec<LinkRequest> {
        let _enter = self.span.enter();
        let mut requests = Vec::new();
        let attempts = self.pending.len();
        for _ in 0..attempts {
            let Some(detector) = self.pending.pop_front() else {
                break;
            };
            let Some(transform) = resolver.resolve(&detector.identity) else {
                trace!(identity = %detector.identity, "detector geometry unresolved");
                self.pending.push_back(detector);
                continue;
            };

            let bounds = Aabb::unit_around(&transform);
            let identity = detector.identity.clone();
            let proxy = self.tree.insert(bounds, detector);
            self.placed.insert(identity.clone(), proxy);

            let Some(placed) = self.tree.get(proxy) else {
                continue;
            };
            for hit in self.tree.query(&bounds) {
                if hit == proxy {
                    continue;
                }
                if let Some(request) = self.tree.get(hit).and_then(|other| resolve_link(placed, other)) {
                    requests.push(request);
                }
            }
            debug!(%identity, links = requests.len(), "detector placed");
        }
        requests
    }

    /// Unregister a detector, placed or pending. Returns `false` if the
    /// identity had no detector.
    pub fn remove(&mut self, identity: &NodeIdentity) -> bool {
        if let Some(proxy) = self.placed.remove(identity) {
            self.tree.remove(proxy);
            return true;
        }
        let before = self.pending.len();
        self.pending.retain(|d| &d.identity != identity);
        before != self.pending.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn placed_count(&self) -> usize {
        self.placed.len()
    }

    pub fn is_placed(&self, identity: &NodeIdentity) -> bool {
        self.placed.contains_key(identity)
    }

    pub fn is_pending(&self, identity: &NodeIdentity) -> bool {
        self.pending.iter().any(|d| &d.identity == identity)
    }

    /// World bounds of a placed detector.
    pub fn bounds(&self, identity: &NodeIdentity) -> Option<Aabb> {
        self.placed.get(identity).and_then(|p| self.tree.aabb(*p))
    }
}

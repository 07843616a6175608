//! The network controller: owns one connected topology and drives its tick.
//!
//! # Architecture
//!
//! The `Network` owns:
//! - A node arena plus an identity -> node map (the registry)
//! - A segment arena (each segment: ordered path, touching connections,
//!   current state, predicted next state, injector)
//! - A connection arena
//! - A [`DetectorIndex`] for spatial auto-linking
//! - A [`WorkerPool`] and the in-flight predict task
//! - An [`EventBus`] for notifications
//!
//! # Tick
//!
//! Each `update()`:
//! 1. **Join** -- wait for the predict task launched by the previous update
//!    and store each result in its segment's next buffer. Results for
//!    segments dissolved since launch follow them into their survivor
//! 2. **Detectors** -- retry detector placement for pending requests
//! 3. **Commit** -- fold next buffers and injected deltas into current state
//! 4. **Predict** -- snapshot current state and launch predict as chunked
//!    background work, returning without waiting for it

use std::collections::HashMap;
use std::sync::Arc;

use slotmap::{SecondaryMap, SlotMap};
use tracing::{Span, debug, info_span, trace, warn};

use crate::config::{ConfigError, NetworkConfig};
use crate::connection::{ConnData, Connection, LinkRole};
use crate::detector::{Detector, DetectorIndex, GeometryResolver, NoGeometry};
use crate::event::{EventBus, NetworkEvent};
use crate::id::{ConnectionId, NodeId, NodeIdentity, SegmentId};
use crate::kind::{Injector, LinkView, NetworkKind};
use crate::segment::{Node, Segment};
use crate::sim::{Phase, SimState, Ticks};
use crate::task::{TaskHandle, WorkerPool};
use crate::topology::{LinkOutcome, TopologyError};

// ---------------------------------------------------------------------------
// Predict snapshot
// ---------------------------------------------------------------------------

/// A connection resolved to the segment on its far side.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedLink {
    pub(crate) data: ConnData,
    pub(crate) role: LinkRole,
    pub(crate) neighbor: SegmentId,
}

/// Everything one segment's predict reads besides the shared state snapshot.
#[derive(Debug, Clone)]
pub(crate) struct PredictJob {
    pub(crate) segment: SegmentId,
    pub(crate) links: Vec<ResolvedLink>,
}

/// Run one segment's predict against a frozen state snapshot.
pub(crate) fn run_predict<K: NetworkKind>(
    kind: &K,
    states: &SecondaryMap<SegmentId, K::State>,
    dt: f64,
    job: &PredictJob,
) -> (SegmentId, K::Next) {
    let Some(own) = states.get(job.segment) else {
        return (job.segment, K::Next::default());
    };
    let views: Vec<LinkView<'_, K::State>> = job
        .links
        .iter()
        .filter_map(|link| {
            Some(LinkView {
                data: &link.data,
                role: link.role,
                neighbor: states.get(link.neighbor)?,
            })
        })
        .collect();
    (job.segment, kind.predict(dt, own, &views))
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Configures and builds a [`Network`].
pub struct NetworkBuilder<K: NetworkKind> {
    kind: K,
    config: NetworkConfig,
    span: Option<Span>,
    resolver: Box<dyn GeometryResolver>,
    event_capacity: usize,
}

impl<K: NetworkKind> NetworkBuilder<K> {
    pub fn config(mut self, config: NetworkConfig) -> Self {
        self.config = config;
        self
    }

    /// Span every controller operation logs under. Defaults to
    /// `info_span!("network", kind = ...)`.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Geometry source for detector placement.
    pub fn resolver(mut self, resolver: impl GeometryResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<Network<K>, ConfigError> {
        self.config.validate()?;
        let span = self
            .span
            .unwrap_or_else(|| info_span!("network", kind = self.kind.name()));
        let detectors = DetectorIndex::new(info_span!(parent: &span, "detectors"));
        Ok(Network {
            pool: WorkerPool::from_config(&self.config),
            kind: Arc::new(self.kind),
            config: self.config,
            nodes: SlotMap::with_key(),
            identities: HashMap::new(),
            segments: SlotMap::with_key(),
            connections: SlotMap::with_key(),
            detectors,
            resolver: self.resolver,
            in_flight: None,
            redirects: HashMap::new(),
            events: EventBus::new(self.event_capacity),
            sim: SimState::new(),
            span,
        })
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// One connected transport topology and its simulation.
pub struct Network<K: NetworkKind> {
    pub(crate) kind: Arc<K>,
    config: NetworkConfig,
    pub(crate) nodes: SlotMap<NodeId, Node>,
    pub(crate) identities: HashMap<NodeIdentity, NodeId>,
    pub(crate) segments: SlotMap<SegmentId, Segment<K>>,
    pub(crate) connections: SlotMap<ConnectionId, Connection>,
    pub(crate) detectors: DetectorIndex,
    resolver: Box<dyn GeometryResolver>,
    pool: WorkerPool,
    in_flight: Option<TaskHandle<(SegmentId, K::Next)>>,
    /// Absorbed -> survivor for dissolves made while predict is in flight.
    redirects: HashMap<SegmentId, SegmentId>,
    pub(crate) events: EventBus,
    sim: SimState,
    pub(crate) span: Span,
}

impl<K: NetworkKind> std::fmt::Debug for Network<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("kind", &self.kind.name())
            .field("nodes", &self.nodes.len())
            .field("segments", &self.segments.len())
            .field("connections", &self.connections.len())
            .field("tick", &self.sim.tick)
            .finish_non_exhaustive()
    }
}

impl<K: NetworkKind> Network<K> {
    pub fn builder(kind: K) -> NetworkBuilder<K> {
        NetworkBuilder {
            kind,
            config: NetworkConfig::default(),
            span: None,
            resolver: Box::new(NoGeometry),
            event_capacity: 4096,
        }
    }

    /// Build a network with the given config and no detector geometry.
    pub fn new(kind: K, config: NetworkConfig) -> Result<Self, ConfigError> {
        Self::builder(kind).config(config).build()
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn tick(&self) -> Ticks {
        self.sim.tick
    }

    pub fn phase(&self) -> Phase {
        self.sim.phase
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    /// Return the node for `identity`, creating it (and a singleton segment)
    /// on first sight. The flag is `true` when the node was created.
    pub fn get_or_create(&mut self, identity: &NodeIdentity) -> (NodeId, bool) {
        if let Some(&node) = self.identities.get(identity) {
            return (node, false);
        }
        let state = self.kind.allocate_segment();
        let segment = self.create_segment(Vec::new(), state);
        let node = self.nodes.insert(Node {
            identity: identity.clone(),
            segment,
        });
        self.segments[segment].path.push(node);
        self.identities.insert(identity.clone(), node);
        self.events.emit(NetworkEvent::NodeSegmentChanged {
            node,
            from: None,
            to: Some(segment),
        });
        trace!(parent: &self.span, %identity, ?node, ?segment, "node registered");
        (node, true)
    }

    pub fn node(&self, identity: &NodeIdentity) -> Option<NodeId> {
        self.identities.get(identity).copied()
    }

    pub fn identity_of(&self, node: NodeId) -> Option<&NodeIdentity> {
        self.nodes.get(node).map(|n| &n.identity)
    }

    pub fn segment_of(&self, identity: &NodeIdentity) -> Option<SegmentId> {
        let node = self.identities.get(identity)?;
        Some(self.nodes[*node].segment)
    }

    pub fn contains(&self, identity: &NodeIdentity) -> bool {
        self.identities.contains_key(identity)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // -----------------------------------------------------------------------
    // Segments and connections
    // -----------------------------------------------------------------------

    pub fn segment(&self, segment: SegmentId) -> Option<&Segment<K>> {
        self.segments.get(segment)
    }

    pub fn segments(&self) -> impl Iterator<Item = (SegmentId, &Segment<K>)> {
        self.segments.iter()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn path(&self, segment: SegmentId) -> Option<&[NodeId]> {
        self.segments.get(segment).map(|s| s.path())
    }

    /// Every connection touching the segment's path.
    pub fn connections_of(&self, segment: SegmentId) -> Option<&[ConnectionId]> {
        self.segments.get(segment).map(|s| s.connections())
    }

    /// Identities along a segment's path, in order.
    pub fn path_identities(&self, segment: SegmentId) -> Option<Vec<&NodeIdentity>> {
        let seg = self.segments.get(segment)?;
        Some(seg.path.iter().map(|n| &self.nodes[*n].identity).collect())
    }

    pub fn state(&self, segment: SegmentId) -> Option<&K::State> {
        self.segments.get(segment).map(|s| &s.state)
    }

    pub fn connection(&self, connection: ConnectionId) -> Option<&Connection> {
        self.connections.get(connection)
    }

    pub fn connections(&self) -> impl Iterator<Item = (ConnectionId, &Connection)> {
        self.connections.iter()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// The explicit connection joining two identities, if any.
    pub fn find_connection(&self, from: &NodeIdentity, to: &NodeIdentity) -> Option<ConnectionId> {
        let from = self.node(from)?;
        let to = self.node(to)?;
        let segment = &self.segments[self.nodes[from].segment];
        segment
            .connections
            .iter()
            .copied()
            .find(|c| self.connections[*c].joins(from, to))
    }

    // -----------------------------------------------------------------------
    // Topology API
    // -----------------------------------------------------------------------

    /// Link two identities, registering either if unseen. Non-endpoint nodes
    /// are split out first; lossless links between otherwise unconnected
    /// endpoints dissolve the two segments into one.
    pub fn link(
        &mut self,
        from: &NodeIdentity,
        to: &NodeIdentity,
        data: ConnData,
    ) -> Result<LinkOutcome, TopologyError> {
        let span = self.span.clone();
        let _enter = span.enter();
        let (from_node, _) = self.get_or_create(from);
        let (to_node, _) = self.get_or_create(to);
        let outcome = self.make_link(from_node, to_node, data);
        self.events.deliver();
        outcome
    }

    /// Undo a link between two registered identities.
    pub fn unlink(&mut self, from: &NodeIdentity, to: &NodeIdentity) -> Result<bool, TopologyError> {
        let span = self.span.clone();
        let _enter = span.enter();
        let from_node = self
            .node(from)
            .ok_or_else(|| TopologyError::UnknownIdentity(from.clone()))?;
        let to_node = self
            .node(to)
            .ok_or_else(|| TopologyError::UnknownIdentity(to.clone()))?;
        let result = self.break_link(from_node, to_node);
        self.events.deliver();
        result
    }

    /// Split the segment holding `at` so that `at` starts a new segment.
    /// Returns `None` if `at` already starts its segment.
    pub fn split(&mut self, at: &NodeIdentity) -> Result<Option<SegmentId>, TopologyError> {
        let span = self.span.clone();
        let _enter = span.enter();
        let node = self
            .node(at)
            .ok_or_else(|| TopologyError::UnknownIdentity(at.clone()))?;
        let segment = self.nodes[node].segment;
        let result = self.split_segment(segment, node, true);
        self.events.deliver();
        result
    }

    /// Unregister a node, dropping its connections and detector. Unknown
    /// identities are a no-op returning `Ok(false)`.
    pub fn remove(&mut self, identity: &NodeIdentity) -> Result<bool, TopologyError> {
        let span = self.span.clone();
        let _enter = span.enter();
        let Some(node) = self.node(identity) else {
            return Ok(false);
        };
        self.detectors.remove(identity);
        let result = self.remove_node(node);
        if result.is_ok() {
            self.identities.remove(identity);
        }
        self.events.deliver();
        result.map(|()| true)
    }

    // -----------------------------------------------------------------------
    // Detectors
    // -----------------------------------------------------------------------

    /// Register `identity` as an auto-linking connector. Placement is
    /// attempted immediately and retried on every update until the
    /// connector's geometry resolves.
    pub fn add_detector(&mut self, identity: &NodeIdentity, accepts_input: bool, provides_output: bool) {
        let span = self.span.clone();
        let _enter = span.enter();
        self.get_or_create(identity);
        self.detectors.enqueue(Detector {
            identity: identity.clone(),
            accepts_input,
            provides_output,
        });
        self.place_pending_detectors();
        self.events.deliver();
    }

    pub fn remove_detector(&mut self, identity: &NodeIdentity) -> bool {
        self.detectors.remove(identity)
    }

    pub fn detectors(&self) -> &DetectorIndex {
        &self.detectors
    }

    pub fn set_resolver(&mut self, resolver: impl GeometryResolver + 'static) {
        self.resolver = Box::new(resolver);
    }

    /// Retry pending detectors against an explicit geometry source.
    pub fn retry_detectors(&mut self, resolver: &dyn GeometryResolver) {
        let span = self.span.clone();
        let _enter = span.enter();
        let requests = self.detectors.place_pending(resolver);
        self.apply_detector_links(requests);
        self.events.deliver();
    }

    fn place_pending_detectors(&mut self) {
        if self.detectors.pending_count() == 0 {
            return;
        }
        let requests = self.detectors.place_pending(self.resolver.as_ref());
        self.apply_detector_links(requests);
    }

    fn apply_detector_links(&mut self, requests: Vec<crate::detector::LinkRequest>) {
        for request in requests {
            let data = self.kind.detector_connection(request.bidirectional);
            let (from, _) = self.get_or_create(&request.from);
            let (to, _) = self.get_or_create(&request.to);
            if let Err(err) = self.make_link(from, to, data) {
                warn!(
                    parent: &self.span,
                    %err,
                    from = %request.from,
                    to = %request.to,
                    "detector link rejected"
                );
            }
        }
    }

    // -----------------------------------------------------------------------
    // Injection
    // -----------------------------------------------------------------------

    /// Queue an external delta for `segment`, applied at the next commit.
    pub fn inject(&self, segment: SegmentId, delta: K::Injection) -> Result<(), TopologyError> {
        let seg = self
            .segments
            .get(segment)
            .ok_or(TopologyError::UnknownSegment(segment))?;
        seg.injector.inject(delta);
        Ok(())
    }

    /// A cloneable, thread-safe handle for injecting into `segment`.
    pub fn injector(&self, segment: SegmentId) -> Option<Injector<K>> {
        self.segments.get(segment).map(|s| s.injector.clone())
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance the simulation by `delta_ticks`: join the previous predict,
    /// commit, and launch the next predict without waiting for it.
    pub fn update(&mut self, delta_ticks: Ticks) {
        let span = self.span.clone();
        let _enter = span.enter();

        self.join_predict();
        self.place_pending_detectors();

        let dt = delta_ticks as f64 * self.config.tick_seconds;
        self.sim.advance(delta_ticks, dt);
        self.commit(dt);
        self.launch_predict(dt);
        self.events.deliver();
    }

    /// Block until the in-flight predict finishes and store its results.
    /// A result for a segment dissolved since launch is merged into the
    /// segment that absorbed it; results for removed segments are discarded.
    pub fn join_predict(&mut self) {
        let Some(handle) = self.in_flight.take() else {
            return;
        };
        let redirects = std::mem::take(&mut self.redirects);
        let mut discarded = 0usize;
        for (segment, next) in handle.join() {
            let mut target = segment;
            while let Some(&survivor) = redirects.get(&target) {
                target = survivor;
            }
            match self.segments.get_mut(target) {
                Some(seg) => self.kind.merge_next(&mut seg.next, next),
                None => discarded += 1,
            }
        }
        if discarded > 0 {
            debug!(parent: &self.span, discarded, "dropped predictions for removed segments");
        }
    }

    /// Route the in-flight prediction for `absorbed` to `survivor` at join.
    pub(crate) fn redirect_prediction(&mut self, absorbed: SegmentId, survivor: SegmentId) {
        if self.in_flight.is_some() {
            self.redirects.insert(absorbed, survivor);
        }
    }

    pub fn has_pending_predict(&self) -> bool {
        self.in_flight.is_some()
    }

    fn commit(&mut self, dt: f64) {
        let tick = self.sim.tick;
        for (id, seg) in self.segments.iter_mut() {
            let injected = seg.injector.drain();
            let next = std::mem::take(&mut seg.next);
            self.kind.commit(dt, &mut seg.state, next, injected);
            self.events.emit(NetworkEvent::SegmentStateUpdated { segment: id, tick });
        }
        self.sim.phase = Phase::Committed;
        trace!(parent: &self.span, tick, segments = self.segments.len(), "committed");
    }

    fn launch_predict(&mut self, dt: f64) {
        let states: SecondaryMap<SegmentId, K::State> = self
            .segments
            .iter()
            .map(|(id, seg)| (id, seg.state.clone()))
            .collect();
        let jobs = self.predict_jobs();
        let states = Arc::new(states);
        let kind = Arc::clone(&self.kind);
        let handle = self
            .pool
            .submit_chunked(jobs, move |job| run_predict(kind.as_ref(), &states, dt, job));
        self.in_flight = Some(handle);
        self.sim.phase = Phase::Predicted;
    }

    /// Resolve every segment's connections against the current topology.
    /// Links whose far end lies in the same segment are skipped.
    pub(crate) fn predict_jobs(&self) -> Vec<PredictJob> {
        self.segments
            .iter()
            .map(|(id, seg)| {
                let links = seg
                    .connections
                    .iter()
                    .filter_map(|cid| {
                        let conn = self.connections.get(*cid)?;
                        let from_segment = self.nodes.get(conn.from)?.segment;
                        let to_segment = self.nodes.get(conn.to)?.segment;
                        let (role, neighbor) = if from_segment == id {
                            (LinkRole::From, to_segment)
                        } else {
                            (LinkRole::To, from_segment)
                        };
                        (neighbor != id).then_some(ResolvedLink {
                            data: conn.data,
                            role,
                            neighbor,
                        })
                    })
                    .collect();
                PredictJob { segment: id, links }
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Take every delivered notification, oldest first.
    pub fn drain_events(&mut self) -> Vec<NetworkEvent> {
        self.events.drain()
    }
}

impl<K: NetworkKind> Drop for Network<K> {
    fn drop(&mut self) {
        self.join_predict();
    }
}

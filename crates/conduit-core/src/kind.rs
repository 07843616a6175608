//! Per-network-type policy.
//!
//! A [`NetworkKind`] supplies everything the generic controller cannot know:
//! what physical state a segment carries, how it predicts and commits that
//! state, how external deltas are merged, and which connection payloads are
//! synthesized for split boundaries and detector links.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::connection::{ConnData, LinkRole};

/// Read-only view of one connection from the point of view of the segment
/// being predicted.
#[derive(Debug)]
pub struct LinkView<'a, S> {
    /// Payload of the connection.
    pub data: &'a ConnData,
    /// Which end of the connection the predicted segment holds.
    pub role: LinkRole,
    /// The neighbor segment's frozen current state.
    pub neighbor: &'a S,
}

/// Physics and policy hooks for one type of network.
pub trait NetworkKind: Send + Sync + 'static {
    /// Current physical state of a segment. Frozen for the whole predict phase.
    type State: Clone + Default + fmt::Debug + Send + Sync + 'static;
    /// Output of predict, owned by exactly one segment.
    type Next: Default + fmt::Debug + Send + 'static;
    /// Externally injected deltas accumulated between commits.
    type Injection: Default + fmt::Debug + Send + 'static;

    /// Human-readable name, used in dumps and log spans.
    fn name(&self) -> &str;

    /// Segment factory: the state of a freshly allocated segment.
    fn allocate_segment(&self) -> Self::State {
        Self::State::default()
    }

    /// Payload for connections synthesized when a segment is split.
    fn dissolveable_connection(&self) -> ConnData {
        ConnData::lossless()
    }

    /// Payload for links issued by the detector index. The default is
    /// lossless, so a one-way link between two unconnected detectors still
    /// dissolves them into one segment.
    fn detector_connection(&self, bidirectional: bool) -> ConnData {
        ConnData::lossless().with_bidirectional(bidirectional)
    }

    /// Compute the next-tick contribution for one segment from frozen state.
    fn predict(&self, dt: f64, own: &Self::State, links: &[LinkView<'_, Self::State>])
        -> Self::Next;

    /// Fold predicted and injected deltas into the current state.
    fn commit(&self, dt: f64, state: &mut Self::State, next: Self::Next, injected: Self::Injection);

    /// Fold a prediction made for a segment that has since been dissolved
    /// into the prediction of the segment that absorbed it.
    fn merge_next(&self, into: &mut Self::Next, other: Self::Next);

    /// Accumulate `delta` into a pending injection.
    fn merge_injection(&self, into: &mut Self::Injection, delta: Self::Injection);

    /// Called when a segment of `head_len + tail_len` nodes is split. May
    /// move part of `head` into the returned tail state.
    fn split_state(&self, head: &mut Self::State, head_len: usize, tail_len: usize) -> Self::State {
        let _ = (head, head_len, tail_len);
        self.allocate_segment()
    }

    /// Called when `absorbed` is dissolved into `survivor`.
    fn merge_state(&self, survivor: &mut Self::State, absorbed: Self::State) {
        let _ = (survivor, absorbed);
    }

    /// One-line description of a segment's state for diagnostics.
    fn dump_state(&self, state: &Self::State) -> String {
        format!("{state:?}")
    }
}

// ---------------------------------------------------------------------------
// Injector
// ---------------------------------------------------------------------------

/// Thread-safe handle for adding deltas to a segment between ticks.
///
/// Clones share the same accumulator. The accumulator is drained once per
/// commit; a handle kept past its segment's destruction writes into a buffer
/// nobody drains.
pub struct Injector<K: NetworkKind> {
    kind: Arc<K>,
    pending: Arc<Mutex<K::Injection>>,
}

impl<K: NetworkKind> Clone for Injector<K> {
    fn clone(&self) -> Self {
        Self {
            kind: Arc::clone(&self.kind),
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<K: NetworkKind> fmt::Debug for Injector<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("pending", &*self.lock())
            .finish()
    }
}

impl<K: NetworkKind> Injector<K> {
    pub(crate) fn new(kind: Arc<K>) -> Self {
        Self {
            kind,
            pending: Arc::new(Mutex::new(K::Injection::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, K::Injection> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a delta for the next commit. Callable from any thread.
    pub fn inject(&self, delta: K::Injection) {
        let mut pending = self.lock();
        self.kind.merge_injection(&mut pending, delta);
    }

    /// Take everything accumulated since the last drain.
    pub(crate) fn drain(&self) -> K::Injection {
        std::mem::take(&mut *self.lock())
    }

    /// Whether two handles feed the same segment.
    pub fn same_segment(&self, other: &Injector<K>) -> bool {
        Arc::ptr_eq(&self.pending, &other.pending)
    }
}

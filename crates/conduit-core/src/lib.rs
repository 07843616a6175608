//! Conduit Core -- segment-based transport networks with two-phase ticks.
//!
//! A network is a set of nodes (connectors identified by owner and path)
//! grouped into segments: ordered chains simulated as one unit. Lossless
//! links between unconnected segment ends merge the segments; every other
//! link is an explicit connection whose payload limits and filters what
//! crosses it.
//!
//! # Two-Phase Tick
//!
//! Each call to [`network::Network::update`]:
//!
//! 1. **Join** -- Wait for the previous predict and store its results.
//! 2. **Detectors** -- Retry placement of pending auto-link detectors.
//! 3. **Commit** -- Fold predicted and injected deltas into segment state.
//! 4. **Predict** -- Launch background predict over a frozen snapshot.
//!
//! Predict never sees a half-committed state: it runs on an owned snapshot,
//! and the next commit joins it first.
//!
//! # Key Types
//!
//! - [`network::Network`] -- Controller owning one topology and its tick.
//! - [`kind::NetworkKind`] -- Physics and policy hooks for a network type.
//! - [`connection::ConnData`] -- Throughput, color filter and direction.
//! - [`segment::Segment`] -- Path, touching connections, state, injector.
//! - [`detector::DetectorIndex`] -- Spatial auto-linking over an AABB tree.
//! - [`event::EventBus`] -- Buffered notifications with passive listeners.

pub mod aabb;
pub mod config;
pub mod connection;
pub mod detector;
pub mod diagnostics;
pub mod event;
pub mod id;
pub mod kind;
pub mod network;
pub mod segment;
pub mod sim;
pub mod task;
pub mod topology;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{ConfigError, ExecutionMode, NetworkConfig};
pub use connection::{ConnData, Connection, LinkRole};
pub use id::{ConnectionId, NodeId, NodeIdentity, OwnerId, SegmentId};
pub use kind::{Injector, LinkView, NetworkKind};
pub use network::{Network, NetworkBuilder};
pub use topology::{LinkOutcome, TopologyError};

//! Beam networks for Conduit.
//!
//! Segments carry colored energy. Each tick every explicit connection moves
//! half the energy difference between its two segments (capped by the
//! connection's throughput and direction), tinting incoming energy by the
//! connection's color filter. Consumers draw energy through injection; what
//! they draw becomes the segment's output rate.
//!
//! # Design
//!
//! - Color is tracked as energy-weighted mass so mixing is order independent.
//! - Filters tint but never attenuate: energy is conserved across links.
//! - Energy is not clamped at zero; overdrawn segments go negative.
//! - Splits apportion energy by path length; dissolves sum it.

pub mod color;

use conduit_core::connection::LinkRole;
use conduit_core::id::{NodeIdentity, SegmentId};
use conduit_core::kind::{LinkView, NetworkKind};
use conduit_core::network::Network;
use conduit_core::topology::TopologyError;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

pub use color::Color;
use color::add_mass;

/// Energy below this is treated as empty: the segment keeps its last color.
pub const ENERGY_EPSILON: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Tunables for beam physics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamConfig {
    /// Weight of the newest sample in the smoothed output average.
    pub smoothing: f64,
    /// Filters whose channels sum below this are treated as nearly opaque.
    pub min_filter_sum: f64,
    /// Uniform filter used in place of a nearly opaque one.
    pub faint_tint: f64,
}

impl Default for BeamConfig {
    fn default() -> Self {
        Self {
            smoothing: 0.05,
            min_filter_sum: 0.01,
            faint_tint: 0.05,
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Physical state of one beam segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamState {
    pub energy: f64,
    pub color: Color,
    /// Energy drawn per second during the last commit.
    pub output: f64,
    /// Exponential moving average of `output`.
    pub output_smoothed: f64,
}

impl Default for BeamState {
    fn default() -> Self {
        Self {
            energy: 0.0,
            color: Color::WHITE,
            output: 0.0,
            output_smoothed: 0.0,
        }
    }
}

impl BeamState {
    fn mass(&self) -> [f64; 4] {
        self.color.scale(self.energy)
    }
}

/// Predicted change for one segment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BeamNext {
    pub energy: f64,
    pub color_mass: [f64; 4],
}

/// Externally supplied and drawn energy accumulated between commits.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BeamInjection {
    pub energy: f64,
    pub color_mass: [f64; 4],
    /// Energy consumers removed; reported as output.
    pub drawn: f64,
}

impl BeamInjection {
    /// Positive amounts add `color`ed energy; negative amounts are drawn.
    pub fn amount(amount: f64, color: Color) -> Self {
        if amount >= 0.0 {
            Self {
                energy: amount,
                color_mass: color.scale(amount),
                drawn: 0.0,
            }
        } else {
            Self {
                drawn: -amount,
                ..Self::default()
            }
        }
    }

    pub fn draw(amount: f64) -> Self {
        Self::amount(-amount.abs(), Color::WHITE)
    }
}

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// Beam physics for [`Network`].
#[derive(Debug, Clone, Default)]
pub struct BeamKind {
    config: BeamConfig,
}

pub type BeamNetwork = Network<BeamKind>;

impl BeamKind {
    pub fn new(config: BeamConfig) -> Self {
        let config = BeamConfig {
            smoothing: config.smoothing.clamp(0.0, 1.0),
            ..config
        };
        debug!(?config, "beam kind configured");
        Self { config }
    }

    pub fn config(&self) -> &BeamConfig {
        &self.config
    }

    /// The filter actually applied to flow crossing a connection.
    pub fn effective_filter(&self, filter: [f64; 4]) -> [f64; 4] {
        if filter.iter().sum::<f64>() < self.config.min_filter_sum {
            [self.config.faint_tint; 4]
        } else {
            filter
        }
    }
}

impl NetworkKind for BeamKind {
    type State = BeamState;
    type Next = BeamNext;
    type Injection = BeamInjection;

    fn name(&self) -> &str {
        "beam"
    }

    fn predict(&self, dt: f64, own: &BeamState, links: &[LinkView<'_, BeamState>]) -> BeamNext {
        let mut next = BeamNext::default();
        for link in links {
            let limit = link.data.flow_limit(dt);
            let mut delta = ((link.neighbor.energy - own.energy) / 2.0).max(-limit).min(limit);
            if !link.data.bidirectional {
                delta = match link.role {
                    LinkRole::From => delta.min(0.0),
                    LinkRole::To => delta.max(0.0),
                };
            }
            if delta > 0.0 {
                let tint = link
                    .neighbor
                    .color
                    .modulate(self.effective_filter(link.data.filter));
                add_mass(&mut next.color_mass, tint.scale(delta));
            } else if delta < 0.0 {
                add_mass(&mut next.color_mass, own.color.scale(delta));
            }
            next.energy += delta;
        }
        next
    }

    fn commit(&self, dt: f64, state: &mut BeamState, next: BeamNext, injected: BeamInjection) {
        let mut mass = state.mass();
        add_mass(&mut mass, next.color_mass);
        add_mass(&mut mass, injected.color_mass);
        add_mass(&mut mass, state.color.scale(-injected.drawn));

        state.energy += next.energy + injected.energy - injected.drawn;
        if state.energy > ENERGY_EPSILON {
            state.color = Color::from_mass(mass, state.energy);
        }

        state.output = if dt > ENERGY_EPSILON {
            injected.drawn / dt
        } else {
            0.0
        };
        state.output_smoothed += self.config.smoothing * (state.output - state.output_smoothed);

        if state.energy < 0.0 {
            trace!(energy = state.energy, "segment overdrawn");
        }
    }

    fn merge_next(&self, into: &mut BeamNext, other: BeamNext) {
        into.energy += other.energy;
        add_mass(&mut into.color_mass, other.color_mass);
    }

    fn merge_injection(&self, into: &mut BeamInjection, delta: BeamInjection) {
        into.energy += delta.energy;
        add_mass(&mut into.color_mass, delta.color_mass);
        into.drawn += delta.drawn;
    }

    fn split_state(&self, head: &mut BeamState, head_len: usize, tail_len: usize) -> BeamState {
        let total = (head_len + tail_len) as f64;
        let tail_energy = head.energy * tail_len as f64 / total;
        head.energy -= tail_energy;
        BeamState {
            energy: tail_energy,
            color: head.color,
            ..BeamState::default()
        }
    }

    fn merge_state(&self, survivor: &mut BeamState, absorbed: BeamState) {
        let mut mass = survivor.mass();
        add_mass(&mut mass, absorbed.mass());
        survivor.energy += absorbed.energy;
        if survivor.energy > ENERGY_EPSILON {
            survivor.color = Color::from_mass(mass, survivor.energy);
        }
        survivor.output += absorbed.output;
        survivor.output_smoothed += absorbed.output_smoothed;
    }

    fn dump_state(&self, state: &BeamState) -> String {
        let [r, g, b, a] = state.color.0;
        format!(
            "energy {:.3}, color ({r:.2}, {g:.2}, {b:.2}, {a:.2}), output {:.3} (smoothed {:.3})",
            state.energy, state.output, state.output_smoothed
        )
    }
}

// ---------------------------------------------------------------------------
// Network helpers
// ---------------------------------------------------------------------------

/// Beam-specific conveniences on [`BeamNetwork`].
pub trait BeamNetworkExt {
    /// Queue `amount` of `color`ed energy (negative draws) for `segment`.
    fn supply(&self, segment: SegmentId, amount: f64, color: Color) -> Result<(), TopologyError>;

    /// Sum of energy across all segments.
    fn total_energy(&self) -> f64;

    /// State of the segment holding `identity`.
    fn beam_state(&self, identity: &NodeIdentity) -> Option<&BeamState>;
}

impl BeamNetworkExt for BeamNetwork {
    fn supply(&self, segment: SegmentId, amount: f64, color: Color) -> Result<(), TopologyError> {
        self.inject(segment, BeamInjection::amount(amount, color))
    }

    fn total_energy(&self) -> f64 {
        self.segments().map(|(_, seg)| seg.state().energy).sum()
    }

    fn beam_state(&self, identity: &NodeIdentity) -> Option<&BeamState> {
        self.segment_of(identity).and_then(|s| self.state(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::config::NetworkConfig;
    use conduit_core::connection::ConnData;
    use conduit_core::test_utils::ident;

    fn network() -> BeamNetwork {
        Network::new(BeamKind::default(), NetworkConfig::inline()).unwrap()
    }

    fn energy(net: &BeamNetwork, name: &str) -> f64 {
        net.beam_state(&ident(1, name)).unwrap().energy
    }

    fn supply(net: &BeamNetwork, name: &str, amount: f64, color: Color) {
        let segment = net.segment_of(&ident(1, name)).unwrap();
        net.supply(segment, amount, color).unwrap();
    }

    /// Link A and B, seed them, and commit the seed.
    fn pair(data: ConnData, a: f64, b: f64) -> BeamNetwork {
        let mut net = network();
        net.link(&ident(1, "A"), &ident(1, "B"), data).unwrap();
        supply(&net, "A", a, Color::WHITE);
        supply(&net, "B", b, Color::WHITE);
        net.update(1);
        net
    }

    #[test]
    fn symmetric_link_equalizes() {
        let mut net = pair(ConnData::limited(1.0e6), 100.0, 20.0);
        net.update(1);
        assert_eq!(energy(&net, "A"), 60.0);
        assert_eq!(energy(&net, "B"), 60.0);
    }

    #[test]
    fn throughput_caps_flow() {
        let mut net = pair(ConnData::limited(10.0), 100.0, 20.0);
        net.update(1);
        assert_eq!(energy(&net, "A"), 90.0);
        assert_eq!(energy(&net, "B"), 30.0);
    }

    #[test]
    fn negative_or_nan_throughput_moves_nothing() {
        for throughput in [-5.0, f64::NAN] {
            let mut data = ConnData::limited(1.0);
            data.max_throughput = throughput;
            let mut net = pair(data, 100.0, 20.0);
            net.update(1);
            assert_eq!(energy(&net, "A"), 100.0);
            assert_eq!(energy(&net, "B"), 20.0);
        }
    }

    #[test]
    fn one_way_link_blocks_reverse_flow() {
        let mut net = pair(ConnData::limited(1.0e6).one_way(), 20.0, 100.0);
        net.update(1);
        assert_eq!(energy(&net, "A"), 20.0);
        assert_eq!(energy(&net, "B"), 100.0);

        let mut net = pair(ConnData::limited(1.0e6).one_way(), 100.0, 20.0);
        net.update(1);
        assert_eq!(energy(&net, "A"), 60.0);
        assert_eq!(energy(&net, "B"), 60.0);
    }

    #[test]
    fn filter_tints_without_attenuating() {
        let mut net = network();
        net.link(
            &ident(1, "A"),
            &ident(1, "B"),
            ConnData::limited(1.0e6).with_filter([0.5, 1.0, 1.0, 1.0]),
        )
        .unwrap();
        supply(&net, "A", 100.0, Color::new(1.0, 0.0, 0.0, 1.0));
        net.update(1);
        net.update(1);

        let a = net.beam_state(&ident(1, "A")).unwrap();
        let b = net.beam_state(&ident(1, "B")).unwrap();
        assert_eq!(a.energy, 50.0);
        assert_eq!(b.energy, 50.0);
        assert_eq!(a.color, Color::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(b.color, Color::new(0.5, 0.0, 0.0, 1.0));
    }

    #[test]
    fn opaque_filter_uses_faint_tint() {
        let mut net = network();
        net.link(
            &ident(1, "A"),
            &ident(1, "B"),
            ConnData::limited(1.0e6).with_filter([0.0; 4]),
        )
        .unwrap();
        supply(&net, "A", 100.0, Color::WHITE);
        net.update(1);
        net.update(1);

        let b = net.beam_state(&ident(1, "B")).unwrap();
        assert_eq!(b.energy, 50.0);
        for channel in b.color.0 {
            assert!((channel - 0.05).abs() < 1e-12);
        }
    }

    #[test]
    fn overdraw_goes_negative_and_reports_output() {
        let mut net = network();
        net.get_or_create(&ident(1, "A"));
        supply(&net, "A", 10.0, Color::WHITE);
        net.update(1);
        supply(&net, "A", -50.0, Color::WHITE);
        net.update(1);

        let a = net.beam_state(&ident(1, "A")).unwrap();
        assert_eq!(a.energy, -40.0);
        assert_eq!(a.output, 50.0);
        assert_eq!(a.color, Color::WHITE);
    }

    #[test]
    fn output_is_smoothed() {
        let mut net = network();
        net.get_or_create(&ident(1, "A"));
        supply(&net, "A", 1000.0, Color::WHITE);
        net.update(1);

        supply(&net, "A", -50.0, Color::WHITE);
        net.update(1);
        let first = net.beam_state(&ident(1, "A")).unwrap().output_smoothed;
        assert!((first - 2.5).abs() < 1e-12);

        supply(&net, "A", -50.0, Color::WHITE);
        net.update(1);
        let second = net.beam_state(&ident(1, "A")).unwrap().output_smoothed;
        assert!((second - (2.5 + 0.05 * 47.5)).abs() < 1e-12);

        net.update(1);
        let idle = net.beam_state(&ident(1, "A")).unwrap();
        assert_eq!(idle.output, 0.0);
        assert!(idle.output_smoothed < second);
    }

    #[test]
    fn zero_dt_reports_no_output() {
        let kind = BeamKind::default();
        let mut state = BeamState {
            energy: 10.0,
            ..BeamState::default()
        };
        kind.commit(0.0, &mut state, BeamNext::default(), BeamInjection::draw(5.0));
        assert_eq!(state.energy, 5.0);
        assert_eq!(state.output, 0.0);
    }

    #[test]
    fn links_conserve_energy() {
        let mut net = network();
        let names = ["A", "B", "C", "D"];
        for pair in names.windows(2) {
            net.link(&ident(1, pair[0]), &ident(1, pair[1]), ConnData::limited(7.0))
                .unwrap();
        }
        supply(&net, "A", 80.0, Color::WHITE);
        supply(&net, "D", 16.0, Color::new(0.0, 0.0, 1.0, 1.0));
        net.update(1);
        for _ in 0..25 {
            net.update(1);
            assert!((net.total_energy() - 96.0).abs() < 1e-9);
        }
    }

    #[test]
    fn split_and_dissolve_conserve_energy() {
        let mut net = network();
        let names = ["A", "B", "C", "D"];
        for pair in names.windows(2) {
            net.link(&ident(1, pair[0]), &ident(1, pair[1]), ConnData::lossless())
                .unwrap();
        }
        supply(&net, "A", 40.0, Color::new(0.0, 1.0, 0.0, 1.0));
        net.update(1);

        net.split(&ident(1, "C")).unwrap();
        assert_eq!(energy(&net, "A"), 20.0);
        assert_eq!(energy(&net, "C"), 20.0);
        assert_eq!(
            net.beam_state(&ident(1, "C")).unwrap().color,
            Color::new(0.0, 1.0, 0.0, 1.0)
        );

        net.link(&ident(1, "D"), &ident(1, "E"), ConnData::lossless())
            .unwrap();
        assert!((net.total_energy() - 40.0).abs() < 1e-12);
    }

    #[test]
    fn merge_blends_color_by_energy() {
        let kind = BeamKind::default();
        let mut survivor = BeamState {
            energy: 30.0,
            color: Color::new(1.0, 0.0, 0.0, 1.0),
            ..BeamState::default()
        };
        let absorbed = BeamState {
            energy: 10.0,
            color: Color::new(0.0, 0.0, 1.0, 1.0),
            ..BeamState::default()
        };
        kind.merge_state(&mut survivor, absorbed);
        assert_eq!(survivor.energy, 40.0);
        assert_eq!(survivor.color, Color::new(0.75, 0.0, 0.25, 1.0));
    }

    #[test]
    fn smoothing_is_clamped() {
        let kind = BeamKind::new(BeamConfig {
            smoothing: 3.0,
            ..BeamConfig::default()
        });
        assert_eq!(kind.config().smoothing, 1.0);
    }
}

//! Tick bookkeeping for the predict/commit protocol.

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Where a controller is in its tick cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No tick has run yet.
    #[default]
    Idle,
    /// Commit finished; predict has not been launched.
    Committed,
    /// Predict launched (possibly still running in the background).
    Predicted,
}

/// Mutable tick state tracked by a controller.
#[derive(Debug, Clone, Default)]
pub struct SimState {
    /// Ticks elapsed since the controller was created.
    pub tick: Ticks,
    /// Seconds covered by the most recent update.
    pub last_dt: f64,
    pub phase: Phase,
}

impl SimState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an update of `delta_ticks` lasting `dt` seconds.
    pub(crate) fn advance(&mut self, delta_ticks: Ticks, dt: f64) {
        self.tick += delta_ticks;
        self.last_dt = dt;
    }
}

//! Controller configuration.

use serde::{Deserialize, Serialize};

/// Errors from [`NetworkConfig::validate`].
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("tick_seconds must be finite and positive, got {0}")]
    InvalidTickSeconds(f64),
    #[error("predict_chunk_size must be at least 1")]
    ZeroChunkSize,
    #[error("worker_threads must be at least 1 when set")]
    ZeroWorkers,
}

/// Where the predict phase runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Predict is launched on the worker pool and joined by the next update.
    #[default]
    Background,
    /// Predict runs to completion on the calling thread during update.
    Inline,
}

/// Tunables for one network controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Simulated seconds per tick. `update(n)` advances `n * tick_seconds`.
    pub tick_seconds: f64,
    /// Segments per work item handed to the worker pool.
    pub predict_chunk_size: usize,
    /// Worker pool size. `None` uses rayon's default.
    pub worker_threads: Option<usize>,
    pub execution: ExecutionMode,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 1.0 / 60.0,
            predict_chunk_size: 32,
            worker_threads: None,
            execution: ExecutionMode::Background,
        }
    }
}

impl NetworkConfig {
    /// Inline execution with one-second ticks. Handy for tests and tools.
    pub fn inline() -> Self {
        Self {
            tick_seconds: 1.0,
            execution: ExecutionMode::Inline,
            ..Self::default()
        }
    }

    pub fn with_tick_seconds(mut self, tick_seconds: f64) -> Self {
        self.tick_seconds = tick_seconds;
        self
    }

    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tick_seconds.is_finite() || self.tick_seconds <= 0.0 {
            return Err(ConfigError::InvalidTickSeconds(self.tick_seconds));
        }
        if self.predict_chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.worker_threads == Some(0) {
            return Err(ConfigError::ZeroWorkers);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = NetworkConfig::default();
        assert_eq!(config.predict_chunk_size, 32);
        assert_eq!(config.execution, ExecutionMode::Background);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_tick_seconds() {
        let config = NetworkConfig::default().with_tick_seconds(0.0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidTickSeconds(0.0)));

        let config = NetworkConfig::default().with_tick_seconds(f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_chunk_and_workers() {
        let config = NetworkConfig {
            predict_chunk_size: 0,
            ..NetworkConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroChunkSize));

        let config = NetworkConfig {
            worker_threads: Some(0),
            ..NetworkConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroWorkers));
    }
}

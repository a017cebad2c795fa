//! Run configuration loaded from TOML.

use std::time::Duration;

use chronopath_core::{Layout, Position};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading or validating a [`SimulationConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// The grid has no playable cells.
    #[error("grid must be at least 1x1, got {width}x{height}")]
    EmptyGrid {
        /// Configured columns.
        width: u32,
        /// Configured rows.
        height: u32,
    },
    /// An endpoint lies outside the grid.
    #[error("{role} {position:?} lies outside the {width}x{height} grid")]
    EndpointOutOfBounds {
        /// Which endpoint was rejected.
        role: &'static str,
        /// Rejected position.
        position: Position,
        /// Configured columns.
        width: u32,
        /// Configured rows.
        height: u32,
    },
    /// Start and goal share a cell.
    #[error("start and goal share cell {0:?}")]
    StartIsGoal(Position),
    /// The history cannot retain any snapshot.
    #[error("history capacity must be at least 1")]
    ZeroCapacity,
    /// The evaluator would never be consulted.
    #[error("rewind comparison window must be at least 1 tick")]
    ZeroComparisonWindow,
    /// Playback speed must be a positive finite number.
    #[error("rewind speed must be positive and finite, got {0}")]
    InvalidRewindSpeed(f64),
    /// A run needs at least one episode.
    #[error("run must contain at least one episode")]
    ZeroEpisodes,
}

/// Complete configuration of a simulation run.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Grid dimensions, endpoints and layout.
    pub grid: GridConfig,
    /// Snapshot history settings.
    pub history: HistoryConfig,
    /// Rewind decision and playback settings.
    pub rewind: RewindConfig,
    /// Runtime tile drift.
    pub drift: DriftConfig,
    /// Episode count, seed and clock.
    pub run: RunConfig,
}

/// Grid dimensions, endpoints and layout.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    /// Playable columns.
    pub width: u32,
    /// Playable rows.
    pub height: u32,
    /// Cell every episode starts on.
    pub start: Position,
    /// Cell the agent travels toward.
    pub goal: Position,
    /// Wall pattern determining the dynamic tiles.
    pub layout: Layout,
    /// Dynamic tiles opened at the start of every episode.
    pub holes: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 12,
            height: 8,
            start: Position::new(0, 0),
            goal: Position::new(11, 7),
            layout: Layout::ZigZag,
            holes: 4,
        }
    }
}

/// Snapshot history settings.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    /// Snapshots retained; rewinds may reach back `capacity - 1` snapshots.
    pub capacity: usize,
    /// Simulated time between snapshots.
    pub snapshot_period_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            snapshot_period_ms: 500,
        }
    }
}

/// Rewind decision and playback settings.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RewindConfig {
    /// Penalty of the first rewind; the n-th rewind costs `n * base_cost`.
    pub base_cost: u32,
    /// Running ticks between evaluations.
    pub comparison_window: u32,
    /// Playback speed multiplier.
    pub rewind_speed: f64,
}

impl Default for RewindConfig {
    fn default() -> Self {
        Self {
            base_cost: 20,
            comparison_window: 3,
            rewind_speed: 1.0,
        }
    }
}

/// Runtime tile drift; `period_ticks = 0` disables it.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriftConfig {
    /// Running ticks between drifts.
    pub period_ticks: u32,
    /// Dynamic tiles toggled per drift.
    pub tiles: u32,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            period_ticks: 5,
            tiles: 4,
        }
    }
}

/// Episode count, seed and clock.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Episodes to simulate before the run completes.
    pub episodes: u32,
    /// Seed of the world's random source.
    pub seed: u64,
    /// Simulated time advanced per tick.
    pub tick_ms: u64,
    /// Ticks after which an episode is abandoned; 0 means unlimited.
    pub max_ticks_per_episode: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            episodes: 5,
            seed: 7,
            tick_ms: 100,
            max_ticks_per_episode: 1_000,
        }
    }
}

impl SimulationConfig {
    /// Parses and validates a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the controller cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let GridConfig {
            width,
            height,
            start,
            goal,
            ..
        } = self.grid;
        if width == 0 || height == 0 {
            return Err(ConfigError::EmptyGrid { width, height });
        }
        for (role, position) in [("start", start), ("goal", goal)] {
            let inside = position.x() >= 0
                && position.y() >= 0
                && i64::from(position.x()) < i64::from(width)
                && i64::from(position.y()) < i64::from(height);
            if !inside {
                return Err(ConfigError::EndpointOutOfBounds {
                    role,
                    position,
                    width,
                    height,
                });
            }
        }
        if start == goal {
            return Err(ConfigError::StartIsGoal(start));
        }
        if self.history.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.rewind.comparison_window == 0 {
            return Err(ConfigError::ZeroComparisonWindow);
        }
        let speed = self.rewind.rewind_speed;
        if !speed.is_finite() || speed <= 0.0 {
            return Err(ConfigError::InvalidRewindSpeed(speed));
        }
        if self.run.episodes == 0 {
            return Err(ConfigError::ZeroEpisodes);
        }
        Ok(())
    }

    /// Simulated time between snapshots.
    #[must_use]
    pub fn snapshot_period(&self) -> Duration {
        Duration::from_millis(self.history.snapshot_period_ms)
    }

    /// Time between playback steps: five snapshot periods divided by the rewind speed.
    ///
    /// Speeds so small that the period overflows saturate at [`Duration::MAX`].
    #[must_use]
    pub fn playback_period(&self) -> Duration {
        let seconds = self.snapshot_period().as_secs_f64() * 5.0 / self.rewind.rewind_speed;
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    }

    /// Simulated time advanced per tick.
    #[must_use]
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.run.tick_ms)
    }
}

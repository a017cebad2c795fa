#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Tick-driven controller that plans, moves, records and rewinds.
//!
//! The [`SimulationController`] owns the world, the snapshot history, the
//! pathfinder and the rewind evaluator. Drivers hand it elapsed time through
//! [`SimulationController::tick`] and receive everything that happened as
//! [`Event`] values.

pub mod config;

use std::time::Duration;

use chronopath_core::{
    Command, EpisodeOutcome, EpisodeSummary, Event, Path, RunAverages, SimulationState,
    WorldSnapshot,
};
use chronopath_system_pathfinding::{Pathfinder, PathfindingError};
use chronopath_system_rewind::{RewindDecision, RewindEvaluator};
use chronopath_world::{self as world, query, HistoryBuffer, HistoryError, World, WorldError};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use config::{
    ConfigError, DriftConfig, GridConfig, HistoryConfig, RewindConfig, RunConfig,
    SimulationConfig,
};

/// Reasons a rewind request may be refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum RewindError {
    /// Rewinds are only accepted while running.
    #[error("rewinds are only accepted while running, not while {state:?}")]
    NotRunning {
        /// State the controller was in.
        state: SimulationState,
    },
    /// The requested depth can never be retained by the history.
    #[error("cannot rewind {snapshots_ago} snapshots with a history capacity of {capacity}")]
    OutOfRange {
        /// Requested depth.
        snapshots_ago: usize,
        /// Configured history capacity.
        capacity: usize,
    },
    /// The requested depth fits the capacity but was not recorded yet.
    #[error("cannot rewind {snapshots_ago} snapshots, only {recorded} recorded")]
    NotRecorded {
        /// Requested depth.
        snapshots_ago: usize,
        /// Snapshots currently retained.
        recorded: usize,
    },
}

/// Fatal errors raised while building or ticking the controller.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The world refused a command.
    #[error(transparent)]
    World(#[from] WorldError),
    /// A recorded snapshot could not be read back.
    #[error(transparent)]
    History(#[from] HistoryError),
    /// The planner was asked to search from or to an invalid cell.
    #[error(transparent)]
    Pathfinding(#[from] PathfindingError),
    /// An automatic rewind was refused.
    #[error(transparent)]
    Rewind(#[from] RewindError),
}

/// Per-episode summaries collected over a run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunStatistics {
    summaries: Vec<EpisodeSummary>,
}

impl RunStatistics {
    /// Appends the summary of a finished episode.
    pub fn record(&mut self, summary: EpisodeSummary) {
        self.summaries.push(summary);
    }

    /// Finished episodes in completion order.
    #[must_use]
    pub fn summaries(&self) -> &[EpisodeSummary] {
        &self.summaries
    }

    /// Mean final cost and mean rewinds over every finished episode.
    #[must_use]
    pub fn averages(&self) -> RunAverages {
        let episodes = u32::try_from(self.summaries.len()).unwrap_or(u32::MAX);
        if episodes == 0 {
            return RunAverages::default();
        }

        let count = f64::from(episodes);
        let total_cost: f64 = self
            .summaries
            .iter()
            .map(|summary| f64::from(summary.final_cost))
            .sum();
        let total_rewinds: f64 = self
            .summaries
            .iter()
            .map(|summary| f64::from(summary.rewinds_used))
            .sum();
        RunAverages {
            episodes,
            mean_cost: total_cost / count,
            mean_rewinds: total_rewinds / count,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Playback {
    target: usize,
    restored: Option<usize>,
    timer: Duration,
}

/// Owns the whole simulation and advances it one tick at a time.
#[derive(Debug)]
pub struct SimulationController {
    config: SimulationConfig,
    world: World,
    history: HistoryBuffer<WorldSnapshot>,
    pathfinder: Pathfinder,
    evaluator: RewindEvaluator,
    state: SimulationState,
    playback: Option<Playback>,
    snapshot_period: Duration,
    playback_period: Duration,
    snapshot_timer: Duration,
    episode: u32,
    episode_ticks: u64,
    running_ticks: u64,
    statistics: RunStatistics,
    finished: bool,
}

impl SimulationController {
    /// Validates the configuration, builds the grid and prepares the first episode.
    ///
    /// The controller starts [`SimulationState::Paused`]; call
    /// [`SimulationController::start`] to begin.
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;

        let mut world = World::new();
        let mut events = Vec::new();
        world::apply(
            &mut world,
            Command::ConfigureGrid {
                width: config.grid.width,
                height: config.grid.height,
                start: config.grid.start,
                goal: config.grid.goal,
                layout: config.grid.layout,
                seed: config.run.seed,
            },
            &mut events,
        )?;
        world::apply(
            &mut world,
            Command::ResetLayout {
                holes: config.grid.holes,
            },
            &mut events,
        )?;
        debug!(?events, "world prepared");

        let capacity = config.history.capacity;
        let snapshot_period = config.snapshot_period();
        Ok(Self {
            history: HistoryBuffer::new(capacity),
            pathfinder: Pathfinder::new(),
            evaluator: RewindEvaluator::new(capacity, config.rewind.base_cost),
            state: SimulationState::Paused,
            playback: None,
            snapshot_period,
            playback_period: config.playback_period(),
            snapshot_timer: snapshot_period,
            episode: 1,
            episode_ticks: 0,
            running_ticks: 0,
            statistics: RunStatistics::default(),
            finished: false,
            world,
            config,
        })
    }

    /// Configuration the controller was built with.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Authoritative world, for read-only queries.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Snapshots recorded during the current episode, most recent first.
    #[must_use]
    pub fn history(&self) -> &HistoryBuffer<WorldSnapshot> {
        &self.history
    }

    /// Current controller state.
    #[must_use]
    pub fn state(&self) -> SimulationState {
        self.state
    }

    /// One-based number of the episode in progress.
    #[must_use]
    pub fn episode(&self) -> u32 {
        self.episode
    }

    /// Rewinds used during the episode in progress.
    #[must_use]
    pub fn rewinds_used(&self) -> u32 {
        self.evaluator.rewinds_used()
    }

    /// Summaries of every finished episode.
    #[must_use]
    pub fn statistics(&self) -> &RunStatistics {
        &self.statistics
    }

    /// Reports whether the run completed or was stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Leaves [`SimulationState::Paused`], resuming an interrupted playback if any.
    pub fn start(&mut self, out_events: &mut Vec<Event>) {
        if self.finished || self.state != SimulationState::Paused {
            return;
        }
        let state = if self.playback.is_some() {
            SimulationState::Rewinding
        } else {
            SimulationState::Running
        };
        self.change_state(state, out_events);
    }

    /// Suspends ticking without discarding any progress.
    pub fn pause(&mut self, out_events: &mut Vec<Event>) {
        if self.state != SimulationState::Paused {
            self.change_state(SimulationState::Paused, out_events);
        }
    }

    /// Ends the run early, reporting averages over the finished episodes.
    pub fn stop(&mut self, out_events: &mut Vec<Event>) {
        if self.finished {
            return;
        }
        self.complete_run(out_events);
    }

    /// Schedules playback toward the snapshot recorded `snapshots_ago` pushes ago.
    ///
    /// Automatic rewinds chosen by the evaluator go through the same entry point.
    pub fn request_rewind(
        &mut self,
        snapshots_ago: usize,
        out_events: &mut Vec<Event>,
    ) -> Result<(), RewindError> {
        if self.state != SimulationState::Running {
            return Err(RewindError::NotRunning { state: self.state });
        }
        let capacity = self.history.capacity();
        if snapshots_ago >= capacity {
            return Err(RewindError::OutOfRange {
                snapshots_ago,
                capacity,
            });
        }
        let recorded = self.history.len();
        if snapshots_ago >= recorded {
            return Err(RewindError::NotRecorded {
                snapshots_ago,
                recorded,
            });
        }

        let penalty = self.evaluator.penalty();
        self.evaluator.commit_rewind(snapshots_ago);
        info!(
            episode = self.episode,
            snapshots_ago,
            penalty,
            rewinds_used = self.evaluator.rewinds_used(),
            "rewind scheduled"
        );
        out_events.push(Event::RewindScheduled {
            snapshots_ago,
            penalty,
        });
        self.playback = Some(Playback {
            target: snapshots_ago,
            restored: None,
            timer: Duration::ZERO,
        });
        self.change_state(SimulationState::Rewinding, out_events);
        Ok(())
    }

    /// Advances the simulation by `dt` of simulated time.
    pub fn tick(&mut self, dt: Duration, out_events: &mut Vec<Event>) -> Result<(), SimulationError> {
        match self.state {
            SimulationState::Paused => return Ok(()),
            SimulationState::Running => {
                self.episode_ticks += 1;
                if self.tick_running(dt, out_events)? {
                    return Ok(());
                }
            }
            SimulationState::Rewinding => {
                self.episode_ticks += 1;
                self.tick_rewinding(dt, out_events)?;
            }
        }

        let limit = self.config.run.max_ticks_per_episode;
        if limit > 0 && self.episode_ticks >= limit {
            self.finish_episode(EpisodeOutcome::Stranded, out_events)?;
        }
        Ok(())
    }

    /// Returns `true` when the agent reached the goal and the episode ended.
    fn tick_running(
        &mut self,
        dt: Duration,
        out_events: &mut Vec<Event>,
    ) -> Result<bool, SimulationError> {
        self.snapshot_timer = self.snapshot_timer.saturating_add(dt);
        let snapshot_taken = self.snapshot_timer >= self.snapshot_period;
        if snapshot_taken {
            self.snapshot_timer = Duration::ZERO;
            self.history.push_front(query::snapshot(&self.world));
            let retained = self.history.len();
            debug!(episode = self.episode, retained, "snapshot recorded");
            out_events.push(Event::SnapshotRecorded { retained });
        }

        let position = query::agent_position(&self.world);
        let plan = match self.pathfinder.find_path(
            query::passability_view(&self.world),
            position,
            query::goal(&self.world),
        ) {
            Ok(path) => Some(path),
            Err(PathfindingError::Unreachable { .. }) => None,
            Err(error) => return Err(error.into()),
        };

        if snapshot_taken {
            self.evaluator.record(
                plan.as_ref().map(Path::total_cost),
                query::accumulated_cost(&self.world),
            );
        }

        match plan.as_ref().and_then(Path::first) {
            Some(step) => {
                world::apply(
                    &mut self.world,
                    Command::MoveAgent { to: step.position },
                    out_events,
                )?;
            }
            None => {
                warn!(
                    episode = self.episode,
                    x = position.x(),
                    y = position.y(),
                    "goal unreachable, waiting"
                );
                out_events.push(Event::GoalUnreachable { from: position });
            }
        }

        if query::agent_at_goal(&self.world) {
            self.finish_episode(EpisodeOutcome::ReachedGoal, out_events)?;
            return Ok(true);
        }

        self.running_ticks += 1;
        let window = u64::from(self.config.rewind.comparison_window);
        if self.running_ticks % window == 0 {
            if let RewindDecision::Rewind { snapshots_ago, .. } = self.evaluator.evaluate() {
                self.request_rewind(snapshots_ago, out_events)?;
                return Ok(false);
            }
        }

        let drift_period = u64::from(self.config.drift.period_ticks);
        if drift_period > 0 && self.running_ticks % drift_period == 0 {
            world::apply(
                &mut self.world,
                Command::DriftTiles {
                    count: self.config.drift.tiles,
                },
                out_events,
            )?;
        }
        Ok(false)
    }

    fn tick_rewinding(
        &mut self,
        dt: Duration,
        out_events: &mut Vec<Event>,
    ) -> Result<(), SimulationError> {
        let Some(mut playback) = self.playback.take() else {
            self.change_state(SimulationState::Running, out_events);
            return Ok(());
        };

        playback.timer = playback.timer.saturating_add(dt);
        if playback.timer < self.playback_period {
            self.playback = Some(playback);
            return Ok(());
        }
        playback.timer = Duration::ZERO;

        // Offset 0 has nothing in between and is restored directly.
        let offset = if playback.target == 0 {
            0
        } else {
            playback.restored.map_or(1, |restored| restored + 1)
        };
        let snapshot = self.history.at(offset)?.clone();
        world::apply(
            &mut self.world,
            Command::RestoreSnapshot {
                snapshot: snapshot.clone(),
            },
            out_events,
        )?;
        out_events.push(Event::RewindAdvanced { offset });

        if offset < playback.target {
            playback.restored = Some(offset);
            self.playback = Some(playback);
            return Ok(());
        }

        // Re-record the target so history offsets keep matching the evaluator's entries.
        self.history.push_front(snapshot);
        self.snapshot_timer = Duration::ZERO;
        info!(
            episode = self.episode,
            snapshots_ago = playback.target,
            cost = query::accumulated_cost(&self.world),
            "rewind completed"
        );
        out_events.push(Event::RewindCompleted {
            snapshots_ago: playback.target,
        });
        self.change_state(SimulationState::Running, out_events);
        Ok(())
    }

    fn finish_episode(
        &mut self,
        outcome: EpisodeOutcome,
        out_events: &mut Vec<Event>,
    ) -> Result<(), SimulationError> {
        let summary = EpisodeSummary {
            episode: self.episode,
            outcome,
            final_cost: query::accumulated_cost(&self.world),
            rewinds_used: self.evaluator.rewinds_used(),
            ticks: self.episode_ticks,
        };
        match outcome {
            EpisodeOutcome::ReachedGoal => info!(
                episode = summary.episode,
                cost = summary.final_cost,
                rewinds = summary.rewinds_used,
                ticks = summary.ticks,
                "episode completed"
            ),
            EpisodeOutcome::Stranded => warn!(
                episode = summary.episode,
                cost = summary.final_cost,
                rewinds = summary.rewinds_used,
                ticks = summary.ticks,
                "episode stranded"
            ),
        }
        self.statistics.record(summary);
        out_events.push(Event::EpisodeCompleted { summary });

        if self.episode >= self.config.run.episodes {
            self.complete_run(out_events);
            return Ok(());
        }

        self.episode += 1;
        world::apply(
            &mut self.world,
            Command::ResetLayout {
                holes: self.config.grid.holes,
            },
            out_events,
        )?;
        self.evaluator.reset();
        self.history = HistoryBuffer::new(self.config.history.capacity);
        self.playback = None;
        self.snapshot_timer = self.snapshot_period;
        self.episode_ticks = 0;
        self.running_ticks = 0;
        if self.state != SimulationState::Running {
            self.change_state(SimulationState::Running, out_events);
        }
        Ok(())
    }

    fn complete_run(&mut self, out_events: &mut Vec<Event>) {
        let averages = self.statistics.averages();
        info!(
            episodes = averages.episodes,
            mean_cost = averages.mean_cost,
            mean_rewinds = averages.mean_rewinds,
            "run completed"
        );
        self.finished = true;
        self.playback = None;
        out_events.push(Event::RunCompleted { averages });
        if self.state != SimulationState::Paused {
            self.change_state(SimulationState::Paused, out_events);
        }
    }

    fn change_state(&mut self, state: SimulationState, out_events: &mut Vec<Event>) {
        debug!(from = ?self.state, to = ?state, "state changed");
        self.state = state;
        out_events.push(Event::StateChanged { state });
    }
}

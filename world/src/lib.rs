#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state for Chronopath: the tile grid and the agent.

pub mod grid;
pub mod history;
mod layout;

use chronopath_core::{Command, Direction, Event, MoveRejection, Position};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::debug;

pub use grid::{Grid, SnapshotError};
pub use history::{HistoryBuffer, HistoryError};

/// Fatal errors raised while applying commands to the world.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WorldError {
    /// The requested grid has no playable cells.
    #[error("grid must have at least one column and one row")]
    EmptyGrid,
    /// The start or goal lies outside the playable area.
    #[error("{role} {position:?} lies outside the {width}x{height} grid")]
    OutOfBounds {
        /// Which endpoint was rejected.
        role: &'static str,
        /// Rejected position.
        position: Position,
        /// Playable columns.
        width: u32,
        /// Playable rows.
        height: u32,
    },
    /// Start and goal share a cell.
    #[error("start and goal share cell {0:?}")]
    StartIsGoal(Position),
    /// A snapshot did not match the grid it was restored into.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Represents the authoritative world state.
#[derive(Debug)]
pub struct World {
    grid: Grid,
    agent: Agent,
    rng: ChaCha8Rng,
}

impl World {
    /// Creates a world whose grid has no playable cells yet.
    ///
    /// The world becomes usable once a [`Command::ConfigureGrid`] is applied.
    #[must_use]
    pub fn new() -> Self {
        let origin = Position::new(0, 0);
        Self {
            grid: Grid::placeholder(),
            agent: Agent {
                position: origin,
                accumulated_cost: 0,
            },
            rng: ChaCha8Rng::seed_from_u64(0),
        }
    }

    fn place_agent(&mut self, position: Position, accumulated_cost: u32) {
        self.grid.set_occupied(self.agent.position, false);
        self.agent = Agent {
            position,
            accumulated_cost,
        };
        self.grid.set_occupied(position, true);
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
///
/// Rejected agent moves are reported through [`Event::AgentMoveRejected`];
/// invalid grid configurations and mismatched snapshots are fatal and leave
/// the world untouched.
pub fn apply(
    world: &mut World,
    command: Command,
    out_events: &mut Vec<Event>,
) -> Result<(), WorldError> {
    match command {
        Command::ConfigureGrid {
            width,
            height,
            start,
            goal,
            layout,
            seed,
        } => {
            world.grid = Grid::new(width, height, start, goal, layout)?;
            world.rng = ChaCha8Rng::seed_from_u64(seed);
            world.agent = Agent {
                position: start,
                accumulated_cost: 0,
            };
            world.grid.set_occupied(start, true);
            out_events.push(Event::GridConfigured {
                width,
                height,
                dynamic_tiles: world.grid.dynamic_tile_count(),
            });
        }
        Command::ResetLayout { holes } => {
            let start = world.grid.start();
            world.place_agent(start, 0);
            world.grid.reset_dynamic_to_impassable();
            let requested = usize::try_from(holes).unwrap_or(usize::MAX);
            let opened = world.grid.open_random_holes(requested, &mut world.rng);
            debug!(requested, opened, "layout reset");
            out_events.push(Event::LayoutReset { opened });
        }
        Command::DriftTiles { count } => {
            let requested = usize::try_from(count).unwrap_or(usize::MAX);
            let toggled = world.grid.drift_tiles(requested, &mut world.rng);
            if !toggled.is_empty() {
                debug!(toggled = toggled.len(), "tiles drifted");
                out_events.push(Event::TilesDrifted { toggled });
            }
        }
        Command::MoveAgent { to } => {
            let from = world.agent.position;
            let Some(tile) = world.grid.tile_at(to) else {
                out_events.push(Event::AgentMoveRejected {
                    to,
                    reason: MoveRejection::OutOfBounds,
                });
                return Ok(());
            };
            let Some(direction) = Direction::between(from, to) else {
                out_events.push(Event::AgentMoveRejected {
                    to,
                    reason: MoveRejection::NotAdjacent,
                });
                return Ok(());
            };
            if !tile.passable {
                out_events.push(Event::AgentMoveRejected {
                    to,
                    reason: MoveRejection::Impassable,
                });
                return Ok(());
            }

            let step_cost = direction.step_cost();
            let accumulated_cost = world.agent.accumulated_cost.saturating_add(step_cost);
            world.place_agent(to, accumulated_cost);
            out_events.push(Event::AgentMoved {
                from,
                to,
                step_cost,
                accumulated_cost,
            });
        }
        Command::RestoreSnapshot { snapshot } => {
            let agent = snapshot.agent();
            world.grid.restore_snapshot(snapshot.grid(), agent.position)?;
            world.place_agent(agent.position, agent.accumulated_cost);
            debug!(
                x = agent.position.x(),
                y = agent.position.y(),
                cost = agent.accumulated_cost,
                "snapshot restored"
            );
            out_events.push(Event::SnapshotRestored {
                position: agent.position,
                accumulated_cost: agent.accumulated_cost,
            });
        }
    }
    Ok(())
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use chronopath_core::{AgentSnapshot, PassabilityView, Position, Tile, WorldSnapshot};

    use super::{Grid, World};

    /// Provides read-only access to the tile grid.
    #[must_use]
    pub fn grid(world: &World) -> &Grid {
        &world.grid
    }

    /// Exposes the bordered passability view consumed by the pathfinder.
    #[must_use]
    pub fn passability_view(world: &World) -> PassabilityView<'_> {
        world.grid.view()
    }

    /// Tile at the playable position, if any.
    #[must_use]
    pub fn tile_at(world: &World, position: Position) -> Option<Tile> {
        world.grid.tile_at(position)
    }

    /// Cell the agent currently occupies.
    #[must_use]
    pub fn agent_position(world: &World) -> Position {
        world.agent.position
    }

    /// Cost the agent accumulated since the episode started.
    #[must_use]
    pub fn accumulated_cost(world: &World) -> u32 {
        world.agent.accumulated_cost
    }

    /// Cell the agent travels toward.
    #[must_use]
    pub fn goal(world: &World) -> Position {
        world.grid.goal()
    }

    /// Reports whether the agent stands on the goal.
    #[must_use]
    pub fn agent_at_goal(world: &World) -> bool {
        world.agent.position == world.grid.goal()
    }

    /// Captures the dynamic-tile flags together with the agent state.
    #[must_use]
    pub fn snapshot(world: &World) -> WorldSnapshot {
        WorldSnapshot::new(
            world.grid.take_snapshot(),
            AgentSnapshot {
                position: world.agent.position,
                accumulated_cost: world.agent.accumulated_cost,
            },
        )
    }
}

#[derive(Clone, Copy, Debug)]
struct Agent {
    position: Position,
    accumulated_cost: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronopath_core::Layout;

    fn configured(layout: Layout) -> (World, Vec<Event>) {
        let mut world = World::new();
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::ConfigureGrid {
                width: 5,
                height: 4,
                start: Position::new(0, 0),
                goal: Position::new(4, 3),
                layout,
                seed: 42,
            },
            &mut events,
        )
        .expect("valid configuration");
        (world, events)
    }

    #[test]
    fn apply_configures_grid() {
        let (world, events) = configured(Layout::ZigZag);

        assert_eq!(
            events,
            vec![Event::GridConfigured {
                width: 5,
                height: 4,
                dynamic_tiles: 6,
            }]
        );
        assert_eq!(query::agent_position(&world), Position::new(0, 0));
        let start = query::tile_at(&world, Position::new(0, 0)).expect("start tile");
        assert!(start.occupied);
    }

    #[test]
    fn invalid_configuration_leaves_world_untouched() {
        let (mut world, _) = configured(Layout::Open);
        let mut events = Vec::new();

        let result = apply(
            &mut world,
            Command::ConfigureGrid {
                width: 3,
                height: 3,
                start: Position::new(0, 0),
                goal: Position::new(0, 0),
                layout: Layout::Open,
                seed: 1,
            },
            &mut events,
        );

        assert!(matches!(result, Err(WorldError::StartIsGoal(_))));
        assert!(events.is_empty());
        assert_eq!(query::grid(&world).width(), 5);
    }

    #[test]
    fn move_agent_accumulates_exact_step_cost() {
        let (mut world, _) = configured(Layout::Open);
        let mut events = Vec::new();

        apply(
            &mut world,
            Command::MoveAgent {
                to: Position::new(1, 1),
            },
            &mut events,
        )
        .expect("move");
        apply(
            &mut world,
            Command::MoveAgent {
                to: Position::new(2, 1),
            },
            &mut events,
        )
        .expect("move");

        assert_eq!(query::accumulated_cost(&world), 24);
        assert_eq!(query::agent_position(&world), Position::new(2, 1));
        let vacated = query::tile_at(&world, Position::new(1, 1)).expect("tile");
        assert!(!vacated.occupied);
        assert!(matches!(
            events.last(),
            Some(Event::AgentMoved {
                step_cost: 10,
                accumulated_cost: 24,
                ..
            })
        ));
    }

    #[test]
    fn move_agent_rejects_illegal_destinations() {
        let (mut world, _) = configured(Layout::BottomBars);
        let mut events = Vec::new();

        for to in [
            Position::new(-1, 0),
            Position::new(2, 2),
            Position::new(1, 0),
        ] {
            apply(&mut world, Command::MoveAgent { to }, &mut events).expect("apply");
        }

        let reasons: Vec<MoveRejection> = events
            .iter()
            .filter_map(|event| match event {
                Event::AgentMoveRejected { reason, .. } => Some(*reason),
                _ => None,
            })
            .collect();
        assert_eq!(
            reasons,
            vec![
                MoveRejection::OutOfBounds,
                MoveRejection::NotAdjacent,
                MoveRejection::Impassable,
            ]
        );
        assert_eq!(query::accumulated_cost(&world), 0);
    }

    #[test]
    fn reset_layout_returns_agent_to_start() {
        let (mut world, _) = configured(Layout::Open);
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::MoveAgent {
                to: Position::new(1, 0),
            },
            &mut events,
        )
        .expect("move");

        apply(&mut world, Command::ResetLayout { holes: 2 }, &mut events).expect("reset");

        assert_eq!(query::agent_position(&world), Position::new(0, 0));
        assert_eq!(query::accumulated_cost(&world), 0);
        assert_eq!(events.last(), Some(&Event::LayoutReset { opened: 0 }));
        let old = query::tile_at(&world, Position::new(1, 0)).expect("tile");
        assert!(!old.occupied);
    }
}

#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Chronopath simulation.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Drivers submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and both the world and the simulation controller report
//! what happened through [`Event`] values. Systems read immutable views such as
//! [`PassabilityView`] and never touch world state directly.

use serde::{Deserialize, Serialize};

/// Cost of a single orthogonal step.
pub const ORTHOGONAL_STEP_COST: u32 = 10;

/// Cost of a single diagonal step.
pub const DIAGONAL_STEP_COST: u32 = 14;

/// Top-level state of the simulation controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SimulationState {
    /// The agent plans and moves every tick.
    Running,
    /// Recorded snapshots are being played back toward a rewind target.
    Rewinding,
    /// No state mutation happens while paused.
    Paused,
}

/// Static wall pattern drawn into the grid before randomisation.
///
/// Bar layouts wall off every second column and mark those walls as dynamic;
/// one end of every bar stays permanently open so the goal remains reachable
/// regardless of how the dynamic tiles are toggled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// No walls and therefore no dynamic tiles.
    #[default]
    Open,
    /// Bars alternate between an open top and an open bottom.
    ZigZag,
    /// Every bar keeps its top row open.
    BottomBars,
    /// Every bar keeps its bottom row open.
    TopBars,
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Rebuilds the grid from scratch and reseeds the world's random source.
    ConfigureGrid {
        /// Number of playable columns.
        width: u32,
        /// Number of playable rows.
        height: u32,
        /// Cell the agent starts every episode on.
        start: Position,
        /// Cell the agent travels toward.
        goal: Position,
        /// Wall pattern that determines the dynamic tiles.
        layout: Layout,
        /// Seed used for hole opening and tile drift.
        seed: u64,
    },
    /// Closes every dynamic tile, opens random holes, and returns the agent to the start.
    ResetLayout {
        /// Number of dynamic tiles to open.
        holes: u32,
    },
    /// Toggles the passability of randomly chosen unoccupied dynamic tiles.
    DriftTiles {
        /// Number of distinct tiles to toggle.
        count: u32,
    },
    /// Moves the agent onto a neighbouring tile.
    MoveAgent {
        /// Destination cell, which must be one of the eight neighbours.
        to: Position,
    },
    /// Restores the grid flags and agent state captured in a snapshot.
    RestoreSnapshot {
        /// Snapshot to restore.
        snapshot: WorldSnapshot,
    },
}

/// Events broadcast by the world and the simulation controller.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Confirms that the grid was rebuilt.
    GridConfigured {
        /// Number of playable columns.
        width: u32,
        /// Number of playable rows.
        height: u32,
        /// Number of tiles participating in snapshots.
        dynamic_tiles: usize,
    },
    /// Confirms that the dynamic tiles were reset and holes were opened.
    LayoutReset {
        /// Number of holes that could actually be opened.
        opened: usize,
    },
    /// Reports the tiles whose passability flipped during drift.
    TilesDrifted {
        /// Cells that were toggled, in selection order.
        toggled: Vec<Position>,
    },
    /// Confirms that the agent moved one step.
    AgentMoved {
        /// Cell the agent occupied before the step.
        from: Position,
        /// Cell the agent occupies after the step.
        to: Position,
        /// Exact cost of the step.
        step_cost: u32,
        /// Accumulated cost after the step.
        accumulated_cost: u32,
    },
    /// Reports that a move request was rejected.
    AgentMoveRejected {
        /// Requested destination.
        to: Position,
        /// Specific reason the move failed.
        reason: MoveRejection,
    },
    /// Confirms that a snapshot was restored.
    SnapshotRestored {
        /// Agent position after the restore.
        position: Position,
        /// Agent accumulated cost after the restore.
        accumulated_cost: u32,
    },
    /// Announces a controller state transition.
    StateChanged {
        /// State that became active.
        state: SimulationState,
    },
    /// Confirms that a world snapshot was pushed into the history.
    SnapshotRecorded {
        /// Number of snapshots currently retained.
        retained: usize,
    },
    /// Announces that a rewind toward an earlier snapshot began.
    RewindScheduled {
        /// How many snapshots back the rewind goes.
        snapshots_ago: usize,
        /// Penalty charged for this rewind.
        penalty: u32,
    },
    /// Reports one playback step of an ongoing rewind.
    RewindAdvanced {
        /// History offset that was just restored.
        offset: usize,
    },
    /// Announces that the rewind target was restored.
    RewindCompleted {
        /// How many snapshots back the rewind went.
        snapshots_ago: usize,
    },
    /// Reports that no path to the goal exists from the agent's cell.
    GoalUnreachable {
        /// Agent position when the search failed.
        from: Position,
    },
    /// Reports the outcome of a finished episode.
    EpisodeCompleted {
        /// Summary of the finished episode.
        summary: EpisodeSummary,
    },
    /// Reports the averages once the configured number of episodes finished.
    RunCompleted {
        /// Averages over every finished episode.
        averages: RunAverages,
    },
}

/// Reasons an agent move may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveRejection {
    /// The destination lies outside the playable grid.
    OutOfBounds,
    /// The destination is not one of the eight neighbours of the agent.
    NotAdjacent,
    /// The destination tile is impassable.
    Impassable,
}

/// Location of a single grid tile.
///
/// Playable tiles span `[0, width) x [0, height)`; the border ring sits at
/// `-1` and at `width`/`height`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    x: i32,
    y: i32,
}

impl Position {
    /// Creates a new position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Column of the position.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Row of the position.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Neighbouring position in the provided direction.
    #[must_use]
    pub const fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Octile distance between two positions.
    ///
    /// Diagonal steps cost [`DIAGONAL_STEP_COST`] and orthogonal steps cost
    /// [`ORTHOGONAL_STEP_COST`], which keeps the estimate admissible and
    /// consistent for eight-way movement.
    #[must_use]
    pub fn octile_distance(self, other: Position) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        let diagonal = dx.min(dy);
        let straight = dx.max(dy) - diagonal;
        DIAGONAL_STEP_COST * diagonal + ORTHOGONAL_STEP_COST * straight
    }
}

/// Eight movement directions available to the agent.
///
/// `y` grows upward, so `North` is "up".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Toward increasing rows.
    North,
    /// Toward decreasing rows.
    South,
    /// Toward increasing columns.
    East,
    /// Toward decreasing columns.
    West,
    /// Up and toward decreasing columns.
    NorthWest,
    /// Up and toward increasing columns.
    NorthEast,
    /// Down and toward decreasing columns.
    SouthWest,
    /// Down and toward increasing columns.
    SouthEast,
}

impl Direction {
    /// Fixed neighbour expansion order used by the pathfinder.
    pub const EXPANSION_ORDER: [Direction; 8] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
        Direction::NorthWest,
        Direction::NorthEast,
        Direction::SouthWest,
        Direction::SouthEast,
    ];

    /// Column and row delta of a single step.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, 1),
            Self::South => (0, -1),
            Self::East => (1, 0),
            Self::West => (-1, 0),
            Self::NorthWest => (-1, 1),
            Self::NorthEast => (1, 1),
            Self::SouthWest => (-1, -1),
            Self::SouthEast => (1, -1),
        }
    }

    /// Whether the step moves along both axes.
    #[must_use]
    pub const fn is_diagonal(self) -> bool {
        matches!(
            self,
            Self::NorthWest | Self::NorthEast | Self::SouthWest | Self::SouthEast
        )
    }

    /// Exact cost of a single step in this direction.
    #[must_use]
    pub const fn step_cost(self) -> u32 {
        if self.is_diagonal() {
            DIAGONAL_STEP_COST
        } else {
            ORTHOGONAL_STEP_COST
        }
    }

    /// Direction leading from one cell to a neighbouring cell, if they are adjacent.
    #[must_use]
    pub fn between(from: Position, to: Position) -> Option<Direction> {
        let delta = (to.x() - from.x(), to.y() - from.y());
        Self::EXPANSION_ORDER
            .into_iter()
            .find(|direction| direction.offset() == delta)
    }
}

/// Persistent state of a single playable tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Tile {
    /// Cell the tile occupies.
    pub position: Position,
    /// Whether the agent may enter the tile.
    pub passable: bool,
    /// Whether the agent currently stands on the tile.
    pub occupied: bool,
    /// Whether the tile participates in snapshots.
    pub dynamic: bool,
}

/// Read-only view over the bordered passability grid.
///
/// Cells are stored row-major over `(width + 2) x (height + 2)` entries so
/// that the border ring around the playable area is addressable during
/// neighbour expansion.
#[derive(Clone, Copy, Debug)]
pub struct PassabilityView<'a> {
    cells: &'a [bool],
    width: u32,
    height: u32,
}

impl<'a> PassabilityView<'a> {
    /// Captures a new view backed by the provided bordered cell slice.
    #[must_use]
    pub fn new(cells: &'a [bool], width: u32, height: u32) -> Self {
        Self {
            cells,
            width,
            height,
        }
    }

    /// Number of cells a bordered grid with the given playable size stores.
    #[must_use]
    pub fn bordered_len(width: u32, height: u32) -> usize {
        let columns = usize::try_from(width).unwrap_or(0) + 2;
        let rows = usize::try_from(height).unwrap_or(0) + 2;
        columns * rows
    }

    /// Number of bordered cells backing the view.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Reports whether the position lies in the playable area.
    #[must_use]
    pub fn contains(&self, position: Position) -> bool {
        position.x() >= 0
            && position.y() >= 0
            && i64::from(position.x()) < i64::from(self.width)
            && i64::from(position.y()) < i64::from(self.height)
    }

    /// Bordered index of the position, covering the playable area and its border.
    #[must_use]
    pub fn index(&self, position: Position) -> Option<usize> {
        let column = i64::from(position.x()) + 1;
        let row = i64::from(position.y()) + 1;
        let columns = i64::from(self.width) + 2;
        let rows = i64::from(self.height) + 2;
        if column < 0 || row < 0 || column >= columns || row >= rows {
            return None;
        }
        usize::try_from(row * columns + column).ok()
    }

    /// Position stored at the provided bordered index.
    #[must_use]
    pub fn position_of(&self, index: usize) -> Option<Position> {
        let columns = usize::try_from(self.width).ok()? + 2;
        if index >= Self::bordered_len(self.width, self.height) {
            return None;
        }
        let column = i32::try_from(index % columns).ok()? - 1;
        let row = i32::try_from(index / columns).ok()? - 1;
        Some(Position::new(column, row))
    }

    /// Reports whether the position may be entered. Cells off the view are walls.
    #[must_use]
    pub fn is_passable(&self, position: Position) -> bool {
        self.index(position)
            .map_or(false, |index| self.is_passable_at(index))
    }

    /// Reports whether the cell at the bordered index may be entered.
    #[must_use]
    pub fn is_passable_at(&self, index: usize) -> bool {
        self.cells.get(index).copied().unwrap_or(false)
    }
}

/// Single step of a planned path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PathStep {
    /// Cell entered by the step.
    pub position: Position,
    /// Exact cost from the search origin to this cell.
    pub cost: u32,
    /// Search-time estimate `f = g + h` recorded for this cell.
    pub estimate: u32,
}

/// Ordered steps from the current position (exclusive) to the goal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Path {
    steps: Vec<PathStep>,
}

impl Path {
    /// Creates a path from the provided steps.
    #[must_use]
    pub fn new(steps: Vec<PathStep>) -> Self {
        Self { steps }
    }

    /// Steps making up the path in travel order.
    #[must_use]
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// Next step to take, if any.
    #[must_use]
    pub fn first(&self) -> Option<&PathStep> {
        self.steps.first()
    }

    /// Number of steps in the path.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Reports whether the path contains no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Exact cost of walking the whole path.
    #[must_use]
    pub fn total_cost(&self) -> u32 {
        self.steps.last().map_or(0, |step| step.cost)
    }

    /// Iterator over the cells visited by the path.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.steps.iter().map(|step| step.position)
    }
}

/// Passability and occupancy flags of every dynamic tile in grid order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSnapshot {
    passability: Vec<bool>,
    occupancy: Vec<bool>,
}

impl GridSnapshot {
    /// Creates a snapshot from parallel flag arrays.
    #[must_use]
    pub fn new(passability: Vec<bool>, occupancy: Vec<bool>) -> Self {
        Self {
            passability,
            occupancy,
        }
    }

    /// Passability flags in dynamic-tile order.
    #[must_use]
    pub fn passability(&self) -> &[bool] {
        &self.passability
    }

    /// Occupancy flags in dynamic-tile order.
    #[must_use]
    pub fn occupancy(&self) -> &[bool] {
        &self.occupancy
    }
}

/// Agent state captured alongside the grid flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// Cell the agent occupied.
    pub position: Position,
    /// Cost accumulated since the episode started.
    pub accumulated_cost: u32,
}

/// Immutable capture of the whole world at one moment.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldSnapshot {
    grid: GridSnapshot,
    agent: AgentSnapshot,
}

impl WorldSnapshot {
    /// Bundles grid flags and agent state.
    #[must_use]
    pub fn new(grid: GridSnapshot, agent: AgentSnapshot) -> Self {
        Self { grid, agent }
    }

    /// Captured grid flags.
    #[must_use]
    pub fn grid(&self) -> &GridSnapshot {
        &self.grid
    }

    /// Captured agent state.
    #[must_use]
    pub fn agent(&self) -> AgentSnapshot {
        self.agent
    }
}

/// How an episode ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EpisodeOutcome {
    /// The agent stepped onto the goal.
    ReachedGoal,
    /// The per-episode tick budget ran out first.
    Stranded,
}

/// Totals reported when an episode finishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeSummary {
    /// One-based episode number.
    pub episode: u32,
    /// How the episode ended.
    pub outcome: EpisodeOutcome,
    /// Agent accumulated cost when the episode ended.
    pub final_cost: u32,
    /// Rewinds used during the episode.
    pub rewinds_used: u32,
    /// Controller ticks spent in the episode, playback included.
    pub ticks: u64,
}

/// Averages over every finished episode of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunAverages {
    /// Number of episodes the averages cover.
    pub episodes: u32,
    /// Mean final cost.
    pub mean_cost: f64,
    /// Mean number of rewinds.
    pub mean_rewinds: f64,
}

#[cfg(test)]
mod tests {
    use super::{
        AgentSnapshot, Direction, GridSnapshot, PassabilityView, Path, PathStep, Position,
        WorldSnapshot,
    };

    #[test]
    fn octile_distance_mixes_diagonal_and_straight_steps() {
        let origin = Position::new(0, 0);
        assert_eq!(origin.octile_distance(Position::new(4, 4)), 56);
        assert_eq!(origin.octile_distance(Position::new(4, 1)), 14 + 30);
        assert_eq!(Position::new(3, -2).octile_distance(origin), 14 * 2 + 10);
        assert_eq!(origin.octile_distance(origin), 0);
    }

    #[test]
    fn expansion_order_starts_with_orthogonal_steps() {
        let costs: Vec<u32> = Direction::EXPANSION_ORDER
            .iter()
            .map(|direction| direction.step_cost())
            .collect();
        assert_eq!(costs, vec![10, 10, 10, 10, 14, 14, 14, 14]);
        assert_eq!(Direction::EXPANSION_ORDER[0].offset(), (0, 1));
        assert_eq!(Direction::EXPANSION_ORDER[7].offset(), (1, -1));
    }

    #[test]
    fn direction_between_neighbours() {
        let origin = Position::new(2, 2);
        assert_eq!(
            Direction::between(origin, Position::new(2, 3)),
            Some(Direction::North)
        );
        assert_eq!(
            Direction::between(origin, Position::new(1, 1)),
            Some(Direction::SouthWest)
        );
        assert_eq!(Direction::between(origin, origin), None);
        assert_eq!(Direction::between(origin, Position::new(4, 2)), None);
    }

    #[test]
    fn passability_view_addresses_border_ring() {
        let width = 2;
        let height = 1;
        let mut cells = vec![false; PassabilityView::bordered_len(width, height)];
        assert_eq!(cells.len(), 12);
        cells[5] = true;
        cells[6] = true;
        let view = PassabilityView::new(&cells, width, height);

        assert_eq!(view.index(Position::new(-1, -1)), Some(0));
        assert_eq!(view.index(Position::new(0, 0)), Some(5));
        assert_eq!(view.index(Position::new(2, 1)), Some(11));
        assert_eq!(view.index(Position::new(3, 0)), None);
        assert_eq!(view.position_of(6), Some(Position::new(1, 0)));
        assert!(view.is_passable(Position::new(1, 0)));
        assert!(!view.is_passable(Position::new(-1, 0)));
        assert!(!view.is_passable(Position::new(10, 10)));
        assert!(view.contains(Position::new(1, 0)));
        assert!(!view.contains(Position::new(2, 0)));
    }

    #[test]
    fn path_total_cost_is_last_step_cost() {
        let path = Path::new(vec![
            PathStep {
                position: Position::new(1, 1),
                cost: 14,
                estimate: 56,
            },
            PathStep {
                position: Position::new(2, 1),
                cost: 24,
                estimate: 56,
            },
        ]);
        assert_eq!(path.total_cost(), 24);
        assert_eq!(path.len(), 2);
        assert_eq!(Path::default().total_cost(), 0);
    }

    #[test]
    fn world_snapshot_round_trips_through_bincode() {
        let snapshot = WorldSnapshot::new(
            GridSnapshot::new(vec![true, false, true], vec![false, false, true]),
            AgentSnapshot {
                position: Position::new(3, 4),
                accumulated_cost: 38,
            },
        );
        let bytes = bincode::serialize(&snapshot).expect("serialize");
        let restored: WorldSnapshot = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(restored, snapshot);
    }
}

//! Bordered tile grid with a snapshot-able dynamic subset.

use chronopath_core::{GridSnapshot, Layout, PassabilityView, Position, Tile};
use rand::{seq::SliceRandom, Rng};
use thiserror::Error;

use crate::{layout, WorldError};

/// Errors raised when restoring grid flags from a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// The snapshot was captured from a grid with a different dynamic-tile count.
    #[error(
        "snapshot holds {passability} passability and {occupancy} occupancy flags \
         but the grid has {expected} dynamic tiles"
    )]
    SizeMismatch {
        /// Dynamic-tile count of the current grid.
        expected: usize,
        /// Length of the snapshot's passability array.
        passability: usize,
        /// Length of the snapshot's occupancy array.
        occupancy: usize,
    },
    /// The snapshot places the agent outside the playable area.
    #[error("snapshot places the agent at {0:?}, outside the playable area")]
    AgentOutOfBounds(Position),
    /// The snapshot places the agent on a tile that would be impassable.
    #[error("snapshot places the agent on impassable tile {0:?}")]
    AgentOnImpassable(Position),
}

/// Playable tiles surrounded by a permanently impassable border.
///
/// Flags are stored row-major over the bordered area so the pathfinder can
/// read them through a [`PassabilityView`] without copying.
#[derive(Clone, Debug)]
pub struct Grid {
    width: u32,
    height: u32,
    start: Position,
    goal: Position,
    passable: Vec<bool>,
    occupied: Vec<bool>,
    dynamic_mask: Vec<bool>,
    dynamic: Vec<usize>,
}

impl Grid {
    /// Builds a grid, draws the layout, and carves out the start and goal tiles.
    pub fn new(
        width: u32,
        height: u32,
        start: Position,
        goal: Position,
        layout: Layout,
    ) -> Result<Self, WorldError> {
        if width == 0 || height == 0 {
            return Err(WorldError::EmptyGrid);
        }

        let cell_count = PassabilityView::bordered_len(width, height);
        let mut grid = Self {
            width,
            height,
            start,
            goal,
            passable: vec![false; cell_count],
            occupied: vec![false; cell_count],
            dynamic_mask: vec![false; cell_count],
            dynamic: Vec::new(),
        };

        for (role, position) in [("start", start), ("goal", goal)] {
            if !grid.contains(position) {
                return Err(WorldError::OutOfBounds {
                    role,
                    position,
                    width,
                    height,
                });
            }
        }
        if start == goal {
            return Err(WorldError::StartIsGoal(start));
        }

        for index in 0..cell_count {
            let interior = grid
                .view()
                .position_of(index)
                .map_or(false, |position| grid.contains(position));
            grid.passable[index] = interior;
        }

        for cell in layout::dynamic_cells(layout, width, height) {
            if cell == start || cell == goal {
                continue;
            }
            if let Some(index) = grid.index(cell) {
                grid.passable[index] = false;
                grid.dynamic_mask[index] = true;
                grid.dynamic.push(index);
            }
        }

        Ok(grid)
    }

    /// Grid with no playable cells, used until the world is configured.
    pub(crate) fn placeholder() -> Self {
        let cell_count = PassabilityView::bordered_len(0, 0);
        let origin = Position::new(0, 0);
        Self {
            width: 0,
            height: 0,
            start: origin,
            goal: origin,
            passable: vec![false; cell_count],
            occupied: vec![false; cell_count],
            dynamic_mask: vec![false; cell_count],
            dynamic: Vec::new(),
        }
    }

    /// Number of playable columns.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of playable rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Cell every episode starts on.
    #[must_use]
    pub const fn start(&self) -> Position {
        self.start
    }

    /// Cell the agent travels toward.
    #[must_use]
    pub const fn goal(&self) -> Position {
        self.goal
    }

    /// Number of tiles participating in snapshots.
    #[must_use]
    pub fn dynamic_tile_count(&self) -> usize {
        self.dynamic.len()
    }

    /// Dynamic tiles in snapshot order.
    pub fn dynamic_positions(&self) -> impl Iterator<Item = Position> + '_ {
        let view = self.view();
        self.dynamic
            .iter()
            .filter_map(move |index| view.position_of(*index))
    }

    /// Reports whether the position lies in the playable area.
    #[must_use]
    pub fn contains(&self, position: Position) -> bool {
        self.view().contains(position)
    }

    /// Tile at the playable position, or `None` outside `[0, width) x [0, height)`.
    #[must_use]
    pub fn tile_at(&self, position: Position) -> Option<Tile> {
        if !self.contains(position) {
            return None;
        }
        let index = self.index(position)?;
        Some(Tile {
            position,
            passable: self.passable[index],
            occupied: self.occupied[index],
            dynamic: self.dynamic_mask[index],
        })
    }

    /// Read-only passability view including the border ring.
    #[must_use]
    pub fn view(&self) -> PassabilityView<'_> {
        PassabilityView::new(&self.passable, self.width, self.height)
    }

    /// Captures the flags of every dynamic tile in snapshot order.
    #[must_use]
    pub fn take_snapshot(&self) -> GridSnapshot {
        let passability = self.dynamic.iter().map(|index| self.passable[*index]).collect();
        let occupancy = self.dynamic.iter().map(|index| self.occupied[*index]).collect();
        GridSnapshot::new(passability, occupancy)
    }

    /// Applies previously captured dynamic-tile flags.
    ///
    /// Both arrays are validated against the dynamic-tile count, and `agent`
    /// must land on a playable tile that is passable once the flags apply.
    /// A rejected snapshot leaves the grid untouched.
    pub fn restore_snapshot(
        &mut self,
        snapshot: &GridSnapshot,
        agent: Position,
    ) -> Result<(), SnapshotError> {
        let expected = self.dynamic.len();
        let passability = snapshot.passability();
        let occupancy = snapshot.occupancy();
        if passability.len() != expected || occupancy.len() != expected {
            return Err(SnapshotError::SizeMismatch {
                expected,
                passability: passability.len(),
                occupancy: occupancy.len(),
            });
        }

        let index = self
            .index(agent)
            .filter(|_| self.contains(agent))
            .ok_or(SnapshotError::AgentOutOfBounds(agent))?;
        let passable = match self.dynamic.iter().position(|dynamic| *dynamic == index) {
            Some(slot) => passability[slot],
            None => self.passable[index],
        };
        if !passable {
            return Err(SnapshotError::AgentOnImpassable(agent));
        }

        for (slot, index) in self.dynamic.iter().enumerate() {
            self.passable[*index] = passability[slot];
            self.occupied[*index] = occupancy[slot];
        }
        Ok(())
    }

    /// Marks every dynamic tile impassable.
    pub fn reset_dynamic_to_impassable(&mut self) {
        for index in &self.dynamic {
            self.passable[*index] = false;
        }
    }

    /// Opens up to `count` distinct impassable, unoccupied dynamic tiles chosen
    /// uniformly at random. Returns how many tiles were opened.
    pub fn open_random_holes<R>(&mut self, count: usize, rng: &mut R) -> usize
    where
        R: Rng + ?Sized,
    {
        let pool: Vec<usize> = self
            .dynamic
            .iter()
            .copied()
            .filter(|index| !self.passable[*index] && !self.occupied[*index])
            .collect();

        let chosen: Vec<usize> = pool.choose_multiple(rng, count).copied().collect();
        for index in &chosen {
            self.passable[*index] = true;
        }
        chosen.len()
    }

    /// Toggles the passability of up to `count` distinct unoccupied dynamic
    /// tiles. Returns the toggled cells in selection order.
    pub fn drift_tiles<R>(&mut self, count: usize, rng: &mut R) -> Vec<Position>
    where
        R: Rng + ?Sized,
    {
        let pool: Vec<usize> = self
            .dynamic
            .iter()
            .copied()
            .filter(|index| !self.occupied[*index])
            .collect();

        let chosen: Vec<usize> = pool.choose_multiple(rng, count).copied().collect();
        let mut toggled = Vec::with_capacity(chosen.len());
        for index in chosen {
            self.passable[index] = !self.passable[index];
            if let Some(position) = self.view().position_of(index) {
                toggled.push(position);
            }
        }
        toggled
    }

    pub(crate) fn set_occupied(&mut self, position: Position, occupied: bool) {
        if let Some(index) = self.index(position) {
            self.occupied[index] = occupied;
        }
    }

    fn index(&self, position: Position) -> Option<usize> {
        self.view().index(position)
    }
}

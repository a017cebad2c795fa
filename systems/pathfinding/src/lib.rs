#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic A* pathfinding over the bordered tile grid.
//!
//! The search runs over a [`PassabilityView`] with eight-way movement costing
//! 10 per orthogonal and 14 per diagonal step, guided by the octile distance.
//! Search state lives in scratch arrays owned by the [`Pathfinder`] and is
//! versioned per search, so nothing from a previous tick leaks into the next.

use std::{cmp::Reverse, collections::BinaryHeap};

use chronopath_core::{Direction, PassabilityView, Path, PathStep, Position};
use thiserror::Error;

/// Reasons a search may fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum PathfindingError {
    /// The start or goal lies outside the playable grid.
    #[error("{position:?} lies outside the playable grid")]
    OutOfBounds {
        /// Rejected endpoint.
        position: Position,
    },
    /// The open set ran dry before the goal was reached.
    #[error("no path leads from {from:?} to {to:?}")]
    Unreachable {
        /// Search origin.
        from: Position,
        /// Search target.
        to: Position,
    },
}

/// Reusable A* planner.
#[derive(Debug, Default)]
pub struct Pathfinder {
    scratch: SearchScratch,
    last_expanded: usize,
}

impl Pathfinder {
    /// Creates a planner with empty scratch buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes closed by the most recent search.
    #[must_use]
    pub fn last_expanded(&self) -> usize {
        self.last_expanded
    }

    /// Plans the cheapest path from `start` (exclusive) to `goal`.
    ///
    /// Neighbours are expanded in [`Direction::EXPANSION_ORDER`] and, among
    /// open nodes sharing the lowest `f`, the one that entered the open set
    /// first is expanded next. Together these make the returned path a pure
    /// function of the view and the endpoints.
    pub fn find_path(
        &mut self,
        view: PassabilityView<'_>,
        start: Position,
        goal: Position,
    ) -> Result<Path, PathfindingError> {
        self.last_expanded = 0;
        for position in [start, goal] {
            if !view.contains(position) {
                return Err(PathfindingError::OutOfBounds { position });
            }
        }
        if start == goal {
            return Ok(Path::default());
        }

        let start_index = view
            .index(start)
            .ok_or(PathfindingError::OutOfBounds { position: start })?;
        let goal_index = view
            .index(goal)
            .ok_or(PathfindingError::OutOfBounds { position: goal })?;

        let scratch = &mut self.scratch;
        scratch.begin(view.cell_count());
        scratch.insert(start_index, 0, start.octile_distance(goal), None);

        while let Some(Reverse(entry)) = scratch.open.pop() {
            let current = entry.index;
            let Some(state) = scratch.node_mut(current) else {
                continue;
            };
            if state.closed {
                continue;
            }
            state.closed = true;
            let cost = state.cost;
            self.last_expanded += 1;

            if current == goal_index {
                return Ok(scratch.trace(&view, goal_index));
            }

            let Some(position) = view.position_of(current) else {
                continue;
            };

            for direction in Direction::EXPANSION_ORDER {
                let neighbour = position.step(direction);
                let Some(index) = view.index(neighbour) else {
                    continue;
                };
                if !view.is_passable_at(index) {
                    continue;
                }

                let tentative = cost.saturating_add(direction.step_cost());
                match scratch.node(index) {
                    Some(known) if known.closed => continue,
                    Some(known) if tentative >= known.cost => continue,
                    _ => {}
                }

                let estimate = tentative.saturating_add(neighbour.octile_distance(goal));
                scratch.insert(index, tentative, estimate, Some(current));
            }
        }

        Err(PathfindingError::Unreachable {
            from: start,
            to: goal,
        })
    }
}

#[derive(Debug, Default)]
struct SearchScratch {
    generation: u32,
    stamps: Vec<u32>,
    nodes: Vec<NodeState>,
    open: BinaryHeap<Reverse<OpenEntry>>,
    next_order: u64,
}

impl SearchScratch {
    fn begin(&mut self, cell_count: usize) {
        if self.stamps.len() != cell_count {
            self.stamps = vec![0; cell_count];
            self.nodes = vec![NodeState::default(); cell_count];
            self.generation = 0;
        }

        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            self.stamps.fill(0);
            self.generation = 1;
        }
        self.open.clear();
        self.next_order = 0;
    }

    fn node(&self, index: usize) -> Option<&NodeState> {
        if self.stamps.get(index).copied() == Some(self.generation) {
            self.nodes.get(index)
        } else {
            None
        }
    }

    fn node_mut(&mut self, index: usize) -> Option<&mut NodeState> {
        if self.stamps.get(index).copied() == Some(self.generation) {
            self.nodes.get_mut(index)
        } else {
            None
        }
    }

    fn insert(&mut self, index: usize, cost: u32, estimate: u32, came_from: Option<usize>) {
        let order = match self.node(index) {
            Some(known) => known.order,
            None => {
                let order = self.next_order;
                self.next_order += 1;
                order
            }
        };

        self.stamps[index] = self.generation;
        self.nodes[index] = NodeState {
            cost,
            estimate,
            came_from,
            order,
            closed: false,
        };
        self.open.push(Reverse(OpenEntry {
            estimate,
            order,
            index,
        }));
    }

    fn trace(&self, view: &PassabilityView<'_>, goal_index: usize) -> Path {
        let mut steps = Vec::new();
        let mut cursor = Some(goal_index);

        while let Some(index) = cursor {
            let Some(state) = self.node(index) else {
                break;
            };
            let Some(came_from) = state.came_from else {
                break;
            };
            if let Some(position) = view.position_of(index) {
                steps.push(PathStep {
                    position,
                    cost: state.cost,
                    estimate: state.estimate,
                });
            }
            cursor = Some(came_from);
        }

        steps.reverse();
        Path::new(steps)
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct NodeState {
    cost: u32,
    estimate: u32,
    came_from: Option<usize>,
    order: u64,
    closed: bool,
}

/// Open-set entry ordered by estimate, then by first insertion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct OpenEntry {
    estimate: u32,
    order: u64,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds bordered cells from rows listed bottom-up; `#` marks a wall.
    fn cells(rows: &[&str]) -> (Vec<bool>, u32, u32) {
        let height = rows.len() as u32;
        let width = rows.first().map_or(0, |row| row.len()) as u32;
        let mut cells = vec![false; PassabilityView::bordered_len(width, height)];
        let view_width = width as usize + 2;
        for (y, row) in rows.iter().enumerate() {
            for (x, symbol) in row.chars().enumerate() {
                cells[(y + 1) * view_width + x + 1] = symbol != '#';
            }
        }
        (cells, width, height)
    }

    fn positions(path: &Path) -> Vec<(i32, i32)> {
        path.positions().map(|p| (p.x(), p.y())).collect()
    }

    #[test]
    fn straight_corridor_uses_orthogonal_steps() {
        let (cells, width, height) = cells(&["...."]);
        let view = PassabilityView::new(&cells, width, height);
        let mut pathfinder = Pathfinder::new();

        let path = pathfinder
            .find_path(view, Position::new(0, 0), Position::new(3, 0))
            .expect("path");

        assert_eq!(positions(&path), vec![(1, 0), (2, 0), (3, 0)]);
        assert_eq!(path.total_cost(), 30);
    }

    #[test]
    fn open_field_prefers_diagonals() {
        let (cells, width, height) = cells(&["....."; 5]);
        let view = PassabilityView::new(&cells, width, height);
        let mut pathfinder = Pathfinder::new();

        let path = pathfinder
            .find_path(view, Position::new(0, 0), Position::new(4, 4))
            .expect("path");

        assert_eq!(positions(&path), vec![(1, 1), (2, 2), (3, 3), (4, 4)]);
        assert_eq!(path.total_cost(), 56);
        assert!(path.steps().iter().all(|step| step.estimate == 56));
    }

    #[test]
    fn equal_cost_paths_resolve_by_insertion_order() {
        let (cells, width, height) = cells(&["...", "...", "..."]);
        let view = PassabilityView::new(&cells, width, height);
        let mut pathfinder = Pathfinder::new();

        let path = pathfinder
            .find_path(view, Position::new(0, 0), Position::new(1, 2))
            .expect("path");

        assert_eq!(positions(&path), vec![(0, 1), (1, 2)]);
        assert_eq!(path.total_cost(), 24);
    }

    #[test]
    fn walls_force_a_detour() {
        let (cells, width, height) = cells(&[
            ".#.", //
            ".#.", //
            "...",
        ]);
        let view = PassabilityView::new(&cells, width, height);
        let mut pathfinder = Pathfinder::new();

        let path = pathfinder
            .find_path(view, Position::new(0, 0), Position::new(2, 0))
            .expect("path");

        assert_eq!(path.total_cost(), 10 + 14 + 14 + 10);
        assert!(path.positions().all(|p| view.is_passable(p)));
        assert_eq!(path.positions().last(), Some(Position::new(2, 0)));
    }

    #[test]
    fn exhausted_open_set_reports_unreachable() {
        let (cells, width, height) = cells(&[".#.", ".#.", ".#."]);
        let view = PassabilityView::new(&cells, width, height);
        let mut pathfinder = Pathfinder::new();

        let result = pathfinder.find_path(view, Position::new(0, 0), Position::new(2, 2));

        assert_eq!(
            result,
            Err(PathfindingError::Unreachable {
                from: Position::new(0, 0),
                to: Position::new(2, 2),
            })
        );
        assert_eq!(pathfinder.last_expanded(), 3);
    }

    #[test]
    fn endpoints_outside_the_grid_are_rejected() {
        let (cells, width, height) = cells(&["..", ".."]);
        let view = PassabilityView::new(&cells, width, height);
        let mut pathfinder = Pathfinder::new();

        let result = pathfinder.find_path(view, Position::new(0, 0), Position::new(-1, 0));

        assert_eq!(
            result,
            Err(PathfindingError::OutOfBounds {
                position: Position::new(-1, 0),
            })
        );
    }

    #[test]
    fn start_equal_to_goal_yields_empty_path() {
        let (cells, width, height) = cells(&[".."]);
        let view = PassabilityView::new(&cells, width, height);
        let mut pathfinder = Pathfinder::new();

        let path = pathfinder
            .find_path(view, Position::new(1, 0), Position::new(1, 0))
            .expect("path");

        assert!(path.is_empty());
    }

    #[test]
    fn scratch_reuse_across_grid_sizes_does_not_leak_state() {
        let (small, small_width, small_height) = cells(&["...", "..."]);
        let (large, large_width, large_height) = cells(&["....", "....", "...."]);
        let mut reused = Pathfinder::new();

        let _ = reused
            .find_path(
                PassabilityView::new(&small, small_width, small_height),
                Position::new(0, 0),
                Position::new(2, 1),
            )
            .expect("small path");
        let from_reused = reused
            .find_path(
                PassabilityView::new(&large, large_width, large_height),
                Position::new(3, 2),
                Position::new(0, 0),
            )
            .expect("large path");
        let from_fresh = Pathfinder::new()
            .find_path(
                PassabilityView::new(&large, large_width, large_height),
                Position::new(3, 2),
                Position::new(0, 0),
            )
            .expect("large path");

        assert_eq!(from_reused, from_fresh);
    }
}

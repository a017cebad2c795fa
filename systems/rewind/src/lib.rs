#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Decides whether travelling back to an earlier snapshot beats carrying on.
//!
//! The evaluator keeps two histories parallel to the controller's snapshot
//! history: the path cost planned right after each snapshot, and the cost the
//! agent had accumulated at that moment. Entry `i` of both histories refers to
//! the snapshot recorded `i` pushes ago.

use chronopath_world::HistoryBuffer;
use tracing::debug;

/// Outcome of a rewind evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RewindDecision {
    /// No earlier snapshot promises a cheaper total.
    Continue,
    /// Travelling back is projected to be cheaper.
    Rewind {
        /// How many snapshots back the chosen target lies.
        snapshots_ago: usize,
        /// Penalty the decision was weighed with.
        penalty: u32,
        /// Projected total cost via the target, penalty included.
        projected: u64,
    },
}

/// Weighs recorded path costs against a growing rewind penalty.
#[derive(Clone, Debug)]
pub struct RewindEvaluator {
    base_cost: u32,
    capacity: usize,
    snapshot_costs: HistoryBuffer<Option<u32>>,
    costs_so_far: HistoryBuffer<u32>,
    rewinds_used: u32,
}

impl RewindEvaluator {
    /// Creates an evaluator retaining `capacity` entries per history.
    #[must_use]
    pub fn new(capacity: usize, base_cost: u32) -> Self {
        Self {
            base_cost,
            capacity,
            snapshot_costs: HistoryBuffer::new(capacity),
            costs_so_far: HistoryBuffer::new(capacity),
            rewinds_used: 0,
        }
    }

    /// Rewinds committed since the last [`RewindEvaluator::reset`].
    #[must_use]
    pub fn rewinds_used(&self) -> u32 {
        self.rewinds_used
    }

    /// Number of entries currently retained.
    #[must_use]
    pub fn recorded(&self) -> usize {
        self.costs_so_far.len()
    }

    /// Penalty the next rewind would be charged: `base_cost * (rewinds_used + 1)`.
    #[must_use]
    pub fn penalty(&self) -> u32 {
        self.base_cost
            .saturating_mul(self.rewinds_used.saturating_add(1))
    }

    /// Records the costs observed for a freshly pushed snapshot.
    ///
    /// `path_cost` is `None` when no path to the goal existed at that moment.
    pub fn record(&mut self, path_cost: Option<u32>, cost_so_far: u32) {
        self.snapshot_costs.push_front(path_cost);
        self.costs_so_far.push_front(cost_so_far);
    }

    /// Picks the earlier snapshot whose projected total is strictly cheapest.
    ///
    /// The projected total of entry `i` is the cost accumulated when it was
    /// recorded plus the path cost planned from there; every entry but the
    /// most recent one also pays the current penalty. Unknown path costs never
    /// win, and ties keep the agent where it is.
    #[must_use]
    pub fn evaluate(&self) -> RewindDecision {
        let penalty = self.penalty();
        let mut entries = self.costs_so_far.iter().zip(self.snapshot_costs.iter());
        let Some((recent_so_far, recent_cost)) = entries.next() else {
            return RewindDecision::Continue;
        };

        let mut best = recent_cost.map(|cost| u64::from(*recent_so_far) + u64::from(cost));
        let mut chosen = None;
        for (offset, (so_far, cost)) in entries.enumerate() {
            let Some(cost) = cost else {
                continue;
            };
            let candidate = u64::from(*so_far) + u64::from(*cost) + u64::from(penalty);
            if best.map_or(true, |best| candidate < best) {
                best = Some(candidate);
                chosen = Some(offset + 1);
            }
        }

        match (chosen, best) {
            (Some(snapshots_ago), Some(projected)) => {
                debug!(snapshots_ago, penalty, projected, "rewind projected cheaper");
                RewindDecision::Rewind {
                    snapshots_ago,
                    penalty,
                    projected,
                }
            }
            _ => RewindDecision::Continue,
        }
    }

    /// Collapses both histories onto the rewind target and counts the rewind.
    ///
    /// When the target was never recorded here both histories are emptied.
    pub fn commit_rewind(&mut self, snapshots_ago: usize) {
        let kept = match (
            self.snapshot_costs.at(snapshots_ago),
            self.costs_so_far.at(snapshots_ago),
        ) {
            (Ok(path_cost), Ok(cost_so_far)) => Some((*path_cost, *cost_so_far)),
            _ => None,
        };

        self.snapshot_costs = HistoryBuffer::new(self.capacity);
        self.costs_so_far = HistoryBuffer::new(self.capacity);
        if let Some((path_cost, cost_so_far)) = kept {
            self.record(path_cost, cost_so_far);
        }
        self.rewinds_used = self.rewinds_used.saturating_add(1);
    }

    /// Forgets every entry and the rewind count for a new episode.
    pub fn reset(&mut self) {
        self.snapshot_costs = HistoryBuffer::new(self.capacity);
        self.costs_so_far = HistoryBuffer::new(self.capacity);
        self.rewinds_used = 0;
    }
}

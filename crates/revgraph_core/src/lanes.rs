//! Lane assignment for drawing the commit graph.
//!
//! Lanes are assigned in load order, one commit at a time, and never revised.
//! Each active lane remembers which commit it expects next; a commit takes
//! the lowest lane that expects it, or the lowest free lane when none does.

use crate::commit_id::CommitId;
use serde::Serialize;

/// How a commit's row changes the set of active lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LaneTransition {
    /// The lane simply continues.
    Plain,
    /// Several lanes converge on this commit.
    MergeIn,
    /// New lanes open towards additional parents.
    BranchOut,
    /// No earlier row expected this commit; its lane starts here.
    Initial,
    /// The commit has no parents to follow; its lane ends here.
    Terminal,
}

/// Lane annotation of one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaneInfo {
    /// Lane the commit is drawn on.
    pub lane: usize,
    /// Dominant transition of the row.
    pub kind: LaneTransition,
    /// Other lanes that expected this commit and end here.
    pub merged_lanes: Vec<usize>,
    /// Lanes opened for parents after the first.
    pub branched_lanes: Vec<usize>,
    /// No child reserved a lane for this commit.
    pub starts_lane: bool,
    /// The commit's own lane does not continue below it.
    pub ends_lane: bool,
    /// Number of lanes in use once this row is drawn.
    pub width: usize,
}

/// Incremental lane allocator.
#[derive(Debug, Default, Clone)]
pub struct LaneAssigner {
    lanes: Vec<Option<CommitId>>,
}

impl LaneAssigner {
    /// Creates an assigner with no active lanes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all lane state.
    pub fn reset(&mut self) {
        self.lanes.clear();
    }

    /// Number of lanes currently expecting a commit, counting gaps.
    pub fn active_width(&self) -> usize {
        self.lanes.len()
    }

    /// Commit the lane at `lane` is waiting for.
    pub fn expected(&self, lane: usize) -> Option<CommitId> {
        self.lanes.get(lane).copied().flatten()
    }

    fn first_empty_lane_idx(&mut self) -> usize {
        self.lanes
            .iter()
            .position(Option::is_none)
            .unwrap_or_else(|| {
                self.lanes.push(None);
                self.lanes.len() - 1
            })
    }

    /// Assigns a lane to the next commit in load order.
    ///
    /// `parents` are the parents used for drawing, which for a filtered view
    /// may differ from the commit's real parents. A boundary commit is
    /// treated as having none.
    pub fn assign(&mut self, id: CommitId, parents: &[CommitId], boundary: bool) -> LaneInfo {
        let reserved: Vec<usize> = self
            .lanes
            .iter()
            .enumerate()
            .filter(|(_, expected)| **expected == Some(id))
            .map(|(idx, _)| idx)
            .collect();

        let (lane, starts_lane) = match reserved.first() {
            Some(lane) => (*lane, false),
            None => (self.first_empty_lane_idx(), true),
        };

        let merged_lanes: Vec<usize> = reserved.iter().skip(1).copied().collect();
        for idx in reserved {
            self.lanes[idx] = None;
        }

        let mut branched_lanes = Vec::new();
        let terminal = boundary || parents.is_empty();

        if !terminal {
            self.lanes[lane] = Some(parents[0]);
            for parent in &parents[1..] {
                if self.lanes.contains(&Some(*parent)) {
                    continue;
                }
                let idx = self.first_empty_lane_idx();
                self.lanes[idx] = Some(*parent);
                branched_lanes.push(idx);
            }
        }

        while matches!(self.lanes.last(), Some(None)) {
            self.lanes.pop();
        }

        let kind = if terminal {
            LaneTransition::Terminal
        } else if starts_lane {
            LaneTransition::Initial
        } else if !merged_lanes.is_empty() {
            LaneTransition::MergeIn
        } else if !branched_lanes.is_empty() {
            LaneTransition::BranchOut
        } else {
            LaneTransition::Plain
        };

        LaneInfo {
            lane,
            kind,
            merged_lanes,
            branched_lanes,
            starts_lane,
            ends_lane: terminal,
            width: self.lanes.len().max(lane + 1),
        }
    }
}

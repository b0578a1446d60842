//! Following one file through renames and copies.

use crate::commit_id::CommitId;
use crate::store::HistoryView;
use serde::Serialize;
use tracing::debug;

/// A commit that touched the tracked file, with the name it had there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedCommit {
    /// The commit.
    pub id: CommitId,
    /// The file's path in that commit.
    pub path: String,
}

/// Why the tracker cannot continue yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspension {
    /// The change set of this commit is not known.
    NeedFiles(CommitId),
    /// More commits have to load first.
    NeedCommits,
}

/// Result of one [`RenameTracker::advance`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackStep {
    /// Another commit touching the file was found.
    Found(TrackedCommit),
    /// Waiting for data.
    Suspended(Suspension),
    /// Every loaded commit has been examined and the load is complete.
    Exhausted,
}

/// Walks a view in load order from a starting commit, following the
/// tracked name backwards through renames.
///
/// The tracker keeps its position, so it can be resumed after a suspension
/// once the missing data has been supplied.
#[derive(Debug, Clone)]
pub struct RenameTracker {
    from: CommitId,
    name: String,
    cursor: Option<usize>,
    history: Vec<TrackedCommit>,
}

impl RenameTracker {
    /// Starts tracking `path` as named in `from`.
    pub fn new(path: impl Into<String>, from: CommitId) -> Self {
        Self {
            from,
            name: path.into(),
            cursor: None,
            history: Vec::new(),
        }
    }

    /// The name the file has at the current position.
    pub fn current_name(&self) -> &str {
        &self.name
    }

    /// Commits found so far, newest first.
    pub fn history(&self) -> &[TrackedCommit] {
        &self.history
    }

    /// Consumes the tracker, returning the commits found.
    pub fn into_history(self) -> Vec<TrackedCommit> {
        self.history
    }

    /// Examines rows until a touching commit is found or data runs out.
    ///
    /// `complete` tells whether the view will grow any further.
    pub fn advance(&mut self, view: &HistoryView<'_>, complete: bool) -> TrackStep {
        let mut row = match self.cursor {
            Some(row) => row,
            None => match view.row(self.from) {
                Some(row) => row,
                None if complete => return TrackStep::Exhausted,
                None => return TrackStep::Suspended(Suspension::NeedCommits),
            },
        };

        loop {
            let Some(id) = view.id_at(row) else {
                self.cursor = Some(row);
                return if complete {
                    TrackStep::Exhausted
                } else {
                    TrackStep::Suspended(Suspension::NeedCommits)
                };
            };

            let Some(files) = view.files(id) else {
                self.cursor = Some(row);
                return TrackStep::Suspended(Suspension::NeedFiles(id));
            };

            row += 1;

            let Some(entry) = view.find_file(files, &self.name) else {
                continue;
            };

            let found = TrackedCommit {
                id,
                path: self.name.clone(),
            };
            if entry.status.has_source() {
                if let Some(source) = view.store().source_path(entry) {
                    debug!(%id, from = %source, to = %self.name, status = ?entry.status, "following source");
                    self.name = source;
                }
            }
            self.history.push(found.clone());
            self.cursor = Some(row);
            return TrackStep::Found(found);
        }
    }
}

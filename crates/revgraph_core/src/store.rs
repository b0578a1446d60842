//! Commit graph storage.
//!
//! [`SharedStore`] holds what every session may share: commit records, the
//! parent to children index, file change sets and the path tables.
//! [`CommitGraph`] is one session's ordering of those records with its lane
//! annotations. Reads go through [`HistoryView`]; only the loading path in
//! this crate can write.

use crate::commit_id::CommitId;
use crate::error::{RevError, Result};
use crate::lanes::{LaneAssigner, LaneInfo};
use crate::parser::RawFileChange;
use crate::paths::PathTable;
use crate::types::{Commit, FileChangeSet, FileEntry, FileSetKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// How appends treat parents that are not loaded yet.
///
/// Chosen per repository with `load.parent_policy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentPolicy {
    /// Parents may arrive later. The history stream emits children before
    /// parents, so this is the policy for log loads.
    #[default]
    Streaming,
    /// A non-root commit is rejected unless at least one parent is already
    /// stored. Synthetic commits are exempt. Only useful when the log emits
    /// parents first, e.g. with `--reverse`.
    Strict,
}

/// Repository-wide commit and change records.
#[derive(Debug, Default)]
pub struct SharedStore {
    commits: HashMap<CommitId, Arc<Commit>>,
    children: HashMap<CommitId, Vec<CommitId>>,
    file_sets: HashMap<FileSetKey, Arc<FileChangeSet>>,
    paths: PathTable,
}

impl SharedStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a commit record.
    pub fn lookup(&self, id: CommitId) -> Option<&Arc<Commit>> {
        self.commits.get(&id)
    }

    /// Whether a commit record exists.
    pub fn contains(&self, id: CommitId) -> bool {
        self.commits.contains_key(&id)
    }

    /// Number of stored commit records.
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    /// Whether no commit is stored.
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Commits naming `id` as a parent, in arrival order.
    ///
    /// The index is keyed by parent id, so children are known even before
    /// the parent itself loads.
    pub fn children(&self, id: CommitId) -> &[CommitId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `parent` is a direct parent of `child`.
    pub fn is_parent_of(&self, parent: CommitId, child: CommitId) -> bool {
        self.lookup(child)
            .map(|c| c.parents.contains(&parent))
            .unwrap_or(false)
    }

    /// Stored change set for `key`.
    pub fn file_set(&self, key: &FileSetKey) -> Option<&Arc<FileChangeSet>> {
        self.file_sets.get(key)
    }

    /// The shared path tables.
    pub fn paths(&self) -> &PathTable {
        &self.paths
    }

    /// Full path of an entry.
    pub fn file_path(&self, entry: &FileEntry) -> Option<String> {
        self.paths.resolve(entry.path)
    }

    /// Source path of a renamed or copied entry.
    pub fn source_path(&self, entry: &FileEntry) -> Option<String> {
        entry.source.and_then(|s| self.paths.resolve(s))
    }

    /// Finds the entry for `path` in `set`.
    pub fn find_file<'s>(&self, set: &'s FileChangeSet, path: &str) -> Option<&'s FileEntry> {
        let path = self.paths.lookup(path)?;
        set.entries.iter().find(|e| e.path == path)
    }

    /// Inserts a commit record, returning the stored one.
    ///
    /// A record already present is kept, except for synthetic commits which
    /// are replaced wholesale.
    pub(crate) fn insert_commit(&mut self, commit: Commit) -> Arc<Commit> {
        if let Some(existing) = self.commits.get(&commit.id) {
            if !commit.synthetic {
                return Arc::clone(existing);
            }
            let old = Arc::clone(existing);
            for parent in &old.parents {
                if let Some(kids) = self.children.get_mut(parent) {
                    kids.retain(|k| *k != old.id);
                }
            }
        }

        for parent in &commit.parents {
            self.children.entry(*parent).or_default().push(commit.id);
        }
        let commit = Arc::new(commit);
        self.commits.insert(commit.id, Arc::clone(&commit));
        commit
    }

    /// Stores a change set, replacing any previous one for `key`.
    pub(crate) fn insert_files(
        &mut self,
        key: FileSetKey,
        changes: &[RawFileChange],
    ) -> Arc<FileChangeSet> {
        let mut entries = Vec::with_capacity(changes.len());
        for c in changes {
            let path = self.paths.intern(&c.path);
            let source = c.source.as_deref().map(|s| self.paths.intern(s));
            entries.push(FileEntry {
                path,
                status: c.status,
                source,
                similarity: c.similarity,
                merge_parent: c.merge_parent,
            });
        }
        let set = Arc::new(FileChangeSet { entries });
        self.file_sets.insert(key, Arc::clone(&set));
        set
    }

    /// Discards everything.
    pub(crate) fn reset(&mut self) {
        self.commits.clear();
        self.children.clear();
        self.file_sets.clear();
        self.paths = PathTable::new();
    }
}

/// One session's ordered rows over the shared records.
///
/// Rows, drawing parents and lane annotations are parallel arrays indexed by
/// row number.
#[derive(Debug, Default)]
pub struct CommitGraph {
    policy: ParentPolicy,
    rows: Vec<Arc<Commit>>,
    row_index: HashMap<CommitId, usize>,
    lane_parents: Vec<Vec<CommitId>>,
    lanes: Vec<LaneInfo>,
    assigner: LaneAssigner,
}

impl CommitGraph {
    /// Creates an empty graph with the given parent policy.
    pub fn new(policy: ParentPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// The parent policy in force.
    pub fn policy(&self) -> ParentPolicy {
        self.policy
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the graph has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row of `id`.
    pub fn row(&self, id: CommitId) -> Option<usize> {
        self.row_index.get(&id).copied()
    }

    /// Id at `row`.
    pub fn id_at(&self, row: usize) -> Option<CommitId> {
        self.rows.get(row).map(|c| c.id)
    }

    pub(crate) fn reset(&mut self) {
        self.rows.clear();
        self.row_index.clear();
        self.lane_parents.clear();
        self.lanes.clear();
        self.assigner.reset();
    }
}

/// Mutation path for loaders. Appends are atomic per record: a rejected
/// record leaves no trace.
pub(crate) trait HistoryWriter {
    /// Appends a commit as the next row, with its change set when known.
    ///
    /// `lane_parents` overrides the parents used for lane assignment.
    fn append(
        &mut self,
        commit: Commit,
        files: Option<&[RawFileChange]>,
        lane_parents: Option<Vec<CommitId>>,
    ) -> Result<usize>;
}

/// Write access to one session graph and the shared store.
pub(crate) struct GraphWriter<'a> {
    pub(crate) store: &'a mut SharedStore,
    pub(crate) graph: &'a mut CommitGraph,
}

impl HistoryWriter for GraphWriter<'_> {
    fn append(
        &mut self,
        commit: Commit,
        files: Option<&[RawFileChange]>,
        lane_parents: Option<Vec<CommitId>>,
    ) -> Result<usize> {
        if self.graph.row_index.contains_key(&commit.id) {
            return Err(RevError::StructuralViolation(format!(
                "duplicate commit {}",
                commit.id
            )));
        }
        if self.graph.policy == ParentPolicy::Strict
            && !commit.synthetic
            && !commit.parents.is_empty()
            && !commit.parents.iter().any(|p| self.store.contains(*p))
        {
            return Err(RevError::StructuralViolation(format!(
                "no parent of {} is loaded",
                commit.id
            )));
        }

        let id = commit.id;
        let commit = self.store.insert_commit(commit);
        if let Some(files) = files {
            self.store.insert_files(FileSetKey::of(id), files);
        }

        let parents = lane_parents.unwrap_or_else(|| commit.parents.clone());
        let info = self.graph.assigner.assign(id, &parents, commit.boundary);

        let row = self.graph.rows.len();
        self.graph.rows.push(commit);
        self.graph.row_index.insert(id, row);
        self.graph.lane_parents.push(parents);
        self.graph.lanes.push(info);

        debug!(%id, row, "commit appended");
        Ok(row)
    }
}

/// Read-only view of one session over the shared store.
#[derive(Clone, Copy)]
pub struct HistoryView<'a> {
    store: &'a SharedStore,
    graph: &'a CommitGraph,
}

impl<'a> HistoryView<'a> {
    /// Creates a view.
    pub fn new(store: &'a SharedStore, graph: &'a CommitGraph) -> Self {
        Self { store, graph }
    }

    /// The underlying shared store.
    pub fn store(&self) -> &'a SharedStore {
        self.store
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    /// Whether the view has no rows.
    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Commit record by id, whether or not it is a row of this view.
    pub fn lookup(&self, id: CommitId) -> Option<&'a Commit> {
        self.store.lookup(id).map(|c| c.as_ref())
    }

    /// Row of `id` in this view.
    pub fn row(&self, id: CommitId) -> Option<usize> {
        self.graph.row(id)
    }

    /// Id at `row`.
    pub fn id_at(&self, row: usize) -> Option<CommitId> {
        self.graph.id_at(row)
    }

    /// Commit at `row`.
    pub fn commit_at(&self, row: usize) -> Option<&'a Commit> {
        self.graph.rows.get(row).map(|c| c.as_ref())
    }

    /// Lane annotation of `row`.
    pub fn lane(&self, row: usize) -> Option<&'a LaneInfo> {
        self.graph.lanes.get(row)
    }

    /// Parents used to draw `row`.
    pub fn lane_parents(&self, row: usize) -> &'a [CommitId] {
        self.graph
            .lane_parents
            .get(row)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Children of `id` that are rows of this view.
    pub fn children(&self, id: CommitId) -> Vec<CommitId> {
        self.store
            .children(id)
            .iter()
            .copied()
            .filter(|c| self.graph.row_index.contains_key(c))
            .collect()
    }

    /// Whether `parent` is a direct parent of `child`.
    pub fn is_parent_of(&self, parent: CommitId, child: CommitId) -> bool {
        self.store.is_parent_of(parent, child)
    }

    /// Next commit below `row` drawn on `lane`.
    pub fn lane_parent(&self, row: usize, lane: usize) -> Option<CommitId> {
        (row + 1..self.graph.len())
            .find(|r| self.graph.lanes[*r].lane == lane)
            .and_then(|r| self.id_at(r))
    }

    /// Change set of `id` against its first parent.
    pub fn files(&self, id: CommitId) -> Option<&'a FileChangeSet> {
        self.store.file_set(&FileSetKey::of(id)).map(|s| s.as_ref())
    }

    /// Full path of an entry.
    pub fn file_path(&self, entry: &FileEntry) -> Option<String> {
        self.store.file_path(entry)
    }

    /// Finds the entry for `path` in `set`.
    pub fn find_file<'s>(&self, set: &'s FileChangeSet, path: &str) -> Option<&'s FileEntry> {
        self.store.find_file(set, path)
    }

    /// Rows in load order.
    pub fn iter(&self) -> impl Iterator<Item = &'a Commit> + 'a {
        self.graph.rows.iter().map(|c| c.as_ref())
    }
}

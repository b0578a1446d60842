//! Load session lifecycle.
//!
//! A [`LoadSession`] owns one history stream: the running command, the chunk
//! parser fed by it, and the session's own [`CommitGraph`]. Records go into
//! the repository's [`SharedStore`], so sessions over overlapping history
//! share commit and change records while keeping separate rows and lanes.
//!
//! A file history session streams every ancestor of its start commit into a
//! hidden graph and lets a [`RenameTracker`] pick the rows that touch the
//! file. Only those become visible, each drawn with the next tracked commit
//! as its lane parent.

use crate::commit_id::CommitId;
use crate::error::{RevError, Result};
use crate::events::{EventBus, GraphEvent};
use crate::parser::{ChunkParser, ParsedRecord, RawFileChange};
use crate::process::{OutputStream, ProcessEvent, ProcessOutcome, RunningProcess};
use crate::refs::ReferenceMerger;
use crate::renames::{RenameTracker, Suspension, TrackStep, TrackedCommit};
use crate::store::{CommitGraph, GraphWriter, HistoryView, HistoryWriter, ParentPolicy, SharedStore};
use crate::types::Commit;
use serde::Serialize;
use std::fmt;
use std::mem;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identifier of a load session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a session loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SessionKind {
    /// Everything reachable from the revision range, passed to git as is.
    Full {
        /// Revision range and path filters.
        range: Vec<String>,
    },
    /// The commits touching one file, followed through renames.
    FileHistory {
        /// The file's name at `from`.
        path: String,
        /// Commit to start from.
        from: CommitId,
    },
}

/// Progress of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LoadStatus {
    /// Still streaming.
    Loading,
    /// The stream ended cleanly.
    Complete,
    /// The command failed. Rows loaded before the failure stay.
    Failed {
        /// What the command reported.
        diagnostic: String,
    },
    /// Canceled by the caller.
    Canceled,
}

impl LoadStatus {
    /// Whether the session will not change any more.
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Loading)
    }
}

/// One independent view of history being loaded.
#[derive(Debug)]
pub struct LoadSession {
    id: SessionId,
    kind: SessionKind,
    status: LoadStatus,
    command: String,
    graph: CommitGraph,
    source: Option<CommitGraph>,
    tracker: Option<RenameTracker>,
    held: Option<TrackedCommit>,
    parser: ChunkParser,
    process: Option<RunningProcess>,
    stream_end: Option<LoadStatus>,
    stderr: String,
    violations: Vec<String>,
    truncated: Option<usize>,
    batch: Vec<CommitId>,
    announced: bool,
}

impl LoadSession {
    pub(crate) fn new(kind: SessionKind) -> Self {
        let (source, tracker) = match &kind {
            SessionKind::Full { .. } => (None, None),
            SessionKind::FileHistory { path, from } => (
                Some(CommitGraph::new(ParentPolicy::Streaming)),
                Some(RenameTracker::new(path.clone(), *from)),
            ),
        };

        Self {
            id: SessionId::new(),
            kind,
            status: LoadStatus::Loading,
            command: String::new(),
            graph: CommitGraph::new(ParentPolicy::Streaming),
            source,
            tracker,
            held: None,
            parser: ChunkParser::new(),
            process: None,
            stream_end: None,
            stderr: String::new(),
            violations: Vec::new(),
            truncated: None,
            batch: Vec::new(),
            announced: false,
        }
    }

    /// Applies `policy` to the graph that receives the history stream.
    pub(crate) fn with_parent_policy(mut self, policy: ParentPolicy) -> Self {
        match self.source.as_mut() {
            Some(source) => *source = CommitGraph::new(policy),
            None => self.graph = CommitGraph::new(policy),
        }
        self
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// What the session loads.
    pub fn kind(&self) -> &SessionKind {
        &self.kind
    }

    /// Current status.
    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    /// Whether the session will not change any more.
    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    /// The history command the session streams.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Everything the command wrote to stderr so far.
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Messages of records that were dropped.
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    /// Bytes discarded because the stream ended inside a record.
    pub fn truncated_bytes(&self) -> Option<usize> {
        self.truncated
    }

    /// Records decoded from the stream.
    pub fn records_parsed(&self) -> usize {
        self.parser.emitted()
    }

    /// Commits found by the rename tracker, newest first, with the file's
    /// name in each. Empty for full sessions.
    pub fn tracked(&self) -> &[TrackedCommit] {
        self.tracker
            .as_ref()
            .map(RenameTracker::history)
            .unwrap_or(&[])
    }

    /// The session's visible rows.
    pub fn view<'a>(&'a self, store: &'a SharedStore) -> HistoryView<'a> {
        HistoryView::new(store, &self.graph)
    }

    pub(crate) fn attach(&mut self, process: RunningProcess) {
        self.command = process.command().to_string();
        info!(session = %self.id, command = %self.command, "load started");
        self.process = Some(process);
    }

    pub(crate) fn next_event(&mut self, wait: Option<Duration>) -> Option<ProcessEvent> {
        let process = self.process.as_mut()?;
        match wait {
            Some(timeout) => process.wait_event(timeout),
            None => process.try_event(),
        }
    }

    /// Parses a chunk of stdout and appends every completed record.
    pub(crate) fn ingest(
        &mut self,
        bytes: &[u8],
        store: &mut SharedStore,
        refs: &mut ReferenceMerger,
    ) {
        if self.status.is_finished() || self.stream_end.is_some() {
            return;
        }
        for record in self.parser.feed(bytes) {
            self.apply(record, store, refs);
        }
    }

    fn apply(&mut self, record: ParsedRecord, store: &mut SharedStore, refs: &mut ReferenceMerger) {
        let ParsedRecord { commit, files } = record;
        let id = commit.id;
        // The log prints no usable file block for merges or boundaries.
        let files = if commit.is_merge() || commit.boundary {
            None
        } else {
            Some(files.as_slice())
        };

        let graph = match self.source.as_mut() {
            Some(source) => source,
            None => &mut self.graph,
        };
        let appended = GraphWriter { store, graph }.append(commit, files, None);
        match appended {
            Ok(_) => {
                refs.on_append(id);
                if self.source.is_none() {
                    self.batch.push(id);
                }
            }
            Err(err) => self.reject(err),
        }
    }

    fn reject(&mut self, err: RevError) {
        warn!(session = %self.id, error = %err, "record dropped");
        self.violations.push(err.to_string());
    }

    /// Appends the synthetic working tree commit as the next row.
    pub(crate) fn append_working_dir(
        &mut self,
        commit: Commit,
        files: &[RawFileChange],
        store: &mut SharedStore,
    ) -> Result<()> {
        let id = commit.id;
        GraphWriter {
            store,
            graph: &mut self.graph,
        }
        .append(commit, Some(files), None)?;
        self.batch.push(id);
        debug!(session = %self.id, files = files.len(), "working tree changes shown");
        Ok(())
    }

    pub(crate) fn note_stderr(&mut self, bytes: &[u8]) {
        let text = String::from_utf8_lossy(bytes);
        debug!(session = %self.id, stderr = %text.trim_end(), "diagnostic output");
        self.stderr.push_str(&text);
    }

    /// Handles the end of the stream: flushes the parser and settles the
    /// status from the process outcome.
    pub(crate) fn end_stream(
        &mut self,
        outcome: &ProcessOutcome,
        store: &mut SharedStore,
        refs: &mut ReferenceMerger,
    ) {
        self.process = None;
        if self.status.is_finished() || self.stream_end.is_some() {
            return;
        }

        match self.parser.finish() {
            Ok(Some(record)) => self.apply(record, store, refs),
            Ok(None) => {}
            Err(err) => {
                if let RevError::ParseTruncation { bytes } = err {
                    self.truncated = Some(bytes);
                }
                warn!(session = %self.id, error = %err, "incomplete record discarded");
            }
        }

        let status = match outcome.check(&self.command) {
            Ok(()) => LoadStatus::Complete,
            Err(RevError::Canceled) => LoadStatus::Canceled,
            Err(err) => {
                warn!(session = %self.id, error = %err, "load failed");
                LoadStatus::Failed {
                    diagnostic: outcome.diagnostic(),
                }
            }
        };

        if status == LoadStatus::Complete && self.tracker.is_none() {
            for violation in refs.finish_load(store) {
                self.reject(violation);
            }
        }

        if self.tracker.is_some() && status != LoadStatus::Canceled {
            self.stream_end = Some(status);
        } else {
            self.finish(status);
        }
    }

    fn finish(&mut self, status: LoadStatus) {
        info!(
            session = %self.id,
            rows = self.graph.len(),
            status = ?status,
            "load finished"
        );
        self.status = status;
    }

    /// Marks the session failed without waiting for the stream.
    pub(crate) fn fail(&mut self, diagnostic: String) {
        if self.status.is_finished() {
            return;
        }
        if let Some(process) = self.process.take() {
            process.cancel();
        }
        self.parser.reset();
        self.held = None;
        self.finish(LoadStatus::Failed { diagnostic });
    }

    /// Stops the session. Rows already appended stay queryable.
    ///
    /// Returns `false` if the session had already finished.
    pub(crate) fn cancel(&mut self) -> bool {
        if self.status.is_finished() {
            return false;
        }
        if let Some(process) = self.process.take() {
            process.cancel();
        }
        self.parser.reset();
        self.held = None;
        self.stream_end = None;
        self.finish(LoadStatus::Canceled);
        true
    }

    /// Advances the rename tracker as far as the loaded data allows.
    ///
    /// Returns the commit whose change set must be fetched before tracking
    /// can continue.
    pub(crate) fn track(&mut self, store: &mut SharedStore) -> Option<CommitId> {
        if self.status.is_finished() {
            return None;
        }
        let complete = self.stream_end.is_some();

        loop {
            let step = match (self.tracker.as_mut(), self.source.as_ref()) {
                (Some(tracker), Some(source)) => {
                    tracker.advance(&HistoryView::new(store, source), complete)
                }
                _ => return None,
            };

            match step {
                TrackStep::Found(found) => {
                    let next = found.id;
                    if let Some(prev) = self.held.replace(found) {
                        self.show_tracked(prev.id, vec![next], store);
                    }
                }
                TrackStep::Suspended(Suspension::NeedFiles(id)) => return Some(id),
                TrackStep::Suspended(Suspension::NeedCommits) => return None,
                TrackStep::Exhausted => {
                    if let Some(last) = self.held.take() {
                        self.show_tracked(last.id, Vec::new(), store);
                    }
                    let status = self.stream_end.take().unwrap_or(LoadStatus::Complete);
                    self.finish(status);
                    return None;
                }
            }
        }
    }

    fn show_tracked(&mut self, id: CommitId, lane_parents: Vec<CommitId>, store: &mut SharedStore) {
        let Some(commit) = store.lookup(id).map(|c| c.as_ref().clone()) else {
            return;
        };
        let appended = GraphWriter {
            store,
            graph: &mut self.graph,
        }
        .append(commit, None, Some(lane_parents));
        match appended {
            Ok(_) => self.batch.push(id),
            Err(err) => self.reject(err),
        }
    }

    fn take_batch(&mut self) -> Vec<CommitId> {
        mem::take(&mut self.batch)
    }

    fn take_announcement(&mut self) -> Option<GraphEvent> {
        if self.announced || !self.status.is_finished() {
            return None;
        }
        self.announced = true;
        Some(match &self.status {
            LoadStatus::Canceled => GraphEvent::LoadCanceled { session: self.id },
            status => GraphEvent::LoadCompleted {
                session: self.id,
                status: status.clone(),
            },
        })
    }
}

/// Mutable repository state a session writes into while it loads.
pub(crate) struct Loader<'a> {
    pub(crate) store: &'a mut SharedStore,
    pub(crate) refs: &'a mut ReferenceMerger,
    pub(crate) bus: &'a mut EventBus,
    pub(crate) batch_size: usize,
}

impl Loader<'_> {
    /// Handles every pending process event of `session`.
    ///
    /// With `wait` the first event may be awaited that long. Returns the
    /// number of events handled.
    pub(crate) fn service(&mut self, session: &mut LoadSession, wait: Option<Duration>) -> usize {
        let mut wait = wait;
        let mut handled = 0;

        while let Some(event) = session.next_event(wait.take()) {
            handled += 1;
            match event {
                ProcessEvent::Data {
                    bytes,
                    stream: OutputStream::Stdout,
                } => session.ingest(&bytes, self.store, self.refs),
                ProcessEvent::Data {
                    bytes,
                    stream: OutputStream::Stderr,
                } => session.note_stderr(&bytes),
                ProcessEvent::Finished(outcome) => {
                    session.end_stream(&outcome, self.store, self.refs)
                }
            }
        }

        self.announce(session);
        handled
    }

    /// Publishes appended rows and, once, the final status.
    pub(crate) fn announce(&mut self, session: &mut LoadSession) {
        let ids = session.take_batch();
        for chunk in ids.chunks(self.batch_size.max(1)) {
            self.bus.publish(GraphEvent::CommitsAppended {
                session: session.id(),
                ids: chunk.to_vec(),
            });
        }
        if let Some(event) = session.take_announcement() {
            self.bus.publish(event);
        }
    }
}

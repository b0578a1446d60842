//! Repository handle providing the main revgraph API.

use crate::commit_id::CommitId;
use crate::config::Config;
use crate::error::{RevError, Result};
use crate::events::{EventBus, GraphEvent};
use crate::git::GitCommands;
use crate::parser::{parse_file_block, parse_path_list, RawFileChange};
use crate::process::{ContextToken, ProcessRunner, SyncOutput};
use crate::refs::{parse_tag_message, Direction, NearestTags, RefSnapshot, ReferenceMerger};
use crate::renames::TrackedCommit;
use crate::session::{LoadSession, LoadStatus, Loader, SessionId, SessionKind};
use crate::store::{HistoryView, SharedStore};
use crate::types::{Commit, FileChangeSet, FileSetKey};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Handle to one git work tree and the history loaded from it.
///
/// All mutation happens through `&mut self`, on the thread owning the
/// handle. Loads progress when the owner calls [`pump`](Self::pump),
/// [`pump_all`](Self::pump_all) or [`wait`](Self::wait); synchronous git
/// calls made by the handle keep pumping every session while they block.
pub struct Repository {
    /// Top level of the work tree.
    workdir: PathBuf,
    /// Settings in force.
    config: Config,
    /// Command line builders.
    git: GitCommands,
    /// Launches git.
    runner: ProcessRunner,
    /// Held while no synchronous wait is in progress.
    context: Option<ContextToken>,
    /// Records shared by every session.
    store: SharedStore,
    /// Branch and tag metadata.
    refs: ReferenceMerger,
    /// Open load sessions.
    sessions: HashMap<SessionId, LoadSession>,
    /// Notification fan-out.
    bus: EventBus,
}

impl Repository {
    /// Opens the work tree containing `path`.
    ///
    /// Configuration is read from the work tree as described in
    /// [`Config::load`].
    ///
    /// # Errors
    ///
    /// `RevError::NotARepository` if git does not recognise a work tree at
    /// `path`, `RevError::StartFailure` if git cannot be run, and
    /// configuration errors.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use revgraph_core::Repository;
    ///
    /// let mut repo = Repository::open(".").unwrap();
    /// let session = repo.start_load(&[]).unwrap();
    /// repo.wait(session).unwrap();
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut repo = Self::open_with_config(path, Config::load(path)?)?;
        if repo.workdir != path {
            let config = Config::load(&repo.workdir)?;
            repo.configure(config);
        }
        Ok(repo)
    }

    /// Opens the work tree containing `path` with explicit settings.
    pub fn open_with_config(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(RevError::NotARepository(path.to_path_buf()));
        }

        let runner = ProcessRunner::new(config.process.clone());
        let git = GitCommands::new(&config.process, &config.load);
        let mut context = Some(ContextToken::new());

        let output = runner.run_sync(&git.toplevel(), path, None, &mut context, || {})?;
        let toplevel = match output.into_text() {
            Ok(text) => text.trim().to_string(),
            Err(RevError::StreamFailure { diagnostic, .. }) => {
                debug!(path = %path.display(), %diagnostic, "not a work tree");
                return Err(RevError::NotARepository(path.to_path_buf()));
            }
            Err(e) => return Err(e),
        };
        if toplevel.is_empty() {
            return Err(RevError::NotARepository(path.to_path_buf()));
        }

        info!(workdir = %toplevel, "repository opened");
        Ok(Self {
            workdir: PathBuf::from(toplevel),
            bus: EventBus::new(config.events.max_listeners),
            config,
            git,
            runner,
            context,
            store: SharedStore::new(),
            refs: ReferenceMerger::new(),
            sessions: HashMap::new(),
        })
    }

    /// Replaces the settings in force.
    ///
    /// Event subscriptions are dropped; running sessions keep the settings
    /// they started with.
    pub fn configure(&mut self, config: Config) {
        self.runner = ProcessRunner::new(config.process.clone());
        self.git = GitCommands::new(&config.process, &config.load);
        self.bus = EventBus::new(config.events.max_listeners);
        self.config = config;
    }

    /// Top level directory of the work tree.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Settings in force.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registers a subscriber for load notifications.
    pub fn subscribe(&mut self) -> Result<Receiver<GraphEvent>> {
        self.bus.subscribe()
    }

    /// Runs a git command to completion, pumping every session meanwhile.
    fn run_git(&mut self, command: &str) -> Result<SyncOutput> {
        let Self {
            workdir,
            config,
            runner,
            context,
            store,
            refs,
            sessions,
            bus,
            ..
        } = self;
        let mut loader = Loader {
            store,
            refs,
            bus,
            batch_size: config.load.batch_size,
        };
        runner.run_sync(command, workdir, None, context, || {
            for session in sessions.values_mut() {
                loader.service(session, None);
            }
        })
    }

    fn git_text(&mut self, command: &str) -> Result<String> {
        self.run_git(command)?.into_text()
    }

    // ---------------------------------------------------------------------
    // Sessions
    // ---------------------------------------------------------------------

    /// Starts loading the history of `range`.
    ///
    /// The range is handed to `git log` unchanged; an empty range means
    /// `HEAD`. References are re-read first. When the range shows `HEAD`
    /// and the work tree has uncommitted changes, a synthetic commit for
    /// them becomes the first row.
    pub fn start_load(&mut self, range: &[String]) -> Result<SessionId> {
        self.refresh_references()?;

        let mut session = LoadSession::new(SessionKind::Full {
            range: range.to_vec(),
        })
        .with_parent_policy(self.config.load.parent_policy);

        if self.config.load.include_working_dir && shows_head(range) {
            if let Some((head, files)) = self.working_dir_changes()? {
                let commit = Commit::working_dir(head, current_timestamp());
                let id = commit.id;
                session.append_working_dir(commit, &files, &mut self.store)?;
                self.refs.on_append(id);
            }
        }

        let command = self.git.log(range);
        let process = self.runner.start(&command, &self.workdir, None)?;
        session.attach(process);

        let id = session.id();
        self.sessions.insert(id, session);
        Ok(id)
    }

    /// Starts loading the history of one file, following renames.
    ///
    /// `from` defaults to `HEAD`. The session's rows are the commits that
    /// touched the file under any of its names.
    pub fn start_file_history(&mut self, path: &str, from: Option<CommitId>) -> Result<SessionId> {
        let from = match from {
            Some(id) => id,
            None => self.resolve("HEAD")?,
        };

        let mut session = LoadSession::new(SessionKind::FileHistory {
            path: path.to_string(),
            from,
        })
        .with_parent_policy(self.config.load.parent_policy);
        let command = self.git.log(&[from.as_hex()]);
        let process = self.runner.start(&command, &self.workdir, None)?;
        session.attach(process);

        let id = session.id();
        self.sessions.insert(id, session);
        Ok(id)
    }

    /// Processes everything session `id` has received so far.
    pub fn pump(&mut self, id: SessionId) -> Result<LoadStatus> {
        self.pump_with(id, None)
    }

    /// Like [`pump`](Self::pump), but blocks up to `timeout` for output
    /// when nothing is pending.
    pub fn pump_timeout(&mut self, id: SessionId, timeout: Duration) -> Result<LoadStatus> {
        self.pump_with(id, Some(timeout))
    }

    fn pump_with(&mut self, id: SessionId, wait: Option<Duration>) -> Result<LoadStatus> {
        {
            let batch_size = self.config.load.batch_size;
            let session = self
                .sessions
                .get_mut(&id)
                .ok_or_else(|| RevError::UnknownSession(id.to_string()))?;
            Loader {
                store: &mut self.store,
                refs: &mut self.refs,
                bus: &mut self.bus,
                batch_size,
            }
            .service(session, wait);
        }

        loop {
            let needed = match self.sessions.get_mut(&id) {
                Some(session) => session.track(&mut self.store),
                None => None,
            };
            let Some(needed) = needed else {
                break;
            };
            if let Err(err) = self.file_changes(needed, None, false) {
                warn!(session = %id, commit = %needed, error = %err, "change set unavailable");
                if let Some(session) = self.sessions.get_mut(&id) {
                    session.fail(err.to_string());
                }
                break;
            }
        }

        let batch_size = self.config.load.batch_size;
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or_else(|| RevError::UnknownSession(id.to_string()))?;
        Loader {
            store: &mut self.store,
            refs: &mut self.refs,
            bus: &mut self.bus,
            batch_size,
        }
        .announce(session);
        Ok(session.status().clone())
    }

    /// Pumps every session. Returns how many are still loading.
    pub fn pump_all(&mut self) -> Result<usize> {
        let ids: Vec<SessionId> = self.sessions.keys().copied().collect();
        let mut loading = 0;
        for id in ids {
            if !self.pump(id)?.is_finished() {
                loading += 1;
            }
        }
        Ok(loading)
    }

    /// Blocks until session `id` finishes, returning its final status.
    pub fn wait(&mut self, id: SessionId) -> Result<LoadStatus> {
        let poll = self.config.process.poll_interval();
        loop {
            let status = self.pump_with(id, Some(poll))?;
            if status.is_finished() {
                return Ok(status);
            }
        }
    }

    /// Cancels session `id`. Rows loaded so far stay queryable.
    ///
    /// Returns `false` if the session had already finished.
    pub fn cancel(&mut self, id: SessionId) -> Result<bool> {
        let batch_size = self.config.load.batch_size;
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or_else(|| RevError::UnknownSession(id.to_string()))?;
        let canceled = session.cancel();
        Loader {
            store: &mut self.store,
            refs: &mut self.refs,
            bus: &mut self.bus,
            batch_size,
        }
        .announce(session);
        Ok(canceled)
    }

    /// Cancels every running session.
    pub fn cancel_all(&mut self) {
        let ids: Vec<SessionId> = self.sessions.keys().copied().collect();
        for id in ids {
            let _ = self.cancel(id);
        }
    }

    /// Cancels session `id` if needed and forgets it.
    pub fn close(&mut self, id: SessionId) -> Result<()> {
        self.cancel(id)?;
        self.sessions.remove(&id);
        Ok(())
    }

    /// Cancels everything and discards all loaded history.
    pub fn reset(&mut self) {
        self.cancel_all();
        self.sessions.clear();
        self.store.reset();
        self.refs.reset();
        info!(workdir = %self.workdir.display(), "repository state reset");
    }

    /// Session `id`.
    pub fn session(&self, id: SessionId) -> Result<&LoadSession> {
        self.sessions
            .get(&id)
            .ok_or_else(|| RevError::UnknownSession(id.to_string()))
    }

    /// Every open session.
    pub fn sessions(&self) -> impl Iterator<Item = &LoadSession> {
        self.sessions.values()
    }

    /// Rows of session `id`.
    pub fn view(&self, id: SessionId) -> Result<HistoryView<'_>> {
        Ok(self.session(id)?.view(&self.store))
    }

    /// Loads the history of `path` from `from` and returns the commits that
    /// touched it, newest first.
    pub fn follow_renames(&mut self, path: &str, from: Option<CommitId>) -> Result<Vec<TrackedCommit>> {
        let id = self.start_file_history(path, from)?;
        let status = self.wait(id)?;
        let session = self
            .sessions
            .remove(&id)
            .ok_or_else(|| RevError::UnknownSession(id.to_string()))?;

        match status {
            LoadStatus::Failed { diagnostic } => Err(RevError::StreamFailure {
                command: session.command().to_string(),
                diagnostic,
            }),
            LoadStatus::Canceled => Err(RevError::Canceled),
            _ => Ok(session.tracked().to_vec()),
        }
    }

    // ---------------------------------------------------------------------
    // Graph queries
    // ---------------------------------------------------------------------

    /// The records shared by all sessions.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Commit record by id, from any session.
    pub fn lookup(&self, id: CommitId) -> Option<&Commit> {
        self.store.lookup(id).map(|c| c.as_ref())
    }

    /// Loaded children of `id`.
    pub fn children(&self, id: CommitId) -> &[CommitId] {
        self.store.children(id)
    }

    /// Resolves a revision to a commit id.
    ///
    /// # Errors
    ///
    /// `RevError::UnknownCommit` when `rev` names no commit.
    pub fn resolve(&mut self, rev: &str) -> Result<CommitId> {
        let command = self.git.rev_parse(rev);
        let text = self.git_text(&command)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(RevError::UnknownCommit(rev.to_string()));
        }
        CommitId::from_hex(text)
    }

    // ---------------------------------------------------------------------
    // References
    // ---------------------------------------------------------------------

    /// Branch and tag metadata.
    pub fn references(&self) -> &ReferenceMerger {
        &self.refs
    }

    /// Re-reads every reference and the checked out branch.
    pub fn refresh_references(&mut self) -> Result<()> {
        let show_ref = self.git.show_ref();
        let listing = self.git_text(&show_ref)?;
        let symbolic = self.git.symbolic_head();
        let head = self.git_text(&symbolic)?;

        let snapshot = RefSnapshot::parse(&listing, &head);
        self.refs.load_references(&snapshot, &self.store);
        debug!(refs = snapshot.entries.len(), "reference snapshot taken");
        Ok(())
    }

    /// Nearest tags of `id` in `direction`.
    pub fn nearest_tag(&mut self, id: CommitId, direction: Direction) -> NearestTags {
        self.refs.nearest_tag(id, direction, &self.store)
    }

    /// Branches that contain `id`.
    pub fn descendant_branches(&self, id: CommitId) -> Vec<String> {
        self.refs.descendant_branches(id, &self.store)
    }

    /// Message of the annotated tag on `id`, fetched once and cached.
    ///
    /// `None` when no annotated tag points at `id`.
    pub fn tag_message(&mut self, id: CommitId) -> Result<Option<String>> {
        if let Some(message) = self.refs.tag_message(id) {
            return Ok(Some(message.to_string()));
        }
        let Some(object) = self.refs.tag_object(id).map(String::from) else {
            return Ok(None);
        };

        let command = self.git.cat_file_tag(&object);
        let message = parse_tag_message(&self.git_text(&command)?);
        self.refs.set_tag_message(id, message.clone());
        Ok(Some(message))
    }

    // ---------------------------------------------------------------------
    // Change data
    // ---------------------------------------------------------------------

    /// Files changed by `id`, computed on first request and cached.
    ///
    /// Without `diff_to` the diff is against the first parent, or against
    /// every parent of a merge when `all_parents` is set.
    pub fn file_changes(
        &mut self,
        id: CommitId,
        diff_to: Option<CommitId>,
        all_parents: bool,
    ) -> Result<Arc<FileChangeSet>> {
        let key = FileSetKey {
            id,
            diff_to,
            all_parents,
        };
        if let Some(set) = self.store.file_set(&key) {
            return Ok(Arc::clone(set));
        }

        let commit = self.store.lookup(id).cloned();
        if commit.as_ref().is_some_and(|c| c.synthetic) {
            return Err(RevError::UnknownCommit(id.to_string()));
        }

        let base = match (diff_to, &commit) {
            (Some(other), _) => Some(other),
            (None, Some(c)) if c.is_merge() && !all_parents => c.parents.first().copied(),
            _ => None,
        };
        let command = self
            .git
            .diff_tree(id, base, all_parents && diff_to.is_none());
        let files = parse_file_block(&self.git_text(&command)?);
        debug!(%id, files = files.len(), "change set fetched");
        Ok(self.store.insert_files(key, &files))
    }

    /// Content of `path` at revision `rev`.
    pub fn file_content(&mut self, rev: &str, path: &str) -> Result<String> {
        let command = self.git.show_file(rev, path);
        self.git_text(&command)
    }

    fn working_dir_changes(&mut self) -> Result<Option<(CommitId, Vec<RawFileChange>)>> {
        let command = self.git.head();
        let head = self.git_text(&command)?;
        let head = head.trim();
        if head.is_empty() {
            return Ok(None);
        }
        let head = CommitId::from_hex(head)?;

        let command = self.git.diff_index_head();
        let mut files = parse_file_block(&self.git_text(&command)?);
        let command = self.git.untracked_files();
        files.extend(parse_path_list(&self.git_text(&command)?));

        if files.is_empty() {
            return Ok(None);
        }
        Ok(Some((head, files)))
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("workdir", &self.workdir)
            .field("sessions", &self.sessions.len())
            .field("commits", &self.store.len())
            .finish()
    }
}

fn shows_head(range: &[String]) -> bool {
    let revs: Vec<&String> = range
        .iter()
        .take_while(|a| a.as_str() != "--")
        .filter(|a| !a.starts_with('-') || a.as_str() == "--all")
        .collect();
    revs.is_empty() || revs.iter().any(|a| a.as_str() == "HEAD" || a.as_str() == "--all")
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

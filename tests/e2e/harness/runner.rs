use super::assertions::{Assertion, StatusMatch};
use super::fixture::GitFixture;
use super::steps::ScenarioStep;
use anyhow::{anyhow, bail, ensure, Context, Result};
use revgraph_core::{CommitId, LoadStatus, RefKind, Repository, SessionId};
use std::collections::HashMap;
use std::time::Duration;

const POLL: Duration = Duration::from_millis(10);

/// Executes scenarios against a real git repository
pub struct ScenarioRunner {
    fixture: GitFixture,
    repo: Option<Repository>,
    labels: HashMap<String, CommitId>,
    session: Option<SessionId>,
    status: Option<LoadStatus>,
    rows_at_cancel: Option<usize>,
    current_step: usize,
}

impl ScenarioRunner {
    /// Create a new runner over an empty repository
    pub fn new() -> Result<Self> {
        Ok(Self {
            fixture: GitFixture::init()?,
            repo: None,
            labels: HashMap::new(),
            session: None,
            status: None,
            rows_at_cancel: None,
            current_step: 0,
        })
    }

    /// Get current step number
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Execute all steps in sequence
    pub fn execute(&mut self, steps: &[ScenarioStep]) -> Result<()> {
        for (i, step) in steps.iter().enumerate() {
            self.current_step = i;
            self.execute_step(step)
                .with_context(|| format!("Step {}: {:?}", i, step))?;
        }
        Ok(())
    }

    /// Execute a single step
    fn execute_step(&mut self, step: &ScenarioStep) -> Result<()> {
        match step {
            ScenarioStep::WriteFile { path, content } => self.fixture.write_file(path, content),
            ScenarioStep::RemoveFile { path } => self.fixture.remove_file(path),
            ScenarioStep::RenameFile { from, to } => self.fixture.rename(from, to),
            ScenarioStep::Commit { label, message } => {
                let id = self.fixture.commit(message)?;
                self.labels.insert(label.clone(), id);
                Ok(())
            }
            ScenarioStep::Branch { name } => self.fixture.branch(name),
            ScenarioStep::Checkout { name } => self.fixture.checkout(name),
            ScenarioStep::Merge { label, branch } => {
                let id = self.fixture.merge(branch, &format!("merge {}", branch))?;
                self.labels.insert(label.clone(), id);
                Ok(())
            }
            ScenarioStep::Tag { name, message } => self.fixture.tag(name, message.as_deref()),

            ScenarioStep::Load { range } => self.handle_load(range),
            ScenarioStep::LoadFileHistory { path } => self.handle_file_history(path),
            ScenarioStep::LoadAndCancel => self.handle_load_and_cancel(),

            ScenarioStep::Assert { assertion } => self.handle_assertion(assertion),
        }
    }

    // ===== Load handlers =====

    fn repo(&mut self) -> Result<&mut Repository> {
        if self.repo.is_none() {
            let repo = Repository::open(self.fixture.path())?;
            self.repo = Some(repo);
        }
        self.repo
            .as_mut()
            .ok_or_else(|| anyhow!("Repository not available"))
    }

    fn handle_load(&mut self, range: &[String]) -> Result<()> {
        let repo = self.repo()?;
        let id = repo.start_load(range)?;
        let status = repo.wait(id)?;
        self.session = Some(id);
        self.status = Some(status);
        Ok(())
    }

    fn handle_file_history(&mut self, path: &str) -> Result<()> {
        let repo = self.repo()?;
        let id = repo.start_file_history(path, None)?;
        let status = repo.wait(id)?;
        self.session = Some(id);
        self.status = Some(status);
        Ok(())
    }

    fn handle_load_and_cancel(&mut self) -> Result<()> {
        let repo = self.repo()?;
        let id = repo.start_load(&[])?;

        loop {
            let status = repo.pump_timeout(id, POLL)?;
            if status.is_finished() || !repo.view(id)?.is_empty() {
                break;
            }
        }

        let rows = repo.view(id)?.len();
        let canceled = repo.cancel(id)?;
        let status = repo.wait(id)?;

        self.rows_at_cancel = canceled.then_some(rows);
        self.session = Some(id);
        self.status = Some(status);
        Ok(())
    }

    // ===== Assertion handlers =====

    fn handle_assertion(&mut self, assertion: &Assertion) -> Result<()> {
        match assertion {
            Assertion::Status(expected) => self.assert_status(expected),
            Assertion::NoViolations => {
                let id = self.session()?;
                let violations = self.repo()?.session(id)?.violations().to_vec();
                ensure!(violations.is_empty(), "Unexpected violations: {:?}", violations);
                Ok(())
            }
            Assertion::NoRowsAfterCancel => self.assert_no_rows_after_cancel(),
            Assertion::RowCount(n) => {
                let id = self.session()?;
                let len = self.repo()?.view(id)?.len();
                ensure!(len == *n, "Expected {} rows, found {}", n, len);
                Ok(())
            }
            Assertion::Rows(expected) => {
                let rows = self.row_labels()?;
                ensure!(&rows == expected, "Expected rows {:?}, found {:?}", expected, rows);
                Ok(())
            }
            Assertion::FirstRowUncommitted => {
                let id = self.session()?;
                let repo = self.repo()?;
                let view = repo.view(id)?;
                let first = view
                    .commit_at(0)
                    .ok_or_else(|| anyhow!("No rows loaded"))?;
                ensure!(first.synthetic, "First row is {}, not uncommitted", first.id);
                Ok(())
            }
            Assertion::ChildrenBeforeParents => self.assert_children_before_parents(),
            Assertion::LaneOf { label, lane } => {
                let commit = self.label(label)?;
                let id = self.session()?;
                let repo = self.repo()?;
                let view = repo.view(id)?;
                let row = view
                    .row(commit)
                    .ok_or_else(|| anyhow!("{} is not in the view", label))?;
                let found = view
                    .lane(row)
                    .map(|info| info.lane)
                    .ok_or_else(|| anyhow!("{} has no lane", label))?;
                ensure!(found == *lane, "{} is on lane {}, expected {}", label, found, lane);
                Ok(())
            }
            Assertion::Children { label, children } => {
                let id = self.label(label)?;
                let ids = self.repo()?.children(id).to_vec();
                let found = self.sorted_labels(&ids);
                ensure_same(label, "children", children, found)
            }
            Assertion::DescendantBranches { label, branches } => {
                let id = self.label(label)?;
                let found = self.repo()?.descendant_branches(id);
                ensure_same(label, "branches", branches, found)
            }
            Assertion::RefNames { label, names } => {
                let id = self.label(label)?;
                let found = self.repo()?.references().ref_names(id, RefKind::ANY_REF);
                ensure_same(label, "refs", names, found)
            }
            Assertion::NearestTags {
                label,
                direction,
                tags,
            } => {
                let id = self.label(label)?;
                let found = self.repo()?.nearest_tag(id, *direction);
                ensure!(found.complete, "Tag walk from {} incomplete", label);
                ensure_same(label, "tags", tags, found.tags)
            }
            Assertion::TagMessage { label, message } => {
                let id = self.label(label)?;
                let found = self.repo()?.tag_message(id)?;
                ensure!(
                    found.as_deref() == Some(message.as_str()),
                    "Tag message of {} is {:?}, expected {:?}",
                    label,
                    found,
                    message
                );
                Ok(())
            }
            Assertion::ChangedFiles { label, files } => {
                let id = self.label(label)?;
                let repo = self.repo()?;
                let set = repo.file_changes(id, None, false)?;
                let found: Vec<String> = set
                    .entries
                    .iter()
                    .filter_map(|entry| {
                        repo.store()
                            .file_path(entry)
                            .map(|path| format!("{} {}", entry.status.letter(), path))
                    })
                    .collect();
                ensure_same(label, "files", files, found)
            }
            Assertion::Tracked(expected) => {
                let id = self.session()?;
                let tracked = self.repo()?.session(id)?.tracked().to_vec();
                let found: Vec<(String, String)> = tracked
                    .into_iter()
                    .map(|t| (self.label_of(t.id), t.path))
                    .collect();
                ensure!(
                    &found == expected,
                    "Expected history {:?}, found {:?}",
                    expected,
                    found
                );
                Ok(())
            }
            Assertion::Custom(check) => check(self.repo()?),
        }
    }

    fn assert_status(&self, expected: &StatusMatch) -> Result<()> {
        let status = self
            .status
            .as_ref()
            .ok_or_else(|| anyhow!("Nothing loaded yet"))?;
        let matches = matches!(
            (expected, status),
            (StatusMatch::Complete, LoadStatus::Complete)
                | (StatusMatch::Failed, LoadStatus::Failed { .. })
                | (StatusMatch::Canceled, LoadStatus::Canceled)
        );
        ensure!(matches, "Expected status {:?}, found {:?}", expected, status);
        Ok(())
    }

    fn assert_no_rows_after_cancel(&mut self) -> Result<()> {
        let id = self.session()?;
        let rows_at_cancel = self.rows_at_cancel;
        let status = self.status.clone();
        let len = self.repo()?.view(id)?.len();

        match rows_at_cancel {
            Some(rows) => {
                ensure!(
                    status == Some(LoadStatus::Canceled),
                    "Canceled load ended as {:?}",
                    status
                );
                ensure!(len == rows, "Rows grew from {} to {} after cancel", rows, len);
            }
            // The load finished before the cancel request.
            None => ensure!(
                status == Some(LoadStatus::Complete),
                "Load ended as {:?}",
                status
            ),
        }
        Ok(())
    }

    fn assert_children_before_parents(&mut self) -> Result<()> {
        let id = self.session()?;
        let repo = self.repo()?;
        let view = repo.view(id)?;
        for row in 0..view.len() {
            let commit = view
                .commit_at(row)
                .ok_or_else(|| anyhow!("Row {} missing", row))?;
            for parent in &commit.parents {
                if let Some(parent_row) = view.row(*parent) {
                    ensure!(
                        parent_row > row,
                        "Parent {} at row {} precedes child {} at row {}",
                        parent,
                        parent_row,
                        commit.id,
                        row
                    );
                }
            }
        }
        Ok(())
    }

    // ===== Labels =====

    fn session(&self) -> Result<SessionId> {
        self.session.ok_or_else(|| anyhow!("Nothing loaded yet"))
    }

    fn label(&self, label: &str) -> Result<CommitId> {
        match self.labels.get(label) {
            Some(id) => Ok(*id),
            None => bail!("Unknown commit label: {}", label),
        }
    }

    fn label_of(&self, id: CommitId) -> String {
        if id == CommitId::working_dir() {
            return "uncommitted".to_string();
        }
        self.labels
            .iter()
            .find(|(_, candidate)| **candidate == id)
            .map(|(label, _)| label.clone())
            .unwrap_or_else(|| id.short())
    }

    fn sorted_labels(&self, ids: &[CommitId]) -> Vec<String> {
        let mut labels: Vec<String> = ids.iter().map(|id| self.label_of(*id)).collect();
        labels.sort();
        labels
    }

    fn row_labels(&mut self) -> Result<Vec<String>> {
        let id = self.session()?;
        let ids: Vec<CommitId> = {
            let repo = self.repo()?;
            let view = repo.view(id)?;
            (0..view.len()).filter_map(|row| view.id_at(row)).collect()
        };
        Ok(ids.into_iter().map(|id| self.label_of(id)).collect())
    }
}

fn ensure_same(label: &str, what: &str, expected: &[String], found: Vec<String>) -> Result<()> {
    let mut expected = expected.to_vec();
    let mut found = found;
    expected.sort();
    found.sort();
    ensure!(
        expected == found,
        "Expected {} of {} to be {:?}, found {:?}",
        what,
        label,
        expected,
        found
    );
    Ok(())
}

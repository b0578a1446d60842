//! CLI commands.

pub mod children;
pub mod file_history;
pub mod log;
pub mod near_tags;
pub mod refs;

use anyhow::{Context, Result};
use chrono::DateTime;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use revgraph_core::{CommitId, GraphEvent, LaneInfo, LoadStatus, Repository, SessionId};
use std::path::Path;
use std::time::Duration;

const TICK: Duration = Duration::from_millis(100);

/// Opens the repository containing `dir`.
pub(crate) fn open(dir: &Path) -> Result<Repository> {
    Repository::open(dir)
        .with_context(|| format!("Failed to open repository at {}", dir.display()))
}

/// Pumps `session` until it finishes, showing a spinner with the row count.
///
/// With a `limit`, the load is canceled once that many rows arrived.
pub(crate) fn drive(
    repo: &mut Repository,
    session: SessionId,
    message: &str,
    limit: Option<usize>,
) -> Result<LoadStatus> {
    let events = repo.subscribe()?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(TICK);

    let mut rows = 0usize;
    let mut canceled = false;
    let status = loop {
        let status = repo.pump_timeout(session, TICK)?;
        for event in events.try_iter() {
            if let GraphEvent::CommitsAppended { session: from, ids } = event {
                if from == session {
                    rows += ids.len();
                }
            }
        }
        pb.set_message(format!("{} {} commits", message, rows));

        if status.is_finished() {
            break status;
        }
        if !canceled && limit.is_some_and(|limit| rows >= limit) {
            repo.cancel(session)?;
            canceled = true;
        }
    };
    pb.finish_and_clear();
    tracing::debug!(%session, rows, ?status, "load finished");

    report(repo, session, &status, canceled)?;
    Ok(status)
}

/// Prints load problems to stderr.
fn report(repo: &Repository, id: SessionId, status: &LoadStatus, limited: bool) -> Result<()> {
    let session = repo.session(id)?;
    match status {
        LoadStatus::Failed { diagnostic } => {
            eprintln!(
                "{} {}",
                style("error:").red().bold(),
                diagnostic.trim_end()
            );
        }
        LoadStatus::Canceled if !limited => {
            eprintln!("{} load canceled", style("warning:").yellow());
        }
        _ => {}
    }
    if let Some(bytes) = session.truncated_bytes() {
        eprintln!(
            "{} output ended inside a record, {} bytes dropped",
            style("warning:").yellow(),
            bytes
        );
    }
    for violation in session.violations() {
        eprintln!("{} {}", style("warning:").yellow(), violation);
    }
    Ok(())
}

/// Loads the whole history reachable from any ref.
pub(crate) fn load_all(repo: &mut Repository) -> Result<SessionId> {
    let session = repo
        .start_load(&["--all".to_string()])
        .context("Failed to start history load")?;
    drive(repo, session, "Loading history...", None)?;
    Ok(session)
}

/// Ref decorations for `id`, e.g. `(HEAD -> main, origin/main, tag: v1) `.
pub(crate) fn decorations(repo: &Repository, id: CommitId) -> String {
    let Some(bundle) = repo.references().bundle(id) else {
        return String::new();
    };

    let mut parts = Vec::new();
    for branch in &bundle.branches {
        if bundle.current_branch.as_deref() == Some(branch.as_str()) {
            parts.push(style(format!("HEAD -> {}", branch)).cyan().bold().to_string());
        } else {
            parts.push(style(branch).green().to_string());
        }
    }
    for remote in &bundle.remote_branches {
        parts.push(style(remote).red().to_string());
    }
    for tag in &bundle.tags {
        parts.push(style(format!("tag: {}", tag)).yellow().to_string());
    }
    for name in &bundle.refs {
        parts.push(style(name).magenta().to_string());
    }
    if let Some(patch) = &bundle.stacked_patch {
        parts.push(style(patch).blue().to_string());
    }

    if parts.is_empty() {
        String::new()
    } else {
        format!("({}) ", parts.join(", "))
    }
}

/// Graph column for one row: `*` on the commit's lane, `|` elsewhere.
pub(crate) fn lane_column(info: Option<&LaneInfo>) -> String {
    let Some(info) = info else {
        return String::from("*");
    };
    let width = info.width.max(info.lane + 1);
    (0..width)
        .map(|lane| if lane == info.lane { "*" } else { "|" })
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn format_time(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .unwrap_or_default()
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

/// Resolves `rev` against the repository, with a readable error.
pub(crate) fn resolve(repo: &mut Repository, rev: &str) -> Result<CommitId> {
    repo.resolve(rev)
        .with_context(|| format!("Unknown revision: {}", rev))
}

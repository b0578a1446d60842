//! Show the commit graph of a revision range.

use super::{decorations, drive, format_time, lane_column};
use anyhow::{Context, Result};
use console::style;
use revgraph_core::RefKind;
use serde_json::json;
use std::path::Path;

pub fn run(
    dir: &Path,
    range: &[String],
    limit: Option<usize>,
    no_working_dir: bool,
    format: &str,
) -> Result<()> {
    if format != "text" && format != "json" {
        anyhow::bail!("Unsupported format: {}. Use 'text' or 'json'.", format);
    }

    let mut repo = super::open(dir)?;
    if no_working_dir {
        let mut config = repo.config().clone();
        config.load.include_working_dir = false;
        repo.configure(config);
    }

    let session = repo
        .start_load(range)
        .context("Failed to start history load")?;
    drive(&mut repo, session, "Loading history...", limit)?;

    let view = repo.view(session)?;
    let rows = limit.map_or(view.len(), |limit| limit.min(view.len()));

    if format == "json" {
        let commits: Vec<_> = (0..rows)
            .filter_map(|row| view.commit_at(row).map(|commit| (row, commit)))
            .map(|(row, commit)| {
                json!({
                    "row": row,
                    "commit": commit,
                    "lane": view.lane(row),
                    "refs": repo.references().ref_names(commit.id, RefKind::ANY_REF),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&commits)?);
        return Ok(());
    }

    for row in 0..rows {
        let Some(commit) = view.commit_at(row) else {
            continue;
        };
        let id = if commit.synthetic {
            style("uncommitted".to_string()).dim()
        } else {
            style(commit.id.short()).yellow()
        };
        println!(
            "{} {} {} {} {}{}",
            lane_column(view.lane(row)),
            id,
            style(format_time(commit.timestamp)).dim(),
            style(&commit.author).cyan(),
            decorations(&repo, commit.id),
            commit.short_log
        );
    }

    Ok(())
}

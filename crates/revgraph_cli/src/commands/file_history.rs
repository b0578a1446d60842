//! List the commits that touched a file, following renames.

use super::{decorations, drive, format_time, resolve};
use anyhow::{Context, Result};
use console::style;
use serde_json::json;
use std::path::Path;

pub fn run(dir: &Path, path: &str, from: Option<&str>, format: &str) -> Result<()> {
    if format != "text" && format != "json" {
        anyhow::bail!("Unsupported format: {}. Use 'text' or 'json'.", format);
    }

    let mut repo = super::open(dir)?;
    let from = from.map(|rev| resolve(&mut repo, rev)).transpose()?;

    // Decorations need the reference snapshot.
    repo.refresh_references()?;
    let session = repo
        .start_file_history(path, from)
        .with_context(|| format!("Failed to start history of {}", path))?;
    drive(&mut repo, session, "Following file...", None)?;

    let tracked = repo.session(session)?.tracked();
    if format == "json" {
        let entries: Vec<_> = tracked
            .iter()
            .map(|entry| {
                json!({
                    "commit": repo.lookup(entry.id),
                    "path": entry.path,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if tracked.is_empty() {
        println!("No commits touch {}", style(path).bold());
        return Ok(());
    }

    let mut newer = path;
    for entry in tracked {
        let Some(commit) = repo.lookup(entry.id) else {
            continue;
        };
        let name = entry.path.as_str();
        if name != newer {
            println!(
                "    {} {} -> {}",
                style("renamed").dim(),
                style(name).bold(),
                style(newer).bold()
            );
        }
        println!(
            "{} {} {} {}{} {}",
            style(commit.id.short()).yellow(),
            style(format_time(commit.timestamp)).dim(),
            style(&commit.author).cyan(),
            decorations(&repo, commit.id),
            commit.short_log,
            style(format!("[{}]", name)).dim()
        );
        newer = name;
    }

    Ok(())
}

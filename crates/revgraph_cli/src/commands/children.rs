//! Show the children of a commit and the branches containing it.

use super::{decorations, format_time, load_all, resolve};
use anyhow::Result;
use console::style;
use std::path::Path;

pub fn run(dir: &Path, rev: &str) -> Result<()> {
    let mut repo = super::open(dir)?;
    load_all(&mut repo)?;
    let id = resolve(&mut repo, rev)?;

    let Some(commit) = repo.lookup(id) else {
        anyhow::bail!("Commit {} is not reachable from any reference", id.short());
    };
    println!(
        "{} {}{}",
        style(id.short()).yellow(),
        decorations(&repo, id),
        commit.short_log
    );

    let children = repo.children(id);
    println!();
    println!("{} ({})", style("Children").bold(), children.len());
    for child in children {
        if let Some(commit) = repo.lookup(*child) {
            let label = if commit.synthetic {
                style("uncommitted".to_string()).dim()
            } else {
                style(child.short()).yellow()
            };
            println!(
                "  {} {} {}",
                label,
                style(format_time(commit.timestamp)).dim(),
                commit.short_log
            );
        }
    }

    let branches = repo.descendant_branches(id);
    println!();
    println!("{} ({})", style("Contained in").bold(), branches.len());
    for branch in branches {
        println!("  {}", style(branch).green());
    }

    Ok(())
}

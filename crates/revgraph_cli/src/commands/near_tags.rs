//! Show the nearest tags before and after a commit.

use super::{load_all, resolve};
use anyhow::Result;
use console::style;
use revgraph_core::{Direction, NearestTags};
use serde_json::json;
use std::path::Path;

pub fn run(dir: &Path, rev: &str, format: &str) -> Result<()> {
    if format != "text" && format != "json" {
        anyhow::bail!("Unsupported format: {}. Use 'text' or 'json'.", format);
    }

    let mut repo = super::open(dir)?;
    load_all(&mut repo)?;
    let id = resolve(&mut repo, rev)?;

    let before = repo.nearest_tag(id, Direction::Down);
    let after = repo.nearest_tag(id, Direction::Up);

    // Messages of annotated tags sitting on the commit itself.
    let message = if before.exact {
        repo.tag_message(id)?
    } else {
        None
    };

    if format == "json" {
        let output = json!({
            "commit": id,
            "before": before,
            "after": after,
            "message": message,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{} {}", style("Commit:").bold(), style(id.short()).yellow());
    print_tags("Follows:", &before);
    print_tags("Precedes:", &after);
    if let Some(message) = message {
        println!();
        for line in message.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}

fn print_tags(label: &str, tags: &NearestTags) {
    let names = if tags.tags.is_empty() {
        style("none".to_string()).dim()
    } else {
        style(tags.tags.join(", ")).yellow()
    };
    let exact = if tags.exact { " (on this commit)" } else { "" };
    let partial = if tags.complete { "" } else { " (history incomplete)" };
    println!("{} {}{}{}", style(label).bold(), names, exact, partial);
}

//! List branches, remote branches and tags.

use super::load_all;
use anyhow::Result;
use console::style;
use revgraph_core::{RefKind, Repository};
use serde_json::json;
use std::path::Path;

const GROUPS: [(&str, RefKind); 4] = [
    ("Branches", RefKind::BRANCH),
    ("Remote branches", RefKind::RMT_BRANCH),
    ("Tags", RefKind::TAG),
    ("Other", RefKind::REF),
];

pub fn run(dir: &Path, loaded: bool, format: &str) -> Result<()> {
    if format != "text" && format != "json" {
        anyhow::bail!("Unsupported format: {}. Use 'text' or 'json'.", format);
    }

    let mut repo = super::open(dir)?;
    if loaded {
        load_all(&mut repo)?;
    } else {
        repo.refresh_references()?;
    }

    if format == "json" {
        let mut output = serde_json::Map::new();
        for (label, kind) in GROUPS {
            let entries: Vec<_> = repo
                .references()
                .all_ref_names(kind, loaded)
                .into_iter()
                .map(|name| {
                    json!({
                        "current": is_current(&repo, &name, kind),
                        "target": repo.references().ref_id(&name, kind),
                        "name": name,
                    })
                })
                .collect();
            output.insert(label.to_lowercase().replace(' ', "_"), entries.into());
        }
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for (label, kind) in GROUPS {
        let names = repo.references().all_ref_names(kind, loaded);
        if names.is_empty() {
            continue;
        }
        println!("{}", style(label).bold());
        for name in names {
            let target = repo
                .references()
                .ref_id(&name, kind)
                .map(|id| id.short())
                .unwrap_or_default();
            let marker = if is_current(&repo, &name, kind) { "*" } else { " " };
            let name = match kind {
                RefKind::BRANCH => style(name).green(),
                RefKind::RMT_BRANCH => style(name).red(),
                RefKind::TAG => style(name).yellow(),
                _ => style(name).magenta(),
            };
            println!("  {} {} {}", marker, style(target).dim(), name);
        }
    }

    Ok(())
}

fn is_current(repo: &Repository, name: &str, kind: RefKind) -> bool {
    kind == RefKind::BRANCH && repo.references().current_branch() == Some(name)
}

//! Deduplicated path tables shared by every file change set.

use crate::types::PathRef;
use std::collections::HashMap;

/// Two append-only string tables, one for directory names and one for base
/// names.
///
/// A path is stored as a pair of indices. Directory names keep their trailing
/// `/`; the root directory is the empty string, so `"README"` and `"src/"` +
/// `"lib.rs"` both rebuild by plain concatenation.
#[derive(Debug, Default)]
pub struct PathTable {
    dirs: Vec<String>,
    dir_index: HashMap<String, u32>,
    bases: Vec<String>,
    base_index: HashMap<String, u32>,
}

impl PathTable {
    /// Creates empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a full path, returning its index pair.
    pub fn intern(&mut self, path: &str) -> PathRef {
        let (dir, base) = split_path(path);
        PathRef {
            dir: intern_into(&mut self.dirs, &mut self.dir_index, dir),
            base: intern_into(&mut self.bases, &mut self.base_index, base),
        }
    }

    /// Looks up a path without interning it.
    pub fn lookup(&self, path: &str) -> Option<PathRef> {
        let (dir, base) = split_path(path);
        Some(PathRef {
            dir: *self.dir_index.get(dir)?,
            base: *self.base_index.get(base)?,
        })
    }

    /// Rebuilds the full path for an index pair.
    ///
    /// Returns `None` for indices that were never handed out.
    pub fn resolve(&self, path: PathRef) -> Option<String> {
        let dir = self.dirs.get(path.dir as usize)?;
        let base = self.bases.get(path.base as usize)?;
        Some(format!("{}{}", dir, base))
    }

    /// Directory name at `idx`, with trailing separator.
    pub fn dir_name(&self, idx: u32) -> Option<&str> {
        self.dirs.get(idx as usize).map(String::as_str)
    }

    /// Base name at `idx`.
    pub fn base_name(&self, idx: u32) -> Option<&str> {
        self.bases.get(idx as usize).map(String::as_str)
    }

    /// Number of distinct directory names.
    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }

    /// Number of distinct base names.
    pub fn base_count(&self) -> usize {
        self.bases.len()
    }
}

fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(pos) => path.split_at(pos + 1),
        None => ("", path),
    }
}

fn intern_into(table: &mut Vec<String>, index: &mut HashMap<String, u32>, s: &str) -> u32 {
    if let Some(idx) = index.get(s) {
        return *idx;
    }
    let idx = table.len() as u32;
    table.push(s.to_string());
    index.insert(s.to_string(), idx);
    idx
}

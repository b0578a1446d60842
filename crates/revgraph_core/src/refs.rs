//! Branch and tag metadata attached to commits.
//!
//! A [`RefSnapshot`] is read once from `git show-ref -d` and the checked out
//! branch. The [`ReferenceMerger`] hands each commit its bundle as soon as the
//! commit is stored and answers tag and branch queries over the graph.

use crate::commit_id::CommitId;
use crate::error::RevError;
use crate::store::SharedStore;
use crate::types::{RefKind, ReferenceBundle};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

/// One reference from the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefEntry {
    /// Commit the reference resolves to.
    pub target: CommitId,
    /// Single kind bit.
    pub kind: RefKind,
    /// Short name (`main`, `origin/main`, `v1.0`).
    pub name: String,
    /// Object name of the tag itself, for annotated tags.
    pub tag_object: Option<String>,
}

/// All references of a repository at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefSnapshot {
    /// Parsed references.
    pub entries: Vec<RefEntry>,
    /// Short name of the checked out branch.
    pub current_branch: Option<String>,
}

impl RefSnapshot {
    /// Parses `git show-ref -d` output and `git symbolic-ref -q HEAD` output.
    ///
    /// Peeled `^{}` lines move an annotated tag onto the commit it points
    /// to. Symbolic remote heads (`origin/HEAD`) and malformed lines are
    /// skipped.
    pub fn parse(show_ref: &str, symbolic_head: &str) -> Self {
        let current_branch = symbolic_head
            .trim()
            .strip_prefix("refs/heads/")
            .map(String::from);

        let mut entries: Vec<RefEntry> = Vec::new();
        let mut tag_index: HashMap<String, usize> = HashMap::new();

        for line in show_ref.lines() {
            let Some((hex, full)) = line.trim().split_once(' ') else {
                continue;
            };
            let Ok(target) = CommitId::from_hex(hex) else {
                debug!(line, "skipping malformed ref line");
                continue;
            };

            if let Some(tag) = full.strip_suffix("^{}") {
                let name = tag.strip_prefix("refs/tags/").unwrap_or(tag);
                if let Some(idx) = tag_index.get(name) {
                    let entry = &mut entries[*idx];
                    entry.tag_object = Some(entry.target.as_hex());
                    entry.target = target;
                }
                continue;
            }

            let Some((kind, name)) = classify(full) else {
                continue;
            };
            if kind == RefKind::TAG {
                tag_index.insert(name.clone(), entries.len());
            }
            entries.push(RefEntry {
                target,
                kind,
                name,
                tag_object: None,
            });
        }

        Self {
            entries,
            current_branch,
        }
    }
}

fn classify(full: &str) -> Option<(RefKind, String)> {
    if let Some(name) = full.strip_prefix("refs/heads/") {
        return Some((RefKind::BRANCH, name.to_string()));
    }
    if let Some(name) = full.strip_prefix("refs/remotes/") {
        if name.ends_with("/HEAD") {
            return None;
        }
        return Some((RefKind::RMT_BRANCH, name.to_string()));
    }
    if let Some(name) = full.strip_prefix("refs/tags/") {
        return Some((RefKind::TAG, name.to_string()));
    }
    if let Some(rest) = full.strip_prefix("refs/patches/") {
        let name = rest.rsplit('/').next().unwrap_or(rest);
        return Some((RefKind::APPLIED, name.to_string()));
    }
    let name = full.strip_prefix("refs/").unwrap_or(full);
    Some((RefKind::REF, name.to_string()))
}

/// Direction of a nearest-tag walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    /// Towards ancestors.
    Down,
    /// Towards descendants.
    Up,
}

/// Answer of a nearest-tag query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct NearestTags {
    /// Nearest tag on every path, in discovery order.
    pub tags: Vec<String>,
    /// The commit itself carries the tags.
    pub exact: bool,
    /// The walk saw no unloaded commit, so the answer cannot change.
    pub complete: bool,
}

/// Attaches reference bundles to commits and answers reference queries.
#[derive(Debug, Default)]
pub struct ReferenceMerger {
    attached: HashMap<CommitId, ReferenceBundle>,
    pending: HashMap<CommitId, ReferenceBundle>,
    by_name: HashMap<(RefKind, String), CommitId>,
    near_tags: HashMap<(CommitId, Direction), NearestTags>,
    current_branch: Option<String>,
}

impl ReferenceMerger {
    /// Creates an empty merger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all reference state with `snapshot`.
    ///
    /// Bundles of commits already in `store` attach immediately; the rest
    /// wait for [`on_append`](Self::on_append).
    pub fn load_references(&mut self, snapshot: &RefSnapshot, store: &SharedStore) {
        self.reset();
        self.current_branch = snapshot.current_branch.clone();

        for entry in &snapshot.entries {
            self.by_name
                .insert((entry.kind, entry.name.clone()), entry.target);

            let bundle = if store.contains(entry.target) {
                self.attached.entry(entry.target).or_default()
            } else {
                self.pending.entry(entry.target).or_default()
            };
            bundle.add(entry.kind, &entry.name);
            if entry.tag_object.is_some() {
                bundle.tag_object = entry.tag_object.clone();
            }
            if entry.kind == RefKind::BRANCH
                && snapshot.current_branch.as_deref() == Some(entry.name.as_str())
            {
                bundle.add(RefKind::CUR_BRANCH, &entry.name);
            }
        }

        debug!(
            attached = self.attached.len(),
            pending = self.pending.len(),
            "references loaded"
        );
    }

    /// Attaches the bundle waiting for `id`, if any.
    ///
    /// A new commit is a new child of its parents, so memoized upward walks
    /// are dropped.
    pub fn on_append(&mut self, id: CommitId) -> bool {
        self.near_tags
            .retain(|(_, direction), _| *direction == Direction::Down);
        match self.pending.remove(&id) {
            Some(bundle) => {
                self.attached.entry(id).or_default().merge(bundle);
                true
            }
            None => false,
        }
    }

    /// Drops references whose target is still not stored, reporting each.
    pub fn finish_load(&mut self, store: &SharedStore) -> Vec<RevError> {
        let missing: Vec<CommitId> = self
            .pending
            .keys()
            .copied()
            .filter(|id| !store.contains(*id))
            .collect();

        let mut violations = Vec::new();
        for id in missing {
            let Some(bundle) = self.pending.remove(&id) else {
                continue;
            };
            let names = bundle.names(RefKind::ANY_REF);
            warn!(%id, refs = ?names, "reference target not loaded");
            self.by_name.retain(|_, target| *target != id);
            violations.push(RevError::StructuralViolation(format!(
                "references {} point to unloaded commit {}",
                names.join(", "),
                id
            )));
        }
        violations
    }

    /// Discards all reference state and the nearest-tag memo.
    pub fn reset(&mut self) {
        self.attached.clear();
        self.pending.clear();
        self.by_name.clear();
        self.near_tags.clear();
        self.current_branch = None;
    }

    /// Checked out branch, `None` on a detached `HEAD`.
    pub fn current_branch(&self) -> Option<&str> {
        self.current_branch.as_deref()
    }

    /// Bundle attached to `id`.
    pub fn bundle(&self, id: CommitId) -> Option<&ReferenceBundle> {
        self.attached.get(&id)
    }

    /// Reference kinds of `id` intersected with `mask`.
    pub fn check_ref(&self, id: CommitId, mask: RefKind) -> RefKind {
        self.bundle(id)
            .map(|b| b.kinds() & mask)
            .unwrap_or_default()
    }

    /// Names of the kinds in `mask` pointing at `id`.
    pub fn ref_names(&self, id: CommitId, mask: RefKind) -> Vec<String> {
        self.bundle(id).map(|b| b.names(mask)).unwrap_or_default()
    }

    /// Commit a reference of a kind in `mask` named `name` resolves to.
    pub fn ref_id(&self, name: &str, mask: RefKind) -> Option<CommitId> {
        self.by_name
            .iter()
            .filter(|((kind, n), _)| mask.intersects(*kind) && n == name)
            .map(|(_, id)| *id)
            .min()
    }

    /// Every reference name of the kinds in `mask`, sorted.
    ///
    /// With `only_loaded` references still waiting for their commit are
    /// left out.
    pub fn all_ref_names(&self, mask: RefKind, only_loaded: bool) -> Vec<String> {
        let mut names: Vec<String> = self
            .by_name
            .iter()
            .filter(|((kind, _), id)| {
                mask.intersects(*kind) && (!only_loaded || self.attached.contains_key(*id))
            })
            .map(|((_, name), _)| name.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Every commit carrying a reference of the kinds in `mask`, sorted.
    pub fn all_ref_ids(&self, mask: RefKind) -> Vec<CommitId> {
        let mut ids: Vec<CommitId> = self
            .attached
            .iter()
            .filter(|(_, b)| b.kinds().intersects(mask))
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    /// Object name of the annotated tag pointing at `id`.
    pub fn tag_object(&self, id: CommitId) -> Option<&str> {
        self.bundle(id).and_then(|b| b.tag_object.as_deref())
    }

    /// Cached annotated tag message of `id`.
    pub fn tag_message(&self, id: CommitId) -> Option<&str> {
        self.bundle(id).and_then(|b| b.tag_message.as_deref())
    }

    /// Caches the annotated tag message of `id`.
    pub fn set_tag_message(&mut self, id: CommitId, message: String) {
        if let Some(bundle) = self.attached.get_mut(&id) {
            bundle.tag_message = Some(message);
        }
    }

    /// Nearest tags from `id` walking in `direction`.
    ///
    /// Every path stops at its first tagged commit. Answers are memoized
    /// unless the walk met commits that are not loaded yet.
    pub fn nearest_tag(
        &mut self,
        id: CommitId,
        direction: Direction,
        store: &SharedStore,
    ) -> NearestTags {
        if let Some(hit) = self.near_tags.get(&(id, direction)) {
            return hit.clone();
        }

        let result = self.walk_tags(id, direction, store);
        if result.complete {
            self.near_tags.insert((id, direction), result.clone());
        }
        result
    }

    fn walk_tags(&self, id: CommitId, direction: Direction, store: &SharedStore) -> NearestTags {
        let own = self.tags_of(id);
        if !own.is_empty() {
            return NearestTags {
                tags: own,
                exact: true,
                complete: true,
            };
        }

        let mut result = NearestTags {
            complete: store.contains(id),
            ..NearestTags::default()
        };
        let mut seen: HashSet<CommitId> = HashSet::from([id]);
        let mut queue: VecDeque<CommitId> = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            let next: Vec<CommitId> = match direction {
                Direction::Down => match store.lookup(current) {
                    Some(commit) => commit.parents.clone(),
                    None => {
                        result.complete = false;
                        continue;
                    }
                },
                Direction::Up => store.children(current).to_vec(),
            };

            for n in next {
                if !seen.insert(n) {
                    continue;
                }
                let tags = self.tags_of(n);
                if tags.is_empty() {
                    queue.push_back(n);
                } else {
                    for tag in tags {
                        if !result.tags.contains(&tag) {
                            result.tags.push(tag);
                        }
                    }
                }
            }
        }

        result
    }

    fn tags_of(&self, id: CommitId) -> Vec<String> {
        self.bundle(id)
            .map(|b| b.tags.clone())
            .unwrap_or_default()
    }

    /// Branches from which `id` is reachable, including its own.
    pub fn descendant_branches(&self, id: CommitId, store: &SharedStore) -> Vec<String> {
        let mask = RefKind::BRANCH | RefKind::RMT_BRANCH;
        let mut names = Vec::new();
        let mut seen: HashSet<CommitId> = HashSet::from([id]);
        let mut queue: VecDeque<CommitId> = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            for name in self.ref_names(current, mask) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            for child in store.children(current) {
                if seen.insert(*child) {
                    queue.push_back(*child);
                }
            }
        }
        names
    }
}

/// Extracts the message from `git cat-file tag` output, dropping the header
/// and any signature block.
pub fn parse_tag_message(raw: &str) -> String {
    let body = match raw.find("\n\n") {
        Some(pos) => &raw[pos + 2..],
        None => "",
    };
    let body = match body.find("-----BEGIN PGP SIGNATURE-----") {
        Some(pos) => &body[..pos],
        None => body,
    };
    body.trim().to_string()
}

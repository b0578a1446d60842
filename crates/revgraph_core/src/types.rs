//! Core data types for revgraph.

use crate::CommitId;
use serde::Serialize;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// One commit as reported by the history stream.
///
/// Records are immutable once parsed. Everything that is filled in later
/// (row, lane, references, tag hints) lives in parallel structures keyed by
/// row or id, never inside the record itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    /// Object name.
    pub id: CommitId,
    /// Parent object names, first parent first.
    pub parents: Vec<CommitId>,
    /// Author as `Name <email>`.
    pub author: String,
    /// Author time, seconds since the Unix epoch.
    pub timestamp: i64,
    /// First line of the message.
    pub short_log: String,
    /// Remaining message body.
    pub long_log: String,
    /// The tool flagged this commit as a range boundary.
    pub boundary: bool,
    /// Fabricated node (working tree), not backed by a stored revision.
    pub synthetic: bool,
}

impl Commit {
    /// Builds the synthetic commit standing for uncommitted changes.
    pub fn working_dir(parent: CommitId, timestamp: i64) -> Self {
        Self {
            id: CommitId::working_dir(),
            parents: vec![parent],
            author: "-".to_string(),
            timestamp,
            short_log: "Working directory changes".to_string(),
            long_log: String::new(),
            boundary: false,
            synthetic: true,
        }
    }

    /// Whether this commit has more than one parent.
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// Whether this commit is a root (no parents).
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }
}

/// Change status of one file entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FileStatus {
    /// File was added.
    Added,
    /// File content or mode changed.
    Modified,
    /// File was removed.
    Deleted,
    /// File was renamed from `source`.
    Renamed,
    /// File was copied from `source`.
    Copied,
    /// Unresolved merge conflict.
    Unmerged,
    /// Working tree file unknown to the index.
    Untracked,
}

impl FileStatus {
    /// Maps git's status letter. Type changes count as modifications.
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'A' => Some(Self::Added),
            'M' | 'T' => Some(Self::Modified),
            'D' => Some(Self::Deleted),
            'R' => Some(Self::Renamed),
            'C' => Some(Self::Copied),
            'U' => Some(Self::Unmerged),
            '?' => Some(Self::Untracked),
            _ => None,
        }
    }

    /// The letter git uses for this status.
    pub fn letter(self) -> char {
        match self {
            Self::Added => 'A',
            Self::Modified => 'M',
            Self::Deleted => 'D',
            Self::Renamed => 'R',
            Self::Copied => 'C',
            Self::Unmerged => 'U',
            Self::Untracked => '?',
        }
    }

    /// Whether the entry carries a source path.
    pub fn has_source(self) -> bool {
        matches!(self, Self::Renamed | Self::Copied)
    }
}

/// A path split into indices of the shared directory and base name tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PathRef {
    /// Index into the directory table (directory includes its trailing `/`).
    pub dir: u32,
    /// Index into the base name table.
    pub base: u32,
}

/// One file touched by a change set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Destination path.
    pub path: PathRef,
    /// Change status.
    pub status: FileStatus,
    /// Source path of a rename or copy.
    pub source: Option<PathRef>,
    /// Rename or copy similarity percentage.
    pub similarity: Option<u8>,
    /// 1-based merge parent this entry was diffed against.
    pub merge_parent: u8,
}

/// Ordered file entries of one diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileChangeSet {
    /// Entries in the order the tool printed them.
    pub entries: Vec<FileEntry>,
}

impl FileChangeSet {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the diff touched nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries diffed against the given merge parent.
    pub fn for_parent(&self, merge_parent: u8) -> impl Iterator<Item = &FileEntry> {
        self.entries
            .iter()
            .filter(move |e| e.merge_parent == merge_parent)
    }
}

/// Key of a stored change set: a commit, optionally diffed against another revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileSetKey {
    /// The commit whose changes are described.
    pub id: CommitId,
    /// Explicit comparison base; `None` means the commit's own parents.
    pub diff_to: Option<CommitId>,
    /// Whether every merge parent was diffed, not only the first.
    pub all_parents: bool,
}

impl FileSetKey {
    /// Key of the default diff of a commit against its first parent.
    pub fn of(id: CommitId) -> Self {
        Self {
            id,
            diff_to: None,
            all_parents: false,
        }
    }
}

/// Bit mask of reference kinds.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct RefKind(u8);

impl RefKind {
    /// No kind.
    pub const NONE: RefKind = RefKind(0);
    /// Tag (lightweight or annotated).
    pub const TAG: RefKind = RefKind(1);
    /// Local branch.
    pub const BRANCH: RefKind = RefKind(2);
    /// Remote tracking branch.
    pub const RMT_BRANCH: RefKind = RefKind(4);
    /// The checked out branch.
    pub const CUR_BRANCH: RefKind = RefKind(8);
    /// Any other ref (`refs/notes`, `refs/stash`, ...).
    pub const REF: RefKind = RefKind(16);
    /// Applied stacked patch.
    pub const APPLIED: RefKind = RefKind(32);
    /// Unapplied stacked patch.
    pub const UN_APPLIED: RefKind = RefKind(64);
    /// Every kind.
    pub const ANY_REF: RefKind = RefKind(127);

    /// Raw bits.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Whether all bits of `other` are set.
    pub fn contains(self, other: RefKind) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether any bit of `other` is set.
    pub fn intersects(self, other: RefKind) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether no bit is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for RefKind {
    type Output = RefKind;

    fn bitor(self, rhs: RefKind) -> RefKind {
        RefKind(self.0 | rhs.0)
    }
}

impl BitAnd for RefKind {
    type Output = RefKind;

    fn bitand(self, rhs: RefKind) -> RefKind {
        RefKind(self.0 & rhs.0)
    }
}

impl BitOrAssign for RefKind {
    fn bitor_assign(&mut self, rhs: RefKind) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(RefKind, &str); 7] = [
            (RefKind::TAG, "TAG"),
            (RefKind::BRANCH, "BRANCH"),
            (RefKind::RMT_BRANCH, "RMT_BRANCH"),
            (RefKind::CUR_BRANCH, "CUR_BRANCH"),
            (RefKind::REF, "REF"),
            (RefKind::APPLIED, "APPLIED"),
            (RefKind::UN_APPLIED, "UN_APPLIED"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(kind, _)| self.contains(*kind))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "RefKind({})", names.join("|"))
    }
}

/// All reference names pointing at one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceBundle {
    /// Local branch names.
    pub branches: Vec<String>,
    /// Remote tracking branch names (`origin/main`).
    pub remote_branches: Vec<String>,
    /// The checked out branch, when it points here.
    pub current_branch: Option<String>,
    /// Tag names.
    pub tags: Vec<String>,
    /// Other refs.
    pub refs: Vec<String>,
    /// Object name of an annotated tag pointing here.
    pub tag_object: Option<String>,
    /// Message of the annotated tag, filled lazily.
    pub tag_message: Option<String>,
    /// Stacked patch name.
    pub stacked_patch: Option<String>,
    kinds: RefKind,
}

impl ReferenceBundle {
    /// Adds one name of the given single kind.
    pub fn add(&mut self, kind: RefKind, name: &str) {
        let name = name.to_string();
        if kind == RefKind::TAG {
            push_unique(&mut self.tags, name);
        } else if kind == RefKind::BRANCH {
            push_unique(&mut self.branches, name);
        } else if kind == RefKind::RMT_BRANCH {
            push_unique(&mut self.remote_branches, name);
        } else if kind == RefKind::CUR_BRANCH {
            self.current_branch = Some(name);
        } else if kind == RefKind::APPLIED || kind == RefKind::UN_APPLIED {
            self.stacked_patch = Some(name);
        } else {
            push_unique(&mut self.refs, name);
        }
        self.kinds |= kind;
    }

    /// Kinds of the names present.
    pub fn kinds(&self) -> RefKind {
        self.kinds
    }

    /// Names matching any kind in `mask`, in a stable order.
    pub fn names(&self, mask: RefKind) -> Vec<String> {
        let mut out = Vec::new();
        if mask.intersects(RefKind::CUR_BRANCH) {
            out.extend(self.current_branch.iter().cloned());
        }
        if mask.intersects(RefKind::BRANCH) {
            for b in &self.branches {
                if !out.contains(b) {
                    out.push(b.clone());
                }
            }
        }
        if mask.intersects(RefKind::RMT_BRANCH) {
            out.extend(self.remote_branches.iter().cloned());
        }
        if mask.intersects(RefKind::TAG) {
            out.extend(self.tags.iter().cloned());
        }
        if mask.intersects(RefKind::REF) {
            out.extend(self.refs.iter().cloned());
        }
        if mask.intersects(RefKind::APPLIED | RefKind::UN_APPLIED)
            && self.kinds.intersects(mask & (RefKind::APPLIED | RefKind::UN_APPLIED))
        {
            out.extend(self.stacked_patch.iter().cloned());
        }
        out
    }

    /// Whether no name is recorded.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Folds another bundle for the same commit into this one.
    pub fn merge(&mut self, other: ReferenceBundle) {
        for t in other.tags {
            self.add(RefKind::TAG, &t);
        }
        for b in other.branches {
            self.add(RefKind::BRANCH, &b);
        }
        for b in other.remote_branches {
            self.add(RefKind::RMT_BRANCH, &b);
        }
        for r in other.refs {
            self.add(RefKind::REF, &r);
        }
        if let Some(cur) = other.current_branch {
            self.add(RefKind::CUR_BRANCH, &cur);
        }
        if let Some(patch) = other.stacked_patch {
            let kind = if other.kinds.contains(RefKind::APPLIED) {
                RefKind::APPLIED
            } else {
                RefKind::UN_APPLIED
            };
            self.add(kind, &patch);
        }
        if other.tag_object.is_some() {
            self.tag_object = other.tag_object;
        }
        if other.tag_message.is_some() {
            self.tag_message = other.tag_message;
        }
    }
}

fn push_unique(list: &mut Vec<String>, name: String) {
    if !list.contains(&name) {
        list.push(name);
    }
}

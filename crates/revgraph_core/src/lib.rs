//! revgraph core library
//!
//! Incrementally loads git history into a navigable commit graph while git
//! is still streaming it:
//! - Subprocess execution with streaming output, cancellation and failure
//!   classification
//! - A chunk parser that tolerates records split across reads
//! - A commit store shared by independent load sessions
//! - Lane assignment for graph drawing, computed as rows arrive
//! - Rename-following file history
//! - Branch and tag decoration with nearest-tag queries
//!
//! # Quick Start
//!
//! ```no_run
//! use revgraph_core::{GraphEvent, Repository};
//!
//! let mut repo = Repository::open(".").unwrap();
//! let events = repo.subscribe().unwrap();
//! let session = repo.start_load(&["--all".to_string()]).unwrap();
//!
//! while !repo.pump(session).unwrap().is_finished() {
//!     for event in events.try_iter() {
//!         if let GraphEvent::CommitsAppended { ids, .. } = event {
//!             println!("{} more rows", ids.len());
//!         }
//!     }
//! }
//!
//! let view = repo.view(session).unwrap();
//! for commit in view.iter() {
//!     println!("{} {}", commit.id.short(), commit.short_log);
//! }
//! ```
//!
//! # Command lines
//!
//! Commands are plain strings split by [`tokenize`]. Arguments containing
//! whitespace are wrapped in [`QUOTE_CHAR`]:
//!
//! ```
//! use revgraph_core::tokenize;
//!
//! let args = tokenize("git log $--format=%an <%ae>$ HEAD").unwrap();
//! assert_eq!(args, ["git", "log", "--format=%an <%ae>", "HEAD"]);
//! ```
//!
//! # Lanes
//!
//! Lanes can also be computed outside a repository:
//!
//! ```
//! use revgraph_core::{CommitId, LaneAssigner, LaneTransition};
//!
//! let tip = CommitId::from_sha1([2; 20]);
//! let root = CommitId::from_sha1([1; 20]);
//!
//! let mut lanes = LaneAssigner::new();
//! assert_eq!(lanes.assign(tip, &[root], false).kind, LaneTransition::Initial);
//! assert_eq!(lanes.assign(root, &[], false).kind, LaneTransition::Terminal);
//! ```

mod commit_id;
mod config;
mod error;
mod events;
mod git;
mod lanes;
mod parser;
mod paths;
mod process;
mod refs;
mod renames;
mod repo;
mod session;
mod store;
mod tokenizer;
mod types;

pub use commit_id::CommitId;
pub use config::{Config, EventsConfig, FailurePolicy, LoadConfig, ProcessConfig, CONFIG_FILE};
pub use error::{RevError, Result};
pub use events::{EventBus, GraphEvent};
pub use git::{quote_arg, GitCommands, LOG_FORMAT};
pub use lanes::{LaneAssigner, LaneInfo, LaneTransition};
pub use parser::{
    parse_file_block, parse_path_list, unquote_path, ChunkParser, ParsedRecord, RawFileChange,
};
pub use paths::PathTable;
pub use process::{
    CancelHandle, ContextToken, ExitClass, OutputStream, ProcessEvent, ProcessOutcome,
    ProcessRunner, RunningProcess, SyncOutput,
};
pub use refs::{
    parse_tag_message, Direction, NearestTags, RefEntry, RefSnapshot, ReferenceMerger,
};
pub use renames::{RenameTracker, Suspension, TrackStep, TrackedCommit};
pub use repo::Repository;
pub use session::{LoadSession, LoadStatus, SessionId, SessionKind};
pub use store::{CommitGraph, HistoryView, ParentPolicy, SharedStore};
pub use tokenizer::{tokenize, QUOTE_CHAR};
pub use types::*;

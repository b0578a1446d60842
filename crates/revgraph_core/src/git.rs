//! Git command lines understood by the parsers in this crate.
//!
//! Arguments that may contain whitespace are wrapped in
//! [`QUOTE_CHAR`](crate::tokenizer::QUOTE_CHAR) so they survive tokenization.

use crate::commit_id::CommitId;
use crate::config::{LoadConfig, ProcessConfig};
use crate::tokenizer::QUOTE_CHAR;

/// Opens every record; also ends the previous one.
pub const RECORD_START: u8 = 0x00;

/// Separates header fields.
pub const FIELD_SEP: u8 = 0x1f;

/// Ends the header; the file block follows.
pub const HEADER_END: u8 = 0x1e;

/// `--pretty` format producing the record layout the chunk parser expects.
///
/// `%m` flags boundary commits with `-`. The body comes last so it may
/// contain anything except the header terminator.
pub const LOG_FORMAT: &str = "%x00%m%H%x1f%P%x1f%an <%ae>%x1f%at%x1f%s%x1f%b%x1e";

/// Builds git command lines for one repository configuration.
#[derive(Debug, Clone)]
pub struct GitCommands {
    program: String,
    detect_copies: bool,
    extra_log_args: Vec<String>,
}

impl GitCommands {
    /// Creates builders from the process and load settings.
    pub fn new(process: &ProcessConfig, load: &LoadConfig) -> Self {
        Self {
            program: quote_arg(&process.git_program),
            detect_copies: load.detect_copies,
            extra_log_args: load.extra_log_args.clone(),
        }
    }

    fn cmd(&self, args: &str) -> String {
        format!("{} {}", self.program, args)
    }

    fn rename_flags(&self) -> &'static str {
        if self.detect_copies {
            "-M -C"
        } else {
            "-M"
        }
    }

    /// `git rev-parse --show-toplevel`
    pub fn toplevel(&self) -> String {
        self.cmd("rev-parse --show-toplevel")
    }

    /// Resolves `HEAD` to a commit id, printing nothing when unborn.
    pub fn head(&self) -> String {
        self.rev_parse("HEAD")
    }

    /// Resolves any revision to the commit it names, printing nothing when
    /// it does not name one.
    pub fn rev_parse(&self, rev: &str) -> String {
        self.cmd(&format!(
            "rev-parse --verify -q {}",
            quote_arg(&format!("{}^{{commit}}", rev))
        ))
    }

    /// Streams the history of `range` with name-status file blocks.
    ///
    /// An empty range means `HEAD`.
    pub fn log(&self, range: &[String]) -> String {
        let mut line = self.cmd(&format!(
            "log --no-color --topo-order --parents --boundary --name-status {} \
             --pretty=format:{q}{fmt}{q}",
            self.rename_flags(),
            q = QUOTE_CHAR,
            fmt = LOG_FORMAT,
        ));
        for arg in self.extra_log_args.iter().chain(range) {
            line.push(' ');
            line.push_str(&quote_arg(arg));
        }
        line
    }

    /// Diffs one commit against its parents, or against `diff_to`.
    ///
    /// With `all_parents` a merge is diffed against every parent; each
    /// section is introduced by the commit id on a line of its own.
    pub fn diff_tree(&self, id: CommitId, diff_to: Option<CommitId>, all_parents: bool) -> String {
        let base = format!(
            "diff-tree --no-color --root -r --name-status {}",
            self.rename_flags()
        );
        match diff_to {
            Some(other) => self.cmd(&format!("{} {} {}", base, other, id)),
            None if all_parents => self.cmd(&format!("{} -m {}", base, id)),
            None => self.cmd(&format!("{} {}", base, id)),
        }
    }

    /// Uncommitted changes to tracked files relative to `HEAD`.
    pub fn diff_index_head(&self) -> String {
        self.cmd("diff-index --no-color --name-status -M HEAD")
    }

    /// Untracked files not excluded by ignore rules.
    pub fn untracked_files(&self) -> String {
        self.cmd("ls-files --others --exclude-standard")
    }

    /// Every ref with peeled tag lines.
    pub fn show_ref(&self) -> String {
        self.cmd("show-ref -d")
    }

    /// Full name of the checked out branch; fails quietly when detached.
    pub fn symbolic_head(&self) -> String {
        self.cmd("symbolic-ref -q HEAD")
    }

    /// Raw content of an annotated tag object.
    pub fn cat_file_tag(&self, object: &str) -> String {
        self.cmd(&format!("cat-file tag {}", quote_arg(object)))
    }

    /// Content of `path` at revision `rev`.
    pub fn show_file(&self, rev: &str, path: &str) -> String {
        self.cmd(&format!("show {}", quote_arg(&format!("{}:{}", rev, path))))
    }
}

/// Wraps an argument in the internal quote character when it would otherwise
/// be split or unquoted by the tokenizer.
pub fn quote_arg(arg: &str) -> String {
    if arg.contains(char::is_whitespace) || arg.contains(['"', '\'']) {
        format!("{q}{}{q}", arg, q = QUOTE_CHAR)
    } else {
        arg.to_string()
    }
}

use anyhow::{bail, Context, Result};
use revgraph_core::CommitId;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Seconds between the timestamps of consecutive fixture commits.
const TICK: i64 = 60;
const EPOCH: i64 = 1_700_000_000;

/// Throwaway git repository in a temp directory
pub struct GitFixture {
    dir: TempDir,
    clock: i64,
}

impl GitFixture {
    /// Whether a usable `git` is on `PATH`
    pub fn available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Create an empty repository with `main` checked out
    pub fn init() -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp directory")?;
        let mut fixture = Self { dir, clock: EPOCH };
        fixture.git(&["init", "-q"])?;
        fixture.git(&["symbolic-ref", "HEAD", "refs/heads/main"])?;
        fixture.git(&["config", "commit.gpgsign", "false"])?;
        fixture.git(&["config", "tag.gpgsign", "false"])?;
        Ok(fixture)
    }

    /// Get repository path
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Run git in the repository with a fixed identity and clock
    pub fn git(&mut self, args: &[&str]) -> Result<String> {
        self.clock += TICK;
        let date = format!("{} +0000", self.clock);
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .env("GIT_AUTHOR_NAME", "Fixture")
            .env("GIT_AUTHOR_EMAIL", "fixture@example.com")
            .env("GIT_COMMITTER_NAME", "Fixture")
            .env("GIT_COMMITTER_EMAIL", "fixture@example.com")
            .env("GIT_AUTHOR_DATE", &date)
            .env("GIT_COMMITTER_DATE", &date)
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .output()
            .with_context(|| format!("Failed to run git {}", args.join(" ")))?;

        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Write file to the work tree
    pub fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        let full_path = self.path().join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directories for {}", path))?;
        }
        fs::write(&full_path, content).with_context(|| format!("Failed to write file: {}", path))
    }

    /// Delete file from the work tree
    pub fn remove_file(&self, path: &str) -> Result<()> {
        fs::remove_file(self.path().join(path))
            .with_context(|| format!("Failed to remove file: {}", path))
    }

    /// Stage everything and commit it, returning the new commit
    pub fn commit(&mut self, message: &str) -> Result<CommitId> {
        self.git(&["add", "-A"])?;
        self.git(&["commit", "-q", "--allow-empty", "-m", message])?;
        self.rev_parse("HEAD")
    }

    /// `git mv`
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        self.git(&["mv", from, to])?;
        Ok(())
    }

    /// Create a branch at `HEAD` without switching to it
    pub fn branch(&mut self, name: &str) -> Result<()> {
        self.git(&["branch", name])?;
        Ok(())
    }

    pub fn checkout(&mut self, name: &str) -> Result<()> {
        self.git(&["checkout", "-q", name])?;
        Ok(())
    }

    /// Merge `branch` into the current branch with a merge commit
    pub fn merge(&mut self, branch: &str, message: &str) -> Result<CommitId> {
        self.git(&["merge", "-q", "--no-ff", "--no-edit", "-m", message, branch])?;
        self.rev_parse("HEAD")
    }

    /// Lightweight tag, or annotated when `message` is given
    pub fn tag(&mut self, name: &str, message: Option<&str>) -> Result<()> {
        match message {
            Some(message) => self.git(&["tag", "-a", "-m", message, name])?,
            None => self.git(&["tag", name])?,
        };
        Ok(())
    }

    pub fn rev_parse(&mut self, rev: &str) -> Result<CommitId> {
        let out = self.git(&["rev-parse", "--verify", rev])?;
        Ok(CommitId::from_hex(out.trim())?)
    }
}

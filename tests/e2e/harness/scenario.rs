use super::assertions::{Assertion, StatusMatch};
use super::fixture::GitFixture;
use super::runner::ScenarioRunner;
use super::steps::ScenarioStep;
use revgraph_core::Direction;

/// Fluent DSL for building test scenarios
pub struct Scenario {
    name: String,
    steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Create a new scenario with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            steps: Vec::new(),
        }
    }

    // ===== Work tree =====

    /// Write a file into the work tree
    pub fn write(mut self, path: &str, content: &str) -> Self {
        self.steps.push(ScenarioStep::WriteFile {
            path: path.to_string(),
            content: content.as_bytes().to_vec(),
        });
        self
    }

    /// Delete a file from the work tree
    pub fn remove(mut self, path: &str) -> Self {
        self.steps.push(ScenarioStep::RemoveFile {
            path: path.to_string(),
        });
        self
    }

    /// Rename a tracked file
    pub fn rename(mut self, from: &str, to: &str) -> Self {
        self.steps.push(ScenarioStep::RenameFile {
            from: from.to_string(),
            to: to.to_string(),
        });
        self
    }

    /// Commit everything; `label` names the commit in later assertions
    pub fn commit(mut self, label: &str) -> Self {
        self.steps.push(ScenarioStep::Commit {
            label: label.to_string(),
            message: format!("commit {}", label),
        });
        self
    }

    /// Commit everything with an explicit message
    pub fn commit_with_message(mut self, label: &str, message: &str) -> Self {
        self.steps.push(ScenarioStep::Commit {
            label: label.to_string(),
            message: message.to_string(),
        });
        self
    }

    /// Write a file named after `label` and commit it
    pub fn commit_file(self, label: &str) -> Self {
        let path = format!("{}.txt", label);
        self.write(&path, label).commit(label)
    }

    /// Create `count` commits labeled `{prefix}1`, `{prefix}2`, ...
    pub fn commits(mut self, prefix: &str, count: usize) -> Self {
        for i in 1..=count {
            self = self.commit_file(&format!("{}{}", prefix, i));
        }
        self
    }

    pub fn branch(mut self, name: &str) -> Self {
        self.steps.push(ScenarioStep::Branch {
            name: name.to_string(),
        });
        self
    }

    pub fn checkout(mut self, name: &str) -> Self {
        self.steps.push(ScenarioStep::Checkout {
            name: name.to_string(),
        });
        self
    }

    /// Merge `branch` into the current branch as commit `label`
    pub fn merge(mut self, label: &str, branch: &str) -> Self {
        self.steps.push(ScenarioStep::Merge {
            label: label.to_string(),
            branch: branch.to_string(),
        });
        self
    }

    pub fn tag(mut self, name: &str) -> Self {
        self.steps.push(ScenarioStep::Tag {
            name: name.to_string(),
            message: None,
        });
        self
    }

    pub fn annotated_tag(mut self, name: &str, message: &str) -> Self {
        self.steps.push(ScenarioStep::Tag {
            name: name.to_string(),
            message: Some(message.to_string()),
        });
        self
    }

    // ===== Loading =====

    /// Load `range` and wait until the load finishes
    pub fn load(mut self, range: &[&str]) -> Self {
        self.steps.push(ScenarioStep::Load {
            range: range.iter().map(|r| r.to_string()).collect(),
        });
        self
    }

    /// Load the history of `path` from `HEAD`
    pub fn load_file_history(mut self, path: &str) -> Self {
        self.steps.push(ScenarioStep::LoadFileHistory {
            path: path.to_string(),
        });
        self
    }

    /// Load `HEAD` and cancel as soon as the first rows arrive
    pub fn load_and_cancel(mut self) -> Self {
        self.steps.push(ScenarioStep::LoadAndCancel);
        self
    }

    // ===== Assertions =====

    /// Add a custom assertion
    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.steps.push(ScenarioStep::Assert { assertion });
        self
    }

    pub fn assert_complete(self) -> Self {
        self.assert(Assertion::Status(StatusMatch::Complete))
    }

    pub fn assert_failed(self) -> Self {
        self.assert(Assertion::Status(StatusMatch::Failed))
    }

    pub fn assert_no_violations(self) -> Self {
        self.assert(Assertion::NoViolations)
    }

    pub fn assert_row_count(self, n: usize) -> Self {
        self.assert(Assertion::RowCount(n))
    }

    /// Assert the session's rows are exactly `labels`, in order
    pub fn assert_rows(self, labels: &[&str]) -> Self {
        self.assert(Assertion::Rows(strings(labels)))
    }

    pub fn assert_children(self, label: &str, children: &[&str]) -> Self {
        self.assert(Assertion::Children {
            label: label.to_string(),
            children: strings(children),
        })
    }

    pub fn assert_ref_names(self, label: &str, names: &[&str]) -> Self {
        self.assert(Assertion::RefNames {
            label: label.to_string(),
            names: strings(names),
        })
    }

    pub fn assert_tags_before(self, label: &str, tags: &[&str]) -> Self {
        self.assert(Assertion::NearestTags {
            label: label.to_string(),
            direction: Direction::Down,
            tags: strings(tags),
        })
    }

    pub fn assert_tags_after(self, label: &str, tags: &[&str]) -> Self {
        self.assert(Assertion::NearestTags {
            label: label.to_string(),
            direction: Direction::Up,
            tags: strings(tags),
        })
    }

    /// Assert the changed files of `label`, as `"<status letter> <path>"`
    pub fn assert_changed_files(self, label: &str, files: &[&str]) -> Self {
        self.assert(Assertion::ChangedFiles {
            label: label.to_string(),
            files: strings(files),
        })
    }

    /// Assert the file history found, as `(label, path)` pairs newest first
    pub fn assert_tracked(self, entries: &[(&str, &str)]) -> Self {
        self.assert(Assertion::Tracked(
            entries
                .iter()
                .map(|(label, path)| (label.to_string(), path.to_string()))
                .collect(),
        ))
    }

    // ===== Execution =====

    /// Execute the scenario and return results
    pub fn run(self) -> ScenarioResult {
        if !GitFixture::available() {
            eprintln!("Skipping scenario '{}': git not installed", self.name);
            return ScenarioResult {
                name: self.name,
                success: true,
                steps_executed: 0,
                failure_step: None,
                error: None,
            };
        }

        let mut runner = match ScenarioRunner::new() {
            Ok(r) => r,
            Err(e) => {
                return ScenarioResult {
                    name: self.name.clone(),
                    success: false,
                    steps_executed: 0,
                    failure_step: Some(0),
                    error: Some(format!("Failed to create runner: {}", e)),
                }
            }
        };

        match runner.execute(&self.steps) {
            Ok(()) => ScenarioResult {
                name: self.name,
                success: true,
                steps_executed: self.steps.len(),
                failure_step: None,
                error: None,
            },
            Err(e) => {
                let failure_step = runner.current_step();
                ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: failure_step,
                    failure_step: Some(failure_step),
                    error: Some(format!("{:?}", e)),
                }
            }
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Result of running a scenario
#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub steps_executed: usize,
    pub failure_step: Option<usize>,
    pub error: Option<String>,
}

impl ScenarioResult {
    /// Unwrap the result, panicking if it failed
    pub fn unwrap(self) {
        if !self.success {
            panic!(
                "Scenario '{}' failed at step {}: {}",
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }

    /// Expect the result to be successful
    pub fn expect(self, msg: &str) {
        if !self.success {
            panic!(
                "{}: Scenario '{}' failed at step {}: {}",
                msg,
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }
}

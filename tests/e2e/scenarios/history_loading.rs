use crate::harness::{Assertion, Scenario};
use anyhow::{anyhow, ensure};

#[test]
fn test_linear_history_rows() {
    Scenario::new("linear_history_rows")
        .commits("c", 3)
        .load(&[])
        .assert_complete()
        .assert_no_violations()
        .assert_rows(&["c3", "c2", "c1"])
        .assert_children("c1", &["c2"])
        .assert_children("c3", &[])
        .assert(Assertion::LaneOf {
            label: "c2".into(),
            lane: 0,
        })
        .assert_changed_files("c2", &["A c2.txt"])
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_merge_history() {
    Scenario::new("merge_history")
        .commit_file("base")
        .branch("feature")
        .commit_file("main1")
        .checkout("feature")
        .commit_file("feat1")
        .checkout("main")
        .merge("merge", "feature")
        .load(&[])
        .assert_complete()
        .assert_no_violations()
        .assert_row_count(4)
        .assert(Assertion::ChildrenBeforeParents)
        .assert_children("base", &["feat1", "main1"])
        .assert_children("feat1", &["merge"])
        .assert(Assertion::LaneOf {
            label: "merge".into(),
            lane: 0,
        })
        // Merges are diffed against their first parent.
        .assert_changed_files("merge", &["A feat1.txt"])
        .run()
        .unwrap();
}

#[test]
fn test_uncommitted_changes_come_first() {
    Scenario::new("uncommitted_changes_first")
        .commits("c", 2)
        .write("c1.txt", "edited")
        .write("untracked.txt", "new")
        .load(&[])
        .assert_complete()
        .assert(Assertion::FirstRowUncommitted)
        .assert_rows(&["uncommitted", "c2", "c1"])
        .assert_children("c2", &["uncommitted"])
        .run()
        .unwrap();
}

#[test]
fn test_range_without_head_has_no_uncommitted_row() {
    Scenario::new("range_without_head")
        .commits("c", 3)
        .write("dirty.txt", "dirty")
        .load(&["main~1"])
        .assert_complete()
        .assert_rows(&["c2", "c1"])
        .run()
        .unwrap();
}

#[test]
fn test_sessions_share_commits() {
    Scenario::new("sessions_share_commits")
        .commits("c", 3)
        .load(&[])
        .assert_row_count(3)
        .load(&["main~1"])
        .assert_complete()
        .assert_rows(&["c2", "c1"])
        .assert(Assertion::Custom(Box::new(|repo| {
            ensure!(repo.store().len() == 3, "store holds {}", repo.store().len());
            ensure!(repo.sessions().count() == 2, "expected two sessions");
            Ok(())
        })))
        .run()
        .unwrap();
}

#[test]
fn test_message_with_quotes_and_spaces() {
    let message = "fix: handle \"quoted\" args & $dollar signs";
    Scenario::new("message_with_quotes")
        .write("a.txt", "a")
        .commit_with_message("c1", message)
        .load(&["--all"])
        .assert_complete()
        .assert(Assertion::Custom(Box::new(move |repo| {
            let head = repo.resolve("HEAD")?;
            let commit = repo
                .lookup(head)
                .ok_or_else(|| anyhow!("HEAD not loaded"))?;
            ensure!(commit.short_log == message, "subject is {:?}", commit.short_log);
            ensure!(commit.author == "Fixture <fixture@example.com>");
            Ok(())
        })))
        .run()
        .unwrap();
}

#[test]
fn test_file_with_spaces_in_name() {
    Scenario::new("file_with_spaces")
        .write("docs/read me.md", "hello")
        .commit("c1")
        .load(&[])
        .assert_complete()
        .assert_changed_files("c1", &["A docs/read me.md"])
        .assert(Assertion::Custom(Box::new(|repo| {
            let content = repo.file_content("HEAD", "docs/read me.md")?;
            ensure!(content == "hello", "content is {:?}", content);
            Ok(())
        })))
        .run()
        .unwrap();
}

use crate::harness::{Assertion, Scenario};
use anyhow::ensure;

#[test]
fn test_history_follows_rename() {
    Scenario::new("history_follows_rename")
        .write("a.txt", "one\n")
        .commit("c1")
        .write("a.txt", "one\ntwo\n")
        .commit("c2")
        .rename("a.txt", "b.txt")
        .commit("c3")
        .write("b.txt", "one\ntwo\nthree\n")
        .commit("c4")
        .commit_file("unrelated")
        .load_file_history("b.txt")
        .assert_complete()
        .assert_no_violations()
        .assert_tracked(&[
            ("c4", "b.txt"),
            ("c3", "b.txt"),
            ("c2", "a.txt"),
            ("c1", "a.txt"),
        ])
        .assert_rows(&["c4", "c3", "c2", "c1"])
        .assert_changed_files("c3", &["R b.txt"])
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_history_through_merge() {
    Scenario::new("history_through_merge")
        .write("f.txt", "base\n")
        .commit("c1")
        .branch("feature")
        .checkout("feature")
        .write("f.txt", "base\nfeature\n")
        .commit("feat")
        .checkout("main")
        .commit_file("main1")
        .merge("merge", "feature")
        .load_file_history("f.txt")
        .assert_complete()
        // The merge changes f.txt relative to its first parent.
        .assert_tracked(&[("merge", "f.txt"), ("feat", "f.txt"), ("c1", "f.txt")])
        .run()
        .unwrap();
}

#[test]
fn test_history_of_unknown_file_is_empty() {
    Scenario::new("history_of_unknown_file")
        .commits("c", 2)
        .load_file_history("missing.txt")
        .assert_complete()
        .assert_tracked(&[])
        .assert_row_count(0)
        .run()
        .unwrap();
}

#[test]
fn test_follow_renames_helper() {
    Scenario::new("follow_renames_helper")
        .write("old.txt", "content\n")
        .commit("c1")
        .rename("old.txt", "new.txt")
        .commit("c2")
        .assert(Assertion::Custom(Box::new(|repo| {
            let history = repo.follow_renames("new.txt", None)?;
            let paths: Vec<&str> = history.iter().map(|t| t.path.as_str()).collect();
            ensure!(paths == ["new.txt", "old.txt"], "paths are {:?}", paths);
            ensure!(repo.sessions().count() == 0, "session left behind");
            Ok(())
        })))
        .run()
        .unwrap();
}

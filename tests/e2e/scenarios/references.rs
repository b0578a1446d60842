use crate::harness::{Assertion, Scenario};
use anyhow::ensure;
use revgraph_core::RefKind;

#[test]
fn test_tags_and_branches_decorate_rows() {
    Scenario::new("tags_and_branches")
        .commit_file("c1")
        .annotated_tag("v1", "Release one")
        .commit_file("c2")
        .commit_file("c3")
        .tag("v2")
        .load(&["--all"])
        .assert_complete()
        .assert_no_violations()
        .assert_ref_names("c1", &["v1"])
        .assert_ref_names("c2", &[])
        .assert_ref_names("c3", &["main", "v2"])
        .assert(Assertion::TagMessage {
            label: "c1".into(),
            message: "Release one".into(),
        })
        .assert(Assertion::Custom(Box::new(|repo| {
            let head = repo.resolve("HEAD")?;
            let current = repo.references().check_ref(head, RefKind::CUR_BRANCH);
            ensure!(current.contains(RefKind::CUR_BRANCH), "HEAD not current");
            ensure!(repo.references().current_branch() == Some("main"));
            let tags = repo.references().all_ref_names(RefKind::TAG, true);
            ensure!(tags == ["v1", "v2"], "tags are {:?}", tags);
            Ok(())
        })))
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_nearest_tags() {
    Scenario::new("nearest_tags")
        .commit_file("c1")
        .tag("v1")
        .commit_file("c2")
        .commit_file("c3")
        .tag("v2")
        .commit_file("c4")
        .load(&[])
        .assert_complete()
        .assert_tags_before("c2", &["v1"])
        .assert_tags_after("c2", &["v2"])
        .assert_tags_before("c4", &["v2"])
        .assert_tags_after("c4", &[])
        // A tagged commit is its own nearest tag in both directions.
        .assert_tags_before("c3", &["v2"])
        .assert_tags_after("c3", &["v2"])
        .run()
        .unwrap();
}

#[test]
fn test_nearest_tags_across_branches() {
    Scenario::new("nearest_tags_across_branches")
        .commit_file("base")
        .branch("feature")
        .commit_file("main1")
        .tag("main-tag")
        .checkout("feature")
        .commit_file("feat1")
        .tag("feature-tag")
        .load(&["--all"])
        .assert_complete()
        .assert_tags_after("base", &["feature-tag", "main-tag"])
        .run()
        .unwrap();
}

#[test]
fn test_descendant_branches() {
    Scenario::new("descendant_branches")
        .commit_file("c1")
        .branch("feature")
        .commit_file("main1")
        .checkout("feature")
        .commit_file("feat1")
        .load(&["--all"])
        .assert_complete()
        .assert(Assertion::DescendantBranches {
            label: "c1".into(),
            branches: vec!["feature".into(), "main".into()],
        })
        .assert(Assertion::DescendantBranches {
            label: "feat1".into(),
            branches: vec!["feature".into()],
        })
        .assert_ref_names("feat1", &["feature"])
        .assert_children("c1", &["feat1", "main1"])
        .run()
        .unwrap();
}

#[test]
fn test_new_tag_seen_by_next_load() {
    Scenario::new("new_tag_seen_by_next_load")
        .commits("c", 2)
        .load(&[])
        .assert_ref_names("c1", &[])
        .tag("late")
        .load(&[])
        .assert_complete()
        .assert_ref_names("c2", &["main", "late"])
        .run()
        .unwrap();
}

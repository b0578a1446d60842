use crate::harness::{Assertion, Scenario};
use anyhow::ensure;
use revgraph_core::{GraphEvent, LoadStatus};

#[test]
fn test_cancel_keeps_loaded_rows() {
    Scenario::new("cancel_keeps_loaded_rows")
        .commits("c", 40)
        .load_and_cancel()
        .assert(Assertion::NoRowsAfterCancel)
        .assert_no_violations()
        .assert(Assertion::ChildrenBeforeParents)
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_cancel_after_completion_is_noop() {
    Scenario::new("cancel_after_completion")
        .commits("c", 3)
        .assert(Assertion::Custom(Box::new(|repo| {
            let id = repo.start_load(&[])?;
            ensure!(repo.wait(id)? == LoadStatus::Complete);
            ensure!(!repo.cancel(id)?, "cancel reported success");
            ensure!(repo.session(id)?.status() == &LoadStatus::Complete);
            ensure!(repo.view(id)?.len() == 3);
            Ok(())
        })))
        .run()
        .unwrap();
}

#[test]
fn test_events_announce_every_row() {
    Scenario::new("events_announce_every_row")
        .commits("c", 5)
        .assert(Assertion::Custom(Box::new(|repo| {
            let events = repo.subscribe()?;
            let id = repo.start_load(&[])?;
            repo.wait(id)?;

            let mut appended = Vec::new();
            let mut completed = Vec::new();
            for event in events.try_iter() {
                match event {
                    GraphEvent::CommitsAppended { session, ids } if session == id => {
                        appended.extend(ids)
                    }
                    GraphEvent::LoadCompleted { session, status } if session == id => {
                        completed.push(status)
                    }
                    _ => {}
                }
            }

            let view = repo.view(id)?;
            let rows: Vec<_> = (0..view.len()).filter_map(|row| view.id_at(row)).collect();
            ensure!(appended == rows, "announced {:?}, rows {:?}", appended, rows);
            ensure!(completed == [LoadStatus::Complete], "completions {:?}", completed);
            Ok(())
        })))
        .run()
        .unwrap();
}

#[test]
fn test_immediate_cancel_announced() {
    Scenario::new("immediate_cancel_announced")
        .commits("c", 3)
        .assert(Assertion::Custom(Box::new(|repo| {
            let events = repo.subscribe()?;
            let id = repo.start_load(&[])?;
            ensure!(repo.cancel(id)?);
            ensure!(repo.wait(id)? == LoadStatus::Canceled);
            ensure!(repo.view(id)?.is_empty());

            let canceled = events
                .try_iter()
                .filter(|e| matches!(e, GraphEvent::LoadCanceled { session } if *session == id))
                .count();
            ensure!(canceled == 1, "{} cancel events", canceled);
            Ok(())
        })))
        .run()
        .unwrap();
}

mod common;

use std::io;

use common::{
    blocked_page, data_rows, distinct_links, extractor, page, page_with, settings, ScriptedSource,
};
use harvester_core::{Field, Limits, Record, ResourcePattern, StopReason};
use harvester_engine::{
    CsvRecordStore, HarvestError, HarvestLoop, MemoryCheckpointStore, RecordStore, StoreError,
};
use pretty_assertions::assert_eq;

fn open_store(path: &std::path::Path) -> Box<dyn RecordStore> {
    Box::new(CsvRecordStore::open(path, ResourcePattern::default()).unwrap())
}

#[tokio::test]
async fn fresh_harvest_stalls_after_five_idle_steps() {
    engine_logging::initialize_for_tests();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("jobs.csv");
    let checkpoint = MemoryCheckpointStore::default();
    let source = ScriptedSource::new(vec![page(10), page(12)]);
    let probe = source.probe();

    let mut harvest = HarvestLoop::new(
        Box::new(source),
        extractor(),
        open_store(&output),
        Box::new(checkpoint.clone()),
        settings(Limits::default()),
    );
    let report = harvest.run().await.unwrap();

    assert_eq!(report.reason, StopReason::Stalled);
    assert_eq!(report.new_records, 12);
    assert_eq!(report.final_cursor, 7);
    assert_eq!(report.steps_run, 7);
    assert!(report.cleanup_completed);
    assert_eq!(checkpoint.saves(), vec![1, 2, 3, 4, 5, 6, 7]);

    let rows = data_rows(&output);
    assert_eq!(rows.len(), 12);
    assert_eq!(
        rows[0],
        "Role 1,Company 1,City 1,https://www.linkedin.com/jobs/view/1/,2024-05-18"
    );
    let probe = probe.lock().unwrap();
    assert_eq!(probe.navigations, 1);
    assert_eq!(probe.advances, 6);
    assert_eq!(probe.closes, 1);
}

#[tokio::test]
async fn resumed_harvest_starts_after_the_checkpoint_without_re_emitting() {
    engine_logging::initialize_for_tests();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("jobs.csv");
    {
        let mut store = CsvRecordStore::open(&output, ResourcePattern::default()).unwrap();
        for id in 1..=10 {
            let record = Record::builder()
                .set(Field::Title, format!("Role {id}"))
                .set(Field::Link, format!("https://www.linkedin.com/jobs/view/{id}/"))
                .build(&ResourcePattern::default());
            store.append(&record).unwrap();
        }
        store.close().unwrap();
    }
    let checkpoint = MemoryCheckpointStore::with_cursor(4);

    let mut harvest = HarvestLoop::new(
        Box::new(ScriptedSource::new(vec![page(10), page(12)])),
        extractor(),
        open_store(&output),
        Box::new(checkpoint.clone()),
        settings(Limits::default()),
    );
    let report = harvest.run().await.unwrap();

    assert_eq!(report.new_records, 2);
    assert_eq!(report.reason, StopReason::Stalled);
    assert_eq!(checkpoint.saves(), vec![5, 6, 7, 8, 9, 10]);
    let rows = data_rows(&output);
    assert_eq!(rows.len(), 12);
    assert_eq!(distinct_links(&rows).len(), 12);
}

#[tokio::test]
async fn persisted_count_matches_distinct_identities() {
    engine_logging::initialize_for_tests();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("jobs.csv");
    {
        let mut store = CsvRecordStore::open(&output, ResourcePattern::default()).unwrap();
        for id in [3, 4] {
            let record = Record::builder()
                .set(
                    Field::Link,
                    format!("https://ae.linkedin.com/jobs/view/{id}?position=9"),
                )
                .build(&ResourcePattern::default());
            store.append(&record).unwrap();
        }
        store.close().unwrap();
    }
    let frames = vec![
        page_with(1..=5, "a"),
        page_with(1..=8, "b"),
        page_with(2..=9, "c"),
    ];

    let mut harvest = HarvestLoop::new(
        Box::new(ScriptedSource::new(frames)),
        extractor(),
        open_store(&output),
        Box::new(MemoryCheckpointStore::default()),
        settings(Limits::default()),
    );
    let report = harvest.run().await.unwrap();

    let rows = data_rows(&output);
    assert_eq!(report.new_records, 7);
    assert_eq!(rows.len(), 9);
    assert_eq!(distinct_links(&rows).len(), 9);
}

#[tokio::test]
async fn max_steps_stops_a_growing_feed() {
    engine_logging::initialize_for_tests();
    let dir = tempfile::tempdir().unwrap();
    let checkpoint = MemoryCheckpointStore::default();
    let limits = Limits {
        max_steps: 3,
        ..Limits::default()
    };

    let mut harvest = HarvestLoop::new(
        Box::new(ScriptedSource::new(vec![page(2), page(4), page(6), page(8)])),
        extractor(),
        open_store(&dir.path().join("jobs.csv")),
        Box::new(checkpoint.clone()),
        settings(limits),
    );
    let report = harvest.run().await.unwrap();

    assert_eq!(report.reason, StopReason::MaxSteps);
    assert_eq!(report.new_records, 6);
    assert_eq!(checkpoint.saves(), vec![1, 2, 3]);
}

#[tokio::test]
async fn checkpoint_at_max_steps_only_runs_the_baseline_pass() {
    engine_logging::initialize_for_tests();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("jobs.csv");
    let checkpoint = MemoryCheckpointStore::with_cursor(1000);
    let source = ScriptedSource::new(vec![page(3)]);
    let probe = source.probe();

    let mut harvest = HarvestLoop::new(
        Box::new(source),
        extractor(),
        open_store(&output),
        Box::new(checkpoint.clone()),
        settings(Limits::default()),
    );
    let report = harvest.run().await.unwrap();

    assert_eq!(report.reason, StopReason::MaxSteps);
    assert_eq!(report.steps_run, 0);
    assert_eq!(report.final_cursor, 1000);
    // The baseline pass still persists listings that appeared since the crash.
    assert_eq!(report.new_records, 3);
    assert_eq!(data_rows(&output).len(), 3);
    assert!(checkpoint.saves().is_empty());
    let probe = probe.lock().unwrap();
    assert_eq!(probe.snapshots, 1);
    assert_eq!(probe.advances, 0);
}

#[tokio::test]
async fn zero_max_steps_still_extracts_the_first_page() {
    engine_logging::initialize_for_tests();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("jobs.csv");
    let checkpoint = MemoryCheckpointStore::default();
    let limits = Limits {
        max_steps: 0,
        ..Limits::default()
    };

    let mut harvest = HarvestLoop::new(
        Box::new(ScriptedSource::new(vec![page(4), page(8)])),
        extractor(),
        open_store(&output),
        Box::new(checkpoint.clone()),
        settings(limits),
    );
    let report = harvest.run().await.unwrap();

    assert_eq!(report.reason, StopReason::MaxSteps);
    assert_eq!(report.new_records, 4);
    assert_eq!(data_rows(&output).len(), 4);
    assert_eq!(checkpoint.saves(), vec![1]);
}

#[tokio::test]
async fn revealing_more_counts_as_progress() {
    engine_logging::initialize_for_tests();
    let dir = tempfile::tempdir().unwrap();
    let limits = Limits {
        max_steps: 12,
        ..Limits::default()
    };

    let mut harvest = HarvestLoop::new(
        Box::new(ScriptedSource::new(vec![page(5)]).always_revealing()),
        extractor(),
        open_store(&dir.path().join("jobs.csv")),
        Box::new(MemoryCheckpointStore::default()),
        settings(limits),
    );
    let report = harvest.run().await.unwrap();

    assert_eq!(report.reason, StopReason::MaxSteps);
    assert_eq!(report.final_cursor, 12);
}

#[tokio::test]
async fn fatal_source_fault_aborts_and_still_cleans_up() {
    engine_logging::initialize_for_tests();
    let dir = tempfile::tempdir().unwrap();
    let checkpoint = MemoryCheckpointStore::default();
    let source = ScriptedSource::new(vec![page(3), page(6)]).fatal_on_advance(2);
    let probe = source.probe();

    let mut harvest = HarvestLoop::new(
        Box::new(source),
        extractor(),
        open_store(&dir.path().join("jobs.csv")),
        Box::new(checkpoint.clone()),
        settings(Limits::default()),
    );
    let report = harvest.run().await.unwrap();

    assert_eq!(report.reason, StopReason::SourceFault);
    assert_eq!(report.new_records, 6);
    assert!(report.cleanup_completed);
    assert_eq!(checkpoint.saves(), vec![1, 2]);
    assert_eq!(probe.lock().unwrap().closes, 1);

    assert!(harvest.shutdown().await);
    assert_eq!(probe.lock().unwrap().closes, 1);
}

#[tokio::test]
async fn three_unreadable_steps_abort_the_harvest() {
    engine_logging::initialize_for_tests();
    let dir = tempfile::tempdir().unwrap();
    let checkpoint = MemoryCheckpointStore::default();
    let source = ScriptedSource::new(vec![page(4), page(8)]).unavailable_after(1);
    let probe = source.probe();

    let mut harvest = HarvestLoop::new(
        Box::new(source),
        extractor(),
        open_store(&dir.path().join("jobs.csv")),
        Box::new(checkpoint.clone()),
        settings(Limits::default()),
    );
    let report = harvest.run().await.unwrap();

    assert_eq!(report.reason, StopReason::SourceUnavailable);
    assert_eq!(report.new_records, 4);
    assert_eq!(checkpoint.saves(), vec![1, 2, 3]);
    // Three snapshot attempts per unreadable step, plus the initial one.
    assert_eq!(probe.lock().unwrap().snapshots, 1 + 3 * 3);
}

#[tokio::test]
async fn missing_container_is_a_non_progressing_step() {
    engine_logging::initialize_for_tests();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("jobs.csv");

    let mut harvest = HarvestLoop::new(
        Box::new(ScriptedSource::new(vec![blocked_page()])),
        extractor(),
        open_store(&output),
        Box::new(MemoryCheckpointStore::default()),
        settings(Limits::default()),
    );
    let report = harvest.run().await.unwrap();

    assert_eq!(report.reason, StopReason::Stalled);
    assert_eq!(report.new_records, 0);
    assert_eq!(report.final_cursor, 6);
    assert!(data_rows(&output).is_empty());
}

#[tokio::test]
async fn listings_missing_fields_are_kept_with_sentinels() {
    engine_logging::initialize_for_tests();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("jobs.csv");
    let frame = r#"<html><body><ul class="jobs-search__results-list">
        <li><div class="job-search-card">
          <a class="base-card__full-link" href="https://www.linkedin.com/jobs/view/77/?x=1"></a>
          <h3 class="base-search-card__title">Analyst</h3>
        </div></li>
        <li><div class="job-search-card"><h3 class="base-search-card__title">No link</h3></div></li>
    </ul></body></html>"#;

    let mut harvest = HarvestLoop::new(
        Box::new(ScriptedSource::new(vec![frame.to_string()])),
        extractor(),
        open_store(&output),
        Box::new(MemoryCheckpointStore::default()),
        settings(Limits::default()),
    );
    let report = harvest.run().await.unwrap();

    assert_eq!(report.new_records, 1);
    assert_eq!(
        data_rows(&output),
        vec!["Analyst,N/A,N/A,https://www.linkedin.com/jobs/view/77/,N/A"]
    );
}

struct FailingStore;

impl RecordStore for FailingStore {
    fn load_seen_identities(
        &mut self,
    ) -> Result<std::collections::HashSet<String>, StoreError> {
        Ok(Default::default())
    }

    fn append(&mut self, _record: &Record) -> Result<bool, StoreError> {
        Err(StoreError::Io(io::Error::other("disk full")))
    }

    fn has(&self, _identity: &str) -> bool {
        false
    }

    fn appended(&self) -> usize {
        0
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn store_write_failure_aborts_after_cleanup() {
    engine_logging::initialize_for_tests();
    let checkpoint = MemoryCheckpointStore::default();
    let source = ScriptedSource::new(vec![page(3)]);
    let probe = source.probe();

    let mut harvest = HarvestLoop::new(
        Box::new(source),
        extractor(),
        Box::new(FailingStore),
        Box::new(checkpoint.clone()),
        settings(Limits::default()),
    );
    let err = harvest.run().await.unwrap_err();

    assert!(matches!(err, HarvestError::Store(StoreError::Io(_))));
    assert!(checkpoint.saves().is_empty());
    assert_eq!(probe.lock().unwrap().closes, 1);
}

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{attachment, context, description, read, FakeSource, FakeTransfer};
use fourget_engine::{
    Accumulator, EngineContext, FailureKind, HarvestConfig, Harvester, RunStatus, Tally,
    ThreadRef, THREAD_METADATA_FILE,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn config(dir: &TempDir, worker_count: usize) -> HarvestConfig {
    HarvestConfig {
        output_dir: dir.path().to_path_buf(),
        worker_count,
        ..HarvestConfig::default()
    }
}

fn three_files() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("a.png", vec![1u8; 10]),
        ("b.png", vec![2u8; 20]),
        ("c.webm", vec![3u8; 30]),
    ]
}

#[tokio::test]
async fn thread_with_three_attachments_drains_with_every_byte_recorded() {
    fourget_logging::initialize_for_tests();
    let dir = TempDir::new().unwrap();
    let files = three_files();
    let mut transfer = FakeTransfer::new();
    for (name, content) in &files {
        transfer = transfer.with_file(&format!("https://media.test/{name}"), content);
    }
    let source = FakeSource::describing(description(
        files
            .iter()
            .map(|(name, content)| attachment(name, content))
            .collect(),
    ));
    let transfer = Arc::new(transfer);
    let harvester = Harvester::with_context(
        context(Arc::new(source), transfer.clone()),
        config(&dir, 2),
    );

    let report = harvester.run(ThreadRef::new("g", 123)).await.unwrap();

    assert!(report.outcome.is_drained());
    assert_eq!(report.stats.enqueued, 5);
    assert_eq!(report.stats.done, 5);
    assert_eq!(report.tally.expected, 60);
    assert_eq!(report.tally.transferred, 60);
    assert_eq!(report.status(), RunStatus::NewData);
    assert_eq!(transfer.total_calls(), 3);

    let thread_dir = dir.path().join("4chan - g - 123 - Cats");
    assert!(thread_dir.join(THREAD_METADATA_FILE).is_file());
    for (name, content) in &files {
        assert_eq!(&read(&thread_dir.join(name)), content);
    }
}

#[tokio::test]
async fn rerun_over_a_complete_archive_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let files = three_files();
    let mut transfer = FakeTransfer::new();
    for (name, content) in &files {
        transfer = transfer.with_file(&format!("https://media.test/{name}"), content);
    }
    let source = Arc::new(FakeSource::describing(description(
        files
            .iter()
            .map(|(name, content)| attachment(name, content))
            .collect(),
    )));
    let transfer = Arc::new(transfer);
    let harvester = Harvester::with_context(context(source, transfer.clone()), config(&dir, 3));

    harvester.run(ThreadRef::new("g", 123)).await.unwrap();
    let second = harvester.run(ThreadRef::new("g", 123)).await.unwrap();

    assert_eq!(second.status(), RunStatus::NoOp);
    assert_eq!(second.tally.transferred, 0);
    assert_eq!(second.tally.present, 60);
    assert_eq!(transfer.total_calls(), 3);
}

#[tokio::test]
async fn thread_without_attachments_only_writes_metadata() {
    let dir = TempDir::new().unwrap();
    let harvester = Harvester::with_context(
        context(
            Arc::new(FakeSource::describing(description(Vec::new()))),
            Arc::new(FakeTransfer::new()),
        ),
        config(&dir, 1),
    );

    let report = harvester.run(ThreadRef::new("g", 123)).await.unwrap();

    assert!(report.outcome.is_drained());
    assert_eq!(report.stats.done, 2);
    assert_eq!(report.status(), RunStatus::NoOp);
    assert!(dir
        .path()
        .join("4chan - g - 123 - Cats")
        .join(THREAD_METADATA_FILE)
        .is_file());
}

#[tokio::test]
async fn missing_thread_stops_the_run_without_further_work() {
    fourget_logging::initialize_for_tests();
    let dir = TempDir::new().unwrap();
    let transfer = Arc::new(FakeTransfer::new());
    let harvester = Harvester::with_context(
        context(
            Arc::new(FakeSource::failing(FailureKind::NotFound)),
            transfer.clone(),
        ),
        config(&dir, 2),
    );

    let report = harvester.run(ThreadRef::new("g", 404)).await.unwrap();

    let reason = report.outcome.stop_reason().expect("run should stop");
    assert!(reason.ends_with("not found"), "{reason}");
    assert_eq!(report.stats.enqueued, 1);
    assert_eq!(report.tally.transferred, 0);
    assert_eq!(transfer.total_calls(), 0);
    assert!(matches!(report.status(), RunStatus::Stopped(_)));
    assert_eq!(report.status().exit_code(), 2);
}

#[tokio::test]
async fn other_source_errors_fail_the_run() {
    let dir = TempDir::new().unwrap();
    let harvester = Harvester::with_context(
        context(
            Arc::new(FakeSource::failing(FailureKind::HttpStatus(500))),
            Arc::new(FakeTransfer::new()),
        ),
        config(&dir, 2),
    );

    let report = harvester.run(ThreadRef::new("g", 1)).await.unwrap();

    assert!(report.outcome.error().is_some());
    assert_eq!(report.status(), RunStatus::Failed);
    assert_eq!(report.status().exit_code(), 3);
}

#[tokio::test]
async fn failing_transfer_fails_the_run_without_hanging() {
    fourget_logging::initialize_for_tests();
    let dir = TempDir::new().unwrap();
    let files = three_files();
    let mut transfer = FakeTransfer::new().with_failure("https://media.test/b.png", FailureKind::Network);
    for (name, content) in &files {
        if *name != "b.png" {
            transfer = transfer.with_file(&format!("https://media.test/{name}"), content);
        }
    }
    let source = FakeSource::describing(description(
        files
            .iter()
            .map(|(name, content)| attachment(name, content))
            .collect(),
    ));
    let harvester = Harvester::with_context(
        context(Arc::new(source), Arc::new(transfer)),
        config(&dir, 2),
    );

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        harvester.run(ThreadRef::new("g", 123)),
    )
    .await
    .expect("run should not hang")
    .unwrap();

    let err = report.outcome.error().expect("run should fail");
    assert!(err.to_string().contains("network error"), "{err}");
    assert_eq!(report.stats.in_flight, 0);
}

#[tokio::test]
async fn zero_workers_is_rejected_before_anything_runs() {
    let dir = TempDir::new().unwrap();
    let transfer = Arc::new(FakeTransfer::new());
    let harvester = Harvester::with_context(
        context(
            Arc::new(FakeSource::describing(description(Vec::new()))),
            transfer,
        ),
        config(&dir, 0),
    );

    let err = harvester.run(ThreadRef::new("g", 1)).await.unwrap_err();

    assert!(err.to_string().contains("worker count"), "{err}");
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn each_run_counts_into_its_own_tally() {
    let dir = TempDir::new().unwrap();
    let content = vec![9u8; 12];
    let transfer = FakeTransfer::new().with_file("https://media.test/a.png", &content);
    let ctx = context(
        Arc::new(FakeSource::describing(description(vec![attachment("a.png", &content)]))),
        Arc::new(transfer),
    );
    let injected = Tally::new();
    injected.record_bytes(1000);
    let ctx = EngineContext {
        tally: Arc::new(injected),
        ..ctx
    };
    let harvester = Harvester::with_context(ctx, config(&dir, 1));

    let first = harvester.run(ThreadRef::new("g", 123)).await.unwrap();
    let second = harvester.run(ThreadRef::new("g", 123)).await.unwrap();

    assert_eq!(first.tally.transferred, 12);
    assert_eq!(second.tally.transferred, 0);
    assert_eq!(second.tally.present, 12);
}

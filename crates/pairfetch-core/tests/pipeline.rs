//! Integration tests: input → dispatcher → pool → reporter.

mod common;

use common::http_server::{self, Route};
use pairfetch_core::control::CancelToken;
use pairfetch_core::dispatcher::{self, StopReason};
use pairfetch_core::fetch::TaskOptions;
use pairfetch_core::pool::{PoolSettings, WorkerPool};
use pairfetch_core::report::{self, OutputFormat, Reporter};
use pairfetch_core::storage::PartialPolicy;
use std::time::Duration;
use tempfile::tempdir;

fn settings(workers: usize, queue_capacity: usize) -> PoolSettings {
    PoolSettings {
        workers,
        queue_capacity,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pool_never_exceeds_worker_count() {
    let routes: Vec<(String, Route)> = (0..6)
        .map(|i| {
            (
                format!("/f{}", i),
                Route::Slow {
                    body: vec![b'a' + i as u8; 100],
                    delay: Duration::from_millis(200),
                },
            )
        })
        .collect();
    let server = http_server::start(routes.iter().map(|(p, r)| (p.as_str(), r.clone())).collect());
    let dir = tempdir().unwrap();

    let mut input = String::new();
    for i in 0..6 {
        input.push_str(&format!(
            "{} {}\n",
            server.url(&format!("/f{}", i)),
            dir.path().join(format!("f{}", i)).display()
        ));
    }

    let (pool, outcomes) = WorkerPool::spawn(TaskOptions::default(), settings(2, 1), CancelToken::new());
    let reporter = tokio::spawn(report::run_reporter(
        outcomes,
        Reporter::new(Vec::new(), OutputFormat::Plain),
    ));
    let summary = dispatcher::dispatch(input.as_bytes(), &pool, &CancelToken::new()).await;
    pool.shutdown().await.unwrap();
    let reporter = reporter.await.unwrap();

    assert_eq!(summary.submitted, 6);
    assert_eq!(summary.stopped_by, StopReason::EndOfInput);
    assert_eq!(reporter.tally().completed, 6);
    assert!(server.max_in_flight() <= 2, "max in flight {}", server.max_in_flight());
    for i in 0..6u8 {
        let got = std::fs::read(dir.path().join(format!("f{}", i))).unwrap();
        assert_eq!(got, vec![b'a' + i; 100]);
    }
}

#[tokio::test]
async fn plain_output_lists_each_completed_path_once() {
    let server = http_server::start(vec![
        ("/a", Route::Ok(b"alpha".to_vec())),
        ("/b", Route::Ok(b"bravo".to_vec())),
    ]);
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    let missing = dir.path().join("missing.txt");
    // Pairs may span lines; the 404 job fails and prints nothing.
    let input = format!(
        "{} {}\n{}\n{} {} {} {}",
        server.url("/a"),
        a.display(),
        server.url("/b"),
        b.display(),
        server.url("/nope"),
        missing.display(),
        server.url("/dangling"),
    );

    let (pool, outcomes) = WorkerPool::spawn(TaskOptions::default(), settings(4, 4), CancelToken::new());
    let reporter = tokio::spawn(report::run_reporter(
        outcomes,
        Reporter::new(Vec::new(), OutputFormat::Plain),
    ));
    let summary = dispatcher::dispatch(input.as_bytes(), &pool, &CancelToken::new()).await;
    pool.shutdown().await.unwrap();
    let reporter = reporter.await.unwrap();

    assert_eq!(summary.submitted, 3);
    assert_eq!(summary.dangling_token.as_deref(), Some(server.url("/dangling").as_str()));
    let tally = reporter.tally();
    assert_eq!(tally.completed, 2);
    assert_eq!(tally.failed, 1);
    assert_eq!(tally.bytes_written, 10);

    let text = String::from_utf8(reporter.into_inner()).unwrap();
    let mut lines: Vec<&str> = text.lines().collect();
    lines.sort_unstable();
    let mut expected = vec![format!("{}  done", a.display()), format!("{}  done", b.display())];
    expected.sort_unstable();
    assert_eq!(lines, expected);
    assert_eq!(std::fs::read(&a).unwrap(), b"alpha");
    assert_eq!(std::fs::read(&b).unwrap(), b"bravo");
    assert!(!missing.exists());
}

#[tokio::test]
async fn json_output_includes_failures() {
    let server = http_server::start(vec![("/a", Route::Ok(b"alpha".to_vec()))]);
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let missing = dir.path().join("missing.txt");
    let input = format!(
        "{} {}\n{} {}\n",
        server.url("/a"),
        a.display(),
        server.url("/nope"),
        missing.display()
    );

    let options = TaskOptions {
        partial_policy: PartialPolicy::Keep,
        ..TaskOptions::default()
    };
    let (pool, outcomes) = WorkerPool::spawn(options, settings(1, 4), CancelToken::new());
    let reporter = tokio::spawn(report::run_reporter(
        outcomes,
        Reporter::new(Vec::new(), OutputFormat::Json),
    ));
    dispatcher::dispatch(input.as_bytes(), &pool, &CancelToken::new()).await;
    pool.shutdown().await.unwrap();
    let reporter = reporter.await.unwrap();

    let text = String::from_utf8(reporter.into_inner()).unwrap();
    let mut records: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    records.sort_by_key(|r| r["id"].as_u64().unwrap());
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["status"], "completed");
    assert_eq!(records[0]["bytes_written"], 5);
    assert_eq!(records[1]["status"], "failed");
    assert_eq!(records[1]["kind"], "unexpected_status");
    // Keep policy: the abandoned destination stays, empty.
    assert_eq!(std::fs::metadata(&missing).unwrap().len(), 0);
}

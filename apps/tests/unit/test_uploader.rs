//! Uploader tests

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lift_apps::errors::DeployError;
use lift_apps::filesys::walker::SourceWalker;
use lift_apps::sync::client::ProgressCallback;
use lift_apps::sync::session::SyncSession;
use lift_apps::sync::uploader::SyncUploader;
use tokio_util::sync::CancellationToken;

use crate::support::{write_tree, FakeSyncClient};

fn uploader(client: Arc<FakeSyncClient>, root: &std::path::Path) -> SyncUploader {
    SyncUploader::new(
        client,
        Arc::new(SyncSession::with_id("sync-1", "cache-0")),
        root,
        CancellationToken::new(),
    )
}

#[tokio::test]
async fn test_upload_pushes_every_regular_file_once() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(
        dir.path(),
        &[
            ("index.js", "console.log(1)"),
            ("package.json", "{}"),
            ("lib/a.js", "a"),
            ("lib/nested/b.js", "bb"),
            ("assets/logo.svg", "<svg/>"),
        ],
    );
    std::fs::create_dir_all(dir.path().join("empty")).unwrap();

    let client = Arc::new(FakeSyncClient::default());
    let summary = uploader(client.clone(), dir.path())
        .with_concurrency(4)
        .upload(SourceWalker::new(dir.path()))
        .await
        .unwrap();

    let pushed: BTreeSet<String> = client.pushed_paths().into_iter().collect();
    let expected: BTreeSet<String> = [
        "assets/logo.svg",
        "index.js",
        "lib/a.js",
        "lib/nested/b.js",
        "package.json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    assert_eq!(pushed, expected);
    assert_eq!(client.pushed().len(), 5);
    assert_eq!(summary.files, 5);
    assert_eq!(summary.bytes, 14 + 2 + 1 + 2 + 6);

    for record in client.pushed() {
        assert_eq!(record.sync_id, "sync-1");
        assert_eq!(record.cache_id, "cache-0");
    }
}

#[tokio::test]
async fn test_upload_sequential_follows_walk_order() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(
        dir.path(),
        &[("b.txt", "b"), ("a/z.txt", "z"), ("a/y.txt", "y"), ("c.txt", "c")],
    );

    let client = Arc::new(FakeSyncClient::default());
    uploader(client.clone(), dir.path())
        .with_concurrency(1)
        .upload(SourceWalker::new(dir.path()))
        .await
        .unwrap();

    assert_eq!(
        client.pushed_paths(),
        vec!["a/y.txt", "a/z.txt", "b.txt", "c.txt"]
    );
    assert_eq!(client.max_in_flight(), 1);
}

#[tokio::test]
async fn test_upload_respects_concurrency_bound() {
    let dir = tempfile::tempdir().unwrap();
    let files: Vec<(String, String)> = (0..12)
        .map(|i| (format!("f{i:02}.txt"), format!("file {i}")))
        .collect();
    let refs: Vec<(&str, &str)> = files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
    write_tree(dir.path(), &refs);

    let client = Arc::new(FakeSyncClient::default().with_push_delay(Duration::from_millis(20)));
    let summary = uploader(client.clone(), dir.path())
        .with_concurrency(3)
        .upload(SourceWalker::new(dir.path()))
        .await
        .unwrap();

    assert_eq!(summary.files, 12);
    assert_eq!(client.pushed().len(), 12);
    assert!(client.max_in_flight() <= 3);
    assert!(client.max_in_flight() >= 2);
}

#[tokio::test]
async fn test_upload_stops_at_first_transfer_error() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("a.txt", "a"), ("b.txt", "b"), ("c.txt", "c")]);

    let client = Arc::new(FakeSyncClient::default().failing_push("b.txt"));
    let err = uploader(client.clone(), dir.path())
        .with_concurrency(1)
        .upload(SourceWalker::new(dir.path()))
        .await
        .unwrap_err();

    match err {
        DeployError::Transfer { path, .. } => assert!(path.ends_with("b.txt")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(client.pushed_paths(), vec!["a.txt"]);
}

#[tokio::test]
async fn test_upload_empty_tree() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(FakeSyncClient::default());
    let summary = uploader(client.clone(), dir.path())
        .upload(SourceWalker::new(dir.path()))
        .await
        .unwrap();

    assert_eq!(summary.files, 0);
    assert_eq!(summary.bytes, 0);
    assert!(client.pushed().is_empty());
}

#[tokio::test]
async fn test_upload_cancelled_before_start() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("a.txt", "a")]);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let client = Arc::new(FakeSyncClient::default());
    let err = SyncUploader::new(
        client.clone(),
        Arc::new(SyncSession::new("")),
        dir.path(),
        cancel,
    )
    .upload(SourceWalker::new(dir.path()))
    .await
    .unwrap_err();

    assert!(err.is_cancelled());
    assert!(client.pushed().is_empty());
}

#[tokio::test]
async fn test_push_single_file_reports_progress() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("src/main.go", "package main")]);

    let seen = Arc::new(AtomicU64::new(0));
    let progress: ProgressCallback = {
        let seen = seen.clone();
        Arc::new(move |total: u64| seen.store(total, Ordering::SeqCst))
    };

    let client = Arc::new(FakeSyncClient::default());
    let uploader = uploader(client.clone(), dir.path()).with_progress(Some(progress));
    let sent = uploader.push(&dir.path().join("src/main.go")).await.unwrap();

    assert_eq!(sent, 12);
    assert_eq!(seen.load(Ordering::SeqCst), 12);
    assert_eq!(uploader.session().bytes_sent(), 12);
    assert_eq!(uploader.session().files_pushed(), 1);
    assert_eq!(client.pushed()[0].path, "src/main.go");
    assert_eq!(client.pushed()[0].contents, b"package main");
}

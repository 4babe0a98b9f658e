//! End-to-end service behavior: background indexing, ranked search on the
//! worker thread, and query supersession.

mod common;

use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{dir, file, MemoryVolume};
use velterm_search::FileSearchService;

fn sample_volume() -> Arc<MemoryVolume> {
    Arc::new(MemoryVolume::new(vec![
        file(10, 1, "a.txt"),
        dir(2, 1, "dir"),
        file(11, 2, "bb.txt"),
        file(12, 2, "bbc.txt"),
    ]))
}

fn wait_until(deadline_secs: u64, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(deadline_secs);
    while !done() {
        assert!(Instant::now() < deadline, "timed out");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn indexing_then_search_delivers_ranked_results() {
    let tmp = tempfile::tempdir().unwrap();
    let volume = sample_volume();
    let mut service = FileSearchService::new(volume, tmp.path().join("search.idx"));

    assert!(!service.is_index_ready());
    service.start_indexing();
    wait_until(10, || service.is_index_ready() && !service.is_indexing());
    assert_eq!(service.indexed_count(), 4);
    assert!(service.index_status().starts_with("Ready"));
    assert!((service.index_progress() - 1.0).abs() < f32::EPSILON);

    let (tx, rx) = mpsc::channel();
    service.search(
        "bb",
        Box::new(move |results, complete| {
            tx.send((results, complete)).unwrap();
        }),
    );
    let (results, complete) = rx.recv_timeout(Duration::from_secs(10)).unwrap();
    assert!(complete);
    let names: Vec<_> = results.iter().map(|r| r.display_name.as_str()).collect();
    assert_eq!(names, vec!["bb.txt", "bbc.txt"]);
    assert_eq!(results[0].full_path, "C:\\dir\\bb.txt");
}

#[test]
fn empty_query_answers_immediately() {
    let tmp = tempfile::tempdir().unwrap();
    let mut service = FileSearchService::new(sample_volume(), tmp.path().join("search.idx"));
    let (tx, rx) = mpsc::channel();
    service.search(
        "",
        Box::new(move |results, complete| {
            tx.send((results.len(), complete)).unwrap();
        }),
    );
    assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), (0, true));
}

#[test]
fn search_before_index_ready_returns_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let mut service = FileSearchService::new(sample_volume(), tmp.path().join("search.idx"));
    // No indexing started: the shared index is absent.
    let (tx, rx) = mpsc::channel();
    service.search(
        "bb",
        Box::new(move |results, complete| {
            tx.send((results.len(), complete)).unwrap();
        }),
    );
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), (0, true));
}

#[test]
fn newer_search_supersedes_older() {
    let tmp = tempfile::tempdir().unwrap();
    let mut service = FileSearchService::new(sample_volume(), tmp.path().join("search.idx"));
    service.start_indexing();
    wait_until(10, || service.is_index_ready() && !service.is_indexing());

    // Launch two queries back to back; each callback reports its query.
    let (tx, rx) = mpsc::channel();
    let tx1 = tx.clone();
    service.search(
        "bbc",
        Box::new(move |results, _| {
            tx1.send(("bbc", results.len())).unwrap();
        }),
    );
    service.search(
        "bb",
        Box::new(move |results, _| {
            tx.send(("bb", results.len())).unwrap();
        }),
    );

    // The winning query always delivers exactly once.
    let mut deliveries = Vec::new();
    while let Ok(delivery) = rx.recv_timeout(Duration::from_secs(5)) {
        deliveries.push(delivery);
        if deliveries.iter().any(|(q, _)| *q == "bb") {
            break;
        }
    }
    assert!(deliveries.contains(&("bb", 2)));
    assert!(deliveries.len() <= 2, "no callback may fire twice");
}

#[test]
fn second_start_reuses_index_incrementally() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("search.idx");
    let volume = sample_volume();

    let mut first = FileSearchService::new(Arc::clone(&volume) as _, path.clone());
    first.start_indexing();
    wait_until(10, || first.is_index_ready() && !first.is_indexing());
    drop(first);

    volume.create(file(20, 2, "fresh.rs"));

    let mut second = FileSearchService::new(volume, path);
    second.start_indexing();
    wait_until(10, || second.is_index_ready() && !second.is_indexing());
    assert_eq!(second.indexed_count(), 5);

    let (tx, rx) = mpsc::channel();
    second.search(
        "fresh",
        Box::new(move |results, _| {
            tx.send(results.len()).unwrap();
        }),
    );
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 1);
}

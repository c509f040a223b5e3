//! Ordering and overflow behaviour of the buffered watcher queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use camino::Utf8PathBuf;
use dz_core::WatchTarget;
use dz_watcher::{BufferedWatcher, ChangeEvent, ManualSource, WatchError};
use parking_lot::Mutex;
use tempfile::TempDir;

fn canonical_root(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().canonicalize().unwrap()).unwrap()
}

fn target(dir: &TempDir) -> WatchTarget {
    WatchTarget::new(canonical_root(dir)).replay_existing(false)
}

async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn burst_below_capacity_is_delivered_in_order() {
    const N: usize = 200;

    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    let source = ManualSource::new();
    let handle = source.handle();
    let mut watcher = BufferedWatcher::with_source(target(&dir), N + 1, source).unwrap();

    let seen = Arc::new(Mutex::new(Vec::with_capacity(N)));
    let sink = Arc::clone(&seen);
    watcher.subscribe(move |event| {
        // Slower than the producer so the queue actually fills up.
        std::thread::sleep(Duration::from_micros(200));
        sink.lock().push(event.path.clone());
        Ok(())
    });
    let overflowed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&overflowed);
    watcher.subscribe_errors(move |err| {
        if err.is_overflow() {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    watcher.start().unwrap();
    let expected: Vec<_> = (0..N).map(|i| root.join(format!("order-{i:04}.json"))).collect();
    for path in &expected {
        handle.emit_created(path.clone()).unwrap();
    }

    assert!(eventually(|| seen.lock().len() == N).await);
    watcher.stop().await;

    assert_eq!(*seen.lock(), expected);
    assert_eq!(overflowed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn overflow_is_raised_once_per_rejected_event() {
    const CAPACITY: usize = 4;
    const EXTRA: usize = 3;

    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    let events: Vec<_> = (0..CAPACITY + EXTRA)
        .map(|i| ChangeEvent::created(root.join(format!("{i}.json"))))
        .collect();
    let mut watcher =
        BufferedWatcher::with_source(target(&dir), CAPACITY, ManualSource::with_events(events)).unwrap();

    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&delivered);
    watcher.subscribe(move |event| {
        sink.lock().push(event.path.clone());
        Ok(())
    });
    let rejected = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&rejected);
    watcher.subscribe_errors(move |err| {
        if let WatchError::Overflow { capacity, path } = err {
            assert_eq!(*capacity, CAPACITY);
            sink.lock().push(path.clone());
        }
    });

    watcher.start().unwrap();
    assert!(eventually(|| delivered.lock().len() == CAPACITY).await);
    watcher.stop().await;

    // Every event is either delivered or named in an overflow error.
    let delivered = delivered.lock();
    let rejected = rejected.lock();
    assert_eq!(rejected.len(), EXTRA);
    assert_eq!(delivered.len() + rejected.len(), CAPACITY + EXTRA);
    assert!(rejected.iter().all(|p| !delivered.contains(p)));

    let stats = watcher.stats();
    assert_eq!(stats.overflowed, EXTRA as u64);
    assert_eq!(stats.enqueued, CAPACITY as u64);
}

#[tokio::test]
async fn panicking_handler_is_contained() {
    let dir = TempDir::new().unwrap();
    let root = canonical_root(&dir);
    let events = [
        ChangeEvent::created(root.join("first.json")),
        ChangeEvent::created(root.join("second.json")),
    ];
    let mut watcher =
        BufferedWatcher::with_source(target(&dir), 8, ManualSource::with_events(events)).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    watcher.subscribe(move |event| {
        counter.fetch_add(1, Ordering::SeqCst);
        assert!(!event.path.as_str().ends_with("first.json"), "refusing first");
        Ok(())
    });
    let handler_errors = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&handler_errors);
    watcher.subscribe_errors(move |err| {
        if matches!(err, WatchError::Handler { .. }) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    watcher.start().unwrap();
    assert!(eventually(|| calls.load(Ordering::SeqCst) == 2).await);
    watcher.stop().await;

    assert_eq!(handler_errors.load(Ordering::SeqCst), 1);
}

//! Concurrency properties of the gate and the relocator.

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use camino::Utf8PathBuf;
use dz_bus::{
    AccessPolicy, AgentMessage, Dispatch, HandlerError, Orchestrator, OrchestratorOptions,
    ProjectArchive, ProjectDocument, RequestHandler, move_to_directory,
};
use dz_core::{DropLayout, ProcessingOutcome};
use dz_watcher::ChangeEvent;
use tempfile::TempDir;

#[test]
fn concurrent_moves_of_same_name_keep_both_files() {
    let dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let target = root.join("done");

    let sources: Vec<_> = (0..8)
        .map(|i| {
            let sub = root.join(format!("producer-{i}"));
            fs::create_dir_all(&sub).unwrap();
            let path = sub.join("order.json");
            fs::write(&path, format!("payload {i}")).unwrap();
            path
        })
        .collect();

    let handles: Vec<_> = sources
        .into_iter()
        .map(|source| {
            let target = target.clone();
            std::thread::spawn(move || move_to_directory(&source, &target).unwrap())
        })
        .collect();
    let mut moved: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    moved.sort();
    moved.dedup();

    assert_eq!(moved.len(), 8);
    assert!(target.join("order.json").is_file());
    assert!(target.join("order (1).json").is_file());
    let mut contents: Vec<_> = moved.iter().map(|p| fs::read_to_string(p).unwrap()).collect();
    contents.sort();
    contents.dedup();
    assert_eq!(contents.len(), 8, "no file was overwritten");
}

/// Records how many handler calls overlap.
#[derive(Default)]
struct Overlap {
    current: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

struct Counting(Arc<Overlap>);

impl RequestHandler for Counting {
    async fn handle_message(&self, _message: AgentMessage) -> Result<Dispatch, HandlerError> {
        let now = self.0.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.0.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.0.current.fetch_sub(1, Ordering::SeqCst);
        self.0.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Dispatch::Handled(None))
    }

    async fn handle_project(
        &self,
        _project: ProjectDocument,
        _archive: ProjectArchive,
    ) -> Result<Dispatch, HandlerError> {
        Ok(Dispatch::Skipped)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn gate_bounds_concurrent_handlers() {
    const SLOTS: usize = 2;
    const FILES: usize = 24;

    let dir = TempDir::new().unwrap();
    let layout = DropLayout::new(Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap());
    layout.ensure().unwrap();
    let counting = Arc::new(Overlap::default());
    let orchestrator = Orchestrator::new(
        Counting(Arc::clone(&counting)),
        OrchestratorOptions {
            layout: layout.clone(),
            access: AccessPolicy::default(),
            concurrency: SLOTS,
        },
    );

    let tasks: Vec<_> = (0..FILES)
        .map(|i| {
            let path = layout.output_dir().join(format!("{i}.json"));
            fs::write(&path, r#"{"messageType":"RequestArticlesSyncMessage"}"#).unwrap();
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.process(&ChangeEvent::created(path)).await })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap(), ProcessingOutcome::Success);
    }

    assert_eq!(counting.calls.load(Ordering::SeqCst), FILES);
    assert!(counting.peak.load(Ordering::SeqCst) <= SLOTS);
    assert!(orchestrator.gate().peak_in_flight() <= SLOTS);
    assert_eq!(orchestrator.gate().in_flight(), 0);
}

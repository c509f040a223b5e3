//! Per-file state machine from change event to terminal outcome.
//!
//! # Pipeline
//!
//! ```text
//! arrival ─► claim ─► gate ─► wait accessible ─► classify ─► dispatch ─► respond ─► relocate
//!   │          │        │            │               │            │
//!   │          │        │            │               │            └─ Skipped: file stays
//!   │          │        │            └─ fatal open error ─────────────────────► error/
//!   │          │        └─ shutting down: Skipped
//!   │          └─ already claimed: Skipped
//!   └─ not an arrival, or already in done/ or error/: ignored
//! ```
//!
//! Any error after the gate maps to [`ProcessingOutcome::Failure`] and moves
//! the file (and its companion archive) to `error/`; success moves them to
//! `done/`. A relocation error turns the outcome into a failure even if the
//! handler succeeded.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use dz_core::layout::is_terminal_path;
use dz_core::{DropLayout, FxHashSet, ProcessingOutcome};
use dz_watcher::{ChangeEvent, EventPolicy, HandlerResult};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::access::{AccessPolicy, wait_accessible};
use crate::archive::ProjectArchive;
use crate::error::{AccessError, ProcessError};
use crate::gate::ConcurrencyGate;
use crate::handler::{Dispatch, RequestHandler};
use crate::message::{AgentMessage, ProjectDocument};
use crate::relocate::move_to_directory;
use crate::respond::ResponseWriter;

/// Extension of the companion archive that turns a request into a project export.
pub const ARCHIVE_EXTENSION: &str = "zip";

/// How a request file is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// `<stem>.json` with a `<stem>.zip` next to it.
    Project {
        /// The companion archive.
        archive: Utf8PathBuf,
    },
    /// A standalone message envelope.
    Message,
}

/// Classifies `path` by looking for a companion archive next to it.
#[must_use]
pub fn classify(path: &Utf8Path) -> Classification {
    let archive = path.with_extension(ARCHIVE_EXTENSION);
    if archive != path && archive.is_file() {
        Classification::Project { archive }
    } else {
        Classification::Message
    }
}

/// Settings the orchestrator needs besides its handler.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Drop-zone layout; responses go to the `Input/` matching each request.
    pub layout: DropLayout,
    /// Retry schedule for locked files.
    pub access: AccessPolicy,
    /// Gate size; zero is treated as one.
    pub concurrency: usize,
}

/// Turns file arrivals into outcomes.
///
/// Cloning shares the same gate, claim set and task tracker.
pub struct Orchestrator<H: RequestHandler> {
    inner: Arc<Inner<H>>,
}

impl<H: RequestHandler> Clone for Orchestrator<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: RequestHandler> std::fmt::Debug for Orchestrator<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("root", &self.inner.layout.root())
            .field("gate", &self.inner.gate)
            .field("claimed", &self.inner.claims.lock().len())
            .field("tasks", &self.inner.tracker.len())
            .finish_non_exhaustive()
    }
}

struct Inner<H> {
    handler: H,
    layout: DropLayout,
    access: AccessPolicy,
    gate: ConcurrencyGate,
    claims: Mutex<FxHashSet<Utf8PathBuf>>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl<H: RequestHandler> Orchestrator<H> {
    /// Creates an orchestrator dispatching to `handler`.
    pub fn new(handler: H, options: OrchestratorOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                handler,
                gate: ConcurrencyGate::new(options.concurrency),
                layout: options.layout,
                access: options.access,
                claims: Mutex::new(FxHashSet::default()),
                tracker: TaskTracker::new(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Runs the whole pipeline for one event and returns its outcome.
    pub async fn process(&self, event: &ChangeEvent) -> ProcessingOutcome {
        self.inner.process(event).await
    }

    /// Returns the concurrency gate.
    #[must_use]
    pub fn gate(&self) -> &ConcurrencyGate {
        &self.inner.gate
    }

    /// Returns the handler.
    #[must_use]
    pub fn handler(&self) -> &H {
        &self.inner.handler
    }

    /// Stops accepting events and waits for in-flight ones.
    ///
    /// Files still waiting for the gate or for a lock are left in place
    /// (skipped); files already being handled run to completion.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.gate.close();
        self.inner.tracker.close();
        tracing::info!(in_flight = self.inner.tracker.len(), "Waiting for in-flight files");
        self.inner.tracker.wait().await;
    }
}

impl<H: RequestHandler> EventPolicy for Orchestrator<H> {
    fn on_event(&self, event: &ChangeEvent) -> HandlerResult {
        if !event.is_arrival() || self.inner.cancel.is_cancelled() {
            return Ok(());
        }
        let inner = Arc::clone(&self.inner);
        let event = event.clone();
        self.inner.tracker.spawn(async move {
            inner.process(&event).await;
        });
        Ok(())
    }
}

/// Removes a path from the claim set when processing ends, however it ends.
struct Claim<'a> {
    claims: &'a Mutex<FxHashSet<Utf8PathBuf>>,
    path: Utf8PathBuf,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.claims.lock().remove(&self.path);
    }
}

impl<H: RequestHandler> Inner<H> {
    fn claim(&self, path: &Utf8Path) -> Option<Claim<'_>> {
        self.claims.lock().insert(path.to_owned()).then(|| Claim {
            claims: &self.claims,
            path: path.to_owned(),
        })
    }

    async fn process(&self, event: &ChangeEvent) -> ProcessingOutcome {
        let path = event.path.as_path();
        if !event.is_arrival() || is_terminal_path(path) {
            return ProcessingOutcome::Skipped;
        }

        let Some(_claim) = self.claim(path) else {
            tracing::debug!(path = %path, kind = %event.kind, "Already being processed");
            return ProcessingOutcome::Skipped;
        };

        let permit = tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            permit = self.gate.acquire() => permit,
        };
        let Some(_permit) = permit else {
            return ProcessingOutcome::Skipped;
        };

        if !path.is_file() {
            // A duplicate of an event whose file has already been moved.
            tracing::debug!(path = %path, kind = %event.kind, "File no longer present");
            return ProcessingOutcome::Skipped;
        }

        // The companion archive may land while the producer still holds the
        // document, so classification waits for the lock to clear.
        let access = wait_accessible(path, &self.access, &self.cancel).await;
        let classification = classify(path);
        let result = match access {
            Ok(retries) => {
                tracing::debug!(path = %path, retries, "File accessible");
                self.handle(path, &classification).await
            }
            Err(error) => Err(error.into()),
        };

        let outcome = match result {
            Ok(Dispatch::Skipped) => {
                tracing::info!(path = %path, kind = %event.kind, "Not handled, leaving in place");
                return ProcessingOutcome::Skipped;
            }
            Ok(Dispatch::Handled(_)) => ProcessingOutcome::Success,
            Err(ProcessError::Access(AccessError::NotFound(_) | AccessError::Cancelled(_))) => {
                return ProcessingOutcome::Skipped;
            }
            Err(error) => {
                tracing::error!(path = %path, kind = %event.kind, error = %error, "Processing failed");
                ProcessingOutcome::Failure
            }
        };

        let outcome = match self.relocate(path, &classification, outcome).await {
            Ok(()) => outcome,
            Err(error) => {
                tracing::error!(path = %path, error = %error, "Relocation failed");
                ProcessingOutcome::Failure
            }
        };

        tracing::info!(path = %path, kind = %event.kind, outcome = %outcome, "Processed file");
        outcome
    }

    async fn handle(&self, path: &Utf8Path, classification: &Classification) -> Result<Dispatch, ProcessError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ProcessError::Read {
            path: path.to_owned(),
            source,
        })?;
        let parse_error = |source| ProcessError::Parse {
            path: path.to_owned(),
            source,
        };

        let dispatch = match classification {
            Classification::Project { archive: archive_path } => {
                let project: ProjectDocument = serde_json::from_slice(&bytes).map_err(parse_error)?;
                tracing::info!(path = %path, project_id = %project.id, "Project document read");

                let retries = wait_accessible(archive_path, &self.access, &self.cancel).await?;
                tracing::debug!(path = %archive_path, retries, "Archive accessible");

                let owned = archive_path.clone();
                let archive = tokio::task::spawn_blocking(move || ProjectArchive::read(&owned))
                    .await?
                    .map_err(|source| ProcessError::Archive {
                        path: archive_path.clone(),
                        source,
                    })?;
                self.handler.handle_project(project, archive).await?
            }
            Classification::Message => {
                let message: AgentMessage = serde_json::from_slice(&bytes).map_err(parse_error)?;
                tracing::debug!(path = %path, message_type = message.message_type(), "Message decoded");
                self.handler.handle_message(message).await?
            }
        };

        if let Dispatch::Handled(Some(response)) = &dispatch {
            let writer = ResponseWriter::new(self.layout.input_dir_for(path));
            let dir = writer.dir().to_owned();
            let response = response.clone();
            tokio::task::spawn_blocking(move || writer.write(&response))
                .await?
                .map_err(|source| ProcessError::Respond { dir, source })?;
        }

        Ok(dispatch)
    }

    async fn relocate(
        &self,
        path: &Utf8Path,
        classification: &Classification,
        outcome: ProcessingOutcome,
    ) -> Result<(), ProcessError> {
        let target = match outcome {
            ProcessingOutcome::Success => self.layout.done_dir_for(path),
            ProcessingOutcome::Failure => self.layout.error_dir_for(path),
            ProcessingOutcome::Skipped => return Ok(()),
        };

        let mut files = vec![path.to_owned()];
        if let Classification::Project { archive } = classification {
            files.push(archive.clone());
        }

        tokio::task::spawn_blocking(move || {
            // Attempt every file even if an earlier one fails, then report the first error.
            let mut first_error = None;
            for file in &files {
                if let Err(error) = move_to_directory(file, &target) {
                    tracing::warn!(path = %file, target = %target, error = %error, "Could not relocate");
                    first_error.get_or_insert(error);
                }
            }
            first_error.map_or(Ok(()), Err)
        })
        .await?
        .map_err(ProcessError::from)
    }
}

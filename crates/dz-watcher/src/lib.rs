//! Buffered directory watching with a bounded, ordered event queue.
//!
//! This crate turns raw operating-system change notifications into an
//! ordered stream of [`ChangeEvent`]s delivered to subscribers from a single
//! drain loop per watched directory.
//!
//! # Overview
//!
//! The dz-watcher crate is designed to:
//!
//! - Absorb notification bursts into a bounded queue without ever blocking
//!   the notification thread
//! - Raise a distinct [`WatchError::Overflow`] when the queue is full, since
//!   lost events cannot be caught up
//! - Replay files already present at start as [`ChangeKind::Existing`] events,
//!   optionally oldest first
//! - Keep handler failures contained to the event that caused them
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ WatcherService<P: EventPolicy>                                │
//! │                                                               │
//! │  BufferedWatcher ──► ChangeSource (NotifySource | Manual...)  │
//! │       │                     │ EventSink::push (try_send)      │
//! │       │                     ▼                                 │
//! │       │              bounded mpsc queue                       │
//! │       │                     │                                 │
//! │       └──── drain loop ◄────┘  replay first, then FIFO        │
//! │                 │                                             │
//! │                 ▼                                             │
//! │           P::on_event / error channel ─► WatchFault (overflow)│
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Crate Dependencies
//!
//! ```text
//! dz-cli ──► dz-bus ──► dz-watcher ──► dz-core
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dz_core::WatchTarget;
//! use dz_watcher::{ChangeEvent, EventPolicy, HandlerResult, WatcherService};
//!
//! struct Print;
//!
//! impl EventPolicy for Print {
//!     fn on_event(&self, event: &ChangeEvent) -> HandlerResult {
//!         println!("{} {}", event.kind, event.path);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut service: WatcherService<Print> = WatcherService::new(Arc::new(Print), 4096);
//!     service.add_watch(WatchTarget::new("/srv/drop/Output"))?;
//!     service.start()?;
//!
//!     tokio::select! {
//!         _ = tokio::signal::ctrl_c() => {}
//!         fault = service.next_fault() => eprintln!("{fault:?}"),
//!     }
//!
//!     service.stop().await;
//!     Ok(())
//! }
//! ```

mod buffered;
mod error;
mod events;
mod filter;
mod notify_source;
mod queue;
mod replay;
mod service;
mod source;
mod subscribers;

pub use buffered::BufferedWatcher;
pub use error::{WatchError, WatchFault};
pub use events::{ChangeEvent, ChangeKind};
pub use filter::{AcceptAllFilter, FileFilter, GlobFilter};
pub use notify_source::NotifySource;
pub use queue::{EventSink, WatcherStats, WatcherStatsSnapshot};
pub use replay::existing_files;
pub use service::{EventPolicy, WatcherService};
pub use source::{ChangeSource, ManualHandle, ManualSource};
pub use subscribers::{HandlerError, HandlerResult};

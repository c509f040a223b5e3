//! File-drop orchestration on top of the buffered watcher.
//!
//! This crate decides what happens to a file once the watcher reports it:
//! it bounds concurrent work, waits for producers to release their files,
//! decodes and dispatches requests, writes responses, and moves every
//! processed file into a `done/` or `error/` directory next to it.
//!
//! # Architecture
//!
//! ```text
//! WatcherService ──on_event──► Orchestrator (EventPolicy)
//!                                 │ spawn per arrival (TaskTracker)
//!                                 ▼
//!             claim ─► ConcurrencyGate ─► wait_accessible
//!                                             │
//!                           classify ◄────────┘
//!                  ┌────────────┴─────────────┐
//!          *.json + *.zip                  *.json
//!        ProjectDocument +               AgentMessage
//!         ProjectArchive                      │
//!                  └──────► RequestHandler ◄──┘
//!                                 │ Dispatch::Handled(Some(response))
//!                                 ▼
//!                 ResponseWriter (Input/<uuid>.json)
//!                                 │
//!                                 ▼
//!                move_to_directory (done/ | error/)
//! ```
//!
//! # Crate Dependencies
//!
//! ```text
//! dz-cli ──► dz-bus ──► dz-watcher ──► dz-core
//!                  └──────────────────►
//! ```

mod access;
mod archive;
mod error;
mod gate;
mod handler;
mod message;
mod orchestrator;
mod relocate;
mod respond;

pub use access::{AccessPolicy, wait_accessible};
pub use archive::{ArchiveEntry, ProjectArchive};
pub use error::{AccessError, HandlerError, ProcessError, RelocateError};
pub use gate::{ConcurrencyGate, GatePermit};
pub use handler::{Dispatch, IntegrationHandlers, RequestHandler};
pub use message::{
    AdditionalCostsResponse, AddressBookSyncRequest, AddressBookSyncResponse, AgentMessage,
    AgentResponse, Article, ArticlesSyncRequest, ArticlesSyncResponse, BillOfMaterials, BomEntry,
    BomItemRef, EventLog, EventLogLevel, ExportItemResult, ExportToErpResponse, PartTypeRef,
    PartTypeStepRequest, PartyArticleNumbers, ProductionTimeResponse, ProjectDocument,
    ProjectStatusChanged, Relation, ScalePrice, SellingBuyingPartyArticleRequest,
    SellingBuyingPartyArticleResponse,
};
pub use orchestrator::{ARCHIVE_EXTENSION, Classification, Orchestrator, OrchestratorOptions, classify};
pub use relocate::move_to_directory;
pub use respond::ResponseWriter;

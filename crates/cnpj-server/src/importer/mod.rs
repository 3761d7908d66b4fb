//! Background CNPJ import
//!
//! One sequential run at a time: walk the candidate list from the source
//! table, skip identifiers already in the destination table, fetch the rest
//! from the registry API and persist them, pausing between API calls.
//!
//! The runner is generic over the store, the API client and the pacing
//! policy, and reports through an event sink.

pub mod api;
pub mod controller;
pub mod events;
pub mod pacing;
pub mod runner;
pub mod store;

pub use api::{ApiError, CompanyRecord, RegistryApi};
pub use controller::{RunController, ToggleOutcome};
pub use events::{EventBus, EventSink, ImportEvent, ProgressSnapshot};
pub use pacing::{FixedDelay, Pacer};
pub use runner::{ImportRunner, RunOutcome};
pub use store::{ImportStore, PgImportStore};

use thiserror::Error;

/// Failures that abort a run.
///
/// Nothing is retried and nothing is converted to a per-item skip; the
/// task boundary turns these into an `error` event and an aborted status.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("registry API error: {0}")]
    Api(#[from] ApiError),

    #[error("invalid stored identifier: {0}")]
    InvalidRow(#[from] cnpj_common::CnpjError),
}

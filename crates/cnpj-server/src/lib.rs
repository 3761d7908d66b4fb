//! CNPJ Importer Server Library
//!
//! HTTP server that imports company records for a list of CNPJ
//! identifiers and streams live progress to the browser.
//!
//! # Overview
//!
//! - **Importer**: a single sequential background run that walks the
//!   candidate list, skips identifiers already imported, fetches the rest
//!   from the public registry API, and persists them with a fixed pacing
//!   delay between calls.
//! - **Control surface**: `POST /start` toggles the run (a second request
//!   while a run is active stops it).
//! - **Live feed**: `GET /events` streams `progress`, `log`, `status` and
//!   `error` events over SSE to the UI page served at `/`.
//!
//! # Framework Stack
//!
//! - **Axum**: HTTP routing and SSE
//! - **SQLx**: PostgreSQL pool and queries
//! - **reqwest**: registry API client
//! - **tracing**: structured logging

pub mod config;
pub mod error;
pub mod importer;
pub mod middleware;
pub mod routes;

// Re-export commonly used types
pub use error::AppError;

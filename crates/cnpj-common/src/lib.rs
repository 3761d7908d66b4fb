//! CNPJ Importer Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the CNPJ importer.
//!
//! # Overview
//!
//! This crate provides functionality used across the workspace:
//!
//! - **Error Handling**: Custom error and result types
//! - **Logging**: Centralized tracing configuration
//! - **Types**: The [`Cnpj`](types::Cnpj) identifier newtype
//!
//! # Example
//!
//! ```no_run
//! use cnpj_common::{Result, types::Cnpj};
//!
//! fn normalize(raw: &str) -> Result<Cnpj> {
//!     let cnpj = Cnpj::parse(raw)?;
//!     Ok(cnpj)
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CnpjError, Result};

//! # testledger-core
//!
//! Core types shared by the testledger crates.
//!
//! This crate provides:
//! - Error types and the `LedgerResult` alias
//! - Process-wide configuration (credential locations, API endpoint, pacing)
//! - Cell range addressing in A1 notation

/// Process-wide configuration.
pub mod config;
/// Error types and result aliases.
pub mod error;
/// Cell range addressing.
pub mod range;

/// Re-export configuration types.
pub use config::{Config, Pacing};
/// Re-export core error types.
pub use error::{LedgerError, LedgerResult};
/// Re-export range addressing.
pub use range::{column_index_to_letters, column_letters_to_index, CellRange};

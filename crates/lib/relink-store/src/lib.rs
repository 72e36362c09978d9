//! Data model and naming helpers for delpher-relink.
//!
//! This crate defines the records, statuses and run reports shared by the
//! parsers, the control plane and the CLI.

pub mod models;
pub mod schema;

pub use models::*;

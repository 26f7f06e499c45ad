//! Core domain types for the deckpress ingestion pipeline.
//!
//! This crate holds the shared vocabulary of the pipeline: the job record and
//! its status machine, the parsed-document model, the validation report, the
//! output manifest, the unified error taxonomy, and environment-driven
//! configuration. It deliberately has no I/O beyond reading the environment;
//! all filesystem and subprocess work lives in `deckpress-processing` and
//! `deckpress-worker`.

pub mod config;
pub mod error;
pub mod models;

pub use config::PipelineConfig;
pub use error::{LogLevel, PipelineError};

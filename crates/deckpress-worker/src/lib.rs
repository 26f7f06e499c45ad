//! Job execution for the deckpress ingestion pipeline.
//!
//! [`JobStore`] accepts uploads, enforces the input ceiling before any
//! processing, and runs each job on its own task under a concurrency
//! semaphore. [`IngestPipeline`] wires the processing stages together:
//! validate, then parse and convert in parallel, then assemble. Jobs never
//! share working directories; the binary-path cache inside the renderer is
//! the only cross-job state.

pub mod pipeline;
pub mod store;

pub use pipeline::IngestPipeline;
pub use store::JobStore;

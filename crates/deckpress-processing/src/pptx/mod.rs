//! Container parsing: validated ZIP+XML presentation -> `ParsedDocument`.
//!
//! Only callable behind a passing validation report. Individual part reads
//! are bounded by a byte ceiling and a wall-clock deadline; a bad slide part
//! is recorded and skipped, it never fails the document.

mod package;
mod parser;
mod rels;
mod slide;
mod theme;

pub use package::{PartLimits, PartReadError, PptxPackage};
pub use parser::{ContainerParser, ParserLimits};
pub use rels::{parse_relationships, resolve_target, Relationship};

/// Required top-level parts. Absence of either is a hard parse failure.
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const PRESENTATION_PART: &str = "ppt/presentation.xml";

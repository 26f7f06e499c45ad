//! Error types module
//!
//! All pipeline failures are unified under the [`PipelineError`] enum. Each
//! variant self-describes how it should be reported: a stable machine-readable
//! code, whether the input (rather than the service) is at fault, whether the
//! failure is recoverable within the current job, and the log level it should
//! be emitted at.

use std::io;

use crate::models::validation::LimitViolation;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like rejected uploads
    Debug,
    /// Warning level - for recoverable issues like a skipped slide part
    Warn,
    /// Error level - for unexpected failures
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Input too large: {size} bytes (max: {max} bytes)")]
    InputTooLarge { size: u64, max: u64 },

    #[error("Malformed archive: {0}")]
    MalformedArchive(String),

    #[error("Security limit exceeded: {}", summarize_violations(.violations))]
    SecurityLimitExceeded { violations: Vec<LimitViolation> },

    #[error("Required part missing from container: {part}")]
    RequiredPartMissing { part: String },

    #[error("Part parse aborted: {part} ({reason})")]
    PartParseTimeout { part: String, reason: String },

    #[error("Document converter not found: {0}")]
    ConverterNotFound(String),

    #[error("Conversion timed out after {seconds}s")]
    ConversionTimeout { seconds: u64 },

    #[error("Converter exited with {}: {stderr}", describe_status(.status))]
    ConversionProcessFailed {
        status: Option<i32>,
        stderr: String,
    },

    #[error("Rasterizer not found: {0}")]
    RasterizerNotFound(String),

    #[error("Rasterization failed with {}: {stderr}", describe_status(.status))]
    RasterizationFailed {
        status: Option<i32>,
        stderr: String,
    },

    #[error("Conversion produced no output")]
    NoOutputProduced,

    #[error("Internal error: {0}")]
    Internal(String),
}

fn summarize_violations(violations: &[LimitViolation]) -> String {
    match violations.first() {
        Some(first) if violations.len() == 1 => first.to_string(),
        Some(first) => format!("{} (+{} more)", first, violations.len() - 1),
        None => "unspecified limit".to_string(),
    }
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (killed)".to_string(),
    }
}

impl From<io::Error> for PipelineError {
    fn from(err: io::Error) -> Self {
        PipelineError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Internal(format!("JSON error: {}", err))
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Internal(format!("{:#}", err))
    }
}

impl PipelineError {
    /// Stable machine-readable code, recorded on the job and surfaced to callers.
    pub fn error_code(&self) -> &'static str {
        match self {
            PipelineError::InputTooLarge { .. } => "INPUT_TOO_LARGE",
            PipelineError::MalformedArchive(_) => "MALFORMED_ARCHIVE",
            PipelineError::SecurityLimitExceeded { .. } => "SECURITY_LIMIT_EXCEEDED",
            PipelineError::RequiredPartMissing { .. } => "REQUIRED_PART_MISSING",
            PipelineError::PartParseTimeout { .. } => "PART_PARSE_TIMEOUT",
            PipelineError::ConverterNotFound(_) => "CONVERTER_NOT_FOUND",
            PipelineError::ConversionTimeout { .. } => "CONVERSION_TIMEOUT",
            PipelineError::ConversionProcessFailed { .. } => "CONVERSION_PROCESS_FAILED",
            PipelineError::RasterizerNotFound(_) => "RASTERIZER_NOT_FOUND",
            PipelineError::RasterizationFailed { .. } => "RASTERIZATION_FAILED",
            PipelineError::NoOutputProduced => "NO_OUTPUT_PRODUCED",
            PipelineError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True when the uploaded input is at fault and retrying the same bytes
    /// cannot succeed. Maps to an "unprocessable input" signal at the API
    /// boundary, as opposed to an internal/server failure.
    pub fn is_unprocessable_input(&self) -> bool {
        matches!(
            self,
            PipelineError::InputTooLarge { .. }
                | PipelineError::MalformedArchive(_)
                | PipelineError::SecurityLimitExceeded { .. }
                | PipelineError::RequiredPartMissing { .. }
        )
    }

    /// True when the failure is local to one part/slide and the job continues.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PipelineError::PartParseTimeout { .. })
    }

    pub fn log_level(&self) -> LogLevel {
        match self {
            PipelineError::InputTooLarge { .. }
            | PipelineError::MalformedArchive(_)
            | PipelineError::SecurityLimitExceeded { .. }
            | PipelineError::RequiredPartMissing { .. } => LogLevel::Debug,
            PipelineError::PartParseTimeout { .. } => LogLevel::Warn,
            PipelineError::ConverterNotFound(_)
            | PipelineError::ConversionTimeout { .. }
            | PipelineError::ConversionProcessFailed { .. }
            | PipelineError::RasterizerNotFound(_)
            | PipelineError::RasterizationFailed { .. }
            | PipelineError::NoOutputProduced
            | PipelineError::Internal(_) => LogLevel::Error,
        }
    }
}

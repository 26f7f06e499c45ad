//! Conversion job record and status machine.
//!
//! A job is created when an upload is accepted and is mutated only by the
//! pipeline stage that currently owns it. Status moves strictly forward:
//! queued -> validating -> parsing -> converting -> completed | failed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use super::validation::ValidationReport;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Validating,
    Parsing,
    Converting,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Validating => write!(f, "validating"),
            JobStatus::Parsing => write!(f, "parsing"),
            JobStatus::Converting => write!(f, "converting"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "validating" => Ok(JobStatus::Validating),
            "parsing" => Ok(JobStatus::Parsing),
            "converting" => Ok(JobStatus::Converting),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Validation,
    Parsing,
    Conversion,
    Assembly,
}

impl Display for JobStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobStage::Validation => write!(f, "validation"),
            JobStage::Parsing => write!(f, "parsing"),
            JobStage::Conversion => write!(f, "conversion"),
            JobStage::Assembly => write!(f, "assembly"),
        }
    }
}

/// Failure record carried by a failed job: enough to diagnose without
/// re-running (stage, stable code, human detail such as tool stderr).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFailure {
    pub stage: JobStage,
    pub code: String,
    pub detail: String,
    /// True when the uploaded input is at fault (client-attributable).
    pub unprocessable_input: bool,
}

/// One ingestion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionJob {
    pub id: Uuid,
    pub source_file: String,
    pub output_dir: PathBuf,
    pub status: JobStatus,
    pub slide_count: Option<usize>,
    pub error: Option<JobFailure>,
    /// Audit record of the validation pass, kept on the job.
    pub validation: Option<ValidationReport>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub validated_at: Option<DateTime<Utc>>,
    pub parsed_at: Option<DateTime<Utc>>,
    pub converted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ConversionJob {
    pub fn new(id: Uuid, source_file: String, output_dir: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            id,
            source_file,
            output_dir,
            status: JobStatus::Queued,
            slide_count: None,
            error: None,
            validation: None,
            created_at: now,
            updated_at: now,
            validated_at: None,
            parsed_at: None,
            converted_at: None,
            completed_at: None,
        }
    }

    /// Advance the status, stamping the stage-completion timestamp implied by
    /// leaving the previous stage.
    pub fn advance(&mut self, status: JobStatus) {
        let now = Utc::now();
        match (self.status, status) {
            (JobStatus::Validating, JobStatus::Parsing) => self.validated_at = Some(now),
            (JobStatus::Parsing, JobStatus::Converting) => self.parsed_at = Some(now),
            (JobStatus::Converting, JobStatus::Completed) => {
                self.converted_at = Some(now);
                self.completed_at = Some(now);
            }
            _ => {}
        }
        if status == JobStatus::Completed || status == JobStatus::Failed {
            self.completed_at = Some(now);
        }
        self.status = status;
        self.updated_at = now;
    }

    pub fn fail(&mut self, stage: JobStage, code: &str, detail: String, unprocessable: bool) {
        self.error = Some(JobFailure {
            stage,
            code: code.to_string(),
            detail,
            unprocessable_input: unprocessable,
        });
        self.advance(JobStatus::Failed);
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Status-query response shape for the (external) API layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub slide_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ConversionJob> for JobStatusResponse {
    fn from(job: &ConversionJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            slide_count: job.slide_count,
            error: job
                .error
                .as_ref()
                .map(|e| format!("{} ({}): {}", e.stage, e.code, e.detail)),
        }
    }
}

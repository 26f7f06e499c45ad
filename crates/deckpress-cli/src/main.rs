//! deckpress command-line interface.
//!
//! `deckpress ingest <file>` runs the full pipeline locally and prints the
//! manifest path; `deckpress inspect <file>` prints the security validation
//! report without parsing or converting anything.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use deckpress_core::models::JobStatus;
use deckpress_core::PipelineConfig;
use deckpress_worker::{IngestPipeline, JobStore};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "deckpress", about = "Presentation ingestion pipeline", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate, parse, and convert a presentation into images + manifest.
    Ingest {
        /// Path to the presentation file.
        file: PathBuf,
        /// Output root; the job writes into a subdirectory of this.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Job id to use instead of a generated one.
        #[arg(long)]
        job_id: Option<Uuid>,
        /// Seconds to wait for the job before giving up.
        #[arg(long, default_value_t = 300)]
        wait_secs: u64,
    },
    /// Run only the security validation and print the report.
    Inspect {
        /// Path to the presentation file.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = PipelineConfig::from_env()?;
    config.validate()?;

    match cli.command {
        Commands::Ingest {
            file,
            out,
            job_id,
            wait_secs,
        } => {
            if let Some(out) = out {
                config.output_root = out;
            }
            ingest(config, file, job_id, wait_secs).await
        }
        Commands::Inspect { file } => inspect(config, file),
    }
}

async fn ingest(
    config: PipelineConfig,
    file: PathBuf,
    job_id: Option<Uuid>,
    wait_secs: u64,
) -> Result<()> {
    let data = std::fs::read(&file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let source_file = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("presentation.pptx")
        .to_string();

    let pipeline = IngestPipeline::with_external_renderer(&config);
    let store = JobStore::new(&config, pipeline);

    let job_id = store
        .submit_job(Bytes::from(data), &source_file, job_id)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    println!("job {} submitted", job_id);

    let job = store
        .wait_for_terminal(job_id, Duration::from_secs(wait_secs))
        .await
        .context("job did not finish within the wait window")?;

    match job.status {
        JobStatus::Completed => {
            println!(
                "completed: {} slides, manifest at {}",
                job.slide_count.unwrap_or(0),
                job.output_dir.join("manifest.json").display()
            );
            Ok(())
        }
        _ => {
            let detail = job
                .error
                .map(|e| format!("{} ({}): {}", e.stage, e.code, e.detail))
                .unwrap_or_else(|| "unknown failure".to_string());
            anyhow::bail!("job failed: {}", detail)
        }
    }
}

fn inspect(config: PipelineConfig, file: PathBuf) -> Result<()> {
    use deckpress_processing::{SecurityLimits, SecurityValidator};

    let data = std::fs::read(&file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let validator = SecurityValidator::new(SecurityLimits::from(&config));
    match validator.validate(&data) {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.passed {
                Ok(())
            } else {
                anyhow::bail!("validation failed with {} violation(s)", report.violations.len())
            }
        }
        Err(e) => anyhow::bail!("{}", e),
    }
}

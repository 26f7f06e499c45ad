//! In-memory job store and per-job execution.
//!
//! Each submitted job runs on its own tokio task under a concurrency
//! semaphore. Jobs own their output directory exclusively; the store map and
//! the renderer's binary-path cache are the only process-wide state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use deckpress_core::models::{ConversionJob, JobStage, JobStatus, JobStatusResponse};
use deckpress_core::{PipelineConfig, PipelineError};
use deckpress_processing::JobAssembler;
use tokio::sync::{RwLock, Semaphore};
use uuid::Uuid;

use crate::pipeline::IngestPipeline;

pub struct JobStore {
    inner: Arc<Inner>,
}

struct Inner {
    jobs: RwLock<HashMap<Uuid, ConversionJob>>,
    semaphore: Arc<Semaphore>,
    pipeline: Arc<IngestPipeline>,
    output_root: PathBuf,
    accepting: AtomicBool,
}

impl Clone for JobStore {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl JobStore {
    pub fn new(config: &PipelineConfig, pipeline: IngestPipeline) -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: RwLock::new(HashMap::new()),
                semaphore: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
                pipeline: Arc::new(pipeline),
                output_root: config.output_root.clone(),
                accepting: AtomicBool::new(true),
            }),
        }
    }

    /// Accept an upload and start its pipeline.
    ///
    /// The absolute input ceiling is enforced here, before anything is
    /// written or inspected. A caller-supplied id is honored unless it
    /// already names a job, in which case a fresh id is generated: prior
    /// manifests are never touched.
    pub async fn submit_job(
        &self,
        data: Bytes,
        source_file: &str,
        requested_id: Option<Uuid>,
    ) -> Result<Uuid, PipelineError> {
        if !self.inner.accepting.load(Ordering::SeqCst) {
            return Err(PipelineError::Internal(
                "job store is shutting down".to_string(),
            ));
        }

        self.inner
            .pipeline
            .validator()
            .ensure_within_input_ceiling(data.len() as u64)?;

        let job_id = {
            let jobs = self.inner.jobs.read().await;
            match requested_id {
                Some(id) if jobs.contains_key(&id) => {
                    let fresh = Uuid::new_v4();
                    tracing::warn!(
                        requested_id = %id,
                        job_id = %fresh,
                        "Job id already used, treating resubmission as a new job"
                    );
                    fresh
                }
                Some(id) => id,
                None => Uuid::new_v4(),
            }
        };

        let output_dir = self.inner.output_root.join(job_id.to_string());
        let job = ConversionJob::new(job_id, source_file.to_string(), output_dir);

        self.inner.jobs.write().await.insert(job_id, job);
        tracing::info!(job_id = %job_id, source = %source_file, bytes = data.len(), "Job accepted");

        let store = self.clone();
        tokio::spawn(async move {
            let permit = store.inner.semaphore.clone().acquire_owned().await;
            if permit.is_err() {
                // Semaphore closed during shutdown; leave the job queued.
                return;
            }
            store.run_job(job_id, data).await;
        });

        Ok(job_id)
    }

    pub async fn status(&self, job_id: Uuid) -> Option<JobStatusResponse> {
        self.inner
            .jobs
            .read()
            .await
            .get(&job_id)
            .map(JobStatusResponse::from)
    }

    pub async fn get(&self, job_id: Uuid) -> Option<ConversionJob> {
        self.inner.jobs.read().await.get(&job_id).cloned()
    }

    /// Poll until the job reaches a terminal status. Returns `None` on
    /// timeout or unknown id.
    pub async fn wait_for_terminal(
        &self,
        job_id: Uuid,
        timeout: Duration,
    ) -> Option<ConversionJob> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.get(job_id).await {
                Some(job) if job.is_terminal() => return Some(job),
                Some(_) => {}
                None => return None,
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// Stop accepting new jobs. In-flight jobs run to completion.
    pub fn shutdown(&self) {
        tracing::info!("Job store shutting down, no longer accepting jobs");
        self.inner.accepting.store(false, Ordering::SeqCst);
    }

    async fn update<F>(&self, job_id: Uuid, mutate: F)
    where
        F: FnOnce(&mut ConversionJob),
    {
        if let Some(job) = self.inner.jobs.write().await.get_mut(&job_id) {
            mutate(job);
        }
    }

    async fn run_job(&self, job_id: Uuid, data: Bytes) {
        let pipeline = Arc::clone(&self.inner.pipeline);

        self.update(job_id, |job| job.advance(JobStatus::Validating))
            .await;

        let report = match pipeline.validate(&data) {
            Ok(report) => report,
            Err(e) => {
                self.fail_job(job_id, JobStage::Validation, &e).await;
                return;
            }
        };
        self.update(job_id, |job| job.validation = Some(report.clone()))
            .await;

        if !report.passed {
            let e = PipelineError::SecurityLimitExceeded {
                violations: report.violations.clone(),
            };
            self.fail_job(job_id, JobStage::Validation, &e).await;
            return;
        }

        // Scratch directory for the input file; dropped (and removed) on
        // every exit path below.
        let scratch = match tempfile::TempDir::new() {
            Ok(dir) => dir,
            Err(e) => {
                self.fail_job(job_id, JobStage::Conversion, &e.into()).await;
                return;
            }
        };
        let source_file = self
            .get(job_id)
            .await
            .map(|job| job.source_file)
            .unwrap_or_default();
        let input_path = scratch.path().join(input_file_name(&source_file));
        if let Err(e) = tokio::fs::write(&input_path, &data).await {
            self.fail_job(job_id, JobStage::Conversion, &e.into()).await;
            return;
        }

        let output_dir = self.inner.output_root.join(job_id.to_string());

        self.update(job_id, |job| job.advance(JobStatus::Parsing))
            .await;

        // Conversion does not depend on parsed text, so it starts now and
        // runs alongside the parse.
        let renderer = pipeline.renderer();
        let render_input = input_path.clone();
        let render_output = output_dir.clone();
        let render_task = tokio::spawn(async move {
            renderer.render(job_id, &render_input, &render_output).await
        });

        let document = match pipeline.parse_and_analyze(data, &report).await {
            Ok(document) => document,
            Err(e) => {
                // Parsing is terminal here; cancel the in-flight conversion
                // (aborting the task drops the child process).
                render_task.abort();
                self.fail_job(job_id, JobStage::Parsing, &e).await;
                self.remove_partial_output(&output_dir).await;
                return;
            }
        };

        for warning in &document.warnings {
            tracing::warn!(job_id = %job_id, warning = %warning, "Parse warning");
        }

        self.update(job_id, |job| job.advance(JobStatus::Converting))
            .await;

        let image_paths = match render_task.await {
            Ok(Ok(paths)) => paths,
            Ok(Err(e)) => {
                self.fail_job(job_id, JobStage::Conversion, &e).await;
                self.remove_partial_output(&output_dir).await;
                return;
            }
            Err(e) => {
                let e = PipelineError::Internal(format!("render task failed: {}", e));
                self.fail_job(job_id, JobStage::Conversion, &e).await;
                self.remove_partial_output(&output_dir).await;
                return;
            }
        };

        let manifest = match self.get(job_id).await {
            Some(job) => JobAssembler::assemble(&job, &document, &image_paths),
            None => return,
        };
        if let Err(e) = JobAssembler::write_manifest(&manifest, &output_dir) {
            self.fail_job(job_id, JobStage::Assembly, &e).await;
            self.remove_partial_output(&output_dir).await;
            return;
        }

        self.update(job_id, |job| {
            job.slide_count = Some(manifest.slide_count());
            job.advance(JobStatus::Completed);
        })
        .await;
        tracing::info!(
            job_id = %job_id,
            slides = manifest.slide_count(),
            "Job completed"
        );
    }

    async fn fail_job(&self, job_id: Uuid, stage: JobStage, error: &PipelineError) {
        tracing::error!(job_id = %job_id, stage = %stage, error = %error, "Job failed");
        let code = error.error_code();
        let detail = error.to_string();
        let unprocessable = error.is_unprocessable_input();
        self.update(job_id, |job| {
            job.fail(stage, code, detail, unprocessable);
        })
        .await;
    }

    async fn remove_partial_output(&self, output_dir: &Path) {
        if output_dir.exists() {
            if let Err(e) = tokio::fs::remove_dir_all(output_dir).await {
                tracing::warn!(dir = %output_dir.display(), error = %e, "Could not remove partial output");
            }
        }
    }
}

/// The input is staged under a fixed stem; external converters derive their
/// output names from it. The original extension is kept so the converter
/// detects the format.
fn input_file_name(source_file: &str) -> String {
    let ext = Path::new(source_file)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .unwrap_or("pptx");
    format!("input.{}", ext)
}

//! Conversion orchestration: document bytes -> numbered raster images.
//!
//! One render call walks idle -> converting_to_pdf -> rasterizing -> done,
//! inside a scratch directory owned by this call alone. LibreOffice gets a
//! job-unique user profile so concurrent renders cannot trip over each
//! other's lock files. Every subprocess carries a timeout and is killed when
//! the timeout's future is dropped.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deckpress_core::PipelineError;
use tempfile::TempDir;
use tokio::process::Command;
use uuid::Uuid;

use super::locate::{BinaryLocator, ToolKind};
use super::raster::{letterbox_to, sort_numerically};

/// Where a render attempt currently is (or where it stopped).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertStage {
    Idle,
    ConvertingToPdf,
    Rasterizing,
    Done,
    Failed,
}

/// Renders a presentation file into per-slide raster images.
///
/// The worker depends on this trait, not on the external tools, so tests can
/// substitute a fake renderer.
#[async_trait]
pub trait SlideRenderer: Send + Sync {
    /// Produce `slide_1.png .. slide_N.png` under `output_dir`, returning the
    /// paths in slide order.
    async fn render(
        &self,
        job_id: Uuid,
        input_path: &Path,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, PipelineError>;
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub timeout: Duration,
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(90),
            width: 1920,
            height: 1080,
            dpi: 150,
        }
    }
}

/// Production renderer driving LibreOffice and pdftoppm.
pub struct ExternalSlideRenderer {
    soffice: Arc<dyn BinaryLocator>,
    pdftoppm: Arc<dyn BinaryLocator>,
    settings: RenderSettings,
}

impl ExternalSlideRenderer {
    pub fn new(
        soffice: Arc<dyn BinaryLocator>,
        pdftoppm: Arc<dyn BinaryLocator>,
        settings: RenderSettings,
    ) -> Self {
        Self {
            soffice,
            pdftoppm,
            settings,
        }
    }

    async fn convert_to_pdf(
        &self,
        job_id: Uuid,
        input_path: &Path,
        work_dir: &Path,
    ) -> Result<PathBuf, PipelineError> {
        let soffice = self.soffice.locate().await?;

        // A job-unique profile directory keeps concurrent LibreOffice
        // instances from contending on a shared user profile lock.
        let profile_dir = work_dir.join("profile");
        tokio::fs::create_dir_all(&profile_dir).await?;

        tracing::info!(job_id = %job_id, converter = %soffice.display(), "Converting document to PDF");

        let mut command = Command::new(&soffice);
        command
            .arg("--headless")
            .arg("--norestore")
            .arg(format!(
                "-env:UserInstallation=file://{}",
                profile_dir.display()
            ))
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(work_dir)
            .arg(input_path);

        let output = run_with_timeout(command, self.settings.timeout, ToolKind::Soffice).await?;
        if !output.status.success() {
            return Err(PipelineError::ConversionProcessFailed {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stem = input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        let pdf_path = work_dir.join(format!("{}.pdf", stem));
        if !pdf_path.exists() {
            return Err(PipelineError::NoOutputProduced);
        }
        Ok(pdf_path)
    }

    async fn rasterize(
        &self,
        job_id: Uuid,
        pdf_path: &Path,
        work_dir: &Path,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        let pdftoppm = self.pdftoppm.locate().await?;

        tracing::info!(job_id = %job_id, rasterizer = %pdftoppm.display(), "Rasterizing PDF pages");

        let page_prefix = work_dir.join("page");
        let mut command = Command::new(&pdftoppm);
        command
            .arg("-png")
            .arg("-r")
            .arg(self.settings.dpi.to_string())
            .arg(pdf_path)
            .arg(&page_prefix);

        let output = run_with_timeout(command, self.settings.timeout, ToolKind::Pdftoppm).await?;
        if !output.status.success() {
            return Err(PipelineError::RasterizationFailed {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let mut pages = Vec::new();
        let mut entries = tokio::fs::read_dir(work_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_page = path.extension().and_then(|e| e.to_str()) == Some("png")
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with("page"))
                    .unwrap_or(false);
            if is_page {
                pages.push(path);
            }
        }
        if pages.is_empty() {
            return Err(PipelineError::NoOutputProduced);
        }
        sort_numerically(&mut pages);
        Ok(pages)
    }
}

#[async_trait]
impl SlideRenderer for ExternalSlideRenderer {
    async fn render(
        &self,
        job_id: Uuid,
        input_path: &Path,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        // Scratch space for this call only; removed on every exit path when
        // the TempDir drops.
        let work = TempDir::new()?;
        let mut stage = ConvertStage::ConvertingToPdf;

        let result = async {
            let pdf_path = self.convert_to_pdf(job_id, input_path, work.path()).await?;

            stage = ConvertStage::Rasterizing;
            let pages = self.rasterize(job_id, &pdf_path, work.path()).await?;

            tokio::fs::create_dir_all(output_dir).await?;
            let mut outputs = Vec::with_capacity(pages.len());
            for (position, page) in pages.iter().enumerate() {
                let dst = output_dir.join(format!("slide_{}.png", position + 1));
                letterbox_to(page, &dst, self.settings.width, self.settings.height).map_err(
                    |e| PipelineError::RasterizationFailed {
                        status: None,
                        stderr: format!("page normalization failed: {}", e),
                    },
                )?;
                outputs.push(dst);
            }
            Ok(outputs)
        }
        .await;

        let final_stage = match &result {
            Ok(outputs) => {
                tracing::info!(job_id = %job_id, pages = outputs.len(), "Render complete");
                ConvertStage::Done
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, stage = ?stage, error = %e, "Render failed");
                ConvertStage::Failed
            }
        };
        tracing::debug!(job_id = %job_id, stage = ?final_stage, "Render finished");
        result
    }
}

/// Run a command to completion under a timeout. The child is spawned with
/// kill-on-drop, so when the timeout fires and the wait future is dropped the
/// process is terminated rather than orphaned.
async fn run_with_timeout(
    mut command: Command,
    timeout: Duration,
    tool: ToolKind,
) -> Result<std::process::Output, PipelineError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match command.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(tool.not_found(format!("{} could not be spawned", tool.binary_name())));
        }
        Err(e) => return Err(e.into()),
    };

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(PipelineError::ConversionTimeout {
            seconds: timeout.as_secs(),
        }),
    }
}

//! Manifest assembly: parsed text + rendered images -> one manifest per job.
//!
//! Slides and images are aligned by position. A count mismatch between the
//! parser and the rasterizer is padded with placeholders, never a failure:
//! a conversion that produced images must not be blocked by a parsing
//! discrepancy. The manifest file is written exactly once; a job id is never
//! reused to rewrite an existing manifest.

use std::path::{Path, PathBuf};

use chrono::Utc;
use deckpress_core::models::{
    ConversionJob, DeckManifest, ManifestDocument, ParsedDocument, SlideManifestEntry,
    SlideOutcome,
};
use deckpress_core::PipelineError;
use uuid::Uuid;

/// Text used for manifest entries with no extracted slide behind them.
const MISSING_SLIDE_TEXT: &str = "Slide content unavailable";

pub struct JobAssembler;

impl JobAssembler {
    /// Merge parsed slides with rendered image paths into the manifest.
    ///
    /// `image_paths` must already be in slide order; entries are emitted per
    /// image (the rasterizer's page count is authoritative for the deck
    /// length, since every page has a picture even when its text was lost).
    pub fn assemble(
        job: &ConversionJob,
        document: &ParsedDocument,
        image_paths: &[PathBuf],
    ) -> DeckManifest {
        if document.slide_count() != image_paths.len() {
            tracing::warn!(
                job_id = %job.id,
                parsed = document.slide_count(),
                rendered = image_paths.len(),
                "Slide/image count mismatch, aligning by position"
            );
        }

        let slides = image_paths
            .iter()
            .enumerate()
            .map(|(position, image_path)| {
                let id = position + 1;
                let image = image_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| format!("slide_{}.png", id));

                match document.slides.get(position) {
                    Some(SlideOutcome::Extracted(slide)) => SlideManifestEntry {
                        id,
                        image,
                        title: slide.title.clone().unwrap_or_default(),
                        text: slide.body.clone(),
                        notes: slide.notes.clone().unwrap_or_default(),
                        suggested_duration_sec: slide.suggested_duration_secs,
                    },
                    Some(SlideOutcome::Skipped { reason, .. }) => SlideManifestEntry {
                        id,
                        image,
                        title: String::new(),
                        text: format!("{} ({})", MISSING_SLIDE_TEXT, reason),
                        notes: String::new(),
                        suggested_duration_sec: 0.0,
                    },
                    None => SlideManifestEntry {
                        id,
                        image,
                        title: String::new(),
                        text: MISSING_SLIDE_TEXT.to_string(),
                        notes: String::new(),
                        suggested_duration_sec: 0.0,
                    },
                }
            })
            .collect();

        DeckManifest {
            deck_id: Uuid::new_v4(),
            source_file: job.source_file.clone(),
            job_id: job.id,
            created_at: Utc::now(),
            slides,
            document: ManifestDocument {
                title: document.meta.title.clone(),
                author: document.meta.author.clone(),
                palette: document.design.palette.clone(),
                fonts: document.design.fonts.clone(),
                compliance: document.compliance.clone(),
            },
        }
    }

    /// Write the manifest next to the images. Refuses to overwrite: the
    /// manifest is immutable once written, regeneration means a new job.
    pub fn write_manifest(
        manifest: &DeckManifest,
        output_dir: &Path,
    ) -> Result<PathBuf, PipelineError> {
        let path = output_dir.join("manifest.json");
        let json = serde_json::to_vec_pretty(manifest)?;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        let mut file = options.open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                PipelineError::Internal(format!(
                    "manifest already written for job {}: {}",
                    manifest.job_id,
                    path.display()
                ))
            } else {
                e.into()
            }
        })?;

        use std::io::Write;
        file.write_all(&json)?;
        Ok(path)
    }
}

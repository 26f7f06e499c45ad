//! End-to-end job flow tests with the external converter replaced by a fake
//! renderer, exercising submission, status transitions, isolation, and the
//! manifest contract.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use deckpress_core::models::{DeckManifest, JobStatus, LimitKind};
use deckpress_core::{PipelineConfig, PipelineError};
use deckpress_processing::SlideRenderer;
use deckpress_worker::{IngestPipeline, JobStore};
use uuid::Uuid;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Renderer that writes `pages` dummy PNG files, or fails with the given
/// error. Stands in for the LibreOffice/pdftoppm chain.
struct FakeRenderer {
    pages: usize,
    fail_with: Option<fn() -> PipelineError>,
}

impl FakeRenderer {
    fn pages(pages: usize) -> Arc<Self> {
        Arc::new(Self {
            pages,
            fail_with: None,
        })
    }

    fn failing(fail_with: fn() -> PipelineError) -> Arc<Self> {
        Arc::new(Self {
            pages: 0,
            fail_with: Some(fail_with),
        })
    }
}

#[async_trait]
impl SlideRenderer for FakeRenderer {
    async fn render(
        &self,
        _job_id: Uuid,
        _input_path: &Path,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        if let Some(fail) = self.fail_with {
            return Err(fail());
        }
        tokio::fs::create_dir_all(output_dir).await?;
        let mut paths = Vec::new();
        for i in 1..=self.pages {
            let path = output_dir.join(format!("slide_{}.png", i));
            tokio::fs::write(&path, b"\x89PNG\r\n\x1a\nfake").await?;
            paths.push(path);
        }
        Ok(paths)
    }
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="xml" ContentType="application/xml"/>
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
</Types>"#;

fn deck_with_slides(texts: &[(&str, &str)]) -> Bytes {
    let mut ids = String::new();
    let mut rels = String::new();
    for (i, _) in texts.iter().enumerate() {
        let n = i + 1;
        ids.push_str(&format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 255 + n, n));
        rels.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide{}.xml"/>"#,
            n, n
        ));
    }

    let mut entries: Vec<(String, Vec<u8>)> = vec![
        ("[Content_Types].xml".into(), CONTENT_TYPES.into()),
        (
            "ppt/presentation.xml".into(),
            format!(
                r#"<p:presentation xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><p:sldIdLst>{}</p:sldIdLst></p:presentation>"#,
                ids
            )
            .into(),
        ),
        (
            "ppt/_rels/presentation.xml.rels".into(),
            format!(
                r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
                rels
            )
            .into(),
        ),
    ];
    for (i, (title, body)) in texts.iter().enumerate() {
        entries.push((
            format!("ppt/slides/slide{}.xml", i + 1),
            format!(
                r#"<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:sp><p:nvSpPr><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr><p:txBody><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp><p:sp><p:nvSpPr><p:nvPr/></p:nvSpPr><p:txBody><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#,
                title, body
            )
            .into(),
        ));
    }

    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in &entries {
            zip.start_file(name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }
    Bytes::from(buffer)
}

fn three_slide_deck() -> Bytes {
    deck_with_slides(&[
        ("Welcome", "Opening remarks for everyone"),
        ("Agenda", "First point and second point"),
        ("Summary", "Wrap up and thank you"),
    ])
}

fn store_with(renderer: Arc<dyn SlideRenderer>) -> (JobStore, tempfile::TempDir) {
    let scratch = tempfile::tempdir().unwrap();
    let mut config = PipelineConfig::default();
    config.output_root = scratch.path().to_path_buf();
    let pipeline = IngestPipeline::new(&config, renderer);
    (JobStore::new(&config, pipeline), scratch)
}

fn read_manifest(dir: &Path) -> DeckManifest {
    let raw = std::fs::read_to_string(dir.join("manifest.json")).unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[tokio::test]
async fn three_slide_deck_produces_three_images_and_manifest() {
    let (store, _scratch) = store_with(FakeRenderer::pages(3));

    let job_id = store
        .submit_job(three_slide_deck(), "deck.pptx", None)
        .await
        .unwrap();
    let job = store
        .wait_for_terminal(job_id, Duration::from_secs(10))
        .await
        .expect("job finishes");

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.slide_count, Some(3));
    assert!(job.validated_at.is_some());
    assert!(job.parsed_at.is_some());
    assert!(job.completed_at.is_some());

    for i in 1..=3 {
        assert!(job.output_dir.join(format!("slide_{}.png", i)).exists());
    }

    let manifest = read_manifest(&job.output_dir);
    assert_eq!(manifest.slide_count(), 3);
    assert_eq!(manifest.job_id, job_id);
    assert_eq!(manifest.source_file, "deck.pptx");
    for (i, entry) in manifest.slides.iter().enumerate() {
        assert_eq!(entry.id, i + 1);
        assert_eq!(entry.image, format!("slide_{}.png", i + 1));
        assert!(entry.suggested_duration_sec >= 4.0, "floor honored");
    }
    assert_eq!(manifest.slides[0].title, "Welcome");
}

#[tokio::test]
async fn non_archive_bytes_fail_before_any_output_exists() {
    let (store, _scratch) = store_with(FakeRenderer::pages(3));

    let job_id = store
        .submit_job(Bytes::from_static(b"%PDF-1.4 not a deck"), "deck.pptx", None)
        .await
        .unwrap();
    let job = store
        .wait_for_terminal(job_id, Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    let failure = job.error.unwrap();
    assert_eq!(failure.code, "MALFORMED_ARCHIVE");
    assert!(failure.unprocessable_input);
    assert!(!job.output_dir.exists(), "no filesystem writes for the job");
}

#[tokio::test]
async fn entry_count_bomb_reports_violated_limit() {
    let (store, _scratch) = store_with(FakeRenderer::pages(1));

    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);
        for i in 0..2000 {
            zip.start_file(format!("part{}.xml", i), options).unwrap();
            zip.write_all(b"<x/>").unwrap();
        }
        zip.finish().unwrap();
    }

    let job_id = store
        .submit_job(Bytes::from(buffer), "bomb.pptx", None)
        .await
        .unwrap();
    let job = store
        .wait_for_terminal(job_id, Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    let failure = job.error.unwrap();
    assert_eq!(failure.code, "SECURITY_LIMIT_EXCEEDED");
    assert!(failure.detail.contains("entry count"));

    let report = job.validation.expect("audit report recorded");
    assert!(report.has_violation(LimitKind::EntryCount));
}

#[tokio::test]
async fn oversize_upload_rejected_at_submit() {
    let scratch = tempfile::tempdir().unwrap();
    let mut config = PipelineConfig::default();
    config.output_root = scratch.path().to_path_buf();
    config.max_archive_bytes = 1024;
    let pipeline = IngestPipeline::new(&config, FakeRenderer::pages(1));
    let store = JobStore::new(&config, pipeline);

    let err = store
        .submit_job(Bytes::from(vec![0u8; 4096]), "big.pptx", None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INPUT_TOO_LARGE");
}

#[tokio::test]
async fn concurrent_jobs_never_share_output_directories() {
    let (store, _scratch) = store_with(FakeRenderer::pages(2));

    let deck = deck_with_slides(&[("A", "first deck"), ("B", "first deck too")]);
    let other = deck_with_slides(&[("C", "second deck"), ("D", "second deck too")]);

    let (left, right) = tokio::join!(
        store.submit_job(deck, "left.pptx", None),
        store.submit_job(other, "right.pptx", None),
    );
    let left = left.unwrap();
    let right = right.unwrap();
    assert_ne!(left, right);

    let left_job = store
        .wait_for_terminal(left, Duration::from_secs(10))
        .await
        .unwrap();
    let right_job = store
        .wait_for_terminal(right, Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(left_job.status, JobStatus::Completed);
    assert_eq!(right_job.status, JobStatus::Completed);
    assert_ne!(left_job.output_dir, right_job.output_dir);

    for job in [&left_job, &right_job] {
        let mut names: Vec<String> = std::fs::read_dir(&job.output_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["manifest.json", "slide_1.png", "slide_2.png"]);
    }

    assert_eq!(read_manifest(&left_job.output_dir).source_file, "left.pptx");
    assert_eq!(
        read_manifest(&right_job.output_dir).source_file,
        "right.pptx"
    );
}

#[tokio::test]
async fn caller_supplied_id_is_used_and_reuse_gets_fresh_id() {
    let (store, _scratch) = store_with(FakeRenderer::pages(1));
    let wanted = Uuid::new_v4();

    let deck = deck_with_slides(&[("Solo", "one slide")]);
    let first = store
        .submit_job(deck.clone(), "deck.pptx", Some(wanted))
        .await
        .unwrap();
    assert_eq!(first, wanted);
    store
        .wait_for_terminal(first, Duration::from_secs(10))
        .await
        .unwrap();

    let second = store
        .submit_job(deck, "deck.pptx", Some(wanted))
        .await
        .unwrap();
    assert_ne!(second, wanted, "resubmission becomes a new job");

    let second_job = store
        .wait_for_terminal(second, Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(second_job.status, JobStatus::Completed);

    // The first job's manifest was not touched.
    let first_job = store.get(first).await.unwrap();
    assert_eq!(
        read_manifest(&first_job.output_dir).job_id,
        first,
        "prior manifest intact"
    );
}

#[tokio::test]
async fn rasterizer_shortfall_pads_manifest_to_image_count() {
    // Renderer produces 4 pages for a 2-slide parse: align by position, pad.
    let (store, _scratch) = store_with(FakeRenderer::pages(4));

    let deck = deck_with_slides(&[("One", "first"), ("Two", "second")]);
    let job_id = store.submit_job(deck, "deck.pptx", None).await.unwrap();
    let job = store
        .wait_for_terminal(job_id, Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    let manifest = read_manifest(&job.output_dir);
    assert_eq!(manifest.slide_count(), 4);
    assert_eq!(manifest.slides[0].title, "One");
    assert!(manifest.slides[3].text.contains("unavailable"));
}

#[tokio::test]
async fn conversion_timeout_fails_job_and_cleans_output() {
    let (store, _scratch) = store_with(FakeRenderer::failing(|| {
        PipelineError::ConversionTimeout { seconds: 90 }
    }));

    let job_id = store
        .submit_job(three_slide_deck(), "deck.pptx", None)
        .await
        .unwrap();
    let job = store
        .wait_for_terminal(job_id, Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    let failure = job.error.unwrap();
    assert_eq!(failure.code, "CONVERSION_TIMEOUT");
    assert!(!failure.unprocessable_input, "server-side failure");
    assert!(!job.output_dir.exists(), "partial output removed");
}

#[tokio::test]
async fn status_endpoint_shape() {
    let (store, _scratch) = store_with(FakeRenderer::pages(1));
    let deck = deck_with_slides(&[("Solo", "one slide")]);
    let job_id = store.submit_job(deck, "deck.pptx", None).await.unwrap();

    let status = store.status(job_id).await.unwrap();
    assert_eq!(status.job_id, job_id);

    store
        .wait_for_terminal(job_id, Duration::from_secs(10))
        .await
        .unwrap();
    let status = store.status(job_id).await.unwrap();
    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.slide_count, Some(1));
    assert!(status.error.is_none());

    assert!(store.status(Uuid::new_v4()).await.is_none());
}

#[tokio::test]
async fn shutdown_stops_new_submissions() {
    let (store, _scratch) = store_with(FakeRenderer::pages(1));
    store.shutdown();
    let err = store
        .submit_job(three_slide_deck(), "deck.pptx", None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("shutting down"));
}

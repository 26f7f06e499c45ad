//! Stage wiring: validation, bounded parsing + analysis, rendering.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use deckpress_core::models::{ParsedDocument, ValidationReport};
use deckpress_core::{PipelineConfig, PipelineError};
use deckpress_processing::convert::{RenderSettings, ToolKind, WellKnownLocator};
use deckpress_processing::pptx::ParserLimits;
use deckpress_processing::{
    ContainerParser, ContentAnalyzer, ExternalSlideRenderer, SecurityLimits, SecurityValidator,
    SlideRenderer,
};

/// The processing stages of one job, shared by every job the store runs.
pub struct IngestPipeline {
    validator: SecurityValidator,
    parser: ContainerParser,
    analyzer: ContentAnalyzer,
    renderer: Arc<dyn SlideRenderer>,
}

impl IngestPipeline {
    pub fn new(config: &PipelineConfig, renderer: Arc<dyn SlideRenderer>) -> Self {
        Self {
            validator: SecurityValidator::new(SecurityLimits::from(config)),
            parser: ContainerParser::new(ParserLimits::from(config)),
            analyzer: ContentAnalyzer::default(),
            renderer,
        }
    }

    /// Production wiring: external LibreOffice + pdftoppm renderer with
    /// config/environment overrides taking precedence over discovery.
    pub fn with_external_renderer(config: &PipelineConfig) -> Self {
        let probe_timeout = Duration::from_secs(config.probe_timeout_secs);
        let soffice = Arc::new(WellKnownLocator::new(
            ToolKind::Soffice,
            config.soffice_path.as_ref().map(PathBuf::from),
            probe_timeout,
        ));
        let pdftoppm = Arc::new(WellKnownLocator::new(
            ToolKind::Pdftoppm,
            config.pdftoppm_path.as_ref().map(PathBuf::from),
            probe_timeout,
        ));
        let renderer = Arc::new(ExternalSlideRenderer::new(
            soffice,
            pdftoppm,
            RenderSettings {
                timeout: Duration::from_secs(config.convert_timeout_secs),
                width: config.render_width,
                height: config.render_height,
                dpi: config.raster_dpi,
            },
        ));
        Self::new(config, renderer)
    }

    pub fn validator(&self) -> &SecurityValidator {
        &self.validator
    }

    pub fn renderer(&self) -> Arc<dyn SlideRenderer> {
        Arc::clone(&self.renderer)
    }

    /// Validate the raw upload. `Err` means the input is not an archive at
    /// all; a failed report means it is one that violates limits.
    pub fn validate(&self, data: &[u8]) -> Result<ValidationReport, PipelineError> {
        self.validator.validate(data)
    }

    /// Parse and analyze on a blocking thread; the container walk is pure
    /// CPU work and must not stall the runtime.
    pub async fn parse_and_analyze(
        &self,
        data: Bytes,
        report: &ValidationReport,
    ) -> Result<ParsedDocument, PipelineError> {
        let parser = self.parser.clone();
        let analyzer = self.analyzer.clone();
        let report = report.clone();

        tokio::task::spawn_blocking(move || {
            let mut document = parser.parse(&data, &report)?;
            analyzer.analyze(&mut document);
            Ok(document)
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("parse task panicked: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_builds_from_default_config() {
        let config = PipelineConfig::default();
        let pipeline = IngestPipeline::with_external_renderer(&config);
        assert_eq!(
            pipeline.validator().limits().max_entry_count,
            config.max_entry_count
        );
    }
}

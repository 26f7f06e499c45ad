//! Configuration module
//!
//! Environment-driven configuration for the ingestion pipeline: security
//! limits, part-parse ceilings, converter paths and timeouts, raster output
//! geometry, and worker concurrency. Every knob has a named default; the
//! environment overrides it.

use std::env;
use std::path::PathBuf;

/// Pipeline configuration.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Root directory under which each job gets its own output subdirectory.
    pub output_root: PathBuf,
    /// Deployment environment name ("development", "production", ...).
    pub environment: String,

    // Security limits (archive validation)
    pub max_archive_bytes: u64,
    pub max_entry_count: usize,
    pub max_entry_bytes: u64,
    pub max_total_uncompressed_bytes: u64,
    pub max_compression_ratio: f64,

    // Container parsing ceilings
    pub max_part_bytes: u64,
    pub part_parse_timeout_secs: u64,
    pub max_images_per_slide: usize,
    pub max_slide_text_chars: usize,

    // External converter configuration
    pub soffice_path: Option<String>,
    pub pdftoppm_path: Option<String>,
    pub convert_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub render_width: u32,
    pub render_height: u32,
    pub raster_dpi: u32,

    // Worker configuration
    pub max_concurrent_jobs: usize,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        const MAX_ARCHIVE_MB: u64 = 100;
        const MAX_ENTRY_COUNT: usize = 1000;
        const MAX_ENTRY_MB: u64 = 50;
        const MAX_TOTAL_UNCOMPRESSED_MB: u64 = 500;
        const MAX_COMPRESSION_RATIO: f64 = 100.0;
        const MAX_PART_KB: u64 = 1024;
        const PART_PARSE_TIMEOUT_SECS: u64 = 5;
        const MAX_IMAGES_PER_SLIDE: usize = 20;
        const MAX_SLIDE_TEXT_CHARS: usize = 20_000;
        const CONVERT_TIMEOUT_SECS: u64 = 90;
        const PROBE_TIMEOUT_SECS: u64 = 5;
        const RENDER_WIDTH: u32 = 1920;
        const RENDER_HEIGHT: u32 = 1080;
        const RASTER_DPI: u32 = 150;
        const MAX_CONCURRENT_JOBS: usize = 2;

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let output_root = env::var("DECKPRESS_OUTPUT_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir().join("deckpress"));

        Ok(Self {
            output_root,
            environment,
            max_archive_bytes: env_u64("DECKPRESS_MAX_ARCHIVE_MB", MAX_ARCHIVE_MB) * 1024 * 1024,
            max_entry_count: env_u64("DECKPRESS_MAX_ENTRY_COUNT", MAX_ENTRY_COUNT as u64) as usize,
            max_entry_bytes: env_u64("DECKPRESS_MAX_ENTRY_MB", MAX_ENTRY_MB) * 1024 * 1024,
            max_total_uncompressed_bytes: env_u64(
                "DECKPRESS_MAX_TOTAL_UNCOMPRESSED_MB",
                MAX_TOTAL_UNCOMPRESSED_MB,
            ) * 1024
                * 1024,
            max_compression_ratio: env_f64("DECKPRESS_MAX_COMPRESSION_RATIO", MAX_COMPRESSION_RATIO),
            max_part_bytes: env_u64("DECKPRESS_MAX_PART_KB", MAX_PART_KB) * 1024,
            part_parse_timeout_secs: env_u64(
                "DECKPRESS_PART_PARSE_TIMEOUT_SECS",
                PART_PARSE_TIMEOUT_SECS,
            ),
            max_images_per_slide: env_u64(
                "DECKPRESS_MAX_IMAGES_PER_SLIDE",
                MAX_IMAGES_PER_SLIDE as u64,
            ) as usize,
            max_slide_text_chars: env_u64(
                "DECKPRESS_MAX_SLIDE_TEXT_CHARS",
                MAX_SLIDE_TEXT_CHARS as u64,
            ) as usize,
            soffice_path: env::var("DECKPRESS_SOFFICE_PATH").ok(),
            pdftoppm_path: env::var("DECKPRESS_PDFTOPPM_PATH").ok(),
            convert_timeout_secs: env_u64("DECKPRESS_CONVERT_TIMEOUT_SECS", CONVERT_TIMEOUT_SECS),
            probe_timeout_secs: env_u64("DECKPRESS_PROBE_TIMEOUT_SECS", PROBE_TIMEOUT_SECS),
            render_width: env_u64("DECKPRESS_RENDER_WIDTH", RENDER_WIDTH as u64) as u32,
            render_height: env_u64("DECKPRESS_RENDER_HEIGHT", RENDER_HEIGHT as u64) as u32,
            raster_dpi: env_u64("DECKPRESS_RASTER_DPI", RASTER_DPI as u64) as u32,
            max_concurrent_jobs: env_u64(
                "DECKPRESS_MAX_CONCURRENT_JOBS",
                MAX_CONCURRENT_JOBS as u64,
            ) as usize,
        })
    }

    /// Check internal consistency. Called once at startup.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_compression_ratio <= 1.0 {
            return Err(anyhow::anyhow!(
                "DECKPRESS_MAX_COMPRESSION_RATIO must be greater than 1 (got {})",
                self.max_compression_ratio
            ));
        }
        if self.max_entry_bytes > self.max_total_uncompressed_bytes {
            return Err(anyhow::anyhow!(
                "per-entry ceiling ({}) exceeds the aggregate uncompressed ceiling ({})",
                self.max_entry_bytes,
                self.max_total_uncompressed_bytes
            ));
        }
        if self.max_entry_count == 0 || self.max_concurrent_jobs == 0 {
            return Err(anyhow::anyhow!(
                "entry count and concurrent job limits must be non-zero"
            ));
        }
        if self.render_width == 0 || self.render_height == 0 {
            return Err(anyhow::anyhow!("render dimensions must be non-zero"));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_root: env::temp_dir().join("deckpress"),
            environment: "development".to_string(),
            max_archive_bytes: 100 * 1024 * 1024,
            max_entry_count: 1000,
            max_entry_bytes: 50 * 1024 * 1024,
            max_total_uncompressed_bytes: 500 * 1024 * 1024,
            max_compression_ratio: 100.0,
            max_part_bytes: 1024 * 1024,
            part_parse_timeout_secs: 5,
            max_images_per_slide: 20,
            max_slide_text_chars: 20_000,
            soffice_path: None,
            pdftoppm_path: None,
            convert_timeout_secs: 90,
            probe_timeout_secs: 5,
            render_width: 1920,
            render_height: 1080,
            raster_dpi: 150,
            max_concurrent_jobs: 2,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(default)
}

//! Security validation of uploaded containers.
//!
//! All checks run against entry metadata from a single inspection pass; no
//! entry content is decompressed. Every violated limit is collected so the
//! caller can produce a complete report, and validation fails closed: an
//! unreadable archive is rejected, never waved through.

use deckpress_core::models::{
    ArchiveStats, LimitKind, LimitViolation, SuspiciousEntry, ValidationReport,
};
use deckpress_core::{PipelineConfig, PipelineError};

use super::inspector::ArchiveInspector;

/// Hard limits applied to archive metadata.
#[derive(Debug, Clone)]
pub struct SecurityLimits {
    pub max_archive_bytes: u64,
    pub max_entry_count: usize,
    pub max_entry_bytes: u64,
    pub max_total_uncompressed_bytes: u64,
    pub max_compression_ratio: f64,
}

impl Default for SecurityLimits {
    fn default() -> Self {
        Self {
            max_archive_bytes: 100 * 1024 * 1024,
            max_entry_count: 1000,
            max_entry_bytes: 50 * 1024 * 1024,
            max_total_uncompressed_bytes: 500 * 1024 * 1024,
            max_compression_ratio: 100.0,
        }
    }
}

impl From<&PipelineConfig> for SecurityLimits {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_archive_bytes: config.max_archive_bytes,
            max_entry_count: config.max_entry_count,
            max_entry_bytes: config.max_entry_bytes,
            max_total_uncompressed_bytes: config.max_total_uncompressed_bytes,
            max_compression_ratio: config.max_compression_ratio,
        }
    }
}

pub struct SecurityValidator {
    limits: SecurityLimits,
}

impl SecurityValidator {
    pub fn new(limits: SecurityLimits) -> Self {
        Self { limits }
    }

    /// Validate the uploaded bytes.
    ///
    /// Returns `Err(MalformedArchive)` when the input is not a readable ZIP
    /// archive at all; otherwise returns a report, with `passed == false`
    /// listing every violated limit.
    pub fn validate(&self, data: &[u8]) -> Result<ValidationReport, PipelineError> {
        let entries = ArchiveInspector::inspect(data)?;

        let mut violations = Vec::new();
        let mut suspicious = Vec::new();

        if data.len() as u64 > self.limits.max_archive_bytes {
            violations.push(LimitViolation::new(
                LimitKind::InputSize,
                None,
                data.len() as f64,
                self.limits.max_archive_bytes as f64,
            ));
        }

        if entries.len() > self.limits.max_entry_count {
            violations.push(LimitViolation::new(
                LimitKind::EntryCount,
                None,
                entries.len() as f64,
                self.limits.max_entry_count as f64,
            ));
        }

        let mut stats = ArchiveStats {
            entry_count: entries.len(),
            ..Default::default()
        };

        for entry in &entries {
            stats.total_compressed_bytes += entry.compressed_size;
            stats.total_uncompressed_bytes += entry.uncompressed_size;

            if entry.uncompressed_size > self.limits.max_entry_bytes {
                violations.push(LimitViolation::new(
                    LimitKind::EntrySize,
                    Some(entry.path.clone()),
                    entry.uncompressed_size as f64,
                    self.limits.max_entry_bytes as f64,
                ));
            }

            let ratio = entry.compression_ratio();
            if ratio > stats.max_compression_ratio {
                stats.max_compression_ratio = ratio;
            }
            if ratio > self.limits.max_compression_ratio {
                violations.push(LimitViolation::new(
                    LimitKind::CompressionRatio,
                    Some(entry.path.clone()),
                    ratio,
                    self.limits.max_compression_ratio,
                ));
                suspicious.push(SuspiciousEntry {
                    path: entry.path.clone(),
                    reason: "compression ratio above threshold".to_string(),
                    ratio: Some(ratio),
                });
            }

            if entry.is_nested_archive {
                violations.push(LimitViolation::new(
                    LimitKind::NestedArchive,
                    Some(entry.path.clone()),
                    1.0,
                    0.0,
                ));
            }

            if !entry.size_is_declared {
                suspicious.push(SuspiciousEntry {
                    path: entry.path.clone(),
                    reason: "declared uncompressed size missing, conservative estimate applied"
                        .to_string(),
                    ratio: None,
                });
            }
        }

        if stats.total_uncompressed_bytes > self.limits.max_total_uncompressed_bytes {
            violations.push(LimitViolation::new(
                LimitKind::TotalUncompressedSize,
                None,
                stats.total_uncompressed_bytes as f64,
                self.limits.max_total_uncompressed_bytes as f64,
            ));
        }

        if violations.is_empty() {
            tracing::debug!(
                entries = stats.entry_count,
                total_uncompressed = stats.total_uncompressed_bytes,
                max_ratio = stats.max_compression_ratio,
                "Archive passed security validation"
            );
            Ok(ValidationReport::passed(stats, suspicious))
        } else {
            tracing::info!(
                entries = stats.entry_count,
                violation_count = violations.len(),
                first = %violations[0],
                "Archive rejected by security validation"
            );
            Ok(ValidationReport::failed(violations, suspicious, stats))
        }
    }

    /// Pre-flight size gate applied before any bytes are even buffered into
    /// the pipeline. Used by the submit path.
    pub fn ensure_within_input_ceiling(&self, size: u64) -> Result<(), PipelineError> {
        if size > self.limits.max_archive_bytes {
            return Err(PipelineError::InputTooLarge {
                size,
                max: self.limits.max_archive_bytes,
            });
        }
        Ok(())
    }

    pub fn limits(&self) -> &SecurityLimits {
        &self.limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn build_zip(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
            let options =
                FileOptions::default().compression_method(CompressionMethod::Deflated);
            for (name, data) in entries {
                zip.start_file(*name, options).unwrap();
                zip.write_all(data).unwrap();
            }
            zip.finish().unwrap();
        }
        buffer
    }

    fn validator() -> SecurityValidator {
        SecurityValidator::new(SecurityLimits::default())
    }

    #[test]
    fn test_small_clean_archive_passes() {
        let data = build_zip(&[
            ("[Content_Types].xml", b"<Types/>".to_vec()),
            ("ppt/presentation.xml", b"<presentation/>".to_vec()),
        ]);
        let report = validator().validate(&data).unwrap();
        assert!(report.passed);
        assert!(report.violations.is_empty());
        assert_eq!(report.stats.entry_count, 2);
    }

    #[test]
    fn test_non_zip_is_malformed_not_a_report() {
        let err = validator().validate(b"GIF89a....").unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_ARCHIVE");
    }

    #[test]
    fn test_high_ratio_entry_is_named() {
        // 4 MiB of zeros deflates to a few KiB: ratio far above 100:1.
        let data = build_zip(&[("ppt/media/bomb.bin", vec![0u8; 4 * 1024 * 1024])]);
        let report = validator().validate(&data).unwrap();
        assert!(!report.passed);
        let violation = report
            .violations
            .iter()
            .find(|v| v.kind == LimitKind::CompressionRatio)
            .expect("ratio violation");
        assert_eq!(violation.entry.as_deref(), Some("ppt/media/bomb.bin"));
        assert!(report.stats.max_compression_ratio > 100.0);
        assert!(!report.suspicious.is_empty());
    }

    #[test]
    fn test_entry_count_limit() {
        let limits = SecurityLimits {
            max_entry_count: 10,
            ..Default::default()
        };
        let entries: Vec<(String, Vec<u8>)> = (0..25)
            .map(|i| (format!("part{}.xml", i), b"<x/>".to_vec()))
            .collect();
        let borrowed: Vec<(&str, Vec<u8>)> = entries
            .iter()
            .map(|(name, data)| (name.as_str(), data.clone()))
            .collect();
        let data = build_zip(&borrowed);
        let report = SecurityValidator::new(limits).validate(&data).unwrap();
        assert!(!report.passed);
        assert!(report.has_violation(LimitKind::EntryCount));
        let violation = report
            .violations
            .iter()
            .find(|v| v.kind == LimitKind::EntryCount)
            .unwrap();
        assert_eq!(violation.observed, 25.0);
        assert_eq!(violation.limit, 10.0);
    }

    #[test]
    fn test_nested_archive_rejected() {
        let data = build_zip(&[("ppt/embeddings/inner.zip", b"PK\x03\x04".to_vec())]);
        let report = validator().validate(&data).unwrap();
        assert!(!report.passed);
        assert!(report.has_violation(LimitKind::NestedArchive));
    }

    #[test]
    fn test_aggregate_uncompressed_limit() {
        let limits = SecurityLimits {
            max_total_uncompressed_bytes: 1024,
            max_compression_ratio: 1_000_000.0, // isolate the aggregate check
            ..Default::default()
        };
        let data = build_zip(&[
            ("a.bin", vec![0u8; 700]),
            ("b.bin", vec![0u8; 700]),
        ]);
        let report = SecurityValidator::new(limits).validate(&data).unwrap();
        assert!(!report.passed);
        assert!(report.has_violation(LimitKind::TotalUncompressedSize));
    }

    #[test]
    fn test_multiple_violations_all_reported() {
        let limits = SecurityLimits {
            max_entry_count: 1,
            max_compression_ratio: 2.0,
            ..Default::default()
        };
        let data = build_zip(&[
            ("big.bin", vec![0u8; 64 * 1024]),
            ("inner.7z", b"7z".to_vec()),
        ]);
        let report = SecurityValidator::new(limits).validate(&data).unwrap();
        assert!(!report.passed);
        assert!(report.has_violation(LimitKind::EntryCount));
        assert!(report.has_violation(LimitKind::CompressionRatio));
        assert!(report.has_violation(LimitKind::NestedArchive));
        assert!(report.violations.len() >= 3);
    }

    #[test]
    fn test_input_ceiling_gate() {
        let validator = validator();
        assert!(validator.ensure_within_input_ceiling(1024).is_ok());
        let err = validator
            .ensure_within_input_ceiling(101 * 1024 * 1024)
            .unwrap_err();
        assert_eq!(err.error_code(), "INPUT_TOO_LARGE");
    }

    #[test]
    fn test_oversize_input_recorded_as_violation() {
        let limits = SecurityLimits {
            max_archive_bytes: 128,
            max_compression_ratio: 1_000_000.0,
            max_total_uncompressed_bytes: u64::MAX,
            ..Default::default()
        };
        let body: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let data = build_zip(&[("pad.bin", body)]);
        assert!(data.len() > 128);
        let report = SecurityValidator::new(limits).validate(&data).unwrap();
        assert!(!report.passed);
        assert!(report.has_violation(LimitKind::InputSize));
    }
}

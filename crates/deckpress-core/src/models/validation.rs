//! Archive validation report model.
//!
//! Produced by the security validator in a single metadata pass over the
//! container; consumed by the parser gate and serialized onto the job record
//! as the audit trail. Immutable once produced.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Which configured limit a violation refers to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    InputSize,
    EntryCount,
    EntrySize,
    TotalUncompressedSize,
    CompressionRatio,
    NestedArchive,
}

impl Display for LimitKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            LimitKind::InputSize => write!(f, "input size"),
            LimitKind::EntryCount => write!(f, "entry count"),
            LimitKind::EntrySize => write!(f, "entry size"),
            LimitKind::TotalUncompressedSize => write!(f, "total uncompressed size"),
            LimitKind::CompressionRatio => write!(f, "compression ratio"),
            LimitKind::NestedArchive => write!(f, "nested archive"),
        }
    }
}

/// One violated limit: the kind, the offending entry (when attributable to a
/// single entry), the observed value, and the configured limit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LimitViolation {
    pub kind: LimitKind,
    pub entry: Option<String>,
    pub observed: f64,
    pub limit: f64,
}

impl LimitViolation {
    pub fn new(kind: LimitKind, entry: Option<String>, observed: f64, limit: f64) -> Self {
        Self {
            kind,
            entry,
            observed,
            limit,
        }
    }
}

impl Display for LimitViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.entry {
            Some(entry) => write!(
                f,
                "{} {} exceeds limit {} (entry: {})",
                self.kind, self.observed, self.limit, entry
            ),
            None => write!(f, "{} {} exceeds limit {}", self.kind, self.observed, self.limit),
        }
    }
}

/// An entry flagged for attention without necessarily violating a hard limit
/// (e.g. missing size metadata, ratio close to the threshold).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspiciousEntry {
    pub path: String,
    pub reason: String,
    pub ratio: Option<f64>,
}

/// Aggregate statistics from the metadata pass. These survive validation;
/// individual entries do not.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveStats {
    pub entry_count: usize,
    pub total_compressed_bytes: u64,
    pub total_uncompressed_bytes: u64,
    pub max_compression_ratio: f64,
}

/// Outcome of the security validation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: bool,
    pub violations: Vec<LimitViolation>,
    pub suspicious: Vec<SuspiciousEntry>,
    pub stats: ArchiveStats,
}

impl ValidationReport {
    pub fn passed(stats: ArchiveStats, suspicious: Vec<SuspiciousEntry>) -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
            suspicious,
            stats,
        }
    }

    pub fn failed(
        violations: Vec<LimitViolation>,
        suspicious: Vec<SuspiciousEntry>,
        stats: ArchiveStats,
    ) -> Self {
        debug_assert!(!violations.is_empty());
        Self {
            passed: false,
            violations,
            suspicious,
            stats,
        }
    }

    /// True when any entry exceeded the given ratio (used in summaries).
    pub fn has_violation(&self, kind: LimitKind) -> bool {
        self.violations.iter().any(|v| v.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_violation_display_with_entry() {
        let violation = LimitViolation::new(
            LimitKind::CompressionRatio,
            Some("ppt/media/bomb.bin".to_string()),
            250.0,
            100.0,
        );
        let text = violation.to_string();
        assert!(text.contains("compression ratio"));
        assert!(text.contains("250"));
        assert!(text.contains("ppt/media/bomb.bin"));
    }

    #[test]
    fn test_limit_violation_display_without_entry() {
        let violation = LimitViolation::new(LimitKind::EntryCount, None, 2000.0, 1000.0);
        assert_eq!(violation.to_string(), "entry count 2000 exceeds limit 1000");
    }

    #[test]
    fn test_report_has_violation() {
        let report = ValidationReport::failed(
            vec![LimitViolation::new(LimitKind::EntryCount, None, 2000.0, 1000.0)],
            Vec::new(),
            ArchiveStats::default(),
        );
        assert!(!report.passed);
        assert!(report.has_violation(LimitKind::EntryCount));
        assert!(!report.has_violation(LimitKind::CompressionRatio));
    }

    #[test]
    fn test_report_serializes_round_trip() {
        let report = ValidationReport::passed(
            ArchiveStats {
                entry_count: 12,
                total_compressed_bytes: 1024,
                total_uncompressed_bytes: 4096,
                max_compression_ratio: 4.0,
            },
            vec![SuspiciousEntry {
                path: "ppt/media/odd.bin".to_string(),
                reason: "declared size missing".to_string(),
                ratio: None,
            }],
        );
        let json = serde_json::to_string(&report).unwrap();
        let back: ValidationReport = serde_json::from_str(&json).unwrap();
        assert!(back.passed);
        assert_eq!(back.stats.entry_count, 12);
        assert_eq!(back.suspicious.len(), 1);
    }
}

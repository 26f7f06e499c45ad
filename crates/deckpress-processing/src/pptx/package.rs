//! Bounded access to parts inside a validated container.

use std::collections::HashSet;
use std::io::{Cursor, Read};
use std::time::Duration;

use deckpress_core::PipelineError;
use zip::ZipArchive;

/// Ceilings applied to every individual part read.
#[derive(Debug, Clone)]
pub struct PartLimits {
    pub max_part_bytes: u64,
    pub part_timeout: Duration,
}

impl Default for PartLimits {
    fn default() -> Self {
        Self {
            max_part_bytes: 1024 * 1024,
            part_timeout: Duration::from_secs(5),
        }
    }
}

/// Why a single part read failed. Recoverable at the caller's discretion;
/// the parser turns these into skipped slides or warnings.
#[derive(Debug, thiserror::Error)]
pub enum PartReadError {
    #[error("part not found: {0}")]
    Missing(String),

    #[error("part exceeds {limit} byte ceiling: {path}")]
    TooLarge { path: String, limit: u64 },

    #[error("part unreadable: {path} ({detail})")]
    Unreadable { path: String, detail: String },
}

/// A validated container opened for part access.
pub struct PptxPackage<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
    names: HashSet<String>,
    limits: PartLimits,
}

impl<'a> PptxPackage<'a> {
    pub fn open(data: &'a [u8], limits: PartLimits) -> Result<Self, PipelineError> {
        let archive = ZipArchive::new(Cursor::new(data)).map_err(|e| {
            PipelineError::MalformedArchive(format!("unreadable central directory: {}", e))
        })?;
        let names = archive.file_names().map(|n| n.to_string()).collect();
        Ok(Self {
            archive,
            names,
            limits,
        })
    }

    pub fn has_part(&self, path: &str) -> bool {
        self.names.contains(path)
    }

    /// Read an XML part as UTF-8 text, bounded by the part byte ceiling.
    pub fn read_part(&mut self, path: &str) -> Result<String, PartReadError> {
        let bytes = self.read_bounded(path, self.limits.max_part_bytes)?;
        String::from_utf8(bytes).map_err(|e| PartReadError::Unreadable {
            path: path.to_string(),
            detail: format!("not valid UTF-8: {}", e),
        })
    }

    /// Read a binary media part, bounded by the given ceiling (media may
    /// legitimately exceed the XML part ceiling).
    pub fn read_media(&mut self, path: &str, max_bytes: u64) -> Result<Vec<u8>, PartReadError> {
        self.read_bounded(path, max_bytes)
    }

    fn read_bounded(&mut self, path: &str, max_bytes: u64) -> Result<Vec<u8>, PartReadError> {
        if !self.has_part(path) {
            return Err(PartReadError::Missing(path.to_string()));
        }
        let mut file = self
            .archive
            .by_name(path)
            .map_err(|e| PartReadError::Unreadable {
                path: path.to_string(),
                detail: e.to_string(),
            })?;

        let mut buf = Vec::new();
        let mut limited = (&mut file).take(max_bytes + 1);
        limited
            .read_to_end(&mut buf)
            .map_err(|e| PartReadError::Unreadable {
                path: path.to_string(),
                detail: e.to_string(),
            })?;

        if buf.len() as u64 > max_bytes {
            return Err(PartReadError::TooLarge {
                path: path.to_string(),
                limit: max_bytes,
            });
        }
        Ok(buf)
    }
}

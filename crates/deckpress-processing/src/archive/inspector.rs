//! Metadata-only archive inspection.
//!
//! Opens the uploaded bytes as a ZIP archive and reads the central directory
//! only: entry names and declared sizes. No entry content is decompressed
//! here, so inspection cost is bounded by the directory size regardless of
//! what the payload claims to contain.

use std::io::Cursor;
use std::path::Path;

use deckpress_core::PipelineError;
use zip::ZipArchive;

/// Conservative stand-in for a declared size of zero/unknown. Absence of
/// size metadata must never read as "safe".
pub const UNKNOWN_SIZE_ESTIMATE: u64 = 64 * 1024;

/// File extensions treated as nested archives. Fixed by design: these encode
/// what the pipeline can never process safely, not a deployment preference.
const NESTED_ARCHIVE_EXTENSIONS: &[&str] = &[
    "zip", "rar", "7z", "tar", "gz", "tgz", "bz2", "xz", "zst", "jar",
];

/// One logical file inside the container, as described by the central
/// directory. Enumerated once per validation pass and discarded afterwards.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub path: String,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    /// False when the declared size was zero/absent and
    /// [`UNKNOWN_SIZE_ESTIMATE`] was substituted.
    pub size_is_declared: bool,
    pub is_nested_archive: bool,
}

impl ArchiveEntry {
    /// Uncompressed:compressed ratio. A zero compressed size counts as one
    /// byte so a stored-empty header cannot divide the check away.
    pub fn compression_ratio(&self) -> f64 {
        self.uncompressed_size as f64 / self.compressed_size.max(1) as f64
    }
}

pub struct ArchiveInspector;

impl ArchiveInspector {
    /// True when the input starts with the ZIP local-file-header signature.
    /// An empty-archive marker (`PK\x05\x06`) is not accepted: a
    /// presentation container always has entries.
    pub fn has_zip_signature(data: &[u8]) -> bool {
        data.len() >= 4 && data[0..4] == [0x50, 0x4B, 0x03, 0x04]
    }

    /// Enumerate entry metadata in a single pass over the central directory.
    ///
    /// Fails with [`PipelineError::MalformedArchive`] when the signature or
    /// the central directory is unreadable.
    pub fn inspect(data: &[u8]) -> Result<Vec<ArchiveEntry>, PipelineError> {
        if !Self::has_zip_signature(data) {
            return Err(PipelineError::MalformedArchive(
                "input does not start with a ZIP signature".to_string(),
            ));
        }

        let mut archive = ZipArchive::new(Cursor::new(data)).map_err(|e| {
            PipelineError::MalformedArchive(format!("unreadable central directory: {}", e))
        })?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            // by_index_raw hands back metadata without setting up a
            // decompressing reader.
            let entry = archive.by_index_raw(index).map_err(|e| {
                PipelineError::MalformedArchive(format!("unreadable entry {}: {}", index, e))
            })?;

            let path = entry.name().to_string();
            let declared = entry.size();
            let compressed = entry.compressed_size();
            let size_is_declared = declared > 0 || entry.is_dir();
            let uncompressed = if size_is_declared {
                declared
            } else {
                UNKNOWN_SIZE_ESTIMATE
            };

            entries.push(ArchiveEntry {
                is_nested_archive: has_nested_archive_extension(&path),
                path,
                compressed_size: compressed,
                uncompressed_size: uncompressed,
                size_is_declared,
            });
        }

        Ok(entries)
    }
}

fn has_nested_archive_extension(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .map(|e| NESTED_ARCHIVE_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or(false)
}

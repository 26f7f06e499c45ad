//! Converter binary discovery.
//!
//! Resolution order: explicit override, then the cached result of a prior
//! successful lookup, then a fixed list of well-known install locations,
//! each probed with a short version-check timeout. The cache is
//! single-assignment: computed once, shared immutably for the process
//! lifetime. Discovery sits behind a trait so tests and embedders can
//! substitute their own resolution.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use deckpress_core::PipelineError;
use tokio::process::Command;
use tokio::sync::OnceCell;

/// Which external tool is being located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Document-to-PDF converter (LibreOffice).
    Soffice,
    /// PDF-to-PNG rasterizer (Poppler).
    Pdftoppm,
}

impl ToolKind {
    pub fn binary_name(&self) -> &'static str {
        match self {
            ToolKind::Soffice => "soffice",
            ToolKind::Pdftoppm => "pdftoppm",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolKind::Soffice => "--version",
            ToolKind::Pdftoppm => "-v",
        }
    }

    fn well_known_paths(&self) -> Vec<PathBuf> {
        let names: &[&str] = match self {
            ToolKind::Soffice => &[
                "/usr/bin/soffice",
                "/usr/local/bin/soffice",
                "/opt/libreoffice/program/soffice",
                "/snap/bin/libreoffice",
                "/Applications/LibreOffice.app/Contents/MacOS/soffice",
                "C:\\Program Files\\LibreOffice\\program\\soffice.exe",
            ],
            ToolKind::Pdftoppm => &[
                "/usr/bin/pdftoppm",
                "/usr/local/bin/pdftoppm",
                "/opt/homebrew/bin/pdftoppm",
                "C:\\Program Files\\poppler\\bin\\pdftoppm.exe",
            ],
        };
        names.iter().map(PathBuf::from).collect()
    }

    pub fn not_found(&self, detail: String) -> PipelineError {
        match self {
            ToolKind::Soffice => PipelineError::ConverterNotFound(detail),
            ToolKind::Pdftoppm => PipelineError::RasterizerNotFound(detail),
        }
    }
}

/// Resolves the path of an external tool.
#[async_trait]
pub trait BinaryLocator: Send + Sync {
    async fn locate(&self) -> Result<PathBuf, PipelineError>;
    fn tool(&self) -> ToolKind;
}

/// Locator that always returns a fixed path. Used by tests and by embedders
/// that manage their own tool installation.
pub struct FixedLocator {
    tool: ToolKind,
    path: PathBuf,
}

impl FixedLocator {
    pub fn new(tool: ToolKind, path: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            path: path.into(),
        }
    }
}

#[async_trait]
impl BinaryLocator for FixedLocator {
    async fn locate(&self) -> Result<PathBuf, PipelineError> {
        Ok(self.path.clone())
    }

    fn tool(&self) -> ToolKind {
        self.tool
    }
}

/// Production locator: override, cache, then well-known locations.
pub struct WellKnownLocator {
    tool: ToolKind,
    override_path: Option<PathBuf>,
    probe_timeout: Duration,
    resolved: OnceCell<PathBuf>,
}

impl WellKnownLocator {
    pub fn new(tool: ToolKind, override_path: Option<PathBuf>, probe_timeout: Duration) -> Self {
        Self {
            tool,
            override_path,
            probe_timeout,
            resolved: OnceCell::new(),
        }
    }

    async fn discover(&self) -> Result<PathBuf, PipelineError> {
        for candidate in self.tool.well_known_paths() {
            if !candidate.exists() {
                continue;
            }
            if probe_binary(&candidate, self.tool.version_arg(), self.probe_timeout).await {
                tracing::info!(
                    tool = self.tool.binary_name(),
                    path = %candidate.display(),
                    "Resolved converter binary"
                );
                return Ok(candidate);
            }
            tracing::warn!(
                tool = self.tool.binary_name(),
                path = %candidate.display(),
                "Candidate binary failed version probe"
            );
        }
        Err(self.tool.not_found(format!(
            "{} not found in any well-known location",
            self.tool.binary_name()
        )))
    }
}

#[async_trait]
impl BinaryLocator for WellKnownLocator {
    async fn locate(&self) -> Result<PathBuf, PipelineError> {
        // An explicit override is authoritative: it is never probed away and
        // never falls back to discovery.
        if let Some(path) = &self.override_path {
            if path.exists() {
                return Ok(path.clone());
            }
            return Err(self.tool.not_found(format!(
                "configured override does not exist: {}",
                path.display()
            )));
        }

        self.resolved
            .get_or_try_init(|| self.discover())
            .await
            .map(|path| path.clone())
    }

    fn tool(&self) -> ToolKind {
        self.tool
    }
}

/// Run `<binary> <version-arg>` under a short timeout. A tool that cannot
/// print its version within the window is treated as unusable.
async fn probe_binary(path: &Path, version_arg: &str, timeout: Duration) -> bool {
    let child = Command::new(path)
        .arg(version_arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    match tokio::time::timeout(timeout, child).await {
        Ok(Ok(status)) => status.success(),
        Ok(Err(_)) | Err(_) => false,
    }
}

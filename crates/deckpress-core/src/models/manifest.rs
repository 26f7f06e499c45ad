//! Deck manifest: the pipeline's externally visible artifact.
//!
//! Written once per job and treated as immutable thereafter; regenerating a
//! deck always happens under a new job id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::ComplianceSignal;

/// One slide in the manifest. `image` is relative to the manifest's own
/// directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideManifestEntry {
    pub id: usize,
    pub image: String,
    pub title: String,
    pub text: String,
    pub notes: String,
    #[serde(rename = "suggestedDurationSec")]
    pub suggested_duration_sec: f64,
}

/// Document-level block carried alongside the slides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestDocument {
    pub title: Option<String>,
    pub author: Option<String>,
    pub palette: Vec<String>,
    pub fonts: Vec<String>,
    pub compliance: Vec<ComplianceSignal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckManifest {
    pub deck_id: Uuid,
    pub source_file: String,
    pub job_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub slides: Vec<SlideManifestEntry>,
    #[serde(default)]
    pub document: ManifestDocument,
}

impl DeckManifest {
    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }
}

//! Parsed-document model: the structured result of one container parse.
//!
//! A `ParsedDocument` is owned by the job that produced it and is released
//! once the assembler has consumed it. Per-slide failures are first-class
//! values (`SlideOutcome::Skipped`) rather than exceptions, so a corrupt
//! slide never aborts the document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::slide::Slide;

/// Number of placeholder slides in a fallback document.
pub const PLACEHOLDER_SLIDE_COUNT: usize = 3;

/// One embedded binary asset (image or other media) extracted from the
/// container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    /// Container path of the media part, unique within the document.
    pub id: String,
    pub mime: String,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub byte_len: usize,
}

impl Asset {
    pub fn new(id: String, mime: String, data: Vec<u8>) -> Self {
        let byte_len = data.len();
        Self {
            id,
            mime,
            data,
            byte_len,
        }
    }
}

/// Per-slide parse outcome: either an extracted slide or a recorded skip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SlideOutcome {
    Extracted(Slide),
    Skipped { index: usize, reason: String },
}

impl SlideOutcome {
    pub fn index(&self) -> usize {
        match self {
            SlideOutcome::Extracted(slide) => slide.index,
            SlideOutcome::Skipped { index, .. } => *index,
        }
    }

    pub fn as_slide(&self) -> Option<&Slide> {
        match self {
            SlideOutcome::Extracted(slide) => Some(slide),
            SlideOutcome::Skipped { .. } => None,
        }
    }

    pub fn as_slide_mut(&mut self) -> Option<&mut Slide> {
        match self {
            SlideOutcome::Extracted(slide) => Some(slide),
            SlideOutcome::Skipped { .. } => None,
        }
    }
}

/// Document-level metadata from the container's core properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub title: Option<String>,
    pub author: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

/// Design tokens derived from the container's theme part.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DesignTokens {
    /// Theme color palette as RRGGBB hex strings, scheme order preserved.
    pub palette: Vec<String>,
    /// Distinct font families, major typeface first.
    pub fonts: Vec<String>,
}

/// One compliance-topic detection result. Confidence is the fraction of the
/// topic's keyword set observed anywhere in the document text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceSignal {
    pub topic: String,
    pub confidence: f64,
    pub matched: Vec<String>,
}

/// The structured result of parsing one presentation container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub slides: Vec<SlideOutcome>,
    /// Slide index -> outbound media relationships (resolved part paths).
    pub relationships: HashMap<usize, Vec<String>>,
    pub assets: Vec<Asset>,
    pub meta: DocumentMeta,
    pub design: DesignTokens,
    /// Non-fatal conditions recorded during parsing (truncation, skipped
    /// parts, unreadable theme, ...).
    pub warnings: Vec<String>,
    /// Filled in by the content analyzer.
    pub compliance: Vec<ComplianceSignal>,
}

impl ParsedDocument {
    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    pub fn extracted_slides(&self) -> impl Iterator<Item = &Slide> {
        self.slides.iter().filter_map(SlideOutcome::as_slide)
    }

    /// All visible text in slide order, used by the content analyzer.
    pub fn full_text(&self) -> String {
        let mut text = String::new();
        for slide in self.extracted_slides() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&slide.visible_text());
        }
        text
    }

    /// Deterministic fallback document used when a validator-passing archive
    /// cannot be parsed at all. Its content and trigger conditions are part
    /// of the public contract, so it is an explicit constructor rather than
    /// a catch-all.
    pub fn placeholder(reason: &str) -> Self {
        let texts = [
            "This presentation could not be read.",
            "The file passed safety checks but its contents were not in a readable presentation format.",
            "Please re-export the presentation and upload it again.",
        ];
        let slides = texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let mut slide = Slide::new(i + 1);
                slide.title = Some("Import problem".to_string());
                slide.body = text.to_string();
                SlideOutcome::Extracted(slide)
            })
            .collect();

        Self {
            slides,
            warnings: vec![format!("fallback document generated: {}", reason)],
            ..Default::default()
        }
    }
}

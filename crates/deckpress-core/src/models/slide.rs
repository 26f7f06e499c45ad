//! Slide content model: text runs with formatting, referenced images with
//! placement, and typed placeholders for tables/charts.

use serde::{Deserialize, Serialize};

/// Formatting attributes of a single text run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    /// Font size in points, when declared on the run.
    pub font_size_pt: Option<f32>,
    /// Solid-fill color as an RRGGBB hex string, when declared.
    pub color: Option<String>,
}

/// One contiguous run of identically formatted text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextRun {
    pub text: String,
    #[serde(default)]
    pub style: RunStyle,
}

/// Placement rectangle in the container's native units (EMUs).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// Reference from a slide to an embedded media asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRef {
    /// Asset identifier (the resolved media part path).
    pub asset_id: String,
    pub rect: Option<Rect>,
}

/// Table detected on a slide. Cell extraction is deferred; dimensions are
/// recorded when present in the markup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TablePlaceholder {
    pub rows: usize,
    pub cols: usize,
}

/// Chart detected on a slide.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartPlaceholder {
    pub chart_type: Option<String>,
}

/// One extracted slide.
///
/// `index` is 1-based and contiguous within a document. `word_count` and
/// `suggested_duration_secs` are filled in by the content analyzer and are
/// always recomputed from the current text, never carried over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slide {
    pub index: usize,
    pub title: Option<String>,
    pub body: String,
    pub runs: Vec<TextRun>,
    pub images: Vec<ImageRef>,
    pub tables: Vec<TablePlaceholder>,
    pub charts: Vec<ChartPlaceholder>,
    /// Transition/animation hints ("fade", "wipe", ...), one per declared
    /// effect.
    pub transitions: Vec<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub word_count: usize,
    #[serde(default)]
    pub suggested_duration_secs: f64,
}

impl Slide {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            title: None,
            body: String::new(),
            runs: Vec::new(),
            images: Vec::new(),
            tables: Vec::new(),
            charts: Vec::new(),
            transitions: Vec::new(),
            notes: None,
            word_count: 0,
            suggested_duration_secs: 0.0,
        }
    }

    /// Title and body joined, the text the analyzer operates on.
    pub fn visible_text(&self) -> String {
        match &self.title {
            Some(title) if !title.trim().is_empty() => format!("{}\n{}", title, self.body),
            _ => self.body.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_text_includes_title() {
        let mut slide = Slide::new(1);
        slide.title = Some("Welcome".to_string());
        slide.body = "Agenda for today".to_string();
        assert_eq!(slide.visible_text(), "Welcome\nAgenda for today");
    }

    #[test]
    fn test_visible_text_skips_blank_title() {
        let mut slide = Slide::new(1);
        slide.title = Some("   ".to_string());
        slide.body = "Body only".to_string();
        assert_eq!(slide.visible_text(), "Body only");
    }

    #[test]
    fn test_run_style_default_is_plain() {
        let style = RunStyle::default();
        assert!(!style.bold && !style.italic && !style.underline);
        assert!(style.font_size_pt.is_none());
        assert!(style.color.is_none());
    }

    #[test]
    fn test_slide_serializes_round_trip() {
        let mut slide = Slide::new(3);
        slide.runs.push(TextRun {
            text: "Bold claim".to_string(),
            style: RunStyle {
                bold: true,
                ..Default::default()
            },
        });
        slide.images.push(ImageRef {
            asset_id: "ppt/media/image1.png".to_string(),
            rect: Some(Rect {
                x: 914400,
                y: 914400,
                width: 1828800,
                height: 914400,
            }),
        });
        let json = serde_json::to_string(&slide).unwrap();
        let back: Slide = serde_json::from_str(&json).unwrap();
        assert_eq!(back.index, 3);
        assert!(back.runs[0].style.bold);
        assert_eq!(back.images[0].rect.unwrap().width, 1828800);
    }
}

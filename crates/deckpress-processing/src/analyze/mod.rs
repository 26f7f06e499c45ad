//! Content analysis: derived per-slide durations and compliance signals.
//!
//! Everything here is a pure function of the document's current text and
//! image counts. Running the analyzer twice always produces identical
//! results.

use deckpress_core::models::{ComplianceSignal, ParsedDocument};
use regex::RegexBuilder;

/// Fixed compliance topics. Each topic scores independently: confidence is
/// the fraction of its keyword set observed anywhere in the document text.
const COMPLIANCE_TOPICS: &[(&str, &[&str])] = &[
    (
        "data_privacy",
        &[
            "gdpr",
            "lgpd",
            "personal data",
            "consent",
            "data subject",
            "retention",
            "anonymization",
        ],
    ),
    (
        "information_security",
        &[
            "phishing",
            "password",
            "encryption",
            "two-factor",
            "malware",
            "access control",
        ],
    ),
    (
        "workplace_safety",
        &[
            "protective equipment",
            "hazard",
            "incident report",
            "evacuation",
            "first aid",
        ],
    ),
    (
        "anti_corruption",
        &[
            "bribery",
            "kickback",
            "conflict of interest",
            "gift policy",
            "facilitation payment",
        ],
    ),
    (
        "harassment_prevention",
        &[
            "harassment",
            "discrimination",
            "retaliation",
            "code of conduct",
            "reporting channel",
        ],
    ),
];

/// Duration heuristic parameters.
#[derive(Debug, Clone)]
pub struct ContentAnalyzer {
    pub floor_secs: f64,
    pub per_word_secs: f64,
    pub per_image_secs: f64,
    pub per_animation_secs: f64,
    pub ceiling_secs: f64,
}

impl Default for ContentAnalyzer {
    fn default() -> Self {
        Self {
            floor_secs: 4.0,
            per_word_secs: 0.4,
            per_image_secs: 1.5,
            per_animation_secs: 0.5,
            ceiling_secs: 30.0,
        }
    }
}

impl ContentAnalyzer {
    /// Augment the document in place: word counts, suggested durations,
    /// document-level compliance signals. Idempotent.
    pub fn analyze(&self, document: &mut ParsedDocument) {
        for outcome in document.slides.iter_mut() {
            if let Some(slide) = outcome.as_slide_mut() {
                let words = count_words(&slide.visible_text());
                slide.word_count = words;
                slide.suggested_duration_secs =
                    self.suggested_duration(words, slide.images.len(), slide.transitions.len());
            }
        }

        let text = document.full_text();
        document.compliance = score_compliance_topics(&text);

        tracing::debug!(
            slides = document.slide_count(),
            topics_matched = document
                .compliance
                .iter()
                .filter(|signal| signal.confidence > 0.0)
                .count(),
            "Content analysis complete"
        );
    }

    /// Monotonic in word, image, and animation counts; clamped to
    /// [floor, ceiling].
    pub fn suggested_duration(
        &self,
        word_count: usize,
        image_count: usize,
        animation_count: usize,
    ) -> f64 {
        let raw = self.floor_secs
            + self.per_word_secs * word_count as f64
            + self.per_image_secs * image_count as f64
            + self.per_animation_secs * animation_count as f64;
        raw.clamp(self.floor_secs, self.ceiling_secs)
    }
}

/// Whitespace-delimited word count.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Score every topic against the document text. Matching is case-insensitive
/// on word boundaries; topics are independent of each other.
pub fn score_compliance_topics(text: &str) -> Vec<ComplianceSignal> {
    COMPLIANCE_TOPICS
        .iter()
        .map(|(topic, keywords)| {
            let matched: Vec<String> = keywords
                .iter()
                .filter(|keyword| keyword_present(text, keyword))
                .map(|keyword| keyword.to_string())
                .collect();
            ComplianceSignal {
                topic: topic.to_string(),
                confidence: matched.len() as f64 / keywords.len() as f64,
                matched,
            }
        })
        .collect()
}

fn keyword_present(text: &str, keyword: &str) -> bool {
    let pattern = format!(r"\b{}\b", regex::escape(keyword));
    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(re) => re.is_match(text),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckpress_core::models::{ImageRef, Slide, SlideOutcome};

    fn doc_with_body(body: &str) -> ParsedDocument {
        let mut document = ParsedDocument::default();
        let mut slide = Slide::new(1);
        slide.body = body.to_string();
        document.slides.push(SlideOutcome::Extracted(slide));
        document
    }

    #[test]
    fn test_duration_floor() {
        let analyzer = ContentAnalyzer::default();
        assert_eq!(analyzer.suggested_duration(0, 0, 0), 4.0);
    }

    #[test]
    fn test_duration_ceiling() {
        let analyzer = ContentAnalyzer::default();
        assert_eq!(analyzer.suggested_duration(1000, 10, 5), 30.0);
    }

    #[test]
    fn test_duration_monotonic_in_all_inputs() {
        let analyzer = ContentAnalyzer::default();
        let mut last = 0.0;
        for words in [0, 5, 10, 20, 40] {
            let duration = analyzer.suggested_duration(words, 0, 0);
            assert!(duration >= last);
            last = duration;
        }
        assert!(analyzer.suggested_duration(10, 2, 0) > analyzer.suggested_duration(10, 0, 0));
        assert!(analyzer.suggested_duration(10, 0, 2) > analyzer.suggested_duration(10, 0, 0));
    }

    #[test]
    fn test_duration_formula() {
        let analyzer = ContentAnalyzer::default();
        // 4.0 + 10 * 0.4 + 1 * 1.5 + 1 * 0.5 = 10.0
        assert!((analyzer.suggested_duration(10, 1, 1) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_analyze_fills_word_count_and_duration() {
        let analyzer = ContentAnalyzer::default();
        let mut document = doc_with_body("one two three four five");
        if let Some(slide) = document.slides[0].as_slide_mut() {
            slide.images.push(ImageRef {
                asset_id: "ppt/media/image1.png".to_string(),
                rect: None,
            });
        }
        analyzer.analyze(&mut document);
        let slide = document.slides[0].as_slide().unwrap();
        assert_eq!(slide.word_count, 5);
        assert!((slide.suggested_duration_secs - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_analyze_is_idempotent() {
        let analyzer = ContentAnalyzer::default();
        let mut document =
            doc_with_body("phishing awareness training covers password hygiene and consent");
        analyzer.analyze(&mut document);
        let first = serde_json::to_string(&document).unwrap();
        analyzer.analyze(&mut document);
        let second = serde_json::to_string(&document).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_compliance_fraction_per_topic() {
        let signals = score_compliance_topics("We cover phishing and password rules.");
        let infosec = signals
            .iter()
            .find(|s| s.topic == "information_security")
            .unwrap();
        // 2 of 6 keywords matched
        assert!((infosec.confidence - 2.0 / 6.0).abs() < 1e-9);
        assert_eq!(infosec.matched.len(), 2);

        let privacy = signals.iter().find(|s| s.topic == "data_privacy").unwrap();
        assert_eq!(privacy.confidence, 0.0);
    }

    #[test]
    fn test_compliance_topics_are_independent() {
        let signals =
            score_compliance_topics("GDPR consent rules and harassment reporting channel");
        let privacy = signals.iter().find(|s| s.topic == "data_privacy").unwrap();
        let harassment = signals
            .iter()
            .find(|s| s.topic == "harassment_prevention")
            .unwrap();
        assert!(privacy.confidence > 0.0);
        assert!(harassment.confidence > 0.0);
    }

    #[test]
    fn test_compliance_matching_is_case_insensitive_word_bound() {
        let signals = score_compliance_topics("GDPR applies. Passwordless is different.");
        let privacy = signals.iter().find(|s| s.topic == "data_privacy").unwrap();
        assert!(privacy.matched.contains(&"gdpr".to_string()));
        let infosec = signals
            .iter()
            .find(|s| s.topic == "information_security")
            .unwrap();
        // "Passwordless" must not match "password" on a word boundary
        assert!(!infosec.matched.contains(&"password".to_string()));
    }

    #[test]
    fn test_skipped_slides_are_ignored() {
        let analyzer = ContentAnalyzer::default();
        let mut document = ParsedDocument::default();
        document.slides.push(SlideOutcome::Skipped {
            index: 1,
            reason: "corrupt".to_string(),
        });
        analyzer.analyze(&mut document);
        assert_eq!(document.compliance.len(), 5);
        assert!(document.compliance.iter().all(|s| s.confidence == 0.0));
    }
}

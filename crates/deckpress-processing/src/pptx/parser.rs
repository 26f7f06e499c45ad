//! Top-level container parse: validated bytes -> `ParsedDocument`.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use deckpress_core::models::{
    Asset, ImageRef, ParsedDocument, Slide, SlideOutcome, ValidationReport,
};
use deckpress_core::{PipelineConfig, PipelineError};

use super::package::{PartLimits, PartReadError, PptxPackage};
use super::rels::{extract_part_number, parse_relationships, resolve_target, Relationship};
use super::slide::{extract_all_text, walk_slide_xml, WalkBudget};
use super::theme::{parse_core_properties, parse_theme};
use super::{CONTENT_TYPES_PART, PRESENTATION_PART};

/// Caps applied during one document parse.
#[derive(Debug, Clone)]
pub struct ParserLimits {
    pub max_part_bytes: u64,
    pub part_timeout: Duration,
    pub max_images_per_slide: usize,
    pub max_slide_text_chars: usize,
    /// Ceiling for one embedded media asset (media may exceed the XML part
    /// ceiling; it is still bounded by the validated per-entry limit).
    pub max_media_bytes: u64,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_part_bytes: 1024 * 1024,
            part_timeout: Duration::from_secs(5),
            max_images_per_slide: 20,
            max_slide_text_chars: 20_000,
            max_media_bytes: 50 * 1024 * 1024,
        }
    }
}

impl From<&PipelineConfig> for ParserLimits {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_part_bytes: config.max_part_bytes,
            part_timeout: Duration::from_secs(config.part_parse_timeout_secs),
            max_images_per_slide: config.max_images_per_slide,
            max_slide_text_chars: config.max_slide_text_chars,
            max_media_bytes: config.max_entry_bytes,
        }
    }
}

#[derive(Clone)]
pub struct ContainerParser {
    limits: ParserLimits,
}

impl ContainerParser {
    pub fn new(limits: ParserLimits) -> Self {
        Self { limits }
    }

    /// Parse a container that already passed security validation.
    ///
    /// A failed report is a caller bug and is rejected with the report's own
    /// violations. A missing required part is a hard error; any other total
    /// failure degrades to the deterministic placeholder document so
    /// downstream stages always have input.
    pub fn parse(
        &self,
        data: &[u8],
        report: &ValidationReport,
    ) -> Result<ParsedDocument, PipelineError> {
        if !report.passed {
            return Err(PipelineError::SecurityLimitExceeded {
                violations: report.violations.clone(),
            });
        }

        let part_limits = PartLimits {
            max_part_bytes: self.limits.max_part_bytes,
            part_timeout: self.limits.part_timeout,
        };
        let mut package = match PptxPackage::open(data, part_limits) {
            Ok(package) => package,
            Err(e) => {
                tracing::warn!(error = %e, "Validated archive no longer readable, using fallback document");
                return Ok(ParsedDocument::placeholder("container unreadable"));
            }
        };

        for required in [CONTENT_TYPES_PART, PRESENTATION_PART] {
            if !package.has_part(required) {
                return Err(PipelineError::RequiredPartMissing {
                    part: required.to_string(),
                });
            }
        }

        let mut document = ParsedDocument::default();

        let slide_paths = match self.ordered_slide_paths(&mut package) {
            Ok(paths) if !paths.is_empty() => paths,
            Ok(_) => {
                tracing::warn!("Presentation declares no slides, using fallback document");
                return Ok(ParsedDocument::placeholder("no slides declared"));
            }
            Err(reason) => {
                tracing::warn!(reason = %reason, "Slide list unreadable, using fallback document");
                return Ok(ParsedDocument::placeholder(&reason));
            }
        };

        let mut seen_assets: HashSet<String> = HashSet::new();

        for (position, slide_path) in slide_paths.iter().enumerate() {
            let index = position + 1;
            match self.parse_slide(&mut package, slide_path, index, &mut document, &mut seen_assets)
            {
                Ok(slide) => {
                    document.slides.push(SlideOutcome::Extracted(slide));
                }
                Err(reason) => {
                    tracing::warn!(slide = index, part = %slide_path, reason = %reason, "Slide skipped");
                    document.warnings.push(format!(
                        "slide {} skipped: {} ({})",
                        index, reason, slide_path
                    ));
                    document.slides.push(SlideOutcome::Skipped { index, reason });
                }
            }
        }

        self.parse_document_extras(&mut package, &mut document);

        Ok(document)
    }

    /// Slide part paths in presentation order. Order comes from the sldIdLst
    /// in the presentation part when present, falling back to numeric rId
    /// ordering of the slide relationships.
    fn ordered_slide_paths(&self, package: &mut PptxPackage<'_>) -> Result<Vec<String>, String> {
        let rels_xml = package
            .read_part("ppt/_rels/presentation.xml.rels")
            .map_err(|e| e.to_string())?;
        let relationships = parse_relationships(&rels_xml).map_err(|e| e.to_string())?;

        let slide_rels: Vec<&Relationship> =
            relationships.iter().filter(|r| r.is_slide()).collect();

        let by_id: HashMap<&str, &Relationship> = slide_rels
            .iter()
            .map(|r| (r.id.as_str(), *r))
            .collect();

        // Explicit order from the presentation descriptor.
        let mut ordered: Vec<String> = Vec::new();
        if let Ok(presentation_xml) = package.read_part(PRESENTATION_PART) {
            for rid in sld_id_list(&presentation_xml) {
                if let Some(rel) = by_id.get(rid.as_str()) {
                    ordered.push(resolve_target("ppt", &rel.target));
                }
            }
        }

        if ordered.is_empty() {
            let mut numbered: Vec<(Option<usize>, String)> = slide_rels
                .iter()
                .map(|r| {
                    let number =
                        extract_part_number(&r.id).or_else(|| extract_part_number(&r.target));
                    (number, resolve_target("ppt", &r.target))
                })
                .collect();
            numbered.sort_by(|a, b| match (a.0, b.0) {
                (Some(na), Some(nb)) => na.cmp(&nb),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => a.1.cmp(&b.1),
            });
            ordered = numbered.into_iter().map(|(_, path)| path).collect();
        }

        Ok(ordered)
    }

    fn parse_slide(
        &self,
        package: &mut PptxPackage<'_>,
        slide_path: &str,
        index: usize,
        document: &mut ParsedDocument,
        seen_assets: &mut HashSet<String>,
    ) -> Result<Slide, String> {
        let budget = WalkBudget {
            deadline: Instant::now() + self.limits.part_timeout,
            max_text_bytes: self.limits.max_slide_text_chars,
        };

        let xml = package
            .read_part(slide_path)
            .map_err(|e| e.to_string())?;
        let content = walk_slide_xml(&xml, budget).map_err(|e| e.to_string())?;

        let mut slide = Slide::new(index);
        slide.title = content.title;
        slide.body = content.body;
        slide.runs = content.runs;
        slide.tables = content.tables;
        slide.charts = content.charts;
        slide.transitions = content.transitions;
        if content.truncated {
            document
                .warnings
                .push(format!("slide {} text truncated at budget", index));
        }

        // Resolve embeds through the slide's own relationship part.
        let slide_rels = self.slide_relationships(package, slide_path);
        let slide_dir = parent_dir(slide_path);

        let mut pictures = content.pictures;
        if pictures.len() > self.limits.max_images_per_slide {
            document.warnings.push(format!(
                "slide {} images truncated to {}",
                index, self.limits.max_images_per_slide
            ));
            pictures.truncate(self.limits.max_images_per_slide);
        }

        let mut media_paths = Vec::new();
        for picture in pictures {
            let Some(rel) = slide_rels.iter().find(|r| r.id == picture.rid) else {
                document.warnings.push(format!(
                    "slide {}: unresolved image relationship {}",
                    index, picture.rid
                ));
                continue;
            };
            let media_path = resolve_target(slide_dir, &rel.target);

            if !seen_assets.contains(&media_path) {
                match package.read_media(&media_path, self.limits.max_media_bytes) {
                    Ok(data) => {
                        seen_assets.insert(media_path.clone());
                        document.assets.push(Asset::new(
                            media_path.clone(),
                            mime_for_path(&media_path).to_string(),
                            data,
                        ));
                    }
                    Err(e) => {
                        document.warnings.push(format!(
                            "slide {}: media unreadable: {}",
                            index, e
                        ));
                        continue;
                    }
                }
            }

            slide.images.push(ImageRef {
                asset_id: media_path.clone(),
                rect: picture.rect,
            });
            media_paths.push(media_path);
        }
        if !media_paths.is_empty() {
            document.relationships.insert(index, media_paths);
        }

        // Speaker notes are best-effort: a bad notes part costs a warning.
        if let Some(notes_rel) = slide_rels.iter().find(|r| r.is_notes_slide()) {
            let notes_path = resolve_target(slide_dir, &notes_rel.target);
            let notes_budget = WalkBudget {
                deadline: Instant::now() + self.limits.part_timeout,
                max_text_bytes: self.limits.max_slide_text_chars,
            };
            match package.read_part(&notes_path) {
                Ok(notes_xml) => match extract_all_text(&notes_xml, notes_budget) {
                    Ok(text) if !text.is_empty() => slide.notes = Some(text),
                    Ok(_) => {}
                    Err(e) => document
                        .warnings
                        .push(format!("slide {}: notes unreadable: {}", index, e)),
                },
                Err(e) => document
                    .warnings
                    .push(format!("slide {}: notes unreadable: {}", index, e)),
            }
        }

        Ok(slide)
    }

    fn slide_relationships(
        &self,
        package: &mut PptxPackage<'_>,
        slide_path: &str,
    ) -> Vec<Relationship> {
        let rels_path = rels_path_for(slide_path);
        match package.read_part(&rels_path) {
            Ok(xml) => parse_relationships(&xml).unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    /// Theme tokens and core properties. Optional parts; failures downgrade
    /// to warnings.
    fn parse_document_extras(&self, package: &mut PptxPackage<'_>, document: &mut ParsedDocument) {
        match package.read_part("ppt/theme/theme1.xml") {
            Ok(xml) => match parse_theme(&xml) {
                Ok(tokens) => document.design = tokens,
                Err(e) => document.warnings.push(format!("theme unreadable: {}", e)),
            },
            Err(PartReadError::Missing(_)) => {}
            Err(e) => document.warnings.push(format!("theme unreadable: {}", e)),
        }

        match package.read_part("docProps/core.xml") {
            Ok(xml) => match parse_core_properties(&xml) {
                Ok(meta) => document.meta = meta,
                Err(e) => document
                    .warnings
                    .push(format!("core properties unreadable: {}", e)),
            },
            Err(PartReadError::Missing(_)) => {}
            Err(e) => document
                .warnings
                .push(format!("core properties unreadable: {}", e)),
        }
    }
}

/// `ppt/slides/slide1.xml` -> `ppt/slides/_rels/slide1.xml.rels`
fn rels_path_for(part_path: &str) -> String {
    match part_path.rsplit_once('/') {
        Some((dir, name)) => format!("{}/_rels/{}.rels", dir, name),
        None => format!("_rels/{}.rels", part_path),
    }
}

fn parent_dir(part_path: &str) -> &str {
    part_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn mime_for_path(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "wmf" => "image/x-wmf",
        "emf" => "image/x-emf",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Pull the ordered r:id list out of the presentation part's sldIdLst.
fn sld_id_list(xml: &str) -> Vec<String> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    let mut in_list = false;
    let mut ids = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let name = e.name();
                let local = match name.as_ref().iter().position(|&b| b == b':') {
                    Some(pos) => &name.as_ref()[pos + 1..],
                    None => name.as_ref(),
                };
                match local {
                    b"sldIdLst" => in_list = true,
                    b"sldId" if in_list => {
                        for attr in e.attributes().flatten() {
                            let key = attr.key.as_ref();
                            let key_local = match key.iter().position(|&b| b == b':') {
                                Some(pos) => &key[pos + 1..],
                                None => key,
                            };
                            if key_local == b"id" && key != b"id" {
                                // r:id, not the numeric slide id attribute
                                ids.push(String::from_utf8_lossy(&attr.value).to_string());
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.name();
                if name.as_ref().ends_with(b"sldIdLst") {
                    in_list = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break, // order falls back to rId numbering
            _ => {}
        }
    }

    ids
}

//! Relationship-part parsing and target resolution.
//!
//! Every part may carry a `_rels/<name>.rels` sibling mapping relationship
//! ids to targets. Slide ordering, embedded images, and speaker notes are
//! all resolved through these.

use quick_xml::events::Event;
use quick_xml::Reader;

use super::slide::XmlWalkError;

#[derive(Debug, Clone)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
}

impl Relationship {
    pub fn is_slide(&self) -> bool {
        self.rel_type.ends_with("/slide")
    }

    pub fn is_image(&self) -> bool {
        self.rel_type.ends_with("/image")
    }

    pub fn is_notes_slide(&self) -> bool {
        self.rel_type.ends_with("/notesSlide")
    }
}

/// Parse a relationships part into its entries, document order preserved.
pub fn parse_relationships(xml: &str) -> Result<Vec<Relationship>, XmlWalkError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut relationships = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"Relationship" =>
            {
                let mut id = String::new();
                let mut rel_type = String::new();
                let mut target = String::new();

                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Type" => rel_type = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Target" => target = String::from_utf8_lossy(&attr.value).to_string(),
                        _ => {}
                    }
                }

                if !id.is_empty() && !target.is_empty() {
                    relationships.push(Relationship {
                        id,
                        rel_type,
                        target,
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XmlWalkError::Syntax(e.to_string())),
            _ => {}
        }
    }

    Ok(relationships)
}

/// Resolve a relationship target against the directory of the part that owns
/// the relationship (e.g. `../media/image1.png` relative to `ppt/slides`).
/// Absolute targets (leading `/`) are container-root relative.
pub fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(stripped) = target.strip_prefix('/') {
        return stripped.to_string();
    }

    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Extract a trailing number from strings like `rId12` or `slide3.xml`,
/// used to order slides when the presentation part gives no explicit order.
pub fn extract_part_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");
    let digits: String = s
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .chars()
        .rev()
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

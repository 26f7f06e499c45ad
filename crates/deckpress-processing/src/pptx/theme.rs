//! Theme and core-properties parsing: design tokens and document metadata.

use chrono::{DateTime, Utc};
use deckpress_core::models::{DesignTokens, DocumentMeta};
use quick_xml::events::Event;
use quick_xml::Reader;

use super::slide::XmlWalkError;

fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().position(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

fn attr_value(e: &quick_xml::events::BytesStart<'_>, name: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if local_name(attr.key.as_ref()) == name {
            return Some(String::from_utf8_lossy(&attr.value).to_string());
        }
    }
    None
}

/// Extract the color scheme and major/minor typefaces from a theme part.
pub fn parse_theme(xml: &str) -> Result<DesignTokens, XmlWalkError> {
    let mut reader = Reader::from_str(xml);

    let mut tokens = DesignTokens::default();
    let mut in_clr_scheme = false;
    let mut in_font_scheme = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                b"clrScheme" => in_clr_scheme = true,
                b"fontScheme" => in_font_scheme = true,
                other => {
                    collect_theme_element(other, e, in_clr_scheme, in_font_scheme, &mut tokens)
                }
            },
            Ok(Event::Empty(ref e)) => {
                let name = e.name();
                collect_theme_element(
                    local_name(name.as_ref()),
                    e,
                    in_clr_scheme,
                    in_font_scheme,
                    &mut tokens,
                );
            }
            Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                b"clrScheme" => in_clr_scheme = false,
                b"fontScheme" => in_font_scheme = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(XmlWalkError::Syntax(e.to_string())),
            _ => {}
        }
    }

    Ok(tokens)
}

fn collect_theme_element(
    name: &[u8],
    e: &quick_xml::events::BytesStart<'_>,
    in_clr_scheme: bool,
    in_font_scheme: bool,
    tokens: &mut DesignTokens,
) {
    match name {
        b"srgbClr" if in_clr_scheme => {
            if let Some(val) = attr_value(e, b"val") {
                tokens.palette.push(val.to_uppercase());
            }
        }
        // System colors carry their last rendered value.
        b"sysClr" if in_clr_scheme => {
            if let Some(val) = attr_value(e, b"lastClr") {
                tokens.palette.push(val.to_uppercase());
            }
        }
        b"latin" if in_font_scheme => {
            if let Some(face) = attr_value(e, b"typeface") {
                if !face.is_empty() && !tokens.fonts.contains(&face) {
                    tokens.fonts.push(face);
                }
            }
        }
        _ => {}
    }
}

/// Extract title/author/timestamps from `docProps/core.xml`.
pub fn parse_core_properties(xml: &str) -> Result<DocumentMeta, XmlWalkError> {
    let mut reader = Reader::from_str(xml);

    let mut meta = DocumentMeta::default();
    let mut current: Option<Vec<u8>> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e.name().as_ref()).to_vec();
                if matches!(name.as_slice(), b"title" | b"creator" | b"created" | b"modified") {
                    current = Some(name);
                }
            }
            Ok(Event::Text(ref e)) => {
                if let Some(field) = current.as_deref() {
                    let value = e.unescape().unwrap_or_default().to_string();
                    match field {
                        b"title" => meta.title = non_empty(value),
                        b"creator" => meta.author = non_empty(value),
                        b"created" => meta.created = parse_w3cdtf(&value),
                        b"modified" => meta.modified = parse_w3cdtf(&value),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) => break,
            Err(e) => return Err(XmlWalkError::Syntax(e.to_string())),
            _ => {}
        }
    }

    Ok(meta)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_w3cdtf(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    const THEME_XML: &str = r#"<?xml version="1.0"?>
<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office">
  <a:themeElements>
    <a:clrScheme name="Office">
      <a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1>
      <a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1>
      <a:dk2><a:srgbClr val="44546a"/></a:dk2>
      <a:accent1><a:srgbClr val="4472C4"/></a:accent1>
    </a:clrScheme>
    <a:fontScheme name="Office">
      <a:majorFont><a:latin typeface="Calibri Light"/></a:majorFont>
      <a:minorFont><a:latin typeface="Calibri"/></a:minorFont>
    </a:fontScheme>
  </a:themeElements>
</a:theme>"#;

    #[test]
    fn test_parse_theme_palette_in_scheme_order() {
        let tokens = parse_theme(THEME_XML).unwrap();
        assert_eq!(tokens.palette, vec!["000000", "FFFFFF", "44546A", "4472C4"]);
    }

    #[test]
    fn test_parse_theme_fonts_major_first() {
        let tokens = parse_theme(THEME_XML).unwrap();
        assert_eq!(tokens.fonts, vec!["Calibri Light", "Calibri"]);
    }

    #[test]
    fn test_parse_theme_ignores_colors_outside_scheme() {
        let xml = r#"<a:theme xmlns:a="a"><a:other><a:srgbClr val="123456"/></a:other></a:theme>"#;
        let tokens = parse_theme(xml).unwrap();
        assert!(tokens.palette.is_empty());
    }

    const CORE_XML: &str = r#"<?xml version="1.0"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties"
                   xmlns:dc="http://purl.org/dc/elements/1.1/"
                   xmlns:dcterms="http://purl.org/dc/terms/">
  <dc:title>Q3 Business Review</dc:title>
  <dc:creator>Dana Alves</dc:creator>
  <dcterms:created>2024-03-01T09:30:00Z</dcterms:created>
  <dcterms:modified>2024-03-05T17:00:00Z</dcterms:modified>
</cp:coreProperties>"#;

    #[test]
    fn test_parse_core_properties() {
        let meta = parse_core_properties(CORE_XML).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Q3 Business Review"));
        assert_eq!(meta.author.as_deref(), Some("Dana Alves"));
        let created = meta.created.unwrap();
        assert_eq!(created.to_rfc3339(), "2024-03-01T09:30:00+00:00");
        assert!(meta.modified.unwrap() > created);
    }

    #[test]
    fn test_parse_core_properties_tolerates_missing_fields() {
        let meta = parse_core_properties(r#"<cp:coreProperties xmlns:cp="c"/>"#).unwrap();
        assert!(meta.title.is_none());
        assert!(meta.created.is_none());
    }
}

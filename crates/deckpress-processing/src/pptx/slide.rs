//! Slide-part XML walking.
//!
//! Walks the shape tree of one slide part with a streaming reader: text runs
//! with their formatting from the paragraph/run hierarchy, picture embeds
//! with placement, table/chart placeholders. The walk carries a wall-clock
//! deadline and a text budget; blowing either aborts or truncates this part
//! only.

use std::time::Instant;

use deckpress_core::models::{
    ChartPlaceholder, Rect, RunStyle, TablePlaceholder, TextRun,
};
use quick_xml::events::Event;
use quick_xml::Reader;

/// Why a part walk stopped early.
#[derive(Debug, thiserror::Error)]
pub enum XmlWalkError {
    /// The per-part wall-clock deadline expired mid-walk.
    #[error("part parse deadline exceeded")]
    Deadline,

    #[error("XML syntax error: {0}")]
    Syntax(String),
}

/// Raw picture reference as found in the markup: relationship id plus
/// placement, resolved to a media part by the caller.
#[derive(Debug, Clone)]
pub struct PictureRef {
    pub rid: String,
    pub rect: Option<Rect>,
}

/// Everything extracted from one slide part.
#[derive(Debug, Default)]
pub struct SlideContent {
    pub title: Option<String>,
    pub body: String,
    pub runs: Vec<TextRun>,
    pub pictures: Vec<PictureRef>,
    pub tables: Vec<TablePlaceholder>,
    pub charts: Vec<ChartPlaceholder>,
    /// Transition hints, one entry per declared effect.
    pub transitions: Vec<String>,
    /// Set when the text budget was hit and further text was dropped.
    pub truncated: bool,
}

/// Caps applied while walking a single slide part.
#[derive(Debug, Clone, Copy)]
pub struct WalkBudget {
    pub deadline: Instant,
    pub max_text_bytes: usize,
}

struct PictureCtx {
    rid: Option<String>,
    off: Option<(i64, i64)>,
    ext: Option<(i64, i64)>,
}

/// Walk one slide part.
pub fn walk_slide_xml(xml: &str, budget: WalkBudget) -> Result<SlideContent, XmlWalkError> {
    // No trim_text here: leading/trailing spaces inside a run are meaningful
    // when adjacent runs are concatenated. Whitespace between elements never
    // reaches the buffers because text is only collected inside runs.
    let mut reader = Reader::from_str(xml);

    let mut content = SlideContent::default();
    let mut title_buf = String::new();

    let mut sp_depth = 0usize;
    let mut shape_is_title = false;
    let mut in_tx_body = false;
    let mut in_paragraph = false;
    let mut in_run = false;
    let mut in_run_props = false;
    let mut in_text = false;
    let mut current_run: Option<TextRun> = None;
    let mut picture: Option<PictureCtx> = None;
    let mut table: Option<TablePlaceholder> = None;
    let mut transition_kind: Option<Option<String>> = None;

    loop {
        if Instant::now() > budget.deadline {
            return Err(XmlWalkError::Deadline);
        }

        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                // The first element inside p:transition names the effect.
                if let Some(kind) = transition_kind.as_mut() {
                    if kind.is_none() && local != b"transition" {
                        *kind = Some(String::from_utf8_lossy(local).to_string());
                    }
                }
                match local {
                    b"transition" => transition_kind = Some(None),
                    b"sp" => {
                        sp_depth += 1;
                        if sp_depth == 1 {
                            shape_is_title = false;
                        }
                    }
                    b"ph" if sp_depth > 0 => {
                        if placeholder_is_title(e) {
                            shape_is_title = true;
                        }
                    }
                    b"pic" => {
                        picture = Some(PictureCtx {
                            rid: None,
                            off: None,
                            ext: None,
                        });
                    }
                    b"blip" => {
                        if let (Some(pic), Some(rid)) = (picture.as_mut(), embed_rid(e)) {
                            pic.rid = Some(rid);
                        }
                    }
                    b"off" => {
                        if let Some(pic) = picture.as_mut() {
                            pic.off = read_point(e, b"x", b"y");
                        }
                    }
                    b"ext" => {
                        if let Some(pic) = picture.as_mut() {
                            pic.ext = read_point(e, b"cx", b"cy");
                        }
                    }
                    b"txBody" => in_tx_body = true,
                    b"p" if in_tx_body => in_paragraph = true,
                    b"r" if in_paragraph => {
                        in_run = true;
                        current_run = Some(TextRun {
                            text: String::new(),
                            style: RunStyle::default(),
                        });
                    }
                    b"rPr" if in_run => {
                        in_run_props = true;
                        if let Some(run) = current_run.as_mut() {
                            apply_run_properties(e, &mut run.style);
                        }
                    }
                    b"srgbClr" if in_run_props => {
                        if let (Some(run), Some(val)) = (current_run.as_mut(), attr_value(e, b"val"))
                        {
                            run.style.color = Some(val);
                        }
                    }
                    b"t" if in_run => in_text = true,
                    b"tbl" => {
                        table = Some(TablePlaceholder::default());
                    }
                    b"tr" => {
                        if let Some(t) = table.as_mut() {
                            t.rows += 1;
                        }
                    }
                    b"graphicData" => {
                        if attr_value(e, b"uri")
                            .map(|uri| uri.contains("/chart"))
                            .unwrap_or(false)
                        {
                            content.charts.push(ChartPlaceholder { chart_type: None });
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if let Some(kind) = transition_kind.as_mut() {
                    if kind.is_none() && local != b"transition" {
                        *kind = Some(String::from_utf8_lossy(local).to_string());
                    }
                }
                match local {
                    b"transition" => content.transitions.push("default".to_string()),
                    b"ph" if sp_depth > 0 => {
                        if placeholder_is_title(e) {
                            shape_is_title = true;
                        }
                    }
                    b"blip" => {
                        if let (Some(pic), Some(rid)) = (picture.as_mut(), embed_rid(e)) {
                            pic.rid = Some(rid);
                        }
                    }
                    b"off" => {
                        if let Some(pic) = picture.as_mut() {
                            pic.off = read_point(e, b"x", b"y");
                        }
                    }
                    b"ext" => {
                        if let Some(pic) = picture.as_mut() {
                            pic.ext = read_point(e, b"cx", b"cy");
                        }
                    }
                    b"rPr" if in_run => {
                        if let Some(run) = current_run.as_mut() {
                            apply_run_properties(e, &mut run.style);
                        }
                    }
                    b"srgbClr" if in_run_props => {
                        if let (Some(run), Some(val)) = (current_run.as_mut(), attr_value(e, b"val"))
                        {
                            run.style.color = Some(val);
                        }
                    }
                    b"gridCol" => {
                        if let Some(t) = table.as_mut() {
                            t.cols += 1;
                        }
                    }
                    b"graphicData" => {
                        if attr_value(e, b"uri")
                            .map(|uri| uri.contains("/chart"))
                            .unwrap_or(false)
                        {
                            content.charts.push(ChartPlaceholder { chart_type: None });
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_text {
                    let text = e.unescape().unwrap_or_default();
                    if let Some(run) = current_run.as_mut() {
                        run.text.push_str(&text);
                    }
                    let target = if shape_is_title {
                        &mut title_buf
                    } else {
                        &mut content.body
                    };
                    if target.len() + text.len() <= budget.max_text_bytes {
                        target.push_str(&text);
                    } else {
                        content.truncated = true;
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"sp" => {
                        sp_depth = sp_depth.saturating_sub(1);
                        if sp_depth == 0 {
                            shape_is_title = false;
                        }
                    }
                    b"pic" => {
                        if let Some(pic) = picture.take() {
                            if let Some(rid) = pic.rid {
                                content.pictures.push(PictureRef {
                                    rid,
                                    rect: make_rect(pic.off, pic.ext),
                                });
                            }
                        }
                    }
                    b"txBody" => {
                        in_tx_body = false;
                        in_paragraph = false;
                    }
                    b"p" => {
                        if in_paragraph {
                            in_paragraph = false;
                            let target = if shape_is_title {
                                &mut title_buf
                            } else {
                                &mut content.body
                            };
                            if !target.is_empty() && !target.ends_with('\n') {
                                target.push('\n');
                            }
                        }
                    }
                    b"t" => in_text = false,
                    b"r" => {
                        in_run = false;
                        if let Some(run) = current_run.take() {
                            if !run.text.is_empty() {
                                content.runs.push(run);
                            }
                        }
                    }
                    b"rPr" => in_run_props = false,
                    b"transition" => {
                        if let Some(kind) = transition_kind.take() {
                            content
                                .transitions
                                .push(kind.unwrap_or_else(|| "default".to_string()));
                        }
                    }
                    b"tbl" => {
                        if let Some(t) = table.take() {
                            content.tables.push(t);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XmlWalkError::Syntax(e.to_string())),
            _ => {}
        }
    }

    let title = title_buf.trim().to_string();
    if !title.is_empty() {
        content.title = Some(title);
    }
    content.body = content.body.trim_end().to_string();

    Ok(content)
}

/// Collect every text node in a part, paragraphs separated by newlines.
/// Used for notes slides, where formatting is irrelevant.
pub fn extract_all_text(xml: &str, budget: WalkBudget) -> Result<String, XmlWalkError> {
    let mut reader = Reader::from_str(xml);

    let mut text = String::new();
    let mut in_text_element = false;

    loop {
        if Instant::now() > budget.deadline {
            return Err(XmlWalkError::Deadline);
        }
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                if local_name(e.name().as_ref()) == b"t" {
                    in_text_element = true;
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_text_element && text.len() < budget.max_text_bytes {
                    text.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                b"t" => in_text_element = false,
                b"p" => {
                    if !text.is_empty() && !text.ends_with('\n') {
                        text.push('\n');
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(XmlWalkError::Syntax(e.to_string())),
            _ => {}
        }
    }

    Ok(text.trim_end().to_string())
}

/// Strip the namespace prefix from an element name.
fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().position(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

fn attr_local(key: &[u8]) -> &[u8] {
    local_name(key)
}

fn attr_value(e: &quick_xml::events::BytesStart<'_>, name: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr_local(attr.key.as_ref()) == name {
            return Some(String::from_utf8_lossy(&attr.value).to_string());
        }
    }
    None
}

fn placeholder_is_title(e: &quick_xml::events::BytesStart<'_>) -> bool {
    matches!(
        attr_value(e, b"type").as_deref(),
        Some("title") | Some("ctrTitle")
    )
}

fn embed_rid(e: &quick_xml::events::BytesStart<'_>) -> Option<String> {
    attr_value(e, b"embed")
}

fn read_point(
    e: &quick_xml::events::BytesStart<'_>,
    first: &[u8],
    second: &[u8],
) -> Option<(i64, i64)> {
    let a = attr_value(e, first)?.parse::<i64>().ok()?;
    let b = attr_value(e, second)?.parse::<i64>().ok()?;
    Some((a, b))
}

fn make_rect(off: Option<(i64, i64)>, ext: Option<(i64, i64)>) -> Option<Rect> {
    let (x, y) = off?;
    let (width, height) = ext?;
    Some(Rect {
        x,
        y,
        width,
        height,
    })
}

fn truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn apply_run_properties(e: &quick_xml::events::BytesStart<'_>, style: &mut RunStyle) {
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).to_string();
        match attr_local(attr.key.as_ref()) {
            b"b" => style.bold = truthy(&value),
            b"i" => style.italic = truthy(&value),
            b"u" => style.underline = value != "none",
            b"sz" => {
                if let Ok(centipoints) = value.parse::<u32>() {
                    style.font_size_pt = Some(centipoints as f32 / 100.0);
                }
            }
            _ => {}
        }
    }
}

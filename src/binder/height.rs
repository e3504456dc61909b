//! Headless height estimate used for auto-height surfaces.
//!
//! There is no layout engine, so visible content is measured in lines: every
//! block that carries inline content counts as one line, `<br>` adds a line
//! and images use their `height` attribute.

use crate::dom::{Document, NodeData, NodeId};

pub const LINE_HEIGHT_PX: u32 = 24;
pub const IMAGE_HEIGHT_PX: u32 = 100;

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "caption", "center", "dd", "details",
    "div", "dl", "dt", "fieldset", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5",
    "h6", "header", "hr", "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table",
    "tbody", "tfoot", "thead", "tr", "ul",
];

const SKIPPED_TAGS: &[&str] = &["head", "script", "style", "template", "noscript", "title"];

pub fn estimate_content_height(dom: &Document) -> u32 {
    match dom.body() {
        Some(body) => measure(dom, body),
        None => 0,
    }
}

fn tag(dom: &Document, id: NodeId) -> Option<&str> {
    dom.element(id).map(|el| el.name.as_str())
}

fn is_skipped(dom: &Document, id: NodeId) -> bool {
    match tag(dom, id) {
        Some(name) => SKIPPED_TAGS.contains(&name) || dom.is_hidden(id),
        None => false,
    }
}

fn is_block(dom: &Document, id: NodeId) -> bool {
    tag(dom, id).map(|t| BLOCK_TAGS.contains(&t)).unwrap_or(false)
}

fn measure(dom: &Document, id: NodeId) -> u32 {
    if is_skipped(dom, id) {
        return 0;
    }
    match tag(dom, id) {
        Some("br") => return LINE_HEIGHT_PX,
        Some("img") => {
            return dom
                .element(id)
                .and_then(|el| el.attr("height"))
                .and_then(|h| h.trim().trim_end_matches("px").parse::<u32>().ok())
                .unwrap_or(IMAGE_HEIGHT_PX)
        }
        _ => {}
    }

    let nested: u32 = dom
        .children(id)
        .iter()
        .map(|child| measure(dom, *child))
        .sum();
    if is_block(dom, id) && has_inline_content(dom, id) {
        nested + LINE_HEIGHT_PX
    } else {
        nested
    }
}

fn has_inline_content(dom: &Document, id: NodeId) -> bool {
    dom.children(id).iter().any(|child| match dom.data(*child) {
        Some(NodeData::Text(t)) => !t.trim().is_empty(),
        Some(NodeData::Element(_)) => {
            !is_block(dom, *child)
                && !is_skipped(dom, *child)
                && !dom.text_content(*child).trim().is_empty()
        }
        _ => false,
    })
}

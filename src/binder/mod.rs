//! Post-render interactivity for a rendered result document.
//!
//! Binding neutralizes every anchor and pairs `.headerclass` elements with the
//! `.contentclass` element carrying the same `id`, registering a toggle on the
//! header. Sections start collapsed. Listeners from a previous bind are
//! detached first, so binding the same document twice never doubles them.

pub mod height;

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dom::{Listener, NodeId};
use crate::render::RenderedDocument;

pub const HEADER_CLASS: &str = "headerclass";
pub const CONTENT_CLASS: &str = "contentclass";
pub const EXPANDED_HEADER_BACKGROUND: &str = "#fff9db";
pub const HEIGHT_MARGIN_PX: u32 = 20;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleMode {
    #[default]
    Independent,
    Accordion,
}

impl ToggleMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "independent" | "multi" => Some(Self::Independent),
            "accordion" | "single" => Some(Self::Accordion),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Independent => "independent",
            Self::Accordion => "accordion",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BindOptions {
    pub toggle_mode: ToggleMode,
    pub auto_height: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ToggleState {
    pub expanded: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindIssue {
    HeaderWithoutId { node: NodeId },
    MissingContent { key: String },
    OrphanContent { key: String },
}

impl fmt::Display for BindIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeaderWithoutId { node } => {
                write!(f, "header node #{} has no id", node.index())
            }
            Self::MissingContent { key } => write!(f, "header '{key}' has no matching content"),
            Self::OrphanContent { key } => write!(f, "content '{key}' has no header"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BindReport {
    pub anchors_disabled: usize,
    pub sections_bound: usize,
    pub issues: Vec<BindIssue>,
    pub content_height: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct Binder {
    options: BindOptions,
}

impl Binder {
    pub fn new(options: BindOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> BindOptions {
        self.options
    }

    pub fn bind(&self, doc: &mut RenderedDocument) -> BindReport {
        let mut report = BindReport::default();
        doc.dom.clear_listeners();
        doc.sections.clear();

        for anchor in doc.dom.elements_by_tag("a") {
            doc.dom.add_listener(anchor, Listener::SuppressNavigation);
            doc.dom.set_style(anchor, "pointer-events", "none");
            doc.dom.set_style(anchor, "color", "gray");
            doc.dom.set_style(anchor, "cursor", "not-allowed");
            report.anchors_disabled += 1;
        }

        let content_keys: BTreeSet<String> = doc
            .dom
            .elements_by_class(CONTENT_CLASS)
            .into_iter()
            .filter_map(|id| doc.dom.element(id).and_then(|el| el.id()).map(str::to_string))
            .collect();

        let mut header_keys: BTreeSet<String> = BTreeSet::new();
        for header in doc.dom.elements_by_class(HEADER_CLASS) {
            let key = match doc.dom.element(header).and_then(|el| el.id()) {
                Some(key) => key.to_string(),
                None => {
                    report.issues.push(BindIssue::HeaderWithoutId { node: header });
                    continue;
                }
            };
            if !content_keys.contains(&key) {
                report.issues.push(BindIssue::MissingContent { key });
                continue;
            }
            doc.dom.set_style(header, "cursor", "pointer");
            doc.dom
                .add_listener(header, Listener::ToggleSection { key: key.clone() });
            if header_keys.insert(key.clone()) {
                report.sections_bound += 1;
            }
        }

        for key in &header_keys {
            set_section(doc, key, false);
        }
        for key in content_keys.difference(&header_keys) {
            report.issues.push(BindIssue::OrphanContent { key: key.clone() });
        }

        for issue in &report.issues {
            warn!(serial = doc.serial(), "bind: {issue}");
        }

        doc.bound = true;
        report.content_height = self.measure(doc);
        debug!(
            anchors = report.anchors_disabled,
            sections = report.sections_bound,
            issues = report.issues.len(),
            "document bound"
        );
        report
    }

    /// Flips section `key`. In accordion mode expanding one section collapses
    /// every other one. Returns the new surface height when auto height is on.
    pub fn toggle(&self, doc: &mut RenderedDocument, key: &str) -> Option<u32> {
        if !doc.sections.contains_key(key) {
            warn!(key, "toggle for unknown section");
            return None;
        }
        let expand = !doc.is_expanded(key);
        if expand && self.options.toggle_mode == ToggleMode::Accordion {
            let open: Vec<String> = doc
                .sections
                .iter()
                .filter(|(k, s)| s.expanded && k.as_str() != key)
                .map(|(k, _)| k.clone())
                .collect();
            for other in open {
                set_section(doc, &other, false);
            }
        }
        set_section(doc, key, expand);
        self.measure(doc)
    }

    fn measure(&self, doc: &RenderedDocument) -> Option<u32> {
        if !self.options.auto_height {
            return None;
        }
        Some(height::estimate_content_height(&doc.dom) + HEIGHT_MARGIN_PX)
    }
}

fn section_nodes(doc: &RenderedDocument, class: &str, key: &str) -> Vec<NodeId> {
    doc.dom
        .elements_by_class(class)
        .into_iter()
        .filter(|id| doc.dom.element(*id).and_then(|el| el.id()) == Some(key))
        .collect()
}

fn set_section(doc: &mut RenderedDocument, key: &str, expanded: bool) {
    for content in section_nodes(doc, CONTENT_CLASS, key) {
        doc.dom
            .set_style(content, "display", if expanded { "block" } else { "none" });
    }
    for header in section_nodes(doc, HEADER_CLASS, key) {
        if expanded {
            doc.dom
                .set_style(header, "background-color", EXPANDED_HEADER_BACKGROUND);
        } else {
            doc.dom.remove_style(header, "background-color");
        }
    }
    doc.sections
        .insert(key.to_string(), ToggleState { expanded });
}

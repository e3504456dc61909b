//! The isolated rendering surface.
//!
//! A surface owns at most one [`RenderedDocument`]. Rendering replaces the
//! previous document wholesale, so listeners, toggle state and pending
//! scripts of an old lookup never leak into the next one.

pub mod scripts;

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::binder::{BindReport, Binder, ToggleState};
use crate::dom::{ClickDispatch, Document, NodeId};
use crate::sanitize::{SanitizedHtml, ScriptPolicy};

pub const SUPPLEMENT_STYLE_ID: &str = "resultview-supplement";

/// Appended after the payload's own rules so it wins the cascade.
pub const SUPPLEMENTARY_CSS: &str = r#"
html, body { margin: 0 !important; padding: 0 !important; overflow-x: auto; }
* { box-sizing: border-box; max-width: 100% !important; }
table { width: 100% !important; table-layout: auto !important; border-collapse: collapse; }
td, th { word-break: break-word; white-space: normal !important; }
img { max-width: 100% !important; height: auto !important; }
@media print {
  a { color: inherit !important; text-decoration: none !important; }
  .headerclass { background: none !important; }
  table, tr, td, th { page-break-inside: avoid; }
}
"#;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Complete,
}

#[derive(Clone, Debug)]
pub struct RenderedDocument {
    serial: u64,
    pub(crate) dom: Document,
    ready: ReadyState,
    pub(crate) sections: BTreeMap<String, ToggleState>,
    pub(crate) bound: bool,
    pending_scripts: Vec<String>,
}

impl RenderedDocument {
    fn new(serial: u64, dom: Document, scripts: Vec<String>) -> Self {
        Self {
            serial,
            dom,
            ready: ReadyState::Loading,
            sections: BTreeMap::new(),
            bound: false,
            pending_scripts: scripts,
        }
    }

    /// Monotonic per surface; a new value means a new document.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn dom(&self) -> &Document {
        &self.dom
    }

    pub fn ready_state(&self) -> ReadyState {
        self.ready
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    pub fn section(&self, key: &str) -> Option<ToggleState> {
        self.sections.get(key).copied()
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, ToggleState)> {
        self.sections.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_expanded(&self, key: &str) -> bool {
        self.section(key).map(|s| s.expanded).unwrap_or(false)
    }

    pub fn to_html(&self) -> String {
        self.dom.to_html()
    }
}

#[derive(Debug, Default)]
pub struct RenderSurface {
    document: Option<RenderedDocument>,
    binder: Option<Binder>,
    display_height: Option<u32>,
    serial: u64,
}

impl RenderSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binder(binder: Binder) -> Self {
        Self {
            binder: Some(binder),
            ..Self::default()
        }
    }

    pub fn document(&self) -> Option<&RenderedDocument> {
        self.document.as_ref()
    }

    pub fn has_content(&self) -> bool {
        self.document.is_some()
    }

    pub fn display_height(&self) -> Option<u32> {
        self.display_height
    }

    pub fn binder(&self) -> Option<&Binder> {
        self.binder.as_ref()
    }

    /// Discards the current document and installs a new one built from
    /// `sanitized`. The supplementary stylesheet always ends up as the last
    /// child of `<head>`. The new document starts in `Loading`; call
    /// [`RenderSurface::complete_load`] to fire the ready signal.
    pub fn render(&mut self, sanitized: &SanitizedHtml) -> &RenderedDocument {
        if let Some(old) = self.document.take() {
            debug!(serial = old.serial, "discarding previous document");
        }
        self.display_height = None;

        let markup = match sanitized.policy {
            ScriptPolicy::Strip => sanitized.html.clone(),
            ScriptPolicy::Replay => format!(
                "<!DOCTYPE html><html><head></head><body>{}</body></html>",
                sanitized.html
            ),
        };
        let mut dom = Document::parse(&markup);
        inject_supplementary_style(&mut dom);

        self.serial += 1;
        info!(serial = self.serial, nodes = dom.len(), "document rendered");
        self.document.insert(RenderedDocument::new(
            self.serial,
            dom,
            sanitized.scripts.clone(),
        ))
    }

    /// Fires the ready signal for the current document and runs the attached
    /// binder. Returns `None` when there is no document, it was already
    /// complete, or no binder is attached.
    pub fn complete_load(&mut self) -> Option<BindReport> {
        let doc = self.document.as_mut()?;
        if doc.ready == ReadyState::Complete {
            return None;
        }
        doc.ready = ReadyState::Complete;
        debug!(serial = doc.serial, "document ready");
        self.run_binder()
    }

    /// Attaches the binder. If the current document is already complete the
    /// binder runs right away, otherwise it waits for the ready signal.
    pub fn attach_binder(&mut self, binder: Binder) -> Option<BindReport> {
        self.binder = Some(binder);
        match self.document.as_ref().map(|d| d.ready) {
            Some(ReadyState::Complete) => self.run_binder(),
            _ => None,
        }
    }

    fn run_binder(&mut self) -> Option<BindReport> {
        let binder = self.binder.as_ref()?;
        let doc = self.document.as_mut()?;
        if doc.ready != ReadyState::Complete {
            return None;
        }
        let report = binder.bind(doc);
        if let Some(height) = report.content_height {
            self.display_height = Some(height);
        }
        Some(report)
    }

    /// Simulates a user click on `target` inside the current document.
    /// Section toggles requested by listeners are applied through the binder.
    /// Returns `None` when nothing is rendered or `target` belongs to a
    /// document that has since been replaced.
    pub fn click(&mut self, target: NodeId) -> Option<ClickDispatch> {
        let doc = self.document.as_mut()?;
        if !doc.dom.contains(target) {
            return None;
        }
        let dispatch = doc.dom.dispatch_click(target);
        if let Some(binder) = self.binder.as_ref() {
            for key in &dispatch.toggles {
                if let Some(height) = binder.toggle(doc, key) {
                    self.display_height = Some(height);
                }
            }
        }
        Some(dispatch)
    }

    /// Clicks the header of section `key`. Returns `None` when the current
    /// document has no such header.
    pub fn click_section(&mut self, key: &str) -> Option<ClickDispatch> {
        let dom = &self.document.as_ref()?.dom;
        let header = dom
            .elements_by_class(crate::binder::HEADER_CLASS)
            .into_iter()
            .find(|id| dom.element(*id).and_then(|el| el.id()) == Some(key))?;
        self.click(header)
    }

    /// Scripts extracted under the replay policy, handed out once after the
    /// document is complete.
    pub fn take_pending_scripts(&mut self) -> Vec<String> {
        match self.document.as_mut() {
            Some(doc) if doc.ready == ReadyState::Complete => {
                std::mem::take(&mut doc.pending_scripts)
            }
            _ => Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.document = None;
        self.display_height = None;
    }
}

fn inject_supplementary_style(dom: &mut Document) {
    let head = dom.ensure_head();
    let style = dom.create_element("style", &[("id", SUPPLEMENT_STYLE_ID)]);
    let css = dom.create_text(SUPPLEMENTARY_CSS);
    dom.append_child(style, css);
    dom.append_child(head, style);
}

//! Owned document model for the isolated rendering surface.
//!
//! The provider markup is parsed with `scraper` (html5ever underneath) and
//! copied into a small arena that can be mutated: attributes, inline styles,
//! appended nodes and click listeners. Nothing in here executes script.

mod serialize;

use std::collections::BTreeMap;

use scraper::{ElementRef, Html};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self
            .attrs
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1 = value.to_string(),
            None => self.attrs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|v| v.split_ascii_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id").map(str::trim).filter(|v| !v.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Clone, Debug)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

/// Click behavior attached to a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Listener {
    SuppressNavigation,
    ToggleSection { key: String },
}

/// What a single click did after bubbling from the target to the root.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClickDispatch {
    pub default_prevented: bool,
    pub toggles: Vec<String>,
    pub navigation: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Document {
    nodes: Vec<Node>,
    listeners: BTreeMap<NodeId, Vec<Listener>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                data: NodeData::Document,
            }],
            listeners: BTreeMap::new(),
        }
    }

    /// Parses a complete HTML document. Malformed markup never fails; the
    /// html5ever tree builder always yields `html`, `head` and `body`.
    pub fn parse(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        let mut doc = Self::new();
        let root = doc.root();
        doc.import(root, parsed.root_element());
        doc
    }

    fn import(&mut self, parent: NodeId, source: ElementRef<'_>) {
        let src = source.value();
        let mut element = Element::new(src.name());
        for (k, v) in src.attrs() {
            if is_inert_attr(k, v) {
                element.attrs.push((k.to_string(), v.to_string()));
            }
        }
        let id = self.push(NodeData::Element(element));
        self.append_child(parent, id);

        for child in source.children() {
            match child.value() {
                scraper::Node::Text(text) => {
                    let text_id = self.create_text(text);
                    self.append_child(id, text_id);
                }
                scraper::Node::Comment(comment) => {
                    let comment_id = self.push(NodeData::Comment(String::from(&**comment)));
                    self.append_child(id, comment_id);
                }
                scraper::Node::Element(_) => {
                    if let Some(el) = ElementRef::wrap(child) {
                        self.import(id, el);
                    }
                }
                _ => {}
            }
        }
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// True when `id` was handed out by this document.
    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0).map(|node| &node.data)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes.get(id.0)?.data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(id.0)?.data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn create_element(&mut self, name: &str, attrs: &[(&str, &str)]) -> NodeId {
        let mut element = Element::new(name);
        for (k, v) in attrs {
            element.set_attr(k, v);
        }
        self.push(NodeData::Element(element))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    /// Appends `child` as the last child of `parent`, detaching it from any
    /// previous parent first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.contains(parent) || !self.contains(child) {
            return;
        }
        if let Some(old) = self.nodes[child.0].parent {
            self.nodes[old.0].children.retain(|c| *c != child);
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Pre-order walk of everything below `id`, `id` excluded.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .filter(|id| {
                self.element(*id)
                    .map(|el| el.name.eq_ignore_ascii_case(tag))
                    .unwrap_or(false)
            })
            .collect()
    }

    pub fn elements_by_class(&self, class: &str) -> Vec<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .filter(|id| self.element(*id).map(|el| el.has_class(class)).unwrap_or(false))
            .collect()
    }

    pub fn first_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.elements_by_tag(tag).into_iter().next()
    }

    pub fn head(&self) -> Option<NodeId> {
        self.first_by_tag("head")
    }

    pub fn body(&self) -> Option<NodeId> {
        self.first_by_tag("body")
    }

    /// Returns the `<head>` element, creating it in front of `<body>` when the
    /// document has none.
    pub fn ensure_head(&mut self) -> NodeId {
        if let Some(head) = self.head() {
            return head;
        }
        let html = match self.first_by_tag("html") {
            Some(html) => html,
            None => {
                let html = self.create_element("html", &[]);
                let root = self.root();
                self.append_child(root, html);
                html
            }
        };
        let head = self.create_element("head", &[]);
        self.nodes[head.0].parent = Some(html);
        self.nodes[html.0].children.insert(0, head);
        head
    }

    /// Ancestor-or-self element with the given tag name.
    pub fn closest(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if let Some(el) = self.element(current) {
                if el.name.eq_ignore_ascii_case(tag) {
                    return Some(current);
                }
            }
            cursor = self.parent(current);
        }
        None
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(NodeData::Text(t)) = self.data(id) {
            out.push_str(t);
        }
        for node in self.descendants(id) {
            if let Some(NodeData::Text(t)) = self.data(node) {
                out.push_str(t);
            }
        }
        out
    }

    pub fn style(&self, id: NodeId, property: &str) -> Option<String> {
        let raw = self.element(id)?.attr("style")?;
        parse_style(raw)
            .into_iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(property))
            .map(|(_, v)| v)
    }

    pub fn set_style(&mut self, id: NodeId, property: &str, value: &str) {
        let Some(el) = self.element_mut(id) else {
            return;
        };
        let mut decls = el.attr("style").map(parse_style).unwrap_or_default();
        match decls
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(property))
        {
            Some(slot) => slot.1 = value.to_string(),
            None => decls.push((property.to_string(), value.to_string())),
        }
        el.set_attr("style", &render_style(&decls));
    }

    pub fn remove_style(&mut self, id: NodeId, property: &str) {
        let Some(el) = self.element_mut(id) else {
            return;
        };
        let Some(raw) = el.attr("style") else {
            return;
        };
        let mut decls = parse_style(raw);
        decls.retain(|(k, _)| !k.eq_ignore_ascii_case(property));
        if decls.is_empty() {
            el.remove_attr("style");
        } else {
            el.set_attr("style", &render_style(&decls));
        }
    }

    /// True when the node or one of its ancestors is `display: none`.
    pub fn is_hidden(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if self
                .style(current, "display")
                .map(|v| v.trim().eq_ignore_ascii_case("none"))
                .unwrap_or(false)
            {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub fn add_listener(&mut self, id: NodeId, listener: Listener) {
        self.listeners.entry(id).or_default().push(listener);
    }

    pub fn listeners(&self, id: NodeId) -> &[Listener] {
        self.listeners.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    pub fn clear_listeners(&mut self) {
        self.listeners.clear();
    }

    /// Bubbles a click from `target` up to the root, collecting what the
    /// registered listeners asked for. Navigation is reported only when an
    /// anchor with an `href` was hit and nobody prevented the default.
    pub fn dispatch_click(&self, target: NodeId) -> ClickDispatch {
        let mut out = ClickDispatch::default();
        if !self.contains(target) {
            return out;
        }
        let mut cursor = Some(target);
        while let Some(current) = cursor {
            for listener in self.listeners(current) {
                match listener {
                    Listener::SuppressNavigation => out.default_prevented = true,
                    Listener::ToggleSection { key } => out.toggles.push(key.clone()),
                }
            }
            cursor = self.parent(current);
        }
        if !out.default_prevented {
            out.navigation = self
                .closest(target, "a")
                .and_then(|a| self.element(a))
                .and_then(|el| el.attr("href"))
                .map(str::to_string);
        }
        out
    }

    pub fn to_html(&self) -> String {
        serialize::document_to_html(self)
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        serialize::children_to_html(self, id)
    }
}

const URL_ATTRS: &[&str] = &["href", "src", "action", "formaction", "xlink:href"];

const SCRIPT_SCHEMES: &[&str] = &["javascript", "vbscript"];

/// False for event handler attributes and script-scheme URLs, which are
/// dropped on import.
fn is_inert_attr(name: &str, value: &str) -> bool {
    let handler = name.len() > 2
        && name
            .get(..2)
            .map(|prefix| prefix.eq_ignore_ascii_case("on"))
            .unwrap_or(false);
    if handler {
        return false;
    }
    if !URL_ATTRS.iter().any(|a| a.eq_ignore_ascii_case(name)) {
        return true;
    }
    match reqwest::Url::parse(value) {
        Ok(url) => !SCRIPT_SCHEMES.contains(&url.scheme()),
        Err(_) => true,
    }
}

/// Splits `raw` at every `sep` that is not inside quotes or parentheses.
fn split_top_level(raw: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in raw.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, c) if c == sep && depth == 0 => {
                parts.push(&raw[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);
    parts
}

fn parse_style(raw: &str) -> Vec<(String, String)> {
    split_top_level(raw, ';')
        .into_iter()
        .filter_map(|decl| {
            let (k, v) = decl.split_once(':')?;
            let k = k.trim();
            if k.is_empty() {
                return None;
            }
            Some((k.to_ascii_lowercase(), v.trim().to_string()))
        })
        .collect()
}

fn render_style(decls: &[(String, String)]) -> String {
    decls
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join("; ")
}

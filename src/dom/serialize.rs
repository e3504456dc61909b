use std::io;

use html5ever::serialize::{serialize, Serialize, SerializeOpts, Serializer, TraversalScope};
use html5ever::{namespace_url, ns, LocalName, QualName};
use tracing::warn;

use super::{Document, NodeData, NodeId};

/// Elements whose first newline is eaten by the parser.
const LEADING_NEWLINE_ELEMENTS: &[&str] = &["pre", "textarea", "listing"];

/// A node of a [`Document`] as seen by the html5ever serializer.
struct NodeRef<'a> {
    doc: &'a Document,
    id: NodeId,
}

enum SerializeOp {
    Open(NodeId),
    Close(QualName),
}

fn html_name(name: &str) -> QualName {
    QualName::new(None, ns!(html), LocalName::from(name))
}

fn attr_name(name: &str) -> QualName {
    QualName::new(None, ns!(), LocalName::from(name))
}

impl Serialize for NodeRef<'_> {
    fn serialize<S>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        let doc = self.doc;
        let mut ops: Vec<SerializeOp> = Vec::new();
        match traversal_scope {
            TraversalScope::IncludeNode => ops.push(SerializeOp::Open(self.id)),
            TraversalScope::ChildrenOnly(_) => {
                ops.extend(doc.children(self.id).iter().rev().map(|c| SerializeOp::Open(*c)));
            }
        }

        while let Some(op) = ops.pop() {
            match op {
                SerializeOp::Open(id) => match doc.data(id) {
                    Some(NodeData::Document) => {
                        serializer.write_doctype("html")?;
                        ops.extend(doc.children(id).iter().rev().map(|c| SerializeOp::Open(*c)));
                    }
                    Some(NodeData::Element(el)) => {
                        let name = html_name(&el.name);
                        let attrs: Vec<(QualName, &str)> = el
                            .attrs
                            .iter()
                            .map(|(k, v)| (attr_name(k), v.as_str()))
                            .collect();
                        serializer.start_elem(name.clone(), attrs.iter().map(|(k, v)| (k, *v)))?;
                        if LEADING_NEWLINE_ELEMENTS.contains(&el.name.as_str())
                            && starts_with_newline(doc, id)
                        {
                            serializer.write_text("\n")?;
                        }
                        ops.push(SerializeOp::Close(name));
                        ops.extend(doc.children(id).iter().rev().map(|c| SerializeOp::Open(*c)));
                    }
                    Some(NodeData::Text(text)) => serializer.write_text(text)?,
                    Some(NodeData::Comment(text)) => serializer.write_comment(text)?,
                    None => {}
                },
                SerializeOp::Close(name) => serializer.end_elem(name)?,
            }
        }
        Ok(())
    }
}

impl Serialize for Document {
    fn serialize<S>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        NodeRef {
            doc: self,
            id: self.root(),
        }
        .serialize(serializer, traversal_scope)
    }
}

fn starts_with_newline(doc: &Document, id: NodeId) -> bool {
    doc.children(id)
        .first()
        .and_then(|first| match doc.data(*first) {
            Some(NodeData::Text(text)) => Some(text.starts_with('\n')),
            _ => None,
        })
        .unwrap_or(false)
}

fn write_to_string<T: Serialize>(node: &T, traversal_scope: TraversalScope) -> String {
    let mut buf = Vec::new();
    let opts = SerializeOpts {
        traversal_scope,
        ..Default::default()
    };
    if let Err(err) = serialize(&mut buf, node, opts) {
        warn!(%err, "html serialization stopped early");
    }
    String::from_utf8_lossy(&buf).into_owned()
}

pub(super) fn document_to_html(doc: &Document) -> String {
    write_to_string(doc, TraversalScope::IncludeNode)
}

pub(super) fn children_to_html(doc: &Document, id: NodeId) -> String {
    // The parent name decides whether text inside it is written raw.
    let parent = doc.element(id).map(|el| html_name(&el.name));
    write_to_string(&NodeRef { doc, id }, TraversalScope::ChildrenOnly(parent))
}

use anyhow::{anyhow, Context, Result};
use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::TendrilSink;
use html5ever::{ns, parse_document, Attribute, LocalName, QualName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

/// Attribute the layout stage stamps on every element to give it a stable id.
pub const VIPS_ID_ATTRIBUTE: &str = "vipsid";

/// Access to the original page markup by bookkeeping id.
pub trait MarkupSource {
    /// Serialize the element carrying `vips_id`, without any document-type header.
    fn serialize_element(&self, vips_id: &str) -> Result<String>;
}

/// Parsed original page, backed by an html5ever `RcDom`.
pub struct HtmlDocument {
    // owns the tree the indexed handles belong to
    _dom: RcDom,
    /// Elements by bookkeeping id; the first element in document order wins
    by_id: HashMap<String, Handle>,
}

impl HtmlDocument {
    pub fn parse(html: &str) -> Self {
        let dom = parse_document(RcDom::default(), Default::default()).one(html);
        let mut by_id = HashMap::new();
        index_by_attribute(&dom.document, VIPS_ID_ATTRIBUTE, &mut by_id);
        Self { _dom: dom, by_id }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let html = fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read markup from {}", path.as_ref().display()))?;
        Ok(Self::parse(&html))
    }

    /// Element whose bookkeeping attribute equals `vips_id`
    pub fn element_by_id(&self, vips_id: &str) -> Option<Handle> {
        self.by_id.get(vips_id).cloned()
    }
}

impl MarkupSource for HtmlDocument {
    fn serialize_element(&self, vips_id: &str) -> Result<String> {
        let element = self
            .element_by_id(vips_id)
            .ok_or_else(|| anyhow!("no element with {}=\"{}\"", VIPS_ID_ATTRIBUTE, vips_id))?;
        serialize_node(&element)
    }
}

fn index_by_attribute(handle: &Handle, name: &str, index: &mut HashMap<String, Handle>) {
    if let NodeData::Element { attrs, .. } = &handle.data {
        if let Some(attr) = attrs.borrow().iter().find(|a| &*a.name.local == name) {
            index
                .entry(attr.value.to_string())
                .or_insert_with(|| handle.clone());
        }
    }
    for child in handle.children.borrow().iter() {
        index_by_attribute(child, name, index);
    }
}

/// Serialize a node and its subtree as HTML.
pub fn serialize_node(handle: &Handle) -> Result<String> {
    let mut output = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::IncludeNode,
        ..Default::default()
    };
    serialize(&mut output, &SerializableHandle::from(handle.clone()), opts)
        .context("HTML serialization failed")?;
    String::from_utf8(output).context("serialized markup is not UTF-8")
}

/// Create a detached HTML element
pub fn create_element(tag: &str, attrs: Vec<(&str, &str)>) -> Handle {
    let attributes = attrs
        .into_iter()
        .map(|(name, value)| Attribute {
            name: QualName::new(None, ns!(), LocalName::from(name)),
            value: value.to_string().into(),
        })
        .collect();

    new_node(NodeData::Element {
        name: QualName::new(None, ns!(html), LocalName::from(tag)),
        attrs: RefCell::new(attributes),
        template_contents: Default::default(),
        mathml_annotation_xml_integration_point: false,
    })
}

pub fn append_child(parent: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// Copy a subtree so it can be attached elsewhere without detaching it from the source document.
///
/// Doctypes, processing instructions and nested documents are dropped.
pub fn deep_clone(handle: &Handle) -> Option<Handle> {
    let data = match &handle.data {
        NodeData::Element {
            name,
            attrs,
            template_contents,
            mathml_annotation_xml_integration_point,
        } => NodeData::Element {
            name: name.clone(),
            attrs: RefCell::new(attrs.borrow().clone()),
            template_contents: RefCell::new(
                template_contents.borrow().as_ref().and_then(deep_clone),
            ),
            mathml_annotation_xml_integration_point: *mathml_annotation_xml_integration_point,
        },
        NodeData::Text { contents } => NodeData::Text {
            contents: RefCell::new(contents.borrow().clone()),
        },
        NodeData::Comment { contents } => NodeData::Comment {
            contents: contents.clone(),
        },
        _ => return None,
    };

    let copy = new_node(data);
    for child in handle.children.borrow().iter() {
        if let Some(child_copy) = deep_clone(child) {
            append_child(&copy, child_copy);
        }
    }
    Some(copy)
}

/// Remove `name` from an element's attributes; non-elements are left untouched.
pub fn remove_attribute(handle: &Handle, name: &str) {
    if let NodeData::Element { attrs, .. } = &handle.data {
        attrs.borrow_mut().retain(|a| &*a.name.local != name);
    }
}

fn new_node(data: NodeData) -> Handle {
    Rc::new(Node {
        parent: Cell::new(None),
        children: RefCell::new(Vec::new()),
        data,
    })
}

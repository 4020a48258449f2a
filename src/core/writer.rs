use crate::core::layout::PageMetadata;
use crate::core::output::OutputNode;
use anyhow::{Context, Result};
use log::{error, info};
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::name::QName;
use std::borrow::Cow;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

const PAGE_ELEMENT: &str = "VIPSPage";
const NODE_ELEMENT: &str = "LayoutNode";

/// Writer is responsible for turning a projected tree into the structured page document
pub trait Writer {
    fn serialize(&self, root: &OutputNode, meta: &PageMetadata) -> Result<Vec<u8>>;

    /// Serialize and persist to `out_path`; the target is only replaced once the document is complete.
    fn write_document<P: AsRef<Path>>(
        &self,
        root: &OutputNode,
        meta: &PageMetadata,
        out_path: P,
    ) -> Result<()> {
        let out_path = out_path.as_ref();
        let result = self
            .serialize(root, meta)
            .and_then(|bytes| persist(out_path, &bytes));
        match &result {
            Ok(()) => info!("Wrote segmentation tree to {}", out_path.display()),
            Err(e) => error!("Failed to write {}: {:#}", out_path.display(), e),
        }
        result
    }
}

/// XmlTreeWriter emits the `VIPSPage`/`LayoutNode` document.
///
/// With `escape_output` off, the `&gt;`, `&lt;` and `&quot;` entities are turned
/// back into raw characters after serialization. The result is not well-formed
/// XML; it exists for consumers that read markup verbatim out of `SRC`/`Content`.
#[derive(Debug, Clone, Copy)]
pub struct XmlTreeWriter {
    pub escape_output: bool,
}

impl Default for XmlTreeWriter {
    fn default() -> Self {
        Self { escape_output: true }
    }
}

impl XmlTreeWriter {
    pub fn new(escape_output: bool) -> Self {
        Self { escape_output }
    }

    fn write_node<W: Write>(
        &self,
        writer: &mut quick_xml::Writer<W>,
        node: &OutputNode,
    ) -> Result<()> {
        let a = &node.attributes;
        let mut element = BytesStart::new(NODE_ELEMENT);
        let fields = [
            ("FrameSourceIndex", a.frame_source_index.to_string()),
            ("SourceIndex", a.source_index.clone()),
            ("DoC", a.doc.to_string()),
            ("ContainImg", a.contain_img.to_string()),
            ("IsImg", a.is_img.to_string()),
            ("ContainTable", a.contain_table.to_string()),
            ("ContainP", a.contain_p.to_string()),
            ("TextLen", a.text_len.to_string()),
            ("LinkTextLen", a.link_text_len.to_string()),
            ("DOMCldNum", node.dom_child_count.to_string()),
            ("FontSize", a.font_size.to_string()),
            ("FontWeight", a.font_weight.to_string()),
            ("BgColor", a.bg_color.clone()),
            ("ObjectRectLeft", a.rect.x.to_string()),
            ("ObjectRectTop", a.rect.y.to_string()),
            ("ObjectRectWidth", a.rect.width.to_string()),
            ("ObjectRectHeight", a.rect.height.to_string()),
            ("ID", a.id.clone()),
            ("order", node.order.to_string()),
        ];
        for (name, value) in &fields {
            element.push_attribute(attribute(name, value));
        }

        if let Some(aggregate) = &node.aggregate {
            if let Some(ids) = &aggregate.dom_ids {
                element.push_attribute(attribute("DOMIds", &ids.joined()));
            }
            element.push_attribute(attribute("SRC", &aggregate.source));
            element.push_attribute(attribute("Content", &aggregate.content));
        }

        if node.children.is_empty() {
            writer.write_event(Event::Empty(element))?;
        } else {
            writer.write_event(Event::Start(element))?;
            for child in &node.children {
                self.write_node(writer, child)?;
            }
            writer.write_event(Event::End(BytesEnd::new(NODE_ELEMENT)))?;
        }
        Ok(())
    }
}

impl Writer for XmlTreeWriter {
    fn serialize(&self, root: &OutputNode, meta: &PageMetadata) -> Result<Vec<u8>> {
        let mut writer = quick_xml::Writer::new_with_indent(Vec::new(), b' ', 2);

        let mut page = BytesStart::new(PAGE_ELEMENT);
        let fields = [
            ("Url", meta.url.clone()),
            ("PageTitle", meta.title.clone()),
            ("WindowWidth", meta.window_width.to_string()),
            ("WindowHeight", meta.window_height.to_string()),
            ("PageRectTop", meta.page_rect.y.to_string()),
            ("PageRectLeft", meta.page_rect.x.to_string()),
            ("PageRectWidth", meta.page_rect.width.to_string()),
            ("PageRectHeight", meta.page_rect.height.to_string()),
            ("neworder", "0".to_string()),
            ("order", meta.order.to_string()),
        ];
        for (name, value) in &fields {
            page.push_attribute(attribute(name, value));
        }

        writer
            .write_event(Event::Start(page))
            .context("failed to write page element")?;
        self.write_node(&mut writer, root)
            .context("failed to write layout nodes")?;
        writer.write_event(Event::End(BytesEnd::new(PAGE_ELEMENT)))?;

        let mut bytes = writer.into_inner();
        bytes.push(b'\n');

        if self.escape_output {
            Ok(bytes)
        } else {
            let text = String::from_utf8(bytes).context("serialized tree is not UTF-8")?;
            Ok(unescape_markup(&text).into_bytes())
        }
    }
}

/// Attribute whose value is escaped with [`escape_attribute_value`] instead of quick-xml's default.
fn attribute<'a>(name: &'a str, value: &str) -> Attribute<'a> {
    Attribute {
        key: QName(name.as_bytes()),
        value: Cow::Owned(escape_attribute_value(value).into_bytes()),
    }
}

/// Escape `&`, `<`, `>` and `"`, and write tab, CR and LF as character references
/// so they survive attribute-value normalization. Apostrophes are left alone.
pub fn escape_attribute_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\n' => escaped.push_str("&#10;"),
            '\r' => escaped.push_str("&#13;"),
            '\t' => escaped.push_str("&#9;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Reverse exactly the `&gt;`, `&lt;` and `&quot;` escapes.
pub fn unescape_markup(text: &str) -> String {
    text.replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&quot;", "\"")
}

/// Write `bytes` next to `path` and rename into place.
pub fn persist(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path)
        .with_context(|| format!("failed to move document into {}", path.display()))?;
    Ok(())
}

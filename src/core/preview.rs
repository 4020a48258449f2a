//! Grouped preview: one `<div>` per collapsed segment, rebuilt from the original markup.

use crate::core::markup::{
    append_child, create_element, deep_clone, remove_attribute, serialize_node, HtmlDocument,
    VIPS_ID_ATTRIBUTE,
};
use crate::core::output::IdGroup;
use crate::core::writer::persist;
use anyhow::{Context, Result};
use log::{debug, info};
use std::path::Path;

pub struct PreviewBuilder<'a> {
    dom_tree: &'a HtmlDocument,
}

impl<'a> PreviewBuilder<'a> {
    pub fn new(dom_tree: &'a HtmlDocument) -> Self {
        Self { dom_tree }
    }

    pub fn build(&self, groups: &[IdGroup]) -> Result<Vec<u8>> {
        let html = create_element("html", vec![]);
        let head = create_element("head", vec![]);
        let body = create_element("body", vec![]);
        append_child(&head, create_element("meta", vec![("charset", "utf-8")]));
        append_child(&html, head);
        append_child(&html, body.clone());

        for group in groups {
            let container = create_element("div", vec![]);
            for id in group.ids() {
                let Some(original) = self.dom_tree.element_by_id(id) else {
                    debug!("No element with id {} for preview", id);
                    continue;
                };
                let Some(node) = deep_clone(&original) else {
                    continue;
                };
                // the node itself and its direct children only
                remove_attribute(&node, VIPS_ID_ATTRIBUTE);
                for child in node.children.borrow().iter() {
                    remove_attribute(child, VIPS_ID_ATTRIBUTE);
                }
                append_child(&container, node);
            }
            append_child(&body, container);
        }

        let mut document = serialize_node(&html).context("failed to serialize preview")?;
        document.push('\n');
        Ok(document.into_bytes())
    }

    pub fn write_preview<P: AsRef<Path>>(&self, groups: &[IdGroup], out_path: P) -> Result<()> {
        let out_path = out_path.as_ref();
        let bytes = self.build(groups)?;
        persist(out_path, &bytes)?;
        info!("Wrote {} preview segments to {}", groups.len(), out_path.display());
        Ok(())
    }
}

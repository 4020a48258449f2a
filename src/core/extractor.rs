use crate::core::layout::ContentLeaf;
use crate::core::markup::MarkupSource;
use log::warn;

/// Pulls source markup and text out of content leaves.
pub struct ContentExtractor<'a> {
    markup: &'a dyn MarkupSource,
}

impl<'a> ContentExtractor<'a> {
    pub fn new(markup: &'a dyn MarkupSource) -> Self {
        Self { markup }
    }

    /// Serialized markup for real elements, stored text for synthetic leaves.
    ///
    /// A serialization failure is logged and yields an empty string.
    pub fn extract_source(&self, leaf: &ContentLeaf) -> String {
        match leaf {
            ContentLeaf::Element { vips_id, .. } => match self.markup.serialize_element(vips_id) {
                Ok(source) => source,
                Err(e) => {
                    warn!("Failed to serialize element {}: {:#}", vips_id, e);
                    String::new()
                }
            },
            ContentLeaf::Container { text } | ContentLeaf::TextRun { text } => text.clone(),
        }
    }

    pub fn extract_text(&self, leaf: &ContentLeaf) -> String {
        leaf.text().to_string()
    }
}

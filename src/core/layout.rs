use serde::Deserialize;

/// Box geometry of a visual block, in page pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Descriptive attributes of a visual block, computed upstream and copied verbatim into the output tree.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BlockAttributes {
    pub source_index: String,
    pub frame_source_index: i32,
    /// Degree of coherence, conventionally 1..=11, lower is more homogeneous
    pub doc: i32,
    pub contain_img: bool,
    pub is_img: bool,
    pub contain_table: bool,
    pub contain_p: bool,
    pub text_len: i32,
    pub link_text_len: i32,
    pub font_size: i32,
    pub font_weight: i32,
    pub bg_color: String,
    pub rect: Rect,
    pub id: String,
}

/// Structural box that owns a node's content leaves.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ParentBox {
    /// Bookkeeping id of the box's markup element
    pub vips_id: String,
    /// Number of DOM child nodes of the box's element
    pub dom_child_count: usize,
}

/// One rendered content unit attached to a visual block.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentLeaf {
    /// A real markup element, referenced by its bookkeeping id
    Element { vips_id: String, text: String },
    /// Synthetic structural container without an element of its own
    Container { text: String },
    /// Synthetic inline text run
    TextRun { text: String },
}

impl ContentLeaf {
    pub fn text(&self) -> &str {
        match self {
            ContentLeaf::Element { text, .. }
            | ContentLeaf::Container { text }
            | ContentLeaf::TextRun { text } => text,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        !matches!(self, ContentLeaf::Element { .. })
    }
}

/// Node of the visual segmentation tree handed over by the layout stage.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VisualStructureNode {
    #[serde(flatten)]
    pub attributes: BlockAttributes,
    #[serde(default)]
    pub parent_box: Option<ParentBox>,
    /// Content leaves owned by this node; `None` marks a block without a content source
    #[serde(default)]
    pub nested_blocks: Vec<Option<ContentLeaf>>,
    #[serde(default)]
    pub children: Vec<VisualStructureNode>,
}

impl VisualStructureNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes in this subtree, including itself
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }
}

/// Viewport and page-level descriptors
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PageMetadata {
    pub url: String,
    pub title: String,
    pub window_width: i32,
    pub window_height: i32,
    pub page_rect: Rect,
    pub order: i32,
}

/// Everything the layout stage hands over for one page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageInput {
    pub metadata: PageMetadata,
    pub visual_root: VisualStructureNode,
}

impl PageInput {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

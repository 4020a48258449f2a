pub mod core {
    pub mod layout;
    pub mod markup;
    pub mod extractor;
    pub mod output;
    pub mod projector;
    pub mod writer;
    pub mod preview;
}

pub mod utils {
    pub mod page_processor;
}

pub mod config;

pub use crate::config::SegmentationConfig;
pub use crate::core::layout::{ContentLeaf, PageInput, PageMetadata, VisualStructureNode};
pub use crate::core::output::{IdGroup, OutputNode, Projection};
pub use crate::core::projector::Projector;

use crate::core::layout::BlockAttributes;
use std::collections::HashSet;

/// Ordered set of originating element ids collected from one collapsed branch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdGroup {
    ids: Vec<String>,
    seen: HashSet<String>,
}

impl IdGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert keeping first-seen order; duplicates are ignored.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if !self.seen.insert(id.clone()) {
            return false;
        }
        self.ids.push(id);
        true
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn joined(&self) -> String {
        self.ids.join(",")
    }
}

impl<S: Into<String>> FromIterator<S> for IdGroup {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut group = IdGroup::new();
        for id in iter {
            group.insert(id);
        }
        group
    }
}

/// Source markup and text gathered from a node's content leaves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedContent {
    pub source: String,
    pub content: String,
    /// Only present where segmentation stopped
    pub dom_ids: Option<IdGroup>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputNode {
    pub attributes: BlockAttributes,
    pub dom_child_count: usize,
    pub order: u32,
    pub aggregate: Option<AggregatedContent>,
    pub children: Vec<OutputNode>,
}

impl OutputNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Nodes of this subtree in pre-order
    pub fn pre_order(&self) -> Vec<&OutputNode> {
        let mut nodes = vec![self];
        for child in &self.children {
            nodes.extend(child.pre_order());
        }
        nodes
    }

    pub fn leaf_count(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            self.children.iter().map(|c| c.leaf_count()).sum()
        }
    }
}

/// Result of one projection run
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub root: OutputNode,
    pub id_groups: Vec<IdGroup>,
}

use crate::config::SegmentationConfig;
use crate::core::extractor::ContentExtractor;
use crate::core::layout::{ContentLeaf, VisualStructureNode};
use crate::core::markup::MarkupSource;
use crate::core::output::{AggregatedContent, IdGroup, OutputNode, Projection};
use anyhow::{bail, Result};
use log::{debug, info};

/// Projects a visual structure tree into the output tree, collapsing
/// every node whose degree of coherence exceeds the permitted one.
pub struct Projector {
    permitted_doc: i32,
}

/// State owned by a single projection run
struct ProjectionRun<'a> {
    extractor: ContentExtractor<'a>,
    next_order: u32,
    id_groups: Vec<IdGroup>,
}

impl Projector {
    /// Uses the config's permitted DoC, which its setter keeps within 1..=11 (or the default 0).
    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self::new(config.permitted_doc())
    }

    pub(crate) fn new(permitted_doc: i32) -> Self {
        Self { permitted_doc }
    }

    pub fn project(
        &self,
        root: &VisualStructureNode,
        markup: &dyn MarkupSource,
    ) -> Result<Projection> {
        let mut run = ProjectionRun {
            extractor: ContentExtractor::new(markup),
            next_order: 1,
            id_groups: Vec::new(),
        };

        let root = self.project_node(root, &mut run)?;

        info!(
            "Projected {} output nodes into {} id groups (pDoC {})",
            run.next_order - 1,
            run.id_groups.len(),
            self.permitted_doc
        );

        Ok(Projection {
            root,
            id_groups: run.id_groups,
        })
    }

    fn project_node(&self, node: &VisualStructureNode, run: &mut ProjectionRun) -> Result<OutputNode> {
        let Some(parent_box) = node.parent_box.as_ref() else {
            bail!(
                "visual block {} has no structural parent box",
                node.attributes.source_index
            );
        };

        let order = run.next_order;
        run.next_order += 1;

        let mut output = OutputNode {
            attributes: node.attributes.clone(),
            dom_child_count: parent_box.dom_child_count,
            order,
            aggregate: None,
            children: Vec::new(),
        };

        if self.permitted_doc >= node.attributes.doc {
            if node.is_leaf() && !node.nested_blocks.is_empty() {
                output.aggregate = Some(Self::aggregate(node, &run.extractor, None));
            }

            for child in &node.children {
                let child_output = self.project_node(child, run)?;
                output.children.push(child_output);
            }
        } else {
            debug!(
                "Stopping segmentation at {} (DoC {} > pDoC {})",
                node.attributes.source_index, node.attributes.doc, self.permitted_doc
            );

            let mut group = IdGroup::new();
            if !node.nested_blocks.is_empty() {
                output.aggregate = Some(Self::aggregate(
                    node,
                    &run.extractor,
                    Some((&parent_box.vips_id, &mut group)),
                ));
            }
            if !group.is_empty() {
                run.id_groups.push(group.clone());
            }
            if let Some(aggregate) = output.aggregate.as_mut() {
                aggregate.dom_ids = Some(group);
            }
        }

        Ok(output)
    }

    /// Concatenate the sources and texts of a node's leaves. When `ids` is given,
    /// each leaf's originating id is recorded; synthetic leaves are attributed to
    /// the node's structural parent box.
    fn aggregate(
        node: &VisualStructureNode,
        extractor: &ContentExtractor,
        mut ids: Option<(&String, &mut IdGroup)>,
    ) -> AggregatedContent {
        let mut source = String::new();
        let mut content = String::new();

        for leaf in node.nested_blocks.iter().flatten() {
            if let Some((parent_id, group)) = ids.as_mut() {
                let id = match leaf {
                    ContentLeaf::Element { vips_id, .. } => vips_id.as_str(),
                    ContentLeaf::Container { .. } | ContentLeaf::TextRun { .. } => parent_id.as_str(),
                };
                group.insert(id);
            }

            source.push_str(&extractor.extract_source(leaf));
            content.push_str(&extractor.extract_text(leaf));
            content.push(' ');
        }

        AggregatedContent {
            source,
            content,
            dom_ids: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::layout::{BlockAttributes, ParentBox};
    use crate::core::markup::HtmlDocument;
    use rstest::rstest;

    const PAGE: &str = r#"<html><body vipsid="1">
<div vipsid="2"><p vipsid="a">first</p></div>
<div vipsid="3"><p vipsid="b">second</p></div>
</body></html>"#;

    fn block(source_index: &str, doc: i32, parent: &str, leaves: Vec<Option<ContentLeaf>>) -> VisualStructureNode {
        VisualStructureNode {
            attributes: BlockAttributes {
                source_index: source_index.to_string(),
                doc,
                id: format!("VB{}", source_index),
                ..Default::default()
            },
            parent_box: Some(ParentBox {
                vips_id: parent.to_string(),
                dom_child_count: 1,
            }),
            nested_blocks: leaves,
            children: Vec::new(),
        }
    }

    fn element(id: &str, text: &str) -> Option<ContentLeaf> {
        Some(ContentLeaf::Element { vips_id: id.into(), text: text.into() })
    }

    fn two_branch_tree(root_doc: i32, left_doc: i32, right_doc: i32) -> VisualStructureNode {
        let mut root = block("1", root_doc, "1", vec![element("a", "first"), element("b", "second")]);
        root.children = vec![
            block("1-1", left_doc, "2", vec![element("a", "first")]),
            block("1-2", right_doc, "3", vec![element("b", "second")]),
        ];
        root
    }

    #[test]
    fn order_is_pre_order_from_one() {
        let doc = HtmlDocument::parse(PAGE);
        let mut root = two_branch_tree(1, 1, 1);
        root.children[0].children.push(block("1-1-1", 1, "2", vec![element("a", "first")]));

        let projection = Projector::new(11).project(&root, &doc).unwrap();
        let nodes = projection.root.pre_order();
        let orders: Vec<u32> = nodes.iter().map(|n| n.order).collect();
        let indexes: Vec<&str> = nodes
            .iter()
            .map(|n| n.attributes.source_index.as_str())
            .collect();

        assert_eq!(orders, vec![1, 2, 3, 4]);
        assert_eq!(indexes, vec!["1", "1-1", "1-1-1", "1-2"]);
    }

    #[test]
    fn sibling_groups_follow_traversal_order() {
        let doc = HtmlDocument::parse(PAGE);
        let root = two_branch_tree(1, 9, 9);

        let projection = Projector::new(5).project(&root, &doc).unwrap();

        assert_eq!(projection.id_groups.len(), 2);
        assert_eq!(projection.id_groups[0].ids(), ["a"]);
        assert_eq!(projection.id_groups[1].ids(), ["b"]);
    }

    #[test]
    fn default_pdoc_stops_at_root() {
        let doc = HtmlDocument::parse(PAGE);
        let root = two_branch_tree(1, 1, 1);

        let projection = Projector::new(0).project(&root, &doc).unwrap();

        assert!(projection.root.is_leaf());
        let aggregate = projection.root.aggregate.as_ref().unwrap();
        assert_eq!(aggregate.dom_ids.as_ref().unwrap().ids(), ["a", "b"]);
        assert_eq!(aggregate.content, "first second ");
        assert_eq!(
            aggregate.source,
            r#"<p vipsid="a">first</p><p vipsid="b">second</p>"#
        );
    }

    #[test]
    fn continuing_inner_node_has_no_aggregate() {
        let doc = HtmlDocument::parse(PAGE);
        let projection = Projector::new(11).project(&two_branch_tree(1, 1, 1), &doc).unwrap();

        assert!(projection.root.aggregate.is_none());
        let leaf = projection.root.children[0].aggregate.as_ref().unwrap();
        assert_eq!(leaf.content, "first ");
        assert!(leaf.dom_ids.is_none());
        assert!(projection.id_groups.is_empty());
    }

    #[test]
    fn synthetic_leaves_are_attributed_to_parent_box() {
        let doc = HtmlDocument::parse(PAGE);
        let root = block(
            "1",
            8,
            "2",
            vec![
                Some(ContentLeaf::TextRun { text: "loose".into() }),
                None,
                element("a", "first"),
                Some(ContentLeaf::Container { text: "boxed".into() }),
            ],
        );

        let projection = Projector::new(3).project(&root, &doc).unwrap();
        let aggregate = projection.root.aggregate.as_ref().unwrap();

        assert_eq!(projection.id_groups[0].ids(), ["2", "a"]);
        assert_eq!(aggregate.source, r#"loose<p vipsid="a">first</p>boxed"#);
        assert_eq!(aggregate.content, "loose first boxed ");
    }

    #[test]
    fn stopped_node_without_leaves_records_no_group() {
        let doc = HtmlDocument::parse(PAGE);
        let root = block("1", 9, "1", Vec::new());

        let projection = Projector::new(2).project(&root, &doc).unwrap();

        assert!(projection.root.aggregate.is_none());
        assert!(projection.id_groups.is_empty());
    }

    #[test]
    fn missing_parent_box_fails_the_page() {
        let doc = HtmlDocument::parse(PAGE);
        let mut root = two_branch_tree(1, 1, 1);
        root.children[1].parent_box = None;

        let err = Projector::new(11).project(&root, &doc).unwrap_err();
        assert!(err.to_string().contains("1-2"));
    }

    #[test]
    fn mixed_thresholds_end_to_end() {
        let doc = HtmlDocument::parse(PAGE);
        let root = two_branch_tree(2, 5, 9);

        let projection = Projector::new(5).project(&root, &doc).unwrap();
        let root = &projection.root;

        assert_eq!(root.children.len(), 2);
        let kept = &root.children[0];
        let collapsed = &root.children[1];
        assert_eq!(kept.aggregate.as_ref().unwrap().content, "first ");
        assert!(kept.aggregate.as_ref().unwrap().dom_ids.is_none());
        assert_eq!(
            collapsed.aggregate.as_ref().unwrap().dom_ids.as_ref().unwrap().ids(),
            ["b"]
        );
        assert_eq!(projection.id_groups, vec![["b"].into_iter().collect::<IdGroup>()]);
    }

    #[test]
    fn rejected_pdoc_keeps_last_valid_threshold() {
        let doc = HtmlDocument::parse(PAGE);
        let mut config = SegmentationConfig::default();
        config.set_permitted_doc(5).unwrap();
        assert!(config.set_permitted_doc(40).is_err());

        let projection = Projector::from_config(&config)
            .project(&two_branch_tree(2, 5, 9), &doc)
            .unwrap();
        assert_eq!(projection.root.children.len(), 2);
        assert_eq!(projection.id_groups.len(), 1);
    }

    #[test]
    fn default_config_stops_at_root() {
        let doc = HtmlDocument::parse(PAGE);
        let projection = Projector::from_config(&SegmentationConfig::default())
            .project(&two_branch_tree(1, 1, 1), &doc)
            .unwrap();
        assert!(projection.root.is_leaf());
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 2)]
    #[case(3, 2)]
    #[case(6, 3)]
    #[case(11, 3)]
    fn leaves_grow_with_pdoc(#[case] pdoc: i32, #[case] expected_leaves: usize) {
        let doc = HtmlDocument::parse(PAGE);
        let mut root = two_branch_tree(1, 2, 4);
        root.children[1].children = vec![
            block("1-2-1", 7, "3", vec![element("b", "second")]),
            block("1-2-2", 7, "3", vec![element("b", "second")]),
        ];

        let projection = Projector::new(pdoc).project(&root, &doc).unwrap();
        assert_eq!(projection.root.leaf_count(), expected_leaves);
    }
}

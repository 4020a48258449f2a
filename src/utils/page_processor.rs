use crate::config::SegmentationConfig;
use crate::core::layout::PageInput;
use crate::core::markup::HtmlDocument;
use crate::core::preview::PreviewBuilder;
use crate::core::projector::Projector;
use crate::core::writer::{Writer, XmlTreeWriter};
use anyhow::{Context, Result};
use log::{debug, error, info};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// File names expected inside each page directory of a batch
pub const VISUAL_STRUCTURE_FILE: &str = "visual.json";
pub const PAGE_MARKUP_FILE: &str = "page.html";

/// Summary of one processed page
#[derive(Debug, Clone, PartialEq)]
pub struct PageReport {
    pub xml_path: PathBuf,
    pub preview_path: PathBuf,
    pub output_nodes: usize,
    pub id_groups: usize,
}

pub struct PageProcessor {
    config: SegmentationConfig,
}

impl PageProcessor {
    pub fn new(config: SegmentationConfig) -> Self {
        Self { config }
    }

    /// Project one page and write both the structured document and the preview into `output_dir`.
    pub fn process_page(
        &self,
        page: &PageInput,
        dom_tree: &HtmlDocument,
        output_dir: &Path,
    ) -> Result<PageReport> {
        info!("Segmenting page {}", page.metadata.url);

        let projection = Projector::from_config(&self.config)
            .project(&page.visual_root, dom_tree)
            .with_context(|| format!("failed to project page {}", page.metadata.url))?;

        let xml_path = output_dir.join(self.config.xml_filename());
        XmlTreeWriter::new(self.config.escape_output()).write_document(
            &projection.root,
            &page.metadata,
            &xml_path,
        )?;

        let preview_path = output_dir.join(self.config.preview_filename());
        PreviewBuilder::new(dom_tree).write_preview(&projection.id_groups, &preview_path)?;

        Ok(PageReport {
            xml_path,
            preview_path,
            output_nodes: projection.root.pre_order().len(),
            id_groups: projection.id_groups.len(),
        })
    }

    /// Load a page from its visual structure JSON and original markup and process it.
    pub fn process_files(
        &self,
        visual_path: &Path,
        markup_path: &Path,
        output_dir: &Path,
    ) -> Result<PageReport> {
        let json = fs::read_to_string(visual_path)
            .with_context(|| format!("failed to read {}", visual_path.display()))?;
        let page = PageInput::from_json(&json)
            .with_context(|| format!("invalid visual structure in {}", visual_path.display()))?;
        let dom_tree = HtmlDocument::load(markup_path)?;

        fs::create_dir_all(output_dir)?;
        self.process_page(&page, &dom_tree, output_dir)
    }

    /// Process every page directory under `input_dir`, one output directory per page.
    ///
    /// Pages run in parallel; a failing page is logged and does not stop the others.
    pub fn process_directory(
        &self,
        input_dir: &Path,
        output_dir: &Path,
    ) -> Result<Vec<(PathBuf, Result<PageReport>)>> {
        info!("Starting to process pages from: {}", input_dir.display());
        fs::create_dir_all(output_dir)?;

        let mut page_dirs = Vec::new();
        for entry in fs::read_dir(input_dir)
            .with_context(|| format!("failed to read input directory {}", input_dir.display()))?
        {
            let path = entry?.path();
            if path.is_dir() {
                page_dirs.push(path);
            } else {
                debug!("Skipping non-directory entry: {:?}", path.file_name());
            }
        }
        page_dirs.sort();

        let results: Vec<(PathBuf, Result<PageReport>)> = page_dirs
            .into_par_iter()
            .map(|page_dir| {
                let page_output = output_dir.join(page_dir.file_name().unwrap_or_default());
                let result = self.process_files(
                    &page_dir.join(VISUAL_STRUCTURE_FILE),
                    &page_dir.join(PAGE_MARKUP_FILE),
                    &page_output,
                );
                match &result {
                    Ok(report) => info!(
                        "Processed {}: {} nodes, {} segments",
                        page_dir.display(),
                        report.output_nodes,
                        report.id_groups
                    ),
                    Err(e) => error!("Failed to process page {}: {:#}", page_dir.display(), e),
                }
                (page_dir, result)
            })
            .collect();

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        info!(
            "Completed {} pages ({} failed)",
            results.len(),
            failed
        );
        Ok(results)
    }
}

// src/main.rs
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::{error, info};
use std::path::PathBuf;
use vips_output::config::SegmentationConfig;
use vips_output::utils::page_processor::PageProcessor;

#[derive(Parser)]
#[command(name = "vips-output", version, about = "Write VIPS segmentation trees and grouped previews")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Segment a single page
    Page {
        /// Visual structure JSON produced by the layout stage
        visual: PathBuf,
        /// Original page markup
        markup: PathBuf,
        #[command(flatten)]
        options: OutputOptions,
    },
    /// Segment every page directory (visual.json + page.html) under DIR
    Batch {
        dir: PathBuf,
        #[command(flatten)]
        options: OutputOptions,
    },
}

#[derive(Args)]
struct OutputOptions {
    /// Output directory
    #[arg(short, long, default_value = ".")]
    output: PathBuf,
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Permitted degree of coherence (1-11)
    #[arg(short, long, allow_negative_numbers = true)]
    pdoc: Option<i32>,
    /// Base name of the structured document
    #[arg(short = 'n', long)]
    name: Option<String>,
    /// Write markup inside attributes unescaped
    #[arg(long)]
    raw: bool,
}

impl OutputOptions {
    fn to_config(&self) -> Result<SegmentationConfig> {
        let mut config = match &self.config {
            Some(path) => SegmentationConfig::from_json_file(path)?,
            None => SegmentationConfig::default(),
        };
        // rejected overrides are logged and the previous value kept
        if let Some(pdoc) = self.pdoc {
            let _ = config.set_permitted_doc(pdoc);
        }
        if let Some(name) = &self.name {
            let _ = config.set_output_filename(name.clone());
        }
        if self.raw {
            config.set_escape_output(false);
        }
        Ok(config)
    }
}

fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Command::Page { visual, markup, options } => {
            let processor = PageProcessor::new(options.to_config()?);
            let report = processor.process_files(&visual, &markup, &options.output)?;
            info!(
                "✅ {} layout nodes written to {}, {} segments previewed in {}",
                report.output_nodes,
                report.xml_path.display(),
                report.id_groups,
                report.preview_path.display()
            );
            Ok(true)
        }
        Command::Batch { dir, options } => {
            let processor = PageProcessor::new(options.to_config()?);
            let results = processor.process_directory(&dir, &options.output)?;
            Ok(results.iter().all(|(_, r)| r.is_ok()))
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

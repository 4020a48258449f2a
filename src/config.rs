use anyhow::{bail, Context, Result};
use log::warn;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const MIN_PERMITTED_DOC: i32 = 1;
pub const MAX_PERMITTED_DOC: i32 = 11;
pub const DEFAULT_OUTPUT_FILENAME: &str = "VIPSResult";
pub const DEFAULT_PREVIEW_FILENAME: &str = "out.html";

/// Tunables of the output stage.
///
/// Setters validate their input; a rejected value leaves the previous one in place.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationConfig {
    permitted_doc: i32,
    output_filename: String,
    preview_filename: String,
    escape_output: bool,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            // 0 stops segmentation at the first node
            permitted_doc: 0,
            output_filename: DEFAULT_OUTPUT_FILENAME.to_string(),
            preview_filename: DEFAULT_PREVIEW_FILENAME.to_string(),
            escape_output: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    permitted_doc: Option<i32>,
    output_filename: Option<String>,
    preview_filename: Option<String>,
    escape_output: Option<bool>,
}

impl SegmentationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON config file. Invalid values are reported and skipped.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(json)?;
        let mut config = Self::default();
        config.apply_raw(raw);
        Ok(config)
    }

    fn apply_raw(&mut self, raw: RawConfig) {
        // rejections are already logged by the setters
        if let Some(pdoc) = raw.permitted_doc {
            let _ = self.set_permitted_doc(pdoc);
        }
        if let Some(name) = raw.output_filename {
            let _ = self.set_output_filename(name);
        }
        if let Some(name) = raw.preview_filename {
            let _ = self.set_preview_filename(name);
        }
        if let Some(escape) = raw.escape_output {
            self.set_escape_output(escape);
        }
    }

    pub fn permitted_doc(&self) -> i32 {
        self.permitted_doc
    }

    pub fn set_permitted_doc(&mut self, pdoc: i32) -> Result<()> {
        if !(MIN_PERMITTED_DOC..=MAX_PERMITTED_DOC).contains(&pdoc) {
            warn!(
                "pDoC value must be between {} and {}, not {}; keeping {}",
                MIN_PERMITTED_DOC, MAX_PERMITTED_DOC, pdoc, self.permitted_doc
            );
            bail!(
                "pDoC value must be between {} and {}, not {}",
                MIN_PERMITTED_DOC,
                MAX_PERMITTED_DOC,
                pdoc
            );
        }
        self.permitted_doc = pdoc;
        Ok(())
    }

    pub fn output_filename(&self) -> &str {
        &self.output_filename
    }

    pub fn set_output_filename(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            warn!("Empty output filename ignored; keeping {}", self.output_filename);
            bail!("output filename must not be empty");
        }
        self.output_filename = name;
        Ok(())
    }

    pub fn preview_filename(&self) -> &str {
        &self.preview_filename
    }

    pub fn set_preview_filename(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            warn!("Empty preview filename ignored; keeping {}", self.preview_filename);
            bail!("preview filename must not be empty");
        }
        self.preview_filename = name;
        Ok(())
    }

    pub fn escape_output(&self) -> bool {
        self.escape_output
    }

    /// `false` selects the raw mode that writes unescaped markup inside attributes.
    pub fn set_escape_output(&mut self, escape: bool) {
        self.escape_output = escape;
    }

    /// File name of the structured tree document
    pub fn xml_filename(&self) -> String {
        format!("{}.xml", self.output_filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults() {
        let config = SegmentationConfig::default();
        assert_eq!(config.permitted_doc(), 0);
        assert_eq!(config.xml_filename(), "VIPSResult.xml");
        assert_eq!(config.preview_filename(), "out.html");
        assert!(config.escape_output());
    }

    #[rstest]
    #[case(0)]
    #[case(-3)]
    #[case(12)]
    #[case(i32::MAX)]
    fn out_of_range_pdoc_is_rejected(#[case] pdoc: i32) {
        let mut config = SegmentationConfig::default();
        config.set_permitted_doc(7).unwrap();

        assert!(config.set_permitted_doc(pdoc).is_err());
        assert_eq!(config.permitted_doc(), 7);
    }

    #[rstest]
    #[case(1)]
    #[case(6)]
    #[case(11)]
    fn in_range_pdoc_is_accepted(#[case] pdoc: i32) {
        let mut config = SegmentationConfig::default();
        config.set_permitted_doc(pdoc).unwrap();
        assert_eq!(config.permitted_doc(), pdoc);
    }

    #[test]
    fn empty_filename_keeps_previous() {
        let mut config = SegmentationConfig::default();
        config.set_output_filename("page1").unwrap();
        assert!(config.set_output_filename("").is_err());
        assert_eq!(config.output_filename(), "page1");
        assert!(config.set_preview_filename("").is_err());
        assert_eq!(config.preview_filename(), "out.html");
    }

    #[test]
    fn json_config_skips_invalid_values() {
        let config = SegmentationConfig::from_json(
            r#"{"permitted_doc": 42, "output_filename": "seg", "escape_output": false}"#,
        )
        .unwrap();
        assert_eq!(config.permitted_doc(), 0);
        assert_eq!(config.output_filename(), "seg");
        assert!(!config.escape_output());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(SegmentationConfig::from_json("{ not json").is_err());
    }
}

//! Explain settings loaded from JSON and overridden by command-line flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cam::explain::{Colormap, DEFAULT_ALPHA};
use cam::{ExplainRequest, TargetClass};
use serde::{Deserialize, Serialize};

/// Settings of an `explain` run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    /// Architecture name.
    pub arch: String,
    /// Local safetensors weights instead of the hub.
    pub weights: Option<PathBuf>,
    /// Use pretrained weights; random initialization otherwise.
    pub pretrained: bool,
    /// Label file URL or path; the ImageNet class index when unset.
    pub labels: Option<String>,
    /// Number of predictions to print.
    pub top_k: usize,
    /// How many of the top predictions get a heatmap when `classes` is empty.
    pub explain_top: usize,
    /// Fixed classes to explain.
    pub classes: Vec<usize>,
    /// Capture layer; the model's last stage when unset.
    pub layer: Option<String>,
    /// Overlay blend factor.
    pub alpha: f32,
    /// Overlay colormap.
    pub colormap: Colormap,
    /// Where overlays are written.
    pub output_dir: PathBuf,
    /// Also write `report.json`.
    pub report: bool,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            arch: "resnet18".to_string(),
            weights: None,
            pretrained: true,
            labels: None,
            top_k: 5,
            explain_top: 1,
            classes: Vec::new(),
            layer: None,
            alpha: DEFAULT_ALPHA,
            colormap: Colormap::default(),
            output_dir: PathBuf::from("cam_out"),
            report: false,
        }
    }
}

impl ExplainConfig {
    /// Read a JSON config file; missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Classes to explain.
    pub fn target(&self) -> TargetClass {
        match self.classes.as_slice() {
            [] => TargetClass::TopK(self.explain_top),
            [index] => TargetClass::Index(*index),
            indices => TargetClass::Indices(indices.to_vec()),
        }
    }

    /// Pipeline parameters.
    pub fn request(&self) -> ExplainRequest {
        ExplainRequest::new()
            .with_top_k(self.top_k)
            .with_target(self.target())
            .with_alpha(self.alpha)
            .with_colormap(self.colormap)
    }
}

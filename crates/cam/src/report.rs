//! JSON summary of an explanation.

use std::fs;
use std::path::Path;

use cam_explain::{Colormap, HeatmapStats};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pipeline::{file_stem, Explanation, Prediction};

/// Per-class heatmap summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationReport {
    /// The explained class.
    pub prediction: Prediction,
    /// Heatmap width at feature-map resolution.
    pub width: usize,
    /// Heatmap height at feature-map resolution.
    pub height: usize,
    /// Heatmap statistics.
    pub stats: HeatmapStats,
    /// Overlay file name written by [`Explanation::save`].
    pub overlay: String,
}

/// Serializable summary of an [`Explanation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainReport {
    /// Image source.
    pub source: String,
    /// Architecture name.
    pub arch: String,
    /// Capture layer.
    pub layer: String,
    /// Image width in pixels.
    pub image_width: u32,
    /// Image height in pixels.
    pub image_height: u32,
    /// Overlay colormap.
    pub colormap: Colormap,
    /// Overlay blend factor.
    pub alpha: f32,
    /// Top predictions.
    pub predictions: Vec<Prediction>,
    /// One entry per activation map.
    pub activations: Vec<ActivationReport>,
}

impl ExplainReport {
    /// Summarize an explanation.
    pub fn from_explanation(explanation: &Explanation) -> Self {
        let activations = explanation
            .activations
            .iter()
            .map(|a| ActivationReport {
                prediction: a.prediction.clone(),
                width: a.heatmap.width(),
                height: a.heatmap.height(),
                stats: a.heatmap.stats(),
                overlay: format!("{}.png", file_stem(&a.prediction)),
            })
            .collect();

        Self {
            source: explanation.source.clone(),
            arch: explanation.arch.clone(),
            layer: explanation.layer.clone(),
            image_width: explanation.image.width(),
            image_height: explanation.image.height(),
            colormap: explanation.colormap,
            alpha: explanation.alpha,
            predictions: explanation.predictions.clone(),
            activations,
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as JSON.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

//! End-to-end explanation of a single image.
//!
//! One call fetches and preprocesses the image, runs the classifier once,
//! picks the classes to explain and computes a CAM for each of them.

use std::fs;
use std::path::{Path, PathBuf};

use burn::prelude::*;
use cam_core::CoreError;
use cam_data::{load_image, preprocess, ImageSource, LabelTable};
use cam_explain::{heatmap_image, overlay, CamHeatmap, Classifier, Colormap, DEFAULT_ALPHA};
use cam_models::default_registry;
use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::report::ExplainReport;

/// Which classes to compute activation maps for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetClass {
    /// The `k` most probable classes.
    TopK(usize),
    /// One fixed class index.
    Index(usize),
    /// Several fixed class indices, in the given order.
    Indices(Vec<usize>),
}

impl Default for TargetClass {
    fn default() -> Self {
        Self::TopK(1)
    }
}

/// Parameters of one explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainRequest {
    /// Number of predictions to report.
    pub top_k: usize,
    /// Classes to explain.
    pub target: TargetClass,
    /// Heatmap weight in overlays.
    pub alpha: f32,
    /// Heatmap colors.
    pub colormap: Colormap,
}

impl Default for ExplainRequest {
    fn default() -> Self {
        Self {
            top_k: 5,
            target: TargetClass::default(),
            alpha: DEFAULT_ALPHA,
            colormap: Colormap::default(),
        }
    }
}

impl ExplainRequest {
    /// Create a request with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of reported predictions.
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the classes to explain.
    #[must_use]
    pub fn with_target(mut self, target: TargetClass) -> Self {
        self.target = target;
        self
    }

    /// Set the overlay blend factor.
    #[must_use]
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the colormap.
    #[must_use]
    pub fn with_colormap(mut self, colormap: Colormap) -> Self {
        self.colormap = colormap;
        self
    }
}

/// A scored class with its label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Class index.
    pub class_index: usize,
    /// Softmax probability.
    pub probability: f32,
    /// Machine-readable class code.
    pub code: String,
    /// Human-readable class name.
    pub label: String,
}

impl Prediction {
    fn new(class_index: usize, probability: f32, labels: &LabelTable) -> Self {
        Self {
            class_index,
            probability,
            code: labels.code(class_index),
            label: labels.name(class_index),
        }
    }
}

/// The activation map of one class.
#[derive(Debug, Clone)]
pub struct ClassActivation {
    /// The explained class.
    pub prediction: Prediction,
    /// Heatmap at feature-map resolution.
    pub heatmap: CamHeatmap,
}

/// Result of [`explain`].
#[derive(Debug, Clone)]
pub struct Explanation {
    /// Where the image came from.
    pub source: String,
    /// Architecture name.
    pub arch: String,
    /// Layer the activations were taken from.
    pub layer: String,
    /// The original image.
    pub image: RgbImage,
    /// Most probable classes, highest first.
    pub predictions: Vec<Prediction>,
    /// One activation map per explained class.
    pub activations: Vec<ClassActivation>,
    /// Overlay blend factor.
    pub alpha: f32,
    /// Overlay colors.
    pub colormap: Colormap,
}

impl Explanation {
    /// Heatmap blended over the original image, one per explained class.
    pub fn overlays(&self) -> Result<Vec<RgbImage>> {
        self.activations
            .iter()
            .map(|a| -> Result<RgbImage> {
                Ok(overlay(&self.image, &a.heatmap, self.alpha, self.colormap)?)
            })
            .collect()
    }

    /// Write an overlay and a bare heatmap PNG per explained class.
    ///
    /// # Returns
    ///
    /// Paths of the overlay images, in the order of [`Explanation::activations`].
    pub fn save(&self, output_dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(output_dir)?;

        let mut paths = Vec::with_capacity(self.activations.len());
        for (activation, image) in self.activations.iter().zip(self.overlays()?) {
            let stem = file_stem(&activation.prediction);

            let overlay_path = output_dir.join(format!("{}.png", stem));
            image.save(&overlay_path)?;

            let heatmap = activation
                .heatmap
                .upsample(self.image.width(), self.image.height())?;
            heatmap_image(&heatmap, self.colormap)
                .save(output_dir.join(format!("{}_heatmap.png", stem)))?;

            info!("Wrote {}", overlay_path.display());
            paths.push(overlay_path);
        }
        Ok(paths)
    }

    /// Summary of predictions and heatmaps.
    pub fn report(&self) -> ExplainReport {
        ExplainReport::from_explanation(self)
    }
}

/// File name stem for a class, e.g. `cam_281_tabby_cat`.
pub fn file_stem(prediction: &Prediction) -> String {
    let label: String = prediction
        .label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let label = label
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    format!("cam_{}_{}", prediction.class_index, label)
}

/// Build a classifier from a registered architecture name.
///
/// With `weights` set the model loads that safetensors file, otherwise
/// `pretrained` selects hub weights or a random initialization.
pub fn load_classifier<B: Backend>(
    arch: &str,
    weights: Option<&Path>,
    pretrained: bool,
    layer: Option<&str>,
    device: &B::Device,
) -> Result<Classifier<B>> {
    let registry = default_registry::<B>();
    let config = match weights {
        Some(path) => json!({ "weights": path.to_string_lossy() }),
        None => json!({ "pretrained": pretrained }),
    };
    let model = registry.create(arch, &config, device)?;
    let classifier = Classifier::new(model, device.clone());

    Ok(match layer {
        Some(layer) => classifier.with_layer(layer)?,
        None => classifier,
    })
}

/// Classify an already decoded image.
pub fn predict_image<B: Backend>(
    classifier: &Classifier<B>,
    image: &DynamicImage,
    labels: &LabelTable,
    top_k: usize,
) -> Result<Vec<Prediction>> {
    let input = preprocess(image)?;
    let inference = classifier.infer(&input)?;
    Ok(inference
        .top_k(top_k)
        .into_iter()
        .map(|s| Prediction::new(s.index, s.probability, labels))
        .collect())
}

/// Fetch and classify an image.
pub fn predict<B: Backend>(
    classifier: &Classifier<B>,
    source: &ImageSource,
    labels: &LabelTable,
    top_k: usize,
) -> Result<Vec<Prediction>> {
    let image = load_image(source)?;
    predict_image(classifier, &image, labels, top_k)
}

/// Fetch an image, classify it and compute the requested activation maps.
pub fn explain<B: Backend>(
    classifier: &Classifier<B>,
    source: &ImageSource,
    labels: &LabelTable,
    request: &ExplainRequest,
) -> Result<Explanation> {
    let image = load_image(source)?;
    explain_image(classifier, &image, &source.to_string(), labels, request)
}

/// Classify an already decoded image and compute the requested activation maps.
pub fn explain_image<B: Backend>(
    classifier: &Classifier<B>,
    image: &DynamicImage,
    source: &str,
    labels: &LabelTable,
    request: &ExplainRequest,
) -> Result<Explanation> {
    let n_classes = classifier.n_classes();
    if !labels.is_empty() && labels.len() != n_classes {
        warn!(
            "Label table has {} entries but the model predicts {} classes",
            labels.len(),
            n_classes
        );
    }

    let input = preprocess(image)?;
    let inference = classifier.infer(&input)?;

    let predictions: Vec<Prediction> = inference
        .top_k(request.top_k)
        .into_iter()
        .map(|s| Prediction::new(s.index, s.probability, labels))
        .collect();

    let classes: Vec<usize> = match &request.target {
        TargetClass::TopK(k) => inference.top_k(*k).into_iter().map(|s| s.index).collect(),
        TargetClass::Index(index) => vec![*index],
        TargetClass::Indices(indices) => indices.clone(),
    };
    if let Some(&index) = classes.iter().find(|&&i| i >= n_classes) {
        return Err(CoreError::ClassOutOfRange { index, n_classes }.into());
    }

    let heatmaps = classifier.cams(&inference, &classes)?;
    let activations: Vec<ClassActivation> = classes
        .iter()
        .zip(heatmaps)
        .map(|(&index, heatmap)| {
            let prediction = Prediction::new(index, inference.probabilities[index], labels);
            debug!(
                "CAM for {} ({}): {}x{}",
                index,
                prediction.label,
                heatmap.width(),
                heatmap.height()
            );
            ClassActivation {
                prediction,
                heatmap,
            }
        })
        .collect();

    if let Some(best) = predictions.first() {
        info!(
            "{}: {} (p={:.4}), {} activation map(s)",
            source,
            best.label,
            best.probability,
            activations.len()
        );
    }

    Ok(Explanation {
        source: source.to_string(),
        arch: classifier.model().name().to_string(),
        layer: classifier.layer().to_string(),
        image: image.to_rgb8(),
        predictions,
        activations,
        alpha: request.alpha,
        colormap: request.colormap,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stem() {
        let p = Prediction {
            class_index: 281,
            probability: 0.5,
            code: "n02123045".to_string(),
            label: "Tabby cat, (domestic)".to_string(),
        };
        assert_eq!(file_stem(&p), "cam_281_tabby_cat_domestic");
    }

    #[test]
    fn test_request_builder() {
        let request = ExplainRequest::new()
            .with_top_k(3)
            .with_target(TargetClass::Index(7))
            .with_alpha(0.3)
            .with_colormap(Colormap::Inferno);
        assert_eq!(request.top_k, 3);
        assert_eq!(request.target, TargetClass::Index(7));
        assert_eq!(request.colormap, Colormap::Inferno);
    }

    #[test]
    fn test_target_serde() {
        let json = serde_json::to_string(&TargetClass::TopK(2)).unwrap();
        assert_eq!(json, r#"{"top_k":2}"#);
        let parsed: TargetClass = serde_json::from_str(r#"{"indices":[1,2]}"#).unwrap();
        assert_eq!(parsed, TargetClass::Indices(vec![1, 2]));
    }
}

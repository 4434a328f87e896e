//! Single-image inference with feature capture.

use burn::prelude::*;
use cam_core::{tensor_to_vec, CoreError, FeatureMap, ImageTensor};
use cam_models::FeatureExtractor;
use tracing::debug;

use crate::activation::FeatureCapture;
use crate::attribution::{cam_for_classes, compute_cam, CamHeatmap};
use crate::error::Result;
use crate::topk::{top_k, ClassScore};

/// Numerically stable softmax over raw class scores.
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Output of one forward pass.
#[derive(Debug, Clone)]
pub struct Inference<B: Backend> {
    /// Raw class scores.
    pub logits: Vec<f32>,
    /// Softmax of the logits.
    pub probabilities: Vec<f32>,
    /// Activation of the capture layer.
    pub features: FeatureMap<B>,
    /// Name of the capture layer.
    pub layer: String,
}

impl<B: Backend> Inference<B> {
    /// The `k` most probable classes.
    pub fn top_k(&self, k: usize) -> Vec<ClassScore> {
        top_k(&self.probabilities, k)
    }

    /// Number of classes scored.
    pub fn n_classes(&self) -> usize {
        self.probabilities.len()
    }
}

/// A feature-extracting model together with its capture layer and head weights.
pub struct Classifier<B: Backend> {
    model: Box<dyn FeatureExtractor<B>>,
    layer: String,
    weights: Tensor<B, 2>,
    device: B::Device,
}

impl<B: Backend> Classifier<B> {
    /// Wrap a model, capturing its default CAM layer.
    pub fn new(model: Box<dyn FeatureExtractor<B>>, device: B::Device) -> Self {
        let layer = model.cam_layer().to_string();
        let weights = model.class_weights();
        Self {
            model,
            layer,
            weights,
            device,
        }
    }

    /// Capture a different layer.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownLayer`] if the model has no such layer.
    pub fn with_layer(mut self, layer: &str) -> Result<Self> {
        self.model.layer_index(layer)?;
        self.layer = layer.to_string();
        Ok(self)
    }

    /// The wrapped model.
    pub fn model(&self) -> &dyn FeatureExtractor<B> {
        self.model.as_ref()
    }

    /// Name of the capture layer.
    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// Classifier weights, `(n_classes, channels)`.
    pub fn class_weights(&self) -> &Tensor<B, 2> {
        &self.weights
    }

    /// Number of classes.
    pub fn n_classes(&self) -> usize {
        self.model.n_classes()
    }

    /// Device the model runs on.
    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Run a forward pass, storing the capture layer's activation in `capture`.
    ///
    /// # Returns
    ///
    /// Logits tensor of shape (1, n_classes).
    pub fn forward(
        &self,
        input: &ImageTensor,
        capture: &mut FeatureCapture<B>,
    ) -> Result<Tensor<B, 2>> {
        let x = input.to_batch::<B>(&self.device);
        let features = self.model.forward_features(x, &self.layer)?;
        capture.store(&self.layer, features.clone());
        Ok(self.model.forward_head(features, &self.layer)?)
    }

    /// Classify one image and keep its feature map.
    pub fn infer(&self, input: &ImageTensor) -> Result<Inference<B>> {
        let mut capture = FeatureCapture::new();
        let logits = tensor_to_vec(self.forward(input, &mut capture)?)?;
        let (layer, features) = capture
            .take()
            .ok_or_else(|| CoreError::Other(format!("no activation captured for '{}'", self.layer)))?;
        let features = FeatureMap::from_batched(features)?;
        let probabilities = softmax(&logits);

        if let Some(best) = top_k(&probabilities, 1).first() {
            debug!(
                "{}: top class {} (p={:.4}), features {}",
                self.model.name(),
                best.index,
                best.probability,
                features.shape()
            );
        }

        Ok(Inference {
            logits,
            probabilities,
            features,
            layer,
        })
    }

    /// Class activation map of `class` for a finished inference.
    pub fn cam(&self, inference: &Inference<B>, class: usize) -> Result<CamHeatmap> {
        Ok(compute_cam(&inference.features, &self.weights, class)?)
    }

    /// Class activation maps for several classes.
    pub fn cams(&self, inference: &Inference<B>, classes: &[usize]) -> Result<Vec<CamHeatmap>> {
        Ok(cam_for_classes(&inference.features, &self.weights, classes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cam_core::backend::NdArray;
    use cam_models::{ResNetArch, ResNetConfig};

    type TestBackend = NdArray;

    fn tiny_classifier(n_classes: usize) -> Classifier<TestBackend> {
        let device = Default::default();
        let model = ResNetConfig::new(ResNetArch::ResNet18, n_classes)
            .with_base_width(4)
            .init::<TestBackend>(&device);
        Classifier::new(Box::new(model), device)
    }

    fn gray_image() -> ImageTensor {
        ImageTensor::new(vec![0.25; ImageTensor::SHAPE.numel()], ImageTensor::SHAPE).unwrap()
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_softmax_large_scores() {
        let probs = softmax(&[1000.0, 1000.0]);
        assert!((probs[0] - 0.5).abs() < 1e-6);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!(softmax(&[]).is_empty());
    }

    #[test]
    fn test_infer_shapes() {
        let classifier = tiny_classifier(6);
        let inference = classifier.infer(&gray_image()).unwrap();

        assert_eq!(inference.n_classes(), 6);
        assert_eq!(inference.logits.len(), 6);
        assert_eq!(inference.layer, "layer4");
        assert_eq!(inference.features.shape().as_array(), [32, 7, 7]);
        let sum: f32 = inference.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_forward_fills_capture() {
        let classifier = tiny_classifier(3);
        let mut capture = FeatureCapture::new();
        let logits = classifier.forward(&gray_image(), &mut capture).unwrap();

        assert_eq!(logits.dims(), [1, 3]);
        assert_eq!(capture.layer(), Some("layer4"));
        assert_eq!(capture.get().map(|t| t.dims()), Some([1, 32, 7, 7]));
    }

    #[test]
    fn test_unknown_layer() {
        let result = tiny_classifier(3).with_layer("fc");
        assert!(matches!(
            result,
            Err(crate::ExplainError::Core(CoreError::UnknownLayer { .. }))
        ));
    }

    #[test]
    fn test_cam_from_inference() {
        let classifier = tiny_classifier(4);
        let inference = classifier.infer(&gray_image()).unwrap();
        let cams = classifier.cams(&inference, &[0, 3]).unwrap();

        assert_eq!(cams.len(), 2);
        assert_eq!(cams[1].class_index(), 3);
        assert_eq!((cams[0].height(), cams[0].width()), (7, 7));
        assert!(matches!(
            classifier.cam(&inference, 4),
            Err(crate::ExplainError::Core(CoreError::ClassOutOfRange { index: 4, n_classes: 4 }))
        ));
    }

    #[test]
    fn test_cam_from_earlier_layer_is_shape_mismatch() {
        let classifier = tiny_classifier(4).with_layer("layer3").unwrap();
        let inference = classifier.infer(&gray_image()).unwrap();
        assert!(matches!(
            classifier.cam(&inference, 0),
            Err(crate::ExplainError::Core(CoreError::ShapeMismatch(_)))
        ));
    }
}

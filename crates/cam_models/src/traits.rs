//! Explicit feature extraction for class activation mapping.
//!
//! Instead of registering a forward hook that stashes an intermediate output in
//! shared state, a model splits its forward pass in two: everything up to a
//! named layer ([`FeatureExtractor::forward_features`]) and everything after it
//! ([`FeatureExtractor::forward_head`]). The caller owns the intermediate tensor.

use burn::prelude::*;
use cam_core::{CoreError, Result};

/// A convolutional classifier whose forward pass can be split at a named layer.
///
/// Note: We don't require Send + Sync here because Burn's Module types
/// use interior mutability (OnceCell) that doesn't implement Sync.
pub trait FeatureExtractor<B: Backend> {
    /// Architecture name, e.g. `resnet18`.
    fn name(&self) -> &str;

    /// Names of the layers the forward pass can be split at, in execution order.
    fn layer_names(&self) -> &'static [&'static str];

    /// The last convolutional stage, whose channels feed the classifier head.
    fn cam_layer(&self) -> &'static str;

    /// Run the network up to and including `layer`.
    ///
    /// # Arguments
    ///
    /// * `x` - Input images of shape (batch, 3, height, width)
    /// * `layer` - One of [`FeatureExtractor::layer_names`]
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownLayer`] if the model has no such layer.
    fn forward_features(&self, x: Tensor<B, 4>, layer: &str) -> Result<Tensor<B, 4>>;

    /// Continue a forward pass from the output of `layer` to class logits.
    ///
    /// # Returns
    ///
    /// Logits tensor of shape (batch, n_classes).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownLayer`] if the model has no such layer.
    fn forward_head(&self, features: Tensor<B, 4>, layer: &str) -> Result<Tensor<B, 2>>;

    /// Classifier weights as a (n_classes, channels) matrix.
    fn class_weights(&self) -> Tensor<B, 2>;

    /// Number of classes the head predicts.
    fn n_classes(&self) -> usize;

    /// Position of `layer` in [`FeatureExtractor::layer_names`].
    fn layer_index(&self, layer: &str) -> Result<usize> {
        let names = self.layer_names();
        names
            .iter()
            .position(|&name| name == layer)
            .ok_or_else(|| CoreError::unknown_layer(layer, names))
    }

    /// Full forward pass returning logits.
    fn forward_logits(&self, x: Tensor<B, 4>) -> Result<Tensor<B, 2>> {
        let layer = self.cam_layer();
        let features = self.forward_features(x, layer)?;
        self.forward_head(features, layer)
    }
}

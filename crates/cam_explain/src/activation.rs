//! Caller-owned storage for an intermediate activation.

use burn::prelude::*;

/// Single-slot store for the output of one named layer.
///
/// Each forward pass gets its own capture; storing again overwrites the
/// previous activation.
#[derive(Debug, Clone)]
pub struct FeatureCapture<B: Backend> {
    slot: Option<(String, Tensor<B, 4>)>,
}

impl<B: Backend> FeatureCapture<B> {
    /// Create an empty capture.
    pub fn new() -> Self {
        Self { slot: None }
    }

    /// Store an activation, replacing any previous one.
    pub fn store(&mut self, layer: &str, activation: Tensor<B, 4>) {
        self.slot = Some((layer.to_string(), activation));
    }

    /// Get the stored activation.
    pub fn get(&self) -> Option<&Tensor<B, 4>> {
        self.slot.as_ref().map(|(_, tensor)| tensor)
    }

    /// Name of the layer the activation came from.
    pub fn layer(&self) -> Option<&str> {
        self.slot.as_ref().map(|(name, _)| name.as_str())
    }

    /// Remove and return the stored activation.
    pub fn take(&mut self) -> Option<(String, Tensor<B, 4>)> {
        self.slot.take()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    /// Drop the stored activation.
    pub fn clear(&mut self) {
        self.slot = None;
    }
}

impl<B: Backend> Default for FeatureCapture<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cam_core::backend::NdArray;

    #[test]
    fn test_feature_capture_empty() {
        let capture: FeatureCapture<NdArray> = FeatureCapture::new();
        assert!(capture.is_empty());
        assert!(capture.get().is_none());
        assert!(capture.layer().is_none());
    }

    #[test]
    fn test_store_overwrites() {
        let device = Default::default();
        let mut capture: FeatureCapture<NdArray> = FeatureCapture::default();

        capture.store("layer3", Tensor::zeros([1, 2, 3, 3], &device));
        capture.store("layer4", Tensor::ones([1, 4, 2, 2], &device));

        assert_eq!(capture.layer(), Some("layer4"));
        assert_eq!(capture.get().map(|t| t.dims()), Some([1, 4, 2, 2]));
    }

    #[test]
    fn test_take_and_clear() {
        let device = Default::default();
        let mut capture: FeatureCapture<NdArray> = FeatureCapture::new();

        capture.store("layer4", Tensor::ones([1, 1, 1, 1], &device));
        let (layer, _) = capture.take().unwrap();
        assert_eq!(layer, "layer4");
        assert!(capture.is_empty());

        capture.store("layer4", Tensor::ones([1, 1, 1, 1], &device));
        capture.clear();
        assert!(capture.take().is_none());
    }
}

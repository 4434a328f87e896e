//! Image and feature map tensor types.

use burn::prelude::*;
use burn::tensor::TensorData;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::shape::ChwShape;

/// Side length of the square model input.
pub const INPUT_SIZE: usize = 224;

/// Per-channel normalization constants applied after scaling pixels to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    /// Per-channel mean (R, G, B).
    pub mean: [f32; 3],
    /// Per-channel standard deviation (R, G, B).
    pub std: [f32; 3],
}

impl Normalization {
    /// The ImageNet statistics every torchvision-pretrained backbone expects.
    pub const IMAGENET: Self = Self {
        mean: [0.485, 0.456, 0.406],
        std: [0.229, 0.224, 0.225],
    };

    /// Normalize one channel value already scaled to `[0, 1]`.
    #[inline]
    #[must_use]
    pub fn apply(&self, channel: usize, value: f32) -> f32 {
        (value - self.mean[channel]) / self.std[channel]
    }

    /// Undo [`Normalization::apply`].
    #[inline]
    #[must_use]
    pub fn invert(&self, channel: usize, value: f32) -> f32 {
        value * self.std[channel] + self.mean[channel]
    }
}

impl Default for Normalization {
    fn default() -> Self {
        Self::IMAGENET
    }
}

/// A preprocessed, normalized model input in `(C, H, W)` order.
///
/// Created once per image and consumed once by a forward pass. The data lives
/// on the host so it can be moved to whichever backend the classifier runs on.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Vec<f32>,
    shape: ChwShape,
}

impl ImageTensor {
    /// The expected input shape, `(3, 224, 224)`.
    pub const SHAPE: ChwShape = ChwShape::new(3, INPUT_SIZE, INPUT_SIZE);

    /// Create an image tensor from CHW data.
    ///
    /// # Errors
    ///
    /// Returns an error if the shape is not `(3, 224, 224)` or the data length
    /// does not match the shape.
    pub fn new(data: Vec<f32>, shape: ChwShape) -> Result<Self> {
        if shape != Self::SHAPE {
            return Err(CoreError::InvalidShape {
                expected: Self::SHAPE.to_string(),
                got: shape.to_string(),
            });
        }
        if data.len() != shape.numel() {
            return Err(CoreError::ShapeMismatch(format!(
                "data length {} != {} elements of {}",
                data.len(),
                shape.numel(),
                shape
            )));
        }
        Ok(Self { data, shape })
    }

    /// Get the shape metadata.
    #[must_use]
    pub const fn shape(&self) -> ChwShape {
        self.shape
    }

    /// Borrow the raw CHW data.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Move the image onto a device as a batch of one, `(1, C, H, W)`.
    pub fn to_batch<B: Backend>(&self, device: &B::Device) -> Tensor<B, 4> {
        let data = TensorData::new(self.data.clone(), self.shape.batched());
        Tensor::from_data(data, device)
    }
}

/// A single convolutional feature map `(C, H', W')` captured from a forward pass.
#[derive(Debug, Clone)]
pub struct FeatureMap<B: Backend> {
    inner: Tensor<B, 3>,
    shape: ChwShape,
}

impl<B: Backend> FeatureMap<B> {
    /// Wrap a `(C, H, W)` tensor.
    ///
    /// # Errors
    ///
    /// Returns an error if any dimension is zero.
    pub fn new(tensor: Tensor<B, 3>) -> Result<Self> {
        let shape = ChwShape::from(tensor.dims());
        if shape.is_empty() {
            return Err(CoreError::InvalidShape {
                expected: "non-empty feature map".to_string(),
                got: shape.to_string(),
            });
        }
        Ok(Self {
            inner: tensor,
            shape,
        })
    }

    /// Wrap the output of a layer for a batch of one, `(1, C, H, W)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch size is not one or any dimension is zero.
    pub fn from_batched(tensor: Tensor<B, 4>) -> Result<Self> {
        let shape = ChwShape::from_dims(&tensor.dims())?;
        Self::new(tensor.reshape(shape.as_array()))
    }

    /// Build a feature map from host data, mostly for tests and tooling.
    ///
    /// # Errors
    ///
    /// Returns an error if the data length does not match the shape.
    pub fn from_vec(data: Vec<f32>, shape: ChwShape, device: &B::Device) -> Result<Self> {
        if data.len() != shape.numel() {
            return Err(CoreError::ShapeMismatch(format!(
                "data length {} != {} elements of {}",
                data.len(),
                shape.numel(),
                shape
            )));
        }
        Self::new(Tensor::from_data(TensorData::new(data, shape.as_array()), device))
    }

    /// Get the shape metadata.
    #[must_use]
    pub const fn shape(&self) -> ChwShape {
        self.shape
    }

    /// Get a reference to the underlying Burn tensor.
    #[must_use]
    pub const fn inner(&self) -> &Tensor<B, 3> {
        &self.inner
    }

    /// Consume self and return the underlying Burn tensor.
    #[must_use]
    pub fn into_inner(self) -> Tensor<B, 3> {
        self.inner
    }

    /// Restore the batch dimension, `(1, C, H, W)`.
    #[must_use]
    pub fn to_batched(&self) -> Tensor<B, 4> {
        self.inner.clone().reshape(self.shape.batched())
    }

    /// Flatten the spatial dimensions, `(C, H' * W')`.
    #[must_use]
    pub fn flatten_spatial(&self) -> Tensor<B, 2> {
        self.inner
            .clone()
            .reshape([self.shape.channels(), self.shape.spatial()])
    }

    /// Get the device the tensor is on.
    pub fn device(&self) -> B::Device {
        self.inner.device()
    }
}

/// Read any float tensor back to the host as `f32` values in row-major order.
///
/// # Errors
///
/// Returns [`CoreError::Tensor`] if the backend data cannot be converted.
pub fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| CoreError::Tensor(format!("{:?}", e)))
}

#[cfg(all(test, feature = "backend-ndarray"))]
mod tests {
    use super::*;
    use crate::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_image_tensor_validates_shape() {
        let data = vec![0.0; 3 * 32 * 32];
        assert!(ImageTensor::new(data, ChwShape::new(3, 32, 32)).is_err());

        let data = vec![0.0; 10];
        assert!(matches!(
            ImageTensor::new(data, ImageTensor::SHAPE),
            Err(CoreError::ShapeMismatch(_))
        ));

        let data = vec![0.5; ImageTensor::SHAPE.numel()];
        let image = ImageTensor::new(data, ImageTensor::SHAPE).unwrap();
        assert_eq!(image.shape(), ImageTensor::SHAPE);
    }

    #[test]
    fn test_image_tensor_to_batch() {
        let device = Default::default();
        let data = vec![1.0; ImageTensor::SHAPE.numel()];
        let image = ImageTensor::new(data, ImageTensor::SHAPE).unwrap();

        let batch = image.to_batch::<TestBackend>(&device);
        assert_eq!(batch.dims(), [1, 3, 224, 224]);
    }

    #[test]
    fn test_normalization_roundtrip() {
        let norm = Normalization::IMAGENET;
        let v = norm.apply(1, 0.8);
        assert!((norm.invert(1, v) - 0.8).abs() < 1e-6);
        assert!(norm.apply(0, 0.485).abs() < 1e-6);
    }

    #[test]
    fn test_feature_map_from_batched() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 4>::ones([1, 8, 7, 7], &device);
        let fmap = FeatureMap::from_batched(tensor).unwrap();
        assert_eq!(fmap.shape(), ChwShape::new(8, 7, 7));
        assert_eq!(fmap.flatten_spatial().dims(), [8, 49]);
        assert_eq!(fmap.to_batched().dims(), [1, 8, 7, 7]);

        let batch_of_two = Tensor::<TestBackend, 4>::ones([2, 8, 7, 7], &device);
        assert!(FeatureMap::from_batched(batch_of_two).is_err());
    }

    #[test]
    fn test_feature_map_from_vec() {
        let device = Default::default();
        let fmap = FeatureMap::<TestBackend>::from_vec(
            vec![1.0, 2.0, 3.0, 4.0],
            ChwShape::new(1, 2, 2),
            &device,
        )
        .unwrap();
        let values = tensor_to_vec(fmap.into_inner()).unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);

        let bad = FeatureMap::<TestBackend>::from_vec(vec![1.0], ChwShape::new(1, 2, 2), &device);
        assert!(bad.is_err());
    }
}

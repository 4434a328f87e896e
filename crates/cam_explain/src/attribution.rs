//! Class activation maps.
//!
//! A CAM for class `c` is the feature map `(C, H, W)` weighted by row `c` of
//! the classifier weights and summed over channels, then min-max rescaled to
//! `[0, 1]`.

use burn::prelude::*;
use cam_core::{tensor_to_vec, CoreError, FeatureMap};
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

use crate::error::{ExplainError, Result};

/// Ranges at or below this fraction of the largest magnitude are treated as a flat map.
pub const CAM_EPSILON: f32 = f32::EPSILON;

/// A 2D heatmap with values in `[0, 1]`, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHeatmap")]
pub struct CamHeatmap {
    class_index: usize,
    height: usize,
    width: usize,
    values: Vec<f32>,
}

/// Unchecked serialized form, validated through [`CamHeatmap::new`].
#[derive(Deserialize)]
struct RawHeatmap {
    class_index: usize,
    height: usize,
    width: usize,
    values: Vec<f32>,
}

impl TryFrom<RawHeatmap> for CamHeatmap {
    type Error = CoreError;

    fn try_from(raw: RawHeatmap) -> cam_core::Result<Self> {
        Self::new(raw.class_index, raw.height, raw.width, raw.values)
    }
}

/// Summary statistics of a heatmap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatmapStats {
    /// Smallest value.
    pub min: f32,
    /// Largest value.
    pub max: f32,
    /// Mean value.
    pub mean: f32,
    /// Column of the first maximum.
    pub peak_x: usize,
    /// Row of the first maximum.
    pub peak_y: usize,
}

impl CamHeatmap {
    /// Create a heatmap from row-major values.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShapeMismatch`] if `values.len() != height * width`.
    pub fn new(
        class_index: usize,
        height: usize,
        width: usize,
        values: Vec<f32>,
    ) -> cam_core::Result<Self> {
        if height.checked_mul(width) != Some(values.len()) {
            return Err(CoreError::ShapeMismatch(format!(
                "heatmap of {}x{} does not hold {} values",
                height,
                width,
                values.len()
            )));
        }
        Ok(Self {
            class_index,
            height,
            width,
            values,
        })
    }

    /// Class this map explains.
    pub fn class_index(&self) -> usize {
        self.class_index
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Row-major values.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Value at row `y`, column `x`.
    pub fn get(&self, y: usize, x: usize) -> Option<f32> {
        (y < self.height && x < self.width).then(|| self.values[y * self.width + x])
    }

    /// Values as rows.
    pub fn rows(&self) -> Vec<Vec<f32>> {
        self.values
            .chunks(self.width.max(1))
            .map(<[f32]>::to_vec)
            .collect()
    }

    /// Min, max, mean and peak location.
    pub fn stats(&self) -> HeatmapStats {
        let mut stats = HeatmapStats {
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
            mean: 0.0,
            peak_x: 0,
            peak_y: 0,
        };
        for (i, &v) in self.values.iter().enumerate() {
            stats.min = stats.min.min(v);
            if v > stats.max {
                stats.max = v;
                stats.peak_x = i % self.width;
                stats.peak_y = i / self.width;
            }
        }
        if !self.values.is_empty() {
            stats.mean = self.values.iter().sum::<f32>() / self.values.len() as f32;
        }
        stats
    }

    /// Bilinearly resize to `width` x `height`, clamping back into `[0, 1]`.
    pub fn upsample(&self, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ExplainError::Render(format!(
                "cannot resize heatmap to {}x{}",
                width, height
            )));
        }
        let source: ImageBuffer<Luma<f32>, Vec<f32>> =
            ImageBuffer::from_raw(self.width as u32, self.height as u32, self.values.clone())
                .ok_or_else(|| {
                    ExplainError::Render(format!(
                        "heatmap buffer does not match {}x{}",
                        self.width, self.height
                    ))
                })?;

        let resized = imageops::resize(&source, width, height, FilterType::Triangle);
        let values = resized
            .into_raw()
            .into_iter()
            .map(|v| v.clamp(0.0, 1.0))
            .collect();

        Ok(Self::new(
            self.class_index,
            height as usize,
            width as usize,
            values,
        )?)
    }
}

/// Min-max rescale into `[0, 1]`; flat or non-finite input gives all zeros.
pub fn normalize_cam(values: &mut [f32]) {
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let range = values.iter().map(|&v| v - min).fold(f32::NEG_INFINITY, f32::max);
    let magnitude = values.iter().fold(0.0f32, |m, v| m.max(v.abs()));

    let degenerate = !range.is_finite()
        || range <= CAM_EPSILON * magnitude
        || values.iter().any(|v| !v.is_finite());
    if degenerate {
        values.fill(0.0);
        return;
    }

    for v in values.iter_mut() {
        *v = (*v - min) / range;
    }
}

/// Compute the class activation map for `class`.
///
/// # Arguments
///
/// * `features` - Activation of the last convolutional layer, `(C, H, W)`
/// * `weights` - Classifier weights, `(n_classes, C)`
/// * `class` - Target class index
///
/// # Returns
///
/// Heatmap of shape `(H, W)` rescaled to `[0, 1]`.
///
/// # Errors
///
/// [`CoreError::ClassOutOfRange`] if `class >= n_classes`, and
/// [`CoreError::ShapeMismatch`] if the weight rows are not `C` long.
pub fn compute_cam<B: Backend>(
    features: &FeatureMap<B>,
    weights: &Tensor<B, 2>,
    class: usize,
) -> cam_core::Result<CamHeatmap> {
    let [n_classes, channels] = weights.dims();
    let shape = features.shape();

    if class >= n_classes {
        return Err(CoreError::ClassOutOfRange {
            index: class,
            n_classes,
        });
    }
    if channels != shape.channels() {
        return Err(CoreError::ShapeMismatch(format!(
            "classifier expects {} channels, feature map {} has {}",
            channels,
            shape,
            shape.channels()
        )));
    }

    // (1, C) x (C, H*W) -> (1, H*W)
    let row = weights.clone().slice([class..class + 1, 0..channels]);
    let cam = row.matmul(features.flatten_spatial());

    let mut values = tensor_to_vec(cam)?;
    normalize_cam(&mut values);

    CamHeatmap::new(class, shape.height(), shape.width(), values)
}

/// Compute one class activation map per requested class.
pub fn cam_for_classes<B: Backend>(
    features: &FeatureMap<B>,
    weights: &Tensor<B, 2>,
    classes: &[usize],
) -> cam_core::Result<Vec<CamHeatmap>> {
    classes
        .iter()
        .map(|&class| compute_cam(features, weights, class))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cam_core::backend::NdArray;
    use cam_core::ChwShape;

    type TestBackend = NdArray;

    fn features(data: Vec<f32>, shape: [usize; 3]) -> FeatureMap<TestBackend> {
        FeatureMap::from_vec(data, ChwShape::from(shape), &Default::default()).unwrap()
    }

    fn weights(data: Vec<f32>, shape: [usize; 2]) -> Tensor<TestBackend, 2> {
        Tensor::from_data(TensorData::new(data, shape), &Default::default())
    }

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-5, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_single_channel_cam() {
        let cam = compute_cam(&features(vec![1.0, 2.0, 3.0, 4.0], [1, 2, 2]), &weights(vec![1.0], [1, 1]), 0)
            .unwrap();
        assert_eq!((cam.height(), cam.width()), (2, 2));
        assert_close(cam.values(), &[0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0]);
    }

    #[test]
    fn test_cam_range() {
        let data: Vec<f32> = (0..3 * 4 * 5).map(|i| ((i * 7) % 11) as f32 - 4.0).collect();
        let fm = features(data, [3, 4, 5]);
        let w = weights(vec![0.5, -1.0, 2.0, 1.0, 1.0, 1.0], [2, 3]);

        for cam in cam_for_classes(&fm, &w, &[0, 1]).unwrap() {
            assert!(cam.values().iter().all(|&v| (0.0..=1.0).contains(&v)));
            let stats = cam.stats();
            assert_eq!(stats.min, 0.0);
            assert!((stats.max - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_weight_scaling_invariance() {
        let data: Vec<f32> = (0..2 * 3 * 3).map(|i| (i as f32 * 0.37).sin()).collect();
        let fm = features(data, [2, 3, 3]);

        let a = compute_cam(&fm, &weights(vec![0.3, -0.8], [1, 2]), 0).unwrap();
        let b = compute_cam(&fm, &weights(vec![3.0, -8.0], [1, 2]), 0).unwrap();
        assert_close(a.values(), b.values());

        let tiny = compute_cam(&fm, &weights(vec![0.3e-9, -0.8e-9], [1, 2]), 0).unwrap();
        assert_close(a.values(), tiny.values());
    }

    #[test]
    fn test_tiny_weights_keep_shape() {
        let fm = features(vec![1.0, 2.0, 3.0, 4.0], [1, 2, 2]);
        let cam = compute_cam(&fm, &weights(vec![1e-9], [1, 1]), 0).unwrap();
        assert_close(cam.values(), &[0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0]);

        let mut offset = vec![1e6, 1e6, 1e6];
        normalize_cam(&mut offset);
        assert_eq!(offset, vec![0.0; 3]);
    }

    #[test]
    fn test_uniform_map_is_zero() {
        let cam = compute_cam(&features(vec![5.0; 4], [1, 2, 2]), &weights(vec![1.0], [1, 1]), 0).unwrap();
        assert!(cam.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_non_finite_map_is_zero() {
        let mut values = vec![1.0, f32::NAN, 3.0];
        normalize_cam(&mut values);
        assert_eq!(values, vec![0.0; 3]);
    }

    #[test]
    fn test_class_out_of_range() {
        let err = compute_cam(&features(vec![1.0; 4], [1, 2, 2]), &weights(vec![1.0, 2.0], [2, 1]), 2)
            .unwrap_err();
        assert!(matches!(err, CoreError::ClassOutOfRange { index: 2, n_classes: 2 }));
    }

    #[test]
    fn test_channel_mismatch() {
        let err = compute_cam(&features(vec![1.0; 8], [2, 2, 2]), &weights(vec![1.0, 2.0, 3.0], [1, 3]), 0)
            .unwrap_err();
        assert!(matches!(err, CoreError::ShapeMismatch(_)));
    }

    #[test]
    fn test_upsample() {
        let cam = CamHeatmap::new(7, 2, 2, vec![0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0]).unwrap();
        let up = cam.upsample(8, 6).unwrap();

        assert_eq!((up.width(), up.height()), (8, 6));
        assert_eq!(up.class_index(), 7);
        assert!(up.values().iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!(up.get(0, 0).unwrap() < up.get(5, 7).unwrap());
        assert!(cam.upsample(0, 4).is_err());
    }

    #[test]
    fn test_stats_and_rows() {
        let cam = CamHeatmap::new(0, 2, 3, vec![0.0, 0.5, 0.2, 1.0, 0.1, 0.2]).unwrap();
        let stats = cam.stats();
        assert_eq!((stats.peak_x, stats.peak_y), (0, 1));
        assert!((stats.mean - 0.333_333).abs() < 1e-4);
        assert_eq!(cam.rows()[1], vec![1.0, 0.1, 0.2]);
        assert_eq!(cam.get(2, 0), None);
    }

    #[test]
    fn test_heatmap_length_checked() {
        assert!(matches!(
            CamHeatmap::new(0, 2, 2, vec![0.0; 3]),
            Err(CoreError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_heatmap_deserialize_checks_length() {
        let cam = CamHeatmap::new(3, 1, 2, vec![0.0, 1.0]).unwrap();
        let json = serde_json::to_string(&cam).unwrap();
        let parsed: CamHeatmap = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cam);

        let short = r#"{"class_index":0,"height":2,"width":2,"values":[0.5]}"#;
        assert!(serde_json::from_str::<CamHeatmap>(short).is_err());

        let overflow = format!(
            r#"{{"class_index":0,"height":{},"width":2,"values":[]}}"#,
            usize::MAX
        );
        assert!(serde_json::from_str::<CamHeatmap>(&overflow).is_err());
    }
}

//! Image loading and model-input preprocessing.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use cam_core::{ImageTensor, Normalization, INPUT_SIZE};
use image::imageops::FilterType;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::fetch::{fetch_bytes, is_url};
use crate::{DataError, Result};

/// Where an image comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSource {
    /// Remote image fetched with an HTTP GET.
    Url(String),
    /// Image file on the local filesystem.
    Path(PathBuf),
}

impl ImageSource {
    /// Load and decode the image.
    pub fn load(&self) -> Result<DynamicImage> {
        load_image(self)
    }
}

impl FromStr for ImageSource {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DataError::InvalidInput("empty image source".to_string()));
        }
        if is_url(s) {
            Ok(Self::Url(s.to_string()))
        } else {
            Ok(Self::Path(PathBuf::from(s)))
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{}", url),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Fetch or read an image and decode it.
pub fn load_image(source: &ImageSource) -> Result<DynamicImage> {
    let bytes = match source {
        ImageSource::Url(url) => fetch_bytes(url)?,
        ImageSource::Path(path) => std::fs::read(path)
            .map_err(|e| DataError::Io(format!("{}: {}", path.display(), e)))?,
    };

    let image = decode_image(&bytes)?;
    info!(
        "Loaded image {} ({}x{})",
        source,
        image.width(),
        image.height()
    );
    Ok(image)
}

/// Decode an encoded image (PNG, JPEG, ...) from memory.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| DataError::Decode(e.to_string()))
}

/// Resize, scale and normalize an image into the `(3, 224, 224)` model input.
///
/// Pixels are resized to 224x224 with a Catmull-Rom filter, scaled to `[0, 1]`
/// and normalized with the given per-channel statistics. Output is CHW.
pub fn preprocess_with(image: &DynamicImage, norm: &Normalization) -> Result<ImageTensor> {
    let size = INPUT_SIZE as u32;
    let resized = image.resize_exact(size, size, FilterType::CatmullRom);
    let rgb = resized.to_rgb8();
    let plane = INPUT_SIZE * INPUT_SIZE;

    let mut data = vec![0.0f32; 3 * plane];
    for (i, pixel) in rgb.pixels().enumerate() {
        for channel in 0..3 {
            let value = f32::from(pixel[channel]) / 255.0;
            data[channel * plane + i] = norm.apply(channel, value);
        }
    }

    debug!(
        "Preprocessed {}x{} image into {}",
        image.width(),
        image.height(),
        ImageTensor::SHAPE
    );
    Ok(ImageTensor::new(data, ImageTensor::SHAPE)?)
}

/// [`preprocess_with`] using the ImageNet statistics.
pub fn preprocess(image: &DynamicImage) -> Result<ImageTensor> {
    preprocess_with(image, &Normalization::IMAGENET)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    #[test]
    fn test_image_source_parse() {
        assert_eq!(
            "https://example.com/cat.jpg".parse::<ImageSource>().unwrap(),
            ImageSource::Url("https://example.com/cat.jpg".to_string())
        );
        assert_eq!(
            "cat.jpg".parse::<ImageSource>().unwrap(),
            ImageSource::Path(PathBuf::from("cat.jpg"))
        );
        assert!("  ".parse::<ImageSource>().is_err());
    }

    #[test]
    fn test_preprocess_shape_and_values() {
        let image = solid(640, 480, [255, 0, 128]);
        let tensor = preprocess(&image).unwrap();
        assert_eq!(tensor.shape(), ImageTensor::SHAPE);

        let plane = INPUT_SIZE * INPUT_SIZE;
        let data = tensor.as_slice();
        let norm = Normalization::IMAGENET;

        let red = norm.apply(0, 1.0);
        let green = norm.apply(1, 0.0);
        let blue = norm.apply(2, 128.0 / 255.0);

        assert!((data[0] - red).abs() < 1e-5);
        assert!((data[plane - 1] - red).abs() < 1e-5);
        assert!((data[plane] - green).abs() < 1e-5);
        assert!((data[2 * plane + 100] - blue).abs() < 1e-5);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_image(b"definitely not an image"),
            Err(DataError::Decode(_))
        ));
    }

    #[test]
    fn test_load_image_from_path() {
        let path = std::env::temp_dir().join(format!("cam-rs-load-{}.png", std::process::id()));
        solid(32, 16, [10, 20, 30]).save(&path).unwrap();

        let image = load_image(&ImageSource::Path(path.clone())).unwrap();
        assert_eq!((image.width(), image.height()), (32, 16));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_image_missing_file() {
        let source = ImageSource::Path(PathBuf::from("/nonexistent/cam-rs/cat.jpg"));
        assert!(matches!(load_image(&source), Err(DataError::Io(_))));
    }
}

//! Heatmap colormaps and overlays.

use std::fmt;
use std::str::FromStr;

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::attribution::CamHeatmap;
use crate::error::{ExplainError, Result};

/// Default blend factor of the heatmap over the image.
pub const DEFAULT_ALPHA: f32 = 0.5;

/// Inferno control points at 0, 1/8, ..., 1.
const INFERNO: [[f32; 3]; 9] = [
    [0.001, 0.000, 0.014],
    [0.110, 0.047, 0.283],
    [0.316, 0.071, 0.485],
    [0.512, 0.128, 0.420],
    [0.716, 0.215, 0.330],
    [0.885, 0.345, 0.182],
    [0.982, 0.535, 0.038],
    [0.977, 0.765, 0.144],
    [0.988, 0.998, 0.645],
];

/// Mapping from a value in `[0, 1]` to a color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    /// Blue through cyan, yellow and red.
    #[default]
    Jet,
    /// Black through purple and orange to pale yellow.
    Inferno,
    /// Black to white.
    Gray,
}

impl Colormap {
    /// All colormaps.
    pub const ALL: [Colormap; 3] = [Colormap::Jet, Colormap::Inferno, Colormap::Gray];

    /// Name used on the command line.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Jet => "jet",
            Self::Inferno => "inferno",
            Self::Gray => "gray",
        }
    }

    /// Color for `value`; input is clamped to `[0, 1]` and NaN maps to 0.
    pub fn color(&self, value: f32) -> Rgb<u8> {
        let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        let [r, g, b] = match self {
            Self::Jet => [
                (1.5 - (4.0 * v - 3.0).abs()).clamp(0.0, 1.0),
                (1.5 - (4.0 * v - 2.0).abs()).clamp(0.0, 1.0),
                (1.5 - (4.0 * v - 1.0).abs()).clamp(0.0, 1.0),
            ],
            Self::Inferno => {
                let pos = v * (INFERNO.len() - 1) as f32;
                let i = (pos.floor() as usize).min(INFERNO.len() - 2);
                let t = pos - i as f32;
                let (lo, hi) = (INFERNO[i], INFERNO[i + 1]);
                [
                    lo[0] + (hi[0] - lo[0]) * t,
                    lo[1] + (hi[1] - lo[1]) * t,
                    lo[2] + (hi[2] - lo[2]) * t,
                ]
            }
            Self::Gray => [v, v, v],
        };
        Rgb([to_u8(r), to_u8(g), to_u8(b)])
    }
}

impl fmt::Display for Colormap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Colormap {
    type Err = ExplainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jet" => Ok(Self::Jet),
            "inferno" => Ok(Self::Inferno),
            "gray" | "grey" => Ok(Self::Gray),
            other => Err(ExplainError::Render(format!(
                "unknown colormap '{}', expected one of jet, inferno, gray",
                other
            ))),
        }
    }
}

fn to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Render a heatmap at its own resolution.
pub fn heatmap_image(heatmap: &CamHeatmap, colormap: Colormap) -> RgbImage {
    RgbImage::from_fn(heatmap.width() as u32, heatmap.height() as u32, |x, y| {
        let value = heatmap.get(y as usize, x as usize).unwrap_or(0.0);
        colormap.color(value)
    })
}

/// Blend a colored heatmap over `image`.
///
/// The heatmap is upsampled to the image resolution. `alpha` is the heatmap
/// weight, clamped to `[0, 1]`; NaN falls back to [`DEFAULT_ALPHA`].
pub fn overlay(
    image: &RgbImage,
    heatmap: &CamHeatmap,
    alpha: f32,
    colormap: Colormap,
) -> Result<RgbImage> {
    let alpha = if alpha.is_nan() {
        DEFAULT_ALPHA
    } else {
        alpha.clamp(0.0, 1.0)
    };
    let (width, height) = image.dimensions();
    let heatmap = heatmap.upsample(width, height)?;

    let mut out = image.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let value = heatmap.get(y as usize, x as usize).unwrap_or(0.0);
        let color = colormap.color(value);
        for c in 0..3 {
            let blended = (1.0 - alpha) * f32::from(pixel[c]) + alpha * f32::from(color[c]);
            pixel[c] = blended.round().clamp(0.0, 255.0) as u8;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> CamHeatmap {
        CamHeatmap::new(0, 2, 2, vec![0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0]).unwrap()
    }

    #[test]
    fn test_jet_endpoints() {
        assert_eq!(Colormap::Jet.color(0.0), Rgb([0, 0, 128]));
        assert_eq!(Colormap::Jet.color(1.0), Rgb([128, 0, 0]));
        assert_eq!(Colormap::Jet.color(0.5), Rgb([128, 255, 128]));
    }

    #[test]
    fn test_gray_and_clamping() {
        assert_eq!(Colormap::Gray.color(0.0), Rgb([0, 0, 0]));
        assert_eq!(Colormap::Gray.color(1.0), Rgb([255, 255, 255]));
        assert_eq!(Colormap::Gray.color(2.0), Colormap::Gray.color(1.0));
        assert_eq!(Colormap::Gray.color(f32::NAN), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_inferno_monotonic_brightness() {
        let brightness = |v: f32| {
            let Rgb([r, g, b]) = Colormap::Inferno.color(v);
            u32::from(r) + u32::from(g) + u32::from(b)
        };
        assert!(brightness(0.0) < brightness(0.5));
        assert!(brightness(0.5) < brightness(1.0));
    }

    #[test]
    fn test_colormap_parse() {
        assert_eq!("Jet".parse::<Colormap>().unwrap(), Colormap::Jet);
        assert_eq!("grey".parse::<Colormap>().unwrap(), Colormap::Gray);
        assert!("viridis".parse::<Colormap>().is_err());
        let json = serde_json::to_string(&Colormap::Inferno).unwrap();
        assert_eq!(json, "\"inferno\"");
    }

    #[test]
    fn test_heatmap_image() {
        let img = heatmap_image(&ramp(), Colormap::Gray);
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(1, 1), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_overlay_alpha_extremes() {
        let image = RgbImage::from_pixel(16, 12, Rgb([10, 200, 30]));

        let none = overlay(&image, &ramp(), 0.0, Colormap::Jet).unwrap();
        assert_eq!(none, image);

        let full = overlay(&image, &ramp(), 5.0, Colormap::Gray).unwrap();
        assert_eq!(full.dimensions(), (16, 12));
        let Rgb([r, g, b]) = *full.get_pixel(15, 11);
        assert!(r > 240 && r == g && g == b);
        assert!(full.get_pixel(0, 0)[0] < 15);
    }

    #[test]
    fn test_overlay_half_blend() {
        let image = RgbImage::from_pixel(4, 4, Rgb([100, 100, 100]));
        let flat = CamHeatmap::new(0, 1, 1, vec![0.0]).unwrap();
        let out = overlay(&image, &flat, DEFAULT_ALPHA, Colormap::Gray).unwrap();
        assert_eq!(out.get_pixel(2, 2), &Rgb([50, 50, 50]));
    }
}

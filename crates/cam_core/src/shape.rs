//! Channel-first spatial shape metadata.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Shape metadata for a single channel-first spatial array.
///
/// Follows the convention `(C, H, W)`:
/// - `C`: Channels (3 for RGB input, 512 for a ResNet-18 feature map)
/// - `H`: Height in pixels or feature cells
/// - `W`: Width in pixels or feature cells
///
/// # Example
///
/// ```rust
/// use cam_core::ChwShape;
///
/// let shape = ChwShape::new(512, 7, 7);
/// assert_eq!(shape.channels(), 512);
/// assert_eq!(shape.spatial(), 49);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChwShape {
    channels: usize,
    height: usize,
    width: usize,
}

impl ChwShape {
    /// Create a new shape with the specified dimensions.
    #[must_use]
    pub const fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
        }
    }

    /// Create a shape from a slice of dimensions.
    ///
    /// Accepts either `[C, H, W]` or a batched `[1, C, H, W]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice has the wrong rank or a batch size other than one.
    ///
    /// # Example
    ///
    /// ```rust
    /// use cam_core::ChwShape;
    ///
    /// let shape = ChwShape::from_dims(&[1, 512, 7, 7]).unwrap();
    /// assert_eq!(shape.as_array(), [512, 7, 7]);
    /// ```
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        match dims {
            [c, h, w] => Ok(Self::new(*c, *h, *w)),
            [1, c, h, w] => Ok(Self::new(*c, *h, *w)),
            [b, _, _, _] => Err(CoreError::InvalidShape {
                expected: "batch of 1".to_string(),
                got: format!("batch of {}", b),
            }),
            _ => Err(CoreError::DimensionError {
                expected: 3,
                got: dims.len(),
            }),
        }
    }

    /// Get the number of channels.
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Get the height.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Get the width.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Number of spatial positions (`H * W`).
    #[must_use]
    pub const fn spatial(&self) -> usize {
        self.height * self.width
    }

    /// Check if any dimension is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.channels == 0 || self.height == 0 || self.width == 0
    }

    /// Get the total number of elements.
    #[must_use]
    pub const fn numel(&self) -> usize {
        self.channels * self.height * self.width
    }

    /// Convert to an array.
    #[must_use]
    pub const fn as_array(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }

    /// Batched dimensions `[1, C, H, W]` as fed to a model.
    #[must_use]
    pub const fn batched(&self) -> [usize; 4] {
        [1, self.channels, self.height, self.width]
    }
}

impl std::fmt::Display for ChwShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(C={}, H={}, W={})", self.channels, self.height, self.width)
    }
}

impl From<[usize; 3]> for ChwShape {
    fn from([channels, height, width]: [usize; 3]) -> Self {
        Self::new(channels, height, width)
    }
}

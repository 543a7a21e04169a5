//! Pipeline configuration.
//!
//! A run is described by a small YAML file:
//!
//! ```yaml
//! data_path: NumPlateData/train
//! save_path: NumPlateData
//! annotations_file: _annotations.csv
//! scaled_image_size: [224, 224]   # (height, width)
//! anchor_count: 5
//! scaling_factor: 32
//! ```
//!
//! `anchor_boxes` may list explicit `[width, height]` pairs; when present
//! the anchor count is the length of that list and `anchor_count` is
//! ignored. `compute_device` is accepted for compatibility and only logged.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::GridLabelError;
use crate::ir::AnchorSet;

/// Height and width of the resized training images, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub height: u32,
    pub width: u32,
}

impl ImageSize {
    pub fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }
}

/// Shape of the detector's output grid over a resized image.
///
/// `grid = image / stride` with integer division: any remainder is
/// dropped, not rounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridGeometry {
    pub image: ImageSize,
    /// Pixels of the resized image covered by one grid cell per side.
    pub stride: u32,
    pub grid_h: usize,
    pub grid_w: usize,
}

impl GridGeometry {
    pub fn new(image: ImageSize, stride: u32) -> Result<Self, GridLabelError> {
        if stride == 0 {
            return Err(GridLabelError::InvalidConfig {
                message: "scaling_factor must be greater than 0".to_string(),
            });
        }

        let grid_h = (image.height / stride) as usize;
        let grid_w = (image.width / stride) as usize;
        if grid_h == 0 || grid_w == 0 {
            return Err(GridLabelError::InvalidConfig {
                message: format!(
                    "scaling_factor {} is larger than the {}x{} image, grid would be empty",
                    stride, image.height, image.width
                ),
            });
        }

        Ok(Self {
            image,
            stride,
            grid_h,
            grid_w,
        })
    }

    /// Stride as a float, for box arithmetic.
    #[inline]
    pub fn stride_f64(&self) -> f64 {
        f64::from(self.stride)
    }
}

/// Construction-time settings for anchor discovery and encoding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Directory holding the images and the annotation file.
    pub data_path: PathBuf,

    /// Directory where tensors and anchors are written.
    pub save_path: PathBuf,

    /// Annotation CSV filename, relative to `data_path`.
    pub annotations_file: PathBuf,

    /// Target `[height, width]` of every resized image.
    pub scaled_image_size: [u32; 2],

    #[serde(default)]
    pub anchor_count: usize,

    /// Grid stride in pixels of the resized image.
    pub scaling_factor: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_boxes: Option<Vec<[f64; 2]>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_device: Option<String>,
}

impl PipelineConfig {
    /// Reads and validates a YAML config file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, GridLabelError> {
        let data = fs::read_to_string(path).map_err(GridLabelError::Io)?;
        let config: Self =
            serde_yaml::from_str(&data).map_err(|source| GridLabelError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a YAML config from a string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, GridLabelError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|source| GridLabelError::ConfigParse {
                path: PathBuf::from("<string>"),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks sizes, stride and anchor count.
    pub fn validate(&self) -> Result<(), GridLabelError> {
        let [height, width] = self.scaled_image_size;
        if height == 0 || width == 0 {
            return Err(GridLabelError::InvalidConfig {
                message: format!("scaled_image_size must be positive, got {height}x{width}"),
            });
        }

        self.geometry()?;

        if self.effective_anchor_count() == 0 {
            return Err(GridLabelError::InvalidConfig {
                message: "anchor_count must be greater than 0".to_string(),
            });
        }

        if let Some(boxes) = &self.anchor_boxes {
            if let Some([w, h]) = boxes
                .iter()
                .find(|[w, h]| !(w.is_finite() && h.is_finite() && *w > 0.0 && *h > 0.0))
            {
                return Err(GridLabelError::InvalidConfig {
                    message: format!("anchor box [{w}, {h}] must have positive finite sides"),
                });
            }
        }

        Ok(())
    }

    /// Number of anchors per grid cell.
    pub fn effective_anchor_count(&self) -> usize {
        match &self.anchor_boxes {
            Some(boxes) => boxes.len(),
            None => self.anchor_count,
        }
    }

    /// Explicit anchors from the config, if any were given.
    pub fn explicit_anchors(&self) -> Option<AnchorSet> {
        self.anchor_boxes.as_ref().map(|boxes| {
            let pairs: Vec<(f64, f64)> = boxes.iter().map(|&[w, h]| (w, h)).collect();
            AnchorSet::from_pairs(&pairs)
        })
    }

    pub fn image_size(&self) -> ImageSize {
        ImageSize::new(self.scaled_image_size[0], self.scaled_image_size[1])
    }

    pub fn geometry(&self) -> Result<GridGeometry, GridLabelError> {
        GridGeometry::new(self.image_size(), self.scaling_factor)
    }

    /// Full path of the annotation CSV.
    pub fn annotations_path(&self) -> PathBuf {
        self.data_path.join(&self.annotations_file)
    }
}

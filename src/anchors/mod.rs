//! Anchor discovery.
//!
//! Anchors are the K most representative box shapes of a dataset,
//! measured in resized-image pixels. Every annotation is scaled to the
//! target size using its own image's dimensions, reduced to its
//! `(width, height)`, and the resulting points are clustered with
//! k-means. Cluster centers become the anchors.
//!
//! Discovery never persists anything: callers decide whether to keep the
//! result (see [`crate::persist::Store::save_anchors`]).

mod kmeans;

pub use kmeans::{kmeans, KMeansFit, KMeansOptions};

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use log::{debug, info};

use crate::config::ImageSize;
use crate::error::GridLabelError;
use crate::ir::{
    Anchor, AnchorSet, AnnotationSet, BBoxXYXY, CenterBox, ImageScale, Original, Scaled,
};

/// Scales a corner box from an `orig_w x orig_h` image onto `target` and
/// converts it to center form.
///
/// Each axis is scaled independently, so boxes from images with a
/// different aspect ratio than `target` come out stretched.
pub fn scaled_center_box(
    bbox: &BBoxXYXY<Original>,
    orig_w: u32,
    orig_h: u32,
    target: ImageSize,
) -> CenterBox<Scaled> {
    let scale = ImageScale::between(orig_w, orig_h, target.width, target.height);
    bbox.to_scaled(scale).to_center()
}

/// Computes the scaled `(width, height)` of every annotation.
///
/// Original image dimensions are read from file headers only; each image
/// is probed once no matter how many boxes it carries.
pub fn box_dims_for_anchors(
    annotations: &AnnotationSet,
    image_dir: &Path,
    target: ImageSize,
) -> Result<Vec<(f64, f64)>, GridLabelError> {
    let mut dims_cache: HashMap<&str, (u32, u32)> = HashMap::new();
    let mut out = Vec::with_capacity(annotations.len());

    for (idx, ann) in annotations.annotations.iter().enumerate() {
        let (orig_w, orig_h) = match dims_cache.get(ann.image_name.as_str()) {
            Some(&dims) => dims,
            None => {
                let dims = read_image_dimensions(&image_dir.join(&ann.image_name))?;
                dims_cache.insert(&ann.image_name, dims);
                dims
            }
        };

        let center = scaled_center_box(&ann.bbox, orig_w, orig_h, target);
        out.push((center.width, center.height));

        if idx % 100 == 0 {
            debug!("anchor preprocessing: {} / {}", idx, annotations.len());
        }
    }

    Ok(out)
}

/// Clusters box dimensions into `k` anchors.
///
/// `box_dims` must already be in resized-image pixels. The output order
/// is whatever the clustering produced; only the index identity matters.
///
/// # Errors
/// [`GridLabelError::AnchorDiscovery`] when `k` is zero or there are
/// fewer than `k` distinct box sizes.
pub fn discover_anchors(
    box_dims: &[(f64, f64)],
    k: usize,
    opts: &KMeansOptions,
) -> Result<AnchorSet, GridLabelError> {
    let started = Instant::now();
    let points: Vec<[f64; 2]> = box_dims.iter().map(|&(w, h)| [w, h]).collect();
    let fit = kmeans(&points, k, opts)?;

    info!(
        "discovered {} anchors from {} boxes (inertia {:.3}, {} iterations) in {:.2?}",
        k,
        box_dims.len(),
        fit.inertia,
        fit.iterations,
        started.elapsed()
    );

    Ok(AnchorSet::new(
        fit.centers
            .into_iter()
            .map(|[w, h]| Anchor::new(w, h))
            .collect(),
    ))
}

/// Full discovery over a dataset: preprocessing plus clustering.
pub fn discover_from_annotations(
    annotations: &AnnotationSet,
    image_dir: &Path,
    target: ImageSize,
    k: usize,
    opts: &KMeansOptions,
) -> Result<AnchorSet, GridLabelError> {
    let dims = box_dims_for_anchors(annotations, image_dir, target)?;
    discover_anchors(&dims, k, opts)
}

fn read_image_dimensions(path: &Path) -> Result<(u32, u32), GridLabelError> {
    if !path.is_file() {
        return Err(GridLabelError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("image not found: {}", path.display()),
        )));
    }

    let size = imagesize::size(path).map_err(|source| GridLabelError::ImageDimensionRead {
        path: path.to_path_buf(),
        source,
    })?;

    let width = dimension_to_u32(size.width, path)?;
    let height = dimension_to_u32(size.height, path)?;
    if width == 0 || height == 0 {
        return Err(GridLabelError::EmptyImage {
            path: path.to_path_buf(),
        });
    }

    Ok((width, height))
}

fn dimension_to_u32(value: usize, path: &Path) -> Result<u32, GridLabelError> {
    value
        .try_into()
        .map_err(|_| {
            GridLabelError::Unsupported(format!(
                "image {} is too large ({} px)",
                path.display(),
                value
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Annotation;

    #[test]
    fn test_scaled_center_box_is_per_axis() {
        let bbox = BBoxXYXY::<Original>::from_xyxy(100.0, 100.0, 300.0, 200.0);
        let center = scaled_center_box(&bbox, 800, 400, ImageSize::new(224, 224));

        // x scale 224/800 = 0.28, y scale 224/400 = 0.56
        assert!((center.width - 56.0).abs() < 1e-9);
        assert!((center.height - 56.0).abs() < 1e-9);
        assert!((center.center.x - 56.0).abs() < 1e-9);
        assert!((center.center.y - 84.0).abs() < 1e-9);
    }

    #[test]
    fn test_discover_returns_k_anchors() {
        let dims = [
            (10.0, 12.0),
            (11.0, 13.0),
            (60.0, 20.0),
            (62.0, 22.0),
            (30.0, 90.0),
            (31.0, 88.0),
        ];
        let opts = KMeansOptions {
            seed: Some(1),
            ..Default::default()
        };
        let anchors = discover_anchors(&dims, 3, &opts).expect("discovery failed");
        assert_eq!(anchors.len(), 3);

        let mut widths: Vec<f64> = anchors.as_slice().iter().map(|a| a.width).collect();
        widths.sort_by(f64::total_cmp);
        assert!((widths[0] - 10.5).abs() < 1e-9);
        assert!((widths[1] - 30.5).abs() < 1e-9);
        assert!((widths[2] - 61.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_image_fails_preprocessing() {
        let set = AnnotationSet::new(vec![Annotation::new(
            "missing.png",
            BBoxXYXY::from_xyxy(0.0, 0.0, 1.0, 1.0),
        )]);
        let result = box_dims_for_anchors(&set, Path::new("no/such/dir"), ImageSize::new(32, 32));
        assert!(matches!(result, Err(GridLabelError::Io(_))));
    }
}

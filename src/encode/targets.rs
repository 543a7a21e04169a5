//! Per-box target encoding.
//!
//! A scaled box is assigned to the grid cell containing its center and to
//! the anchor it overlaps best. The slot `(row, col, anchor)` receives
//! five values:
//!
//! | offset | value                                   |
//! |--------|-----------------------------------------|
//! | 0      | `(cx - col * stride) / stride`          |
//! | 1      | `(cy - row * stride) / stride`          |
//! | 2      | `box_width / anchor_width`              |
//! | 3      | `box_height / anchor_height`            |
//! | 4      | `1.0` (objectness)                      |

use half::f16;
use log::debug;
use ndarray::ArrayViewMut3;

use crate::config::GridGeometry;
use crate::error::GridLabelError;
use crate::ir::{Anchor, BBoxXYXY, Coord, Scaled};
use crate::matcher::best_anchor;

/// Number of values stored per anchor slot.
pub const VALUES_PER_ANCHOR: usize = 5;

/// Index of the objectness flag inside an anchor slot.
pub const OBJECTNESS: usize = 4;

/// Where a box lands and what gets written there.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EncodedTarget {
    pub row: usize,
    pub col: usize,
    pub anchor: usize,
    pub values: [f64; VALUES_PER_ANCHOR],
}

/// Counts from writing a set of boxes into one label grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub written: usize,
    /// Boxes that overwrote an earlier box in the same cell and anchor.
    pub collisions: usize,
}

/// Finds the `(row, col)` grid cell containing `center`.
///
/// # Errors
/// [`GridLabelError::GridCellOutOfBounds`] if the center lies outside
/// the grid, including negative or non-finite centers. Cells are never
/// clamped.
pub fn grid_cell(
    center: Coord<Scaled>,
    geometry: &GridGeometry,
) -> Result<(usize, usize), GridLabelError> {
    let stride = geometry.stride_f64();
    let row = (center.y / stride).floor();
    let col = (center.x / stride).floor();

    let in_bounds = row.is_finite()
        && col.is_finite()
        && row >= 0.0
        && col >= 0.0
        && (row as usize) < geometry.grid_h
        && (col as usize) < geometry.grid_w;

    if !in_bounds {
        return Err(GridLabelError::GridCellOutOfBounds {
            center_x: center.x,
            center_y: center.y,
            row: row as i64,
            col: col as i64,
            grid_h: geometry.grid_h,
            grid_w: geometry.grid_w,
        });
    }

    Ok((row as usize, col as usize))
}

/// Encodes a single box already scaled to the resized image.
pub fn encode_box(
    bbox: &BBoxXYXY<Scaled>,
    anchors: &[Anchor],
    geometry: &GridGeometry,
) -> Result<EncodedTarget, GridLabelError> {
    if anchors.is_empty() {
        return Err(GridLabelError::AnchorCountMismatch {
            expected: 1,
            found: 0,
        });
    }

    let center = bbox.center();
    let (row, col) = grid_cell(center, geometry)?;
    let anchor_idx = best_anchor(bbox, anchors, center);
    let anchor = anchors[anchor_idx];
    let stride = geometry.stride_f64();

    Ok(EncodedTarget {
        row,
        col,
        anchor: anchor_idx,
        values: [
            (center.x - col as f64 * stride) / stride,
            (center.y - row as f64 * stride) / stride,
            bbox.width() / anchor.width,
            bbox.height() / anchor.height,
            1.0,
        ],
    })
}

/// Writes boxes, in order, into a `(grid_h, grid_w, anchors * 5)` label
/// grid.
///
/// When two boxes resolve to the same cell and anchor the later one
/// replaces the earlier one. This is counted in
/// [`WriteStats::collisions`] but is not an error: training labels keep
/// exactly one box per slot.
///
/// Stops at the first box that fails to encode; boxes before it stay
/// written.
pub fn write_targets<I>(
    mut label: ArrayViewMut3<'_, f16>,
    boxes: I,
    anchors: &[Anchor],
    geometry: &GridGeometry,
) -> Result<WriteStats, GridLabelError>
where
    I: IntoIterator<Item = BBoxXYXY<Scaled>>,
{
    let mut stats = WriteStats::default();

    for bbox in boxes {
        let target = encode_box(&bbox, anchors, geometry)?;
        let base = target.anchor * VALUES_PER_ANCHOR;

        if label[[target.row, target.col, base + OBJECTNESS]] != f16::ZERO {
            stats.collisions += 1;
            debug!(
                "cell ({}, {}) anchor {} already holds a box, overwriting",
                target.row, target.col, target.anchor
            );
        }

        for (offset, value) in target.values.iter().enumerate() {
            label[[target.row, target.col, base + offset]] = f16::from_f64(*value);
        }
        stats.written += 1;
    }

    Ok(stats)
}

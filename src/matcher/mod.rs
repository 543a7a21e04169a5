//! Anchor matching by Intersection-over-Union.
//!
//! Each anchor is placed as a hypothetical box centred on the ground-truth
//! box's center; the anchor whose box overlaps the ground truth the most
//! wins. Because both boxes share a center, IoU here measures shape
//! similarity only.

use crate::ir::{Anchor, BBoxXYXY, CenterBox, Coord, Scaled};

/// Builds the box an anchor would occupy when centred at `center`.
#[inline]
pub fn centered_anchor_box(center: Coord<Scaled>, anchor: &Anchor) -> BBoxXYXY<Scaled> {
    CenterBox::new(center.x, center.y, anchor.width, anchor.height).to_xyxy()
}

/// Intersection area of two boxes, clamped per axis so inverted corners
/// yield zero rather than a negative area.
#[inline]
pub fn intersection_area(a: &BBoxXYXY<Scaled>, b: &BBoxXYXY<Scaled>) -> f64 {
    let ix1 = a.xmin().max(b.xmin());
    let iy1 = a.ymin().max(b.ymin());
    let ix2 = a.xmax().min(b.xmax());
    let iy2 = a.ymax().min(b.ymax());

    (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0)
}

/// Intersection over union of a ground-truth box and an anchor box.
///
/// A union that is zero, negative or not finite gives an IoU of `0.0`;
/// degenerate boxes never divide by zero.
pub fn iou(gt: &BBoxXYXY<Scaled>, anchor_box: &BBoxXYXY<Scaled>) -> f64 {
    let inter = intersection_area(gt, anchor_box);
    let union = gt.area() + anchor_box.area() - inter;

    if !(union > 0.0 && union.is_finite()) {
        return 0.0;
    }

    let value = inter / union;
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Returns the index of the anchor with the highest IoU against `gt`.
///
/// Anchors are tried in order and only a strictly greater IoU replaces the
/// current best, so ties go to the lower index. The search starts from
/// `(iou = 0, index = 0)`: when no anchor overlaps at all, index 0 is
/// returned. An empty anchor list also returns 0; callers validate the
/// anchor count before encoding.
pub fn best_anchor(gt: &BBoxXYXY<Scaled>, anchors: &[Anchor], center: Coord<Scaled>) -> usize {
    let mut max_iou = 0.0;
    let mut selected = 0;

    for (idx, anchor) in anchors.iter().enumerate() {
        let candidate = iou(gt, &centered_anchor_box(center, anchor));
        if candidate > max_iou {
            max_iou = candidate;
            selected = idx;
        }
    }

    selected
}

//! Bounding box types in corner (XYXY) and center form.

use super::coord::Coord;
use super::{Original, Scaled};

/// An axis-aligned bounding box in XYXY format (x1, y1, x2, y2).
///
/// Note: This type does NOT enforce that min < max. Annotation files are
/// taken as-is; degenerate boxes flow through to IoU matching, which
/// defines their overlap as zero instead of failing.
#[derive(Clone, Copy, PartialEq)]
pub struct BBoxXYXY<TSpace> {
    pub min: Coord<TSpace>,
    pub max: Coord<TSpace>,
}

impl<TSpace> BBoxXYXY<TSpace> {
    /// Creates a new bounding box from explicit corner coordinates.
    #[inline]
    pub fn from_xyxy(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            min: Coord::new(x1, y1),
            max: Coord::new(x2, y2),
        }
    }

    #[inline]
    pub fn xmin(&self) -> f64 {
        self.min.x
    }

    #[inline]
    pub fn ymin(&self) -> f64 {
        self.min.y
    }

    #[inline]
    pub fn xmax(&self) -> f64 {
        self.max.x
    }

    #[inline]
    pub fn ymax(&self) -> f64 {
        self.max.y
    }

    /// Returns the width of the bounding box.
    ///
    /// May be negative if the box is malformed (x2 < x1).
    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Returns the height of the bounding box.
    ///
    /// May be negative if the box is malformed (y2 < y1).
    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Returns the area of the bounding box.
    ///
    /// May be negative if the box is malformed.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Midpoint of the two corners.
    #[inline]
    pub fn center(&self) -> Coord<TSpace> {
        Coord::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    /// Converts to center form `(cx, cy, w, h)`.
    #[inline]
    pub fn to_center(&self) -> CenterBox<TSpace> {
        CenterBox {
            center: self.center(),
            width: self.width(),
            height: self.height(),
        }
    }
}

impl<TSpace> std::fmt::Debug for BBoxXYXY<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BBoxXYXY")
            .field("x1", &self.min.x)
            .field("y1", &self.min.y)
            .field("x2", &self.max.x)
            .field("y2", &self.max.y)
            .finish()
    }
}

impl<TSpace> Default for BBoxXYXY<TSpace> {
    fn default() -> Self {
        Self::from_xyxy(0.0, 0.0, 0.0, 0.0)
    }
}

/// A box in center form: `(center_x, center_y, width, height)`.
#[derive(Clone, Copy, PartialEq)]
pub struct CenterBox<TSpace> {
    pub center: Coord<TSpace>,
    pub width: f64,
    pub height: f64,
}

impl<TSpace> CenterBox<TSpace> {
    #[inline]
    pub fn new(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self {
            center: Coord::new(cx, cy),
            width,
            height,
        }
    }

    /// Converts back to corner form.
    #[inline]
    pub fn to_xyxy(&self) -> BBoxXYXY<TSpace> {
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        BBoxXYXY::from_xyxy(
            self.center.x - half_w,
            self.center.y - half_h,
            self.center.x + half_w,
            self.center.y + half_h,
        )
    }
}

impl<TSpace> std::fmt::Debug for CenterBox<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CenterBox")
            .field("cx", &self.center.x)
            .field("cy", &self.center.y)
            .field("w", &self.width)
            .field("h", &self.height)
            .finish()
    }
}

/// Per-axis scale factors from an original image to the resized image.
///
/// Every image gets its own scale: `x = target_w / orig_w` and
/// `y = target_h / orig_h`. The axes are independent, so resizing may
/// distort aspect ratios and boxes follow that distortion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImageScale {
    pub x: f64,
    pub y: f64,
}

impl ImageScale {
    /// Scale mapping an `orig_w x orig_h` image onto `target_w x target_h`.
    pub fn between(orig_w: u32, orig_h: u32, target_w: u32, target_h: u32) -> Self {
        Self {
            x: f64::from(target_w) / f64::from(orig_w),
            y: f64::from(target_h) / f64::from(orig_h),
        }
    }
}

/// Conversion from source-image pixels to resized-image pixels.
impl BBoxXYXY<Original> {
    /// Scales x-coordinates by `scale.x` and y-coordinates by `scale.y`.
    pub fn to_scaled(&self, scale: ImageScale) -> BBoxXYXY<Scaled> {
        BBoxXYXY::from_xyxy(
            self.min.x * scale.x,
            self.min.y * scale.y,
            self.max.x * scale.x,
            self.max.y * scale.y,
        )
    }
}

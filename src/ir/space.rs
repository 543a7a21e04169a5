//! Coordinate space marker types.
//!
//! These are zero-sized types (ZSTs) used as type parameters to distinguish
//! between the source image's pixel grid and the resized training grid at
//! compile time.

use std::fmt;

/// Marker type for pixel coordinates in the original, unresized image.
///
/// Annotation files are always expressed in this space.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Original {}

/// Marker type for pixel coordinates in the resized (scaled) image.
///
/// Anchors, grid cells and encoded targets all live in this space.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scaled {}

impl fmt::Debug for Original {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

impl fmt::Debug for Scaled {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

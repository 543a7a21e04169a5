//! Intermediate representation for gridlabel.
//!
//! Annotations enter in original-image pixel space and are scaled into
//! the resized image's space before anchors, grid cells or targets are
//! computed. The two spaces are distinct types so a box can't be encoded
//! without first being scaled.
//!
//! # Example
//!
//! ```
//! use gridlabel::ir::{BBoxXYXY, ImageScale, Original};
//!
//! let bbox = BBoxXYXY::<Original>::from_xyxy(100.0, 50.0, 300.0, 150.0);
//! let scaled = bbox.to_scaled(ImageScale::between(448, 224, 224, 224));
//! assert_eq!(scaled.center().x, 100.0);
//! assert_eq!(scaled.center().y, 100.0);
//! ```

mod bbox;
mod coord;
pub mod io_annotations_csv;
mod model;
mod space;

pub use bbox::{BBoxXYXY, CenterBox, ImageScale};
pub use coord::Coord;
pub use model::{Anchor, AnchorSet, Annotation, AnnotationSet, ImageGroup};
pub use space::{Original, Scaled};

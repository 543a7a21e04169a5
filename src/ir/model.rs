//! Core data model: annotations as read from disk and the anchor set
//! that every encoding run shares.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::bbox::BBoxXYXY;
use super::space::Original;

/// One annotated box: the image it belongs to plus its corners in the
/// original image's pixel space.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    /// Filename of the image, relative to the data directory.
    pub image_name: String,

    /// Box corners `(x1, y1, x2, y2)` in original-image pixels.
    pub bbox: BBoxXYXY<Original>,
}

impl Annotation {
    pub fn new(image_name: impl Into<String>, bbox: BBoxXYXY<Original>) -> Self {
        Self {
            image_name: image_name.into(),
            bbox,
        }
    }
}

/// All annotations of a dataset, in file order.
///
/// Immutable once loaded; the encoder only ever borrows it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnnotationSet {
    pub annotations: Vec<Annotation>,
}

/// The annotations belonging to a single image, by position in the set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageGroup<'a> {
    pub image_name: &'a str,
    /// Indices into [`AnnotationSet::annotations`], in row order.
    pub rows: Vec<usize>,
}

impl AnnotationSet {
    pub fn new(annotations: Vec<Annotation>) -> Self {
        Self { annotations }
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Image filenames, one per annotation row.
    pub fn image_names(&self) -> impl Iterator<Item = &str> {
        self.annotations.iter().map(|a| a.image_name.as_str())
    }

    /// Groups rows by image name.
    ///
    /// Groups appear in the order their image is first seen; rows inside
    /// a group keep file order, so "last write wins" follows the file.
    pub fn group_by_image(&self) -> Vec<ImageGroup<'_>> {
        let mut slot_by_name: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<ImageGroup<'_>> = Vec::new();

        for (row, ann) in self.annotations.iter().enumerate() {
            match slot_by_name.get(ann.image_name.as_str()) {
                Some(&slot) => groups[slot].rows.push(row),
                None => {
                    slot_by_name.insert(&ann.image_name, groups.len());
                    groups.push(ImageGroup {
                        image_name: &ann.image_name,
                        rows: vec![row],
                    });
                }
            }
        }

        groups
    }
}

/// A single anchor shape in scaled-image pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub width: f64,
    pub height: f64,
}

impl Anchor {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// An ordered set of anchor shapes.
///
/// The order carries no meaning beyond identity: the index used when
/// encoding must be the index the detector is trained against.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchorSet {
    pub anchors: Vec<Anchor>,
}

impl AnchorSet {
    pub fn new(anchors: Vec<Anchor>) -> Self {
        Self { anchors }
    }

    /// Builds a set from `(width, height)` pairs.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        Self {
            anchors: pairs.iter().map(|&(w, h)| Anchor::new(w, h)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn as_slice(&self) -> &[Anchor] {
        &self.anchors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ann(name: &str, x: f64) -> Annotation {
        Annotation::new(name, BBoxXYXY::from_xyxy(x, 0.0, x + 1.0, 1.0))
    }

    #[test]
    fn test_group_by_image_keeps_first_seen_order() {
        let set = AnnotationSet::new(vec![
            ann("b.jpg", 0.0),
            ann("a.jpg", 1.0),
            ann("b.jpg", 2.0),
            ann("c.jpg", 3.0),
            ann("a.jpg", 4.0),
        ]);

        let groups = set.group_by_image();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].image_name, "b.jpg");
        assert_eq!(groups[0].rows, vec![0, 2]);
        assert_eq!(groups[1].image_name, "a.jpg");
        assert_eq!(groups[1].rows, vec![1, 4]);
        assert_eq!(groups[2].image_name, "c.jpg");
        assert_eq!(groups[2].rows, vec![3]);
    }

    #[test]
    fn test_anchor_set_json_is_a_plain_list() {
        let set = AnchorSet::from_pairs(&[(10.0, 20.0), (30.5, 40.0)]);
        let json = serde_json::to_string(&set).expect("serialize");
        assert_eq!(
            json,
            r#"[{"width":10.0,"height":20.0},{"width":30.5,"height":40.0}]"#
        );
        let back: AnchorSet = serde_json::from_str(&json).expect("parse");
        assert_eq!(back, set);
    }
}

#![allow(dead_code)]

use gridlabel::config::{GridGeometry, ImageSize};
use gridlabel::ir::{Anchor, BBoxXYXY, Scaled};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// Grid geometries from 1x1 up to 16x16 cells with strides 8..=64.
pub fn arb_geometry() -> BoxedStrategy<GridGeometry> {
    (1u32..=16, 1u32..=16, 8u32..=64)
        .prop_map(|(rows, cols, stride)| {
            GridGeometry::new(ImageSize::new(rows * stride, cols * stride), stride)
                .expect("positive geometry")
        })
        .boxed()
}

/// A box of positive size whose center lies strictly inside the image.
pub fn arb_box_within(width: u32, height: u32) -> BoxedStrategy<BBoxXYXY<Scaled>> {
    let w = f64::from(width);
    let h = f64::from(height);
    (0.0..(w - 0.01), 0.0..(h - 0.01), 0.5..w, 0.5..h)
        .prop_map(|(cx, cy, bw, bh)| {
            BBoxXYXY::from_xyxy(cx - bw / 2.0, cy - bh / 2.0, cx + bw / 2.0, cy + bh / 2.0)
        })
        .boxed()
}

/// Any box with finite, ordered corners, including zero-area ones.
pub fn arb_box() -> BoxedStrategy<BBoxXYXY<Scaled>> {
    (-500.0..500.0f64, -500.0..500.0f64, 0.0..300.0f64, 0.0..300.0f64)
        .prop_map(|(x, y, w, h)| BBoxXYXY::from_xyxy(x, y, x + w, y + h))
        .boxed()
}

pub fn arb_anchor() -> BoxedStrategy<Anchor> {
    (0.5..256.0f64, 0.5..256.0f64)
        .prop_map(|(w, h)| Anchor::new(w, h))
        .boxed()
}

pub fn arb_anchors(max: usize) -> BoxedStrategy<Vec<Anchor>> {
    prop::collection::vec(arb_anchor(), 1..=max).boxed()
}

//! Criterion microbenches for anchor matching and target encoding.
//!
//! Run with: `cargo bench`
//!
//! These benchmarks measure the performance of:
//! - best-anchor selection by IoU (best_anchor)
//! - single-box encoding (encode_box)
//! - writing a full label grid (write_targets)
//! - annotation CSV parsing (from_annotations_csv_str)

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use half::f16;
use ndarray::Array3;
use std::hint::black_box;

use gridlabel::config::{GridGeometry, ImageSize};
use gridlabel::encode::{encode_box, write_targets, VALUES_PER_ANCHOR};
use gridlabel::ir::io_annotations_csv::from_annotations_csv_str;
use gridlabel::ir::{Anchor, BBoxXYXY, Scaled};
use gridlabel::matcher::best_anchor;

const ANNOTATIONS_FIXTURE: &str = "plate_001.jpg,10,20,110,60
plate_001.jpg,200,40,260,90
plate_002.jpg,5.5,0,50,25
plate_003.jpg,30,30,90,70
plate_004.jpg,120,80,310,140
";

fn anchors() -> Vec<Anchor> {
    vec![
        Anchor::new(12.0, 16.0),
        Anchor::new(30.0, 14.0),
        Anchor::new(48.0, 40.0),
        Anchor::new(90.0, 35.0),
        Anchor::new(140.0, 120.0),
    ]
}

fn geometry() -> GridGeometry {
    GridGeometry::new(ImageSize::new(224, 224), 32).unwrap()
}

/// Boxes spread over the whole 224x224 image.
fn boxes(count: usize) -> Vec<BBoxXYXY<Scaled>> {
    (0..count)
        .map(|i| {
            let x = (i * 37 % 200) as f64;
            let y = (i * 53 % 200) as f64;
            let w = 8.0 + (i % 9) as f64 * 6.0;
            let h = 6.0 + (i % 7) as f64 * 8.0;
            BBoxXYXY::from_xyxy(x, y, (x + w).min(223.0), (y + h).min(223.0))
        })
        .collect()
}

/// Benchmark best-anchor selection for one box.
fn bench_best_anchor(c: &mut Criterion) {
    let anchors = anchors();
    let gt = BBoxXYXY::<Scaled>::from_xyxy(40.0, 60.0, 100.0, 95.0);
    let center = gt.center();

    c.bench_function("best_anchor_5", |b| {
        b.iter(|| black_box(best_anchor(black_box(&gt), &anchors, center)))
    });
}

/// Benchmark encoding of a single box.
fn bench_encode_box(c: &mut Criterion) {
    let anchors = anchors();
    let geometry = geometry();
    let gt = BBoxXYXY::<Scaled>::from_xyxy(40.0, 60.0, 100.0, 95.0);

    c.bench_function("encode_box", |b| {
        b.iter(|| black_box(encode_box(black_box(&gt), &anchors, &geometry).unwrap()))
    });
}

/// Benchmark writing many boxes into one label grid.
fn bench_write_targets(c: &mut Criterion) {
    let anchors = anchors();
    let geometry = geometry();
    let boxes = boxes(256);

    let mut group = c.benchmark_group("write_targets");
    group.throughput(Throughput::Elements(boxes.len() as u64));

    group.bench_function("256_boxes", |b| {
        b.iter(|| {
            let mut label = Array3::from_elem(
                (geometry.grid_h, geometry.grid_w, anchors.len() * VALUES_PER_ANCHOR),
                f16::ZERO,
            );
            let stats =
                write_targets(label.view_mut(), boxes.iter().copied(), &anchors, &geometry)
                    .unwrap();
            black_box(stats)
        })
    });

    group.finish();
}

/// Benchmark annotation CSV parsing from a string.
fn bench_annotations_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("annotations_parse");
    group.throughput(Throughput::Bytes(ANNOTATIONS_FIXTURE.len() as u64));

    group.bench_function("from_annotations_csv_str", |b| {
        b.iter(|| {
            let set = from_annotations_csv_str(black_box(ANNOTATIONS_FIXTURE), None).unwrap();
            black_box(set)
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_best_anchor,
    bench_encode_box,
    bench_write_targets,
    bench_annotations_parse,
);
criterion_main!(benches);

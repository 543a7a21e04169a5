//! Integration tests for anchor discovery over image files.

use gridlabel::anchors::{box_dims_for_anchors, discover_from_annotations, KMeansOptions};
use gridlabel::config::PipelineConfig;
use gridlabel::ir::io_annotations_csv::read_annotations_csv;
use gridlabel::persist::Store;
use gridlabel::GridLabelError;

mod common;
use common::write_dataset;

fn seeded() -> KMeansOptions {
    KMeansOptions {
        seed: Some(7),
        ..Default::default()
    }
}

#[test]
fn box_dims_use_each_images_own_size() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let ds = write_dataset(
        temp.path(),
        &[("big.bmp", 448, 224), ("small.bmp", 224, 224)],
        &["big.bmp,0,0,100,50", "small.bmp,10,10,60,35"],
    );
    let config = PipelineConfig::from_yaml_file(&ds.config_path).expect("config");
    let annotations = read_annotations_csv(&config.annotations_path(), None).expect("csv");

    let dims = box_dims_for_anchors(&annotations, &config.data_path, config.image_size())
        .expect("dims");
    assert_eq!(dims, vec![(50.0, 50.0), (50.0, 25.0)]);
}

#[test]
fn discovered_anchors_separate_two_shape_groups() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let ds = write_dataset(
        temp.path(),
        &[("a.bmp", 224, 224), ("b.bmp", 448, 448)],
        &[
            "a.bmp,0,0,20,60",
            "a.bmp,30,30,52,92",
            "b.bmp,0,0,40,120",
            "a.bmp,100,100,180,120",
            "b.bmp,10,10,170,50",
            "a.bmp,0,100,78,118",
        ],
    );
    let config = PipelineConfig::from_yaml_file(&ds.config_path).expect("config");
    let annotations = read_annotations_csv(&config.annotations_path(), None).expect("csv");

    let anchors = discover_from_annotations(
        &annotations,
        &config.data_path,
        config.image_size(),
        config.effective_anchor_count(),
        &seeded(),
    )
    .expect("discover");
    assert_eq!(anchors.len(), 2);

    let mut found: Vec<(f64, f64)> = anchors
        .as_slice()
        .iter()
        .map(|a| (a.width, a.height))
        .collect();
    found.sort_by(|a, b| a.0.total_cmp(&b.0));

    // tall group: (20, 60), (22, 62), (20, 60); wide group: (80, 20), (80, 20), (78, 18)
    assert!((found[0].0 - 62.0 / 3.0).abs() < 1e-9);
    assert!((found[0].1 - 182.0 / 3.0).abs() < 1e-9);
    assert!((found[1].0 - 238.0 / 3.0).abs() < 1e-9);
    assert!((found[1].1 - 58.0 / 3.0).abs() < 1e-9);

    let store = Store::new(&config.save_path);
    store.save_anchors(&anchors, "Anchor_train").expect("save");
    assert_eq!(store.load_anchors("Anchor_train").expect("load"), anchors);
}

#[test]
fn too_few_distinct_boxes_is_an_error() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let ds = write_dataset(
        temp.path(),
        &[("a.bmp", 224, 224)],
        &["a.bmp,0,0,20,20", "a.bmp,50,50,70,70"],
    );
    let config = PipelineConfig::from_yaml_file(&ds.config_path).expect("config");
    let annotations = read_annotations_csv(&config.annotations_path(), None).expect("csv");

    let result = discover_from_annotations(
        &annotations,
        &config.data_path,
        config.image_size(),
        2,
        &seeded(),
    );
    assert!(matches!(result, Err(GridLabelError::AnchorDiscovery { .. })));
}

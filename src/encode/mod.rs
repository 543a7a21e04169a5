//! Batch target encoding.
//!
//! Turns an annotation set plus an anchor set into two half-precision
//! tensors:
//!
//! - **images** `(N, 3, H, W)`: every entry's image resized to the target
//!   size, intensities in `[0, 1]`
//! - **labels** `(N, grid_h, grid_w, K * 5)`: the encoded targets, zero
//!   wherever no box was assigned
//!
//! Both tensors are allocated up front. Each entry owns one outer slice of
//! each, so entries are encoded in parallel with no shared mutable state.
//! Each image is scaled with its own original dimensions.
//!
//! # Precision
//!
//! Values are stored as IEEE half floats. Offsets in `[0, 1)` keep about
//! three decimal digits, which is enough for training labels; the
//! tensors are not meant to hold predictions.

mod report;
mod targets;

pub use report::{EncodeReport, SkippedImage};
pub use targets::{
    encode_box, grid_cell, write_targets, EncodedTarget, WriteStats, OBJECTNESS,
    VALUES_PER_ANCHOR,
};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use half::f16;
use log::{info, warn};
use ndarray::parallel::prelude::*;
use ndarray::{Array4, ArrayViewMut3, Axis};

use crate::config::{GridGeometry, ImageSize, PipelineConfig};
use crate::error::GridLabelError;
use crate::imaging;
use crate::ir::{AnchorSet, AnnotationSet, ImageScale};

/// How annotation rows map onto batch entries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Layout {
    /// One entry per annotation row; an image with three boxes appears
    /// three times, each copy labelled with one box.
    #[default]
    PerAnnotation,
    /// One entry per distinct image, labelled with all of its boxes in
    /// row order.
    PerImage,
}

/// What to do when an entry's image can't be loaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingImagePolicy {
    /// Abort the run.
    #[default]
    Fail,
    /// Leave the entry all-zero, log a warning and carry on.
    Skip,
}

/// Cooperative cancellation flag, checked before each entry.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Options for an encoding run.
#[derive(Clone, Debug)]
pub struct EncodeOptions {
    pub layout: Layout,
    pub missing_images: MissingImagePolicy,
    /// Worker threads; `None` uses one per available core.
    pub jobs: Option<usize>,
    /// Log progress every this many entries; 0 disables it.
    pub progress_interval: usize,
    pub cancel: Option<CancelToken>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            layout: Layout::PerAnnotation,
            missing_images: MissingImagePolicy::Fail,
            jobs: None,
            progress_interval: 100,
            cancel: None,
        }
    }
}

/// The encoded tensors of one run.
#[derive(Clone, Debug)]
pub struct EncodedBatch {
    /// `(N, 3, H, W)` resized images.
    pub images: Array4<f16>,
    /// `(N, grid_h, grid_w, K * 5)` targets.
    pub labels: Array4<f16>,
}

impl EncodedBatch {
    pub fn len(&self) -> usize {
        self.labels.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of populated anchor slots across the whole batch.
    pub fn objectness_count(&self) -> usize {
        count_objectness(&self.labels)
    }
}

/// Encodes annotation sets against a fixed anchor set and grid.
#[derive(Clone, Debug)]
pub struct Encoder {
    image_dir: PathBuf,
    geometry: GridGeometry,
    anchors: AnchorSet,
}

/// One batch entry: an image and the annotation rows labelled on it.
struct Entry<'a> {
    image_name: &'a str,
    rows: Vec<usize>,
}

#[derive(Default)]
struct EntryOutcome {
    written: usize,
    collisions: usize,
    skipped: Option<SkippedImage>,
}

impl Encoder {
    /// Creates an encoder reading images from `image_dir`.
    ///
    /// # Errors
    /// [`GridLabelError::InvalidConfig`] if the anchor set is empty or an
    /// anchor has a non-positive or non-finite side.
    pub fn new(
        image_dir: impl Into<PathBuf>,
        geometry: GridGeometry,
        anchors: AnchorSet,
    ) -> Result<Self, GridLabelError> {
        if anchors.is_empty() {
            return Err(GridLabelError::InvalidConfig {
                message: "anchor set is empty".to_string(),
            });
        }

        let is_usable = |w: f64, h: f64| w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0;
        if let Some(bad) = anchors
            .as_slice()
            .iter()
            .find(|a| !is_usable(a.width, a.height))
        {
            return Err(GridLabelError::InvalidConfig {
                message: format!(
                    "anchor {}x{} must have positive finite sides",
                    bad.width, bad.height
                ),
            });
        }

        Ok(Self {
            image_dir: image_dir.into(),
            geometry,
            anchors,
        })
    }

    /// Creates an encoder from a pipeline config.
    ///
    /// # Errors
    /// [`GridLabelError::AnchorCountMismatch`] if `anchors` doesn't hold
    /// exactly the configured number of anchors.
    pub fn from_config(
        config: &PipelineConfig,
        anchors: AnchorSet,
    ) -> Result<Self, GridLabelError> {
        let expected = config.effective_anchor_count();
        if anchors.len() != expected {
            return Err(GridLabelError::AnchorCountMismatch {
                expected,
                found: anchors.len(),
            });
        }
        Self::new(config.data_path.clone(), config.geometry()?, anchors)
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn anchors(&self) -> &AnchorSet {
        &self.anchors
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Encodes every entry of `annotations` into image and label tensors.
    ///
    /// # Errors
    /// The first failing entry aborts the run and is reported as
    /// [`GridLabelError::Entry`] wrapping the cause (missing image,
    /// out-of-grid box, ...). A cancelled run returns
    /// [`GridLabelError::Cancelled`].
    pub fn encode(
        &self,
        annotations: &AnnotationSet,
        opts: &EncodeOptions,
    ) -> Result<(EncodedBatch, EncodeReport), GridLabelError> {
        let started = Instant::now();
        let entries = build_entries(annotations, opts.layout);
        let total = entries.len();
        let size = self.geometry.image;

        info!(
            "encoding {} entries ({} annotations) at {}x{}, grid {}x{}, {} anchors",
            total,
            annotations.len(),
            size.height,
            size.width,
            self.geometry.grid_h,
            self.geometry.grid_w,
            self.anchors.len()
        );

        let mut images = Array4::from_elem(
            (total, 3, size.height as usize, size.width as usize),
            f16::ZERO,
        );
        let mut labels = Array4::from_elem(
            (
                total,
                self.geometry.grid_h,
                self.geometry.grid_w,
                self.anchors.len() * VALUES_PER_ANCHOR,
            ),
            f16::ZERO,
        );

        let completed = AtomicUsize::new(0);
        let pool = build_pool(opts.jobs)?;

        let outcomes: Vec<EntryOutcome> = pool.install(|| {
            images
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .zip(labels.axis_iter_mut(Axis(0)).into_par_iter())
                .zip(entries.par_iter())
                .enumerate()
                .map(
                    |(idx, ((image_slot, label_slot), entry))| -> Result<EntryOutcome, GridLabelError> {
                        check_cancelled(opts, &completed, total)?;
                        let outcome = self
                            .encode_entry(
                                idx,
                                entry,
                                annotations,
                                image_slot,
                                label_slot,
                                opts,
                            )
                            .map_err(|err| wrap_entry_error(entry, err))?;
                        report_progress(opts, &completed, total);
                        Ok(outcome)
                    },
                )
                .collect::<Result<Vec<_>, _>>()
        })?;

        let batch = EncodedBatch { images, labels };
        let mut report = EncodeReport {
            entries: total,
            annotations: annotations.len(),
            objectness: batch.objectness_count(),
            ..Default::default()
        };
        for outcome in outcomes {
            report.boxes_written += outcome.written;
            report.collisions += outcome.collisions;
            report.skipped.extend(outcome.skipped);
        }
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        if report.collisions > 0 {
            warn!(
                "{} box(es) were overwritten by a later box in the same cell and anchor",
                report.collisions
            );
        }
        info!("encoding finished in {:.2?}", started.elapsed());

        Ok((batch, report))
    }

    /// Loads and resizes images only, without computing any labels.
    ///
    /// Uses the same entry layout, loader and resize as [`Encoder::encode`],
    /// so row `i` of the result matches row `i` of an encoded batch.
    pub fn encode_images_only(
        &self,
        annotations: &AnnotationSet,
        opts: &EncodeOptions,
    ) -> Result<Array4<f16>, GridLabelError> {
        extract_images(&self.image_dir, self.geometry.image, annotations, opts)
    }

    fn encode_entry(
        &self,
        idx: usize,
        entry: &Entry<'_>,
        annotations: &AnnotationSet,
        image_slot: ArrayViewMut3<'_, f16>,
        label_slot: ArrayViewMut3<'_, f16>,
        opts: &EncodeOptions,
    ) -> Result<EntryOutcome, GridLabelError> {
        let loaded = load_entry_image(
            &self.image_dir,
            self.geometry.image,
            idx,
            entry,
            image_slot,
            opts,
        )?;
        let scale = match loaded {
            Loaded::Image(scale) => scale,
            Loaded::Skipped(skipped) => {
                return Ok(EntryOutcome {
                    skipped: Some(skipped),
                    ..Default::default()
                });
            }
        };

        let boxes = entry
            .rows
            .iter()
            .map(|&row| annotations.annotations[row].bbox.to_scaled(scale));
        let stats = write_targets(label_slot, boxes, self.anchors.as_slice(), &self.geometry)?;

        Ok(EntryOutcome {
            written: stats.written,
            collisions: stats.collisions,
            skipped: None,
        })
    }
}

/// Loads and resizes the images of every entry into an `(N, 3, H, W)`
/// tensor, without labels or anchors.
///
/// Skipped images (under [`MissingImagePolicy::Skip`]) stay all-zero.
pub fn extract_images(
    image_dir: &Path,
    size: ImageSize,
    annotations: &AnnotationSet,
    opts: &EncodeOptions,
) -> Result<Array4<f16>, GridLabelError> {
    let started = Instant::now();
    let entries = build_entries(annotations, opts.layout);
    let total = entries.len();

    let mut images = Array4::from_elem(
        (total, 3, size.height as usize, size.width as usize),
        f16::ZERO,
    );

    let completed = AtomicUsize::new(0);
    let pool = build_pool(opts.jobs)?;

    pool.install(|| {
        images
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(entries.par_iter())
            .enumerate()
            .try_for_each(|(idx, (image_slot, entry))| {
                check_cancelled(opts, &completed, total)?;
                load_entry_image(image_dir, size, idx, entry, image_slot, opts)
                    .map_err(|err| wrap_entry_error(entry, err))?;
                report_progress(opts, &completed, total);
                Ok::<(), GridLabelError>(())
            })
    })?;

    info!("extracted {} images in {:.2?}", total, started.elapsed());
    Ok(images)
}

enum Loaded {
    Image(ImageScale),
    Skipped(SkippedImage),
}

fn load_entry_image(
    image_dir: &Path,
    size: ImageSize,
    idx: usize,
    entry: &Entry<'_>,
    image_slot: ArrayViewMut3<'_, f16>,
    opts: &EncodeOptions,
) -> Result<Loaded, GridLabelError> {
    let path = image_dir.join(entry.image_name);

    match imaging::load_resized(&path, size) {
        Ok((resized, scale)) => {
            imaging::write_chw(&resized, image_slot);
            Ok(Loaded::Image(scale))
        }
        Err(err) if opts.missing_images == MissingImagePolicy::Skip && is_unreadable(&err) => {
            warn!("skipping entry {} ({}): {}", idx, entry.image_name, err);
            Ok(Loaded::Skipped(SkippedImage {
                entry: idx,
                image_name: entry.image_name.to_string(),
                reason: err.to_string(),
            }))
        }
        Err(err) => Err(err),
    }
}

/// Counts populated objectness flags in a label tensor.
pub fn count_objectness(labels: &Array4<f16>) -> usize {
    labels
        .iter()
        .skip(OBJECTNESS)
        .step_by(VALUES_PER_ANCHOR)
        .filter(|v| **v != f16::ZERO)
        .count()
}

fn build_entries(annotations: &AnnotationSet, layout: Layout) -> Vec<Entry<'_>> {
    match layout {
        Layout::PerAnnotation => annotations
            .annotations
            .iter()
            .enumerate()
            .map(|(row, ann)| Entry {
                image_name: &ann.image_name,
                rows: vec![row],
            })
            .collect(),
        Layout::PerImage => annotations
            .group_by_image()
            .into_iter()
            .map(|group| Entry {
                image_name: group.image_name,
                rows: group.rows,
            })
            .collect(),
    }
}

fn build_pool(jobs: Option<usize>) -> Result<rayon::ThreadPool, GridLabelError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.unwrap_or(0))
        .build()
        .map_err(|e| GridLabelError::ThreadPool(e.to_string()))
}

fn check_cancelled(
    opts: &EncodeOptions,
    completed: &AtomicUsize,
    total: usize,
) -> Result<(), GridLabelError> {
    match &opts.cancel {
        Some(token) if token.is_cancelled() => Err(GridLabelError::Cancelled {
            completed: completed.load(Ordering::Relaxed),
            total,
        }),
        _ => Ok(()),
    }
}

fn report_progress(opts: &EncodeOptions, completed: &AtomicUsize, total: usize) {
    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
    if opts.progress_interval > 0 && done % opts.progress_interval == 0 {
        info!("encoded {} / {}", done, total);
    }
}

fn wrap_entry_error(entry: &Entry<'_>, err: GridLabelError) -> GridLabelError {
    match err {
        GridLabelError::Cancelled { .. } => err,
        other => GridLabelError::Entry {
            row: entry.rows.first().map_or(0, |r| r + 1),
            image_name: entry.image_name.to_string(),
            source: Box::new(other),
        },
    }
}

fn is_unreadable(err: &GridLabelError) -> bool {
    matches!(
        err,
        GridLabelError::Io(_)
            | GridLabelError::ImageDecode { .. }
            | GridLabelError::EmptyImage { .. }
    )
}

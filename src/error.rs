use std::path::PathBuf;
use thiserror::Error;

/// The main error type for gridlabel operations.
#[derive(Debug, Error)]
pub enum GridLabelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse annotation CSV {path}: {source}")]
    AnnotationCsvParse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid annotation CSV {path}: {message}")]
    AnnotationCsvInvalid { path: PathBuf, message: String },

    #[error("Failed to decode image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to read image dimensions from {path}: {source}")]
    ImageDimensionRead {
        path: PathBuf,
        #[source]
        source: imagesize::ImageError,
    },

    #[error("Image {path} has zero width or height")]
    EmptyImage { path: PathBuf },

    #[error(
        "Box center ({center_x:.3}, {center_y:.3}) maps to grid cell ({row}, {col}) \
         outside the {grid_h}x{grid_w} grid"
    )]
    GridCellOutOfBounds {
        center_x: f64,
        center_y: f64,
        row: i64,
        col: i64,
        grid_h: usize,
        grid_w: usize,
    },

    #[error("Row {row} ({image_name}): {source}")]
    Entry {
        row: usize,
        image_name: String,
        #[source]
        source: Box<GridLabelError>,
    },

    #[error("Anchor discovery failed: {message}")]
    AnchorDiscovery { message: String },

    #[error("Expected {expected} anchor(s), found {found}")]
    AnchorCountMismatch { expected: usize, found: usize },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to write tensor to {path}: {source}")]
    TensorWrite {
        path: PathBuf,
        #[source]
        source: ndarray_npy::WriteNpyError,
    },

    #[error("Failed to read tensor from {path}: {source}")]
    TensorRead {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpyError,
    },

    #[error("Failed to parse anchors from {path}: {source}")]
    AnchorJsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write anchors to {path}: {source}")]
    AnchorJsonWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize report: {0}")]
    ReportSerialize(#[source] serde_json::Error),

    #[error("No saved artefact named '{name}' in {dir}")]
    ArtefactNotFound { dir: PathBuf, name: String },

    #[error("Cancelled after {completed} of {total} entries")]
    Cancelled { completed: usize, total: usize },

    #[error("Failed to start worker pool: {0}")]
    ThreadPool(String),

    #[error("Unsupported value: {0}")]
    Unsupported(String),
}

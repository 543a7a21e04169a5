//! Headerless annotation CSV reader.
//!
//! # Format Reference
//!
//! One box per row, no header line:
//!
//! ```text
//! filename,x1,y1,x2,y2
//! ```
//!
//! - `filename`: image path relative to the data directory
//! - `x1`, `y1`, `x2`, `y2`: box corners in **original image pixels**
//!
//! Row order is preserved and is the order in which boxes are encoded.
//! A row with a missing column or a non-numeric coordinate aborts the
//! whole read; there is no partial recovery.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;

use super::model::{Annotation, AnnotationSet};
use super::BBoxXYXY;
use crate::error::GridLabelError;

/// A single CSV row, positional.
#[derive(Debug, Deserialize)]
struct AnnotationRow(String, f64, f64, f64, f64);

/// Reads annotations from a headerless CSV file.
///
/// If `limit` is given only the first `limit` rows are read; rows after
/// that are never parsed.
///
/// # Errors
/// Returns [`GridLabelError::Io`] if the file cannot be opened and
/// [`GridLabelError::AnnotationCsvParse`] for a malformed row.
///
/// # Example
/// ```no_run
/// use std::path::Path;
/// use gridlabel::ir::io_annotations_csv::read_annotations_csv;
///
/// let annotations = read_annotations_csv(Path::new("train/_annotations.csv"), Some(100))?;
/// # Ok::<(), gridlabel::GridLabelError>(())
/// ```
pub fn read_annotations_csv(
    path: &Path,
    limit: Option<usize>,
) -> Result<AnnotationSet, GridLabelError> {
    let file = File::open(path).map_err(GridLabelError::Io)?;
    read_from(BufReader::new(file), path, limit)
}

/// Reads annotations from CSV bytes.
///
/// Useful for fuzzing and tests without file I/O.
pub fn from_annotations_csv_slice(
    bytes: &[u8],
    limit: Option<usize>,
) -> Result<AnnotationSet, GridLabelError> {
    read_from(bytes, Path::new("<bytes>"), limit)
}

/// Reads annotations from a CSV string.
pub fn from_annotations_csv_str(
    csv_str: &str,
    limit: Option<usize>,
) -> Result<AnnotationSet, GridLabelError> {
    from_annotations_csv_slice(csv_str.as_bytes(), limit)
}

/// Fuzz-only entrypoint for a single annotation row.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_annotation_row(input: &str) -> Result<(), GridLabelError> {
    let _ = from_annotations_csv_str(input, Some(1))?;
    Ok(())
}

fn read_from<R: Read>(
    reader: R,
    path: &Path,
    limit: Option<usize>,
) -> Result<AnnotationSet, GridLabelError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let max_rows = limit.unwrap_or(usize::MAX);
    let mut annotations = Vec::new();

    for result in csv_reader.deserialize().take(max_rows) {
        let AnnotationRow(image_name, x1, y1, x2, y2) =
            result.map_err(|source| GridLabelError::AnnotationCsvParse {
                path: path.to_path_buf(),
                source,
            })?;

        if image_name.is_empty() {
            return Err(GridLabelError::AnnotationCsvInvalid {
                path: path.to_path_buf(),
                message: format!("row {} has an empty filename", annotations.len() + 1),
            });
        }

        annotations.push(Annotation::new(
            image_name,
            BBoxXYXY::from_xyxy(x1, y1, x2, y2),
        ));
    }

    Ok(AnnotationSet::new(annotations))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_csv() -> &'static str {
        "plate_001.jpg,10,20,110,60\n\
         plate_002.jpg, 5.5 ,0,50,25\n\
         plate_001.jpg,200,40,260,90\n"
    }

    #[test]
    fn test_reads_rows_in_file_order() {
        let set = from_annotations_csv_str(sample_csv(), None).expect("parse failed");
        assert_eq!(set.len(), 3);

        let names: Vec<&str> = set.image_names().collect();
        assert_eq!(names, ["plate_001.jpg", "plate_002.jpg", "plate_001.jpg"]);

        let second = &set.annotations[1].bbox;
        assert_eq!(second.xmin(), 5.5);
        assert_eq!(second.ymin(), 0.0);
        assert_eq!(second.xmax(), 50.0);
        assert_eq!(second.ymax(), 25.0);
    }

    #[test]
    fn test_limit_truncates() {
        let set = from_annotations_csv_str(sample_csv(), Some(2)).expect("parse failed");
        assert_eq!(set.len(), 2);
        assert_eq!(set.annotations[1].image_name, "plate_002.jpg");
    }

    #[test]
    fn test_limit_skips_malformed_tail() {
        let csv = "a.jpg,1,2,3,4\nb.jpg,oops,2,3,4\n";
        let set = from_annotations_csv_str(csv, Some(1)).expect("tail is never parsed");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_first_row_is_data_not_header() {
        let set = from_annotations_csv_str("img.png,0,0,1,1\n", None).expect("parse failed");
        assert_eq!(set.len(), 1);
        assert_eq!(set.annotations[0].image_name, "img.png");
    }

    #[test]
    fn test_non_numeric_coordinate_fails() {
        let result = from_annotations_csv_str("a.jpg,1,two,3,4\n", None);
        assert!(matches!(
            result,
            Err(GridLabelError::AnnotationCsvParse { .. })
        ));
    }

    #[test]
    fn test_missing_column_fails() {
        let result = from_annotations_csv_str("a.jpg,1,2,3\n", None);
        assert!(matches!(
            result,
            Err(GridLabelError::AnnotationCsvParse { .. })
        ));
    }

    #[test]
    fn test_empty_filename_fails() {
        let result = from_annotations_csv_str(",1,2,3,4\n", None);
        assert!(matches!(
            result,
            Err(GridLabelError::AnnotationCsvInvalid { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = read_annotations_csv(Path::new("does/not/exist.csv"), None);
        assert!(matches!(result, Err(GridLabelError::Io(_))));
    }

    #[test]
    fn test_empty_input_yields_empty_set() {
        let set = from_annotations_csv_str("", None).expect("parse failed");
        assert!(set.is_empty());
    }
}

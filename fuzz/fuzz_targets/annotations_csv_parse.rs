//! Fuzz target for annotation CSV parsing.
//!
//! Feeds arbitrary bytes to the headerless annotation CSV reader, checking
//! for panics, crashes, or hangs.

#![no_main]

use gridlabel::ir::io_annotations_csv::{fuzz_parse_annotation_row, from_annotations_csv_slice};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = from_annotations_csv_slice(data, None);

    if let Ok(text) = std::str::from_utf8(data) {
        let _ = fuzz_parse_annotation_row(text);
    }
});

//! Encoding report types.
//!
//! Like a validation report, an encode report lets callers see what the
//! run did without re-reading the tensors: how many entries were
//! produced, how many boxes landed, and what was overwritten or skipped.

use serde::Serialize;
use std::fmt;

/// Summary of one encoding run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct EncodeReport {
    /// Batch entries produced (rows of X and Y).
    pub entries: usize,
    /// Annotation rows consumed.
    pub annotations: usize,
    /// Boxes written into label grids, counting overwritten ones.
    pub boxes_written: usize,
    /// Boxes that replaced an earlier box in the same cell and anchor.
    pub collisions: usize,
    /// Populated objectness flags in the final label batch.
    pub objectness: usize,
    /// Entries left empty because their image could not be loaded.
    pub skipped: Vec<SkippedImage>,
    /// Wall-clock time of the run, in milliseconds.
    pub elapsed_ms: u64,
}

/// An entry whose image was skipped under the skip-missing policy.
#[derive(Clone, Debug, Serialize)]
pub struct SkippedImage {
    pub entry: usize,
    pub image_name: String,
    pub reason: String,
}

impl EncodeReport {
    /// Returns true if every entry was encoded and no box was lost.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.collisions == 0
    }
}

impl fmt::Display for EncodeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Encoded {} entr{} from {} annotation(s) in {} ms",
            self.entries,
            if self.entries == 1 { "y" } else { "ies" },
            self.annotations,
            self.elapsed_ms
        )?;
        writeln!(f, "  boxes written:   {}", self.boxes_written)?;
        writeln!(f, "  objectness set:  {}", self.objectness)?;
        writeln!(f, "  collisions:      {}", self.collisions)?;
        writeln!(f, "  skipped images:  {}", self.skipped.len())?;

        for skipped in &self.skipped {
            writeln!(
                f,
                "    [{}] {}: {}",
                skipped.entry, skipped.image_name, skipped.reason
            )?;
        }

        Ok(())
    }
}

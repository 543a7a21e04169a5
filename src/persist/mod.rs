//! Saving and loading of encoded tensors and anchor sets.
//!
//! Everything lives flat in one save directory:
//!
//! - tensors: `<name>.npy`, or `<name>-<YYYY-MM-DD HH-MM-SS>.npy` when
//!   stamped. Stamps keep batch saves apart; they are not versions.
//! - anchors: `<name>.anchors.json`, a JSON list of `{width, height}`.
//!
//! Tensors are held as f16 in memory and widened to f32 on disk, so any
//! NumPy reader can open them directly. The values already carry the f16
//! rounding; loading narrows them back without further loss.
//!
//! Writes go to a temporary file in the same directory which then
//! replaces the destination, so a crash never leaves a half-written file
//! under the final name.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use half::f16;
use log::info;
use ndarray::Array4;
use ndarray_npy::{ReadNpyExt, WriteNpyExt};
use tempfile::NamedTempFile;

use crate::error::GridLabelError;
use crate::ir::AnchorSet;

/// File extension for tensors.
pub const TENSOR_EXTENSION: &str = ".npy";

/// File extension for anchor sets.
pub const ANCHOR_EXTENSION: &str = ".anchors.json";

const STAMP_FORMAT: &str = "%Y-%m-%d %H-%M-%S";

/// Whether a saved name gets a timestamp suffix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stamp {
    /// Save under the bare name, replacing any previous file.
    None,
    /// Append a fixed time.
    At(NaiveDateTime),
}

impl Stamp {
    /// Stamp with the current local time.
    ///
    /// Resolve once and reuse it for every file of one run so they share
    /// a suffix.
    pub fn now() -> Self {
        Stamp::At(Local::now().naive_local())
    }
}

/// Builds the file stem for `name` under `stamp`.
pub fn stamped_name(name: &str, stamp: Stamp) -> String {
    match stamp {
        Stamp::None => name.to_string(),
        Stamp::At(at) => format!("{}-{}", name, at.format(STAMP_FORMAT)),
    }
}

/// A directory of saved artefacts.
#[derive(Clone, Debug)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Saves a tensor and returns the path written.
    pub fn save_tensor(
        &self,
        tensor: &Array4<f16>,
        name: &str,
        stamp: Stamp,
    ) -> Result<PathBuf, GridLabelError> {
        let path = self
            .dir
            .join(format!("{}{}", stamped_name(name, stamp), TENSOR_EXTENSION));
        let wide = tensor.mapv(f16::to_f32);

        write_atomic(&path, |writer| {
            wide.write_npy(writer)
                .map_err(|source| GridLabelError::TensorWrite {
                    path: path.clone(),
                    source,
                })
        })?;

        info!("saved tensor {:?} to {}", tensor.shape(), path.display());
        Ok(path)
    }

    /// Loads a tensor by name.
    ///
    /// `name` may be a full file name, a stem (`X_Train-2024-01-01 10-00-00`)
    /// or a bare name; a bare name with no exact match resolves to its most
    /// recently stamped file.
    pub fn load_tensor(&self, name: &str) -> Result<Array4<f16>, GridLabelError> {
        let path = self.resolve(name, TENSOR_EXTENSION)?;
        let file = File::open(&path).map_err(GridLabelError::Io)?;

        let wide = Array4::<f32>::read_npy(BufReader::new(file)).map_err(|source| {
            GridLabelError::TensorRead {
                path: path.clone(),
                source,
            }
        })?;

        Ok(wide.mapv(f16::from_f32))
    }

    /// Saves an anchor set as `<name>.anchors.json`, replacing any
    /// previous set of that name.
    pub fn save_anchors(&self, anchors: &AnchorSet, name: &str) -> Result<PathBuf, GridLabelError> {
        let path = self.dir.join(format!("{}{}", name, ANCHOR_EXTENSION));

        write_atomic(&path, |writer| {
            serde_json::to_writer_pretty(writer, anchors).map_err(|source| {
                GridLabelError::AnchorJsonWrite {
                    path: path.clone(),
                    source,
                }
            })
        })?;

        info!("saved {} anchors to {}", anchors.len(), path.display());
        Ok(path)
    }

    /// Loads an anchor set saved with [`Store::save_anchors`].
    pub fn load_anchors(&self, name: &str) -> Result<AnchorSet, GridLabelError> {
        let path = self.resolve(name, ANCHOR_EXTENSION)?;
        let file = File::open(&path).map_err(GridLabelError::Io)?;

        serde_json::from_reader(BufReader::new(file)).map_err(|source| {
            GridLabelError::AnchorJsonParse {
                path: path.clone(),
                source,
            }
        })
    }

    /// Most recent stamped file for `name` with extension `ext`, falling
    /// back to the unstamped file.
    pub fn latest(&self, name: &str, ext: &str) -> Result<PathBuf, GridLabelError> {
        let prefix = format!("{}-", name);
        let mut newest: Option<(NaiveDateTime, PathBuf)> = None;

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(self.not_found(name));
            }
            Err(err) => return Err(GridLabelError::Io(err)),
        };

        for entry in entries {
            let entry = entry.map_err(GridLabelError::Io)?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let Some(stamp) = file_name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(ext))
            else {
                continue;
            };
            let Ok(at) = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT) else {
                continue;
            };

            let is_newer = match &newest {
                Some((best, _)) => at > *best,
                None => true,
            };
            if is_newer {
                newest = Some((at, entry.path()));
            }
        }

        if let Some((_, path)) = newest {
            return Ok(path);
        }

        let bare = self.dir.join(format!("{}{}", name, ext));
        if bare.is_file() {
            Ok(bare)
        } else {
            Err(self.not_found(name))
        }
    }

    fn resolve(&self, name: &str, ext: &str) -> Result<PathBuf, GridLabelError> {
        let exact = self.dir.join(name);
        if name.ends_with(ext) && exact.is_file() {
            return Ok(exact);
        }

        let with_ext = self.dir.join(format!("{}{}", name, ext));
        if with_ext.is_file() {
            return Ok(with_ext);
        }

        self.latest(name, ext)
    }

    fn not_found(&self, name: &str) -> GridLabelError {
        GridLabelError::ArtefactNotFound {
            dir: self.dir.clone(),
            name: name.to_string(),
        }
    }
}

/// Writes `path` through a temporary file in the same directory.
fn write_atomic<F>(path: &Path, write: F) -> Result<(), GridLabelError>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<(), GridLabelError>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(GridLabelError::Io)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(GridLabelError::Io)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush().map_err(GridLabelError::Io)?;
    }
    tmp.as_file().sync_all().map_err(GridLabelError::Io)?;
    tmp.persist(path).map_err(|e| GridLabelError::Io(e.error))?;

    Ok(())
}

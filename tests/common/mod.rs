#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// A 24-bit bottom-up BMP with every pixel set to `rgb`.
pub fn bmp_bytes_filled(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let row_stride = (width * 3).div_ceil(4) * 4;
    let pixel_array_size = row_stride * height;
    let file_size = 54 + pixel_array_size;

    let mut bytes = Vec::with_capacity(file_size as usize);
    bytes.extend_from_slice(b"BM");
    bytes.extend_from_slice(&file_size.to_le_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes.extend_from_slice(&54u32.to_le_bytes());

    bytes.extend_from_slice(&40u32.to_le_bytes());
    bytes.extend_from_slice(&(width as i32).to_le_bytes());
    bytes.extend_from_slice(&(height as i32).to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&24u16.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&pixel_array_size.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());

    // pixels are stored BGR, rows padded to 4 bytes
    let [r, g, b] = rgb;
    for _ in 0..height {
        for _ in 0..width {
            bytes.extend_from_slice(&[b, g, r]);
        }
        bytes.resize(bytes.len() + (row_stride - width * 3) as usize, 0);
    }

    bytes
}

pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    bmp_bytes_filled(width, height, [0, 0, 0])
}

pub fn write_bmp(path: &Path, width: u32, height: u32) {
    write_bmp_filled(path, width, height, [0, 0, 0]);
}

pub fn write_bmp_filled(path: &Path, width: u32, height: u32, rgb: [u8; 3]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, bmp_bytes_filled(width, height, rgb)).expect("write bmp file");
}

/// A data directory with images, an annotation CSV and a config file.
pub struct Dataset {
    pub root: PathBuf,
    pub data_dir: PathBuf,
    pub save_dir: PathBuf,
    pub config_path: PathBuf,
}

/// Writes `images` as `(file name, width, height)` BMPs plus the CSV rows
/// into `root/data`, and a 224x224 stride-32 config pointing at it.
pub fn write_dataset(root: &Path, images: &[(&str, u32, u32)], csv_rows: &[&str]) -> Dataset {
    write_dataset_with(root, images, csv_rows, "anchor_count: 2\n")
}

/// Like [`write_dataset`] with extra YAML appended to the config.
pub fn write_dataset_with(
    root: &Path,
    images: &[(&str, u32, u32)],
    csv_rows: &[&str],
    extra_yaml: &str,
) -> Dataset {
    let data_dir = root.join("data");
    let save_dir = root.join("saved");
    fs::create_dir_all(&data_dir).expect("create data dir");

    for (name, width, height) in images {
        write_bmp(&data_dir.join(name), *width, *height);
    }

    let mut csv = csv_rows.join("\n");
    csv.push('\n');
    fs::write(data_dir.join("_annotations.csv"), csv).expect("write annotations");

    let config_path = root.join("config.yaml");
    let yaml = format!(
        "data_path: {}\n\
         save_path: {}\n\
         annotations_file: _annotations.csv\n\
         scaled_image_size: [224, 224]\n\
         scaling_factor: 32\n\
         {}",
        data_dir.display(),
        save_dir.display(),
        extra_yaml
    );
    fs::write(&config_path, yaml).expect("write config");

    Dataset {
        root: root.to_path_buf(),
        data_dir,
        save_dir,
        config_path,
    }
}

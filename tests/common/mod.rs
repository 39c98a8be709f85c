#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imgshrink::{ProgressReporter, RunEvent};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

/// A gradient, so encoders have something to work with
pub fn gradient_image(width: u32, height: u32) -> DynamicImage {
    let buffer = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8])
    });
    DynamicImage::ImageRgb8(buffer)
}

/// Write an image, creating parent directories; format follows the extension
pub fn write_image(path: impl Into<PathBuf>, width: u32, height: u32) -> PathBuf {
    let path = path.into();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create fixture dir");
    }
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    let format = match extension.as_deref() {
        Some("png") => ImageFormat::Png,
        Some("jpg" | "jpeg") => ImageFormat::Jpeg,
        // DNG is a TIFF container
        Some("dng") => ImageFormat::Tiff,
        other => panic!("unsupported fixture extension {other:?}"),
    };
    gradient_image(width, height)
        .save_with_format(&path, format)
        .expect("failed to write image to disk");
    path
}

/// Write a `width`x`height` JPEG tagged with EXIF orientation 6 (rotate 90° clockwise)
pub fn write_rotated_jpeg(path: impl Into<PathBuf>, width: u32, height: u32) -> PathBuf {
    let path = path.into();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create fixture dir");
    }
    let mut jpeg = Vec::new();
    gradient_image(width, height)
        .write_to(&mut std::io::Cursor::new(&mut jpeg), ImageFormat::Jpeg)
        .expect("encode fixture");

    // APP1 with a big-endian TIFF header and one IFD entry: Orientation = 6
    let mut app1: Vec<u8> = vec![0xFF, 0xE1, 0x00, 0x22];
    app1.extend_from_slice(b"Exif\0\0");
    app1.extend_from_slice(&[b'M', b'M', 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08]);
    app1.extend_from_slice(&[0x00, 0x01]);
    app1.extend_from_slice(&[
        0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x06, 0x00, 0x00,
    ]);
    app1.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

    let mut tagged = jpeg[..2].to_vec();
    tagged.extend_from_slice(&app1);
    tagged.extend_from_slice(&jpeg[2..]);
    fs::write(&path, tagged).expect("write fixture");
    path
}

/// Every directory below `root`, relative to it
pub fn relative_dirs(root: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
        .collect();
    dirs.sort();
    dirs
}

/// Every file below `root`, relative to it
pub fn relative_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
        .collect();
    files.sort();
    files
}

/// Keeps every event for later inspection
#[derive(Default)]
pub struct CollectingReporter {
    pub events: Mutex<Vec<RunEvent>>,
}

impl CollectingReporter {
    pub fn take(&self) -> Vec<RunEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl ProgressReporter for CollectingReporter {
    fn report(&self, event: RunEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// Persisting captured and print-ready frames

use chrono::{DateTime, Local};
use image::{DynamicImage, RgbaImage};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::StorageError;
use crate::print_layout::PrintLayout;

pub struct FrameStore {
    capture_dir: PathBuf,
    print_dir: PathBuf,
    layout: PrintLayout,
}

/// `YYYYMMDD-HHMMSS-ffffff.jpeg`
pub fn timestamped_name(at: DateTime<Local>) -> String {
    format!("{}.jpeg", at.format("%Y%m%d-%H%M%S-%6f"))
}

impl FrameStore {
    pub fn new(capture_dir: PathBuf, print_dir: PathBuf, layout: PrintLayout) -> Self {
        FrameStore {
            capture_dir,
            print_dir,
            layout,
        }
    }

    /// Creates both output directories if they are missing.
    pub fn prepare(&self) -> Result<(), StorageError> {
        for dir in [&self.capture_dir, &self.print_dir] {
            std::fs::create_dir_all(dir).map_err(|_| StorageError::CreateDirectoryFailed {
                path: dir.display().to_string(),
            })?;
        }
        Ok(())
    }

    pub fn save_capture(
        &self,
        frame: &RgbaImage,
        at: DateTime<Local>,
    ) -> Result<PathBuf, StorageError> {
        let path = self.capture_dir.join(timestamped_name(at));
        save_jpeg(&DynamicImage::ImageRgba8(frame.clone()), &path)?;
        info!("Saved capture {}", path.display());
        Ok(path)
    }

    /// Applies the print layout and writes the result to the print directory.
    pub fn save_for_printing(
        &self,
        frame: &RgbaImage,
        at: DateTime<Local>,
    ) -> Result<PathBuf, StorageError> {
        let photo = DynamicImage::ImageRgba8(frame.clone()).to_rgb8();
        let printable = self.layout.apply(&photo);

        let path = self.print_dir.join(timestamped_name(at));
        save_jpeg(&DynamicImage::ImageRgb8(printable), &path)?;
        info!("Saved print file {}", path.display());
        Ok(path)
    }
}

fn save_jpeg(image: &DynamicImage, path: &Path) -> Result<(), StorageError> {
    // JPEG carries no alpha channel
    image
        .to_rgb8()
        .save_with_format(path, image::ImageFormat::Jpeg)
        .map_err(|e| StorageError::ImageSaveFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::Rgba;
    use tempfile::TempDir;

    fn load_frame(path: &Path) -> RgbaImage {
        image::open(path).unwrap().to_rgba8()
    }

    fn store(dir: &TempDir) -> FrameStore {
        FrameStore::new(
            dir.path().join("captured_images"),
            dir.path().join("printed_images"),
            PrintLayout::default(),
        )
    }

    #[test]
    fn test_timestamped_name_format() {
        let at = Local
            .with_ymd_and_hms(2024, 5, 4, 23, 12, 48)
            .unwrap()
            + chrono::Duration::microseconds(1234);
        assert_eq!(timestamped_name(at), "20240504-231248-001234.jpeg");
    }

    #[test]
    fn test_capture_then_print_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.prepare().unwrap();

        let frame = RgbaImage::from_pixel(640, 480, Rgba([200, 120, 40, 255]));
        let now = Local::now();
        let capture_path = store.save_capture(&frame, now).unwrap();
        assert!(capture_path.starts_with(dir.path().join("captured_images")));

        let reloaded = load_frame(&capture_path);
        assert_eq!(reloaded.dimensions(), (640, 480));

        let print_path = store.save_for_printing(&reloaded, now).unwrap();
        assert!(print_path.starts_with(dir.path().join("printed_images")));
        assert_eq!(
            print_path.file_name(),
            capture_path.file_name(),
        );

        let printed = load_frame(&print_path);
        let ratio = printed.width() as f32 / printed.height() as f32;
        assert!((ratio - 1.48).abs() < 0.01, "ratio was {}", ratio);
    }

    #[test]
    fn test_missing_directory_fails_to_save() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let frame = RgbaImage::new(4, 4);
        let result = store.save_capture(&frame, Local::now());
        assert!(matches!(result, Err(StorageError::ImageSaveFailed { .. })));
    }
}

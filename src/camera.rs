// Capture device: gphoto2 for stills, a v4l2loopback preview, and an
// overlay image the kiosk display draws on top of the preview.

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::CameraConfig;
use crate::errors::CameraError;

pub const MAIN_STREAM: &str = "main";

#[async_trait]
pub trait CaptureDevice: Send {
    async fn start(&mut self) -> Result<(), CameraError>;
    async fn stop(&mut self) -> Result<(), CameraError>;
    async fn close(&mut self) -> Result<(), CameraError>;
    /// Replaces the frame drawn on top of the live preview.
    fn set_overlay(&mut self, frame: &RgbaImage) -> Result<(), CameraError>;
    async fn capture_frame(&mut self, stream: &str) -> Result<RgbaImage, CameraError>;
}

pub struct GPhotoDevice {
    config: CameraConfig,
    scratch_dir: PathBuf,
    preview_process: Option<Child>,
}

impl GPhotoDevice {
    pub fn new(config: CameraConfig, scratch_dir: PathBuf) -> Self {
        GPhotoDevice {
            config,
            scratch_dir,
            preview_process: None,
        }
    }

    /// Kill any existing gphoto2 processes
    fn kill_gphoto_processes() {
        let _ = Command::new("pkill").args(["-f", "gphoto2"]).output();
    }

    async fn detect() -> Result<(), CameraError> {
        let output = tokio::process::Command::new("gphoto2")
            .arg("--auto-detect")
            .output()
            .await?;

        let output_str = String::from_utf8_lossy(&output.stdout);
        debug!("Camera detection output: {}", output_str);

        if !output_str.contains("usb:") {
            return Err(CameraError::DeviceNotFound(
                "ensure the camera is connected and turned on".to_string(),
            ));
        }
        Ok(())
    }

    fn spawn_preview(&mut self) -> Result<(), CameraError> {
        let device = &self.config.v4l2_loopback_device;
        info!("Starting gphoto2 preview stream to {}", device);

        let child = Command::new("bash")
            .args([
                "-c",
                &format!(
                    "gphoto2 --stdout --capture-movie | ffmpeg -i - -vcodec rawvideo -pix_fmt yuv420p -threads 0 -f v4l2 {}",
                    device
                ),
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| CameraError::StreamStartError(e.to_string()))?;

        self.preview_process = Some(child);
        Ok(())
    }

    fn kill_preview(&mut self) {
        if let Some(mut process) = self.preview_process.take() {
            info!("Killing preview process");
            let _ = process.kill();
            let _ = process.wait();
        }
        Self::kill_gphoto_processes();
    }

    async fn capture_to(&self, path: &Path) -> Result<RgbaImage, CameraError> {
        let output = tokio::process::Command::new("gphoto2")
            .arg("--capture-image-and-download")
            .arg("--filename")
            .arg(path)
            .arg("--force-overwrite")
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CameraError::CaptureError(stderr.trim().to_string()));
        }

        let image = image::open(path).map_err(|e| CameraError::CaptureError(e.to_string()))?;
        Ok(image.to_rgba8())
    }
}

#[async_trait]
impl CaptureDevice for GPhotoDevice {
    async fn start(&mut self) -> Result<(), CameraError> {
        info!("Initializing camera via USB...");
        Self::kill_gphoto_processes();
        tokio::time::sleep(Duration::from_millis(500)).await;

        Self::detect().await?;
        self.spawn_preview()?;
        // Give the pipeline a moment to open the loopback device
        tokio::time::sleep(Duration::from_secs(1)).await;

        info!("Camera preview started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CameraError> {
        info!("Stopping camera preview...");
        self.kill_preview();
        Ok(())
    }

    async fn close(&mut self) -> Result<(), CameraError> {
        self.kill_preview();
        if self.config.overlay_path.exists() {
            std::fs::remove_file(&self.config.overlay_path)?;
        }
        info!("Camera closed");
        Ok(())
    }

    fn set_overlay(&mut self, frame: &RgbaImage) -> Result<(), CameraError> {
        // Write next to the target and rename so the display never reads a
        // half-written file
        let target = &self.config.overlay_path;
        let staging = target.with_extension("tmp.png");
        frame
            .save_with_format(&staging, image::ImageFormat::Png)
            .map_err(|e| CameraError::OverlayError(e.to_string()))?;
        std::fs::rename(&staging, target)?;
        Ok(())
    }

    async fn capture_frame(&mut self, stream: &str) -> Result<RgbaImage, CameraError> {
        info!("Capturing still from {} stream", stream);

        // gphoto2 cannot capture while the movie stream holds the camera
        let was_streaming = self.preview_process.is_some();
        if was_streaming {
            self.kill_preview();
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        let path = self.scratch_dir.join("last_capture.jpg");
        let result = self.capture_to(&path).await;

        if was_streaming {
            if let Err(e) = self.spawn_preview() {
                warn!("Failed to restart preview after capture: {}", e);
            }
        }
        result
    }
}

impl Drop for GPhotoDevice {
    fn drop(&mut self) {
        if self.preview_process.is_some() {
            self.kill_preview();
        }
    }
}

// Stand-in camera for running the booth without hardware
pub struct MockDevice {
    width: u32,
    height: u32,
    overlays: usize,
}

impl MockDevice {
    pub fn new(width: u32, height: u32) -> Self {
        MockDevice {
            width,
            height,
            overlays: 0,
        }
    }
}

#[async_trait]
impl CaptureDevice for MockDevice {
    async fn start(&mut self) -> Result<(), CameraError> {
        info!("Mock camera started ({}x{})", self.width, self.height);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CameraError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), CameraError> {
        info!("Mock camera closed after {} overlays", self.overlays);
        Ok(())
    }

    fn set_overlay(&mut self, _frame: &RgbaImage) -> Result<(), CameraError> {
        self.overlays += 1;
        Ok(())
    }

    async fn capture_frame(&mut self, _stream: &str) -> Result<RgbaImage, CameraError> {
        Ok(RgbaImage::from_pixel(
            self.width,
            self.height,
            Rgba([128, 128, 128, 255]),
        ))
    }
}

pub fn new_device(config: &CameraConfig, scratch_dir: PathBuf) -> Box<dyn CaptureDevice> {
    if config.use_mock {
        warn!("Using mock camera");
        Box::new(MockDevice::new(config.screen_width, config.screen_height))
    } else {
        Box::new(GPhotoDevice::new(config.clone(), scratch_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_device_captures_screen_sized_frame() {
        let mut device = MockDevice::new(32, 18);
        device.start().await.unwrap();
        let frame = device.capture_frame(MAIN_STREAM).await.unwrap();
        assert_eq!(frame.dimensions(), (32, 18));
        device.set_overlay(&frame).unwrap();
        assert_eq!(device.overlays, 1);
    }

    #[test]
    fn test_gphoto_overlay_written_atomically() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = CameraConfig {
            screen_width: 8,
            screen_height: 4,
            v4l2_loopback_device: "/dev/null".to_string(),
            overlay_path: dir.path().join("overlay.png"),
            use_mock: false,
        };
        let mut device = GPhotoDevice::new(config.clone(), dir.path().to_path_buf());
        device
            .set_overlay(&RgbaImage::from_pixel(8, 4, Rgba([1, 2, 3, 255])))
            .unwrap();

        let written = image::open(&config.overlay_path).unwrap().to_rgba8();
        assert_eq!(written.get_pixel(0, 0), &Rgba([1, 2, 3, 255]));
        assert!(!config.overlay_path.with_extension("tmp.png").exists());
    }
}

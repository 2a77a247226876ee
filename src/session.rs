use chrono::{DateTime, Local};
use image::RgbaImage;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// The photo currently on screen, from capture until the booth returns to
/// idle.
#[derive(Debug)]
pub struct CaptureSession {
    pub id: Uuid,
    pub frame: RgbaImage,
    pub captured_at: DateTime<Local>,
    pub capture_path: PathBuf,
    /// Print-ready file, written on the first print and reused for copies.
    pub print_path: Option<PathBuf>,
    pub copies_printed: u32,
    waiting_since: Instant,
}

impl CaptureSession {
    /// Create a new session with a unique ID
    pub fn new(frame: RgbaImage, captured_at: DateTime<Local>, capture_path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            frame,
            captured_at,
            capture_path,
            print_path: None,
            copies_printed: 0,
            waiting_since: Instant::now(),
        }
    }

    /// Counts a finished print and restarts the idle timer.
    pub fn record_print(&mut self) {
        self.copies_printed += 1;
        self.waiting_since = Instant::now();
    }

    /// Time since capture or since the last finished print.
    pub fn idle_for(&self) -> Duration {
        self.waiting_since.elapsed()
    }

    pub fn copy_limit_reached(&self, max_copies: u32) -> bool {
        self.copies_printed >= max_copies
    }
}

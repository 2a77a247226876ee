// Recording fakes for driving the booth on a paused tokio clock

#![allow(dead_code)]

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;

use selphy_booth::camera::CaptureDevice;
use selphy_booth::errors::{CameraError, SpoolerError};
use selphy_booth::input::{InputSignals, InputSource, Signal};
use selphy_booth::render::{GuidePlacement, Renderer, TextStyle};
use selphy_booth::{BoothController, Config, JobRecord, PrintSpooler};

pub const SCREEN_WIDTH: u32 = 64;
pub const SCREEN_HEIGHT: u32 = 36;

/// Everything the fakes observed, stamped with time since the test began.
#[derive(Debug)]
pub struct Ledger {
    origin: Instant,
    pub overlays: Vec<Duration>,
    pub texts: Vec<(Duration, String)>,
    pub guides: Vec<(Duration, String)>,
    pub submissions: Vec<Duration>,
    pub enables: Vec<Duration>,
    pub cancels: usize,
    pub starts: usize,
    pub stops: usize,
    pub closes: usize,
}

impl Ledger {
    fn new() -> Self {
        Ledger {
            origin: Instant::now(),
            overlays: Vec::new(),
            texts: Vec::new(),
            guides: Vec::new(),
            submissions: Vec::new(),
            enables: Vec::new(),
            cancels: 0,
            starts: 0,
            stops: 0,
            closes: 0,
        }
    }

    pub fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    /// First time `text` was drawn.
    pub fn text_at(&self, text: &str) -> Option<Duration> {
        self.texts.iter().find(|(_, t)| t == text).map(|(at, _)| *at)
    }

    /// Every time a guide with this file name was drawn.
    pub fn guide_times(&self, file_name: &str) -> Vec<Duration> {
        self.guides
            .iter()
            .filter(|(_, name)| name == file_name)
            .map(|(at, _)| *at)
            .collect()
    }
}

pub type SharedLedger = Arc<Mutex<Ledger>>;

pub fn new_ledger() -> SharedLedger {
    Arc::new(Mutex::new(Ledger::new()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureBehaviour {
    Succeed,
    Fail,
    Panic,
}

pub struct FakeDevice {
    ledger: SharedLedger,
    capture: CaptureBehaviour,
}

#[async_trait]
impl CaptureDevice for FakeDevice {
    async fn start(&mut self) -> Result<(), CameraError> {
        self.ledger.lock().unwrap().starts += 1;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CameraError> {
        self.ledger.lock().unwrap().stops += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), CameraError> {
        self.ledger.lock().unwrap().closes += 1;
        Ok(())
    }

    fn set_overlay(&mut self, _frame: &RgbaImage) -> Result<(), CameraError> {
        let mut ledger = self.ledger.lock().unwrap();
        let at = ledger.now();
        ledger.overlays.push(at);
        Ok(())
    }

    async fn capture_frame(&mut self, _stream: &str) -> Result<RgbaImage, CameraError> {
        match self.capture {
            CaptureBehaviour::Succeed => {}
            CaptureBehaviour::Fail => {
                return Err(CameraError::CaptureError("lens cap on".to_string()));
            }
            CaptureBehaviour::Panic => panic!("camera driver crashed"),
        }
        Ok(RgbaImage::from_pixel(
            SCREEN_WIDTH,
            SCREEN_HEIGHT,
            Rgba([90, 120, 150, 255]),
        ))
    }
}

/// Delivers each scripted signal on the first poll at or after its time.
pub struct ScriptedInput {
    origin: Instant,
    events: VecDeque<(Duration, Signal)>,
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> InputSignals {
        let elapsed = self.origin.elapsed();
        let mut signals = InputSignals::default();
        while let Some((at, signal)) = self.events.front().copied() {
            if at > elapsed {
                break;
            }
            signals.record(signal);
            self.events.pop_front();
        }
        signals
    }
}

/// Alert code and queued flag reported for every submitted job, as a
/// function of time since the test began. `None` means the queue is empty.
pub type ListingScript = Arc<dyn Fn(Duration) -> Option<(&'static str, bool)> + Send + Sync>;

pub struct ScriptedSpooler {
    ledger: SharedLedger,
    listing: ListingScript,
}

impl ScriptedSpooler {
    pub fn new<F>(ledger: SharedLedger, listing: F) -> Self
    where
        F: Fn(Duration) -> Option<(&'static str, bool)> + Send + Sync + 'static,
    {
        ScriptedSpooler {
            ledger,
            listing: Arc::new(listing),
        }
    }
}

#[async_trait]
impl PrintSpooler for ScriptedSpooler {
    async fn submit(&self, _file: &Path) -> Result<String, SpoolerError> {
        let mut ledger = self.ledger.lock().unwrap();
        let at = ledger.now();
        ledger.submissions.push(at);
        Ok(ledger.submissions.len().to_string())
    }

    async fn query_status(&self) -> Result<Vec<JobRecord>, SpoolerError> {
        let ledger = self.ledger.lock().unwrap();
        let Some((alert_code, queued)) = (self.listing)(ledger.now()) else {
            return Ok(Vec::new());
        };

        Ok((1..=ledger.submissions.len())
            .map(|id| JobRecord {
                job_id: id.to_string(),
                status: "printing".to_string(),
                message: "Spooling job".to_string(),
                alert_code: alert_code.to_string(),
                queued: if queued {
                    vec!["queued for Canon_SELPHY_CP1500".to_string()]
                } else {
                    Vec::new()
                },
            })
            .collect())
    }

    async fn enable(&self, _printer_name: &str) -> Result<(), SpoolerError> {
        let mut ledger = self.ledger.lock().unwrap();
        let at = ledger.now();
        ledger.enables.push(at);
        Ok(())
    }

    async fn cancel_all(&self) -> Result<(), SpoolerError> {
        self.ledger.lock().unwrap().cancels += 1;
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "scripted"
    }
}

/// Records what would be drawn and returns the base frame unchanged.
pub struct RecordingRenderer {
    ledger: SharedLedger,
}

impl RecordingRenderer {
    pub fn new(ledger: SharedLedger) -> Self {
        RecordingRenderer { ledger }
    }
}

impl Renderer for RecordingRenderer {
    fn compose(&self, base: &RgbaImage, text: &str, _style: TextStyle) -> RgbaImage {
        let mut ledger = self.ledger.lock().unwrap();
        let at = ledger.now();
        ledger.texts.push((at, text.to_string()));
        base.clone()
    }

    fn compose_overlay_guide(
        &self,
        base: &RgbaImage,
        guide_path: &Path,
        _placement: GuidePlacement,
    ) -> RgbaImage {
        let name = guide_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut ledger = self.ledger.lock().unwrap();
        let at = ledger.now();
        ledger.guides.push((at, name));
        base.clone()
    }
}

pub struct TestBooth {
    pub controller: BoothController,
    pub ledger: SharedLedger,
    pub dir: TempDir,
}

impl TestBooth {
    pub fn capture_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("captured")
    }

    pub fn print_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("printed")
    }
}

pub struct BoothBuilder {
    env: HashMap<String, String>,
    script: Vec<(Duration, Signal)>,
    listing: ListingScript,
    capture: CaptureBehaviour,
}

impl BoothBuilder {
    pub fn new() -> Self {
        BoothBuilder {
            env: HashMap::new(),
            script: Vec::new(),
            listing: Arc::new(|_| None),
            capture: CaptureBehaviour::Succeed,
        }
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    /// Adds a signal delivered `secs` seconds into the test.
    pub fn signal(mut self, secs: f32, signal: Signal) -> Self {
        self.script.push((Duration::from_secs_f32(secs), signal));
        self
    }

    pub fn listing<F>(mut self, listing: F) -> Self
    where
        F: Fn(Duration) -> Option<(&'static str, bool)> + Send + Sync + 'static,
    {
        self.listing = Arc::new(listing);
        self
    }

    pub fn failing_capture(mut self) -> Self {
        self.capture = CaptureBehaviour::Fail;
        self
    }

    pub fn panicking_capture(mut self) -> Self {
        self.capture = CaptureBehaviour::Panic;
        self
    }

    pub fn build(self) -> TestBooth {
        let dir = TempDir::new().unwrap();
        let mut env = self.env;
        let defaults = [
            ("CAPTURE_DIR", dir.path().join("captured")),
            ("PRINT_DIR", dir.path().join("printed")),
            ("RESOURCES_PATH", dir.path().join("resources")),
            ("OVERLAY_PATH", dir.path().join("overlay.png")),
        ];
        for (key, path) in defaults {
            env.entry(key.to_string())
                .or_insert_with(|| path.to_string_lossy().into_owned());
        }
        env.entry("SCREEN_WIDTH".to_string())
            .or_insert_with(|| SCREEN_WIDTH.to_string());
        env.entry("SCREEN_HEIGHT".to_string())
            .or_insert_with(|| SCREEN_HEIGHT.to_string());

        let config = Config::from_lookup(|key| env.get(key).cloned()).unwrap();

        let ledger = new_ledger();
        let mut script = self.script;
        script.sort_by_key(|(at, _)| *at);

        let device = FakeDevice {
            ledger: ledger.clone(),
            capture: self.capture,
        };
        let input = ScriptedInput {
            origin: Instant::now(),
            events: script.into(),
        };
        let spooler = Arc::new(ScriptedSpooler {
            ledger: ledger.clone(),
            listing: self.listing,
        });
        let renderer = Arc::new(RecordingRenderer {
            ledger: ledger.clone(),
        });

        let controller = BoothController::new(
            &config,
            Box::new(device),
            Box::new(input),
            spooler,
            renderer,
        );

        TestBooth {
            controller,
            ledger,
            dir,
        }
    }
}

pub fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

/// Asserts `actual` lies within 100ms after `expected`.
pub fn assert_near(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual <= expected + Duration::from_millis(100),
        "expected ~{:?}, got {:?}",
        expected,
        actual
    );
}

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub printer: PrinterConfig,
    pub camera: CameraConfig,
    pub storage: StorageConfig,
    pub booth: BoothConfig,
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrinterConfig {
    pub name: String,
    pub use_mock: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    pub screen_width: u32,
    pub screen_height: u32,
    pub v4l2_loopback_device: String,
    pub overlay_path: PathBuf,
    pub use_mock: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub capture_dir: PathBuf,
    pub print_dir: PathBuf,
    pub resources_path: PathBuf,
    pub resources_variant: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoothConfig {
    pub max_copies: u32,
    pub auto_exit_timeout: Duration,
    pub tick_interval: Duration,
    pub countdown_digit: Duration,
    pub flash_duration: Duration,
    pub print_display_duration: Duration,
    pub frame_interval: Duration,
    pub print_done_hold: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub enable_interval: Duration,
    pub escalation_after: Duration,
    pub contact_message: String,
}

impl Default for BoothConfig {
    fn default() -> Self {
        Self {
            max_copies: 8,
            auto_exit_timeout: Duration::from_secs(120),
            tick_interval: Duration::from_millis(50),
            countdown_digit: Duration::from_secs(1),
            flash_duration: Duration::from_millis(200),
            print_display_duration: Duration::from_secs(40),
            frame_interval: Duration::from_millis(100),
            print_done_hold: Duration::from_secs(1),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            enable_interval: Duration::from_secs(10),
            escalation_after: Duration::from_secs(20),
            contact_message: "Please contact the booth attendant".to_string(),
        }
    }
}

impl CameraConfig {
    /// Width of each opaque side bar that frames the square capture area.
    pub fn side_bar_width(&self) -> u32 {
        (self.screen_width - self.screen_height) / 2
    }
}

impl StorageConfig {
    fn variant_dir(&self) -> PathBuf {
        self.resources_path.join(&self.resources_variant)
    }

    pub fn capture_guide(&self) -> PathBuf {
        self.variant_dir().join("capture.png")
    }

    pub fn print_or_back_guide(&self) -> PathBuf {
        self.variant_dir().join("print_or_back.png")
    }

    pub fn full_guide(&self) -> PathBuf {
        self.variant_dir().join("guide.png")
    }

    pub fn font_path(&self) -> PathBuf {
        self.resources_path.join("Montserrat-Bold.ttf")
    }

    pub fn scissors_path(&self) -> PathBuf {
        self.resources_path.join("scissors_and_arrow.png")
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup, falling back to
    /// defaults for every missing key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let printer = PrinterConfig {
            name: var("PRINTER_NAME", "Canon_SELPHY_CP1500"),
            use_mock: parse_flag(&lookup, "USE_MOCK_PRINTER"),
        };

        let camera = CameraConfig {
            screen_width: parse_number(&lookup, "SCREEN_WIDTH", 1920)?,
            screen_height: parse_number(&lookup, "SCREEN_HEIGHT", 1080)?,
            v4l2_loopback_device: var("V4L2_LOOPBACK_DEVICE", "/dev/video0"),
            overlay_path: var("OVERLAY_PATH", "/tmp/booth_overlay.png").into(),
            use_mock: parse_flag(&lookup, "USE_MOCK_CAMERA"),
        };

        let storage = StorageConfig {
            capture_dir: var("CAPTURE_DIR", "captured_images").into(),
            print_dir: var("PRINT_DIR", "printed_images").into(),
            resources_path: var("RESOURCES_PATH", "resources").into(),
            resources_variant: var("RESOURCES_VARIANT", "variant2"),
        };

        let booth = BoothConfig {
            max_copies: parse_number(&lookup, "MAX_COPIES", 8)?,
            auto_exit_timeout: Duration::from_secs(parse_number(
                &lookup,
                "AUTO_EXIT_TIMEOUT_SECS",
                120,
            )?),
            ..Default::default()
        };

        let defaults = MonitorConfig::default();
        let monitor = MonitorConfig {
            poll_interval: Duration::from_millis(parse_number(&lookup, "POLL_INTERVAL_MS", 500)?),
            contact_message: lookup("CONTACT_MESSAGE").unwrap_or(defaults.contact_message),
            ..defaults
        };

        let config = Config {
            printer,
            camera,
            storage,
            booth,
            monitor,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let (width, height) = (self.camera.screen_width, self.camera.screen_height);
        // The capture square and both guide bars need a landscape screen
        if width == 0 || height == 0 || width <= height {
            return Err(ConfigError::InvalidScreenSize { width, height });
        }

        if self.booth.max_copies == 0 {
            return Err(ConfigError::InvalidMaxCopies);
        }

        if self.monitor.poll_interval.is_zero() {
            return Err(ConfigError::InvalidPollInterval);
        }

        Ok(())
    }
}

fn parse_flag<F>(lookup: &F, key: &'static str) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|value| value.parse().ok())
        .unwrap_or(false)
}

fn parse_number<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

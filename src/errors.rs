use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Spooler error: {0}")]
    Spooler(#[from] SpoolerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("No camera detected: {0}")]
    DeviceNotFound(String),

    #[error("Failed to start preview: {0}")]
    StreamStartError(String),

    #[error("Failed to capture frame: {0}")]
    CaptureError(String),

    #[error("Failed to display overlay: {0}")]
    OverlayError(String),

    #[error("Camera I/O error: {0}")]
    IoError(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum SpoolerError {
    #[error("Failed to run `{command}`: {source}")]
    CommandFailed {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Print submission rejected: {0}")]
    SubmitFailed(String),

    #[error("No request id in lp output: {0:?}")]
    MissingJobId(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Invalid screen size {width}x{height}")]
    InvalidScreenSize { width: u32, height: u32 },

    #[error("max_copies must be at least 1")]
    InvalidMaxCopies,

    #[error("Poll interval must be non-zero")]
    InvalidPollInterval,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create directory: {path}")]
    CreateDirectoryFailed { path: String },

    #[error("Failed to save image {path}: {reason}")]
    ImageSaveFailed { path: String, reason: String },
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Short tag used as a structured logging field.
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Camera(_) => "camera_error",
            AppError::Spooler(_) => "spooler_error",
            AppError::Config(_) => "config_error",
            AppError::Storage(_) => "storage_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_error_display() {
        let err = CameraError::DeviceNotFound("no usb port".to_string());
        assert_eq!(err.to_string(), "No camera detected: no usb port");
    }

    #[test]
    fn test_spooler_error_wraps_into_app_error() {
        let err: AppError = SpoolerError::SubmitFailed("lp: printer busy".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Spooler error: Print submission rejected: lp: printer busy"
        );
        assert_eq!(err.error_type(), "spooler_error");
    }

    #[test]
    fn test_command_failed_names_command() {
        let err = SpoolerError::CommandFailed {
            command: "lpstat -l -o".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().starts_with("Failed to run `lpstat -l -o`"));
    }
}

// Library module organization

pub mod booth;
pub mod camera;
pub mod config;
pub mod errors;
pub mod input;
pub mod monitor;
pub mod print_layout;
pub mod render;
pub mod session;
pub mod spooler;
pub mod storage;
pub mod terminal;
pub mod timeline;

// Re-export commonly used types for convenience
pub use booth::{BoothController, BoothState};
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use monitor::{JobOutcome, PrintJobMonitor, StatusDisplay};
pub use spooler::{AlertSeverity, JobRecord, PrintSpooler};

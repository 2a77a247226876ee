// Print spooler access through the CUPS command-line tools

pub mod lpstat;

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::SpoolerError;
pub use lpstat::{classify_alert, AlertSeverity, JobListingParser, JobRecord};

#[async_trait]
pub trait PrintSpooler: Send + Sync {
    /// Queues `file` and returns the spooler's job number.
    async fn submit(&self, file: &Path) -> Result<String, SpoolerError>;
    /// Lists every job the spooler still knows about.
    async fn query_status(&self) -> Result<Vec<JobRecord>, SpoolerError>;
    async fn enable(&self, printer_name: &str) -> Result<(), SpoolerError>;
    async fn cancel_all(&self) -> Result<(), SpoolerError>;
    fn type_name(&self) -> &'static str;
}

pub struct CupsSpooler {
    printer_name: String,
    listing: JobListingParser,
}

impl CupsSpooler {
    pub fn new(printer_name: &str) -> Self {
        CupsSpooler {
            printer_name: printer_name.to_string(),
            listing: JobListingParser::new(printer_name),
        }
    }

    async fn run(program: &str, args: &[&str]) -> Result<std::process::Output, SpoolerError> {
        let command = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        debug!("Running `{}`", command);

        Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|source| SpoolerError::CommandFailed { command, source })
    }
}

#[async_trait]
impl PrintSpooler for CupsSpooler {
    async fn submit(&self, file: &Path) -> Result<String, SpoolerError> {
        let file_arg = file.to_string_lossy();
        info!("Submitting {} to {}", file_arg, self.printer_name);

        let output = Self::run("lp", &[file_arg.as_ref()]).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SpoolerError::SubmitFailed(stderr.trim().to_string()));
        }

        let job_id = lpstat::parse_job_id(&stdout)
            .ok_or_else(|| SpoolerError::MissingJobId(stdout.to_string()))?;
        info!("Print job submitted with ID: {}", job_id);
        Ok(job_id)
    }

    async fn query_status(&self) -> Result<Vec<JobRecord>, SpoolerError> {
        let output = Self::run("lpstat", &["-l", "-o"]).await?;
        if !output.status.success() {
            // lpstat still prints whatever it managed to list
            warn!(
                "lpstat exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(self.listing.parse(&stdout))
    }

    async fn enable(&self, printer_name: &str) -> Result<(), SpoolerError> {
        let output = Self::run("sudo", &["cupsenable", printer_name]).await?;
        if !output.status.success() {
            warn!(
                "cupsenable {} exited with {}",
                printer_name, output.status
            );
        }
        Ok(())
    }

    async fn cancel_all(&self) -> Result<(), SpoolerError> {
        let output = Self::run("cancel", &["-a"]).await?;
        if !output.status.success() {
            debug!("cancel -a exited with {}", output.status);
        }
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "CUPS"
    }
}

// Spooler for dry runs without a printer attached: every job leaves the
// queue as soon as it is submitted.
pub struct MockSpooler {
    next_job: AtomicU32,
}

impl MockSpooler {
    pub fn new() -> Self {
        MockSpooler {
            next_job: AtomicU32::new(1),
        }
    }
}

impl Default for MockSpooler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrintSpooler for MockSpooler {
    async fn submit(&self, file: &Path) -> Result<String, SpoolerError> {
        let job_id = self.next_job.fetch_add(1, Ordering::SeqCst).to_string();
        info!("Mock spooler accepted {} as job {}", file.display(), job_id);
        Ok(job_id)
    }

    async fn query_status(&self) -> Result<Vec<JobRecord>, SpoolerError> {
        Ok(Vec::new())
    }

    async fn enable(&self, printer_name: &str) -> Result<(), SpoolerError> {
        debug!("Mock spooler enabling {}", printer_name);
        Ok(())
    }

    async fn cancel_all(&self) -> Result<(), SpoolerError> {
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "Mock"
    }
}

pub fn new_spooler(printer_name: &str, use_mock: bool) -> Arc<dyn PrintSpooler> {
    if use_mock {
        warn!("Using mock spooler, nothing will be printed");
        Arc::new(MockSpooler::new())
    } else {
        Arc::new(CupsSpooler::new(printer_name))
    }
}

//! Print job monitoring.
//!
//! After a job is submitted the monitor polls the spooler until the job
//! either finishes cleanly or leaves the queue. While it waits it keeps the
//! status on screen, periodically re-enables the printer (CUPS disables a
//! queue after some faults), and after a while asks the operator for help.
//! It never cancels a job on its own.

use image::{Rgba, RgbaImage};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::errors::AppResult;
use crate::render::{Renderer, TextStyle};
use crate::spooler::{AlertSeverity, JobRecord, PrintSpooler};

const BENIGN_COLOR: Rgba<u8> = Rgba([20, 255, 20, 255]);
const ACTIONABLE_COLOR: Rgba<u8> = Rgba([255, 20, 20, 255]);
const CONTACT_COLOR: Rgba<u8> = Rgba([230, 230, 0, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    StillQueued,
    NotFound,
}

impl JobOutcome {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobOutcome::StillQueued)
    }
}

/// Result of a single spooler poll.
#[derive(Debug, Clone)]
pub struct PollReport {
    pub outcome: JobOutcome,
    pub record: Option<JobRecord>,
}

impl PollReport {
    /// Decides the outcome for `job_id` from a full spooler listing.
    pub fn from_listing(job_id: &str, listing: Vec<JobRecord>) -> Self {
        // A repeated id keeps the last block, as a later listing line wins
        let record = listing.into_iter().rev().find(|r| r.job_id == job_id);

        let outcome = match &record {
            None => JobOutcome::NotFound,
            Some(r) if r.severity() == AlertSeverity::Benign && !r.is_queued() => {
                JobOutcome::Completed
            }
            Some(_) => JobOutcome::StillQueued,
        };

        PollReport { outcome, record }
    }
}

/// Where the monitor draws its status: the caller supplies the frame to
/// draw on and receives the finished overlay.
pub trait StatusDisplay {
    fn backdrop(&mut self) -> RgbaImage;
    fn present(&mut self, frame: RgbaImage) -> AppResult<()>;
}

pub struct PrintJobMonitor {
    spooler: Arc<dyn PrintSpooler>,
    renderer: Arc<dyn Renderer>,
    printer_name: String,
    config: MonitorConfig,
}

impl PrintJobMonitor {
    pub fn new(
        spooler: Arc<dyn PrintSpooler>,
        renderer: Arc<dyn Renderer>,
        printer_name: &str,
        config: MonitorConfig,
    ) -> Self {
        PrintJobMonitor {
            spooler,
            renderer,
            printer_name: printer_name.to_string(),
            config,
        }
    }

    pub async fn poll(&self, job_id: &str) -> AppResult<PollReport> {
        let listing = self.spooler.query_status().await?;
        Ok(PollReport::from_listing(job_id, listing))
    }

    /// Blocks until `job_id` reaches a terminal outcome. There is no retry
    /// limit: a stuck job keeps the booth on the status screen until someone
    /// fixes the printer.
    pub async fn monitor(
        &self,
        job_id: &str,
        display: &mut dyn StatusDisplay,
    ) -> AppResult<JobOutcome> {
        let started = Instant::now();
        let mut last_enable_window = None;

        loop {
            let report = self.poll(job_id).await?;
            let Some(record) = &report.record else {
                info!(job_id, "Job left the queue");
                return Ok(JobOutcome::NotFound);
            };

            debug!(
                job_id,
                status = %record.status,
                alerts = %record.alert_code,
                queued = record.is_queued(),
                "Polled print job"
            );
            let mut frame = self.render_status(display.backdrop(), record);

            if report.outcome.is_terminal() {
                display.present(frame)?;
                info!(job_id, "Print job finished");
                return Ok(report.outcome);
            }

            let elapsed = started.elapsed();
            let window = elapsed.as_millis() / self.config.enable_interval.as_millis().max(1);
            if last_enable_window != Some(window) {
                last_enable_window = Some(window);
                self.reenable_printer().await;
            }

            if elapsed > self.config.escalation_after
                && record.severity() == AlertSeverity::Actionable
            {
                frame = self.renderer.compose(
                    &frame,
                    &self.config.contact_message,
                    TextStyle::new(40.0).color(CONTACT_COLOR).at(800),
                );
                self.hold_for_operator(job_id, record);
            }

            display.present(frame)?;
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    fn render_status(&self, backdrop: RgbaImage, record: &JobRecord) -> RgbaImage {
        let alert_color = match record.severity() {
            AlertSeverity::Benign => BENIGN_COLOR,
            AlertSeverity::Actionable => ACTIONABLE_COLOR,
        };

        let lines = [
            (format!("Status:{}", record.status), 600, Rgba([255, 255, 255, 255])),
            (format!("Message:{}", record.message), 640, Rgba([255, 255, 255, 255])),
            (format!("Alerts:{}", record.alert_code), 680, alert_color),
        ];

        lines.iter().fold(backdrop, |frame, (text, y, color)| {
            self.renderer
                .compose(&frame, text, TextStyle::new(25.0).color(*color).at(*y))
        })
    }

    async fn reenable_printer(&self) {
        if let Err(e) = self.spooler.enable(&self.printer_name).await {
            warn!("Re-enabling {} failed: {}", self.printer_name, e);
        }
    }

    /// A persistent fault is left for the operator to clear at the printer;
    /// the job stays queued and polling continues.
    fn hold_for_operator(&self, job_id: &str, record: &JobRecord) {
        warn!(
            job_id,
            alerts = %record.alert_code,
            "Print fault needs operator attention"
        );
    }
}

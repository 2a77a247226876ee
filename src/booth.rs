//! Booth control loop.
//!
//! `BoothController` owns the single authoritative [`BoothState`] and the
//! optional [`CaptureSession`]. Each tick samples the operator input, advances
//! the state machine and renders the next overlay. Countdown and printing
//! block the tick that entered them, so between ticks the booth is always
//! idle, previewing a capture, or waiting for a copy decision.

use chrono::Local;
use futures::FutureExt;
use image::{Rgba, RgbaImage};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::camera::{CaptureDevice, MAIN_STREAM};
use crate::config::{BoothConfig, Config};
use crate::errors::AppResult;
use crate::input::{InputSignals, InputSource};
use crate::monitor::{PrintJobMonitor, StatusDisplay};
use crate::print_layout::PrintLayout;
use crate::render::{self, GuidePlacement, GuideSide, Renderer, TextStyle, WHITE};
use crate::session::CaptureSession;
use crate::spooler::PrintSpooler;
use crate::storage::FrameStore;
use crate::timeline::{drift_corrected, PrintTimeline, COUNTDOWN_DIGITS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoothState {
    Idle,
    Countdown,
    Previewing,
    Printing,
    AwaitingCopyDecision,
}

#[derive(Debug, Clone, Copy)]
struct Screen {
    width: u32,
    height: u32,
    side_bar: u32,
}

impl Screen {
    fn blank_canvas(&self) -> RgbaImage {
        render::default_canvas(self.width, self.height, self.side_bar)
    }

    /// The captured photo scaled to the screen with the side bars blacked out.
    fn photo_backdrop(&self, photo: &RgbaImage) -> RgbaImage {
        let mut frame = render::fit_to_screen(photo, self.width, self.height);
        render::blacken_borders(&mut frame, self.side_bar);
        frame
    }
}

#[derive(Debug, Clone)]
struct Guides {
    capture: PathBuf,
    print_or_back: PathBuf,
    full: PathBuf,
}

pub struct BoothController {
    config: BoothConfig,
    printer_name: String,
    screen: Screen,
    guides: Guides,
    device: Box<dyn CaptureDevice>,
    input: Box<dyn InputSource>,
    spooler: Arc<dyn PrintSpooler>,
    renderer: Arc<dyn Renderer>,
    monitor: PrintJobMonitor,
    store: FrameStore,
    timeline: PrintTimeline,
    state: BoothState,
    session: Option<CaptureSession>,
    quit_pending: bool,
    shut_down: bool,
}

impl BoothController {
    pub fn new(
        config: &Config,
        device: Box<dyn CaptureDevice>,
        input: Box<dyn InputSource>,
        spooler: Arc<dyn PrintSpooler>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        let monitor = PrintJobMonitor::new(
            spooler.clone(),
            renderer.clone(),
            &config.printer.name,
            config.monitor.clone(),
        );
        let layout = PrintLayout::default().with_scissors(config.storage.scissors_path());
        let store = FrameStore::new(
            config.storage.capture_dir.clone(),
            config.storage.print_dir.clone(),
            layout,
        );

        BoothController {
            config: config.booth.clone(),
            printer_name: config.printer.name.clone(),
            screen: Screen {
                width: config.camera.screen_width,
                height: config.camera.screen_height,
                side_bar: config.camera.side_bar_width(),
            },
            guides: Guides {
                capture: config.storage.capture_guide(),
                print_or_back: config.storage.print_or_back_guide(),
                full: config.storage.full_guide(),
            },
            device,
            input,
            spooler,
            renderer,
            monitor,
            store,
            timeline: PrintTimeline::standard(config.booth.print_display_duration),
            state: BoothState::Idle,
            session: None,
            quit_pending: false,
            shut_down: false,
        }
    }

    pub fn state(&self) -> BoothState {
        self.state
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    /// Runs until quit is requested. Whatever ends the loop, including an
    /// error or a panic, outstanding print jobs are cancelled and the camera
    /// is released before this returns.
    pub async fn run(&mut self) -> AppResult<()> {
        let outcome = AssertUnwindSafe(self.run_loop()).catch_unwind().await;
        self.shutdown().await;

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Cancels every spooler job and releases the camera. Safe to call more
    /// than once; later calls do nothing.
    pub async fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        info!("Shutting down booth");

        if let Err(e) = self.spooler.cancel_all().await {
            warn!("Failed to cancel print jobs: {}", e);
        }
        if let Err(e) = self.device.stop().await {
            warn!("Failed to stop camera: {}", e);
        }
        if let Err(e) = self.device.close().await {
            warn!("Failed to close camera: {}", e);
        }
        self.session = None;
    }

    async fn run_loop(&mut self) -> AppResult<()> {
        self.store.prepare()?;
        self.device.start().await?;

        // Clear faults and stale jobs left over from a previous run
        if let Err(e) = self.spooler.enable(&self.printer_name).await {
            warn!("Failed to enable {}: {}", self.printer_name, e);
        }
        if let Err(e) = self.spooler.cancel_all().await {
            warn!("Failed to cancel stale jobs: {}", e);
        }

        self.enter_idle()?;
        info!("Booth ready");

        loop {
            let signals = self.input.poll();
            if signals.quit || self.quit_pending {
                info!("Quit requested");
                return Ok(());
            }

            self.step(signals).await?;
            tokio::time::sleep(self.config.tick_interval).await;
        }
    }

    async fn step(&mut self, signals: InputSignals) -> AppResult<()> {
        match self.state {
            BoothState::Idle => {
                if signals.capture && self.session.is_none() {
                    self.countdown().await?;
                    self.capture().await?;
                }
            }
            // Return outranks print when both land in the same tick
            BoothState::Previewing => {
                if signals.return_back {
                    self.enter_idle()?;
                } else if signals.print {
                    self.print().await?;
                }
            }
            BoothState::AwaitingCopyDecision => self.copy_decision(signals).await?,
            // Both finish inside the tick that entered them
            BoothState::Countdown | BoothState::Printing => {}
        }
        Ok(())
    }

    fn set_state(&mut self, next: BoothState) {
        if self.state != next {
            info!(from = ?self.state, to = ?next, "Booth state change");
            self.state = next;
        }
    }

    fn show(&mut self, frame: &RgbaImage) -> AppResult<()> {
        self.device.set_overlay(frame)?;
        Ok(())
    }

    fn enter_idle(&mut self) -> AppResult<()> {
        if let Some(session) = self.session.take() {
            info!(session = %session.id, copies = session.copies_printed, "Session cleared");
        }
        self.set_state(BoothState::Idle);

        let canvas = self.screen.blank_canvas();
        let frame = self.with_guides(&canvas, &self.guides.capture);
        self.show(&frame)
    }

    async fn countdown(&mut self) -> AppResult<()> {
        self.set_state(BoothState::Countdown);
        let canvas = self.screen.blank_canvas();
        let style = TextStyle::new(400.0)
            .color(Rgba([255, 255, 255, 100]))
            .shadow(Rgba([0, 0, 0, 50]));

        for digit in COUNTDOWN_DIGITS {
            let started = Instant::now();
            let frame = self.renderer.compose(&canvas, digit, style);
            self.show(&frame)?;
            tokio::time::sleep(drift_corrected(self.config.countdown_digit, started.elapsed()))
                .await;
        }

        let flash = RgbaImage::from_pixel(self.screen.width, self.screen.height, WHITE);
        self.show(&flash)?;
        tokio::time::sleep(self.config.flash_duration).await;
        Ok(())
    }

    async fn capture(&mut self) -> AppResult<()> {
        let frame = self.device.capture_frame(MAIN_STREAM).await?;
        let captured_at = Local::now();
        let capture_path = self.store.save_capture(&frame, captured_at)?;

        let session = CaptureSession::new(frame, captured_at, capture_path);
        info!(session = %session.id, "Photo captured");
        self.session = Some(session);

        self.enter_decision(BoothState::Previewing)
    }

    /// Shows the captured photo with the print-or-return guide.
    fn enter_decision(&mut self, state: BoothState) -> AppResult<()> {
        self.set_state(state);
        let base = match &self.session {
            Some(session) => self.screen.photo_backdrop(&session.frame),
            None => return self.enter_idle(),
        };
        let frame = self.with_guides(&base, &self.guides.print_or_back);
        self.show(&frame)
    }

    async fn copy_decision(&mut self, signals: InputSignals) -> AppResult<()> {
        let max_copies = self.config.max_copies;
        let can_print = self
            .session
            .as_ref()
            .is_some_and(|s| !s.copy_limit_reached(max_copies));

        if signals.print && can_print && !signals.return_back {
            self.print().await?;
        }

        let done = match &self.session {
            Some(session) => {
                signals.return_back
                    || session.idle_for() >= self.config.auto_exit_timeout
                    || session.copy_limit_reached(max_copies)
            }
            None => true,
        };
        if done {
            self.enter_idle()?;
        }
        Ok(())
    }

    async fn print(&mut self) -> AppResult<()> {
        self.set_state(BoothState::Printing);
        let Some(session) = self.session.as_mut() else {
            return self.enter_idle();
        };

        let print_path = match session.print_path.clone() {
            Some(path) => path,
            None => {
                let path = self.store.save_for_printing(&session.frame, Local::now())?;
                session.print_path = Some(path.clone());
                path
            }
        };
        let backdrop = self.screen.photo_backdrop(&session.frame);
        let session_id = session.id;

        let first = self
            .renderer
            .compose(&backdrop, "PRINTING!", TextStyle::new(100.0));
        self.show(&first)?;

        let job_id = self.spooler.submit(&print_path).await?;
        info!(session = %session_id, job_id = %job_id, "Print submitted");

        let mut display = PrintingDisplay {
            device: self.device.as_mut(),
            renderer: self.renderer.as_ref(),
            timeline: &self.timeline,
            backdrop: &backdrop,
            started: Instant::now(),
        };
        let outcome = self.monitor.monitor(&job_id, &mut display).await?;
        info!(job_id = %job_id, outcome = ?outcome, "Print job settled");

        // The progress display always runs to its end
        loop {
            let elapsed = display.started.elapsed();
            if self.timeline.is_finished(elapsed) {
                break;
            }
            let frame = display.backdrop();
            display.present(frame)?;
            let left = self.timeline.remaining(elapsed);
            tokio::time::sleep(self.config.frame_interval.min(left)).await;
        }

        let done = self
            .renderer
            .compose(&backdrop, "PRINT DONE!", TextStyle::new(100.0));
        self.show(&done)?;
        tokio::time::sleep(self.config.print_done_hold).await;

        if let Some(session) = self.session.as_mut() {
            session.record_print();
        }
        // Keys pressed while printing are not meant for the copy decision
        self.quit_pending |= self.input.discard_pending().quit;
        self.enter_decision(BoothState::AwaitingCopyDecision)
    }

    /// Puts `guide` in the left bar and the full instructions in the right.
    fn with_guides(&self, base: &RgbaImage, guide: &Path) -> RgbaImage {
        let (height, bar) = (self.screen.height, self.screen.side_bar);
        let frame = self.renderer.compose_overlay_guide(
            base,
            guide,
            GuidePlacement::centered(height, bar, GuideSide::Left),
        );
        self.renderer.compose_overlay_guide(
            &frame,
            &self.guides.full,
            GuidePlacement::centered(height, bar, GuideSide::Right),
        )
    }
}

/// Draws the print progress timeline and hands finished frames to the
/// camera overlay. The job monitor draws its status lines on top.
struct PrintingDisplay<'a> {
    device: &'a mut dyn CaptureDevice,
    renderer: &'a dyn Renderer,
    timeline: &'a PrintTimeline,
    backdrop: &'a RgbaImage,
    started: Instant,
}

impl StatusDisplay for PrintingDisplay<'_> {
    fn backdrop(&mut self) -> RgbaImage {
        let elapsed: Duration = self.started.elapsed();
        let stage = self.timeline.stage_at(elapsed);

        let frame = self.renderer.compose(
            self.backdrop,
            "PRINTING!",
            TextStyle::new(100.0).color(stage.color),
        );
        self.renderer.compose(
            &frame,
            &self.timeline.remaining_text(elapsed),
            TextStyle::new(40.0).color(stage.color).at(520),
        )
    }

    fn present(&mut self, frame: RgbaImage) -> AppResult<()> {
        self.device.set_overlay(&frame)?;
        Ok(())
    }
}

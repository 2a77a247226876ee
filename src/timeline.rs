// Timing helpers shared by the countdown and the print progress display

use image::Rgba;
use std::time::Duration;

pub const COUNTDOWN_DIGITS: [&str; 3] = ["3", "2", "1"];

/// Time left in a fixed slot once `render_cost` of it has been spent.
pub fn drift_corrected(slot: Duration, render_cost: Duration) -> Duration {
    slot.saturating_sub(render_cost)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub starts_at: Duration,
    pub color: Rgba<u8>,
    pub label: &'static str,
}

/// Fixed progress display for one print. It simulates the dye passes and
/// never reads real printer progress.
#[derive(Debug, Clone)]
pub struct PrintTimeline {
    stages: Vec<Stage>,
    total: Duration,
}

impl PrintTimeline {
    /// Yellow, magenta, cyan and the protective coat, each a quarter of
    /// `total` (10s each for the usual 40s).
    pub fn standard(total: Duration) -> Self {
        let passes = [
            (Rgba([255, 255, 0, 255]), "Yellow!"),
            (Rgba([255, 0, 255, 255]), "Magenta!"),
            (Rgba([0, 255, 255, 255]), "Cyan!"),
            (Rgba([255, 255, 255, 255]), "Final touches :)"),
        ];
        let count = passes.len() as u32;
        let stages = passes
            .into_iter()
            .enumerate()
            .map(|(i, (color, label))| Stage {
                starts_at: total * i as u32 / count,
                color,
                label,
            })
            .collect();

        PrintTimeline { stages, total }
    }

    pub fn stage_at(&self, elapsed: Duration) -> &Stage {
        self.stages
            .iter()
            .rev()
            .find(|stage| elapsed >= stage.starts_at)
            .unwrap_or(&self.stages[0])
    }

    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.total.saturating_sub(elapsed)
    }

    pub fn is_finished(&self, elapsed: Duration) -> bool {
        elapsed >= self.total
    }

    pub fn remaining_text(&self, elapsed: Duration) -> String {
        format!(
            "{:.1} s remaining ({})",
            self.remaining(elapsed).as_secs_f32(),
            self.stage_at(elapsed).label
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f32) -> Duration {
        Duration::from_secs_f32(s)
    }

    #[test]
    fn test_stage_boundaries() {
        let timeline = PrintTimeline::standard(Duration::from_secs(40));
        assert_eq!(timeline.stage_at(secs(0.0)).label, "Yellow!");
        assert_eq!(timeline.stage_at(secs(9.9)).label, "Yellow!");
        assert_eq!(timeline.stage_at(secs(10.0)).label, "Magenta!");
        assert_eq!(timeline.stage_at(secs(25.0)).label, "Cyan!");
        assert_eq!(timeline.stage_at(secs(30.0)).label, "Final touches :)");
        assert_eq!(timeline.stage_at(secs(40.0)).label, "Final touches :)");
        assert_eq!(timeline.stage_at(secs(55.0)).label, "Final touches :)");
    }

    #[test]
    fn test_remaining_text_counts_down_to_zero() {
        let timeline = PrintTimeline::standard(Duration::from_secs(40));
        assert_eq!(
            timeline.remaining_text(Duration::from_millis(12_340)),
            "27.7 s remaining (Magenta!)"
        );
        assert_eq!(
            timeline.remaining_text(Duration::from_secs(41)),
            "0.0 s remaining (Final touches :))"
        );
        assert!(timeline.is_finished(Duration::from_secs(40)));
        assert!(!timeline.is_finished(secs(39.9)));
    }

    #[test]
    fn test_drift_correction_never_negative() {
        let slot = Duration::from_secs(1);
        assert_eq!(
            drift_corrected(slot, Duration::from_millis(150)),
            Duration::from_millis(850)
        );
        assert_eq!(drift_corrected(slot, Duration::from_secs(2)), Duration::ZERO);
    }
}

// Parsing of CUPS command output.
//
// `lp` and `lpstat -l -o` only speak human-readable text, so every field is
// matched best-effort: a field that does not match stays at its default
// instead of failing the whole parse.

use regex::Regex;
use std::sync::OnceLock;

/// Alert codes that mean the printer is working normally.
const BENIGN_ALERTS: [&str; 2] = ["job-printing", "none"];

pub const UNKNOWN_FIELD: &str = "unknown";

/// One block of `lpstat -l -o` output, i.e. one queued job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub job_id: String,
    pub status: String,
    pub message: String,
    pub alert_code: String,
    pub queued: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSeverity {
    Benign,
    Actionable,
}

impl JobRecord {
    pub fn severity(&self) -> AlertSeverity {
        classify_alert(&self.alert_code)
    }

    pub fn is_queued(&self) -> bool {
        !self.queued.is_empty()
    }
}

pub fn classify_alert(alert_code: &str) -> AlertSeverity {
    if BENIGN_ALERTS.contains(&alert_code) {
        AlertSeverity::Benign
    } else {
        AlertSeverity::Actionable
    }
}

fn request_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"request id.+-(\d+)\b").expect("valid request id regex"))
}

fn field_regexes() -> &'static (Regex, Regex, Regex) {
    static RE: OnceLock<(Regex, Regex, Regex)> = OnceLock::new();
    RE.get_or_init(|| {
        (
            Regex::new(r"Status: (.+)").expect("valid status regex"),
            Regex::new(r"Alerts: (.+)").expect("valid alerts regex"),
            Regex::new(r"(queued .+)").expect("valid queued regex"),
        )
    })
}

/// Extracts the job number from `lp` stdout, e.g.
/// `request id is Canon_SELPHY_CP1500-42 (1 file(s))` yields `"42"`.
///
/// When several request ids are printed the last one wins.
pub fn parse_job_id(stdout: &str) -> Option<String> {
    request_id_regex()
        .captures_iter(stdout)
        .last()
        .map(|caps| caps[1].to_string())
}

/// Splits `lpstat -l -o` output into per-job records for one printer.
///
/// A block starts at `<printer_name>-` immediately followed by the job
/// number and runs until the next such prefix. Text before the first block
/// is ignored.
#[derive(Debug, Clone)]
pub struct JobListingParser {
    prefix_len: usize,
    delimiter: Regex,
}

impl JobListingParser {
    pub fn new(printer_name: &str) -> Self {
        let pattern = format!(r"{}-(\d)", regex::escape(printer_name));
        JobListingParser {
            prefix_len: printer_name.len() + 1,
            delimiter: Regex::new(&pattern).expect("escaped printer name is a valid pattern"),
        }
    }

    pub fn parse(&self, stdout: &str) -> Vec<JobRecord> {
        let text = stdout.trim();
        // Each block begins at the first digit of its job number
        let starts: Vec<usize> = self
            .delimiter
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).map(|m| m.start()))
            .collect();

        starts
            .iter()
            .enumerate()
            .map(|(i, &start)| {
                let end = starts
                    .get(i + 1)
                    .map(|&next| next - self.prefix_len)
                    .unwrap_or(text.len());
                parse_block(&text[start..end])
            })
            .collect()
    }
}

fn parse_block(block: &str) -> JobRecord {
    let (status_re, alerts_re, queued_re) = field_regexes();

    let job_id: String = block.chars().take_while(char::is_ascii_digit).collect();
    let first_match = |re: &Regex| {
        re.captures(block)
            .map(|caps| caps[1].trim_end().to_string())
            .unwrap_or_else(|| UNKNOWN_FIELD.to_string())
    };

    let message = block
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string();

    JobRecord {
        job_id,
        status: first_match(status_re),
        message,
        alert_code: first_match(alerts_re),
        queued: queued_re
            .captures_iter(block)
            .map(|caps| caps[1].trim_end().to_string())
            .collect(),
    }
}

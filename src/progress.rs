//! Progress and status notifications
//!
//! Two concerns live here:
//!
//! - [`parse_progress_line`] understands the percent lines external archivers
//!   print (`" 42% 3 - textures/a.dds"`), and nothing else.
//! - [`Notifier`] is the sink every backend reports through. It wraps a
//!   `tokio::sync::broadcast` channel, so sending never blocks the emitting
//!   worker and any number of extractions can report concurrently.

use crate::types::ExtractionEvent;
use tokio::sync::broadcast;

/// Default capacity of the notification channel
pub const DEFAULT_EVENT_BUFFER: usize = 1000;

/// Parse one line of archiver output into a fraction in `[0.0, 1.0]`
///
/// A progress line is at least four characters long, its fourth character is
/// `%`, and its first three characters (surrounding blanks allowed) parse as
/// an integer between 0 and 100. Everything else yields `None`.
pub fn parse_progress_line(line: &str) -> Option<f32> {
    let bytes = line.as_bytes();
    if bytes.len() < 4 || bytes[3] != b'%' {
        return None;
    }
    let digits = line.get(..3)?.trim();
    let percent: u8 = digits.parse().ok()?;
    if percent > 100 {
        return None;
    }
    Some(f32::from(percent) / 100.0)
}

/// Split a chunk of raw tool output into candidate progress lines
///
/// Archivers redraw their progress indicator in place using `\r` or runs of
/// backspace characters instead of newlines, so all three act as separators.
pub fn split_output_lines(chunk: &str) -> impl Iterator<Item = &str> {
    chunk
        .split(['\n', '\r', '\u{8}'])
        .filter(|line| !line.trim().is_empty())
}

/// Map a `(processed, total)` byte count onto the `[0.0, 1.0]` progress range
pub fn ratio(processed: u64, total: u64) -> f32 {
    if total == 0 {
        return 1.0;
    }
    (processed.min(total) as f64 / total as f64) as f32
}

/// Thread-safe sink for status and progress notifications
///
/// Cloning is cheap; all clones feed the same subscribers.
#[derive(Clone, Debug)]
pub struct Notifier {
    tx: broadcast::Sender<ExtractionEvent>,
}

impl Notifier {
    /// Create a notifier whose channel keeps up to `capacity` undelivered events
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Receive every event sent after this call
    pub fn subscribe(&self) -> broadcast::Receiver<ExtractionEvent> {
        self.tx.subscribe()
    }

    /// Report a status line
    pub fn status(&self, message: impl Into<String>) {
        self.emit(ExtractionEvent::Status {
            message: message.into(),
        });
    }

    /// Report progress; `percent` is clamped into `[0.0, 1.0]`
    pub fn progress(&self, message: impl Into<String>, percent: f32, persist: bool) {
        let percent = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 1.0)
        };
        self.emit(ExtractionEvent::Progress {
            message: message.into(),
            percent,
            persist,
        });
    }

    fn emit(&self, event: ExtractionEvent) {
        // No subscribers is fine; nobody asked to listen.
        let _ = self.tx.send(event);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

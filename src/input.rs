//! Operator input.
//!
//! The booth only understands four signals. Key events are read from the
//! terminal by a background task and drained once per control-loop tick.

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Capture,
    Print,
    Return,
    Quit,
}

/// Signals observed during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSignals {
    pub capture: bool,
    pub print: bool,
    pub return_back: bool,
    pub quit: bool,
}

impl InputSignals {
    pub fn record(&mut self, signal: Signal) {
        match signal {
            Signal::Capture => self.capture = true,
            Signal::Print => self.print = true,
            Signal::Return => self.return_back = true,
            Signal::Quit => self.quit = true,
        }
    }
}

pub trait InputSource: Send {
    fn poll(&mut self) -> InputSignals;

    /// Drops signals that arrived while the booth was not listening. A quit
    /// is never dropped; it comes back in the result.
    fn discard_pending(&mut self) -> InputSignals {
        InputSignals {
            quit: self.poll().quit,
            ..InputSignals::default()
        }
    }
}

/// Maps a key press to a booth signal.
///
/// - `c` / space: capture
/// - `p`: print
/// - `r` / backspace: return
/// - `q` / escape / Ctrl-C: quit
///
/// Enter is unbound. Releases and repeats are ignored.
pub fn signal_for_key(event: KeyEvent) -> Option<Signal> {
    if event.kind != KeyEventKind::Press {
        return None;
    }
    // Raw mode swallows SIGINT, so Ctrl-C arrives as a key
    if event.modifiers.contains(KeyModifiers::CONTROL) {
        return match event.code {
            KeyCode::Char('c') | KeyCode::Char('C') => Some(Signal::Quit),
            _ => None,
        };
    }

    match event.code {
        KeyCode::Char('c') | KeyCode::Char('C') | KeyCode::Char(' ') => Some(Signal::Capture),
        KeyCode::Char('p') | KeyCode::Char('P') => Some(Signal::Print),
        KeyCode::Char('r') | KeyCode::Char('R') | KeyCode::Backspace => Some(Signal::Return),
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(Signal::Quit),
        _ => None,
    }
}

/// Input source fed by a channel; the key reader and the shutdown signal
/// handler both push into it.
pub struct ChannelInput {
    rx: UnboundedReceiver<Signal>,
    tx: UnboundedSender<Signal>,
}

impl ChannelInput {
    pub fn new() -> Self {
        let (tx, rx) = unbounded_channel();
        ChannelInput { rx, tx }
    }

    /// Handle for injecting signals from elsewhere (e.g. Ctrl-C).
    pub fn sender(&self) -> UnboundedSender<Signal> {
        self.tx.clone()
    }

    /// Forwards terminal key presses into the channel until the terminal
    /// stream ends or the booth drops its receiver.
    pub fn spawn_key_reader(&self) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let mut events = EventStream::new();
            while let Some(event) = events.next().await {
                let key = match event {
                    Ok(Event::Key(key)) => key,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("Keyboard read failed: {}", e);
                        break;
                    }
                };
                if let Some(signal) = signal_for_key(key) {
                    debug!(key = ?key.code, ?signal, "Key pressed");
                    if tx.send(signal).is_err() {
                        break;
                    }
                }
            }
        });
    }
}

impl Default for ChannelInput {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for ChannelInput {
    fn poll(&mut self) -> InputSignals {
        let mut signals = InputSignals::default();
        while let Ok(signal) = self.rx.try_recv() {
            signals.record(signal);
        }
        signals
    }
}

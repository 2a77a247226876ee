//! Raw terminal mode for the operator keyboard.
//!
//! In raw mode keys arrive one at a time without waiting for Enter. The
//! guard restores the terminal on drop and from a panic hook, and throws
//! away keys typed but not yet read so they do not leak into the shell.

use crossterm::event;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io;
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

static RAW_MODE_ACTIVE: AtomicBool = AtomicBool::new(false);

pub struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    /// Fails when stdin is not a terminal, e.g. under a service manager.
    pub fn enter() -> io::Result<Self> {
        install_panic_hook();

        enable_raw_mode()?;
        RAW_MODE_ACTIVE.store(true, Ordering::SeqCst);
        debug!("Terminal switched to raw mode");

        Ok(RawModeGuard { active: true })
    }

    pub fn exit(&mut self) -> io::Result<()> {
        if self.active {
            self.active = false;
            restore_terminal()?;
        }
        Ok(())
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.active {
            let _ = restore_terminal();
        }
    }
}

fn restore_terminal() -> io::Result<()> {
    discard_pending_keys();
    RAW_MODE_ACTIVE.store(false, Ordering::SeqCst);
    disable_raw_mode()
}

fn discard_pending_keys() {
    while matches!(event::poll(Duration::ZERO), Ok(true)) {
        if event::read().is_err() {
            break;
        }
    }
}

fn install_panic_hook() {
    static HOOK_INSTALLED: AtomicBool = AtomicBool::new(false);
    if HOOK_INSTALLED.swap(true, Ordering::SeqCst) {
        return;
    }

    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // Leave raw mode first so the panic message prints normally
        if RAW_MODE_ACTIVE.swap(false, Ordering::SeqCst) {
            let _ = disable_raw_mode();
        }
        original_hook(panic_info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_restores_on_drop() {
        // Needs a real TTY; test runners usually have none
        match RawModeGuard::enter() {
            Ok(guard) => {
                assert!(RAW_MODE_ACTIVE.load(Ordering::SeqCst));
                drop(guard);
                assert!(!RAW_MODE_ACTIVE.load(Ordering::SeqCst));
            }
            Err(e) => eprintln!("Skipping raw mode test (no TTY): {}", e),
        }
    }

    #[test]
    fn test_manual_exit_makes_drop_a_no_op() {
        match RawModeGuard::enter() {
            Ok(mut guard) => {
                guard.exit().unwrap();
                assert!(!RAW_MODE_ACTIVE.load(Ordering::SeqCst));
                guard.exit().unwrap();
                drop(guard);
                assert!(!RAW_MODE_ACTIVE.load(Ordering::SeqCst));
            }
            Err(e) => eprintln!("Skipping raw mode test (no TTY): {}", e),
        }
    }

    #[test]
    fn test_panic_hook_installs_once() {
        install_panic_hook();
        install_panic_hook();
    }
}

//! Keyboard-driven zaps for trying out milestones without a bug zapper.

use anyhow::Result;
use chrono::Local;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;
use tracing::info;
use zapstreak::shutdown::{take_termination_request, Shutdown};
use zapstreak::terminal_restore::TerminalRestoreGuard;
use zapstreak::KillTracker;

/// Multi-kill window while testing by hand.
pub(crate) const TEST_MODE_MULTI_KILL_WINDOW_MS: u64 = 3_000;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Zap,
    Quit,
    Ignore,
}

fn classify_key(key: &KeyEvent) -> KeyAction {
    if key.kind != KeyEventKind::Press {
        return KeyAction::Ignore;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Quit,
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => KeyAction::Quit,
        _ => KeyAction::Zap,
    }
}

pub(crate) fn run(tracker: &KillTracker, shutdown: &Shutdown) -> Result<()> {
    println!("Test mode: press any key to register a zap; q, Esc or Ctrl-C quits.");
    let guard = TerminalRestoreGuard::new();
    guard.enable_raw_mode()?;

    while !shutdown.is_triggered() && !take_termination_request() {
        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        match classify_key(&key) {
            KeyAction::Quit => break,
            KeyAction::Ignore => {}
            KeyAction::Zap => {
                let outcome = tracker.register_detection(Local::now());
                info!(?outcome, "simulated zap");
            }
        }
    }

    guard.restore();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new_with_kind(code, modifiers, KeyEventKind::Press)
    }

    #[test]
    fn quit_keys_stop_test_mode() {
        assert_eq!(
            classify_key(&press(KeyCode::Char('q'), KeyModifiers::NONE)),
            KeyAction::Quit
        );
        assert_eq!(
            classify_key(&press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            KeyAction::Quit
        );
        assert_eq!(
            classify_key(&press(KeyCode::Esc, KeyModifiers::NONE)),
            KeyAction::Quit
        );
    }

    #[test]
    fn other_presses_are_zaps() {
        assert_eq!(
            classify_key(&press(KeyCode::Char(' '), KeyModifiers::NONE)),
            KeyAction::Zap
        );
        assert_eq!(
            classify_key(&press(KeyCode::Char('c'), KeyModifiers::NONE)),
            KeyAction::Zap
        );
    }

    #[test]
    fn releases_are_ignored() {
        let release =
            KeyEvent::new_with_kind(KeyCode::Char('z'), KeyModifiers::NONE, KeyEventKind::Release);
        assert_eq!(classify_key(&release), KeyAction::Ignore);
    }
}

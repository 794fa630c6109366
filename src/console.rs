//! Interactive console (component G) — grounded on
//! `examples/original_source/src/loop.c`'s `parse_user`, with raw-mode TTY
//! reading adapted from `termios`-style configuration (as seen in
//! `examples/gawd-ai-sctl/server/src/modem.rs`) to `crossterm`'s portable API,
//! since this crate has no PTY/serial precedent of its own to reuse directly.

use crossterm::event::{Event, KeyCode, KeyEventKind};
use crossterm::terminal;
use tokio::sync::mpsc;

use crate::mode::{FailureMode, SpawnMode};
use crate::signal::resolve_signal;
use crate::target::StatusFilter;

/// One fully-parsed console action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    SetMode(SpawnMode),
    ToggleFailureMode,
    ShowMode,
    ShowStatus(StatusFilter),
    Help,
    ToggleVerbose,
    ToggleDebug,
    /// `(signal, target)` — target may be a number or a name.
    Kill(i32, String),
    Invalid(char),
}

/// Drives the single-keystroke command grammar, including the `k` command's
/// two-step `[-SIG] target` line prompt.
#[derive(Default)]
pub struct Console {
    pending_kill: Option<String>,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_prompting(&self) -> bool {
        self.pending_kill.is_some()
    }

    /// Feed one character read from the controlling TTY.
    pub fn handle_char(&mut self, c: char) -> Option<ConsoleEvent> {
        if let Some(buf) = self.pending_kill.as_mut() {
            if c == '\n' || c == '\r' {
                let line = self.pending_kill.take().unwrap();
                return Some(parse_kill_line(&line));
            }
            buf.push(c);
            return None;
        }

        Some(match c {
            'h' | '?' => ConsoleEvent::Help,
            'q' | '\u{1b}' => ConsoleEvent::SetMode(SpawnMode::Quit),
            'Q' => ConsoleEvent::SetMode(SpawnMode::Abort),
            ' ' => ConsoleEvent::SetMode(SpawnMode::Pause),
            '1' => ConsoleEvent::SetMode(SpawnMode::One),
            '\n' | '-' => ConsoleEvent::SetMode(SpawnMode::Check),
            '+' => ConsoleEvent::SetMode(SpawnMode::More),
            'F' => ConsoleEvent::ToggleFailureMode,
            'S' => ConsoleEvent::ShowMode,
            'p' => ConsoleEvent::ShowStatus(StatusFilter::Pending),
            'r' => ConsoleEvent::ShowStatus(StatusFilter::Active),
            'f' => ConsoleEvent::ShowStatus(StatusFilter::Failed),
            'e' => ConsoleEvent::ShowStatus(StatusFilter::Error),
            's' => ConsoleEvent::ShowStatus(StatusFilter::Success),
            'a' => ConsoleEvent::ShowStatus(StatusFilter::All),
            'k' => {
                self.pending_kill = Some(String::new());
                return None;
            }
            'v' => ConsoleEvent::ToggleVerbose,
            'D' => ConsoleEvent::ToggleDebug,
            other => ConsoleEvent::Invalid(other),
        })
    }
}

/// Parse a `k` prompt line: optional leading `-SIG` (name or number),
/// followed by a target number or name. Defaults to SIGTERM when no signal
/// is given.
fn parse_kill_line(line: &str) -> ConsoleEvent {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix('-') {
        let mut parts = rest.splitn(2, char::is_whitespace);
        let sig_spec = parts.next().unwrap_or_default();
        let target = parts.next().unwrap_or_default().trim().to_string();
        match resolve_signal(sig_spec) {
            Some(sig) => ConsoleEvent::Kill(sig, target),
            None => ConsoleEvent::Invalid('k'),
        }
    } else {
        ConsoleEvent::Kill(libc::SIGTERM, line.to_string())
    }
}

pub fn failure_mode_after_toggle(current: FailureMode) -> FailureMode {
    current.toggle()
}

/// Guard that restores the terminal to cooked mode on drop, including on an
/// unwinding panic, so a crash never leaves the operator's shell unusable.
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn enable() -> std::io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Spawn the blocking reader task that forwards raw keystrokes from the
/// controlling TTY into the async engine via `tx`. Returns `None` if stdin is
/// not a terminal (no console to drive).
pub fn spawn_tty_reader(tx: mpsc::UnboundedSender<char>) -> Option<tokio::task::JoinHandle<()>> {
    use std::io::IsTerminal;
    if !std::io::stdin().is_terminal() {
        return None;
    }
    Some(tokio::task::spawn_blocking(move || loop {
        match crossterm::event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                let ch = match key.code {
                    KeyCode::Char(c) => Some(c),
                    KeyCode::Enter => Some('\n'),
                    KeyCode::Esc => Some('\u{1b}'),
                    _ => None,
                };
                if let Some(c) = ch {
                    if tx.send(c).is_err() {
                        break;
                    }
                }
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_mode_keys() {
        let mut c = Console::new();
        assert_eq!(c.handle_char('q'), Some(ConsoleEvent::SetMode(SpawnMode::Quit)));
        assert_eq!(c.handle_char('Q'), Some(ConsoleEvent::SetMode(SpawnMode::Abort)));
        assert_eq!(c.handle_char(' '), Some(ConsoleEvent::SetMode(SpawnMode::Pause)));
        assert_eq!(c.handle_char('+'), Some(ConsoleEvent::SetMode(SpawnMode::More)));
    }

    #[test]
    fn unknown_key_is_invalid() {
        let mut c = Console::new();
        assert_eq!(c.handle_char('z'), Some(ConsoleEvent::Invalid('z')));
    }

    #[test]
    fn kill_prompt_defaults_to_sigterm() {
        let mut c = Console::new();
        assert_eq!(c.handle_char('k'), None);
        assert!(c.is_prompting());
        assert_eq!(c.handle_char('h'), None);
        assert_eq!(c.handle_char('o'), None);
        assert_eq!(c.handle_char('s'), None);
        assert_eq!(c.handle_char('t'), None);
        assert_eq!(
            c.handle_char('\n'),
            Some(ConsoleEvent::Kill(libc::SIGTERM, "host".to_string()))
        );
        assert!(!c.is_prompting());
    }

    #[test]
    fn kill_prompt_with_explicit_signal() {
        let mut c = Console::new();
        c.handle_char('k');
        for ch in "-KILL 3".chars() {
            c.handle_char(ch);
        }
        assert_eq!(
            c.handle_char('\n'),
            Some(ConsoleEvent::Kill(libc::SIGKILL, "3".to_string()))
        );
    }
}

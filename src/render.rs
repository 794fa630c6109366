//! Terminal rendering (component M) — print primitives with message kinds,
//! styled via `crossterm` when stdout is a TTY and plain otherwise.

use std::io::{IsTerminal, Write};

use crossterm::style::Stylize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Status,
    Stdout,
    Stderr,
    StdoutTrunc,
    StderrTrunc,
    Info,
    Warn,
    Fatal,
}

pub struct Renderer {
    colored: bool,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self { colored: std::io::stdout().is_terminal() }
    }

    pub fn print(&self, target: &str, kind: MessageKind, text: &str) {
        let line = format!("{}: {}", target, text);
        let styled = if !self.colored {
            line
        } else {
            match kind {
                MessageKind::Fatal => line.red().bold().to_string(),
                MessageKind::Warn => line.yellow().to_string(),
                MessageKind::StdoutTrunc | MessageKind::StderrTrunc => line.magenta().to_string(),
                MessageKind::Stderr => line.red().to_string(),
                MessageKind::Status => line.cyan().to_string(),
                MessageKind::Info => line.grey().to_string(),
                MessageKind::Stdout => line,
            }
        };
        let mut out = std::io::stdout();
        let _ = writeln!(out, "{styled}");
    }

    pub fn print_plain(&self, text: &str) {
        println!("{text}");
    }

    /// Overwrite the current terminal line with `text` using a bare carriage
    /// return, the conventional single-line progress-bar idiom. A no-op when
    /// stdout is not a TTY (redirected output keeps the line out of the log).
    pub fn status_line(&self, text: &str) {
        if !self.colored {
            return;
        }
        let mut out = std::io::stdout();
        let _ = write!(out, "\r\x1b[2K{text}");
        let _ = out.flush();
    }
}

//! SIGINT escalation counter and signal-name resolution for the console's
//! `k` command. Grounded on `examples/original_source/src/loop.c`'s
//! `shmux_sigint` handler (increment-only, no I/O) and `parse_user`'s
//! `getsignumbyname`-style lookup.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// A signal-safe counter incremented once per SIGINT. The engine's control
/// loop reads and resets it each iteration; the task feeding it does no I/O
/// beyond `ctrl_c().await`, matching "the signal handler performs no I/O".
#[derive(Clone)]
pub struct SigintCounter(Arc<AtomicU8>);

impl SigintCounter {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(0)))
    }

    /// Spawn the task that watches for Ctrl-C and increments the counter.
    /// Returns immediately; the task runs for the engine's lifetime.
    pub fn spawn_watcher(&self) -> tokio::task::JoinHandle<()> {
        let counter = self.0.clone();
        tokio::spawn(async move {
            loop {
                if tokio::signal::ctrl_c().await.is_err() {
                    break;
                }
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
    }

    /// Read and clear the counter, returning how many SIGINTs arrived since
    /// the last check.
    pub fn take(&self) -> u8 {
        self.0.swap(0, Ordering::SeqCst)
    }
}

impl Default for SigintCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a signal name (case-insensitive, optional `SIG` prefix, e.g.
/// `"TERM"`, `"sigkill"`, `"9"`) to its numeric value. Unknown names return
/// `None`.
pub fn resolve_signal(spec: &str) -> Option<i32> {
    if let Ok(n) = spec.parse::<i32>() {
        return Some(n);
    }
    let upper = spec.to_ascii_uppercase();
    let name = upper.strip_prefix("SIG").unwrap_or(&upper);
    let n = match name {
        "HUP" => libc::SIGHUP,
        "INT" => libc::SIGINT,
        "QUIT" => libc::SIGQUIT,
        "KILL" => libc::SIGKILL,
        "TERM" => libc::SIGTERM,
        "USR1" => libc::SIGUSR1,
        "USR2" => libc::SIGUSR2,
        "ALRM" => libc::SIGALRM,
        "CONT" => libc::SIGCONT,
        "STOP" => libc::SIGSTOP,
        "TSTP" => libc::SIGTSTP,
        "PIPE" => libc::SIGPIPE,
        _ => return None,
    };
    Some(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_by_name_and_number() {
        assert_eq!(resolve_signal("TERM"), Some(libc::SIGTERM));
        assert_eq!(resolve_signal("sigkill"), Some(libc::SIGKILL));
        assert_eq!(resolve_signal("9"), Some(9));
        assert_eq!(resolve_signal("not-a-signal"), None);
    }

    #[test]
    fn counter_accumulates_and_resets() {
        let c = SigintCounter::new();
        assert_eq!(c.take(), 0);
        c.0.fetch_add(1, Ordering::SeqCst);
        c.0.fetch_add(1, Ordering::SeqCst);
        assert_eq!(c.take(), 2);
        assert_eq!(c.take(), 0);
    }
}

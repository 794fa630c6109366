//! Child slot & I/O table (component B).
//!
//! Grounded on `examples/gawd-ai-sctl/server/src/sessions/session.rs`'s
//! `ManagedSession` (per-session pid/buffer/status bookkeeping and the
//! graceful-kill two-stage escalation) reshaped into a fixed, index-owned
//! table of tagged states instead of a `HashMap` of `Arc<Mutex<_>>` entries —
//! the engine's single control loop is the only owner, so no interior
//! mutability is needed.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Instant;

use tokio::process::Child;

use crate::outputmode::OutputMode;

/// Whether the exec wrapper's execve-failure sentinel protocol is in play for
/// this child. Modeled for structural and demultiplexer-testing fidelity to
/// the reference tool even though this crate's [`crate::exec::spawn`] reports
/// spawn failures synchronously and so never organically drives a slot into
/// `MaybeFailed` (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Ok,
    MaybeFailed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutStep {
    None,
    TermSent,
    KillSent,
}

/// The lifecycle of one execution slot's running child, as a tagged state
/// rather than a union of optional fields.
pub enum SlotState {
    Idle,
    Running {
        child: Child,
        pgid: i32,
        deadline: Instant,
        exec_state: ExecState,
        timeout_step: TimeoutStep,
        stdout_open: bool,
        stderr_open: bool,
    },
    /// Child has exited; descriptors may still be draining.
    Draining {
        pgid: i32,
        saved_status: Option<ExitStatus>,
        died_on_alarm: bool,
        stdout_open: bool,
        stderr_open: bool,
    },
    /// Descriptors are closed but the process group still has members.
    OrphanWait {
        pgid: i32,
        saved_status: Option<ExitStatus>,
        since: Instant,
        last_diag: Instant,
    },
    /// Ready for the reaper to report a verdict and free the slot.
    Finalized { status: Option<ExitStatus> },
}

pub struct Slot {
    pub target_index: Option<usize>,
    pub is_test: bool,
    pub is_analyzer: bool,
    pub output_mode: OutputMode,
    pub stdout_path: Option<PathBuf>,
    pub stderr_path: Option<PathBuf>,
    /// Set once the test phase has consumed its one allowed sentinel line.
    pub test_line_seen: bool,
    /// First line observed was not the expected `SHMUX.` sentinel.
    pub test_failed: bool,
    pub state: SlotState,
}

impl Slot {
    pub fn idle() -> Self {
        Self {
            target_index: None,
            is_test: false,
            is_analyzer: false,
            output_mode: OutputMode::empty(),
            stdout_path: None,
            stderr_path: None,
            test_line_seen: false,
            test_failed: false,
            state: SlotState::Idle,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self.state, SlotState::Idle)
    }

    pub fn reset(&mut self) {
        *self = Slot::idle();
    }
}

//! Exec primitive (component I collaborator, section 6) — spawns a child as
//! its own process group leader so timeout escalation and orphan cleanup can
//! signal the whole group. Grounded on
//! `examples/gawd-ai-sctl/server/src/shell/process.rs`'s `spawn_shell_pgroup`.

use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::method::Invocation;

/// Spawn `invocation` as a process-group leader with piped stdout/stderr and
/// no stdin (the engine never writes to children).
///
/// A `Command::spawn()` failure here (program not found, permission denied)
/// is reported synchronously as `io::Error` by the underlying `posix_spawn`/
/// `fork+exec` path — Rust's standard library already solves the problem the
/// reference tool's `SHMUCK!`/`SIGTSTP` sentinel protocol exists for, so this
/// primitive surfaces that case as a plain `Result` rather than reproducing
/// the out-of-band signal dance. See DESIGN.md for the full rationale.
pub fn spawn(invocation: &Invocation) -> std::io::Result<Child> {
    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // SAFETY: setpgid(0, 0) is async-signal-safe and touches only this
    // about-to-be-exec'd child.
    unsafe {
        cmd.pre_exec(|| {
            if libc::setpgid(0, 0) == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    cmd.spawn()
}

/// Send `signal` to a child's entire process group.
pub fn signal_group(pgid: i32, signal: i32) -> std::io::Result<()> {
    // SAFETY: kill(2) with a negative pid targets the process group; no
    // memory is touched beyond the syscall's own arguments.
    let ret = unsafe { libc::kill(-pgid, signal) };
    if ret == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// `true` if the process group still has at least one living member.
pub fn group_alive(pgid: i32) -> bool {
    // SAFETY: kill(pid, 0) only probes existence/permission; no signal is sent.
    unsafe { libc::kill(-pgid, 0) == 0 }
}

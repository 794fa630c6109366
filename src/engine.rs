//! The engine: ties together the target registry (A), slot table (B),
//! readiness multiplexer (C), output demultiplexer (D), spawn controller (E),
//! timeout & reaper (F), interactive console (G), and FD budget (H) into the
//! single control loop described in section 5.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::analyzer::{Analyzer, AnalyzedStream};
use crate::config::EngineConfig;
use crate::console::{Console, ConsoleEvent, RawModeGuard};
use crate::events::{spawn_reader, EngineEvent};
use crate::exec;
use crate::fdlimit;
use crate::linebuf::LineEvent;
use crate::logging::LogHandle;
use crate::method::{self, Invocation};
use crate::mode::{FailureMode, SpawnMode};
use crate::outputmode::OutputMode;
use crate::ping;
use crate::render::{MessageKind, Renderer};
use crate::signal::SigintCounter;
use crate::slot::{ExecState, Slot, SlotState, TimeoutStep};
use crate::target::{Method, Registry, StatusFilter, Summary};
use crate::verdict::{Phase, Verdict};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const TIMEOUT_GRACE: Duration = Duration::from_secs(5);
const ORPHAN_DIAG_INTERVAL: Duration = Duration::from_secs(15);

pub struct Engine {
    config: EngineConfig,
    registry: Registry,
    slots: Vec<Slot>,
    spawn_mode: SpawnMode,
    failure_mode: FailureMode,
    analyzer: Option<Arc<dyn Analyzer>>,
    renderer: Renderer,
    log_handle: LogHandle,
    sigint: SigintCounter,
    console: Console,
    internal_messages: bool,
    tx: mpsc::UnboundedSender<EngineEvent>,
    rx: mpsc::UnboundedReceiver<EngineEvent>,
    start: Instant,
    has_tty: bool,
    ping_done: bool,
}

impl Engine {
    pub fn new(config: EngineConfig, log_handle: LogHandle) -> Self {
        let mut registry = Registry::new();
        for spec in &config.targets {
            registry.add(spec, config.default_method);
        }

        let n = config.max.max(1);
        let slots = (0..=n).map(|_| Slot::idle()).collect();

        let analyzer: Option<Arc<dyn Analyzer>> = if let Some(cmd) = &config.analyzer_command {
            Some(Arc::new(crate::analyzer::ExternalAnalyzer { command: cmd.clone() }))
        } else {
            config
                .analyzer_pattern
                .as_deref()
                .and_then(|p| crate::analyzer::RegexAnalyzer::new(p).ok())
                .map(|a| Arc::new(a) as Arc<dyn Analyzer>)
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let has_tty = std::io::IsTerminal::is_terminal(&std::io::stdin());

        let mut spawn_mode = config.initial_spawn_mode;
        if !has_tty && matches!(spawn_mode, SpawnMode::One | SpawnMode::Check) {
            spawn_mode = SpawnMode::More;
        }

        Self {
            failure_mode: config.failure_mode,
            spawn_mode,
            config,
            registry,
            slots,
            analyzer,
            renderer: Renderer::new(),
            log_handle,
            sigint: SigintCounter::new(),
            console: Console::new(),
            internal_messages: false,
            tx,
            rx,
            start: Instant::now(),
            has_tty,
            ping_done: false,
        }
    }

    pub async fn run(mut self) -> (Summary, i32) {
        let adjusted = fdlimit::adjust(self.config.max, self.config.output_dir.is_some());
        if adjusted != self.config.max {
            self.slots.truncate((adjusted + 1) as usize);
        }

        let _sigint_task = self.sigint.spawn_watcher();
        let (tty_tx, mut tty_rx) = mpsc::unbounded_channel();
        let _tty_task = crate::console::spawn_tty_reader(tty_tx);
        let _raw_guard = if self.has_tty { RawModeGuard::enable().ok() } else { None };

        self.bootstrap_ping();

        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                Some(c) = tty_rx.recv() => { self.handle_tty_char(c); }
            }

            if !self.config.quiet {
                self.refresh_status_line();
            }

            while let Ok(c) = tty_rx.try_recv() {
                self.handle_tty_char(c);
            }

            self.check_sigint();

            if !self.has_tty && self.spawn_mode == SpawnMode::Pause {
                self.spawn_mode = self.failure_mode.as_spawn_mode();
            }

            while let Ok(event) = self.rx.try_recv() {
                self.handle_event(event);
            }

            let mut done = true;
            self.reap_and_timeout_scan(&mut done);
            self.spawn_attempts(&mut done);

            if self.spawn_mode == SpawnMode::Fatal {
                break;
            }
            if done {
                break;
            }
        }

        if !self.config.quiet {
            self.renderer.print_plain("");
        }
        let summary = self.registry.results(self.start.elapsed().as_secs());
        self.print_summary(&summary);
        let code = self.exit_code(&summary);
        (summary, code)
    }

    fn bootstrap_ping(&mut self) {
        if !self.config.ping {
            for idx in 0..self.registry.len() {
                self.registry.start(idx, Phase::Pinged);
                self.registry.result(idx, true);
            }
            self.ping_done = true;
            return;
        }

        let hosts: Vec<String> = self.registry.iter().map(|t| t.name.clone()).collect();
        let invocation = ping::helper_invocation(&hosts);
        match exec::spawn(&invocation) {
            Ok(mut child) => {
                if let Some(out) = child.stdout.take() {
                    spawn_reader(0, AnalyzedStream::Stdout, out, self.tx.clone());
                }
                if let Some(err) = child.stderr.take() {
                    spawn_reader(0, AnalyzedStream::Stderr, err, self.tx.clone());
                }
                for idx in 0..self.registry.len() {
                    self.registry.start(idx, Phase::Pinged);
                }
                self.slots[0].state = SlotState::Running {
                    child,
                    pgid: 0,
                    deadline: Instant::now() + Duration::from_secs(60),
                    exec_state: ExecState::Ok,
                    timeout_step: TimeoutStep::None,
                    stdout_open: true,
                    stderr_open: true,
                };
            }
            Err(e) => {
                warn!(error = %e, "ping helper failed to spawn; treating all targets as reachable");
                for idx in 0..self.registry.len() {
                    self.registry.start(idx, Phase::Pinged);
                    self.registry.result(idx, true);
                }
            }
        }
    }

    fn handle_tty_char(&mut self, c: char) {
        let Some(event) = self.console.handle_char(c) else { return };
        match event {
            ConsoleEvent::SetMode(m) => {
                self.spawn_mode = m;
                info!(mode = m.label(), "spawn mode changed");
            }
            ConsoleEvent::ToggleFailureMode => {
                self.failure_mode = self.failure_mode.toggle();
                self.renderer.print_plain(&format!("failure-mode: {}", self.failure_mode.label()));
            }
            ConsoleEvent::ShowMode => {
                self.renderer.print_plain(&format!(
                    "spawn-mode: {} failure-mode: {}",
                    self.spawn_mode.label(),
                    self.failure_mode.label()
                ));
            }
            ConsoleEvent::ShowStatus(filter) => {
                for line in self.registry.status(filter) {
                    self.renderer.print_plain(&line);
                }
            }
            ConsoleEvent::Help => self.renderer.print_plain(HELP_TEXT),
            ConsoleEvent::ToggleVerbose => {
                self.internal_messages = self.log_handle.toggle_verbose();
            }
            ConsoleEvent::ToggleDebug => {
                self.log_handle.toggle_debug();
            }
            ConsoleEvent::Kill(sig, spec) => self.handle_kill(sig, &spec),
            ConsoleEvent::Invalid(c) => {
                self.renderer.print_plain(&format!("invalid command: {c:?} (press h for help)"));
            }
        }
    }

    /// Record a run/analyzer-phase verdict and apply the `CHECK`/`NONE`
    /// spawn-mode transitions that ride along with it: a clean result
    /// promotes `NONE` back to `CHECK`; any other result drops `NONE` or
    /// `CHECK` into the configured failure-mode. Grounded on
    /// `original_source/src/loop.c`'s `set_cmdstatus`, which wraps
    /// `target_cmdstatus` with exactly this transition and is the only
    /// caller of `target_cmdstatus` in the reference tool (test/ping-phase
    /// failures go through `target_result` directly and never touch
    /// spawn-mode).
    fn set_cmdstatus(&mut self, target_idx: usize, verdict: Verdict) {
        self.spawn_mode = cmdstatus_transition(self.spawn_mode, self.failure_mode, verdict);
        self.registry.cmdstatus(target_idx, verdict);
    }

    fn handle_kill(&mut self, sig: i32, spec: &str) {
        let target_idx = spec
            .parse::<usize>()
            .ok()
            .filter(|&i| i < self.registry.len())
            .or_else(|| self.registry.iter().position(|t| t.name == spec));
        let Some(target_idx) = target_idx else {
            self.renderer.print_plain(&format!("no such target: {spec}"));
            return;
        };
        for slot in &self.slots {
            if slot.target_index == Some(target_idx) {
                if let SlotState::Running { pgid, .. } = &slot.state {
                    if *pgid != 0 {
                        let _ = exec::signal_group(*pgid, sig);
                    }
                }
            }
        }
    }

    fn check_sigint(&mut self) {
        let n = self.sigint.take();
        for _ in 0..n {
            for slot in &self.slots {
                if let SlotState::Running { pgid, .. } = &slot.state {
                    if *pgid != 0 {
                        let _ = exec::signal_group(*pgid, libc::SIGINT);
                    }
                }
            }
            self.spawn_mode = match self.spawn_mode {
                SpawnMode::Abort => SpawnMode::Abort,
                SpawnMode::Quit => SpawnMode::Abort,
                _ => SpawnMode::Quit,
            };
        }
    }

    fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Output { slot, stream, item } => self.handle_output(slot, stream, item),
            EngineEvent::StreamEof { slot, stream } => {
                if let SlotState::Running { stdout_open, stderr_open, .. } = &mut self.slots[slot].state {
                    match stream {
                        AnalyzedStream::Stdout => *stdout_open = false,
                        AnalyzedStream::Stderr => *stderr_open = false,
                    }
                }
            }
        }
    }

    fn handle_output(&mut self, slot_idx: usize, stream: AnalyzedStream, item: LineEvent) {
        if slot_idx == 0 {
            self.handle_ping_output(item);
            return;
        }

        let line = match &item {
            LineEvent::Line(s) | LineEvent::Truncated(s) => s.clone(),
        };
        let truncated = matches!(item, LineEvent::Truncated(_));

        let exec_state = match &self.slots[slot_idx].state {
            SlotState::Running { exec_state, .. } => *exec_state,
            _ => ExecState::Ok,
        };

        if exec_state == ExecState::MaybeFailed && line == "SHMUCK!" {
            if let SlotState::Running { exec_state, .. } = &mut self.slots[slot_idx].state {
                *exec_state = ExecState::Failed;
            }
            self.emit(slot_idx, MessageKind::Fatal, "exec wrapper reported execve failure");
            return;
        }

        if self.slots[slot_idx].is_test {
            let first = !self.slots[slot_idx].test_line_seen;
            self.slots[slot_idx].test_line_seen = true;
            if !(first && stream == AnalyzedStream::Stdout && line == "SHMUX." && !truncated) {
                self.slots[slot_idx].test_failed = true;
            }
            return;
        }

        let mut became_error = false;
        if !truncated {
            if let Some(analyzer) = self.analyzer.clone() {
                if !analyzer.lnrun(stream, &line) {
                    became_error = true;
                }
            }
        } else if self.analyzer.is_some() {
            became_error = true;
        }

        if became_error {
            let mode = self.slots[slot_idx].output_mode;
            if mode.has(OutputMode::IFERR) && mode.has(OutputMode::MIXED) {
                self.replay_files(slot_idx);
            }
            self.slots[slot_idx].output_mode.clear(OutputMode::IFERR);
            self.slots[slot_idx].output_mode.set(OutputMode::ERR);
        }

        let mode = self.slots[slot_idx].output_mode;
        if mode.has(OutputMode::MIXED) && !mode.has(OutputMode::IFERR) {
            let kind = match (stream, truncated) {
                (AnalyzedStream::Stdout, false) => MessageKind::Stdout,
                (AnalyzedStream::Stderr, false) => MessageKind::Stderr,
                (AnalyzedStream::Stdout, true) => MessageKind::StdoutTrunc,
                (AnalyzedStream::Stderr, true) => MessageKind::StderrTrunc,
            };
            self.emit(slot_idx, kind, &line);
        }

        if mode.has(OutputMode::COPY) || mode.needs_file_buffering() {
            self.append_to_file(slot_idx, stream, &line);
        }
    }

    fn handle_ping_output(&mut self, item: LineEvent) {
        let line = match item {
            LineEvent::Line(s) | LineEvent::Truncated(s) => s,
        };
        match ping::parse_line(&line) {
            Some((host, alive)) => {
                if let Some(idx) = self.registry.iter().position(|t| t.name == host) {
                    self.registry.result(idx, alive);
                    if !alive {
                        self.renderer.print(host, MessageKind::Warn, "ping failed");
                    }
                }
            }
            None => debug!(line, "unparseable ping helper output (ignored)"),
        }
    }

    fn emit(&self, slot_idx: usize, kind: MessageKind, text: &str) {
        let name = self.slots[slot_idx]
            .target_index
            .map(|i| self.registry.get(i).name.clone())
            .unwrap_or_else(|| "?".to_string());
        self.renderer.print(&name, kind, text);
    }

    fn append_to_file(&self, slot_idx: usize, stream: AnalyzedStream, line: &str) {
        let path = match stream {
            AnalyzedStream::Stdout => &self.slots[slot_idx].stdout_path,
            AnalyzedStream::Stderr => &self.slots[slot_idx].stderr_path,
        };
        if let Some(path) = path {
            if let Ok(mut f) = OpenOptions::new().append(true).open(path) {
                let _ = writeln!(f, "{line}");
            }
        }
    }

    fn replay_files(&self, slot_idx: usize) {
        for (path, kind) in [
            (&self.slots[slot_idx].stdout_path, MessageKind::Stdout),
            (&self.slots[slot_idx].stderr_path, MessageKind::Stderr),
        ] {
            if let Some(path) = path {
                if let Ok(contents) = std::fs::read_to_string(path) {
                    for line in contents.lines() {
                        self.emit(slot_idx, kind, line);
                    }
                }
            }
        }
    }

    fn reap_and_timeout_scan(&mut self, done: &mut bool) {
        let now = Instant::now();
        for slot_idx in 0..self.slots.len() {
            if self.slots[slot_idx].is_free() {
                continue;
            }
            *done = false;

            let mut finalize_with: Option<Option<std::process::ExitStatus>> = None;

            match &mut self.slots[slot_idx].state {
                SlotState::Running { child, pgid, deadline, exec_state, timeout_step, stdout_open, stderr_open } => {
                    match child.try_wait() {
                        Ok(Some(status)) => {
                            let died_on_alarm = status.signal() == Some(libc::SIGALRM);
                            if died_on_alarm {
                                let _ = exec::signal_group(*pgid, libc::SIGALRM);
                            }
                            let stdout_open = *stdout_open;
                            let stderr_open = *stderr_open;
                            if stdout_open || stderr_open {
                                self.slots[slot_idx].state = SlotState::Draining {
                                    pgid: *pgid,
                                    saved_status: Some(status),
                                    died_on_alarm,
                                    stdout_open,
                                    stderr_open,
                                };
                            } else {
                                finalize_with = Some(Some(status));
                            }
                        }
                        Ok(None) => {
                            if *exec_state == ExecState::MaybeFailed {
                                // SIGCONT was already applied when the stop was observed.
                            }
                            if now > *deadline {
                                match timeout_step {
                                    TimeoutStep::None => {
                                        let _ = exec::signal_group(*pgid, libc::SIGTERM);
                                        *timeout_step = TimeoutStep::TermSent;
                                        *deadline = now + TIMEOUT_GRACE;
                                    }
                                    TimeoutStep::TermSent => {
                                        let _ = exec::signal_group(*pgid, libc::SIGKILL);
                                        *timeout_step = TimeoutStep::KillSent;
                                    }
                                    TimeoutStep::KillSent => {}
                                }
                            }
                        }
                        Err(_) => finalize_with = Some(None),
                    }
                }
                SlotState::Draining { pgid, saved_status, died_on_alarm: _, stdout_open, stderr_open } => {
                    if !*stdout_open && !*stderr_open {
                        if exec::group_alive(*pgid) {
                            self.slots[slot_idx].state = SlotState::OrphanWait {
                                pgid: *pgid,
                                saved_status: *saved_status,
                                since: now,
                                last_diag: now,
                            };
                        } else {
                            finalize_with = Some(*saved_status);
                        }
                    }
                }
                SlotState::OrphanWait { pgid, saved_status, last_diag, .. } => {
                    if !exec::group_alive(*pgid) {
                        finalize_with = Some(*saved_status);
                    } else if now.duration_since(*last_diag) >= ORPHAN_DIAG_INTERVAL {
                        *last_diag = now;
                        warn!(slot = slot_idx, pgid, "orphaned grandchild still alive; continuing to wait");
                    }
                }
                SlotState::Finalized { .. } | SlotState::Idle => {}
            }

            if let Some(status) = finalize_with {
                self.finalize_slot(slot_idx, status);
            }
        }
    }

    fn finalize_slot(&mut self, slot_idx: usize, status: Option<std::process::ExitStatus>) {
        let Some(target_idx) = self.slots[slot_idx].target_index else {
            self.slots[slot_idx].reset();
            return;
        };

        let is_test = self.slots[slot_idx].is_test;
        let is_analyzer = self.slots[slot_idx].is_analyzer;
        let phase = self.registry.get(target_idx).phase;
        let timed_out = matches!(&self.slots[slot_idx].state, SlotState::Draining { died_on_alarm: true, .. })
            || status.and_then(|s| s.signal()).map(|s| s == libc::SIGALRM || s == libc::SIGTERM || s == libc::SIGKILL).unwrap_or(false);

        let mode = self.slots[slot_idx].output_mode;
        if mode.has(OutputMode::ATEND) && (!mode.has(OutputMode::IFERR) || mode.has(OutputMode::ERR)) {
            self.replay_files(slot_idx);
        }

        if is_test {
            let ok = !timed_out && !self.slots[slot_idx].test_failed && self.slots[slot_idx].test_line_seen;
            self.registry.result(target_idx, ok);
            if !ok {
                self.registry.cmdstatus(target_idx, if timed_out { Verdict::Timeout } else { Verdict::Failure });
            }
        } else if is_analyzer {
            // A dead/unspawnable analyzer child is a target-failure (status
            // stays dead from spawn_into_slot's Err branch and never reaches
            // here); a clean exit or a timeout both still advance `status`
            // per `target_result(1)` in the reference tool, only `result`
            // differs.
            self.registry.result(target_idx, true);
            if timed_out {
                self.set_cmdstatus(target_idx, Verdict::Timeout);
            } else if status.map(|s| s.success()).unwrap_or(false) {
                self.set_cmdstatus(target_idx, Verdict::Success);
            } else {
                self.set_cmdstatus(target_idx, Verdict::Error);
            }
        } else if phase == Phase::Ran {
            self.finalize_run(slot_idx, target_idx, status, timed_out);
        } else {
            // Ping phase child (only slot 0 follows this path; handled via
            // handle_ping_output instead) or an unexpected state.
            self.registry.result(target_idx, status.map(|s| s.success()).unwrap_or(false));
        }

        if let Some(dir) = &self.config.output_dir {
            if let Some(status) = status {
                if self.slots[slot_idx].output_mode.has(OutputMode::COPY) && phase == Phase::Ran {
                    let name = &self.registry.get(target_idx).name;
                    let code = status.code().unwrap_or(-1);
                    let _ = std::fs::write(dir.join(format!("{name}.exit")), format!("{code}\n"));
                }
            }
        }

        if !self.slots[slot_idx].output_mode.has(OutputMode::COPY) {
            for path in [self.slots[slot_idx].stdout_path.take(), self.slots[slot_idx].stderr_path.take()].into_iter().flatten() {
                let _ = std::fs::remove_file(path);
            }
        }

        self.slots[slot_idx].reset();
    }

    fn finalize_run(&mut self, slot_idx: usize, target_idx: usize, status: Option<std::process::ExitStatus>, timed_out: bool) {
        // A clean reap, a timeout death, and an unrelated signal death all
        // advance `status` normally (`target_result(1)` in the reference
        // tool) — only a failed spawn or a rejected test marks the target
        // dead. `result`/`cmdstatus` (via `set_cmdstatus`) carry the actual
        // classification instead.
        if timed_out {
            self.registry.result(target_idx, true);
            self.set_cmdstatus(target_idx, Verdict::Timeout);
            return;
        }
        let Some(status) = status else {
            // try_wait() reported no-such-child: a platform anomaly, treated
            // as a clean exit 0 per section 4.F.
            warn!(slot = slot_idx, "reap reported no such child; treating as exit 0");
            self.registry.result(target_idx, true);
            self.set_cmdstatus(target_idx, Verdict::Success);
            return;
        };
        if !status_is_clean_signal(&status) {
            self.registry.result(target_idx, true);
            self.set_cmdstatus(target_idx, Verdict::Error);
            return;
        }

        let code = status.code().unwrap_or(-1);
        if self.config.bset_error.contains(&code) {
            self.registry.result(target_idx, true);
            self.set_cmdstatus(target_idx, Verdict::Error);
            if self.slots[slot_idx].output_mode.has(OutputMode::IFERR) {
                self.replay_files(slot_idx);
            }
            return;
        }

        // An external analyzer's batch verdict is produced by spawning it as a
        // child in phase 4 (`try_spawn_analyzer`), not synchronously here —
        // doing it here would both block the single-threaded loop on the
        // external command and run it a second time. The run-phase finalize
        // for that case just records success, mirroring `loop.c`'s
        // `set_cmdstatus(CMD_SUCCESS)` for `ANALYZE_RUN`.
        let err_flag = self.slots[slot_idx].output_mode.has(OutputMode::ERR);
        let verdict_ok = if let Some(analyzer) = self.analyzer.clone() {
            if err_flag {
                false
            } else if analyzer.is_external() {
                true
            } else if let (Some(out), Some(err)) = (&self.slots[slot_idx].stdout_path, &self.slots[slot_idx].stderr_path) {
                analyzer.run(out, err)
            } else {
                !err_flag
            }
        } else {
            !err_flag
        };

        self.registry.result(target_idx, true);
        self.set_cmdstatus(target_idx, if verdict_ok { Verdict::Success } else { Verdict::Error });
        if self.config.bset_show.contains(&code) {
            self.emit(slot_idx, MessageKind::Info, &format!("exit code {code}"));
        }
    }

    fn spawn_attempts(&mut self, done: &mut bool) {
        if self.spawn_mode.blocks_spawn() {
            return;
        }
        for slot_idx in 1..self.slots.len() {
            if !self.slots[slot_idx].is_free() {
                continue;
            }
            if self.try_spawn_analyzer(slot_idx, done) {
                continue;
            }
            if self.try_spawn_run(slot_idx, done) {
                continue;
            }
            self.try_spawn_test(slot_idx, done);
        }
    }

    /// `PAUSE` reserves nothing and spawns nothing for an already-dequeued
    /// target — it stays pending and is dequeued again on a later pass, per
    /// `original_source/src/loop.c`'s `if (spawn_mode == SPAWN_PAUSE) { idx
    /// += 1; continue; }` guards ahead of each phase's `target_start()`.
    fn try_spawn_analyzer(&mut self, slot_idx: usize, done: &mut bool) -> bool {
        let Some(target_idx) = self.registry.next(Phase::Analyzed) else { return false };
        *done = false;

        let Some(cmd) = self.config.analyzer_command.clone() else {
            self.registry.start(target_idx, Phase::Analyzed);
            self.registry.result(target_idx, true);
            return true;
        };
        if self.spawn_mode == SpawnMode::Pause {
            return true;
        }
        self.registry.start(target_idx, Phase::Analyzed);

        let name = self.registry.get(target_idx).name.clone();
        let output_dir = self.config.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        let invocation = Invocation { program: cmd, args: vec![name, output_dir.display().to_string()] };
        self.spawn_into_slot(slot_idx, target_idx, invocation, Duration::from_secs(self.config.analyzer_timeout_secs), false, true, OutputMode::empty());
        true
    }

    /// `NONE` blocks new run-phase spawns outright (only the target already
    /// in flight may run) — grounded on `loop.c`'s `spawn_mode != SPAWN_NONE`
    /// guard on the phase-3 dequeue, ahead of even the `target_next` call.
    fn try_spawn_run(&mut self, slot_idx: usize, done: &mut bool) -> bool {
        if self.spawn_mode == SpawnMode::None {
            return false;
        }
        let Some(target_idx) = self.registry.next(Phase::Ran) else { return false };
        *done = false;
        if self.spawn_mode == SpawnMode::Pause {
            return true;
        }
        if self.spawn_mode == SpawnMode::One {
            self.spawn_mode = SpawnMode::None;
        }
        self.registry.start(target_idx, Phase::Ran);

        let method = self.registry.get(target_idx).method;
        let name = self.registry.get(target_idx).name.clone();
        let invocation = method::getcmd(method, &name, &self.config.command);

        let mut mode = OutputMode::new(if self.config.silent { 0 } else { self.config.output_mode });
        if let Some(dir) = &self.config.output_dir {
            mode.set(OutputMode::COPY);
            let _ = std::fs::create_dir_all(dir);
        }
        self.spawn_into_slot(slot_idx, target_idx, invocation, Duration::from_secs(self.config.command_timeout_secs), false, false, mode);
        true
    }

    fn try_spawn_test(&mut self, slot_idx: usize, done: &mut bool) -> bool {
        let Some(target_idx) = self.registry.next(Phase::Tested) else { return false };
        *done = false;

        if !self.config.test {
            self.registry.start(target_idx, Phase::Tested);
            self.registry.result(target_idx, true);
            return true;
        }
        if self.spawn_mode == SpawnMode::Pause {
            return true;
        }
        self.registry.start(target_idx, Phase::Tested);

        let method = self.registry.get(target_idx).method;
        let name = self.registry.get(target_idx).name.clone();
        let invocation = method::getcmd(method, &name, "echo SHMUX.");
        self.spawn_into_slot(slot_idx, target_idx, invocation, Duration::from_secs(self.config.test_timeout_secs), true, false, OutputMode::empty());
        true
    }

    fn spawn_into_slot(
        &mut self,
        slot_idx: usize,
        target_idx: usize,
        invocation: Invocation,
        timeout: Duration,
        is_test: bool,
        is_analyzer: bool,
        output_mode: OutputMode,
    ) {
        let name = self.registry.get(target_idx).name.clone();

        let mut stdout_path = None;
        let mut stderr_path = None;
        if output_mode.needs_file_buffering() {
            if let Some(dir) = &self.config.output_dir {
                let out = dir.join(format!("{name}.stdout"));
                let err = dir.join(format!("{name}.stderr"));
                match (
                    OpenOptions::new().write(true).create_new(true).open(&out),
                    OpenOptions::new().write(true).create_new(true).open(&err),
                ) {
                    (Ok(_), Ok(_)) => {
                        stdout_path = Some(out);
                        stderr_path = Some(err);
                    }
                    _ => {
                        warn!(target = name, "output file already exists; marking target failed");
                        self.registry.result(target_idx, false);
                        return;
                    }
                }
            }
        }

        match exec::spawn(&invocation) {
            Ok(mut child) => {
                let pgid = child.id().unwrap_or(0) as i32;
                if let Some(out) = child.stdout.take() {
                    spawn_reader(slot_idx, AnalyzedStream::Stdout, out, self.tx.clone());
                }
                if let Some(err) = child.stderr.take() {
                    spawn_reader(slot_idx, AnalyzedStream::Stderr, err, self.tx.clone());
                }
                let slot = &mut self.slots[slot_idx];
                slot.target_index = Some(target_idx);
                slot.is_test = is_test;
                slot.is_analyzer = is_analyzer;
                slot.output_mode = output_mode;
                slot.stdout_path = stdout_path;
                slot.stderr_path = stderr_path;
                slot.test_line_seen = false;
                slot.test_failed = false;
                slot.state = SlotState::Running {
                    child,
                    pgid,
                    deadline: Instant::now() + timeout,
                    exec_state: ExecState::Ok,
                    timeout_step: TimeoutStep::None,
                    stdout_open: true,
                    stderr_open: true,
                };
            }
            Err(e) => {
                warn!(target = name, error = %e, "failed to spawn child");
                self.registry.result(target_idx, false);
            }
        }
    }

    /// Overwrite the single status line with live counters. Step (1) of the
    /// deterministic per-wakeup ordering in section 5.
    fn refresh_status_line(&self) {
        let running = self.slots.iter().skip(1).filter(|s| !s.is_free()).count();
        let summary = self.registry.results(self.start.elapsed().as_secs());
        self.renderer.status_line(&format!(
            "[{}] mode={} running={} pending={} success={} error={} timeout={} failed={}",
            self.start.elapsed().as_secs(),
            self.spawn_mode.label(),
            running,
            summary.pending,
            summary.success,
            summary.error,
            summary.timeout,
            summary.failed,
        ));
    }

    fn print_summary(&self, summary: &Summary) {
        self.renderer.print_plain(&format!(
            "{} targets processed in {}s: {} success, {} error, {} timeout, {} failed",
            summary.total(),
            summary.total_elapsed_secs,
            summary.success,
            summary.error,
            summary.timeout,
            summary.failed,
        ));
        for (label, names) in [
            ("error", &summary.error_names),
            ("timed out", &summary.timeout_names),
            ("failed", &summary.failed_names),
        ] {
            if !names.is_empty() {
                self.renderer.print_plain(&format!("{label}: {}", names.join(", ")));
            }
        }
    }

    fn exit_code(&self, summary: &Summary) -> i32 {
        match self.spawn_mode {
            SpawnMode::Fatal => 1,
            SpawnMode::Abort => 3,
            SpawnMode::Quit if summary.pending > 0 => 4,
            _ if summary.had_non_success() => 5,
            _ => 0,
        }
    }
}

fn status_is_clean_signal(status: &std::process::ExitStatus) -> bool {
    status.signal().is_none()
}

/// The spawn-mode side effect of recording a run/analyzer-phase verdict: a
/// `Success` promotes `NONE` back to `CHECK`; anything else drops `NONE` or
/// `CHECK` into the configured failure-mode. Pure so it can be unit-tested
/// without standing up a full `Engine`.
fn cmdstatus_transition(mode: SpawnMode, failure_mode: FailureMode, verdict: Verdict) -> SpawnMode {
    if verdict == Verdict::Success {
        if mode == SpawnMode::None {
            SpawnMode::Check
        } else {
            mode
        }
    } else if matches!(mode, SpawnMode::None | SpawnMode::Check) {
        failure_mode.as_spawn_mode()
    } else {
        mode
    }
}

trait ExitStatusExt {
    fn signal(&self) -> Option<i32>;
}

impl ExitStatusExt for std::process::ExitStatus {
    fn signal(&self) -> Option<i32> {
        std::os::unix::process::ExitStatusExt::signal(self)
    }
}

const HELP_TEXT: &str = "\
h/?  help            q/ESC graceful quit   Q abort
SPC  pause            1    spawn one       \\n/- check
+    more             F    toggle failure-mode
S    show mode        p/r/f/e/s/a  status filters
k    kill target      v    toggle verbose  D  toggle debug";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn help_text_mentions_every_command() {
        for key in ["h", "q", "Q", "F", "S", "k", "v", "D"] {
            assert!(HELP_TEXT.contains(key));
        }
    }

    #[test]
    fn check_mode_drops_into_failure_mode_on_first_error() {
        let next = cmdstatus_transition(SpawnMode::Check, FailureMode::Pause, Verdict::Error);
        assert_eq!(next, SpawnMode::Pause);
    }

    #[test]
    fn check_mode_stays_check_on_success() {
        let next = cmdstatus_transition(SpawnMode::Check, FailureMode::Quit, Verdict::Success);
        assert_eq!(next, SpawnMode::Check);
    }

    #[test]
    fn none_mode_promotes_to_check_on_success() {
        let next = cmdstatus_transition(SpawnMode::None, FailureMode::Pause, Verdict::Success);
        assert_eq!(next, SpawnMode::Check);
    }

    #[test]
    fn none_mode_drops_into_failure_mode_on_timeout() {
        let next = cmdstatus_transition(SpawnMode::None, FailureMode::Quit, Verdict::Timeout);
        assert_eq!(next, SpawnMode::Quit);
    }

    #[test]
    fn more_mode_ignores_failures() {
        let next = cmdstatus_transition(SpawnMode::More, FailureMode::Quit, Verdict::Error);
        assert_eq!(next, SpawnMode::More);
    }
}

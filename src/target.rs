//! Target registry & phase machine (component A).
//!
//! Grounded on `examples/original_source/src/target.c`: `target_add`,
//! `target_next`, `target_start`, `target_result`, `target_status`, and
//! `target_results` there define the exact phase/status/result transitions
//! reproduced here.

use std::time::Instant;

use crate::verdict::{Phase, Verdict};

/// Selects which external argv-construction scheme a target uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    LocalShell,
    RemoteShellLegacy,
    SshV1,
    SshV2,
    SshAuto,
}

impl Method {
    /// Parse a leading `sh:`, `rsh:`, `ssh1:`, `ssh2:`, or `ssh:` prefix off a
    /// target spec, returning the method and the remaining host string.
    pub fn parse_prefix(spec: &str) -> (Option<Method>, &str) {
        for (prefix, method) in [
            ("sh:", Method::LocalShell),
            ("rsh:", Method::RemoteShellLegacy),
            ("ssh1:", Method::SshV1),
            ("ssh2:", Method::SshV2),
            ("ssh:", Method::SshAuto),
        ] {
            if let Some(rest) = spec.strip_prefix(prefix) {
                return (Some(method), rest);
            }
        }
        (None, spec)
    }
}

/// A filter for [`Registry::status`] listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Pending,
    Active,
    Failed,
    Error,
    Success,
    All,
}

#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    pub method: Method,
    /// Highest phase fully completed, or `-1` (dead) as `status_raw`.
    status_raw: i8,
    pub phase: Phase,
    pub result: Verdict,
    pub when: Instant,
}

impl Target {
    fn new(name: String, method: Method) -> Self {
        Self {
            name,
            method,
            status_raw: Phase::None.as_i8(),
            phase: Phase::None,
            result: Verdict::Unknown,
            when: Instant::now(),
        }
    }

    pub fn is_dead(&self) -> bool {
        self.status_raw < 0
    }

    pub fn status_phase(&self) -> Option<Phase> {
        if self.is_dead() {
            None
        } else {
            Phase::from_i8(self.status_raw)
        }
    }

    fn set_status_phase(&mut self, p: Phase) {
        debug_assert!(p.as_i8() <= self.phase.as_i8());
        self.status_raw = p.as_i8();
    }

    fn set_dead(&mut self) {
        self.status_raw = -1;
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.when.elapsed().as_secs()
    }
}

/// Holds all targets, advances each through phases, records per-target verdict.
pub struct Registry {
    targets: Vec<Target>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self { targets: Vec::new() }
    }

    /// Parse an optional method prefix and register the target. Returns the
    /// new length of the registry.
    pub fn add(&mut self, spec: &str, default_method: Method) -> usize {
        let (method, rest) = Method::parse_prefix(spec);
        self.targets.push(Target::new(rest.to_string(), method.unwrap_or(default_method)));
        self.targets.len()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn get(&self, idx: usize) -> &Target {
        &self.targets[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut Target {
        &mut self.targets[idx]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }

    /// Return the lowest-indexed target ready to enter `phase`: its `status`
    /// equals `phase`'s predecessor and it has not already started `phase`.
    /// Always scans from index 0, matching `target_next` in the reference
    /// tool — callers rely on this deterministic ordering, not just
    /// "some ready target".
    pub fn next(&mut self, phase: Phase) -> Option<usize> {
        let want_status = phase.as_i8() - 1;
        for (idx, t) in self.targets.iter().enumerate() {
            if t.is_dead() {
                continue;
            }
            if t.status_phase().map(Phase::as_i8) == Some(want_status) && t.phase != phase {
                return Some(idx);
            }
        }
        None
    }

    /// Advance `phase` of `idx` by one and stamp `when`.
    pub fn start(&mut self, idx: usize, phase: Phase) {
        let t = &mut self.targets[idx];
        t.phase = phase;
        t.when = Instant::now();
    }

    /// Record the outcome of the phase the target is currently running.
    ///
    /// On success, `status` rises to `phase`. On failure, the target becomes
    /// dead with `result = Failure`. If `result` was already `Error` and this
    /// call is completing the analyzer phase successfully, `phase` has
    /// already been recorded as `Analyzed` by the caller but `result` is left
    /// untouched — preserving the reference tool's "error survives a passing
    /// analyzer" rule.
    pub fn result(&mut self, idx: usize, ok: bool) {
        let t = &mut self.targets[idx];
        if ok {
            let phase = t.phase;
            t.set_status_phase(phase);
        } else {
            t.set_dead();
            t.result = Verdict::Failure;
        }
    }

    /// Record the run-phase verdict without touching phase progression.
    pub fn cmdstatus(&mut self, idx: usize, verdict: Verdict) {
        self.targets[idx].result = verdict;
    }

    pub fn status(&self, filter: StatusFilter) -> Vec<String> {
        self.targets
            .iter()
            .enumerate()
            .filter(|(_, t)| matches_filter(t, filter))
            .map(|(i, t)| {
                format!(
                    "[{}] {}: {} ({}s)",
                    i,
                    state_label(t),
                    t.name,
                    t.elapsed_secs()
                )
            })
            .collect()
    }

    pub fn results(&self, total_elapsed_secs: u64) -> Summary {
        let mut summary = Summary { total_elapsed_secs, ..Default::default() };
        for t in &self.targets {
            match (t.is_dead(), t.result) {
                (true, _) => {
                    summary.failed += 1;
                    summary.failed_names.push(t.name.clone());
                }
                (false, Verdict::Success) => summary.success += 1,
                (false, Verdict::Error) => {
                    summary.error += 1;
                    summary.error_names.push(t.name.clone());
                }
                (false, Verdict::Timeout) => {
                    summary.timeout += 1;
                    summary.timeout_names.push(t.name.clone());
                }
                (false, Verdict::Failure) => {
                    summary.failed += 1;
                    summary.failed_names.push(t.name.clone());
                }
                (false, Verdict::Unknown) => summary.pending += 1,
            }
        }
        summary
    }
}

fn matches_filter(t: &Target, filter: StatusFilter) -> bool {
    match filter {
        StatusFilter::All => true,
        StatusFilter::Pending => !t.is_dead() && t.result == Verdict::Unknown && t.status_phase() == Some(t.phase),
        StatusFilter::Active => !t.is_dead() && t.status_phase() != Some(t.phase),
        StatusFilter::Failed => t.is_dead(),
        StatusFilter::Error => !t.is_dead() && t.result == Verdict::Error,
        StatusFilter::Success => !t.is_dead() && t.result == Verdict::Success,
    }
}

fn state_label(t: &Target) -> &'static str {
    if t.is_dead() {
        "failed"
    } else if t.status_phase() != Some(t.phase) {
        "active"
    } else {
        match t.result {
            Verdict::Success => "success",
            Verdict::Error => "error",
            Verdict::Timeout => "timeout",
            Verdict::Failure => "failed",
            Verdict::Unknown => "pending",
        }
    }
}

#[derive(Debug, Default)]
pub struct Summary {
    pub total_elapsed_secs: u64,
    pub pending: usize,
    pub success: usize,
    pub error: usize,
    pub timeout: usize,
    pub failed: usize,
    pub error_names: Vec<String>,
    pub timeout_names: Vec<String>,
    pub failed_names: Vec<String>,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.pending + self.success + self.error + self.timeout + self.failed
    }

    pub fn had_non_success(&self) -> bool {
        self.error + self.timeout + self.failed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_parsing() {
        assert_eq!(Method::parse_prefix("ssh2:host1"), (Some(Method::SshV2), "host1"));
        assert_eq!(Method::parse_prefix("host1"), (None, "host1"));
        assert_eq!(Method::parse_prefix("ssh:host1"), (Some(Method::SshAuto), "host1"));
    }

    #[test]
    fn next_returns_lowest_ready_index() {
        let mut reg = Registry::new();
        reg.add("a", Method::SshAuto);
        reg.add("b", Method::SshAuto);
        assert_eq!(reg.next(Phase::Pinged), Some(0));
        reg.start(0, Phase::Pinged);
        reg.result(0, true);
        assert_eq!(reg.next(Phase::Pinged), Some(1));
    }

    #[test]
    fn failure_marks_dead_and_terminal() {
        let mut reg = Registry::new();
        reg.add("a", Method::SshAuto);
        reg.start(0, Phase::Pinged);
        reg.result(0, false);
        assert!(reg.get(0).is_dead());
        assert_eq!(reg.next(Phase::Pinged), None);
    }

    #[test]
    fn analyzer_success_after_error_does_not_upgrade_result() {
        let mut reg = Registry::new();
        reg.add("a", Method::SshAuto);
        reg.start(0, Phase::Ran);
        reg.result(0, true);
        reg.cmdstatus(0, Verdict::Error);
        reg.start(0, Phase::Analyzed);
        reg.result(0, true);
        assert_eq!(reg.get(0).phase, Phase::Analyzed);
        assert_eq!(reg.get(0).result, Verdict::Error);
    }

    #[test]
    fn summary_counts_all_added_targets() {
        let mut reg = Registry::new();
        reg.add("a", Method::SshAuto);
        reg.add("b", Method::SshAuto);
        reg.start(0, Phase::Ran);
        reg.result(0, true);
        reg.cmdstatus(0, Verdict::Success);
        reg.start(1, Phase::Ran);
        reg.result(1, false);
        let summary = reg.results(5);
        assert_eq!(summary.total(), 2);
        assert_eq!(summary.success, 1);
        assert_eq!(summary.failed, 1);
    }
}

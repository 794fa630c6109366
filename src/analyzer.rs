//! Output analyzers (component J) — concrete defaults behind the `Analyzer`
//! trait boundary the engine's demultiplexer (component D) and reaper
//! (component F) consume.

use std::path::Path;

use regex::Regex;
use tracing::warn;

/// A pluggable verdict source for a target's output. `lnrun` is consulted per
/// line as it streams in; `run` is consulted once, after the child exits,
/// against the saved stdout/stderr files.
pub trait Analyzer: Send + Sync {
    /// `true` = ok, `false` = error. Default: every line is ok.
    fn lnrun(&self, _stream: AnalyzedStream, _line: &str) -> bool {
        true
    }

    /// `true` = ok, `false` = error. Default: the batch always passes.
    fn run(&self, _stdout_path: &Path, _stderr_path: &Path) -> bool {
        true
    }

    /// Whether this analyzer's batch verdict is produced by spawning an
    /// external child (phase 4) rather than computed in-process. The
    /// run-phase reaper must not call [`Analyzer::run`] on one of these.
    fn is_external(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzedStream {
    Stdout,
    Stderr,
}

/// Matches each line against a configured pattern; a match is an error.
pub struct RegexAnalyzer {
    pattern: Regex,
}

impl RegexAnalyzer {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self { pattern: Regex::new(pattern)? })
    }
}

impl Analyzer for RegexAnalyzer {
    fn lnrun(&self, _stream: AnalyzedStream, line: &str) -> bool {
        !self.pattern.is_match(line)
    }

    fn run(&self, stdout_path: &Path, stderr_path: &Path) -> bool {
        for path in [stdout_path, stderr_path] {
            match std::fs::read_to_string(path) {
                Ok(contents) => {
                    if contents.lines().any(|l| self.pattern.is_match(l)) {
                        return false;
                    }
                }
                Err(e) => warn!(?path, error = %e, "analyzer could not read output file"),
            }
        }
        true
    }
}

/// Delegates the batch verdict to an external command invoked as
/// `[analyzer_cmd, target_name, output_dir]`; its exit status is the
/// verdict (0 = ok). Streaming (`lnrun`) is not supported for external
/// analyzers — configuration validation rejects combining one with a
/// streaming-only output mode.
pub struct ExternalAnalyzer {
    pub command: String,
}

impl Analyzer for ExternalAnalyzer {
    fn is_external(&self) -> bool {
        true
    }

    fn run(&self, stdout_path: &Path, stderr_path: &Path) -> bool {
        let output_dir = stdout_path.parent().unwrap_or_else(|| Path::new("."));
        let target_name = stdout_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("target");
        match std::process::Command::new(&self.command)
            .arg(target_name)
            .arg(output_dir)
            .status()
        {
            Ok(status) => status.success(),
            Err(e) => {
                warn!(command = %self.command, error = %e, ?stderr_path, "external analyzer failed to spawn");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_analyzer_flags_matching_lines() {
        let a = RegexAnalyzer::new("ERROR").unwrap();
        assert!(a.lnrun(AnalyzedStream::Stdout, "all good"));
        assert!(!a.lnrun(AnalyzedStream::Stdout, "got an ERROR here"));
    }

    #[test]
    fn default_trait_methods_are_permissive() {
        struct Noop;
        impl Analyzer for Noop {}
        let a = Noop;
        assert!(a.lnrun(AnalyzedStream::Stderr, "anything"));
    }

    #[test]
    fn external_analyzer_reports_itself_as_external() {
        let a = ExternalAnalyzer { command: "true".to_string() };
        assert!(a.is_external());
        assert!(!RegexAnalyzer::new("x").unwrap().is_external());
    }
}

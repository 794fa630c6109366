//! Error taxonomy (ambient addition, section 7). Per-target outcomes are
//! ordinary `Verdict` data, not `Result`; these types cover the two classes
//! that genuinely abort something: configuration problems at startup, and
//! engine-fatal conditions that terminate the whole run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no command configured: pass -c/--command or set `command` in the config file")]
    MissingCommand,
    #[error("concurrency must be at least 1, got {0}")]
    ZeroConcurrency(u64),
    #[error("output mode combines MIXED and ATEND, which are mutually exclusive")]
    ConflictingOutputMode,
    #[error("unknown output_mode {0:?}; expected one of mixed, atend, mixed-iferr, atend-iferr")]
    UnknownOutputMode(String),
    #[error("an external analyzer is configured but no streaming output mode can feed it batch input")]
    AnalyzerWithoutOutput,
    #[error("output_mode buffers output to disk (atend/iferr) and requires an --output-dir")]
    OutputModeNeedsOutputDir,
    #[error("analyzer command configured as empty string")]
    EmptyAnalyzerCommand,
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, #[source] source: toml::de::Error },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("file-descriptor readiness task failed: {0}")]
    ReadinessTask(String),
    #[error("invariant violated: {0}")]
    Invariant(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

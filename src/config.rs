//! Layered configuration (component K) — grounded on
//! `examples/gawd-ai-sctl/server/src/config.rs`'s `Config::load` precedence
//! chain (env > explicit file > cwd file > compiled defaults), adapted from
//! that crate's `toml`+env-var-overrides pattern. `serde_yaml` is not carried
//! forward: this crate has no YAML-based config consumer (see DESIGN.md).

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Deserialize;

use crate::cli::Cli;
use crate::error::ConfigError;
use crate::mode::{FailureMode, SpawnMode};
use crate::target::Method;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub max: u64,
    pub method: String,
    pub command: Option<String>,
    pub ping: bool,
    pub ping_interval_ms: u64,
    pub test: bool,
    pub command_timeout_secs: u64,
    pub test_timeout_secs: u64,
    pub analyzer_timeout_secs: u64,
    pub output_dir: Option<String>,
    pub analyzer_command: Option<String>,
    pub analyzer_pattern: Option<String>,
    pub bset_error: Vec<i32>,
    pub bset_show: Vec<i32>,
    pub output_mode: String,
    pub initial_spawn_mode: String,
    pub failure_mode: String,
    pub logging_level: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            max: 10,
            method: "ssh".to_string(),
            command: None,
            ping: false,
            ping_interval_ms: 250,
            test: false,
            command_timeout_secs: 60,
            test_timeout_secs: 10,
            analyzer_timeout_secs: 30,
            output_dir: None,
            analyzer_command: None,
            analyzer_pattern: None,
            bset_error: Vec::new(),
            bset_show: Vec::new(),
            output_mode: "mixed".to_string(),
            initial_spawn_mode: "more".to_string(),
            failure_mode: "pause".to_string(),
            logging_level: "info".to_string(),
        }
    }
}

/// The validated, fully-resolved configuration an `Engine` is built from.
pub struct EngineConfig {
    pub max: u64,
    pub default_method: Method,
    pub command: String,
    pub ping: bool,
    pub ping_interval_ms: u64,
    pub test: bool,
    pub command_timeout_secs: u64,
    pub test_timeout_secs: u64,
    pub analyzer_timeout_secs: u64,
    pub output_dir: Option<PathBuf>,
    pub analyzer_command: Option<String>,
    pub analyzer_pattern: Option<String>,
    pub bset_error: BTreeSet<i32>,
    pub bset_show: BTreeSet<i32>,
    pub output_mode: u8,
    pub initial_spawn_mode: SpawnMode,
    pub failure_mode: FailureMode,
    pub logging_level: String,
    pub verbose: bool,
    pub silent: bool,
    pub quiet: bool,
    pub targets: Vec<String>,
}

impl EngineConfig {
    /// Layer compiled defaults, an optional config file, environment
    /// variables, and CLI flags (highest precedence) into a validated config.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut file_cfg = FileConfig::default();

        let config_path = cli.config.clone().or_else(|| {
            let candidate = PathBuf::from("rmux.toml");
            candidate.exists().then(|| "rmux.toml".to_string())
        });
        if let Some(path) = config_path {
            let contents = std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::Read { path: path.clone(), source })?;
            file_cfg = toml::from_str(&contents)
                .map_err(|source| ConfigError::Parse { path, source })?;
        }

        if let Ok(v) = std::env::var("RMUX_MAX") {
            if let Ok(n) = v.parse() {
                file_cfg.max = n;
            }
        }
        if let Ok(v) = std::env::var("RMUX_METHOD") {
            file_cfg.method = v;
        }
        if let Ok(v) = std::env::var("RMUX_OUTPUT_DIR") {
            file_cfg.output_dir = Some(v);
        }

        let max = cli.max.unwrap_or(file_cfg.max);
        let method_str = cli.method.clone().unwrap_or(file_cfg.method);
        let command = cli.command.clone().or(file_cfg.command);
        let output_dir = cli.output_dir.clone().or(file_cfg.output_dir);

        let mut targets = cli.targets.clone();
        if let Some(path) = &cli.file {
            let contents = std::fs::read_to_string(path)
                .map_err(|source| ConfigError::Read { path: path.clone(), source })?;
            targets.extend(
                contents
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && !l.starts_with('#'))
                    .map(str::to_string),
            );
        }

        let cfg = EngineConfig {
            max,
            default_method: parse_method(&method_str),
            command: command.ok_or(ConfigError::MissingCommand)?,
            ping: cli.ping || file_cfg.ping,
            ping_interval_ms: cli.ping_interval_ms.unwrap_or(file_cfg.ping_interval_ms),
            test: cli.test || file_cfg.test,
            command_timeout_secs: cli.timeout_secs.unwrap_or(file_cfg.command_timeout_secs),
            test_timeout_secs: file_cfg.test_timeout_secs,
            analyzer_timeout_secs: file_cfg.analyzer_timeout_secs,
            output_dir: output_dir.map(PathBuf::from),
            analyzer_command: file_cfg.analyzer_command,
            analyzer_pattern: file_cfg.analyzer_pattern,
            bset_error: file_cfg.bset_error.into_iter().collect(),
            bset_show: file_cfg.bset_show.into_iter().collect(),
            output_mode: crate::outputmode::OutputMode::parse_label(&file_cfg.output_mode)
                .ok_or_else(|| ConfigError::UnknownOutputMode(file_cfg.output_mode.clone()))?,
            initial_spawn_mode: parse_spawn_mode(&file_cfg.initial_spawn_mode),
            failure_mode: parse_failure_mode(&file_cfg.failure_mode),
            logging_level: if cli.debug {
                "debug".to_string()
            } else if cli.verbose {
                "info".to_string()
            } else {
                file_cfg.logging_level
            },
            verbose: cli.verbose,
            silent: cli.silent,
            quiet: cli.quiet,
            targets,
        };

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max == 0 {
            return Err(ConfigError::ZeroConcurrency(self.max));
        }
        if let Some(cmd) = &self.analyzer_command {
            if cmd.trim().is_empty() {
                return Err(ConfigError::EmptyAnalyzerCommand);
            }
        }
        let output_mode = crate::outputmode::OutputMode::new(self.output_mode);
        if !output_mode.is_valid() {
            return Err(ConfigError::ConflictingOutputMode);
        }
        if output_mode.needs_file_buffering() && self.output_dir.is_none() {
            return Err(ConfigError::OutputModeNeedsOutputDir);
        }
        if self.analyzer_command.is_some() && self.output_dir.is_none() {
            return Err(ConfigError::AnalyzerWithoutOutput);
        }
        Ok(())
    }
}

fn parse_method(s: &str) -> Method {
    match s {
        "sh" | "local" => Method::LocalShell,
        "rsh" => Method::RemoteShellLegacy,
        "ssh1" => Method::SshV1,
        "ssh2" => Method::SshV2,
        _ => Method::SshAuto,
    }
}

fn parse_spawn_mode(s: &str) -> SpawnMode {
    match s {
        "pause" => SpawnMode::Pause,
        "check" => SpawnMode::Check,
        "one" => SpawnMode::One,
        "quit" => SpawnMode::Quit,
        _ => SpawnMode::More,
    }
}

fn parse_failure_mode(s: &str) -> FailureMode {
    match s {
        "quit" => FailureMode::Quit,
        _ => FailureMode::Pause,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_concurrency_is_rejected() {
        let cli = Cli {
            max: Some(0),
            method: None,
            command: Some("echo hi".into()),
            ping: false,
            ping_interval_ms: None,
            test: false,
            timeout_secs: None,
            verbose: false,
            silent: false,
            quiet: false,
            output_dir: None,
            debug: false,
            config: None,
            file: None,
            targets: vec!["host1".into()],
        };
        assert!(matches!(EngineConfig::load(&cli), Err(ConfigError::ZeroConcurrency(0))));
    }

    #[test]
    fn file_buffering_output_mode_without_output_dir_is_rejected() {
        let cfg = EngineConfig {
            max: 10,
            default_method: Method::SshAuto,
            command: "echo hi".to_string(),
            ping: false,
            ping_interval_ms: 250,
            test: false,
            command_timeout_secs: 60,
            test_timeout_secs: 10,
            analyzer_timeout_secs: 30,
            output_dir: None,
            analyzer_command: None,
            analyzer_pattern: None,
            bset_error: BTreeSet::new(),
            bset_show: BTreeSet::new(),
            output_mode: crate::outputmode::OutputMode::ATEND,
            initial_spawn_mode: SpawnMode::More,
            failure_mode: FailureMode::Pause,
            logging_level: "info".to_string(),
            verbose: false,
            silent: false,
            quiet: false,
            targets: vec!["host1".into()],
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::OutputModeNeedsOutputDir)));
    }

    #[test]
    fn missing_command_is_rejected() {
        let cli = Cli {
            max: None,
            method: None,
            command: None,
            ping: false,
            ping_interval_ms: None,
            test: false,
            timeout_secs: None,
            verbose: false,
            silent: false,
            quiet: false,
            output_dir: None,
            debug: false,
            config: None,
            file: None,
            targets: vec!["host1".into()],
        };
        assert!(matches!(EngineConfig::load(&cli), Err(ConfigError::MissingCommand)));
    }
}

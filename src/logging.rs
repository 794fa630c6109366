//! Logging (component L) — `tracing` initialization with a reload handle so
//! the console's `v`/`D` toggles can raise or lower verbosity at runtime,
//! matching this codebase's existing `tracing_subscriber::fmt().with_env_filter(...)`
//! initialization pattern.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{reload, EnvFilter};

pub struct LogHandle {
    reload: reload::Handle<EnvFilter, tracing_subscriber::Registry>,
    debug_on: bool,
    verbose_on: bool,
}

impl LogHandle {
    pub fn toggle_debug(&mut self) -> bool {
        self.debug_on = !self.debug_on;
        self.apply();
        self.debug_on
    }

    pub fn toggle_verbose(&mut self) -> bool {
        self.verbose_on = !self.verbose_on;
        self.apply();
        self.verbose_on
    }

    fn apply(&self) {
        let level = if self.debug_on {
            LevelFilter::DEBUG
        } else if self.verbose_on {
            LevelFilter::INFO
        } else {
            LevelFilter::WARN
        };
        let _ = self.reload.modify(|filter| *filter = EnvFilter::new(level.to_string()));
    }
}

/// Initialize the global subscriber from `RUST_LOG` if set, else `default_level`.
/// Returns a handle the console uses to adjust verbosity at runtime.
pub fn init(default_level: &str) -> LogHandle {
    let initial = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let (filter, reload) = reload::Layer::new(initial);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    LogHandle { reload, debug_on: false, verbose_on: false }
}

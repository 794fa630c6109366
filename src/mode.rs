//! Spawn-mode and failure-mode: the engine's operator-facing policy knobs.

/// Current policy of the spawn controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnMode {
    /// Terminal error; the engine exits.
    Fatal,
    /// Stop at once.
    Abort,
    /// No new spawns; drain existing children.
    Quit,
    /// No new spawns; may resume.
    Pause,
    /// Spawn freely, but on first failure transition to failure-mode.
    Check,
    /// Only the currently spawning target may run; its success promotes back to Check.
    None,
    /// Spawn exactly one, then transition to `None`.
    One,
    /// Spawn freely, ignore failures.
    More,
}

impl SpawnMode {
    pub fn blocks_spawn(self) -> bool {
        matches!(self, SpawnMode::Quit | SpawnMode::Abort | SpawnMode::Fatal)
    }

    pub fn label(self) -> &'static str {
        match self {
            SpawnMode::Fatal => "fatal",
            SpawnMode::Abort => "abort",
            SpawnMode::Quit => "quit",
            SpawnMode::Pause => "pause",
            SpawnMode::Check => "check",
            SpawnMode::None => "none",
            SpawnMode::One => "one",
            SpawnMode::More => "more",
        }
    }
}

/// Policy consulted when `Check` sees a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    Pause,
    Quit,
}

impl FailureMode {
    pub fn toggle(self) -> Self {
        match self {
            FailureMode::Pause => FailureMode::Quit,
            FailureMode::Quit => FailureMode::Pause,
        }
    }

    pub fn as_spawn_mode(self) -> SpawnMode {
        match self {
            FailureMode::Pause => SpawnMode::Pause,
            FailureMode::Quit => SpawnMode::Quit,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FailureMode::Pause => "pause",
            FailureMode::Quit => "quit",
        }
    }
}

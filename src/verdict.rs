//! Target phase/result vocabulary shared by the registry, slot table, and reaper.

/// A stage of work applied to a target, in the fixed order ping → test → run → analyze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i8)]
pub enum Phase {
    None = 0,
    Pinged = 1,
    Tested = 2,
    Ran = 3,
    Analyzed = 4,
}

impl Phase {
    pub const fn as_i8(self) -> i8 {
        self as i8
    }

    /// The phase reached after starting the next phase past `self`.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::None => Some(Phase::Pinged),
            Phase::Pinged => Some(Phase::Tested),
            Phase::Tested => Some(Phase::Ran),
            Phase::Ran => Some(Phase::Analyzed),
            Phase::Analyzed => None,
        }
    }

    pub fn from_i8(v: i8) -> Option<Phase> {
        match v {
            0 => Some(Phase::None),
            1 => Some(Phase::Pinged),
            2 => Some(Phase::Tested),
            3 => Some(Phase::Ran),
            4 => Some(Phase::Analyzed),
            _ => None,
        }
    }
}

/// The final outcome recorded for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum Verdict {
    Failure = -2,
    Timeout = -1,
    Unknown = 0,
    Success = 1,
    Error = 2,
}

impl Verdict {
    pub fn is_terminal_failure(self) -> bool {
        matches!(self, Verdict::Failure)
    }

    pub fn is_success(self) -> bool {
        matches!(self, Verdict::Success)
    }

    pub fn label(self) -> &'static str {
        match self {
            Verdict::Failure => "failed",
            Verdict::Timeout => "timed out",
            Verdict::Unknown => "unknown",
            Verdict::Success => "success",
            Verdict::Error => "error",
        }
    }
}

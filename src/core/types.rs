use std::fmt;

/// A single harvested contact. Immutable once built; the email is the dedup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRecord {
    name: String,
    email: String,
}

impl ContactRecord {
    /// Build a record, trimming both fields. The name is expected to be cleaned already
    /// (see [`crate::scraping::page_adapter::clean_display_name`]).
    pub fn new(name: impl AsRef<str>, email: impl AsRef<str>) -> Self {
        Self {
            name: name.as_ref().trim().to_string(),
            email: email.as_ref().trim().to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The user pressed stop.
    User,
    /// Sustained zero yield: nothing left to load.
    Exhausted,
    /// The container refused to scroll for too many attempts in a row.
    MaxAttempts,
    /// Iteration kept failing after bounded retries.
    Error(String),
}

impl StopReason {
    /// `true` for endings that still count as a clean harvest.
    pub fn is_clean(&self) -> bool {
        matches!(self, StopReason::User | StopReason::Exhausted)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::User => write!(f, "stopped by user"),
            StopReason::Exhausted => write!(f, "no more contacts to load"),
            StopReason::MaxAttempts => write!(f, "max scroll attempts reached"),
            StopReason::Error(msg) => write!(f, "error: {}", msg),
        }
    }
}

/// Controller lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Stopped(StopReason),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Stopped(_))
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Running => write!(f, "running"),
            RunState::Stopped(reason) => write!(f, "stopped ({})", reason),
        }
    }
}

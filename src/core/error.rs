use thiserror::Error;

/// Failure taxonomy for the harvester.
///
/// Node-level misses (a contact row without an email) and undecodable network bodies never
/// reach this type; they are skipped where they happen.
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("contact container not found (selector `{selector}`)")]
    ContainerNotFound { selector: String },

    #[error("page evaluation failed: {0}")]
    Evaluation(String),

    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },

    #[error("Please navigate to {expected} first! (current page: {actual})")]
    WrongPage { expected: String, actual: String },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<chromiumoxide::error::CdpError> for ScoutError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        ScoutError::Evaluation(e.to_string())
    }
}

pub type ScoutResult<T> = Result<T, ScoutError>;

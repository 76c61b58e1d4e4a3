use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors are `Clone` so a single in-flight fetch can hand its outcome to
/// every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid repository path: {0}")]
    PathInvalid(String),

    #[error("Repository has no commits")]
    EmptyRepository,

    #[error("Failed to fetch {resource}: {message}")]
    Fetch { resource: String, message: String },

    #[error("Repository is not ready")]
    NotReady,

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl Error {
    pub fn fetch(resource: impl Into<String>, source: &Error) -> Self {
        Error::Fetch {
            resource: resource.into(),
            message: source.to_string(),
        }
    }

    /// True for the open failures that leave the session not ready.
    pub fn is_open_failure(&self) -> bool {
        matches!(self, Error::PathInvalid(_) | Error::EmptyRepository)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Backend(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

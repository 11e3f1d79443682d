use std::path::PathBuf;

/// Errors raised inside the engine's components.
///
/// None of these escape the public entry points: callers get empty collections or `None`
/// after the error is logged.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl EngineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        EngineError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Failure reported by a backend metadata client.
///
/// Cloneable so a single failed fetch can be handed to every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Request(String),

    #[error("backend returned malformed metadata: {0}")]
    Malformed(String),

    #[error("backend is disabled")]
    Disabled,
}

pub type EngineResult<T> = Result<T, EngineError>;
pub type BackendResult<T> = Result<T, BackendError>;

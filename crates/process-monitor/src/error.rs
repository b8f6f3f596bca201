//! Error types for process monitoring

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for launching and monitoring a process
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to spawn a process
    #[error("failed to spawn process: {reason}")]
    SpawnFailed {
        /// The reason for the spawn failure
        reason: String,
    },

    /// Command not found
    #[error("command not found: {command}")]
    CommandNotFound {
        /// The command that was not found
        command: String,
    },

    /// A stdout/stderr redirect target could not be opened at launch time
    #[error("failed to open redirect target {}: {source}", path.display())]
    RedirectFailed {
        /// The file that could not be opened
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The process description is structurally invalid
    #[error("invalid process spec: {reason}")]
    InvalidSpec {
        /// What is wrong with the description
        reason: String,
    },

    /// The operation is only allowed before launch
    #[error("process has already been launched")]
    AlreadyLaunched,

    /// The operation needs a launched process
    #[error("process has not been launched")]
    NotLaunched,

    /// A trigger name that is not one of start, running, finished or all
    #[error("unknown trigger: {name}")]
    UnknownTrigger {
        /// The rejected name
        name: String,
    },

    /// Invalid poll configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration could not be parsed
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a spawn failed error
    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            reason: reason.into(),
        }
    }

    /// Create an invalid spec error
    pub fn invalid_spec(reason: impl Into<String>) -> Self {
        Self::InvalidSpec {
            reason: reason.into(),
        }
    }

    /// Returns true for every error that means the OS never started the process
    pub fn is_spawn_failure(&self) -> bool {
        matches!(
            self,
            Error::SpawnFailed { .. } | Error::CommandNotFound { .. } | Error::RedirectFailed { .. }
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

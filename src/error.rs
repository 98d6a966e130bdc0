//! Error taxonomy of the controller.
//!
//! Every failure is fatal: nothing here is retried, the binary reports the
//! error and exits with a nonzero status.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImpactError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error on {}: {source}", path.display())]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings file error: {0}")]
    Settings(#[from] serde_yaml::Error),

    #[error("snapshot format error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("engine error: {0}")]
    Engine(String),
}

impl ImpactError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        ImpactError::Config(message.into())
    }

    pub fn engine<S: Into<String>>(message: S) -> Self {
        ImpactError::Engine(message.into())
    }

    pub fn path<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        ImpactError::Path {
            path: path.into(),
            source,
        }
    }
}

pub type ImpactResult<T> = Result<T, ImpactError>;

use crate::model::RunId;
use std::path::PathBuf;
use thiserror::Error;

/// Every way a run (or a direct bridge request) can fail.
///
/// All variants are terminal for the run that produced them; nothing here is
/// retried beyond the watcher's bounded poll.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("simulation failed: {message}")]
    SimulationLaunch { message: String },
    #[error("output file {} is not valid JSON: {message}", path.display())]
    ResultParse { path: PathBuf, message: String },
    #[error("output file {} not found after {attempts} attempts", path.display())]
    ResultTimeout { path: PathBuf, attempts: u32 },
    #[error("run superseded by {by}")]
    Superseded { by: RunId },
    #[error("bridge controller is no longer running")]
    BridgeClosed,
}

impl BridgeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-readable tag, used in notifications and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::Io { .. } => "io",
            BridgeError::SimulationLaunch { .. } => "simulation_launch",
            BridgeError::ResultParse { .. } => "result_parse",
            BridgeError::ResultTimeout { .. } => "result_timeout",
            BridgeError::Superseded { .. } => "superseded",
            BridgeError::BridgeClosed => "bridge_closed",
        }
    }
}

// `std::io::Error` is not `Clone`; the copy keeps its kind and message.
impl Clone for BridgeError {
    fn clone(&self) -> Self {
        match self {
            BridgeError::Io { path, source } => BridgeError::Io {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            BridgeError::SimulationLaunch { message } => BridgeError::SimulationLaunch {
                message: message.clone(),
            },
            BridgeError::ResultParse { path, message } => BridgeError::ResultParse {
                path: path.clone(),
                message: message.clone(),
            },
            BridgeError::ResultTimeout { path, attempts } => BridgeError::ResultTimeout {
                path: path.clone(),
                attempts: *attempts,
            },
            BridgeError::Superseded { by } => BridgeError::Superseded { by: *by },
            BridgeError::BridgeClosed => BridgeError::BridgeClosed,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

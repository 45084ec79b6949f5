use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How to invoke the external simulator. The config file name, when there
/// is one, is appended after `args`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorCommand {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSettings {
    pub config_dir: PathBuf,
    pub result_dir: PathBuf,
    pub simulator: SimulatorCommand,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    pub max_retries: u32,
}

impl BridgeSettings {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
    pub const DEFAULT_MAX_RETRIES: u32 = 30;

    /// Settings rooted at `base`: `config_files/` and `sim_result/` beneath it.
    pub fn rooted_at(base: impl Into<PathBuf>, simulator: SimulatorCommand) -> Self {
        let base = base.into();
        Self {
            config_dir: base.join("config_files"),
            result_dir: base.join("sim_result"),
            simulator,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            max_retries: Self::DEFAULT_MAX_RETRIES,
        }
    }

    /// Per-user data directory, falling back to the working directory.
    pub fn default_base_dir() -> PathBuf {
        dirs::data_dir()
            .map(|d| d.join("house-sim"))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

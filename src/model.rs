mod config;
mod settings;

pub use config::{
    AgeGroup, Battery, BasicParameters, ConfigDocument, ElectricityDevice, NotLocalParams, Npc,
    OutOfHomePeriod, RemoteConnection, SimulationType, SolarPanels, TypeOfSimulation,
    UsagePatterns, WaterDevice, WaterHeating, WaterHeatingMethod,
};
pub use settings::{BridgeSettings, SimulatorCommand};

use crate::error::BridgeError;
use crate::identifier::HouseId;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Monotonic id of one run of the hand-off pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run#{}", self.0)
    }
}

/// Id of a presentation surface (form or results view).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionKind {
    Form,
    Results,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    ConfigWriting,
    Launching,
    Watching,
    Complete,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Complete | RunState::Failed)
    }

    /// The state reached on success from `self`, if any.
    fn successor(self) -> Option<RunState> {
        match self {
            RunState::Idle => Some(RunState::ConfigWriting),
            RunState::ConfigWriting => Some(RunState::Launching),
            RunState::Launching => Some(RunState::Watching),
            RunState::Watching => Some(RunState::Complete),
            RunState::Complete | RunState::Failed => None,
        }
    }
}

/// Rejected state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid run transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: RunState,
    pub to: RunState,
}

/// Per-run state machine. A new run always starts from a fresh instance.
#[derive(Debug, Clone)]
pub struct RunStateMachine {
    state: RunState,
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self {
            state: RunState::Idle,
        }
    }
}

impl RunStateMachine {
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Move to `next`. Only the direct successor or `Failed` (from a
    /// non-terminal state) is accepted.
    pub fn advance(&mut self, next: RunState) -> Result<RunState, InvalidTransition> {
        let ok = if next == RunState::Failed {
            !self.state.is_terminal()
        } else {
            self.state.successor() == Some(next)
        };
        if !ok {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Everything the bridge tells a presentation session.
#[derive(Debug, Clone)]
pub enum Notification {
    RunStateChanged {
        run: RunId,
        state: RunState,
    },
    SimulationOutput {
        run: RunId,
        stream: OutputStream,
        line: String,
    },
    SimulationComplete {
        run: RunId,
        path: PathBuf,
        // Shared so the same payload can seed the results session without a deep copy.
        data: Arc<serde_json::Value>,
        id: HouseId,
    },
    SimulationError {
        run: RunId,
        error: Arc<BridgeError>,
    },
    /// Initial push into a results session.
    SimulationData {
        data: Arc<serde_json::Value>,
        id: HouseId,
    },
}

impl Notification {
    pub fn run(&self) -> Option<RunId> {
        match self {
            Notification::RunStateChanged { run, .. }
            | Notification::SimulationOutput { run, .. }
            | Notification::SimulationComplete { run, .. }
            | Notification::SimulationError { run, .. } => Some(*run),
            Notification::SimulationData { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Notification::SimulationComplete { .. } | Notification::SimulationError { .. }
        )
    }
}

/// Serializable record of a finished run, used for CLI output.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run: RunId,
    pub id: HouseId,
    pub finished_at_utc: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RunSummary {
    pub fn from_notification(house: &HouseId, n: &Notification) -> Option<Self> {
        let finished_at_utc = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "now".into());
        match n {
            Notification::SimulationComplete { run, path, data, id } => Some(Self {
                run: *run,
                id: id.clone(),
                finished_at_utc,
                ok: true,
                path: Some(path.clone()),
                error_kind: None,
                error: None,
                data: Some(data.as_ref().clone()),
            }),
            Notification::SimulationError { run, error } => Some(Self {
                run: *run,
                id: house.clone(),
                finished_at_utc,
                ok: false,
                path: None,
                error_kind: Some(error.kind()),
                error: Some(error.to_string()),
                data: None,
            }),
            _ => None,
        }
    }
}

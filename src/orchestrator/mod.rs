//! The bridge between presentation layers and the run pipeline.
//!
//! Presentation layers never touch the filesystem or spawn processes; they
//! hold a [`BridgeHandle`] and one [`Session`] per surface. The controller
//! task owns everything else.

mod controller;
mod post_process;
mod sessions;

pub use sessions::Session;

use crate::engine::read_result_file;
use crate::error::{BridgeError, Result};
use crate::identifier::HouseId;
use crate::model::{BridgeSettings, ConfigDocument, RunId, SessionId, SessionKind};
use controller::{run_controller, BridgeCommand};
use std::path::PathBuf;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

/// Events for the host that owns the presentation surfaces.
#[derive(Debug)]
pub enum HostEvent {
    /// The bridge opened a surface on its own, e.g. a results view after a run.
    SessionOpened(Session),
    SessionClosed(SessionId),
}

pub struct Bridge;

impl Bridge {
    /// Spawn the controller on the current runtime.
    pub fn start(settings: BridgeSettings) -> (BridgeHandle, UnboundedReceiver<HostEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (host_tx, host_rx) = mpsc::unbounded_channel();
        let result_dir = settings.result_dir.clone();
        tokio::spawn(run_controller(settings, cmd_rx, host_tx));
        (BridgeHandle { cmd_tx, result_dir }, host_rx)
    }
}

/// The only API presentation layers call.
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    cmd_tx: UnboundedSender<BridgeCommand>,
    result_dir: PathBuf,
}

impl BridgeHandle {
    fn send(&self, cmd: BridgeCommand) -> Result<()> {
        self.cmd_tx.send(cmd).map_err(|_| BridgeError::BridgeClosed)
    }

    pub async fn open_form_session(&self) -> Result<Session> {
        let (reply, rx) = oneshot::channel();
        self.send(BridgeCommand::OpenSession {
            kind: SessionKind::Form,
            reply,
        })?;
        rx.await.map_err(|_| BridgeError::BridgeClosed)
    }

    /// Open a results view directly with data the caller already has.
    pub async fn open_results_session(
        &self,
        id: HouseId,
        data: serde_json::Value,
    ) -> Result<Session> {
        let (reply, rx) = oneshot::channel();
        self.send(BridgeCommand::OpenResults { id, data, reply })?;
        rx.await.map_err(|_| BridgeError::BridgeClosed)
    }

    /// Destroy a session. Runs it started are cancelled.
    pub fn close_session(&self, id: SessionId) {
        if self.send(BridgeCommand::CloseSession(id)).is_err() {
            tracing::debug!(%id, "bridge already closed");
        }
    }

    /// Write the config file and start the simulation for it.
    ///
    /// Resolves once the file is on disk with the run that owns it; the
    /// launch and watch continue in the background and report to `session`.
    pub async fn save_config(
        &self,
        session: SessionId,
        doc: ConfigDocument,
    ) -> Result<(RunId, PathBuf)> {
        let (reply, rx) = oneshot::channel();
        self.send(BridgeCommand::SaveConfig {
            session,
            doc: Box::new(doc),
            reply,
        })?;
        rx.await.map_err(|_| BridgeError::BridgeClosed)?
    }

    /// Start the simulator with its built-in house. Outcomes arrive on `session`.
    pub async fn run_default_simulation(&self, session: SessionId) -> Result<RunId> {
        let (reply, rx) = oneshot::channel();
        self.send(BridgeCommand::RunDefault { session, reply })
            .inspect_err(|_| {
                tracing::warn!(%session, "bridge closed; default simulation not started");
            })?;
        rx.await.map_err(|_| BridgeError::BridgeClosed)
    }

    /// Re-read a previously produced result, independent of any run.
    pub async fn load_sim_data(&self, id: &HouseId) -> Result<serde_json::Value> {
        let path = self.result_dir.join(id.output_file_name());
        read_result_file(&path).await.inspect_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "error reading simulation data");
        })
    }

    /// Cancel every live run and stop the controller.
    pub fn shutdown(&self) {
        let _ = self.send(BridgeCommand::Shutdown);
    }
}

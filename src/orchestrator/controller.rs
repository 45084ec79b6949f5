//! Bridge controller.
//!
//! Owns every piece of mutable bridge state and serializes access to it:
//! commands from presentation layers and progress from pipeline tasks are
//! handled one at a time in a single task.

use super::post_process::{open_results_session, process_run_completion};
use super::sessions::{ActiveRun, RunRegistry, Session, SessionRegistry};
use super::HostEvent;
use crate::engine::{PipelineEvent, PipelineSink, RunPipeline, RunRequest};
use crate::error::{BridgeError, Result};
use crate::identifier::HouseId;
use crate::model::{
    BridgeSettings, ConfigDocument, Notification, RunId, RunState, SessionId, SessionKind,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

/// Requests presentation layers send through a [`super::BridgeHandle`].
#[derive(Debug)]
pub(crate) enum BridgeCommand {
    OpenSession {
        kind: SessionKind,
        reply: oneshot::Sender<Session>,
    },
    OpenResults {
        id: HouseId,
        data: serde_json::Value,
        reply: oneshot::Sender<Session>,
    },
    CloseSession(SessionId),
    SaveConfig {
        session: SessionId,
        doc: Box<ConfigDocument>,
        reply: oneshot::Sender<Result<(RunId, PathBuf)>>,
    },
    RunDefault {
        session: SessionId,
        reply: oneshot::Sender<RunId>,
    },
    Shutdown,
}

struct Controller {
    settings: BridgeSettings,
    sessions: SessionRegistry,
    runs: RunRegistry,
    // save_config callers waiting for the config file to land
    pending_saves: HashMap<RunId, oneshot::Sender<Result<(RunId, PathBuf)>>>,
    next_run: u64,
    pipeline_tx: UnboundedSender<(RunId, PipelineEvent)>,
    host_tx: UnboundedSender<HostEvent>,
}

/// Run until shut down or until every handle is dropped.
pub(crate) async fn run_controller(
    settings: BridgeSettings,
    mut cmd_rx: UnboundedReceiver<BridgeCommand>,
    host_tx: UnboundedSender<HostEvent>,
) {
    let (pipeline_tx, mut pipeline_rx) = mpsc::unbounded_channel();
    let mut ctl = Controller {
        settings,
        sessions: SessionRegistry::default(),
        runs: RunRegistry::default(),
        pending_saves: HashMap::new(),
        next_run: 0,
        pipeline_tx,
        host_tx,
    };

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(BridgeCommand::Shutdown) | None => break,
                Some(cmd) => ctl.handle_command(cmd),
            },
            // The controller keeps a sender, so this branch never yields None.
            Some((run, event)) = pipeline_rx.recv() => ctl.handle_pipeline(run, event),
        }
    }

    ctl.shutdown();
}

impl Controller {
    fn handle_command(&mut self, cmd: BridgeCommand) {
        match cmd {
            BridgeCommand::OpenSession { kind, reply } => {
                let session = self.sessions.create(kind);
                let _ = reply.send(session);
            }
            BridgeCommand::OpenResults { id, data, reply } => {
                let session = open_results_session(&mut self.sessions, id, Arc::new(data));
                let _ = reply.send(session);
            }
            BridgeCommand::CloseSession(id) => {
                for orphan in self.runs.remove_session(id) {
                    tracing::info!(run = %orphan.run, house = %orphan.id, "session closed; run cancelled");
                    if let Some(reply) = self.pending_saves.remove(&orphan.run) {
                        let _ = reply.send(Err(BridgeError::BridgeClosed));
                    }
                }
                self.sessions.destroy(id);
            }
            BridgeCommand::SaveConfig {
                session,
                doc,
                reply,
            } => {
                let run = self.start_run(session, RunRequest::Configured(doc));
                self.pending_saves.insert(run, reply);
            }
            BridgeCommand::RunDefault { session, reply } => {
                let run = self.start_run(session, RunRequest::Default);
                let _ = reply.send(run);
            }
            BridgeCommand::Shutdown => {}
        }
    }

    fn start_run(&mut self, session: SessionId, request: RunRequest) -> RunId {
        self.next_run += 1;
        let run = RunId(self.next_run);
        let pipeline = RunPipeline::new(&self.settings, request);
        let id = pipeline.id().clone();
        tracing::info!(%run, %session, house = %id, "starting run");

        let handle = pipeline.spawn(PipelineSink::new(run, self.pipeline_tx.clone()));
        let displaced = self.runs.insert(ActiveRun {
            run,
            session,
            id,
            handle,
        });
        if let Some(old) = displaced {
            self.supersede(old, run);
        }
        run
    }

    /// Report the terminal outcome of a run that lost its identifier.
    fn supersede(&mut self, old: ActiveRun, by: RunId) {
        tracing::info!(run = %old.run, %by, house = %old.id, "run superseded");
        let error = BridgeError::Superseded { by };
        if let Some(reply) = self.pending_saves.remove(&old.run) {
            let _ = reply.send(Err(error.clone()));
        }
        self.sessions.deliver(
            old.session,
            Notification::RunStateChanged {
                run: old.run,
                state: RunState::Failed,
            },
        );
        self.sessions.deliver(
            old.session,
            Notification::SimulationError {
                run: old.run,
                error: Arc::new(error),
            },
        );
    }

    fn handle_pipeline(&mut self, run: RunId, event: PipelineEvent) {
        let Some(active) = self.runs.get(run) else {
            // Cancelled or superseded; its outcome has already been reported.
            tracing::debug!(%run, "ignoring event from stale run");
            return;
        };
        let session = active.session;

        match event {
            PipelineEvent::State(state) => {
                self.sessions
                    .deliver(session, Notification::RunStateChanged { run, state });
            }
            PipelineEvent::ConfigSaved(path) => {
                if let Some(reply) = self.pending_saves.remove(&run) {
                    let _ = reply.send(Ok((run, path)));
                }
            }
            PipelineEvent::Output { stream, line } => {
                self.sessions
                    .deliver(session, Notification::SimulationOutput { run, stream, line });
            }
            PipelineEvent::Finished(result) => {
                let Some(active) = self.runs.remove(run) else {
                    return;
                };
                match result {
                    Ok(Some(report)) => {
                        tracing::info!(%run, house = %active.id, attempts = report.attempts, "run complete");
                        process_run_completion(
                            &mut self.sessions,
                            &self.host_tx,
                            session,
                            run,
                            active.id,
                            report,
                        );
                    }
                    Ok(None) => {
                        // Only a cancelled watch ends this way, and cancelled runs are
                        // never in the registry.
                        tracing::warn!(%run, "run ended without an outcome");
                        self.fail(session, run, BridgeError::BridgeClosed);
                    }
                    Err(e) => self.fail(session, run, e),
                }
            }
        }
    }

    fn fail(&mut self, session: SessionId, run: RunId, error: BridgeError) {
        // A failure before the config landed is also the save_config result.
        if let Some(reply) = self.pending_saves.remove(&run) {
            let _ = reply.send(Err(error.clone()));
        }
        self.sessions.deliver(
            session,
            Notification::SimulationError {
                run,
                error: Arc::new(error),
            },
        );
    }

    fn shutdown(&mut self) {
        let cancelled = self.runs.drain();
        if !cancelled.is_empty() {
            tracing::info!(count = cancelled.len(), "cancelling live runs on shutdown");
        }
        for active in cancelled {
            self.fail(active.session, active.run, BridgeError::BridgeClosed);
        }
        self.sessions.clear();
    }
}

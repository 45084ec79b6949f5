mod launcher;
mod watcher;
mod writer;

pub use launcher::{LaunchReport, SimulationLauncher};
pub use watcher::{read_result_file, ResultWatcher, WatchReport};
pub use writer::ConfigWriter;

use crate::error::Result;
use crate::identifier::HouseId;
use crate::model::{BridgeSettings, ConfigDocument, OutputStream, RunId, RunState, RunStateMachine};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::mpsc;

/// What a run was asked to do.
#[derive(Debug, Clone)]
pub enum RunRequest {
    /// Write the document, then launch with its file name.
    Configured(Box<ConfigDocument>),
    /// Launch with no argument; the simulator picks its built-in house.
    Default,
}

/// Progress reported by a pipeline task to the controller.
#[derive(Debug)]
pub enum PipelineEvent {
    State(RunState),
    ConfigSaved(PathBuf),
    Output { stream: OutputStream, line: String },
    /// Always the last event. `Ok(None)` means the run was cancelled.
    Finished(Result<Option<WatchReport>>),
}

/// Tags every event with the run that produced it.
#[derive(Debug, Clone)]
pub struct PipelineSink {
    run: RunId,
    tx: mpsc::UnboundedSender<(RunId, PipelineEvent)>,
}

impl PipelineSink {
    pub fn new(run: RunId, tx: mpsc::UnboundedSender<(RunId, PipelineEvent)>) -> Self {
        Self { run, tx }
    }

    pub fn send(&self, event: PipelineEvent) {
        let _ = self.tx.send((self.run, event));
    }
}

/// Cancels a spawned pipeline. After [`RunHandle::cancel`] the task produces
/// no further events.
#[derive(Debug)]
pub struct RunHandle {
    cancel: Arc<AtomicBool>,
    task: tokio::task::JoinHandle<()>,
}

impl RunHandle {
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
        // Aborting drops the launcher future too, which kills a running child.
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// One run of the hand-off: write config → launch simulator → watch for output.
pub struct RunPipeline {
    id: HouseId,
    request: RunRequest,
    writer: ConfigWriter,
    launcher: SimulationLauncher,
    watcher: ResultWatcher,
}

impl RunPipeline {
    /// The identifier is derived here, once, and reused by every stage.
    pub fn new(settings: &BridgeSettings, request: RunRequest) -> Self {
        let id = match &request {
            RunRequest::Configured(doc) => doc.house_id(),
            RunRequest::Default => HouseId::default_run(),
        };
        let watcher = ResultWatcher::new(
            settings.result_dir.join(id.output_file_name()),
            settings.poll_interval,
            settings.max_retries,
        );
        Self {
            id,
            request,
            writer: ConfigWriter::new(&settings.config_dir),
            launcher: SimulationLauncher::new(settings.simulator.clone()),
            watcher,
        }
    }

    pub fn id(&self) -> &HouseId {
        &self.id
    }

    pub fn spawn(self, sink: PipelineSink) -> RunHandle {
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();
        let task = tokio::spawn(async move {
            let result = self.run(&sink, &flag).await;
            sink.send(PipelineEvent::Finished(result));
        });
        RunHandle { cancel, task }
    }

    pub async fn run(self, sink: &PipelineSink, cancel: &AtomicBool) -> Result<Option<WatchReport>> {
        let mut machine = RunStateMachine::default();
        let result = self.stages(&mut machine, sink, cancel).await;
        match &result {
            Ok(Some(_)) => enter(&mut machine, RunState::Complete, sink),
            Ok(None) => {}
            Err(e) => {
                tracing::error!(id = %self.id, error = %e, "run failed");
                enter(&mut machine, RunState::Failed, sink);
            }
        }
        result
    }

    async fn stages(
        &self,
        machine: &mut RunStateMachine,
        sink: &PipelineSink,
        cancel: &AtomicBool,
    ) -> Result<Option<WatchReport>> {
        enter(machine, RunState::ConfigWriting, sink);
        let arg = match &self.request {
            RunRequest::Configured(doc) => {
                let path = self.writer.write(&self.id, doc).await?;
                sink.send(PipelineEvent::ConfigSaved(path));
                Some(self.id.config_file_name())
            }
            RunRequest::Default => None,
        };

        enter(machine, RunState::Launching, sink);
        self.launcher.launch(arg.as_deref(), sink).await?;

        enter(machine, RunState::Watching, sink);
        self.watcher.watch(cancel).await
    }
}

fn enter(machine: &mut RunStateMachine, state: RunState, sink: &PipelineSink) {
    match machine.advance(state) {
        Ok(state) => sink.send(PipelineEvent::State(state)),
        Err(e) => tracing::error!(error = %e, "run state machine rejected transition"),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::model::SimulatorCommand;
    use std::time::Duration;

    fn settings(base: &std::path::Path, script: &str) -> BridgeSettings {
        let mut s = BridgeSettings::rooted_at(
            base,
            SimulatorCommand {
                program: "sh".into(),
                args: vec!["-c".into(), script.into(), "sim".into()],
                working_dir: Some(base.to_path_buf()),
            },
        );
        s.poll_interval = Duration::from_millis(20);
        s.max_retries = 10;
        s
    }

    async fn drain(mut rx: mpsc::UnboundedReceiver<(RunId, PipelineEvent)>) -> Vec<PipelineEvent> {
        let mut out = Vec::new();
        while let Some((_, ev)) = rx.recv().await {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn configured_run_uses_one_identifier_throughout() {
        let tmp = tempfile::tempdir().expect("tempdir");
        // Echo the config name back into the result so the test can see it.
        let s = settings(
            tmp.path(),
            r#"mkdir -p sim_result && n="${1%.json}" && printf '{"from":"%s"}' "$1" > "sim_result/${n}_output.json""#,
        );
        let mut doc = ConfigDocument::default();
        doc.basic_parameters.name = "Test House".into();

        let pipeline = RunPipeline::new(&s, RunRequest::Configured(Box::new(doc)));
        assert_eq!(pipeline.id().as_str(), "test_house");

        let (tx, rx) = mpsc::unbounded_channel();
        let sink = PipelineSink::new(RunId(1), tx);
        let report = pipeline
            .run(&sink, &AtomicBool::new(false))
            .await
            .expect("run")
            .expect("not cancelled");
        drop(sink);

        assert_eq!(report.path, s.result_dir.join("test_house_output.json"));
        assert_eq!(report.data["from"], "test_house.json");
        assert!(s.config_dir.join("test_house.json").exists());

        let states: Vec<RunState> = drain(rx)
            .await
            .into_iter()
            .filter_map(|e| match e {
                PipelineEvent::State(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                RunState::ConfigWriting,
                RunState::Launching,
                RunState::Watching,
                RunState::Complete
            ]
        );
    }

    #[tokio::test]
    async fn failed_launch_never_watches() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let s = settings(tmp.path(), "exit 2");
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = PipelineSink::new(RunId(7), tx);
        let err = RunPipeline::new(&s, RunRequest::Default)
            .run(&sink, &AtomicBool::new(false))
            .await
            .unwrap_err();
        drop(sink);
        assert!(matches!(err, BridgeError::SimulationLaunch { .. }));

        let events = drain(rx).await;
        assert!(!events
            .iter()
            .any(|e| matches!(e, PipelineEvent::State(RunState::Watching))));
        assert!(matches!(
            events.last(),
            Some(PipelineEvent::State(RunState::Failed))
        ));
    }

    #[tokio::test]
    async fn cancelled_handle_emits_nothing_more() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let s = settings(tmp.path(), "sleep 5");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = RunPipeline::new(&s, RunRequest::Default).spawn(PipelineSink::new(RunId(3), tx));

        // Wait until the child is running.
        loop {
            match rx.recv().await {
                Some((_, PipelineEvent::State(RunState::Launching))) => break,
                Some(_) => continue,
                None => panic!("pipeline ended early"),
            }
        }
        handle.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished());
        // The aborted task dropped its sender without sending Finished.
        assert!(rx.recv().await.is_none());
    }
}

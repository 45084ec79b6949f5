use super::{PipelineEvent, PipelineSink};
use crate::error::{BridgeError, Result};
use crate::model::{OutputStream, SimulatorCommand};
use std::collections::VecDeque;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// Stderr lines kept for the failure message.
const STDERR_TAIL: usize = 5;

#[derive(Debug, Clone)]
pub struct LaunchReport {
    pub stdout_lines: usize,
    pub stderr_lines: usize,
}

/// Runs the external simulator and waits for it to exit.
pub struct SimulationLauncher {
    cmd: SimulatorCommand,
}

impl SimulationLauncher {
    pub fn new(cmd: SimulatorCommand) -> Self {
        Self { cmd }
    }

    /// Launch with an optional config file name as the final argument.
    ///
    /// Output is forwarded as it arrives. Only the exit status decides the
    /// outcome. Dropping the returned future kills the child.
    pub async fn launch(
        &self,
        config_file_name: Option<&str>,
        sink: &PipelineSink,
    ) -> Result<LaunchReport> {
        let program = &self.cmd.program;
        let mut cmd = Command::new(program);
        cmd.args(&self.cmd.args);
        if let Some(name) = config_file_name {
            cmd.arg(name);
        }
        if let Some(dir) = &self.cmd.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::info!(
            program = %program.display(),
            config = config_file_name.unwrap_or("<default>"),
            "launching simulation"
        );

        let mut child = cmd.spawn().map_err(|e| BridgeError::SimulationLaunch {
            message: format!("failed to start {}: {e}", program.display()),
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (status, (stdout_lines, _), (stderr_lines, tail)) = tokio::join!(
            child.wait(),
            forward_lines(stdout, OutputStream::Stdout, sink),
            forward_lines(stderr, OutputStream::Stderr, sink),
        );
        let status = status.map_err(|e| BridgeError::SimulationLaunch {
            message: format!("failed to wait for {}: {e}", program.display()),
        })?;

        if status.success() {
            tracing::info!(stdout_lines, stderr_lines, "simulation exited cleanly");
            return Ok(LaunchReport {
                stdout_lines,
                stderr_lines,
            });
        }

        let mut message = match status.code() {
            Some(code) => format!("{} exited with status {code}", program.display()),
            None => format!("{} was terminated by a signal", program.display()),
        };
        if let Some(last) = tail.back() {
            message.push_str(": ");
            message.push_str(last);
        }
        Err(BridgeError::SimulationLaunch { message })
    }
}

/// Forward every line of `reader`; returns the line count and the last few lines.
async fn forward_lines<R>(
    reader: Option<R>,
    stream: OutputStream,
    sink: &PipelineSink,
) -> (usize, VecDeque<String>)
where
    R: AsyncRead + Unpin,
{
    let mut count = 0;
    let mut tail = VecDeque::with_capacity(STDERR_TAIL);
    let Some(reader) = reader else {
        return (count, tail);
    };
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                count += 1;
                match stream {
                    OutputStream::Stdout => tracing::debug!(target: "simulator", "{line}"),
                    OutputStream::Stderr => tracing::warn!(target: "simulator", "{line}"),
                }
                if tail.len() == STDERR_TAIL {
                    tail.pop_front();
                }
                tail.push_back(line.clone());
                sink.send(PipelineEvent::Output { stream, line });
            }
            Ok(None) => break,
            Err(e) => {
                // Non UTF-8 output or a closed pipe; the exit status still decides.
                tracing::debug!(?stream, error = %e, "stopped reading simulator output");
                break;
            }
        }
    }
    (count, tail)
}

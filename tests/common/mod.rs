#![allow(dead_code)]

use house_sim_bridge::model::{BridgeSettings, ConfigDocument, Notification, SimulatorCommand};
use house_sim_bridge::Session;
use std::time::Duration;
use tempfile::TempDir;

/// Writes `<id>_output.json` for the config it is given (or the default house)
/// and records every invocation in `calls.log`.
pub const WRITES_OUTPUT: &str = r##"
echo "$#:$*" >> calls.log
if [ "$#" -gt 0 ]; then n="${1%.json}"; else n="john_doe's_smart_house"; fi
mkdir -p sim_result
printf '{"house":"%s","total_kwh":12.5}\n' "$n" > "sim_result/${n}_output.json"
echo "simulated $n"
"##;

pub struct Sandbox {
    pub dir: TempDir,
    pub settings: BridgeSettings,
}

impl Sandbox {
    pub fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// A temp base dir with a shell-script simulator running inside it.
pub fn sandbox(script: &str) -> Sandbox {
    let dir = tempfile::tempdir().expect("tempdir");
    let script_path = dir.path().join("sim.sh");
    std::fs::write(&script_path, script).expect("write sim script");
    let mut settings = BridgeSettings::rooted_at(
        dir.path(),
        SimulatorCommand {
            program: "sh".into(),
            args: vec![script_path.display().to_string()],
            working_dir: Some(dir.path().to_path_buf()),
        },
    );
    settings.poll_interval = Duration::from_millis(20);
    settings.max_retries = 50;
    Sandbox { dir, settings }
}

pub fn house(name: &str) -> ConfigDocument {
    let mut doc = ConfigDocument::default();
    doc.basic_parameters.name = name.to_string();
    doc.basic_parameters.number_of_people = 2;
    doc
}

/// Collect notifications up to and including the first terminal one.
pub async fn until_terminal(session: &mut Session) -> Vec<Notification> {
    let mut seen = Vec::new();
    let fut = async {
        while let Some(n) = session.recv().await {
            let done = n.is_terminal();
            seen.push(n);
            if done {
                break;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(10), fut)
        .await
        .expect("run did not finish in time");
    seen
}

pub fn terminal_count(events: &[Notification]) -> usize {
    events.iter().filter(|n| n.is_terminal()).count()
}

//! Post-run processing.
//!
//! A completed run tells its form session, hands the data to a freshly opened
//! results session and retires the form, the same sequence the desktop shell
//! follows.

use super::sessions::{Session, SessionRegistry};
use super::HostEvent;
use crate::engine::WatchReport;
use crate::identifier::HouseId;
use crate::model::{Notification, RunId, SessionId, SessionKind};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Open a results session seeded with `data` as its first notification.
pub(crate) fn open_results_session(
    sessions: &mut SessionRegistry,
    id: HouseId,
    data: Arc<serde_json::Value>,
) -> Session {
    let session = sessions.create(SessionKind::Results);
    sessions.deliver(session.id, Notification::SimulationData { data, id });
    session
}

/// Deliver a successful run and move the user on to the results view.
pub(crate) fn process_run_completion(
    sessions: &mut SessionRegistry,
    host_tx: &UnboundedSender<HostEvent>,
    origin: SessionId,
    run: RunId,
    id: HouseId,
    report: WatchReport,
) {
    let data = Arc::new(report.data);
    sessions.deliver(
        origin,
        Notification::SimulationComplete {
            run,
            path: report.path,
            data: data.clone(),
            id: id.clone(),
        },
    );

    let results = open_results_session(sessions, id, data);
    tracing::info!(%run, form = %origin, results = %results.id, "opening results view");
    if host_tx.send(HostEvent::SessionOpened(results)).is_err() {
        tracing::warn!(%run, "host is gone; results view not shown");
    }

    if sessions.kind(origin) == Some(SessionKind::Form) {
        sessions.destroy(origin);
        let _ = host_tx.send(HostEvent::SessionClosed(origin));
    }
}

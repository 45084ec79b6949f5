//! Presentation sessions and the live-run registry.
//!
//! Both registries are owned by the controller task; nothing else mutates them.

use crate::engine::RunHandle;
use crate::identifier::HouseId;
use crate::model::{Notification, RunId, SessionId, SessionKind};
use std::collections::HashMap;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// A presentation surface's end of the bridge. Dropping it (or closing it
/// through the bridge) ends delivery.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub kind: SessionKind,
    events: UnboundedReceiver<Notification>,
}

impl Session {
    /// Next notification, or `None` once the session is closed.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.events.recv().await
    }

    /// Skip diagnostics until a run's terminal notification arrives.
    pub async fn recv_terminal(&mut self) -> Option<Notification> {
        while let Some(n) = self.events.recv().await {
            if n.is_terminal() {
                return Some(n);
            }
        }
        None
    }

    /// Like [`Session::recv_terminal`], but only `run`'s outcome ends the
    /// wait. A resubmission from the same session leaves the superseded run's
    /// error in the queue ahead of it.
    pub async fn recv_terminal_for(&mut self, run: RunId) -> Option<Notification> {
        while let Some(n) = self.events.recv().await {
            if n.is_terminal() && n.run() == Some(run) {
                return Some(n);
            }
        }
        None
    }

    pub fn try_recv(&mut self) -> Option<Notification> {
        self.events.try_recv().ok()
    }
}

struct SessionEntry {
    kind: SessionKind,
    tx: UnboundedSender<Notification>,
}

#[derive(Default)]
pub(crate) struct SessionRegistry {
    next_id: u64,
    sessions: HashMap<SessionId, SessionEntry>,
}

impl SessionRegistry {
    pub fn create(&mut self, kind: SessionKind) -> Session {
        self.next_id += 1;
        let id = SessionId(self.next_id);
        let (tx, events) = mpsc::unbounded_channel();
        self.sessions.insert(id, SessionEntry { kind, tx });
        tracing::debug!(%id, ?kind, "session opened");
        Session { id, kind, events }
    }

    pub fn destroy(&mut self, id: SessionId) -> bool {
        let removed = self.sessions.remove(&id).is_some();
        if removed {
            tracing::debug!(%id, "session closed");
        }
        removed
    }

    pub fn kind(&self, id: SessionId) -> Option<SessionKind> {
        self.sessions.get(&id).map(|s| s.kind)
    }

    /// Deliver to one session. Closed or dropped sessions are forgotten.
    pub fn deliver(&mut self, id: SessionId, n: Notification) {
        let Some(entry) = self.sessions.get(&id) else {
            tracing::debug!(%id, "dropping notification for closed session");
            return;
        };
        if entry.tx.send(n).is_err() {
            tracing::debug!(%id, "session receiver gone, closing");
            self.sessions.remove(&id);
        }
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}

/// A run that still owns its identifier.
pub(crate) struct ActiveRun {
    pub run: RunId,
    pub session: SessionId,
    pub id: HouseId,
    pub handle: RunHandle,
}

/// At most one live run per derived identifier.
#[derive(Default)]
pub(crate) struct RunRegistry {
    by_house: HashMap<HouseId, ActiveRun>,
    house_of: HashMap<RunId, HouseId>,
}

impl RunRegistry {
    /// Register `active`, returning the run it displaces, if any. The caller
    /// is responsible for reporting the displaced run's outcome.
    pub fn insert(&mut self, active: ActiveRun) -> Option<ActiveRun> {
        self.house_of.insert(active.run, active.id.clone());
        let previous = self.by_house.insert(active.id.clone(), active);
        if let Some(prev) = &previous {
            self.house_of.remove(&prev.run);
            prev.handle.cancel();
        }
        previous
    }

    pub fn get(&self, run: RunId) -> Option<&ActiveRun> {
        let house = self.house_of.get(&run)?;
        self.by_house.get(house)
    }

    pub fn remove(&mut self, run: RunId) -> Option<ActiveRun> {
        let house = self.house_of.remove(&run)?;
        self.by_house.remove(&house)
    }

    /// Cancel and remove every run started from `session`.
    pub fn remove_session(&mut self, session: SessionId) -> Vec<ActiveRun> {
        let runs: Vec<RunId> = self
            .by_house
            .values()
            .filter(|a| a.session == session)
            .map(|a| a.run)
            .collect();
        runs.into_iter()
            .filter_map(|r| self.remove(r))
            .inspect(|a| a.handle.cancel())
            .collect()
    }

    pub fn drain(&mut self) -> Vec<ActiveRun> {
        self.house_of.clear();
        self.by_house
            .drain()
            .map(|(_, a)| {
                a.handle.cancel();
                a
            })
            .collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.by_house.len()
    }
}

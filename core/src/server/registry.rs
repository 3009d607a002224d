use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tokio::sync::mpsc;

use crate::agent::{DriverEvent, Phase, PhaseTracker};
use crate::server::protocol::Outbound;

pub type SessionId = String;

#[derive(Debug, Default)]
pub struct SessionState {
    pub tracker: PhaseTracker,
    pub turn_active: bool,
}

pub struct Session {
    id: SessionId,
    outbound: mpsc::UnboundedSender<Outbound>,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a frame for the socket writer. False once the writer is gone.
    pub fn send(&self, frame: impl Into<Outbound>) -> bool {
        self.outbound.send(frame.into()).is_ok()
    }

    pub fn try_begin_turn(&self) -> bool {
        let mut state = self.state();
        if state.turn_active {
            return false;
        }
        state.turn_active = true;
        state.tracker.begin_turn();
        true
    }

    pub fn end_turn(&self) {
        self.state().turn_active = false;
    }

    pub fn is_busy(&self) -> bool {
        self.state().turn_active
    }

    pub fn on_driver_event(&self, event: DriverEvent) -> Phase {
        self.state().tracker.on_event(event)
    }

    pub fn set_phase(&self, phase: Phase) -> Phase {
        self.state().tracker.set(phase)
    }

    pub fn phase(&self) -> Phase {
        self.state().tracker.current()
    }
}

/// Ends a session's turn when dropped, so a turn task that panics still frees
/// the session.
pub struct TurnGuard {
    registry: ConnectionRegistry,
    session_id: SessionId,
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        if let Some(session) = self.registry.get(&self.session_id) {
            session.end_turn();
        }
    }
}

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    sessions: Arc<RwLock<HashMap<SessionId, Arc<Session>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, outbound: mpsc::UnboundedSender<Outbound>) -> Arc<Session> {
        let session = Arc::new(Session {
            id: uuid::Uuid::new_v4().to_string(),
            outbound,
            state: Mutex::new(SessionState::default()),
        });

        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.id.clone(), session.clone());
        session
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    /// Starts a turn on the session unless one is running or the session is gone.
    pub fn try_begin_turn(&self, id: &str) -> Option<TurnGuard> {
        let session = self.get(id)?;
        session.try_begin_turn().then(|| TurnGuard {
            registry: self.clone(),
            session_id: session.id.clone(),
        })
    }

    pub fn deliver(&self, id: &str, frame: impl Into<Outbound>) -> bool {
        match self.get(id) {
            Some(session) => session.send(frame),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

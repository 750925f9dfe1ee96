//! Registry of live camera sessions
//!
//! An id is present exactly while a starting or streaming session holds it.
//! Removal is the signal that a session is over, so removals that race a
//! newer session with the same id go through [`SessionRegistry::remove_if_same`].

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::identity::SessionId;
use crate::session::CameraSession;

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<CameraSession>>>,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that admits at most `max_sessions` sessions (0 = unlimited)
    pub fn with_limit(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
        }
    }

    /// Insert a session unless its id is already taken or the registry is full
    pub async fn register(&self, session: Arc<CameraSession>) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(session.id()) {
            return Err(Error::SessionAlreadyActive(session.id().clone()));
        }
        if self.max_sessions > 0 && sessions.len() >= self.max_sessions {
            return Err(Error::SessionLimitReached(sessions.len()));
        }
        sessions.insert(session.id().clone(), session);
        Ok(())
    }

    pub async fn get(&self, id: &SessionId) -> Option<Arc<CameraSession>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Remove the entry for `session` only if it still refers to that session
    pub async fn remove_if_same(&self, session: &Arc<CameraSession>) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(session.id()) {
            Some(current) if Arc::ptr_eq(current, session) => {
                sessions.remove(session.id());
                true
            }
            _ => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Remove and return every session
    pub async fn drain(&self) -> Vec<Arc<CameraSession>> {
        self.sessions
            .write()
            .await
            .drain()
            .map(|(_, session)| session)
            .collect()
    }
}

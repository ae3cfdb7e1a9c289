//! In-memory session map with blob persistence.

use indexmap::IndexMap;
use parapet_core::{SessionId, Timestamp};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Session store error
#[derive(Debug, Error)]
pub enum SessionError {
    /// Persistence was requested but no scratch directory is configured
    #[error("no scratch directory configured for session persistence")]
    MissingScratchDir,

    /// Filesystem failure while persisting
    #[error("session io failure: {0}")]
    Io(#[from] std::io::Error),

    /// A session could not be encoded
    #[error("session encode failure: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One session's bindings and bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Named bindings, insertion-ordered
    pub bindings: IndexMap<String, serde_json::Value>,
    /// Last time this session was read or written
    pub last_access: Timestamp,
}

impl SessionState {
    fn fresh() -> Self {
        Self {
            bindings: IndexMap::new(),
            last_access: Timestamp::now(),
        }
    }
}

/// Thread-safe map of sessions with optional file persistence.
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: RwLock<IndexMap<SessionId, SessionState>>,
    scratch_dir: Option<PathBuf>,
}

impl SessionStore {
    /// Build an in-memory store without persistence
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the scratch directory session blobs are written under
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Current bindings of a session, creating it on first reference
    #[must_use]
    pub fn get(&self, id: &SessionId) -> IndexMap<String, serde_json::Value> {
        let mut sessions = self.inner.write().unwrap();
        let state = sessions
            .entry(id.clone())
            .or_insert_with(SessionState::fresh);
        state.last_access = Timestamp::now();
        state.bindings.clone()
    }

    /// Merge bindings into a session; same-named entries are overwritten
    pub fn merge(&self, id: &SessionId, bindings: IndexMap<String, serde_json::Value>) {
        let mut sessions = self.inner.write().unwrap();
        let state = sessions
            .entry(id.clone())
            .or_insert_with(SessionState::fresh);
        state.bindings.extend(bindings);
        state.last_access = Timestamp::now();
    }

    /// Drop a session's in-memory state
    pub fn clear(&self, id: &SessionId) {
        self.inner.write().unwrap().shift_remove(id);
    }

    /// Refresh a session's last-access time
    pub fn touch(&self, id: &SessionId) {
        if let Some(state) = self.inner.write().unwrap().get_mut(id) {
            state.last_access = Timestamp::now();
        }
    }

    /// Drop every session idle for longer than `max_idle`, returning how
    /// many were removed
    pub fn expire_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.inner.write().unwrap();
        let before = sessions.len();
        sessions.retain(|id, state| {
            let keep = state.last_access.age_seconds() <= max_idle.as_secs();
            if !keep {
                debug!(session = %id, "expiring idle session");
            }
            keep
        });
        before - sessions.len()
    }

    /// Number of live sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    /// Whether no sessions are live
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }

    /// Whether a session exists in memory
    #[must_use]
    pub fn contains(&self, id: &SessionId) -> bool {
        self.inner.read().unwrap().contains_key(id)
    }

    /// Write a session's blob to the scratch directory
    ///
    /// # Errors
    ///
    /// Returns error when no scratch directory is configured or the write
    /// fails
    pub fn persist(&self, id: &SessionId) -> Result<(), SessionError> {
        let dir = self
            .scratch_dir
            .as_deref()
            .ok_or(SessionError::MissingScratchDir)?;
        let state = {
            let sessions = self.inner.read().unwrap();
            sessions.get(id).cloned().unwrap_or_else(SessionState::fresh)
        };
        std::fs::create_dir_all(dir)?;
        let blob = serde_json::to_vec_pretty(&state)?;
        std::fs::write(Self::blob_path(dir, id), blob)?;
        debug!(session = %id, "persisted session");
        Ok(())
    }

    /// Load a session's blob into memory. A missing or corrupt blob yields
    /// an empty session, never an error; corruption is logged.
    pub fn restore(&self, id: &SessionId) {
        let state = self
            .scratch_dir
            .as_deref()
            .and_then(|dir| Self::read_blob(dir, id))
            .unwrap_or_else(SessionState::fresh);
        self.inner.write().unwrap().insert(id.clone(), state);
    }

    fn read_blob(dir: &Path, id: &SessionId) -> Option<SessionState> {
        let path = Self::blob_path(dir, id);
        let bytes = std::fs::read(&path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(state) => Some(state),
            Err(err) => {
                warn!(session = %id, path = %path.display(), error = %err,
                    "corrupt session blob, starting empty");
                None
            }
        }
    }

    fn blob_path(dir: &Path, id: &SessionId) -> PathBuf {
        dir.join(format!("{}.json", id.file_stem()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn json(n: i64) -> serde_json::Value {
        serde_json::Value::from(n)
    }

    #[test]
    fn test_get_creates_on_first_reference() {
        let store = SessionStore::new();
        let id = SessionId::new("a");
        assert!(store.get(&id).is_empty());
        assert!(store.contains(&id));
    }

    #[test]
    fn test_merge_overwrites_same_names() {
        let store = SessionStore::new();
        let id = SessionId::new("a");
        store.merge(&id, IndexMap::from_iter([("x".to_string(), json(1))]));
        store.merge(
            &id,
            IndexMap::from_iter([("x".to_string(), json(2)), ("y".to_string(), json(3))]),
        );
        let bindings = store.get(&id);
        assert_eq!(bindings.get("x"), Some(&json(2)));
        assert_eq!(bindings.get("y"), Some(&json(3)));
    }

    #[test]
    fn test_sessions_isolated() {
        let store = SessionStore::new();
        store.merge(
            &SessionId::new("a"),
            IndexMap::from_iter([("x".to_string(), json(1))]),
        );
        assert!(store.get(&SessionId::new("b")).is_empty());
    }

    #[test]
    fn test_clear() {
        let store = SessionStore::new();
        let id = SessionId::new("a");
        store.merge(&id, IndexMap::from_iter([("x".to_string(), json(1))]));
        store.clear(&id);
        assert!(!store.contains(&id));
    }

    #[test]
    fn test_persist_restore_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new().with_scratch_dir(dir.path());
        let id = SessionId::new("user-1");
        store.merge(&id, IndexMap::from_iter([("x".to_string(), json(42))]));
        store.persist(&id).unwrap();

        let fresh = SessionStore::new().with_scratch_dir(dir.path());
        fresh.restore(&id);
        assert_eq!(fresh.get(&id).get("x"), Some(&json(42)));
    }

    #[test]
    fn test_restore_missing_blob_yields_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new().with_scratch_dir(dir.path());
        let id = SessionId::new("nobody");
        store.restore(&id);
        assert!(store.get(&id).is_empty());
    }

    #[test]
    fn test_restore_corrupt_blob_yields_empty() {
        let dir = tempfile::tempdir().unwrap();
        let id = SessionId::new("broken");
        std::fs::write(dir.path().join("broken.json"), b"{ not json").unwrap();
        let store = SessionStore::new().with_scratch_dir(dir.path());
        store.restore(&id);
        assert!(store.get(&id).is_empty());
    }

    #[test]
    fn test_persist_without_scratch_dir_fails() {
        let store = SessionStore::new();
        let err = store.persist(&SessionId::new("a")).unwrap_err();
        assert!(matches!(err, SessionError::MissingScratchDir));
    }

    #[test]
    fn test_expire_idle() {
        let store = SessionStore::new();
        let stale = SessionId::new("stale");
        let live = SessionId::new("live");
        store.merge(&stale, IndexMap::from_iter([("x".to_string(), json(1))]));
        store.merge(&live, IndexMap::from_iter([("y".to_string(), json(2))]));
        {
            let mut sessions = store.inner.write().unwrap();
            sessions.get_mut(&stale).unwrap().last_access =
                Timestamp::from_datetime(Utc::now() - chrono::Duration::seconds(120));
        }
        let removed = store.expire_idle(Duration::from_secs(60));
        assert_eq!(removed, 1);
        assert!(!store.contains(&stale));
        assert!(store.contains(&live));
    }
}

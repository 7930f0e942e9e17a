//! Session persistence for suspend/resume across independent calls.
//!
//! A session maps its id to one `WorkflowState` plus a version token that
//! increases on every write. `compare_and_swap` refuses a write whose
//! expected version is stale, so two resumes racing on the same session
//! cannot both commit.
//!
//! ## Design Decisions
//!
//! - **One file per session**: `~/.postflow/sessions/<session-id>.json`
//! - **Versioned format**: snapshots carry a format version for future migrations.
//! - **Atomic writes**: snapshots are written to a temp file and renamed.
//! - **Cross-process exclusion**: `lock_session` holds an exclusive `fs2` lock
//!   on `<session-id>.lock`, so separate `postflow` processes never drive the
//!   same session at once.

use crate::domain::errors::WorkflowError;
use crate::domain::types::SessionId;
use crate::state::WorkflowState;
use crate::state_machine::StateSnapshot;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Current snapshot format version.
/// Increment this when making breaking changes to the snapshot format.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A stored state and its version token.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub version: u64,
    pub state: WorkflowState,
}

/// Exclusive hold on one session. Released on drop.
#[derive(Debug, Default)]
pub struct SessionLock {
    file: Option<File>,
}

impl SessionLock {
    /// A hold that excludes nothing, for stores living in a single process.
    pub fn unlocked() -> Self {
        Self::default()
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        if let Some(file) = &self.file {
            let _ = FileExt::unlock(file);
        }
    }
}

pub trait SessionStore: Send + Sync {
    /// Blocks until no other holder, in any process, owns the session.
    ///
    /// Callers hold the returned lock across the whole load, drive and
    /// compare-and-swap sequence.
    fn lock_session(&self, _id: &SessionId) -> Result<SessionLock, WorkflowError> {
        Ok(SessionLock::unlocked())
    }

    fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>, WorkflowError>;

    /// Stores the state unconditionally and returns the new version.
    fn put(&self, state: &WorkflowState) -> Result<u64, WorkflowError>;

    /// Stores the state only if the stored version still equals `expected_version`.
    fn compare_and_swap(
        &self,
        expected_version: u64,
        state: &WorkflowState,
    ) -> Result<u64, WorkflowError>;

    /// Summaries of all stored sessions, most recently updated first.
    fn list(&self) -> Result<Vec<StateSnapshot>, WorkflowError>;

    /// Drops a session. Returns whether it existed.
    fn remove(&self, id: &SessionId) -> Result<bool, WorkflowError>;
}

fn conflict(id: &SessionId, expected: u64, actual: Option<u64>) -> WorkflowError {
    WorkflowError::ConcurrencyConflict {
        message: match actual {
            Some(actual) => format!(
                "session {} is at version {}, expected {}",
                id, actual, expected
            ),
            None => format!("session {} no longer exists", id),
        },
    }
}

fn sort_newest_first(summaries: &mut [StateSnapshot]) {
    summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

// ---------------------------------------------------------------------------
// In-memory

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<SessionId, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<SessionId, SessionRecord>>, WorkflowError> {
        self.sessions
            .lock()
            .map_err(|_| WorkflowError::storage("session map lock poisoned"))
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>, WorkflowError> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn put(&self, state: &WorkflowState) -> Result<u64, WorkflowError> {
        let mut sessions = self.lock()?;
        let version = sessions
            .get(&state.session_id)
            .map_or(1, |record| record.version + 1);
        sessions.insert(
            state.session_id.clone(),
            SessionRecord {
                version,
                state: state.clone(),
            },
        );
        Ok(version)
    }

    fn compare_and_swap(
        &self,
        expected_version: u64,
        state: &WorkflowState,
    ) -> Result<u64, WorkflowError> {
        let mut sessions = self.lock()?;
        let Some(record) = sessions.get_mut(&state.session_id) else {
            return Err(conflict(&state.session_id, expected_version, None));
        };
        if record.version != expected_version {
            return Err(conflict(
                &state.session_id,
                expected_version,
                Some(record.version),
            ));
        }
        record.version += 1;
        record.state = state.clone();
        Ok(record.version)
    }

    fn list(&self) -> Result<Vec<StateSnapshot>, WorkflowError> {
        let mut summaries: Vec<StateSnapshot> = self
            .lock()?
            .values()
            .map(|record| StateSnapshot::from(&record.state))
            .collect();
        sort_newest_first(&mut summaries);
        Ok(summaries)
    }

    fn remove(&self, id: &SessionId) -> Result<bool, WorkflowError> {
        Ok(self.lock()?.remove(id).is_some())
    }
}

// ---------------------------------------------------------------------------
// File-backed

/// On-disk form of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Snapshot format version for migration compatibility
    pub format_version: u32,
    /// Timestamp when this snapshot was written (RFC3339 format)
    pub saved_at: String,
    pub session_id: String,
    /// Version token used by compare-and-swap
    pub version: u64,
    pub state: WorkflowState,
}

/// Stores each session as a JSON file in one directory.
pub struct FileSessionStore {
    dir: PathBuf,
    // Serializes read-check-write sequences within this process.
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn snapshot_path(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn lock_path(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{}.lock", id))
    }

    fn ensure_dir(&self) -> Result<(), WorkflowError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            WorkflowError::storage(format!(
                "Failed to create sessions directory {}: {}",
                self.dir.display(),
                e
            ))
        })
    }

    fn read_snapshot(path: &Path) -> Result<SessionSnapshot, WorkflowError> {
        let content = fs::read_to_string(path).map_err(|e| {
            WorkflowError::storage(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let snapshot: SessionSnapshot = serde_json::from_str(&content).map_err(|e| {
            WorkflowError::storage(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        if snapshot.format_version > SNAPSHOT_VERSION {
            return Err(WorkflowError::storage(format!(
                "Snapshot version {} is newer than supported version {}. Please upgrade postflow.",
                snapshot.format_version, SNAPSHOT_VERSION
            )));
        }
        Ok(snapshot)
    }

    fn load(&self, id: &SessionId) -> Result<Option<SessionSnapshot>, WorkflowError> {
        let path = self.snapshot_path(id);
        if !path.exists() {
            return Ok(None);
        }
        Self::read_snapshot(&path).map(Some)
    }

    fn write(&self, version: u64, state: &WorkflowState) -> Result<u64, WorkflowError> {
        self.ensure_dir()?;
        let snapshot = SessionSnapshot {
            format_version: SNAPSHOT_VERSION,
            saved_at: chrono::Utc::now().to_rfc3339(),
            session_id: state.session_id.to_string(),
            version,
            state: state.clone(),
        };
        let content = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| WorkflowError::storage(format!("Failed to serialize session: {}", e)))?;

        let path = self.snapshot_path(&state.session_id);
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, content).map_err(|e| {
            WorkflowError::storage(format!("Failed to write {}: {}", temp_path.display(), e))
        })?;
        fs::rename(&temp_path, &path).map_err(|e| {
            WorkflowError::storage(format!("Failed to rename to {}: {}", path.display(), e))
        })?;
        Ok(version)
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>, WorkflowError> {
        self.write_lock
            .lock()
            .map_err(|_| WorkflowError::storage("session store lock poisoned"))
    }
}

impl SessionStore for FileSessionStore {
    fn lock_session(&self, id: &SessionId) -> Result<SessionLock, WorkflowError> {
        self.ensure_dir()?;
        let path = self.lock_path(id);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| {
                WorkflowError::storage(format!("Failed to open {}: {}", path.display(), e))
            })?;
        file.lock_exclusive().map_err(|e| {
            WorkflowError::storage(format!("Failed to lock {}: {}", path.display(), e))
        })?;
        Ok(SessionLock { file: Some(file) })
    }

    fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>, WorkflowError> {
        Ok(self.load(id)?.map(|snapshot| SessionRecord {
            version: snapshot.version,
            state: snapshot.state,
        }))
    }

    fn put(&self, state: &WorkflowState) -> Result<u64, WorkflowError> {
        let _guard = self.guard()?;
        let version = self
            .load(&state.session_id)?
            .map_or(1, |snapshot| snapshot.version + 1);
        self.write(version, state)
    }

    fn compare_and_swap(
        &self,
        expected_version: u64,
        state: &WorkflowState,
    ) -> Result<u64, WorkflowError> {
        let _guard = self.guard()?;
        match self.load(&state.session_id)? {
            Some(snapshot) if snapshot.version == expected_version => {
                self.write(expected_version + 1, state)
            }
            Some(snapshot) => Err(conflict(
                &state.session_id,
                expected_version,
                Some(snapshot.version),
            )),
            None => Err(conflict(&state.session_id, expected_version, None)),
        }
    }

    fn list(&self) -> Result<Vec<StateSnapshot>, WorkflowError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            WorkflowError::storage(format!("Failed to read {}: {}", self.dir.display(), e))
        })?;

        let mut summaries = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                // Unreadable files are skipped so one bad snapshot does not hide the rest.
                if let Ok(snapshot) = Self::read_snapshot(&path) {
                    summaries.push(StateSnapshot::from(&snapshot.state));
                }
            }
        }
        sort_newest_first(&mut summaries);
        Ok(summaries)
    }

    fn remove(&self, id: &SessionId) -> Result<bool, WorkflowError> {
        let _guard = self.guard()?;
        let path = self.snapshot_path(id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|e| {
            WorkflowError::storage(format!("Failed to delete {}: {}", path.display(), e))
        })?;
        let _ = fs::remove_file(self.lock_path(id));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{PostType, Preferences};
    use crate::state::Phase;
    use tempfile::tempdir;

    fn state() -> WorkflowState {
        WorkflowState::new(
            "Our team shipped a new search index",
            PostType::AiNews,
            Preferences::default(),
            false,
            2,
        )
    }

    fn exercise_versioning(store: &dyn SessionStore) {
        let mut state = state();
        assert_eq!(store.get(&state.session_id).expect("get"), None);

        assert_eq!(store.put(&state).expect("put"), 1);
        let record = store.get(&state.session_id).expect("get").expect("stored");
        assert_eq!(record.version, 1);
        assert_eq!(record.state, state);

        state.phase = Phase::AwaitingApproval;
        assert_eq!(store.compare_and_swap(1, &state).expect("cas"), 2);

        let err = store
            .compare_and_swap(1, &state)
            .expect_err("stale version");
        assert!(matches!(err, WorkflowError::ConcurrencyConflict { .. }));

        let stored = store.get(&state.session_id).expect("get").expect("stored");
        assert_eq!(stored.version, 2);
        assert_eq!(stored.state.phase, Phase::AwaitingApproval);

        assert_eq!(store.list().expect("list").len(), 1);
        assert!(store.remove(&state.session_id).expect("remove"));
        assert!(!store.remove(&state.session_id).expect("remove again"));

        let err = store
            .compare_and_swap(2, &state)
            .expect_err("removed session");
        assert!(matches!(err, WorkflowError::ConcurrencyConflict { .. }));
    }

    #[test]
    fn test_in_memory_versioning() {
        exercise_versioning(&InMemorySessionStore::new());
    }

    #[test]
    fn test_file_versioning() {
        let dir = tempdir().expect("temp dir");
        exercise_versioning(&FileSessionStore::new(dir.path().join("sessions")));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempdir().expect("temp dir");
        let state = state();
        FileSessionStore::new(dir.path().to_path_buf())
            .put(&state)
            .expect("put");

        let reopened = FileSessionStore::new(dir.path().to_path_buf());
        let record = reopened
            .get(&state.session_id)
            .expect("get")
            .expect("stored");
        assert_eq!(record.state.topic, state.topic);
        assert!(!dir.path().join(format!("{}.json.tmp", state.session_id)).exists());
    }

    #[test]
    fn test_file_store_rejects_newer_format() {
        let dir = tempdir().expect("temp dir");
        let store = FileSessionStore::new(dir.path().to_path_buf());
        let state = state();
        store.put(&state).expect("put");

        let path = dir.path().join(format!("{}.json", state.session_id));
        let mut raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        raw["format_version"] = serde_json::json!(SNAPSHOT_VERSION + 1);
        fs::write(&path, raw.to_string()).expect("write");

        let err = store.get(&state.session_id).expect_err("newer format");
        assert!(matches!(err, WorkflowError::StorageFailure { .. }));
        assert!(store.list().expect("list").is_empty());
    }

    #[test]
    fn test_file_lock_excludes_second_holder() {
        let dir = tempdir().expect("temp dir");
        let id = state().session_id;
        let first = FileSessionStore::new(dir.path().to_path_buf());
        let second = FileSessionStore::new(dir.path().to_path_buf());

        let held = first.lock_session(&id).expect("first lock");
        assert!(held.is_held());

        let (tx, rx) = std::sync::mpsc::channel();
        let waiter = std::thread::spawn(move || {
            let lock = second.lock_session(&id).expect("second lock");
            tx.send(lock.is_held()).expect("send");
        });

        assert!(rx
            .recv_timeout(std::time::Duration::from_millis(200))
            .is_err());
        drop(held);
        assert_eq!(
            rx.recv_timeout(std::time::Duration::from_secs(5)),
            Ok(true)
        );
        waiter.join().expect("waiter");
    }

    #[test]
    fn test_in_memory_lock_is_a_no_op() {
        let store = InMemorySessionStore::new();
        let id = state().session_id;
        let a = store.lock_session(&id).expect("lock");
        let b = store.lock_session(&id).expect("lock again");
        assert!(!a.is_held() && !b.is_held());
    }

    #[test]
    fn test_list_is_newest_first() {
        let store = InMemorySessionStore::new();
        let older = state();
        let mut newer = state();
        newer.updated_at = crate::domain::types::TimestampUtc(
            older.updated_at.0 + chrono::Duration::seconds(5),
        );
        store.put(&older).expect("put");
        store.put(&newer).expect("put");

        let ids: Vec<_> = store
            .list()
            .expect("list")
            .into_iter()
            .map(|s| s.session_id)
            .collect();
        assert_eq!(ids, vec![newer.session_id.to_string(), older.session_id.to_string()]);
    }
}

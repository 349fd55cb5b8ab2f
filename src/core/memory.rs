//! Conversation memory
//!
//! Session logs live in memory and are snapshotted to a single JSON file
//! (`{ "<session id>": [ {role, content}, ... ] }`) on a fixed interval.
//! The snapshot is reloaded wholesale at startup.
//!
//! Concurrency: the log map sits behind an async `RwLock` that is only
//! held for short reads and appends. Callers that read history, await the
//! provider and then append take the per-session lock from
//! [`ConversationStore::lock_session`] first, so exchanges within one
//! session never interleave. A flush may observe a session between its
//! user and assistant turns.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::conversation::{ConversationLog, Message, Role};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// In-memory session logs with periodic file snapshots
pub struct ConversationStore {
    sessions: RwLock<HashMap<String, ConversationLog>>,
    session_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    flush_lock: Mutex<()>,
    snapshot_path: PathBuf,
    max_turns: usize,
}

impl ConversationStore {
    /// Create an empty store. `max_turns` of 0 keeps every turn.
    pub fn new(snapshot_path: impl Into<PathBuf>, max_turns: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            session_locks: Mutex::new(HashMap::new()),
            flush_lock: Mutex::new(()),
            snapshot_path: snapshot_path.into(),
            max_turns,
        }
    }

    /// Create a store populated from the last snapshot.
    ///
    /// A missing or unreadable snapshot yields an empty store. Only user
    /// and assistant turns are kept; system turns are never replayed.
    pub async fn load(snapshot_path: impl Into<PathBuf>, max_turns: usize) -> Self {
        let store = Self::new(snapshot_path, max_turns);

        let loaded = match read_snapshot(&store.snapshot_path).await {
            Ok(Some(sessions)) => sessions,
            Ok(None) => {
                tracing::info!(path = %store.snapshot_path.display(), "No session snapshot, starting empty");
                HashMap::new()
            }
            Err(e) => {
                tracing::warn!(
                    path = %store.snapshot_path.display(),
                    error = %e,
                    "Ignoring unreadable session snapshot"
                );
                HashMap::new()
            }
        };

        let mut trimmed = HashMap::with_capacity(loaded.len());
        let mut skipped = 0usize;
        for (id, log) in loaded {
            let mut kept = ConversationLog::new();
            for turn in log.turns() {
                if turn.role == Role::System {
                    skipped += 1;
                    continue;
                }
                kept.push(turn.clone(), max_turns);
            }
            trimmed.insert(id, kept);
        }
        if skipped > 0 {
            tracing::warn!(skipped, "Dropped system turns from session snapshot");
        }

        tracing::info!(sessions = trimmed.len(), "Loaded conversation store");
        *store.sessions.write().await = trimmed;
        store
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Exclusive access to one session's exchange
    pub async fn lock_session(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.session_locks.lock().await;
            locks.entry(session_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Append a turn, creating the session on first use
    pub async fn append(&self, session_id: &str, turn: Message) {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_default()
            .push(turn, self.max_turns);
    }

    /// The last `n` turns of a session, oldest first
    pub async fn history(&self, session_id: &str, n: usize) -> Vec<Message> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .map(|log| log.recent(n))
            .unwrap_or_default()
    }

    pub async fn get(&self, session_id: &str) -> Option<ConversationLog> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Serialize every session, keys in sorted order
    pub async fn snapshot_bytes(&self) -> Result<Vec<u8>, StoreError> {
        let sessions = self.sessions.read().await;
        let ordered: BTreeMap<&String, &ConversationLog> = sessions.iter().collect();
        Ok(serde_json::to_vec_pretty(&ordered)?)
    }

    /// Write the snapshot file. Writes a temp file first and renames it
    /// over the old snapshot. Returns the number of sessions written.
    pub async fn flush(&self) -> Result<usize, StoreError> {
        let _guard = self.flush_lock.lock().await;

        let bytes = self.snapshot_bytes().await?;
        let count = self.session_count().await;

        if let Some(parent) = self.snapshot_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let temp = temp_path(&self.snapshot_path);
        fs::write(&temp, &bytes).await?;
        fs::rename(&temp, &self.snapshot_path).await?;

        tracing::debug!(sessions = count, path = %self.snapshot_path.display(), "Flushed conversation store");
        Ok(count)
    }

    /// Flush every `period` until the returned task is aborted
    pub fn spawn_flusher(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick fires immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                if let Err(e) = self.flush().await {
                    tracing::error!(error = %e, "Failed to flush conversation store");
                }
            }
        })
    }
}

async fn read_snapshot(
    path: &Path,
) -> Result<Option<HashMap<String, ConversationLog>>, StoreError> {
    let content = match fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    Ok(Some(serde_json::from_slice(&content)?))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "sessions.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

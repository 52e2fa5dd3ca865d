use serde_json::{Map, Value};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::warn;

use crate::error::{TournamentError, TournamentResult};
use crate::types::{RecordId, RemoteRecord, StoredState, LOCAL_STATE_KEY};

// ── Remote collaborator ────────────────────────────────────────────────

pub type ChangeCallback = Box<dyn Fn(RemoteRecord) + Send + Sync + 'static>;

/// Key-value persistence keyed by tournament id. Implementations must be
/// usable from the session thread and from their own notifier threads.
pub trait RemoteStore: Send {
    fn get(&self, tournament_id: &str) -> TournamentResult<Option<RemoteRecord>>;

    fn put(
        &self,
        tournament_id: &str,
        record_id: Option<&RecordId>,
        state: &StoredState,
        updated_by: &str,
    ) -> TournamentResult<RecordId>;

    fn subscribe(&self, tournament_id: &str, on_change: ChangeCallback) -> TournamentResult<Subscription>;
}

/// Live subscription handle. Dropping it cancels the subscription.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Subscription {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

// ── Local blob fallback ────────────────────────────────────────────────

/// A JSON object file used as a key-value blob; the bracket lives under one
/// fixed key.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LocalStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> TournamentResult<Map<String, Value>> {
        if !self.path.is_file() {
            return Ok(Map::new());
        }
        let data = fs::read_to_string(&self.path).map_err(|e| {
            TournamentError::persistence(format!("read local state {}: {e}", self.path.display()))
        })?;
        if data.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&data) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(TournamentError::persistence(format!(
                "local state {} must be a JSON object.",
                self.path.display()
            ))),
            Err(e) => Err(TournamentError::persistence(format!(
                "parse local state {}: {e}",
                self.path.display()
            ))),
        }
    }

    pub fn load(&self) -> TournamentResult<Option<StoredState>> {
        let map = self.read_map()?;
        let Some(value) = map.get(LOCAL_STATE_KEY) else {
            return Ok(None);
        };
        let state: StoredState = serde_json::from_value(value.clone()).map_err(|e| {
            TournamentError::persistence(format!("parse local state {}: {e}", self.path.display()))
        })?;
        Ok(Some(StoredState::new(state.participants_text, state.bracket)))
    }

    pub fn save(&self, state: &StoredState) -> TournamentResult<()> {
        // Other keys in the blob are left alone; an unreadable blob is replaced.
        let mut map = self.read_map().unwrap_or_else(|e| {
            warn!("{e}; starting a fresh local state file");
            Map::new()
        });
        let value = serde_json::to_value(state).map_err(|e| TournamentError::persistence(e.to_string()))?;
        map.insert(LOCAL_STATE_KEY.to_string(), value);
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    TournamentError::persistence(format!("create local state dir {}: {e}", parent.display()))
                })?;
            }
        }
        let payload =
            serde_json::to_string_pretty(&Value::Object(map)).map_err(|e| TournamentError::persistence(e.to_string()))?;
        fs::write(&self.path, payload).map_err(|e| {
            TournamentError::persistence(format!("write local state {}: {e}", self.path.display()))
        })
    }
}

// ── In-process remote ──────────────────────────────────────────────────

#[derive(Default)]
struct MemoryRemoteInner {
    records: HashMap<String, RemoteRecord>,
    subscribers: Vec<(u64, String, Arc<ChangeCallback>)>,
    next_row: u64,
    next_revision: u64,
    next_subscriber: u64,
    offline: bool,
}

/// Remote store kept in memory. Every put bumps the revision and notifies
/// subscribers of that tournament synchronously, writer included.
#[derive(Clone, Default)]
pub struct MemoryRemote {
    inner: Arc<Mutex<MemoryRemoteInner>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        MemoryRemote::default()
    }

    /// Simulate an outage: every call fails until switched back.
    pub fn set_offline(&self, offline: bool) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.offline = offline;
    }

    pub fn subscriber_count(&self) -> usize {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.subscribers.len()
    }
}

impl RemoteStore for MemoryRemote {
    fn get(&self, tournament_id: &str) -> TournamentResult<Option<RemoteRecord>> {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if guard.offline {
            return Err(TournamentError::persistence("remote store is offline"));
        }
        Ok(guard.records.get(tournament_id).cloned())
    }

    fn put(
        &self,
        tournament_id: &str,
        record_id: Option<&RecordId>,
        state: &StoredState,
        _updated_by: &str,
    ) -> TournamentResult<RecordId> {
        let (record, listeners) = {
            let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if guard.offline {
                return Err(TournamentError::persistence("remote store is offline"));
            }
            let row = match record_id {
                Some(id) => id.row.clone(),
                None => match guard.records.get(tournament_id) {
                    Some(existing) => existing.record_id.row.clone(),
                    None => {
                        guard.next_row += 1;
                        format!("row-{}", guard.next_row)
                    }
                },
            };
            guard.next_revision += 1;
            let record = RemoteRecord {
                record_id: RecordId::new(row, guard.next_revision.to_string()),
                state: state.clone(),
            };
            guard.records.insert(tournament_id.to_string(), record.clone());
            let listeners: Vec<Arc<ChangeCallback>> = guard
                .subscribers
                .iter()
                .filter(|(_, tid, _)| tid == tournament_id)
                .map(|(_, _, callback)| callback.clone())
                .collect();
            (record, listeners)
        };
        for callback in listeners {
            (callback.as_ref())(record.clone());
        }
        Ok(record.record_id)
    }

    fn subscribe(&self, tournament_id: &str, on_change: ChangeCallback) -> TournamentResult<Subscription> {
        let id = {
            let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if guard.offline {
                return Err(TournamentError::persistence("remote store is offline"));
            }
            guard.next_subscriber += 1;
            let id = guard.next_subscriber;
            guard
                .subscribers
                .push((id, tournament_id.to_string(), Arc::new(on_change)));
            id
        };
        let inner = self.inner.clone();
        Ok(Subscription::new(move || {
            let mut guard = inner.lock().unwrap_or_else(|e| e.into_inner());
            guard.subscribers.retain(|(sub_id, _, _)| *sub_id != id);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::{Bracket, Match};
    use std::sync::mpsc;

    fn sample_state() -> StoredState {
        let bracket = Bracket::from_rounds(vec![vec![Match::new(Some("A".into()), Some("B".into()))]]);
        StoredState::new("A\nB", Some(bracket))
    }

    #[test]
    fn test_local_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("nested").join("state.json"));
        assert_eq!(store.load().unwrap(), None);
        store.save(&sample_state()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample_state()));
    }

    #[test]
    fn test_local_store_uses_fixed_key_and_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"theme":"dark"}"#).unwrap();
        let store = LocalStore::new(&path);
        store.save(&sample_state()).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
        assert_eq!(raw[LOCAL_STATE_KEY]["playersText"], "A\nB");
        assert!(raw[LOCAL_STATE_KEY]["bracketState"].is_array());
    }

    #[test]
    fn test_local_store_treats_empty_bracket_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(
            &path,
            format!(r#"{{"{LOCAL_STATE_KEY}":{{"playersText":"A","bracketState":[]}}}}"#),
        )
        .unwrap();
        let loaded = LocalStore::new(&path).load().unwrap().unwrap();
        assert_eq!(loaded.participants_text, "A");
        assert_eq!(loaded.bracket, None);
    }

    #[test]
    fn test_local_store_reports_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "not json").unwrap();
        let store = LocalStore::new(&path);
        assert!(matches!(store.load(), Err(TournamentError::Persistence(_))));
        // Saving replaces the unreadable blob.
        store.save(&sample_state()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample_state()));
    }

    #[test]
    fn test_memory_remote_put_get_and_revisions() {
        let remote = MemoryRemote::new();
        assert_eq!(remote.get("t1").unwrap(), None);
        let first = remote.put("t1", None, &sample_state(), "admin").unwrap();
        let second = remote.put("t1", Some(&first), &sample_state(), "admin").unwrap();
        assert_eq!(first.row, second.row);
        assert_ne!(first, second);
        let record = remote.get("t1").unwrap().unwrap();
        assert_eq!(record.record_id, second);
        assert_eq!(record.state, sample_state());
        assert_eq!(remote.get("t2").unwrap(), None);
    }

    #[test]
    fn test_memory_remote_notifies_and_unsubscribes() {
        let remote = MemoryRemote::new();
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let subscription = remote
            .subscribe(
                "t1",
                Box::new(move |record| {
                    let _ = tx.lock().unwrap().send(record);
                }),
            )
            .unwrap();
        remote.put("t2", None, &sample_state(), "admin").unwrap();
        let written = remote.put("t1", None, &sample_state(), "admin").unwrap();
        let seen = rx.try_recv().unwrap();
        assert_eq!(seen.record_id, written);
        assert!(rx.try_recv().is_err());

        drop(subscription);
        assert_eq!(remote.subscriber_count(), 0);
        remote.put("t1", None, &sample_state(), "admin").unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_memory_remote_offline() {
        let remote = MemoryRemote::new();
        remote.set_offline(true);
        assert!(remote.get("t1").is_err());
        assert!(remote.put("t1", None, &sample_state(), "admin").is_err());
        remote.set_offline(false);
        assert!(remote.get("t1").is_ok());
    }
}

//! Persistence of [`GameState`] through a pluggable key-value store.
use std::cell::RefCell;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

use crate::constants::{GAME_STATE_VERSION, STORAGE_KEY};
use crate::state::GameState;

/// String key-value capability the host provides (browser local storage,
/// files, memory).
pub trait KeyValueStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, Self::Error>;

    /// Write `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    fn set(&self, key: &str, value: &str) -> Result<(), Self::Error>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be modified.
    fn remove(&self, key: &str) -> Result<(), Self::Error>;
}

/// In-process store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    type Error = Infallible;

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    type Error = io::Error;

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.path_for(key), value)
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        match fs::remove_file(self.path_for(key)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to serialize game state: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StorageError {
    fn backend<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// Bring a decoded state up to the current schema.
///
/// Blobs written by a newer build keep their version and extra fields so a
/// downgrade does not destroy them.
#[must_use]
pub fn migrate_state(mut state: GameState) -> GameState {
    if state.version >= GAME_STATE_VERSION {
        return state;
    }
    log::debug!(
        "migrating game state from v{} to v{GAME_STATE_VERSION}",
        state.version
    );
    if state.version < 2 {
        split_daily_attempt_date(&mut state);
    }
    state.version = GAME_STATE_VERSION;
    state
}

/// v1 stored wrong mission answers in `lastDailyMissionDate`. A date there
/// that was never completed is moved to `lastDailyMissionAttemptDate`.
fn split_daily_attempt_date(state: &mut GameState) {
    let Some(last) = state.last_daily_mission_date.take() else {
        return;
    };
    if state.completed_daily_missions.contains(&last) {
        state.last_daily_mission_date = Some(last);
        return;
    }
    state.last_daily_mission_date = state.completed_daily_missions.iter().max().cloned();
    if state.last_daily_mission_attempt_date.is_none() {
        state.last_daily_mission_attempt_date = Some(last);
    }
}

/// Parse a persisted blob. Missing fields take their defaults.
///
/// # Errors
///
/// Returns an error if `raw` is not a JSON object of the expected shape.
pub fn decode_state(raw: &str) -> Result<GameState, serde_json::Error> {
    serde_json::from_str::<GameState>(raw).map(migrate_state)
}

/// Serialize a state, stamping the current schema version when older.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_state(state: &GameState) -> Result<String, serde_json::Error> {
    let mut stamped = state.clone();
    stamped.version = stamped.version.max(GAME_STATE_VERSION);
    serde_json::to_string(&stamped)
}

/// Loads and saves the single game state under one key.
#[derive(Debug, Clone)]
pub struct StateRepository<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> StateRepository<S> {
    pub fn new(store: S) -> Self {
        Self::with_key(store, STORAGE_KEY)
    }

    pub fn with_key(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Read the persisted state, falling back to defaults when nothing is
    /// stored, the backend fails or the blob does not parse.
    #[must_use]
    pub fn load(&self) -> GameState {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return GameState::default(),
            Err(err) => {
                log::warn!("reading `{}` failed, starting fresh: {err}", self.key);
                return GameState::default();
            }
        };
        decode_state(&raw).unwrap_or_else(|err| {
            log::warn!("persisted game state is corrupt, starting fresh: {err}");
            GameState::default()
        })
    }

    /// Write `state` under the repository key.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the backend write fails.
    pub fn save(&self, state: &GameState) -> Result<(), StorageError> {
        let encoded = encode_state(state)?;
        self.store
            .set(&self.key, &encoded)
            .map_err(StorageError::backend)
    }

    /// Delete the persisted state.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot remove the key.
    pub fn reset(&self) -> Result<(), StorageError> {
        self.store.remove(&self.key).map_err(StorageError::backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("quota exceeded")]
    struct QuotaExceeded;

    struct FullStore;

    impl KeyValueStore for FullStore {
        type Error = QuotaExceeded;

        fn get(&self, _key: &str) -> Result<Option<String>, Self::Error> {
            Err(QuotaExceeded)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), Self::Error> {
            Err(QuotaExceeded)
        }

        fn remove(&self, _key: &str) -> Result<(), Self::Error> {
            Err(QuotaExceeded)
        }
    }

    #[test]
    fn round_trip_through_memory_store() {
        let repo = StateRepository::new(MemoryStore::new());
        let state = GameState::default()
            .mark_station_passed("sokolniki")
            .record_quiz_error("lubyanka")
            .complete_onboarding();
        repo.save(&state).unwrap();
        assert_eq!(repo.load(), state);
        assert_eq!(repo.key(), "moscow-metro-game");
    }

    #[test]
    fn missing_and_corrupt_blobs_load_defaults() {
        let store = MemoryStore::new();
        let repo = StateRepository::new(store.clone());
        assert_eq!(repo.load(), GameState::default());

        store.set(STORAGE_KEY, "{not json").unwrap();
        assert_eq!(repo.load(), GameState::default());

        store.set(STORAGE_KEY, "[1, 2, 3]").unwrap();
        assert_eq!(repo.load(), GameState::default());
    }

    #[test]
    fn partial_legacy_blob_is_migrated() {
        let state = decode_state(r#"{"passedStations":["sokolniki"],"quizErrors":{"lubyanka":1}}"#)
            .unwrap();
        assert_eq!(state.version, GAME_STATE_VERSION);
        assert_eq!(state.passed_stations, vec!["sokolniki"]);
        assert_eq!(state.quiz_errors("lubyanka"), 1);
        assert_eq!(state.current_opening_date_index, 0);
        assert!(!state.is_onboarding_complete);
        assert!(state.last_daily_mission_date.is_none());
    }

    #[test]
    fn v1_wrong_answer_date_moves_to_attempt_field() {
        let raw = r#"{"version":1,"completedDailyMissions":["2025-01-01"],"lastDailyMissionDate":"2025-01-02"}"#;
        let state = decode_state(raw).unwrap();
        assert_eq!(state.version, GAME_STATE_VERSION);
        assert_eq!(state.last_daily_mission_date.as_deref(), Some("2025-01-01"));
        assert_eq!(
            state.last_daily_mission_attempt_date.as_deref(),
            Some("2025-01-02")
        );

        let completed = r#"{"version":1,"completedDailyMissions":["2025-01-01"],"lastDailyMissionDate":"2025-01-01"}"#;
        let state = decode_state(completed).unwrap();
        assert_eq!(state.last_daily_mission_date.as_deref(), Some("2025-01-01"));
        assert!(state.last_daily_mission_attempt_date.is_none());
    }

    #[test]
    fn newer_blob_keeps_version_and_unknown_fields() {
        let raw = r#"{"version":7,"passedStations":[],"soundEnabled":false}"#;
        let state = decode_state(raw).unwrap();
        assert_eq!(state.version, 7);
        let encoded = encode_state(&state).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["version"], 7);
        assert_eq!(value["soundEnabled"], false);
    }

    #[test]
    fn encoded_layout_uses_camel_case_keys() {
        let mut state = GameState::default();
        state.version = 0;
        let value: serde_json::Value =
            serde_json::from_str(&encode_state(&state).unwrap()).unwrap();
        assert_eq!(value["version"], GAME_STATE_VERSION);
        for key in [
            "passedStations",
            "currentOpeningDateIndex",
            "quizErrors",
            "completedDailyMissions",
            "lastDailyMissionDate",
            "lastDailyMissionAttemptDate",
            "isOnboardingComplete",
            "finalQuizCompleted",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn backend_failures_are_reported_or_absorbed() {
        let repo = StateRepository::new(FullStore);
        assert_eq!(repo.load(), GameState::default());
        let err = repo.save(&GameState::default()).unwrap_err();
        assert!(matches!(err, StorageError::Backend(_)));
        assert!(err.to_string().contains("quota exceeded"));
        assert!(repo.reset().is_err());
    }

    #[test]
    fn reset_removes_blob() {
        let store = MemoryStore::new();
        let repo = StateRepository::new(store.clone());
        repo.save(&GameState::default().complete_final_quiz()).unwrap();
        assert_eq!(store.len(), 1);
        repo.reset().unwrap();
        assert!(store.is_empty());
        assert_eq!(repo.load(), GameState::default());
    }

    #[test]
    fn file_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("metro-game-store-{}", std::process::id()));
        let store = FileStore::new(&dir);
        assert_eq!(store.get("missing").unwrap(), None);
        store.set("slot", "{}").unwrap();
        assert_eq!(store.get("slot").unwrap().as_deref(), Some("{}"));
        store.remove("slot").unwrap();
        store.remove("slot").unwrap();
        assert_eq!(store.get("slot").unwrap(), None);
        let _ = fs::remove_dir_all(dir);
    }
}

//! Persisted user-name / course-name cache.
//!
//! Two string entries, overwritten each time the resolver sees an explicit
//! value and read back as fallback when a later turn arrives without one.
//! Persistence is best-effort: a failed write logs a warning and the
//! in-memory value still wins for the rest of the session.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ProfileState {
    #[serde(rename = "cached_user_name", default)]
    user_name: Option<String>,

    #[serde(rename = "cached_course_name", default)]
    course_name: Option<String>,
}

/// Key-value cache for the resolved user name and course name.
#[derive(Debug)]
pub struct ProfileStore {
    state: Mutex<ProfileState>,
    path: Option<PathBuf>,
}

impl ProfileStore {
    /// Create a purely in-memory store (no persistence).
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(ProfileState::default()),
            path: None,
        }
    }

    /// Open a store backed by a JSON file, loading any existing state.
    pub fn at_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let json = std::fs::read_to_string(&path)?;
            serde_json::from_str(&json).unwrap_or_default()
        } else {
            ProfileState::default()
        };
        Ok(Self {
            state: Mutex::new(state),
            path: Some(path),
        })
    }

    /// Open the store at the platform default location
    /// (`<data_dir>/aula/profile.json`).
    pub fn default_location() -> Result<Self> {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::at_path(base.join("aula").join("profile.json"))
    }

    /// Path backing this store, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Most recently cached user name.
    pub fn cached_user_name(&self) -> Option<String> {
        self.lock().user_name.clone()
    }

    /// Most recently cached course name.
    pub fn cached_course_name(&self) -> Option<String> {
        self.lock().course_name.clone()
    }

    /// Overwrite the cached user name.
    pub fn remember_user_name(&self, name: &str) {
        let snapshot = {
            let mut state = self.lock();
            state.user_name = Some(name.to_string());
            state.clone()
        };
        self.persist(&snapshot);
    }

    /// Overwrite the cached course name.
    pub fn remember_course_name(&self, course: &str) {
        let snapshot = {
            let mut state = self.lock();
            state.course_name = Some(course.to_string());
            state.clone()
        };
        self.persist(&snapshot);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProfileState> {
        // Poisoning only happens if a writer panicked; the cached strings
        // are still usable.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn persist(&self, state: &ProfileState) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(err) = self.try_persist(path, state) {
            warn!("Failed to persist profile cache to {}: {err}", path.display());
        }
    }

    fn try_persist(&self, path: &Path, state: &ProfileState) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_in_memory_roundtrip() {
        let store = ProfileStore::in_memory();
        assert_eq!(store.cached_user_name(), None);

        store.remember_user_name("Lucía");
        store.remember_course_name("Termodinámica");
        assert_eq!(store.cached_user_name().as_deref(), Some("Lucía"));
        assert_eq!(store.cached_course_name().as_deref(), Some("Termodinámica"));
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let store = ProfileStore::in_memory();
        store.remember_user_name("Ana");
        store.remember_user_name("Berta");
        assert_eq!(store.cached_user_name().as_deref(), Some("Berta"));
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");

        {
            let store = ProfileStore::at_path(&path).unwrap();
            store.remember_user_name("Carlos");
            store.remember_course_name("Física");
        }

        let reopened = ProfileStore::at_path(&path).unwrap();
        assert_eq!(reopened.cached_user_name().as_deref(), Some("Carlos"));
        assert_eq!(reopened.cached_course_name().as_deref(), Some("Física"));
    }

    #[test]
    fn test_persisted_file_uses_cache_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");

        let store = ProfileStore::at_path(&path).unwrap();
        store.remember_user_name("Carlos");

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["cached_user_name"], "Carlos");
    }
}

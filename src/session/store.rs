use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::error::AuthError;
use super::traits::TokenStore;

pub(super) const ACCESS_TOKEN_KEY: &str = "access_token";
pub(super) const REFRESH_TOKEN_KEY: &str = "refresh_token";

type StoreResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Process-lifetime token store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryTokenStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.entries.lock().map_err(|e| e.to_string())?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().map_err(|e| e.to_string())?;
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().map_err(|e| e.to_string())?;
        entries.remove(key);
        Ok(())
    }
}

/// Token store backed by a JSON object on disk.
///
/// Every write replaces the file through a sibling `.tmp` file and a rename,
/// so a crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Create a store at `NUAM_TOKEN_FILE`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if `NUAM_TOKEN_FILE` is unset.
    pub fn from_env() -> Result<Self, AuthError> {
        let path = std::env::var("NUAM_TOKEN_FILE")
            .map_err(|_| AuthError::Config("NUAM_TOKEN_FILE is required".into()))?;
        Ok(Self::new(path))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> StoreResult<BTreeMap<String, String>> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> StoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> StoreResult<()> {
        let _guard = self.write_lock.lock().map_err(|e| e.to_string())?;
        let mut entries = self.read_all()?;
        f(&mut entries);
        self.write_all(&entries)
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.update(|entries| {
            entries.insert(key.to_owned(), value.to_owned());
        })
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        if !self.path.exists() {
            return Ok(());
        }
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("settings storage failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings serialization failure: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("settings storage lock poisoned")]
    Poisoned,
}

/// Local string key-value namespace, the client-side cache for settings.
pub trait KeyValueStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>, SettingsError>;
    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError>;
}

/// One file per key under a directory.
pub struct FileNamespace {
    dir: PathBuf,
}

impl FileNamespace {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, SettingsError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileNamespace {
    fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        fs::write(self.path_for(key), value)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryNamespace {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryNamespace {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryNamespace {
    fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        let entries = self.entries.lock().map_err(|_| SettingsError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        let mut entries = self.entries.lock().map_err(|_| SettingsError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

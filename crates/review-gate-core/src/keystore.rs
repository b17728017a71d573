//! API key records with enable/disable and usage-counter semantics.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::SystemTime;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One issued API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub api_key: String,
    pub developer_name: String,
    pub created_at: String,
    pub enabled: bool,
    pub usage_count: u64,
}

/// Abstraction over key storage so backends (files, remote tables) can be
/// swapped transparently.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Validate an API key. Succeeds only for an existing, enabled key, and
    /// increments its usage count in the same step. Returns the developer
    /// name on success.
    async fn authenticate(&self, api_key: &str) -> Result<Option<String>>;

    /// Issue a new key for a developer.
    async fn create(&self, developer_name: &str) -> Result<KeyRecord>;

    /// All issued keys.
    async fn list(&self) -> Result<Vec<KeyRecord>>;

    /// Enable or disable a key. Returns false when the key is unknown.
    async fn set_enabled(&self, api_key: &str, enabled: bool) -> Result<bool>;
}

/// Key store backed by a single JSON file.
pub struct FileKeyStore {
    path: PathBuf,
    // Held across load-modify-save so the enabled check and the counter
    // increment are one step.
    lock: Mutex<()>,
}

impl FileKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<Vec<KeyRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read key file at {}", self.path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid JSON in key file at {}", self.path.display()))
    }

    fn save(&self, records: &[KeyRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create key directory at {}", parent.display())
                })?;
            }
        }
        let raw = serde_json::to_string_pretty(records)?;
        fs::write(&self.path, raw)
            .with_context(|| format!("failed to write key file at {}", self.path.display()))
    }
}

#[async_trait]
impl KeyStore for FileKeyStore {
    async fn authenticate(&self, api_key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().expect("key store lock poisoned");
        let mut records = self.load()?;
        let Some(record) = records
            .iter_mut()
            .find(|r| r.api_key == api_key && r.enabled)
        else {
            return Ok(None);
        };
        record.usage_count += 1;
        let developer = record.developer_name.clone();
        self.save(&records)?;
        Ok(Some(developer))
    }

    async fn create(&self, developer_name: &str) -> Result<KeyRecord> {
        let _guard = self.lock.lock().expect("key store lock poisoned");
        let mut records = self.load()?;
        let record = KeyRecord {
            api_key: uuid::Uuid::new_v4().to_string(),
            developer_name: developer_name.to_string(),
            created_at: humantime::format_rfc3339_seconds(SystemTime::now()).to_string(),
            enabled: true,
            usage_count: 0,
        };
        records.push(record.clone());
        self.save(&records)?;
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<KeyRecord>> {
        let _guard = self.lock.lock().expect("key store lock poisoned");
        self.load()
    }

    async fn set_enabled(&self, api_key: &str, enabled: bool) -> Result<bool> {
        let _guard = self.lock.lock().expect("key store lock poisoned");
        let mut records = self.load()?;
        let Some(record) = records.iter_mut().find(|r| r.api_key == api_key) else {
            return Ok(false);
        };
        record.enabled = enabled;
        self.save(&records)?;
        Ok(true)
    }
}

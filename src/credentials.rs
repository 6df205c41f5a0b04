//! Local storage for the optional hosted-model API key.
//!
//! The key lives in a small JSON object file under a well-known entry name.
//! A missing file or entry simply means "no credential".

use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

pub const DEFAULT_KEY: &str = "gemini-api-key";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    pub path: PathBuf,
    pub key: String,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".agent-matcher/credentials.json"),
            key: DEFAULT_KEY.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential must not be empty")]
    Empty,

    #[error("credential store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential store is corrupt: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    key: String,
    // Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl CredentialStore {
    pub fn new(config: &CredentialConfig) -> Self {
        Self {
            path: config.path.clone(),
            key: config.key.clone(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_entries(&self) -> Result<BTreeMap<String, String>, CredentialError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write then rename so readers never see a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(entries)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// The stored credential, if any.
    pub async fn get(&self) -> Result<Option<String>, CredentialError> {
        let entries = self.read_entries().await?;
        Ok(entries
            .get(&self.key)
            .filter(|v| !v.trim().is_empty())
            .cloned())
    }

    pub async fn save(&self, value: &str) -> Result<(), CredentialError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(CredentialError::Empty);
        }

        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_entries().await?;
        entries.insert(self.key.clone(), value.to_string());
        self.write_entries(&entries).await?;
        info!(key = %self.key, "Credential saved");
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), CredentialError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_entries().await?;
        if entries.remove(&self.key).is_some() {
            self.write_entries(&entries).await?;
            info!(key = %self.key, "Credential cleared");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> CredentialStore {
        CredentialStore::new(&CredentialConfig {
            path: dir.path().join("nested").join("credentials.json"),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_missing_file_means_no_credential() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(store_in(&dir).get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_get_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.save("  sk-test  ").await.unwrap();
        assert_eq!(store.get().await.unwrap().as_deref(), Some("sk-test"));

        store.clear().await.unwrap();
        assert_eq!(store.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_other_entries_are_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, r#"{"theme": "dark"}"#).unwrap();
        let store = CredentialStore::new(&CredentialConfig {
            path: path.clone(),
            ..Default::default()
        });

        store.save("sk-test").await.unwrap();
        store.clear().await.unwrap();

        let raw: BTreeMap<String, String> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.get("theme").map(String::as_str), Some("dark"));
        assert!(!raw.contains_key(DEFAULT_KEY));
    }

    #[tokio::test]
    async fn test_empty_credential_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            store_in(&dir).save("   ").await,
            Err(CredentialError::Empty)
        ));
    }
}

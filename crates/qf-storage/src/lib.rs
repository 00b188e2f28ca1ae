//! Saved-item storage with a size cap and oldest-first eviction, plus the
//! extension's enabled flag.

use chrono::DateTime;
use chrono::Utc;
use qf_core::QfError;
use qf_core::QfResult;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;

pub const SAVED_ITEMS_FILE: &str = "saved_items.json";
pub const STORAGE_DIR_ENV_VAR: &str = "QUIETFEED_STORAGE_DIR";

/// A short the user kept for later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedItem {
    pub id: String,
    pub url: String,
    pub title: String,
    pub saved_at: DateTime<Utc>,
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub max_items: usize,
    pub ephemeral_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_items: 100,
            ephemeral_mode: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreSnapshot {
    #[serde(default = "enabled_by_default")]
    enabled: bool,
    #[serde(default)]
    items: Vec<SavedItem>,
}

fn enabled_by_default() -> bool {
    true
}

/// Saved items keyed by id, optionally mirrored to `<root>/saved_items.json`.
#[derive(Debug, Clone)]
pub struct SavedItemStore {
    config: StorageConfig,
    enabled: bool,
    items: BTreeMap<String, SavedItem>,
    persistent_root: Option<PathBuf>,
}

impl SavedItemStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            enabled: true,
            items: BTreeMap::new(),
            persistent_root: None,
        }
    }

    /// Attaches a persistence directory and loads whatever it already holds.
    pub fn with_persistent_root(mut self, root: PathBuf) -> QfResult<Self> {
        if self.config.ephemeral_mode {
            return Err(QfError::new(
                "storage.persistence_disabled",
                "persistent storage is disabled in ephemeral mode",
            ));
        }

        let snapshot = read_snapshot(&root.join(SAVED_ITEMS_FILE))?;
        self.enabled = snapshot.enabled;
        self.items = snapshot
            .items
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect();
        self.persistent_root = Some(root);
        self.evict_over_cap();
        Ok(self)
    }

    pub fn persistent_root(&self) -> Option<&Path> {
        self.persistent_root.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) -> QfResult<()> {
        self.enabled = enabled;
        self.persist()
    }

    /// Inserts or replaces an item, then evicts the oldest items while over
    /// the cap. Returns what was evicted.
    pub fn save(&mut self, item: SavedItem) -> QfResult<Vec<SavedItem>> {
        if item.id.trim().is_empty() {
            return Err(QfError::new(
                "storage.item_id_missing",
                "saved item must carry a non-empty id",
            ));
        }

        self.items.insert(item.id.clone(), item);
        let evicted = self.evict_over_cap();
        self.persist()?;
        Ok(evicted)
    }

    pub fn get(&self, id: &str) -> Option<&SavedItem> {
        self.items.get(id)
    }

    /// All items, newest first.
    pub fn list(&self) -> Vec<SavedItem> {
        let mut items: Vec<_> = self.items.values().cloned().collect();
        items.sort_by(|left, right| {
            right
                .saved_at
                .cmp(&left.saved_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        items
    }

    pub fn remove(&mut self, id: &str) -> QfResult<bool> {
        if self.items.remove(id).is_none() {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn evict_over_cap(&mut self) -> Vec<SavedItem> {
        let mut evicted = Vec::new();
        while self.items.len() > self.config.max_items {
            let oldest = self
                .items
                .values()
                .min_by(|left, right| {
                    left.saved_at
                        .cmp(&right.saved_at)
                        .then_with(|| left.id.cmp(&right.id))
                })
                .map(|item| item.id.clone());
            let Some(oldest) = oldest else {
                break;
            };
            if let Some(item) = self.items.remove(&oldest) {
                debug!(id = %item.id, "evicted oldest saved item");
                evicted.push(item);
            }
        }
        evicted
    }

    fn persist(&self) -> QfResult<()> {
        let Some(root) = self.persistent_root.as_ref() else {
            return Ok(());
        };

        fs::create_dir_all(root).map_err(|error| {
            QfError::new(
                "storage.dir_create_failed",
                format!(
                    "failed to create storage directory `{}`: {error}",
                    root.display()
                ),
            )
        })?;

        let snapshot = StoreSnapshot {
            enabled: self.enabled,
            items: self.list(),
        };
        let encoded = serde_json::to_string_pretty(&snapshot).map_err(|error| {
            QfError::new(
                "storage.encode_failed",
                format!("failed to encode saved items: {error}"),
            )
        })?;

        let path = root.join(SAVED_ITEMS_FILE);
        fs::write(&path, encoded).map_err(|error| {
            QfError::new(
                "storage.write_failed",
                format!("failed to write `{}`: {error}", path.display()),
            )
        })
    }
}

impl Default for SavedItemStore {
    fn default() -> Self {
        Self::new(StorageConfig::default())
    }
}

/// `QUIETFEED_STORAGE_DIR`, else `./.quietfeed`.
pub fn default_storage_root() -> PathBuf {
    if let Some(override_root) = std::env::var_os(STORAGE_DIR_ENV_VAR) {
        return PathBuf::from(override_root);
    }

    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".quietfeed")
}

fn read_snapshot(path: &Path) -> QfResult<StoreSnapshot> {
    if !path.exists() {
        return Ok(StoreSnapshot {
            enabled: true,
            items: Vec::new(),
        });
    }

    let content = fs::read_to_string(path).map_err(|error| {
        QfError::new(
            "storage.read_failed",
            format!("failed to read `{}`: {error}", path.display()),
        )
    })?;

    serde_json::from_str(&content).map_err(|error| {
        QfError::new(
            "storage.format_invalid",
            format!("`{}` is not a valid saved-items file: {error}", path.display()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::SAVED_ITEMS_FILE;
    use super::SavedItem;
    use super::SavedItemStore;
    use super::StorageConfig;
    use chrono::DateTime;
    use chrono::TimeZone;
    use chrono::Utc;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0)
            .single()
            .unwrap_or_else(|| unreachable!())
    }

    fn item(id: &str, seconds: i64) -> SavedItem {
        SavedItem {
            id: id.to_owned(),
            url: format!("https://www.youtube.com/shorts/{id}"),
            title: format!("Short {id}"),
            saved_at: at(seconds),
        }
    }

    fn capped(max_items: usize) -> SavedItemStore {
        SavedItemStore::new(StorageConfig {
            max_items,
            ephemeral_mode: false,
        })
    }

    #[test]
    fn lists_newest_first_and_upserts_by_id() {
        let mut store = SavedItemStore::default();
        assert!(store.save(item("a", 1)).is_ok());
        assert!(store.save(item("b", 5)).is_ok());
        assert!(store.save(item("a", 9)).is_ok());

        let ids: Vec<_> = store.list().into_iter().map(|item| item.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn evicts_oldest_items_over_the_cap() {
        let mut store = capped(2);
        assert!(store.save(item("old", 1)).is_ok());
        assert!(store.save(item("mid", 2)).is_ok());
        let evicted = store.save(item("new", 3)).unwrap_or_else(|_| unreachable!());

        assert_eq!(evicted, vec![item("old", 1)]);
        assert!(store.get("old").is_none());
        assert!(store.get("mid").is_some());
        assert!(store.get("new").is_some());
    }

    #[test]
    fn rejects_items_without_id() {
        let mut store = SavedItemStore::default();
        let saved = store.save(item(" ", 1));
        assert!(saved.is_err());
        if let Err(error) = saved {
            assert_eq!(error.code, "storage.item_id_missing");
        }
    }

    #[test]
    fn remove_reports_whether_anything_was_deleted() {
        let mut store = SavedItemStore::default();
        assert!(store.save(item("a", 1)).is_ok());
        assert_eq!(store.remove("a"), Ok(true));
        assert_eq!(store.remove("a"), Ok(false));
        assert!(store.is_empty());
    }

    #[test]
    fn persists_items_and_enabled_flag_across_reopen() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let root = dir.path().to_path_buf();

        let mut store = SavedItemStore::default()
            .with_persistent_root(root.clone())
            .unwrap_or_else(|_| unreachable!());
        assert!(store.save(item("a", 1)).is_ok());
        assert!(store.set_enabled(false).is_ok());
        assert!(root.join(SAVED_ITEMS_FILE).exists());

        let reopened = SavedItemStore::default()
            .with_persistent_root(root)
            .unwrap_or_else(|_| unreachable!());
        assert!(!reopened.is_enabled());
        assert_eq!(reopened.list(), vec![item("a", 1)]);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        assert!(std::fs::write(dir.path().join(SAVED_ITEMS_FILE), "{not json").is_ok());
        let opened = SavedItemStore::default().with_persistent_root(dir.path().to_path_buf());
        assert!(opened.is_err());
        if let Err(error) = opened {
            assert_eq!(error.code, "storage.format_invalid");
        }
    }

    #[test]
    fn ephemeral_mode_blocks_persistence() {
        let config = StorageConfig {
            max_items: 10,
            ephemeral_mode: true,
        };
        let opened = SavedItemStore::new(config).with_persistent_root(std::env::temp_dir());
        assert!(opened.is_err());
        if let Err(error) = opened {
            assert_eq!(error.code, "storage.persistence_disabled");
        }
    }
}

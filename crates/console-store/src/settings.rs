//! Persistence of listing-view preferences.
//!
//! Views never read storage directly; they are handed a [`SettingsStorage`]
//! and go through [`ViewPreferences`]. Keys are namespaced per collection
//! (`channel.page-size`) and fall back to the global keys (`page-size`).

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::warn;

use console_shared::constants::{
    ITEMS_PER_PAGE, MAX_PAGE_SIZE, SETTING_ID_SORT, SETTING_PAGE_SIZE,
};
use console_shared::types::SortOrder;

use crate::database::Database;
use crate::error::{Result, StoreError};

/// String key/value storage for preferences.
pub trait SettingsStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

impl Database {
    /// Read one setting.
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Insert or overwrite one setting.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO settings (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                            updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

/// [`SettingsStorage`] backed by the SQLite [`Database`].
pub struct SqliteSettings {
    db: Mutex<Database>,
}

impl SqliteSettings {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }
}

impl SettingsStorage for SqliteSettings {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.lock().map_err(|_| StoreError::LockPoisoned)?;
        db.get_setting(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db.lock().map_err(|_| StoreError::LockPoisoned)?;
        db.set_setting(key, value)
    }
}

/// Non-persistent [`SettingsStorage`].
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStorage for MemorySettings {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Page size and server sort order of one listing view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewPreferences {
    pub page_size: usize,
    pub id_sort: bool,
}

impl Default for ViewPreferences {
    fn default() -> Self {
        Self {
            page_size: ITEMS_PER_PAGE,
            id_sort: false,
        }
    }
}

impl ViewPreferences {
    /// Load the preferences of `collection`. Storage errors and malformed
    /// values are logged and replaced by the next fallback.
    pub fn load(storage: &dyn SettingsStorage, collection: &str) -> Self {
        let defaults = Self::default();
        let page_size = lookup(storage, collection, SETTING_PAGE_SIZE, |v| {
            v.parse::<usize>()
                .ok()
                .filter(|n| (1..=MAX_PAGE_SIZE).contains(n))
        })
        .unwrap_or(defaults.page_size);
        let id_sort = lookup(storage, collection, SETTING_ID_SORT, |v| v.parse::<bool>().ok())
            .unwrap_or(defaults.id_sort);
        Self { page_size, id_sort }
    }

    /// Persist under the collection's own keys.
    pub fn save(&self, storage: &dyn SettingsStorage, collection: &str) -> Result<()> {
        storage.set(
            &scoped(collection, SETTING_PAGE_SIZE),
            &self.page_size.to_string(),
        )?;
        storage.set(&scoped(collection, SETTING_ID_SORT), &self.id_sort.to_string())
    }

    pub fn sort(&self) -> SortOrder {
        SortOrder::from_id_sort(self.id_sort)
    }
}

fn scoped(collection: &str, key: &str) -> String {
    format!("{collection}.{key}")
}

/// First valid value among the scoped key and the global key.
fn lookup<V>(
    storage: &dyn SettingsStorage,
    collection: &str,
    key: &str,
    parse: impl Fn(&str) -> Option<V>,
) -> Option<V> {
    for candidate in [scoped(collection, key), key.to_string()] {
        match storage.get(&candidate) {
            Ok(Some(raw)) => match parse(raw.trim()) {
                Some(value) => return Some(value),
                None => warn!(key = %candidate, value = %raw, "Ignoring malformed setting"),
            },
            Ok(None) => {}
            Err(e) => warn!(key = %candidate, error = %e, "Failed to read setting"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_nothing_stored() {
        let storage = MemorySettings::new();
        assert_eq!(
            ViewPreferences::load(&storage, "channel"),
            ViewPreferences::default()
        );
    }

    #[test]
    fn scoped_key_wins_over_global() {
        let storage = MemorySettings::new();
        storage.set("page-size", "50").unwrap();
        storage.set("token.page-size", "20").unwrap();
        assert_eq!(ViewPreferences::load(&storage, "token").page_size, 20);
        assert_eq!(ViewPreferences::load(&storage, "channel").page_size, 50);
    }

    #[test]
    fn malformed_values_fall_back() {
        let storage = MemorySettings::new();
        storage.set("channel.page-size", "lots").unwrap();
        storage.set("page-size", "5000").unwrap();
        storage.set("channel.id-sort", "yes").unwrap();
        storage.set("id-sort", "true").unwrap();

        let prefs = ViewPreferences::load(&storage, "channel");
        assert_eq!(prefs.page_size, ITEMS_PER_PAGE);
        assert!(prefs.id_sort);
    }

    #[test]
    fn preferences_round_trip_through_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("console.db");

        let storage = SqliteSettings::new(Database::open_at(&path).unwrap());
        let prefs = ViewPreferences {
            page_size: 50,
            id_sort: true,
        };
        prefs.save(&storage, "redemption").unwrap();
        drop(storage);

        let reopened = SqliteSettings::new(Database::open_at(&path).unwrap());
        assert_eq!(ViewPreferences::load(&reopened, "redemption"), prefs);
        assert_eq!(ViewPreferences::load(&reopened, "redemption").sort(), SortOrder::IdDescending);
    }

    #[test]
    fn set_setting_overwrites() {
        let db = Database::open_in_memory().unwrap();
        db.set_setting("page-size", "10").unwrap();
        db.set_setting("page-size", "20").unwrap();
        assert_eq!(db.get_setting("page-size").unwrap().as_deref(), Some("20"));
        assert_eq!(db.get_setting("missing").unwrap(), None);
    }
}

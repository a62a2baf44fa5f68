//! Process-wide preferences store.
//!
//! Keys are short lowercase identifiers. Values are typed; a getter asked for
//! the wrong type returns the zero value of the requested type. The store is
//! persisted as a JSON object keyed by entry name.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const MAX_KEY_LENGTH: usize = 80;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PrefsValue {
    Null,
    String(String),
    Int(i32),
    Double(f64),
    Bool(bool),
}

pub struct Preferences {
    path: Option<PathBuf>,
    entries: BTreeMap<String, PrefsValue>,
}

impl Preferences {
    /// In-memory store that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: BTreeMap::new(),
        }
    }

    /// Opens the store `<dir>/<prefs_id>.prefs.json`, starting empty when the
    /// file is missing or unreadable.
    pub fn open(dir: &Path, prefs_id: &str) -> Result<Self, String> {
        if !is_valid_key(prefs_id) {
            return Err(format!("Invalid preferences id '{prefs_id}'"));
        }
        let path = dir.join(format!("{prefs_id}.prefs.json"));
        let mut prefs = Self {
            path: Some(path),
            entries: BTreeMap::new(),
        };
        if let Err(err) = prefs.load() {
            log::warn!("{err}. Starting with empty preferences.");
        }
        Ok(prefs)
    }

    pub fn load(&mut self) -> Result<(), String> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }
        let raw = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read preferences {}: {e}", path.display()))?;
        let entries: BTreeMap<String, PrefsValue> = serde_json::from_str(&raw)
            .map_err(|e| format!("Failed to parse preferences {}: {e}", path.display()))?;
        self.entries = entries
            .into_iter()
            .filter(|(key, _)| is_valid_key(key))
            .collect();
        Ok(())
    }

    pub fn save(&self) -> Result<(), String> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| format!("Failed to serialize preferences: {e}"))?;
        fs::write(path, raw)
            .map_err(|e| format!("Failed to write preferences {}: {e}", path.display()))?;
        log::debug!("Saved preferences to {}", path.display());
        Ok(())
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(PrefsValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> i32 {
        match self.entries.get(key) {
            Some(PrefsValue::Int(v)) => *v,
            _ => 0,
        }
    }

    pub fn get_double(&self, key: &str) -> f64 {
        match self.entries.get(key) {
            Some(PrefsValue::Double(v)) => *v,
            _ => 0.0,
        }
    }

    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.entries.get(key), Some(PrefsValue::Bool(true)))
    }

    pub fn set_string(&mut self, key: &str, value: &str) {
        self.set(key, PrefsValue::String(value.to_string()));
    }

    pub fn set_int(&mut self, key: &str, value: i32) {
        self.set(key, PrefsValue::Int(value));
    }

    pub fn set_double(&mut self, key: &str, value: f64) {
        self.set(key, PrefsValue::Double(value));
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.set(key, PrefsValue::Bool(value));
    }

    pub fn set_null(&mut self, key: &str) {
        self.set(key, PrefsValue::Null);
    }

    /// Type code of an entry: `'\0'` null, `s`, `i`, `f`, `b`, `-` when absent.
    pub fn item_type(&self, key: &str) -> char {
        match self.entries.get(key) {
            Some(PrefsValue::Null) => '\0',
            Some(PrefsValue::String(_)) => 's',
            Some(PrefsValue::Int(_)) => 'i',
            Some(PrefsValue::Double(_)) => 'f',
            Some(PrefsValue::Bool(_)) => 'b',
            None => '-',
        }
    }

    pub fn has_item(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn delete_item(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn set(&mut self, key: &str, value: PrefsValue) {
        if !is_valid_key(key) {
            log::warn!("Invalid preferences key '{key}'");
            return;
        }
        self.entries.insert(key.to_string(), value);
    }
}

/// Keys are `[a-z0-9]{1,80}`.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_KEY_LENGTH
        && key
            .bytes()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir_path(name_hint: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "surge_prefs_test_{}_{}_{}",
            name_hint,
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn typed_getters_return_zero_values_on_mismatch() {
        let mut prefs = Preferences::in_memory();
        prefs.set_string("langpath", "languages/english.lng");
        assert_eq!(prefs.get_string("langpath"), Some("languages/english.lng"));
        assert_eq!(prefs.get_int("langpath"), 0);
        assert_eq!(prefs.get_double("langpath"), 0.0);
        assert!(!prefs.get_bool("langpath"));
    }

    #[test]
    fn item_type_reports_each_kind() {
        let mut prefs = Preferences::in_memory();
        prefs.set_null("a");
        prefs.set_string("b", "x");
        prefs.set_int("c", 3);
        prefs.set_double("d", 0.5);
        prefs.set_bool("e", true);
        assert_eq!(prefs.item_type("a"), '\0');
        assert_eq!(prefs.item_type("b"), 's');
        assert_eq!(prefs.item_type("c"), 'i');
        assert_eq!(prefs.item_type("d"), 'f');
        assert_eq!(prefs.item_type("e"), 'b');
        assert_eq!(prefs.item_type("missing"), '-');
    }

    #[test]
    fn invalid_keys_are_rejected() {
        let mut prefs = Preferences::in_memory();
        prefs.set_int("Bad Key", 1);
        prefs.set_int("", 1);
        assert!(prefs.is_empty());
        assert!(!is_valid_key(&"a".repeat(81)));
        assert!(is_valid_key(&"a".repeat(80)));
    }

    #[test]
    fn delete_and_clear_remove_entries() {
        let mut prefs = Preferences::in_memory();
        prefs.set_int("x", 1);
        prefs.set_int("y", 2);
        assert!(prefs.delete_item("x"));
        assert!(!prefs.delete_item("x"));
        assert!(prefs.has_item("y"));
        prefs.clear();
        assert_eq!(prefs.len(), 0);
    }

    #[test]
    fn save_then_open_restores_entries() {
        let dir = temp_dir_path("roundtrip");
        {
            let mut prefs = Preferences::open(&dir, "opensurge").expect("valid id");
            prefs.set_string("langpath", "languages/english.lng");
            prefs.set_int("resolution", 2);
            prefs.set_bool("fullscreen", true);
            prefs.save().expect("save should succeed");
        }
        let prefs = Preferences::open(&dir, "opensurge").expect("valid id");
        assert_eq!(prefs.get_string("langpath"), Some("languages/english.lng"));
        assert_eq!(prefs.get_int("resolution"), 2);
        assert!(prefs.get_bool("fullscreen"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn open_rejects_invalid_prefs_id() {
        let dir = temp_dir_path("badid");
        assert!(Preferences::open(&dir, "Open Surge").is_err());
    }
}

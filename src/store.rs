use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

/// Slot holding the serialized transcript.
pub const SAVED_CHATS_KEY: &str = "saved_chats";
/// Slot holding the theme sentinel.
pub const THEME_KEY: &str = "theme_color";

/// String-keyed persistent slots. Last writer wins; there is no locking across processes.
pub trait Store: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// One file per key inside a data directory. Files hold the raw slot value, so they carry no
/// extension: the transcript slot is JSON, the theme slot a bare sentinel.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl Store for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.slot_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let value = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(Some(value))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;

        // Write then rename so a crash never leaves a half-written slot behind.
        let path = self.slot_path(key);
        let tmp = self.dir.join(format!("{}.tmp", key));
        fs::write(&tmp, value).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }
}

pub fn default_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?;
    Ok(data_dir.join("gemini-chat"))
}

#[cfg(test)]
pub use memory::MemoryStore;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_slots() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("nested"));

        assert_eq!(store.get(THEME_KEY).unwrap(), None);
        store.set(THEME_KEY, "light_mode").unwrap();
        store.set(SAVED_CHATS_KEY, "[]").unwrap();
        store.set(THEME_KEY, "dark_mode").unwrap();

        let reopened = FileStore::new(dir.path().join("nested"));
        assert_eq!(reopened.get(THEME_KEY).unwrap().as_deref(), Some("dark_mode"));
        assert_eq!(reopened.get(SAVED_CHATS_KEY).unwrap().as_deref(), Some("[]"));
        assert!(!dir.path().join("nested/theme_color.tmp").exists());
    }

    #[test]
    fn slot_files_hold_the_raw_value() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path());
        store.set(THEME_KEY, "light_mode").unwrap();
        store.set(SAVED_CHATS_KEY, r#"[{"role":"user","text":"hi"}]"#).unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("theme_color")).unwrap(), "light_mode");
        let chats = fs::read_to_string(dir.path().join("saved_chats")).unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(&chats).is_ok());
        assert!(!dir.path().join("theme_color.json").exists());
    }

    #[test]
    fn memory_store_clones_share_slots() {
        let store = MemoryStore::new();
        let mut writer = store.clone();
        writer.set(SAVED_CHATS_KEY, "a").unwrap();
        writer.set(SAVED_CHATS_KEY, "b").unwrap();

        assert_eq!(store.get(SAVED_CHATS_KEY).unwrap().as_deref(), Some("b"));
        assert_eq!(store.write_count(SAVED_CHATS_KEY), 2);
        assert_eq!(store.write_count(THEME_KEY), 0);
    }
}

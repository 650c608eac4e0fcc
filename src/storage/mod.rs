use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::config::{ConfigPaths, StorageOptions};

mod memory;
mod schema;

pub use memory::MemoryStore;

/// String key-value store every blog component persists through.
///
/// Operations are synchronous and either fully succeed or return an error;
/// callers never retry.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    fn keys(&self) -> Result<Vec<String>>;

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .keys()?
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect())
    }
}

/// SQLite-backed store: one `kv` table inside the data directory.
#[derive(Clone)]
pub struct SqliteStore {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl SqliteStore {
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&*self.db_path)
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_connection(|conn| {
            conn.query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .with_context(|| format!("reading key {key}"))
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .with_context(|| format!("writing key {key}"))?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute("DELETE FROM kv WHERE key = ?1", [key])
                .with_context(|| format!("removing key {key}"))?;
            Ok(())
        })
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT key FROM kv ORDER BY key")
                .context("preparing key listing")?;
            let keys = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()
                .context("listing keys")?;
            Ok(keys)
        })
    }
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<SqliteStore> {
    let db_path = &paths.database_path;
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage)?;
    schema::apply(&conn)?;
    tracing::debug!(path = %db_path.display(), "store ready");
    Ok(SqliteStore {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("setting journal_mode=WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("setting synchronous=NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )
    .context("setting wal_autocheckpoint")?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) fn temp_paths(root: &TempDir) -> ConfigPaths {
        let base = root.path();
        let config_dir = base.join("config");
        let data_dir = base.join("data");
        ConfigPaths {
            config_dir: config_dir.clone(),
            config_file: config_dir.join("config.toml"),
            data_dir: data_dir.clone(),
            database_path: data_dir.join("blog.db"),
        }
    }

    pub(crate) fn init_store() -> anyhow::Result<(TempDir, SqliteStore)> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        paths.ensure_directories()?;
        let store = init(&paths, &StorageOptions::default())?;
        Ok((temp, store))
    }

    #[test]
    fn set_overwrites_existing_value() -> anyhow::Result<()> {
        let (_temp, store) = init_store()?;
        store.set("personal_blog_admin", "false")?;
        store.set("personal_blog_admin", "true")?;
        assert_eq!(store.get("personal_blog_admin")?.as_deref(), Some("true"));
        assert_eq!(store.keys()?, vec!["personal_blog_admin".to_string()]);
        Ok(())
    }

    #[test]
    fn remove_missing_key_is_a_no_op() -> anyhow::Result<()> {
        let (_temp, store) = init_store()?;
        store.remove("draft_musings_new")?;
        assert_eq!(store.get("draft_musings_new")?, None);
        Ok(())
    }

    #[test]
    fn prefix_listing_treats_underscores_literally() -> anyhow::Result<()> {
        let (_temp, store) = init_store()?;
        store.set("draft_musings_new", "{}")?;
        store.set("draft_musings_3", "{}")?;
        store.set("draftXmusings_4", "{}")?;
        store.set("personal_blog_posts", "{}")?;

        let keys = store.keys_with_prefix("draft_musings_")?;
        assert_eq!(keys, vec!["draft_musings_3", "draft_musings_new"]);
        Ok(())
    }

    #[test]
    fn values_survive_reopening_the_database() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        paths.ensure_directories()?;
        {
            let store = init(&paths, &StorageOptions::default())?;
            store.set("personal_blog_posts", r#"{"musings":[]}"#)?;
        }
        let store = init(&paths, &StorageOptions::default())?;
        assert_eq!(
            store.get("personal_blog_posts")?.as_deref(),
            Some(r#"{"musings":[]}"#)
        );
        Ok(())
    }
}

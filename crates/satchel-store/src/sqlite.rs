use crate::KeyValueStore;
use chrono::Utc;
use rusqlite::{Connection, Error as SqlError, ErrorCode, OptionalExtension, params};
use satchel_core::{SatchelError, SatchelResult};
use satchel_fs::WorkspacePaths;
use std::path::{Path, PathBuf};

/// SQLite-backed store scoped to one profile. Each call opens its own
/// connection, so separate commands never share an implicit transaction.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
    profile: String,
}

impl SqliteStore {
    pub fn from_workspace(paths: &WorkspacePaths, profile: &str) -> SatchelResult<Self> {
        Self::open(&paths.state_db_path, profile)
    }

    pub fn open(db_path: &Path, profile: &str) -> SatchelResult<Self> {
        let store = Self {
            db_path: db_path.to_path_buf(),
            profile: profile_key(profile),
        };

        let conn = store.connection()?;
        store.initialize_schema(&conn)?;

        Ok(store)
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Drops every key of this profile.
    pub fn clear(&self) -> SatchelResult<()> {
        let conn = self.connection()?;
        conn.execute("DELETE FROM kv WHERE profile = ?1", params![self.profile])
            .map_err(|err| sqlite_error("clear profile state", &self.db_path, err))?;
        Ok(())
    }

    fn connection(&self) -> SatchelResult<Connection> {
        Connection::open(&self.db_path)
            .map_err(|err| sqlite_error("open state database", &self.db_path, err))
    }

    fn initialize_schema(&self, conn: &Connection) -> SatchelResult<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             CREATE TABLE IF NOT EXISTS kv (
                 profile TEXT NOT NULL,
                 key TEXT NOT NULL,
                 value TEXT NOT NULL,
                 updated_at TEXT NOT NULL,
                 PRIMARY KEY (profile, key)
             );",
        )
        .map_err(|err| sqlite_error("initialize schema", &self.db_path, err))?;

        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> SatchelResult<Option<String>> {
        let conn = self.connection()?;
        conn.query_row(
            "SELECT value FROM kv WHERE profile = ?1 AND key = ?2",
            params![self.profile, key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|err| sqlite_error(&format!("load '{key}'"), &self.db_path, err))
    }

    fn set(&self, key: &str, value: &str) -> SatchelResult<()> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO kv (profile, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(profile, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![self.profile, key, value, Utc::now().to_rfc3339()],
        )
        .map_err(|err| sqlite_error(&format!("save '{key}'"), &self.db_path, err))?;

        Ok(())
    }

    fn remove(&self, key: &str) -> SatchelResult<()> {
        let conn = self.connection()?;
        conn.execute(
            "DELETE FROM kv WHERE profile = ?1 AND key = ?2",
            params![self.profile, key],
        )
        .map_err(|err| sqlite_error(&format!("remove '{key}'"), &self.db_path, err))?;
        Ok(())
    }
}

fn sqlite_error(action: &str, db_path: &Path, err: SqlError) -> SatchelError {
    if let SqlError::SqliteFailure(code, message) = &err
        && (code.code == ErrorCode::DatabaseCorrupt || code.code == ErrorCode::NotADatabase)
    {
        let detail = message.as_deref().unwrap_or("sqlite reported corruption");
        return SatchelError::io(format!(
            "failed to {action}: state database '{}' is corrupted ({detail}); remove '.satchel/state.db' and run `satchel sync --force` to rebuild the local cache",
            db_path.display()
        ));
    }

    SatchelError::io(format!(
        "failed to {action} using state database '{}': {}",
        db_path.display(),
        err
    ))
}

fn profile_key(profile: &str) -> String {
    let mut output = String::with_capacity(profile.len());
    for ch in profile.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            output.push(ch);
        } else {
            output.push('_');
        }
    }

    if output.is_empty() {
        "default".to_string()
    } else {
        output
    }
}

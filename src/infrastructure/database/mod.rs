//! SQLite persistence - applies the schema resources plugins declare

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::application::errors::StorageError;
use crate::domain::traits::PersistenceConfigurator;

/// SQLite-backed persistence
///
/// Each resource name maps to `<schema_dir>/<name>.sql`. A resource is applied
/// once; applied names are recorded in `schema_resources`.
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
    schema_dir: PathBuf,
}

impl SqliteDatabase {
    pub fn open(path: impl AsRef<Path>, schema_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, schema_dir.into())
    }

    pub fn in_memory(schema_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, schema_dir.into())
    }

    fn with_connection(conn: Connection, schema_dir: PathBuf) -> Result<Self, StorageError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_resources (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            schema_dir,
        })
    }

    /// Names of resources applied so far, sorted
    pub async fn applied_resources(&self) -> Result<Vec<String>, StorageError> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || -> Result<Vec<String>, StorageError> {
            let conn = lock(&conn)?;
            let mut stmt = conn.prepare("SELECT name FROM schema_resources ORDER BY name")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut names = Vec::new();
            for name in rows {
                names.push(name?);
            }
            Ok(names)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }

    /// Run a closure against the connection on the blocking pool
    pub async fn with_conn<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || -> Result<T, StorageError> {
            let conn = lock(&conn)?;
            f(&conn)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, StorageError> {
    conn.lock()
        .map_err(|_| StorageError::Task("connection lock poisoned".to_string()))
}

fn check_resource_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(StorageError::NotFound(name.to_string()));
    }
    Ok(())
}

fn apply_resources(
    conn: &mut Connection,
    schema_dir: &Path,
    resources: &BTreeSet<String>,
) -> Result<(), StorageError> {
    for name in resources {
        check_resource_name(name)?;

        let applied = conn
            .query_row(
                "SELECT name FROM schema_resources WHERE name = ?1",
                [name],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        if applied.is_some() {
            debug!("Schema resource {} already applied", name);
            continue;
        }

        let path = schema_dir.join(format!("{}.sql", name));
        if !path.is_file() {
            return Err(StorageError::NotFound(path.display().to_string()));
        }
        let sql = std::fs::read_to_string(&path)?;

        let tx = conn.transaction()?;
        tx.execute_batch(&sql)?;
        tx.execute(
            "INSERT INTO schema_resources (name, applied_at) VALUES (?1, ?2)",
            rusqlite::params![name, chrono::Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        info!("Applied schema resource {}", name);
    }
    Ok(())
}

#[async_trait]
impl PersistenceConfigurator for SqliteDatabase {
    async fn configure(&self, resources: &BTreeSet<String>) -> Result<(), StorageError> {
        if resources.is_empty() {
            return Ok(());
        }
        let conn = Arc::clone(&self.conn);
        let schema_dir = self.schema_dir.clone();
        let resources = resources.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let mut conn = lock(&conn)?;
            apply_resources(&mut conn, &schema_dir, &resources)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

/// Used when no database is configured. Declared resources are only logged.
#[derive(Debug, Default)]
pub struct NullPersistence;

#[async_trait]
impl PersistenceConfigurator for NullPersistence {
    async fn configure(&self, resources: &BTreeSet<String>) -> Result<(), StorageError> {
        if !resources.is_empty() {
            warn!(
                "No database configured, not applying schema resources: {:?}",
                resources
            );
        }
        Ok(())
    }
}

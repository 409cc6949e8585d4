use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::backup::Backup;
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

const CATALOG_SCHEMA: &str = include_str!("../../sql/catalog.sql");
const BUDGET_SCHEMA: &str = include_str!("../../sql/budget.sql");
const REORDER_SCHEMA: &str = include_str!("../../sql/reorder.sql");

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database path not configured")]
    MissingPath,
    #[error("failed to create database directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to open database at {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },
    #[error("failed to apply schema to {path}: {source}")]
    Schema {
        path: PathBuf,
        source: rusqlite::Error,
    },
    #[error("backup to {path} failed: {source}")]
    Backup {
        path: PathBuf,
        source: rusqlite::Error,
    },
}

pub type DatabaseResult<T> = std::result::Result<T, DatabaseError>;

pub fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;\n\
         PRAGMA synchronous = NORMAL;\n\
         PRAGMA foreign_keys = ON;\n\
         PRAGMA temp_store = MEMORY;\n\
         PRAGMA busy_timeout = 5000;\n",
    )
}

#[derive(Debug, Clone)]
pub struct SqliteDatabaseBuilder {
    path: Option<PathBuf>,
    create_if_missing: bool,
}

impl Default for SqliteDatabaseBuilder {
    fn default() -> Self {
        Self {
            path: None,
            create_if_missing: true,
        }
    }
}

impl SqliteDatabaseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    pub fn build(self) -> DatabaseResult<SqliteDatabase> {
        let path = self.path.ok_or(DatabaseError::MissingPath)?;
        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE;
        if self.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        Ok(SqliteDatabase { path, flags })
    }
}

/// Location of the shared HeyTrack database. Every call opens its own connection.
#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    path: PathBuf,
    flags: OpenFlags,
}

impl SqliteDatabase {
    pub fn builder() -> SqliteDatabaseBuilder {
        SqliteDatabaseBuilder::new()
    }

    pub fn new(path: impl AsRef<Path>) -> DatabaseResult<Self> {
        SqliteDatabaseBuilder::new().path(path).build()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open(&self) -> DatabaseResult<Connection> {
        let conn = Connection::open_with_flags(&self.path, self.flags).map_err(|source| {
            DatabaseError::Open {
                path: self.path.clone(),
                source,
            }
        })?;
        configure_connection(&conn).map_err(|source| DatabaseError::Open {
            path: self.path.clone(),
            source,
        })?;
        Ok(conn)
    }

    /// Applies every schema; catalog first because the others reference it.
    pub fn initialize(&self) -> DatabaseResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| DatabaseError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let conn = self.open()?;
        for schema in [CATALOG_SCHEMA, BUDGET_SCHEMA, REORDER_SCHEMA] {
            conn.execute_batch(schema)
                .map_err(|source| DatabaseError::Schema {
                    path: self.path.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Copies the live database into `destination` with the online backup API.
    pub fn backup_to(&self, destination: impl AsRef<Path>) -> DatabaseResult<()> {
        let destination = destination.as_ref();
        let source = self.open()?;
        let backup_err = |source| DatabaseError::Backup {
            path: destination.to_path_buf(),
            source,
        };
        let mut dest = Connection::open(destination).map_err(backup_err)?;
        let backup = Backup::new(&source, &mut dest).map_err(backup_err)?;
        backup
            .run_to_completion(10, Duration::from_millis(50), None)
            .map_err(backup_err)
    }

    /// `PRAGMA integrity_check` result, `"ok"` when healthy.
    pub fn integrity_check(&self) -> DatabaseResult<String> {
        let conn = self.open()?;
        conn.query_row("PRAGMA integrity_check;", [], |row| row.get(0))
            .map_err(|source| DatabaseError::Open {
                path: self.path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_reports_unusable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("data");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let db = SqliteDatabase::new(blocker.join("heytrack.sqlite")).unwrap();
        match db.initialize() {
            Err(DatabaseError::CreateDir { path, .. }) => assert_eq!(path, blocker),
            other => panic!("expected CreateDir, got {other:?}"),
        }
    }

    #[test]
    fn initialize_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/data/heytrack.sqlite");
        let db = SqliteDatabase::new(&path).unwrap();
        db.initialize().unwrap();
        db.initialize().unwrap();
        assert!(path.exists());
        assert_eq!(db.integrity_check().unwrap(), "ok");
    }
}

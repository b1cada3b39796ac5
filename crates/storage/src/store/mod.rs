#![forbid(unsafe_code)]

mod adapters;
mod csv;
mod error;
mod import;
mod query;
mod requests;

pub use adapters::MappingError;
pub use error::StoreError;
pub use import::{ImportReport, RunStatus};
pub use query::{
    DEFAULT_LIMIT, MAX_LIMIT, MAX_RADIUS_M, MIN_RADIUS_M, NearestTree, QueryError,
};
pub use requests::*;

use canopy_core::city::City;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DB_FILE: &str = "canopy.db";
const SCHEMA_VERSION: &str = "v1";

/// The canonical street-tree store: one SQLite database owning the
/// `street_trees` table, the append-only `import_runs` audit table, and the
/// species enrichment tables.
#[derive(Debug)]
pub struct TreeStore {
    conn: Connection,
    storage_dir: PathBuf,
}

impl TreeStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join(DB_FILE);
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        install_schema(&conn)?;

        Ok(Self { conn, storage_dir })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Total rows currently stored for one source.
    pub fn source_row_count(&self, source: &str) -> Result<i64, StoreError> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM street_trees WHERE source = ?1",
            params![source],
            |row| row.get(0),
        )?)
    }

    /// Recent import runs, newest first, optionally filtered to one city.
    pub fn list_runs(&self, request: &ListRunsRequest) -> Result<Vec<ImportRunRow>, StoreError> {
        let limit = request.limit.max(1) as i64;
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, city, source_name, source_file, refresh_mode, row_count,
                   status, error_message, started_at_ms, finished_at_ms
            FROM import_runs
            WHERE (?1 IS NULL OR city = ?1)
            ORDER BY finished_at_ms DESC, id DESC
            LIMIT ?2
            "#,
        )?;
        let city = request.city.map(|c| c.as_str());
        let rows = stmt.query_map(params![city, limit], import_run_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// The most recent run for one city, if any.
    pub fn last_run(&self, city: City) -> Result<Option<ImportRunRow>, StoreError> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, city, source_name, source_file, refresh_mode, row_count,
                       status, error_message, started_at_ms, finished_at_ms
                FROM import_runs
                WHERE city = ?1
                ORDER BY finished_at_ms DESC, id DESC
                LIMIT 1
                "#,
                params![city.as_str()],
                import_run_from_row,
            )
            .optional()?)
    }

    pub fn upsert_species_link(&mut self, common_name: &str, wikipedia_url: &str) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO species_links(common_name, wikipedia_url) VALUES (?1, ?2)
            ON CONFLICT(common_name) DO UPDATE SET wikipedia_url = excluded.wikipedia_url
            "#,
            params![common_name, wikipedia_url],
        )?;
        Ok(())
    }

    pub fn upsert_species_name(&mut self, original_common_name: &str, readable_name: &str) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO species_names(original_common_name, readable_name) VALUES (?1, ?2)
            ON CONFLICT(original_common_name) DO UPDATE SET readable_name = excluded.readable_name
            "#,
            params![original_common_name, readable_name],
        )?;
        Ok(())
    }
}

/// One appended audit row. Immutable once written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportRunRow {
    pub id: i64,
    pub city: String,
    pub source_name: String,
    pub source_file: String,
    pub refresh_mode: bool,
    pub row_count: Option<i64>,
    pub status: String,
    pub error_message: Option<String>,
    pub started_at_ms: i64,
    pub finished_at_ms: i64,
}

fn import_run_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImportRunRow> {
    Ok(ImportRunRow {
        id: row.get(0)?,
        city: row.get(1)?,
        source_name: row.get(2)?,
        source_file: row.get(3)?,
        refresh_mode: row.get(4)?,
        row_count: row.get(5)?,
        status: row.get(6)?,
        error_message: row.get(7)?,
        started_at_ms: row.get(8)?,
        finished_at_ms: row.get(9)?,
    })
}

fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;

        CREATE TABLE IF NOT EXISTS meta (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS street_trees (
          source TEXT NOT NULL,
          objectid INTEGER NOT NULL,
          city_id TEXT,
          structid TEXT,
          address TEXT,
          streetname TEXT,
          crossstreet1 TEXT,
          crossstreet2 TEXT,
          suffix TEXT,
          unit_number TEXT,
          tree_position_number TEXT,
          site TEXT,
          ward TEXT,
          botanical_name TEXT,
          common_name TEXT,
          dbh_trunk INTEGER,
          latitude REAL NOT NULL CHECK (latitude BETWEEN -90.0 AND 90.0),
          longitude REAL NOT NULL CHECK (longitude BETWEEN -180.0 AND 180.0),
          wikipedia_url TEXT,
          PRIMARY KEY (source, objectid)
        );

        CREATE INDEX IF NOT EXISTS idx_street_trees_lat_lng
          ON street_trees(latitude, longitude);

        CREATE TABLE IF NOT EXISTS import_runs (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          city TEXT NOT NULL,
          source_name TEXT NOT NULL,
          source_file TEXT NOT NULL,
          refresh_mode INTEGER NOT NULL DEFAULT 0,
          row_count INTEGER,
          status TEXT NOT NULL,
          error_message TEXT,
          started_at_ms INTEGER NOT NULL,
          finished_at_ms INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_import_runs_city_finished_at
          ON import_runs(city, finished_at_ms DESC);

        CREATE TABLE IF NOT EXISTS species_links (
          common_name TEXT PRIMARY KEY,
          wikipedia_url TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS species_names (
          original_common_name TEXT PRIMARY KEY,
          readable_name TEXT NOT NULL
        );
        "#,
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO meta(key, value) VALUES (?1, ?2)",
        params!["schema_version", SCHEMA_VERSION],
    )?;
    Ok(())
}

pub(crate) fn now_ms() -> i64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    now.as_millis().min(i64::MAX as u128) as i64
}

pub(crate) fn source_row_count_tx(tx: &Transaction<'_>, source: &str) -> Result<i64, StoreError> {
    Ok(tx.query_row(
        "SELECT COUNT(*) FROM street_trees WHERE source = ?1",
        params![source],
        |row| row.get(0),
    )?)
}

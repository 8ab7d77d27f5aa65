//! [`SqliteWarehouse`] — the SQLite implementation of [`QueryExecutor`].

use std::path::Path;

use sift_core::query::{QueryExecutor, QueryFrame};

use crate::{Error, Result, decode::decode_cell};

/// A warehouse backed by a single SQLite database.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteWarehouse {
  conn: tokio_rusqlite::Connection,
}

impl SqliteWarehouse {
  /// Open (or create) a database at `path`.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Ok(Self { conn })
  }

  /// Open an in-memory database — useful for testing and demos.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Ok(Self { conn })
  }

  /// Run a batch of `;`-separated statements.
  pub async fn run_script(&self, script: impl Into<String>) -> Result<()> {
    let script = script.into();
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&script)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Read a script from disk and run it.
  pub async fn run_script_file(&self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let script = tokio::fs::read_to_string(path)
      .await
      .map_err(|source| Error::Script {
        path: path.display().to_string(),
        source,
      })?;
    tracing::info!(path = %path.display(), "running warehouse init script");
    self.run_script(script).await
  }

  /// Number of user tables; zero means the database is empty.
  pub async fn table_count(&self) -> Result<usize> {
    let count: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
           AND name NOT LIKE 'sqlite_%'",
          [],
          |row| row.get(0),
        )?)
      })
      .await?;
    Ok(usize::try_from(count).unwrap_or_default())
  }
}

// ─── QueryExecutor impl ──────────────────────────────────────────────────────

impl QueryExecutor for SqliteWarehouse {
  type Error = Error;

  async fn execute(&self, sql: &str) -> Result<QueryFrame> {
    let sql = sql.to_owned();
    let frame = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let columns: Vec<String> = stmt
          .column_names()
          .into_iter()
          .map(str::to_owned)
          .collect();
        let width = columns.len();
        let rows = stmt
          .query_map([], |row| {
            (0..width)
              .map(|i| row.get_ref(i).map(decode_cell))
              .collect::<rusqlite::Result<Vec<_>>>()
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(QueryFrame { columns, rows })
      })
      .await?;
    tracing::debug!(rows = frame.rows.len(), "statement executed");
    Ok(frame)
  }
}

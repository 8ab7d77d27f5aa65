//! Warehouse query execution.
//!
//! [`QueryExecutor`] is implemented by warehouse backends (e.g.
//! `sift-warehouse-sqlite`). [`SqlMemo`] sits in front of it so that a given
//! statement runs at most once per session, however often it is rendered.

use std::{collections::HashMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize};

// ─── Result frames ───────────────────────────────────────────────────────────

/// A single value in a result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Cell {
  Null,
  Integer(i64),
  Real(f64),
  Text(String),
  /// Binary data; only the length is kept.
  Blob(usize),
}

impl Cell {
  /// Plotting value: numbers as-is, numeric-looking text parsed. NaN and
  /// infinities are not plottable and yield `None`.
  pub fn as_f64(&self) -> Option<f64> {
    let v = match self {
      Self::Integer(i) => Some(*i as f64),
      Self::Real(r) => Some(*r),
      Self::Text(t) => t.trim().parse().ok(),
      Self::Null | Self::Blob(_) => None,
    };
    v.filter(|v: &f64| v.is_finite())
  }
}

impl fmt::Display for Cell {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Null => f.write_str("NULL"),
      Self::Integer(i) => write!(f, "{i}"),
      Self::Real(r) => write!(f, "{r}"),
      Self::Text(t) => f.write_str(t),
      Self::Blob(n) => write!(f, "<{n} bytes>"),
    }
  }
}

/// A tabular query result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFrame {
  pub columns: Vec<String>,
  pub rows:    Vec<Vec<Cell>>,
}

impl QueryFrame {
  pub fn is_empty(&self) -> bool { self.rows.is_empty() }

  pub fn column_index(&self, name: &str) -> Option<usize> {
    self.columns.iter().position(|c| c == name)
  }
}

// ─── Executor trait ──────────────────────────────────────────────────────────

/// A handle that runs SQL against a data warehouse.
pub trait QueryExecutor {
  type Error: std::error::Error;

  async fn execute(&self, sql: &str) -> Result<QueryFrame, Self::Error>;
}

// ─── Memo table ──────────────────────────────────────────────────────────────

/// The memoised result of one statement. Errors are kept as display strings.
pub type QueryOutcome = Result<Arc<QueryFrame>, String>;

/// Results keyed by exact statement text.
///
/// Entries are never evicted; the number of distinct statements is bounded by
/// the transcript.
#[derive(Debug, Default)]
pub struct SqlMemo {
  entries: HashMap<String, QueryOutcome>,
}

impl SqlMemo {
  pub fn new() -> Self { Self::default() }

  /// Return the memoised outcome for `sql`, executing it on first use.
  pub async fn get_or_execute<E: QueryExecutor>(
    &mut self,
    sql: &str,
    executor: &E,
  ) -> QueryOutcome {
    if let Some(hit) = self.entries.get(sql) {
      return hit.clone();
    }
    tracing::debug!(sql, "executing statement");
    let outcome = match executor.execute(sql).await {
      Ok(frame) => Ok(Arc::new(frame)),
      Err(e) => {
        tracing::warn!(sql, error = %e, "statement failed");
        Err(e.to_string())
      }
    };
    self.entries.insert(sql.to_owned(), outcome.clone());
    outcome
  }

  pub fn get(&self, sql: &str) -> Option<&QueryOutcome> { self.entries.get(sql) }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

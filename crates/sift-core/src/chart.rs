//! Chart selection for a query result.
//!
//! A chart plots one column (Y) against another (X). Y is never allowed to be
//! the same column as X.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::query::QueryFrame;

/// Minimum number of result columns needed to draw a chart.
pub const MIN_CHART_COLUMNS: usize = 2;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
  #[default]
  #[strum(to_string = "Line Chart")]
  Line,
  #[strum(to_string = "Bar Chart")]
  Bar,
}

impl ChartKind {
  /// The kind after this one, wrapping around.
  pub fn next(self) -> Self {
    let all: Vec<_> = Self::iter().collect();
    let pos = all.iter().position(|k| *k == self).unwrap_or(0);
    all[(pos + 1) % all.len()]
  }
}

/// Columns offered for the Y axis: every column except `x`.
pub fn y_options<'a>(columns: &'a [String], x: &str) -> Vec<&'a str> {
  columns
    .iter()
    .map(String::as_str)
    .filter(|c| *c != x)
    .collect()
}

/// Identifies one chart: the transcript index of its turn and the position of
/// its SQL block within that turn's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChartKey {
  pub turn:  usize,
  pub block: usize,
}

impl ChartKey {
  pub fn new(turn: usize, block: usize) -> Self { Self { turn, block } }
}

/// The chart choice for one SQL result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSelection {
  pub x:    String,
  pub y:    String,
  pub kind: ChartKind,
}

impl ChartSelection {
  /// First column on X, first remaining column on Y. `None` for fewer than
  /// [`MIN_CHART_COLUMNS`] columns.
  pub fn default_for(columns: &[String]) -> Option<Self> {
    let x = columns.first()?;
    let y = y_options(columns, x).first()?.to_string();
    Some(Self {
      x: x.clone(),
      y,
      kind: ChartKind::default(),
    })
  }

  /// Bring a stored selection in line with `columns`.
  ///
  /// Unknown columns fall back to the defaults and Y is moved off X.
  pub fn fit(&self, columns: &[String]) -> Option<Self> {
    let mut fitted = Self::default_for(columns)?;
    fitted.kind = self.kind;
    if columns.contains(&self.x) {
      fitted.x = self.x.clone();
    }
    let ys = y_options(columns, &fitted.x);
    fitted.y = if ys.contains(&self.y.as_str()) {
      self.y.clone()
    } else {
      ys.first()?.to_string()
    };
    Some(fitted)
  }

  /// Choose a new X column; Y moves to the first remaining column if it
  /// would otherwise equal X.
  pub fn with_x(&self, columns: &[String], x: &str) -> Option<Self> {
    Self {
      x: x.to_owned(),
      ..self.clone()
    }
    .fit(columns)
  }

  /// Choose a new Y column. Ignored if it equals X or is not a column.
  pub fn with_y(&self, columns: &[String], y: &str) -> Option<Self> {
    if y == self.x || !columns.iter().any(|c| c == y) {
      return self.fit(columns);
    }
    Self {
      y: y.to_owned(),
      ..self.clone()
    }
    .fit(columns)
  }

  /// Extract `(x label, y value)` points from `frame`. Rows whose Y is not
  /// numeric are skipped.
  pub fn series(&self, frame: &QueryFrame) -> Vec<(String, f64)> {
    let (Some(xi), Some(yi)) = (frame.column_index(&self.x), frame.column_index(&self.y))
    else {
      return Vec::new();
    };
    frame
      .rows
      .iter()
      .filter_map(|row| {
        let y = row.get(yi)?.as_f64()?;
        let x = row.get(xi).map(ToString::to_string).unwrap_or_default();
        Some((x, y))
      })
      .collect()
  }
}

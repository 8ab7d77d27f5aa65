//! Conversion from SQLite values to result cells.

use rusqlite::types::ValueRef;
use sift_core::query::Cell;

pub fn decode_cell(value: ValueRef<'_>) -> Cell {
  match value {
    ValueRef::Null => Cell::Null,
    ValueRef::Integer(i) => Cell::Integer(i),
    ValueRef::Real(r) => Cell::Real(r),
    ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
    ValueRef::Blob(b) => Cell::Blob(b.len()),
  }
}

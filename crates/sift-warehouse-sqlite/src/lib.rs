//! SQLite warehouse for Sift.
//!
//! Wraps [`tokio_rusqlite`] so statements run on a dedicated thread without
//! blocking the async runtime. Implements [`sift_core::query::QueryExecutor`].

mod decode;
mod demo;
mod warehouse;

pub mod error;

pub use demo::DEMO_SCRIPT;
pub use error::{Error, Result};
pub use warehouse::SqliteWarehouse;

//! Core types and protocol for Sift, a conversational front-end to a remote
//! analyst API.
//!
//! This crate holds the transcript model, the session aggregate, the turn
//! orchestrator, the content renderer and the feedback submitter. It is free
//! of HTTP and database dependencies: the remote service and the warehouse are
//! reached through the [`api::AnalystApi`] and [`query::QueryExecutor`]
//! traits.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod api;
pub mod chart;
pub mod envelope;
pub mod error;
pub mod feedback;
pub mod message;
pub mod orchestrator;
pub mod query;
pub mod render;
pub mod session;
pub mod transcript;

pub use error::{Error, Result};

#[cfg(test)]
mod tests;

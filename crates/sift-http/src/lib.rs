//! HTTP transport for the Cortex analyst API.
//!
//! [`CortexClient`] implements [`sift_core::api::AnalystApi`] with
//! [`reqwest`]. Non-success responses are never raised as errors; they come
//! back as readable messages inside the reply.

mod client;

pub mod error;

pub use client::{ClientConfig, CortexClient};
pub use error::{Error, Result};

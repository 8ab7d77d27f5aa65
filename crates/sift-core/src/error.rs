//! Error types for `sift-core`.
//!
//! Remote-call failures are not errors here: they are folded into the
//! transcript as text. These variants cover misuse of the session protocol.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("a turn is already in flight ({0})")]
  CycleInFlight(crate::session::CycleState),

  #[error("no user turn is waiting to be sent")]
  NoPendingTurn,

  #[error("input is empty")]
  EmptyInput,

  #[error("feedback for request {0} was already submitted")]
  FeedbackClosed(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

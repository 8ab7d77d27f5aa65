//! One-shot feedback per request id.
//!
//! The first submission for an id closes it, whatever the outcome; later
//! attempts are refused without touching the network.

use crate::{
  Error, Result,
  api::AnalystApi,
  session::{FeedbackRecord, Session},
};

/// Where a request id stands with respect to feedback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackStatus {
  /// No submission yet; the form is editable.
  Open,
  Accepted,
  Rejected(String),
}

impl FeedbackStatus {
  pub fn is_open(&self) -> bool { matches!(self, Self::Open) }
}

pub fn status(session: &Session, request_id: &str) -> FeedbackStatus {
  match session.feedback.get(request_id) {
    None => FeedbackStatus::Open,
    Some(FeedbackRecord { error: None }) => FeedbackStatus::Accepted,
    Some(FeedbackRecord { error: Some(e) }) => FeedbackStatus::Rejected(e.clone()),
  }
}

/// Submit feedback for `request_id` and record the outcome.
pub async fn submit<A: AnalystApi>(
  session: &mut Session,
  api: &A,
  request_id: &str,
  positive: bool,
  message: &str,
) -> Result<FeedbackRecord> {
  if session.feedback.contains_key(request_id) {
    return Err(Error::FeedbackClosed(request_id.to_owned()));
  }

  let error = api.submit_feedback(request_id, positive, message).await;
  match &error {
    None => tracing::info!(request_id, positive, "feedback accepted"),
    Some(e) => tracing::warn!(request_id, error = %e, "feedback rejected"),
  }

  let record = FeedbackRecord { error };
  session
    .feedback
    .insert(request_id.to_owned(), record.clone());
  Ok(record)
}

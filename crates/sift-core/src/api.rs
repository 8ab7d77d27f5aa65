//! The [`AnalystApi`] trait and the constants of its wire contract.
//!
//! The trait is implemented by transport crates (e.g. `sift-http`). The
//! orchestrator and feedback submitter depend on this abstraction only.
//!
//! No operation returns `Err`: a failed call is an ordinary [`Reply`] whose
//! `error` carries a readable message, leaving representation to the caller.

use std::time::Duration;

use crate::{envelope::Envelope, transcript::Transcript};

/// Upper bound on every remote call.
pub const API_TIMEOUT: Duration = Duration::from_millis(50_000);

/// Graph-plan generation.
pub const GRAPH_PLAN_PATH: &str = "/api/v2/cortex/inference:complete";
/// Analyst message.
pub const ANALYST_MESSAGE_PATH: &str = "/api/v2/cortex/analyst/message";
/// Feedback submission.
pub const FEEDBACK_PATH: &str = "/api/v2/cortex/analyst/feedback";

/// Model identifier sent with graph-plan requests unless configured otherwise.
pub const DEFAULT_MODEL: &str = "mistral-large2";

pub const GRAPH_PLAN_ERROR_HEADLINE: &str = "A model creation error has occurred";
pub const ANALYST_ERROR_HEADLINE: &str = "An Analyst API error has occurred";

/// Error text for a success response that cannot be correlated for feedback.
pub const MISSING_REQUEST_ID: &str = "Malformed response: success without a request_id";

/// Outcome of one planning call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
  /// HTTP status, or `None` if no response was received.
  pub status:   Option<u16>,
  pub envelope: Envelope,
  /// Set iff the call failed.
  pub error:    Option<String>,
}

impl Reply {
  pub fn ok(status: u16, envelope: Envelope) -> Self {
    Self {
      status: Some(status),
      envelope,
      error: None,
    }
  }

  pub fn failed(status: Option<u16>, envelope: Envelope, error: String) -> Self {
    Self {
      status,
      envelope,
      error: Some(error),
    }
  }

  pub fn is_ok(&self) -> bool { self.error.is_none() }

  /// `true` if the envelope carries a non-empty request id.
  pub fn has_request_id(&self) -> bool {
    self
      .envelope
      .request_id
      .as_deref()
      .is_some_and(|id| !id.trim().is_empty())
  }
}

/// Remote analyst service.
pub trait AnalystApi {
  /// Send the transcript to the graph-plan endpoint.
  async fn create_graph_plan(&self, transcript: &Transcript) -> Reply;

  /// Send the transcript to the analyst endpoint against a semantic model.
  ///
  /// `semantic_model_path` is the bare stage path; the implementation adds
  /// the leading `@`.
  async fn analyst_message(
    &self,
    transcript: &Transcript,
    semantic_model_path: &str,
  ) -> Reply;

  /// Submit feedback for a prior response. Returns the error message, or
  /// `None` if the service accepted it.
  async fn submit_feedback(
    &self,
    request_id: &str,
    positive: bool,
    message: &str,
  ) -> Option<String>;
}

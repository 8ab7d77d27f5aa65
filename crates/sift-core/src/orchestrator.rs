//! The turn orchestrator — drives one user turn through its remote call.
//!
//! ```text
//! Idle ──begin──▶ AwaitingFirstCall ──call──▶ MergingFirstResult ──▶ Idle
//! ```
//!
//! [`begin`] appends the user turn so the caller can show it before waiting.
//! [`TurnOrchestrator::dispatch`] makes exactly one remote call and merges the
//! reply (or its error) into the transcript as a new analyst turn.

use serde::Deserialize;

use crate::{
  Error, Result,
  api::{AnalystApi, MISSING_REQUEST_ID, Reply},
  envelope::Envelope,
  message::{ContentBlock, Turn},
  session::{CycleState, Session},
};

/// Asked on behalf of the user whenever a conversation starts.
pub const DEFAULT_OPENING_QUESTION: &str = "What questions can I ask?";

/// Which endpoint answers a user turn.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Planner {
  /// `create_graph_plan` with the configured model.
  #[default]
  GraphPlan,
  /// `analyst_message` against the selected semantic model.
  AnalystMessage,
}

// ─── Cycle steps ─────────────────────────────────────────────────────────────

/// Pick the input for the next cycle: typed text wins, otherwise the pending
/// suggestion is consumed.
pub fn next_input(session: &mut Session, typed: Option<String>) -> Option<String> {
  match typed {
    Some(t) if !t.trim().is_empty() => Some(t),
    _ => session.take_active_suggestion(),
  }
}

/// Append a system turn if the transcript is empty. Returns `true` if the
/// conversation was seeded and the opening question should be asked.
pub fn seed(session: &mut Session, system_prompt: &str) -> bool {
  if !session.transcript.is_empty() {
    return false;
  }
  session.transcript.append(Turn::system(system_prompt));
  true
}

/// Start a cycle: clear warnings and append the user turn.
///
/// Returns the index of the new user turn.
pub fn begin(session: &mut Session, input: &str) -> Result<usize> {
  if session.state != CycleState::Idle {
    return Err(Error::CycleInFlight(session.state));
  }
  if input.trim().is_empty() {
    return Err(Error::EmptyInput);
  }
  session.warnings.clear();
  let index = session.transcript.append(Turn::user(input));
  session.state = CycleState::AwaitingFirstCall;
  tracing::info!(session_id = %session.id(), index, "user turn appended");
  Ok(index)
}

/// Fold one remote reply into the session as an analyst turn.
///
/// Warnings accumulate across calls within a cycle. Returns the index of the
/// new analyst turn.
pub fn merge_reply(session: &mut Session, reply: Reply) -> usize {
  let missing_id = reply.is_ok() && !reply.has_request_id();
  let Reply {
    envelope, error, ..
  } = reply;
  let Envelope {
    request_id,
    warnings,
    ..
  } = &envelope;
  let error = match error {
    None if missing_id => Some(MISSING_REQUEST_ID.to_owned()),
    other => other,
  };

  let content = match &error {
    None => envelope.content().to_vec(),
    Some(message) => vec![ContentBlock::text(message.clone())],
  };

  session.warnings.extend(warnings.iter().cloned());
  let index = session
    .transcript
    .append(Turn::analyst(content, request_id.clone()));

  if error.is_some() {
    tracing::warn!(
      session_id = %session.id(),
      request_id = ?request_id,
      "remote call failed"
    );
    session.raise_error_notification();
  }
  index
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

/// Drives cycles against an [`AnalystApi`].
pub struct TurnOrchestrator<'a, A> {
  api:     &'a A,
  planner: Planner,
}

impl<'a, A: AnalystApi> TurnOrchestrator<'a, A> {
  pub fn new(api: &'a A, planner: Planner) -> Self { Self { api, planner } }

  pub fn planner(&self) -> Planner { self.planner }

  /// Send the pending user turn and merge the reply.
  ///
  /// Returns the index of the analyst turn.
  pub async fn dispatch(&self, session: &mut Session) -> Result<usize> {
    if session.state != CycleState::AwaitingFirstCall {
      return Err(Error::NoPendingTurn);
    }

    let reply = self.call(session).await;

    session.state = CycleState::MergingFirstResult;
    let index = merge_reply(session, reply);
    session.state = CycleState::Idle;

    tracing::info!(
      session_id = %session.id(),
      index,
      warnings = session.warnings.len(),
      "analyst turn merged"
    );
    Ok(index)
  }

  async fn call(&self, session: &Session) -> Reply {
    tracing::debug!(
      session_id = %session.id(),
      planner = %self.planner,
      turns = session.transcript.len(),
      "calling analyst api"
    );
    match self.planner {
      Planner::GraphPlan => self.api.create_graph_plan(&session.transcript).await,
      Planner::AnalystMessage => match session.models.selected() {
        Some(model) => self.api.analyst_message(&session.transcript, model).await,
        None => Reply::failed(
          None,
          Envelope::default(),
          "No semantic model is configured; add one to `semantic_models`.".into(),
        ),
      },
    }
  }

  /// Run a whole cycle for `input`.
  pub async fn run_turn(&self, session: &mut Session, input: &str) -> Result<usize> {
    begin(session, input)?;
    self.dispatch(session).await
  }

  /// Seed an empty transcript and ask the opening question.
  ///
  /// Returns `None` if the transcript already had turns.
  pub async fn bootstrap(
    &self,
    session: &mut Session,
    system_prompt: &str,
    opening_question: &str,
  ) -> Result<Option<usize>> {
    if !seed(session, system_prompt) {
      return Ok(None);
    }
    self.run_turn(session, opening_question).await.map(Some)
  }
}

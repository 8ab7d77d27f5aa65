//! The [`Session`] aggregate — all per-conversation state in one place.
//!
//! Every component operation takes `&mut Session`; nothing is global.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  chart::{ChartKey, ChartKind, ChartSelection},
  envelope::Warning,
  query::SqlMemo,
  transcript::Transcript,
};

// ─── Cycle state ─────────────────────────────────────────────────────────────

/// Where the current user turn is in its round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
pub enum CycleState {
  #[default]
  Idle,
  AwaitingFirstCall,
  MergingFirstResult,
}

// ─── Feedback ────────────────────────────────────────────────────────────────

/// Outcome of a feedback submission. `error = None` means accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
  pub error: Option<String>,
}

// ─── Semantic models ─────────────────────────────────────────────────────────

/// The configured semantic models and which one is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticModels {
  paths:    Vec<String>,
  selected: usize,
}

impl SemanticModels {
  pub fn new(paths: Vec<String>) -> Self { Self { paths, selected: 0 } }

  pub fn paths(&self) -> &[String] { &self.paths }

  pub fn selected_index(&self) -> usize { self.selected }

  /// Stage path of the selected model, e.g. `DB.SCHEMA.STAGE/model.yaml`.
  pub fn selected(&self) -> Option<&str> {
    self.paths.get(self.selected).map(String::as_str)
  }

  /// Short name for display: the last path segment.
  pub fn display_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
  }
}

// ─── Session ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Session {
  id:                 Uuid,
  pub transcript:     Transcript,
  pub warnings:       Vec<Warning>,
  pub feedback:       HashMap<String, FeedbackRecord>,
  pub models:         SemanticModels,
  pub(crate) state:   CycleState,
  pub(crate) sql:     SqlMemo,
  active_suggestion:  Option<String>,
  error_notification: bool,
  charts:             HashMap<ChartKey, ChartSelection>,
}

impl Session {
  pub fn new(models: SemanticModels) -> Self {
    Self {
      id: Uuid::new_v4(),
      transcript: Transcript::new(),
      warnings: Vec::new(),
      feedback: HashMap::new(),
      models,
      state: CycleState::Idle,
      sql: SqlMemo::new(),
      active_suggestion: None,
      error_notification: false,
      charts: HashMap::new(),
    }
  }

  /// Identifier used to correlate log lines; changes on every reset.
  pub fn id(&self) -> Uuid { self.id }

  pub fn state(&self) -> CycleState { self.state }

  pub fn sql_memo(&self) -> &SqlMemo { &self.sql }

  /// Clear the conversation and everything keyed by it.
  ///
  /// The SQL memo is kept: clearing the chat does not change the warehouse.
  pub fn reset(&mut self) {
    self.id = Uuid::new_v4();
    self.transcript.clear();
    self.warnings.clear();
    self.feedback.clear();
    self.active_suggestion = None;
    self.error_notification = false;
    self.charts.clear();
    self.state = CycleState::Idle;
    tracing::info!(session_id = %self.id, "session reset");
  }

  /// Switch semantic model. Resets the session if the selection changed.
  pub fn select_model(&mut self, index: usize) -> bool {
    if index >= self.models.paths.len() || index == self.models.selected {
      return false;
    }
    self.models.selected = index;
    tracing::info!(model = ?self.models.selected(), "semantic model selected");
    self.reset();
    true
  }

  // ── Active suggestion ─────────────────────────────────────────────────

  pub fn set_active_suggestion(&mut self, suggestion: impl Into<String>) {
    self.active_suggestion = Some(suggestion.into());
  }

  pub fn active_suggestion(&self) -> Option<&str> {
    self.active_suggestion.as_deref()
  }

  pub fn take_active_suggestion(&mut self) -> Option<String> {
    self.active_suggestion.take()
  }

  // ── Error notification ────────────────────────────────────────────────

  pub(crate) fn raise_error_notification(&mut self) {
    self.error_notification = true;
  }

  /// `true` exactly once after a failed remote call.
  pub fn take_error_notification(&mut self) -> bool {
    std::mem::take(&mut self.error_notification)
  }

  pub fn error_notification_pending(&self) -> bool { self.error_notification }

  // ── Chart selections ──────────────────────────────────────────────────

  /// The stored chart selection for `key`.
  pub fn chart(&self, key: ChartKey) -> Option<&ChartSelection> {
    self.charts.get(&key)
  }

  /// Resolve the selection for `key` against `columns`, storing defaults on
  /// first use.
  pub fn chart_for(&mut self, key: ChartKey, columns: &[String]) -> Option<ChartSelection> {
    let fitted = match self.charts.get(&key) {
      Some(existing) => existing.fit(columns)?,
      None => ChartSelection::default_for(columns)?,
    };
    self.charts.insert(key, fitted.clone());
    Some(fitted)
  }

  pub fn set_chart_x(&mut self, key: ChartKey, columns: &[String], x: &str) {
    if let Some(sel) = self.chart_for(key, columns).and_then(|s| s.with_x(columns, x)) {
      self.charts.insert(key, sel);
    }
  }

  pub fn set_chart_y(&mut self, key: ChartKey, columns: &[String], y: &str) {
    if let Some(sel) = self.chart_for(key, columns).and_then(|s| s.with_y(columns, y)) {
      self.charts.insert(key, sel);
    }
  }

  pub fn set_chart_kind(&mut self, key: ChartKey, columns: &[String], kind: ChartKind) {
    if let Some(mut sel) = self.chart_for(key, columns) {
      sel.kind = kind;
      self.charts.insert(key, sel);
    }
  }
}

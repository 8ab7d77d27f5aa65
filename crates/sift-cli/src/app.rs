//! Application state machine and event dispatcher.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use sift_core::{
  chart::{ChartKey, ChartSelection},
  feedback,
  orchestrator::{self, Planner, TurnOrchestrator},
  render::{self, BlockView, ChartView, ResultsView, TurnView},
  session::{SemanticModels, Session},
};
use sift_http::CortexClient;
use sift_warehouse_sqlite::SqliteWarehouse;

/// Toast text raised after a failed remote call.
pub const API_ERROR_TOAST: &str = "An API error has occurred!";

// ─── Focus ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
  /// Typing a question.
  Input,
  /// Cycling through actionable elements of the conversation.
  Actions,
  /// Picking a semantic model in the sidebar.
  Models,
}

// ─── Actions ──────────────────────────────────────────────────────────────────

/// One actionable element of the conversation, keyed by transcript index.
/// Chart controls also carry the block they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  Suggestion { turn: usize, text: String },
  ChartX { chart: ChartKey },
  ChartY { chart: ChartKey },
  ChartKind { chart: ChartKey },
  Feedback { turn: usize, request_id: String },
}

impl Action {
  pub fn turn(&self) -> usize {
    match self {
      Self::Suggestion { turn, .. } | Self::Feedback { turn, .. } => *turn,
      Self::ChartX { chart } | Self::ChartY { chart } | Self::ChartKind { chart } => chart.turn,
    }
  }

  /// The chart this action controls, if any.
  pub fn chart(&self) -> Option<ChartKey> {
    match self {
      Self::ChartX { chart } | Self::ChartY { chart } | Self::ChartKind { chart } => Some(*chart),
      _ => None,
    }
  }
}

/// Actions offered by one rendered block, in display order.
pub fn block_actions(turn: usize, block: &BlockView) -> Vec<Action> {
  match block {
    BlockView::Text(_) => Vec::new(),
    BlockView::Suggestions(items) => items
      .iter()
      .map(|text| Action::Suggestion {
        turn,
        text: text.clone(),
      })
      .collect(),
    BlockView::Sql(sql) => {
      let mut out = Vec::new();
      if let ResultsView::Table {
        chart: ChartView::Ready { key, .. },
        ..
      } = &sql.results
      {
        let chart = *key;
        out.extend([
          Action::ChartX { chart },
          Action::ChartY { chart },
          Action::ChartKind { chart },
        ]);
      }
      match &sql.feedback {
        Some(fb) if fb.status.is_open() => out.push(Action::Feedback {
          turn,
          request_id: fb.request_id.clone(),
        }),
        _ => {}
      }
      out
    }
  }
}

fn collect_actions(views: &[TurnView]) -> Vec<Action> {
  views
    .iter()
    .flat_map(|v| v.blocks.iter().flat_map(|b| block_actions(v.index, b)))
    .collect()
}

// ─── Feedback form ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FeedbackForm {
  pub request_id: String,
  pub positive:   bool,
  pub message:    String,
}

// ─── App ──────────────────────────────────────────────────────────────────────

/// Prompts used to start every conversation.
#[derive(Debug, Clone)]
pub struct Prompts {
  pub system_prompt:    String,
  pub opening_question: String,
}

/// Top-level application state.
pub struct App {
  pub session:       Session,
  /// Rendered transcript; rebuilt after every change.
  pub views:         Vec<TurnView>,
  pub actions:       Vec<Action>,
  pub action_cursor: usize,
  pub focus:         Focus,
  pub input:         String,
  /// Text submitted with Enter, waiting for the next cycle.
  submitted:         Option<String>,
  pub feedback_form: Option<FeedbackForm>,
  /// `true` while a remote call is outstanding.
  pub busy:          bool,
  pub toast:         Option<String>,
  pub status_msg:    String,
  /// Lines scrolled back from the bottom of the conversation.
  pub scroll:        u16,
  pub model_cursor:  usize,
  api:               CortexClient,
  warehouse:         SqliteWarehouse,
  pub planner:       Planner,
  prompts:           Prompts,
}

impl App {
  pub fn new(
    session: Session,
    api: CortexClient,
    warehouse: SqliteWarehouse,
    planner: Planner,
    prompts: Prompts,
  ) -> Self {
    let model_cursor = session.models.selected_index();
    Self {
      session,
      views: Vec::new(),
      actions: Vec::new(),
      action_cursor: 0,
      focus: Focus::Input,
      input: String::new(),
      submitted: None,
      feedback_form: None,
      busy: false,
      toast: None,
      status_msg: String::new(),
      scroll: 0,
      model_cursor,
      api,
      warehouse,
      planner,
      prompts,
    }
  }

  /// The action under the cursor while actions are focused.
  pub fn focused_action(&self) -> Option<&Action> {
    match self.focus {
      Focus::Actions => self.actions.get(self.action_cursor),
      _ => None,
    }
  }

  // ── Turn cycle ────────────────────────────────────────────────────────────

  /// Start a cycle if there is something to ask: the opening question for an
  /// empty conversation, otherwise typed text or a chosen suggestion.
  ///
  /// Returns `true` when a remote call should follow via
  /// [`finish_turn`](Self::finish_turn).
  pub async fn start_pending_turn(&mut self) -> bool {
    let input = if orchestrator::seed(&mut self.session, &self.prompts.system_prompt) {
      Some(self.prompts.opening_question.clone())
    } else {
      orchestrator::next_input(&mut self.session, self.submitted.take())
    };
    let Some(input) = input else {
      return false;
    };

    if let Err(e) = orchestrator::begin(&mut self.session, &input) {
      self.status_msg = format!("Error: {e}");
      return false;
    }
    self.busy = true;
    self.scroll = 0;
    self.status_msg = "Waiting for the analyst…".into();
    self.refresh().await;
    true
  }

  /// Make the remote call for the pending user turn and re-render.
  pub async fn finish_turn(&mut self) {
    let orchestrator = TurnOrchestrator::new(&self.api, self.planner);
    match orchestrator.dispatch(&mut self.session).await {
      Ok(_) => self.status_msg.clear(),
      Err(e) => self.status_msg = format!("Error: {e}"),
    }
    self.busy = false;
    self.refresh().await;
  }

  /// Rebuild the view model, executing any new SQL.
  pub async fn refresh(&mut self) {
    self.views = render::render(&mut self.session, &self.warehouse).await;
    self.actions = collect_actions(&self.views);
    if self.action_cursor >= self.actions.len() {
      self.action_cursor = self.actions.len().saturating_sub(1);
    }
    if self.actions.is_empty() && self.focus == Focus::Actions {
      self.focus = Focus::Input;
    }
    if self.session.take_error_notification() {
      self.toast = Some(API_ERROR_TOAST.into());
    }
  }

  fn reset(&mut self) {
    self.session.reset();
    self.clear_views();
    self.status_msg = "Chat history cleared".into();
  }

  fn clear_views(&mut self) {
    self.views.clear();
    self.actions.clear();
    self.action_cursor = 0;
    self.feedback_form = None;
    self.submitted = None;
    self.scroll = 0;
    self.focus = Focus::Input;
  }

  // ── Key handling ──────────────────────────────────────────────────────────

  /// Process a key event. Returns `true` to continue, `false` to quit.
  pub async fn handle_key(&mut self, key: KeyEvent) -> bool {
    self.toast = None;

    if key.modifiers.contains(KeyModifiers::CONTROL) {
      match key.code {
        KeyCode::Char('c') => return false,
        KeyCode::Char('r') => {
          self.reset();
          return true;
        }
        _ => {}
      }
    }

    if self.feedback_form.is_some() {
      self.handle_feedback_key(key).await;
      return true;
    }

    if key.code == KeyCode::F(2) {
      self.focus = Focus::Models;
      self.model_cursor = self.session.models.selected_index();
      return true;
    }

    match self.focus {
      Focus::Input => self.handle_input_key(key),
      Focus::Actions => self.handle_action_key(key),
      Focus::Models => self.handle_model_key(key),
    }
    true
  }

  fn handle_input_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Enter => {
        if !self.input.trim().is_empty() {
          self.submitted = Some(std::mem::take(&mut self.input));
        }
      }
      KeyCode::Backspace => {
        self.input.pop();
      }
      KeyCode::Tab if !self.actions.is_empty() => {
        self.focus = Focus::Actions;
        self.action_cursor = self.actions.len() - 1;
      }
      KeyCode::Up | KeyCode::PageUp => self.scroll = self.scroll.saturating_add(3),
      KeyCode::Down | KeyCode::PageDown => self.scroll = self.scroll.saturating_sub(3),
      KeyCode::Char(c) => self.input.push(c),
      _ => {}
    }
  }

  fn handle_action_key(&mut self, key: KeyEvent) {
    let len = self.actions.len();
    if len == 0 {
      self.focus = Focus::Input;
      return;
    }
    match key.code {
      KeyCode::Esc => self.focus = Focus::Input,
      KeyCode::Tab | KeyCode::Down | KeyCode::Char('j') => {
        self.action_cursor = (self.action_cursor + 1) % len;
      }
      KeyCode::BackTab | KeyCode::Up | KeyCode::Char('k') => {
        self.action_cursor = (self.action_cursor + len - 1) % len;
      }
      KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => self.activate(true),
      KeyCode::Left | KeyCode::Char('h') => self.activate(false),
      _ => {}
    }
  }

  fn handle_model_key(&mut self, key: KeyEvent) {
    let len = self.session.models.paths().len();
    match key.code {
      KeyCode::Esc => self.focus = Focus::Input,
      KeyCode::Down | KeyCode::Char('j') if len > 0 => {
        self.model_cursor = (self.model_cursor + 1) % len;
      }
      KeyCode::Up | KeyCode::Char('k') if len > 0 => {
        self.model_cursor = (self.model_cursor + len - 1) % len;
      }
      KeyCode::Enter => {
        if self.session.select_model(self.model_cursor) {
          self.clear_views();
          if let Some(path) = self.session.models.selected() {
            self.status_msg = format!("Switched to {}", SemanticModels::display_name(path));
          }
        }
        self.focus = Focus::Input;
      }
      _ => {}
    }
  }

  async fn handle_feedback_key(&mut self, key: KeyEvent) {
    let Some(form) = self.feedback_form.as_mut() else {
      return;
    };
    match key.code {
      KeyCode::Esc => self.feedback_form = None,
      KeyCode::Tab | KeyCode::BackTab | KeyCode::Left | KeyCode::Right => {
        form.positive = !form.positive;
      }
      KeyCode::Backspace => {
        form.message.pop();
      }
      KeyCode::Char(c) => form.message.push(c),
      KeyCode::Enter => {
        let FeedbackForm {
          request_id,
          positive,
          message,
        } = form.clone();
        self.feedback_form = None;
        let outcome =
          feedback::submit(&mut self.session, &self.api, &request_id, positive, &message).await;
        self.status_msg = match outcome {
          Ok(record) => match record.error {
            None => "Feedback submitted".into(),
            Some(_) => "Feedback was not accepted".into(),
          },
          Err(e) => format!("Error: {e}"),
        };
      }
      _ => {}
    }
  }

  /// Act on the focused action. `forward` picks the direction for choices
  /// that cycle through options.
  fn activate(&mut self, forward: bool) {
    let Some(action) = self.actions.get(self.action_cursor).cloned() else {
      return;
    };
    match action {
      Action::Suggestion { text, .. } => {
        self.session.set_active_suggestion(text);
        self.focus = Focus::Input;
      }
      Action::Feedback { request_id, .. } => {
        if feedback::status(&self.session, &request_id).is_open() {
          self.feedback_form = Some(FeedbackForm {
            request_id,
            positive: true,
            message: String::new(),
          });
        }
      }
      Action::ChartX { chart: key } => {
        if let Some(chart) = self.chart_state(key) {
          let next = cycle(&chart.x_options, &chart.selection.x, forward);
          self.session.set_chart_x(key, &chart.columns, &next);
        }
      }
      Action::ChartY { chart: key } => {
        if let Some(chart) = self.chart_state(key) {
          let next = cycle(&chart.y_options, &chart.selection.y, forward);
          self.session.set_chart_y(key, &chart.columns, &next);
        }
      }
      Action::ChartKind { chart: key } => {
        if let Some(chart) = self.chart_state(key) {
          let kind = chart.selection.kind.next();
          tracing::debug!(turn = key.turn, block = key.block, %kind, "chart kind changed");
          self.session.set_chart_kind(key, &chart.columns, kind);
        }
      }
    }
  }

  /// Chart state of the result drawn for `key`.
  fn chart_state(&self, key: ChartKey) -> Option<ChartState> {
    let view = self.views.iter().find(|v| v.index == key.turn)?;
    view.blocks.iter().find_map(|block| match block {
      BlockView::Sql(sql) => match &sql.results {
        ResultsView::Table {
          frame,
          chart:
            ChartView::Ready {
              key: shown,
              selection,
              x_options,
              y_options,
              ..
            },
        } if *shown == key => Some(ChartState {
          columns:   frame.columns.clone(),
          selection: selection.clone(),
          x_options: x_options.clone(),
          y_options: y_options.clone(),
        }),
        _ => None,
      },
      _ => None,
    })
  }
}

struct ChartState {
  columns:   Vec<String>,
  selection: ChartSelection,
  x_options: Vec<String>,
  y_options: Vec<String>,
}

/// The option after (or before) `current`, wrapping around.
fn cycle(options: &[String], current: &str, forward: bool) -> String {
  let len = options.len();
  if len == 0 {
    return current.to_owned();
  }
  let pos = options.iter().position(|o| o == current);
  let next = match (pos, forward) {
    (None, _) => 0,
    (Some(i), true) => (i + 1) % len,
    (Some(i), false) => (i + len - 1) % len,
  };
  options[next].clone()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn opts(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn cycle_wraps_both_ways() {
    let o = opts(&["a", "b", "c"]);
    assert_eq!(cycle(&o, "c", true), "a");
    assert_eq!(cycle(&o, "a", false), "c");
    assert_eq!(cycle(&o, "zz", true), "a");
  }

  #[test]
  fn suggestions_become_one_action_each() {
    let block = BlockView::Suggestions(opts(&["one", "two"]));
    let actions = block_actions(4, &block);
    assert_eq!(actions, vec![
      Action::Suggestion {
        turn: 4,
        text: "one".into(),
      },
      Action::Suggestion {
        turn: 4,
        text: "two".into(),
      },
    ]);
    assert!(block_actions(4, &BlockView::Text("hi".into())).is_empty());
  }

  #[test]
  fn chart_actions_name_their_block() {
    use std::sync::Arc;

    use sift_core::{
      feedback::FeedbackStatus,
      query::QueryFrame,
      render::{FeedbackView, SqlView, VerifiedView},
    };

    let columns = opts(&["region", "revenue"]);
    let key = ChartKey::new(4, 2);
    let block = BlockView::Sql(SqlView {
      statement: "SELECT region, revenue FROM sales".into(),
      verified:  VerifiedView::NotReported,
      results:   ResultsView::Table {
        frame: Arc::new(QueryFrame {
          columns: columns.clone(),
          rows:    Vec::new(),
        }),
        chart: ChartView::Ready {
          key,
          selection: ChartSelection::default_for(&columns).unwrap(),
          x_options: columns.clone(),
          y_options: opts(&["revenue"]),
          series: Vec::new(),
        },
      },
      feedback:  Some(FeedbackView {
        request_id: "r1".into(),
        status:     FeedbackStatus::Open,
      }),
    });

    let actions = block_actions(4, &block);
    assert_eq!(actions, vec![
      Action::ChartX { chart: key },
      Action::ChartY { chart: key },
      Action::ChartKind { chart: key },
      Action::Feedback {
        turn:       4,
        request_id: "r1".into(),
      },
    ]);
    assert!(actions.iter().all(|a| a.turn() == 4));
    assert_eq!(actions[0].chart(), Some(key));
    assert_eq!(actions[3].chart(), None);
  }
}

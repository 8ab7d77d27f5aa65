//! Protocol tests against in-process fakes of the remote API and warehouse.

use std::{
  cell::{Cell, RefCell},
  collections::{HashMap, VecDeque},
};

use serde_json::json;

use crate::{
  Error,
  api::{ANALYST_ERROR_HEADLINE, AnalystApi, GRAPH_PLAN_ERROR_HEADLINE, MISSING_REQUEST_ID, Reply},
  chart::{ChartKey, ChartKind},
  envelope::{Envelope, Warning, format_api_error},
  feedback::{self, FeedbackStatus},
  message::{ContentBlock, Role, Turn},
  orchestrator::{self, Planner, TurnOrchestrator},
  query::{QueryExecutor, QueryFrame},
  render::{self, BlockView, ChartView, ResultsView, VerifiedView},
  session::{CycleState, FeedbackRecord, SemanticModels, Session},
  transcript::Transcript,
};

// ─── Fakes ───────────────────────────────────────────────────────────────────

/// Scripted analyst API. Replies are served in order; once exhausted every
/// call answers with a plain text turn.
#[derive(Default)]
struct FakeApi {
  replies:        RefCell<VecDeque<Reply>>,
  plan_calls:     Cell<usize>,
  analyst_calls:  Cell<usize>,
  feedback_calls: Cell<usize>,
  last_model:     RefCell<Option<String>>,
  last_len:       Cell<usize>,
  feedback_error: Option<String>,
}

impl FakeApi {
  fn with_replies(replies: impl IntoIterator<Item = Reply>) -> Self {
    Self {
      replies: RefCell::new(replies.into_iter().collect()),
      ..Self::default()
    }
  }

  fn next_reply(&self, transcript: &Transcript) -> Reply {
    self.last_len.set(transcript.len());
    self.replies.borrow_mut().pop_front().unwrap_or_else(|| {
      let n = self.plan_calls.get() + self.analyst_calls.get();
      ok_reply(json!({
        "message": { "content": [{ "type": "text", "text": "ok" }] },
        "request_id": format!("req-{n}")
      }))
    })
  }
}

impl AnalystApi for FakeApi {
  async fn create_graph_plan(&self, transcript: &Transcript) -> Reply {
    self.plan_calls.set(self.plan_calls.get() + 1);
    self.next_reply(transcript)
  }

  async fn analyst_message(&self, transcript: &Transcript, model: &str) -> Reply {
    self.analyst_calls.set(self.analyst_calls.get() + 1);
    *self.last_model.borrow_mut() = Some(model.to_owned());
    self.next_reply(transcript)
  }

  async fn submit_feedback(&self, _: &str, _: bool, _: &str) -> Option<String> {
    self.feedback_calls.set(self.feedback_calls.get() + 1);
    self.feedback_error.clone()
  }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct FakeSqlError(String);

#[derive(Default)]
struct FakeWarehouse {
  frames:     HashMap<String, QueryFrame>,
  executions: Cell<usize>,
}

impl FakeWarehouse {
  fn with(sql: &str, frame: QueryFrame) -> Self {
    let mut w = Self::default();
    w.frames.insert(sql.to_owned(), frame);
    w
  }
}

impl QueryExecutor for FakeWarehouse {
  type Error = FakeSqlError;

  async fn execute(&self, sql: &str) -> Result<QueryFrame, FakeSqlError> {
    self.executions.set(self.executions.get() + 1);
    self
      .frames
      .get(sql)
      .cloned()
      .ok_or_else(|| FakeSqlError(format!("no such table in: {sql}")))
  }
}

fn ok_reply(body: serde_json::Value) -> Reply {
  Reply::ok(200, serde_json::from_value(body).unwrap())
}

fn err_reply(status: u16, body: serde_json::Value, headline: &str) -> Reply {
  let envelope: Envelope = serde_json::from_value(body).unwrap();
  let error = format_api_error(headline, status, &envelope);
  Reply::failed(Some(status), envelope, error)
}

fn sql_reply(statement: &str, request_id: &str) -> Reply {
  ok_reply(json!({
    "message": { "content": [
      { "type": "text", "text": "Here you go" },
      { "type": "sql", "statement": statement }
    ]},
    "request_id": request_id
  }))
}

fn session() -> Session {
  Session::new(SemanticModels::new(vec![
    "DB.PUBLIC.STAGE/sales.yaml".into(),
    "DB.PUBLIC.STAGE/graph.yml".into(),
  ]))
}

fn frame(columns: &[&str], rows: Vec<Vec<crate::query::Cell>>) -> QueryFrame {
  QueryFrame {
    columns: columns.iter().map(|c| c.to_string()).collect(),
    rows,
  }
}

fn two_col_frame() -> QueryFrame {
  use crate::query::Cell::*;
  frame(&["region", "revenue"], vec![
    vec![Text("north".into()), Integer(10)],
    vec![Text("south".into()), Real(12.5)],
  ])
}

// ─── Transcript ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn transcript_grows_by_two_per_accepted_input() {
  let api = FakeApi::default();
  let orch = TurnOrchestrator::new(&api, Planner::GraphPlan);
  let mut s = session();

  orch
    .bootstrap(&mut s, "you are a planner", "What questions can I ask?")
    .await
    .unwrap();
  assert_eq!(s.transcript.len(), 3);

  let first_user = s.transcript.get(1).cloned().unwrap();
  for n in 2..=5 {
    orch.run_turn(&mut s, &format!("question {n}")).await.unwrap();
    assert_eq!(s.transcript.len(), 1 + 2 * n);
  }

  // Indices are never renumbered.
  assert_eq!(s.transcript.get(0).unwrap().role, Role::System);
  assert_eq!(s.transcript.get(1), Some(&first_user));
  let indices: Vec<_> = s.transcript.iter().map(|(i, _)| i).collect();
  assert_eq!(indices, (0..11).collect::<Vec<_>>());
}

#[tokio::test]
async fn bootstrap_only_seeds_an_empty_transcript() {
  let api = FakeApi::default();
  let orch = TurnOrchestrator::new(&api, Planner::GraphPlan);
  let mut s = session();

  assert!(orch.bootstrap(&mut s, "p", "q").await.unwrap().is_some());
  assert!(orch.bootstrap(&mut s, "p", "q").await.unwrap().is_none());
  assert_eq!(api.plan_calls.get(), 1);
}

#[tokio::test]
async fn remote_call_sees_the_new_user_turn() {
  let api = FakeApi::default();
  let orch = TurnOrchestrator::new(&api, Planner::GraphPlan);
  let mut s = session();

  orch.run_turn(&mut s, "how many orders?").await.unwrap();
  assert_eq!(api.last_len.get(), 1);
  assert_eq!(s.transcript.get(0).unwrap(), &Turn::user("how many orders?"));
}

#[test]
fn reset_clears_all_session_state() {
  let mut s = session();
  s.transcript.append(Turn::user("hi"));
  s.warnings.push(Warning::new("w"));
  s.feedback.insert("r".into(), FeedbackRecord { error: None });
  s.set_active_suggestion("next");
  s.raise_error_notification();
  let cols = vec!["a".to_string(), "b".to_string()];
  s.chart_for(ChartKey::new(1, 0), &cols);
  let old_id = s.id();

  s.reset();

  assert!(s.transcript.is_empty());
  assert!(s.warnings.is_empty());
  assert!(s.feedback.is_empty());
  assert!(s.active_suggestion().is_none());
  assert!(!s.take_error_notification());
  assert!(s.chart(ChartKey::new(1, 0)).is_none());
  assert_eq!(s.state(), CycleState::Idle);
  assert_ne!(s.id(), old_id);
}

#[test]
fn switching_model_resets_the_conversation() {
  let mut s = session();
  s.transcript.append(Turn::user("hi"));

  assert!(!s.select_model(0));
  assert_eq!(s.transcript.len(), 1);

  assert!(s.select_model(1));
  assert!(s.transcript.is_empty());
  assert_eq!(s.models.selected(), Some("DB.PUBLIC.STAGE/graph.yml"));
  assert!(!s.select_model(7));
}

// ─── Orchestration ───────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_call_becomes_single_text_block() {
  let api = FakeApi::with_replies([err_reply(
    500,
    json!({ "request_id": "r1", "error_code": "E1", "message": "bad" }),
    GRAPH_PLAN_ERROR_HEADLINE,
  )]);
  let orch = TurnOrchestrator::new(&api, Planner::GraphPlan);
  let mut s = session();

  let idx = orch.run_turn(&mut s, "show me everything").await.unwrap();
  let turn = s.transcript.get(idx).unwrap();

  assert_eq!(turn.role, Role::Analyst);
  assert_eq!(turn.request_id.as_deref(), Some("r1"));
  let [ContentBlock::Text { text }] = turn.content.as_slice() else {
    panic!("expected a single text block, got {:?}", turn.content);
  };
  for needle in ["r1", "E1", "bad", GRAPH_PLAN_ERROR_HEADLINE] {
    assert!(text.contains(needle), "{needle} missing from {text}");
  }

  // Edge-triggered: observed once, then cleared.
  assert!(s.take_error_notification());
  assert!(!s.take_error_notification());
}

#[tokio::test]
async fn successful_call_appends_envelope_content() {
  let api = FakeApi::with_replies([ok_reply(json!({
    "message": { "content": [{ "type": "text", "text": "hi" }] },
    "request_id": "r2"
  }))]);
  let orch = TurnOrchestrator::new(&api, Planner::GraphPlan);
  let mut s = session();

  let idx = orch.run_turn(&mut s, "hello").await.unwrap();

  assert_eq!(
    s.transcript.get(idx).unwrap(),
    &Turn::analyst(vec![ContentBlock::text("hi")], Some("r2".into()))
  );
  assert!(!s.error_notification_pending());
  assert_eq!(s.state(), CycleState::Idle);
}

#[tokio::test]
async fn success_without_request_id_becomes_an_error_turn() {
  let api = FakeApi::with_replies([
    ok_reply(json!({
      "message": { "content": [{ "type": "text", "text": "hi" }] }
    })),
    ok_reply(json!({
      "message": { "content": [{ "type": "text", "text": "hi" }] },
      "request_id": ""
    })),
  ]);
  let orch = TurnOrchestrator::new(&api, Planner::GraphPlan);
  let mut s = session();

  for question in ["hello", "again"] {
    let idx = orch.run_turn(&mut s, question).await.unwrap();
    let turn = s.transcript.get(idx).unwrap();
    assert_eq!(turn.content, vec![ContentBlock::text(MISSING_REQUEST_ID)]);
    assert!(s.take_error_notification());
  }
}

#[tokio::test]
async fn warnings_accumulate_within_a_cycle_and_clear_on_the_next() {
  let mut s = session();
  orchestrator::begin(&mut s, "first").unwrap();
  orchestrator::merge_reply(
    &mut s,
    ok_reply(json!({ "request_id": "a", "warnings": [{ "message": "a" }] })),
  );
  orchestrator::merge_reply(
    &mut s,
    ok_reply(json!({ "request_id": "b", "warnings": [{ "message": "b" }] })),
  );
  assert_eq!(s.warnings, vec![Warning::new("a"), Warning::new("b")]);

  let api = FakeApi::default();
  let orch = TurnOrchestrator::new(&api, Planner::GraphPlan);
  // The hand-driven cycle above never left AwaitingFirstCall.
  orch.dispatch(&mut s).await.unwrap();
  orchestrator::begin(&mut s, "second").unwrap();
  assert!(s.warnings.is_empty());
}

#[tokio::test]
async fn second_cycle_is_rejected_while_one_is_in_flight() {
  let mut s = session();
  orchestrator::begin(&mut s, "one").unwrap();
  assert!(matches!(
    orchestrator::begin(&mut s, "two"),
    Err(Error::CycleInFlight(CycleState::AwaitingFirstCall))
  ));
  assert_eq!(s.transcript.len(), 1);
}

#[tokio::test]
async fn dispatch_without_pending_turn_is_an_error() {
  let api = FakeApi::default();
  let orch = TurnOrchestrator::new(&api, Planner::GraphPlan);
  let mut s = session();
  assert!(matches!(orch.dispatch(&mut s).await, Err(Error::NoPendingTurn)));
  assert_eq!(api.plan_calls.get(), 0);
}

#[test]
fn empty_input_is_rejected() {
  let mut s = session();
  assert!(matches!(orchestrator::begin(&mut s, "  "), Err(Error::EmptyInput)));
  assert!(s.transcript.is_empty());
}

#[test]
fn typed_input_takes_precedence_over_suggestion() {
  let mut s = session();
  s.set_active_suggestion("suggested");

  assert_eq!(
    orchestrator::next_input(&mut s, Some("typed".into())),
    Some("typed".into())
  );
  assert_eq!(orchestrator::next_input(&mut s, None), Some("suggested".into()));
  assert_eq!(orchestrator::next_input(&mut s, None), None);
}

#[tokio::test]
async fn analyst_planner_sends_selected_model() {
  let api = FakeApi::default();
  let orch = TurnOrchestrator::new(&api, Planner::AnalystMessage);
  let mut s = session();
  s.select_model(1);

  orch.run_turn(&mut s, "top customers").await.unwrap();

  assert_eq!(api.analyst_calls.get(), 1);
  assert_eq!(api.plan_calls.get(), 0);
  assert_eq!(
    api.last_model.borrow().as_deref(),
    Some("DB.PUBLIC.STAGE/graph.yml")
  );
}

#[tokio::test]
async fn analyst_planner_without_models_reports_inline() {
  let api = FakeApi::default();
  let orch = TurnOrchestrator::new(&api, Planner::AnalystMessage);
  let mut s = Session::new(SemanticModels::new(Vec::new()));

  let idx = orch.run_turn(&mut s, "anything").await.unwrap();

  assert_eq!(api.analyst_calls.get(), 0);
  let turn = s.transcript.get(idx).unwrap();
  assert!(matches!(&turn.content[..], [ContentBlock::Text { text }] if text.contains("semantic model")));
  assert!(s.take_error_notification());
}

// ─── Feedback ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn feedback_is_submitted_once_per_request() {
  let api = FakeApi::default();
  let mut s = session();

  let first = feedback::submit(&mut s, &api, "r9", true, "great").await.unwrap();
  assert_eq!(first, FeedbackRecord { error: None });
  assert_eq!(feedback::status(&s, "r9"), FeedbackStatus::Accepted);

  let second = feedback::submit(&mut s, &api, "r9", false, "changed my mind").await;
  assert!(matches!(second, Err(Error::FeedbackClosed(id)) if id == "r9"));
  assert_eq!(api.feedback_calls.get(), 1);
  assert_eq!(s.feedback.get("r9"), Some(&first));
}

#[tokio::test]
async fn rejected_feedback_also_closes_the_form() {
  let api = FakeApi {
    feedback_error: Some(format!("🚨 {ANALYST_ERROR_HEADLINE} 🚨")),
    ..FakeApi::default()
  };
  let mut s = session();

  feedback::submit(&mut s, &api, "r3", false, "").await.unwrap();
  assert!(matches!(feedback::status(&s, "r3"), FeedbackStatus::Rejected(e) if e.contains("Analyst")));
  assert!(feedback::submit(&mut s, &api, "r3", true, "").await.is_err());
  assert_eq!(api.feedback_calls.get(), 1);
}

// ─── Rendering ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn identical_statements_execute_once() {
  let sql = "SELECT region, revenue FROM sales";
  let api = FakeApi::with_replies([sql_reply(sql, "a"), sql_reply(sql, "b")]);
  let orch = TurnOrchestrator::new(&api, Planner::GraphPlan);
  let warehouse = FakeWarehouse::with(sql, two_col_frame());
  let mut s = session();

  orch.run_turn(&mut s, "revenue by region").await.unwrap();
  render::render(&mut s, &warehouse).await;
  render::render(&mut s, &warehouse).await;
  orch.run_turn(&mut s, "again please").await.unwrap();
  render::render(&mut s, &warehouse).await;

  assert_eq!(warehouse.executions.get(), 1);
  assert_eq!(s.sql_memo().len(), 1);
}

#[tokio::test]
async fn memo_survives_reset() {
  let sql = "SELECT region, revenue FROM sales";
  let api = FakeApi::with_replies([sql_reply(sql, "a"), sql_reply(sql, "b")]);
  let orch = TurnOrchestrator::new(&api, Planner::GraphPlan);
  let warehouse = FakeWarehouse::with(sql, two_col_frame());
  let mut s = session();

  orch.run_turn(&mut s, "revenue").await.unwrap();
  render::render(&mut s, &warehouse).await;
  s.reset();
  orch.run_turn(&mut s, "revenue").await.unwrap();
  render::render(&mut s, &warehouse).await;

  assert_eq!(warehouse.executions.get(), 1);
}

#[tokio::test]
async fn sql_failure_does_not_stop_the_rest_of_the_render() {
  let api = FakeApi::with_replies([
    sql_reply("SELECT * FROM missing", "a"),
    sql_reply("SELECT region, revenue FROM sales", "b"),
  ]);
  let orch = TurnOrchestrator::new(&api, Planner::GraphPlan);
  let warehouse = FakeWarehouse::with("SELECT region, revenue FROM sales", two_col_frame());
  let mut s = session();

  orch.run_turn(&mut s, "one").await.unwrap();
  orch.run_turn(&mut s, "two").await.unwrap();
  let views = render::render(&mut s, &warehouse).await;

  assert_eq!(views.len(), 4);
  let BlockView::Sql(failed) = &views[1].blocks[1] else {
    panic!("expected sql view");
  };
  assert!(matches!(&failed.results, ResultsView::Failed(e) if e.contains("missing")));
  assert!(failed.results.notice().unwrap().starts_with("Could not execute"));

  let BlockView::Sql(ok) = &views[3].blocks[1] else {
    panic!("expected sql view");
  };
  assert!(matches!(ok.results, ResultsView::Table { .. }));
  assert_eq!(ok.feedback.as_ref().unwrap().request_id, "b");
  assert_eq!(ok.feedback.as_ref().unwrap().status, FeedbackStatus::Open);
}

#[tokio::test]
async fn render_maps_every_block_kind() {
  let api = FakeApi::with_replies([ok_reply(json!({
    "message": { "content": [
      { "type": "text", "text": "Try one of these" },
      { "type": "suggestions", "suggestions": ["Top products?", "Sales by month?"] },
      { "type": "sql", "statement": "SELECT 1 AS one", "confidence": {
        "verified_query_used": {
          "name": "q", "question": "?", "verified_by": "me",
          "verified_at": 1700000000, "sql": "SELECT 1"
        }
      }},
      { "type": "sql", "statement": "SELECT nothing", "confidence": {} },
      { "type": "sparkline", "points": [1, 2, 3] }
    ]},
    "request_id": "r5"
  }))]);
  let orch = TurnOrchestrator::new(&api, Planner::GraphPlan);
  let mut warehouse = FakeWarehouse::with("SELECT 1 AS one", frame(&["one"], vec![vec![
    crate::query::Cell::Integer(1),
  ]]));
  warehouse
    .frames
    .insert("SELECT nothing".into(), frame(&["a", "b"], Vec::new()));
  let mut s = session();

  orch.run_turn(&mut s, "help").await.unwrap();
  let views = render::render(&mut s, &warehouse).await;
  let analyst = &views[1];

  assert_eq!(analyst.blocks.len(), 4, "unknown block renders as nothing");
  assert_eq!(analyst.blocks[0], BlockView::Text("Try one of these".into()));
  assert_eq!(
    analyst.blocks[1],
    BlockView::Suggestions(vec!["Top products?".into(), "Sales by month?".into()])
  );

  let BlockView::Sql(single_col) = &analyst.blocks[2] else {
    panic!("expected sql view");
  };
  assert!(matches!(&single_col.verified, VerifiedView::Used(vq) if vq.verified_by == "me"));
  assert!(matches!(
    &single_col.results,
    ResultsView::Table { chart: ChartView::TooFewColumns, .. }
  ));

  let BlockView::Sql(empty) = &analyst.blocks[3] else {
    panic!("expected sql view");
  };
  assert_eq!(empty.verified, VerifiedView::NoneUsed);
  assert_eq!(empty.results, ResultsView::NoData);
}

#[tokio::test]
async fn chart_selection_is_kept_per_turn() {
  let sql = "SELECT region, revenue FROM sales";
  let api = FakeApi::with_replies([sql_reply(sql, "a"), sql_reply(sql, "b")]);
  let orch = TurnOrchestrator::new(&api, Planner::GraphPlan);
  let warehouse = FakeWarehouse::with(sql, two_col_frame());
  let mut s = session();

  let first = orch.run_turn(&mut s, "one").await.unwrap();
  let second = orch.run_turn(&mut s, "two").await.unwrap();
  render::render(&mut s, &warehouse).await;

  let cols = two_col_frame().columns;
  s.set_chart_x(ChartKey::new(first, 1), &cols, "revenue");
  s.set_chart_kind(ChartKey::new(first, 1), &cols, ChartKind::Bar);

  let views = render::render(&mut s, &warehouse).await;
  let chart_of = |i: usize| match &views[i].blocks[1] {
    BlockView::Sql(v) => match &v.results {
      ResultsView::Table {
        chart: ChartView::Ready {
          selection,
          y_options,
          ..
        },
        ..
      } => (selection.clone(), y_options.clone()),
      other => panic!("unexpected results {other:?}"),
    },
    other => panic!("unexpected block {other:?}"),
  };

  let (sel, ys) = chart_of(first);
  assert_eq!((sel.x.as_str(), sel.y.as_str(), sel.kind), ("revenue", "region", ChartKind::Bar));
  assert_eq!(ys, vec!["region".to_string()]);

  let (sel, ys) = chart_of(second);
  assert_eq!((sel.x.as_str(), sel.y.as_str(), sel.kind), ("region", "revenue", ChartKind::Line));
  assert!(!ys.contains(&sel.x));
}

#[tokio::test]
async fn two_charts_in_one_turn_are_independent() {
  let by_region = "SELECT region, revenue FROM sales";
  let by_node = "SELECT node, degree, rank FROM centrality";
  let api = FakeApi::with_replies([ok_reply(json!({
    "message": { "content": [
      { "type": "sql", "statement": by_region },
      { "type": "sql", "statement": by_node }
    ]},
    "request_id": "r9"
  }))]);
  let orch = TurnOrchestrator::new(&api, Planner::GraphPlan);
  let mut warehouse = FakeWarehouse::with(by_region, two_col_frame());
  let node_cols = frame(&["node", "degree", "rank"], vec![vec![
    crate::query::Cell::Text("a".into()),
    crate::query::Cell::Integer(3),
    crate::query::Cell::Real(0.5),
  ]]);
  warehouse.frames.insert(by_node.into(), node_cols.clone());
  let mut s = session();

  let turn = orch.run_turn(&mut s, "both").await.unwrap();
  render::render(&mut s, &warehouse).await;
  s.set_chart_y(ChartKey::new(turn, 1), &node_cols.columns, "rank");

  let views = render::render(&mut s, &warehouse).await;
  let charts: Vec<_> = views[turn]
    .blocks
    .iter()
    .map(|b| match b {
      BlockView::Sql(v) => match &v.results {
        ResultsView::Table {
          chart: ChartView::Ready { key, selection, .. },
          ..
        } => (*key, selection.x.clone(), selection.y.clone()),
        other => panic!("unexpected results {other:?}"),
      },
      other => panic!("unexpected block {other:?}"),
    })
    .collect();

  assert_eq!(charts, vec![
    (ChartKey::new(turn, 0), "region".to_string(), "revenue".to_string()),
    (ChartKey::new(turn, 1), "node".to_string(), "rank".to_string()),
  ]);
}

#[tokio::test]
async fn feedback_view_follows_submission() {
  let sql = "SELECT region, revenue FROM sales";
  let api = FakeApi::with_replies([sql_reply(sql, "r7")]);
  let orch = TurnOrchestrator::new(&api, Planner::GraphPlan);
  let warehouse = FakeWarehouse::with(sql, two_col_frame());
  let mut s = session();

  orch.run_turn(&mut s, "q").await.unwrap();
  feedback::submit(&mut s, &api, "r7", true, "").await.unwrap();
  let views = render::render(&mut s, &warehouse).await;

  let BlockView::Sql(v) = &views[1].blocks[1] else {
    panic!("expected sql view");
  };
  assert_eq!(v.feedback.as_ref().unwrap().status, FeedbackStatus::Accepted);
}

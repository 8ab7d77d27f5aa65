//! Content renderer — turns the transcript into a view model.
//!
//! [`render`] walks the transcript in order and maps every content block to a
//! [`BlockView`]. SQL blocks are executed through the session's memo table, so
//! rendering the same transcript repeatedly runs each statement once. A
//! failing statement only affects its own block.
//!
//! The view model is toolkit-agnostic; `sift-cli` draws it with ratatui.

use std::sync::Arc;

use crate::{
  chart::{ChartKey, ChartSelection, MIN_CHART_COLUMNS, y_options},
  feedback::{self, FeedbackStatus},
  message::{ContentBlock, Role, SqlConfidence, VerifiedQuery},
  query::{QueryExecutor, QueryFrame},
  session::Session,
};

pub const NO_VERIFIED_QUERY_NOTICE: &str = "There is no query from the Verified Query \
                                            Repository used to generate this SQL answer";
pub const NO_DATA_NOTICE: &str = "Query returned no data";
pub const TOO_FEW_COLUMNS_NOTICE: &str = "At least 2 columns are required";
pub const SQL_ERROR_PREFIX: &str = "Could not execute generated SQL query. Error:";

// ─── View model ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct TurnView {
  /// Transcript index; stable key for per-turn widget state.
  pub index:  usize,
  pub role:   Role,
  pub blocks: Vec<BlockView>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockView {
  Text(String),
  /// One entry per suggestion, in order. Choosing one sets the session's
  /// active suggestion to its value.
  Suggestions(Vec<String>),
  Sql(SqlView),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlView {
  pub statement: String,
  pub verified:  VerifiedView,
  pub results:   ResultsView,
  /// Present when the owning turn carries a request id.
  pub feedback:  Option<FeedbackView>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerifiedView {
  /// The response carried no confidence information.
  NotReported,
  /// Confidence was reported but no verified query was used.
  NoneUsed,
  Used(VerifiedQuery),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultsView {
  Failed(String),
  NoData,
  Table {
    frame: Arc<QueryFrame>,
    chart: ChartView,
  },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartView {
  TooFewColumns,
  Ready {
    /// Key for the session's chart setters.
    key:       ChartKey,
    selection: ChartSelection,
    x_options: Vec<String>,
    y_options: Vec<String>,
    series:    Vec<(String, f64)>,
  },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackView {
  pub request_id: String,
  pub status:     FeedbackStatus,
}

impl ResultsView {
  /// One-line message for the non-table outcomes.
  pub fn notice(&self) -> Option<String> {
    match self {
      Self::Failed(e) => Some(format!("{SQL_ERROR_PREFIX} {e}")),
      Self::NoData => Some(NO_DATA_NOTICE.to_owned()),
      Self::Table { .. } => None,
    }
  }
}

// ─── Rendering ───────────────────────────────────────────────────────────────

/// Render every turn of the session's transcript.
pub async fn render<E: QueryExecutor>(
  session: &mut Session,
  executor: &E,
) -> Vec<TurnView> {
  let mut views = Vec::with_capacity(session.transcript.len());
  for index in 0..session.transcript.len() {
    let Some(turn) = session.transcript.get(index).cloned() else {
      continue;
    };
    let request_id = match turn.role {
      Role::Analyst => turn.request_id.as_deref(),
      _ => None,
    };

    let mut blocks = Vec::with_capacity(turn.content.len());
    for (position, block) in turn.content.iter().enumerate() {
      let view = match block {
        ContentBlock::Text { text } => BlockView::Text(text.clone()),
        ContentBlock::Suggestions { suggestions } => {
          BlockView::Suggestions(suggestions.clone())
        }
        ContentBlock::Sql {
          statement,
          confidence,
        } => BlockView::Sql(
          render_sql(
            session,
            executor,
            ChartKey::new(index, position),
            statement,
            confidence.as_ref(),
            request_id,
          )
          .await,
        ),
        ContentBlock::Unknown(_) => continue,
      };
      blocks.push(view);
    }

    views.push(TurnView {
      index,
      role: turn.role,
      blocks,
    });
  }
  views
}

async fn render_sql<E: QueryExecutor>(
  session: &mut Session,
  executor: &E,
  key: ChartKey,
  statement: &str,
  confidence: Option<&SqlConfidence>,
  request_id: Option<&str>,
) -> SqlView {
  let verified = match confidence {
    None => VerifiedView::NotReported,
    Some(SqlConfidence {
      verified_query_used: None,
    }) => VerifiedView::NoneUsed,
    Some(SqlConfidence {
      verified_query_used: Some(vq),
    }) => VerifiedView::Used(vq.clone()),
  };

  let results = match session.sql.get_or_execute(statement, executor).await {
    Err(e) => ResultsView::Failed(e),
    Ok(frame) if frame.is_empty() => ResultsView::NoData,
    Ok(frame) => {
      let chart = chart_view(session, key, &frame);
      ResultsView::Table { frame, chart }
    }
  };

  let feedback = request_id.map(|id| FeedbackView {
    request_id: id.to_owned(),
    status:     feedback::status(session, id),
  });

  SqlView {
    statement: statement.to_owned(),
    verified,
    results,
    feedback,
  }
}

fn chart_view(session: &mut Session, key: ChartKey, frame: &QueryFrame) -> ChartView {
  if frame.columns.len() < MIN_CHART_COLUMNS {
    return ChartView::TooFewColumns;
  }
  let Some(selection) = session.chart_for(key, &frame.columns) else {
    return ChartView::TooFewColumns;
  };
  ChartView::Ready {
    key,
    x_options: frame.columns.clone(),
    y_options: y_options(&frame.columns, &selection.x)
      .into_iter()
      .map(str::to_owned)
      .collect(),
    series: selection.series(frame),
    selection,
  }
}

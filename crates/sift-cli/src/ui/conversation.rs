//! Conversation pane — every turn of the transcript, oldest first.

use chrono::Local;
use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph, Wrap},
};
use sift_core::{
  feedback::FeedbackStatus,
  message::Role,
  query::QueryFrame,
  render::{
    BlockView, ChartView, NO_VERIFIED_QUERY_NOTICE, ResultsView, SqlView, TOO_FEW_COLUMNS_NOTICE,
    VerifiedView,
  },
};

use crate::app::{App, Focus, block_actions};

/// Rows of a result table drawn inline.
const MAX_TABLE_ROWS: usize = 20;
/// Widest a table column is drawn.
const MAX_COLUMN_WIDTH: usize = 24;

// ─── Public entry ─────────────────────────────────────────────────────────────

/// Render the conversation into `area`, pinned to the bottom unless the user
/// has scrolled back.
pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let block = Block::default()
    .title(" Conversation ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(if app.focus == Focus::Actions {
      Color::Cyan
    } else {
      Color::DarkGray
    }));
  let inner = block.inner(area);
  f.render_widget(block, area);

  let paragraph = Paragraph::new(build_lines(app)).wrap(Wrap { trim: false });
  let offset = bottom_offset(&paragraph, inner, app.scroll);
  f.render_widget(paragraph.scroll((offset, 0)), inner);
}

// ─── Line building ────────────────────────────────────────────────────────────

struct Cursor {
  /// Index of the next action to be drawn.
  next:    usize,
  /// Focused action index, if actions have focus.
  focused: Option<usize>,
}

impl Cursor {
  /// Claim the next action slot; returns whether it is focused.
  fn take(&mut self) -> bool {
    let hit = self.focused == Some(self.next);
    self.next += 1;
    hit
  }
}

fn build_lines(app: &App) -> Vec<Line<'static>> {
  let mut cursor = Cursor {
    next:    0,
    focused: (app.focus == Focus::Actions).then_some(app.action_cursor),
  };
  let mut lines = Vec::new();

  for view in &app.views {
    let (label, color) = match view.role {
      Role::System => {
        // The system prompt is not shown, but it may still own actions.
        for block in &view.blocks {
          cursor.next += block_actions(view.index, block).len();
        }
        continue;
      }
      Role::User => ("You", Color::Green),
      Role::Analyst => ("Analyst", Color::Cyan),
    };
    lines.push(Line::from(Span::styled(
      label,
      Style::default().fg(color).add_modifier(Modifier::BOLD),
    )));

    for block in &view.blocks {
      match block {
        BlockView::Text(text) => {
          lines.extend(text.lines().map(|l| Line::from(l.to_owned())));
        }
        BlockView::Suggestions(items) => {
          for item in items {
            lines.push(action_line(format!("  › {item}"), cursor.take()));
          }
        }
        BlockView::Sql(sql) => sql_lines(&mut lines, sql, &mut cursor),
      }
    }
    lines.push(Line::from(""));
  }

  if app.busy {
    lines.push(Line::from(Span::styled(
      "Analyst is thinking…",
      Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    )));
  }
  lines
}

fn sql_lines(lines: &mut Vec<Line<'static>>, sql: &SqlView, cursor: &mut Cursor) {
  lines.push(heading("SQL Query"));
  lines.extend(
    sql
      .statement
      .lines()
      .map(|l| Line::from(Span::styled(format!("  {l}"), Style::default().fg(Color::Yellow)))),
  );

  match &sql.verified {
    VerifiedView::NotReported => {}
    VerifiedView::NoneUsed => lines.push(dim(NO_VERIFIED_QUERY_NOTICE.to_owned())),
    VerifiedView::Used(vq) => {
      let when = vq
        .verified_at_utc()
        .map(|d| d.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| vq.verified_at.to_string());
      lines.push(heading("Verified Query Used"));
      for (field, value) in [
        ("Name", vq.name.as_str()),
        ("Question", vq.question.as_str()),
        ("Verified by", vq.verified_by.as_str()),
        ("Verified at", when.as_str()),
      ] {
        lines.push(Line::from(vec![
          Span::styled(format!("  {field:<12}"), Style::default().fg(Color::DarkGray)),
          Span::raw(value.to_owned()),
        ]));
      }
      lines.push(dim("  SQL".to_owned()));
      lines.extend(vq.sql.lines().map(|l| dim(format!("    {l}"))));
    }
  }

  lines.push(heading("Results"));
  match &sql.results {
    ResultsView::Table { frame, chart } => {
      table_lines(lines, frame);
      match chart {
        ChartView::TooFewColumns => lines.push(dim(TOO_FEW_COLUMNS_NOTICE.to_owned())),
        ChartView::Ready { selection, .. } => {
          let x = cursor.take();
          let y = cursor.take();
          let kind = cursor.take();
          lines.push(Line::from(vec![
            Span::raw("  "),
            control(format!("X: {}", selection.x), x),
            Span::raw("  "),
            control(format!("Y: {}", selection.y), y),
            Span::raw("  "),
            control(selection.kind.to_string(), kind),
          ]));
        }
      }
    }
    other => {
      if let Some(notice) = other.notice() {
        let color = if matches!(other, ResultsView::Failed(_)) { Color::Red } else { Color::DarkGray };
        lines.push(Line::from(Span::styled(format!("  {notice}"), Style::default().fg(color))));
      }
    }
  }

  if let Some(fb) = &sql.feedback {
    match &fb.status {
      FeedbackStatus::Open => lines.push(action_line("  [ Give feedback ]".to_owned(), cursor.take())),
      FeedbackStatus::Accepted => lines.push(Line::from(Span::styled(
        "  Feedback submitted ✓",
        Style::default().fg(Color::Green),
      ))),
      FeedbackStatus::Rejected(error) => {
        lines.push(Line::from(Span::styled(
          "  Feedback was not accepted:",
          Style::default().fg(Color::Red),
        )));
        lines.extend(error.lines().map(|l| Line::from(Span::styled(format!("    {l}"), Style::default().fg(Color::Red)))));
      }
    }
  }
}

fn table_lines(lines: &mut Vec<Line<'static>>, frame: &QueryFrame) {
  let widths: Vec<usize> = frame
    .columns
    .iter()
    .enumerate()
    .map(|(i, name)| {
      frame
        .rows
        .iter()
        .take(MAX_TABLE_ROWS)
        .filter_map(|row| row.get(i))
        .map(|c| c.to_string().chars().count())
        .chain([name.chars().count()])
        .max()
        .unwrap_or(0)
        .min(MAX_COLUMN_WIDTH)
    })
    .collect();

  let row_line = |cells: Vec<String>| {
    cells
      .iter()
      .zip(&widths)
      .map(|(c, w)| format!("{:<w$}", truncate(c, *w), w = *w))
      .collect::<Vec<_>>()
      .join(" │ ")
  };

  lines.push(Line::from(Span::styled(
    format!("  {}", row_line(frame.columns.clone())),
    Style::default().add_modifier(Modifier::BOLD),
  )));
  for row in frame.rows.iter().take(MAX_TABLE_ROWS) {
    lines.push(Line::from(format!(
      "  {}",
      row_line(row.iter().map(ToString::to_string).collect())
    )));
  }
  if frame.rows.len() > MAX_TABLE_ROWS {
    lines.push(dim(format!("  … {} more rows", frame.rows.len() - MAX_TABLE_ROWS)));
  }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn heading(text: &'static str) -> Line<'static> {
  Line::from(Span::styled(
    format!(" {text}"),
    Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
  ))
}

fn dim(text: String) -> Line<'static> {
  Line::from(Span::styled(text, Style::default().fg(Color::DarkGray)))
}

fn control(text: String, focused: bool) -> Span<'static> {
  let style = if focused {
    Style::default().fg(Color::Black).bg(Color::Cyan)
  } else {
    Style::default().fg(Color::Cyan)
  };
  Span::styled(format!("[{text}]"), style)
}

fn action_line(text: String, focused: bool) -> Line<'static> {
  let style = if focused {
    Style::default().fg(Color::Black).bg(Color::Cyan)
  } else {
    Style::default().fg(Color::Cyan)
  };
  Line::from(Span::styled(text, style))
}

fn truncate(s: &str, width: usize) -> String {
  if s.chars().count() <= width {
    return s.to_owned();
  }
  let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
  out.push('…');
  out
}

/// Rows `paragraph` occupies when word-wrapped to `width` columns.
fn wrapped_height(paragraph: &Paragraph<'_>, width: u16) -> u16 {
  u16::try_from(paragraph.line_count(width.max(1))).unwrap_or(u16::MAX)
}

/// First row to draw so the end of `paragraph` sits at the bottom of `area`,
/// less `scroll` rows the user has moved back.
fn bottom_offset(paragraph: &Paragraph<'_>, area: Rect, scroll: u16) -> u16 {
  wrapped_height(paragraph, area.width)
    .saturating_sub(area.height)
    .saturating_sub(scroll)
}

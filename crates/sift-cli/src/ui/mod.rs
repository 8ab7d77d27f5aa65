//! TUI rendering — orchestrates all panes.

pub mod chart;
pub mod conversation;
pub mod feedback;
pub mod sidebar;

use chrono::Local;
use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::app::{App, Focus};

/// Most warning lines shown above the input before they are cut off.
const MAX_WARNING_LINES: u16 = 4;

// ─── Root draw ────────────────────────────────────────────────────────────────

/// Main draw function called each frame.
pub fn draw(f: &mut Frame, app: &App) {
  let area = f.area();

  let warning_height = match app.session.warnings.len() as u16 {
    0 => 0,
    n => n.min(MAX_WARNING_LINES) + 2,
  };

  // Vertical stack: header, body, warnings, input, status bar.
  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1),              // header
      Constraint::Min(0),                 // body
      Constraint::Length(warning_height), // warnings
      Constraint::Length(3),              // input
      Constraint::Length(1),              // status bar
    ])
    .split(area);

  draw_header(f, rows[0], app);
  draw_body(f, rows[1], app);
  if warning_height > 0 {
    draw_warnings(f, rows[2], app);
  }
  draw_input(f, rows[3], app);
  draw_status(f, rows[4], app);

  if let Some(form) = &app.feedback_form {
    feedback::draw(f, area, form);
  }
}

// ─── Header ───────────────────────────────────────────────────────────────────

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
  let date = Local::now().format("%Y-%m-%d").to_string();

  let left = Span::styled(
    format!(" sift  {}  [F2] models  [^R] clear chat  [^C] quit", app.planner),
    Style::default()
      .fg(Color::White)
      .add_modifier(Modifier::BOLD),
  );
  let right = Span::styled(
    format!("{date} "),
    Style::default().fg(Color::DarkGray),
  );

  // Simple left-right header: pad the middle.
  let left_width = left.width() as u16;
  let right_width = right.width() as u16;
  let pad = area
    .width
    .saturating_sub(left_width)
    .saturating_sub(right_width);

  let line = Line::from(vec![
    left,
    Span::raw(" ".repeat(pad as usize)),
    right,
  ]);

  let block = Block::default().style(Style::default().bg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(Paragraph::new(line), inner);
}

// ─── Body ─────────────────────────────────────────────────────────────────────

fn draw_body(f: &mut Frame, area: Rect, app: &App) {
  let shown_chart = chart::selected(app);

  let constraints = if shown_chart.is_some() {
    vec![
      Constraint::Length(sidebar::WIDTH),
      Constraint::Percentage(60),
      Constraint::Percentage(40),
    ]
  } else {
    vec![Constraint::Length(sidebar::WIDTH), Constraint::Min(0)]
  };
  let cols = Layout::default()
    .direction(Direction::Horizontal)
    .constraints(constraints)
    .split(area);

  sidebar::draw(f, cols[0], app);
  conversation::draw(f, cols[1], app);
  if let Some(shown) = shown_chart {
    chart::draw(f, cols[2], &shown);
  }
}

// ─── Warnings ─────────────────────────────────────────────────────────────────

fn draw_warnings(f: &mut Frame, area: Rect, app: &App) {
  let block = Block::default()
    .title(" Warnings ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Yellow));
  let lines: Vec<Line> = app
    .session
    .warnings
    .iter()
    .map(|w| Line::from(Span::styled(format!("⚠ {}", w.message), Style::default().fg(Color::Yellow))))
    .collect();
  f.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: true }), area);
}

// ─── Input ────────────────────────────────────────────────────────────────────

fn draw_input(f: &mut Frame, area: Rect, app: &App) {
  let focused = app.focus == Focus::Input && app.feedback_form.is_none();
  let border = if focused { Color::Cyan } else { Color::DarkGray };
  let block = Block::default()
    .title(" What is your question? ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(border));
  let inner = block.inner(area);

  let text = if app.busy {
    Line::from(Span::styled("…", Style::default().fg(Color::DarkGray)))
  } else {
    Line::from(app.input.as_str())
  };
  f.render_widget(Paragraph::new(text).block(block), area);

  if focused && !app.busy {
    let x = inner.x + (app.input.chars().count() as u16).min(inner.width.saturating_sub(1));
    f.set_cursor_position((x, inner.y));
  }
}

// ─── Status bar ───────────────────────────────────────────────────────────────

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
  let (mode_label, hints) = match app.focus {
    _ if app.feedback_form.is_some() => (
      "FEEDBACK",
      "Tab 👍/👎  Type a message  Enter submit  Esc cancel",
    ),
    _ if app.busy => ("BUSY", "Waiting for the analyst…"),
    Focus::Input => (
      "ASK",
      "Type + Enter ask  Tab actions  ↑↓ scroll  F2 models",
    ),
    Focus::Actions => (
      "ACTIONS",
      "Tab/⇧Tab move  Enter choose  ←→ cycle  Esc back",
    ),
    Focus::Models => ("MODELS", "↑↓/jk move  Enter select  Esc back"),
  };

  let status = if app.status_msg.is_empty() {
    hints.to_string()
  } else {
    app.status_msg.clone()
  };

  let mode_span = Span::styled(
    format!(" {mode_label} "),
    Style::default()
      .fg(Color::Black)
      .bg(Color::Cyan)
      .add_modifier(Modifier::BOLD),
  );
  let mut spans = vec![mode_span];
  if let Some(toast) = &app.toast {
    spans.push(Span::styled(
      format!(" 🚨 {toast} "),
      Style::default()
        .fg(Color::White)
        .bg(Color::Red)
        .add_modifier(Modifier::BOLD),
    ));
  }
  spans.push(Span::styled(
    format!("  {status}"),
    Style::default().fg(Color::DarkGray),
  ));

  f.render_widget(
    Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black)),
    area,
  );
}

//! Sidebar — semantic model picker.

use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph},
};
use sift_core::session::SemanticModels;

use crate::app::{App, Focus};

pub const WIDTH: u16 = 28;

/// Render the model list into `area`.
pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let focused = app.focus == Focus::Models;
  let block = Block::default()
    .title(" Semantic model ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray }));
  let inner = block.inner(area);
  f.render_widget(block, area);

  let models = &app.session.models;
  if models.paths().is_empty() {
    f.render_widget(
      Paragraph::new("None configured.").style(Style::default().fg(Color::DarkGray)),
      inner,
    );
    return;
  }

  let mut lines: Vec<Line> = models
    .paths()
    .iter()
    .enumerate()
    .map(|(i, path)| {
      let marker = if i == models.selected_index() { "● " } else { "  " };
      let mut style = Style::default();
      if focused && i == app.model_cursor {
        style = style.fg(Color::Black).bg(Color::Cyan);
      } else if i == models.selected_index() {
        style = style.add_modifier(Modifier::BOLD);
      }
      Line::from(Span::styled(
        format!("{marker}{}", SemanticModels::display_name(path)),
        style,
      ))
    })
    .collect();

  lines.push(Line::from(""));
  lines.push(Line::from(Span::styled(
    "Switching clears the chat.",
    Style::default().fg(Color::DarkGray),
  )));

  f.render_widget(Paragraph::new(lines), inner);
}

//! Feedback popup for one analyst answer.

use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use crate::app::FeedbackForm;

pub fn draw(f: &mut Frame, area: Rect, form: &FeedbackForm) {
  let popup = centered(area, 60, 8);
  f.render_widget(Clear, popup);

  let block = Block::default()
    .title(" Feedback ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Cyan));

  let choice = |label: &'static str, on: bool| {
    let style = if on {
      Style::default()
        .fg(Color::Black)
        .bg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
    } else {
      Style::default().fg(Color::DarkGray)
    };
    Span::styled(format!(" {label} "), style)
  };

  let lines = vec![
    Line::from(vec![
      choice("👍", form.positive),
      Span::raw("  "),
      choice("👎", !form.positive),
    ]),
    Line::from(""),
    Line::from(Span::styled(
      "Optional message:",
      Style::default().fg(Color::DarkGray),
    )),
    Line::from(format!("{}▏", form.message)),
    Line::from(Span::styled(
      format!("request {}", form.request_id),
      Style::default().fg(Color::DarkGray),
    )),
  ];
  f.render_widget(
    Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
    popup,
  );
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
  let width = width.min(area.width);
  let height = height.min(area.height);
  Rect {
    x: area.x + (area.width - width) / 2,
    y: area.y + (area.height - height) / 2,
    width,
    height,
  }
}

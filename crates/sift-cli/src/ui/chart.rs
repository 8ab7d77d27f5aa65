//! Chart pane — plots the focused SQL answer.

use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Style},
  symbols,
  text::Line,
  widgets::{Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Dataset, GraphType, Paragraph},
};
use sift_core::{
  chart::{ChartKey, ChartKind, ChartSelection},
  render::{BlockView, ChartView, ResultsView},
};

use crate::app::App;

/// Bars are drawn on an integer scale of this height.
const BAR_SCALE: f64 = 1000.0;

/// A chart picked for display.
pub struct Shown<'a> {
  pub key:       ChartKey,
  pub selection: &'a ChartSelection,
  pub series:    &'a [(String, f64)],
}

/// The chart under the focused control, else the first chart of the focused
/// action's turn, else the most recent chart.
pub fn selected(app: &App) -> Option<Shown<'_>> {
  let charts = app.views.iter().flat_map(|view| {
    view.blocks.iter().filter_map(move |block| match block {
      BlockView::Sql(sql) => match &sql.results {
        ResultsView::Table {
          chart: ChartView::Ready {
            key,
            selection,
            series,
            ..
          },
          ..
        } => Some(Shown {
          key: *key,
          selection,
          series,
        }),
        _ => None,
      },
      _ => None,
    })
  });

  let Some(action) = app.focused_action() else {
    return charts.last();
  };
  let turn = action.turn();
  let exact = action.chart();

  let mut same_turn = None;
  let mut last = None;
  for shown in charts {
    if exact == Some(shown.key) {
      return Some(shown);
    }
    if shown.key.turn == turn && same_turn.is_none() {
      same_turn = Some(shown);
    } else {
      last = Some(shown);
    }
  }
  same_turn.or(last)
}

pub fn draw(f: &mut Frame, area: Rect, shown: &Shown<'_>) {
  let block = Block::default()
    .title(format!(" {} · {} by {} ", shown.selection.kind, shown.selection.y, shown.selection.x))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  if shown.series.is_empty() {
    f.render_widget(
      Paragraph::new(format!("No numeric values in {}.", shown.selection.y))
        .style(Style::default().fg(Color::DarkGray))
        .block(block),
      area,
    );
    return;
  }

  match shown.selection.kind {
    ChartKind::Line => draw_line(f, area, block, shown),
    ChartKind::Bar => draw_bar(f, area, block, shown),
  }
}

fn draw_line(f: &mut Frame, area: Rect, block: Block<'_>, shown: &Shown<'_>) {
  let points: Vec<(f64, f64)> = shown
    .series
    .iter()
    .enumerate()
    .map(|(i, (_, y))| (i as f64, *y))
    .collect();
  let (lo, hi) = y_bounds(shown.series);
  let last = shown.series.len().saturating_sub(1);

  let x_labels: Vec<Line> = [0, last / 2, last]
    .into_iter()
    .map(|i| Line::from(shown.series[i].0.clone()))
    .collect();
  let y_labels: Vec<Line> = [lo, (lo + hi) / 2.0, hi]
    .into_iter()
    .map(|v| Line::from(format!("{v:.1}")))
    .collect();

  let dataset = Dataset::default()
    .name(shown.selection.y.clone())
    .marker(symbols::Marker::Braille)
    .graph_type(GraphType::Line)
    .style(Style::default().fg(Color::Cyan))
    .data(&points);

  let chart = Chart::new(vec![dataset])
    .block(block)
    .x_axis(
      Axis::default()
        .title(shown.selection.x.clone())
        .style(Style::default().fg(Color::DarkGray))
        .bounds([0.0, last.max(1) as f64])
        .labels(x_labels),
    )
    .y_axis(
      Axis::default()
        .style(Style::default().fg(Color::DarkGray))
        .bounds([lo, hi])
        .labels(y_labels),
    );
  f.render_widget(chart, area);
}

fn draw_bar(f: &mut Frame, area: Rect, block: Block<'_>, shown: &Shown<'_>) {
  let max = shown
    .series
    .iter()
    .map(|(_, y)| y.abs())
    .fold(0.0_f64, f64::max);
  let bars: Vec<Bar> = shown
    .series
    .iter()
    .map(|(label, y)| {
      let scaled = if max > 0.0 { (y.max(0.0) / max * BAR_SCALE).round() } else { 0.0 };
      Bar::default()
        .value(scaled as u64)
        .text_value(format!("{y}"))
        .label(Line::from(label.clone()))
    })
    .collect();

  let chart = BarChart::default()
    .block(block)
    .bar_width(5)
    .bar_gap(1)
    .bar_style(Style::default().fg(Color::Cyan))
    .data(BarGroup::default().bars(&bars));
  f.render_widget(chart, area);
}

/// Y axis range with a little headroom; never empty.
fn y_bounds(series: &[(String, f64)]) -> (f64, f64) {
  let lo = series.iter().map(|(_, y)| *y).fold(f64::INFINITY, f64::min);
  let hi = series.iter().map(|(_, y)| *y).fold(f64::NEG_INFINITY, f64::max);
  if lo == hi {
    return (lo - 1.0, hi + 1.0);
  }
  let pad = (hi - lo) * 0.05;
  (lo - pad, hi + pad)
}

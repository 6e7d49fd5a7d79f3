use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, BorderType, Borders, Chart, Dataset, GraphType},
    Frame,
};

use crate::expr::format_number;
use crate::types::PlotPoint;

const LINE: Color = Color::Rgb(129, 140, 248); // indigo
const HOVER: Color = Color::Rgb(234, 208, 148);
const GRID: Color = Color::Rgb(45, 50, 60);
const AXIS: Color = Color::Rgb(105, 116, 133);
const BORDER: Color = Color::Rgb(45, 50, 60);

/// Number of grid divisions per axis
const GRID_DIVISIONS: usize = 4;
/// Samples along each grid line
const GRID_SAMPLES: usize = 48;

/// Precomputed line chart for a sequence of points.
pub struct PlotView {
    data: Vec<(f64, f64)>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
    grid: Vec<Vec<(f64, f64)>>,
}

impl PlotView {
    /// `None` for an empty sequence: there is nothing to draw.
    pub fn new(points: &[PlotPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let data: Vec<(f64, f64)> = points.iter().map(|p| (p.x, p.y)).collect();
        let x_bounds = padded_bounds(data.iter().map(|(x, _)| *x), 0.0);
        let y_bounds = padded_bounds(data.iter().map(|(_, y)| *y), 0.05);
        let grid = grid_lines(x_bounds, y_bounds);
        Some(Self { data, x_bounds, y_bounds, grid })
    }

    /// Text for the hovered point, e.g. `x = 2, y = 4`.
    pub fn tooltip(&self, hovered: Option<usize>) -> Option<String> {
        let (x, y) = self.data.get(hovered?)?;
        Some(format!("x = {}, y = {}", short(*x), short(*y)))
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, label: &str, hovered: Option<usize>) {
        let mut datasets: Vec<Dataset> = self
            .grid
            .iter()
            .map(|line| {
                Dataset::default()
                    .marker(Marker::Dot)
                    .graph_type(GraphType::Scatter)
                    .style(Style::default().fg(GRID))
                    .data(line)
            })
            .collect();

        datasets.push(
            Dataset::default()
                .name(label.to_string())
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(LINE))
                .data(&self.data),
        );

        let hovered_point = hovered.and_then(|i| self.data.get(i)).map(std::slice::from_ref);
        if let Some(point) = hovered_point {
            datasets.push(
                Dataset::default()
                    .marker(Marker::Block)
                    .graph_type(GraphType::Scatter)
                    .style(Style::default().fg(HOVER))
                    .data(point),
            );
        }

        let mut block = Block::default()
            .title(Span::styled(
                format!(" {} ", label),
                Style::default().fg(AXIS).add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(BORDER));
        if let Some(tip) = self.tooltip(hovered) {
            block = block.title_bottom(
                Line::from(Span::styled(format!(" {} ", tip), Style::default().fg(HOVER)))
                    .alignment(Alignment::Right),
            );
        }

        let chart = Chart::new(datasets)
            .block(block)
            .x_axis(
                Axis::default()
                    .style(Style::default().fg(AXIS))
                    .bounds(self.x_bounds)
                    .labels(axis_labels(self.x_bounds)),
            )
            .y_axis(
                Axis::default()
                    .style(Style::default().fg(AXIS))
                    .bounds(self.y_bounds)
                    .labels(axis_labels(self.y_bounds)),
            );

        frame.render_widget(chart, area);
    }
}

/// Min/max with a relative margin. A flat range is widened by one unit
/// each side so a single point still lands inside the chart.
fn padded_bounds(values: impl Iterator<Item = f64>, margin: f64) -> [f64; 2] {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

    if !lo.is_finite() || !hi.is_finite() {
        return [-1.0, 1.0];
    }
    if hi - lo == 0.0 {
        return [lo - 1.0, hi + 1.0];
    }
    let pad = (hi - lo) * margin;
    [lo - pad, hi + pad]
}

fn grid_lines(x: [f64; 2], y: [f64; 2]) -> Vec<Vec<(f64, f64)>> {
    let step = |b: [f64; 2], n: usize| b[0] + (b[1] - b[0]) * n as f64 / GRID_DIVISIONS as f64;
    let sample = |b: [f64; 2], n: usize| b[0] + (b[1] - b[0]) * n as f64 / GRID_SAMPLES as f64;

    let mut lines = Vec::new();
    for i in 1..GRID_DIVISIONS {
        let gx = step(x, i);
        lines.push((0..=GRID_SAMPLES).map(|s| (gx, sample(y, s))).collect());
        let gy = step(y, i);
        lines.push((0..=GRID_SAMPLES).map(|s| (sample(x, s), gy)).collect());
    }
    lines
}

fn axis_labels(bounds: [f64; 2]) -> Vec<Line<'static>> {
    let mid = (bounds[0] + bounds[1]) / 2.0;
    [bounds[0], mid, bounds[1]]
        .into_iter()
        .map(|v| Line::from(Span::styled(short(v), Style::default().fg(AXIS))))
        .collect()
}

/// Compact tick text: at most two decimals, no trailing zeros.
fn short(v: f64) -> String {
    format_number((v * 100.0).round() / 100.0)
}

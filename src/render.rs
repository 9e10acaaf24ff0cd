// Serverside chart rendering to a self-contained SVG. Line charts carry
// point markers, area charts fill to the zero baseline, bar widths scale
// with point spacing. Gaps in the data split the drawing instead of
// being interpolated over.

use chrono::{Duration, NaiveDate};

use crate::error::RenderError;
use crate::puzzles::{ChartType, Puzzle};

const WIDTH: f64 = 1000.0;
const HEIGHT: f64 = 500.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 25.0;
const MARGIN_TOP: f64 = 45.0;
const MARGIN_BOTTOM: f64 = 65.0;
const PLOT_W: f64 = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
const PLOT_H: f64 = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
const PLOT_BOTTOM: f64 = HEIGHT - MARGIN_BOTTOM;

const SERIES_COLOR: &str = "#1f77b4";
const AXIS_COLOR: &str = "#888888";
const X_TICKS: usize = 6;
const Y_TICKS: usize = 5;

/// Maps dates and values into pixel space.
struct Frame {
    x_min: NaiveDate,
    x_max: NaiveDate,
    span_days: f64,
    y_min: f64,
    y_max: f64,
}

impl Frame {
    fn fit(puzzle: &Puzzle, finite: &[f64]) -> Self {
        let mut x_min = puzzle.series[0].date;
        let mut x_max = x_min;
        for ob in &puzzle.series {
            if ob.date < x_min {
                x_min = ob.date;
            }
            if ob.date > x_max {
                x_max = ob.date;
            }
        }
        let span_days = ((x_max - x_min).num_days() as f64).max(1.0);

        let (y_min, mut y_max) = match puzzle.y_limits {
            Some(limits) => limits,
            None => {
                let lo = finite.iter().fold(f64::INFINITY, |a, &b| a.min(b));
                let hi = finite.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
                let pad = if hi > lo {
                    (hi - lo) * 0.05
                } else {
                    hi.abs().max(1.0) * 0.05
                };
                (lo - pad, hi + pad)
            }
        };
        // A flat or inverted range still needs a drawable scale.
        if !(y_max > y_min) {
            y_max = y_min + 1.0;
        }

        Self {
            x_min,
            x_max,
            span_days,
            y_min,
            y_max,
        }
    }

    fn x(&self, date: NaiveDate) -> f64 {
        MARGIN_LEFT + (date - self.x_min).num_days() as f64 / self.span_days * PLOT_W
    }

    fn y(&self, value: f64) -> f64 {
        MARGIN_TOP + (self.y_max - value) / (self.y_max - self.y_min) * PLOT_H
    }
}

/// Render a puzzle chart. The output deliberately shows only the curve,
/// the axes and the series title; the answer never appears in it.
pub fn render_svg(puzzle: &Puzzle) -> Result<String, RenderError> {
    if puzzle.series.is_empty() {
        return Err(RenderError::EmptySeries);
    }
    let finite: Vec<f64> = puzzle
        .series
        .iter()
        .map(|ob| ob.value)
        .filter(|v| v.is_finite())
        .collect();
    if finite.is_empty() {
        return Err(RenderError::NoPlottableValues);
    }

    let frame = Frame::fit(puzzle, &finite);
    let points: Vec<(f64, Option<f64>)> = puzzle
        .series
        .iter()
        .map(|ob| {
            let x = frame.x(ob.date);
            let y = ob.value.is_finite().then(|| frame.y(ob.value));
            (x, y)
        })
        .collect();
    let base_y = frame.y(0f64.clamp(frame.y_min, frame.y_max));

    let mut svg = String::with_capacity(16 * 1024);
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{WIDTH}\" height=\"{HEIGHT}\" \
         viewBox=\"0 0 {WIDTH} {HEIGHT}\" font-family=\"Helvetica, Arial, sans-serif\">\n"
    ));
    svg.push_str(&format!(
        "<rect width=\"{WIDTH}\" height=\"{HEIGHT}\" fill=\"#ffffff\"/>\n"
    ));
    svg.push_str(&format!(
        "<defs><clipPath id=\"plot-area\"><rect x=\"{MARGIN_LEFT}\" y=\"{MARGIN_TOP}\" \
         width=\"{PLOT_W}\" height=\"{PLOT_H}\"/></clipPath></defs>\n"
    ));

    draw_y_axis(&mut svg, &frame);
    draw_x_axis(&mut svg, &frame);
    svg.push_str(&format!(
        "<rect x=\"{MARGIN_LEFT}\" y=\"{MARGIN_TOP}\" width=\"{PLOT_W}\" height=\"{PLOT_H}\" \
         fill=\"none\" stroke=\"{AXIS_COLOR}\"/>\n"
    ));

    svg.push_str("<g clip-path=\"url(#plot-area)\">\n");
    match puzzle.chart_type {
        ChartType::Line => draw_line(&mut svg, &points),
        ChartType::Area => draw_area(&mut svg, &points, base_y),
        ChartType::Bar => {
            let bar_width = (PLOT_W / puzzle.series.len() as f64 * 0.8).max(1.0);
            draw_bars(&mut svg, &points, base_y, bar_width);
        }
    }
    svg.push_str("</g>\n");

    let mid_x = MARGIN_LEFT + PLOT_W / 2.0;
    let mid_y = MARGIN_TOP + PLOT_H / 2.0;
    svg.push_str(&format!(
        "<text x=\"{mid_x:.1}\" y=\"{ty:.1}\" font-size=\"13\" text-anchor=\"middle\">Date</text>\n",
        ty = HEIGHT - 12.0
    ));
    svg.push_str(&format!(
        "<text x=\"18\" y=\"{mid_y:.1}\" font-size=\"13\" text-anchor=\"middle\" \
         transform=\"rotate(-90 18 {mid_y:.1})\">{}</text>\n",
        escape_text(&puzzle.y_label)
    ));
    svg.push_str(&format!(
        "<text x=\"{cx:.1}\" y=\"28\" font-size=\"16\" text-anchor=\"middle\">{}</text>\n",
        escape_text(&puzzle.title),
        cx = WIDTH / 2.0
    ));
    svg.push_str("</svg>\n");
    Ok(svg)
}

fn draw_y_axis(svg: &mut String, frame: &Frame) {
    for i in 0..Y_TICKS {
        let t = i as f64 / (Y_TICKS - 1) as f64;
        let value = frame.y_max - (frame.y_max - frame.y_min) * t;
        let y = frame.y(value);
        svg.push_str(&format!(
            "<line x1=\"{x1:.1}\" y1=\"{y:.1}\" x2=\"{MARGIN_LEFT}\" y2=\"{y:.1}\" \
             stroke=\"{AXIS_COLOR}\"/>\n",
            x1 = MARGIN_LEFT - 5.0
        ));
        svg.push_str(&format!(
            "<text x=\"{tx:.1}\" y=\"{ty:.1}\" font-size=\"11\" text-anchor=\"end\">{}</text>\n",
            format_tick(value),
            tx = MARGIN_LEFT - 9.0,
            ty = y + 4.0
        ));
    }
}

fn draw_x_axis(svg: &mut String, frame: &Frame) {
    let raw_span = (frame.x_max - frame.x_min).num_days();
    let mut last_label = String::new();
    for i in 0..X_TICKS {
        let offset = raw_span * i as i64 / (X_TICKS as i64 - 1);
        let date = frame.x_min + Duration::days(offset);
        let x = frame.x(date);
        svg.push_str(&format!(
            "<line x1=\"{x:.1}\" y1=\"{PLOT_BOTTOM}\" x2=\"{x:.1}\" y2=\"{y2:.1}\" \
             stroke=\"{AXIS_COLOR}\"/>\n",
            y2 = PLOT_BOTTOM + 5.0
        ));
        // Short ranges repeat the same month; label it once.
        let label = date.format("%Y-%m").to_string();
        if label != last_label {
            svg.push_str(&format!(
                "<text x=\"{x:.1}\" y=\"{ty:.1}\" font-size=\"11\" text-anchor=\"middle\">{label}</text>\n",
                ty = PLOT_BOTTOM + 20.0
            ));
            last_label = label;
        }
    }
}

/// Contiguous finite stretches; a missing value ends the current one.
fn finite_runs(points: &[(f64, Option<f64>)]) -> Vec<Vec<(f64, f64)>> {
    let mut runs = Vec::new();
    let mut run: Vec<(f64, f64)> = Vec::new();
    for &(x, y) in points {
        match y {
            Some(y) => run.push((x, y)),
            None => {
                if !run.is_empty() {
                    runs.push(std::mem::take(&mut run));
                }
            }
        }
    }
    if !run.is_empty() {
        runs.push(run);
    }
    runs
}

fn polyline(svg: &mut String, run: &[(f64, f64)]) {
    if run.len() < 2 {
        return;
    }
    let pts: Vec<String> = run.iter().map(|(x, y)| format!("{x:.1},{y:.1}")).collect();
    svg.push_str(&format!(
        "<polyline class=\"series-line\" points=\"{}\" fill=\"none\" stroke=\"{SERIES_COLOR}\" \
         stroke-width=\"1.5\"/>\n",
        pts.join(" ")
    ));
}

fn draw_line(svg: &mut String, points: &[(f64, Option<f64>)]) {
    for run in finite_runs(points) {
        polyline(svg, &run);
    }
    // Markers keep isolated points visible.
    for &(x, y) in points {
        if let Some(y) = y {
            svg.push_str(&format!(
                "<circle class=\"marker\" cx=\"{x:.1}\" cy=\"{y:.1}\" r=\"3\" fill=\"{SERIES_COLOR}\"/>\n"
            ));
        }
    }
}

fn draw_area(svg: &mut String, points: &[(f64, Option<f64>)], base_y: f64) {
    for run in finite_runs(points) {
        if run.len() < 2 {
            continue;
        }
        let (first_x, _) = run[0];
        let (last_x, _) = run[run.len() - 1];
        let mut d = format!("M{first_x:.1},{base_y:.1}");
        for (x, y) in &run {
            d.push_str(&format!(" L{x:.1},{y:.1}"));
        }
        d.push_str(&format!(" L{last_x:.1},{base_y:.1} Z"));
        svg.push_str(&format!(
            "<path class=\"series-area\" d=\"{d}\" fill=\"{SERIES_COLOR}\" fill-opacity=\"0.4\"/>\n"
        ));
    }
    for run in finite_runs(points) {
        polyline(svg, &run);
    }
}

fn draw_bars(svg: &mut String, points: &[(f64, Option<f64>)], base_y: f64, bar_width: f64) {
    for &(x, y) in points {
        let Some(y) = y else { continue };
        let top = y.min(base_y);
        let height = (y - base_y).abs();
        svg.push_str(&format!(
            "<rect class=\"bar\" x=\"{bx:.1}\" y=\"{top:.1}\" width=\"{bar_width:.1}\" \
             height=\"{height:.1}\" fill=\"{SERIES_COLOR}\"/>\n",
            bx = x - bar_width / 2.0
        ));
    }
}

fn format_tick(value: f64) -> String {
    if value.abs() >= 1000.0 {
        return format!("{value:.0}");
    }
    let text = format!("{value:.2}");
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        return "0".to_string();
    }
    trimmed.to_string()
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

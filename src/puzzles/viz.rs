// Default display hints per source. Metadata overrides always win.

use crate::puzzles::adapter::{ChartType, DataSource, PuzzleMeta};

#[derive(Debug, Clone)]
pub struct VizHints {
    pub chart_type: ChartType,
    pub y_label: String,
    pub y_limits: Option<(f64, f64)>,
}

fn default_hints(source: DataSource, meta: &PuzzleMeta) -> VizHints {
    match source {
        DataSource::GoogleTrends => VizHints {
            chart_type: ChartType::Line,
            y_label: "Search interest (0–100)".to_string(),
            y_limits: Some((0.0, 100.0)),
        },
        // Economic and macrohistory series label the axis with the
        // series title.
        DataSource::Fred | DataSource::Nber => VizHints {
            chart_type: ChartType::Line,
            y_label: if meta.title.is_empty() {
                "Value".to_string()
            } else {
                meta.title.clone()
            },
            y_limits: None,
        },
    }
}

/// Resolve the hints for a puzzle: source defaults, then any metadata
/// overrides on top.
pub fn viz_hints(source: DataSource, meta: &PuzzleMeta) -> VizHints {
    let mut hints = default_hints(source, meta);
    if let Some(chart_type) = meta.chart_type {
        hints.chart_type = chart_type;
    }
    if let Some(ref y_label) = meta.y_label {
        hints.y_label = y_label.clone();
    }
    if let Some(y_limits) = meta.y_limits {
        hints.y_limits = Some(y_limits);
    }
    hints
}

//! SVG Chart Generator for training curves
//!
//! Writes the training vs validation accuracy and loss curves as standalone
//! SVG files.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::training::history::TrainingHistory;
use crate::utils::error::Result;

const CHART_WIDTH: f64 = 800.0;
const CHART_HEIGHT: f64 = 500.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_RIGHT: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 80.0;
const MARGIN_LEFT: f64 = 80.0;

pub const COLOR_TRAIN: &str = "#3498db";
pub const COLOR_VALIDATION: &str = "#e74c3c";
const COLOR_GRID: &str = "#ecf0f1";
const COLOR_AXIS: &str = "#2c3e50";
const COLOR_TEXT: &str = "#2c3e50";

/// A data point for a line chart
#[derive(Debug, Clone)]
pub struct DataPoint {
    pub x: f64,
    pub y: f64,
}

/// A named, colored data series
#[derive(Debug, Clone)]
pub struct DataSeries {
    pub name: String,
    pub points: Vec<DataPoint>,
    pub color: String,
}

impl DataSeries {
    pub fn new(name: &str, color: &str, values: impl IntoIterator<Item = (f64, f64)>) -> Self {
        Self {
            name: name.to_string(),
            points: values.into_iter().map(|(x, y)| DataPoint { x, y }).collect(),
            color: color.to_string(),
        }
    }
}

/// Y axis layout of a chart
#[derive(Debug, Clone, Copy)]
pub enum YAxis {
    /// Fixed 0..100 with a `%` suffix on tick labels
    Percent,
    /// 0..max of the data, padded by 10%
    Auto,
}

/// Render a line chart as an SVG document
pub fn render_line_chart(title: &str, x_label: &str, y_label: &str, series: &[DataSeries], y_axis: YAxis) -> String {
    let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

    let (x_min, x_max, _, data_y_max) = find_ranges(series);
    let (x_min, x_max) = if x_max > x_min { (x_min, x_max) } else { (x_min, x_min + 1.0) };
    let y_min = 0.0;
    let (y_max, suffix) = match y_axis {
        YAxis::Percent => (100.0_f64.max(data_y_max), "%"),
        YAxis::Auto => ((data_y_max * 1.1).max(1e-6), ""),
    };

    let to_x = |x: f64| MARGIN_LEFT + ((x - x_min) / (x_max - x_min)) * plot_width;
    let to_y = |y: f64| MARGIN_TOP + plot_height - ((y - y_min) / (y_max - y_min)) * plot_height;

    let mut svg = String::new();

    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}">"#,
        w = CHART_WIDTH,
        h = CHART_HEIGHT
    );
    let _ = write!(svg, r#"<rect width="{}" height="{}" fill="white"/>"#, CHART_WIDTH, CHART_HEIGHT);
    let _ = write!(
        svg,
        r#"<text x="{}" y="35" text-anchor="middle" font-family="Arial, sans-serif" font-size="18" font-weight="bold" fill="{}">{}</text>"#,
        CHART_WIDTH / 2.0,
        COLOR_TEXT,
        escape_xml(title)
    );

    for i in 0..=5 {
        let value = y_min + (i as f64 / 5.0) * (y_max - y_min);
        let y = to_y(value);
        let _ = write!(
            svg,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="1"/>"#,
            MARGIN_LEFT,
            y,
            MARGIN_LEFT + plot_width,
            y,
            COLOR_GRID
        );
        let label = match y_axis {
            YAxis::Percent => format!("{:.0}{}", value, suffix),
            YAxis::Auto => format!("{:.2}", value),
        };
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="end" font-family="Arial, sans-serif" font-size="12" fill="{}">{}</text>"#,
            MARGIN_LEFT - 10.0,
            y + 4.0,
            COLOR_TEXT,
            label
        );
    }

    // Axes
    let _ = write!(
        svg,
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        MARGIN_LEFT,
        MARGIN_TOP + plot_height,
        MARGIN_LEFT + plot_width,
        MARGIN_TOP + plot_height,
        COLOR_AXIS
    );
    let _ = write!(
        svg,
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        MARGIN_LEFT,
        MARGIN_TOP,
        MARGIN_LEFT,
        MARGIN_TOP + plot_height,
        COLOR_AXIS
    );

    let _ = write!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}">{}</text>"#,
        MARGIN_LEFT + plot_width / 2.0,
        CHART_HEIGHT - 20.0,
        COLOR_TEXT,
        escape_xml(x_label)
    );
    let _ = write!(
        svg,
        r#"<text x="20" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}" transform="rotate(-90 20 {})">{}</text>"#,
        CHART_HEIGHT / 2.0,
        COLOR_TEXT,
        CHART_HEIGHT / 2.0,
        escape_xml(y_label)
    );

    for series_data in series.iter().filter(|s| !s.points.is_empty()) {
        let path: Vec<String> = series_data
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{} {:.2} {:.2}", if i == 0 { "M" } else { "L" }, to_x(p.x), to_y(p.y)))
            .collect();

        let _ = write!(
            svg,
            r#"<path d="{}" fill="none" stroke="{}" stroke-width="3"/>"#,
            path.join(" "),
            series_data.color
        );

        for point in &series_data.points {
            let _ = write!(
                svg,
                r#"<circle cx="{:.2}" cy="{:.2}" r="4" fill="{}" stroke="white" stroke-width="2"/>"#,
                to_x(point.x),
                to_y(point.y),
                series_data.color
            );
        }
    }

    // X tick labels from the first series
    if let Some(first) = series.first() {
        for point in &first.points {
            let _ = write!(
                svg,
                r#"<text x="{:.2}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="11" fill="{}">{:.0}</text>"#,
                to_x(point.x),
                MARGIN_TOP + plot_height + 20.0,
                COLOR_TEXT,
                point.x
            );
        }
    }

    let mut legend_y = MARGIN_TOP + 10.0;
    for series_data in series {
        let _ = write!(
            svg,
            r#"<rect x="{}" y="{}" width="15" height="15" fill="{}"/>"#,
            CHART_WIDTH - MARGIN_RIGHT - 170.0,
            legend_y,
            series_data.color
        );
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" font-family="Arial, sans-serif" font-size="12" fill="{}">{}</text>"#,
            CHART_WIDTH - MARGIN_RIGHT - 150.0,
            legend_y + 12.0,
            COLOR_TEXT,
            escape_xml(&series_data.name)
        );
        legend_y += 25.0;
    }

    svg.push_str("</svg>");
    svg
}

/// Write `accuracy.svg` and `loss.svg` for a training history into `dir`
pub fn write_history_charts(history: &TrainingHistory, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;

    let epochs = || history.epochs.iter();
    let accuracy = [
        DataSeries::new(
            "Training Accuracy",
            COLOR_TRAIN,
            epochs().map(|e| (e.epoch as f64, e.train_accuracy * 100.0)),
        ),
        DataSeries::new(
            "Validation Accuracy",
            COLOR_VALIDATION,
            epochs().map(|e| (e.epoch as f64, e.val_accuracy * 100.0)),
        ),
    ];
    let loss = [
        DataSeries::new("Training loss", COLOR_TRAIN, epochs().map(|e| (e.epoch as f64, e.train_loss))),
        DataSeries::new("Validation loss", COLOR_VALIDATION, epochs().map(|e| (e.epoch as f64, e.val_loss))),
    ];

    fs::write(
        dir.join("accuracy.svg"),
        render_line_chart("Training and Validation accuracy", "Epoch", "Accuracy", &accuracy, YAxis::Percent),
    )?;
    fs::write(
        dir.join("loss.svg"),
        render_line_chart("Training and Validation loss", "Epoch", "Loss", &loss, YAxis::Auto),
    )?;

    tracing::info!("Wrote accuracy/loss charts to {:?}", dir);
    Ok(())
}

fn find_ranges(series: &[DataSeries]) -> (f64, f64, f64, f64) {
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;

    for p in series.iter().flat_map(|s| s.points.iter()) {
        x_min = x_min.min(p.x);
        x_max = x_max.max(p.x);
        y_min = y_min.min(p.y);
        y_max = y_max.max(p.y);
    }

    if x_min > x_max {
        return (0.0, 1.0, 0.0, 1.0);
    }

    (x_min, x_max, y_min, y_max)
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

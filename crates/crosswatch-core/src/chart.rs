//! Two-panel SVG chart attached to email alerts.
//!
//! Upper panel: close price, fast and slow EMA, with markers on every bar
//! where a cross occurred. Lower panel: RSI with 70/30 guide lines and a
//! marker on every bar outside that band.
//!
//! Legends are drawn by hand with a box sized from the label lengths. The
//! SVG backend has no font metrics, so plotters' own legend box would not
//! fit its text.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use thiserror::Error;
use time::macros::format_description;
use tracing::{debug, warn};

use crate::indicators::IndicatorRow;
use crate::signal::{detect_cross, CrossoverKind};
use crate::{Symbol, UtcDateTime};

const WIDTH: u32 = 1400;
const HEIGHT: u32 = 1000;
const UPPER_PANEL_HEIGHT: u32 = 740;
const OVERBOUGHT: f64 = 70.0;
const OVERSOLD: f64 = 30.0;

const LEGEND_FONT_SIZE: u32 = 14;
const LEGEND_ROW_HEIGHT: i32 = 20;
const LEGEND_SWATCH_WIDTH: i32 = 28;
const LEGEND_PADDING: i32 = 8;
// Average advance of a 14px sans-serif glyph.
const LEGEND_CHAR_WIDTH: i32 = 8;
const PRICE_LEGEND_ORIGIN: (i32, i32) = (104, 64);
const MOMENTUM_LEGEND_ORIGIN: (i32, i32) = (104, 52);

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("nothing to plot: {0}")]
    Empty(&'static str),

    #[error("chart rendering failed: {0}")]
    Render(String),

    #[error("chart file {} error: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub trait ChartRenderer: Send + Sync {
    /// Renders `rows` to a new file and returns its path.
    fn render(
        &self,
        rows: &[IndicatorRow],
        symbol: &Symbol,
        fast_period: usize,
        slow_period: usize,
    ) -> Result<PathBuf, ChartError>;

    /// Removes a rendered file. A file that is already gone is not an error.
    fn delete(&self, path: &Path) -> Result<(), ChartError>;
}

#[derive(Debug, Clone)]
pub struct SvgChartRenderer {
    output_dir: PathBuf,
}

impl SvgChartRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn file_path(&self, symbol: &Symbol) -> PathBuf {
        let stamp = UtcDateTime::now()
            .into_inner()
            .format(format_description!("[year][month][day]_[hour][minute][second]"))
            .unwrap_or_else(|_| String::from("undated"));
        self.output_dir
            .join(format!("{}_{stamp}.svg", symbol.file_stem()))
    }
}

impl ChartRenderer for SvgChartRenderer {
    fn render(
        &self,
        rows: &[IndicatorRow],
        symbol: &Symbol,
        fast_period: usize,
        slow_period: usize,
    ) -> Result<PathBuf, ChartError> {
        if rows.is_empty() {
            return Err(ChartError::Empty("no indicator rows"));
        }

        fs::create_dir_all(&self.output_dir).map_err(|source| ChartError::Io {
            path: self.output_dir.clone(),
            source,
        })?;

        let path = self.file_path(symbol);
        draw(&path, rows, symbol, fast_period, slow_period)?;
        debug!(path = %path.display(), rows = rows.len(), "chart rendered");
        Ok(path)
    }

    fn delete(&self, path: &Path) -> Result<(), ChartError> {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "chart deleted");
                Ok(())
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "chart file already absent, nothing to delete");
                Ok(())
            }
            Err(source) => Err(ChartError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

fn render_error(error: impl std::fmt::Display) -> ChartError {
    ChartError::Render(error.to_string())
}

fn draw(
    path: &Path,
    rows: &[IndicatorRow],
    symbol: &Symbol,
    fast_period: usize,
    slow_period: usize,
) -> Result<(), ChartError> {
    let root = SVGBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(render_error)?;
    let (upper, lower) = root.split_vertically(UPPER_PANEL_HEIGHT);

    let x_max = (rows.len().saturating_sub(1)).max(1) as f64;
    let x_label = |x: &f64| -> String {
        rows.get(x.round() as usize)
            .map(|row| date_label(row.ts()))
            .unwrap_or_default()
    };

    let (y_min, y_max) = price_bounds(rows);
    let mut price = ChartBuilder::on(&upper)
        .caption(format!("Price and EMAs with alerts - {symbol}"), ("sans-serif", 24))
        .margin(12)
        .x_label_area_size(32)
        .y_label_area_size(80)
        .build_cartesian_2d(0f64..x_max, y_min..y_max)
        .map_err(render_error)?;
    price
        .configure_mesh()
        .x_labels(8)
        .x_label_formatter(&x_label)
        .y_desc("Price")
        .draw()
        .map_err(render_error)?;

    price
        .draw_series(LineSeries::new(
            rows.iter().enumerate().map(|(i, row)| (i as f64, row.close())),
            &BLUE,
        ))
        .map_err(render_error)?;

    let orange = RGBColor(255, 140, 0);
    for (color, column) in [(orange, Column::Fast), (GREEN, Column::Slow)] {
        price
            .draw_series(LineSeries::new(
                rows.iter()
                    .enumerate()
                    .filter_map(|(i, row)| column.value(row).map(|v| (i as f64, v))),
                &color,
            ))
            .map_err(render_error)?;
    }

    let crosses: Vec<(usize, CrossoverKind)> = rows
        .windows(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            detect_cross(&pair[0], &pair[1])
                .ok()
                .flatten()
                .map(|kind| (i + 1, kind))
        })
        .collect();

    price
        .draw_series(crosses.iter().filter(|(_, kind)| *kind == CrossoverKind::GoldenCross).map(
            |(i, _)| TriangleMarker::new((*i as f64, rows[*i].close()), 8, GREEN.filled()),
        ))
        .map_err(render_error)?;
    price
        .draw_series(crosses.iter().filter(|(_, kind)| *kind == CrossoverKind::DeathCross).map(
            |(i, _)| Cross::new((*i as f64, rows[*i].close()), 8, RED.stroke_width(2)),
        ))
        .map_err(render_error)?;

    draw_legend(
        &upper,
        PRICE_LEGEND_ORIGIN,
        &[
            LegendEntry::new("Close", Swatch::Line(BLUE)),
            LegendEntry::new(format!("EMA {fast_period}"), Swatch::Line(orange)),
            LegendEntry::new(format!("EMA {slow_period}"), Swatch::Line(GREEN)),
            LegendEntry::new("Buy (Golden Cross)", Swatch::Triangle(GREEN)),
            LegendEntry::new("Sell (Death Cross)", Swatch::Cross(RED)),
        ],
    )?;

    let mut momentum = ChartBuilder::on(&lower)
        .caption("Relative Strength Index (RSI)", ("sans-serif", 20))
        .margin(12)
        .x_label_area_size(32)
        .y_label_area_size(80)
        .build_cartesian_2d(0f64..x_max, 0f64..100f64)
        .map_err(render_error)?;
    momentum
        .configure_mesh()
        .x_labels(8)
        .x_label_formatter(&x_label)
        .y_desc("RSI")
        .draw()
        .map_err(render_error)?;

    let purple = RGBColor(128, 0, 128);
    momentum
        .draw_series(LineSeries::new(
            rows.iter()
                .enumerate()
                .filter_map(|(i, row)| row.momentum.map(|v| (i as f64, v))),
            &purple,
        ))
        .map_err(render_error)?;

    for (level, color) in [(OVERBOUGHT, RED), (OVERSOLD, GREEN)] {
        momentum
            .draw_series(LineSeries::new(vec![(0.0, level), (x_max, level)], &color))
            .map_err(render_error)?;
    }

    let (overbought, oversold) = momentum_extremes(rows);
    momentum
        .draw_series(
            overbought
                .iter()
                .map(|point| Cross::new(*point, 5, RED.stroke_width(2))),
        )
        .map_err(render_error)?;
    momentum
        .draw_series(
            oversold
                .iter()
                .map(|point| Circle::new(*point, 4, GREEN.filled())),
        )
        .map_err(render_error)?;

    draw_legend(
        &lower,
        MOMENTUM_LEGEND_ORIGIN,
        &[
            LegendEntry::new("RSI", Swatch::Line(purple)),
            LegendEntry::new("Overbought level (70)", Swatch::Line(RED)),
            LegendEntry::new("Oversold level (30)", Swatch::Line(GREEN)),
            LegendEntry::new("Overbought", Swatch::Cross(RED)),
            LegendEntry::new("Oversold", Swatch::Circle(GREEN)),
        ],
    )?;

    root.present().map_err(render_error)?;
    Ok(())
}

#[derive(Clone, Copy)]
enum Swatch {
    Line(RGBColor),
    Triangle(RGBColor),
    Cross(RGBColor),
    Circle(RGBColor),
}

struct LegendEntry {
    label: String,
    swatch: Swatch,
}

impl LegendEntry {
    fn new(label: impl Into<String>, swatch: Swatch) -> Self {
        Self {
            label: label.into(),
            swatch,
        }
    }
}

/// Pixel size of the legend box for `entries`.
fn legend_size(entries: &[LegendEntry]) -> (i32, i32) {
    let longest = entries
        .iter()
        .map(|entry| entry.label.chars().count())
        .max()
        .unwrap_or(0) as i32;
    let width = LEGEND_PADDING * 3 + LEGEND_SWATCH_WIDTH + longest * LEGEND_CHAR_WIDTH;
    let height = LEGEND_PADDING * 2 + LEGEND_ROW_HEIGHT * entries.len() as i32;
    (width, height)
}

fn draw_legend(
    area: &DrawingArea<SVGBackend<'_>, Shift>,
    origin: (i32, i32),
    entries: &[LegendEntry],
) -> Result<(), ChartError> {
    let (width, height) = legend_size(entries);
    let (x0, y0) = origin;
    let corner = (x0 + width, y0 + height);
    area.draw(&Rectangle::new([origin, corner], WHITE.mix(0.85).filled()))
        .map_err(render_error)?;
    area.draw(&Rectangle::new([origin, corner], BLACK.stroke_width(1)))
        .map_err(render_error)?;

    let font = ("sans-serif", LEGEND_FONT_SIZE)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Left, VPos::Center));
    let swatch_x = x0 + LEGEND_PADDING;
    for (row, entry) in entries.iter().enumerate() {
        let y = y0 + LEGEND_PADDING + LEGEND_ROW_HEIGHT * row as i32 + LEGEND_ROW_HEIGHT / 2;
        let centre = (swatch_x + LEGEND_SWATCH_WIDTH / 2, y);
        match entry.swatch {
            Swatch::Line(color) => area.draw(&PathElement::new(
                vec![(swatch_x, y), (swatch_x + LEGEND_SWATCH_WIDTH, y)],
                color.stroke_width(2),
            )),
            Swatch::Triangle(color) => area.draw(&TriangleMarker::new(centre, 6, color.filled())),
            Swatch::Cross(color) => area.draw(&Cross::new(centre, 5, color.stroke_width(2))),
            Swatch::Circle(color) => area.draw(&Circle::new(centre, 4, color.filled())),
        }
        .map_err(render_error)?;
        area.draw(&Text::new(
            entry.label.as_str(),
            (swatch_x + LEGEND_SWATCH_WIDTH + LEGEND_PADDING, y),
            font.clone(),
        ))
        .map_err(render_error)?;
    }
    Ok(())
}

/// Points where RSI is above the overbought or below the oversold level.
fn momentum_extremes(rows: &[IndicatorRow]) -> (Vec<(f64, f64)>, Vec<(f64, f64)>) {
    let points = rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| row.momentum.map(|v| (i as f64, v)));
    let overbought = points.clone().filter(|(_, v)| *v > OVERBOUGHT).collect();
    let oversold = points.filter(|(_, v)| *v < OVERSOLD).collect();
    (overbought, oversold)
}

#[derive(Clone, Copy)]
enum Column {
    Fast,
    Slow,
}

impl Column {
    fn value(self, row: &IndicatorRow) -> Option<f64> {
        match self {
            Self::Fast => row.fast_avg,
            Self::Slow => row.slow_avg,
        }
    }
}

fn price_bounds(rows: &[IndicatorRow]) -> (f64, f64) {
    let (low, high) = rows
        .iter()
        .flat_map(|row| [Some(row.close()), row.fast_avg, row.slow_avg])
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), v| {
            (low.min(v), high.max(v))
        });

    let pad = ((high - low) * 0.05).max(1.0);
    (low - pad, high + pad)
}

fn date_label(ts: UtcDateTime) -> String {
    ts.into_inner()
        .format(format_description!("[month]-[day] [hour]:[minute]"))
        .unwrap_or_default()
}

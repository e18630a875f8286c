//! Chart rendering for processed perflog data.
//!
//! [`render`] draws the rows selected by [`crate::processing`] as either a grouped bar chart ([`PlotType::Generic`])
//! or a line chart ([`PlotType::Line`]) and returns a standalone SVG document.

use crate::{
    config::{Axis, PlotConfig, PlotType},
    error::{Error, Result},
    filters::Filter,
    frame::{Column, DType, Frame, Value},
};

mod bar;
mod line;
mod svg;

pub use svg::viridis;

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 600.0;
const MARGIN_LEFT: f64 = 100.0;
const MARGIN_RIGHT: f64 = 200.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_BOTTOM: f64 = 130.0;
const TITLE_SIZE: f64 = 20.0;
const LABEL_SIZE: f64 = 13.0;
const TICK_SIZE: f64 = 11.0;
const TICK_COUNT: usize = 6;

const SMALL_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "but", "by", "en", "for", "if", "in", "of", "on", "or", "the",
    "to", "v", "via", "vs",
];

/// Draws the chart described by `config` for the selected rows in `frame`.
///
/// `series_filters` are the deduplicated series conditions of the configuration (see
/// [`crate::config::PlotPlan::series_filters`]).
///
/// # Errors
///
/// Returns [`Error::Plot`] if the data cannot be drawn, e.g. the y axis is not numeric or unit columns hold more than
/// one distinct unit.
pub fn render(config: &PlotConfig, series_filters: &[Filter], frame: &Frame) -> Result<String> {
    log::info!("drawing {:?} plot '{}'...", config.plot_type, config.title);
    match config.plot_type {
        PlotType::Generic => bar::render(config, series_filters, frame),
        PlotType::Line => line::render(config, series_filters, frame),
    }
}

/// File name stem for a plot title.
#[must_use]
pub fn file_stem(title: &str) -> String {
    title.replace(' ', "_")
}

/// Builds the label of an axis from its column name, scaling, and units.
///
/// # Errors
///
/// Returns [`Error::Plot`] if the units column does not hold exactly one distinct unit.
pub fn axis_label(
    frame: &Frame,
    axis: &Axis,
    series_filters: &[Filter],
    x_column: &str,
) -> Result<String> {
    let units = match (&axis.units.custom, axis.units_column()) {
        (Some(custom), _) => Some(custom.to_string()),
        (None, Some(column)) => {
            let column = require_column(frame, column)?;
            let unique = column.unique();
            if unique.len() != 1 {
                return Err(Error::Plot(format!(
                    "unexpected number of axis unit entries {:?}",
                    unique.iter().map(ToString::to_string).collect::<Vec<_>>()
                )));
            }
            Some(unique[0].to_string())
        }
        (None, None) => None,
    };

    let scaling = axis.scaling.as_ref().and_then(|scaling| {
        if let Some(column) = &scaling.column {
            let series = column
                .series
                .and_then(|i| series_filters.get(i))
                .map(ToString::to_string)
                .unwrap_or_default();
            let x = column.x_value.as_ref().map_or_else(String::new, |v| {
                format!("{x_column} == {v}{}", if series.is_empty() { "" } else { ", " })
            });
            let details = if x.is_empty() && series.is_empty() {
                String::new()
            } else {
                format!("\nfor {x}{series}")
            };
            Some(format!("Scaled by {}{details}", column.name))
        } else {
            scaling.custom.map(|custom| format!("Scaled by {custom}"))
        }
    });

    let mut label = titlecase(&axis.value.replace('_', " "));
    if axis.logarithmic {
        label.push_str(" [Log Scale]");
    }
    if let Some(scaling) = scaling {
        label.push('\n');
        label.push_str(&titlecase(&scaling.replace('_', " ")));
    }
    if let Some(units) = units {
        label.push_str(&format!("\n({units})"));
    }
    Ok(label)
}

/// Capitalises words the way plot labels are conventionally written.
///
/// The first word of every line is capitalised, as is every later word that is not a short preposition, article,
/// or conjunction. Words already containing capitals are left untouched.
#[must_use]
pub fn titlecase(text: &str) -> String {
    text.lines()
        .map(|line| {
            line.split(' ')
                .enumerate()
                .map(|(i, word)| {
                    let lower = word.to_lowercase();
                    if word != lower || (i > 0 && SMALL_WORDS.contains(&lower.as_str())) {
                        return word.to_string();
                    }
                    let mut chars = word.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars).collect(),
                        None => String::new(),
                    }
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn require_column<'a>(frame: &'a Frame, name: &str) -> Result<&'a Column> {
    frame
        .column(name)
        .ok_or_else(|| Error::Plot(format!("column '{name}' is not part of the plotted data")))
}

fn require_numeric<'a>(frame: &'a Frame, name: &str) -> Result<&'a Column> {
    let column = require_column(frame, name)?;
    if column.dtype.is_numeric() {
        Ok(column)
    } else {
        Err(Error::Plot(format!(
            "column '{name}' of type {} cannot be plotted on a numeric axis",
            column.dtype
        )))
    }
}

/// Position of a value along a continuous axis.
#[allow(clippy::cast_precision_loss)]
fn axis_position(value: &Value) -> Option<f64> {
    match value {
        Value::DateTime(d) => Some(d.and_utc().timestamp() as f64),
        other => other.as_f64(),
    }
}

/// Text of a tick at `position` on an axis of type `dtype`.
#[allow(clippy::cast_possible_truncation)]
fn tick_text(position: f64, dtype: DType) -> String {
    if dtype == DType::DateTime {
        return chrono::DateTime::from_timestamp(position.round() as i64, 0)
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
    }
    if position.fract() == 0.0 && position.abs() < 1e15 {
        format!("{position:.0}")
    } else {
        let text = format!("{position:.3}");
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Hover text of a plotted value.
fn value_text(value: f64, dtype: DType) -> String {
    if dtype == DType::Float {
        format!("{value:.2}")
    } else {
        format!("{value}")
    }
}

/// Maps data values onto pixel coordinates along one axis.
#[derive(Clone, Copy, Debug)]
struct Scale {
    min: f64,
    max: f64,
    start: f64,
    end: f64,
    log: bool,
}

impl Scale {
    fn new(range: (f64, f64), pixels: (f64, f64), log: bool) -> Self {
        Self {
            min: range.0,
            max: range.1,
            start: pixels.0,
            end: pixels.1,
            log,
        }
    }

    fn map(&self, value: f64) -> f64 {
        let (value, min, max) = if self.log {
            (value.log10(), self.min.log10(), self.max.log10())
        } else {
            (value, self.min, self.max)
        };
        let span = max - min;
        if span == 0.0 {
            return self.start;
        }
        self.start + (value - min) / span * (self.end - self.start)
    }

    /// Evenly spaced tick positions covering the range.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn ticks(&self) -> Vec<f64> {
        let (lo, hi) = if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        };
        if self.log {
            let first = lo.log10().ceil() as i32;
            let last = hi.log10().floor() as i32;
            return (first..=last).map(|e| 10f64.powi(e)).collect();
        }
        let step = nice_step((hi - lo) / TICK_COUNT as f64);
        if step <= 0.0 || !step.is_finite() {
            return vec![lo];
        }
        let mut ticks = Vec::new();
        let mut tick = (lo / step).ceil() * step;
        while tick <= hi + step * 1e-9 {
            ticks.push(if tick.abs() < step * 1e-9 { 0.0 } else { tick });
            tick += step;
        }
        ticks
    }
}

/// Rounds a raw tick step up to 1, 2, or 5 times a power of ten.
fn nice_step(raw: f64) -> f64 {
    if raw <= 0.0 || !raw.is_finite() {
        return 0.0;
    }
    let magnitude = 10f64.powf(raw.log10().floor());
    let normalized = raw / magnitude;
    let nice = if normalized <= 1.0 {
        1.0
    } else if normalized <= 2.0 {
        2.0
    } else if normalized <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

/// Value range of a numeric y axis.
///
/// Custom endpoints are used when the configuration disables the default range. Otherwise the range starts at zero
/// (or 20% below a negative minimum) and ends 20% above the maximum. Logarithmic axes span whole decades.
fn y_range(axis: &Axis, values: &[f64]) -> Result<(f64, f64)> {
    let (min, max) = min_max(values)
        .ok_or_else(|| Error::Plot(format!("no values to plot for '{}'", axis.value)))?;

    if axis.logarithmic {
        if min <= 0.0 {
            return Err(Error::Plot(format!(
                "cannot draw non-positive values of '{}' on a logarithmic axis",
                axis.value
            )));
        }
        let lo = axis.range.min.filter(|m| !axis.range.use_default && *m > 0.0);
        let hi = axis.range.max.filter(|m| !axis.range.use_default && *m > 0.0);
        let lowest_decade = min.log10().floor();
        let highest_decade = max.log10().ceil().max(lowest_decade + 1.0);
        return Ok((
            lo.unwrap_or_else(|| 10f64.powf(lowest_decade)),
            hi.unwrap_or_else(|| 10f64.powf(highest_decade)),
        ));
    }

    let mut lo = if min >= 0.0 { 0.0 } else { (min * 1.2).floor() };
    let mut hi = if max <= 0.0 { 0.0 } else { (max * 1.2).ceil() };
    if !axis.range.use_default {
        lo = axis.range.min.unwrap_or(lo);
        hi = axis.range.max.unwrap_or(hi);
    }
    if lo == hi {
        hi = lo + 1.0;
    }
    Ok((lo, hi))
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Draws the frame, ticks, axis labels, and title shared by both chart kinds.
fn draw_frame(
    svg: &mut svg::Svg,
    title: &str,
    x_label: &str,
    y_label: &str,
    y: &Scale,
    y_dtype: DType,
) {
    let left = MARGIN_LEFT;
    let right = WIDTH - MARGIN_RIGHT;
    let top = MARGIN_TOP;
    let bottom = HEIGHT - MARGIN_BOTTOM;

    let title_at = (WIDTH / 2.0, top / 2.0 + TITLE_SIZE / 2.0);
    svg.text(title_at, title, TITLE_SIZE, svg::Anchor::Middle, None);

    for tick in y.ticks() {
        let py = y.map(tick);
        svg.line((left, py), (right, py), "#e5e5e5", 1.0);
        svg.line((left - 5.0, py), (left, py), "#444444", 1.0);
        svg.text(
            (left - 8.0, py + TICK_SIZE / 3.0),
            &tick_text(tick, y_dtype),
            TICK_SIZE,
            svg::Anchor::End,
            None,
        );
    }
    svg.line((left, top), (left, bottom), "#444444", 1.0);
    svg.line((left, bottom), (right, bottom), "#444444", 1.0);

    svg.text(
        ((left + right) / 2.0, HEIGHT - MARGIN_BOTTOM / 2.0 + 5.0),
        x_label,
        LABEL_SIZE,
        svg::Anchor::Middle,
        None,
    );
    let y_label_at = (left - 70.0, (top + bottom) / 2.0);
    svg.text(y_label_at, y_label, LABEL_SIZE, svg::Anchor::Middle, Some(-90.0));
}

/// Draws a legend of coloured swatches to the right of the plot area.
fn draw_legend(svg: &mut svg::Svg, items: &[(String, String)]) {
    let x = WIDTH - MARGIN_RIGHT + 20.0;
    let mut y = MARGIN_TOP + 10.0;
    for (label, colour) in items {
        svg.rect(x, y - 10.0, 14.0, 14.0, colour, None);
        svg.text((x + 20.0, y + 2.0), label, LABEL_SIZE - 1.0, svg::Anchor::Start, None);
        y += 22.0;
    }
}

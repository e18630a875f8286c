//! Line charts, one line per series.

use super::{
    axis_label, axis_position, draw_frame, draw_legend, min_max, require_column, require_numeric,
    svg, tick_text, titlecase, value_text, Scale, HEIGHT, MARGIN_BOTTOM, MARGIN_LEFT, MARGIN_RIGHT,
    MARGIN_TOP, TICK_SIZE, WIDTH,
};
use crate::{
    config::{Axis, LabelOrientation, PlotConfig},
    error::{Error, Result},
    filters::{row_filter, Filter},
    frame::{DType, Frame},
};

const SECONDS_PER_DAY: f64 = 86_400.0;

pub(super) fn render(
    config: &PlotConfig,
    series_filters: &[Filter],
    frame: &Frame,
) -> Result<String> {
    let x_column = require_column(frame, &config.x_axis.value)?;
    if !(x_column.dtype.is_numeric() || x_column.dtype == DType::DateTime) {
        return Err(Error::Plot(format!(
            "line plots need a numeric or datetime x-axis, '{}' is {}",
            x_column.name, x_column.dtype
        )));
    }
    let y_column = require_numeric(frame, &config.y_axis.value)?;

    let mut lines: Vec<(&Filter, Vec<(f64, f64)>)> = Vec::with_capacity(series_filters.len());
    for filter in series_filters {
        let mask = row_filter(frame, filter)?;
        let mut points: Vec<(f64, f64)> = mask
            .iter()
            .enumerate()
            .filter(|(_, keep)| **keep)
            .filter_map(|(row, _)| {
                Some((
                    axis_position(&x_column.values[row])?,
                    y_column.values[row].as_f64()?,
                ))
            })
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        lines.push((filter, points));
    }

    let xs: Vec<f64> = lines.iter().flat_map(|(_, p)| p.iter().map(|(x, _)| *x)).collect();
    let ys: Vec<f64> = lines.iter().flat_map(|(_, p)| p.iter().map(|(_, y)| *y)).collect();
    if ys.is_empty() {
        return Err(Error::Plot(format!(
            "no non-null values of '{}' to draw",
            config.y_axis.value
        )));
    }

    let x_range = line_range(&config.x_axis, x_column.dtype, &xs)?;
    let pixels = if config.x_axis.is_descending() {
        (WIDTH - MARGIN_RIGHT, MARGIN_LEFT)
    } else {
        (MARGIN_LEFT, WIDTH - MARGIN_RIGHT)
    };
    let x = Scale::new(x_range, pixels, config.x_axis.logarithmic);
    let y = Scale::new(
        line_range(&config.y_axis, y_column.dtype, &ys)?,
        (HEIGHT - MARGIN_BOTTOM, MARGIN_TOP),
        config.y_axis.logarithmic,
    );

    let x_label = axis_label(frame, &config.x_axis, series_filters, &config.x_axis.value)?;
    let y_label = axis_label(frame, &config.y_axis, series_filters, &config.x_axis.value)?;

    let mut doc = svg::Svg::new(WIDTH, HEIGHT);
    draw_frame(&mut doc, &config.title, &x_label, &y_label, &y, y_column.dtype);

    let vertical = config.x_axis.label_orientation == Some(LabelOrientation::Vertical);
    let bottom = HEIGHT - MARGIN_BOTTOM;
    for tick in x.ticks() {
        let px = x.map(tick);
        doc.line((px, bottom), (px, bottom + 5.0), "#444444", 1.0);
        let text = tick_text(tick, x_column.dtype);
        if vertical {
            doc.text(
                (px + TICK_SIZE / 3.0, bottom + 8.0),
                &text,
                TICK_SIZE,
                svg::Anchor::End,
                Some(-90.0),
            );
        } else {
            let at = (px, bottom + TICK_SIZE + 6.0);
            doc.text(at, &text, TICK_SIZE, svg::Anchor::Middle, None);
        }
    }

    let palette = super::viridis(lines.len());
    let mut legend = Vec::with_capacity(lines.len());
    for ((filter, points), colour) in lines.iter().zip(&palette) {
        let pixels: Vec<(f64, f64)> = points
            .iter()
            .map(|(px, py)| (x.map(*px), y.map(*py)))
            .collect();
        doc.polyline(&pixels, colour, 2.0);
        for ((vx, vy), at) in points.iter().zip(&pixels) {
            let tooltip = format!(
                "{filter}\n{} = {}\n{} = {}",
                config.x_axis.value,
                tick_text(*vx, x_column.dtype),
                config.y_axis.value,
                value_text(*vy, y_column.dtype)
            );
            doc.circle(*at, 4.0, colour, Some(&tooltip));
        }
        let name = titlecase(&filter.column().replace('_', " "));
        let value = filter.2.as_ref().map_or_else(String::new, ToString::to_string);
        legend.push((format!("{name} = {value}"), colour.clone()));
    }
    draw_legend(&mut doc, &legend);

    Ok(doc.finish(&config.title))
}

/// Value range of a line chart axis.
///
/// Numeric axes default to 80% of the minimum up to 120% of the maximum, datetime axes are padded by a fifth of
/// their span on either side.
fn line_range(axis: &Axis, dtype: DType, values: &[f64]) -> Result<(f64, f64)> {
    let (min, max) = min_max(values)
        .ok_or_else(|| Error::Plot(format!("no values to plot for '{}'", axis.value)))?;

    if dtype == DType::DateTime {
        let pad = if max > min { (max - min) * 0.2 } else { SECONDS_PER_DAY };
        return Ok((min - pad, max + pad));
    }

    if axis.logarithmic {
        if min <= 0.0 {
            return Err(Error::Plot(format!(
                "cannot draw non-positive values of '{}' on a logarithmic axis",
                axis.value
            )));
        }
        return Ok((min * 0.8, max * 1.2));
    }

    let mut lo = (min * 0.8).min(min * 1.2).floor();
    let mut hi = (max * 1.2).max(max * 0.8).ceil();
    if !axis.range.use_default {
        lo = axis.range.min.unwrap_or(lo);
        hi = axis.range.max.unwrap_or(hi);
    }
    if lo == hi {
        hi = lo + 1.0;
    }
    Ok((lo, hi))
}

//! Grouped bar charts.

use std::cmp::Ordering;

use super::{
    axis_label, draw_frame, draw_legend, require_column, require_numeric, svg, titlecase,
    value_text, y_range, Scale, HEIGHT, MARGIN_BOTTOM, MARGIN_LEFT, MARGIN_RIGHT, MARGIN_TOP,
    TICK_SIZE, WIDTH,
};
use crate::{
    config::{LabelOrientation, PlotConfig},
    error::{Error, Result},
    filters::Filter,
    frame::{Frame, Value},
};

/// One bar: an x-axis value, optionally split by series, and the mean of its y values.
#[derive(Debug)]
struct Bar<'a> {
    x: &'a Value,
    series: Option<&'a Value>,
    height: f64,
}

pub(super) fn render(
    config: &PlotConfig,
    series_filters: &[Filter],
    frame: &Frame,
) -> Result<String> {
    let x_column = require_column(frame, &config.x_axis.value)?;
    let y_column = require_numeric(frame, &config.y_axis.value)?;
    let series_column = series_filters
        .first()
        .map(|f| require_column(frame, f.column()))
        .transpose()?;

    let bars = group_means(
        &x_column.values,
        series_column.map(|c| c.values.as_slice()),
        &y_column.values,
        config.x_axis.is_descending(),
    );
    if bars.is_empty() {
        return Err(Error::Plot(format!(
            "no non-null values of '{}' to draw",
            config.y_axis.value
        )));
    }

    // colours follow the innermost grouping level
    let colour_keys: Vec<&Value> = {
        let mut keys: Vec<&Value> = bars.iter().map(|b| b.series.unwrap_or(b.x)).collect();
        keys.sort_by(|a, b| a.sort_cmp(b));
        keys.dedup();
        keys
    };
    let palette = super::viridis(colour_keys.len());
    let colour_of = |key: &Value| {
        colour_keys
            .iter()
            .position(|k| *k == key)
            .map_or("#888888", |i| palette[i].as_str())
    };

    let heights: Vec<f64> = bars.iter().map(|b| b.height).collect();
    let range = y_range(&config.y_axis, &heights)?;
    let y = Scale::new(range, (HEIGHT - MARGIN_BOTTOM, MARGIN_TOP), config.y_axis.logarithmic);

    let x_label = axis_label(frame, &config.x_axis, series_filters, &config.x_axis.value)?;
    let y_label = axis_label(frame, &config.y_axis, series_filters, &config.x_axis.value)?;

    let mut doc = svg::Svg::new(WIDTH, HEIGHT);
    draw_frame(&mut doc, &config.title, &x_label, &y_label, &y, y_column.dtype);

    // bars of one x value sit side by side, groups are separated by half a bar
    let groups = group_count(&bars);
    #[allow(clippy::cast_precision_loss)]
    let slots = bars.len() as f64 + 0.5 * (groups as f64 + 1.0);
    let slot = (WIDTH - MARGIN_LEFT - MARGIN_RIGHT) / slots;
    let baseline = if config.y_axis.logarithmic {
        range.0
    } else {
        0f64.clamp(range.0.min(range.1), range.0.max(range.1))
    };
    let vertical = config.x_axis.label_orientation == Some(LabelOrientation::Vertical);
    let label_y = HEIGHT - MARGIN_BOTTOM + TICK_SIZE + 6.0;

    let mut cursor = MARGIN_LEFT + slot / 2.0;
    let mut group_start = cursor;
    for (i, bar) in bars.iter().enumerate() {
        let top = y.map(bar.height.max(range.0.min(range.1)));
        let bottom = y.map(baseline);
        let mut tooltip = format!("{} = {}", config.x_axis.value, bar.x);
        if let (Some(column), Some(series)) = (series_column, bar.series) {
            tooltip.push_str(&format!(", {} = {series}", column.name));
        }
        tooltip.push_str(&format!(
            "\n{} = {}",
            config.y_axis.value,
            value_text(bar.height, y_column.dtype)
        ));
        doc.rect(
            cursor + slot * 0.05,
            top.min(bottom),
            slot * 0.9,
            (bottom - top).abs(),
            colour_of(bar.series.unwrap_or(bar.x)),
            Some(&tooltip),
        );
        cursor += slot;

        let group_ends = bars.get(i + 1).map_or(true, |next| next.x != bar.x);
        if group_ends {
            let centre = (group_start + cursor) / 2.0;
            let text = bar.x.to_string();
            if vertical {
                doc.text(
                    (centre + TICK_SIZE / 3.0, label_y - 4.0),
                    &text,
                    TICK_SIZE,
                    svg::Anchor::End,
                    Some(-90.0),
                );
            } else {
                doc.text((centre, label_y), &text, TICK_SIZE, svg::Anchor::Middle, None);
            }
            cursor += slot / 2.0;
            group_start = cursor;
        }
    }

    let legend_column = series_column.unwrap_or(x_column);
    let legend_name = titlecase(&legend_column.name.replace('_', " "));
    let mut legend: Vec<(String, String)> = colour_keys
        .iter()
        .map(|key| (format!("{legend_name} = {key}"), colour_of(key).to_string()))
        .collect();
    if config.x_axis.is_descending() {
        legend.reverse();
    }
    draw_legend(&mut doc, &legend);

    Ok(doc.finish(&config.title))
}

/// Mean y value per `(x, series)` group, ordered by x then ascending series.
fn group_means<'a>(
    x: &'a [Value],
    series: Option<&'a [Value]>,
    y: &'a [Value],
    descending: bool,
) -> Vec<Bar<'a>> {
    let mut groups: Vec<(&Value, Option<&Value>, f64, usize)> = Vec::new();
    for (row, value) in y.iter().enumerate() {
        let (Some(value), false) = (value.as_f64(), x[row].is_null()) else {
            continue;
        };
        let key = series.map(|s| &s[row]);
        if key.is_some_and(Value::is_null) {
            continue;
        }
        match groups
            .iter_mut()
            .find(|(gx, gs, _, _)| **gx == x[row] && *gs == key)
        {
            Some((_, _, sum, count)) => {
                *sum += value;
                *count += 1;
            }
            None => groups.push((&x[row], key, value, 1)),
        }
    }

    groups.sort_by(|a, b| {
        let x_order = if descending {
            b.0.sort_cmp(a.0)
        } else {
            a.0.sort_cmp(b.0)
        };
        x_order.then_with(|| match (a.1, b.1) {
            (Some(sa), Some(sb)) => sa.sort_cmp(sb),
            _ => Ordering::Equal,
        })
    });

    groups
        .into_iter()
        .map(|(x, series, sum, count)| {
            #[allow(clippy::cast_precision_loss)]
            let height = sum / count as f64;
            Bar { x, series, height }
        })
        .collect()
}

fn group_count(bars: &[Bar<'_>]) -> usize {
    bars.windows(2).filter(|w| w[0].x != w[1].x).count() + usize::from(!bars.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlotConfig;
    use crate::frame::{Column, DType};

    const CONFIG: &str = r#"
plot_type: generic
title: Flops by Tasks
x_axis:
  value: tasks
  units: {custom: null}
  range: {use_default: true}
y_axis:
  value: flops_value
  units: {column: flops_unit}
  range: {use_default: true}
filters: {and: [], or: []}
series: [[environ, gnu], [environ, intel]]
column_types: {tasks: int, flops_value: float, flops_unit: str, environ: str}
"#;

    fn frame() -> Frame {
        let strs = |v: &[&str]| v.iter().map(|s| Value::Str((*s).into())).collect::<Vec<_>>();
        Frame::from_columns(vec![
            Column::new(
                "tasks",
                DType::Int,
                vec![Value::Int(2), Value::Int(1), Value::Int(1), Value::Int(1)],
            ),
            Column::new(
                "flops_value",
                DType::Float,
                vec![Value::Float(6.0), Value::Float(2.0), Value::Float(4.0), Value::Float(3.0)],
            ),
            Column::new("flops_unit", DType::Str, strs(&["Gflops/s"; 4])),
            Column::new("environ", DType::Str, strs(&["gnu", "gnu", "gnu", "intel"])),
        ])
        .unwrap()
    }

    #[test]
    fn groups_are_averaged_and_ordered() {
        let f = frame();
        let bars = group_means(
            &f.column("tasks").unwrap().values,
            Some(&f.column("environ").unwrap().values),
            &f.column("flops_value").unwrap().values,
            false,
        );
        let summary: Vec<(String, String, f64)> = bars
            .iter()
            .map(|b| (b.x.to_string(), b.series.unwrap().to_string(), b.height))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("1".into(), "gnu".into(), 3.0),
                ("1".into(), "intel".into(), 3.0),
                ("2".into(), "gnu".into(), 6.0),
            ]
        );
        assert_eq!(group_count(&bars), 2);

        let reversed = group_means(
            &f.column("tasks").unwrap().values,
            Some(&f.column("environ").unwrap().values),
            &f.column("flops_value").unwrap().values,
            true,
        );
        let order: Vec<(String, String)> = reversed
            .iter()
            .map(|b| (b.x.to_string(), b.series.unwrap().to_string()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("2".into(), "gnu".into()),
                ("1".into(), "gnu".into()),
                ("1".into(), "intel".into()),
            ]
        );
    }

    #[test]
    fn descending_charts_reverse_the_legend() {
        let config = PlotConfig::from_yaml(&CONFIG.replace(
            "range: {use_default: true}\ny_axis",
            "range: {use_default: true}\n  sort: descending\ny_axis",
        ))
        .unwrap();
        assert!(config.x_axis.is_descending());
        let plan = config.plan();
        let doc = render(&config, &plan.series_filters, &frame()).unwrap();

        let gnu = doc.find(">Environ = gnu</tspan>").unwrap();
        let intel = doc.find(">Environ = intel</tspan>").unwrap();
        assert!(intel < gnu);
        // the tasks == 2 group is drawn first
        let first_bar = doc.find("<title>tasks = 2, environ = gnu").unwrap();
        assert!(first_bar < doc.find("<title>tasks = 1, environ = gnu").unwrap());
    }

    #[test]
    fn renders_bars_with_legend_and_tooltips() {
        let config = PlotConfig::from_yaml(CONFIG).unwrap();
        let plan = config.plan();
        let doc = render(&config, &plan.series_filters, &frame()).unwrap();

        assert!(doc.starts_with("<svg"));
        assert_eq!(doc.matches("<rect").count(), 1 + 3 + 2);
        assert!(doc.contains(">Environ = gnu</tspan>"));
        assert!(doc.contains(">Environ = intel</tspan>"));
        assert!(doc.contains("<title>tasks = 2, environ = gnu\nflops_value = 6.00</title>"));
        assert!(doc.contains(">(Gflops/s)</tspan>"));
    }

    #[test]
    fn text_columns_cannot_be_bar_heights() {
        let config =
            PlotConfig::from_yaml(&CONFIG.replace("value: flops_value", "value: environ")).unwrap();
        let err = render(&config, &[], &frame()).unwrap_err();
        assert!(matches!(err, Error::Plot(message) if message.contains("numeric axis")));
    }
}

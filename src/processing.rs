//! The post-processing pipeline: from perflogs and a plot configuration to a chart and a CSV export.
//!
//! [`run_post_processing`] loads the logs, hands the records to [`process`] and writes the results. [`process`] is
//! the pure part of the pipeline and can be driven with any [`Frame`]:
//!
//! 1. every column the configuration references must exist,
//! 2. those columns are cast to their declared types,
//! 3. rows are sorted by the x-axis column, then the series column,
//! 4. the `and`, `or`, and series filters select rows,
//! 5. the y axis is scaled,
//! 6. the plot and export columns of the selected rows are returned.
//!
//! # Examples
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! use perflog_post::{config::PlotConfig, processing::{run_post_processing, Options}};
//!
//! let config = PlotConfig::from_path(&PathBuf::from("sombrero_config.yaml")).expect("invalid configuration");
//! let options = Options::new("plots");
//!
//! let output = run_post_processing(&PathBuf::from("perflogs"), &config, &options).expect("post-processing failed");
//! println!("{}", output.selection.plot.to_table());
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    config::{PlotConfig, PlotPlan, ScalingColumn},
    error::{Error, Result},
    filters::{self, row_filter, Filter, Mask, Operator},
    frame::{Column, DType, Frame, Value},
    perflogs, plots,
};

/// Options of a post-processing run.
#[derive(Clone, Debug)]
pub struct Options {
    /// Directory the chart and CSV are written to.
    pub output_dir: PathBuf,
    /// Only load perflogs whose file stem matches this glob pattern.
    pub test_pattern: Option<String>,
    /// Write outputs to `output_dir`, otherwise only render them.
    pub save: bool,
}

impl Options {
    /// Options writing every output into `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            test_pattern: None,
            save: true,
        }
    }
}

/// Rows chosen for plotting.
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    /// Plot columns of the selected rows.
    pub plot: Frame,
    /// Plot columns followed by the extra CSV columns of the selected rows.
    pub export: Frame,
}

/// Results of a post-processing run.
#[derive(Debug)]
pub struct Output {
    /// Selected data.
    pub selection: Selection,
    /// Rendered chart.
    pub svg: String,
    /// Where the chart was written, if it was saved.
    pub plot_path: Option<PathBuf>,
    /// Where the CSV export was written, if it was saved.
    pub csv_path: Option<PathBuf>,
}

/// Loads the perflogs at `log_path`, processes them according to `config` and writes the chart and CSV export.
///
/// # Errors
///
/// Propagates errors from [`perflogs::load`], [`process`] and [`plots::render`], and returns [`Error::Io`] or
/// [`Error::Csv`] if the outputs cannot be written.
pub fn run_post_processing(
    log_path: &Path,
    config: &PlotConfig,
    options: &Options,
) -> Result<Output> {
    let perflogs = perflogs::load(log_path, options.test_pattern.as_deref())?;
    let selection = process(perflogs.frame, config)?;

    let plan = config.plan();
    let svg = plots::render(config, &plan.series_filters, &selection.plot)?;

    let (plot_path, csv_path) = if options.save {
        fs::create_dir_all(&options.output_dir).map_err(|err| Error::io(&options.output_dir, err))?;
        let stem = plots::file_stem(&config.title);

        let plot_path = options.output_dir.join(format!("{stem}.svg"));
        log::info!("writing plot to {}...", plot_path.display());
        fs::write(&plot_path, &svg).map_err(|err| Error::io(&plot_path, err))?;

        let csv_path = options.output_dir.join(format!("{stem}.csv"));
        log::info!("writing selected data to {}...", csv_path.display());
        let file = fs::File::create(&csv_path).map_err(|err| Error::io(&csv_path, err))?;
        selection.export.write_csv(file)?;

        (Some(plot_path), Some(csv_path))
    } else {
        (None, None)
    };

    Ok(Output {
        selection,
        svg,
        plot_path,
        csv_path,
    })
}

/// Applies the column types, ordering, filters and scaling of `config` to `frame` and selects the rows to plot.
///
/// # Errors
///
/// - [`Error::InvalidColumns`] if a referenced column does not exist,
/// - [`Error::MissingType`], [`Error::UnsupportedType`] or [`Error::Conversion`] if a column cannot be typed,
/// - [`Error::EmptyData`] if no row is selected,
/// - [`Error::RowCount`] if more rows are selected than there are points to plot,
/// - [`Error::Scaling`] if the y axis cannot be scaled.
///
/// # Examples
///
/// ```
/// use perflog_post::config::PlotConfig;
/// use perflog_post::frame::{Column, DType, Frame, Value};
/// use perflog_post::processing::process;
///
/// let config = PlotConfig::from_yaml(r#"
/// plot_type: generic
/// title: Flops
/// x_axis: {value: tasks, units: {custom: null}, range: {use_default: true}}
/// y_axis: {value: flops_value, units: {custom: Gflops/s}, range: {use_default: true}, scaling: {custom: 2}}
/// column_types: {tasks: int, flops_value: float}
/// "#).unwrap();
///
/// let frame = Frame::from_columns(vec![
///     Column::new("tasks", DType::Str, vec![Value::Str("2".into()), Value::Str("1".into())]),
///     Column::new("flops_value", DType::Str, vec![Value::Str("8".into()), Value::Str("4".into())]),
/// ]).unwrap();
///
/// let selection = process(frame, &config).unwrap();
/// assert_eq!(selection.plot.column("tasks").unwrap().values, vec![Value::Int(1), Value::Int(2)]);
/// assert_eq!(selection.plot.column("flops_value").unwrap().values, vec![Value::Float(2.0), Value::Float(4.0)]);
/// ```
pub fn process(mut frame: Frame, config: &PlotConfig) -> Result<Selection> {
    let plan = config.plan();

    check_columns(&frame, &plan)?;
    apply_types(&mut frame, config, &plan)?;

    let mut sort_keys = vec![config.x_axis.value.as_str()];
    sort_keys.extend(plan.series_columns.iter().map(String::as_str));
    frame.sort_by(&sort_keys);

    let mask = filters::combine(&frame, &plan.and_filters, &plan.or_filters, &plan.series_filters)?;
    if !mask.iter().any(|keep| *keep) {
        return Err(Error::EmptyData);
    }
    check_row_count(&frame, &mask, &config.x_axis.value, &plan)?;

    if let Some(scaling) = &plan.scaling_column {
        scale_by_column(&mut frame, &mask, config, &plan, scaling)?;
    } else if let Some(custom) = plan.scaling_custom {
        scale_by_constant(&mut frame, &mask, &config.y_axis.value, custom)?;
    }

    let plot = frame.select(&plan.plot_columns, &mask)?;
    let export_columns: Vec<String> = plan
        .plot_columns
        .iter()
        .chain(&plan.extra_columns)
        .cloned()
        .collect();
    let export = frame.select(&export_columns, &mask)?;

    log::info!("selected data:\n{}", plot.to_table());
    log::trace!("full data: {}", frame.to_json());

    Ok(Selection { plot, export })
}

fn check_columns(frame: &Frame, plan: &PlotPlan) -> Result<()> {
    let missing: Vec<String> = plan
        .all_columns
        .iter()
        .chain(&plan.extra_columns)
        .filter(|c| !frame.contains(c))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidColumns(missing))
    }
}

fn apply_types(frame: &mut Frame, config: &PlotConfig, plan: &PlotPlan) -> Result<()> {
    for name in &plan.all_columns {
        let type_name = config
            .column_types
            .get(name)
            .ok_or_else(|| Error::MissingType(name.clone()))?;
        let dtype: DType = type_name.parse().map_err(|dtype| Error::UnsupportedType {
            column: name.clone(),
            dtype,
        })?;
        if let Some(column) = frame.column(name).cloned() {
            log::debug!("casting column '{name}' to {dtype}");
            frame.replace(column.cast(dtype)?);
        }
    }
    Ok(())
}

/// Fails if there are more selected rows than distinct x values times series combinations.
fn check_row_count(frame: &Frame, mask: &[bool], x: &str, plan: &PlotPlan) -> Result<()> {
    let rows = mask.iter().filter(|keep| **keep).count();
    let distinct_x = frame.column(x).map_or(0, |column| {
        let mut seen: Vec<&Value> = Vec::new();
        for (value, _) in column.values.iter().zip(mask).filter(|(_, keep)| **keep) {
            if !seen.contains(&value) {
                seen.push(value);
            }
        }
        seen.len()
    });
    let expected = plan.series_combinations() * distinct_x;
    if rows > expected {
        return Err(Error::RowCount { rows, expected });
    }
    Ok(())
}

/// Divides the y values of every series by the scaling column.
///
/// The baseline rows of a series are the rows of the series named by `scaling.series`, or the series' own selected
/// rows without one, narrowed to `x == x_value` when given. A single baseline value scales every row of the series,
/// otherwise there must be one baseline value per row.
fn scale_by_column(
    frame: &mut Frame,
    mask: &[bool],
    config: &PlotConfig,
    plan: &PlotPlan,
    scaling: &ScalingColumn,
) -> Result<()> {
    let y = config.y_axis.value.as_str();
    // copied before the y column is touched, the scaling column may be the y column itself
    let scaling_column = frame
        .column(&scaling.name)
        .cloned()
        .ok_or_else(|| Error::InvalidColumns(vec![scaling.name.clone()]))?;
    if !scaling_column.dtype.is_numeric() {
        return Err(Error::Scaling(format!(
            "scaling column '{}' must be numeric, not {}",
            scaling_column.name, scaling_column.dtype
        )));
    }

    let baseline_series = match scaling.series {
        Some(index) => {
            let filter = plan.series_filters.get(index).ok_or_else(|| {
                Error::Scaling(format!("there is no series with index {index} to scale by"))
            })?;
            Some(row_filter(frame, filter)?)
        }
        None => None,
    };
    let at_x = scaling
        .x_value
        .as_ref()
        .map(|x_value| {
            let filter = Filter(config.x_axis.value.clone(), Operator::Eq, Some(x_value.clone()));
            row_filter(frame, &filter)
        })
        .transpose()?;

    let targets: Vec<Mask> = if plan.series_filters.is_empty() {
        vec![mask.to_vec()]
    } else {
        plan.series_filters
            .iter()
            .map(|filter| -> Result<Mask> { Ok(filters::and(mask, &row_filter(frame, filter)?)) })
            .collect::<Result<_>>()?
    };

    let mut column = float_column(frame, y)?;
    for target in targets {
        let mut selected = baseline_series.clone().unwrap_or_else(|| target.clone());
        if let Some(at_x) = &at_x {
            selected = filters::and(&selected, at_x);
        }
        let baseline: Vec<&Value> = scaling_column
            .values
            .iter()
            .zip(&selected)
            .filter_map(|(value, keep)| keep.then_some(value))
            .collect();
        let rows: Vec<usize> = target
            .iter()
            .enumerate()
            .filter_map(|(row, keep)| keep.then_some(row))
            .collect();
        log::debug!(
            "scaling {} row(s) of '{y}' by {} value(s) of '{}'",
            rows.len(),
            baseline.len(),
            scaling_column.name
        );

        if baseline.is_empty() && !rows.is_empty() {
            return Err(Error::Scaling(format!(
                "no rows of column '{}' match the scaling selection",
                scaling_column.name
            )));
        }
        if baseline.len() != 1 && baseline.len() != rows.len() {
            return Err(Error::Scaling(format!(
                "{} scaling value(s) cannot scale {} row(s) of '{y}'",
                baseline.len(),
                rows.len()
            )));
        }
        for (i, row) in rows.into_iter().enumerate() {
            let divisor = baseline[if baseline.len() == 1 { 0 } else { i }];
            column.values[row] = divide(&column.values[row], divisor, y)?;
        }
    }
    frame.replace(column);
    Ok(())
}

fn scale_by_constant(frame: &mut Frame, mask: &[bool], y: &str, divisor: f64) -> Result<()> {
    let mut column = float_column(frame, y)?;
    for (value, _) in column.values.iter_mut().zip(mask).filter(|(_, keep)| **keep) {
        *value = divide(value, &Value::Float(divisor), y)?;
    }
    frame.replace(column);
    Ok(())
}

/// The y column converted to floats, ready to be scaled.
fn float_column(frame: &Frame, y: &str) -> Result<Column> {
    let column = frame
        .column(y)
        .ok_or_else(|| Error::InvalidColumns(vec![y.to_string()]))?;
    if !column.dtype.is_numeric() {
        return Err(Error::Scaling(format!(
            "cannot scale column '{y}' of type {}",
            column.dtype
        )));
    }
    column.clone().cast(DType::Float)
}

fn divide(value: &Value, divisor: &Value, y: &str) -> Result<Value> {
    match (value.as_f64(), divisor.as_f64()) {
        (Some(_), Some(d)) if d == 0.0 => Err(Error::Scaling(format!(
            "cannot divide '{y}' by a zero scaling value"
        ))),
        (Some(v), Some(d)) => Ok(Value::Float(v / d)),
        _ => Ok(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
plot_type: generic
title: Sombrero Flops
x_axis:
  value: tasks
  units: {custom: null}
  range: {use_default: true}
y_axis:
  value: flops_value
  units: {column: flops_unit}
  range: {use_default: true}
filters:
  and: [[cpus_per_task, "==", 2]]
  or: []
series: [[environ, gnu], [environ, intel]]
column_types: {tasks: int, flops_value: float, flops_unit: str, cpus_per_task: int, environ: str}
"#;

    fn strs(name: &str, values: &[&str]) -> Column {
        Column::new(name, DType::Str, values.iter().map(|v| Value::from_field(v)).collect())
    }

    fn frame() -> Frame {
        Frame::from_columns(vec![
            strs("tasks", &["2", "1", "2", "1", "4"]),
            strs("cpus_per_task", &["2", "2", "2", "2", "1"]),
            strs("flops_value", &["8", "2", "4", "1", "100"]),
            strs("flops_unit", &["Gflops/s"; 5]),
            strs("environ", &["gnu", "gnu", "intel", "intel", "gnu"]),
            strs("system", &["archer2"; 5]),
        ])
        .unwrap()
    }

    fn floats(selection: &Frame, name: &str) -> Vec<f64> {
        selection
            .column(name)
            .unwrap()
            .values
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect()
    }

    #[test]
    fn selects_sorted_and_filtered_rows() {
        let selection = process(frame(), &PlotConfig::from_yaml(CONFIG).unwrap()).unwrap();

        assert_eq!(
            selection.plot.column_names().collect::<Vec<_>>(),
            vec!["tasks", "flops_value", "flops_unit", "environ"]
        );
        assert_eq!(floats(&selection.plot, "tasks"), vec![1.0, 1.0, 2.0, 2.0]);
        assert_eq!(floats(&selection.plot, "flops_value"), vec![2.0, 1.0, 8.0, 4.0]);
        assert_eq!(selection.plot.column("tasks").unwrap().dtype, DType::Int);
    }

    #[test]
    fn export_appends_extra_columns() {
        let config =
            PlotConfig::from_yaml(&format!("{CONFIG}extra_columns_to_csv: [system, tasks]\n"))
                .unwrap();
        let selection = process(frame(), &config).unwrap();
        assert_eq!(
            selection.export.column_names().collect::<Vec<_>>(),
            vec!["tasks", "flops_value", "flops_unit", "environ", "system"]
        );
        assert_eq!(selection.export.len(), 4);
    }

    #[test]
    fn missing_columns_are_listed() {
        let config =
            PlotConfig::from_yaml(&CONFIG.replace("[[cpus_per_task", "[[fake_column")).unwrap();
        let err = process(frame(), &config).unwrap_err();
        assert!(matches!(err, Error::InvalidColumns(cols) if cols == vec!["fake_column"]));
    }

    #[test]
    fn every_column_needs_a_type() {
        let config = PlotConfig::from_yaml(&CONFIG.replace(", environ: str}", "}")).unwrap();
        assert!(matches!(process(frame(), &config), Err(Error::MissingType(c)) if c == "environ"));

        let config =
            PlotConfig::from_yaml(&CONFIG.replace("environ: str", "environ: complex")).unwrap();
        assert!(matches!(process(frame(), &config), Err(Error::UnsupportedType { .. })));
    }

    #[test]
    fn empty_selections_are_errors() {
        let config = PlotConfig::from_yaml(&CONFIG.replace("\"==\", 2]", "\"==\", 3]")).unwrap();
        assert!(matches!(process(frame(), &config), Err(Error::EmptyData)));
    }

    #[test]
    fn duplicate_points_fail_the_row_count() {
        let mut rows = frame();
        rows = Frame::concat([rows.clone(), rows]);
        let err = process(rows, &PlotConfig::from_yaml(CONFIG).unwrap()).unwrap_err();
        assert!(matches!(err, Error::RowCount { rows: 8, expected: 4 }));
    }

    fn scaling_config(scaling: &str) -> PlotConfig {
        PlotConfig::from_yaml(&CONFIG.replace(
            "units: {column: flops_unit}",
            &format!("units: {{column: flops_unit}}\n  scaling: {{column: {scaling}}}"),
        ))
        .unwrap()
    }

    fn paired_frame() -> Frame {
        Frame::from_columns(vec![
            strs("tasks", &["1", "1", "2", "2"]),
            strs("cpus_per_task", &["2"; 4]),
            strs("flops_value", &["2", "1", "8", "4"]),
            strs("flops_unit", &["Gflops/s"; 4]),
            strs("environ", &["gnu", "intel", "gnu", "intel"]),
        ])
        .unwrap()
    }

    #[test]
    fn scales_each_series_by_a_baseline_series() {
        let config = scaling_config("{name: flops_value, series: 0}");
        let selection = process(paired_frame(), &config).unwrap();
        // gnu rows are divided by themselves, intel rows by the gnu rows at the same position
        assert_eq!(floats(&selection.plot, "flops_value"), vec![1.0, 0.5, 1.0, 0.5]);
    }

    #[test]
    fn scales_each_series_by_its_own_first_point() {
        let config = scaling_config("{name: flops_value, x_value: 1}");
        let selection = process(paired_frame(), &config).unwrap();
        assert_eq!(floats(&selection.plot, "flops_value"), vec![1.0, 1.0, 4.0, 4.0]);
    }

    #[test]
    fn baseline_series_ignores_row_filters() {
        let mut config = scaling_config("{name: flops_value, series: 0, x_value: 1}");
        config.filters = PlotConfig::from_yaml(
            &CONFIG.replace("and: [[cpus_per_task, \"==\", 2]]", "and: [[tasks, \"==\", 2]]"),
        )
        .unwrap()
        .filters;
        let selection = process(paired_frame(), &config).unwrap();
        // the tasks == 1 gnu row is filtered out of the plot but still is the baseline
        assert_eq!(floats(&selection.plot, "flops_value"), vec![4.0, 2.0]);
    }

    #[test]
    fn scales_by_a_single_point() {
        let config = scaling_config("{name: flops_value, series: 0, x_value: 1}");
        let selection = process(frame(), &config).unwrap();
        assert_eq!(floats(&selection.plot, "flops_value"), vec![1.0, 0.5, 4.0, 2.0]);
    }

    #[test]
    fn scales_by_a_constant() {
        let config = PlotConfig::from_yaml(&CONFIG.replace(
            "units: {column: flops_unit}",
            "units: {column: flops_unit}\n  scaling: {custom: 2}",
        ))
        .unwrap();
        let selection = process(frame(), &config).unwrap();
        assert_eq!(floats(&selection.plot, "flops_value"), vec![1.0, 0.5, 4.0, 2.0]);
        assert_eq!(selection.plot.column("flops_value").unwrap().dtype, DType::Float);
    }

    #[test]
    fn mismatched_scaling_lengths_are_errors() {
        let mut config = scaling_config("{name: flops_value, series: 1}");
        config.filters.and.clear();
        // three gnu rows against two intel baseline rows
        assert!(matches!(process(frame(), &config), Err(Error::Scaling(_))));
    }
}

//! Summary tables of the latest results per test and system.
//!
//! [`report`] pivots perflog records into one row per test and one column per `system:partition`, holding the most
//! recent value of a metric.
//!
//! # Examples
//!
//! ```
//! use perflog_post::frame::{Column, DType, Frame, Value};
//! use perflog_post::report::report;
//!
//! let text = |values: &[&str]| values.iter().map(|v| Value::Str((*v).to_string())).collect::<Vec<_>>();
//! let frame = Frame::from_columns(vec![
//!     Column::new("job_completion_time", DType::Str, text(&["2023-06-01T10:00:00", "2023-06-02T10:00:00"])),
//!     Column::new("test_name", DType::Str, text(&["SombreroBenchmark", "SombreroBenchmark"])),
//!     Column::new("system", DType::Str, text(&["archer2", "archer2"])),
//!     Column::new("partition", DType::Str, text(&["compute", "compute"])),
//!     Column::new("flops_value", DType::Str, text(&["1.5", "2.5"])),
//! ]).unwrap();
//!
//! let table = report(&frame, None, None).unwrap();
//! assert_eq!(table.column("archer2:compute").unwrap().values, vec![Value::Float(2.5)]);
//! ```

use glob::Pattern;

use crate::{
    error::{Error, Result},
    frame::{parse_datetime, Column, DType, Frame, Value},
};

const TEST_COLUMN: &str = "test_name";
const TIME_COLUMN: &str = "job_completion_time";
const VALUE_SUFFIX: &str = "_value";

/// Metrics recorded in the frame, i.e. the `<metric>_value` columns, in column order.
#[must_use]
pub fn metrics(frame: &Frame) -> Vec<String> {
    frame
        .column_names()
        .filter_map(|name| name.strip_suffix(VALUE_SUFFIX))
        .filter(|metric| !metric.is_empty())
        .map(str::to_string)
        .collect()
}

/// Latest value of `metric` for every test (rows) on every `system:partition` (columns).
///
/// Without `metric`, the frame must record exactly one metric. `test_pattern` restricts the rows to test names matching
/// a glob pattern. Cells without a result are null.
///
/// # Errors
///
/// Returns [`Error::Report`] if the metric is ambiguous or unknown, [`Error::InvalidColumns`] if the frame lacks a
/// column the report is built from, and [`Error::Conversion`] if a completion time or a metric value cannot be parsed.
pub fn report(frame: &Frame, metric: Option<&str>, test_pattern: Option<&str>) -> Result<Frame> {
    let available = metrics(frame);
    let metric = match metric {
        Some(metric) if available.iter().any(|m| m == metric) => metric.to_string(),
        Some(metric) => {
            return Err(Error::Report(format!(
                "metric '{metric}' not found, available metrics are {available:?}"
            )))
        }
        None if available.len() == 1 => available[0].clone(),
        None => {
            return Err(Error::Report(format!(
                "choose one of the available metrics {available:?}"
            )))
        }
    };
    let pattern = test_pattern
        .map(Pattern::new)
        .transpose()
        .map_err(|err| Error::Report(format!("invalid test pattern: {err}")))?;

    let value_column = format!("{metric}{VALUE_SUFFIX}");
    let required = [TEST_COLUMN, TIME_COLUMN, "system", "partition", value_column.as_str()];
    let missing: Vec<String> = required
        .iter()
        .filter(|c| !frame.contains(c))
        .map(|c| (*c).to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Error::InvalidColumns(missing));
    }
    let column = |name: &str| frame.column(name).map(|c| c.values.as_slice()).unwrap_or_default();
    let (tests, times, systems, partitions, values) = (
        column(TEST_COLUMN),
        column(TIME_COLUMN),
        column("system"),
        column("partition"),
        column(&value_column),
    );

    // (test, system:partition) -> (completion time, value)
    let mut latest: Vec<(String, String, Value, Value)> = Vec::new();
    for row in 0..frame.len() {
        let test = tests[row].to_string();
        if pattern.as_ref().is_some_and(|p| !p.matches(&test)) {
            continue;
        }
        let target = format!("{}:{}", systems[row], partitions[row]);
        let time = match &times[row] {
            Value::Str(text) => parse_datetime(text).map_or_else(
                || {
                    Err(Error::Conversion {
                        column: TIME_COLUMN.to_string(),
                        value: text.clone(),
                        dtype: DType::DateTime.to_string(),
                    })
                },
                |d| Ok(Value::DateTime(d)),
            )?,
            other => other.clone(),
        };
        let value = values[row].clone().cast(DType::Float, &value_column)?;

        match latest.iter_mut().find(|(t, s, _, _)| *t == test && *s == target) {
            Some(entry)
                if !time.is_null() && (entry.2.is_null() || time.sort_cmp(&entry.2).is_gt()) =>
            {
                entry.2 = time;
                entry.3 = value;
            }
            Some(_) => {}
            None => latest.push((test, target, time, value)),
        }
    }
    log::debug!("found {} test/system combinations for metric '{metric}'", latest.len());

    let mut test_names: Vec<&String> = latest.iter().map(|(t, _, _, _)| t).collect();
    test_names.sort();
    test_names.dedup();
    let mut targets: Vec<&String> = latest.iter().map(|(_, s, _, _)| s).collect();
    targets.sort();
    targets.dedup();

    let mut columns = vec![Column::new(
        TEST_COLUMN,
        DType::Str,
        test_names.iter().map(|t| Value::Str((*t).clone())).collect(),
    )];
    for target in &targets {
        let cells = test_names
            .iter()
            .map(|test| {
                latest
                    .iter()
                    .find(|(t, s, _, _)| t == *test && s == *target)
                    .map_or(Value::Null, |entry| entry.3.clone())
            })
            .collect();
        columns.push(Column::from_values(target.as_str(), cells));
    }
    Frame::from_columns(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(name: &str, values: &[&str]) -> Column {
        Column::new(name, DType::Str, values.iter().map(|v| Value::from_field(v)).collect())
    }

    fn frame() -> Frame {
        Frame::from_columns(vec![
            text(
                "job_completion_time",
                &[
                    "2023-06-01T10:00:00",
                    "2023-06-03T10:00:00",
                    "2023-06-02T10:00:00",
                    "2023-06-01T12:00:00",
                ],
            ),
            text("test_name", &["Sombrero", "Sombrero", "Sombrero", "Stream"]),
            text("system", &["archer2", "archer2", "archer2", "csd3"]),
            text("partition", &["compute", "compute", "compute", "cascadelake"]),
            text("flops_value", &["1", "3", "2", ""]),
            text("flops_unit", &["Gflops/s"; 4]),
        ])
        .unwrap()
    }

    #[test]
    fn lists_metrics() {
        assert_eq!(metrics(&frame()), vec!["flops"]);
    }

    #[test]
    fn keeps_the_latest_value() {
        let table = report(&frame(), None, None).unwrap();

        assert_eq!(
            table.column_names().collect::<Vec<_>>(),
            vec!["test_name", "archer2:compute", "csd3:cascadelake"]
        );
        assert_eq!(
            table.column("test_name").unwrap().values,
            vec![Value::Str("Sombrero".into()), Value::Str("Stream".into())]
        );
        assert_eq!(
            table.column("archer2:compute").unwrap().values,
            vec![Value::Float(3.0), Value::Null]
        );
        assert!(table.column("csd3:cascadelake").unwrap().is_all_null());
    }

    #[test]
    fn filters_tests_by_pattern() {
        let table = report(&frame(), Some("flops"), Some("Str*")).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.column_names().collect::<Vec<_>>(),
            vec!["test_name", "csd3:cascadelake"]
        );
    }

    #[test]
    fn ambiguous_metrics_are_reported() {
        let mut frame = frame();
        frame.push(text("bandwidth_value", &["1", "2", "3", "4"])).unwrap();

        let err = report(&frame, None, None).unwrap_err();
        assert!(matches!(err, Error::Report(message) if message.contains("\"bandwidth\"")));

        let err = report(&frame, Some("latency"), None).unwrap_err();
        assert!(matches!(err, Error::Report(message) if message.contains("not found")));

        assert!(report(&frame, Some("bandwidth"), None).is_ok());
    }

    #[test]
    fn non_numeric_values_are_errors() {
        let mut frame = frame();
        frame.replace(text("flops_value", &["1", "fast", "2", ""]));

        let err = report(&frame, None, None).unwrap_err();
        assert!(matches!(
            err,
            Error::Conversion { column, value, .. } if column == "flops_value" && value == "fast"
        ));
    }

    #[test]
    fn dated_results_replace_undated_ones() {
        let mut frame = frame();
        frame.replace(text(
            "job_completion_time",
            &["", "2023-06-01T10:00:00", "", "2023-06-01T12:00:00"],
        ));

        let table = report(&frame, None, None).unwrap();
        assert_eq!(
            table.column("archer2:compute").unwrap().values,
            vec![Value::Float(3.0), Value::Null]
        );
    }
}

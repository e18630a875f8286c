use crate::{
    config::{PlotConfig, ScalingColumn},
    filters::{Filter, Operator},
};

/// Filter and column lists derived from a [`PlotConfig`].
///
/// Every list is free of duplicates and keeps the order in which entries first appear in the configuration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlotPlan {
    /// Conditions that must all hold.
    pub and_filters: Vec<Filter>,
    /// Conditions of which at least one must hold.
    pub or_filters: Vec<Filter>,
    /// One `column == value` condition per configured series.
    pub series_filters: Vec<Filter>,
    /// Columns the series are drawn from.
    pub series_columns: Vec<String>,
    /// Axis value and unit columns followed by the series column.
    pub plot_columns: Vec<String>,
    /// Columns only written to the CSV output.
    pub extra_columns: Vec<String>,
    /// Columns referenced by `and` or `or` filters.
    pub filter_columns: Vec<String>,
    /// Every column that needs a declared type.
    pub all_columns: Vec<String>,
    /// Column scaling of the y axis.
    pub scaling_column: Option<ScalingColumn>,
    /// Constant scaling of the y axis.
    pub scaling_custom: Option<f64>,
}

impl PlotPlan {
    pub(super) fn new(config: &PlotConfig) -> Self {
        let and_filters = unique(config.filters.and.iter().cloned());
        let or_filters = unique(config.filters.or.iter().cloned());
        let series_filters = unique(
            config
                .series
                .iter()
                .map(|s| Filter(s.0.clone(), Operator::Eq, Some(s.1.clone()))),
        );
        let series_columns = unique(series_filters.iter().map(|f| f.0.clone()));

        let plot_columns = unique(
            [
                Some(config.x_axis.value.clone()),
                config.x_axis.units.column.clone(),
                Some(config.y_axis.value.clone()),
                config.y_axis.units.column.clone(),
            ]
            .into_iter()
            .flatten()
            .chain(series_columns.iter().cloned()),
        );

        let extra_columns = unique(
            config
                .extra_columns
                .iter()
                .filter(|c| !plot_columns.contains(c))
                .cloned(),
        );

        let filter_columns = unique(
            and_filters
                .iter()
                .chain(&or_filters)
                .map(|f| f.0.clone()),
        );

        let (scaling_column, scaling_custom) = config
            .y_axis
            .scaling
            .as_ref()
            .map_or((None, None), |s| (s.column.clone(), s.custom));

        let all_columns = unique(
            plot_columns
                .iter()
                .chain(&filter_columns)
                .cloned()
                .chain(scaling_column.as_ref().map(|c| c.name.clone())),
        );

        Self {
            and_filters,
            or_filters,
            series_filters,
            series_columns,
            plot_columns,
            extra_columns,
            filter_columns,
            all_columns,
            scaling_column,
            scaling_custom,
        }
    }

    /// Number of distinct series combinations, the product of the series count of every series column.
    #[must_use]
    pub fn series_combinations(&self) -> usize {
        self.series_columns
            .iter()
            .map(|c| self.series_filters.iter().filter(|f| &f.0 == c).count())
            .product()
    }
}

fn unique<T: PartialEq>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut out = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::config::{PlotConfig, Scalar};
    use crate::filters::{Filter, Operator};

    const CONFIG: &str = r#"
plot_type: generic
title: Title
x_axis:
  value: tasks
  units: {column: tasks_unit}
  range: {use_default: true}
y_axis:
  value: flops_value
  units: {column: flops_unit}
  range: {use_default: true}
  scaling: {column: {name: baseline, series: 0, x_value: 1}}
filters:
  and: [[cpus_per_task, "==", 2], [cpus_per_task, "==", 2]]
  or: [[tasks, ">", 1], [system, "==", archer2]]
series: [[environ, gnu], [environ, intel], [environ, gnu]]
column_types: {tasks: int}
extra_columns_to_csv: [system, flops_value, system, job_completion_time]
"#;

    #[test]
    fn lists_are_deduplicated_in_order() {
        let plan = PlotConfig::from_yaml(CONFIG).unwrap().plan();

        assert_eq!(
            plan.and_filters,
            vec![Filter("cpus_per_task".into(), Operator::Eq, Some(Scalar::Int(2)))]
        );
        assert_eq!(plan.or_filters.len(), 2);
        assert_eq!(
            plan.series_filters,
            vec![
                Filter("environ".into(), Operator::Eq, Some(Scalar::Str("gnu".into()))),
                Filter("environ".into(), Operator::Eq, Some(Scalar::Str("intel".into()))),
            ]
        );
        assert_eq!(plan.series_columns, vec!["environ"]);
        assert_eq!(plan.series_combinations(), 2);
    }

    #[test]
    fn columns_are_collected_per_role() {
        let plan = PlotConfig::from_yaml(CONFIG).unwrap().plan();

        assert_eq!(
            plan.plot_columns,
            vec!["tasks", "tasks_unit", "flops_value", "flops_unit", "environ"]
        );
        assert_eq!(plan.extra_columns, vec!["system", "job_completion_time"]);
        assert_eq!(plan.filter_columns, vec!["cpus_per_task", "tasks", "system"]);
        assert_eq!(
            plan.all_columns,
            vec![
                "tasks",
                "tasks_unit",
                "flops_value",
                "flops_unit",
                "environ",
                "cpus_per_task",
                "system",
                "baseline"
            ]
        );
        assert_eq!(plan.scaling_column.unwrap().series, Some(0));
    }

    #[test]
    fn no_series_means_one_combination() {
        let plan = PlotConfig::from_yaml(&CONFIG.replace(
            "series: [[environ, gnu], [environ, intel], [environ, gnu]]",
            "series: []",
        ));
        // the scaling series index no longer refers to a configured series
        assert!(plan.is_err());

        let config = CONFIG
            .replace(
                "series: [[environ, gnu], [environ, intel], [environ, gnu]]",
                "series: []",
            )
            .replace("series: 0, ", "");
        let plan = PlotConfig::from_yaml(&config).unwrap().plan();
        assert_eq!(plan.series_combinations(), 1);
    }
}

//! Plot configuration.
//!
//! A plot is described by a YAML document naming the axes, the row filters, the series to compare, and the types of
//! every column involved. [`PlotConfig::from_path`] loads and validates such a document, [`PlotConfig::plan`] derives
//! the column and filter lists the pipeline works from.
//!
//! # Examples
//!
//! ```
//! use perflog_post::config::{PlotConfig, PlotType};
//!
//! let config = PlotConfig::from_yaml(r#"
//! plot_type: generic
//! title: Sombrero Flops
//! x_axis:
//!   value: tasks
//!   units: {custom: null}
//!   range: {use_default: true}
//! y_axis:
//!   value: flops_value
//!   units: {column: flops_unit}
//!   range: {use_default: true}
//! filters:
//!   and: [[cpus_per_task, "==", 2]]
//!   or: []
//! series: []
//! column_types: {tasks: int, flops_value: float, flops_unit: str, cpus_per_task: int}
//! "#).unwrap();
//!
//! assert_eq!(config.plot_type, PlotType::Generic);
//! assert_eq!(config.plan().all_columns, vec!["tasks", "flops_value", "flops_unit", "cpus_per_task"]);
//! ```

use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    fs,
    path::Path,
};

use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    error::{Error, Result},
    filters::Filter,
};

mod plan;

pub use plan::PlotPlan;

/// Kind of chart to draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotType {
    /// Grouped bar chart.
    Generic,
    /// One line per series.
    Line,
}

/// Direction in which x-axis values are ordered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// Orientation of x-axis group labels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelOrientation {
    /// Labels read left to right.
    #[default]
    Horizontal,
    /// Labels read bottom to top.
    Vertical,
}

/// A plain YAML scalar as found in filter, series, and scaling values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// Boolean literal.
    Bool(bool),
    /// Anything else.
    Str(String),
}

impl Display for Scalar {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Where an axis takes its units from.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Units {
    /// Column holding the units of each row.
    #[serde(default)]
    pub column: Option<String>,
    /// Fixed units text.
    #[serde(default)]
    pub custom: Option<Scalar>,
}

/// Custom axis endpoints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Range {
    /// Ignore `min` and `max` and derive the range from the data.
    #[serde(default = "default_true")]
    pub use_default: bool,
    /// Lower endpoint.
    #[serde(default)]
    pub min: Option<f64>,
    /// Upper endpoint.
    #[serde(default)]
    pub max: Option<f64>,
}

impl Default for Range {
    fn default() -> Self {
        Self {
            use_default: true,
            min: None,
            max: None,
        }
    }
}

/// Scale axis values by the values of another column.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalingColumn {
    /// Column to divide by.
    #[serde(default)]
    pub name: String,
    /// Index into the configured series selecting the rows to divide by.
    #[serde(default)]
    pub series: Option<usize>,
    /// X-axis value selecting the row(s) to divide by.
    #[serde(default)]
    pub x_value: Option<Scalar>,
}

/// How axis values are scaled.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Scaling {
    /// Scale by column values.
    #[serde(default)]
    pub column: Option<ScalingColumn>,
    /// Scale by a constant.
    #[serde(default)]
    pub custom: Option<f64>,
}

/// Configuration of one plot axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    /// Column plotted along this axis.
    pub value: String,
    /// Units shown in the axis label.
    pub units: Units,
    /// Axis endpoints.
    pub range: Range,
    /// Optional scaling, only supported on the y axis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<Scaling>,
    /// Order of x-axis values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortOrder>,
    /// Draw this axis on a logarithmic scale.
    #[serde(default, skip_serializing_if = "is_false")]
    pub logarithmic: bool,
    /// Orientation of x-axis group labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_orientation: Option<LabelOrientation>,
}

impl Axis {
    fn empty() -> Self {
        Self {
            value: String::new(),
            units: Units::default(),
            range: Range::default(),
            scaling: None,
            sort: None,
            logarithmic: false,
            label_orientation: None,
        }
    }

    /// Column holding units, if units are read from the data.
    #[must_use]
    pub fn units_column(&self) -> Option<&str> {
        self.units.column.as_deref()
    }

    /// Whether values are ordered largest first.
    #[must_use]
    pub fn is_descending(&self) -> bool {
        self.sort == Some(SortOrder::Descending)
    }
}

/// Row filters of a plot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Filters {
    /// Conditions that must all hold.
    #[serde(default, deserialize_with = "null_as_default")]
    pub and: Vec<Filter>,
    /// Conditions of which at least one must hold.
    #[serde(default, deserialize_with = "null_as_default")]
    pub or: Vec<Filter>,
}

/// A `[column, value]` pair selecting the rows of one series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Series(pub String, pub Scalar);

/// A complete plot configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlotConfig {
    /// Chart kind.
    pub plot_type: PlotType,
    /// Chart title, also used to name output files.
    pub title: String,
    /// Horizontal axis.
    pub x_axis: Axis,
    /// Vertical axis.
    pub y_axis: Axis,
    /// Row filters.
    #[serde(default, deserialize_with = "null_as_default")]
    pub filters: Filters,
    /// Series to compare, all on the same column.
    #[serde(default, deserialize_with = "null_as_default")]
    pub series: Vec<Series>,
    /// Type name for every column used for plotting, filtering, or scaling.
    #[serde(default, deserialize_with = "null_as_default")]
    pub column_types: BTreeMap<String, String>,
    /// Additional columns written to the CSV output.
    #[serde(
        default,
        rename = "extra_columns_to_csv",
        deserialize_with = "null_as_default"
    )]
    pub extra_columns: Vec<String>,
}

impl PlotConfig {
    /// Reads and validates a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, and see [`PlotConfig::from_yaml`].
    pub fn from_path(path: &Path) -> Result<Self> {
        log::info!("reading plot configuration from {}...", path.display());
        let text = fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
        Self::from_yaml(&text)
    }

    /// Parses and validates a YAML configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigSyntax`] if the document does not have the expected structure, and [`Error::Config`]
    /// if it fails [`PlotConfig::validate`].
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        log::trace!("plot configuration: {config:#?}");
        Ok(config)
    }

    /// Empty configuration to be filled in, not valid as-is.
    #[must_use]
    pub fn template() -> Self {
        Self {
            plot_type: PlotType::Generic,
            title: String::new(),
            x_axis: Axis::empty(),
            y_axis: Axis {
                scaling: Some(Scaling::default()),
                ..Axis::empty()
            },
            filters: Filters::default(),
            series: Vec::new(),
            column_types: BTreeMap::new(),
            extra_columns: Vec::new(),
        }
    }

    /// Serializes this configuration to YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigSyntax`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Derives the filter and column lists used by the pipeline.
    #[must_use]
    pub fn plan(&self) -> PlotPlan {
        PlotPlan::new(self)
    }

    /// Drops declared types of columns the configuration no longer uses.
    pub fn prune_column_types(&mut self) {
        let used = self.plan().all_columns;
        self.column_types.retain(|column, _| used.contains(column));
    }

    /// Checks that the configuration is complete and consistent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let fail = |message: String| Err(Error::Config(message));

        if self.title.trim().is_empty() {
            return fail("missing plot title information".to_string());
        }

        for (name, axis) in [("x-axis", &self.x_axis), ("y-axis", &self.y_axis)] {
            if axis.value.trim().is_empty() {
                return fail(format!("missing {name} value information"));
            }
            if axis.units.column.is_some() && axis.units.custom.is_some() {
                return fail(format!(
                    "specify {name} units information as only one of 'column' or 'custom'"
                ));
            }
        }

        if self.x_axis.scaling.is_some() {
            return fail("scaling is only supported for the y-axis".to_string());
        }
        if let Some(scaling) = &self.y_axis.scaling {
            match (&scaling.column, scaling.custom) {
                (Some(_), Some(_)) => {
                    return fail(
                        "specify y-axis scaling information as only one of 'column' or 'custom'"
                            .to_string(),
                    )
                }
                (Some(column), None) => {
                    if column.name.trim().is_empty() {
                        return fail("scaling column must have a name".to_string());
                    }
                    if let Some(index) = column.series {
                        if index >= self.series.len() {
                            return fail(format!(
                                "scaling series index {index} is out of range for {} series",
                                self.series.len()
                            ));
                        }
                    }
                }
                (None, Some(custom)) if custom == 0.0 => {
                    return fail(format!(
                        "invalid custom scaling value (cannot divide by {custom})"
                    ))
                }
                _ => {}
            }
        }

        match self.plot_type {
            PlotType::Generic if self.series.len() == 1 => {
                return fail("number of series must be >= 2 for generic plot".to_string())
            }
            PlotType::Line if self.series.is_empty() => {
                return fail("number of series must be >= 1 for line plot".to_string())
            }
            _ => {}
        }
        let mut series_columns: Vec<&str> = self.series.iter().map(|s| s.0.as_str()).collect();
        series_columns.sort_unstable();
        series_columns.dedup();
        if series_columns.len() > 1 {
            return fail(
                "currently supporting grouping of series by only one column, please use a single \
                 column name in your series configuration"
                    .to_string(),
            );
        }

        if self.column_types.is_empty() {
            return fail("missing column types information".to_string());
        }

        Ok(())
    }
}

fn default_true() -> bool {
    true
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(b: &bool) -> bool {
    !b
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

//! Column-ordered in-memory table holding parsed perflog records.
//!
//! [`Frame`] supports the reshaping the post-processing pipeline needs: positional column insertion while flattening
//! dictionaries, row-wise concatenation of logs with different column sets, type casting, stable multi-column sorting
//! and masked selection.
//!
//! # Examples
//!
//! ```
//! use perflog_post::frame::{Column, DType, Frame, Value};
//!
//! let mut frame = Frame::default();
//! frame.push(Column::new("tasks", DType::Int, vec![Value::Int(2), Value::Int(1)])).unwrap();
//! frame.push(Column::new("flops_value", DType::Float, vec![Value::Float(8.0), Value::Float(4.0)])).unwrap();
//! frame.sort_by(&["tasks"]);
//!
//! assert_eq!(frame.column("tasks").unwrap().values, vec![Value::Int(1), Value::Int(2)]);
//! assert_eq!(frame.column("flops_value").unwrap().values, vec![Value::Float(4.0), Value::Float(8.0)]);
//! ```

use std::io;

use serde_json::{json, Map};
use tabled::{builder::Builder, settings::Style};

use crate::error::{Error, Result};

mod value;

pub use value::{parse_datetime, DType, Value};

/// A named, typed column.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    /// Column name, unique within a [`Frame`].
    pub name: String,
    /// Type every non-null value conforms to.
    pub dtype: DType,
    /// Cells, one per row.
    pub values: Vec<Value>,
}

impl Column {
    /// Creates a column from values already conforming to `dtype`.
    pub fn new(name: impl Into<String>, dtype: DType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            dtype,
            values,
        }
    }

    /// Creates a column inferring its type from heterogeneous values.
    ///
    /// All-integer columns stay integers, mixed numeric columns become floats, anything else is rendered as text.
    pub fn from_values(name: impl Into<String>, values: Vec<Value>) -> Self {
        let dtype = values
            .iter()
            .filter_map(Value::dtype)
            .reduce(DType::unify)
            .unwrap_or(DType::Str);
        let values = values.into_iter().map(|v| v.widen(dtype)).collect();
        Self::new(name, dtype, values)
    }

    /// Whether every cell is null.
    #[must_use]
    pub fn is_all_null(&self) -> bool {
        self.values.iter().all(Value::is_null)
    }

    /// Converts every cell to `dtype`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conversion`] for the first cell that cannot be converted.
    pub fn cast(self, dtype: DType) -> Result<Self> {
        if self.dtype == dtype {
            return Ok(self);
        }
        let values = self
            .values
            .into_iter()
            .map(|v| v.cast(dtype, &self.name))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(self.name, dtype, values))
    }

    /// Distinct non-null values in order of first appearance.
    #[must_use]
    pub fn unique(&self) -> Vec<&Value> {
        let mut seen: Vec<&Value> = Vec::new();
        for value in self.values.iter().filter(|v| !v.is_null()) {
            if !seen.contains(&value) {
                seen.push(value);
            }
        }
        seen
    }
}

/// Ordered collection of equally long [`Column`]s.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    columns: Vec<Column>,
}

impl Frame {
    /// Builds a frame from columns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateColumn`] if two columns share a name.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let mut frame = Self::default();
        for column in columns {
            frame.push(column)?;
        }
        Ok(frame)
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    /// Whether the frame has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Columns in order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Position of a column.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Whether a column exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Inserts a column at `index`, shifting later columns right.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateColumn`] if the name is taken.
    pub fn insert(&mut self, index: usize, column: Column) -> Result<()> {
        if self.contains(&column.name) {
            return Err(Error::DuplicateColumn(column.name));
        }
        debug_assert!(self.columns.is_empty() || column.values.len() == self.len());
        self.columns.insert(index.min(self.columns.len()), column);
        Ok(())
    }

    /// Appends a column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateColumn`] if the name is taken.
    pub fn push(&mut self, column: Column) -> Result<()> {
        self.insert(self.columns.len(), column)
    }

    /// Removes and returns a column.
    pub fn remove(&mut self, name: &str) -> Option<Column> {
        let index = self.position(name)?;
        Some(self.columns.remove(index))
    }

    /// Replaces the column of the same name in place, appending it if absent.
    pub fn replace(&mut self, column: Column) {
        match self.position(&column.name) {
            Some(index) => self.columns[index] = column,
            None => self.columns.push(column),
        }
    }

    /// Stacks frames vertically.
    ///
    /// Columns are ordered by first appearance, cells missing from a frame are null and columns whose types disagree
    /// are widened (see [`DType::unify`]).
    #[must_use]
    pub fn concat(frames: impl IntoIterator<Item = Frame>) -> Self {
        let frames: Vec<Frame> = frames.into_iter().collect();
        let total: usize = frames.iter().map(Frame::len).sum();

        let mut layout: Vec<(String, Option<DType>)> = Vec::new();
        for column in frames.iter().flat_map(|f| f.columns.iter()) {
            let dtype = (!column.is_all_null()).then_some(column.dtype);
            match layout.iter_mut().find(|(name, _)| *name == column.name) {
                Some((_, known)) => {
                    *known = match (*known, dtype) {
                        (Some(a), Some(b)) => Some(a.unify(b)),
                        (a, b) => a.or(b),
                    };
                }
                None => layout.push((column.name.clone(), dtype)),
            }
        }

        let columns = layout
            .into_iter()
            .map(|(name, dtype)| {
                let dtype = dtype.unwrap_or(DType::Str);
                let mut values = Vec::with_capacity(total);
                for frame in &frames {
                    match frame.column(&name) {
                        Some(c) => values.extend(c.values.iter().cloned().map(|v| v.widen(dtype))),
                        None => values.extend(std::iter::repeat(Value::Null).take(frame.len())),
                    }
                }
                Column::new(name, dtype, values)
            })
            .collect();
        Self { columns }
    }

    /// Rows at the given indices, in that order.
    #[must_use]
    pub fn take(&self, indices: &[usize]) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .map(|c| {
                    Column::new(
                        c.name.clone(),
                        c.dtype,
                        indices.iter().map(|&i| c.values[i].clone()).collect(),
                    )
                })
                .collect(),
        }
    }

    /// Sub-frame of the named columns restricted to rows whose mask bit is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidColumns`] listing every name not present.
    pub fn select(&self, names: &[String], mask: &[bool]) -> Result<Self> {
        let missing: Vec<String> = names.iter().filter(|n| !self.contains(n)).cloned().collect();
        if !missing.is_empty() {
            return Err(Error::InvalidColumns(missing));
        }
        let indices: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, keep)| keep.then_some(i))
            .collect();
        let subset = Self {
            columns: names
                .iter()
                .filter_map(|n| self.column(n).cloned())
                .collect(),
        };
        Ok(subset.take(&indices))
    }

    /// Stable ascending sort on the named columns, nulls last. Unknown names are ignored.
    pub fn sort_by(&mut self, names: &[&str]) {
        let keys: Vec<&Column> = names.iter().filter_map(|n| self.column(n)).collect();
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| {
            keys.iter()
                .map(|c| c.values[a].sort_cmp(&c.values[b]))
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        *self = self.take(&order);
    }

    /// Renders the frame as a markdown table.
    #[must_use]
    pub fn to_table(&self) -> String {
        let mut builder = Builder::default();
        let mut header = vec![String::new()];
        header.extend(self.column_names().map(str::to_string));
        builder.set_header(header);
        for row in 0..self.len() {
            let mut record = vec![row.to_string()];
            record.extend(self.columns.iter().map(|c| c.values[row].to_string()));
            builder.push_record(record);
        }
        let mut table = builder.build();
        table.with(Style::markdown());
        table.to_string()
    }

    /// Writes the frame as comma separated values with a header line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Csv`] if `writer` fails.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(self.column_names())?;
        for row in 0..self.len() {
            writer.write_record(self.columns.iter().map(|c| c.values[row].to_string()))?;
        }
        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    /// JSON object mapping each column name to its list of values.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let map: Map<String, serde_json::Value> = self
            .columns
            .iter()
            .map(|c| (c.name.clone(), json!(c.values)))
            .collect();
        serde_json::Value::Object(map)
    }
}

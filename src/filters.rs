//! Row filters and the boolean masks they produce.
//!
//! A [`Filter`] is a `[column, operator, value]` triple as written in a plot configuration. Applying it with
//! [`row_filter`] yields one boolean per row. [`combine`] folds the configured `and`, `or`, and series filters into
//! the final row selection.
//!
//! # Examples
//!
//! ```
//! use perflog_post::config::Scalar;
//! use perflog_post::filters::{row_filter, Filter, Operator};
//! use perflog_post::frame::{Column, DType, Frame, Value};
//!
//! let frame = Frame::from_columns(vec![
//!     Column::new("tasks", DType::Int, vec![Value::Int(1), Value::Int(2), Value::Int(4)]),
//! ]).unwrap();
//!
//! let filter = Filter("tasks".to_string(), Operator::Ge, Some(Scalar::Int(2)));
//! assert_eq!(row_filter(&frame, &filter).unwrap(), vec![false, true, true]);
//! ```

use std::{
    cmp::Ordering,
    fmt::{self, Display, Formatter},
};

use serde::{Deserialize, Serialize};

use crate::{
    config::Scalar,
    error::{Error, Result},
    frame::{Frame, Value},
};

/// Boolean row selection, one entry per row.
pub type Mask = Vec<bool>;

/// Comparison operator of a [`Filter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `==`
    #[serde(rename = "==")]
    Eq,
    /// `!=`
    #[serde(rename = "!=")]
    Ne,
    /// `<`
    #[serde(rename = "<")]
    Lt,
    /// `>`
    #[serde(rename = ">")]
    Gt,
    /// `<=`
    #[serde(rename = "<=")]
    Le,
    /// `>=`
    #[serde(rename = ">=")]
    Ge,
}

impl Operator {
    /// Whether `ordering` of a cell relative to the filter value satisfies this operator.
    #[must_use]
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering.is_eq(),
            Self::Ne => ordering.is_ne(),
            Self::Lt => ordering.is_lt(),
            Self::Gt => ordering.is_gt(),
            Self::Le => ordering.is_le(),
            Self::Ge => ordering.is_ge(),
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
        };
        write!(f, "{symbol}")
    }
}

/// A `[column, operator, value]` row condition. A missing value tests for nulls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Filter(pub String, pub Operator, pub Option<Scalar>);

impl Filter {
    /// Column the condition applies to.
    #[must_use]
    pub fn column(&self) -> &str {
        &self.0
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.2 {
            Some(value) => write!(f, "{} {} {value}", self.0, self.1),
            None => write!(f, "{} {} None", self.0, self.1),
        }
    }
}

/// Evaluates a filter against every row of `frame`.
///
/// The filter value is interpreted as the column's type before comparing. Null cells never satisfy a comparison,
/// except under `!=`. A filter without a value selects null cells under `==` and non-null cells otherwise.
///
/// # Errors
///
/// Returns [`Error::InvalidColumns`] if the column does not exist and [`Error::Conversion`] if the value is not valid
/// for the column's type.
pub fn row_filter(frame: &Frame, filter: &Filter) -> Result<Mask> {
    let Filter(name, operator, value) = filter;
    log::debug!("applying row filter condition: {filter}");

    let column = frame
        .column(name)
        .ok_or_else(|| Error::InvalidColumns(vec![name.clone()]))?;

    let mask: Mask = match value {
        None => column
            .values
            .iter()
            .map(|v| v.is_null() == (*operator == Operator::Eq))
            .collect(),
        Some(value) => {
            let target = Value::coerce(&value.to_string(), column.dtype, name)?;
            column
                .values
                .iter()
                .map(|v| match v.compare(&target) {
                    Some(ordering) => operator.holds(ordering),
                    None => *operator == Operator::Ne,
                })
                .collect()
        }
    };

    log::trace!("mask for {filter}: {mask:?}");
    Ok(mask)
}

/// Element-wise conjunction.
#[must_use]
pub fn and(a: &[bool], b: &[bool]) -> Mask {
    a.iter().zip(b).map(|(x, y)| *x && *y).collect()
}

/// Element-wise disjunction.
#[must_use]
pub fn or(a: &[bool], b: &[bool]) -> Mask {
    a.iter().zip(b).map(|(x, y)| *x || *y).collect()
}

/// Builds the final row selection.
///
/// All `and` filters must hold, at least one `or` filter must hold (if any are given), and at least one series
/// filter must hold (if any are given).
///
/// # Errors
///
/// Propagates errors from [`row_filter`].
pub fn combine(
    frame: &Frame,
    and_filters: &[Filter],
    or_filters: &[Filter],
    series_filters: &[Filter],
) -> Result<Mask> {
    let mut mask = vec![true; frame.len()];
    for filter in and_filters {
        mask = and(&mask, &row_filter(frame, filter)?);
    }
    for group in [or_filters, series_filters] {
        if group.is_empty() {
            continue;
        }
        let mut any = vec![false; frame.len()];
        for filter in group {
            any = or(&any, &row_filter(frame, filter)?);
        }
        mask = and(&mask, &any);
    }
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Column, DType};

    fn frame() -> Frame {
        Frame::from_columns(vec![
            Column::new(
                "tasks",
                DType::Int,
                vec![Value::Int(1), Value::Int(2), Value::Int(4), Value::Null],
            ),
            Column::new(
                "environ",
                DType::Str,
                ["gnu", "intel", "gnu", "cray"]
                    .iter()
                    .map(|s| Value::Str((*s).to_string()))
                    .collect(),
            ),
        ])
        .unwrap()
    }

    fn filter(column: &str, operator: Operator, value: Option<Scalar>) -> Filter {
        Filter(column.to_string(), operator, value)
    }

    #[test]
    fn null_cells_only_satisfy_not_equal() {
        let f = frame();
        assert_eq!(
            row_filter(&f, &filter("tasks", Operator::Lt, Some(Scalar::Int(3)))).unwrap(),
            vec![true, true, false, false]
        );
        assert_eq!(
            row_filter(&f, &filter("tasks", Operator::Ne, Some(Scalar::Int(2)))).unwrap(),
            vec![true, false, true, true]
        );
    }

    #[test]
    fn missing_values_test_for_nulls() {
        let f = frame();
        assert_eq!(
            row_filter(&f, &filter("tasks", Operator::Eq, None)).unwrap(),
            vec![false, false, false, true]
        );
        assert_eq!(
            row_filter(&f, &filter("tasks", Operator::Ne, None)).unwrap(),
            vec![true, true, true, false]
        );
    }

    #[test]
    fn values_are_interpreted_as_the_column_type() {
        let f = frame();
        let err = row_filter(&f, &filter("tasks", Operator::Eq, Some(Scalar::Str("two".into()))))
            .unwrap_err();
        assert!(matches!(err, Error::Conversion { column, .. } if column == "tasks"));

        assert_eq!(
            row_filter(
                &f,
                &filter("environ", Operator::Eq, Some(Scalar::Str("gnu".into())))
            )
            .unwrap(),
            vec![true, false, true, false]
        );
    }

    #[test]
    fn unknown_columns_are_reported() {
        let err = row_filter(&frame(), &filter("fake_column", Operator::Eq, Some(Scalar::Int(2))))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidColumns(cols) if cols == vec!["fake_column"]));
    }

    #[test]
    fn combine_ands_groups_together() {
        let f = frame();
        let and_filters = [filter("tasks", Operator::Ge, Some(Scalar::Int(1)))];
        let or_filters = [
            filter("tasks", Operator::Eq, Some(Scalar::Int(1))),
            filter("tasks", Operator::Eq, Some(Scalar::Int(4))),
        ];
        let series = [filter("environ", Operator::Eq, Some(Scalar::Str("gnu".into())))];

        assert_eq!(
            combine(&f, &and_filters, &or_filters, &series).unwrap(),
            vec![true, false, true, false]
        );
        assert_eq!(combine(&f, &[], &[], &[]).unwrap(), vec![true; 4]);
    }
}

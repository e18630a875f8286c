//! Error type shared by every stage of the post-processing pipeline.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// All the ways post-processing can fail.
///
/// Variants are grouped by the pipeline stage that produces them. The binary wraps these in [`anyhow::Error`] with
/// additional context, the library surfaces them as-is so callers can match on the failure class.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying I/O failure while reading a perflog or writing an output.
    #[error("{}: {source}", path.display())]
    Io {
        /// File or directory being accessed.
        path: PathBuf,
        /// Originating error.
        source: io::Error,
    },

    /// A table could not be written as CSV.
    #[error("could not write CSV: {0}")]
    Csv(#[from] csv::Error),

    /// The log path is neither a file nor a directory.
    #[error("no such file or directory: {}", .0.display())]
    NotFound(PathBuf),

    /// The log path resolved to no usable perflog files.
    #[error("no perflogs found in {}: {reason}", path.display())]
    NoPerflogs {
        /// Searched path.
        path: PathBuf,
        /// Why nothing was found.
        reason: String,
    },

    /// A perflog header lacks one of the fields every record needs.
    #[error("perflog {} is missing one or more required fields {required:?}", path.display())]
    MissingFields {
        /// Offending perflog.
        path: PathBuf,
        /// Patterns that must all match at least one header field.
        required: Vec<&'static str>,
    },

    /// A perflog line could not be split into the header's fields.
    #[error("{}:{line}: {reason}", path.display())]
    MalformedLine {
        /// Offending perflog.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// What went wrong.
        reason: String,
    },

    /// A display name carried a parameter suffix that is not `param=value`.
    #[error("malformed display name '{0}': parameters must be of the form %<param>=<value>")]
    MalformedDisplayName(String),

    /// A dictionary-valued field did not hold a JSON object.
    #[error("could not decode column '{column}' as a JSON object: {reason}")]
    MalformedDict {
        /// Column holding the dictionary.
        column: String,
        /// Decoder message.
        reason: String,
    },

    /// Inserting a column would shadow an existing one.
    #[error("column '{0}' already exists")]
    DuplicateColumn(String),

    /// The plot configuration is incomplete or contradictory.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The plot configuration could not be decoded.
    #[error("could not parse configuration: {0}")]
    ConfigSyntax(#[from] serde_yaml::Error),

    /// Columns referenced by the configuration do not exist in the data.
    #[error("could not find columns {0:?}")]
    InvalidColumns(Vec<String>),

    /// A referenced column has no declared type.
    #[error("could not find user-specified type for column '{0}'")]
    MissingType(String),

    /// A declared type name is not one of the supported types.
    #[error("unsupported user-specified type '{dtype}' for column '{column}'")]
    UnsupportedType {
        /// Column the type was declared for.
        column: String,
        /// Declared type name.
        dtype: String,
    },

    /// A value could not be interpreted as the column's type.
    #[error("could not convert '{value}' to {dtype} for column '{column}'")]
    Conversion {
        /// Column being converted or compared against.
        column: String,
        /// Text of the offending value.
        value: String,
        /// Target type name.
        dtype: String,
    },

    /// Filtering removed every row.
    #[error("filtered dataframe is empty")]
    EmptyData,

    /// More rows survived filtering than there are x-axis points to plot.
    #[error(
        "unexpected number of rows ({rows}) does not match number of unique x-axis values per \
         series ({expected})"
    )]
    RowCount {
        /// Rows left after filtering.
        rows: usize,
        /// Distinct x values times series combinations.
        expected: usize,
    },

    /// The y axis could not be scaled as configured.
    #[error("scaling failed: {0}")]
    Scaling(String),

    /// The selected data cannot be drawn.
    #[error("plotting failed: {0}")]
    Plot(String),

    /// A report was requested for data that cannot be pivoted.
    #[error("report failed: {0}")]
    Report(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

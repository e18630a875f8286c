//! Post-processing of ReFrame performance logs.
//!
//! perflog-post turns the perflogs written by ReFrame benchmark runs into tables and charts. It reads every perflog
//! under a directory, flattens the structured fields ReFrame records (test parameters in the display name, extra
//! resources, environment variables, Spack specs) into plain columns, and then selects, scales and plots the rows
//! described by a YAML plot configuration.
//!
//! # Usage
//! perflog-post is primarily designed to be used as an executable, but the pipeline stages are exposed as a library
//! for use in larger tooling.
//!
//! ## As an executable
//! Refer to the output of the `--help` flag for information on how to use the perflog-post binary:
//! ```console
//! $ cargo install perflog-post
//! $ perflog-post --help
//! Post-processing of ReFrame performance logs
//!
//! Usage: perflog-post [OPTIONS] <COMMAND>
//!
//! Commands:
//!   plot      Plot perflog data as described by a configuration file
//!   report    Tabulate the latest result of every test on every system
//!   template  Print an empty plot configuration to fill in
//!   help      Print this message or the help of the given subcommand(s)
//!
//! Options:
//!   -d, --debug    Log debug information
//!   -v, --verbose  Log everything, including full data dumps
//!   -h, --help     Print help
//!   -V, --version  Print version
//! ```
//!
//! A plot is produced from a perflog directory and a configuration file:
//! ```console
//! $ perflog-post template --output sombrero_config.yaml
//! $ perflog-post plot perflogs/ sombrero_config.yaml --output plots/
//! ```
//! This writes `<title>.svg` and `<title>.csv` to the output directory, spaces in the title replaced by underscores.
//!
//! ## As a library
//! ```no_run
//! use std::path::PathBuf;
//!
//! use perflog_post::{run_post_processing, Options, PlotConfig};
//!
//! let config = PlotConfig::from_path(&PathBuf::from("sombrero_config.yaml")).expect("invalid plot configuration");
//! let output = run_post_processing(&PathBuf::from("perflogs"), &config, &Options::new("plots"))
//!     .expect("could not post-process perflogs");
//! println!("{}", output.selection.plot.to_table());
//! ```
//!
//! # Plot configuration
//! A configuration names the column plotted on each axis, where the axis units come from, the row filters, the
//! series to compare and the type of every column involved:
//! ```yaml
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
//!   scaling: {column: {name: flops_value, series: 0, x_value: 1}}
//! filters:
//!   and: [[cpus_per_task, "==", 2]]
//!   or: []
//! series: [[environ, gnu], [environ, intel]]
//! column_types: {tasks: int, flops_value: float, flops_unit: str, cpus_per_task: int, environ: str}
//! extra_columns_to_csv: [job_completion_time]
//! ```
//! See [`config`] for the meaning of every field.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]

pub mod config;
pub mod error;
pub mod filters;
pub mod frame;
pub mod perflogs;
pub mod plots;
pub mod processing;
pub mod report;

pub use config::PlotConfig;
pub use error::{Error, Result};
pub use frame::Frame;
pub use processing::{process, run_post_processing, Options};

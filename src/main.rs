use std::{fs, path::PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use env_logger::Env;

use perflog_post::{
    config::PlotConfig,
    perflogs,
    processing::{run_post_processing, Options},
    report::report,
};

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Log debug information
    #[arg(short, long, global = true)]
    debug: bool,

    /// Log everything, including full data dumps
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plot perflog data as described by a configuration file
    Plot {
        /// Path to a perflog file or a directory containing perflogs
        log_path: PathBuf,

        /// Path to a plot configuration file
        config_path: PathBuf,

        /// Path to a directory to write the plot and CSV in
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Only read perflogs of tests whose name matches this glob pattern
        #[arg(short, long)]
        test: Option<String>,
    },

    /// Tabulate the latest result of every test on every system
    Report {
        /// Path to a perflog file or a directory containing perflogs
        log_path: PathBuf,

        /// Metric to report, required if the perflogs record more than one
        #[arg(short, long)]
        metric: Option<String>,

        /// Only report tests whose name matches this glob pattern
        #[arg(short, long)]
        test: Option<String>,

        /// Path to a CSV file to write the table to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print an empty plot configuration to fill in
    Template {
        /// Path to write the configuration to instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    human_panic::setup_panic!();

    let args = Args::parse();

    let level = if args.verbose {
        "trace"
    } else if args.debug {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    match args.command {
        Command::Plot {
            log_path,
            config_path,
            output,
            test,
        } => {
            let config = PlotConfig::from_path(&config_path).context(format!(
                "could not load plot configuration {}",
                config_path.to_string_lossy()
            ))?;
            let options = Options {
                output_dir: output,
                test_pattern: test,
                save: true,
            };
            run_post_processing(&log_path, &config, &options).map_err(|err| {
                log::error!("{err}");
                err
            })?;
        }
        Command::Report {
            log_path,
            metric,
            test,
            output,
        } => {
            let perflogs = perflogs::load(&log_path, None).context(format!(
                "could not load perflogs from {}",
                log_path.to_string_lossy()
            ))?;
            let table = report(&perflogs.frame, metric.as_deref(), test.as_deref())?;
            println!("{}", table.to_table());

            if let Some(output) = output {
                log::info!("writing report to {}...", output.to_string_lossy());
                let file = fs::File::create(&output).context(format!(
                    "could not create output file {}",
                    output.to_string_lossy()
                ))?;
                table.write_csv(file).context(format!(
                    "could not write to output file {}",
                    output.to_string_lossy()
                ))?;
            }
        }
        Command::Template { output } => {
            let template = PlotConfig::template().to_yaml()?;
            match output {
                Some(output) => {
                    log::info!("writing configuration template to {}...", output.to_string_lossy());
                    fs::write(&output, template).context(format!(
                        "could not write to output file {}",
                        output.to_string_lossy()
                    ))?;
                }
                None => print!("{template}"),
            }
        }
    }

    Ok(())
}

use std::{
    fs,
    path::{Path, PathBuf},
};

use perflog_post::{
    config::PlotConfig,
    frame::{DType, Value},
    perflogs::{self, read_perflog},
    processing::{run_post_processing, Options, Output},
    report::report,
    Error,
};

fn data(path: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(path)
}

fn perflog_dir() -> PathBuf {
    data("perflogs/archer2/compute")
}

fn sombrero_log() -> PathBuf {
    perflog_dir().join("SombreroBenchmark.log")
}

fn output_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("perflog-post-{}-{name}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

fn config() -> String {
    fs::read_to_string(data("sombrero_config.yaml")).unwrap()
}

fn run(log_path: &Path, config: &str, name: &str) -> Result<Output, Error> {
    let config = PlotConfig::from_yaml(config)?;
    run_post_processing(log_path, &config, &Options::new(output_dir(name)))
}

#[test]
fn reads_a_complete_perflog() {
    let frame = read_perflog(&sombrero_log()).unwrap();

    assert_eq!(
        frame.column_names().collect::<Vec<_>>(),
        vec![
            "job_completion_time",
            "version",
            "info",
            "jobid",
            "num_tasks",
            "num_cpus_per_task",
            "num_tasks_per_node",
            "num_gpus_per_node",
            "flops_value",
            "flops_unit",
            "flops_ref",
            "flops_lower_thres",
            "flops_upper_thres",
            "spack_spec",
            "test_name",
            "tasks",
            "cpus_per_task",
            "system",
            "partition",
            "environ",
            "OMP_NUM_THREADS",
            "tags",
        ]
    );
    assert_eq!(frame.len(), 4);
    for column in frame.columns() {
        let unset = ["num_gpus_per_node", "flops_upper_thres"].contains(&column.name.as_str());
        assert_eq!(column.is_all_null(), unset, "{}", column.name);
    }
    let gpus = frame.column("num_gpus_per_node").unwrap().clone().cast(DType::Int).unwrap();
    assert_eq!(gpus.values, vec![Value::Null; 4]);
    assert_eq!(
        frame.column("test_name").unwrap().values[0],
        Value::Str("SombreroBenchmark".into())
    );
    assert_eq!(frame.column("tags").unwrap().values[0], Value::Str("example".into()));
}

#[test]
fn incomplete_perflogs_are_rejected() {
    let err = read_perflog(&perflog_dir().join("SombreroBenchmarkIncomplete.log")).unwrap_err();
    assert!(matches!(err, Error::MissingFields { .. }));

    let incomplete = perflog_dir().join("SombreroBenchmarkIncomplete.log");
    let err = perflogs::load(&incomplete, None).unwrap_err();
    assert!(matches!(err, Error::NoPerflogs { .. }));
}

#[test]
fn directories_merge_logs_with_different_fields() {
    let logs = perflogs::load(&data("perflogs"), None).unwrap();

    assert_eq!(logs.log_files.len(), 2);
    assert_eq!(logs.discarded.len(), 1);
    assert_eq!(logs.frame.len(), 8);

    let ids = &logs.frame.column("id").unwrap().values;
    assert_eq!(ids.iter().filter(|v| v.is_null()).count(), 4);

    let only_changed = perflogs::load(&data("perflogs"), Some("*Changed")).unwrap();
    assert_eq!(only_changed.frame.len(), 4);
}

#[test]
fn plots_a_filtered_selection() {
    let output = run(&sombrero_log(), &config(), "filtered").unwrap();

    let plot = &output.selection.plot;
    assert_eq!(
        plot.column_names().collect::<Vec<_>>(),
        vec!["tasks", "flops_value", "flops_unit"]
    );
    assert_eq!(plot.len(), 1);
    assert_eq!(plot.column("tasks").unwrap().dtype, DType::Int);
    assert_eq!(plot.column("flops_value").unwrap().values, vec![Value::Float(2.94)]);

    let svg = fs::read_to_string(output.plot_path.unwrap()).unwrap();
    assert!(svg.contains("<title>Sombrero Flops</title>"));
    let csv = fs::read_to_string(output.csv_path.as_ref().unwrap()).unwrap();
    assert_eq!(
        csv,
        "tasks,flops_value,flops_unit,job_completion_time,OMP_NUM_THREADS\n\
         2,2.94,Gflops/s,2023-05-30T14:53:35,2\n"
    );
    assert!(output.csv_path.unwrap().ends_with("Sombrero_Flops.csv"));
}

#[test]
fn unknown_columns_are_errors() {
    let unknown_x = config().replace("value: tasks", "value: fake_column");
    let err = run(&sombrero_log(), &unknown_x, "x").unwrap_err();
    assert!(matches!(err, Error::InvalidColumns(cols) if cols == vec!["fake_column"]));

    let err = run(
        &sombrero_log(),
        &config().replace("[cpus_per_task, \"==\", 2]", "[fake_column, \"==\", 2]"),
        "filter",
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidColumns(_)));
}

#[test]
fn filter_values_must_match_column_types() {
    let err = run(
        &sombrero_log(),
        &config().replace("[tasks, \">\", 1]", "[tasks, \">\", one]"),
        "value",
    )
    .unwrap_err();
    assert!(matches!(err, Error::Conversion { column, .. } if column == "tasks"));

    let err = run(
        &sombrero_log(),
        &config().replace("[tasks, \">\", 1]", "[tasks, \"!!\", 1]"),
        "operator",
    )
    .unwrap_err();
    assert!(matches!(err, Error::ConfigSyntax(_)));
}

#[test]
fn unset_fields_match_null_filters() {
    let with_null_filter = |operator: &str| {
        config()
            .replace(
                "    - [cpus_per_task, \"==\", 2]\n",
                &format!(
                    "    - [cpus_per_task, \"==\", 2]\n    - [num_gpus_per_node, \"{operator}\", null]\n"
                ),
            )
            .replace("  cpus_per_task: int\n", "  cpus_per_task: int\n  num_gpus_per_node: int\n")
    };

    let output = run(&sombrero_log(), &with_null_filter("=="), "null").unwrap();
    assert_eq!(
        output.selection.plot.column("flops_value").unwrap().values,
        vec![Value::Float(2.94)]
    );

    let err = run(&sombrero_log(), &with_null_filter("!="), "not-null").unwrap_err();
    assert!(matches!(err, Error::EmptyData));
}

#[test]
fn filtering_out_every_row_is_an_error() {
    let err = run(
        &sombrero_log(),
        &config().replace("[tasks, \">\", 1]", "[tasks, \">\", 2]"),
        "empty",
    )
    .unwrap_err();
    assert!(matches!(err, Error::EmptyData));
}

#[test]
fn unfiltered_repeats_fail_the_row_count() {
    let unfiltered = config().replace(
        "  and:\n    - [tasks, \">\", 1]\n    - [cpus_per_task, \"==\", 2]\n",
        "  and: []\n",
    );

    let err = run(&sombrero_log(), &unfiltered, "single").unwrap_err();
    assert!(matches!(err, Error::RowCount { rows: 4, expected: 2 }));

    let err = run(&data("perflogs"), &unfiltered, "directory").unwrap_err();
    assert!(matches!(err, Error::RowCount { rows: 8, .. }));
}

#[test]
fn line_plots_scale_by_a_baseline() {
    let config = fs::read_to_string(data("sombrero_line_config.yaml")).unwrap();
    let output = run(&sombrero_log(), &config, "line").unwrap();

    let values: Vec<f64> = output
        .selection
        .plot
        .column("flops_value")
        .unwrap()
        .values
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect();
    // sorted by tasks, then cpus_per_task; everything divided by the 1 task, 1 cpu result
    let expected = [1.11, 1.56, 1.73, 2.94].map(|v| v / 1.11);
    assert_eq!(values, expected.to_vec());

    assert_eq!(output.svg.matches("<polyline").count(), 2);
    assert!(output.svg.contains(">Cpus Per Task = 2</tspan>"));
    assert!(output.svg.contains(">Scaled by Flops Value</tspan>"));
}

#[test]
fn reports_the_latest_result_per_system() {
    let logs = perflogs::load(&data("perflogs"), None).unwrap();
    let table = report(&logs.frame, None, None).unwrap();

    assert_eq!(
        table.column_names().collect::<Vec<_>>(),
        vec!["test_name", "archer2:compute"]
    );
    assert_eq!(table.column("archer2:compute").unwrap().values, vec![Value::Float(2.94)]);
}

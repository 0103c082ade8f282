use perf_pipeline::ingestion::csv::read_csv_path;
use perf_pipeline::ingestion::json::{read_json_path, to_json_records};
use perf_pipeline::ingestion::{
    from_json_records, CsvFetcher, Fetcher, FlatOptions, HydraFetcher, HydraOptions, JsonFetcher,
};
use perf_pipeline::types::{DataType, Value};
use perf_pipeline::PipelineError;

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn json_and_csv_fixtures_load_the_same_table() {
    let options = FlatOptions::default().with_eval_id(3);
    let from_json = read_json_path(fixture("results.json"), &options).unwrap();
    let from_csv = read_csv_path(fixture("results.csv"), &options).unwrap();

    assert_eq!(from_json.column_names(), vec!["project", "toolchain", "freq", "lut"]);
    assert_eq!(from_json, from_csv);
    assert_eq!(from_csv.row_count(), 5);
    assert_eq!(from_csv.eval_id(), Some(3));
    let types: Vec<DataType> = from_csv.table().schema().fields.iter().map(|f| f.data_type).collect();
    assert_eq!(types, vec![DataType::Utf8, DataType::Utf8, DataType::Int64, DataType::Int64]);
}

#[test]
fn fetchers_apply_mapping() {
    let options = FlatOptions::default().with_mapping([("freq", "max_freq"), ("project", "design")]);
    let fetchers: Vec<Box<dyn Fetcher>> = vec![
        Box::new(JsonFetcher::from_path(fixture("results.json"), options.clone())),
        Box::new(CsvFetcher::new(fixture("results.csv"), options)),
    ];
    for fetcher in fetchers {
        let eval = fetcher.fetch().unwrap();
        assert_eq!(eval.column_names(), vec!["max_freq", "design"]);
        assert_eq!(eval.table().get(1, "max_freq"), Some(&Value::Int64(120)));
        assert_eq!(eval.eval_id(), None);
    }

    let err = JsonFetcher::from_path(
        fixture("results.json"),
        FlatOptions::default().with_mapping([("no_such_column", "x")]),
    )
    .fetch()
    .unwrap_err();
    assert!(matches!(err, PipelineError::Column { .. }));
}

#[test]
fn missing_files_surface_io_errors() {
    let json = read_json_path(fixture("missing.json"), &FlatOptions::default()).unwrap_err();
    assert!(matches!(json, PipelineError::Io(_)));

    let csv = CsvFetcher::new(fixture("missing.csv"), FlatOptions::default()).fetch().unwrap_err();
    match csv {
        PipelineError::Csv(e) => assert!(matches!(e.kind(), csv::ErrorKind::Io(_))),
        other => panic!("expected csv error, got {other:?}"),
    }
}

#[test]
fn json_interchange_round_trips_fixture() {
    let eval = read_json_path(fixture("results.json"), &FlatOptions::default()).unwrap();
    let text = to_json_records(&eval).unwrap();
    assert_eq!(from_json_records(&text, None).unwrap(), eval);
}

#[test]
fn hydra_fixture_keeps_successful_builds() {
    let options = HydraOptions {
        eval_id: Some(1234),
        ..HydraOptions::default()
    };
    let eval = HydraFetcher::from_path(fixture("builds.json"), options).unwrap().fetch().unwrap();

    assert_eq!(eval.row_count(), 2);
    assert_eq!(eval.eval_id(), Some(1234));
    let freqs: Vec<Value> = eval.table().column("freq").unwrap().cloned().collect();
    // The icebreaker build predates the switch to Hz, so it is already in MHz.
    assert_eq!(freqs, vec![Value::Float64(125.0), Value::Float64(48.5)]);

    let names = eval.column_names();
    for expected in ["project", "resources.LUT", "runtime.route", "versions.vpr", "versions.nextpnr-ice40"] {
        assert!(names.contains(&expected), "missing column {expected}: {names:?}");
    }
    assert_eq!(eval.table().get(0, "resources.LUT"), Some(&Value::Int64(120)));
    assert_eq!(eval.table().get(1, "versions.vpr"), Some(&Value::Null));
    assert_eq!(eval.table().get(0, "versions.nextpnr-ice40"), Some(&Value::Null));
}

#[test]
fn hydra_mapping_selects_and_renames() {
    let options = HydraOptions::default().with_mapping([("project", "project"), ("resources.LUT", "lut")]);
    let eval = HydraFetcher::from_path(fixture("builds.json"), options).unwrap().fetch().unwrap();

    assert_eq!(
        eval.column_names(),
        vec!["project", "lut", "freq", "versions.vpr", "versions.yosys", "versions.nextpnr-ice40"]
    );
    assert_eq!(eval.table().get(1, "lut"), Some(&Value::Int64(150)));
    assert_eq!(eval.table().get(1, "versions.yosys"), Some(&Value::from("0.9")));

    let err = HydraFetcher::from_path(
        fixture("builds.json"),
        HydraOptions::default().with_mapping([("resources.BRAM", "bram")]),
    )
    .unwrap()
    .fetch()
    .unwrap_err();
    assert!(matches!(err, PipelineError::Column { .. }));
}

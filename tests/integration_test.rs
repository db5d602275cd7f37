//! Integration tests for target-yaml

use serde_json::json;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use target_yaml::error::ErrorKind;
use target_yaml::{Config, OverwriteBehavior, Record, YamlSink};

fn record(value: serde_json::Value) -> Record {
    serde_json::from_value(value).unwrap()
}

fn yaml(text: &str) -> Value {
    serde_yaml::from_str(text).unwrap()
}

fn read(path: &Path) -> Value {
    yaml(&std::fs::read_to_string(path).unwrap())
}

fn scheme(dir: &TempDir) -> String {
    dir.path()
        .join("{stream_name}.yml")
        .to_string_lossy()
        .into_owned()
}

fn destination(dir: &TempDir, stream: &str) -> PathBuf {
    dir.path().join(format!("{stream}.yml"))
}

fn run_stream(
    config: &Config,
    stream: &str,
    records: Vec<serde_json::Value>,
) -> Result<(), ErrorKind> {
    let mut sink = YamlSink::new(stream, config).map_err(|e| e.kind())?;
    for value in records {
        sink.process_record(record(value)).map_err(|e| e.kind())?;
    }
    sink.finish().map(|_| ()).map_err(|e| e.kind())
}

mod end_to_end_tests {
    use super::*;

    #[test]
    fn test_keyed_metrics_template() {
        let dir = TempDir::new().unwrap();
        let config = Config::from_yaml(&format!(
            r#"
file_naming_scheme: "{}"
record_insert_jsonpath: "$.metrics"
default_yaml_template: "metrics: {{}}"
record_key_property_name: id
"#,
            scheme(&dir)
        ))
        .unwrap();

        run_stream(
            &config,
            "metrics",
            vec![json!({"id": "x", "v": 1}), json!({"id": "y", "v": 2})],
        )
        .unwrap();

        assert_eq!(
            read(&destination(&dir, "metrics")),
            yaml("metrics: {x: {v: 1}, y: {v: 2}}")
        );
    }

    #[test]
    fn test_no_template_no_file_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let config = Config::new(scheme(&dir));

        let err = run_stream(&config, "rows", vec![json!({"a": 1})]).unwrap_err();

        assert_eq!(err, ErrorKind::Configuration);
        assert!(!destination(&dir, "rows").exists());
    }

    #[test]
    fn test_keyed_second_run_overwrites_same_key() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::new(scheme(&dir));
        config.record_insert_jsonpath = "$.metrics".to_string();
        config.default_yaml_template = Some("metrics: {}".to_string());
        config.record_key_property_name = Some("id".to_string());

        run_stream(&config, "metrics", vec![json!({"id": "a", "v": 1})]).unwrap();
        run_stream(
            &config,
            "metrics",
            vec![json!({"id": "a", "v": 2}), json!({"id": "b", "v": 3})],
        )
        .unwrap();

        assert_eq!(
            read(&destination(&dir, "metrics")),
            yaml("metrics: {a: {v: 2}, b: {v: 3}}")
        );
    }

    #[test]
    fn test_append_across_runs_keeps_prior_records() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::new(scheme(&dir));
        config.record_insert_jsonpath = "$.rows".to_string();
        config.default_yaml_template = Some("title: report\nrows: []".to_string());

        run_stream(&config, "report", vec![json!({"n": 1}), json!({"n": 2})]).unwrap();
        run_stream(&config, "report", vec![json!({"n": 3})]).unwrap();

        assert_eq!(
            read(&destination(&dir, "report")),
            yaml("title: report\nrows: [{n: 1}, {n: 2}, {n: 3}]")
        );
    }

    #[test]
    fn test_replace_records_keeps_surrounding_document() {
        let dir = TempDir::new().unwrap();
        let path = destination(&dir, "report");
        std::fs::write(&path, "title: kept\nrows:\n  - {n: 1}\n  - {n: 2}\n").unwrap();

        let mut config = Config::new(scheme(&dir));
        config.record_insert_jsonpath = "$.rows".to_string();
        config.overwrite_behavior = OverwriteBehavior::ReplaceRecords;

        run_stream(&config, "report", vec![json!({"n": 9})]).unwrap();

        assert_eq!(read(&path), yaml("title: kept\nrows: [{n: 9}]"));
    }

    #[test]
    fn test_sorted_records() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::new(scheme(&dir));
        config.default_yaml_template = Some("[]".to_string());
        config.record_sort_property_name = Some("rank".to_string());

        run_stream(
            &config,
            "ranked",
            vec![json!({"rank": 3}), json!({"rank": 1}), json!({"rank": 2})],
        )
        .unwrap();

        assert_eq!(
            read(&destination(&dir, "ranked")),
            yaml("[{rank: 1}, {rank: 2}, {rank: 3}]")
        );
    }

    #[test]
    fn test_missing_sort_property_leaves_file_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = destination(&dir, "ranked");
        std::fs::write(&path, "- {rank: 0}\n").unwrap();

        let mut config = Config::new(scheme(&dir));
        config.record_sort_property_name = Some("rank".to_string());

        let err = run_stream(
            &config,
            "ranked",
            vec![json!({"rank": 1}), json!({"other": 2})],
        )
        .unwrap_err();

        assert_eq!(err, ErrorKind::MissingProperty);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "- {rank: 0}\n");
    }

    #[test]
    fn test_path_not_found() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::new(scheme(&dir));
        config.default_yaml_template = Some("metrics: {}".to_string());
        config.record_insert_jsonpath = "$.missing".to_string();

        let err = run_stream(&config, "rows", vec![json!({"a": 1})]).unwrap_err();

        assert_eq!(err, ErrorKind::PathNotFound);
    }

    #[test]
    fn test_key_property_on_sequence_is_shape_mismatch() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::new(scheme(&dir));
        config.default_yaml_template = Some("rows: []".to_string());
        config.record_insert_jsonpath = "$.rows".to_string();
        config.record_key_property_name = Some("id".to_string());

        let err = run_stream(&config, "rows", vec![json!({"id": "a"})]).unwrap_err();

        assert_eq!(err, ErrorKind::ShapeMismatch);
    }

    #[test]
    fn test_malformed_existing_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(destination(&dir, "rows"), "rows: [1, 2\n").unwrap();
        let config = Config::new(scheme(&dir));

        let err = run_stream(&config, "rows", vec![json!({"a": 1})]).unwrap_err();

        assert_eq!(err, ErrorKind::Parse);
    }

    #[test]
    fn test_streams_write_separate_files() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::new(scheme(&dir));
        config.default_yaml_template = Some("[]".to_string());

        run_stream(&config, "alpha", vec![json!({"s": "a"})]).unwrap();
        run_stream(&config, "beta", vec![json!({"s": "b"})]).unwrap();

        assert_eq!(read(&destination(&dir, "alpha")), yaml("[{s: a}]"));
        assert_eq!(read(&destination(&dir, "beta")), yaml("[{s: b}]"));
    }

    #[test]
    fn test_nested_record_values_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::new(scheme(&dir));
        config.default_yaml_template = Some("[]".to_string());

        run_stream(
            &config,
            "nested",
            vec![json!({
                "name": "n",
                "tags": ["a", "b"],
                "meta": {"ok": true, "ratio": 0.5, "none": null}
            })],
        )
        .unwrap();

        assert_eq!(
            read(&destination(&dir, "nested")),
            yaml("- name: n\n  tags: [a, b]\n  meta: {ok: true, ratio: 0.5, none: null}\n")
        );
    }
}

mod config_tests {
    use super::*;

    #[test]
    fn test_config_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            r#"
file_naming_scheme: "out/{stream_name}-{datestamp}.yml"
timestamp_timezone: America/New_York
overwrite_behavior: replace_file
default_yaml_template: "items: []"
record_insert_jsonpath: "$.items"
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.overwrite_behavior, OverwriteBehavior::ReplaceFile);
        assert_eq!(config.insert_path().unwrap().as_str(), "$.items");
        assert!(YamlSink::new("s", &config).is_ok());
    }

    #[test]
    fn test_config_file_with_dollar_prefixed_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            format!(
                r#"
file_naming_scheme: "{}"
record_insert_jsonpath: "$['$defs']"
default_yaml_template: "$schema: v1\n$defs: []"
"#,
                scheme(&dir)
            ),
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        run_stream(&config, "schema", vec![json!({"name": "a"})]).unwrap();

        assert_eq!(
            read(&destination(&dir, "schema")),
            yaml("$schema: v1\n$defs: [{name: a}]")
        );
    }

    #[test]
    fn test_config_file_missing() {
        let dir = TempDir::new().unwrap();
        assert!(Config::from_file(dir.path().join("absent.yml")).is_err());
    }
}

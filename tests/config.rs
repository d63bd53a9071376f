//! Option resolution and templates.

use tablebeam::config::{self, ImportOptions, RuntimeParameters, ValueProvider, params};
use tablebeam::testing::TempWorkspace;
use tablebeam::*;

fn staged() -> anyhow::Result<ImportOptions> {
    let mut options = ImportOptions::unbound();
    options.set(params::PROJECT_ID, "my-project")?;
    options.set(params::INSTANCE_ID, "my-instance")?;
    options.set(params::TABLE_ID, "cache")?;
    Ok(options)
}

fn launch(pairs: &[&str]) -> anyhow::Result<RuntimeParameters> {
    Ok(RuntimeParameters::from_pairs(pairs)?)
}

#[test]
fn test_resolve_with_runtime_parameters() -> anyhow::Result<()> {
    let options = staged()?;
    let config = options.resolve(&launch(&[
        "inputFile=gs://bucket/cache.csv",
        "completionFile=/control/cache/completed.txt",
        "bigtableAppProfileId=batch-writes",
        "dataflowMaxNumWorkers=8",
    ])?)?;

    assert_eq!(config.table.table_path(), "projects/my-project/instances/my-instance/tables/cache");
    assert_eq!(config.table.app_profile_id.as_deref(), Some("batch-writes"));
    assert_eq!(config.max_workers, Some(8));
    assert_eq!(config.input, "gs://bucket/cache.csv");
    assert_eq!(config.completion_file.to_string_lossy(), "/control/cache/completed.txt");
    assert_eq!(config.schema, FieldSchema::default());
    Ok(())
}

#[test]
fn test_missing_required_option_names_it() -> anyhow::Result<()> {
    let options = staged()?;
    let err = options
        .resolve(&launch(&["inputFile=in.csv"])?)
        .unwrap_err();
    assert!(matches!(err, ImportError::Configuration(_)));
    assert!(err.to_string().contains(params::COMPLETION_FILE));
    Ok(())
}

#[test]
fn test_empty_optional_values_are_absent() -> anyhow::Result<()> {
    let options = staged()?;
    let config = options.resolve(&launch(&[
        "inputFile=in.csv",
        "completionFile=done.txt",
        "bigtableAppProfileId=",
        "dataflowMaxNumWorkers=",
        "headers=",
    ])?)?;
    assert_eq!(config.table.app_profile_id, None);
    assert_eq!(config.max_workers, None);
    assert_eq!(config.schema.names(), ["value"]);
    Ok(())
}

#[test]
fn test_empty_required_value_is_missing() -> anyhow::Result<()> {
    let options = staged()?;
    let result = options.resolve(&launch(&["inputFile=", "completionFile=done.txt"])?);
    assert!(matches!(result, Err(ImportError::Configuration(_))));
    Ok(())
}

#[test]
fn test_worker_count_must_be_positive() -> anyhow::Result<()> {
    let options = staged()?;
    for bad in ["0", "-1", "many"] {
        let workers = format!("dataflowMaxNumWorkers={bad}");
        let runtime = launch(&["inputFile=in.csv", "completionFile=done.txt", workers.as_str()])?;
        assert!(matches!(options.resolve(&runtime), Err(ImportError::Configuration(_))), "{bad}");
    }
    Ok(())
}

#[test]
fn test_headers_become_the_schema() -> anyhow::Result<()> {
    let mut options = staged()?;
    options.set(params::HEADERS, "lat,lng")?;
    let config = options.resolve(&launch(&["inputFile=in.csv", "completionFile=done.txt"])?)?;
    assert_eq!(config.schema.names(), ["lat", "lng"]);

    options.set(params::HEADERS, "lat,lat")?;
    assert!(options.resolve(&launch(&["inputFile=in.csv", "completionFile=done.txt"])?).is_err());
    Ok(())
}

#[test]
fn test_malformed_identifiers_are_rejected() -> anyhow::Result<()> {
    let mut options = staged()?;
    options.set(params::TABLE_ID, "bad table")?;
    let result = options.resolve(&launch(&["inputFile=in.csv", "completionFile=done.txt"])?);
    assert!(matches!(result, Err(ImportError::Configuration(_))));

    let mut options = staged()?;
    options.set(params::PROJECT_ID, "example.com:my-project")?;
    assert!(options.resolve(&launch(&["inputFile=in.csv", "completionFile=done.txt"])?).is_ok());
    Ok(())
}

#[test]
fn test_static_values_ignore_parameters() -> anyhow::Result<()> {
    let mut options = staged()?;
    options.set(params::INPUT_FILE, "fixed.csv")?;
    let runtime = launch(&["inputFile=other.csv", "completionFile=done.txt"])?;

    assert_eq!(options.ignored_parameters(&runtime), ["inputFile"]);
    let config = options.resolve(&runtime)?;
    assert_eq!(config.input, "fixed.csv");
    Ok(())
}

#[test]
fn test_parameter_pairs_are_validated() {
    assert!(RuntimeParameters::from_pairs(["inputFile"]).is_err());
    assert!(RuntimeParameters::from_pairs(["noSuchOption=1"]).is_err());
    assert!(RuntimeParameters::from_pairs(["inputFile=a", "inputFile=b"]).is_err());

    let params = RuntimeParameters::from_pairs(["inputFile=gs://b/x=1.csv"]).expect("valid pair");
    assert_eq!(params.get("inputFile"), Some("gs://b/x=1.csv"));
}

#[test]
fn test_unknown_option_cannot_be_set() {
    let mut options = ImportOptions::unbound();
    assert!(options.set("bigtableZone", "x").is_err());
}

#[test]
fn test_template_round_trip_through_file() -> anyhow::Result<()> {
    let ws = TempWorkspace::new()?;
    let path = ws.file_path("templates/cache.json");
    let options = staged()?;

    config::save_template(&options, &path)?;
    let loaded = config::load_template(&path)?;
    assert_eq!(loaded, options);
    assert_eq!(
        loaded.runtime_parameters(),
        [
            params::APP_PROFILE_ID,
            params::MAX_NUM_WORKERS,
            params::INPUT_FILE,
            params::COMPLETION_FILE,
            params::HEADERS,
        ]
    );

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(json["bigtableTableId"]["static"], "cache");
    assert_eq!(json["inputFile"]["runtime"]["parameter"], "inputFile");
    Ok(())
}

#[test]
fn test_broken_template_is_reported() -> anyhow::Result<()> {
    let ws = TempWorkspace::new()?;
    let path = ws.write_input("template.json", b"{ not json")?;
    let err = config::load_template(&path).unwrap_err();
    assert!(format!("{err:#}").contains("template.json"));
    Ok(())
}

#[test]
fn test_runtime_provider_reads_its_parameter() -> anyhow::Result<()> {
    let runtime = launch(&["inputFile=in.csv"])?;
    assert_eq!(ValueProvider::runtime("inputFile").get(&runtime).as_deref(), Some("in.csv"));
    assert_eq!(ValueProvider::runtime("headers").get(&runtime), None);
    assert_eq!(ValueProvider::Static("x".into()).get(&runtime).as_deref(), Some("x"));
    Ok(())
}

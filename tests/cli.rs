//! The `tablebeam` binary: staging, launching and option sources.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tablebeam::config::{self, ImportOptions, params};
use tablebeam::testing::TempWorkspace;
use tablebeam::*;

const OPTION_ENV: [&str; 9] = [
    "BIGTABLE_PROJECT_ID",
    "BIGTABLE_INSTANCE_ID",
    "BIGTABLE_TABLE_ID",
    "BIGTABLE_APP_PROFILE_ID",
    "DATAFLOW_MAX_NUM_WORKERS",
    "TABLEBEAM_INPUT_FILE",
    "TABLEBEAM_COMPLETION_FILE",
    "TABLEBEAM_HEADERS",
    "RUST_LOG",
];

/// The binary with no option inherited from the test environment.
fn tablebeam() -> anyhow::Result<Command> {
    let mut cmd = Command::cargo_bin("tablebeam")?;
    for var in OPTION_ENV {
        cmd.env_remove(var);
    }
    Ok(cmd)
}

fn local_token(completion: &Path) -> std::path::PathBuf {
    let mut path = completion.as_os_str().to_owned();
    path.push(".local");
    path.into()
}

fn stage_table_template(ws: &TempWorkspace) -> anyhow::Result<std::path::PathBuf> {
    let mut options = ImportOptions::unbound();
    options.set(params::PROJECT_ID, "test-project")?;
    options.set(params::INSTANCE_ID, "test-instance")?;
    options.set(params::TABLE_ID, "test-table")?;
    let path = ws.file_path("templates/cache.json");
    config::save_template(&options, &path)?;
    Ok(path)
}

#[test]
fn test_stage_writes_template_and_returns_without_importing() -> anyhow::Result<()> {
    let ws = TempWorkspace::new()?;
    let template = ws.file_path("templates/cache.json");
    let completion = ws.completion_path();

    // The input does not exist; staging must not read it.
    tablebeam()?
        .arg("stage")
        .arg("--template-location")
        .arg(&template)
        .args(["--bigtable-project-id", "test-project"])
        .args(["--bigtable-instance-id", "test-instance"])
        .args(["--bigtable-table-id", "test-table"])
        .arg("--input-file")
        .arg(ws.file_path("missing.csv"))
        .arg("--completion-file")
        .arg(&completion)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let staged = config::load_template(&template)?;
    assert_eq!(
        staged.runtime_parameters(),
        [params::APP_PROFILE_ID, params::MAX_NUM_WORKERS, params::HEADERS]
    );
    assert!(!completion.exists());
    assert!(!local_token(&completion).exists());
    Ok(())
}

#[test]
fn test_launch_applies_parameters_over_template() -> anyhow::Result<()> {
    let ws = TempWorkspace::new()?;
    let template = stage_table_template(&ws)?;
    let input = ws.write_input("cache.csv", b"r1,a\nr2,b\n")?;
    let completion = ws.completion_path();

    tablebeam()?
        .args(["launch", "--local", "--sequential", "--template"])
        .arg(&template)
        .arg("-p")
        .arg(format!("inputFile={}", input.display()))
        .arg("-p")
        .arg(format!("completionFile={}", completion.display()))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"groups_written\": 2"));

    assert_eq!(
        read_completion_token(&local_token(&completion))?.as_deref(),
        Some(input.to_string_lossy().as_ref())
    );
    assert!(!completion.exists());
    Ok(())
}

#[test]
fn test_import_without_local_flag_is_refused() -> anyhow::Result<()> {
    let ws = TempWorkspace::new()?;
    let template = stage_table_template(&ws)?;
    let input = ws.write_input("cache.csv", b"r1,a\n")?;
    let completion = ws.completion_path();

    tablebeam()?
        .args(["launch", "--template"])
        .arg(&template)
        .arg("-p")
        .arg(format!("inputFile={}", input.display()))
        .arg("-p")
        .arg(format!("completionFile={}", completion.display()))
        .assert()
        .failure()
        .stderr(predicate::str::contains("--local"));

    assert!(!completion.exists());
    assert!(!local_token(&completion).exists());
    Ok(())
}

#[test]
fn test_options_fall_back_to_environment() -> anyhow::Result<()> {
    let ws = TempWorkspace::new()?;
    let input = ws.write_input("cache.csv", b"r1,37.4,-122.1\n")?;
    let completion = ws.completion_path();

    tablebeam()?
        .args(["run", "--local", "--sequential"])
        .env("BIGTABLE_PROJECT_ID", "test-project")
        .env("BIGTABLE_INSTANCE_ID", "test-instance")
        .env("BIGTABLE_TABLE_ID", "test-table")
        .env("TABLEBEAM_INPUT_FILE", &input)
        .env("TABLEBEAM_COMPLETION_FILE", &completion)
        .env("TABLEBEAM_HEADERS", "lat,lng")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"cells_written\": 2"));

    assert!(local_token(&completion).exists());
    Ok(())
}

#[test]
fn test_parameter_for_a_fixed_option_is_reported() -> anyhow::Result<()> {
    let ws = TempWorkspace::new()?;
    let input = ws.write_input("cache.csv", b"r1,a\n")?;
    let mut options = ImportOptions::unbound();
    options.set(params::PROJECT_ID, "test-project")?;
    options.set(params::INSTANCE_ID, "test-instance")?;
    options.set(params::TABLE_ID, "test-table")?;
    options.set(params::INPUT_FILE, input.to_string_lossy())?;
    let template = ws.file_path("template.json");
    config::save_template(&options, &template)?;

    tablebeam()?
        .args(["launch", "--local", "--sequential", "--log-format", "json", "--template"])
        .arg(&template)
        .args(["-p", "inputFile=elsewhere.csv"])
        .arg("-p")
        .arg(format!("completionFile={}", ws.completion_path().display()))
        .assert()
        .success()
        .stderr(predicate::str::contains("parameter ignored"));
    Ok(())
}

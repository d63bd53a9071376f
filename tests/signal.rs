//! Completion token files.

use tablebeam::testing::TempWorkspace;
use tablebeam::*;

#[test]
fn test_token_holds_input_location() -> anyhow::Result<()> {
    let ws = TempWorkspace::new()?;
    let path = ws.file_path("control/cache/completed.txt");

    write_completion_token(&path, "gs://bucket/data/cache.csv")?;

    assert_eq!(std::fs::read_to_string(&path)?, "gs://bucket/data/cache.csv\n");
    assert_eq!(
        read_completion_token(&path)?.as_deref(),
        Some("gs://bucket/data/cache.csv")
    );
    Ok(())
}

#[test]
fn test_single_file_without_leftovers() -> anyhow::Result<()> {
    let ws = TempWorkspace::new()?;
    let path = ws.file_path("control/completed.txt");

    write_completion_token(&path, "in.csv")?;
    write_completion_token(&path, "in.csv")?;

    let entries: Vec<_> = std::fs::read_dir(ws.file_path("control"))?.collect::<Result<_, _>>()?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].file_name(), "completed.txt");
    Ok(())
}

#[test]
fn test_absent_token_reads_as_none() -> anyhow::Result<()> {
    let ws = TempWorkspace::new()?;
    assert_eq!(read_completion_token(&ws.file_path("nope.txt"))?, None);
    Ok(())
}

#[test]
fn test_unwritable_location_is_a_signal_error() -> anyhow::Result<()> {
    let ws = TempWorkspace::new()?;
    // A regular file where the parent directory should be.
    let blocker = ws.write_input("control", b"")?;
    let err = write_completion_token(&blocker.join("completed.txt"), "in.csv").unwrap_err();
    assert!(matches!(err, ImportError::Signal { .. }));
    Ok(())
}

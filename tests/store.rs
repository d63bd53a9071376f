//! Behaviour of the in-memory wide-column store.

use tablebeam::schema::COLUMN_FAMILY;
use tablebeam::testing::{fake_store, test_table};
use tablebeam::*;

fn group(key: &[u8], cells: &[(&str, &str, &str)]) -> MutationGroup {
    MutationGroup {
        row_key: key.to_vec(),
        cells: cells
            .iter()
            .map(|(family, qualifier, value)| CellWrite {
                family: (*family).to_string(),
                qualifier: qualifier.as_bytes().to_vec(),
                value: value.as_bytes().to_vec(),
            })
            .collect(),
    }
}

#[test]
fn test_unknown_table_fails_whole_request() {
    let store = FakeWideColumnIO::new();
    let err = store
        .mutate_rows(&test_table(), &[group(b"r1", &[(COLUMN_FAMILY, "value", "a")])])
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert!(!err.is_transient());
}

#[test]
fn test_unknown_family_rejects_the_whole_row() -> anyhow::Result<()> {
    let store = fake_store();
    let statuses = store.mutate_rows(
        &test_table(),
        &[group(
            b"r1",
            &[(COLUMN_FAMILY, "value", "a"), ("other", "x", "b")],
        )],
    )?;
    assert_eq!(statuses[0].as_ref().unwrap_err().kind, ErrorKind::InvalidInput);
    assert_eq!(store.read_row(&test_table(), b"r1")?, None);
    Ok(())
}

#[test]
fn test_empty_row_key_is_invalid() -> anyhow::Result<()> {
    let store = fake_store();
    let statuses = store.mutate_rows(&test_table(), &[group(b"", &[(COLUMN_FAMILY, "value", "a")])])?;
    assert_eq!(statuses[0].as_ref().unwrap_err().kind, ErrorKind::InvalidInput);
    Ok(())
}

#[test]
fn test_cells_of_a_row_accumulate() -> anyhow::Result<()> {
    let store = fake_store();
    let table = test_table();
    store.mutate_rows(&table, &[group(b"r1", &[(COLUMN_FAMILY, "lat", "1")])])?;
    store.mutate_rows(&table, &[group(b"r1", &[(COLUMN_FAMILY, "lng", "2")])])?;

    let row = store.read_row(&table, b"r1")?.expect("row exists");
    assert_eq!(row.get(COLUMN_FAMILY, b"lat"), Some(&b"1"[..]));
    assert_eq!(row.get(COLUMN_FAMILY, b"lng"), Some(&b"2"[..]));
    Ok(())
}

#[test]
fn test_row_fault_for_n_attempts_then_success() -> anyhow::Result<()> {
    let store = fake_store();
    store.fail_row_times("r1", ErrorKind::RateLimited, 1);
    let entry = [group(b"r1", &[(COLUMN_FAMILY, "value", "a")])];

    let first = store.mutate_rows(&test_table(), &entry)?;
    assert!(first[0].as_ref().is_err_and(StoreError::is_transient));
    let second = store.mutate_rows(&test_table(), &entry)?;
    assert!(second[0].is_ok());
    Ok(())
}

#[test]
fn test_table_ref_rendering() {
    let table = TableRef::new("p", "i", "t").with_app_profile("batch");
    assert_eq!(table.table_path(), "projects/p/instances/i/tables/t");
    assert_eq!(table.to_string(), "projects/p/instances/i/tables/t (app profile batch)");
}

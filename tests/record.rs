//! Parsing raw lines into mutation groups.

use std::path::PathBuf;
use tablebeam::schema::COLUMN_FAMILY;
use tablebeam::*;

fn cells(group: &MutationGroup) -> Vec<(&str, &[u8], &[u8])> {
    group
        .cells
        .iter()
        .map(|c| (c.family.as_str(), c.qualifier.as_slice(), c.value.as_slice()))
        .collect()
}

#[test]
fn test_row_key_and_single_value() -> anyhow::Result<()> {
    let group = parse_record(b"r1,a", &FieldSchema::default())?;
    assert_eq!(group.row_key, b"r1");
    assert_eq!(cells(&group), vec![(COLUMN_FAMILY, &b"value"[..], &b"a"[..])]);
    Ok(())
}

#[test]
fn test_fields_zip_with_schema_in_order() -> anyhow::Result<()> {
    let schema = FieldSchema::parse("lat, lng ,name")?;
    let group = parse_record(b"store-7,52.1,4.3,Main St", &schema)?;
    assert_eq!(group.row_key_lossy(), "store-7");
    assert_eq!(
        cells(&group),
        vec![
            (COLUMN_FAMILY, &b"lat"[..], &b"52.1"[..]),
            (COLUMN_FAMILY, &b"lng"[..], &b"4.3"[..]),
            (COLUMN_FAMILY, &b"name"[..], &b"Main St"[..]),
        ]
    );
    Ok(())
}

#[test]
fn test_trailing_empty_field_is_an_empty_value() -> anyhow::Result<()> {
    let group = parse_record(b"k1,", &FieldSchema::default())?;
    assert_eq!(group.row_key, b"k1");
    assert_eq!(group.cells.len(), 1);
    assert!(group.cells[0].value.is_empty());
    Ok(())
}

#[test]
fn test_empty_middle_fields_are_kept() -> anyhow::Result<()> {
    let schema = FieldSchema::parse("a,b,c")?;
    let group = parse_record(b"k,,x,", &schema)?;
    let values: Vec<&[u8]> = group.cells.iter().map(|c| c.value.as_slice()).collect();
    assert_eq!(values, vec![&b""[..], &b"x"[..], &b""[..]]);
    Ok(())
}

#[test]
fn test_too_few_fields_is_a_validation_error() {
    let err = parse_record(b"lonely", &FieldSchema::default()).unwrap_err();
    assert_eq!(err.expected, 2);
    assert_eq!(err.actual, 1);
    assert_eq!(err.raw, b"lonely");
}

#[test]
fn test_too_many_fields_is_a_validation_error() {
    let err = parse_record(b"r1,a,b", &FieldSchema::default()).unwrap_err();
    assert_eq!(err.expected, 2);
    assert_eq!(err.actual, 3);
    assert!(err.to_string().contains("r1,a,b"));
}

#[test]
fn test_empty_line_is_a_validation_error() {
    let err = parse_record(b"", &FieldSchema::default()).unwrap_err();
    assert_eq!(err.actual, 1);
}

#[test]
fn test_bytes_are_kept_verbatim() -> anyhow::Result<()> {
    let raw = b"\xff\xfekey, padded \xc3\xa9";
    let group = parse_record(raw, &FieldSchema::default())?;
    assert_eq!(group.row_key, b"\xff\xfekey");
    assert_eq!(group.cells[0].value, b" padded \xc3\xa9");
    Ok(())
}

#[test]
fn test_parsing_is_deterministic() -> anyhow::Result<()> {
    let schema = FieldSchema::parse("a,b")?;
    let parser = RecordParser::new(schema);
    assert_eq!(parser.parse(b"k,1,2")?, parser.parse(b"k,1,2")?);
    Ok(())
}

#[test]
fn test_parse_at_attaches_location() {
    let parser = RecordParser::default();
    let location = RecordLocation {
        file: PathBuf::from("data/cache.csv"),
        line: 7,
    };
    let err = parser.parse_at(b"a,b,c", location.clone()).unwrap_err();
    assert_eq!(err.location, Some(location));
    assert!(err.to_string().contains("data/cache.csv:7"));
}

#[test]
fn test_schema_rejects_bad_names() {
    assert!(FieldSchema::parse("").is_err());
    assert!(FieldSchema::parse("a,,b").is_err());
    assert!(FieldSchema::parse("a,a").is_err());
    assert!(FieldSchema::new(["a,b"]).is_err());
}

#[test]
fn test_schema_serializes_as_name_list() -> anyhow::Result<()> {
    let schema = FieldSchema::parse("lat,lng")?;
    assert_eq!(serde_json::to_string(&schema)?, r#"["lat","lng"]"#);
    assert!(serde_json::from_str::<FieldSchema>("[]").is_err());
    Ok(())
}

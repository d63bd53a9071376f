//! Input expansion, line splitting and bundling.

use std::io::Cursor;
use tablebeam::source::{BundleReader, Compression, expand_input, read_line};
use tablebeam::testing::TempWorkspace;
use tablebeam::*;

fn lines(content: &[u8]) -> anyhow::Result<Vec<Vec<u8>>> {
    let mut reader = Cursor::new(content.to_vec());
    let mut out = Vec::new();
    let mut line = Vec::new();
    while read_line(&mut reader, &mut line)? {
        out.push(line.clone());
    }
    Ok(out)
}

#[test]
fn test_line_terminators_are_stripped() -> anyhow::Result<()> {
    assert_eq!(lines(b"a\nb\r\nc\rd")?, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]);
    Ok(())
}

#[test]
fn test_trailing_terminator_adds_no_line() -> anyhow::Result<()> {
    assert_eq!(lines(b"r1,a\nr2,b\n")?.len(), 2);
    assert_eq!(lines(b"r1,a\r\n")?.len(), 1);
    assert!(lines(b"")?.is_empty());
    Ok(())
}

#[test]
fn test_blank_lines_are_kept() -> anyhow::Result<()> {
    assert_eq!(lines(b"a\n\nb\n")?, vec![b"a".to_vec(), Vec::new(), b"b".to_vec()]);
    Ok(())
}

#[test]
fn test_bundles_carry_file_and_line_numbers() -> anyhow::Result<()> {
    let ws = TempWorkspace::new()?;
    let first = ws.write_input("a.csv", b"1\n2\n3\n4\n5\n")?;
    let second = ws.write_input("b.csv", b"6\n")?;

    let bundles = BundleReader::new(vec![first.clone(), second.clone()], 2, Compression::Auto)
        .collect::<Result<Vec<_>, _>>()?;

    let shape: Vec<(String, u64, usize)> = bundles
        .iter()
        .map(|b| (b.file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(), b.first_line, b.len()))
        .collect();
    assert_eq!(
        shape,
        vec![
            ("a.csv".to_string(), 1, 2),
            ("a.csv".to_string(), 3, 2),
            ("a.csv".to_string(), 5, 1),
            ("b.csv".to_string(), 1, 1),
        ]
    );
    assert_eq!(bundles[1].location(1).line, 4);
    assert_eq!(bundles[3].location(0).file, second);
    Ok(())
}

#[test]
fn test_unreadable_file_stops_the_reader() -> anyhow::Result<()> {
    let ws = TempWorkspace::new()?;
    let good = ws.write_input("good.csv", b"r1,a\n")?;
    let missing = ws.file_path("gone.csv");

    let mut reader = BundleReader::new(vec![good, missing], 10, Compression::Auto);
    assert!(reader.next().is_some_and(|b| b.is_ok()));
    assert!(matches!(reader.next(), Some(Err(ImportError::Input { .. }))));
    assert!(reader.next().is_none());
    Ok(())
}

#[test]
fn test_glob_expansion_is_sorted_and_skips_directories() -> anyhow::Result<()> {
    let ws = TempWorkspace::new()?;
    ws.write_input("in/b.csv", b"")?;
    ws.write_input("in/a.csv", b"")?;
    std::fs::create_dir_all(ws.file_path("in/dir.csv"))?;

    let files = expand_input(&ws.file_path("in/*.csv").to_string_lossy())?;
    let names: Vec<String> = files
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    assert_eq!(names, ["a.csv", "b.csv"]);
    Ok(())
}

#[test]
fn test_invalid_pattern_is_a_configuration_error() {
    assert!(matches!(
        expand_input("data/[unclosed*.csv"),
        Err(ImportError::Configuration(_))
    ));
}

#[test]
fn test_codec_detection_by_extension() {
    use std::path::Path;
    assert_eq!(Compression::from_extension(Path::new("x.csv.gz")), Some(Compression::Gzip));
    assert_eq!(Compression::from_extension(Path::new("x.csv.ZST")), Some(Compression::Zstd));
    assert_eq!(Compression::from_extension(Path::new("x.csv.bz2")), Some(Compression::Bzip2));
    assert_eq!(Compression::from_extension(Path::new("x.csv")), None);
}

#[cfg(feature = "compression-gzip")]
#[test]
fn test_gzip_detected_by_magic_bytes() -> anyhow::Result<()> {
    let ws = TempWorkspace::new()?;
    // Misnamed: gzip content without a .gz extension.
    let path = ws.write_gzip_input("cache.csv", b"r1,a\nr2,b\n")?;

    let bundles = BundleReader::new(vec![path], 10, Compression::Auto)
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(bundles[0].lines, vec![b"r1,a".to_vec(), b"r2,b".to_vec()]);
    Ok(())
}

#[test]
fn test_plain_text_resembling_a_codec_header_is_read_verbatim() -> anyhow::Result<()> {
    let ws = TempWorkspace::new()?;
    let bzip_like = ws.write_input("bzip.csv", b"BZh91,a\nr2,b\n")?;
    let gzip_like = ws.write_input("gzip.csv", b"\x1f\x8bkey,a\n")?;

    let bundles = BundleReader::new(vec![bzip_like, gzip_like], 10, Compression::Auto)
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(bundles[0].lines, vec![b"BZh91,a".to_vec(), b"r2,b".to_vec()]);
    assert_eq!(bundles[1].lines, vec![b"\x1f\x8bkey,a".to_vec()]);
    Ok(())
}

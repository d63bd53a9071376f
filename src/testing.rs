//! Fixtures for testing imports without a real store or input bucket.
//!
//! - [`TempWorkspace`]: a temporary directory for input files and tokens
//! - [`test_table`] / [`fake_store`]: an in-memory table ready for writes
//! - [`import_config`]: a resolved configuration pointing at both
//! - [`stored_values`]: the table contents rendered as strings
//!
//! ```
//! use tablebeam::runner::{ExecMode, Runner};
//! use tablebeam::testing::*;
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let ws = TempWorkspace::new()?;
//! let input = ws.write_input("cache.csv", b"r1,a\n")?;
//! let store = fake_store();
//! let config = import_config(&input, ws.completion_path());
//!
//! Runner::new(ExecMode::Sequential).run(&config, Arc::new(store.clone()))?;
//! assert_eq!(stored_values(&store)["r1"]["value"], "a");
//! # Ok(())
//! # }
//! ```

use crate::config::ImportConfig;
use crate::schema::{COLUMN_FAMILY, FieldSchema};
use crate::store::{FakeWideColumnIO, TableRef};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory that is deleted when dropped.
pub struct TempWorkspace {
    dir: TempDir,
}

impl TempWorkspace {
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: TempDir::new()?,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A path within the workspace; nothing is created.
    #[must_use]
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Where tests put the completion token: `control/completed.txt`.
    #[must_use]
    pub fn completion_path(&self) -> PathBuf {
        self.file_path("control/completed.txt")
    }

    /// Write `content` verbatim to `name`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_input(&self, name: &str, content: &[u8]) -> io::Result<PathBuf> {
        let path = self.file_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Write `content` gzip-compressed to `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    #[cfg(feature = "compression-gzip")]
    pub fn write_gzip_input(&self, name: &str, content: &[u8]) -> io::Result<PathBuf> {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content)?;
        self.write_input(name, &encoder.finish()?)
    }
}

/// The table every fixture writes to.
#[must_use]
pub fn test_table() -> TableRef {
    TableRef::new("test-project", "test-instance", "test-table")
}

/// A fake store holding [`test_table`] with the import column family.
#[must_use]
pub fn fake_store() -> FakeWideColumnIO {
    let store = FakeWideColumnIO::new();
    store.create_table(&test_table(), &[COLUMN_FAMILY]);
    store
}

/// A resolved configuration importing `input` into [`test_table`] with the
/// default `value` schema.
pub fn import_config(input: impl AsRef<Path>, completion_file: impl Into<PathBuf>) -> ImportConfig {
    ImportConfig {
        table: test_table(),
        max_workers: None,
        input: input.as_ref().to_string_lossy().into_owned(),
        completion_file: completion_file.into(),
        schema: FieldSchema::default(),
    }
}

/// Contents of [`test_table`] as `row key -> qualifier -> value`.
#[must_use]
pub fn stored_values(store: &FakeWideColumnIO) -> BTreeMap<String, BTreeMap<String, String>> {
    store
        .rows(&test_table())
        .into_iter()
        .map(|row| {
            let cells = row
                .cells
                .iter()
                .map(|((_, qualifier), value)| {
                    (
                        String::from_utf8_lossy(qualifier).into_owned(),
                        String::from_utf8_lossy(value).into_owned(),
                    )
                })
                .collect();
            (String::from_utf8_lossy(&row.row_key).into_owned(), cells)
        })
        .collect()
}

//! Input location expansion and line bundling.
//!
//! The input location is either a literal file path or a glob pattern that
//! may match many files. Files are read line by line as raw bytes and handed
//! to workers in [`LineBundle`]s. Line terminators (`\n`, `\r\n`, `\r`) are
//! stripped; everything else, including empty trailing fields, is kept
//! exactly as found.

pub mod compression;

use crate::error::ImportError;
use crate::record::RecordLocation;
pub use compression::{Compression, InputReader};
use glob::glob;
use std::collections::VecDeque;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

fn is_pattern(location: &str) -> bool {
    location.contains(['*', '?', '['])
}

/// Resolve an input location to the sorted list of files it names.
///
/// A literal path must exist. A glob pattern that matches nothing resolves
/// to an empty list, which is a valid (empty) input.
///
/// # Errors
///
/// - [`ImportError::Configuration`] for an invalid pattern
/// - [`ImportError::Input`] for a missing literal path or an unreadable entry
pub fn expand_input(location: &str) -> Result<Vec<PathBuf>, ImportError> {
    if !is_pattern(location) {
        let path = PathBuf::from(location);
        if !path.is_file() {
            return Err(ImportError::Input {
                location: location.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
            });
        }
        return Ok(vec![path]);
    }

    let entries = glob(location).map_err(|e| {
        ImportError::Configuration(format!("invalid input pattern {location:?}: {e}"))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ImportError::Input {
            location: location.to_string(),
            source: e.into_error(),
        })?;
        // Only include actual files, not directories
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    debug!(pattern = location, matched = files.len(), "expanded input pattern");
    Ok(files)
}

/// Read the next line into `out`, without its terminator.
///
/// Returns `false` at end of input. A final line without a terminator is
/// still a line; a terminator at the very end does not start another one.
///
/// # Errors
///
/// Returns any I/O error from the underlying reader.
pub fn read_line(reader: &mut dyn BufRead, out: &mut Vec<u8>) -> io::Result<bool> {
    out.clear();
    let mut read_any = false;
    loop {
        let (terminator, used) = {
            let available = match reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if available.is_empty() {
                return Ok(read_any);
            }
            read_any = true;
            match available.iter().position(|b| *b == b'\n' || *b == b'\r') {
                Some(i) => {
                    out.extend_from_slice(&available[..i]);
                    (Some(available[i]), i + 1)
                }
                None => {
                    out.extend_from_slice(available);
                    (None, available.len())
                }
            }
        };
        reader.consume(used);

        match terminator {
            Some(b'\r') => {
                if reader.fill_buf()?.first() == Some(&b'\n') {
                    reader.consume(1);
                }
                return Ok(true);
            }
            Some(_) => return Ok(true),
            None => {}
        }
    }
}

/// A run of consecutive lines from one input file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineBundle {
    pub file: Arc<PathBuf>,
    /// 1-based line number of `lines[0]`.
    pub first_line: u64,
    pub lines: Vec<Vec<u8>>,
}

impl LineBundle {
    /// Where `lines[index]` came from.
    #[must_use]
    pub fn location(&self, index: usize) -> RecordLocation {
        RecordLocation {
            file: self.file.as_ref().clone(),
            line: self.first_line + index as u64,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

struct OpenFile {
    path: Arc<PathBuf>,
    reader: InputReader,
    next_line: u64,
}

/// Iterator of [`LineBundle`]s over a list of files, in file order.
///
/// After the first error the iterator is exhausted.
pub struct BundleReader {
    pending: VecDeque<PathBuf>,
    current: Option<OpenFile>,
    bundle_size: usize,
    compression: Compression,
    failed: bool,
}

impl BundleReader {
    #[must_use]
    pub fn new(files: Vec<PathBuf>, bundle_size: usize, compression: Compression) -> Self {
        Self {
            pending: files.into(),
            current: None,
            bundle_size: bundle_size.max(1),
            compression,
            failed: false,
        }
    }

    fn open_next(&mut self) -> Result<bool, ImportError> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(false);
        };
        let reader = self.compression.open(&path).map_err(|source| input_error(&path, source))?;
        debug!(file = %path.display(), "reading input file");
        self.current = Some(OpenFile {
            path: Arc::new(path),
            reader,
            next_line: 1,
        });
        Ok(true)
    }

    fn next_bundle(&mut self) -> Result<Option<LineBundle>, ImportError> {
        loop {
            if self.current.is_none() && !self.open_next()? {
                return Ok(None);
            }
            let Some(file) = self.current.as_mut() else {
                continue;
            };

            let mut lines = Vec::with_capacity(self.bundle_size);
            let mut line = Vec::new();
            while lines.len() < self.bundle_size {
                if !read_line(&mut file.reader, &mut line)
                    .map_err(|source| input_error(&file.path, source))?
                {
                    break;
                }
                lines.push(std::mem::take(&mut line));
            }

            let first_line = file.next_line;
            file.next_line += lines.len() as u64;
            let path = Arc::clone(&file.path);
            if lines.len() < self.bundle_size {
                self.current = None;
            }
            if !lines.is_empty() {
                return Ok(Some(LineBundle {
                    file: path,
                    first_line,
                    lines,
                }));
            }
        }
    }
}

impl Iterator for BundleReader {
    type Item = Result<LineBundle, ImportError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_bundle() {
            Ok(bundle) => bundle.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

fn input_error(path: &Path, source: io::Error) -> ImportError {
    ImportError::Input {
        location: path.display().to_string(),
        source,
    }
}

//! Completion token output.
//!
//! The token is one small text file holding the input location. Pollers treat
//! its mere existence as "import complete", so it is written atomically: the
//! content goes to a temporary file in the same directory, which is then
//! renamed into place. A reader never observes a partial token.

use crate::error::ImportError;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

/// Write `token` followed by a newline as the single file `path`.
///
/// Missing parent directories are created. An existing file is replaced.
///
/// # Errors
///
/// Returns [`ImportError::Signal`] if the directory, temporary file, or
/// final rename fails.
pub fn write_completion_token(path: &Path, token: &str) -> Result<(), ImportError> {
    let signal_err = |source: io::Error| ImportError::Signal {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(signal_err)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(signal_err)?;
    tmp.write_all(token.as_bytes()).map_err(signal_err)?;
    tmp.write_all(b"\n").map_err(signal_err)?;
    tmp.as_file().sync_all().map_err(signal_err)?;
    tmp.persist(path).map_err(|e| signal_err(e.error))?;

    info!(path = %path.display(), token, "completion token written");
    Ok(())
}

/// Read a completion token back, `None` if no token exists yet.
///
/// # Errors
///
/// Returns any I/O error other than the file being absent.
pub fn read_completion_token(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(
            content
                .strip_suffix('\n')
                .unwrap_or(&content)
                .to_string(),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

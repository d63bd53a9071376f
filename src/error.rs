//! Error taxonomy of an import job.
//!
//! Every failure surfaces as an [`ImportError`]. Single-record problems are
//! [`ValidationError`]s; store problems carry the [`StoreError`] reported for
//! the affected row. Nothing here is ever swallowed: a job either completes and
//! emits its completion token, or returns one of these.

use crate::barrier::AbortReason;
use crate::record::RecordLocation;
use crate::store::StoreError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A raw line that cannot become a mutation group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The offending line, without its terminator.
    pub raw: Vec<u8>,
    /// Fields required: one row key plus one per schema column.
    pub expected: usize,
    /// Fields actually found after splitting.
    pub actual: usize,
    /// Where the line came from, when known.
    pub location: Option<RecordLocation>,
}

impl ValidationError {
    #[must_use]
    pub fn field_count(raw: &[u8], expected: usize, actual: usize) -> Self {
        Self {
            raw: raw.to_vec(),
            expected,
            actual,
            location: None,
        }
    }

    #[must_use]
    pub fn at(mut self, location: RecordLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// The raw line rendered for logs.
    #[must_use]
    pub fn raw_lossy(&self) -> String {
        String::from_utf8_lossy(&self.raw).into_owned()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed record")?;
        if let Some(location) = &self.location {
            write!(f, " at {location}")?;
        }
        write!(
            f,
            ": expected {} fields, found {}: {:?}",
            self.expected,
            self.actual,
            self.raw_lossy()
        )
    }
}

impl std::error::Error for ValidationError {}

/// Terminal failure of an import job.
#[derive(Debug, Error)]
pub enum ImportError {
    /// A required option is missing or unparseable. Raised before any record is read.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The store rejected or could not be reached for a row, after redelivery.
    #[error("write failed for row {row_key:?}: {cause}")]
    Write {
        row_key: String,
        #[source]
        cause: StoreError,
    },

    #[error("cannot read input {location}: {source}")]
    Input {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write completion signal {}: {source}", path.display())]
    Signal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("import cancelled before all writes were acknowledged")]
    Cancelled,

    /// The completion barrier was aborted; the reason names the first failure.
    #[error("completion barrier aborted: {0}")]
    Aborted(AbortReason),

    /// The barrier was driven out of order (e.g. submissions after sealing).
    #[error("completion barrier misuse: {0}")]
    Barrier(String),
}

impl ImportError {
    #[must_use]
    pub fn write(row_key: &[u8], cause: StoreError) -> Self {
        Self::Write {
            row_key: String::from_utf8_lossy(row_key).into_owned(),
            cause,
        }
    }

    /// Reason recorded on the barrier when this error stops the job.
    #[must_use]
    pub fn abort_reason(&self) -> AbortReason {
        match self {
            Self::Write { row_key, cause } => AbortReason::WriteFailure {
                row_key: row_key.clone(),
                cause: cause.to_string(),
            },
            Self::Validation(err) => AbortReason::Validation(err.to_string()),
            Self::Cancelled => AbortReason::Cancelled,
            Self::Aborted(reason) => reason.clone(),
            other => AbortReason::Failed(other.to_string()),
        }
    }
}

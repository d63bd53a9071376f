//! Core trait and types for wide-column store access.
//!
//! The trait is synchronous; an implementation backed by an async client is
//! expected to block internally, the same way the rest of the crate does.

use crate::record::MutationGroup;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

// ============================================================================
// Core Error Type
// ============================================================================

/// Error reported by a wide-column store, for a whole request or one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    pub message: String,
    pub kind: ErrorKind,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    PermissionDenied,
    Network,
    Timeout,
    ServiceUnavailable,
    RateLimited,
    InternalError,
    Other,
}

impl ErrorKind {
    /// Whether a later attempt of the same write may succeed.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::ServiceUnavailable | Self::RateLimited
        )
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(source) = &self.source {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}

impl Error for StoreError {}

impl StoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub const fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// Table addressing
// ============================================================================

/// Address of one table, plus the routing profile writes should use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub project_id: String,
    pub instance_id: String,
    pub table_id: String,
    /// Named traffic-isolation profile. `None` selects the store's default routing.
    pub app_profile_id: Option<String>,
}

impl TableRef {
    pub fn new(
        project_id: impl Into<String>,
        instance_id: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            instance_id: instance_id.into(),
            table_id: table_id.into(),
            app_profile_id: None,
        }
    }

    #[must_use]
    pub fn with_app_profile(mut self, app_profile_id: impl Into<String>) -> Self {
        self.app_profile_id = Some(app_profile_id.into());
        self
    }

    /// Fully qualified table name, independent of the routing profile.
    #[must_use]
    pub fn table_path(&self) -> String {
        format!(
            "projects/{}/instances/{}/tables/{}",
            self.project_id, self.instance_id, self.table_id
        )
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table_path())?;
        if let Some(profile) = &self.app_profile_id {
            write!(f, " (app profile {profile})")?;
        }
        Ok(())
    }
}

// ============================================================================
// WideColumnIO
// ============================================================================

/// Current contents of one row: `(family, qualifier) -> value`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoredRow {
    pub row_key: Vec<u8>,
    pub cells: BTreeMap<(String, Vec<u8>), Vec<u8>>,
}

impl StoredRow {
    #[must_use]
    pub fn get(&self, family: &str, qualifier: &[u8]) -> Option<&[u8]> {
        self.cells
            .get(&(family.to_string(), qualifier.to_vec()))
            .map(Vec::as_slice)
    }
}

/// Bulk write access to a wide-column store.
///
/// Writes are set-cell operations: applying the same group twice leaves the
/// row as applying it once (last write wins per cell).
pub trait WideColumnIO: Send + Sync {
    /// Apply each group as one atomic row mutation.
    ///
    /// The outer `Err` means the whole request failed and nothing in it can be
    /// assumed applied. Otherwise the returned vector has one status per entry,
    /// in entry order.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be reached, does not exist, or the
    /// request is rejected as a whole
    fn mutate_rows(
        &self,
        table: &TableRef,
        entries: &[MutationGroup],
    ) -> StoreResult<Vec<StoreResult<()>>>;

    /// Read back one row, `None` if it holds no cells.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be reached or does not exist
    fn read_row(&self, table: &TableRef, row_key: &[u8]) -> StoreResult<Option<StoredRow>>;
}

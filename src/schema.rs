//! Field schema for delimited input rows.
//!
//! A [`FieldSchema`] names the value columns of a row. Field 0 of every row is
//! the row key; fields `1..=N` are paired, in order, with the `N` names of the
//! schema to become column qualifiers under the fixed [`COLUMN_FAMILY`].

use crate::error::ImportError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Column family every cell of an import is written under.
pub const COLUMN_FAMILY: &str = "csv";

/// Field delimiter of input rows.
pub const FIELD_DELIMITER: u8 = b',';

/// Schema used when no `headers` option is supplied.
pub const DEFAULT_HEADERS: &str = "value";

/// Ordered, non-empty list of column qualifiers.
///
/// Cloning is cheap; the names are shared behind an `Arc` so every worker can
/// hold the same schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FieldSchema {
    names: Arc<[String]>,
}

impl FieldSchema {
    /// Build a schema from qualifier names.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Configuration`] if the list is empty, a name is
    /// empty, a name contains the field delimiter, or a name repeats.
    pub fn new<I, S>(names: I) -> Result<Self, ImportError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(ImportError::Configuration(
                "field schema needs at least one column name".into(),
            ));
        }

        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if name.is_empty() {
                return Err(ImportError::Configuration(
                    "field schema contains an empty column name".into(),
                ));
            }
            if name.as_bytes().contains(&FIELD_DELIMITER) {
                return Err(ImportError::Configuration(format!(
                    "column name {name:?} contains the field delimiter"
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(ImportError::Configuration(format!(
                    "column name {name:?} appears more than once"
                )));
            }
        }

        Ok(Self {
            names: names.into(),
        })
    }

    /// Parse a comma-separated header list such as `"value"` or `"lat,lng"`.
    ///
    /// Surrounding whitespace of each name is trimmed.
    ///
    /// # Errors
    ///
    /// Same conditions as [`FieldSchema::new`].
    pub fn parse(headers: &str) -> Result<Self, ImportError> {
        Self::new(headers.split(',').map(str::trim))
    }

    /// Number of value fields a row must carry after its key.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always `false`; a schema cannot be built empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Qualifier names in column order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self {
            names: Arc::from(vec![DEFAULT_HEADERS.to_string()]),
        }
    }
}

impl fmt::Display for FieldSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names.join(","))
    }
}

impl TryFrom<Vec<String>> for FieldSchema {
    type Error = ImportError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(names)
    }
}

impl From<FieldSchema> for Vec<String> {
    fn from(schema: FieldSchema) -> Self {
        schema.names.to_vec()
    }
}

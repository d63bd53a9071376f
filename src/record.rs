//! Row parsing: one raw line in, one keyed set of cell writes out.
//!
//! Parsing is pure and deterministic. The same line and schema always yield
//! the same [`MutationGroup`], which is what makes redelivery of a group safe.

use crate::error::ValidationError;
use crate::schema::{COLUMN_FAMILY, FIELD_DELIMITER, FieldSchema};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Set one `(family, qualifier)` cell of a row to `value`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellWrite {
    pub family: String,
    pub qualifier: Vec<u8>,
    pub value: Vec<u8>,
}

/// All cell writes derived from one input line, keyed by row.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MutationGroup {
    pub row_key: Vec<u8>,
    pub cells: Vec<CellWrite>,
}

impl MutationGroup {
    /// Row key rendered for logs and error messages.
    #[must_use]
    pub fn row_key_lossy(&self) -> String {
        String::from_utf8_lossy(&self.row_key).into_owned()
    }
}

/// Origin of a raw line: input file and 1-based line number.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordLocation {
    pub file: PathBuf,
    pub line: u64,
}

impl fmt::Display for RecordLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// Convert one raw line into a [`MutationGroup`].
///
/// The line is split on `,` keeping empty fields, including a trailing one, so
/// `"k1,"` is a key with one empty value rather than a one-field row. Field 0 is
/// the row key and field `i` is written under `schema[i - 1]`.
///
/// # Errors
///
/// Returns a [`ValidationError`] when the line does not carry exactly
/// `schema.len() + 1` fields. No partial group is ever produced.
pub fn parse_record(raw: &[u8], schema: &FieldSchema) -> Result<MutationGroup, ValidationError> {
    let fields: Vec<&[u8]> = raw.split(|b| *b == FIELD_DELIMITER).collect();
    let expected = schema.len() + 1;
    if fields.len() != expected {
        return Err(ValidationError::field_count(raw, expected, fields.len()));
    }

    let (row_key, values) = fields.split_at(1);
    let cells = schema
        .names()
        .iter()
        .zip(values)
        .map(|(name, value)| CellWrite {
            family: COLUMN_FAMILY.to_string(),
            qualifier: name.as_bytes().to_vec(),
            value: value.to_vec(),
        })
        .collect();

    Ok(MutationGroup {
        row_key: row_key[0].to_vec(),
        cells,
    })
}

/// A [`parse_record`] bound to one schema, shareable across workers.
#[derive(Clone, Debug, Default)]
pub struct RecordParser {
    schema: FieldSchema,
}

impl RecordParser {
    #[must_use]
    pub fn new(schema: FieldSchema) -> Self {
        Self { schema }
    }

    #[must_use]
    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// # Errors
    ///
    /// See [`parse_record`].
    pub fn parse(&self, raw: &[u8]) -> Result<MutationGroup, ValidationError> {
        parse_record(raw, &self.schema)
    }

    /// Parse a line and tag any failure with where it came from.
    ///
    /// # Errors
    ///
    /// See [`parse_record`].
    pub fn parse_at(
        &self,
        raw: &[u8],
        location: RecordLocation,
    ) -> Result<MutationGroup, ValidationError> {
        self.parse(raw).map_err(|e| e.at(location))
    }
}

//! Wide-column store abstraction.
//!
//! The import core talks to its store only through [`WideColumnIO`], a
//! provider-agnostic, synchronous trait modelled on a bulk `MutateRows` API:
//! one request carries many row mutations and reports a status per row.
//!
//! ## Module Structure
//!
//! - [`traits`] - the trait, [`TableRef`] addressing, and [`StoreError`]
//! - [`fake`] - [`FakeWideColumnIO`], an in-memory store with failure injection
//! - [`helpers`] - request chunking and redelivery backoff
//!
//! ## Error Handling
//!
//! Errors are categorized by [`ErrorKind`]. `Network`, `Timeout`,
//! `ServiceUnavailable` and `RateLimited` are transient and eligible for
//! redelivery; everything else fails the affected row for good.
//!
//! ```
//! use tablebeam::record::parse_record;
//! use tablebeam::schema::{COLUMN_FAMILY, FieldSchema};
//! use tablebeam::store::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let store = FakeWideColumnIO::new();
//! let table = TableRef::new("proj", "inst", "cache");
//! store.create_table(&table, &[COLUMN_FAMILY]);
//!
//! let group = parse_record(b"r1,a", &FieldSchema::default())?;
//! let statuses = store.mutate_rows(&table, &[group])?;
//! assert!(statuses.iter().all(Result::is_ok));
//!
//! let row = store.read_row(&table, b"r1")?.expect("row written");
//! assert_eq!(row.get(COLUMN_FAMILY, b"value"), Some(&b"a"[..]));
//! # Ok(())
//! # }
//! ```

pub mod fake;
pub mod helpers;
pub mod traits;

pub use fake::FakeWideColumnIO;
pub use traits::*;

//! # Tablebeam
//!
//! A **bulk CSV import** for wide-column stores. Tablebeam reads comma-separated
//! lines, turns each line into one row mutation, writes the rows in bulk, and only
//! once every row is durably acknowledged writes a single **completion token**
//! file that downstream jobs poll for.
//!
//! ## Key Features
//!
//! - **Lossless parsing** - raw bytes in, raw bytes stored; trailing empty fields are kept
//! - **Configurable schema** - one column per header name, all under the `csv` family
//! - **Batched writes** - requests respect per-request row and cell limits
//! - **Redelivery** - transiently failed rows are written again with backoff
//! - **Completion barrier** - the token is written exactly once, and never for a failed run
//! - **Sequential and parallel execution** - parallelism bounded by the worker setting
//! - **Templates** - options can be staged with late-bound parameters and launched later
//! - **Compressed input** - gzip, zstd and bzip2 (optional via feature flags)
//!
//! ## Quick Start
//!
//! ```
//! use tablebeam::*;
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! # let dir = tempfile::tempdir()?;
//! # let input = dir.path().join("cache.csv");
//! # std::fs::write(&input, "r1,a\nr2,b\n")?;
//! # let token = dir.path().join("completed.txt");
//! let table = TableRef::new("proj", "inst", "cache");
//! let store = FakeWideColumnIO::new();
//! store.create_table(&table, &[schema::COLUMN_FAMILY]);
//!
//! let mut options = ImportOptions::unbound();
//! options.set(config::params::PROJECT_ID, "proj")?;
//! options.set(config::params::INSTANCE_ID, "inst")?;
//! options.set(config::params::TABLE_ID, "cache")?;
//! options.set(config::params::INPUT_FILE, input.to_string_lossy())?;
//! options.set(config::params::COMPLETION_FILE, token.to_string_lossy())?;
//! let config = options.resolve(&RuntimeParameters::new())?;
//!
//! let summary = Runner::default().run(&config, Arc::new(store.clone()))?;
//! assert_eq!(summary.metrics.groups_written, 2);
//! assert!(token.exists());
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! [`RecordParser`] splits a line on `,`. Field 0 is the row key and field `i`
//! is written under the `i`-th name of the [`FieldSchema`]. A line with the
//! wrong number of fields is a [`ValidationError`] and fails the run.
//!
//! ### Sink
//!
//! [`MutationSink`] writes [`MutationGroup`]s through the [`WideColumnIO`]
//! trait and returns one [`WriteAcknowledgment`] per group. A real store client
//! implements the trait; [`FakeWideColumnIO`] is an in-memory implementation.
//!
//! ### Barrier
//!
//! [`CompletionBarrier`] counts submitted groups and their acknowledgments.
//! Once the input is sealed and every group succeeded it fires exactly once;
//! a failure or cancellation aborts it for good.
//!
//! ### Configuration
//!
//! [`ImportOptions`] holds late-bound [`ValueProvider`]s and can be saved as a
//! template. It is resolved once into an [`ImportConfig`], which is passed to
//! the [`Runner`].

pub mod barrier;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod record;
pub mod runner;
pub mod schema;
pub mod signal;
pub mod sink;
pub mod source;
pub mod store;
pub mod testing;

pub use barrier::{AbortReason, BarrierState, CancellationToken, CompletionBarrier};
pub use config::{ImportConfig, ImportOptions, RuntimeParameters, ValueProvider};
pub use error::{ImportError, ValidationError};
pub use metrics::{ImportMetrics, MetricsSnapshot};
pub use record::{CellWrite, MutationGroup, RecordLocation, RecordParser, parse_record};
pub use runner::{ExecMode, ImportSummary, Runner};
pub use schema::FieldSchema;
pub use signal::{read_completion_token, write_completion_token};
pub use sink::{MutationSink, SinkConfig, WriteAcknowledgment, WriteOutcome};
pub use store::{ErrorKind, FakeWideColumnIO, StoreError, TableRef, WideColumnIO};

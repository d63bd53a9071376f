//! Bulk writes of mutation groups, one acknowledgment per group.
//!
//! A [`MutationSink`] owns no mutable state, so any number of workers can
//! share one (it is cheap to clone) and write concurrently. Batching into
//! store requests is internal: callers always get exactly one
//! [`WriteAcknowledgment`] back for every group they hand in, in input order.

use crate::record::MutationGroup;
use crate::store::helpers::chunk_groups;
use crate::store::{ErrorKind, StoreError, TableRef, WideColumnIO};
use std::sync::Arc;
use tracing::{debug, warn};

/// Request limits for bulk writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    /// Maximum rows per `mutate_rows` request.
    pub max_batch_groups: usize,
    /// Maximum cell writes per request, summed over its rows.
    pub max_batch_cells: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            max_batch_groups: 100,
            max_batch_cells: 100_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Success,
    Failure(StoreError),
}

/// Outcome of writing one [`MutationGroup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteAcknowledgment {
    pub row_key: Vec<u8>,
    pub outcome: WriteOutcome,
}

impl WriteAcknowledgment {
    #[must_use]
    pub fn success(row_key: Vec<u8>) -> Self {
        Self {
            row_key,
            outcome: WriteOutcome::Success,
        }
    }

    #[must_use]
    pub fn failure(row_key: Vec<u8>, cause: StoreError) -> Self {
        Self {
            row_key,
            outcome: WriteOutcome::Failure(cause),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, WriteOutcome::Success)
    }

    #[must_use]
    pub fn cause(&self) -> Option<&StoreError> {
        match &self.outcome {
            WriteOutcome::Success => None,
            WriteOutcome::Failure(cause) => Some(cause),
        }
    }

    /// Failed, but a redelivery may still succeed.
    #[must_use]
    pub fn is_transient_failure(&self) -> bool {
        self.cause().is_some_and(StoreError::is_transient)
    }

    #[must_use]
    pub fn row_key_lossy(&self) -> String {
        String::from_utf8_lossy(&self.row_key).into_owned()
    }
}

/// Writes mutation groups to one table of a wide-column store.
#[derive(Clone)]
pub struct MutationSink {
    store: Arc<dyn WideColumnIO>,
    table: TableRef,
    config: SinkConfig,
}

impl MutationSink {
    pub fn new(store: Arc<dyn WideColumnIO>, table: TableRef) -> Self {
        Self {
            store,
            table,
            config: SinkConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: SinkConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn table(&self) -> &TableRef {
        &self.table
    }

    #[must_use]
    pub fn config(&self) -> SinkConfig {
        self.config
    }

    /// Write a single group.
    #[must_use]
    pub fn write(&self, group: MutationGroup) -> WriteAcknowledgment {
        let mut acks = self.submit(std::slice::from_ref(&group));
        acks.pop().unwrap_or_else(|| {
            WriteAcknowledgment::failure(
                group.row_key,
                StoreError::new(ErrorKind::InternalError, "store returned no status"),
            )
        })
    }

    /// Write groups in as few requests as the batch limits allow.
    ///
    /// A failing request only fails the groups it carried; later requests are
    /// still sent. The result lines up index-for-index with `groups`.
    #[must_use]
    pub fn write_all(&self, groups: &[MutationGroup]) -> Vec<WriteAcknowledgment> {
        let mut acks = Vec::with_capacity(groups.len());
        for range in chunk_groups(
            groups,
            self.config.max_batch_groups,
            self.config.max_batch_cells,
        ) {
            acks.extend(self.submit(&groups[range]));
        }
        acks
    }

    fn submit(&self, chunk: &[MutationGroup]) -> Vec<WriteAcknowledgment> {
        debug!(table = %self.table, rows = chunk.len(), "submitting bulk write");
        match self.store.mutate_rows(&self.table, chunk) {
            Ok(statuses) => {
                if statuses.len() != chunk.len() {
                    warn!(
                        table = %self.table,
                        expected = chunk.len(),
                        received = statuses.len(),
                        "store returned a mismatched number of row statuses"
                    );
                }
                let mut statuses = statuses.into_iter();
                chunk
                    .iter()
                    .map(|group| match statuses.next() {
                        Some(Ok(())) => WriteAcknowledgment::success(group.row_key.clone()),
                        Some(Err(cause)) => {
                            WriteAcknowledgment::failure(group.row_key.clone(), cause)
                        }
                        None => WriteAcknowledgment::failure(
                            group.row_key.clone(),
                            StoreError::new(ErrorKind::InternalError, "store returned no status"),
                        ),
                    })
                    .collect()
            }
            Err(cause) => {
                warn!(table = %self.table, rows = chunk.len(), error = %cause, "bulk write request failed");
                chunk
                    .iter()
                    .map(|group| WriteAcknowledgment::failure(group.row_key.clone(), cause.clone()))
                    .collect()
            }
        }
    }
}

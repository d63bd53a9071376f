//! In-memory fake wide-column store for testing.
//!
//! [`FakeWideColumnIO`] keeps real table state behind a mutex and can be told
//! to fail specific rows or whole requests, so sink and runner behaviour under
//! partial failure is testable without a network.

use crate::record::MutationGroup;
use crate::store::traits::{
    ErrorKind, StoreError, StoreResult, StoredRow, TableRef, WideColumnIO,
};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Cells = BTreeMap<(String, Vec<u8>), Vec<u8>>;

#[derive(Default)]
struct FakeTable {
    families: HashSet<String>,
    rows: BTreeMap<Vec<u8>, Cells>,
}

#[derive(Clone, Copy)]
struct RowFault {
    kind: ErrorKind,
    /// `None` fails forever; `Some(n)` fails the next `n` writes of the row.
    remaining: Option<u32>,
}

type TableStorage = Arc<Mutex<HashMap<String, FakeTable>>>;
type RowFaults = Arc<Mutex<HashMap<Vec<u8>, RowFault>>>;

#[derive(Clone, Default)]
pub struct FakeWideColumnIO {
    tables: TableStorage,
    row_faults: RowFaults,
    request_faults: Arc<Mutex<VecDeque<ErrorKind>>>,
    requests: Arc<AtomicUsize>,
    profiles_seen: Arc<Mutex<Vec<Option<String>>>>,
}

impl FakeWideColumnIO {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a table with the given column families.
    ///
    /// # Panics
    ///
    /// Panics if the tables mutex is poisoned.
    pub fn create_table(&self, table: &TableRef, families: &[&str]) {
        self.tables.lock().expect("tables mutex poisoned").insert(
            table.table_path(),
            FakeTable {
                families: families.iter().map(ToString::to_string).collect(),
                rows: BTreeMap::new(),
            },
        );
    }

    /// Fail every write of `row_key` with `kind`.
    ///
    /// # Panics
    ///
    /// Panics if the faults mutex is poisoned.
    pub fn fail_row(&self, row_key: impl Into<Vec<u8>>, kind: ErrorKind) {
        self.row_faults.lock().expect("faults mutex poisoned").insert(
            row_key.into(),
            RowFault {
                kind,
                remaining: None,
            },
        );
    }

    /// Fail the next `times` writes of `row_key` with `kind`, then accept it.
    ///
    /// # Panics
    ///
    /// Panics if the faults mutex is poisoned.
    pub fn fail_row_times(&self, row_key: impl Into<Vec<u8>>, kind: ErrorKind, times: u32) {
        self.row_faults.lock().expect("faults mutex poisoned").insert(
            row_key.into(),
            RowFault {
                kind,
                remaining: Some(times),
            },
        );
    }

    /// Reject the next `times` `mutate_rows` requests as a whole.
    ///
    /// # Panics
    ///
    /// Panics if the faults mutex is poisoned.
    pub fn fail_next_requests(&self, times: usize, kind: ErrorKind) {
        let mut faults = self.request_faults.lock().expect("faults mutex poisoned");
        faults.extend(std::iter::repeat_n(kind, times));
    }

    /// Number of `mutate_rows` calls received, failed ones included.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Routing profile of every request received, in arrival order.
    ///
    /// # Panics
    ///
    /// Panics if the profiles mutex is poisoned.
    #[must_use]
    pub fn app_profiles_seen(&self) -> Vec<Option<String>> {
        self.profiles_seen
            .lock()
            .expect("profiles mutex poisoned")
            .clone()
    }

    /// Every stored row of a table, ordered by row key.
    ///
    /// # Panics
    ///
    /// Panics if the tables mutex is poisoned.
    #[must_use]
    pub fn rows(&self, table: &TableRef) -> Vec<StoredRow> {
        let tables = self.tables.lock().expect("tables mutex poisoned");
        tables
            .get(&table.table_path())
            .map(|t| {
                t.rows
                    .iter()
                    .map(|(key, cells)| StoredRow {
                        row_key: key.clone(),
                        cells: cells.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn take_row_fault(&self, row_key: &[u8]) -> Option<ErrorKind> {
        let mut faults = self.row_faults.lock().expect("faults mutex poisoned");
        let fault = faults.get_mut(row_key)?;
        match &mut fault.remaining {
            None => Some(fault.kind),
            Some(0) => None,
            Some(n) => {
                *n -= 1;
                Some(fault.kind)
            }
        }
    }

    fn apply(&self, table: &mut FakeTable, group: &MutationGroup) -> StoreResult<()> {
        if group.row_key.is_empty() {
            return Err(StoreError::new(ErrorKind::InvalidInput, "row key must not be empty"));
        }
        if let Some(kind) = self.take_row_fault(&group.row_key) {
            return Err(StoreError::new(
                kind,
                format!("injected failure for row {:?}", group.row_key_lossy()),
            ));
        }
        // A row mutation is all-or-nothing: validate every cell first.
        if let Some(cell) = group
            .cells
            .iter()
            .find(|c| !table.families.contains(&c.family))
        {
            return Err(StoreError::new(
                ErrorKind::InvalidInput,
                format!("unknown column family {:?}", cell.family),
            ));
        }

        let row = table.rows.entry(group.row_key.clone()).or_default();
        for cell in &group.cells {
            row.insert(
                (cell.family.clone(), cell.qualifier.clone()),
                cell.value.clone(),
            );
        }
        Ok(())
    }
}

impl WideColumnIO for FakeWideColumnIO {
    fn mutate_rows(
        &self,
        table: &TableRef,
        entries: &[MutationGroup],
    ) -> StoreResult<Vec<StoreResult<()>>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.profiles_seen
            .lock()
            .expect("profiles mutex poisoned")
            .push(table.app_profile_id.clone());

        if let Some(kind) = self
            .request_faults
            .lock()
            .expect("faults mutex poisoned")
            .pop_front()
        {
            return Err(StoreError::new(kind, "injected request failure"));
        }

        let mut tables = self.tables.lock().expect("tables mutex poisoned");
        let stored = tables.get_mut(&table.table_path()).ok_or_else(|| {
            StoreError::new(ErrorKind::NotFound, format!("table {} not found", table.table_path()))
        })?;

        let statuses = entries.iter().map(|g| self.apply(stored, g)).collect();
        drop(tables);
        Ok(statuses)
    }

    fn read_row(&self, table: &TableRef, row_key: &[u8]) -> StoreResult<Option<StoredRow>> {
        let tables = self.tables.lock().expect("tables mutex poisoned");
        let stored = tables.get(&table.table_path()).ok_or_else(|| {
            StoreError::new(ErrorKind::NotFound, format!("table {} not found", table.table_path()))
        })?;
        Ok(stored.rows.get(row_key).map(|cells| StoredRow {
            row_key: row_key.to_vec(),
            cells: cells.clone(),
        }))
    }
}

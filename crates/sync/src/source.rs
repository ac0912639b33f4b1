use std::cell::RefCell;

use gridlink_core::CellValue;

use crate::error::SyncError;

/// One result set fetched from upstream. Rows may be ragged; missing cells
/// read as empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl TableData {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Upstream query execution collaborator.
///
/// Synchronous by design: the host grid is single-threaded and a refresh
/// blocks for the duration of the call.
pub trait Connection {
    /// Cheap liveness probe.
    fn probe(&self) -> Result<(), SyncError>;

    /// Execute `query` and return the result set at `result_set` (0-based).
    fn execute(&self, query: &str, result_set: usize) -> Result<TableData, SyncError>;
}

/// Fixed-data connection. Serves one result set, replaceable between calls;
/// used by tests and demos.
#[derive(Debug, Default)]
pub struct StaticConnection {
    data: RefCell<TableData>,
    failure: RefCell<Option<SyncError>>,
    execute_failure: RefCell<Option<SyncError>>,
}

impl StaticConnection {
    pub fn new(data: TableData) -> Self {
        Self {
            data: RefCell::new(data),
            failure: RefCell::new(None),
            execute_failure: RefCell::new(None),
        }
    }

    /// Replace the served result set (simulates the upstream changing).
    pub fn set_data(&self, data: TableData) {
        *self.data.borrow_mut() = data;
    }

    /// Make every probe and execute fail with `err` until cleared with `None`.
    pub fn set_failure(&self, err: Option<SyncError>) {
        *self.failure.borrow_mut() = err;
    }

    /// Make only `execute` fail: the probe still reports healthy.
    pub fn set_execute_failure(&self, err: Option<SyncError>) {
        *self.execute_failure.borrow_mut() = err;
    }
}

impl Connection for StaticConnection {
    fn probe(&self) -> Result<(), SyncError> {
        match &*self.failure.borrow() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn execute(&self, _query: &str, _result_set: usize) -> Result<TableData, SyncError> {
        if let Some(err) = &*self.failure.borrow() {
            return Err(err.clone());
        }
        if let Some(err) = &*self.execute_failure.borrow() {
            return Err(err.clone());
        }
        Ok(self.data.borrow().clone())
    }
}

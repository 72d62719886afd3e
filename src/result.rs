//! Outcome of a statement execution
//!
//! The execution layer fills an [`ExecResult`] once; this type only reports
//! what it was given.

use crate::error::Error;

/// Values reported after executing a DML statement
#[derive(Debug)]
pub struct ExecResult {
    last_insert_id: Result<i64, Error>,
    rows_affected: Result<i64, Error>,
    last_row_id: Option<String>,
}

impl ExecResult {
    /// Create a result from the values computed by the execution layer
    pub fn new(last_insert_id: Result<i64, Error>, rows_affected: Result<i64, Error>) -> Self {
        Self {
            last_insert_id,
            rows_affected,
            last_row_id: None,
        }
    }

    /// Attach the ROWID of the last inserted row
    pub fn with_row_id(mut self, row_id: impl Into<String>) -> Self {
        self.last_row_id = Some(row_id.into());
        self
    }

    /// Numeric id of the last inserted row, or why it is unavailable
    pub fn last_insert_id(&self) -> Result<i64, &Error> {
        self.last_insert_id.as_ref().copied()
    }

    /// Number of rows the statement touched, or why it is unavailable
    pub fn rows_affected(&self) -> Result<i64, &Error> {
        self.rows_affected.as_ref().copied()
    }

    /// ROWID of the last inserted row, when the execution layer reported one
    pub fn last_row_id(&self) -> Option<&str> {
        self.last_row_id.as_deref()
    }
}

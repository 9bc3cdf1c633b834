// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! In-memory row table.
//!
//! The store owns the canonical ordered row sequence behind one
//! reader-writer lock. The row set is fixed at construction; only the lock
//! fields mutate afterwards. Mutating closures run inside the write
//! critical section, which keeps check-and-set sequences (acquire, release,
//! sweep) atomic with respect to each other, while reads take snapshot
//! copies and never observe a torn write.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::{LockError, Result};

// ============================================================================
// Row
// ============================================================================

/// One lockable row of the shared table.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Unique id, fixed at seed time.
    pub id: u64,

    /// Display name.
    pub name: String,

    /// Display value.
    pub value: String,

    /// Current lock holder; `None` means unlocked.
    pub locked_by: Option<String>,

    /// When the current lock was acquired; `None` exactly when unlocked.
    pub locked_at: Option<DateTime<Utc>>,
}

impl Row {
    /// Create an unlocked row.
    #[must_use]
    pub fn new(id: u64, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            value: value.into(),
            locked_by: None,
            locked_at: None,
        }
    }

    /// Whether any user holds this row.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked_by.is_some()
    }

    /// Mark the row held by `user` as of now.
    pub fn lock(&mut self, user: impl Into<String>) {
        self.locked_by = Some(user.into());
        self.locked_at = Some(Utc::now());
    }

    /// Clear both lock fields together.
    pub fn unlock(&mut self) {
        self.locked_by = None;
        self.locked_at = None;
    }

    /// Seconds the current lock has been held, or `None` when unlocked.
    #[must_use]
    pub fn lock_age_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.locked_at
            .map(|at| now.signed_duration_since(at).num_seconds())
    }
}

// ============================================================================
// Row Store
// ============================================================================

/// Owner of the row table.
#[derive(Debug)]
pub struct RowStore {
    rows: RwLock<Vec<Row>>,
}

impl Default for RowStore {
    fn default() -> Self {
        Self::seeded()
    }
}

impl RowStore {
    /// Build the store with the fixed seed table.
    #[must_use]
    pub fn seeded() -> Self {
        Self::with_rows(vec![
            Row::new(1, "Row 1", "A"),
            Row::new(2, "Row 2", "B"),
            Row::new(3, "Row 3", "C"),
        ])
    }

    /// Build the store from an explicit row set.
    #[must_use]
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// Number of rows in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Whether the table holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Ordered snapshot copy of every row.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Row> {
        self.rows.read().clone()
    }

    /// Read a single row through `f`, or [`LockError::NotFound`].
    pub fn with_row<T>(&self, id: u64, f: impl FnOnce(&Row) -> T) -> Result<T> {
        let rows = self.rows.read();
        rows.iter()
            .find(|row| row.id == id)
            .map(f)
            .ok_or(LockError::NotFound { row_id: id })
    }

    /// Mutate a single row through `f` under the write lock.
    ///
    /// Fails with [`LockError::NotFound`] when the id is absent; `f` runs
    /// inside the critical section and may itself reject, so callers can
    /// make a check-and-set decision in one atomic step.
    pub fn update<T>(&self, id: u64, f: impl FnOnce(&mut Row) -> Result<T>) -> Result<T> {
        let mut rows = self.rows.write();
        let row = rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(LockError::NotFound { row_id: id })?;
        f(row)
    }

    /// Run `f` over every row under one write critical section.
    pub fn update_all<T>(&self, f: impl FnOnce(&mut [Row]) -> T) -> T {
        let mut rows = self.rows.write();
        f(&mut rows)
    }
}

// ============================================================================
// Tests
// ============================================================================

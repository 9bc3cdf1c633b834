// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Frames pushed to connected observers.
//!
//! Every push is a full-table snapshot: one frame type on the wire, sent on
//! observer connect, after each successful mutation, and once per sweep
//! tick as a heartbeat.

use serde::{Deserialize, Serialize};

use crate::store::Row;

/// One row as observers and HTTP clients see it.
///
/// `locked_at` is sweeper bookkeeping and never leaves the process; the
/// wire carries only the holder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowSnapshot {
    /// Row id.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Display value.
    pub value: String,
    /// Current lock holder, `null` when unlocked.
    pub locked_by: Option<String>,
}

impl From<&Row> for RowSnapshot {
    fn from(row: &Row) -> Self {
        Self {
            id: row.id,
            name: row.name.clone(),
            value: row.value.clone(),
            locked_by: row.locked_by.clone(),
        }
    }
}

/// Events broadcast to WebSocket observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TableEvent {
    /// The full table after a state change or sweep tick.
    Snapshot {
        /// All rows in table order.
        rows: Vec<RowSnapshot>,
    },
}

// ============================================================================
// Tests
// ============================================================================

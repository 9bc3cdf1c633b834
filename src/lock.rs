// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Lock state machine over the row store.
//!
//! One manager instance owns the store and the snapshot broadcast channel.
//! Acquire, release, and the expiry sweep all run their check-and-set
//! inside the store's write critical section; frames are emitted only after
//! the table lock is released, so a slow observer can never stall a
//! mutation.
//!
//! Acquisition is strictly first-come-first-served with no queueing: a
//! losing acquire gets a conflict and retries later.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::constants::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_LOCK_TTL_SECS};
use crate::error::{LockError, Result};
use crate::events::{RowSnapshot, TableEvent};
use crate::store::{Row, RowStore};

// ============================================================================
// Lock Manager
// ============================================================================

/// Enforces who may hold each row and tells observers when that changes.
#[derive(Debug)]
pub struct LockManager {
    /// Row table; every mutation goes through its critical section.
    store: RowStore,
    /// How long a lock may be held before a sweep reclaims it.
    lock_ttl: Duration,
    /// Broadcast channel for snapshot frames.
    event_tx: broadcast::Sender<TableEvent>,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(RowStore::seeded())
    }
}

impl LockManager {
    /// Create a manager over `store` with the default lease and channel
    /// capacity.
    #[must_use]
    pub fn new(store: RowStore) -> Self {
        Self::with_ttl(store, Duration::from_secs(DEFAULT_LOCK_TTL_SECS))
    }

    /// Create a manager with a custom lock lease.
    #[must_use]
    pub fn with_ttl(store: RowStore, lock_ttl: Duration) -> Self {
        Self::with_ttl_and_capacity(store, lock_ttl, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a manager with a custom lease and broadcast capacity.
    #[must_use]
    pub fn with_ttl_and_capacity(store: RowStore, lock_ttl: Duration, capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);
        Self {
            store,
            lock_ttl,
            event_tx,
        }
    }

    /// The configured lock lease.
    #[must_use]
    pub fn lock_ttl(&self) -> Duration {
        self.lock_ttl
    }

    /// Subscribe to snapshot frames.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TableEvent> {
        self.event_tx.subscribe()
    }

    /// Number of live observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.event_tx.receiver_count()
    }

    /// Ordered snapshot of the table.
    #[must_use]
    pub fn table(&self) -> Vec<Row> {
        self.store.snapshot()
    }

    /// The table as observers see it on the wire.
    #[must_use]
    pub fn snapshot_rows(&self) -> Vec<RowSnapshot> {
        self.store.snapshot().iter().map(RowSnapshot::from).collect()
    }

    /// Grant `user_id` the exclusive lock on `row_id`.
    ///
    /// Fails with [`LockError::Conflict`] while anyone holds the row,
    /// including `user_id` itself: a holder keeps its original `locked_at`
    /// and cannot refresh the lease by re-acquiring.
    pub fn acquire(&self, row_id: u64, user_id: &str) -> Result<()> {
        self.store.update(row_id, |row| {
            if let Some(holder) = &row.locked_by {
                return Err(LockError::Conflict {
                    row_id,
                    holder: holder.clone(),
                });
            }
            row.lock(user_id);
            Ok(())
        })?;

        tracing::debug!(row_id, user_id, "row locked");
        self.emit_snapshot();
        Ok(())
    }

    /// Release the lock on `row_id` held by `user_id`.
    ///
    /// Fails with [`LockError::NotOwner`] when the row is unlocked or held
    /// by someone else.
    pub fn release(&self, row_id: u64, user_id: &str) -> Result<()> {
        self.store.update(row_id, |row| {
            if row.locked_by.as_deref() != Some(user_id) {
                return Err(LockError::NotOwner { row_id });
            }
            row.unlock();
            Ok(())
        })?;

        tracing::debug!(row_id, user_id, "row unlocked");
        self.emit_snapshot();
        Ok(())
    }

    /// Current holder of `row_id`, or `None` when unlocked.
    pub fn inspect(&self, row_id: u64) -> Result<Option<String>> {
        self.store.with_row(row_id, |row| row.locked_by.clone())
    }

    /// Clear every lock older than the lease; report what was cleared.
    ///
    /// Ownership is not consulted: expiry is a forced release. The whole
    /// scan-and-clear runs in one write critical section, so a concurrent
    /// acquire either completes before the sweep visits the row or observes
    /// the cleared state. No frame is emitted here; the periodic sweeper
    /// broadcasts after each pass, and the read path stays non-publishing.
    pub fn sweep_expired(&self) -> Vec<(u64, String)> {
        let now = Utc::now();
        let ttl_secs = i64::try_from(self.lock_ttl.as_secs()).unwrap_or(i64::MAX);

        let cleared = self.store.update_all(|rows| {
            let mut cleared = Vec::new();
            for row in rows.iter_mut() {
                if let (Some(holder), Some(age)) = (row.locked_by.clone(), row.lock_age_secs(now))
                {
                    if age > ttl_secs {
                        row.unlock();
                        cleared.push((row.id, holder, age));
                    }
                }
            }
            cleared
        });

        let mut released = Vec::with_capacity(cleared.len());
        for (row_id, holder, age_secs) in cleared {
            tracing::info!(row_id, holder = %holder, age_secs, "lock expired, force released");
            released.push((row_id, holder));
        }
        released
    }

    /// Broadcast the current table to every observer.
    ///
    /// Returns the number of observers that received the frame; a send with
    /// no observers is not an error.
    pub fn emit_snapshot(&self) -> usize {
        let rows = self.snapshot_rows();
        self.event_tx
            .send(TableEvent::Snapshot { rows })
            .unwrap_or(0)
    }
}

// ============================================================================
// Tests
// ============================================================================

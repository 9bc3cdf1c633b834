// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Periodic expiry sweep.
//!
//! A single background task clears expired locks and then broadcasts a
//! snapshot frame on every tick, whether or not anything changed. The
//! unconditional frame doubles as a liveness heartbeat for observers and
//! re-syncs any that dropped frames while lagging.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::lock::LockManager;

/// Run the sweep loop until `shutdown` fires.
///
/// Ticks that pile up behind a long pause are skipped rather than burst:
/// back-to-back sweeps of an already-clean table would only spam observers
/// with identical frames.
pub async fn run(
    manager: Arc<LockManager>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; consume it so the first sweep
    // lands a full interval after startup.
    ticker.tick().await;

    tracing::info!(interval_secs = interval.as_secs(), "expiry sweeper started");

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = ticker.tick() => {
                let cleared = manager.sweep_expired();
                let observers = manager.emit_snapshot();
                tracing::debug!(cleared = cleared.len(), observers, "sweep tick");
            }
        }
    }

    tracing::info!("expiry sweeper stopped");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TableEvent;
    use crate::store::{Row, RowStore};
    use chrono::Utc;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_sweeper_clears_aged_lock_and_broadcasts() {
        let mut row = Row::new(1, "Row 1", "A");
        row.locked_by = Some("alice".to_string());
        row.locked_at = Some(Utc::now() - chrono::Duration::seconds(600));
        let manager = Arc::new(LockManager::new(RowStore::with_rows(vec![row])));

        let mut rx = manager.subscribe();
        let (shutdown_tx, _) = broadcast::channel(1);
        let sweeper = tokio::spawn(run(
            Arc::clone(&manager),
            Duration::from_millis(10),
            shutdown_tx.subscribe(),
        ));

        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no frame within deadline")
            .expect("channel closed");
        let TableEvent::Snapshot { rows } = event;
        assert!(rows[0].locked_by.is_none());
        assert_eq!(manager.inspect(1).unwrap(), None);

        shutdown_tx.send(()).unwrap();
        timeout(Duration::from_secs(5), sweeper)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweeper_broadcasts_when_idle() {
        let manager = Arc::new(LockManager::new(RowStore::seeded()));

        let mut rx = manager.subscribe();
        let (shutdown_tx, _) = broadcast::channel(1);
        let sweeper = tokio::spawn(run(
            Arc::clone(&manager),
            Duration::from_millis(10),
            shutdown_tx.subscribe(),
        ));

        // Nothing to clear, yet frames keep coming.
        for _ in 0..2 {
            let event = timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("no frame within deadline")
                .expect("channel closed");
            let TableEvent::Snapshot { rows } = event;
            assert_eq!(rows.len(), 3);
            assert!(rows.iter().all(|row| row.locked_by.is_none()));
        }

        shutdown_tx.send(()).unwrap();
        timeout(Duration::from_secs(5), sweeper)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let manager = Arc::new(LockManager::new(RowStore::seeded()));
        let (shutdown_tx, _) = broadcast::channel(1);
        let sweeper = tokio::spawn(run(
            Arc::clone(&manager),
            Duration::from_secs(60),
            shutdown_tx.subscribe(),
        ));

        shutdown_tx.send(()).unwrap();
        timeout(Duration::from_secs(5), sweeper)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}

//! Property-based tests for lock manager invariants
//!
//! This module contains proptest-based tests that drive random operation
//! sequences through the lock manager and verify structural invariants
//! against a reference model.
//!
//! # Tested Invariants
//!
//! 1. **Field Pairing**: `locked_by` and `locked_at` are always both set or both clear
//! 2. **Failed Ops**: A rejected acquire or release leaves the table unchanged
//! 3. **Model Agreement**: The manager matches a plain map-based reference model
//!
//! # Usage
//!
//! Run these tests with:
//! ```bash
//! cargo test lock_proptest --release
//! ```
//!
//! For more iterations (to find rarer edge cases):
//! ```bash
//! PROPTEST_CASES=10000 cargo test lock_proptest --release
//! ```

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use std::collections::HashMap;

    use crate::error::LockError;
    use crate::lock::LockManager;
    use crate::store::RowStore;

    // =========================================================================
    // Strategy Helpers
    // =========================================================================

    /// A single operation against the manager
    #[derive(Debug, Clone)]
    enum Op {
        Acquire { row_id: u64, user: String },
        Release { row_id: u64, user: String },
        Sweep,
    }

    /// Generate a user from a small pool so contention actually happens
    fn arb_user() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["alice", "bob", "carol"]).prop_map(str::to_string)
    }

    /// Generate an operation; row ids range past the table edge to hit
    /// the not-found path
    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u64..5, arb_user()).prop_map(|(row_id, user)| Op::Acquire { row_id, user }),
            (0u64..5, arb_user()).prop_map(|(row_id, user)| Op::Release { row_id, user }),
            Just(Op::Sweep),
        ]
    }

    fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
        proptest::collection::vec(arb_op(), 0..40)
    }

    // =========================================================================
    // Property Tests: Lock Manager
    // =========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// `locked_by` and `locked_at` move together through any sequence
        #[test]
        fn lock_fields_stay_paired(ops in arb_ops()) {
            let manager = LockManager::new(RowStore::seeded());
            for op in ops {
                match op {
                    Op::Acquire { row_id, user } => { let _ = manager.acquire(row_id, &user); }
                    Op::Release { row_id, user } => { let _ = manager.release(row_id, &user); }
                    Op::Sweep => { manager.sweep_expired(); }
                }
                for row in manager.table() {
                    prop_assert_eq!(row.locked_by.is_some(), row.locked_at.is_some());
                }
            }
        }

        /// A rejected operation leaves the table exactly as it found it
        #[test]
        fn failed_ops_leave_state_unchanged(ops in arb_ops()) {
            let manager = LockManager::new(RowStore::seeded());
            for op in ops {
                let before = manager.table();
                let outcome = match &op {
                    Op::Acquire { row_id, user } => manager.acquire(*row_id, user),
                    Op::Release { row_id, user } => manager.release(*row_id, user),
                    Op::Sweep => {
                        manager.sweep_expired();
                        Ok(())
                    }
                };
                if outcome.is_err() {
                    prop_assert_eq!(manager.table(), before);
                }
            }
        }

        /// The manager agrees with a plain map-based reference model
        #[test]
        fn matches_reference_model(ops in arb_ops()) {
            let manager = LockManager::new(RowStore::seeded());
            let mut model: HashMap<u64, String> = HashMap::new();

            for op in ops {
                match op {
                    Op::Acquire { row_id, user } => {
                        let result = manager.acquire(row_id, &user);
                        if !(1..=3u64).contains(&row_id) {
                            prop_assert_eq!(result, Err(LockError::NotFound { row_id }));
                        } else if let Some(holder) = model.get(&row_id) {
                            prop_assert!(matches!(
                                &result,
                                Err(LockError::Conflict { holder: h, .. }) if h == holder
                            ));
                        } else {
                            prop_assert_eq!(result, Ok(()));
                            model.insert(row_id, user);
                        }
                    }
                    Op::Release { row_id, user } => {
                        let result = manager.release(row_id, &user);
                        if !(1..=3u64).contains(&row_id) {
                            prop_assert_eq!(result, Err(LockError::NotFound { row_id }));
                        } else if model.get(&row_id) == Some(&user) {
                            prop_assert_eq!(result, Ok(()));
                            model.remove(&row_id);
                        } else {
                            prop_assert_eq!(result, Err(LockError::NotOwner { row_id }));
                        }
                    }
                    Op::Sweep => {
                        // locks created in this run are fresh; nothing expires
                        prop_assert!(manager.sweep_expired().is_empty());
                    }
                }
            }

            for row in manager.table() {
                prop_assert_eq!(row.locked_by.as_ref(), model.get(&row.id));
            }
        }
    }
}

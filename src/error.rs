// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Error types for the row-lock service.
//!
//! Every operation failure is a typed [`LockError`]; nothing in the lock
//! path panics on bad input. All variants are terminal: the core never
//! retries, and no failing operation mutates row state.

use thiserror::Error;

/// Result type alias using [`LockError`].
pub type Result<T> = std::result::Result<T, LockError>;

/// Errors returned by lock operations and request validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum LockError {
    /// The request is missing `rowId` or `userId`, or a field is empty.
    #[error("rowId and userId required")]
    MissingInput,

    /// No row with the requested id exists.
    #[error("row {row_id} not found")]
    NotFound {
        /// The id that was requested.
        row_id: u64,
    },

    /// The row is already locked, by the reported holder.
    ///
    /// Raised for every acquire against a held row, including one held by
    /// the requesting user: re-acquiring does not refresh the lease.
    #[error("row {row_id} already locked by {holder}")]
    Conflict {
        /// The id of the contested row.
        row_id: u64,
        /// User currently holding the lock.
        holder: String,
    },

    /// A release was attempted by a caller that does not hold the lock,
    /// or the row is not locked at all.
    #[error("row {row_id} not locked by caller")]
    NotOwner {
        /// The id of the row.
        row_id: u64,
    },
}

impl LockError {
    /// Whether retrying the identical request later can succeed with no
    /// change from the caller (the holder may release, or the lease may
    /// expire).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================

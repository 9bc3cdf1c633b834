// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Centralized defaults for the row-lock service.
//!
//! Every tunable draws its default from here so the values live in one
//! place and tests can reference them directly.

/// Default TCP port for the HTTP/WebSocket server.
pub const DEFAULT_PORT: u16 = 3000;

/// Default bind host IP.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// How long a lock may be held before the sweeper reclaims it, in seconds.
pub const DEFAULT_LOCK_TTL_SECS: u64 = 300;

/// How often the expiry sweeper runs, in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 10;

/// Capacity of the snapshot broadcast channel, in frames.
///
/// An observer that falls further behind than this starts lagging and
/// misses the oldest frames rather than stalling the senders.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

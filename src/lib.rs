// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Row lock coordination for a small shared table.
//!
//! One process owns an ordered table of rows and arbitrates exclusive,
//! user-scoped locks over them. Every connected observer sees the same
//! table: the server pushes a full snapshot frame over WebSocket after
//! each mutation and on every sweep tick.
//!
//! ## Architecture
//!
//! - [`store`]: ordered in-memory row table behind a single lock
//! - [`lock`]: acquire/release state machine plus the expiry sweep
//! - [`events`]: snapshot frames broadcast to observers
//! - [`server`]: axum HTTP/WebSocket gateway
//! - [`sweeper`]: background task that reclaims expired locks
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rowlock::{LockServer, ServerConfig};
//!
//! let server = LockServer::new(ServerConfig::default().with_port(3000));
//! let addr = server.start().await?;
//! println!("listening on {addr}");
//! ```

pub mod constants;
pub mod error;
pub mod events;
pub mod lock;
pub mod server;
pub mod store;
pub mod sweeper;

#[cfg(test)]
mod lock_proptest;

pub use error::{LockError, Result};
pub use events::{RowSnapshot, TableEvent};
pub use lock::LockManager;
pub use server::{LockServer, ServerConfig, ServerState};
pub use store::{Row, RowStore};

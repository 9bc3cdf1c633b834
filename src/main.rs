//! Row Lock Coordination Server
//!
//! Serves a small shared table over HTTP and pushes full-table snapshot
//! frames to WebSocket observers at /ws. A background sweeper reclaims
//! locks whose lease has expired.
//!
//! © 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

// =============================================================================
// Environment Variable Constants
// =============================================================================

/// Bind host IP (default: 0.0.0.0)
const ROWLOCK_HOST: &str = "ROWLOCK_HOST";
/// Bind port (default: 3000)
const ROWLOCK_PORT: &str = "ROWLOCK_PORT";
/// Lock lease in seconds (default: 300)
const ROWLOCK_LOCK_TTL_SECS: &str = "ROWLOCK_LOCK_TTL_SECS";
/// Sweep cadence in seconds (default: 10)
const ROWLOCK_SWEEP_INTERVAL_SECS: &str = "ROWLOCK_SWEEP_INTERVAL_SECS";

use anyhow::{Context, Result};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use rowlock::constants::{
    DEFAULT_HOST, DEFAULT_LOCK_TTL_SECS, DEFAULT_PORT, DEFAULT_SWEEP_INTERVAL_SECS,
};
use rowlock::server::{LockServer, ServerConfig};
use rowlock::sweeper;

/// Read an environment variable, falling back to `default` when it is
/// absent or malformed.
fn env_parse<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(var = name, value = %raw, default = %default, "malformed value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Read the bind host from the environment, falling back to `default`
/// when the value is absent or does not parse as an IP address.
fn env_host(name: &str, default: &str) -> String {
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<IpAddr>() {
            Ok(ip) => ip.to_string(),
            Err(_) => {
                warn!(var = name, value = %raw, default = %default, "malformed value, using default");
                default.to_string()
            }
        },
        Err(_) => default.to_string(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = async {
        std::future::pending::<()>().await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Configuration from environment
    let host = env_host(ROWLOCK_HOST, DEFAULT_HOST);
    let port: u16 = env_parse(ROWLOCK_PORT, DEFAULT_PORT);
    let lock_ttl_secs: u64 = env_parse(ROWLOCK_LOCK_TTL_SECS, DEFAULT_LOCK_TTL_SECS);
    let sweep_interval_secs: u64 =
        env_parse(ROWLOCK_SWEEP_INTERVAL_SECS, DEFAULT_SWEEP_INTERVAL_SECS);

    let config = ServerConfig::default()
        .with_host(host)
        .with_port(port)
        .with_lock_ttl(Duration::from_secs(lock_ttl_secs))
        .with_sweep_interval(Duration::from_secs(sweep_interval_secs));

    info!(
        host = %config.host,
        port = config.port,
        lock_ttl_secs,
        sweep_interval_secs,
        "Configuration loaded"
    );

    let server = LockServer::new(config);
    let state = server.state();

    // Graceful shutdown signal
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let sweeper_task = tokio::spawn(sweeper::run(
        Arc::clone(&state.manager),
        state.config.sweep_interval,
        shutdown_tx.subscribe(),
    ));

    server
        .run_until(shutdown_signal())
        .await
        .context("server terminated abnormally")?;

    info!("Server stopped, shutting down sweeper...");
    let _ = shutdown_tx.send(());
    sweeper_task.await.context("sweeper task panicked")?;

    info!("Shutdown complete");
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_parse_absent_uses_default() {
        assert_eq!(env_parse::<u16>("ROWLOCK_TEST_ABSENT", 3000), 3000);
    }

    #[test]
    fn test_env_parse_reads_value() {
        std::env::set_var("ROWLOCK_TEST_PORT", "8080");
        assert_eq!(env_parse::<u16>("ROWLOCK_TEST_PORT", 3000), 8080);
        std::env::remove_var("ROWLOCK_TEST_PORT");
    }

    #[test]
    fn test_env_parse_malformed_uses_default() {
        std::env::set_var("ROWLOCK_TEST_BAD", "not-a-number");
        assert_eq!(env_parse::<u64>("ROWLOCK_TEST_BAD", 300), 300);
        std::env::remove_var("ROWLOCK_TEST_BAD");
    }

    #[test]
    fn test_env_host_reads_value() {
        std::env::set_var("ROWLOCK_TEST_HOST", "127.0.0.1");
        assert_eq!(env_host("ROWLOCK_TEST_HOST", "0.0.0.0"), "127.0.0.1");
        std::env::remove_var("ROWLOCK_TEST_HOST");
    }

    #[test]
    fn test_env_host_malformed_uses_default() {
        // hostnames do not qualify either; the bind address must be an IP
        for bad in ["not-a-host!", "localhost"] {
            std::env::set_var("ROWLOCK_TEST_BAD_HOST", bad);
            assert_eq!(env_host("ROWLOCK_TEST_BAD_HOST", "0.0.0.0"), "0.0.0.0");
            std::env::remove_var("ROWLOCK_TEST_BAD_HOST");
        }
    }

    #[test]
    fn test_env_host_absent_uses_default() {
        assert_eq!(env_host("ROWLOCK_TEST_NO_HOST", "0.0.0.0"), "0.0.0.0");
    }

    #[tokio::test]
    async fn test_malformed_host_env_still_binds() {
        std::env::set_var("ROWLOCK_TEST_SERVE_HOST", "not-a-host!");
        let host = env_host("ROWLOCK_TEST_SERVE_HOST", "127.0.0.1");
        std::env::remove_var("ROWLOCK_TEST_SERVE_HOST");

        // The override never reaches the bind path; startup proceeds on
        // the fallback address.
        let server = LockServer::new(ServerConfig::default().with_host(host).with_port(0));
        let addr = server.start().await.unwrap();
        assert!(addr.ip().is_loopback());
    }
}

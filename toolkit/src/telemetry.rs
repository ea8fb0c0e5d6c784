//! Tracing initialization for applications embedding the toolkit.
//!
//! The library only emits `tracing` events; it never installs a subscriber on its own. Binaries
//! that want console output can call [`init_telemetry`] once at startup. The filter defaults to
//! `info` and can be overridden with `RUST_LOG`, e.g. `RUST_LOG=toolkit=debug`.

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs a global fmt subscriber filtered by `RUST_LOG`.
///
/// Fails if a global subscriber is already set.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    info!("Telemetry initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        // The first call may lose the race to another test's subscriber; either way one is set now
        let _ = init_telemetry();
        assert!(init_telemetry().is_err());
    }
}

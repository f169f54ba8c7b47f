use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. The filter comes from `WINSTASH_LOG`
/// (`info` when unset or blank).
pub fn init_logging() -> Result<()> {
    let level = std::env::var("WINSTASH_LOG")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "info".to_string());

    let filter = EnvFilter::try_new(&level)
        .with_context(|| format!("invalid WINSTASH_LOG directives `{level}`"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))
        .context("failed to initialize logging")
}

//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber.
///
/// `RUST_LOG` directives are honoured; `level` applies to the roundlink
/// crates on top of them.
pub fn init(level: &str) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(level)?)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing init failed: {e}"))
}

fn filter(level: &str) -> anyhow::Result<EnvFilter> {
    let mut filter = EnvFilter::from_default_env();
    for krate in ["roundlink_oracle", "roundlink_service", "roundlink_db"] {
        filter = filter.add_directive(format!("{krate}={level}").parse()?);
    }
    Ok(filter)
}

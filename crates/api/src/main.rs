//! Drowsiness Monitor - Main Entry Point
//!
//! Usage: `drowsiness-monitor [CONFIG_FILE]`

use api::{init_logging, run_server, AppConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1);
    let config = AppConfig::load(config_path.as_deref())?;
    init_logging(&config.logging)?;

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        ear_threshold = config.dms.ear_threshold,
        ear_consec_frames = config.dms.ear_consec_frames,
        mar_threshold = config.dms.mar_threshold,
        mar_consec_frames = config.dms.mar_consec_frames,
        "Starting driver monitoring..."
    );

    run_server(config).await?;

    Ok(())
}

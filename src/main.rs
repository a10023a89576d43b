use anyhow::{Context, Result};
use clap::Parser;

use cloud_image_sync::config::Config;
use cloud_image_sync::logging;
use cloud_image_sync::manifest::Manifest;
use cloud_image_sync::openstack::{OsClient, clouds};
use cloud_image_sync::run::Runner;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::parse();
    logging::init(cfg.log_file.as_deref(), cfg.debug)?;

    tracing::info!(
        cloud = %cfg.cloud,
        network = %cfg.network,
        manifest = %cfg.input_file.display(),
        "starting image sync"
    );

    // Manifest and auth problems are the only fatal ones; everything after
    // this point is per-entry and survives into the summary instead.
    let manifest = Manifest::load(&cfg.input_file)?;
    let profile = clouds::load_profile(&cfg.cloud)?;
    let os = OsClient::connect(&profile)
        .await
        .with_context(|| format!("connect to cloud '{}'", cfg.cloud))?;

    let report = Runner::new(&cfg, &os).run(&manifest).await;
    print!("{report}");

    if report.failed() > 0 {
        tracing::warn!(failed = report.failed(), "run finished with failures");
    } else {
        tracing::info!("run finished");
    }

    // Individual entry failures are reported, not escalated; the batch
    // itself completed.
    Ok(())
}

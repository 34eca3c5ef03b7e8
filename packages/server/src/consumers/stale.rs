use std::sync::Arc;
use std::time::Duration;

use mq::JobQueue;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::StaleJobConfig;

/// Periodically return jobs stranded in the processing partition to pending.
pub async fn run_stale_job_detector(
    queue: Arc<dyn JobQueue>,
    config: StaleJobConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let timeout = Duration::from_secs(config.timeout_secs);
    let scan_interval = Duration::from_secs(config.scan_interval_secs.max(1));

    info!(
        queue = %queue.name(),
        timeout_secs = config.timeout_secs,
        scan_interval_secs = config.scan_interval_secs,
        "Starting stale job detector"
    );

    let mut interval = tokio::time::interval(scan_interval);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => break,
        }

        match queue.requeue_stale(timeout).await {
            Ok(0) => {}
            Ok(count) => warn!(queue = %queue.name(), count, "Returned stale processing jobs"),
            Err(e) => error!(error = %e, "Stale job detection failed"),
        }
    }

    info!("Stale job detector stopped");
}

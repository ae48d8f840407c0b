use std::time::Duration;
use tokio::time;
use tracing::{debug, error, info, instrument};

use crate::services::SensorService;

#[instrument(skip(service), fields(interval_seconds = %interval_seconds))]
pub async fn start_refresh_scheduler(service: SensorService, interval_seconds: u64) {
    let mut interval = time::interval(Duration::from_secs(interval_seconds.max(1)));

    info!("Refresh scheduler started with {} second interval", interval_seconds);

    loop {
        interval.tick().await;
        debug!("Scheduler tick - refreshing sensors");

        match service.refresh().await {
            Ok(report) => {
                if report.changed > 0 {
                    info!("Published {} updated sensor states", report.changed);
                } else {
                    debug!("No sensor state changed this cycle");
                }
            }
            Err(e) => {
                error!("Refresh cycle failed: {}", e);
            }
        }
    }
}

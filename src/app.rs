use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{create_router, AppState};
use crate::client::EvohausClient;
use crate::config::Config;
use crate::scheduler;
use crate::services::{SensorRegistry, SensorService};

/// Running service: HTTP surface plus the refresh scheduler.
pub struct Application {
    pub server_handle: JoinHandle<Result<(), std::io::Error>>,
    pub scheduler_handle: JoinHandle<()>,
}

impl Application {
    /// Log in, resolve the residence, register sensors and spawn the background tasks.
    pub async fn build(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Initializing application components");

        let client = EvohausClient::new(
            config.base_url.clone(),
            config.username.clone(),
            config.password.clone(),
            config.request_timeout(),
            config.cache_ttl(),
        )?;
        client.login_with_retry().await?;

        let residence_id = client.fetch_residence_id().await?;
        info!("Using residence {}", residence_id);

        let registry = SensorRegistry::new(
            residence_id,
            config.acceptance_policy,
            config.sensor_configs(),
        );
        let sensor_service =
            SensorService::new(client, registry, config.consumption_category.clone());

        let scheduler_handle = {
            let service = sensor_service.clone();
            let interval = config.fetch_interval_seconds;
            tokio::spawn(async move {
                scheduler::start_refresh_scheduler(service, interval).await;
            })
        };

        let app = create_router(AppState { sensor_service }).layer(TraceLayer::new_for_http());

        let addr = config.server_addr();
        info!("Starting HTTP server on {}", addr);

        let server_handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, app).await
        });

        info!("Application initialized successfully");

        Ok(Self {
            server_handle,
            scheduler_handle,
        })
    }

    /// Run until the server stops; the scheduler runs alongside indefinitely.
    pub async fn run_until_stopped(self) -> Result<(), Box<dyn std::error::Error>> {
        self.server_handle.await??;
        Ok(())
    }
}

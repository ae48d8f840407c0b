use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use crate::client::EvohausClient;
use crate::fetch_error::FetchError;
use crate::reconciler::{AcceptancePolicy, Reconciliation};
use crate::sensor::{PortalPayloads, Sensor, SensorConfig, SensorKind, SensorUpdate, SensorView};

/// Counters for one refresh cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub changed: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// All sensors of one residence and their published state.
#[derive(Debug, Clone)]
pub struct SensorRegistry {
    residence_id: String,
    policy: AcceptancePolicy,
    sensors: Vec<Sensor>,
}

impl SensorRegistry {
    pub fn new(residence_id: impl Into<String>, policy: AcceptancePolicy, configs: Vec<SensorConfig>) -> Self {
        let residence_id = residence_id.into();
        let sensors = configs
            .into_iter()
            .map(|config| Sensor::new(config, residence_id.clone()))
            .collect();
        Self {
            residence_id,
            policy,
            sensors,
        }
    }

    pub fn residence_id(&self) -> &str {
        &self.residence_id
    }

    pub fn has_kind(&self, kind: SensorKind) -> bool {
        self.sensors.iter().any(|s| s.kind() == kind)
    }

    /// Apply one cycle's payloads. A failing sensor is counted and logged; its
    /// siblings are still updated.
    pub fn apply(&mut self, payloads: &PortalPayloads) -> CycleReport {
        let mut report = CycleReport::default();
        for sensor in &mut self.sensors {
            match sensor.apply(payloads, self.policy) {
                Ok(SensorUpdate::Changed) => {
                    debug!("{} -> {:?}", sensor.entity_id(), sensor.state.accepted_value);
                    report.changed += 1;
                }
                Ok(SensorUpdate::Unchanged) => report.unchanged += 1,
                Ok(SensorUpdate::Skipped) => report.skipped += 1,
                Err(e) => {
                    error!("Failed to update {}: {}", sensor.entity_id(), e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Reconcile a raw value into the sensor of the given kind.
    pub fn reconcile(&mut self, kind: SensorKind, new_value: f64) -> Option<Reconciliation> {
        let policy = self.policy;
        self.sensors
            .iter_mut()
            .find(|s| s.kind() == kind)
            .map(|sensor| sensor.state.reconcile(new_value, policy))
    }

    pub fn views(&self) -> Vec<SensorView> {
        self.sensors.iter().map(Sensor::view).collect()
    }

    pub fn find(&self, entity_id: &str) -> Option<SensorView> {
        self.sensors
            .iter()
            .find(|s| s.entity_id() == entity_id)
            .map(Sensor::view)
    }
}

#[derive(Clone)]
pub struct SensorService {
    client: EvohausClient,
    registry: Arc<RwLock<SensorRegistry>>,
    consumption_category: String,
}

impl SensorService {
    pub fn new(client: EvohausClient, registry: SensorRegistry, consumption_category: impl Into<String>) -> Self {
        Self {
            client,
            registry: Arc::new(RwLock::new(registry)),
            consumption_category: consumption_category.into(),
        }
    }

    /// One poll cycle: fetch what the registered sensors need, then apply.
    ///
    /// Fails only when every needed fetch failed; partial failures leave the
    /// affected sensors at their previous state.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<CycleReport, FetchError> {
        let today = Local::now().date_naive();
        let (residence_id, needs_meter, needs_price, needs_chart) = {
            let registry = self.registry.read().await;
            (
                registry.residence_id().to_string(),
                registry.has_kind(SensorKind::MeterEnergy),
                registry.has_kind(SensorKind::PriceCents) || registry.has_kind(SensorKind::PriceEuros),
                registry.has_kind(SensorKind::ConsumptionTotal)
                    || registry.has_kind(SensorKind::ConsumptionHourly),
            )
        };

        let mut payloads = PortalPayloads::default();
        let mut first_error = None;
        let mut attempted = 0;

        if needs_meter {
            attempted += 1;
            match self.client.fetch_meter_table_cached(today).await {
                Ok(table) => payloads.meter_table = Some(table),
                Err(e) => {
                    error!("Failed to fetch meter table: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if needs_price {
            attempted += 1;
            match self.client.fetch_traffic_price().await {
                Ok(traffic) => payloads.traffic = Some(traffic),
                Err(e) => {
                    error!("Failed to fetch traffic light price: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if needs_chart {
            attempted += 1;
            match self.fetch_chart(today, &residence_id).await {
                Ok(series) => payloads.chart = Some(series),
                Err(e) => {
                    error!("Failed to fetch consumption chart: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        let fetched = [
            payloads.meter_table.is_some(),
            payloads.traffic.is_some(),
            payloads.chart.is_some(),
        ]
        .iter()
        .filter(|ok| **ok)
        .count();

        if attempted > 0 && fetched == 0 {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        let report = self.registry.write().await.apply(&payloads);
        info!(
            "Refresh cycle: {} changed, {} unchanged, {} skipped, {} failed",
            report.changed, report.unchanged, report.skipped, report.failed
        );
        if report.failed > 0 {
            warn!("{} sensors failed this cycle", report.failed);
        }
        Ok(report)
    }

    async fn fetch_chart(&self, date: NaiveDate, residence_id: &str) -> Result<crate::consumption::ChartSeries, FetchError> {
        self.client
            .fetch_chart_series(&self.consumption_category, date, residence_id)
            .await
    }

    pub async fn reconcile(&self, kind: SensorKind, new_value: f64) -> Option<Reconciliation> {
        self.registry.write().await.reconcile(kind, new_value)
    }

    pub async fn sensors(&self) -> Vec<SensorView> {
        self.registry.read().await.views()
    }

    pub async fn sensor(&self, entity_id: &str) -> Option<SensorView> {
        self.registry.read().await.find(entity_id)
    }
}

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::consumption::{aggregate_consumption, hourly_consumption, ChartSeries};
use crate::fetch_error::FetchError;
use crate::meter::{resolve_reading, MatchCriterion, MeterTable};
use crate::price::{derive_prices, round2, TrafficPrice};
use crate::reconciler::{AcceptancePolicy, SensorState};

pub const ATTR_UPDATE_TIME: &str = "updateTime";
pub const ATTR_TRAFFIC_LIGHT: &str = "traffic_light";
pub const ATTR_METER_NO: &str = "meter_no";
pub const ATTR_STALL_CODE: &str = "stall_code";
pub const ATTR_TENANT_NUMBER: &str = "tenant_number";
pub const ATTR_TOTAL_COST_TODAY: &str = "total_cost_today";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    PriceCents,
    PriceEuros,
    MeterEnergy,
    ConsumptionTotal,
    ConsumptionHourly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Energy,
    Monetary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    Measurement,
    Total,
    TotalIncreasing,
}

/// Static description of one sensor entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorConfig {
    pub kind: SensorKind,
    pub name: String,
    pub icon: String,
    pub unit: String,
    pub device_class: DeviceClass,
    pub state_class: StateClass,
    pub match_criterion: Option<MatchCriterion>,
}

impl SensorConfig {
    pub fn price_cents() -> Self {
        Self {
            kind: SensorKind::PriceCents,
            name: "Electricity Price".to_string(),
            icon: "mdi:currency-eur".to_string(),
            unit: "ct/kWh".to_string(),
            device_class: DeviceClass::Monetary,
            state_class: StateClass::Measurement,
            match_criterion: None,
        }
    }

    pub fn price_euros() -> Self {
        Self {
            kind: SensorKind::PriceEuros,
            name: "Electricity Price Euro".to_string(),
            icon: "mdi:currency-eur".to_string(),
            unit: "€/kWh".to_string(),
            device_class: DeviceClass::Monetary,
            state_class: StateClass::Measurement,
            match_criterion: None,
        }
    }

    pub fn meter_energy(criterion: MatchCriterion) -> Self {
        Self {
            kind: SensorKind::MeterEnergy,
            name: "Electricity consumption parking".to_string(),
            icon: "mdi:meter-electric-outline".to_string(),
            unit: "kWh".to_string(),
            device_class: DeviceClass::Energy,
            state_class: StateClass::TotalIncreasing,
            match_criterion: Some(criterion),
        }
    }

    pub fn consumption_total() -> Self {
        Self {
            kind: SensorKind::ConsumptionTotal,
            name: "Total electricity consumption parking".to_string(),
            icon: "mdi:solar-power".to_string(),
            unit: "kWh".to_string(),
            device_class: DeviceClass::Energy,
            state_class: StateClass::TotalIncreasing,
            match_criterion: None,
        }
    }

    pub fn consumption_hourly() -> Self {
        Self {
            kind: SensorKind::ConsumptionHourly,
            name: "Hourly electricity consumption parking".to_string(),
            icon: "mdi:solar-power".to_string(),
            unit: "kWh".to_string(),
            device_class: DeviceClass::Energy,
            state_class: StateClass::Total,
            match_criterion: None,
        }
    }
}

/// Payloads fetched in one poll cycle. `None` means that fetch failed or was not needed.
#[derive(Debug, Clone, Default)]
pub struct PortalPayloads {
    pub meter_table: Option<MeterTable>,
    pub traffic: Option<TrafficPrice>,
    pub chart: Option<ChartSeries>,
}

/// What applying a cycle's payloads did to a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorUpdate {
    Changed,
    Unchanged,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct Sensor {
    pub config: SensorConfig,
    pub state: SensorState,
    residence_id: String,
    name_suffix: Option<String>,
}

impl Sensor {
    pub fn new(config: SensorConfig, residence_id: impl Into<String>) -> Self {
        // A pre-known stall labels the entity from the start
        let name_suffix = match &config.match_criterion {
            Some(MatchCriterion::Stall { identifier, .. }) => Some(identifier.stall_code.clone()),
            _ => None,
        };
        Self {
            config,
            state: SensorState::default(),
            residence_id: residence_id.into(),
            name_suffix,
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.config.kind
    }

    pub fn name(&self) -> String {
        match &self.name_suffix {
            Some(suffix) => format!("{} {}", self.config.name, suffix),
            None => self.config.name.clone(),
        }
    }

    /// `sensor.<name>_<residence>`, lowercased with spaces replaced.
    pub fn entity_id(&self) -> String {
        format!(
            "sensor.{}_{}",
            self.name().to_lowercase().replace(' ', "_"),
            self.residence_id.to_lowercase()
        )
    }

    /// Apply this cycle's payloads using the derivation for the sensor's kind.
    pub fn apply(
        &mut self,
        payloads: &PortalPayloads,
        policy: AcceptancePolicy,
    ) -> Result<SensorUpdate, FetchError> {
        match self.config.kind {
            SensorKind::PriceCents | SensorKind::PriceEuros => Ok(payloads
                .traffic
                .as_ref()
                .map_or(SensorUpdate::Skipped, |traffic| self.apply_price(traffic))),
            SensorKind::MeterEnergy => match &payloads.meter_table {
                Some(table) => self.apply_meter(table, policy),
                None => Ok(SensorUpdate::Skipped),
            },
            SensorKind::ConsumptionTotal | SensorKind::ConsumptionHourly => Ok(payloads
                .chart
                .as_ref()
                .map_or(SensorUpdate::Skipped, |series| self.apply_consumption(series))),
        }
    }

    fn apply_price(&mut self, traffic: &TrafficPrice) -> SensorUpdate {
        let Some(prices) = derive_prices(traffic) else {
            return SensorUpdate::Skipped;
        };
        let value = if self.config.kind == SensorKind::PriceEuros {
            prices.euros_per_kwh
        } else {
            prices.cents_per_kwh
        };

        let previous = self.state.accepted_value;
        self.state.overwrite(
            value,
            [
                (ATTR_TRAFFIC_LIGHT, prices.color.as_str().to_string()),
                (ATTR_UPDATE_TIME, clock_label()),
            ],
        );
        changed_if(previous != Some(value))
    }

    fn apply_meter(
        &mut self,
        table: &MeterTable,
        policy: AcceptancePolicy,
    ) -> Result<SensorUpdate, FetchError> {
        let criterion = self.config.match_criterion.clone().unwrap_or_default();
        let reading = resolve_reading(table, &criterion)?;

        if reading.is_placeholder() {
            warn!("{}: no matching meter row, keeping previous state", self.entity_id());
            return Ok(SensorUpdate::Skipped);
        }

        let outcome = self.state.reconcile_with_metadata(
            reading.value,
            policy,
            [
                (ATTR_METER_NO, reading.meter_number.clone()),
                (ATTR_STALL_CODE, reading.stall_code.clone()),
                (ATTR_TENANT_NUMBER, reading.tenant_number.clone()),
                (ATTR_UPDATE_TIME, clock_label()),
            ],
        );

        if !outcome.accepted {
            debug!(
                "{}: reading {} not accepted, stays at {:?}",
                self.entity_id(),
                reading.value,
                outcome.value
            );
            return Ok(SensorUpdate::Unchanged);
        }

        if self.name_suffix.is_none() && !reading.stall_code.is_empty() {
            self.name_suffix = Some(reading.stall_code.clone());
            info!("Meter sensor labelled for stall {}", reading.stall_code);
        }
        Ok(SensorUpdate::Changed)
    }

    fn apply_consumption(&mut self, series: &ChartSeries) -> SensorUpdate {
        let previous = self.state.accepted_value;
        let mut metadata = Vec::new();

        let value = if self.config.kind == SensorKind::ConsumptionTotal {
            let daily = aggregate_consumption(series);
            metadata.push((ATTR_TOTAL_COST_TODAY, round2(daily.cost).to_string()));
            if let Some(label) = daily.last_update {
                metadata.push((ATTR_UPDATE_TIME, label));
            }
            daily.total
        } else {
            let hourly = hourly_consumption(series);
            if let Some(label) = hourly.last_update {
                metadata.push((ATTR_UPDATE_TIME, label));
            }
            hourly.total
        };

        self.state.overwrite(value, metadata);
        changed_if(previous != Some(value))
    }

    pub fn view(&self) -> SensorView {
        SensorView {
            entity_id: self.entity_id(),
            name: self.name(),
            kind: self.config.kind,
            icon: self.config.icon.clone(),
            unit: self.config.unit.clone(),
            device_class: self.config.device_class,
            state_class: self.config.state_class,
            state: self.state.accepted_value,
            last_update_time: self.state.last_update_time,
            attributes: self.state.metadata.clone(),
        }
    }
}

/// Published, serializable form of a sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorView {
    pub entity_id: String,
    pub name: String,
    pub kind: SensorKind,
    pub icon: String,
    pub unit: String,
    pub device_class: DeviceClass,
    pub state_class: StateClass,
    pub state: Option<f64>,
    pub last_update_time: Option<DateTime<Utc>>,
    pub attributes: BTreeMap<String, String>,
}

fn changed_if(changed: bool) -> SensorUpdate {
    if changed {
        SensorUpdate::Changed
    } else {
        SensorUpdate::Unchanged
    }
}

fn clock_label() -> String {
    Local::now().format("%H:%M").to_string()
}

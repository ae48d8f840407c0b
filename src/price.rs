use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::fetch_error::FetchError;

/// Traffic-light tier reported next to the current energy price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficColor {
    Green,
    Yellow,
    Red,
    #[default]
    Unknown,
}

impl TrafficColor {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "green" => TrafficColor::Green,
            "yellow" => TrafficColor::Yellow,
            "red" => TrafficColor::Red,
            _ => TrafficColor::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficColor::Green => "green",
            TrafficColor::Yellow => "yellow",
            TrafficColor::Red => "red",
            TrafficColor::Unknown => "unknown",
        }
    }
}

impl<'de> Deserialize<'de> for TrafficColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let label = Option::<String>::deserialize(deserializer)?;
        Ok(label
            .as_deref()
            .map(TrafficColor::from_label)
            .unwrap_or_default())
    }
}

/// Payload of `getTrafficLightStatus.php`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TrafficPrice {
    #[serde(rename = "currentEnergyprice", default)]
    pub current_price_cents_per_kwh: Option<f64>,
    #[serde(default)]
    pub color: TrafficColor,
}

impl TrafficPrice {
    pub fn from_json(body: &str) -> Result<Self, FetchError> {
        Ok(serde_json::from_str(body)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedPrices {
    pub cents_per_kwh: f64,
    pub euros_per_kwh: f64,
    pub color: TrafficColor,
}

/// Derive both price sensors from the traffic-light payload.
///
/// `None` when the price is missing; callers keep their previous state.
pub fn derive_prices(traffic: &TrafficPrice) -> Option<DerivedPrices> {
    let Some(price) = traffic.current_price_cents_per_kwh.filter(|p| p.is_finite()) else {
        warn!("Traffic light payload has no usable currentEnergyprice, keeping previous prices");
        return None;
    };

    let derived = DerivedPrices {
        cents_per_kwh: round2(price),
        euros_per_kwh: round2(price / 100.0),
        color: traffic.color,
    };
    debug!("Derived prices: {:?}", derived);
    Some(derived)
}

/// Two decimals, exact ties to even.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

//! Monotonic reconciliation of cumulative meter readings.
//!
//! The backing counter only ever grows. Transient zeros and stale cache pages
//! must never make the published value go backwards, so every observed value
//! passes through `SensorState::reconcile` before publication.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Acceptance rule for new readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptancePolicy {
    /// First value must be > 0; later values must be strictly greater.
    #[default]
    Strict,
    /// First value is always taken (even 0); later values may repeat.
    Lenient,
}

impl AcceptancePolicy {
    pub fn admits(self, previous: Option<f64>, new_value: f64) -> bool {
        if !new_value.is_finite() {
            return false;
        }
        match (self, previous) {
            (AcceptancePolicy::Strict, None) => new_value > 0.0,
            (AcceptancePolicy::Strict, Some(prev)) => new_value > prev,
            (AcceptancePolicy::Lenient, None) => true,
            (AcceptancePolicy::Lenient, Some(prev)) => new_value >= prev,
        }
    }
}

impl FromStr for AcceptancePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(AcceptancePolicy::Strict),
            "lenient" => Ok(AcceptancePolicy::Lenient),
            other => Err(format!("unknown acceptance policy '{}'", other)),
        }
    }
}

impl fmt::Display for AcceptancePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcceptancePolicy::Strict => write!(f, "strict"),
            AcceptancePolicy::Lenient => write!(f, "lenient"),
        }
    }
}

/// Outcome of one reconcile call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reconciliation {
    pub accepted: bool,
    /// Accepted value after the call (unchanged on rejection).
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorState {
    pub accepted_value: Option<f64>,
    pub last_update_time: Option<DateTime<Utc>>,
    pub metadata: BTreeMap<String, String>,
}

impl SensorState {
    pub fn reconcile(&mut self, new_value: f64, policy: AcceptancePolicy) -> Reconciliation {
        self.reconcile_with_metadata(new_value, policy, std::iter::empty::<(String, String)>())
    }

    /// Accept `new_value` if the policy admits it. Metadata and timestamp only
    /// change together with the value.
    pub fn reconcile_with_metadata<I, K, V>(
        &mut self,
        new_value: f64,
        policy: AcceptancePolicy,
        metadata: I,
    ) -> Reconciliation
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        if !policy.admits(self.accepted_value, new_value) {
            debug!(
                "Rejected {} (current {:?}, policy {})",
                new_value, self.accepted_value, policy
            );
            return Reconciliation {
                accepted: false,
                value: self.accepted_value,
            };
        }

        self.overwrite(new_value, metadata);
        Reconciliation {
            accepted: true,
            value: self.accepted_value,
        }
    }

    /// Unconditional update for non-cumulative sensors (prices, daily totals).
    pub fn overwrite<I, K, V>(&mut self, value: f64, metadata: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.accepted_value = Some(value);
        self.last_update_time = Some(Utc::now());
        self.metadata
            .extend(metadata.into_iter().map(|(k, v)| (k.into(), v.into())));
    }
}

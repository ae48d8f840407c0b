use std::env;
use std::time::Duration;

use crate::client::DEFAULT_BASE_URL;
use crate::meter::resolver::DEFAULT_METER_MARKER;
use crate::meter::{MatchCriterion, StallIdentifier};
use crate::reconciler::AcceptancePolicy;
use crate::sensor::SensorConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),
    #[error("Invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone)]
pub struct Config {
    pub username: String,
    pub password: String,
    pub base_url: String,
    pub stall_code: Option<String>,
    pub tenant_number: Option<String>,
    pub meter_marker: String,
    pub meter_description: Option<String>,
    pub acceptance_policy: AcceptancePolicy,
    pub consumption_category: String,
    pub enable_consumption: bool,
    pub fetch_interval_seconds: u64,
    pub cache_ttl_seconds: u64,
    pub request_timeout_seconds: u64,
    pub server_host: String,
    pub server_port: u16,
}

// Hand-written so the password never reaches the logs
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("username", &self.username)
            .field("password", &"***")
            .field("base_url", &self.base_url)
            .field("stall_code", &self.stall_code)
            .field("tenant_number", &self.tenant_number)
            .field("meter_marker", &self.meter_marker)
            .field("meter_description", &self.meter_description)
            .field("acceptance_policy", &self.acceptance_policy)
            .field("consumption_category", &self.consumption_category)
            .field("enable_consumption", &self.enable_consumption)
            .field("fetch_interval_seconds", &self.fetch_interval_seconds)
            .field("cache_ttl_seconds", &self.cache_ttl_seconds)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            username: required("EVOHAUS_USERNAME")?,
            password: required("EVOHAUS_PASSWORD")?,
            base_url: optional("EVOHAUS_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            stall_code: optional("EVOHAUS_STALL_CODE"),
            tenant_number: optional("EVOHAUS_TENANT_NUMBER"),
            meter_marker: optional("EVOHAUS_METER_MARKER")
                .unwrap_or_else(|| DEFAULT_METER_MARKER.to_string()),
            meter_description: optional("EVOHAUS_METER_DESCRIPTION"),
            acceptance_policy: parsed("EVOHAUS_ACCEPTANCE_POLICY", AcceptancePolicy::Strict)?,
            consumption_category: optional("EVOHAUS_CONSUMPTION_CATEGORY")
                .unwrap_or_else(|| "Stromverbrauch".to_string()),
            enable_consumption: parsed("EVOHAUS_ENABLE_CONSUMPTION", false)?,
            fetch_interval_seconds: parsed("FETCH_INTERVAL_SECONDS", 100)?,
            cache_ttl_seconds: parsed("CACHE_TTL_SECONDS", 100)?,
            request_timeout_seconds: parsed("REQUEST_TIMEOUT_SECONDS", 10)?,
            server_host: optional("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: parsed("SERVER_PORT", 8080)?,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    /// Legacy description matching wins; otherwise a configured stall/tenant
    /// pair pins the row, else the first complete marker row is taken.
    pub fn match_criterion(&self) -> MatchCriterion {
        if let Some(description) = &self.meter_description {
            return MatchCriterion::Description(description.clone());
        }
        match (&self.stall_code, &self.tenant_number) {
            (Some(stall), Some(tenant)) => MatchCriterion::Stall {
                marker: self.meter_marker.clone(),
                identifier: StallIdentifier::new(stall.clone(), tenant.clone()),
            },
            _ => MatchCriterion::Marker(self.meter_marker.clone()),
        }
    }

    pub fn sensor_configs(&self) -> Vec<SensorConfig> {
        let mut configs = vec![
            SensorConfig::price_cents(),
            SensorConfig::price_euros(),
            SensorConfig::meter_energy(self.match_criterion()),
        ];
        if self.enable_consumption {
            configs.push(SensorConfig::consumption_hourly());
            configs.push(SensorConfig::consumption_total());
        }
        configs
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    optional(var).ok_or(ConfigError::Missing(var))
}

fn optional(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = optional(var) else {
        return Ok(default);
    };
    match value.trim().parse::<T>() {
        Ok(parsed) => Ok(parsed),
        Err(e) => Err(ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

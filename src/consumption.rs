/// Daily consumption from the portal's quarter-hour chart series
///
/// `getMeterDataWithParam.php` answers with three parallel arrays indexed by
/// 15-minute bucket (4 buckets per hour): consumption values, hour labels and
/// unit prices. Future buckets of the current day are `null`.
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::fetch_error::FetchError;

pub const BUCKETS_PER_HOUR: usize = 4;
const MINUTES_PER_BUCKET: usize = 15;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartSeries {
    pub values: Vec<Option<f64>>,
    pub hour_labels: Vec<String>,
    pub unit_prices: Vec<Option<f64>>,
}

impl ChartSeries {
    pub fn from_json(body: &str) -> Result<Self, FetchError> {
        let arrays: Vec<Vec<Value>> = serde_json::from_str(body)?;
        let mut arrays = arrays.into_iter();

        let values = arrays.next().unwrap_or_default();
        let hour_labels = arrays.next().unwrap_or_default();
        let unit_prices = arrays.next().unwrap_or_default();

        if values.is_empty() {
            warn!("Chart series contains no consumption values");
        }

        Ok(Self {
            values: values.iter().map(as_number).collect(),
            hour_labels: hour_labels.iter().map(as_label).collect(),
            unit_prices: unit_prices.iter().map(as_number).collect(),
        })
    }

    fn value(&self, idx: usize) -> Option<f64> {
        self.values.get(idx).copied().flatten()
    }

    fn unit_price(&self, idx: usize) -> Option<f64> {
        self.unit_prices.get(idx).copied().flatten()
    }

    /// "HH:MM" label of a bucket, minute derived from its position in the hour.
    pub fn bucket_label(&self, idx: usize) -> Option<String> {
        let hour = self.hour_labels.get(idx)?;
        let minute = (idx % BUCKETS_PER_HOUR) * MINUTES_PER_BUCKET;
        Some(format!("{}:{:02}", hour, minute))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailyConsumption {
    pub total: f64,
    pub cost: f64,
    pub last_update: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HourlyConsumption {
    pub total: f64,
    pub last_update: Option<String>,
}

/// Sum all reported buckets of the day, plus their cost at the bucket's unit price.
#[instrument(skip(series), fields(buckets = series.hour_labels.len()))]
pub fn aggregate_consumption(series: &ChartSeries) -> DailyConsumption {
    let mut daily = DailyConsumption::default();

    for idx in 0..series.hour_labels.len() {
        match series.value(idx) {
            Some(value) => {
                daily.total += value;
                if let Some(price) = series.unit_price(idx) {
                    daily.cost += value * price;
                }
                daily.last_update = series.bucket_label(idx);
            }
            None if idx % BUCKETS_PER_HOUR == 0 => {
                daily.last_update = series.bucket_label(idx);
            }
            None => {}
        }
    }

    debug!(
        "Daily consumption: total={}, cost={}, last_update={:?}",
        daily.total, daily.cost, daily.last_update
    );
    daily
}

/// Consumption of the most recently completed hour.
///
/// An hour counts as completed once the first bucket of the next hour has a value.
#[instrument(skip(series), fields(buckets = series.hour_labels.len()))]
pub fn hourly_consumption(series: &ChartSeries) -> HourlyConsumption {
    let mut hourly = HourlyConsumption::default();

    for idx in (BUCKETS_PER_HOUR..series.hour_labels.len()).step_by(BUCKETS_PER_HOUR) {
        if series.value(idx).is_none() {
            continue;
        }
        hourly.total = (idx - BUCKETS_PER_HOUR..idx)
            .filter_map(|i| series.value(i))
            .sum();
        hourly.last_update = series.bucket_label(idx);
    }

    debug!(
        "Hourly consumption: total={}, last_update={:?}",
        hourly.total, hourly.last_update
    );
    hourly
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn as_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> ChartSeries {
        // 01:00..02:45 filled, 03:00 filled, rest of the hour pending
        ChartSeries::from_json(
            r#"[
                [0.25, 0.5, 0.25, 1.0, 0.5, 0.5, null, 0.5, 2.0, null, null, null],
                [1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3],
                [30, 30, 30, 30, 20, 20, 20, 20, 40, 40, 40, 40]
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_from_json_shapes() {
        let s = series();
        assert_eq!(s.values.len(), 12);
        assert_eq!(s.values[6], None);
        assert_eq!(s.hour_labels[4], "2");
        assert_eq!(s.unit_prices[8], Some(40.0));
    }

    #[test]
    fn test_bucket_label() {
        let s = series();
        assert_eq!(s.bucket_label(0).as_deref(), Some("1:00"));
        assert_eq!(s.bucket_label(5).as_deref(), Some("2:15"));
        assert_eq!(s.bucket_label(7).as_deref(), Some("2:45"));
        assert_eq!(s.bucket_label(99), None);
    }

    #[test]
    fn test_aggregate_consumption() {
        let daily = aggregate_consumption(&series());

        assert_eq!(daily.total, 5.5);
        // 2.0*30 + 1.5*20 + 2.0*40
        assert_eq!(daily.cost, 170.0);
        assert_eq!(daily.last_update.as_deref(), Some("3:00"));
    }

    #[test]
    fn test_aggregate_null_hour_boundary_advances_label() {
        let s = ChartSeries::from_json(r#"[[1.0, null, null, null, null], [5, 5, 5, 5, 6], [10, 10, 10, 10, 10]]"#)
            .unwrap();
        let daily = aggregate_consumption(&s);
        assert_eq!(daily.total, 1.0);
        assert_eq!(daily.cost, 10.0);
        assert_eq!(daily.last_update.as_deref(), Some("6:00"));
    }

    #[test]
    fn test_hourly_consumption_last_completed_hour() {
        let hourly = hourly_consumption(&series());
        // Hour 2 buckets: 0.5 + 0.5 + null + 0.5
        assert_eq!(hourly.total, 1.5);
        assert_eq!(hourly.last_update.as_deref(), Some("3:00"));
    }

    #[test]
    fn test_hourly_consumption_without_completed_hour() {
        let s = ChartSeries::from_json(r#"[[0.1, 0.2], [0, 0], [1, 1]]"#).unwrap();
        let hourly = hourly_consumption(&s);
        assert_eq!(hourly, HourlyConsumption::default());
    }

    #[test]
    fn test_empty_payload() {
        let s = ChartSeries::from_json("[]").unwrap();
        assert_eq!(aggregate_consumption(&s), DailyConsumption::default());
    }

    #[test]
    fn test_string_labels_and_values() {
        let s = ChartSeries::from_json(r#"[["0.5"], ["07"], ["12.5"]]"#).unwrap();
        let daily = aggregate_consumption(&s);
        assert_eq!(daily.total, 0.5);
        assert_eq!(daily.cost, 6.25);
        assert_eq!(daily.last_update.as_deref(), Some("07:00"));
    }
}

// Refresh cycle tests: SensorService against a mocked portal

mod common;

use std::time::Duration;

use evohaus_parking::meter::{MatchCriterion, StallIdentifier};
use evohaus_parking::reconciler::AcceptancePolicy;
use evohaus_parking::sensor::{SensorConfig, SensorKind, ATTR_METER_NO, ATTR_TRAFFIC_LIGHT};
use evohaus_parking::services::{CycleReport, SensorRegistry, SensorService};
use mockito::Server;

use common::{any_date_param, client_for, single_meter_html};

fn registry() -> SensorRegistry {
    SensorRegistry::new(
        "R42",
        AcceptancePolicy::Strict,
        vec![
            SensorConfig::price_cents(),
            SensorConfig::price_euros(),
            SensorConfig::meter_energy(MatchCriterion::Stall {
                marker: "Verbrauch Strom".to_string(),
                identifier: StallIdentifier::new("042", "100"),
            }),
        ],
    )
}

#[tokio::test]
async fn test_refresh_publishes_all_sensors() {
    let mut server = Server::new_async().await;
    let _meter = server
        .mock("POST", "/php/newMeterTable.php")
        .match_body(any_date_param())
        .with_status(200)
        .with_body(single_meter_html("1.000,00"))
        .create_async()
        .await;
    let _traffic = server
        .mock("GET", "/php/getTrafficLightStatus.php")
        .with_status(200)
        .with_body(r#"{"currentEnergyprice": 23.456, "color": "green"}"#)
        .create_async()
        .await;

    let service = SensorService::new(client_for(&server, Duration::from_secs(100)), registry(), "Stromverbrauch");
    let report = service.refresh().await.unwrap();
    assert_eq!(report, CycleReport { changed: 3, unchanged: 0, skipped: 0, failed: 0 });

    let sensors = service.sensors().await;
    assert_eq!(sensors[0].state, Some(23.46));
    assert_eq!(sensors[1].state, Some(0.23));
    assert_eq!(sensors[1].attributes[ATTR_TRAFFIC_LIGHT], "green");
    assert_eq!(sensors[2].state, Some(1000.0));
    assert_eq!(sensors[2].attributes[ATTR_METER_NO], " M1 ");
    assert_eq!(sensors[2].entity_id, "sensor.electricity_consumption_parking_042_r42");
}

#[tokio::test]
async fn test_refresh_keeps_higher_meter_value() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("POST", "/php/newMeterTable.php")
        .with_status(200)
        .with_body(single_meter_html("1.000,00"))
        .create_async()
        .await;
    let _traffic = server
        .mock("GET", "/php/getTrafficLightStatus.php")
        .with_status(200)
        .with_body(r#"{"currentEnergyprice": 20.0, "color": "green"}"#)
        .create_async()
        .await;

    let client = client_for(&server, Duration::from_secs(100));
    let service = SensorService::new(client.clone(), registry(), "Stromverbrauch");
    service.refresh().await.unwrap();

    first.remove_async().await;
    let _second = server
        .mock("POST", "/php/newMeterTable.php")
        .with_status(200)
        .with_body(single_meter_html("999,00"))
        .create_async()
        .await;
    client.invalidate_cache().await;

    let report = service.refresh().await.unwrap();
    // Prices repeat, meter regresses: nothing changes
    assert_eq!(report.changed, 0);
    assert_eq!(report.unchanged, 3);

    let meter = service
        .sensor("sensor.electricity_consumption_parking_042_r42")
        .await
        .unwrap();
    assert_eq!(meter.kind, SensorKind::MeterEnergy);
    assert_eq!(meter.state, Some(1000.0));
}

#[tokio::test]
async fn test_price_failure_does_not_block_meter() {
    let mut server = Server::new_async().await;
    let _meter = server
        .mock("POST", "/php/newMeterTable.php")
        .with_status(200)
        .with_body(single_meter_html("12,50"))
        .create_async()
        .await;
    let _traffic = server
        .mock("GET", "/php/getTrafficLightStatus.php")
        .with_status(200)
        .with_body("<html>Fehler</html>")
        .create_async()
        .await;

    let service = SensorService::new(client_for(&server, Duration::from_secs(100)), registry(), "Stromverbrauch");
    let report = service.refresh().await.unwrap();
    assert_eq!(report, CycleReport { changed: 1, unchanged: 0, skipped: 2, failed: 0 });

    let sensors = service.sensors().await;
    assert_eq!(sensors[0].state, None);
    assert_eq!(sensors[2].state, Some(12.5));
}

#[tokio::test]
async fn test_refresh_fails_when_portal_is_down() {
    let mut server = Server::new_async().await;
    let _meter = server
        .mock("POST", "/php/newMeterTable.php")
        .with_status(502)
        .create_async()
        .await;
    let _traffic = server
        .mock("GET", "/php/getTrafficLightStatus.php")
        .with_status(502)
        .create_async()
        .await;

    let service = SensorService::new(client_for(&server, Duration::from_secs(100)), registry(), "Stromverbrauch");
    assert!(service.refresh().await.is_err());
    assert!(service.sensors().await.iter().all(|s| s.state.is_none()));
}

#[tokio::test]
async fn test_refresh_with_consumption_sensors() {
    let mut server = Server::new_async().await;
    let chart = server
        .mock("GET", "/php/getMeterDataWithParam.php")
        .match_query(mockito::Matcher::UrlEncoded("AreaId".into(), "R42".into()))
        .with_status(200)
        .with_body("[[1.0, 1.0, 1.0, 1.0, 0.5], [8, 8, 8, 8, 9], [10, 10, 10, 10, 20]]")
        .create_async()
        .await;

    let registry = SensorRegistry::new(
        "R42",
        AcceptancePolicy::Strict,
        vec![SensorConfig::consumption_hourly(), SensorConfig::consumption_total()],
    );
    let service = SensorService::new(client_for(&server, Duration::from_secs(100)), registry, "Stromverbrauch");
    let report = service.refresh().await.unwrap();
    assert_eq!(report.changed, 2);

    let sensors = service.sensors().await;
    assert_eq!(sensors[0].state, Some(4.0));
    assert_eq!(sensors[1].state, Some(4.5));

    chart.assert_async().await;
}

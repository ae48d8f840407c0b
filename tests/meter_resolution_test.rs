// End-to-end meter resolution: HTML table -> reading -> reconciled sensor state

mod common;

use evohaus_parking::meter::{resolve_reading, MatchCriterion, MeterTable, StallIdentifier};
use evohaus_parking::reconciler::AcceptancePolicy;
use evohaus_parking::sensor::{PortalPayloads, Sensor, SensorConfig, SensorUpdate};

use common::{single_meter_html, METER_TABLE_HTML};

fn stall(code: &str, tenant: &str) -> MatchCriterion {
    MatchCriterion::Stall {
        marker: "Verbrauch Strom".to_string(),
        identifier: StallIdentifier::new(code, tenant),
    }
}

#[test]
fn test_stall_reading_from_portal_table() {
    let table = MeterTable::from_html(METER_TABLE_HTML).unwrap();

    let reading = resolve_reading(&table, &stall("243", "272")).unwrap();
    assert_eq!(reading.value, 512.75);
    assert_eq!(reading.meter_number, "1ESY-243");
    assert_eq!(reading.stall_code, "243");
    assert_eq!(reading.tenant_number, "272");
}

#[test]
fn test_marker_skips_partially_identified_rows() {
    let table = MeterTable::from_html(METER_TABLE_HTML).unwrap();

    // Stpl.7 has no tenant number, so the first complete row wins
    let reading = resolve_reading(&table, &MatchCriterion::Marker("Verbrauch Strom".to_string())).unwrap();
    assert_eq!(reading.meter_number, "1ESY-242");
    assert_eq!(reading.value, 1234.56);
}

#[test]
fn test_legacy_description_mode() {
    let table = MeterTable::from_html(METER_TABLE_HTML).unwrap();

    let reading = resolve_reading(&table, &MatchCriterion::Description("Verbrauch Wärme".to_string())).unwrap();
    assert_eq!(reading.value, 3210.0);
    assert_eq!(reading.meter_number, "H-0815");

    // Prefix match on the stripped description: first "Verbrauch Strom" row is Stpl.7
    let reading = resolve_reading(&table, &MatchCriterion::Description("Verbrauch Strom".to_string())).unwrap();
    assert_eq!(reading.meter_number, "1ESY-007");
    assert_eq!(reading.stall_code, "7");
    assert_eq!(reading.tenant_number, "");
}

#[test]
fn test_no_match_never_raises() {
    let tables = [
        MeterTable::default(),
        MeterTable::from_html(METER_TABLE_HTML).unwrap(),
        MeterTable::from_html("<p>Sitzung abgelaufen</p>").unwrap(),
    ];
    let criteria = [
        stall("999", "1"),
        MatchCriterion::Description("Verbrauch Gas".to_string()),
        MatchCriterion::Marker("Verbrauch Kälte".to_string()),
    ];

    for table in &tables {
        for criterion in &criteria {
            let reading = resolve_reading(table, criterion).unwrap();
            assert!(reading.is_placeholder(), "{:?} should not match", criterion);
            assert_eq!(reading.value, 0.0);
            assert!(reading.identifier().is_empty());
        }
    }
}

#[test]
fn test_regressing_reading_is_rejected() {
    let mut sensor = Sensor::new(SensorConfig::meter_energy(stall("042", "100")), "R42");

    let first = PortalPayloads {
        meter_table: Some(MeterTable::from_html(&single_meter_html("1.000,00")).unwrap()),
        ..Default::default()
    };
    let reading = resolve_reading(first.meter_table.as_ref().unwrap(), &stall("042", "100")).unwrap();
    assert_eq!(reading.value, 1000.0);
    assert_eq!(reading.meter_number, " M1 ");
    assert_eq!(reading.identifier(), StallIdentifier::new("042", "100"));

    assert_eq!(
        sensor.apply(&first, AcceptancePolicy::Strict).unwrap(),
        SensorUpdate::Changed
    );

    let second = PortalPayloads {
        meter_table: Some(MeterTable::from_html(&single_meter_html("999,00")).unwrap()),
        ..Default::default()
    };
    assert_eq!(
        sensor.apply(&second, AcceptancePolicy::Strict).unwrap(),
        SensorUpdate::Unchanged
    );
    assert_eq!(sensor.state.accepted_value, Some(1000.0));
}

#[test]
fn test_lenient_policy_refreshes_equal_reading() {
    let mut sensor = Sensor::new(SensorConfig::meter_energy(stall("042", "100")), "R42");
    let payloads = PortalPayloads {
        meter_table: Some(MeterTable::from_html(&single_meter_html("10,00")).unwrap()),
        ..Default::default()
    };

    assert_eq!(sensor.apply(&payloads, AcceptancePolicy::Lenient).unwrap(), SensorUpdate::Changed);
    assert_eq!(sensor.apply(&payloads, AcceptancePolicy::Lenient).unwrap(), SensorUpdate::Changed);
    assert_eq!(sensor.apply(&payloads, AcceptancePolicy::Strict).unwrap(), SensorUpdate::Unchanged);
}

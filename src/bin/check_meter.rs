use std::time::Duration;

use chrono::{Local, NaiveDate};
use clap::Parser;

use evohaus_parking::client::{EvohausClient, DEFAULT_BASE_URL};
use evohaus_parking::meter::resolver::DEFAULT_METER_MARKER;
use evohaus_parking::meter::{resolve_reading, row_identifier, MatchCriterion, StallIdentifier};
use evohaus_parking::price::derive_prices;

#[derive(Parser)]
#[command(name = "check-meter")]
#[command(about = "Log in to the portal and show how the meter table resolves", long_about = None)]
struct Cli {
    /// Portal username
    #[arg(long, env = "EVOHAUS_USERNAME")]
    username: String,

    /// Portal password
    #[arg(long, env = "EVOHAUS_PASSWORD", hide_env_values = true)]
    password: String,

    /// Portal base URL
    #[arg(long, env = "EVOHAUS_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Stall code to match (requires --tenant)
    #[arg(long, requires = "tenant")]
    stall: Option<String>,

    /// Tenant number to match (requires --stall)
    #[arg(long, requires = "stall")]
    tenant: Option<String>,

    /// Description marker for stall-aware matching
    #[arg(long, default_value = DEFAULT_METER_MARKER)]
    marker: String,

    /// Legacy description prefix; overrides stall matching
    #[arg(long)]
    description: Option<String>,

    /// Table date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let client = EvohausClient::new(
        cli.base_url.clone(),
        cli.username.clone(),
        cli.password.clone(),
        Duration::from_secs(10),
        Duration::from_secs(0),
    )?;
    client.login().await?;

    let residence = client.fetch_residence_id().await?;
    println!("Residence: {}\n", residence);

    let date = cli.date.unwrap_or_else(|| Local::now().date_naive());
    let table = client.fetch_meter_table(date).await?;

    println!("Meter table for {} ({} rows):", date, table.len());
    for (idx, row) in table.rows.iter().enumerate() {
        let label = row.cell(0).unwrap_or_default();
        let id = row_identifier(row);
        println!(
            "  [{:>2}] {:<30} stall={:<6} tenant={:<6} {:?}",
            idx, label, id.stall_code, id.tenant_number, row.cells
        );
    }

    let criterion = match (cli.description, cli.stall, cli.tenant) {
        (Some(description), _, _) => MatchCriterion::Description(description),
        (None, Some(stall), Some(tenant)) => MatchCriterion::Stall {
            marker: cli.marker,
            identifier: StallIdentifier::new(stall, tenant),
        },
        _ => MatchCriterion::Marker(cli.marker),
    };

    let reading = resolve_reading(&table, &criterion)?;
    println!("\nCriterion: {:?}", criterion);
    if reading.is_placeholder() {
        println!("No matching meter row");
    } else {
        println!(
            "Reading: {:.2} kWh (meter '{}', stall '{}', tenant '{}')",
            reading.value, reading.meter_number, reading.stall_code, reading.tenant_number
        );
    }

    match client.fetch_traffic_price().await {
        Ok(traffic) => match derive_prices(&traffic) {
            Some(prices) => println!(
                "\nPrice: {} ct/kWh, {} €/kWh ({})",
                prices.cents_per_kwh,
                prices.euros_per_kwh,
                prices.color.as_str()
            ),
            None => println!("\nPrice: not reported"),
        },
        Err(e) => println!("\nPrice: fetch failed ({})", e),
    }

    Ok(())
}

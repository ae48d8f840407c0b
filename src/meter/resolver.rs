use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::fetch_error::FetchError;
use crate::meter::identifier::StallIdentifier;
use crate::meter::row_parser::{parse_row, Reading};
use crate::meter::table::MeterTable;

pub const DEFAULT_METER_MARKER: &str = "Verbrauch Strom";

/// How a meter row is selected from the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum MatchCriterion {
    /// Legacy mode: the description starts with this text.
    Description(String),
    /// First row whose description contains the marker and which carries a
    /// complete stall/tenant pair.
    Marker(String),
    /// Like `Marker`, but the pair must equal the requested one exactly.
    Stall {
        marker: String,
        identifier: StallIdentifier,
    },
}

impl MatchCriterion {
    pub fn matches(&self, description: &str, identifier: &StallIdentifier) -> bool {
        match self {
            MatchCriterion::Description(prefix) => description.starts_with(prefix.as_str()),
            MatchCriterion::Marker(marker) => {
                description.contains(marker.as_str()) && identifier.is_complete()
            }
            MatchCriterion::Stall {
                marker,
                identifier: wanted,
            } => {
                description.contains(marker.as_str())
                    && identifier.is_complete()
                    && identifier == wanted
            }
        }
    }
}

impl Default for MatchCriterion {
    fn default() -> Self {
        MatchCriterion::Marker(DEFAULT_METER_MARKER.to_string())
    }
}

/// Scan the table in document order and return the first matching reading.
///
/// No match is not an error: the placeholder reading comes back and the caller
/// must not publish it.
#[instrument(skip(table), fields(rows = table.len()))]
pub fn resolve_reading(table: &MeterTable, criterion: &MatchCriterion) -> Result<Reading, FetchError> {
    for (idx, row) in table.rows.iter().enumerate() {
        if let Some(reading) = parse_row(idx, row, criterion)? {
            debug!("Resolved reading from row {}", idx);
            return Ok(reading);
        }
    }

    warn!("No meter row matched {:?} in {} rows", criterion, table.len());
    Ok(Reading::placeholder())
}

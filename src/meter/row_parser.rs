use serde::Serialize;
use tracing::debug;

use crate::fetch_error::FetchError;
use crate::meter::identifier::{extract_identifier, StallIdentifier};
use crate::meter::resolver::MatchCriterion;
use crate::meter::table::MeterRow;

const MIN_CELLS: usize = 5;
const METER_NUMBER_CELL: usize = 2;
const VALUE_CELL: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub value: f64,
    pub meter_number: String,
    pub stall_code: String,
    pub tenant_number: String,
}

impl Reading {
    /// Result of a scan that found no matching row. Must never be published.
    pub fn placeholder() -> Self {
        Self {
            value: 0.0,
            meter_number: String::new(),
            stall_code: String::new(),
            tenant_number: String::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.value == 0.0
            && self.meter_number.is_empty()
            && self.stall_code.is_empty()
            && self.tenant_number.is_empty()
    }

    pub fn identifier(&self) -> StallIdentifier {
        StallIdentifier::new(self.stall_code.clone(), self.tenant_number.clone())
    }
}

/// Parse a German-formatted reading ("1.234,56") into a non-negative number.
pub fn parse_value(text: &str) -> Result<f64, FetchError> {
    let normalized = text.trim().replace('.', "").replace(',', ".");
    let value = normalized
        .parse::<f64>()
        .map_err(|e| FetchError::NumberError(format!("'{}': {}", text, e)))?;

    if !value.is_finite() || value < 0.0 {
        return Err(FetchError::NumberError(format!(
            "'{}' is not a non-negative reading",
            text
        )));
    }

    Ok(value)
}

/// Evaluate one row against the criterion.
///
/// Returns `Ok(None)` when the row does not match. A matching row that is too
/// short or carries an unparseable value is a hard failure.
pub fn parse_row(
    row_idx: usize,
    row: &MeterRow,
    criterion: &MatchCriterion,
) -> Result<Option<Reading>, FetchError> {
    let (Some(unit_label), Some(raw_description)) = (row.cell(0), row.cell(1)) else {
        debug!("Row {} has {} cells, cannot evaluate", row_idx, row.len());
        return Ok(None);
    };

    let description = strip_unit_suffix(raw_description, unit_label);
    let identifier = identifier_from(unit_label, description);

    if !criterion.matches(description, &identifier) {
        return Ok(None);
    }

    if row.len() < MIN_CELLS {
        return Err(FetchError::MalformedRow {
            row: row_idx,
            reason: format!("expected at least {} cells, found {}", MIN_CELLS, row.len()),
        });
    }

    let value = parse_value(&row.cells[VALUE_CELL]).map_err(|e| FetchError::MalformedRow {
        row: row_idx,
        reason: e.to_string(),
    })?;

    debug!(
        "Row {} matched: value={}, meter='{}', stall='{}', tenant='{}'",
        row_idx,
        value,
        row.cells[METER_NUMBER_CELL],
        identifier.stall_code,
        identifier.tenant_number
    );

    Ok(Some(Reading {
        value,
        meter_number: row.cells[METER_NUMBER_CELL].clone(),
        stall_code: identifier.stall_code,
        tenant_number: identifier.tenant_number,
    }))
}

/// The portal sometimes repeats the unit label at the end of the description.
fn strip_unit_suffix<'a>(description: &'a str, unit_label: &str) -> &'a str {
    if unit_label.is_empty() {
        return description;
    }
    description
        .strip_suffix(unit_label)
        .and_then(|rest| rest.strip_suffix(' '))
        .unwrap_or(description)
}

/// Stall and tenant of a row, as used for matching.
///
/// Stall markers usually live in the unit label; older tables put them in the description.
pub fn row_identifier(row: &MeterRow) -> StallIdentifier {
    let unit_label = row.cell(0).unwrap_or_default();
    let description = row
        .cell(1)
        .map(|description| strip_unit_suffix(description, unit_label))
        .unwrap_or_default();
    identifier_from(unit_label, description)
}

fn identifier_from(unit_label: &str, description: &str) -> StallIdentifier {
    let from_label = extract_identifier(unit_label);
    if from_label.is_complete() {
        return from_label;
    }

    let from_description = extract_identifier(description);
    if from_description.is_complete() {
        from_description
    } else {
        from_label
    }
}

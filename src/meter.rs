// Meter table module
//
// This module turns the portal's HTML meter table into typed readings:
// - table: HTML -> ordered rows of raw cell text
// - identifier: stall code / tenant number extraction from free-text labels
// - row_parser: one row -> Reading (or skip)
// - resolver: first matching row across the table

pub mod identifier;
pub mod resolver;
pub mod row_parser;
pub mod table;

pub use identifier::{extract_identifier, StallIdentifier};
pub use resolver::{resolve_reading, MatchCriterion};
pub use row_parser::{parse_row, parse_value, row_identifier, Reading};
pub use table::{MeterRow, MeterTable};

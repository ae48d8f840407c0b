use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

use crate::fetch_error::FetchError;

/// One `<tr>` of the meter table: cell texts in document order.
///
/// Expected layout (5+ cells): unit label, description, meter number,
/// unused, formatted reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterRow {
    pub cells: Vec<String>,
}

impl MeterRow {
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cells: cells.into_iter().map(Into::into).collect(),
        }
    }

    pub fn cell(&self, idx: usize) -> Option<&str> {
        self.cells.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Parsed meter table. Row order is source document order and is never re-sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeterTable {
    pub rows: Vec<MeterRow>,
}

impl MeterTable {
    pub fn new(rows: Vec<MeterRow>) -> Self {
        Self { rows }
    }

    /// Build a table from the `newMeterTable.php` response.
    ///
    /// Rows without any `<td>` (header rows using `<th>`) are dropped. A cell's
    /// text is its first text node, kept untrimmed, which mirrors how the portal
    /// renders one value per cell followed by optional markup.
    #[instrument(skip(html), fields(html_size = html.len()))]
    pub fn from_html(html: &str) -> Result<Self, FetchError> {
        let document = Html::parse_document(html);
        let row_selector = Selector::parse("tr").map_err(|_| FetchError::ParseError)?;
        let cell_selector = Selector::parse("td").map_err(|_| FetchError::ParseError)?;

        let mut rows = Vec::new();
        for (idx, tr) in document.select(&row_selector).enumerate() {
            let cells: Vec<String> = tr.select(&cell_selector).map(first_text).collect();
            if cells.is_empty() {
                debug!("Row {} has no data cells, skipping", idx);
                continue;
            }
            debug!("Row {}: {:?}", idx, cells);
            rows.push(MeterRow { cells });
        }

        debug!("Parsed {} meter rows", rows.len());
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn first_text(cell: ElementRef<'_>) -> String {
    cell.text().next().unwrap_or_default().to_string()
}

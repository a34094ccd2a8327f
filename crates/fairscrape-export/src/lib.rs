//! `.xlsx` rendering of extracted exhibitor rows.
//!
//! Pure formatting: rows come in already normalized and deduplicated.

use fairscrape_core::ExhibitorRow;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use thiserror::Error;

pub const EXHIBITORS_SHEET: &str = "Exhibitors";
pub const META_SHEET: &str = "Meta";

const HEADERS: [&str; 4] = ["Company", "Activity", "Website", "Country"];
const MAX_COLUMN_WIDTH: usize = 60;
const COLUMN_PADDING: usize = 3;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("too many rows for one worksheet: {0}")]
    TooManyRows(usize),
}

/// Summary written to the "Meta" sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetMeta {
    pub url: String,
    /// Strategy that produced the rows, e.g. `known_backend`.
    pub driver: String,
    pub supported: bool,
}

/// Renders `rows` as an in-memory `.xlsx` workbook.
///
/// # Errors
///
/// Returns [`ExportError`] if the workbook cannot be assembled.
pub fn build_workbook(rows: &[ExhibitorRow], meta: &SheetMeta) -> Result<Vec<u8>, ExportError> {
    let sorted = sorted_rows(rows);
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name(EXHIBITORS_SHEET)?;
    write_exhibitors(sheet, &sorted, &header_format)?;

    let sheet = workbook.add_worksheet();
    sheet.set_name(META_SHEET)?;
    write_meta(sheet, sorted.len(), meta, &header_format)?;

    Ok(workbook.save_to_buffer()?)
}

fn write_exhibitors(
    sheet: &mut Worksheet,
    rows: &[&ExhibitorRow],
    header_format: &Format,
) -> Result<(), ExportError> {
    for (col, header) in (0u16..).zip(HEADERS) {
        sheet.write_string_with_format(0, col, header, header_format)?;
    }

    for (row_idx, row) in (1u32..).zip(rows) {
        for (col, value) in (0u16..).zip(cells(row)) {
            sheet.write_string(row_idx, col, value)?;
        }
    }

    let last_row = u32::try_from(rows.len()).map_err(|_| ExportError::TooManyRows(rows.len()))?;
    sheet.autofilter(0, 0, last_row, 3)?;
    sheet.set_freeze_panes(1, 0)?;

    for (col, width) in (0u16..).zip(column_widths(rows)) {
        #[allow(clippy::cast_precision_loss)]
        sheet.set_column_width(col, width as f64)?;
    }
    Ok(())
}

fn write_meta(
    sheet: &mut Worksheet,
    total: usize,
    meta: &SheetMeta,
    label_format: &Format,
) -> Result<(), ExportError> {
    let total = u32::try_from(total).map_err(|_| ExportError::TooManyRows(total))?;

    sheet.write_string_with_format(0, 0, "URL", label_format)?;
    sheet.write_string(0, 1, &meta.url)?;
    sheet.write_string_with_format(1, 0, "Total", label_format)?;
    sheet.write_number(1, 1, f64::from(total))?;
    sheet.write_string_with_format(2, 0, "Driver", label_format)?;
    sheet.write_string(2, 1, &meta.driver)?;
    sheet.write_string_with_format(3, 0, "Supported", label_format)?;
    sheet.write_boolean(3, 1, meta.supported)?;

    sheet.set_column_width(0, 12)?;
    sheet.set_column_width(1, 80)?;
    Ok(())
}

fn cells(row: &ExhibitorRow) -> [&str; 4] {
    [&row.company, &row.activity, &row.website, &row.country]
}

/// Rows ordered by (country, company), case-insensitively. Ties keep input order.
#[must_use]
pub fn sorted_rows(rows: &[ExhibitorRow]) -> Vec<&ExhibitorRow> {
    let mut sorted: Vec<&ExhibitorRow> = rows.iter().collect();
    sorted.sort_by_cached_key(|r| (r.country.to_lowercase(), r.company.to_lowercase()));
    sorted
}

/// Per-column width: longest cell (header included) plus padding, capped.
#[must_use]
pub fn column_widths(rows: &[&ExhibitorRow]) -> [usize; 4] {
    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in rows {
        for (width, value) in widths.iter_mut().zip(cells(row)) {
            *width = (*width).max(value.chars().count());
        }
    }
    widths.map(|w| (w + COLUMN_PADDING).min(MAX_COLUMN_WIDTH))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(company: &str, country: &str) -> ExhibitorRow {
        ExhibitorRow {
            company: company.to_owned(),
            country: country.to_owned(),
            ..ExhibitorRow::default()
        }
    }

    fn meta() -> SheetMeta {
        SheetMeta {
            url: "https://logisticsautomationmadrid.com/es/expositores".to_owned(),
            driver: "known_backend".to_owned(),
            supported: true,
        }
    }

    #[test]
    fn rows_sort_by_country_then_company_ignoring_case() {
        let rows = vec![
            row("zeta", "Spain"),
            row("Beta", "portugal"),
            row("alpha", "Spain"),
            row("Acme", "Portugal"),
        ];
        let order: Vec<&str> = sorted_rows(&rows).iter().map(|r| r.company.as_str()).collect();
        assert_eq!(order, vec!["Acme", "Beta", "alpha", "zeta"]);
    }

    #[test]
    fn widths_pad_and_cap() {
        let long = row(&"x".repeat(100), "Spain");
        let short = row("Acme", "Spain");
        let rows = vec![&long, &short];
        let widths = column_widths(&rows);
        assert_eq!(widths[0], MAX_COLUMN_WIDTH);
        assert_eq!(widths[1], "Activity".len() + COLUMN_PADDING);
        assert_eq!(widths[3], "Country".len() + COLUMN_PADDING);
    }

    #[test]
    fn workbook_is_a_zip_container() {
        let rows = vec![row("Acme", "Spain"), row("Beta", "Portugal")];
        let bytes = build_workbook(&rows, &meta()).unwrap();
        assert!(bytes.starts_with(b"PK"), "xlsx files are zip archives");
    }

    #[test]
    fn empty_row_set_still_renders() {
        let bytes = build_workbook(&[], &meta()).unwrap();
        assert!(!bytes.is_empty());
    }
}

//! Spreadsheet-friendly CSV export of found parcels.

use crate::record::{ParcelRecord, COLUMNS};

const DELIMITER: char = ',';
/// Lets spreadsheet software detect UTF-8.
const BOM: char = '\u{feff}';

/// Escape CSV value if needed
fn escape_csv_value(value: &str) -> String {
    if value.contains(DELIMITER) || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn push_row<'a>(out: &mut String, values: impl IntoIterator<Item = &'a str>) {
    let row = values
        .into_iter()
        .map(escape_csv_value)
        .collect::<Vec<_>>()
        .join(&DELIMITER.to_string());
    out.push_str(&row);
    out.push_str("\r\n");
}

/// Renders the header row and one row per record, in discovery order.
pub fn records_to_csv(records: &[ParcelRecord]) -> String {
    let mut out = String::with_capacity(256 * (records.len() + 1));
    out.push(BOM);
    push_row(&mut out, COLUMNS);
    for record in records {
        push_row(&mut out, record.row());
    }
    out
}

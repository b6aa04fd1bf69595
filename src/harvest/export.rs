use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::core::types::ContactRecord;
use crate::core::ScoutResult;

pub const CSV_HEADER: &str = "Name,Email";

fn quoted(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// `Name,Email` followed by one `"name","email"` line per record, in acceptance order.
/// Lines are joined with `\n`; there is no trailing newline.
pub fn render_csv(records: &[ContactRecord]) -> String {
    std::iter::once(CSV_HEADER.to_string())
        .chain(
            records
                .iter()
                .map(|r| format!("{},{}", quoted(r.name()), quoted(r.email()))),
        )
        .collect::<Vec<_>>()
        .join("\n")
}

/// `contacts_YYYY-MM-DD.csv`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("contacts_{}.csv", date.format("%Y-%m-%d"))
}

/// Write the CSV into `dir` (created if missing) and return the file path.
pub fn write_csv(dir: &Path, records: &[ContactRecord], date: NaiveDate) -> ScoutResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(date));
    std::fs::write(&path, render_csv(records))?;
    Ok(path)
}

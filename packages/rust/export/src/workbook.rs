//! Review workbook rows and xlsx I/O.

use std::path::Path;

use calamine::{Data, DataType, Reader, Xlsx, open_workbook};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde_json::Value;

use artcallfinder_shared::{ArtCallError, Record, Result};

/// Workbook header, in column order.
pub const COLUMNS: [&str; 11] = [
    "reviewed",
    "url",
    "deadline",
    "topics",
    "fees",
    "requirement",
    "title",
    "location",
    "organization",
    "source_file",
    "added_on",
];

/// One workbook line. Field order matches [`COLUMNS`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkbookRow {
    pub reviewed: String,
    pub url: String,
    pub deadline: String,
    pub topics: String,
    pub fees: String,
    pub requirement: String,
    pub title: String,
    pub location: String,
    pub organization: String,
    pub source_file: String,
    pub added_on: String,
}

impl WorkbookRow {
    /// Build an unreviewed row from a processed record.
    pub fn from_record(record: &Record, source_file: &str, added_on: &str) -> Self {
        let topics = record
            .get("topics")
            .or_else(|| record.get("topics_EN"))
            .map(cell_text)
            .unwrap_or_default();

        Self {
            reviewed: "N".to_string(),
            url: record.url().unwrap_or_default().to_string(),
            deadline: record
                .get_str("deadline")
                .and_then(normalize_date)
                .unwrap_or_default(),
            topics,
            fees: field(record, "fees"),
            requirement: field(record, "requirement"),
            title: record.title().to_string(),
            location: field(record, "location"),
            organization: field(record, "organization"),
            source_file: source_file.to_string(),
            added_on: added_on.to_string(),
        }
    }

    /// Cell values in [`COLUMNS`] order.
    pub fn cells(&self) -> [&str; 11] {
        [
            &self.reviewed,
            &self.url,
            &self.deadline,
            &self.topics,
            &self.fees,
            &self.requirement,
            &self.title,
            &self.location,
            &self.organization,
            &self.source_file,
            &self.added_on,
        ]
    }

    /// Set the cell under header `column`. Unknown headers are ignored.
    fn set(&mut self, column: &str, value: String) {
        let slot = match column.trim() {
            "reviewed" => &mut self.reviewed,
            "url" => &mut self.url,
            "deadline" => &mut self.deadline,
            "topics" => &mut self.topics,
            "fees" => &mut self.fees,
            "requirement" => &mut self.requirement,
            "title" => &mut self.title,
            "location" => &mut self.location,
            "organization" => &mut self.organization,
            "source_file" => &mut self.source_file,
            "added_on" => &mut self.added_on,
            _ => return,
        };
        *slot = value;
    }
}

fn field(record: &Record, key: &str) -> String {
    record.get(key).map(cell_text).unwrap_or_default()
}

/// Flatten a JSON value into a single cell. Arrays join with ", ".
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(cell_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%A, %B %d, %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"];

/// Coerce a deadline to `YYYY-MM-DD`. `None` when it is not a recognizable date.
pub fn normalize_date(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let date = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))?;

    Some(date.format("%Y-%m-%d").to_string())
}

/// Read the first sheet of a workbook. Columns are matched by header name;
/// missing columns read as empty cells and unknown ones are ignored.
pub fn read_workbook(path: &Path) -> Result<Vec<WorkbookRow>> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .map_err(|e| ArtCallError::Export(format!("cannot open {}: {e}", path.display())))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ArtCallError::Export(format!("no sheet in {}", path.display())))?
        .map_err(|e| ArtCallError::Export(format!("cannot read {}: {e}", path.display())))?;

    let mut lines = range.rows();
    let Some(header) = lines.next() else {
        return Ok(Vec::new());
    };
    let header: Vec<String> = header.iter().map(sheet_cell_text).collect();

    let mut rows = Vec::new();
    for line in lines {
        let mut row = WorkbookRow::default();
        let mut blank = true;
        for (name, cell) in header.iter().zip(line) {
            let text = sheet_cell_text(cell);
            if text.is_empty() {
                continue;
            }
            blank = false;
            row.set(name, text);
        }
        if !blank {
            rows.push(row);
        }
    }
    Ok(rows)
}

/// Text of a sheet cell. Date cells come back as `YYYY-MM-DD`.
fn sheet_cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_date()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| cell.to_string()),
        other => other.to_string(),
    }
}

/// Write `rows` under the standard header, replacing the file. Web urls are
/// written as hyperlinks.
pub fn write_workbook(path: &Path, rows: &[WorkbookRow]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ArtCallError::io(parent, e))?;
    }

    let export_err = |e: XlsxError| ArtCallError::Export(format!("cannot write {}: {e}", path.display()));

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let bold = Format::new().set_bold();

    for (col, name) in COLUMNS.iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, *name, &bold)
            .map_err(export_err)?;
    }

    for (index, row) in rows.iter().enumerate() {
        let line = index as u32 + 1;
        for (col, value) in row.cells().into_iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let col = col as u16;
            if col == URL_COLUMN && is_web_url(value) {
                sheet.write_url(line, col, value).map_err(export_err)?;
            } else {
                sheet.write_string(line, col, value).map_err(export_err)?;
            }
        }
    }

    workbook.save(path).map_err(export_err)?;

    tracing::debug!(?path, rows = rows.len(), "workbook written");
    Ok(())
}

const URL_COLUMN: u16 = 1;

fn is_web_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

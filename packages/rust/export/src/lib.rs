//! Review workbook export for ArtCallFinder.
//!
//! Folds every processed collection into a single xlsx workbook that a person
//! works through by hand. Rows already in the workbook are kept as they are
//! (including the `reviewed` mark); only records with an unseen `url` are
//! appended.

mod workbook;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use artcallfinder_shared::{ArtCallError, Result};
use artcallfinder_storage::load_records;

pub use workbook::{COLUMNS, WorkbookRow, normalize_date, read_workbook, write_workbook};

/// Result of [`export_to_workbook`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    /// Rows appended by this run.
    pub added: usize,
    /// Rows in the workbook after this run.
    pub total: usize,
    pub path: PathBuf,
}

/// Append new records from `processed_files` to the workbook at `output`.
///
/// The workbook is only rewritten when at least one row was added.
#[instrument(skip_all, fields(files = processed_files.len(), output = %output.display()))]
pub fn export_to_workbook(processed_files: &[PathBuf], output: &Path) -> Result<ExportSummary> {
    let mut rows = if output.exists() {
        read_workbook(output).unwrap_or_else(|e| {
            warn!(error = %e, "existing workbook unreadable, starting empty");
            Vec::new()
        })
    } else {
        Vec::new()
    };

    let mut seen: HashSet<String> = rows
        .iter()
        .filter(|row| !row.url.is_empty())
        .map(|row| row.url.clone())
        .collect();
    let added_on = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    let mut added = 0;
    for path in processed_files {
        let records = match load_records(path) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable processed file");
                continue;
            }
        };

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        for record in &records {
            let Some(url) = record.url().filter(|u| !u.is_empty()) else {
                continue;
            };
            if !seen.insert(url.to_string()) {
                continue;
            }
            rows.push(WorkbookRow::from_record(record, &file_name, &added_on));
            added += 1;
        }
    }

    if added > 0 {
        write_workbook(output, &rows)?;
        info!(added, total = rows.len(), "workbook updated");
    } else {
        info!("no new art calls to add");
    }

    Ok(ExportSummary {
        added,
        total: rows.len(),
        path: output.to_path_buf(),
    })
}

/// Overwrite the `topics` column of `target` with the topics `source` holds
/// for the same url. Rows the source does not know keep their topics.
///
/// Returns the number of rows whose topics came from `source`.
#[instrument(skip_all, fields(target = %target.display(), source = %source.display()))]
pub fn replace_topics(target: &Path, source: &Path) -> Result<usize> {
    for path in [target, source] {
        if !path.exists() {
            return Err(ArtCallError::Export(format!(
                "workbook not found: {}",
                path.display()
            )));
        }
    }

    let topics_by_url: HashMap<String, String> = read_workbook(source)?
        .into_iter()
        .filter(|row| !row.url.is_empty())
        .map(|row| (row.url, row.topics))
        .collect();

    let mut rows = read_workbook(target)?;
    let mut updated = 0;
    for row in &mut rows {
        if let Some(topics) = topics_by_url.get(&row.url) {
            row.topics = topics.clone();
            updated += 1;
        }
    }

    write_workbook(target, &rows)?;
    info!(updated, rows = rows.len(), "topics replaced");
    Ok(updated)
}

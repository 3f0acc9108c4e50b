//! Persistence: the line-item dataset and the cross-run processing ledger.
//!
//! Both files are written atomically — temp file in the target directory,
//! then rename — so a crash mid-write can never leave a half-written CSV
//! where the previous report used to be.
//!
//! ## Ledger semantics
//!
//! The ledger is an append-only audit log at whole-file-rewrite granularity:
//! each run loads the existing report, keeps its rows first in their
//! original order, appends this run's outcomes, and rewrites the file. An
//! unreadable existing report is not silently discarded — it is moved aside
//! to `<path>.bak` with a loud warning, and this run's rows start a fresh
//! report. Single-writer only: concurrent runs against one report path will
//! lose rows.

use crate::error::PipelineError;
use crate::pipeline::FileOutcome;
use crate::schema::{LineItem, CANONICAL_COLUMNS};
use csv::StringRecord;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Ledger column set, in fixed order.
pub const REPORT_COLUMNS: [&str; 6] = [
    "filename",
    "date",
    "status",
    "items_extracted",
    "error_details",
    "duration_sec",
];

/// Write the canonical dataset: six columns, one row per line item.
///
/// An empty dataset still gets a header row, so downstream consumers always
/// see the canonical schema.
pub fn write_dataset(items: &[LineItem], path: &Path) -> Result<(), PipelineError> {
    ensure_parent(path)?;
    let tmp = tmp_sibling(path);

    write_dataset_records(&tmp, items).map_err(|e| PipelineError::DatasetWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    rename(&tmp, path)?;
    info!("Wrote {} line item(s) to {}", items.len(), path.display());
    Ok(())
}

/// Merge this run's outcomes into the processing ledger at `path`.
///
/// Existing rows come first, preserving their original order; new rows are
/// appended after them.
pub fn append_report(outcomes: &[FileOutcome], path: &Path) -> Result<(), PipelineError> {
    ensure_parent(path)?;
    let existing = load_existing_rows(path);
    let tmp = tmp_sibling(path);

    write_report_records(&tmp, &existing, outcomes).map_err(|e| PipelineError::ReportWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    rename(&tmp, path)?;
    info!(
        "Appended {} outcome(s) to {} ({} prior row(s) preserved)",
        outcomes.len(),
        path.display(),
        existing.len()
    );
    Ok(())
}

fn write_dataset_records(path: &Path, items: &[LineItem]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(CANONICAL_COLUMNS)?;
    for item in items {
        writer.write_record(item.to_record())?;
    }
    writer.flush()?;
    Ok(())
}

fn write_report_records(
    path: &Path,
    existing: &[StringRecord],
    outcomes: &[FileOutcome],
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(REPORT_COLUMNS)?;
    for record in existing {
        writer.write_record(record)?;
    }
    for outcome in outcomes {
        writer.write_record([
            outcome.filename.as_str(),
            outcome.date.as_str(),
            &outcome.status.to_string(),
            &outcome.items_extracted.to_string(),
            outcome.error_details.as_str(),
            &format!("{:.2}", outcome.duration_sec),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Load prior ledger rows, moving an unreadable report aside instead of
/// silently dropping it.
fn load_existing_rows(path: &Path) -> Vec<StringRecord> {
    if !path.exists() {
        return Vec::new();
    }

    let read = || -> Result<Vec<StringRecord>, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;
        reader.records().collect()
    };

    match read() {
        Ok(records) => records,
        Err(e) => {
            let backup = backup_path(path);
            warn!(
                "Existing report {} is unreadable ({e}); moving it to {}",
                path.display(),
                backup.display()
            );
            if let Err(rename_err) = std::fs::rename(path, &backup) {
                warn!("Could not back up unreadable report: {rename_err}");
            }
            Vec::new()
        }
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn ensure_parent(path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }
    Ok(())
}

fn rename(from: &Path, to: &Path) -> Result<(), PipelineError> {
    std::fs::rename(from, to).map_err(|e| PipelineError::Io {
        path: to.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::FileStatus;
    use crate::schema::{normalize, RawRecord};
    use serde_json::json;

    fn outcome(filename: &str, status: FileStatus, items: usize) -> FileOutcome {
        FileOutcome {
            filename: filename.to_string(),
            date: "2026-08-24 10:00:00".to_string(),
            status,
            items_extracted: items,
            error_details: String::new(),
            duration_sec: 1.25,
        }
    }

    #[test]
    fn empty_dataset_still_writes_header() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("items.csv");
        write_dataset(&[], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content.trim(),
            "reference,product,quantity,unit_price,total_price,source_pdf"
        );
    }

    #[test]
    fn dataset_rows_follow_canonical_order() {
        let raw: RawRecord = json!({
            "reference": "R1",
            "description": "Widget",
            "quantity": "3",
            "unit_price": "2,50",
            "total_price": "7.50"
        })
        .as_object()
        .unwrap()
        .clone();
        let item = normalize(&raw, "inv1.pdf");

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("items.csv");
        write_dataset(&[item], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        lines.next(); // header
        assert_eq!(lines.next().unwrap(), "R1,Widget,3,2.50,7.50,inv1.pdf");
    }

    #[test]
    fn ledger_merge_preserves_existing_rows_first() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("report.csv");

        append_report(&[outcome("a.pdf", FileStatus::Success, 2)], &path).unwrap();
        append_report(&[outcome("b.pdf", FileStatus::Warning, 0)], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("filename,date,status"));
        assert!(lines[1].starts_with("a.pdf"));
        assert!(lines[2].starts_with("b.pdf"));
        assert!(lines[2].contains("Warning: no items found"));
    }

    #[test]
    fn unreadable_report_is_backed_up_not_dropped() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("report.csv");
        // Unbalanced quote makes the csv reader fail mid-file.
        std::fs::write(&path, "filename,date\n\"broken,row\nmore,\"data").unwrap();

        append_report(&[outcome("c.pdf", FileStatus::Success, 1)], &path).unwrap();

        let backup = tmp.path().join("report.csv.bak");
        assert!(backup.exists(), "corrupt report must be preserved as .bak");

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("c.pdf"));
    }

    #[test]
    fn error_outcome_carries_details() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("report.csv");

        let mut o = outcome("bad.pdf", FileStatus::Error, 0);
        o.error_details = "damaged xref".to_string();
        append_report(&[o], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("bad.pdf"));
        assert!(content.contains("damaged xref"));
    }
}

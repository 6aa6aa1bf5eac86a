//! Reverting the most recent organize run.
//!
//! Operations from the history file are processed in reverse: moved files go
//! back to where they came from, copies and summary files are removed.
use crate::error::{OrganizeError, OrganizeResult};
use crate::file_organizer::{Action, Operation, OperationLog};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// What an undo run did.
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Moved files put back at their original location.
    pub restored_files: usize,
    /// Copies and summary files deleted.
    pub removed_files: usize,
    pub failed_restores: Vec<(PathBuf, String)>,
    /// Entries whose file was no longer where the history says.
    pub skipped_files: Vec<(PathBuf, String)>,
}

impl UndoReport {
    pub fn total_processed(&self) -> usize {
        self.restored_files
            + self.removed_files
            + self.failed_restores.len()
            + self.skipped_files.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed_restores.is_empty() && self.skipped_files.is_empty()
    }
}

enum Outcome {
    Restored,
    Removed,
    Missing(PathBuf),
}

pub struct UndoManager;

impl UndoManager {
    /// Undoes the last organize run recorded in `base_path`.
    ///
    /// The history file is deleted only when every entry was reverted.
    ///
    /// # Errors
    ///
    /// Fails when `base_path` does not exist, or when there is no history or it
    /// cannot be parsed. Per-file problems end up in the [`UndoReport`].
    ///
    /// ```no_run
    /// use rulesort::undo::UndoManager;
    /// use std::path::Path;
    ///
    /// match UndoManager::undo(Path::new("/inbox")) {
    ///     Ok(report) => println!("Restored {} files", report.restored_files),
    ///     Err(e) => eprintln!("Undo failed: {}", e),
    /// }
    /// ```
    pub fn undo(base_path: &Path) -> OrganizeResult<UndoReport> {
        if !base_path.exists() {
            return Err(OrganizeError::InvalidBasePath {
                path: base_path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "base path does not exist",
                ),
            });
        }

        let log = OperationLog::load(base_path)?.ok_or(OrganizeError::NoHistory)?;
        let mut report = UndoReport::default();

        // Summaries were written after their files were placed.
        for summary in log.summary_files.iter().rev() {
            record(&mut report, summary, remove_file(summary));
        }
        for operation in log.operations.iter().rev() {
            record(&mut report, &operation.new_path, revert(operation));
        }

        if report.is_complete_success()
            && let Err(e) = OperationLog::delete(base_path)
        {
            warn!(error = %e, "could not delete history file");
        }

        Ok(report)
    }
}

fn record(report: &mut UndoReport, path: &Path, outcome: Result<Outcome, String>) {
    match outcome {
        Ok(Outcome::Restored) => report.restored_files += 1,
        Ok(Outcome::Removed) => report.removed_files += 1,
        Ok(Outcome::Missing(missing)) => report
            .skipped_files
            .push((missing, "File not found at expected location".to_string())),
        Err(reason) => report.failed_restores.push((path.to_path_buf(), reason)),
    }
}

fn revert(operation: &Operation) -> Result<Outcome, String> {
    match operation.action {
        Action::Copy => remove_file(&operation.new_path),
        Action::Move => restore(operation),
    }
}

fn remove_file(path: &Path) -> Result<Outcome, String> {
    if !path.exists() {
        return Ok(Outcome::Missing(path.to_path_buf()));
    }
    fs::remove_file(path)
        .map(|()| Outcome::Removed)
        .map_err(|e| format!("Failed to remove file: {}", e))
}

fn restore(operation: &Operation) -> Result<Outcome, String> {
    if !operation.new_path.exists() {
        return Ok(Outcome::Missing(operation.new_path.clone()));
    }

    if operation.original_path.exists() {
        let backup_path = backup_path(&operation.original_path);
        fs::rename(&operation.original_path, &backup_path)
            .map_err(|e| format!("Could not backup conflicting file: {}", e))?;
    }
    if let Some(parent) = operation.original_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| format!("Could not recreate directory: {}", e))?;
    }

    fs::rename(&operation.new_path, &operation.original_path)
        .map(|()| Outcome::Restored)
        .map_err(|e| format!("Failed to restore file: {}", e))
}

/// `file.txt` becomes `file.txt.bak.20251109-143052`.
fn backup_path(original_path: &Path) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let filename = original_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    original_path.with_file_name(format!("{filename}.bak.{timestamp}"))
}

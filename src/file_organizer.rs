//! Placement of files at their resolved targets.
//!
//! This module executes what the rule engine decides: it creates target
//! directories, copies or moves files, resolves name conflicts, writes
//! optional summary files and keeps a history of every placement so the run
//! can be undone.
use crate::error::{OrganizeError, OrganizeResult};
use crate::file_category::Category;
use crate::file_info::FileInfo;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the history file kept in the organized directory.
pub const HISTORY_FILE_NAME: &str = ".rulesort_history.json";

/// What to do when the target path is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Pick `stem_1.ext`, `stem_2.ext`, ... until a free name is found.
    #[default]
    Rename,
    /// Leave the source where it is.
    Skip,
    /// Replace the existing file.
    Overwrite,
}

/// How a file reached its new location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Move,
    Copy,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Move => "move",
            Action::Copy => "copy",
        }
    }
}

/// A single completed placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub original_path: PathBuf,
    pub new_path: PathBuf,
    pub action: Action,
    /// Rule that chose the target; `None` for category fallback placements.
    #[serde(default)]
    pub rule_id: Option<String>,
}

/// Result of [`FileOrganizer::place`].
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    Done(Operation),
    /// The target was taken and the conflict policy said to skip, or the
    /// file already sits at its target.
    Skipped { source: PathBuf, target: PathBuf },
}

/// Everything one organize run did, persisted for undo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationLog {
    /// RFC 3339 timestamp of the run.
    pub timestamp: String,
    pub base_path: PathBuf,
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub summary_files: Vec<PathBuf>,
}

impl OperationLog {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            base_path,
            operations: Vec::new(),
            summary_files: Vec::new(),
        }
    }

    pub fn add_operation(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    pub fn add_summary_file(&mut self, path: PathBuf) {
        self.summary_files.push(path);
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.summary_files.is_empty()
    }

    pub fn history_file_path(base_path: &Path) -> PathBuf {
        base_path.join(HISTORY_FILE_NAME)
    }

    /// Writes the log as pretty JSON into `base_path`, replacing any previous run.
    pub fn save(&self, base_path: &Path) -> OrganizeResult<()> {
        let history_path = Self::history_file_path(base_path);
        let json = serde_json::to_string_pretty(self).map_err(|e| OrganizeError::WriteFailed {
            path: history_path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
        fs::write(&history_path, json).map_err(|source| OrganizeError::WriteFailed {
            path: history_path,
            source,
        })
    }

    /// Loads the log of the most recent run, if there is one.
    pub fn load(base_path: &Path) -> OrganizeResult<Option<Self>> {
        let history_path = Self::history_file_path(base_path);
        if !history_path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&history_path).map_err(OrganizeError::HistoryReadFailed)?;
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| OrganizeError::InvalidHistoryFormat(e.to_string()))
    }

    pub fn delete(base_path: &Path) -> OrganizeResult<()> {
        let history_path = Self::history_file_path(base_path);
        if history_path.exists() {
            fs::remove_file(&history_path).map_err(|source| OrganizeError::WriteFailed {
                path: history_path,
                source,
            })?;
        }
        Ok(())
    }
}

/// Executes placements on the filesystem.
pub struct FileOrganizer;

impl FileOrganizer {
    /// Copies or moves `source` to `target`.
    ///
    /// Parent directories of `target` are created as needed. A move tries a
    /// rename first and falls back to copy-then-remove when the rename fails
    /// (for example across filesystems).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rulesort::file_organizer::{ConflictPolicy, FileOrganizer, Placement};
    /// use std::path::Path;
    ///
    /// let placement = FileOrganizer::place(
    ///     Path::new("/inbox/report.pdf"),
    ///     Path::new("/archive/PDF/report.pdf"),
    ///     false,
    ///     ConflictPolicy::Rename,
    /// );
    /// if let Ok(Placement::Done(op)) = placement {
    ///     println!("{} -> {}", op.original_path.display(), op.new_path.display());
    /// }
    /// ```
    pub fn place(
        source: &Path,
        target: &Path,
        should_copy: bool,
        conflict: ConflictPolicy,
    ) -> OrganizeResult<Placement> {
        let skipped = || Placement::Skipped {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
        };
        if source == target {
            return Ok(skipped());
        }

        let destination = if target.exists() {
            match conflict {
                ConflictPolicy::Skip => {
                    debug!(target = %target.display(), "target exists, skipping");
                    return Ok(skipped());
                }
                ConflictPolicy::Overwrite => target.to_path_buf(),
                ConflictPolicy::Rename => unique_path(target),
            }
        } else {
            target.to_path_buf()
        };

        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| OrganizeError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let action = if should_copy { Action::Copy } else { Action::Move };
        transfer(source, &destination, action)?;
        debug!(from = %source.display(), to = %destination.display(), action = action.as_str(), "placed file");

        Ok(Placement::Done(Operation {
            original_path: source.to_path_buf(),
            new_path: destination,
            action,
            rule_id: None,
        }))
    }

    /// Target for a file no rule claimed: `<base>/<category dir>/<file name>`.
    pub fn fallback_target(base_path: &Path, category: Category, file_name: &str) -> PathBuf {
        base_path.join(category.dir_name()).join(file_name)
    }

    /// Writes `<stem>_summary.txt` next to `target` from the file's AI analysis.
    pub fn write_summary(info: &FileInfo, target: &Path) -> OrganizeResult<PathBuf> {
        let stem = target
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| info.file_name.clone());
        let summary_path = target.with_file_name(format!("{stem}_summary.txt"));

        fs::write(&summary_path, summary_text(info)).map_err(|source| OrganizeError::WriteFailed {
            path: summary_path.clone(),
            source,
        })?;
        Ok(summary_path)
    }
}

fn transfer(source: &Path, destination: &Path, action: Action) -> OrganizeResult<()> {
    let failed = |source_error| OrganizeError::TransferFailed {
        action: action.as_str(),
        from: source.to_path_buf(),
        to: destination.to_path_buf(),
        source: source_error,
    };
    match action {
        Action::Copy => fs::copy(source, destination).map(|_| ()).map_err(failed),
        Action::Move => {
            if fs::rename(source, destination).is_ok() {
                return Ok(());
            }
            fs::copy(source, destination).map_err(failed)?;
            fs::remove_file(source).map_err(failed)
        }
    }
}

/// First free `stem_N.ext` next to `target`.
fn unique_path(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = target
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1u32;
    loop {
        let candidate = target.with_file_name(format!("{stem}_{counter}{extension}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

fn summary_text(info: &FileInfo) -> String {
    let mut text = format!("# Summary of {}\n\n", info.file_name);

    if let Some(category) = info.get_str("ai_analysis.category").filter(|c| !c.is_empty()) {
        let _ = writeln!(text, "Category: {category}");
    }
    if let Some(keywords) = info.get_field("ai_analysis.keywords")
        && let Some(list) = keywords.as_array()
        && !list.is_empty()
    {
        let words: Vec<&str> = list.iter().filter_map(Value::as_str).collect();
        let _ = writeln!(text, "Keywords: {}\n", words.join(", "));
    }
    match info.get_str("ai_analysis.summary").filter(|s| !s.is_empty()) {
        Some(summary) => {
            let _ = write!(text, "## Content Summary\n\n{summary}\n\n");
        }
        None => text.push_str("No summary available for this file.\n\n"),
    }
    let _ = writeln!(
        text,
        "Generated: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    text
}

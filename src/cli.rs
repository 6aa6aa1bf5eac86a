//! Command-line interface for rulesort.
//!
//! Parsing is derived with clap; each subcommand has a `run_*` function that
//! returns a report so the workflows can be driven from tests as well as from
//! `main`.

use crate::config::AppConfig;
use crate::error::{AppError, RuleError};
use crate::file_category::{Category, FileMapper};
use crate::file_info::FileInfo;
use crate::file_organizer::{
    ConflictPolicy, FileOrganizer, HISTORY_FILE_NAME, OperationLog, Placement,
};
use crate::output::OutputFormatter;
use crate::rule_manager::{RuleManager, RuleSettings, RuleTemplate};
use crate::undo::{UndoManager, UndoReport};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Parser)]
#[command(name = "rulesort", version, about = "Rule-based file organization")]
pub struct Cli {
    /// Configuration file (defaults to ./.rulesortrc.toml, then ~/.config/rulesort/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Place the files of a directory according to the rules
    Organize {
        dir: PathBuf,
        /// Rules file (overrides the configured one)
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Base directory for target paths (defaults to DIR)
        #[arg(long)]
        target: Option<PathBuf>,
        /// Show what would happen without touching any file
        #[arg(long)]
        dry_run: bool,
        /// What to do when a target already exists
        #[arg(long, value_enum)]
        conflict: Option<ConflictPolicy>,
    },
    /// Resolve target paths for pre-analyzed file records (JSON array)
    Resolve {
        records: PathBuf,
        #[arg(long)]
        base_dir: PathBuf,
        #[arg(long)]
        rules: Option<PathBuf>,
    },
    /// Revert the last organize run in DIR
    Undo { dir: PathBuf },
    /// Manage the rules file
    Rules {
        #[arg(long, global = true)]
        rules: Option<PathBuf>,
        #[command(subcommand)]
        action: RulesCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum RulesCommand {
    /// List rules in evaluation order
    List,
    /// Add a preset rule (document_type, date, category, image_camera, image_content, basic)
    AddTemplate {
        kind: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        priority: Option<i64>,
    },
    Remove { id: String },
    Enable { id: String },
    Disable { id: String },
}

/// Options for [`run_organize`].
#[derive(Debug, Clone, Default)]
pub struct OrganizeOptions {
    pub rules: Option<PathBuf>,
    pub target: Option<PathBuf>,
    pub dry_run: bool,
    pub conflict: Option<ConflictPolicy>,
}

/// Outcome of an organize run.
#[derive(Debug, Default)]
pub struct OrganizeReport {
    pub placed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Files no rule matched and that were left in place.
    pub unmatched: usize,
    /// Placed (or, in a dry run, plannable) files per rule name or fallback directory.
    pub destinations: HashMap<String, usize>,
}

/// One resolved record from [`run_resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub file_name: String,
    pub target_path: Option<PathBuf>,
    pub rule_id: Option<String>,
    /// Rules that matched but could not render a target path.
    pub failed_rule_ids: Vec<String>,
}

/// Runs a parsed command with an already loaded configuration.
pub fn run(command: Command, config: &AppConfig) -> Result<(), AppError> {
    match command {
        Command::Organize {
            dir,
            rules,
            target,
            dry_run,
            conflict,
        } => {
            let options = OrganizeOptions {
                rules,
                target,
                dry_run,
                conflict,
            };
            run_organize(&dir, &options, config).map(|_| ())
        }
        Command::Resolve {
            records,
            base_dir,
            rules,
        } => {
            let settings = config.rule_settings(rules.as_deref());
            run_resolve(&records, &base_dir, settings).map(|_| ())
        }
        Command::Undo { dir } => run_undo(&dir).map(|_| ()),
        Command::Rules { rules, action } => {
            run_rules(action, config.rule_settings(rules.as_deref()))
        }
    }
}

/// Scans the top level of `dir` and places every file the rules (or the
/// category fallback) resolve.
///
/// A dry run only evaluates: nothing is moved and neither history nor rule
/// statistics are written.
pub fn run_organize(
    dir: &Path,
    options: &OrganizeOptions,
    config: &AppConfig,
) -> Result<OrganizeReport, AppError> {
    let filters = config.scan.compile()?;
    let mut manager = RuleManager::open(config.rule_settings(options.rules.as_deref()))?;
    let base_dir = options.target.as_deref().unwrap_or(dir);
    let conflict = options.conflict.unwrap_or(config.organize.conflict);
    let mapper = FileMapper::default();

    if options.dry_run {
        OutputFormatter::dry_run_notice(&format!("Analyzing contents of: {}", dir.display()));
    } else {
        OutputFormatter::info(&format!("Organizing contents of: {}", dir.display()));
    }

    let files = scan(dir, manager.rules_file())?
        .into_iter()
        .filter(|path| filters.should_include(path))
        .collect::<Vec<_>>();
    if files.is_empty() {
        OutputFormatter::info("No files found to organize.");
        return Ok(OrganizeReport::default());
    }

    let mut report = OrganizeReport::default();
    let mut log = OperationLog::new(dir.to_path_buf());
    let progress = (!options.dry_run).then(|| OutputFormatter::create_progress_bar(files.len() as u64));

    for path in &files {
        if let Some(pb) = &progress {
            pb.inc(1);
        }
        let info = match FileInfo::from_path(path, &mapper, config.organize.max_text_bytes) {
            Ok(info) => info,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read file");
                report.failed += 1;
                continue;
            }
        };

        let Some(decision) = decide(&mut manager, &info, base_dir, options.dry_run, config) else {
            debug!(file = %info.file_name, "no rule matched");
            report.unmatched += 1;
            if options.dry_run {
                OutputFormatter::unmatched(&info.file_name);
            }
            continue;
        };

        if options.dry_run {
            OutputFormatter::placement(&info.file_name, &decision.target, &decision.label);
            *report.destinations.entry(decision.label).or_insert(0) += 1;
            continue;
        }

        match FileOrganizer::place(path, &decision.target, decision.should_copy, conflict) {
            Ok(Placement::Done(mut operation)) => {
                if decision.create_summary {
                    match FileOrganizer::write_summary(&info, &operation.new_path) {
                        Ok(summary) => log.add_summary_file(summary),
                        Err(e) => warn!(error = %e, "cannot write summary file"),
                    }
                }
                operation.rule_id = decision.rule_id;
                log.add_operation(operation);
                report.placed += 1;
                *report.destinations.entry(decision.label).or_insert(0) += 1;
            }
            Ok(Placement::Skipped { target, .. }) => {
                debug!(target = %target.display(), "placement skipped");
                report.skipped += 1;
            }
            Err(e) => {
                OutputFormatter::error(&format!("{}: {}", info.file_name, e));
                report.failed += 1;
            }
        }
    }

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    if options.dry_run {
        OutputFormatter::summary_table(&report.destinations, report.destinations.values().sum());
        OutputFormatter::dry_run_notice("No files were modified.");
        return Ok(report);
    }

    if !log.is_empty() {
        match log.save(dir) {
            Ok(()) => OutputFormatter::success(&format!(
                "History saved. Use 'rulesort undo {}' to revert changes.",
                dir.display()
            )),
            Err(e) => OutputFormatter::warning(&format!("Could not save history: {}", e)),
        }
    }
    if manager.rules_file().is_some() && !manager.is_empty() {
        // Persist application statistics.
        if let Err(e) = manager.save_rules(None) {
            OutputFormatter::warning(&format!("Could not save rule statistics: {}", e));
        }
    }

    OutputFormatter::summary_table(&report.destinations, report.placed);
    if report.unmatched > 0 {
        OutputFormatter::info(&format!("{} file(s) matched no rule and were left in place.", report.unmatched));
    }
    if report.failed > 0 {
        OutputFormatter::warning("Some files could not be organized. Please review errors above.");
    }
    Ok(report)
}

struct Decision {
    target: PathBuf,
    should_copy: bool,
    create_summary: bool,
    rule_id: Option<String>,
    label: String,
}

fn decide(
    manager: &mut RuleManager,
    info: &FileInfo,
    base_dir: &Path,
    dry_run: bool,
    config: &AppConfig,
) -> Option<Decision> {
    let matched = if dry_run {
        let evaluation = manager.evaluate(info, base_dir);
        evaluation
            .rule_id
            .as_deref()
            .and_then(|id| manager.get_rule(id))
            .zip(evaluation.target_path)
            .map(|(rule, target)| (target, rule))
    } else {
        manager.apply_rules(info, base_dir)
    };

    if let Some((target, rule)) = matched {
        return Some(Decision {
            target,
            should_copy: rule.should_copy,
            create_summary: rule.create_summary,
            rule_id: Some(rule.rule_id.clone()),
            label: rule.name.clone(),
        });
    }

    if !config.organize.fallback_to_category {
        return None;
    }
    let category = info
        .file_type
        .as_deref()
        .and_then(Category::from_label)
        .unwrap_or(Category::Other);
    Some(Decision {
        target: FileOrganizer::fallback_target(base_dir, category, &info.file_name),
        should_copy: false,
        create_summary: false,
        rule_id: None,
        label: format!("{}/", category.dir_name()),
    })
}

/// Regular files directly inside `dir`, sorted by name, without the history
/// file or the active rules file.
fn scan(dir: &Path, rules_file: Option<&Path>) -> Result<Vec<PathBuf>, AppError> {
    let entries = fs::read_dir(dir).map_err(|source| AppError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;
    let rules_file = rules_file.and_then(|path| fs::canonicalize(path).ok());

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .map(|entry| entry.path())
        .filter(|path| path.file_name().is_none_or(|name| name != HISTORY_FILE_NAME))
        .filter(|path| rules_file.is_none() || fs::canonicalize(path).ok() != rules_file)
        .collect();
    files.sort();
    Ok(files)
}

/// Resolves a JSON array of [`FileInfo`] records without touching rule
/// statistics.
pub fn run_resolve(
    records: &Path,
    base_dir: &Path,
    settings: RuleSettings,
) -> Result<Vec<Resolution>, AppError> {
    let manager = RuleManager::open(settings)?;
    let content = fs::read_to_string(records).map_err(|e| AppError::Records {
        path: records.to_path_buf(),
        reason: e.to_string(),
    })?;
    let infos: Vec<FileInfo> = serde_json::from_str(&content).map_err(|e| AppError::Records {
        path: records.to_path_buf(),
        reason: e.to_string(),
    })?;

    let resolutions: Vec<Resolution> = infos
        .iter()
        .map(|info| {
            let evaluation = manager.evaluate(info, base_dir);
            Resolution {
                file_name: info.file_name.clone(),
                target_path: evaluation.target_path,
                rule_id: evaluation.rule_id,
                failed_rule_ids: evaluation.failed_rule_ids,
            }
        })
        .collect();

    for resolution in &resolutions {
        match (&resolution.target_path, &resolution.rule_id) {
            (Some(target), Some(rule_id)) => {
                OutputFormatter::placement(&resolution.file_name, target, rule_id)
            }
            _ => OutputFormatter::unmatched(&resolution.file_name),
        }
        if !resolution.failed_rule_ids.is_empty() {
            OutputFormatter::warning(&format!(
                "{}: matched but produced no path: {}",
                resolution.file_name,
                resolution.failed_rule_ids.join(", ")
            ));
        }
    }
    Ok(resolutions)
}

pub fn run_undo(dir: &Path) -> Result<UndoReport, AppError> {
    OutputFormatter::info("Undoing previous organization...");
    let report = UndoManager::undo(dir)?;

    OutputFormatter::success("Undo complete!");
    OutputFormatter::plain(&format!("  Restored: {}", report.restored_files));
    OutputFormatter::plain(&format!("  Removed:  {}", report.removed_files));
    if !report.skipped_files.is_empty() {
        OutputFormatter::plain(&format!("  Skipped: {}", report.skipped_files.len()));
        for (path, reason) in &report.skipped_files {
            OutputFormatter::plain(&format!("    - {}: {}", path.display(), reason));
        }
    }
    if !report.failed_restores.is_empty() {
        OutputFormatter::plain(&format!("  Failed: {}", report.failed_restores.len()));
        for (path, reason) in &report.failed_restores {
            OutputFormatter::error(&format!("    - {}: {}", path.display(), reason));
        }
    }
    if !report.is_complete_success() {
        OutputFormatter::warning("History file was NOT deleted. Fix the issues above and try again.");
    }
    Ok(report)
}

/// Runs a `rules` subcommand against the configured rules file.
pub fn run_rules(action: RulesCommand, settings: RuleSettings) -> Result<(), AppError> {
    if settings.rules_file.is_none() {
        return Err(RuleError::NoRulesFile.into());
    }
    let mut manager = RuleManager::open(settings)?;

    match action {
        RulesCommand::List => {
            OutputFormatter::rules_table(&manager.get_sorted_rules(false));
            return Ok(());
        }
        RulesCommand::AddTemplate {
            kind,
            name,
            priority,
        } => {
            let template = RuleTemplate::from_name(&kind);
            if template.name() != kind {
                OutputFormatter::warning(&format!(
                    "Unknown template '{}', using '{}'",
                    kind,
                    template.name()
                ));
            }
            let mut rule = RuleManager::create_rule_template(template);
            if let Some(name) = name {
                rule.name = name;
            }
            if let Some(priority) = priority {
                rule.set_priority(priority);
            }
            let added = manager.add_rule(rule)?;
            OutputFormatter::success(&format!("Added rule {} ({})", added.rule_id, added.name));
        }
        RulesCommand::Remove { id } => {
            if !manager.delete_rule(&id) {
                return Err(AppError::UnknownRule(id));
            }
            OutputFormatter::success(&format!("Removed rule {}", id));
        }
        RulesCommand::Enable { id } => set_enabled(&mut manager, id, true)?,
        RulesCommand::Disable { id } => set_enabled(&mut manager, id, false)?,
    }

    manager.save_rules(None)?;
    Ok(())
}

fn set_enabled(manager: &mut RuleManager, id: String, enabled: bool) -> Result<(), AppError> {
    let Some(rule) = manager.get_rule_mut(&id) else {
        return Err(AppError::UnknownRule(id));
    };
    rule.set_enabled(enabled);
    let state = if enabled { "Enabled" } else { "Disabled" };
    OutputFormatter::success(&format!("{} rule {}", state, id));
    Ok(())
}

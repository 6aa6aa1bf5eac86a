//! Ordered rule collection with priority-based matching and JSON persistence.
//!
//! Rules are stored in insertion order but evaluated in ascending priority
//! order; the sort is stable, so insertion order only breaks ties between
//! equal priorities. Evaluation is strictly first-match-wins.
//!
//! Matching is split in two steps. [`RuleManager::evaluate`] borrows the
//! manager immutably and can run from many threads at once.
//! [`RuleManager::apply_rules`] evaluates and then updates the usage counters
//! of every rule it tried, which needs exclusive access.

use crate::condition::Operator;
use crate::error::{RuleError, RuleResult};
use crate::file_info::FileInfo;
use crate::rule::{DateRange, Rule, now};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// What `add_rule` and `load_rules` do with a rule whose id is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateIdPolicy {
    /// Keep the stored rule; `add_rule` fails with [`RuleError::DuplicateId`].
    #[default]
    Reject,
    /// Replace the stored rule in place.
    Replace,
}

/// Settings handed to a [`RuleManager`] at construction.
#[derive(Debug, Clone, Default)]
pub struct RuleSettings {
    /// Default path for `save_rules(None)` / `load_rules(None)`.
    pub rules_file: Option<PathBuf>,
    pub duplicate_ids: DuplicateIdPolicy,
}

/// Built-in rule presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTemplate {
    /// `{file_type}/{file_name}` for any file with a type.
    DocumentType,
    /// `{year}/{month}/{file_name}` by modification date.
    Date,
    /// `{category}/{file_name}` for AI-categorized files.
    Category,
    ImageCamera,
    ImageContent,
    /// Generic fallback with no condition.
    Basic,
}

impl RuleTemplate {
    pub const ALL: [RuleTemplate; 6] = [
        RuleTemplate::DocumentType,
        RuleTemplate::Date,
        RuleTemplate::Category,
        RuleTemplate::ImageCamera,
        RuleTemplate::ImageContent,
        RuleTemplate::Basic,
    ];

    /// Unrecognized names map to [`RuleTemplate::Basic`].
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|template| template.name() == name)
            .unwrap_or(RuleTemplate::Basic)
    }

    pub fn name(&self) -> &'static str {
        match self {
            RuleTemplate::DocumentType => "document_type",
            RuleTemplate::Date => "date",
            RuleTemplate::Category => "category",
            RuleTemplate::ImageCamera => "image_camera",
            RuleTemplate::ImageContent => "image_content",
            RuleTemplate::Basic => "basic",
        }
    }
}

/// Outcome of [`RuleManager::evaluate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleEvaluation {
    /// Rendered path of the winning rule.
    pub target_path: Option<PathBuf>,
    /// Id of the winning rule.
    pub rule_id: Option<String>,
    /// Rules that matched but could not render a path, in evaluation order.
    pub failed_rule_ids: Vec<String>,
    attempted: Vec<usize>,
    winner: Option<usize>,
}

impl RuleEvaluation {
    pub fn is_match(&self) -> bool {
        self.winner.is_some()
    }
}

/// Ordered collection of [`Rule`]s.
#[derive(Debug, Clone, Default)]
pub struct RuleManager {
    rules: Vec<Rule>,
    settings: RuleSettings,
}

impl RuleManager {
    pub fn new(settings: RuleSettings) -> Self {
        Self {
            rules: Vec::new(),
            settings,
        }
    }

    /// Like [`new`](Self::new), then loads the configured rules file if it exists.
    pub fn open(settings: RuleSettings) -> RuleResult<Self> {
        let mut manager = Self::new(settings);
        if manager.rules_file().is_some_and(Path::exists) {
            manager.load_rules(None)?;
        }
        Ok(manager)
    }

    pub fn rules_file(&self) -> Option<&Path> {
        self.settings.rules_file.as_deref()
    }

    pub fn settings(&self) -> &RuleSettings {
        &self.settings
    }

    /// All rules in storage order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Stores `rule`, applying the duplicate-id policy.
    pub fn add_rule(&mut self, rule: Rule) -> RuleResult<&Rule> {
        let index = match self.position(&rule.rule_id) {
            Some(index) => match self.settings.duplicate_ids {
                DuplicateIdPolicy::Reject => return Err(RuleError::DuplicateId(rule.rule_id)),
                DuplicateIdPolicy::Replace => {
                    self.rules[index] = rule;
                    index
                }
            },
            None => {
                self.rules.push(rule);
                self.rules.len() - 1
            }
        };
        Ok(&self.rules[index])
    }

    pub fn get_rule(&self, rule_id: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.rule_id == rule_id)
    }

    pub fn get_rule_mut(&mut self, rule_id: &str) -> Option<&mut Rule> {
        self.rules.iter_mut().find(|rule| rule.rule_id == rule_id)
    }

    /// Replaces the stored rule with the same id. Returns `false` if none exists.
    pub fn update_rule(&mut self, rule: Rule) -> bool {
        match self.position(&rule.rule_id) {
            Some(index) => {
                self.rules[index] = rule;
                true
            }
            None => false,
        }
    }

    pub fn delete_rule(&mut self, rule_id: &str) -> bool {
        match self.position(rule_id) {
            Some(index) => {
                self.rules.remove(index);
                true
            }
            None => false,
        }
    }

    fn position(&self, rule_id: &str) -> Option<usize> {
        self.rules.iter().position(|rule| rule.rule_id == rule_id)
    }

    /// Rules in storage order.
    pub fn get_all_rules(&self, enabled_only: bool) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|rule| !enabled_only || rule.enabled)
            .collect()
    }

    /// Rules in evaluation order: ascending priority, ties in storage order.
    pub fn get_sorted_rules(&self, enabled_only: bool) -> Vec<&Rule> {
        self.evaluation_order(enabled_only)
            .into_iter()
            .map(|index| &self.rules[index])
            .collect()
    }

    fn evaluation_order(&self, enabled_only: bool) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.rules.len())
            .filter(|&index| !enabled_only || self.rules[index].enabled)
            .collect();
        // `sort_by_key` is stable.
        order.sort_by_key(|&index| self.rules[index].priority());
        order
    }

    /// Finds the first enabled rule, in priority order, that matches `info`
    /// and renders a path. Does not touch any counters.
    pub fn evaluate(&self, info: &FileInfo, base_dir: &Path) -> RuleEvaluation {
        let mut evaluation = RuleEvaluation::default();
        for index in self.evaluation_order(true) {
            let rule = &self.rules[index];
            if !rule.matches(info) {
                continue;
            }
            evaluation.attempted.push(index);
            match rule.generate_target_path(info, base_dir) {
                Some(path) => {
                    debug!(rule_id = %rule.rule_id, file = %info.file_name, target = %path.display(), "rule matched");
                    evaluation.target_path = Some(path);
                    evaluation.rule_id = Some(rule.rule_id.clone());
                    evaluation.winner = Some(index);
                    break;
                }
                None => {
                    debug!(rule_id = %rule.rule_id, file = %info.file_name, "rule matched but produced no path");
                    evaluation.failed_rule_ids.push(rule.rule_id.clone());
                }
            }
        }
        evaluation
    }

    /// Resolves the target path for `info` and updates rule statistics.
    ///
    /// Every rule that matched gets its `application_count` and `last_applied`
    /// bumped, including rules whose template failed before a later rule won;
    /// only the winner's `success_count` increases.
    pub fn apply_rules(&mut self, info: &FileInfo, base_dir: &Path) -> Option<(PathBuf, &Rule)> {
        let evaluation = self.evaluate(info, base_dir);
        let applied_at = now();
        for &index in &evaluation.attempted {
            self.rules[index].record_attempt(applied_at);
        }
        let index = evaluation.winner?;
        let path = evaluation.target_path?;
        self.rules[index].record_success();
        Some((path, &self.rules[index]))
    }

    fn resolve_path(&self, path: Option<&Path>) -> RuleResult<PathBuf> {
        path.or(self.rules_file())
            .map(Path::to_path_buf)
            .ok_or(RuleError::NoRulesFile)
    }

    /// Writes every rule as a pretty-printed JSON list.
    pub fn save_rules(&self, path: Option<&Path>) -> RuleResult<()> {
        let result = self.resolve_path(path).and_then(|path| {
            let json = serde_json::to_string_pretty(&self.rules).map_err(|source| RuleError::Json {
                path: path.clone(),
                source,
            })?;
            fs::write(&path, json).map_err(|source| RuleError::Io { path, source })
        });
        result.inspect_err(|e| error!(error = %e, "failed to save rules"))
    }

    /// Replaces the in-memory rules with the contents of a rules file.
    ///
    /// On any error the current rules are left untouched. Returns the number
    /// of rules loaded.
    pub fn load_rules(&mut self, path: Option<&Path>) -> RuleResult<usize> {
        let loaded = self
            .resolve_path(path)
            .and_then(|path| read_rules(&path))
            .inspect_err(|e| error!(error = %e, "failed to load rules"))?;
        self.rules = self.deduplicate(loaded);
        Ok(self.rules.len())
    }

    fn deduplicate(&self, loaded: Vec<Rule>) -> Vec<Rule> {
        let mut rules: Vec<Rule> = Vec::with_capacity(loaded.len());
        for rule in loaded {
            match rules.iter().position(|kept| kept.rule_id == rule.rule_id) {
                None => rules.push(rule),
                Some(index) => {
                    warn!(rule_id = %rule.rule_id, policy = ?self.settings.duplicate_ids, "duplicate rule id in rules file");
                    if self.settings.duplicate_ids == DuplicateIdPolicy::Replace {
                        rules[index] = rule;
                    }
                }
            }
        }
        rules
    }

    /// Builds a preset rule. The rule is not added to the manager.
    pub fn create_rule_template(template: RuleTemplate) -> Rule {
        let mut rule = Rule::new();
        match template {
            RuleTemplate::DocumentType => {
                rule = rule
                    .named("Document Type Organization")
                    .described("Organize files by document type");
                rule.set_metadata_condition("file_type", "", Operator::Exists)
                    .set_target_path("{file_type}/{file_name}");
            }
            RuleTemplate::Date => {
                rule = rule
                    .named("Date-based Organization")
                    .described("Organize files by year and month");
                rule.set_date_condition("modified_time", DateRange::Unbounded, Operator::Exists)
                    .set_target_path("{year}/{month}/{file_name}");
            }
            RuleTemplate::Category => {
                rule = rule
                    .named("Category-based Organization")
                    .described("Organize files by AI-detected category");
                rule.set_ai_analysis_condition("category", "", Operator::Exists)
                    .set_target_path("{category}/{file_name}");
            }
            RuleTemplate::ImageCamera => {
                rule = rule
                    .named("Camera-based Image Organization")
                    .described("Organize images by camera make and model");
                rule.set_image_condition("dimensions", "", Operator::Exists)
                    .set_target_path("Images/{camera_make}/{year}/{month}/{file_name}");
            }
            RuleTemplate::ImageContent => {
                rule = rule
                    .named("Image Content Organization")
                    .described("Organize images by detected content");
                // `{labels[0]}` is not resolvable by the renderer and yields "Unknown".
                rule.set_image_condition("labels", "", Operator::Exists)
                    .set_target_path("Images/Content/{labels[0]}/{file_name}");
            }
            RuleTemplate::Basic => {
                rule = rule
                    .named("Basic Organization")
                    .described("Basic file organization template");
                rule.set_target_path("{file_type}/{file_name}");
            }
        }
        rule
    }

    /// Derives a rule from a file and the place the user put it.
    ///
    /// The template is `target_path` relative to `base_dir` (when inside it),
    /// with a trailing file name replaced by `{file_name}`. The condition is an
    /// image type check for images, the AI category when one is known, and
    /// the file extension otherwise.
    pub fn create_rule_from_example(info: &FileInfo, target_path: &Path, base_dir: &Path) -> Rule {
        let file_name = if info.file_name.is_empty() {
            "Unknown"
        } else {
            info.file_name.as_str()
        };
        let mut rule = Rule::new().named(format!("Rule for {file_name}"));

        let relative = target_path.strip_prefix(base_dir).unwrap_or(target_path);
        let mut template = relative.to_string_lossy().to_string();
        if !info.file_name.is_empty() && template.ends_with(&info.file_name) {
            template.truncate(template.len() - info.file_name.len());
            template.push_str("{file_name}");
        }
        rule.set_target_path(template);

        if info.is_image() {
            rule.set_metadata_condition("file_type", "Image", Operator::Equals);
        } else if let Some(category) = info.get_field("ai_analysis.category") {
            rule.set_ai_analysis_condition("category", category.into_owned(), Operator::Equals);
        } else {
            let ext = info.file_ext.clone().unwrap_or_default();
            rule.set_metadata_condition("file_ext", Value::String(ext), Operator::Equals);
        }
        rule
    }
}

fn read_rules(path: &Path) -> RuleResult<Vec<Rule>> {
    if !path.exists() {
        return Err(RuleError::NotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(|source| RuleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| RuleError::Json {
        path: path.to_path_buf(),
        source,
    })
}

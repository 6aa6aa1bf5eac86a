//! Organization rules.
//!
//! A [`Rule`] pairs one [`Condition`] with a target path template and the
//! action flags used when the rule fires. Each `set_*_condition` setter
//! replaces the condition wholesale and records the matching [`RuleType`], so
//! the type tag always describes the current condition.
//!
//! ```
//! use rulesort::condition::Operator;
//! use rulesort::file_info::FileInfo;
//! use rulesort::rule::Rule;
//! use std::path::Path;
//!
//! let mut rule = Rule::new();
//! rule.set_name_pattern_condition(r".*\.pdf$", Operator::Regex, false)
//!     .set_target_path("PDFs/{file_name}");
//!
//! let info = FileInfo::new("report.pdf", "/inbox/report.pdf");
//! assert!(rule.matches(&info));
//! let target = rule.generate_target_path(&info, Path::new("/sorted")).unwrap();
//! assert!(target.ends_with("PDFs/report.pdf"));
//! ```

use crate::condition::{Condition, Operator};
use crate::file_info::FileInfo;
use crate::template;
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

pub const DEFAULT_PRIORITY: u32 = 100;
pub const MIN_PRIORITY: u32 = 1;
pub const MAX_PRIORITY: u32 = 1000;

/// Semantic category of a rule's condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    /// File name pattern.
    Pattern,
    /// Extracted text content.
    Content,
    Metadata,
    Date,
    Tag,
    /// AI analysis result.
    Ai,
    /// Image analysis result.
    Image,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Pattern => "pattern",
            RuleType::Content => "content",
            RuleType::Metadata => "metadata",
            RuleType::Date => "date",
            RuleType::Tag => "tag",
            RuleType::Ai => "ai",
            RuleType::Image => "image",
        }
    }
}

/// Date operand(s) for [`Rule::set_date_condition`].
#[derive(Debug, Clone, PartialEq)]
pub enum DateRange {
    /// Start and end, inclusive.
    Between(Value, Value),
    Single(Value),
    Unbounded,
}

impl From<(&str, &str)> for DateRange {
    fn from((start, end): (&str, &str)) -> Self {
        DateRange::Between(Value::from(start), Value::from(end))
    }
}

impl From<(f64, f64)> for DateRange {
    fn from((start, end): (f64, f64)) -> Self {
        DateRange::Between(Value::from(start), Value::from(end))
    }
}

/// A named, prioritized organization rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RuleRecord")]
pub struct Rule {
    pub rule_id: String,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    priority: u32,
    rule_type: Option<RuleType>,
    condition: ConditionSlot,
    pub target_path_template: String,
    /// Copy instead of move.
    pub should_copy: bool,
    /// Write a summary file next to the placed file.
    pub create_summary: bool,
    pub created_time: NaiveDateTime,
    pub modified_time: NaiveDateTime,
    pub last_applied: Option<NaiveDateTime>,
    pub application_count: u64,
    pub success_count: u64,
}

impl Rule {
    /// Creates an enabled rule with a generated id and no condition.
    pub fn new() -> Self {
        Self::with_id(generate_id())
    }

    pub fn with_id(rule_id: impl Into<String>) -> Self {
        let rule_id = rule_id.into();
        let now = now();
        Self {
            name: format!("Rule {rule_id}"),
            rule_id,
            description: String::new(),
            enabled: true,
            priority: DEFAULT_PRIORITY,
            rule_type: None,
            condition: ConditionSlot::Empty,
            target_path_template: String::new(),
            should_copy: true,
            create_summary: false,
            created_time: now,
            modified_time: now,
            last_applied: None,
            application_count: 0,
            success_count: 0,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn rule_type(&self) -> Option<RuleType> {
        self.rule_type
    }

    /// `None` when no condition is set or the stored one could not be read.
    pub fn condition(&self) -> Option<&Condition> {
        match &self.condition {
            ConditionSlot::Parsed(condition) => Some(condition),
            ConditionSlot::Empty | ConditionSlot::Unreadable(_) => None,
        }
    }

    /// Whether the rule was loaded with a condition that does not parse.
    pub fn has_unreadable_condition(&self) -> bool {
        matches!(self.condition, ConditionSlot::Unreadable(_))
    }

    fn set_condition(&mut self, rule_type: RuleType, condition: Condition) -> &mut Self {
        self.rule_type = Some(rule_type);
        self.condition = ConditionSlot::Parsed(condition);
        self.touch()
    }

    fn touch(&mut self) -> &mut Self {
        self.modified_time = now();
        self
    }

    /// Matches `file_name` against `pattern`.
    pub fn set_name_pattern_condition(
        &mut self,
        pattern: impl Into<String>,
        operator: Operator,
        case_sensitive: bool,
    ) -> &mut Self {
        let condition = Condition::new("file_name", operator)
            .with_pattern(pattern)
            .with_case_sensitive(case_sensitive);
        self.set_condition(RuleType::Pattern, condition)
    }

    /// Searches `text_content` for `search_text`.
    pub fn set_content_condition(
        &mut self,
        search_text: impl Into<String>,
        operator: Operator,
        case_sensitive: bool,
    ) -> &mut Self {
        let condition = Condition::new("text_content", operator)
            .with_pattern(search_text)
            .with_case_sensitive(case_sensitive);
        self.set_condition(RuleType::Content, condition)
    }

    /// Compares an arbitrary field path against `value`.
    pub fn set_metadata_condition(
        &mut self,
        field_name: impl Into<String>,
        value: impl Into<Value>,
        operator: Operator,
    ) -> &mut Self {
        let condition = Condition::new(field_name, operator).with_value(value);
        self.set_condition(RuleType::Metadata, condition)
    }

    /// A `Between` operator with a two-sided range stores start/end bounds;
    /// every other combination stores the range as the comparison value.
    pub fn set_date_condition(
        &mut self,
        date_field: impl Into<String>,
        date_range: impl Into<DateRange>,
        operator: Operator,
    ) -> &mut Self {
        let condition = Condition::new(date_field, operator);
        let condition = match (date_range.into(), operator) {
            (DateRange::Between(start, end), Operator::Between) => {
                condition.with_range(Some(start), Some(end))
            }
            (DateRange::Between(start, end), _) => condition.with_value(vec![start, end]),
            (DateRange::Single(value), _) => condition.with_value(value),
            (DateRange::Unbounded, _) => condition,
        };
        self.set_condition(RuleType::Date, condition)
    }

    /// Checks the `tags` list.
    pub fn set_tag_condition(&mut self, tag_name: impl Into<String>, operator: Operator) -> &mut Self {
        let tag: String = tag_name.into();
        let condition = Condition::new("tags", operator).with_value(tag);
        self.set_condition(RuleType::Tag, condition)
    }

    /// Checks `ai_analysis.<ai_field>`.
    pub fn set_ai_analysis_condition(
        &mut self,
        ai_field: &str,
        value: impl Into<Value>,
        operator: Operator,
    ) -> &mut Self {
        let condition = Condition::new(format!("ai_analysis.{ai_field}"), operator).with_value(value);
        self.set_condition(RuleType::Ai, condition)
    }

    /// Checks `image_analysis.<image_field>`.
    pub fn set_image_condition(
        &mut self,
        image_field: &str,
        value: impl Into<Value>,
        operator: Operator,
    ) -> &mut Self {
        let condition =
            Condition::new(format!("image_analysis.{image_field}"), operator).with_value(value);
        self.set_condition(RuleType::Image, condition)
    }

    pub fn set_target_path(&mut self, path_template: impl Into<String>) -> &mut Self {
        self.target_path_template = path_template.into();
        self.touch()
    }

    /// Lower values are evaluated first; clamped to `1..=1000`.
    pub fn set_priority(&mut self, priority: i64) -> &mut Self {
        self.priority = clamp_priority(priority);
        self.touch()
    }

    /// `None` leaves the corresponding flag unchanged.
    pub fn set_options(&mut self, should_copy: Option<bool>, create_summary: Option<bool>) -> &mut Self {
        if let Some(should_copy) = should_copy {
            self.should_copy = should_copy;
        }
        if let Some(create_summary) = create_summary {
            self.create_summary = create_summary;
        }
        self.touch()
    }

    pub fn set_enabled(&mut self, enabled: bool) -> &mut Self {
        self.enabled = enabled;
        self.touch()
    }

    /// Whether this rule fires for `info`.
    ///
    /// Disabled rules and rules without a usable condition never match. A
    /// condition that fails to evaluate is logged and treated as a non-match.
    pub fn matches(&self, info: &FileInfo) -> bool {
        if !self.enabled {
            return false;
        }
        let condition = match &self.condition {
            ConditionSlot::Parsed(condition) => condition,
            ConditionSlot::Empty => return false,
            ConditionSlot::Unreadable(_) => {
                debug!(rule_id = %self.rule_id, "skipping rule with unreadable condition");
                return false;
            }
        };
        match condition.evaluate(info) {
            Ok(matched) => matched,
            Err(error) => {
                warn!(rule_id = %self.rule_id, field = %condition.field, %error, "rule condition failed to evaluate");
                false
            }
        }
    }

    /// Renders the template for `info` under `base_dir`.
    ///
    /// `None` when no template is set or rendering fails (logged).
    pub fn generate_target_path(&self, info: &FileInfo, base_dir: &Path) -> Option<PathBuf> {
        if self.target_path_template.is_empty() {
            return None;
        }
        match template::target_path(&self.target_path_template, info, base_dir) {
            Ok(path) => Some(path),
            Err(error) => {
                warn!(rule_id = %self.rule_id, template = %self.target_path_template, %error, "failed to render target path");
                None
            }
        }
    }

    pub(crate) fn record_attempt(&mut self, at: NaiveDateTime) {
        self.application_count += 1;
        self.last_applied = Some(at);
    }

    pub(crate) fn record_success(&mut self) {
        self.success_count += 1;
    }
}

impl Default for Rule {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn generate_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("rule_{}", &hex[..8])
}

fn clamp_priority(priority: i64) -> u32 {
    priority.clamp(MIN_PRIORITY as i64, MAX_PRIORITY as i64) as u32
}

/// Stored condition of a rule. A persisted condition that does not parse is
/// kept verbatim so saving the rules file does not rewrite it.
#[derive(Debug, Clone, PartialEq)]
enum ConditionSlot {
    Empty,
    Parsed(Condition),
    Unreadable(Value),
}

/// An empty slot is persisted as `{}`.
impl Serialize for ConditionSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ConditionSlot::Empty => serde_json::Map::new().serialize(serializer),
            ConditionSlot::Parsed(condition) => condition.serialize(serializer),
            ConditionSlot::Unreadable(raw) => raw.serialize(serializer),
        }
    }
}

/// Persisted form of a rule; every key is optional and falls back to the
/// constructor default.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RuleRecord {
    rule_id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    enabled: Option<bool>,
    priority: Option<i64>,
    rule_type: Option<RuleType>,
    condition: Option<Value>,
    target_path_template: Option<String>,
    should_copy: Option<bool>,
    create_summary: Option<bool>,
    created_time: Option<NaiveDateTime>,
    modified_time: Option<NaiveDateTime>,
    last_applied: Option<NaiveDateTime>,
    application_count: Option<u64>,
    success_count: Option<u64>,
}

impl From<RuleRecord> for Rule {
    fn from(record: RuleRecord) -> Self {
        let mut rule = match record.rule_id.filter(|id| !id.is_empty()) {
            Some(id) => Rule::with_id(id),
            None => Rule::new(),
        };
        if let Some(name) = record.name.filter(|name| !name.is_empty()) {
            rule.name = name;
        }
        rule.description = record.description.unwrap_or_default();
        rule.enabled = record.enabled.unwrap_or(true);
        rule.priority = record.priority.map_or(DEFAULT_PRIORITY, clamp_priority);
        rule.rule_type = record.rule_type;
        rule.condition = match record.condition {
            None | Some(Value::Null) => ConditionSlot::Empty,
            Some(Value::Object(map)) if map.is_empty() => ConditionSlot::Empty,
            Some(raw) => match Condition::deserialize(&raw) {
                Ok(condition) => ConditionSlot::Parsed(condition),
                Err(error) => {
                    warn!(rule_id = %rule.rule_id, %error, "unreadable rule condition, rule will never match");
                    ConditionSlot::Unreadable(raw)
                }
            },
        };
        rule.target_path_template = record.target_path_template.unwrap_or_default();
        rule.should_copy = record.should_copy.unwrap_or(true);
        rule.create_summary = record.create_summary.unwrap_or(false);
        if let Some(created) = record.created_time {
            rule.created_time = created;
        }
        if let Some(modified) = record.modified_time {
            rule.modified_time = modified;
        }
        rule.last_applied = record.last_applied;
        rule.application_count = record.application_count.unwrap_or(0);
        rule.success_count = record.success_count.unwrap_or(0);
        rule
    }
}

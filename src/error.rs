//! Error types for rule evaluation, persistence, organization and configuration.
//!
//! Evaluation errors (`ConditionError`, `TemplateError`) never escape the rule
//! engine: `Rule::matches` and `Rule::generate_target_path` log them and degrade
//! to "no match" / "no path". The remaining errors are returned to callers.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while evaluating a single condition against a file record.
#[derive(Debug, Error)]
pub enum ConditionError {
    /// The condition's regular expression does not compile.
    #[error("invalid regex pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    /// A comparison operand is neither a number nor a recognizable date.
    #[error("operand {operand} cannot be compared numerically")]
    NotComparable { operand: String },
    /// The operator needs an operand the condition does not carry.
    #[error("operator '{operator}' requires a '{operand}' operand")]
    MissingOperand {
        operator: &'static str,
        operand: &'static str,
    },
}

/// Failure while rendering a target path template.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("timestamp {0} is outside the representable date range")]
    TimestampOutOfRange(f64),
}

/// Errors raised by the rule manager.
#[derive(Debug, Error)]
pub enum RuleError {
    /// A rule with this id is already stored and the policy rejects duplicates.
    #[error("a rule with id '{0}' already exists")]
    DuplicateId(String),
    /// No path argument was given and the manager has no default rules file.
    #[error("no rules file configured")]
    NoRulesFile,
    #[error("rules file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("I/O error on rules file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid rules file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for rule manager operations.
pub type RuleResult<T> = Result<T, RuleError>;

/// Errors that can occur while placing files or handling history.
#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to {action} {} to {}: {source}", from.display(), to.display())]
    TransferFailed {
        action: &'static str,
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid base path {}: {source}", path.display())]
    InvalidBasePath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read history file: {0}")]
    HistoryReadFailed(#[source] std::io::Error),
    #[error("invalid history file format: {0}")]
    InvalidHistoryFormat(String),
    #[error("no previous organization found to undo")]
    NoHistory,
}

/// Result type for file organization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Errors that can occur during configuration loading and filter compilation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] toml::de::Error),
    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("invalid regex pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("I/O error reading configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error for CLI commands.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Rules(#[from] RuleError),
    #[error(transparent)]
    Organize(#[from] OrganizeError),
    #[error("cannot read directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot read file records from {}: {reason}", path.display())]
    Records { path: PathBuf, reason: String },
    #[error("no rule with id '{0}'")]
    UnknownRule(String),
}

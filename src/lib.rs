//! rulesort - rule-based file classification and organization
//!
//! Files are described by [`FileInfo`] records. A [`RuleManager`] holds
//! prioritized [`Rule`]s, each pairing a [`Condition`] with a target path
//! template; the first matching rule decides where a file goes. The
//! organizer and undo modules carry out and revert those placements, and the
//! `rulesort` binary wires everything to a command line.
//!
//! ```
//! use rulesort::{FileInfo, Operator, Rule, RuleManager};
//! use std::path::{Path, PathBuf};
//!
//! let mut manager = RuleManager::default();
//! let mut pdfs = Rule::new().named("PDFs");
//! pdfs.set_name_pattern_condition(r"\.pdf$", Operator::Regex, false)
//!     .set_target_path("Documents/PDF/{file_name}")
//!     .set_priority(10);
//! manager.add_rule(pdfs).unwrap();
//!
//! let info = FileInfo::new("report.PDF", "/inbox/report.PDF");
//! let (target, rule) = manager.apply_rules(&info, Path::new("/archive")).unwrap();
//! assert_eq!(target, PathBuf::from("/archive/Documents/PDF/report.PDF"));
//! assert_eq!(rule.success_count, 1);
//! ```

pub mod cli;
pub mod condition;
pub mod config;
pub mod error;
pub mod file_category;
pub mod file_info;
pub mod file_organizer;
pub mod logging;
pub mod output;
pub mod rule;
pub mod rule_manager;
pub mod template;
pub mod undo;

pub use condition::{Condition, Operator};
pub use config::{AppConfig, ScanFilters};
pub use error::{AppError, ConditionError, ConfigError, OrganizeError, RuleError, TemplateError};
pub use file_category::{Category, FileMapper};
pub use file_info::FileInfo;
pub use file_organizer::{ConflictPolicy, FileOrganizer, Operation, OperationLog};
pub use rule::{Rule, RuleType};
pub use rule_manager::{DuplicateIdPolicy, RuleEvaluation, RuleManager, RuleSettings, RuleTemplate};
pub use undo::{UndoManager, UndoReport};

//! TOML configuration.
//!
//! Looked up in order: an explicit `--config` path, `./.rulesortrc.toml`,
//! `~/.config/rulesort/config.toml`, then built-in defaults. Every key is
//! optional.
//!
//! ```toml
//! [rules]
//! file = "rules.json"
//! duplicate_ids = "reject"      # reject | replace
//!
//! [organize]
//! fallback_to_category = true
//! conflict = "rename"           # rename | skip | overwrite
//! max_text_bytes = 1048576
//!
//! [scan]
//! include_hidden = false
//! exclude_filenames = [".DS_Store", "Thumbs.db"]
//! exclude_extensions = ["tmp"]
//! exclude_patterns = ["*.part"]
//! exclude_regex = []
//!
//! [logging]
//! level = "warn"
//! ```

use crate::error::ConfigError;
use crate::file_organizer::ConflictPolicy;
use crate::rule_manager::{DuplicateIdPolicy, RuleSettings};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

const LOCAL_CONFIG: &str = ".rulesortrc.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rules: RulesSection,
    pub organize: OrganizeSection,
    pub scan: ScanSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesSection {
    /// Default rules file, used when no `--rules` flag is given.
    pub file: Option<PathBuf>,
    pub duplicate_ids: DuplicateIdPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizeSection {
    /// Send files no rule claims into their category directory.
    pub fallback_to_category: bool,
    pub conflict: ConflictPolicy,
    /// Upper bound on `text_content` read per file while scanning.
    pub max_text_bytes: u64,
}

impl Default for OrganizeSection {
    fn default() -> Self {
        Self {
            fallback_to_category: true,
            conflict: ConflictPolicy::Rename,
            max_text_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSection {
    pub include_hidden: bool,
    pub exclude_filenames: Vec<String>,
    /// Extensions without the dot, matched case-insensitively.
    pub exclude_extensions: Vec<String>,
    /// Glob patterns matched against the path.
    pub exclude_patterns: Vec<String>,
    /// Regular expressions matched against the file name.
    pub exclude_regex: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `tracing` filter directive; `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads the first configuration found, or defaults.
    ///
    /// # Errors
    ///
    /// Fails if an explicit `config_path` is missing, or if any file that is
    /// found cannot be read or parsed.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("rulesort")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Settings for a [`RuleManager`](crate::rule_manager::RuleManager).
    /// `rules_override` (the `--rules` flag) wins over `[rules] file`.
    pub fn rule_settings(&self, rules_override: Option<&Path>) -> RuleSettings {
        RuleSettings {
            rules_file: rules_override
                .map(Path::to_path_buf)
                .or_else(|| self.rules.file.clone()),
            duplicate_ids: self.rules.duplicate_ids,
        }
    }
}

impl ScanSection {
    /// # Errors
    ///
    /// Returns an error if any glob or regex pattern is invalid.
    pub fn compile(&self) -> Result<ScanFilters, ConfigError> {
        let exclude_patterns = self
            .exclude_patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|source| ConfigError::InvalidGlob {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let exclude_regexes = self
            .exclude_regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::InvalidRegex {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ScanFilters {
            include_hidden: self.include_hidden,
            exclude_filenames: self.exclude_filenames.iter().cloned().collect(),
            exclude_extensions: self
                .exclude_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns,
            exclude_regexes,
        })
    }
}

/// Pre-compiled `[scan]` filters.
#[derive(Debug, Default)]
pub struct ScanFilters {
    include_hidden: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
}

impl ScanFilters {
    /// Whether a scanned file should be organized.
    ///
    /// Checks hidden files, then exact names, extensions, glob patterns and
    /// finally regexes; the first hit excludes the file.
    pub fn should_include(&self, file_path: &Path) -> bool {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if !self.include_hidden && file_name.starts_with('.') {
            return false;
        }
        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }
        if let Some(ext) = file_path.extension()
            && self
                .exclude_extensions
                .contains(&ext.to_string_lossy().to_lowercase())
        {
            return false;
        }
        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(file_path))
        {
            return false;
        }
        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn filters(scan: ScanSection) -> ScanFilters {
        scan.compile().expect("filters compile")
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.organize.fallback_to_category);
        assert_eq!(config.organize.conflict, ConflictPolicy::Rename);
        assert_eq!(config.organize.max_text_bytes, 1_048_576);
        assert_eq!(config.rules.duplicate_ids, DuplicateIdPolicy::Reject);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [rules]
            file = "my_rules.json"
            duplicate_ids = "replace"

            [organize]
            conflict = "skip"
            "#,
        )
        .unwrap();
        assert_eq!(config.rules.file, Some(PathBuf::from("my_rules.json")));
        assert_eq!(config.rules.duplicate_ids, DuplicateIdPolicy::Replace);
        assert_eq!(config.organize.conflict, ConflictPolicy::Skip);
        assert!(config.organize.fallback_to_category);
    }

    #[test]
    fn test_rule_settings_override() {
        let mut config = AppConfig::default();
        config.rules.file = Some(PathBuf::from("configured.json"));
        assert_eq!(
            config.rule_settings(None).rules_file,
            Some(PathBuf::from("configured.json"))
        );
        assert_eq!(
            config.rule_settings(Some(Path::new("flag.json"))).rules_file,
            Some(PathBuf::from("flag.json"))
        );
    }

    #[test]
    fn test_load_explicit_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let result = AppConfig::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_invalid_toml_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[organize]\nconflict = \"explode\"\n").unwrap();
        assert!(matches!(
            AppConfig::load(Some(&path)),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_hidden_files_excluded_by_default() {
        let filters = filters(ScanSection::default());
        assert!(!filters.should_include(Path::new(".DS_Store")));
        assert!(filters.should_include(Path::new("photo.jpg")));

        let filters = ScanFilters::default();
        assert!(!filters.should_include(Path::new(".hidden")));
    }

    #[test]
    fn test_exclusions() {
        let filters = filters(ScanSection {
            include_hidden: true,
            exclude_filenames: vec!["Thumbs.db".to_string()],
            exclude_extensions: vec![".TMP".to_string(), "bak".to_string()],
            exclude_patterns: vec!["**/cache/**".to_string()],
            exclude_regex: vec![r"^~\$".to_string()],
        });
        assert!(filters.should_include(Path::new(".env")));
        assert!(!filters.should_include(Path::new("Thumbs.db")));
        assert!(!filters.should_include(Path::new("x.tmp")));
        assert!(!filters.should_include(Path::new("x.BAK")));
        assert!(!filters.should_include(Path::new("app/cache/data.bin")));
        assert!(filters.should_include(Path::new("app/my_cache/data.bin")));
        assert!(!filters.should_include(Path::new("~$report.docx")));
        assert!(filters.should_include(Path::new("report.docx")));
    }

    #[test]
    fn test_invalid_patterns_are_errors() {
        let bad_glob = ScanSection {
            exclude_patterns: vec!["[invalid".to_string()],
            ..Default::default()
        };
        assert!(matches!(bad_glob.compile(), Err(ConfigError::InvalidGlob { .. })));

        let bad_regex = ScanSection {
            exclude_regex: vec!["[invalid(".to_string()],
            ..Default::default()
        };
        assert!(matches!(bad_regex.compile(), Err(ConfigError::InvalidRegex { .. })));
    }
}

/// Integration tests for rulesort
///
/// These tests drive the command workflows end to end on temporary
/// directories: organizing with a rules file, dry runs, fallbacks, copies with
/// summaries, undo, record resolution and rules-file management.
use chrono::{Datelike, Local};
use rulesort::cli::{
    OrganizeOptions, RulesCommand, run_organize, run_resolve, run_rules, run_undo,
};
use rulesort::config::AppConfig;
use rulesort::error::{AppError, RuleError};
use rulesort::file_organizer::{ConflictPolicy, HISTORY_FILE_NAME};
use rulesort::rule_manager::{RuleManager, RuleSettings, RuleTemplate};
use rulesort::{Operator, Rule};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A temporary directory to organize plus a separate one for the rules file.
struct TestFixture {
    temp_dir: TempDir,
    rules_dir: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        TestFixture {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
            rules_dir: TempDir::new().expect("Failed to create rules directory"),
        }
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    fn rules_path(&self) -> PathBuf {
        self.rules_dir.path().join("rules.json")
    }

    fn create_file(&self, name: &str, content: &[u8]) {
        let file_path = self.path().join(name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        let mut file = File::create(&file_path).expect("Failed to create file");
        file.write_all(content)
            .expect("Failed to write file content");
    }

    fn create_text_file(&self, name: &str, content: &str) {
        self.create_file(name, content.as_bytes());
    }

    /// Writes `rules` to the fixture's rules file.
    fn write_rules(&self, rules: Vec<Rule>) {
        let mut manager = RuleManager::new(self.settings());
        for rule in rules {
            manager.add_rule(rule).expect("Failed to add rule");
        }
        manager.save_rules(None).expect("Failed to save rules");
    }

    fn load_rules(&self) -> RuleManager {
        RuleManager::open(self.settings()).expect("Failed to load rules")
    }

    fn settings(&self) -> RuleSettings {
        RuleSettings {
            rules_file: Some(self.rules_path()),
            ..Default::default()
        }
    }

    fn options(&self) -> OrganizeOptions {
        OrganizeOptions {
            rules: Some(self.rules_path()),
            ..Default::default()
        }
    }

    fn assert_file_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(
            path.exists() && path.is_file(),
            "File should exist: {}",
            path.display()
        );
    }

    fn assert_file_not_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(!path.exists(), "File should not exist: {}", path.display());
    }

    /// All files below the directory, relative and sorted, history excluded.
    fn list_files_recursive(&self) -> Vec<String> {
        let mut files = Vec::new();
        Self::walk_dir(self.path(), self.path(), &mut files);
        files.sort();
        files
    }

    fn walk_dir(root: &Path, dir: &Path, files: &mut Vec<String>) {
        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    Self::walk_dir(root, &path, files);
                } else if path.file_name().is_some_and(|n| n != HISTORY_FILE_NAME) {
                    let relative = path.strip_prefix(root).expect("path under root");
                    files.push(relative.to_string_lossy().replace('\\', "/"));
                }
            }
        }
    }
}

// ============================================================================
// Test Data
// ============================================================================

/// PNG file header (minimal, just enough to be detected as PNG)
const PNG_HEADER: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
    0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR chunk
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, // 1x1 image
    0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53, // bit depth, color
    0xDE,
];

/// PDF file header (minimal)
const PDF_HEADER: &[u8] = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n";

fn pdf_rule() -> Rule {
    let mut rule = Rule::with_id("rule_pdf00001").named("PDFs");
    rule.set_name_pattern_condition(r"\.pdf$", Operator::Regex, false)
        .set_target_path("Documents/PDF/{file_name}")
        .set_priority(10)
        .set_options(Some(false), None);
    rule
}

fn invoice_rule() -> Rule {
    let mut rule = Rule::with_id("rule_inv00001").named("Invoices");
    rule.set_content_condition("invoice", Operator::Contains, false)
        .set_target_path("Finance/{file_name}")
        .set_priority(20)
        .set_options(Some(false), None);
    rule
}

// ============================================================================
// Test Suite 1: Organizing with rules
// ============================================================================

#[test]
fn test_organize_empty_directory() {
    let fixture = TestFixture::new();

    let report = run_organize(fixture.path(), &fixture.options(), &AppConfig::default())
        .expect("Should succeed on empty directory");

    assert_eq!(report.placed, 0);
    fixture.assert_file_not_exists(HISTORY_FILE_NAME);
}

#[test]
fn test_organize_rules_then_category_fallback() {
    let fixture = TestFixture::new();
    fixture.write_rules(vec![pdf_rule(), invoice_rule()]);
    fixture.create_file("report.pdf", PDF_HEADER);
    fixture.create_text_file("march.txt", "Invoice #42, amount due");
    fixture.create_text_file("notes.txt", "shopping list");
    fixture.create_file("photo.png", PNG_HEADER);

    let report = run_organize(fixture.path(), &fixture.options(), &AppConfig::default())
        .expect("Organize failed");

    assert_eq!(report.placed, 4);
    assert_eq!(report.failed, 0);
    assert_eq!(
        fixture.list_files_recursive(),
        vec![
            "Documents/PDF/report.pdf",
            "Finance/march.txt",
            "documents/notes.txt",
            "images/photo.png",
        ]
    );
    assert_eq!(report.destinations.get("PDFs"), Some(&1));
    assert_eq!(report.destinations.get("images/"), Some(&1));
    fixture.assert_file_exists(HISTORY_FILE_NAME);
}

#[test]
fn test_organize_updates_rule_statistics() {
    let fixture = TestFixture::new();
    fixture.write_rules(vec![pdf_rule(), invoice_rule()]);
    fixture.create_file("a.pdf", PDF_HEADER);
    fixture.create_file("b.pdf", PDF_HEADER);

    run_organize(fixture.path(), &fixture.options(), &AppConfig::default())
        .expect("Organize failed");

    let manager = fixture.load_rules();
    let pdf = manager.get_rule("rule_pdf00001").expect("rule kept");
    assert_eq!(pdf.application_count, 2);
    assert_eq!(pdf.success_count, 2);
    assert!(pdf.last_applied.is_some());
    assert_eq!(manager.get_rule("rule_inv00001").unwrap().application_count, 0);
}

#[test]
fn test_organize_priority_decides_between_matching_rules() {
    let fixture = TestFixture::new();
    let mut text_files = Rule::with_id("rule_txt00001").named("Text");
    text_files
        .set_metadata_condition("file_ext", ".txt", Operator::Equals)
        .set_target_path("Text/{file_name}")
        .set_priority(50)
        .set_options(Some(false), None);
    // Registered first but evaluated second.
    fixture.write_rules(vec![text_files, invoice_rule()]);
    fixture.create_text_file("bill.txt", "INVOICE");
    fixture.create_text_file("notes.txt", "plain");

    run_organize(fixture.path(), &fixture.options(), &AppConfig::default())
        .expect("Organize failed");

    fixture.assert_file_exists("Finance/bill.txt");
    fixture.assert_file_exists("Text/notes.txt");
}

#[test]
fn test_organize_into_separate_target() {
    let fixture = TestFixture::new();
    let target = TempDir::new().expect("Failed to create target directory");
    fixture.write_rules(vec![pdf_rule()]);
    fixture.create_file("report.pdf", PDF_HEADER);

    let options = OrganizeOptions {
        target: Some(target.path().to_path_buf()),
        ..fixture.options()
    };
    run_organize(fixture.path(), &options, &AppConfig::default()).expect("Organize failed");

    assert!(target.path().join("Documents/PDF/report.pdf").exists());
    fixture.assert_file_not_exists("report.pdf");
    // History lives with the scanned directory.
    fixture.assert_file_exists(HISTORY_FILE_NAME);
}

#[test]
fn test_organize_date_template() {
    let fixture = TestFixture::new();
    let mut by_date = RuleManager::create_rule_template(RuleTemplate::Date);
    by_date.set_priority(1);
    fixture.write_rules(vec![by_date]);
    fixture.create_text_file("diary.txt", "dear diary");

    run_organize(fixture.path(), &fixture.options(), &AppConfig::default())
        .expect("Organize failed");

    let now = Local::now();
    fixture.assert_file_exists(&format!("{}/{:02}/diary.txt", now.year(), now.month()));
}

// ============================================================================
// Test Suite 2: Dry run and fallback configuration
// ============================================================================

#[test]
fn test_dry_run_changes_nothing() {
    let fixture = TestFixture::new();
    fixture.write_rules(vec![pdf_rule()]);
    fixture.create_file("report.pdf", PDF_HEADER);
    fixture.create_text_file("notes.txt", "plain");

    let options = OrganizeOptions {
        dry_run: true,
        ..fixture.options()
    };
    let report = run_organize(fixture.path(), &options, &AppConfig::default())
        .expect("Dry run failed");

    assert_eq!(report.placed, 0);
    assert_eq!(report.destinations.get("PDFs"), Some(&1));
    assert_eq!(report.destinations.get("documents/"), Some(&1));
    assert_eq!(fixture.list_files_recursive(), vec!["notes.txt", "report.pdf"]);
    fixture.assert_file_not_exists(HISTORY_FILE_NAME);
    assert_eq!(
        fixture.load_rules().get_rule("rule_pdf00001").unwrap().application_count,
        0
    );
}

#[test]
fn test_without_fallback_unmatched_files_stay() {
    let fixture = TestFixture::new();
    fixture.write_rules(vec![pdf_rule()]);
    fixture.create_file("report.pdf", PDF_HEADER);
    fixture.create_text_file("notes.txt", "plain");

    let mut config = AppConfig::default();
    config.organize.fallback_to_category = false;
    let report = run_organize(fixture.path(), &fixture.options(), &config)
        .expect("Organize failed");

    assert_eq!(report.placed, 1);
    assert_eq!(report.unmatched, 1);
    fixture.assert_file_exists("notes.txt");
}

#[test]
fn test_no_rules_file_uses_fallback_only() {
    let fixture = TestFixture::new();
    fixture.create_file("photo.png", PNG_HEADER);

    let report = run_organize(fixture.path(), &OrganizeOptions::default(), &AppConfig::default())
        .expect("Organize failed");

    assert_eq!(report.placed, 1);
    fixture.assert_file_exists("images/photo.png");
}

// ============================================================================
// Test Suite 3: Scan filters
// ============================================================================

#[test]
fn test_scan_filters_and_special_files_are_left_alone() {
    let fixture = TestFixture::new();
    fixture.create_text_file(".hidden", "secret");
    fixture.create_text_file("draft.tmp", "scratch");
    fixture.create_text_file("notes.txt", "plain");
    fixture.create_text_file("nested/inner.txt", "not scanned");

    let mut config = AppConfig::default();
    config.scan.exclude_extensions = vec!["tmp".to_string()];
    run_organize(fixture.path(), &OrganizeOptions::default(), &config).expect("Organize failed");

    assert_eq!(
        fixture.list_files_recursive(),
        vec![".hidden", "documents/notes.txt", "draft.tmp", "nested/inner.txt"]
    );
}

#[test]
fn test_rules_file_inside_directory_is_not_organized() {
    let fixture = TestFixture::new();
    let rules_path = fixture.path().join("rules.json");
    let mut manager = RuleManager::new(RuleSettings {
        rules_file: Some(rules_path.clone()),
        ..Default::default()
    });
    manager.add_rule(pdf_rule()).unwrap();
    manager.save_rules(None).unwrap();

    let options = OrganizeOptions {
        rules: Some(rules_path),
        ..Default::default()
    };
    run_organize(fixture.path(), &options, &AppConfig::default()).expect("Organize failed");

    fixture.assert_file_exists("rules.json");
}

#[test]
fn test_invalid_scan_pattern_is_an_error() {
    let fixture = TestFixture::new();
    let mut config = AppConfig::default();
    config.scan.exclude_regex = vec!["[unclosed(".to_string()];

    let result = run_organize(fixture.path(), &OrganizeOptions::default(), &config);
    assert!(matches!(result, Err(AppError::Config(_))));
}

// ============================================================================
// Test Suite 4: Conflicts, copies and summaries
// ============================================================================

#[test]
fn test_conflict_rename_and_skip() {
    let fixture = TestFixture::new();
    fixture.write_rules(vec![pdf_rule()]);
    fixture.create_file("Documents/PDF/report.pdf", b"already here");
    fixture.create_file("report.pdf", PDF_HEADER);

    run_organize(fixture.path(), &fixture.options(), &AppConfig::default())
        .expect("Organize failed");
    fixture.assert_file_exists("Documents/PDF/report_1.pdf");

    fixture.create_file("report.pdf", PDF_HEADER);
    let options = OrganizeOptions {
        conflict: Some(ConflictPolicy::Skip),
        ..fixture.options()
    };
    let report =
        run_organize(fixture.path(), &options, &AppConfig::default()).expect("Organize failed");
    assert_eq!(report.skipped, 1);
    fixture.assert_file_exists("report.pdf");
}

#[test]
fn test_copy_rule_with_summary_then_undo() {
    let fixture = TestFixture::new();
    let mut rule = Rule::with_id("rule_copy0001").named("Copies");
    rule.set_metadata_condition("file_ext", ".txt", Operator::Equals)
        .set_target_path("Copies/{file_name}")
        .set_options(Some(true), Some(true));
    fixture.write_rules(vec![rule]);
    fixture.create_text_file("notes.txt", "remember the milk");

    run_organize(fixture.path(), &fixture.options(), &AppConfig::default())
        .expect("Organize failed");

    fixture.assert_file_exists("notes.txt");
    fixture.assert_file_exists("Copies/notes.txt");
    fixture.assert_file_exists("Copies/notes_summary.txt");
    let summary = fs::read_to_string(fixture.path().join("Copies/notes_summary.txt")).unwrap();
    assert!(summary.contains("No summary available for this file."));

    let report = run_undo(fixture.path()).expect("Undo failed");
    assert_eq!(report.removed_files, 2);
    assert_eq!(fixture.list_files_recursive(), vec!["notes.txt"]);
}

// ============================================================================
// Test Suite 5: Undo
// ============================================================================

#[test]
fn test_organize_then_undo_restores_everything() {
    let fixture = TestFixture::new();
    fixture.write_rules(vec![pdf_rule()]);
    fixture.create_file("report.pdf", PDF_HEADER);
    fixture.create_file("photo.png", PNG_HEADER);
    fixture.create_text_file("notes.txt", "plain");

    run_organize(fixture.path(), &fixture.options(), &AppConfig::default())
        .expect("Organize failed");
    let report = run_undo(fixture.path()).expect("Undo failed");

    assert_eq!(report.restored_files, 3);
    assert!(report.is_complete_success());
    fixture.assert_file_exists("report.pdf");
    fixture.assert_file_exists("photo.png");
    fixture.assert_file_exists("notes.txt");
    fixture.assert_file_not_exists(HISTORY_FILE_NAME);
}

#[test]
fn test_undo_without_history_fails() {
    let fixture = TestFixture::new();
    assert!(run_undo(fixture.path()).is_err());
}

// ============================================================================
// Test Suite 6: Resolving analyzed records
// ============================================================================

#[test]
fn test_resolve_records_without_touching_statistics() {
    let fixture = TestFixture::new();
    let mut by_category = RuleManager::create_rule_template(RuleTemplate::Category);
    by_category.set_priority(10);
    let id = by_category.rule_id.clone();
    let mut no_target = Rule::with_id("rule_notarget");
    no_target
        .set_metadata_condition("file_name", "", Operator::Exists)
        .set_priority(1);
    fixture.write_rules(vec![by_category, no_target]);

    let records = fixture.rules_dir.path().join("records.json");
    fs::write(
        &records,
        r#"[
            {"file_name": "lease.pdf", "file_path": "/in/lease.pdf",
             "ai_analysis": {"category": "Legal/Contracts"}},
            {"file_name": "song.mp3", "file_path": "/in/song.mp3"}
        ]"#,
    )
    .unwrap();

    let resolutions =
        run_resolve(&records, Path::new("/archive"), fixture.settings()).expect("Resolve failed");

    assert_eq!(resolutions.len(), 2);
    assert_eq!(
        resolutions[0].target_path,
        Some(PathBuf::from("/archive/Legal_Contracts/lease.pdf"))
    );
    assert_eq!(resolutions[0].rule_id.as_deref(), Some(id.as_str()));
    assert_eq!(resolutions[0].failed_rule_ids, vec!["rule_notarget"]);
    assert_eq!(resolutions[1].target_path, None);
    assert_eq!(resolutions[1].failed_rule_ids, vec!["rule_notarget"]);
    assert_eq!(fixture.load_rules().get_rule(&id).unwrap().application_count, 0);
}

#[test]
fn test_resolve_rejects_malformed_records() {
    let fixture = TestFixture::new();
    let records = fixture.rules_dir.path().join("records.json");
    fs::write(&records, "{\"file_name\": \"not a list\"}").unwrap();

    let result = run_resolve(&records, Path::new("/archive"), RuleSettings::default());
    assert!(matches!(result, Err(AppError::Records { .. })));
}

// ============================================================================
// Test Suite 7: Managing the rules file
// ============================================================================

#[test]
fn test_rules_add_template_disable_remove() {
    let fixture = TestFixture::new();

    run_rules(
        RulesCommand::AddTemplate {
            kind: "document_type".to_string(),
            name: Some("By type".to_string()),
            priority: Some(5),
        },
        fixture.settings(),
    )
    .expect("add-template failed");

    let manager = fixture.load_rules();
    assert_eq!(manager.len(), 1);
    let rule = &manager.rules()[0];
    assert_eq!(rule.name, "By type");
    assert_eq!(rule.priority(), 5);
    let id = rule.rule_id.clone();

    run_rules(RulesCommand::Disable { id: id.clone() }, fixture.settings()).expect("disable failed");
    assert!(!fixture.load_rules().get_rule(&id).unwrap().enabled);

    run_rules(RulesCommand::Enable { id: id.clone() }, fixture.settings()).expect("enable failed");
    assert!(fixture.load_rules().get_rule(&id).unwrap().enabled);

    run_rules(RulesCommand::List, fixture.settings()).expect("list failed");

    run_rules(RulesCommand::Remove { id: id.clone() }, fixture.settings()).expect("remove failed");
    assert!(fixture.load_rules().is_empty());
}

#[test]
fn test_rules_unknown_id_and_missing_file() {
    let fixture = TestFixture::new();
    fixture.write_rules(vec![pdf_rule()]);

    let result = run_rules(
        RulesCommand::Remove {
            id: "rule_nothere".to_string(),
        },
        fixture.settings(),
    );
    assert!(matches!(result, Err(AppError::UnknownRule(id)) if id == "rule_nothere"));

    let result = run_rules(RulesCommand::List, RuleSettings::default());
    assert!(matches!(result, Err(AppError::Rules(RuleError::NoRulesFile))));
}

#[test]
fn test_rules_unknown_template_falls_back_to_basic() {
    let fixture = TestFixture::new();
    run_rules(
        RulesCommand::AddTemplate {
            kind: "mystery".to_string(),
            name: None,
            priority: None,
        },
        fixture.settings(),
    )
    .expect("add-template failed");

    assert_eq!(fixture.load_rules().rules()[0].name, "Basic Organization");
}

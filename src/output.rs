//! Terminal output for the command line.
//!
//! Everything the user is meant to read goes through [`OutputFormatter`];
//! diagnostics go through `tracing` instead.

use crate::rule::Rule;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::Path;

pub struct OutputFormatter;

impl OutputFormatter {
    /// ```no_run
    /// use rulesort::output::OutputFormatter;
    /// OutputFormatter::success("Rules saved");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Progress bar for a run over `total` files.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb
    }

    /// One line per file: where it goes and which rule sent it there.
    pub fn placement(file_name: &str, target: &Path, reason: &str) {
        println!(
            " - {} {} {} {}",
            file_name,
            "→".cyan(),
            target.display(),
            format!("({})", reason).dimmed()
        );
    }

    pub fn unmatched(file_name: &str) {
        println!(" - {} {}", file_name, "(no matching rule)".dimmed());
    }

    /// Table of rules in evaluation order.
    pub fn rules_table(rules: &[&Rule]) {
        if rules.is_empty() {
            Self::info("No rules defined.");
            return;
        }
        let name_width = rules
            .iter()
            .map(|rule| rule.name.chars().count())
            .max()
            .unwrap_or(0)
            .max(4);

        println!(
            "{:<13} {:>8} {:<8} {:<name_width$} {}",
            "ID".bold(),
            "Priority".bold(),
            "Type".bold(),
            "Name".bold(),
            "Target".bold(),
        );
        for rule in rules {
            let id = if rule.enabled {
                rule.rule_id.normal()
            } else {
                rule.rule_id.dimmed()
            };
            let rule_type = rule.rule_type().map(|t| t.as_str()).unwrap_or("-");
            println!(
                "{:<13} {:>8} {:<8} {:<name_width$} {}",
                id,
                rule.priority(),
                rule_type,
                rule.name,
                rule.target_path_template,
            );
            if rule.application_count > 0 {
                println!(
                    "{:<13} {}",
                    "",
                    format!(
                        "applied {} times, {} successful",
                        rule.application_count, rule.success_count
                    )
                    .dimmed()
                );
            }
        }
    }

    /// Placed-file counts by destination.
    ///
    /// ```no_run
    /// use rulesort::output::OutputFormatter;
    /// use std::collections::HashMap;
    ///
    /// let mut counts = HashMap::new();
    /// counts.insert("Invoices".to_string(), 15);
    /// counts.insert("images".to_string(), 8);
    /// OutputFormatter::summary_table(&counts, 23);
    /// ```
    pub fn summary_table(counts: &HashMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let mut rows: Vec<_> = counts.iter().collect();
        rows.sort_by_key(|&(name, _)| name);

        let width = rows
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0)
            .max(11);

        println!(
            "{:<width$} | {}",
            "Destination".bold(),
            "Files".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));
        for (name, count) in &rows {
            println!(
                "{:<width$} | {} {}",
                name,
                count.to_string().green(),
                plural(**count),
                width = width
            );
        }
        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files),
            width = width
        );
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

//! Target path templates.
//!
//! A template is a relative path with `{placeholder}` tokens, for example
//! `"Images/{camera_make}/{year}/{month}/{file_name}"`. Tokens are single-level
//! (no nesting, no indexing) and resolve against a [`FileInfo`]:
//!
//! | token          | source                                   | fallback          |
//! |----------------|------------------------------------------|-------------------|
//! | `year`         | `modified_time`, local time              | epoch             |
//! | `month`, `day` | `modified_time`, zero-padded             | epoch             |
//! | `file_type`    | `file_type`                              | `Unknown`         |
//! | `category`     | `ai_analysis.category`                   | `Uncategorized`   |
//! | `camera_make`  | `metadata.camera_make`                   | `Unknown`         |
//! | anything else  | dot-path lookup of the token itself      | `Unknown`         |

use crate::error::TemplateError;
use crate::file_info::FileInfo;
use chrono::{DateTime, Datelike, Local};
use regex::Regex;
use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]+)\}").expect("placeholder regex is valid"));

const UNKNOWN: &str = "Unknown";
const UNCATEGORIZED: &str = "Uncategorized";

/// Substitutes every placeholder in `template`.
pub fn render(template: &str, info: &FileInfo) -> Result<String, TemplateError> {
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        rendered.push_str(&template[last..whole.start()]);
        rendered.push_str(&resolve(name.as_str(), info)?);
        last = whole.end();
    }
    rendered.push_str(&template[last..]);
    Ok(rendered)
}

fn resolve(name: &str, info: &FileInfo) -> Result<String, TemplateError> {
    let text = match name {
        "year" => modified_local(info)?.year().to_string(),
        "month" => format!("{:02}", modified_local(info)?.month()),
        "day" => format!("{:02}", modified_local(info)?.day()),
        "file_type" => sanitize(&non_empty(info.file_type.clone()).unwrap_or_else(|| UNKNOWN.into())),
        "category" => sanitize(
            &non_empty(info.get_str("ai_analysis.category"))
                .unwrap_or_else(|| UNCATEGORIZED.into()),
        ),
        "camera_make" => sanitize(
            &non_empty(info.get_str("metadata.camera_make")).unwrap_or_else(|| UNKNOWN.into()),
        ),
        path => match info.get_field(path).as_deref() {
            Some(Value::String(s)) => sanitize(s),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(true)) => "True".to_string(),
            Some(Value::Bool(false)) => "False".to_string(),
            _ => UNKNOWN.to_string(),
        },
    };
    Ok(text)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn modified_local(info: &FileInfo) -> Result<DateTime<Local>, TemplateError> {
    let timestamp = info.modified_time.unwrap_or(0.0);
    if !timestamp.is_finite() {
        return Err(TemplateError::TimestampOutOfRange(timestamp));
    }
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1e9) as u32;
    DateTime::from_timestamp(secs as i64, nanos)
        .map(|utc| utc.with_timezone(&Local))
        .ok_or(TemplateError::TimestampOutOfRange(timestamp))
}

/// Replaces characters that cannot appear in a path segment with `_`.
/// A value of `.` or `..` becomes `_` so it cannot climb out of the base.
pub fn sanitize(value: &str) -> String {
    if value == "." || value == ".." {
        return "_".to_string();
    }
    value
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .collect()
}

/// Lexically resolves `.` and `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}

/// Renders `template` and joins it onto `base_dir`.
pub fn target_path(template: &str, info: &FileInfo, base_dir: &Path) -> Result<PathBuf, TemplateError> {
    let relative = render(template, info)?;
    Ok(normalize(&base_dir.join(relative)))
}

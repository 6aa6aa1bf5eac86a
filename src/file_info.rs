//! The file record consumed by the rule engine.
//!
//! A [`FileInfo`] carries flat identity fields (name, path, extension, type,
//! timestamps, extracted text) plus optional nested sections filled in by
//! external analyzers. Rules address any of it with dot-separated paths such as
//! `"ai_analysis.category"` or `"metadata.camera_make"`.
//!
//! Lookup keeps "absent" and "present but empty" apart: a missing section, a
//! missing key at any level, or a JSON `null` all resolve to `None`, while an
//! empty string or empty list is returned as a value.

use crate::file_category::{Category, FileMapper};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Extensions whose content is read into `text_content` while scanning.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "csv", "tsv", "html", "htm", "json", "xml", "yaml", "yml", "toml",
    "log", "rst", "ini",
];

/// One file's identity, metadata and analysis results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileInfo {
    pub file_name: String,
    pub file_path: String,
    /// Lowercase extension including the leading dot (`".pdf"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_ext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    /// Unix timestamp in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<f64>,
    /// Unix timestamp in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_analysis: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Any other top-level field (`is_image`, `file_size`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FileInfo {
    /// Creates a record with just a name and path; everything else absent.
    pub fn new(file_name: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            file_path: file_path.into(),
            ..Default::default()
        }
    }

    /// Resolves a dot-separated field path.
    ///
    /// Returns `None` when any segment is missing, when a segment would have to
    /// descend into a non-mapping value, or when the resolved value is `null`.
    ///
    /// ```
    /// use rulesort::file_info::FileInfo;
    /// use serde_json::json;
    ///
    /// let mut info = FileInfo::new("a.jpg", "/in/a.jpg");
    /// info.metadata = Some(json!({"camera_make": "Canon"}).as_object().unwrap().clone());
    /// assert_eq!(info.get_field("metadata.camera_make").unwrap().as_str(), Some("Canon"));
    /// assert!(info.get_field("metadata.lens").is_none());
    /// assert!(info.get_field("ai_analysis.category").is_none());
    /// ```
    pub fn get_field(&self, path: &str) -> Option<Cow<'_, Value>> {
        if path.is_empty() {
            return None;
        }
        let mut segments = path.split('.');
        let head = segments.next()?;
        let rest: Vec<&str> = segments.collect();

        let root: Cow<'_, Value> = match head {
            "file_name" => Cow::Owned(Value::String(self.file_name.clone())),
            "file_path" => Cow::Owned(Value::String(self.file_path.clone())),
            "file_ext" => Cow::Owned(Value::String(self.file_ext.clone()?)),
            "file_type" => Cow::Owned(Value::String(self.file_type.clone()?)),
            "text_content" => Cow::Owned(Value::String(self.text_content.clone()?)),
            "modified_time" => Cow::Owned(Value::Number(Number::from_f64(self.modified_time?)?)),
            "created_time" => Cow::Owned(Value::Number(Number::from_f64(self.created_time?)?)),
            "tags" => Cow::Owned(Value::Array(
                self.tags
                    .as_ref()?
                    .iter()
                    .cloned()
                    .map(Value::String)
                    .collect(),
            )),
            "metadata" => return section(self.metadata.as_ref()?, &rest),
            "ai_analysis" => return section(self.ai_analysis.as_ref()?, &rest),
            "image_analysis" => return section(self.image_analysis.as_ref()?, &rest),
            other => {
                let value = self.extra.get(other)?;
                return walk(value, &rest).map(Cow::Borrowed);
            }
        };

        // Flat fields are scalars or lists; only a bare name resolves.
        if rest.is_empty() && !root.is_null() {
            Some(root)
        } else {
            None
        }
    }

    /// String-valued lookup; `None` for absent or non-string values.
    pub fn get_str(&self, path: &str) -> Option<String> {
        match self.get_field(path)?.as_ref() {
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Whether a top-level `is_image` flag is set to `true`.
    pub fn is_image(&self) -> bool {
        matches!(self.extra.get("is_image"), Some(Value::Bool(true)))
    }

    /// Builds a record from a file on disk.
    ///
    /// Detects the MIME type from content (falling back to the extension),
    /// records size and MIME type under `metadata`, reads up to
    /// `max_text_bytes` of text for text-like extensions, and sets `is_image`.
    /// AI and image analysis sections are left absent for external analyzers.
    pub fn from_path(path: &Path, mapper: &FileMapper, max_text_bytes: u64) -> io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase());

        let mime_type = infer::get_from_path(path)?.map(|kind| kind.mime_type().to_string());
        let category = mapper.categorize(mime_type.as_deref(), extension.as_deref());

        let mut metadata = Map::new();
        metadata.insert("size".to_string(), Value::from(meta.len()));
        if let Some(mime) = &mime_type {
            metadata.insert("mime_type".to_string(), Value::String(mime.clone()));
        }

        let is_text = extension
            .as_deref()
            .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext));
        let text_content = if is_text && max_text_bytes > 0 {
            let mut bytes = Vec::new();
            File::open(path)?.take(max_text_bytes).read_to_end(&mut bytes)?;
            Some(String::from_utf8_lossy(&bytes).into_owned())
        } else {
            None
        };

        let mut extra = Map::new();
        extra.insert(
            "is_image".to_string(),
            Value::Bool(category == Category::Image),
        );

        Ok(Self {
            file_name,
            file_path: path.to_string_lossy().to_string(),
            file_ext: extension.map(|ext| format!(".{ext}")),
            file_type: Some(category.label().to_string()),
            modified_time: meta.modified().ok().and_then(unix_seconds),
            created_time: meta.created().ok().and_then(unix_seconds),
            text_content,
            metadata: Some(metadata),
            ai_analysis: None,
            image_analysis: None,
            tags: None,
            extra,
        })
    }
}

fn section<'a>(map: &'a Map<String, Value>, rest: &[&str]) -> Option<Cow<'a, Value>> {
    match rest.split_first() {
        None => Some(Cow::Owned(Value::Object(map.clone()))),
        Some((first, tail)) => walk(map.get(*first)?, tail).map(Cow::Borrowed),
    }
}

fn walk<'a>(mut value: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    for segment in segments {
        value = value.as_object()?.get(*segment)?;
    }
    if value.is_null() { None } else { Some(value) }
}

fn unix_seconds(time: SystemTime) -> Option<f64> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs_f64())
}

//! Coarse file categories derived from MIME type or extension.
//!
//! The category feeds two places: the `file_type` field of a scanned
//! [`FileInfo`](crate::file_info::FileInfo), and the fallback directory used
//! when no organization rule claims a file.
//!
//! ```
//! use rulesort::file_category::{Category, FileMapper};
//!
//! let mapper = FileMapper::default();
//! assert_eq!(mapper.categorize(Some("image/png"), None), Category::Image);
//! assert_eq!(mapper.categorize(None, Some("PDF")), Category::Document);
//! assert_eq!(Category::Spreadsheet.label(), "Spreadsheet");
//! ```
use std::collections::HashMap;

/// Broad file category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Image,
    Audio,
    Video,
    Document,
    Archive,
    Code,
    Spreadsheet,
    Presentation,
    Font,
    Other,
}

impl Category {
    /// Fallback directory name for unmatched files of this category.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Image => "images",
            Category::Audio => "audio",
            Category::Video => "videos",
            Category::Document => "documents",
            Category::Archive => "archives",
            Category::Code => "code",
            Category::Spreadsheet => "spreadsheets",
            Category::Presentation => "presentations",
            Category::Font => "fonts",
            Category::Other => "other",
        }
    }

    /// Value stored in `FileInfo::file_type` and rendered by `{file_type}`.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Image => "Image",
            Category::Audio => "Audio",
            Category::Video => "Video",
            Category::Document => "Document",
            Category::Archive => "Archive",
            Category::Code => "Code",
            Category::Spreadsheet => "Spreadsheet",
            Category::Presentation => "Presentation",
            Category::Font => "Font",
            Category::Other => "Other",
        }
    }

    /// Inverse of [`label`](Self::label).
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.label() == label)
    }

    pub const ALL: [Category; 10] = [
        Category::Image,
        Category::Audio,
        Category::Video,
        Category::Document,
        Category::Archive,
        Category::Code,
        Category::Spreadsheet,
        Category::Presentation,
        Category::Font,
        Category::Other,
    ];
}

const MIME_TABLE: &[(&str, Category)] = &[
    ("application/pdf", Category::Document),
    ("application/msword", Category::Document),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Category::Document,
    ),
    ("application/rtf", Category::Document),
    ("application/vnd.oasis.opendocument.text", Category::Document),
    ("text/plain", Category::Document),
    ("text/html", Category::Document),
    ("text/markdown", Category::Document),
    ("application/zip", Category::Archive),
    ("application/x-rar-compressed", Category::Archive),
    ("application/vnd.rar", Category::Archive),
    ("application/x-7z-compressed", Category::Archive),
    ("application/x-tar", Category::Archive),
    ("application/gzip", Category::Archive),
    ("application/x-bzip2", Category::Archive),
    ("application/x-xz", Category::Archive),
    ("application/json", Category::Code),
    ("application/xml", Category::Code),
    ("application/javascript", Category::Code),
    ("text/xml", Category::Code),
    ("text/x-python", Category::Code),
    ("text/x-rust", Category::Code),
    ("text/x-shellscript", Category::Code),
    ("text/csv", Category::Spreadsheet),
    ("application/vnd.ms-excel", Category::Spreadsheet),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Category::Spreadsheet,
    ),
    ("application/vnd.oasis.opendocument.spreadsheet", Category::Spreadsheet),
    ("application/vnd.ms-powerpoint", Category::Presentation),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        Category::Presentation,
    ),
    ("application/vnd.oasis.opendocument.presentation", Category::Presentation),
    ("application/font-woff", Category::Font),
    ("application/x-font-ttf", Category::Font),
    ("application/x-font-otf", Category::Font),
];

const EXTENSION_TABLE: &[(&[&str], Category)] = &[
    (
        &["png", "jpg", "jpeg", "gif", "webp", "svg", "bmp", "tiff", "ico", "heic"],
        Category::Image,
    ),
    (&["mp3", "wav", "ogg", "flac", "aac", "m4a", "wma"], Category::Audio),
    (&["mp4", "mkv", "avi", "mov", "flv", "wmv", "webm", "3gp"], Category::Video),
    (
        &["pdf", "txt", "doc", "docx", "html", "htm", "md", "rtf", "odt"],
        Category::Document,
    ),
    (&["zip", "rar", "7z", "tar", "gz", "bz2", "xz"], Category::Archive),
    (
        &[
            "py", "java", "c", "cpp", "h", "hpp", "js", "ts", "rs", "go", "sh", "bash", "json",
            "xml", "yaml", "yml", "toml",
        ],
        Category::Code,
    ),
    (&["csv", "xls", "xlsx", "ods"], Category::Spreadsheet),
    (&["ppt", "pptx", "odp"], Category::Presentation),
    (&["ttf", "otf", "woff", "woff2"], Category::Font),
];

/// Maps MIME types and file extensions to categories.
#[derive(Debug, Clone)]
pub struct FileMapper {
    mime_map: HashMap<String, Category>,
    extension_map: HashMap<String, Category>,
}

impl FileMapper {
    pub fn new() -> Self {
        let mime_map = MIME_TABLE
            .iter()
            .map(|(mime, category)| (mime.to_string(), *category))
            .collect();
        let extension_map = EXTENSION_TABLE
            .iter()
            .flat_map(|(exts, category)| exts.iter().map(|ext| (ext.to_string(), *category)))
            .collect();
        Self {
            mime_map,
            extension_map,
        }
    }

    /// Registers or overrides an extension mapping (case-insensitive, no leading dot).
    pub fn add_extension_mapping(&mut self, ext: &str, category: Category) {
        self.extension_map
            .insert(ext.trim_start_matches('.').to_lowercase(), category);
    }

    /// Exact MIME lookup, then the top-level media type (`image/*`, `audio/*`, `video/*`, `font/*`).
    pub fn mime_to_category(&self, mime_type: &str) -> Option<Category> {
        let mime = mime_type.to_lowercase();
        if let Some(category) = self.mime_map.get(&mime) {
            return Some(*category);
        }
        match mime.split('/').next() {
            Some("image") => Some(Category::Image),
            Some("audio") => Some(Category::Audio),
            Some("video") => Some(Category::Video),
            Some("font") => Some(Category::Font),
            _ => None,
        }
    }

    /// Accepts extensions with or without the leading dot.
    pub fn extension_to_category(&self, ext: &str) -> Option<Category> {
        self.extension_map
            .get(&ext.trim_start_matches('.').to_lowercase())
            .copied()
    }

    /// MIME type first, extension second, `Category::Other` otherwise.
    pub fn categorize(&self, mime_type: Option<&str>, ext: Option<&str>) -> Category {
        mime_type
            .and_then(|mime| self.mime_to_category(mime))
            .or_else(|| ext.and_then(|ext| self.extension_to_category(ext)))
            .unwrap_or(Category::Other)
    }
}

impl Default for FileMapper {
    fn default() -> Self {
        Self::new()
    }
}

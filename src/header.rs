//! Bundle header: a short comment block stamped on top of every bundle.

use chrono::{DateTime, Local};
use serde_json::Value;
use std::path::Path;

const NO_DESCRIPTION: &str = "No description";
const NO_AUTHOR: &str = "No author";

/// Project metadata, as found in a `package.json`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectMeta {
    pub description: Option<String>,
    pub author: Option<String>,
}

impl ProjectMeta {
    /// Pull `description` and `author` out of a parsed JSON document.
    /// `author` may be a bare string or an object with a `name` field.
    pub fn from_json(doc: &Value) -> Self {
        let description = doc
            .get("description")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let author = match doc.get("author") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Object(obj)) => obj
                .get("name")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            _ => None,
        };

        ProjectMeta { description, author }
    }

    /// Read metadata from a JSON file. A missing or unreadable file yields
    /// empty metadata.
    pub fn load(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(doc) => Self::from_json(&doc),
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Timestamp in the classic `Date#toString` shape,
/// e.g. `Mon Oct 19 2026 14:30:01 GMT+0200`.
pub fn format_timestamp(at: &DateTime<Local>) -> String {
    at.format("%a %b %d %Y %H:%M:%S GMT%z").to_string()
}

/// The four header lines, without comment delimiters.
fn header_lines(meta: &ProjectMeta, at: &DateTime<Local>) -> [String; 3] {
    [
        format!("@Compiled: {}.", format_timestamp(at)),
        format!(
            "@Description: {}",
            meta.description.as_deref().unwrap_or(NO_DESCRIPTION)
        ),
        format!("@Author: {}", meta.author.as_deref().unwrap_or(NO_AUTHOR)),
    ]
}

/// Header for CSS and JS bundles.
pub fn script_header(meta: &ProjectMeta, at: &DateTime<Local>) -> String {
    let mut out = String::from("/*!\n");
    for line in header_lines(meta, at) {
        out.push_str(" * ");
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str(" */\r\n");
    out
}

/// Same block rendered as an HTML comment.
pub fn markup_header(meta: &ProjectMeta, at: &DateTime<Local>) -> String {
    let mut out = String::from("<!--\n");
    for line in header_lines(meta, at) {
        out.push_str(" - ");
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str("-->\r\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 2, 9, 14, 30, 1).unwrap()
    }

    #[test]
    fn author_object_uses_name() {
        let meta = ProjectMeta::from_json(&json!({
            "description": "Space scene",
            "author": { "name": "Jane Doe", "email": "jane@example.com" }
        }));
        assert_eq!(meta.description.as_deref(), Some("Space scene"));
        assert_eq!(meta.author.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn author_string_is_taken_verbatim() {
        let meta = ProjectMeta::from_json(&json!({ "author": "Jane Doe <jane@example.com>" }));
        assert_eq!(meta.author.as_deref(), Some("Jane Doe <jane@example.com>"));
    }

    #[test]
    fn missing_fields_fall_back_to_placeholders() {
        let meta = ProjectMeta::from_json(&json!({ "name": "x" }));
        let header = script_header(&meta, &fixed_time());
        assert!(header.contains(" * @Description: No description\n"));
        assert!(header.contains(" * @Author: No author\n"));
    }

    #[test]
    fn script_header_layout() {
        let meta = ProjectMeta {
            description: Some("Demo".into()),
            author: Some("Me".into()),
        };
        let header = script_header(&meta, &fixed_time());
        let lines: Vec<&str> = header.split('\n').collect();
        assert_eq!(lines[0], "/*!");
        assert!(lines[1].starts_with(" * @Compiled: Mon Feb 09 2026 14:30:01 GMT"));
        assert!(lines[1].ends_with('.'));
        assert_eq!(lines[2], " * @Description: Demo");
        assert_eq!(lines[3], " * @Author: Me");
        assert_eq!(lines[4], " */\r");
    }

    #[test]
    fn markup_header_is_an_html_comment() {
        let header = markup_header(&ProjectMeta::default(), &fixed_time());
        assert!(header.starts_with("<!--\n"));
        assert!(header.ends_with("-->\r\n"));
        assert!(header.contains("\n - @Author: No author\n"));
    }

    #[test]
    fn load_missing_file_is_empty() {
        let meta = ProjectMeta::load(Path::new("/nonexistent/package.json"));
        assert_eq!(meta, ProjectMeta::default());
    }
}

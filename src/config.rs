//! Build file: `hotbundle.json`, the declarative way to configure a builder.
//!
//! ```jsonc
//! {
//!   // dev server base path and port
//!   "server": { "base": "./", "port": 8888 },
//!   "output": "./dist",
//!   "package": "./package.json",
//!   "watch": ["./src/scss/*.scss", "./src/js/*.js"],
//!   "css":  ["./src/scss/styles.scss"],
//!   "js":   ["./src/js/Device.js", "./src/js/Stage.js"],
//!   "html": [],
//!   "img":  [],
//! }
//! ```
//!
//! Comments and trailing commas are accepted.

use crate::builder::Builder;
use crate::header::ProjectMeta;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Looked up in the working directory when no file is given explicitly.
pub const DEFAULT_BUILD_FILE: &str = "hotbundle.json";

/// Looked up in the working directory when the build file names none.
pub const DEFAULT_PACKAGE_FILE: &str = "package.json";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default)]
    pub base: String,
    pub port: Option<u16>,
    pub host: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BuildFile {
    pub server: Option<ServerSection>,
    pub output: Option<String>,
    pub package: Option<String>,
    #[serde(default)]
    pub watch: Vec<String>,
    #[serde(default)]
    pub css: Vec<String>,
    #[serde(default)]
    pub js: Vec<String>,
    #[serde(default)]
    pub html: Vec<String>,
    #[serde(default)]
    pub img: Vec<String>,
}

impl BuildFile {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(&strip_jsonc(content))?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Load `path` if given, otherwise [`DEFAULT_BUILD_FILE`] from `dir` when present.
    pub fn discover(path: Option<&Path>, dir: &Path) -> Result<Option<Self>> {
        match path {
            Some(p) => Self::load(p).map(Some),
            None => {
                let default = dir.join(DEFAULT_BUILD_FILE);
                if default.is_file() {
                    Self::load(&default).map(Some)
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Package metadata path, resolved against `dir`.
    pub fn package_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.package.as_deref().unwrap_or(DEFAULT_PACKAGE_FILE))
    }

    /// Push every setting into `builder`, in file order.
    pub fn apply(&self, builder: &mut Builder, dir: &Path) {
        if let Some(server) = &self.server {
            builder.setup_server(&server.base, server.port);
            if let Some(host) = &server.host {
                builder.set_host(host);
            }
        }
        if let Some(output) = &self.output {
            builder.set_output_path(output);
        }
        builder.set_project_meta(ProjectMeta::load(&self.package_path(dir)));

        self.watch.iter().for_each(|p| builder.watch_files(p));
        self.css.iter().for_each(|p| builder.bundle_css(p));
        self.js.iter().for_each(|p| builder.bundle_js(p));
        self.html.iter().for_each(|p| builder.bundle_html(p));
        self.img.iter().for_each(|p| builder.bundle_img(p));
    }
}

/// Strip `//` and `/* */` comments and trailing commas, leaving strings alone.
pub fn strip_jsonc(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                _ if escape => escape = false,
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        let next = chars.peek().copied();
        match (c, next) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                // Keep the newline so line numbers in errors still line up
                for nc in chars.by_ref() {
                    if nc == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                while let Some(nc) = chars.next() {
                    if nc == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => out.push(c),
        }
    }

    drop_trailing_commas(&out)
}

/// A comma followed only by whitespace and then `}` or `]` is dropped.
fn drop_trailing_commas(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escape = false;

    for (i, c) in input.char_indices() {
        if in_string {
            match c {
                _ if escape => escape = false,
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
        } else if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = input[i + 1..].chars().find(|n| !n.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        result.push(c);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_comments_and_trailing_commas() {
        let input = r#"{
            // line comment
            "output": "./dist", /* block */
            "css": ["a.scss", "b.scss",],
        }"#;
        let cleaned = strip_jsonc(input);
        let value: serde_json::Value = serde_json::from_str(&cleaned).unwrap();
        assert_eq!(value["output"], "./dist");
        assert_eq!(value["css"][1], "b.scss");
    }

    #[test]
    fn comment_markers_inside_strings_survive() {
        let input = r#"{ "watch": ["src/**/*.js", "http://x//y"], "s": "a,]" }"#;
        let value: serde_json::Value = serde_json::from_str(&strip_jsonc(input)).unwrap();
        assert_eq!(value["watch"][0], "src/**/*.js");
        assert_eq!(value["watch"][1], "http://x//y");
        assert_eq!(value["s"], "a,]");
    }

    #[test]
    fn parse_full_build_file() {
        let file = BuildFile::parse(
            r#"{
                "server": { "base": "./", "port": 3000 },
                "output": "./dist",
                "watch": ["./src/scss/*.scss"],
                "css": ["./src/scss/styles.scss", "./src/scss/fontello.scss"],
                "js": ["./src/js/Device.js"],
            }"#,
        )
        .unwrap();
        assert_eq!(
            file.server,
            Some(ServerSection {
                base: "./".into(),
                port: Some(3000),
                host: None
            })
        );
        assert_eq!(file.css.len(), 2);
        assert!(file.html.is_empty());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(BuildFile::parse(r#"{ "stylez": [] }"#).is_err());
    }

    #[test]
    fn apply_registers_inputs() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("package.json"),
            r#"{ "description": "Scene", "author": { "name": "Ann" } }"#,
        )
        .unwrap();
        let file = BuildFile::parse(
            r#"{ "output": "dist", "css": ["a.scss", "a.scss"], "img": ["x.png"], "watch": ["src/*"] }"#,
        )
        .unwrap();

        let mut builder = Builder::with_root(tmp.path());
        file.apply(&mut builder, tmp.path());

        assert_eq!(builder.files(), ["a.scss", "x.png"]);
        assert_eq!(builder.registry().watch_list(), ["src/*"]);
        assert_eq!(builder.output_path(), Some(Path::new("dist")));
    }

    #[test]
    fn discover_without_file_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(BuildFile::discover(None, tmp.path()).unwrap().is_none());
    }
}

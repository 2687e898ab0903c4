//! Per-category build chains.
//!
//! Each chain reads its inputs in list order, runs the category's stages over
//! every source, concatenates the results behind a generated header and
//! writes the bundle under `<output>/<subdir>/`. Images are copied as-is.

pub mod script;
pub mod style;

use crate::error::{BuildError, BuildResult};
use crate::header::{self, ProjectMeta};
use crate::registry::AssetCategory;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Base name of every bundle (`bundle.min.css`, `bundle.min.js`, ...).
pub const OUTPUT_NAME: &str = "bundle.min";

/// Placed between concatenated sources.
pub const SEPARATOR: &str = "\r\n\r\n";

/// An input file held in memory while it moves through a chain.
#[derive(Debug, Clone)]
pub struct Source {
    pub path: PathBuf,
    pub contents: String,
}

impl Source {
    pub fn read(path: &Path) -> BuildResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        Ok(Source {
            path: path.to_path_buf(),
            contents,
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Read listed inputs in order. Paths that don't exist are skipped.
fn read_sources(files: &[String]) -> BuildResult<Vec<Source>> {
    let mut sources = Vec::with_capacity(files.len());
    for file in files {
        let path = Path::new(file);
        if !path.exists() {
            tracing::warn!("Input not found, skipping: {}", file);
            continue;
        }
        sources.push(Source::read(path)?);
    }
    Ok(sources)
}

/// Remove every tab, carriage return and newline.
pub fn strip_line_breaks(s: &str) -> String {
    s.chars().filter(|c| !matches!(c, '\t' | '\r' | '\n')).collect()
}

fn tag(name: &str, body: &str) -> String {
    format!("/* Source: {} */ \r\n{}", name, body)
}

/// Style chain for one source. The tag carries the compiled (`.css`) name.
fn style_chunk(source: &Source) -> BuildResult<String> {
    let css = style::transform(source)?;
    let name = Path::new(&source.file_name())
        .with_extension("css")
        .display()
        .to_string();
    Ok(tag(&name, &strip_line_breaks(&css)))
}

fn script_chunk(source: &Source) -> BuildResult<String> {
    let js = script::minify(source)?;
    Ok(tag(&source.file_name(), &strip_line_breaks(&js)))
}

/// Build the text of a bundle for a text category.
///
/// Returns `Ok(None)` when nothing is left to bundle, e.g. every input was
/// missing or a Sass partial.
pub fn bundle_text(
    category: AssetCategory,
    files: &[String],
    meta: &ProjectMeta,
    at: &DateTime<Local>,
) -> BuildResult<Option<String>> {
    let sources = read_sources(files)?;

    let chunks = match category {
        AssetCategory::Style => sources
            .iter()
            .filter(|s| !style::is_partial(&s.path))
            .map(style_chunk)
            .collect::<BuildResult<Vec<_>>>()?,
        AssetCategory::Script => sources
            .iter()
            .map(script_chunk)
            .collect::<BuildResult<Vec<_>>>()?,
        AssetCategory::Markup => sources.into_iter().map(|s| s.contents).collect(),
        AssetCategory::Image => return Ok(None),
    };

    if chunks.is_empty() {
        return Ok(None);
    }

    let head = match category {
        AssetCategory::Markup => header::markup_header(meta, at),
        _ => header::script_header(meta, at),
    };
    Ok(Some(format!("{}{}", head, chunks.join(SEPARATOR))))
}

fn write_file(path: &Path, contents: &[u8]) -> BuildResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }
    std::fs::write(path, contents).map_err(|e| BuildError::io(path, e))
}

/// Copy images into `dir`, keeping their file names.
fn copy_images(files: &[String], dir: &Path) -> BuildResult<Vec<PathBuf>> {
    let mut written = Vec::new();
    for file in files {
        let src = Path::new(file);
        let Some(name) = src.file_name() else { continue };
        if !src.is_file() {
            tracing::warn!("Input not found, skipping: {}", file);
            continue;
        }
        std::fs::create_dir_all(dir).map_err(|e| BuildError::io(dir, e))?;
        let dest = dir.join(name);
        // Copying a file onto itself truncates it.
        if !same_file(src, &dest) {
            std::fs::copy(src, &dest).map_err(|e| BuildError::io(src, e))?;
        }
        written.push(dest);
    }
    Ok(written)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Run the whole chain for `category` and return the paths written.
pub fn run(
    category: AssetCategory,
    files: &[String],
    output: &Path,
    meta: &ProjectMeta,
) -> BuildResult<Vec<PathBuf>> {
    let dir = output.join(category.subdir());

    let Some(ext) = category.extension() else {
        return copy_images(files, &dir);
    };

    match bundle_text(category, files, meta, &Local::now())? {
        Some(text) => {
            let dest = dir.join(format!("{}.{}", OUTPUT_NAME, ext));
            write_file(&dest, text.as_bytes())?;
            Ok(vec![dest])
        }
        None => Ok(Vec::new()),
    }
}

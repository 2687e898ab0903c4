//! Style stages: Sass → CSS, vendor prefixes, minification.

use super::Source;
use crate::error::{BuildError, BuildResult};
use grass::InputSyntax;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use std::path::Path;
use std::sync::OnceLock;

/// Browsers the prefixer targets.
pub const BROWSER_TARGETS: &[&str] = &[
    "last 2 versions",
    "> 1%",
    "opera 12.1",
    "bb 10",
    "android 4",
];

/// Used only if the full query is rejected by the browserslist resolver.
const FALLBACK_TARGETS: &[&str] = &["last 2 versions", "> 1%"];

/// Sass partials (`_name.scss`) are only ever pulled in through `@use`/`@import`.
pub fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

fn input_syntax(path: &Path) -> InputSyntax {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("sass") => InputSyntax::Sass,
        Some(ext) if ext.eq_ignore_ascii_case("css") => InputSyntax::Css,
        _ => InputSyntax::Scss,
    }
}

/// Compile a Sass/SCSS/CSS source. Imports resolve relative to the file.
pub fn compile(source: &Source) -> BuildResult<String> {
    let dir = source.path.parent().unwrap_or_else(|| Path::new("."));
    let options = grass::Options::default()
        .load_path(dir)
        .input_syntax(input_syntax(&source.path));

    grass::from_string(source.contents.clone(), &options).map_err(|e| BuildError::Sass {
        path: source.path.clone(),
        message: e.to_string(),
    })
}

fn targets() -> Targets {
    static TARGETS: OnceLock<Targets> = OnceLock::new();
    *TARGETS.get_or_init(|| {
        let browsers = match Browsers::from_browserslist(BROWSER_TARGETS.iter().copied()) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("Browser query rejected ({}), using {:?}", e, FALLBACK_TARGETS);
                Browsers::from_browserslist(FALLBACK_TARGETS.iter().copied())
                    .ok()
                    .flatten()
            }
        };
        browsers.map(Targets::from).unwrap_or_default()
    })
}

/// Add vendor prefixes and minify compiled CSS. Comments are dropped.
pub fn prefix_and_minify(css: &str, path: &Path) -> BuildResult<String> {
    let css_error = |message: String| BuildError::Css {
        path: path.to_path_buf(),
        message,
    };
    let targets = targets();

    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: path.display().to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| css_error(e.to_string()))?;

    // Vendor prefixes are only added by this pass. It also merges adjacent
    // rules that share a selector, so the output is not a 1:1 rule mapping.
    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| css_error(e.to_string()))?;

    let out = sheet
        .to_css(PrinterOptions {
            minify: true,
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| css_error(e.to_string()))?;

    Ok(out.code)
}

/// Full style chain for one source, before tagging.
pub fn transform(source: &Source) -> BuildResult<String> {
    let css = compile(source)?;
    prefix_and_minify(&css, &source.path)
}

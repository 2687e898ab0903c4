//! Input bookkeeping: ordered, deduplicated path lists per asset category
//! plus the list of globs to watch.

use std::fmt;

/// The four kinds of asset the builder knows how to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetCategory {
    Style,
    Script,
    Markup,
    Image,
}

impl AssetCategory {
    /// Fixed build order, also used by [`FileRegistry::all`].
    pub const ALL: [AssetCategory; 4] = [
        AssetCategory::Style,
        AssetCategory::Script,
        AssetCategory::Markup,
        AssetCategory::Image,
    ];

    /// Output subdirectory under the configured output path.
    pub fn subdir(self) -> &'static str {
        match self {
            AssetCategory::Style => "css",
            AssetCategory::Script => "js",
            AssetCategory::Markup => "html",
            AssetCategory::Image => "img",
        }
    }

    /// Bundle extension. Images are copied one by one and have none.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            AssetCategory::Style => Some("css"),
            AssetCategory::Script => Some("js"),
            AssetCategory::Markup => Some("html"),
            AssetCategory::Image => None,
        }
    }

    /// Human-readable name used in status lines.
    pub fn label(self) -> &'static str {
        match self {
            AssetCategory::Style => "CSS bundle",
            AssetCategory::Script => "JS bundle",
            AssetCategory::Markup => "HTML bundle",
            AssetCategory::Image => "images",
        }
    }

    fn index(self) -> usize {
        match self {
            AssetCategory::Style => 0,
            AssetCategory::Script => 1,
            AssetCategory::Markup => 2,
            AssetCategory::Image => 3,
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.subdir())
    }
}

/// Append `value` unless it is empty or already listed.
fn push_unique(list: &mut Vec<String>, value: &str) {
    if value.is_empty() || list.iter().any(|v| v == value) {
        return;
    }
    list.push(value.to_string());
}

#[derive(Debug, Clone, Default)]
pub struct FileRegistry {
    files: [Vec<String>; 4],
    watch: Vec<String>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an input for `category`. Empty and duplicate paths are ignored.
    pub fn add(&mut self, category: AssetCategory, path: &str) {
        push_unique(&mut self.files[category.index()], path);
    }

    /// Register a glob or path to watch. Same dedup rules as [`add`](Self::add).
    pub fn add_watch(&mut self, path: &str) {
        push_unique(&mut self.watch, path);
    }

    pub fn files(&self, category: AssetCategory) -> &[String] {
        &self.files[category.index()]
    }

    pub fn watch_list(&self) -> &[String] {
        &self.watch
    }

    /// Every registered input, Style first and Image last.
    pub fn all(&self) -> Vec<String> {
        AssetCategory::ALL
            .iter()
            .flat_map(|c| self.files(*c).iter().cloned())
            .collect()
    }

    /// Forget all inputs. The watch list is kept.
    pub fn flush(&mut self) {
        self.files = Default::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_path_keeps_first_position() {
        let mut reg = FileRegistry::new();
        reg.add(AssetCategory::Style, "a.scss");
        reg.add(AssetCategory::Style, "b.scss");
        reg.add(AssetCategory::Style, "a.scss");
        assert_eq!(reg.files(AssetCategory::Style), ["a.scss", "b.scss"]);
    }

    #[test]
    fn empty_path_is_ignored() {
        let mut reg = FileRegistry::new();
        reg.add(AssetCategory::Script, "");
        reg.add_watch("");
        assert!(reg.files(AssetCategory::Script).is_empty());
        assert!(reg.watch_list().is_empty());
    }

    #[test]
    fn same_path_allowed_in_two_categories() {
        let mut reg = FileRegistry::new();
        reg.add(AssetCategory::Style, "shared.txt");
        reg.add(AssetCategory::Script, "shared.txt");
        assert_eq!(reg.all(), ["shared.txt", "shared.txt"]);
    }

    #[test]
    fn all_concatenates_in_fixed_order() {
        let mut reg = FileRegistry::new();
        reg.add(AssetCategory::Image, "logo.png");
        reg.add(AssetCategory::Markup, "index.html");
        reg.add(AssetCategory::Script, "app.js");
        reg.add(AssetCategory::Style, "site.scss");
        assert_eq!(reg.all(), ["site.scss", "app.js", "index.html", "logo.png"]);
    }

    #[test]
    fn flush_empties_inputs_but_keeps_watch_list() {
        let mut reg = FileRegistry::new();
        for c in AssetCategory::ALL {
            reg.add(c, "x");
        }
        reg.add_watch("src/**/*.scss");
        reg.add_watch("src/**/*.scss");
        reg.flush();
        for c in AssetCategory::ALL {
            assert!(reg.files(c).is_empty());
        }
        assert_eq!(reg.watch_list(), ["src/**/*.scss"]);
    }
}

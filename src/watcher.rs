//! File system watcher — glob-filtered, debounced, forwards change events
//! to the build dispatcher.

use crate::error::{BuildError, BuildResult};
use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Directories/files to always ignore.
const IGNORE_DIRS: &[&str] = &[".git", "node_modules", "target"];
const IGNORE_EXTS: &[&str] = &["swp", "swo", "tmp"];

/// Repeated events for the same path inside this window are dropped.
const DEBOUNCE: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Changed,
    Deleted,
}

impl ChangeKind {
    fn from_event_kind(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(ChangeKind::Added),
            EventKind::Modify(_) => Some(ChangeKind::Changed),
            EventKind::Remove(_) => Some(ChangeKind::Deleted),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeKind::Added => "added",
            ChangeKind::Changed => "changed",
            ChangeKind::Deleted => "deleted",
        })
    }
}

/// One change, as seen by the dispatcher. `path` is `None` when the backend
/// could not say which file changed (e.g. an overflow rescan).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: Option<PathBuf>,
}

fn is_glob_meta(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

/// Strip a leading `./` and normalise separators for glob matching.
fn normalize(pattern: &str) -> String {
    let p = pattern.replace('\\', "/");
    p.strip_prefix("./").map(str::to_string).unwrap_or(p)
}

/// The literal directory a pattern starts in, e.g. `src/scss` for
/// `./src/scss/**/*.scss`. A plain file path yields its parent.
pub fn glob_base(pattern: &str) -> PathBuf {
    let normalized = normalize(pattern);
    let path = Path::new(&normalized);
    let mut base = PathBuf::new();
    for comp in path.components() {
        if let Component::Normal(part) = comp {
            if is_glob_meta(&part.to_string_lossy()) {
                return base;
            }
        }
        base.push(comp);
    }
    // No glob characters: watch the file's directory
    match path.parent() {
        Some(parent) => parent.to_path_buf(),
        None => PathBuf::new(),
    }
}

/// Decides which event paths are interesting.
#[derive(Debug, Clone)]
pub struct PathFilter {
    root: PathBuf,
    globs: GlobSet,
    ignore: Vec<PathBuf>,
}

impl PathFilter {
    /// `ignore` holds directories (typically the build output) whose
    /// contents never count as a change.
    pub fn new(root: PathBuf, patterns: &[String], ignore: Vec<PathBuf>) -> BuildResult<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(&normalize(pattern)).map_err(|e| BuildError::Pattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            builder.add(glob);
        }
        let globs = builder.build().map_err(|e| BuildError::Pattern {
            pattern: patterns.join(", "),
            message: e.to_string(),
        })?;
        Ok(PathFilter {
            root,
            globs,
            ignore,
        })
    }

    /// Path relative to the watch root, forward slashes.
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.to_string_lossy().replace('\\', "/")
    }

    pub fn matches(&self, path: &Path) -> bool {
        if self.ignore.iter().any(|dir| path.starts_with(dir)) {
            return false;
        }
        let s = path.to_string_lossy();
        if IGNORE_DIRS
            .iter()
            .any(|d| path.components().any(|c| c.as_os_str() == *d))
        {
            return false;
        }
        if let Some(ext) = path.extension() {
            if IGNORE_EXTS.contains(&ext.to_string_lossy().as_ref()) {
                return false;
            }
        }
        self.globs.is_match(self.relative(path)) || self.globs.is_match(s.replace('\\', "/"))
    }
}

/// Per-path debounce bookkeeping.
#[derive(Debug, Default)]
struct Debouncer {
    seen: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    fn admit(&mut self, path: &Path, now: Instant) -> bool {
        match self.seen.get(path) {
            Some(last) if now.duration_since(*last) < DEBOUNCE => false,
            _ => {
                self.seen
                    .retain(|_, last| now.saturating_duration_since(*last) < DEBOUNCE);
                self.seen.insert(path.to_path_buf(), now);
                true
            }
        }
    }
}

/// Spawn a watcher over the base directories of `patterns`.
///
/// Every matching change is sent to `tx`. The notify callback lives on its
/// own OS thread and never blocks tokio.
pub fn spawn(
    root: PathBuf,
    patterns: &[String],
    ignore: Vec<PathBuf>,
    tx: mpsc::UnboundedSender<ChangeEvent>,
) -> BuildResult<()> {
    let filter = PathFilter::new(root.clone(), patterns, ignore)?;
    let (raw_tx, raw_rx) = std::sync::mpsc::channel::<Result<Event, notify::Error>>();

    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = raw_tx.send(res);
        },
        notify::Config::default(),
    )?;

    let mut bases: Vec<PathBuf> = Vec::new();
    for pattern in patterns {
        let base = root.join(glob_base(pattern));
        if !bases.contains(&base) {
            bases.push(base);
        }
    }
    for base in &bases {
        if !base.exists() {
            tracing::warn!("Watch base does not exist, skipping: {}", base.display());
            continue;
        }
        watcher.watch(base, RecursiveMode::Recursive)?;
        tracing::debug!("Watching {}", base.display());
    }

    std::thread::Builder::new()
        .name("fs-watcher".into())
        .spawn(move || {
            let _watcher = watcher; // prevent drop
            let mut debouncer = Debouncer::default();

            for event in raw_rx {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!("Watch error: {}", e);
                        continue;
                    }
                };

                if event.need_rescan() {
                    let _ = tx.send(ChangeEvent {
                        kind: ChangeKind::Changed,
                        path: None,
                    });
                    continue;
                }

                let Some(kind) = ChangeKind::from_event_kind(&event.kind) else {
                    continue;
                };

                for path in event.paths {
                    if !filter.matches(&path) || !debouncer.admit(&path, Instant::now()) {
                        continue;
                    }
                    tracing::info!("File {}: {}, ...", kind, filter.relative(&path));
                    if tx
                        .send(ChangeEvent {
                            kind,
                            path: Some(path),
                        })
                        .is_err()
                    {
                        return;
                    }
                }
            }
        })
        .map_err(|e| BuildError::io("fs-watcher", e))?;

    Ok(())
}

//! Per-category build timers.

use crate::registry::AssetCategory;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Start of one build. Each build carries its own mark, so overlapping
/// builds of the same category each get their status line.
#[derive(Debug, Clone, Copy)]
pub struct BuildMark {
    category: AssetCategory,
    id: u64,
    started: Instant,
}

impl BuildMark {
    pub fn category(&self) -> AssetCategory {
        self.category
    }
}

#[derive(Debug, Default)]
pub struct TimerMap {
    started: Mutex<HashMap<AssetCategory, (u64, Instant)>>,
    next_id: AtomicU64,
}

impl TimerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start of a build for `category`. The map keeps the most
    /// recent start; the returned mark belongs to this build alone.
    pub fn log_start(&self, category: AssetCategory) -> BuildMark {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        if let Ok(mut map) = self.started.lock() {
            map.insert(category, (id, started));
        }
        BuildMark {
            category,
            id,
            started,
        }
    }

    /// Log the status line for `mark` and return it.
    pub fn log_done(&self, mark: BuildMark) -> String {
        self.clear(&mark);
        let line = done_message(mark.category, elapsed_secs(mark.started));
        tracing::info!("{}", line);
        line
    }

    /// Drop `mark` without a status line, for builds that failed.
    pub fn abandon(&self, mark: BuildMark) {
        self.clear(&mark);
    }

    fn clear(&self, mark: &BuildMark) {
        if let Ok(mut map) = self.started.lock() {
            if map.get(&mark.category).map(|(id, _)| *id) == Some(mark.id) {
                map.remove(&mark.category);
            }
        }
    }

    /// Whether a build of `category` has started and not yet finished.
    pub fn is_running(&self, category: AssetCategory) -> bool {
        self.started
            .lock()
            .map(|map| map.contains_key(&category))
            .unwrap_or(false)
    }
}

/// Wall-clock milliseconds since `start`, as seconds.
fn elapsed_secs(start: Instant) -> f64 {
    start.elapsed().as_millis() as f64 / 1000.0
}

pub fn done_message(category: AssetCategory, secs: f64) -> String {
    match category {
        AssetCategory::Image => format!("Finished processing images, in {} seconds.", secs),
        _ => format!(
            "Finished building {}, in {} seconds.",
            category.label(),
            secs
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_then_done_reports_category() {
        let timers = TimerMap::new();
        let mark = timers.log_start(AssetCategory::Script);
        assert_eq!(mark.category(), AssetCategory::Script);
        assert!(timers.is_running(AssetCategory::Script));

        let line = timers.log_done(mark);
        assert!(line.starts_with("Finished building JS bundle, in "));
        assert!(line.ends_with(" seconds."));
        assert!(!timers.is_running(AssetCategory::Script));
    }

    #[test]
    fn overlapping_builds_each_report() {
        let timers = TimerMap::new();
        let first = timers.log_start(AssetCategory::Style);
        let second = timers.log_start(AssetCategory::Style);

        let a = timers.log_done(first);
        // The later build is still in flight.
        assert!(timers.is_running(AssetCategory::Style));
        let b = timers.log_done(second);

        assert!(a.starts_with("Finished building CSS bundle, in "));
        assert!(b.starts_with("Finished building CSS bundle, in "));
        assert!(!timers.is_running(AssetCategory::Style));
    }

    #[test]
    fn abandoned_build_is_no_longer_running() {
        let timers = TimerMap::new();
        let mark = timers.log_start(AssetCategory::Image);
        timers.abandon(mark);
        assert!(!timers.is_running(AssetCategory::Image));
    }

    #[test]
    fn message_wording() {
        assert_eq!(
            done_message(AssetCategory::Style, 0.25),
            "Finished building CSS bundle, in 0.25 seconds."
        );
        assert_eq!(
            done_message(AssetCategory::Markup, 1.0),
            "Finished building HTML bundle, in 1 seconds."
        );
        assert_eq!(
            done_message(AssetCategory::Image, 0.003),
            "Finished processing images, in 0.003 seconds."
        );
    }
}

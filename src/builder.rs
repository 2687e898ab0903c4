//! The `Builder`: configuration, per-category builds and the watch/serve
//! entry point.
//!
//! Configure it through the `&mut self` setters, then share it behind an
//! `Arc` and call [`Builder::start`]. Once shared, the input lists are read
//! only; change events fan out to the matching pipelines on the blocking
//! pool, so two pipelines may run at the same time.

use crate::header::ProjectMeta;
use crate::pipeline;
use crate::registry::{AssetCategory, FileRegistry};
use crate::server::{self, ServerSettings};
use crate::timer::TimerMap;
use crate::watcher::{self, ChangeEvent};

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

pub const DEFAULT_PORT: u16 = 8888;
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Dev server base path and port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub base: PathBuf,
    pub port: u16,
}

/// What a call to [`Builder::start`] actually started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartOutcome {
    pub server_started: bool,
    pub watcher_started: bool,
    /// Port the server bound, when it was started by this call.
    pub port: Option<u16>,
}

pub struct Builder {
    root: PathBuf,
    host: String,
    server: Option<ServerConfig>,
    output: Option<PathBuf>,
    meta: ProjectMeta,
    registry: FileRegistry,
    timers: TimerMap,
    reload_tx: broadcast::Sender<String>,
    serving: AtomicBool,
    watching: AtomicBool,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// A builder rooted at the current working directory.
    pub fn new() -> Self {
        let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::with_root(root)
    }

    /// A builder whose watch patterns and reload paths resolve against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let (reload_tx, _) = broadcast::channel::<String>(16);
        Builder {
            root: root.into(),
            host: DEFAULT_HOST.to_string(),
            server: None,
            output: None,
            meta: ProjectMeta::default(),
            registry: FileRegistry::new(),
            timers: TimerMap::new(),
            reload_tx,
            serving: AtomicBool::new(false),
            watching: AtomicBool::new(false),
        }
    }

    // ───────────────────── Configuration ─────────────────────

    /// Set the dev server base path and port. An empty base disables the
    /// server; a missing port means [`DEFAULT_PORT`].
    pub fn setup_server(&mut self, base: &str, port: Option<u16>) {
        self.server = (!base.is_empty()).then(|| ServerConfig {
            base: PathBuf::from(base),
            port: port.filter(|p| *p != 0).unwrap_or(DEFAULT_PORT),
        });
    }

    pub fn set_host(&mut self, host: &str) {
        if !host.is_empty() {
            self.host = host.to_string();
        }
    }

    /// Set the output directory. An empty path unsets it.
    pub fn set_output_path(&mut self, path: &str) {
        self.output = (!path.is_empty()).then(|| PathBuf::from(path));
    }

    pub fn set_project_meta(&mut self, meta: ProjectMeta) {
        self.meta = meta;
    }

    pub fn bundle_css(&mut self, path: &str) {
        self.registry.add(AssetCategory::Style, path);
    }

    pub fn bundle_js(&mut self, path: &str) {
        self.registry.add(AssetCategory::Script, path);
    }

    pub fn bundle_html(&mut self, path: &str) {
        self.registry.add(AssetCategory::Markup, path);
    }

    pub fn bundle_img(&mut self, path: &str) {
        self.registry.add(AssetCategory::Image, path);
    }

    pub fn watch_files(&mut self, pattern: &str) {
        self.registry.add_watch(pattern);
    }

    /// Drop every registered input. Watch patterns stay.
    pub fn flush_files(&mut self) {
        self.registry.flush();
    }

    pub fn files(&self) -> Vec<String> {
        self.registry.all()
    }

    pub fn registry(&self) -> &FileRegistry {
        &self.registry
    }

    pub fn server_config(&self) -> Option<&ServerConfig> {
        self.server.as_ref()
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    /// Subscribe to the paths pushed to live-reload clients.
    pub fn subscribe_reloads(&self) -> broadcast::Receiver<String> {
        self.reload_tx.subscribe()
    }

    // ───────────────────── Builds ─────────────────────

    /// Build one category and return the files written.
    ///
    /// A category with no inputs, or a builder with no output path, is a
    /// silent no-op. Pipeline failures are logged and yield nothing.
    pub fn build(&self, category: AssetCategory) -> Vec<PathBuf> {
        let files = self.registry.files(category);
        let Some(output) = self.output.as_deref() else {
            return Vec::new();
        };
        if files.is_empty() {
            return Vec::new();
        }

        let mark = self.timers.log_start(category);
        let files: Vec<String> = files
            .iter()
            .map(|f| self.root.join(f).display().to_string())
            .collect();
        match pipeline::run(category, &files, &self.root.join(output), &self.meta) {
            Ok(written) => {
                self.push_reload(&written);
                self.timers.log_done(mark);
                written
            }
            Err(e) => {
                self.timers.abandon(mark);
                tracing::error!("{}", e);
                Vec::new()
            }
        }
    }

    pub fn build_css(&self) -> Vec<PathBuf> {
        self.build(AssetCategory::Style)
    }

    pub fn build_js(&self) -> Vec<PathBuf> {
        self.build(AssetCategory::Script)
    }

    pub fn build_html(&self) -> Vec<PathBuf> {
        self.build(AssetCategory::Markup)
    }

    pub fn build_img(&self) -> Vec<PathBuf> {
        self.build(AssetCategory::Image)
    }

    /// Every category, in fixed order.
    pub fn build_all(&self) -> Vec<PathBuf> {
        AssetCategory::ALL
            .iter()
            .flat_map(|c| self.build(*c))
            .collect()
    }

    /// Tell connected browsers which files changed.
    fn push_reload(&self, written: &[PathBuf]) {
        let base = self
            .server
            .as_ref()
            .map(|s| lexical(&self.root.join(&s.base)))
            .unwrap_or_else(|| lexical(&self.root));
        for path in written {
            // No receivers is fine
            let _ = self.reload_tx.send(url_path(path, &base));
        }
    }

    // ───────────────────── Watch / serve ─────────────────────

    /// Start the dev server and the file watcher.
    ///
    /// Each is started at most once per builder; later calls leave a running
    /// one alone. The server needs a base path, the watcher a non-empty watch
    /// list.
    pub async fn start(self: &Arc<Self>) -> Result<StartOutcome> {
        let mut outcome = StartOutcome::default();

        if let Some(config) = &self.server {
            if latch(&self.serving) {
                let mut settings = ServerSettings {
                    host: self.host.clone(),
                    port: config.port,
                    root: self.root.join(&config.base),
                };
                let listener = server::bind(&mut settings)
                    .await
                    .context("Failed to start dev server")?;
                outcome.server_started = true;
                outcome.port = Some(settings.port);

                let reload_tx = self.reload_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = server::serve(listener, settings, reload_tx).await {
                        tracing::error!("Dev server stopped: {:#}", e);
                    }
                });
            }
        }

        if !self.registry.watch_list().is_empty() && latch(&self.watching) {
            let (tx, rx) = mpsc::unbounded_channel();
            let ignore = self
                .output
                .iter()
                .map(|o| lexical(&self.root.join(o)))
                .collect();
            watcher::spawn(self.root.clone(), self.registry.watch_list(), ignore, tx)
                .context("Failed to start file watcher")?;
            outcome.watcher_started = true;

            let this = Arc::clone(self);
            tokio::spawn(async move { this.dispatch_loop(rx).await });
        }

        Ok(outcome)
    }

    async fn dispatch_loop(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<ChangeEvent>) {
        while let Some(event) = rx.recv().await {
            self.on_change(event.path.as_deref());
        }
    }

    /// Fan a change out to every matching pipeline and return the categories
    /// dispatched. Each build runs on the blocking pool; no ordering between them.
    pub fn on_change(self: &Arc<Self>, path: Option<&Path>) -> Vec<AssetCategory> {
        let categories = classify(path);
        for category in &categories {
            let this = Arc::clone(self);
            let category = *category;
            tokio::task::spawn_blocking(move || this.build(category));
        }
        categories
    }
}

/// Flip a one-way latch. True only for the caller that flipped it.
fn latch(flag: &AtomicBool) -> bool {
    flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_ok()
}

fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| exts.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// Categories to rebuild for a changed path.
///
/// Each test is independent, so a path could in principle match several.
/// An unknown path, or one that matches nothing, rebuilds everything.
pub fn classify(path: Option<&Path>) -> Vec<AssetCategory> {
    let Some(path) = path else {
        return AssetCategory::ALL.to_vec();
    };

    let mut hits = Vec::new();
    if has_extension(path, &["scss", "css"]) {
        hits.push(AssetCategory::Style);
    }
    if has_extension(path, &["js", "jsx"]) {
        hits.push(AssetCategory::Script);
    }
    if has_extension(path, &["html", "htm", "jade"]) {
        hits.push(AssetCategory::Markup);
    }
    if has_extension(path, &["jpg", "jpeg", "png", "gif", "bmp"]) {
        hits.push(AssetCategory::Image);
    }

    if hits.is_empty() {
        AssetCategory::ALL.to_vec()
    } else {
        hits
    }
}

/// Drop `.` components and fold `..` where possible, without touching disk.
fn lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// URL path of a written file relative to the served directory, or its bare
/// file name when it lives outside.
fn url_path(written: &Path, base: &Path) -> String {
    let written = lexical(written);
    match written.strip_prefix(base) {
        Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
        Err(_) => written
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

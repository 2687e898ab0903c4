//! hotbundle: front-end asset bundler with a live-reload dev server.
//!
//! Register inputs per asset category, point the builder at an output
//! directory, and call [`Builder::start`] to serve and watch:
//!
//! ```no_run
//! use std::sync::Arc;
//! use hotbundle::Builder;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let mut scene = Builder::new();
//! scene.setup_server("./", None);
//! scene.set_output_path("./dist");
//! scene.watch_files("./src/scss/*.scss");
//! scene.bundle_css("./src/scss/styles.scss");
//! scene.bundle_js("./src/js/Stage.js");
//!
//! let scene = Arc::new(scene);
//! scene.build_all();
//! scene.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod header;
pub mod logging;
pub mod pipeline;
pub mod registry;
pub mod server;
pub mod timer;
pub mod watcher;

mod inject;

pub use builder::{classify, Builder, ServerConfig, StartOutcome};
pub use error::{BuildError, BuildResult};
pub use header::ProjectMeta;
pub use registry::{AssetCategory, FileRegistry};

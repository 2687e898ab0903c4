//! hotbundle: bundle front-end assets, serve them, rebuild on change.
//!
//! Usage:
//!   hotbundle --server ./ --output ./dist --css src/scss/styles.scss --watch "src/scss/*.scss"
//!   hotbundle --once                  # build everything from hotbundle.json and exit
//!   hotbundle                         # auto-reads ./hotbundle.json

use anyhow::{Context, Result};
use clap::Parser;
use hotbundle::config::BuildFile;
use hotbundle::{logging, Builder, ProjectMeta};
use std::path::PathBuf;
use std::sync::Arc;

// ───────────────────── CLI ─────────────────────

#[derive(Parser)]
#[command(name = "hotbundle", version, about = "Bundle front-end assets with a live-reload dev server")]
struct Cli {
    /// Build file (defaults to ./hotbundle.json when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dev server base path; enables the server
    #[arg(short, long)]
    server: Option<String>,

    /// Dev server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Dev server bind host
    #[arg(long)]
    host: Option<String>,

    /// Output directory
    #[arg(short, long)]
    output: Option<String>,

    /// package.json to read description and author from
    #[arg(long)]
    package: Option<PathBuf>,

    /// Style input (repeatable, order is kept)
    #[arg(long = "css")]
    css: Vec<String>,

    /// Script input (repeatable)
    #[arg(long = "js")]
    js: Vec<String>,

    /// Markup input (repeatable)
    #[arg(long = "html")]
    html: Vec<String>,

    /// Image input (repeatable)
    #[arg(long = "img")]
    img: Vec<String>,

    /// Glob to watch for changes (repeatable)
    #[arg(short, long)]
    watch: Vec<String>,

    /// Build once and exit without serving or watching
    #[arg(long, default_value_t = false)]
    once: bool,
}

/// Merge: CLI > build file > defaults.
fn build_builder(cli: &Cli) -> Result<Builder> {
    let cwd = std::env::current_dir().context("Failed to read working directory")?;
    let mut builder = Builder::with_root(&cwd);

    if let Some(file) = BuildFile::discover(cli.config.as_deref(), &cwd)? {
        file.apply(&mut builder, &cwd);
    } else {
        builder.set_project_meta(ProjectMeta::load(&cwd.join(hotbundle::config::DEFAULT_PACKAGE_FILE)));
    }

    if cli.server.is_some() || cli.port.is_some() {
        let base = cli
            .server
            .clone()
            .or_else(|| builder.server_config().map(|s| s.base.display().to_string()))
            .unwrap_or_default();
        let port = cli.port.or_else(|| builder.server_config().map(|s| s.port));
        builder.setup_server(&base, port);
    }
    if let Some(host) = &cli.host {
        builder.set_host(host);
    }
    if let Some(output) = &cli.output {
        builder.set_output_path(output);
    }
    if let Some(package) = &cli.package {
        builder.set_project_meta(ProjectMeta::load(&cwd.join(package)));
    }

    cli.watch.iter().for_each(|p| builder.watch_files(p));
    cli.css.iter().for_each(|p| builder.bundle_css(p));
    cli.js.iter().for_each(|p| builder.bundle_js(p));
    cli.html.iter().for_each(|p| builder.bundle_html(p));
    cli.img.iter().for_each(|p| builder.bundle_img(p));

    Ok(builder)
}

// ───────────────────── Main ─────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let cli = Cli::parse();
    let builder = Arc::new(build_builder(&cli).context("Failed to load configuration")?);

    if builder.output_path().is_none() {
        tracing::warn!("No output path configured, builds will be skipped");
    }

    let initial = Arc::clone(&builder);
    tokio::task::spawn_blocking(move || initial.build_all()).await?;

    if cli.once {
        return Ok(());
    }

    let started = builder.start().await?;
    if !started.server_started && !started.watcher_started {
        tracing::info!("Nothing to serve or watch, exiting");
        return Ok(());
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    Ok(())
}

//! Dev server — static files from the base path + WebSocket live reload.

use crate::inject::inject_livereload;

use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderValue},
    middleware,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// WebSocket endpoint the injected client connects to.
pub const RELOAD_PATH: &str = "/__lr";

/// Maximum number of port increments to try when the port is already in use.
const MAX_PORT_RETRIES: u16 = 20;

/// Everything the server needs, fixed before it starts.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Directory served at `/`.
    pub root: PathBuf,
}

// ───────────────────── Shared state ─────────────────────

#[derive(Clone)]
pub struct AppState {
    pub reload_tx: broadcast::Sender<String>,
    pub client_counter: Arc<AtomicU64>,
}

// ───────────────────── WebSocket handler ─────────────────────

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let mut rx = state.reload_tx.subscribe();
    let client_id = format!("c{}", state.client_counter.fetch_add(1, Ordering::Relaxed));
    tracing::debug!("Browser {} connected", client_id);

    loop {
        tokio::select! {
            // Server → Browser: one message per written asset
            result = rx.recv() => {
                let changed_path = match result {
                    Ok(p) => p,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if socket.send(Message::Text(reload_message(&changed_path))).await.is_err() {
                    break;
                }
            }
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    _ => {} // the client has nothing to tell us
                }
            }
        }
    }

    tracing::debug!("Browser {} disconnected", client_id);
}

/// Stylesheets are swapped in place; anything else reloads the page.
pub fn reload_message(changed_path: &str) -> String {
    if is_css_file(changed_path) {
        format!("css:{}", changed_path)
    } else {
        "reload".to_string()
    }
}

fn is_css_file(path: &str) -> bool {
    path.to_lowercase().ends_with(".css")
}

// ───────────────────── Build router ─────────────────────

pub fn build_router(state: Arc<AppState>, settings: &ServerSettings) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let serve_dir = ServeDir::new(&settings.root).append_index_html_on_directories(true);

    Router::new()
        .route(RELOAD_PATH, get(ws_handler))
        .fallback_service(serve_dir)
        .layer(middleware::from_fn(inject_livereload))
        // Browser must revalidate every request so reloads never show stale assets.
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(cors)
        .with_state(state)
}

// ───────────────────── Startup banner ─────────────────────

fn print_banner(settings: &ServerSettings) {
    tracing::info!("hotbundle v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Serving: {}", settings.root.display());
    tracing::info!("Local:   http://localhost:{}", settings.port);
    if settings.host == "0.0.0.0" {
        if let Ok(addr) = local_ip_address() {
            tracing::info!("Network: http://{}:{}", addr, settings.port);
        }
    }
}

fn local_ip_address() -> Result<String> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0")?;
    // Connect to a public address to determine local IP
    socket.connect("8.8.8.8:80")?;
    Ok(socket.local_addr()?.ip().to_string())
}

// ───────────────────── Bind + serve ─────────────────────

/// Bind the listener, moving up from the requested port while it is taken.
/// `settings.port` is updated to the port actually bound.
pub async fn bind(settings: &mut ServerSettings) -> Result<TcpListener> {
    let original_port = settings.port;

    for attempt in 0..=MAX_PORT_RETRIES {
        let Some(try_port) = original_port.checked_add(attempt) else {
            break;
        };
        let addr: SocketAddr = format!("{}:{}", settings.host, try_port).parse()?;

        match TcpListener::bind(addr).await {
            Ok(listener) => {
                if try_port != original_port {
                    tracing::info!(
                        "Port {} was in use, switched to port {}.",
                        original_port,
                        try_port
                    );
                }
                settings.port = try_port;
                return Ok(listener);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                if attempt == 0 {
                    tracing::warn!(
                        "Port {} is in use, searching for an available port...",
                        try_port
                    );
                }
            }
            Err(e) => return Err(e.into()),
        }
    }

    anyhow::bail!(
        "Ports {}-{} are all in use. Please free a port or choose a different one.",
        original_port,
        original_port.saturating_add(MAX_PORT_RETRIES)
    )
}

/// Serve on an already-bound listener until the process exits.
pub async fn serve(
    listener: TcpListener,
    settings: ServerSettings,
    reload_tx: broadcast::Sender<String>,
) -> Result<()> {
    let state = Arc::new(AppState {
        reload_tx,
        client_counter: Arc::new(AtomicU64::new(0)),
    });
    let app = build_router(state, &settings);

    print_banner(&settings);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_changes_are_hot_swapped() {
        assert_eq!(reload_message("dist/css/bundle.min.css"), "css:dist/css/bundle.min.css");
        assert_eq!(reload_message("dist/css/BUNDLE.CSS"), "css:dist/css/BUNDLE.CSS");
    }

    #[test]
    fn other_changes_reload_the_page() {
        assert_eq!(reload_message("dist/js/bundle.min.js"), "reload");
        assert_eq!(reload_message("dist/img/logo.png"), "reload");
    }

    #[tokio::test]
    async fn bind_skips_a_busy_port() {
        let busy = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let busy_port = busy.local_addr().unwrap().port();

        let mut settings = ServerSettings {
            host: "127.0.0.1".into(),
            port: busy_port,
            root: PathBuf::from("."),
        };
        let listener = bind(&mut settings).await.unwrap();

        assert_ne!(settings.port, busy_port);
        assert_eq!(listener.local_addr().unwrap().port(), settings.port);
    }
}

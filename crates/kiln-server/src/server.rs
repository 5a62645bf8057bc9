//! Development server implementation.

use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::sync::broadcast::error::RecvError;
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::websocket::{client_script, ReloadHub, ReloadMessage, ENDPOINT, SCRIPT_PATH};

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Directory served as the site root
    pub root: PathBuf,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("src"),
            port: 3000,
            host: "127.0.0.1".to_string(),
            open: true,
        }
    }
}

impl DevServerConfig {
    /// The address the server listens on.
    pub fn addr(&self) -> Result<SocketAddr, ServerError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ServerError::InvalidAddress(format!("{}:{}", self.host, self.port)))
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),
}

/// Shared server state.
struct ServerState {
    root: PathBuf,
    hub: ReloadHub,
}

/// Development server.
pub struct DevServer {
    config: DevServerConfig,
    hub: ReloadHub,
}

impl DevServer {
    /// Create a new development server broadcasting messages from `hub`.
    pub fn new(config: DevServerConfig, hub: ReloadHub) -> Self {
        Self { config, hub }
    }

    /// Build the router: live reload endpoints plus static files from the root.
    pub fn router(&self) -> Router {
        let state = Arc::new(ServerState {
            root: self.config.root.clone(),
            hub: self.hub.clone(),
        });

        Router::new()
            .route(ENDPOINT, get(ws_handler))
            .route(SCRIPT_PATH, get(script_handler))
            .fallback(static_handler)
            .with_state(state)
    }

    /// Start the development server. Runs until the process is stopped.
    pub async fn start(self) -> Result<(), ServerError> {
        let addr = self.config.addr()?;
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        let url = format!("http://{}", addr);
        tracing::info!("Serving {} at {}", self.config.root.display(), url);

        if self.config.open {
            if let Err(e) = open::that(&url) {
                tracing::warn!("Could not open browser: {}", e);
            }
        }

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        Ok(())
    }
}

/// Handler for the live reload WebSocket endpoint.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let rx = state.hub.subscribe();
    ws.on_upgrade(move |socket| handle_ws(socket, rx))
}

/// Forward hub messages to one browser until either side goes away.
async fn handle_ws(
    mut socket: WebSocket,
    mut rx: tokio::sync::broadcast::Receiver<ReloadMessage>,
) {
    if send_message(&mut socket, &ReloadMessage::Connected).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            msg = rx.recv() => match msg {
                Ok(msg) => {
                    if send_message(&mut socket, &msg).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Live reload client lagged by {} message(s)", skipped);
                    if send_message(&mut socket, &ReloadMessage::Reload).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ReloadMessage) -> Result<(), ()> {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!("Could not encode live reload message: {}", e);
            return Ok(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

/// Handler for the live reload client script.
async fn script_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        client_script(),
    )
}

/// Serve HTML pages with the client script injected; everything else as-is.
async fn static_handler(State(state): State<Arc<ServerState>>, request: Request) -> Response {
    if request.method() == Method::GET {
        if let Some(page) = html_page(&state.root, request.uri().path()) {
            return match tokio::fs::read_to_string(&page).await {
                Ok(source) => (
                    [(header::CACHE_CONTROL, "no-cache")],
                    Html(inject_script(&source)),
                )
                    .into_response(),
                Err(e) => {
                    tracing::warn!("Could not read {}: {}", page.display(), e);
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            };
        }
    }

    match ServeDir::new(&state.root).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

/// Map a request path to an existing HTML file under `root`.
///
/// Directory requests ending in `/` resolve to their `index.html`. Paths that
/// try to leave the root are never resolved.
fn html_page(root: &Path, uri_path: &str) -> Option<PathBuf> {
    let relative = uri_path.trim_start_matches('/');
    let mut candidate = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => candidate.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }

    if uri_path.ends_with('/') || candidate.as_os_str().is_empty() {
        candidate.push("index.html");
    }

    let is_html = candidate
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html"));

    let path = root.join(candidate);
    (is_html && path.is_file()).then_some(path)
}

/// Insert the live reload script tag before the last `</body>`, or append it.
pub fn inject_script(html: &str) -> String {
    let tag = format!(r#"<script src="{}"></script>"#, SCRIPT_PATH);

    match html.to_ascii_lowercase().rfind("</body>") {
        Some(index) => {
            let mut out = String::with_capacity(html.len() + tag.len());
            out.push_str(&html[..index]);
            out.push_str(&tag);
            out.push_str(&html[index..]);
            out
        }
        None => format!("{}{}", html, tag),
    }
}

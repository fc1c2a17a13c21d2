//! HTTP services for the chat and telephony advisors

pub mod chat;
pub mod health;
pub mod throttle;
pub mod telephony;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::chat::{ChatAdvisor, ChatSessions};
use crate::db::DbPool;
use crate::telephony::{Dialogue, SessionStore, TwilioClient};
use throttle::ChatThrottle;

const PRUNE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// Shared state for chat handlers
pub struct ChatState {
    pub db: DbPool,
    pub advisor: ChatAdvisor,
    pub sessions: ChatSessions,
    pub throttle: Option<ChatThrottle>,
}

/// Shared state for telephony handlers
pub struct TelephonyState {
    pub db: DbPool,
    pub dialogue: Dialogue,
    pub sessions: SessionStore,
    /// Absent when telephony credentials are not configured
    pub twilio: Option<TwilioClient>,
    /// Default callee for `/make_call`
    pub to_number: Option<String>,
    /// Absolute URL the provider fetches when a call connects
    pub voice_url: String,
    /// Absolute URL for provider status callbacks
    pub status_url: String,
}

fn with_common_layers(router: Router) -> Router {
    // CORS layer for cross-origin requests from the web UI
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router.layer(cors).layer(TraceLayer::new_for_http())
}

async fn serve(name: &'static str, port: u16, router: Router) -> Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| crate::Error::Config(format!("failed to bind {name} server: {e}")))?;

    tracing::info!(port, "{name} server listening");

    axum::serve(listener, router)
        .await
        .map_err(|e| crate::Error::Config(format!("{name} server error: {e}")))?;

    Ok(())
}

/// Run `prune` once a minute until the returned task is aborted
fn spawn_pruner<F, Fut>(prune: F) -> tokio::task::JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = usize> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            prune().await;
        }
    })
}

/// Chat advisor HTTP server
pub struct ChatServer {
    state: Arc<ChatState>,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ChatServer {
    #[must_use]
    pub fn new(state: ChatState, port: u16) -> Self {
        Self {
            state: Arc::new(state),
            port,
            static_dir: None,
        }
    }

    /// Serve a static web UI from `dir`
    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let api = chat::router(self.state.clone()).layer(axum::middleware::from_fn_with_state(
            self.state.clone(),
            throttle::throttle_chat_api,
        ));

        let mut router = Router::new()
            .nest("/api", api)
            .merge(health::router())
            .merge(health::ready_router(self.state.db.clone()));

        // Serve static files if configured
        if let Some(static_dir) = &self.static_dir {
            let index_file = static_dir.join("index.html");
            let serve_dir = ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file));

            router = router.fallback_service(serve_dir);
            tracing::info!(path = %static_dir.display(), "serving static files");
        }

        with_common_layers(router)
    }

    /// Run the chat server
    ///
    /// Idle chat sessions are pruned once a minute while the server runs.
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        if self.state.throttle.is_some() {
            tracing::info!("chat API request budget active");
        }

        let sessions = self.state.sessions.clone();
        let pruner = spawn_pruner(move || {
            let sessions = sessions.clone();
            async move { sessions.prune().await }
        });

        let result = serve("chat", self.port, self.router()).await;
        pruner.abort();
        result
    }
}

/// Telephony webhook server
pub struct TelephonyServer {
    state: Arc<TelephonyState>,
    port: u16,
}

impl TelephonyServer {
    #[must_use]
    pub fn new(state: TelephonyState, port: u16) -> Self {
        Self {
            state: Arc::new(state),
            port,
        }
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let router = telephony::router(self.state.clone())
            .merge(health::router())
            .merge(health::ready_router(self.state.db.clone()));

        with_common_layers(router)
    }

    /// Run the telephony server
    ///
    /// Idle call sessions are pruned once a minute while the server runs.
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        if self.state.twilio.is_none() {
            tracing::warn!("telephony credentials not configured, /make_call is disabled");
        }

        let sessions = self.state.sessions.clone();
        let pruner = spawn_pruner(move || {
            let sessions = sessions.clone();
            async move { sessions.prune().await }
        });

        let result = serve("telephony", self.port, self.router()).await;
        pruner.abort();
        result
    }
}

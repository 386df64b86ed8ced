use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lectern_core::{ConversationBuilder, SessionStore};
use lectern_llm::AnyProvider;
use tokio::sync::watch;

use crate::error::GatewayError;
use crate::router::build_router;
use crate::session::DEFAULT_COOKIE_NAME;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Shared handler state. Everything is constructed by the caller and injected.
#[derive(Clone)]
pub struct AppState {
    pub(crate) provider: Arc<AnyProvider>,
    pub(crate) sessions: Arc<dyn SessionStore>,
    pub(crate) conversation: Arc<ConversationBuilder>,
    pub(crate) upload_dir: Arc<PathBuf>,
    pub(crate) cookie_name: Arc<str>,
    pub(crate) started_at: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(
        provider: AnyProvider,
        sessions: Arc<dyn SessionStore>,
        conversation: ConversationBuilder,
        upload_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider: Arc::new(provider),
            sessions,
            conversation: Arc::new(conversation),
            upload_dir: Arc::new(upload_dir.into()),
            cookie_name: Arc::from(DEFAULT_COOKIE_NAME),
            started_at: Instant::now(),
        }
    }

    #[must_use]
    pub fn with_cookie_name(mut self, name: &str) -> Self {
        self.cookie_name = Arc::from(name);
        self
    }
}

pub struct GatewayServer {
    addr: SocketAddr,
    max_upload_bytes: usize,
    sweep_interval: Duration,
    state: AppState,
    shutdown_rx: watch::Receiver<bool>,
}

impl GatewayServer {
    #[must_use]
    pub fn new(
        bind: &str,
        port: u16,
        state: AppState,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let addr: SocketAddr = format!("{bind}:{port}").parse().unwrap_or_else(|e| {
            tracing::warn!("invalid bind '{bind}': {e}, falling back to 127.0.0.1:{port}");
            SocketAddr::from(([127, 0, 0, 1], port))
        });

        if bind == "0.0.0.0" {
            tracing::warn!("server binding to 0.0.0.0, reachable from other hosts");
        }

        Self {
            addr,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            state,
            shutdown_rx,
        }
    }

    #[must_use]
    pub fn with_max_upload_bytes(mut self, size: usize) -> Self {
        self.max_upload_bytes = size;
        self
    }

    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Start the HTTP server and the session sweeper.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or encounters a fatal I/O error.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let sweeper = spawn_session_sweeper(
            Arc::clone(&self.state.sessions),
            self.sweep_interval,
            self.shutdown_rx.clone(),
        );

        let router = build_router(self.state, self.max_upload_bytes);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| GatewayError::Bind(self.addr.to_string(), e))?;
        tracing::info!("lectern listening on http://{}", self.addr);

        let mut shutdown_rx = self.shutdown_rx;
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                while !*shutdown_rx.borrow_and_update() {
                    if shutdown_rx.changed().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
                tracing::info!("server shutting down");
            })
            .await
            .map_err(|e| GatewayError::Server(format!("{e}")));

        sweeper.abort();
        result
    }
}

fn spawn_session_sweeper(
    sessions: Arc<dyn SessionStore>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = sessions.sweep_expired();
                    tracing::debug!(removed, active = sessions.len(), "session sweep");
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use lectern_core::InMemorySessionStore;
    use lectern_epub::Chapter;
    use lectern_llm::mock::MockProvider;

    use super::*;

    fn state() -> (AppState, Arc<InMemorySessionStore>) {
        let store = Arc::new(InMemorySessionStore::new(Duration::from_millis(20)));
        let state = AppState::new(
            AnyProvider::Mock(MockProvider::default()),
            store.clone(),
            ConversationBuilder::default(),
            "uploads",
        );
        (state, store)
    }

    #[test]
    fn server_builder_chain() {
        let (_stx, srx) = watch::channel(false);
        let server = GatewayServer::new("127.0.0.1", 5000, state().0, srx)
            .with_max_upload_bytes(512)
            .with_sweep_interval(Duration::from_secs(5));

        assert_eq!(server.max_upload_bytes, 512);
        assert_eq!(server.sweep_interval, Duration::from_secs(5));
        assert_eq!(server.addr.port(), 5000);
    }

    #[test]
    fn server_invalid_bind_fallback() {
        let (_stx, srx) = watch::channel(false);
        let server = GatewayServer::new("not_an_ip", 9999, state().0, srx);
        assert_eq!(server.addr.port(), 9999);
        assert!(server.addr.ip().is_loopback());
    }

    #[test]
    fn custom_cookie_name() {
        let state = state().0.with_cookie_name("reader");
        assert_eq!(&*state.cookie_name, "reader");
    }

    #[tokio::test]
    async fn sweeper_removes_expired_and_stops_on_shutdown() {
        let (_, store) = state();
        store.put(
            lectern_core::SessionId::new(),
            vec![Chapter {
                title: "t".into(),
                content: "c".into(),
            }],
            "a.epub".into(),
        );

        let (stx, srx) = watch::channel(false);
        let handle = spawn_session_sweeper(store.clone(), Duration::from_millis(10), srx);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(store.is_empty());

        stx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}

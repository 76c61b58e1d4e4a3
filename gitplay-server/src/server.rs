use crate::api::{create_router, AppState};
use gitplay_core::{Backend, History, MemoryBackend};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub struct GitplayServer {
    backend: Arc<dyn Backend>,
    repositories: Vec<String>,
}

impl GitplayServer {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            repositories: Vec::new(),
        }
    }

    /// Serves the history stored in `history_path` as the repository `name`.
    pub fn from_history_file(history_path: &Path, name: &str) -> anyhow::Result<Self> {
        let history = History::load(history_path)?;
        info!(
            "Loaded {} commits from {:?} as {}",
            history.len(),
            history_path,
            name
        );
        let backend = MemoryBackend::new().with_repository(name, &history);
        Ok(Self {
            backend: Arc::new(backend),
            repositories: vec![name.to_string()],
        })
    }

    pub fn repositories(&self) -> &[String] {
        &self.repositories
    }

    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_on(listener).await
    }

    /// Serves on an already bound listener.
    pub async fn serve_on(self, listener: TcpListener) -> anyhow::Result<()> {
        let app = create_router(AppState {
            backend: self.backend,
        });

        info!("Server listening on {}", listener.local_addr()?);
        for name in &self.repositories {
            info!("Serving repository: {}", name);
        }

        axum::serve(listener, app).await?;
        Ok(())
    }
}

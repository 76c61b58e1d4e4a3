pub mod hot;
pub mod log;
pub mod play;
pub mod serve;
pub mod show;
pub mod tree;

use anyhow::{Context, Result};
use colored::Colorize;
use gitplay_core::{Session, SessionConfig};
use gitplay_sdk::HttpBackend;
use std::path::PathBuf;
use std::sync::Arc;

/// Where remote commands find the server and their session settings.
pub struct Connection {
    pub server: String,
    pub config: Option<PathBuf>,
}

impl Connection {
    pub fn session_config(&self) -> Result<SessionConfig> {
        match &self.config {
            Some(path) => SessionConfig::load(path)
                .with_context(|| format!("Failed to load config from {:?}", path)),
            None => Ok(SessionConfig::default()),
        }
    }

    /// Opens `repo` on the server in a fresh session.
    pub async fn open(&self, repo: &str, config: SessionConfig) -> Result<Session> {
        let session = Session::new(Arc::new(HttpBackend::new(&self.server)), config)?;
        let commits = session
            .open_repository(repo)
            .await
            .with_context(|| format!("Failed to open {} on {}", repo, self.server))?;
        println!(
            "{} {} ({} commits)",
            "Opened".bold().green(),
            repo.cyan(),
            commits
        );
        Ok(session)
    }

    /// Opens `repo` and moves the cursor to `at`, clamped to the last commit.
    pub async fn open_at(&self, repo: &str, at: usize) -> Result<(Session, usize)> {
        let session = self.open(repo, self.session_config()?).await?;
        let index = session.jump_to(at).await?;
        if index != at {
            println!(
                "{}",
                format!("Commit {} is past the end, using {}", at, index).yellow()
            );
        }
        Ok((session, index))
    }
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod display;

use commands::{hot, log, play, serve, show, tree, Connection};

#[derive(Parser)]
#[command(name = "gitplay")]
#[command(version, about = "Replay repository history commit by commit", long_about = None)]
struct Cli {
    /// URL of the gitplay server
    #[arg(long, global = true, default_value = "http://localhost:3030")]
    server: String,

    /// Session configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a history file over HTTP
    Serve {
        /// JSON history to serve
        #[arg(long)]
        history: PathBuf,

        /// Repository name clients open (defaults to the file stem)
        #[arg(short, long)]
        name: Option<String>,

        /// Port for the API server
        #[arg(short, long, default_value = "3030")]
        port: u16,
    },

    /// Play a repository's history in the terminal
    Play {
        /// Repository to open
        repo: String,

        /// Commits per second
        #[arg(short, long)]
        speed: Option<u32>,

        /// Commit index to start from
        #[arg(short, long, default_value = "0")]
        from: usize,
    },

    /// Show commit messages
    Log {
        repo: String,

        /// First commit index to show
        #[arg(short, long, default_value = "0")]
        from: usize,

        /// Number of commits to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// List a folder at a commit
    Tree {
        repo: String,

        /// Commit index
        #[arg(short, long, default_value = "0")]
        at: usize,

        /// Folder to list
        #[arg(short, long, default_value = "")]
        path: String,
    },

    /// Print a file at a commit
    Show {
        repo: String,

        /// Path of the file
        file: String,

        /// Commit index
        #[arg(short, long, default_value = "0")]
        at: usize,
    },

    /// Show the most modified files around a commit
    Hot {
        repo: String,

        /// Commit index
        #[arg(short, long, default_value = "0")]
        at: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let connection = Connection {
        server: cli.server,
        config: cli.config,
    };

    match cli.command {
        Commands::Serve {
            history,
            name,
            port,
        } => {
            serve::run(history, name, port).await?;
        }
        Commands::Play { repo, speed, from } => {
            play::run(&connection, &repo, speed, from).await?;
        }
        Commands::Log { repo, from, limit } => {
            log::run(&connection, &repo, from, limit).await?;
        }
        Commands::Tree { repo, at, path } => {
            tree::run(&connection, &repo, at, &path).await?;
        }
        Commands::Show { repo, file, at } => {
            show::run(&connection, &repo, &file, at).await?;
        }
        Commands::Hot { repo, at } => {
            hot::run(&connection, &repo, at).await?;
        }
    }

    Ok(())
}

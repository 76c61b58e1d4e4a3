use anyhow::Result;
use colored::Colorize;
use gitplay_server::GitplayServer;
use std::path::PathBuf;

pub async fn run(history: PathBuf, name: Option<String>, port: u16) -> Result<()> {
    let name = name.unwrap_or_else(|| {
        history
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "repo".to_string())
    });

    println!("{}", "Starting gitplay server...".bold().cyan());
    println!("   {}: {:?}", "History".bold(), history);

    let server = GitplayServer::from_history_file(&history, &name)?;

    println!("   {}: {}", "Repository".bold(), name);
    println!(
        "   {}: {}",
        "API Server".bold(),
        format!("http://localhost:{}", port).green()
    );
    println!();
    println!("{}", "Press Ctrl+C to stop".dimmed());
    println!();

    let addr = format!("0.0.0.0:{}", port).parse()?;
    server.serve(addr).await?;

    Ok(())
}

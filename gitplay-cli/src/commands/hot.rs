use super::Connection;
use anyhow::Result;
use colored::Colorize;

pub async fn run(connection: &Connection, repo: &str, at: usize) -> Result<()> {
    let (session, index) = connection.open_at(repo, at).await?;

    if let Some(pending) = session.fetch_files_ordered_by_most_modifications(index) {
        pending.await?;
    }

    let batch_size = session.config().batch_size;
    let start = index / batch_size * batch_size;
    println!(
        "{} {}",
        "Most modified files".bold().cyan(),
        format!("(commits {}..{})", start, start + batch_size).dimmed()
    );
    println!();

    let grouped = session.ranking_by_directory();
    if grouped.is_empty() {
        println!("{}", "No file was modified more than once".yellow());
        return Ok(());
    }
    for (directory, files) in grouped {
        let directory = if directory.is_empty() { "/".to_string() } else { directory };
        println!("{}", directory.blue().bold());
        for file in files {
            println!(
                "  {:<40} {}",
                file.name(),
                format!("{} changes", file.modifications).yellow()
            );
        }
    }

    Ok(())
}
